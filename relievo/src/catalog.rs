use anyhow::{Context, Result};
use parking_lot::Mutex;
use relievo_core::GeoBBox;
use relievo_proto::Png;
use std::path::{Path, PathBuf};

/// One rendered tile awaiting the stitcher.
#[derive(Debug, Clone)]
pub struct FinalTile {
	pub job_id: u16,
	pub path: PathBuf,
	pub width: u32,
	pub height: u32,
	pub bbox: GeoBBox,
	/// Pixel extents in the final image; assigned by the stitcher.
	pub top_row: usize,
	pub bottom_row: usize,
	pub left_col: usize,
	pub right_col: usize,
}

impl FinalTile {
	pub fn new(job_id: u16, path: PathBuf, width: u32, height: u32, bbox: GeoBBox) -> FinalTile {
		FinalTile {
			job_id,
			path,
			width,
			height,
			bbox,
			top_row: 0,
			bottom_row: 0,
			left_col: 0,
			right_col: 0,
		}
	}
}

/// Collects returned PNGs with their geographic bounds. One mutex guards the
/// list; PNG frames arrive concurrently from every worker link thread.
/// A second PNG for the same job replaces the first.
pub struct TileCatalog {
	dir: PathBuf,
	tiles: Mutex<Vec<FinalTile>>,
}

impl TileCatalog {
	pub fn new(dir: impl Into<PathBuf>) -> Result<TileCatalog> {
		let dir = dir.into();
		std::fs::create_dir_all(&dir).with_context(|| format!("creating tile directory {dir:?}"))?;
		Ok(TileCatalog {
			dir,
			tiles: Mutex::new(Vec::new()),
		})
	}

	/// Ingests a PNG frame: the bytes go to disk, the metadata to the list.
	pub fn add_png(&self, png: &Png) -> Result<()> {
		let path = self.dir.join(format!("tile_{}.png", png.job_id));
		std::fs::write(&path, &png.bytes).with_context(|| format!("writing {path:?}"))?;
		self.insert(FinalTile::new(
			png.job_id,
			path,
			png.img_width,
			png.img_height,
			png.bbox,
		));
		Ok(())
	}

	/// Registers a PNG already on disk (the single-process render path).
	pub fn add_file(&self, job_id: u16, path: PathBuf, width: u32, height: u32, bbox: GeoBBox) {
		self.insert(FinalTile::new(job_id, path, width, height, bbox));
	}

	fn insert(&self, tile: FinalTile) {
		let mut tiles = self.tiles.lock();
		match tiles.iter_mut().find(|t| t.job_id == tile.job_id) {
			Some(existing) => *existing = tile,
			None => tiles.push(tile),
		}
	}

	pub fn len(&self) -> usize {
		self.tiles.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	pub fn tiles(&self) -> Vec<FinalTile> {
		self.tiles.lock().clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn png_frame(job_id: u16, bytes: Vec<u8>) -> Png {
		Png {
			job_id,
			img_height: 3,
			img_width: 4,
			bbox: GeoBBox::from_edges(11.0, 10.0, 20.0, 21.0),
			bytes,
		}
	}

	#[test]
	fn test_add_png_writes_file() {
		let dir = tempfile::tempdir().unwrap();
		let catalog = TileCatalog::new(dir.path().join("tiles")).unwrap();
		catalog.add_png(&png_frame(2, vec![1, 2, 3])).unwrap();
		assert_eq!(catalog.len(), 1);
		let tile = &catalog.tiles()[0];
		assert_eq!(std::fs::read(&tile.path).unwrap(), vec![1, 2, 3]);
		assert_eq!((tile.width, tile.height), (4, 3));
	}

	#[test]
	fn test_duplicate_job_is_last_writer_wins() {
		let dir = tempfile::tempdir().unwrap();
		let catalog = TileCatalog::new(dir.path().join("tiles")).unwrap();
		catalog.add_png(&png_frame(2, vec![1])).unwrap();
		catalog.add_png(&png_frame(2, vec![9, 9])).unwrap();
		assert_eq!(catalog.len(), 1);
		let tile = &catalog.tiles()[0];
		assert_eq!(std::fs::read(&tile.path).unwrap(), vec![9, 9]);
	}
}
