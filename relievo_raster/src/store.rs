use crate::matrix::ElevationGrid;
use anyhow::{Context, Result, anyhow};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use relievo_core::MAPFRAME;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};

/// Failure classes of the tile store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileStoreError {
	/// No file exists for the requested tile.
	MissingTile,
	/// The file exists but its header or cell data is inconsistent.
	CorruptTile,
}

impl fmt::Display for TileStoreError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TileStoreError::MissingTile => f.write_str("tile is not in the store"),
			TileStoreError::CorruptTile => f.write_str("tile file is corrupt"),
		}
	}
}

impl std::error::Error for TileStoreError {}

/// Largest accepted tile edge in pixels; headers announcing more are corrupt.
const MAX_TILE_EDGE: u32 = 65_536;

/// Per-worker on-disk cache of elevation matrices, one file per owned tile.
///
/// File layout: `u32` height, `u32` width, `u32` max elevation, `u32` min
/// elevation, `f64` vertical pixel scale, `f64` horizontal pixel scale, then
/// `(height + 2·MAPFRAME) × (width + 2·MAPFRAME)` `i16` cells row-major.
/// All values little-endian.
///
/// Writes go to a temporary sibling and are renamed into place, so a
/// concurrent reader sees either the old or the new matrix, never a mix.
/// Callers serialize read/modify/write cycles per tile with the tile's own
/// mutex; concurrent plain reads are safe.
pub struct TileStore {
	dir: PathBuf,
}

impl TileStore {
	pub fn new(dir: impl Into<PathBuf>) -> Result<TileStore> {
		let dir = dir.into();
		fs::create_dir_all(&dir).with_context(|| format!("creating tile store directory {dir:?}"))?;
		Ok(TileStore { dir })
	}

	pub fn path_for(&self, job_id: u16) -> PathBuf {
		self.dir.join(format!("tile_{job_id}.dem"))
	}

	pub fn write(&self, job_id: u16, grid: &ElevationGrid) -> Result<()> {
		let path = self.path_for(job_id);
		let tmp = self.dir.join(format!("tile_{job_id}.dem.tmp"));
		{
			let mut w = BufWriter::new(
				File::create(&tmp).with_context(|| format!("creating tile file {tmp:?}"))?,
			);
			w.write_u32::<LittleEndian>(grid.height() as u32)?;
			w.write_u32::<LittleEndian>(grid.width() as u32)?;
			w.write_u32::<LittleEndian>(grid.max_elevation() as u32)?;
			w.write_u32::<LittleEndian>(grid.min_elevation() as u32)?;
			w.write_f64::<LittleEndian>(grid.vertical_scale())?;
			w.write_f64::<LittleEndian>(grid.horizontal_scale())?;
			for cell in grid.cells() {
				w.write_i16::<LittleEndian>(*cell)?;
			}
		}
		fs::rename(&tmp, &path).with_context(|| format!("replacing tile file {path:?}"))?;
		Ok(())
	}

	pub fn read(&self, job_id: u16) -> Result<ElevationGrid> {
		let path = self.path_for(job_id);
		let file = File::open(&path).map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				anyhow!(TileStoreError::MissingTile).context(format!("no tile file {path:?}"))
			} else {
				anyhow!(e).context(format!("opening tile file {path:?}"))
			}
		})?;
		let mut r = BufReader::new(file);
		Self::read_from(&mut r).with_context(|| format!("reading tile file {path:?}"))
	}

	fn read_from(r: &mut impl Read) -> Result<ElevationGrid> {
		let corrupt = || anyhow!(TileStoreError::CorruptTile);

		let height = r.read_u32::<LittleEndian>().map_err(|_| corrupt())?;
		let width = r.read_u32::<LittleEndian>().map_err(|_| corrupt())?;
		if height == 0 || width == 0 || height > MAX_TILE_EDGE || width > MAX_TILE_EDGE {
			return Err(corrupt().context(format!("implausible tile dimensions {width}x{height}")));
		}
		let max_elevation = r.read_u32::<LittleEndian>().map_err(|_| corrupt())? as i16;
		let min_elevation = r.read_u32::<LittleEndian>().map_err(|_| corrupt())? as i16;
		let vertical_scale = r.read_f64::<LittleEndian>().map_err(|_| corrupt())?;
		let horizontal_scale = r.read_f64::<LittleEndian>().map_err(|_| corrupt())?;

		let mut grid = ElevationGrid::new_zeroed(
			width as usize,
			height as usize,
			vertical_scale,
			horizontal_scale,
		);
		grid.min_elevation = min_elevation;
		grid.max_elevation = max_elevation;
		let full = (width as usize + 2 * MAPFRAME) * (height as usize + 2 * MAPFRAME);
		for i in 0..full {
			grid.cells[i] = r.read_i16::<LittleEndian>().map_err(|_| corrupt())?;
		}
		Ok(grid)
	}
}
