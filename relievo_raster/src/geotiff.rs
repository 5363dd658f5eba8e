use crate::matrix::ElevationGrid;
use anyhow::{Context, Result, anyhow, ensure};
use relievo_core::{ErrorKind, GeoBBox};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

/// A decoded elevation raster with its georeferencing.
pub struct DecodedTile {
	pub grid: ElevationGrid,
	pub bbox: GeoBBox,
}

/// Decodes a GeoTIFF elevation raster.
///
/// The pixel scale comes from the `ModelPixelScale` tag (degrees per pixel)
/// and the top-left corner from `ModelTiepoint`; together they give the
/// tile's bounding box. The corner coordinates span pixel centers, matching
/// the georeferencing convention of the SRTM-style tiles this renderer
/// consumes.
pub fn decode(path: &Path) -> Result<DecodedTile> {
	let file = File::open(path)
		.map_err(|e| anyhow!(ErrorKind::MissingFile).context(format!("opening {path:?}: {e}")))?;
	let mut decoder = Decoder::new(BufReader::new(file))
		.map_err(|e| raster_err(path, &format!("not a TIFF: {e}")))?;

	let (width, height) = decoder
		.dimensions()
		.map_err(|e| raster_err(path, &format!("missing dimensions: {e}")))?;
	ensure!(width > 0 && height > 0, raster_err(path, "empty raster"));

	let pixel_scale = decoder
		.get_tag_f64_vec(Tag::ModelPixelScaleTag)
		.map_err(|e| raster_err(path, &format!("missing ModelPixelScale tag: {e}")))?;
	ensure!(
		pixel_scale.len() >= 2,
		raster_err(path, "short ModelPixelScale tag")
	);
	let tiepoint = decoder
		.get_tag_f64_vec(Tag::ModelTiepointTag)
		.map_err(|e| raster_err(path, &format!("missing ModelTiepoint tag: {e}")))?;
	ensure!(tiepoint.len() >= 6, raster_err(path, "short ModelTiepoint tag"));

	let horizontal_scale = pixel_scale[0];
	let vertical_scale = pixel_scale[1];
	let left = tiepoint[3] - tiepoint[0] * horizontal_scale;
	let top = tiepoint[4] + tiepoint[1] * vertical_scale;
	let right = left + f64::from(width - 1) * horizontal_scale;
	let bottom = top - f64::from(height - 1) * vertical_scale;

	let cells: Vec<i16> = match decoder
		.read_image()
		.map_err(|e| raster_err(path, &format!("reading scanlines: {e}")))?
	{
		DecodingResult::I16(cells) => cells,
		DecodingResult::U16(cells) => cells.into_iter().map(|v| v as i16).collect(),
		DecodingResult::I8(cells) => cells.into_iter().map(i16::from).collect(),
		DecodingResult::U8(cells) => cells.into_iter().map(i16::from).collect(),
		_ => return Err(raster_err(path, "unsupported sample format")),
	};

	let grid = ElevationGrid::from_source_cells(
		width as usize,
		height as usize,
		vertical_scale,
		horizontal_scale,
		&cells,
	)
	.map_err(|e| raster_err(path, &format!("{e}")))?;
	let bbox = GeoBBox::new(left, bottom, right, top)
		.with_context(|| format!("georeferencing of {path:?} is out of range"))?;

	log::info!(
		"decoded {path:?}: {width}x{height} px, {} .. {} m, {bbox:?}",
		grid.min_elevation(),
		grid.max_elevation()
	);
	Ok(DecodedTile { grid, bbox })
}

fn raster_err(path: &Path, message: &str) -> anyhow::Error {
	anyhow!(ErrorKind::RasterReadFailure).context(format!("{path:?}: {message}"))
}
