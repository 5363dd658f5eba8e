//! Stitches rendered tiles into the final image.
//!
//! Tile edges are assumed to line up along latitude/longitude grid lines
//! (rectilinear projections only). The combined pixel extents are found by
//! walking the tile edges; the output is then produced row by row, reading
//! one decoded row from every tile that intersects the current row and
//! filling gaps with transparent pixels, so no more than one row strip of
//! pixels is ever held in memory.

use crate::catalog::FinalTile;
use anyhow::{Context, Result, anyhow, ensure};
use itertools::Itertools;
use relievo_core::{ErrorKind, STITCH_EPSILON, progress::UiSink};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Computes the combined extents, assigns each tile its pixel rectangle and
/// writes the final PNG.
pub fn stitch(mut tiles: Vec<FinalTile>, out_path: &Path, ui: &dyn UiSink) -> Result<()> {
	ensure!(
		!tiles.is_empty(),
		anyhow!(ErrorKind::NoMoreTiles).context("no tiles to stitch")
	);

	let (img_width, img_height) = assign_pixel_extents(&mut tiles)?;
	log::info!("stitching {} tiles into {img_width}x{img_height} px", tiles.len());

	let file = File::create(out_path)
		.map_err(|e| anyhow!(ErrorKind::PngEncodeFailure).context(format!("creating {out_path:?}: {e}")))?;
	let mut encoder = png::Encoder::new(BufWriter::new(file), img_width as u32, img_height as u32);
	encoder.set_color(png::ColorType::Rgba);
	encoder.set_depth(png::BitDepth::Eight);
	let mut writer = encoder
		.write_header()
		.map_err(|e| anyhow!(ErrorKind::PngEncodeFailure).context(format!("{e}")))?;
	let mut stream = writer
		.stream_writer()
		.map_err(|e| anyhow!(ErrorKind::PngEncodeFailure).context(format!("{e}")))?;

	// tiles in reading order; readers open at a tile's first row and close
	// after its last
	let order: Vec<usize> = (0..tiles.len()).sorted_by_key(|i| tiles[*i].left_col).collect();
	let mut readers: HashMap<usize, png::Reader<BufReader<File>>> = HashMap::new();
	let mut row_buffer = vec![0u8; img_width * 4];

	for y in 0..img_height {
		row_buffer.fill(0);
		for &i in &order {
			let tile = &tiles[i];
			if y < tile.top_row || y > tile.bottom_row {
				continue;
			}
			if !readers.contains_key(&i) {
				readers.insert(i, open_tile(tile)?);
			}
			let reader = readers.get_mut(&i).unwrap();
			let row = reader
				.next_row()
				.with_context(|| format!("decoding {:?}", tile.path))?
				.with_context(|| format!("{:?} ended before row {y}", tile.path))?;
			let start = tile.left_col * 4;
			row_buffer[start..start + row.data().len()].copy_from_slice(row.data());
		}
		stream
			.write_all(&row_buffer)
			.map_err(|e| anyhow!(ErrorKind::PngEncodeFailure).context(format!("writing row {y}: {e}")))?;

		for &i in &order {
			if tiles[i].bottom_row == y {
				readers.remove(&i);
			}
		}
		ui.stitch_progress((y + 1) as u64, img_height as u64);
	}
	stream
		.finish()
		.map_err(|e| anyhow!(ErrorKind::PngEncodeFailure).context(format!("{e}")))?;
	Ok(())
}

fn open_tile(tile: &FinalTile) -> Result<png::Reader<BufReader<File>>> {
	let file = File::open(&tile.path).with_context(|| format!("opening {:?}", tile.path))?;
	let reader = png::Decoder::new(BufReader::new(file))
		.read_info()
		.with_context(|| format!("decoding {:?}", tile.path))?;
	let info = reader.info();
	ensure!(
		info.color_type == png::ColorType::Rgba && info.bit_depth == png::BitDepth::Eight,
		"{:?} is not 8-bit RGBA",
		tile.path
	);
	ensure!(
		(info.width, info.height) == (tile.width, tile.height),
		"{:?} is {}x{}, catalog says {}x{}",
		tile.path,
		info.width,
		info.height,
		tile.width,
		tile.height
	);
	Ok(reader)
}

/// Walks the tile edges to find the combined pixel size, then walks again to
/// pin each tile's pixel rectangle. Tiles may leave gaps; a gap's pixel span
/// is estimated from the pixel scale of the tile beyond it.
fn assign_pixel_extents(tiles: &mut [FinalTile]) -> Result<(usize, usize)> {
	let mut west = f64::MAX;
	let mut south = f64::MAX;
	let mut east = f64::MIN;
	let mut north = f64::MIN;
	for tile in tiles.iter() {
		west = west.min(tile.bbox.west);
		south = south.min(tile.bbox.south);
		east = east.max(tile.bbox.east);
		north = north.max(tile.bbox.north);
	}

	// combined width: walk west → east from tile edge to tile edge
	let img_width = walk_span(tiles, west, east, |tile| {
		(tile.bbox.west, tile.bbox.east, tile.width as usize)
	})?;
	// combined height: walk south → north
	let img_height = walk_span(tiles, south, north, |tile| {
		(tile.bbox.south, tile.bbox.north, tile.height as usize)
	})?;

	// rows: walk north → south
	let mut coord = north;
	let mut pixel = 0usize;
	while pixel < img_height {
		let mut step: Option<(usize, f64)> = None;
		for tile in tiles.iter_mut() {
			if (tile.bbox.north - coord).abs() <= STITCH_EPSILON {
				tile.top_row = pixel;
				tile.bottom_row = pixel + tile.height as usize - 1;
				step = Some((tile.height as usize, tile.bbox.south));
			}
		}
		let Some((height, next)) = step.or_else(|| gap_step_down(tiles, coord)) else {
			break;
		};
		pixel += height;
		coord = next;
	}

	// columns: walk west → east
	let mut coord = west;
	let mut pixel = 0usize;
	while pixel < img_width {
		let mut step: Option<(usize, f64)> = None;
		for tile in tiles.iter_mut() {
			if (tile.bbox.west - coord).abs() <= STITCH_EPSILON {
				tile.left_col = pixel;
				tile.right_col = pixel + tile.width as usize - 1;
				step = Some((tile.width as usize, tile.bbox.east));
			}
		}
		let Some((width, next)) = step.or_else(|| gap_step_right(tiles, coord)) else {
			break;
		};
		pixel += width;
		coord = next;
	}

	Ok((img_width, img_height))
}

/// Accumulates the pixel span of one axis by hopping from each tile's lower
/// edge to its upper edge, bridging gaps with an estimated pixel count.
fn walk_span(
	tiles: &[FinalTile],
	lower_limit: f64,
	upper_limit: f64,
	axis: impl Fn(&FinalTile) -> (f64, f64, usize),
) -> Result<usize> {
	let mut coord = lower_limit;
	let mut span = 0usize;
	while coord < upper_limit - STITCH_EPSILON {
		// a tile whose lower edge sits at the current coordinate
		let tile_step = tiles
			.iter()
			.map(&axis)
			.find(|(lower, _, _)| (lower - coord).abs() <= STITCH_EPSILON);
		if let Some((_, upper, pixels)) = tile_step {
			span += pixels;
			coord = upper;
			continue;
		}
		// gap: hop to the next tile edge, estimating pixels per degree from
		// that tile
		let next = tiles
			.iter()
			.map(&axis)
			.filter(|(lower, _, _)| *lower > coord + STITCH_EPSILON)
			.min_by(|a, b| a.0.total_cmp(&b.0));
		let Some((lower, upper, pixels)) = next else {
			break;
		};
		let per_degree = pixels as f64 / (upper - lower);
		span += ((lower - coord) * per_degree).round() as usize;
		coord = lower;
	}
	ensure!(span > 0, "tiles cover no area");
	Ok(span)
}

/// Pixel height and next latitude when no tile's north edge touches the
/// current walking coordinate (a horizontal band of missing tiles).
fn gap_step_down(tiles: &[FinalTile], coord: f64) -> Option<(usize, f64)> {
	let next = tiles
		.iter()
		.filter(|tile| tile.bbox.north < coord - STITCH_EPSILON)
		.max_by(|a, b| a.bbox.north.total_cmp(&b.bbox.north))?;
	let per_degree = next.height as f64 / (next.bbox.north - next.bbox.south);
	let pixels = ((coord - next.bbox.north) * per_degree).round() as usize;
	Some((pixels, next.bbox.north))
}

/// Pixel width and next longitude when no tile's west edge touches the
/// current walking coordinate (a vertical band of missing tiles).
fn gap_step_right(tiles: &[FinalTile], coord: f64) -> Option<(usize, f64)> {
	let next = tiles
		.iter()
		.filter(|tile| tile.bbox.west > coord + STITCH_EPSILON)
		.min_by(|a, b| a.bbox.west.total_cmp(&b.bbox.west))?;
	let per_degree = next.width as f64 / (next.bbox.east - next.bbox.west);
	let pixels = ((next.bbox.west - coord) * per_degree).round() as usize;
	Some((pixels, next.bbox.west))
}
