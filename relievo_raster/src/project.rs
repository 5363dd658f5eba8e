use crate::matrix::ElevationGrid;
use relievo_core::{GeoBBox, MAPFRAME, Projection};

/// Latitudes beyond this are pinned before the Mercator transform.
const MAX_MERCATOR_LAT: f64 = 85.05112877980659;

/// Resamples a tile into the requested projection.
///
/// Equirectangular input passes through unchanged. For Mercator, rows are
/// redistributed so that equal pixel steps cover equal Mercator-y steps,
/// sampling the nearest source row; columns are untouched because the
/// transform is purely vertical. The resample covers the full matrix, halo
/// included, so edge data stays aligned with its tile.
pub fn apply_projection(grid: &ElevationGrid, bbox: &GeoBBox, projection: Projection) -> ElevationGrid {
	match projection {
		Projection::Equirectangular => grid.clone(),
		Projection::Mercator => mercator_rows(grid, bbox),
	}
}

fn mercator_rows(grid: &ElevationGrid, bbox: &GeoBBox) -> ElevationGrid {
	let full_height = grid.full_height();
	let full_width = grid.full_width();
	let step = grid.vertical_scale();

	// latitude of the first matrix row (halo extends beyond the bbox)
	let top_lat = bbox.north + MAPFRAME as f64 * step;
	let bottom_lat = top_lat - (full_height - 1) as f64 * step;
	let y_top = mercator_y(top_lat);
	let y_bottom = mercator_y(bottom_lat);

	let mut out = grid.clone();
	for row in 0..full_height {
		let y = y_top + (y_bottom - y_top) * row as f64 / (full_height - 1) as f64;
		let lat = inverse_mercator_y(y);
		let source_row = ((top_lat - lat) / step).round().clamp(0.0, (full_height - 1) as f64) as usize;
		for col in 0..full_width {
			out.set(row, col, grid.get(source_row, col));
		}
	}
	out
}

fn mercator_y(lat: f64) -> f64 {
	let phi = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
	(std::f64::consts::FRAC_PI_4 + phi / 2.0).tan().ln()
}

fn inverse_mercator_y(y: f64) -> f64 {
	(2.0 * y.exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees()
}
