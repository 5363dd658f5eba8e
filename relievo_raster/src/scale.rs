use crate::kernels::ShadeGrid;
use relievo_core::{MAPFRAME, NODATA};

/// Box-average downsampling of a tile and its derived layers.
///
/// Each output pixel averages the box of source pixels it covers, skipping
/// [`NODATA`] cells. The water flag goes to the majority of the box and the
/// relief level to the box average, so shading survives scaling. A box with
/// nothing but [`NODATA`] stays [`NODATA`].
pub fn scale_shade(shade: &ShadeGrid, factor: f64) -> ShadeGrid {
	let new_height = ((shade.height as f64 * factor) as usize).max(1);
	let new_width = ((shade.width as f64 * factor) as usize).max(1);
	let step_vertical = shade.height as f64 / new_height as f64;
	let step_horizontal = shade.width as f64 / new_width as f64;
	let box_rows = (step_vertical as usize).max(1);
	let box_cols = (step_horizontal as usize).max(1);

	let full_cells = (new_width + 2 * MAPFRAME) * (new_height + 2 * MAPFRAME);
	let mut out = ShadeGrid {
		width: new_width,
		height: new_height,
		elevation: vec![0; full_cells],
		water: vec![false; full_cells],
		relief: vec![0; full_cells],
	};

	for r in 0..new_height {
		for c in 0..new_width {
			let first_row = box_start(r, step_vertical, shade.full_height(), box_rows);
			let first_col = box_start(c, step_horizontal, shade.full_width(), box_cols);

			let mut sum: i64 = 0;
			let mut count: i64 = 0;
			let mut water_count: i64 = 0;
			let mut relief_sum: i64 = 0;
			for box_row in 0..box_rows {
				for box_col in 0..box_cols {
					let i = shade.idx(first_row + box_row, first_col + box_col);
					let elevation = shade.elevation[i];
					if elevation != NODATA {
						sum += i64::from(elevation);
						count += 1;
						water_count += i64::from(shade.water[i]);
						relief_sum += i64::from(shade.relief[i]);
					}
				}
			}

			let i = out.idx(MAPFRAME + r, MAPFRAME + c);
			if count == 0 {
				out.elevation[i] = NODATA;
			} else {
				out.elevation[i] = (sum / count) as i16;
				out.water[i] = water_count >= count / 2 && water_count > 0;
				out.relief[i] = (relief_sum / count) as i16;
			}
		}
	}

	out
}

/// First matrix row/column of the source box for output index `i`, clamped
/// so the whole box stays inside the matrix.
fn box_start(i: usize, step: f64, full: usize, box_len: usize) -> usize {
	let centered = ((i as f64 * step) - (step - 1.0) / 2.0 + MAPFRAME as f64).round();
	let start = centered.max(0.0) as usize;
	start.min(full - box_len)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::matrix::ElevationGrid;

	fn shade_for(cells: &[i16], width: usize, height: usize) -> ShadeGrid {
		let grid = ElevationGrid::from_source_cells(width, height, 1.0, 1.0, cells).unwrap();
		ShadeGrid::new(&grid)
	}

	#[test]
	fn test_half_scale_averages_boxes() {
		#[rustfmt::skip]
		let cells = [
			10, 10, 20, 20,
			10, 10, 20, 20,
			30, 30, 40, 40,
			30, 30, 40, 40,
		];
		let shade = shade_for(&cells, 4, 4);
		let scaled = scale_shade(&shade, 0.5);
		assert_eq!(scaled.width, 2);
		assert_eq!(scaled.height, 2);
		let f = MAPFRAME;
		assert_eq!(scaled.elevation[scaled.idx(f, f)], 10);
		assert_eq!(scaled.elevation[scaled.idx(f, f + 1)], 20);
		assert_eq!(scaled.elevation[scaled.idx(f + 1, f)], 30);
		assert_eq!(scaled.elevation[scaled.idx(f + 1, f + 1)], 40);
	}

	#[test]
	fn test_nodata_is_skipped() {
		let cells = [100, NODATA, 100, 100];
		let shade = shade_for(&cells, 2, 2);
		let scaled = scale_shade(&shade, 0.5);
		assert_eq!(scaled.width, 1);
		assert_eq!(scaled.elevation[scaled.idx(MAPFRAME, MAPFRAME)], 100);
	}

	#[test]
	fn test_all_nodata_stays_nodata() {
		let shade = shade_for(&[NODATA; 4], 2, 2);
		let scaled = scale_shade(&shade, 0.5);
		assert_eq!(scaled.elevation[scaled.idx(MAPFRAME, MAPFRAME)], NODATA);
	}

	#[test]
	fn test_water_majority_vote() {
		let mut shade = shade_for(&[5; 4], 2, 2);
		let f = MAPFRAME;
		for (r, c) in [(f, f), (f, f + 1), (f + 1, f)] {
			let i = shade.idx(r, c);
			shade.water[i] = true;
		}
		let scaled = scale_shade(&shade, 0.5);
		assert!(scaled.water[scaled.idx(f, f)]);
	}

	#[test]
	fn test_unit_scale_keeps_dimensions() {
		let shade = shade_for(&[1, 2, 3, 4], 2, 2);
		let scaled = scale_shade(&shade, 1.0);
		assert_eq!((scaled.width, scaled.height), (2, 2));
		let f = MAPFRAME;
		assert_eq!(scaled.elevation[scaled.idx(f, f)], 1);
		assert_eq!(scaled.elevation[scaled.idx(f + 1, f + 1)], 4);
	}
}
