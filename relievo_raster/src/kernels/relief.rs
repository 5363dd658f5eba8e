use crate::matrix::ElevationGrid;
use relievo_core::{MAPFRAME, Quadrant};

/// How far downhill a single cell can cast shade, in cells.
const SHADE_REACH: usize = 5;

/// Computes relief shade levels for light arriving from `light`.
///
/// From every cell, walk up to [`SHADE_REACH`] cells away from the light
/// source; each consecutive strictly-descending step puts the stepped-on
/// cell one level deeper into shade. The walk works on the full matrix
/// (plus a small margin beyond the source region) so shading crosses tile
/// borders seamlessly once the halo is filled.
pub fn relief_shade(grid: &ElevationGrid, light: Quadrant) -> Vec<i16> {
	let full_width = grid.full_width();
	let mut relief = vec![0i16; full_width * grid.full_height()];
	let (dr, dc) = shade_direction(light);

	let row_range = MAPFRAME - SHADE_REACH..grid.height() + MAPFRAME + SHADE_REACH;
	let col_range = MAPFRAME - SHADE_REACH..grid.width() + MAPFRAME + SHADE_REACH;
	for row in row_range {
		for col in col_range.clone() {
			let mut e = grid.get(row, col);
			for step in 1..=SHADE_REACH as isize {
				let r = (row as isize + dr * step) as usize;
				let c = (col as isize + dc * step) as usize;
				if grid.get(r, c) < e {
					relief[r * full_width + c] += 1;
					e = grid.get(r, c);
				} else {
					break;
				}
			}
		}
	}

	relief
}

/// Unit step of the shadow cast by light from the given direction, in
/// (row, col) deltas. Light from the north casts shade southwards (row +1).
fn shade_direction(light: Quadrant) -> (isize, isize) {
	match light {
		Quadrant::North => (1, 0),
		Quadrant::South => (-1, 0),
		Quadrant::East => (0, -1),
		Quadrant::West => (0, 1),
		Quadrant::NorthEast => (1, -1),
		Quadrant::NorthWest => (1, 1),
		Quadrant::SouthEast => (-1, -1),
		Quadrant::SouthWest => (-1, 1),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	/// 8x8 tile with a single peak falling away southwards.
	fn sloped_grid() -> ElevationGrid {
		let mut source = vec![0i16; 64];
		for r in 0..8 {
			for c in 0..8 {
				source[r * 8 + c] = 800 - (r as i16) * 100;
			}
		}
		ElevationGrid::from_source_cells(8, 8, 1.0, 1.0, &source).unwrap()
	}

	#[test]
	fn test_north_light_shades_south_slope() {
		let grid = sloped_grid();
		let relief = relief_shade(&grid, Quadrant::North);
		let idx = |r: usize, c: usize| (MAPFRAME + r) * grid.full_width() + MAPFRAME + c;
		// every descending row is stepped on from several rows above it
		assert!(relief[idx(3, 4)] > 0);
		assert!(relief[idx(5, 4)] >= relief[idx(1, 4)]);
	}

	#[test]
	fn test_south_light_leaves_south_slope_lit() {
		let grid = sloped_grid();
		let relief = relief_shade(&grid, Quadrant::South);
		let idx = |r: usize, c: usize| (MAPFRAME + r) * grid.full_width() + MAPFRAME + c;
		// walking northwards climbs, so the slope itself picks up no shade
		for r in 1..7 {
			assert_eq!(relief[idx(r, 4)], 0, "row {r}");
		}
	}

	#[test]
	fn test_flat_ground_is_unshaded() {
		let grid = ElevationGrid::from_source_cells(8, 8, 1.0, 1.0, &[300i16; 64]).unwrap();
		for light in Quadrant::ALL {
			let relief = relief_shade(&grid, light);
			let idx = |r: usize, c: usize| (MAPFRAME + r) * grid.full_width() + MAPFRAME + c;
			for r in 0..8 {
				for c in 0..8 {
					assert_eq!(relief[idx(r, c)], 0);
				}
			}
		}
	}
}
