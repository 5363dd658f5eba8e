use crate::matrix::ElevationGrid;

/// Flags cells that look like standing water.
///
/// Two passes over the full matrix:
/// 1. a cell whose eight neighbors all share its elevation is water;
/// 2. a cell that shares its elevation with a neighboring water cell is
///    water too, which grows each flat patch out to its shoreline.
pub fn detect_water(grid: &ElevationGrid) -> Vec<bool> {
	let full_width = grid.full_width();
	let full_height = grid.full_height();
	let mut water = vec![false; full_width * full_height];

	for row in 1..full_height - 1 {
		for col in 1..full_width - 1 {
			let e = grid.get(row, col);
			let flat = neighbors(row, col)
				.into_iter()
				.all(|(r, c)| grid.get(r, c) == e);
			if flat {
				water[row * full_width + col] = true;
			}
		}
	}

	for row in 1..full_height - 1 {
		for col in 1..full_width - 1 {
			let e = grid.get(row, col);
			let adjacent = neighbors(row, col)
				.into_iter()
				.any(|(r, c)| water[r * full_width + c] && grid.get(r, c) == e);
			if adjacent {
				water[row * full_width + col] = true;
			}
		}
	}

	water
}

fn neighbors(row: usize, col: usize) -> [(usize, usize); 8] {
	[
		(row - 1, col - 1),
		(row - 1, col),
		(row - 1, col + 1),
		(row, col - 1),
		(row, col + 1),
		(row + 1, col - 1),
		(row + 1, col),
		(row + 1, col + 1),
	]
}
