//! Pixel kernels: pure functions from elevation neighborhoods to pixels.
//!
//! All kernels operate on the full halo-carrying matrix so that tile edges
//! get the same treatment as interior pixels; only colorize restricts its
//! output to the source region.

mod colorize;
mod relief;
mod water;

pub use colorize::colorize;
pub use relief::relief_shade;
pub use water::detect_water;

use crate::matrix::ElevationGrid;
use relievo_core::MAPFRAME;

/// Per-cell render state: elevation plus the water and relief layers the
/// kernels derive from it. Dimensions follow [`ElevationGrid`]: `width` and
/// `height` are source pixels, the vectors cover the full matrix.
pub struct ShadeGrid {
	pub width: usize,
	pub height: usize,
	pub elevation: Vec<i16>,
	pub water: Vec<bool>,
	pub relief: Vec<i16>,
}

impl ShadeGrid {
	/// Wraps an elevation grid with empty water/relief layers.
	pub fn new(grid: &ElevationGrid) -> ShadeGrid {
		let cells = grid.cells().len();
		ShadeGrid {
			width: grid.width(),
			height: grid.height(),
			elevation: grid.cells().to_vec(),
			water: vec![false; cells],
			relief: vec![0; cells],
		}
	}

	pub fn full_width(&self) -> usize {
		self.width + 2 * MAPFRAME
	}

	pub fn full_height(&self) -> usize {
		self.height + 2 * MAPFRAME
	}

	/// Flat index of matrix coordinates.
	pub fn idx(&self, row: usize, col: usize) -> usize {
		row * self.full_width() + col
	}
}
