use anyhow::{Result, ensure};
use relievo_core::{MAPFRAME, Quadrant};
use std::ops::Range;

/// A tile's elevation matrix, stored with a [`MAPFRAME`]-pixel halo on every
/// side.
///
/// The matrix is `(height + 2·MAPFRAME) × (width + 2·MAPFRAME)` signed 16-bit
/// cells, row-major. The cell at matrix position `(MAPFRAME + r, MAPFRAME + c)`
/// corresponds to the source pixel `(r, c)`; the surrounding border holds
/// neighbors' edge data (or zeros where no neighbor exists).
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationGrid {
	pub(crate) width: usize,
	pub(crate) height: usize,
	pub(crate) min_elevation: i16,
	pub(crate) max_elevation: i16,
	pub(crate) vertical_scale: f64,
	pub(crate) horizontal_scale: f64,
	pub(crate) cells: Vec<i16>,
}

impl ElevationGrid {
	/// A zero-filled grid (halo included).
	pub fn new_zeroed(width: usize, height: usize, vertical_scale: f64, horizontal_scale: f64) -> ElevationGrid {
		ElevationGrid {
			width,
			height,
			min_elevation: 0,
			max_elevation: 0,
			vertical_scale,
			horizontal_scale,
			cells: vec![0; (width + 2 * MAPFRAME) * (height + 2 * MAPFRAME)],
		}
	}

	/// Builds a grid from bare source cells (no halo), computing the
	/// elevation extremes. The halo starts out zeroed.
	pub fn from_source_cells(
		width: usize,
		height: usize,
		vertical_scale: f64,
		horizontal_scale: f64,
		source: &[i16],
	) -> Result<ElevationGrid> {
		ensure!(
			source.len() == width * height,
			"expected {} cells, found {}",
			width * height,
			source.len()
		);
		let mut grid = ElevationGrid::new_zeroed(width, height, vertical_scale, horizontal_scale);
		let mut min = i16::MAX;
		let mut max = i16::MIN;
		for r in 0..height {
			for c in 0..width {
				let value = source[r * width + c];
				grid.set(MAPFRAME + r, MAPFRAME + c, value);
				min = min.min(value);
				max = max.max(value);
			}
		}
		grid.min_elevation = min;
		grid.max_elevation = max;
		Ok(grid)
	}

	pub fn width(&self) -> usize {
		self.width
	}

	pub fn height(&self) -> usize {
		self.height
	}

	/// Matrix width including both halos.
	pub fn full_width(&self) -> usize {
		self.width + 2 * MAPFRAME
	}

	/// Matrix height including both halos.
	pub fn full_height(&self) -> usize {
		self.height + 2 * MAPFRAME
	}

	pub fn min_elevation(&self) -> i16 {
		self.min_elevation
	}

	pub fn max_elevation(&self) -> i16 {
		self.max_elevation
	}

	/// Degrees of latitude per source pixel.
	pub fn vertical_scale(&self) -> f64 {
		self.vertical_scale
	}

	/// Degrees of longitude per source pixel.
	pub fn horizontal_scale(&self) -> f64 {
		self.horizontal_scale
	}

	/// Cell at matrix coordinates (halo included).
	pub fn get(&self, row: usize, col: usize) -> i16 {
		self.cells[row * self.full_width() + col]
	}

	pub fn set(&mut self, row: usize, col: usize, value: i16) {
		let w = self.full_width();
		self.cells[row * w + col] = value;
	}

	/// Cell at source coordinates.
	pub fn source_get(&self, row: usize, col: usize) -> i16 {
		self.get(MAPFRAME + row, MAPFRAME + col)
	}

	/// The whole matrix, row-major.
	pub fn cells(&self) -> &[i16] {
		&self.cells
	}

	/// Matrix rows/columns of the `MAPFRAME`-thick *source-edge* slice served
	/// for `quadrant`. This is the strip of real data a neighbor copies into
	/// the mirror quadrant of its own halo.
	fn slice_rect(&self, quadrant: Quadrant) -> (Range<usize>, Range<usize>) {
		let f = MAPFRAME;
		let (w, h) = (self.width, self.height);
		match quadrant {
			Quadrant::North => (f..2 * f, f..f + w),
			Quadrant::South => (h..h + f, f..f + w),
			Quadrant::East => (f..f + h, w..w + f),
			Quadrant::West => (f..f + h, f..2 * f),
			Quadrant::NorthEast => (f..2 * f, w..w + f),
			Quadrant::NorthWest => (f..2 * f, f..2 * f),
			Quadrant::SouthEast => (h..h + f, w..w + f),
			Quadrant::SouthWest => (h..h + f, f..2 * f),
		}
	}

	/// Matrix rows/columns of this tile's own halo region for `quadrant`.
	fn halo_rect(&self, quadrant: Quadrant) -> (Range<usize>, Range<usize>) {
		let f = MAPFRAME;
		let (w, h) = (self.width, self.height);
		match quadrant {
			Quadrant::North => (0..f, f..f + w),
			Quadrant::South => (f + h..2 * f + h, f..f + w),
			Quadrant::East => (f..f + h, f + w..2 * f + w),
			Quadrant::West => (f..f + h, 0..f),
			Quadrant::NorthEast => (0..f, f + w..2 * f + w),
			Quadrant::NorthWest => (0..f, 0..f),
			Quadrant::SouthEast => (f + h..2 * f + h, f + w..2 * f + w),
			Quadrant::SouthWest => (f + h..2 * f + h, 0..f),
		}
	}

	/// Number of cells in the slice served for `quadrant`.
	pub fn slice_len(&self, quadrant: Quadrant) -> usize {
		let (rows, cols) = self.slice_rect(quadrant);
		rows.len() * cols.len()
	}

	/// Copies out the source-edge slice for `quadrant`, row-major.
	pub fn edge_slice(&self, quadrant: Quadrant) -> Vec<i16> {
		let (rows, cols) = self.slice_rect(quadrant);
		let mut out = Vec::with_capacity(rows.len() * cols.len());
		for row in rows {
			for col in cols.clone() {
				out.push(self.get(row, col));
			}
		}
		out
	}

	/// Writes a neighbor's edge cells into this tile's own `quadrant` halo.
	///
	/// The cell count must match the halo region exactly, which holds
	/// whenever the two tiles have the same source dimensions along the
	/// shared edge.
	pub fn apply_halo(&mut self, quadrant: Quadrant, cells: &[i16]) -> Result<()> {
		let (rows, cols) = self.halo_rect(quadrant);
		ensure!(
			cells.len() == rows.len() * cols.len(),
			"halo {quadrant:?} needs {} cells, got {}",
			rows.len() * cols.len(),
			cells.len()
		);
		let mut source = cells.iter();
		for row in rows {
			for col in cols.clone() {
				self.set(row, col, *source.next().unwrap());
			}
		}
		Ok(())
	}
}
