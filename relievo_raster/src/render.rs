use crate::kernels::{ShadeGrid, colorize, detect_water, relief_shade};
use crate::matrix::ElevationGrid;
use crate::scale::scale_shade;
use anyhow::{Result, anyhow};
use image::RgbaImage;
use relievo_core::{ColorScheme, ErrorKind, Quadrant};
use std::path::Path;

/// Per-job render settings, identical on every worker.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
	/// Run water detection and paint water cells with the scheme's water
	/// color.
	pub water: bool,
	/// Apply relief shading with light from this direction.
	pub relief: Option<Quadrant>,
	/// Output scale factor; 1.0 renders at source resolution.
	pub scale: f64,
}

impl Default for RenderOptions {
	fn default() -> Self {
		RenderOptions {
			water: false,
			relief: None,
			scale: 1.0,
		}
	}
}

/// Renders one tile to pixels: water detect, relief shade, scale, colorize.
///
/// The kernels run before scaling so they see full-resolution neighborhoods,
/// then the derived layers are scaled along with the elevations. The color
/// scheme must already be absolute.
pub fn render_tile(grid: &ElevationGrid, scheme: &ColorScheme, options: &RenderOptions) -> RgbaImage {
	let mut shade = ShadeGrid::new(grid);
	if options.water && scheme.show_water {
		shade.water = detect_water(grid);
	}
	if let Some(light) = options.relief {
		shade.relief = relief_shade(grid, light);
	}
	if options.scale != 1.0 {
		shade = scale_shade(&shade, options.scale);
	}
	colorize(&shade, scheme)
}

/// Writes a rendered tile as a PNG file.
pub fn write_png(image: &RgbaImage, path: &Path) -> Result<()> {
	image
		.save(path)
		.map_err(|e| anyhow!(ErrorKind::PngEncodeFailure).context(format!("writing {path:?}: {e}")))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn flat_grid() -> ElevationGrid {
		ElevationGrid::from_source_cells(4, 4, 1.0, 1.0, &[500i16; 16]).unwrap()
	}

	fn scheme() -> ColorScheme {
		ColorScheme::parse("Absolute\n0 0 0 0\n1000 200 200 200\n", false).unwrap()
	}

	#[test]
	fn test_render_plain() {
		let image = render_tile(&flat_grid(), &scheme(), &RenderOptions::default());
		assert_eq!(image.dimensions(), (4, 4));
		assert_eq!(image.get_pixel(0, 0), &image::Rgba([100, 100, 100, 255]));
	}

	#[test]
	fn test_render_scaled() {
		let options = RenderOptions {
			scale: 0.5,
			..RenderOptions::default()
		};
		let image = render_tile(&flat_grid(), &scheme(), &options);
		assert_eq!(image.dimensions(), (2, 2));
	}

	#[test]
	fn test_write_png_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("tile.png");
		let image = render_tile(&flat_grid(), &scheme(), &RenderOptions::default());
		write_png(&image, &path).unwrap();

		let loaded = image::open(&path).unwrap().to_rgba8();
		assert_eq!(loaded, image);
	}

	#[test]
	fn test_write_png_bad_path() {
		let image = RgbaImage::new(1, 1);
		let err = write_png(&image, Path::new("/nonexistent-dir/x.png")).unwrap_err();
		assert_eq!(
			relievo_core::error::exit_code(&err),
			ErrorKind::PngEncodeFailure.exit_code()
		);
	}
}
