use super::ShadeGrid;
use image::{Rgba, RgbaImage};
use relievo_core::{ColorScheme, MAPFRAME};

/// Strength of relief darkening, in 8-bit channel units per shade level.
const SHADE_STEP: f64 = 16.0;

/// Colors the source region of a tile.
///
/// Water cells take the scheme's flat water color. Everything else samples
/// the elevation gradient, then darkens by [`SHADE_STEP`] per relief level,
/// clamped at black. The scheme must be absolute by the time this runs.
pub fn colorize(shade: &ShadeGrid, scheme: &ColorScheme) -> RgbaImage {
	let mut image = RgbaImage::new(shade.width as u32, shade.height as u32);
	for r in 0..shade.height {
		for c in 0..shade.width {
			let i = shade.idx(MAPFRAME + r, MAPFRAME + c);
			let pixel = if shade.water[i] {
				match &scheme.water {
					Some(stop) => Rgba([stop.color.r, stop.color.g, stop.color.b, 255]),
					None => Rgba([0, 0, 0, 255]),
				}
			} else {
				let (red, green, blue, alpha) = scheme.color_at(shade.elevation[i]);
				let dark = f64::from(shade.relief[i]) * SHADE_STEP;
				Rgba([
					channel(red - dark),
					channel(green - dark),
					channel(blue - dark),
					channel(alpha * 255.0),
				])
			};
			image.put_pixel(c as u32, r as u32, pixel);
		}
	}
	image
}

fn channel(value: f64) -> u8 {
	value.clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::matrix::ElevationGrid;
	use relievo_core::Quadrant;

	fn shade_for(cells: &[i16], width: usize, height: usize) -> ShadeGrid {
		let grid = ElevationGrid::from_source_cells(width, height, 1.0, 1.0, cells).unwrap();
		ShadeGrid::new(&grid)
	}

	fn scheme() -> ColorScheme {
		ColorScheme::parse("Absolute\n0 0 0 0\n1000 200 100 50\nW 10 20 250\n", true).unwrap()
	}

	#[test]
	fn test_gradient_midpoint() {
		let shade = shade_for(&[500], 1, 1);
		let image = colorize(&shade, &scheme());
		assert_eq!(image.get_pixel(0, 0), &Rgba([100, 50, 25, 255]));
	}

	#[test]
	fn test_water_override() {
		let mut shade = shade_for(&[500], 1, 1);
		let i = shade.idx(relievo_core::MAPFRAME, relievo_core::MAPFRAME);
		shade.water[i] = true;
		let image = colorize(&shade, &scheme());
		assert_eq!(image.get_pixel(0, 0), &Rgba([10, 20, 250, 255]));
	}

	#[test]
	fn test_relief_darkens_and_clamps() {
		let mut shade = shade_for(&[500, 500], 2, 1);
		let f = relievo_core::MAPFRAME;
		let second = shade.idx(f, f + 1);
		shade.relief[second] = 2;
		let image = colorize(&shade, &scheme());
		assert_eq!(image.get_pixel(0, 0), &Rgba([100, 50, 25, 255]));
		assert_eq!(image.get_pixel(1, 0), &Rgba([68, 18, 0, 255]));

		shade.relief[second] = 100;
		let image = colorize(&shade, &scheme());
		assert_eq!(image.get_pixel(1, 0), &Rgba([0, 0, 0, 255]));
	}

	#[test]
	fn test_halo_does_not_leak_into_output() {
		let grid = ElevationGrid::from_source_cells(2, 2, 1.0, 1.0, &[1000; 4]).unwrap();
		let mut with_halo = grid.clone();
		with_halo
			.apply_halo(Quadrant::North, &vec![123i16; relievo_core::MAPFRAME * 2])
			.unwrap();
		let plain = colorize(&ShadeGrid::new(&grid), &scheme());
		let haloed = colorize(&ShadeGrid::new(&with_halo), &scheme());
		assert_eq!(plain, haloed);
		assert_eq!(plain.dimensions(), (2, 2));
	}
}
