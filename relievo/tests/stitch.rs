//! Stitcher behavior over real PNG tiles on disk.

use image::{Rgba, RgbaImage};
use relievo::catalog::FinalTile;
use relievo::stitch::stitch;
use relievo_core::{GeoBBox, progress::UiDrain};
use std::path::Path;

fn write_tile(
	dir: &Path,
	job_id: u16,
	width: u32,
	height: u32,
	color: [u8; 4],
	bbox: GeoBBox,
) -> FinalTile {
	let image = RgbaImage::from_pixel(width, height, Rgba(color));
	let path = dir.join(format!("tile{job_id}.png"));
	image.save(&path).unwrap();
	FinalTile::new(job_id, path, width, height, bbox)
}

fn bbox(west: f64, south: f64, east: f64, north: f64) -> GeoBBox {
	GeoBBox::new(west, south, east, north).unwrap()
}

const RED: [u8; 4] = [200, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 200, 255];
const GREEN: [u8; 4] = [0, 200, 0, 255];

#[test]
fn test_two_tiles_side_by_side() {
	let dir = tempfile::tempdir().unwrap();
	let tiles = vec![
		write_tile(dir.path(), 0, 4, 3, RED, bbox(20.0, 10.0, 21.0, 11.0)),
		write_tile(dir.path(), 1, 4, 3, BLUE, bbox(21.0, 10.0, 22.0, 11.0)),
	];
	let out = dir.path().join("out.png");
	stitch(tiles, &out, &UiDrain).unwrap();

	let image = image::open(&out).unwrap().to_rgba8();
	assert_eq!(image.dimensions(), (8, 3));
	assert_eq!(image.get_pixel(0, 0), &Rgba(RED));
	assert_eq!(image.get_pixel(3, 2), &Rgba(RED));
	assert_eq!(image.get_pixel(4, 0), &Rgba(BLUE));
	assert_eq!(image.get_pixel(7, 2), &Rgba(BLUE));
}

#[test]
fn test_two_tiles_stacked() {
	let dir = tempfile::tempdir().unwrap();
	let tiles = vec![
		write_tile(dir.path(), 0, 4, 3, RED, bbox(20.0, 10.0, 21.0, 11.0)),
		write_tile(dir.path(), 1, 4, 3, BLUE, bbox(20.0, 11.0, 21.0, 12.0)),
	];
	let out = dir.path().join("out.png");
	stitch(tiles, &out, &UiDrain).unwrap();

	let image = image::open(&out).unwrap().to_rgba8();
	assert_eq!(image.dimensions(), (4, 6));
	// north tile on top
	assert_eq!(image.get_pixel(0, 0), &Rgba(BLUE));
	assert_eq!(image.get_pixel(3, 5), &Rgba(RED));
}

#[test]
fn test_missing_corner_is_transparent() {
	let dir = tempfile::tempdir().unwrap();
	let tiles = vec![
		write_tile(dir.path(), 0, 2, 2, RED, bbox(20.0, 10.0, 21.0, 11.0)),
		write_tile(dir.path(), 1, 2, 2, BLUE, bbox(21.0, 10.0, 22.0, 11.0)),
		write_tile(dir.path(), 2, 2, 2, GREEN, bbox(20.0, 11.0, 21.0, 12.0)),
	];
	let out = dir.path().join("out.png");
	stitch(tiles, &out, &UiDrain).unwrap();

	let image = image::open(&out).unwrap().to_rgba8();
	assert_eq!(image.dimensions(), (4, 4));
	// top row: green then the missing north-east corner
	assert_eq!(image.get_pixel(0, 0), &Rgba(GREEN));
	assert_eq!(image.get_pixel(2, 0), &Rgba([0, 0, 0, 0]));
	assert_eq!(image.get_pixel(3, 1), &Rgba([0, 0, 0, 0]));
	// bottom row: red then blue
	assert_eq!(image.get_pixel(0, 2), &Rgba(RED));
	assert_eq!(image.get_pixel(2, 3), &Rgba(BLUE));
}

#[test]
fn test_single_tile_passes_through() {
	let dir = tempfile::tempdir().unwrap();
	let tiles = vec![write_tile(dir.path(), 0, 5, 4, GREEN, bbox(0.0, 0.0, 1.0, 1.0))];
	let out = dir.path().join("out.png");
	stitch(tiles, &out, &UiDrain).unwrap();

	let image = image::open(&out).unwrap().to_rgba8();
	assert_eq!(image.dimensions(), (5, 4));
	for (_, _, pixel) in image.enumerate_pixels() {
		assert_eq!(pixel, &Rgba(GREEN));
	}
}

#[test]
fn test_no_tiles_is_an_error() {
	let dir = tempfile::tempdir().unwrap();
	let out = dir.path().join("out.png");
	assert!(stitch(vec![], &out, &UiDrain).is_err());
}
