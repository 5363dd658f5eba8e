use anyhow::{Result, ensure};
use std::fmt::Debug;

/// A geographical bounding box in decimal degrees.
///
/// The box is defined by four `f64` values:
/// - `west`: minimum longitude,
/// - `south`: minimum latitude,
/// - `east`: maximum longitude,
/// - `north`: maximum latitude.
///
/// Every tile carries such a box, derived from its GeoTIFF georeferencing,
/// and the adjacency resolver decides neighborhood purely from these boxes.
///
/// # Examples
///
/// ```
/// use relievo_core::GeoBBox;
///
/// let bbox = GeoBBox::new(20.0, 10.0, 21.0, 11.0).unwrap();
/// assert!(bbox.contains(20.5, 10.5));
/// assert!(!bbox.contains(21.5, 10.5));
/// ```
#[derive(Clone, Copy, PartialEq)]
pub struct GeoBBox {
	pub west: f64,
	pub south: f64,
	pub east: f64,
	pub north: f64,
}

impl GeoBBox {
	/// Creates a new `GeoBBox` from `west, south, east, north` and validates
	/// the coordinate ranges.
	pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<GeoBBox> {
		GeoBBox {
			west,
			south,
			east,
			north,
		}
		.checked()
	}

	/// Builds a box from the wire field order `top, bottom, left, right`.
	///
	/// Status and PNG frames carry coordinates in this order; no validation
	/// is applied because remote peers are trusted to echo what they loaded.
	pub fn from_edges(top: f64, bottom: f64, left: f64, right: f64) -> GeoBBox {
		GeoBBox {
			west: left,
			south: bottom,
			east: right,
			north: top,
		}
	}

	/// Returns `true` if the point lies strictly inside the box.
	///
	/// The comparison is strict on all four edges: a probe sitting exactly on
	/// a tile border matches neither tile, which keeps the first-match
	/// tie-break deterministic.
	pub fn contains(&self, lon: f64, lat: f64) -> bool {
		lon > self.west && lon < self.east && lat > self.south && lat < self.north
	}

	/// Longitude of the box center.
	pub fn mid_lon(&self) -> f64 {
		(self.west + self.east) / 2.0
	}

	/// Latitude of the box center.
	pub fn mid_lat(&self) -> f64 {
		(self.south + self.north) / 2.0
	}

	/// Expands the box in place so that it covers `other` as well.
	pub fn extend(&mut self, other: &GeoBBox) {
		self.west = self.west.min(other.west);
		self.south = self.south.min(other.south);
		self.east = self.east.max(other.east);
		self.north = self.north.max(other.north);
	}

	fn checked(self) -> Result<Self> {
		ensure!(self.west >= -180., "west ({}) must be >= -180", self.west);
		ensure!(self.south >= -90., "south ({}) must be >= -90", self.south);
		ensure!(self.east <= 180., "east ({}) must be <= 180", self.east);
		ensure!(self.north <= 90., "north ({}) must be <= 90", self.north);
		ensure!(
			self.west <= self.east,
			"west ({}) must be <= east ({})",
			self.west,
			self.east
		);
		ensure!(
			self.south <= self.north,
			"south ({}) must be <= north ({})",
			self.south,
			self.north
		);
		Ok(self)
	}
}

impl Debug for GeoBBox {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"GeoBBox({}, {}, {}, {})",
			self.west, self.south, self.east, self.north
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_creation() {
		let bbox = GeoBBox::new(-10.0, -5.0, 10.0, 5.0).unwrap();
		assert_eq!(bbox.west, -10.0);
		assert_eq!(bbox.south, -5.0);
		assert_eq!(bbox.east, 10.0);
		assert_eq!(bbox.north, 5.0);
	}

	#[test]
	fn test_invalid_ranges() {
		assert!(GeoBBox::new(-190.0, -5.0, 10.0, 5.0).is_err());
		assert!(GeoBBox::new(-10.0, -95.0, 10.0, 5.0).is_err());
		assert!(GeoBBox::new(-10.0, -5.0, 190.0, 5.0).is_err());
		assert!(GeoBBox::new(-10.0, -5.0, 10.0, 95.0).is_err());
		assert!(GeoBBox::new(10.0, -5.0, -10.0, 5.0).is_err());
		assert!(GeoBBox::new(-10.0, 5.0, 10.0, -5.0).is_err());
	}

	#[test]
	fn test_contains_is_strict() {
		let bbox = GeoBBox::new(20.0, 10.0, 21.0, 11.0).unwrap();
		assert!(bbox.contains(20.5, 10.5));
		assert!(!bbox.contains(20.0, 10.5));
		assert!(!bbox.contains(21.0, 10.5));
		assert!(!bbox.contains(20.5, 10.0));
		assert!(!bbox.contains(20.5, 11.0));
	}

	#[test]
	fn test_midpoints() {
		let bbox = GeoBBox::new(20.0, 10.0, 22.0, 12.0).unwrap();
		assert_eq!(bbox.mid_lon(), 21.0);
		assert_eq!(bbox.mid_lat(), 11.0);
	}

	#[test]
	fn test_extend() {
		let mut bbox = GeoBBox::new(-10.0, -5.0, 10.0, 5.0).unwrap();
		bbox.extend(&GeoBBox::new(-12.0, -3.0, 8.0, 6.0).unwrap());
		assert_eq!(bbox, GeoBBox::from_edges(6.0, -5.0, -12.0, 10.0));
	}

	#[test]
	fn test_from_edges_wire_order() {
		let bbox = GeoBBox::from_edges(11.0, 10.0, 20.0, 21.0);
		assert_eq!(bbox.north, 11.0);
		assert_eq!(bbox.south, 10.0);
		assert_eq!(bbox.west, 20.0);
		assert_eq!(bbox.east, 21.0);
	}

	#[test]
	fn test_debug_format() {
		let bbox = GeoBBox::new(-10.0, -5.0, 10.0, 5.0).unwrap();
		assert_eq!(format!("{bbox:?}"), "GeoBBox(-10, -5, 10, 5)");
	}
}
