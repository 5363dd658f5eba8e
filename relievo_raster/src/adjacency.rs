use relievo_core::{GeoBBox, MAPFRAME, Quadrant};

/// Probe coordinates for the eight halo quadrants of one tile.
///
/// Each probe sits half a halo width outside the tile's bounding box in the
/// quadrant's direction. A neighboring tile supplies that quadrant exactly
/// when its own box contains the probe point, which is a pure test over
/// bounding boxes; no elevation data is consulted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HaloProbes {
	pub north_lat: f64,
	pub south_lat: f64,
	pub mid_lat: f64,
	pub east_lon: f64,
	pub west_lon: f64,
	pub mid_lon: f64,
}

impl HaloProbes {
	pub fn new(bbox: &GeoBBox, vertical_scale: f64, horizontal_scale: f64) -> HaloProbes {
		let half_frame = MAPFRAME as f64 / 2.0;
		HaloProbes {
			north_lat: bbox.north + half_frame * vertical_scale,
			south_lat: bbox.south - half_frame * vertical_scale,
			mid_lat: bbox.mid_lat(),
			east_lon: bbox.east + half_frame * horizontal_scale,
			west_lon: bbox.west - half_frame * horizontal_scale,
			mid_lon: bbox.mid_lon(),
		}
	}

	/// The probe point `(lon, lat)` for one quadrant.
	pub fn point(&self, quadrant: Quadrant) -> (f64, f64) {
		match quadrant {
			Quadrant::North => (self.mid_lon, self.north_lat),
			Quadrant::South => (self.mid_lon, self.south_lat),
			Quadrant::East => (self.east_lon, self.mid_lat),
			Quadrant::West => (self.west_lon, self.mid_lat),
			Quadrant::NorthEast => (self.east_lon, self.north_lat),
			Quadrant::NorthWest => (self.west_lon, self.north_lat),
			Quadrant::SouthEast => (self.east_lon, self.south_lat),
			Quadrant::SouthWest => (self.west_lon, self.south_lat),
		}
	}
}

/// Finds the tile supplying one halo quadrant: the first candidate whose
/// bounding box contains the quadrant's probe point.
///
/// Candidates are tested in iteration order, so with a deterministic order
/// the tie-break is deterministic too. `None` means the quadrant has no
/// neighbor; it then stays permanently unfilled and the tile renders with a
/// zero halo there.
pub fn find_neighbor<T>(
	probes: &HaloProbes,
	quadrant: Quadrant,
	candidates: impl IntoIterator<Item = (T, GeoBBox)>,
) -> Option<T> {
	let (lon, lat) = probes.point(quadrant);
	candidates
		.into_iter()
		.find(|(_, bbox)| bbox.contains(lon, lat))
		.map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	const SCALE: f64 = 1.0 / 1200.0;

	fn bbox(west: f64, south: f64) -> GeoBBox {
		GeoBBox::new(west, south, west + 1.0, south + 1.0).unwrap()
	}

	/// A 3×3 patch of 1°×1° tiles around the tile at (20E, 10N)..(21E, 11N).
	fn neighborhood() -> Vec<(u16, GeoBBox)> {
		let mut tiles = Vec::new();
		let mut id = 0;
		for row in 0..3 {
			for col in 0..3 {
				tiles.push((id, bbox(19.0 + f64::from(col), 9.0 + f64::from(row))));
				id += 1;
			}
		}
		tiles
	}

	#[rstest]
	#[case(Quadrant::SouthWest, 0)]
	#[case(Quadrant::South, 1)]
	#[case(Quadrant::SouthEast, 2)]
	#[case(Quadrant::West, 3)]
	#[case(Quadrant::East, 5)]
	#[case(Quadrant::NorthWest, 6)]
	#[case(Quadrant::North, 7)]
	#[case(Quadrant::NorthEast, 8)]
	fn test_probe_hits_expected_neighbor(#[case] quadrant: Quadrant, #[case] expected: u16) {
		let center = bbox(20.0, 10.0);
		let probes = HaloProbes::new(&center, SCALE, SCALE);
		let found = find_neighbor(
			&probes,
			quadrant,
			neighborhood().into_iter().filter(|(id, _)| *id != 4),
		);
		assert_eq!(found, Some(expected), "{quadrant:?}");
	}

	#[test]
	fn test_no_neighbor_stays_unfilled() {
		let center = bbox(20.0, 10.0);
		let probes = HaloProbes::new(&center, SCALE, SCALE);
		for quadrant in Quadrant::ALL {
			assert_eq!(find_neighbor::<u16>(&probes, quadrant, []), None);
		}
	}

	#[test]
	fn test_first_match_wins() {
		let center = bbox(20.0, 10.0);
		let probes = HaloProbes::new(&center, SCALE, SCALE);
		// two overlapping candidates both contain the north probe
		let candidates = vec![(7u16, bbox(20.0, 11.0)), (8u16, bbox(20.0, 11.0))];
		assert_eq!(find_neighbor(&probes, Quadrant::North, candidates), Some(7));
	}

	#[test]
	fn test_probe_stays_close_to_edge() {
		// the probe must fall inside the adjacent 1° tile, not beyond it
		let center = bbox(20.0, 10.0);
		let probes = HaloProbes::new(&center, SCALE, SCALE);
		let (lon, lat) = probes.point(Quadrant::North);
		assert!(lat > 11.0 && lat < 12.0);
		assert_eq!(lon, 20.5);
	}
}
