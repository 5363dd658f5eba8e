use crate::ErrorKind;
use anyhow::{Context, Result, bail};
use std::path::Path;

/// An 8-bit RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
	pub r: u8,
	pub g: u8,
	pub b: u8,
}

/// One gradient stop: pixels at `elevation` meters take `color`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
	pub elevation: i32,
	pub color: Rgb,
	pub alpha: f64,
}

/// An ordered elevation → color gradient, plus an optional flat water color.
///
/// A scheme is either *absolute* (stop elevations are meters) or *relative*
/// (stop elevations are percentages of the elevation span actually present in
/// the data). Relative schemes must be resolved with
/// [`resolve_relative`](Self::resolve_relative) before colors are sampled;
/// in the distributed renderer this happens at the last possible moment,
/// after the global elevation extremes are known, so that every worker
/// resolves to the same absolute gradient.
///
/// # File format
///
/// ```text
/// # comment
/// Absolute
/// 0    30  100 220
/// 500  50  180  70
/// 2000 240 240 240
/// W    10  60  150
/// ```
///
/// The header line is `Absolute` or `Relative`; each following line is
/// `elevation R G B`, or `W R G B` for the water color.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScheme {
	pub absolute: bool,
	pub show_water: bool,
	stops: Vec<ColorStop>,
	pub water: Option<ColorStop>,
}

impl ColorScheme {
	/// The built-in scheme when no color file is given: a relative
	/// black → white ramp over the full elevation span.
	pub fn default_relative() -> ColorScheme {
		ColorScheme {
			absolute: false,
			show_water: false,
			stops: vec![
				ColorStop {
					elevation: 0,
					color: Rgb { r: 0, g: 0, b: 0 },
					alpha: 1.0,
				},
				ColorStop {
					elevation: 100,
					color: Rgb {
						r: 255,
						g: 255,
						b: 255,
					},
					alpha: 1.0,
				},
			],
			water: None,
		}
	}

	pub fn from_file(path: &Path, show_water: bool) -> Result<ColorScheme> {
		let text = std::fs::read_to_string(path)
			.map_err(|_| ErrorKind::MissingFile)
			.with_context(|| format!("failed to open color scheme {path:?}"))?;
		Self::parse(&text, show_water).with_context(|| format!("in color scheme {path:?}"))
	}

	/// Parses the color scheme format described above.
	pub fn parse(text: &str, show_water: bool) -> Result<ColorScheme> {
		let mut absolute: Option<bool> = None;
		let mut stops: Vec<ColorStop> = Vec::new();
		let mut water: Option<ColorStop> = None;

		for line in text.lines() {
			if line.starts_with('#') || line.starts_with(' ') || line.is_empty() {
				continue;
			}
			if absolute.is_none() {
				absolute = match line.trim_end() {
					"Absolute" => Some(true),
					"Relative" => Some(false),
					other => {
						return Err(anyhow::Error::from(ErrorKind::BadColorScheme)
							.context(format!("expected header 'Absolute' or 'Relative', found '{other}'")));
					}
				};
				continue;
			}

			let fields: Vec<&str> = line.split_whitespace().collect();
			if fields.len() != 4 {
				return Err(anyhow::Error::from(ErrorKind::BadColorScheme)
					.context(format!("expected 4 fields, found {}: '{line}'", fields.len())));
			}
			let color = Rgb {
				r: parse_channel(fields[1])?,
				g: parse_channel(fields[2])?,
				b: parse_channel(fields[3])?,
			};
			if fields[0] == "W" {
				water = Some(ColorStop {
					elevation: 0,
					color,
					alpha: 1.0,
				});
			} else {
				let elevation: i32 = fields[0]
					.parse()
					.map_err(|_| ErrorKind::BadColorScheme)
					.with_context(|| format!("invalid elevation '{}'", fields[0]))?;
				stops.push(ColorStop {
					elevation,
					color,
					alpha: 1.0,
				});
			}
		}

		let Some(absolute) = absolute else {
			bail!(ErrorKind::BadColorScheme);
		};
		Self::from_parts(absolute, show_water, stops, water)
	}

	/// Assembles a scheme from already-decoded parts (used by the wire
	/// codec). Stops are sorted ascending by elevation.
	pub fn from_parts(
		absolute: bool,
		show_water: bool,
		mut stops: Vec<ColorStop>,
		water: Option<ColorStop>,
	) -> Result<ColorScheme> {
		if stops.is_empty() {
			return Err(anyhow::Error::from(ErrorKind::BadColorScheme).context("color scheme has no stops"));
		}
		if stops.len() > u8::MAX as usize {
			return Err(
				anyhow::Error::from(ErrorKind::BadColorScheme)
					.context(format!("too many color stops ({})", stops.len())),
			);
		}
		stops.sort_by_key(|stop| stop.elevation);
		Ok(ColorScheme {
			absolute,
			show_water,
			stops,
			water,
		})
	}

	pub fn stops(&self) -> &[ColorStop] {
		&self.stops
	}

	/// Rewrites relative (percentage) stop elevations into absolute meters
	/// over the span `min..max`. No-op for absolute schemes.
	pub fn resolve_relative(&mut self, min: i32, max: i32) {
		if self.absolute {
			return;
		}
		for stop in &mut self.stops {
			let percent = f64::from(stop.elevation) / 100.0;
			stop.elevation = (f64::from(max - min) * percent) as i32 + min;
		}
		self.absolute = true;
	}

	/// Samples the gradient at an elevation.
	///
	/// Elevations below the first stop clamp to its color, elevations above
	/// the last stop to the last one's; in between channels interpolate
	/// linearly between the surrounding stops.
	pub fn color_at(&self, elevation: i16) -> (f64, f64, f64, f64) {
		let e = i32::from(elevation);
		let first = &self.stops[0];
		let last = &self.stops[self.stops.len() - 1];
		if e <= first.elevation {
			return stop_rgba(first);
		}
		if e >= last.elevation {
			return stop_rgba(last);
		}
		let upper = self
			.stops
			.iter()
			.position(|stop| stop.elevation > e)
			.unwrap_or(self.stops.len() - 1);
		let lo = &self.stops[upper - 1];
		let hi = &self.stops[upper];
		let span = f64::from(hi.elevation - lo.elevation);
		let fraction = if span > 0.0 {
			f64::from(e - lo.elevation) / span
		} else {
			0.0
		};
		(
			f64::from(lo.color.r) + fraction * f64::from(i32::from(hi.color.r) - i32::from(lo.color.r)),
			f64::from(lo.color.g) + fraction * f64::from(i32::from(hi.color.g) - i32::from(lo.color.g)),
			f64::from(lo.color.b) + fraction * f64::from(i32::from(hi.color.b) - i32::from(lo.color.b)),
			lo.alpha + fraction * (hi.alpha - lo.alpha),
		)
	}
}

fn stop_rgba(stop: &ColorStop) -> (f64, f64, f64, f64) {
	(
		f64::from(stop.color.r),
		f64::from(stop.color.g),
		f64::from(stop.color.b),
		stop.alpha,
	)
}

fn parse_channel(text: &str) -> Result<u8> {
	text
		.parse()
		.map_err(|_| ErrorKind::BadColorScheme)
		.with_context(|| format!("invalid color channel '{text}'"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::exit_code;

	const SCHEME: &str = "# test scheme\n\
		Absolute\n\
		0 10 20 30\n\
		1000 110 120 130\n\
		W 0 0 200\n";

	#[test]
	fn test_parse() {
		let scheme = ColorScheme::parse(SCHEME, true).unwrap();
		assert!(scheme.absolute);
		assert!(scheme.show_water);
		assert_eq!(scheme.stops().len(), 2);
		assert_eq!(scheme.stops()[0].elevation, 0);
		assert_eq!(scheme.stops()[1].color, Rgb { r: 110, g: 120, b: 130 });
		assert_eq!(scheme.water.unwrap().color, Rgb { r: 0, g: 0, b: 200 });
	}

	#[test]
	fn test_parse_sorts_stops() {
		let scheme = ColorScheme::parse("Absolute\n500 1 1 1\n0 2 2 2\n", false).unwrap();
		assert_eq!(scheme.stops()[0].elevation, 0);
		assert_eq!(scheme.stops()[1].elevation, 500);
	}

	#[test]
	fn test_parse_rejects_garbage() {
		let err = ColorScheme::parse("Absolute\n0 10 20\n", false).unwrap_err();
		assert_eq!(exit_code(&err), ErrorKind::BadColorScheme.exit_code());
		assert!(ColorScheme::parse("0 10 20 30\n", false).is_err());
		assert!(ColorScheme::parse("Absolute\n", false).is_err());
	}

	#[test]
	fn test_color_interpolation() {
		let scheme = ColorScheme::parse(SCHEME, false).unwrap();
		assert_eq!(scheme.color_at(0), (10.0, 20.0, 30.0, 1.0));
		assert_eq!(scheme.color_at(500), (60.0, 70.0, 80.0, 1.0));
		assert_eq!(scheme.color_at(1000), (110.0, 120.0, 130.0, 1.0));
	}

	#[test]
	fn test_color_clamps_outside_span() {
		let scheme = ColorScheme::parse(SCHEME, false).unwrap();
		assert_eq!(scheme.color_at(-500), scheme.color_at(0));
		assert_eq!(scheme.color_at(9000), scheme.color_at(1000));
	}

	#[test]
	fn test_resolve_relative() {
		let mut scheme = ColorScheme::parse("Relative\n0 0 0 0\n50 100 100 100\n100 200 200 200\n", false).unwrap();
		scheme.resolve_relative(-100, 300);
		assert!(scheme.absolute);
		let elevations: Vec<i32> = scheme.stops().iter().map(|s| s.elevation).collect();
		assert_eq!(elevations, vec![-100, 100, 300]);
	}

	#[test]
	fn test_resolve_relative_is_noop_for_absolute() {
		let mut scheme = ColorScheme::parse(SCHEME, false).unwrap();
		let before = scheme.clone();
		scheme.resolve_relative(0, 1);
		assert_eq!(scheme, before);
	}

	#[test]
	fn test_default_scheme_spans_full_range() {
		let mut scheme = ColorScheme::default_relative();
		assert!(!scheme.absolute);
		scheme.resolve_relative(0, 2550);
		assert_eq!(scheme.color_at(0), (0.0, 0.0, 0.0, 1.0));
		assert_eq!(scheme.color_at(2550), (255.0, 255.0, 255.0, 1.0));
	}
}
