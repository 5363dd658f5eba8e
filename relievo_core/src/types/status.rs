use anyhow::{Result, bail};
use std::fmt;

/// Lifecycle of a render job. The numeric codes are protocol-visible and
/// appear in status frames.
///
/// A job's status only ever advances:
/// `Pending → InProgress → Loaded → Rendering → Complete`.
/// `NoJob` and `Lost` are terminal worker-side markers, not job stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobStatus {
	Pending = 1,
	InProgress = 2,
	Loaded = 3,
	Rendering = 4,
	Complete = 5,
	NoJob = 6,
	Lost = 7,
}

impl JobStatus {
	pub fn code(self) -> u8 {
		self as u8
	}

	pub fn from_code(code: u8) -> Result<JobStatus> {
		Ok(match code {
			1 => JobStatus::Pending,
			2 => JobStatus::InProgress,
			3 => JobStatus::Loaded,
			4 => JobStatus::Rendering,
			5 => JobStatus::Complete,
			6 => JobStatus::NoJob,
			7 => JobStatus::Lost,
			_ => bail!("unknown job status code {code}"),
		})
	}
}

/// The primary's view of a worker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
	/// Idle, ready for the next job.
	NoJob,
	/// A job has been handed over and not yet acknowledged as loaded.
	InProgress,
	/// All jobs handed over; the terminator has been sent.
	Complete,
	/// The connection failed; the worker's jobs will not be rendered.
	Lost,
}

/// Per-job progress stages reported to the UI sink.
///
/// Each state maps to a fixed percentage, so re-announcing a state is
/// idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UiState {
	Pending = 0,
	Receiving = 1,
	Processing = 2,
	LocalCheck = 3,
	RemoteCheck = 4,
	Preparing = 5,
	Rendering = 6,
	Sending = 7,
	Complete = 8,
}

impl UiState {
	pub fn code(self) -> u8 {
		self as u8
	}

	pub fn from_code(code: u8) -> Result<UiState> {
		Ok(match code {
			0 => UiState::Pending,
			1 => UiState::Receiving,
			2 => UiState::Processing,
			3 => UiState::LocalCheck,
			4 => UiState::RemoteCheck,
			5 => UiState::Preparing,
			6 => UiState::Rendering,
			7 => UiState::Sending,
			8 => UiState::Complete,
			_ => bail!("unknown ui state code {code}"),
		})
	}

	/// Completion percentage shown for this state.
	pub fn percent(self) -> u8 {
		(self.code() as u32 * 100 / 8) as u8
	}

	pub fn label(self) -> &'static str {
		match self {
			UiState::Pending => "pending",
			UiState::Receiving => "receiving",
			UiState::Processing => "processing",
			UiState::LocalCheck => "local check",
			UiState::RemoteCheck => "remote check",
			UiState::Preparing => "preparing",
			UiState::Rendering => "rendering",
			UiState::Sending => "sending",
			UiState::Complete => "complete",
		}
	}
}

impl fmt::Display for UiState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

/// One of the eight compass portions of a tile's halo. The numeric codes are
/// protocol-visible and appear in edge request/reply frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
	North = 1,
	South = 2,
	West = 3,
	East = 4,
	NorthWest = 5,
	NorthEast = 6,
	SouthWest = 7,
	SouthEast = 8,
}

impl Quadrant {
	/// All quadrants in their wire-code order.
	pub const ALL: [Quadrant; 8] = [
		Quadrant::North,
		Quadrant::South,
		Quadrant::West,
		Quadrant::East,
		Quadrant::NorthWest,
		Quadrant::NorthEast,
		Quadrant::SouthWest,
		Quadrant::SouthEast,
	];

	pub fn code(self) -> u8 {
		self as u8
	}

	pub fn from_code(code: u8) -> Result<Quadrant> {
		Ok(match code {
			1 => Quadrant::North,
			2 => Quadrant::South,
			3 => Quadrant::West,
			4 => Quadrant::East,
			5 => Quadrant::NorthWest,
			6 => Quadrant::NorthEast,
			7 => Quadrant::SouthWest,
			8 => Quadrant::SouthEast,
			_ => bail!("unknown quadrant code {code}"),
		})
	}

	/// The diagonally opposite quadrant.
	///
	/// A tile's northern halo is supplied by its neighbor's *southern* edge,
	/// so requests carry the mirror of the quadrant being filled.
	pub fn mirror(self) -> Quadrant {
		match self {
			Quadrant::North => Quadrant::South,
			Quadrant::South => Quadrant::North,
			Quadrant::West => Quadrant::East,
			Quadrant::East => Quadrant::West,
			Quadrant::NorthWest => Quadrant::SouthEast,
			Quadrant::NorthEast => Quadrant::SouthWest,
			Quadrant::SouthWest => Quadrant::NorthEast,
			Quadrant::SouthEast => Quadrant::NorthWest,
		}
	}

	/// Index of this quadrant in a per-tile flag array.
	pub fn index(self) -> usize {
		self.code() as usize - 1
	}

	pub fn is_corner(self) -> bool {
		matches!(
			self,
			Quadrant::NorthWest | Quadrant::NorthEast | Quadrant::SouthWest | Quadrant::SouthEast
		)
	}

	/// Parses the compass abbreviations accepted on the command line.
	pub fn from_compass(text: &str) -> Result<Quadrant> {
		Ok(match text {
			"N" => Quadrant::North,
			"S" => Quadrant::South,
			"W" => Quadrant::West,
			"E" => Quadrant::East,
			"NW" => Quadrant::NorthWest,
			"NE" => Quadrant::NorthEast,
			"SW" => Quadrant::SouthWest,
			"SE" => Quadrant::SouthEast,
			_ => bail!("{text} is not a compass direction"),
		})
	}
}

/// Map projection of the rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
	#[default]
	Equirectangular = 0,
	Mercator = 1,
}

impl Projection {
	pub fn code(self) -> u8 {
		self as u8
	}

	pub fn from_code(code: u8) -> Result<Projection> {
		Ok(match code {
			0 => Projection::Equirectangular,
			1 => Projection::Mercator,
			_ => bail!("unknown projection code {code}"),
		})
	}
}
