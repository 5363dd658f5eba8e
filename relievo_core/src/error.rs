//! Error taxonomy and process exit codes.
//!
//! Errors are propagated as `anyhow` chains; attaching an [`ErrorKind`] to a
//! chain pins the exit code the process reports for that failure. `main`
//! walks the chain with [`exit_code`] and falls back to `BadInvocation` when
//! no kind was attached.

use std::fmt;

/// The failure classes of the renderer, each with a stable exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// Invalid command line.
	BadInvocation,
	/// A named file does not exist or cannot be opened.
	MissingFile,
	/// An allocation or resource limit was hit.
	OutOfMemory,
	/// A GeoTIFF could not be decoded.
	RasterReadFailure,
	/// A PNG could not be encoded or written.
	PngEncodeFailure,
	/// The color scheme file is malformed.
	BadColorScheme,
	/// A host name could not be resolved.
	ResolveFailure,
	/// A connection could not be established.
	ConnectFailure,
	/// The job stream ended. This signals EOF, not a failure.
	NoMoreTiles,
	/// A malformed frame was received; the connection is unusable.
	BadFrame,
}

impl ErrorKind {
	/// The exit code reported for this failure class.
	pub fn exit_code(self) -> i32 {
		match self {
			ErrorKind::BadInvocation => -1,
			ErrorKind::MissingFile => -2,
			ErrorKind::OutOfMemory => -3,
			ErrorKind::RasterReadFailure => -4,
			ErrorKind::PngEncodeFailure => -5,
			ErrorKind::BadColorScheme => -6,
			ErrorKind::ResolveFailure => -7,
			ErrorKind::ConnectFailure => -8,
			ErrorKind::NoMoreTiles => -9,
			ErrorKind::BadFrame => -10,
		}
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let text = match self {
			ErrorKind::BadInvocation => "invalid invocation",
			ErrorKind::MissingFile => "file does not exist",
			ErrorKind::OutOfMemory => "out of memory",
			ErrorKind::RasterReadFailure => "failed to read raster",
			ErrorKind::PngEncodeFailure => "failed to encode PNG",
			ErrorKind::BadColorScheme => "invalid color scheme",
			ErrorKind::ResolveFailure => "could not resolve address",
			ErrorKind::ConnectFailure => "could not connect",
			ErrorKind::NoMoreTiles => "no more tiles",
			ErrorKind::BadFrame => "malformed frame",
		};
		f.write_str(text)
	}
}

impl std::error::Error for ErrorKind {}

/// Walks an error chain and returns the exit code of the first [`ErrorKind`]
/// found, or the `BadInvocation` code if the chain carries none.
pub fn exit_code(error: &anyhow::Error) -> i32 {
	for cause in error.chain() {
		if let Some(kind) = cause.downcast_ref::<ErrorKind>() {
			return kind.exit_code();
		}
	}
	ErrorKind::BadInvocation.exit_code()
}
