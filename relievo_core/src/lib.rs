//! Shared foundation of the relievo renderer.
//!
//! This crate carries everything both ends of the wire agree on: geographic
//! bounding boxes, the job/tile/worker state taxonomy, color schemes, the
//! little-endian value readers and writers the protocol is built on, the
//! error taxonomy with its process exit codes, and the UI sink used to report
//! job progress.

pub mod error;
pub mod io;
pub mod progress;
pub mod types;

pub use error::ErrorKind;
pub use types::*;

/// Width of the elevation halo kept around every tile, in source pixels.
///
/// Each tile's elevation matrix is stored with this many extra rows and
/// columns on every side, filled with the edge data of its neighbors so that
/// neighborhood-aware kernels (water detection, relief shading) produce no
/// seams at tile borders.
pub const MAPFRAME: usize = 100;

/// Elevation value marking cells with no measured data.
pub const NODATA: i16 = -9999;

/// Job id carried by worker-global status updates.
pub const GLOBAL_JOB_ID: u16 = 0xFFFF;

/// Default port for the primary ↔ worker connection.
pub const PRIMARY_PORT: u16 = 51777;

/// Default port for worker ↔ worker halo exchange.
pub const PEER_PORT: u16 = 51778;

/// Tolerance in decimal degrees when matching tile edges during stitching.
pub const STITCH_EPSILON: f64 = 0.01;
