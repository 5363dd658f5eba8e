//! Worker-side networking of the relievo renderer.
//!
//! A worker owns tiles, serves their edge slices to peers, fills its own
//! tiles' halos from its peers, renders, and returns PNGs to the primary.
//! The [`exchange`] module is the peer-to-peer part (listener, per-connection
//! handlers, request/reply integration); [`orchestrator`] drives the whole
//! session from `Init` to `End`.

pub mod exchange;
pub mod fetch;
pub mod orchestrator;
pub mod registry;
pub mod shared;

pub use orchestrator::{WorkerConfig, run_worker};
pub use registry::PeerRegistry;
pub use shared::{HaloFlag, LocalTile, WorkerShared};
