use crate::registry::PeerRegistry;
use anyhow::Result;
use parking_lot::{Condvar, Mutex};
use relievo_core::{GeoBBox, JobStatus, Quadrant};
use relievo_proto::Conn;
use relievo_raster::{HaloProbes, TileStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Fill state of one halo quadrant. Transitions are monotone:
/// `Unset → Requested → Filled`, no backtracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaloFlag {
	Unset,
	Requested,
	Filled,
}

/// A tile owned by this worker.
#[derive(Debug, Clone)]
pub struct LocalTile {
	pub job_id: u16,
	pub name: String,
	pub status: JobStatus,
	pub bbox: GeoBBox,
	pub probes: HaloProbes,
	pub halo: [HaloFlag; 8],
	pub img_width: u32,
	pub img_height: u32,
	/// Serializes read/modify/write cycles on the tile's store file.
	pub file_lock: Arc<Mutex<()>>,
}

impl LocalTile {
	pub fn new(job_id: u16, name: String, bbox: GeoBBox, probes: HaloProbes) -> LocalTile {
		LocalTile {
			job_id,
			name,
			status: JobStatus::Loaded,
			bbox,
			probes,
			halo: [HaloFlag::Unset; 8],
			img_width: 0,
			img_height: 0,
			file_lock: Arc::new(Mutex::new(())),
		}
	}

	pub fn flag(&self, quadrant: Quadrant) -> HaloFlag {
		self.halo[quadrant.index()]
	}

	pub fn set_flag(&mut self, quadrant: Quadrant, flag: HaloFlag) {
		self.halo[quadrant.index()] = flag;
	}

	/// All eight quadrants filled.
	pub fn fully_supplied(&self) -> bool {
		self.halo.iter().all(|flag| *flag == HaloFlag::Filled)
	}

	/// No request in flight.
	pub fn none_requested(&self) -> bool {
		self.halo.iter().all(|flag| *flag != HaloFlag::Requested)
	}
}

/// Running elevation extremes: this worker's own, and the fold over every
/// peer's broadcast. Used only when the color scheme is relative.
#[derive(Debug)]
pub struct Extremes {
	pub local_min: i32,
	pub local_max: i32,
	pub global_min: i32,
	pub global_max: i32,
	/// Number of peers whose broadcast has been folded in.
	pub heard: usize,
}

impl Extremes {
	fn new() -> Extremes {
		Extremes {
			local_min: i32::from(i16::MAX),
			local_max: i32::from(i16::MIN),
			global_min: i32::from(i16::MAX),
			global_max: i32::from(i16::MIN),
			heard: 0,
		}
	}

	pub fn fold_local(&mut self, min: i16, max: i16) {
		self.local_min = self.local_min.min(i32::from(min));
		self.local_max = self.local_max.max(i32::from(max));
	}

	pub fn fold_remote(&mut self, min: i32, max: i32) {
		self.global_min = self.global_min.min(min);
		self.global_max = self.global_max.max(max);
		self.heard += 1;
	}

	/// The cluster-wide extremes, this worker included.
	pub fn resolved(&self) -> (i32, i32) {
		(
			self.global_min.min(self.local_min),
			self.global_max.max(self.local_max),
		)
	}
}

/// Lazily-established outbound connections to each peer, one send-lock each.
pub struct PeerLinks {
	links: Vec<Mutex<Option<Arc<Conn>>>>,
	port: u16,
}

/// How often and how long to retry a peer that is not accepting yet. Workers
/// start their listeners at different times, so the first broadcast may race
/// a slow peer's startup.
const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_BACKOFF: Duration = Duration::from_millis(500);

impl PeerLinks {
	fn new(count: usize, port: u16) -> PeerLinks {
		PeerLinks {
			links: (0..count).map(|_| Mutex::new(None)).collect(),
			port,
		}
	}

	/// The outbound connection to peer `index`, connecting if needed.
	pub fn get_or_connect(&self, index: usize, addr: &str) -> Result<Arc<Conn>> {
		let mut slot = self.links[index].lock();
		if let Some(conn) = slot.as_ref() {
			return Ok(Arc::clone(conn));
		}
		let mut last_err = None;
		for attempt in 0..CONNECT_ATTEMPTS {
			match Conn::connect(addr, self.port) {
				Ok(conn) => {
					let conn = Arc::new(conn);
					*slot = Some(Arc::clone(&conn));
					return Ok(conn);
				}
				Err(e) => {
					log::debug!("peer {addr} not reachable (attempt {}): {e:#}", attempt + 1);
					last_err = Some(e);
					std::thread::sleep(CONNECT_BACKOFF);
				}
			}
		}
		Err(last_err.unwrap())
	}

	/// Drops a connection after a send error so the next send reconnects.
	pub fn reset(&self, index: usize) {
		*self.links[index].lock() = None;
	}
}

/// Everything the exchange handlers and the orchestrator share.
///
/// Lock order: `registry` → `tiles` → a tile's `file_lock` → a connection's
/// send-lock. The send-lock is always innermost and is never held while
/// acquiring anything else.
pub struct WorkerShared {
	pub whoami: usize,
	pub store: TileStore,
	pub registry: Mutex<PeerRegistry>,
	pub tiles: Mutex<Vec<LocalTile>>,
	pub extremes: Mutex<Extremes>,
	pub links: PeerLinks,
	pub work_dir: PathBuf,
	event_generation: Mutex<u64>,
	event: Condvar,
}

impl WorkerShared {
	pub fn new(
		whoami: usize,
		addrs: Vec<String>,
		store: TileStore,
		work_dir: PathBuf,
		peer_port: u16,
	) -> WorkerShared {
		let node_count = addrs.len();
		WorkerShared {
			whoami,
			store,
			registry: Mutex::new(PeerRegistry::new(whoami, addrs)),
			tiles: Mutex::new(Vec::new()),
			extremes: Mutex::new(Extremes::new()),
			links: PeerLinks::new(node_count, peer_port),
			work_dir,
			event_generation: Mutex::new(0),
			event: Condvar::new(),
		}
	}

	/// Wakes the orchestrator: some exchange event changed shared state.
	pub fn notify(&self) {
		*self.event_generation.lock() += 1;
		self.event.notify_all();
	}

	/// Blocks until any exchange event has happened since `seen`, then
	/// updates `seen`. Returns immediately if one already has.
	pub fn wait_event(&self, seen: &mut u64) {
		let mut generation = self.event_generation.lock();
		while *generation == *seen {
			self.event.wait(&mut generation);
		}
		*seen = *generation;
	}
}
