use relievo_core::{GeoBBox, JobStatus};

/// A peer's tile as announced by its status broadcasts.
#[derive(Debug, Clone)]
pub struct RemoteTile {
	pub owner: usize,
	pub job_id: u16,
	pub status: JobStatus,
	pub bbox: Option<GeoBBox>,
}

#[derive(Debug)]
struct Peer {
	addr: String,
	status: JobStatus,
}

/// Directory of every peer worker and every tile they have announced.
///
/// Tiles live in one owned vector; lookups hand out indices, never
/// references, so callers can drop the registry lock before doing I/O.
/// Status updates are upserts: an announcement for an unknown `(worker,
/// job)` pair inserts it, a repeat overwrites bounding box and status
/// (last writer wins).
#[derive(Debug)]
pub struct PeerRegistry {
	whoami: usize,
	peers: Vec<Peer>,
	tiles: Vec<RemoteTile>,
}

impl PeerRegistry {
	pub fn new(whoami: usize, addrs: Vec<String>) -> PeerRegistry {
		PeerRegistry {
			whoami,
			peers: addrs
				.into_iter()
				.map(|addr| Peer {
					addr,
					status: JobStatus::NoJob,
				})
				.collect(),
			tiles: Vec::new(),
		}
	}

	pub fn whoami(&self) -> usize {
		self.whoami
	}

	/// Number of workers in the cluster, this one included.
	pub fn node_count(&self) -> usize {
		self.peers.len()
	}

	/// Number of *other* workers.
	pub fn peer_count(&self) -> usize {
		self.peers.len().saturating_sub(1)
	}

	pub fn addr(&self, index: usize) -> &str {
		&self.peers[index].addr
	}

	/// Applies a job-scoped status announcement from `sender`.
	pub fn upsert_tile(&mut self, sender: usize, job_id: u16, status: JobStatus, bbox: GeoBBox) {
		if sender >= self.peers.len() {
			log::warn!("status from unknown worker {sender}, ignored");
			return;
		}
		match self
			.tiles
			.iter_mut()
			.find(|tile| tile.owner == sender && tile.job_id == job_id)
		{
			Some(tile) => {
				tile.status = status;
				tile.bbox = Some(bbox);
			}
			None => self.tiles.push(RemoteTile {
				owner: sender,
				job_id,
				status,
				bbox: Some(bbox),
			}),
		}
	}

	/// Applies a worker-global status announcement from `sender`.
	pub fn set_peer_status(&mut self, sender: usize, status: JobStatus) {
		if let Some(peer) = self.peers.get_mut(sender) {
			peer.status = status;
		}
	}

	/// True once every other worker has announced it is done loading tiles
	/// (worker-global `Rendering` or beyond). From that point no new remote
	/// tiles will appear, so unresolved halo quadrants are permanently
	/// unset.
	pub fn all_peers_rendering(&self) -> bool {
		self
			.peers
			.iter()
			.enumerate()
			.filter(|(index, _)| *index != self.whoami)
			.all(|(_, peer)| {
				matches!(peer.status, JobStatus::Rendering | JobStatus::Complete)
			})
	}

	pub fn tiles(&self) -> &[RemoteTile] {
		&self.tiles
	}

	/// The worker owning `job_id`, if any tile announcement named it.
	pub fn owner_of_job(&self, job_id: u16) -> Option<usize> {
		self
			.tiles
			.iter()
			.find(|tile| tile.job_id == job_id)
			.map(|tile| tile.owner)
	}
}
