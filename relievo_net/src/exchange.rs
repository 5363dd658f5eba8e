//! Peer-to-peer halo exchange.
//!
//! Each worker listens on the peer port and runs one handler thread per
//! accepted connection. Handlers demultiplex status changes, edge requests,
//! edge replies and min/max broadcasts; every handled frame wakes the
//! orchestrator through the shared event condition.
//!
//! Replies do not travel back on the connection the request arrived on: a
//! worker answers on its own outbound connection to the requester's
//! listener, exactly as its status broadcasts do.

use crate::shared::{HaloFlag, WorkerShared};
use anyhow::{Context, Result, anyhow};
use relievo_core::{ErrorKind, GLOBAL_JOB_ID, GeoBBox, JobStatus, Quadrant};
use relievo_proto::{Conn, Frame, ReqEdge, SendEdge, Status};
use relievo_raster::find_neighbor;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

/// Binds the peer exchange listener. Returns the listener and the actually
/// bound port (useful when asking for port 0).
pub fn bind_peer_listener(port: u16) -> Result<(TcpListener, u16)> {
	let listener = TcpListener::bind(("0.0.0.0", port))
		.map_err(|e| anyhow!(ErrorKind::ConnectFailure).context(format!("binding peer port {port}: {e}")))?;
	let bound = listener.local_addr()?.port();
	log::info!("peer exchange listening on port {bound}");
	Ok((listener, bound))
}

/// Accepts peer connections forever, one handler thread each.
pub fn spawn_listener(shared: Arc<WorkerShared>, listener: TcpListener) -> thread::JoinHandle<()> {
	thread::spawn(move || {
		for stream in listener.incoming() {
			match stream {
				Ok(stream) => {
					let peer = stream
						.peer_addr()
						.map_or_else(|_| "unknown".to_string(), |addr| addr.to_string());
					let shared = Arc::clone(&shared);
					thread::spawn(move || handle_peer(&shared, &Conn::from_stream(stream, peer)));
				}
				Err(e) => log::warn!("peer accept failed: {e}"),
			}
		}
	})
}

fn handle_peer(shared: &WorkerShared, conn: &Conn) {
	log::debug!("peer connected: {}", conn.peer());
	loop {
		let frame = match conn.recv() {
			Ok(frame) => frame,
			Err(e) => {
				// A malformed frame means the frame boundary is lost: this
				// connection is dropped, every other one keeps running.
				log::debug!("peer {} gone: {e:#}", conn.peer());
				break;
			}
		};
		if let Err(e) = handle_frame(shared, frame) {
			log::warn!("peer {}: {e:#}", conn.peer());
		}
		shared.notify();
	}
	shared.notify();
}

/// Applies one inbound peer frame to the shared state.
pub fn handle_frame(shared: &WorkerShared, frame: Frame) -> Result<()> {
	match frame {
		Frame::Status(status) => {
			let mut registry = shared.registry.lock();
			if status.job_id == GLOBAL_JOB_ID {
				registry.set_peer_status(status.sender_id as usize, status.status);
			} else {
				registry.upsert_tile(
					status.sender_id as usize,
					status.job_id,
					status.status,
					status.bbox,
				);
			}
			Ok(())
		}
		Frame::MinMax { min, max } => {
			shared.extremes.lock().fold_remote(min, max);
			Ok(())
		}
		Frame::ReqEdge(req) => handle_edge_request(shared, req),
		Frame::SendEdge(send) => handle_edge_reply(shared, &send),
		other => Err(anyhow!("unexpected frame 0x{:02X} on peer connection", other.tag())),
	}
}

/// Serves one slice of an owned tile to the peer that asked for it.
fn handle_edge_request(shared: &WorkerShared, req: ReqEdge) -> Result<()> {
	let file_lock = {
		let tiles = shared.tiles.lock();
		let tile = tiles
			.iter()
			.find(|tile| tile.job_id == req.requested_job_id)
			.with_context(|| format!("edge request for unknown job {}", req.requested_job_id))?;
		Arc::clone(&tile.file_lock)
	};

	let cells = {
		let _guard = file_lock.lock();
		shared.store.read(req.requested_job_id)?.edge_slice(req.quadrant)
	};

	let owner = shared
		.registry
		.lock()
		.owner_of_job(req.requesting_job_id)
		.with_context(|| format!("no known owner for requesting job {}", req.requesting_job_id))?;
	send_to_peer(
		shared,
		owner,
		&Frame::SendEdge(SendEdge {
			quadrant: req.quadrant,
			requesting_job_id: req.requesting_job_id,
			requested_job_id: req.requested_job_id,
			cells,
		}),
	);
	Ok(())
}

/// Writes a received slice into the requesting tile's halo. A reply for a
/// quadrant that is already filled (or was never requested) is a no-op.
fn handle_edge_reply(shared: &WorkerShared, send: &SendEdge) -> Result<()> {
	let own_quadrant = send.quadrant.mirror();
	let file_lock = {
		let tiles = shared.tiles.lock();
		let tile = tiles
			.iter()
			.find(|tile| tile.job_id == send.requesting_job_id)
			.with_context(|| format!("edge reply for unknown job {}", send.requesting_job_id))?;
		if tile.flag(own_quadrant) != HaloFlag::Requested {
			return Ok(());
		}
		Arc::clone(&tile.file_lock)
	};

	{
		let _guard = file_lock.lock();
		let mut grid = shared.store.read(send.requesting_job_id)?;
		grid.apply_halo(own_quadrant, &send.cells)?;
		shared.store.write(send.requesting_job_id, &grid)?;
	}

	let mut tiles = shared.tiles.lock();
	if let Some(tile) = tiles
		.iter_mut()
		.find(|tile| tile.job_id == send.requesting_job_id)
	{
		tile.set_flag(own_quadrant, HaloFlag::Filled);
		if tile.fully_supplied() {
			tile.status = JobStatus::Rendering;
		}
	}
	Ok(())
}

/// Fills halo quadrants whose neighbor is also local, straight from the
/// tile store. Runs once, after the job stream has closed.
pub fn fill_local_halos(shared: &WorkerShared) -> Result<()> {
	let snapshot: Vec<_> = shared
		.tiles
		.lock()
		.iter()
		.map(|tile| {
			(
				tile.job_id,
				tile.bbox,
				tile.probes,
				Arc::clone(&tile.file_lock),
			)
		})
		.collect();

	for (index, (job_id, _, probes, file_lock)) in snapshot.iter().enumerate() {
		for quadrant in Quadrant::ALL {
			if shared.tiles.lock()[index].flag(quadrant) != HaloFlag::Unset {
				continue;
			}
			let neighbor = find_neighbor(
				probes,
				quadrant,
				snapshot
					.iter()
					.enumerate()
					.filter(|(other, _)| *other != index)
					.map(|(other, (_, bbox, _, _))| (other, *bbox)),
			);
			let Some(other) = neighbor else { continue };

			let slice = {
				let _guard = snapshot[other].3.lock();
				shared.store.read(snapshot[other].0)?.edge_slice(quadrant.mirror())
			};
			{
				let _guard = file_lock.lock();
				let mut grid = shared.store.read(*job_id)?;
				if let Err(e) = grid.apply_halo(quadrant, &slice) {
					log::warn!("local halo {quadrant:?} of job {job_id} skipped: {e}");
					continue;
				}
				shared.store.write(*job_id, &grid)?;
			}

			let mut tiles = shared.tiles.lock();
			tiles[index].set_flag(quadrant, HaloFlag::Filled);
			if tiles[index].fully_supplied() {
				tiles[index].status = JobStatus::Rendering;
			}
		}
	}
	Ok(())
}

/// Resolves still-unset quadrants of loaded tiles against the remote tile
/// directory and sends edge requests to the owners. Quadrants move to
/// `Requested` before anything touches the network, so a request is issued
/// at most once.
pub fn request_remote_edges(shared: &WorkerShared) -> Result<()> {
	let mut plan: Vec<(usize, Frame)> = Vec::new();
	{
		let registry = shared.registry.lock();
		let mut tiles = shared.tiles.lock();
		for tile in tiles.iter_mut() {
			if tile.status != JobStatus::Loaded {
				continue;
			}
			for quadrant in Quadrant::ALL {
				if tile.flag(quadrant) != HaloFlag::Unset {
					continue;
				}
				let candidates = registry
					.tiles()
					.iter()
					.enumerate()
					.filter_map(|(i, remote)| remote.bbox.map(|bbox| (i, bbox)));
				let Some(found) = find_neighbor(&tile.probes, quadrant, candidates) else {
					continue;
				};
				let remote = &registry.tiles()[found];
				tile.set_flag(quadrant, HaloFlag::Requested);
				plan.push((
					remote.owner,
					Frame::ReqEdge(ReqEdge {
						quadrant: quadrant.mirror(),
						requesting_job_id: tile.job_id,
						requested_job_id: remote.job_id,
					}),
				));
			}
		}
	}

	for (owner, frame) in plan {
		send_to_peer(shared, owner, &frame);
	}
	Ok(())
}

/// Announces a job state (with its bounding box) to every peer, and to the
/// primary when a connection is given.
pub fn broadcast_job_status(
	shared: &WorkerShared,
	primary: Option<&Conn>,
	job_id: u16,
	status: JobStatus,
	bbox: GeoBBox,
) -> Result<()> {
	let frame = Frame::Status(Status {
		status,
		job_id,
		sender_id: shared.whoami as u16,
		bbox,
	});
	broadcast(shared, &frame);
	if let Some(primary) = primary {
		primary.send(&frame)?;
	}
	Ok(())
}

/// Announces a worker-global state to every peer.
pub fn broadcast_global_status(shared: &WorkerShared, status: JobStatus) {
	broadcast(
		shared,
		&Frame::Status(Status {
			status,
			job_id: GLOBAL_JOB_ID,
			sender_id: shared.whoami as u16,
			bbox: GeoBBox::from_edges(0.0, 0.0, 0.0, 0.0),
		}),
	);
}

/// Announces this worker's elevation extremes to every peer.
pub fn broadcast_min_max(shared: &WorkerShared) {
	let (min, max) = {
		let extremes = shared.extremes.lock();
		(extremes.local_min, extremes.local_max)
	};
	broadcast(shared, &Frame::MinMax { min, max });
}

fn broadcast(shared: &WorkerShared, frame: &Frame) {
	let node_count = shared.registry.lock().node_count();
	for index in 0..node_count {
		if index == shared.whoami {
			continue;
		}
		send_to_peer(shared, index, frame);
	}
}

/// Sends one frame on the outbound connection to a peer, connecting lazily.
/// Send failures are logged and the link reset; the peer protocol has no
/// retransmission, so the frame is simply gone (the peer is LOST).
fn send_to_peer(shared: &WorkerShared, index: usize, frame: &Frame) {
	let addr = shared.registry.lock().addr(index).to_string();
	match shared.links.get_or_connect(index, &addr) {
		Ok(conn) => {
			if let Err(e) = conn.send(frame) {
				log::warn!("send to peer {addr} failed: {e:#}");
				shared.links.reset(index);
			}
		}
		Err(e) => log::warn!("cannot reach peer {addr}: {e:#}"),
	}
}
