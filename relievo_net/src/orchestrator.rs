//! The worker session: init → load → exchange → render → return.

use crate::exchange;
use crate::fetch;
use crate::shared::{LocalTile, WorkerShared};
use anyhow::{Context, Result, anyhow, bail, ensure};
use relievo_core::{
	ColorScheme, ErrorKind, GeoBBox, JobStatus, PEER_PORT, PRIMARY_PORT, UiState,
};
use relievo_proto::{Conn, Frame, Png, Status, TiffPayload};
use relievo_raster::{
	HaloProbes, RenderOptions, TileStore, geotiff, project::apply_projection, render_tile,
};
use std::io::Cursor;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;

pub struct WorkerConfig {
	pub primary_port: u16,
	pub peer_port: u16,
	pub work_dir: PathBuf,
}

impl Default for WorkerConfig {
	fn default() -> Self {
		WorkerConfig {
			primary_port: PRIMARY_PORT,
			peer_port: PEER_PORT,
			work_dir: std::env::temp_dir(),
		}
	}
}

/// Waits for the primary to connect, then runs one render session and
/// returns when the primary has sent its terminator.
pub fn run_worker(config: &WorkerConfig) -> Result<()> {
	let listener = TcpListener::bind(("0.0.0.0", config.primary_port)).map_err(|e| {
		anyhow!(ErrorKind::ConnectFailure).context(format!("binding port {}: {e}", config.primary_port))
	})?;
	log::info!("waiting for primary on port {}", config.primary_port);
	let (stream, addr) = listener.accept().context("accepting primary connection")?;
	let primary = Conn::from_stream(stream, addr.to_string());
	run_session(&primary, config)
}

/// Drives one complete session over an established primary connection.
pub fn run_session(primary: &Conn, config: &WorkerConfig) -> Result<()> {
	// 1. session setup
	let Frame::Init(init) = primary.recv()? else {
		bail!(ErrorKind::BadFrame);
	};
	let Frame::Nodes(nodes) = primary.recv()? else {
		bail!(ErrorKind::BadFrame);
	};
	let whoami = init.worker_index as usize;
	ensure!(whoami < nodes.len(), "worker index {whoami} outside node list");
	log::info!("initialized as worker {whoami} of {}", nodes.len());

	let work_dir = config.work_dir.join(format!("relievo_worker_{whoami}"));
	let store = TileStore::new(&work_dir)?;
	let shared = Arc::new(WorkerShared::new(
		whoami,
		nodes,
		store,
		work_dir,
		config.peer_port,
	));
	let (listener, _) = exchange::bind_peer_listener(config.peer_port)?;
	let _exchange = exchange::spawn_listener(Arc::clone(&shared), listener);

	let mut scheme = init.scheme.clone();
	let options = RenderOptions {
		water: scheme.show_water,
		relief: init.relief,
		scale: init.scale,
	};

	// 2. receive and load tiles until the stream closes
	receive_jobs(primary, &shared, init.projection)?;

	// 3. this worker's tile set is final: tell the peers, and share the
	//    local elevation extremes
	exchange::broadcast_global_status(&shared, JobStatus::Rendering);
	exchange::broadcast_min_max(&shared);

	// 4. halo quadrants whose neighbor lives here too
	exchange::fill_local_halos(&shared)?;
	for job_id in job_ids(&shared) {
		ui(primary, job_id, UiState::RemoteCheck)?;
	}

	// 5. exchange with peers and render as tiles become ready
	exchange_and_render(primary, &shared, &mut scheme, &options)?;

	// 6. hold the session until the primary releases it
	loop {
		match primary.recv()? {
			Frame::End => break,
			other => log::debug!("ignoring frame 0x{:02X} while waiting for end", other.tag()),
		}
	}
	log::info!("session complete");
	Ok(())
}

fn receive_jobs(primary: &Conn, shared: &WorkerShared, projection: relievo_core::Projection) -> Result<()> {
	loop {
		let frame = primary.recv()?;
		let Frame::Tiff(tiff) = frame else {
			bail!(ErrorKind::BadFrame);
		};
		let job_id = tiff.job_id;
		let (name, source_path) = match tiff.payload {
			TiffPayload::Empty => return Ok(()),
			TiffPayload::Url(url) => {
				let path = shared.work_dir.join(format!("src_{job_id}.tif"));
				if let Err(e) = fetch::fetch_url(&url, &path) {
					abort_job(primary, shared, job_id, &e);
					continue;
				}
				(url, path)
			}
			TiffPayload::Data { name, bytes } => {
				let path = shared.work_dir.join(format!("src_{job_id}.tif"));
				std::fs::write(&path, &bytes).with_context(|| format!("writing {path:?}"))?;
				(name, path)
			}
		};
		ui(primary, job_id, UiState::Processing)?;

		let decoded = match geotiff::decode(&source_path) {
			Ok(decoded) => decoded,
			Err(e) => {
				abort_job(primary, shared, job_id, &e);
				continue;
			}
		};
		let grid = apply_projection(&decoded.grid, &decoded.bbox, projection);
		shared
			.extremes
			.lock()
			.fold_local(grid.min_elevation(), grid.max_elevation());
		shared.store.write(job_id, &grid)?;

		let probes = HaloProbes::new(&decoded.bbox, grid.vertical_scale(), grid.horizontal_scale());
		shared
			.tiles
			.lock()
			.push(LocalTile::new(job_id, name, decoded.bbox, probes));
		exchange::broadcast_job_status(shared, Some(primary), job_id, JobStatus::Loaded, decoded.bbox)?;
		log::info!("job {job_id} loaded");
	}
}

/// The event-driven exchange loop. Every inbound peer frame wakes it; each
/// round issues any newly-possible edge requests, promotes tiles that can
/// no longer expect data, resolves a relative color scheme once the global
/// extremes are in, and renders whatever is ready.
fn exchange_and_render(
	primary: &Conn,
	shared: &Arc<WorkerShared>,
	scheme: &mut ColorScheme,
	options: &RenderOptions,
) -> Result<()> {
	let mut seen_generation = 0u64;
	loop {
		exchange::request_remote_edges(shared)?;
		promote_stalled_tiles(shared);
		if !scheme.absolute {
			try_resolve_scheme(shared, scheme);
		}
		if scheme.absolute {
			render_ready_tiles(primary, shared, scheme, options)?;
		}

		let all_done = shared
			.tiles
			.lock()
			.iter()
			.all(|tile| matches!(tile.status, JobStatus::Complete | JobStatus::Lost));
		if all_done {
			return Ok(());
		}
		shared.wait_event(&mut seen_generation);
	}
}

/// A tile stops waiting once every peer's tile directory is final and the
/// tile has no request in flight: whatever is still unset then has no
/// neighbor anywhere and stays a zero halo.
fn promote_stalled_tiles(shared: &WorkerShared) {
	if !shared.registry.lock().all_peers_rendering() {
		return;
	}
	let mut tiles = shared.tiles.lock();
	for tile in tiles.iter_mut() {
		if tile.status == JobStatus::Loaded && tile.none_requested() {
			tile.status = JobStatus::Rendering;
		}
	}
}

/// Resolves a relative scheme to absolute elevations, but only after every
/// peer has both finished loading and broadcast its extremes; all workers
/// then resolve to the same gradient.
fn try_resolve_scheme(shared: &WorkerShared, scheme: &mut ColorScheme) {
	if !shared.registry.lock().all_peers_rendering() {
		return;
	}
	let expected = shared.registry.lock().peer_count();
	let (heard, min, max) = {
		let extremes = shared.extremes.lock();
		let (min, max) = extremes.resolved();
		(extremes.heard, min, max)
	};
	if heard >= expected {
		log::info!("relative color scheme resolved over {min}..{max} m");
		scheme.resolve_relative(min, max);
	}
}

fn render_ready_tiles(
	primary: &Conn,
	shared: &WorkerShared,
	scheme: &ColorScheme,
	options: &RenderOptions,
) -> Result<()> {
	let ready: Vec<_> = shared
		.tiles
		.lock()
		.iter()
		.filter(|tile| tile.status == JobStatus::Rendering)
		.map(|tile| (tile.job_id, tile.bbox, Arc::clone(&tile.file_lock)))
		.collect();

	for (job_id, bbox, file_lock) in ready {
		ui(primary, job_id, UiState::Preparing)?;
		let grid = {
			let _guard = file_lock.lock();
			shared.store.read(job_id)?
		};

		ui(primary, job_id, UiState::Rendering)?;
		let image = render_tile(&grid, scheme, options);
		let (width, height) = image.dimensions();
		let mut bytes = Vec::new();
		if let Err(e) = image.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png) {
			let err = anyhow!(ErrorKind::PngEncodeFailure).context(format!("encoding job {job_id}: {e}"));
			abort_job(primary, shared, job_id, &err);
			continue;
		}

		{
			let mut tiles = shared.tiles.lock();
			if let Some(tile) = tiles.iter_mut().find(|tile| tile.job_id == job_id) {
				tile.status = JobStatus::Complete;
				tile.img_width = width;
				tile.img_height = height;
			}
		}

		ui(primary, job_id, UiState::Sending)?;
		primary.send(&Frame::Png(Png {
			job_id,
			img_height: height,
			img_width: width,
			bbox,
			bytes,
		}))?;
		exchange::broadcast_job_status(shared, Some(primary), job_id, JobStatus::Complete, bbox)?;
		log::info!("job {job_id} rendered ({width}x{height})");
	}
	Ok(())
}

/// A job-level failure: report it and keep every other job going.
fn abort_job(primary: &Conn, shared: &WorkerShared, job_id: u16, error: &anyhow::Error) {
	log::error!("job {job_id} failed: {error:#}");
	let mut tiles = shared.tiles.lock();
	if let Some(tile) = tiles.iter_mut().find(|tile| tile.job_id == job_id) {
		tile.status = JobStatus::Lost;
	}
	drop(tiles);
	let _ = primary.send(&Frame::Status(Status {
		status: JobStatus::Lost,
		job_id,
		sender_id: shared.whoami as u16,
		bbox: GeoBBox::from_edges(0.0, 0.0, 0.0, 0.0),
	}));
}

fn job_ids(shared: &WorkerShared) -> Vec<u16> {
	shared.tiles.lock().iter().map(|tile| tile.job_id).collect()
}

fn ui(primary: &Conn, job_id: u16, state: UiState) -> Result<()> {
	primary.send(&Frame::UiUpdate { job_id, state })
}
