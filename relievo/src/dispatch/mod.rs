//! Job dispatch: the primary's side of the primary ↔ worker protocol.
//!
//! One thread per worker drives that worker's conversation; the main loop
//! below hands out jobs whenever a worker reports idle and sleeps on a
//! shared condition until any worker changes state or a PNG arrives.

mod worker_link;

use crate::catalog::{FinalTile, TileCatalog};
use anyhow::{Result, anyhow};
use parking_lot::{Condvar, Mutex};
use relievo_core::{
	ColorScheme, DispatchState, ErrorKind, GeoBBox, JobStatus, Projection, Quadrant, UiState,
	progress::UiSink,
};
use relievo_proto::{Conn, Frame};
use std::path::Path;
use std::sync::Arc;
use std::thread;

/// Session-wide render settings, shipped to every worker in its Init frame.
#[derive(Clone)]
pub struct DispatchOptions {
	pub scheme: ColorScheme,
	pub relief: Option<Quadrant>,
	pub projection: Projection,
	pub scale: f64,
	pub primary_port: u16,
}

/// One render job as the primary sees it.
#[derive(Debug, Clone)]
pub struct Job {
	pub id: u16,
	pub source: String,
	pub status: JobStatus,
	pub bbox: Option<GeoBBox>,
}

struct SlotState {
	dispatch: DispatchState,
	owned: Vec<u16>,
	ready: bool,
	complete: bool,
}

/// The primary's view of one worker: its address, its dispatch state, and
/// the signalling pair its link thread sleeps on.
pub struct WorkerSlot {
	pub addr: String,
	state: Mutex<SlotState>,
	ready: Condvar,
}

impl WorkerSlot {
	fn new(addr: String) -> WorkerSlot {
		WorkerSlot {
			addr,
			state: Mutex::new(SlotState {
				dispatch: DispatchState::NoJob,
				owned: Vec::new(),
				ready: false,
				complete: false,
			}),
			ready: Condvar::new(),
		}
	}
}

/// Everything the dispatcher threads share. Held in one value and passed
/// into each per-worker task; there is no module-level state.
pub struct DispatchContext {
	pub jobs: Mutex<Vec<Job>>,
	pub workers: Vec<WorkerSlot>,
	pub catalog: TileCatalog,
	pub ui: Arc<dyn UiSink>,
	lost_jobs: Mutex<usize>,
	wake_generation: Mutex<u64>,
	wake: Condvar,
}

impl DispatchContext {
	fn new(jobs: Vec<Job>, addrs: &[String], catalog: TileCatalog, ui: Arc<dyn UiSink>) -> DispatchContext {
		DispatchContext {
			jobs: Mutex::new(jobs),
			workers: addrs.iter().map(|addr| WorkerSlot::new(addr.clone())).collect(),
			catalog,
			ui,
			lost_jobs: Mutex::new(0),
			wake_generation: Mutex::new(0),
			wake: Condvar::new(),
		}
	}

	/// Wakes the main loop: a worker transitioned or a PNG arrived.
	fn notify_main(&self) {
		*self.wake_generation.lock() += 1;
		self.wake.notify_all();
	}

	fn wait_main(&self, seen: &mut u64) {
		let mut generation = self.wake_generation.lock();
		while *generation == *seen {
			self.wake.wait(&mut generation);
		}
		*seen = *generation;
	}

	fn lost(&self) -> usize {
		*self.lost_jobs.lock()
	}

	/// Marks a job lost (idempotently) and accounts for it in the exit
	/// condition.
	fn mark_job_lost(&self, job_id: u16) {
		let mut jobs = self.jobs.lock();
		if let Some(job) = jobs.iter_mut().find(|job| job.id == job_id) {
			if job.status != JobStatus::Lost && job.status != JobStatus::Complete {
				job.status = JobStatus::Lost;
				*self.lost_jobs.lock() += 1;
			}
		}
	}

	fn all_workers_lost(&self) -> bool {
		self
			.workers
			.iter()
			.all(|slot| slot.state.lock().dispatch == DispatchState::Lost)
	}
}

/// Runs the distributed render: connects the workers, dispatches every job,
/// collects one PNG per job (LOST jobs excepted) and returns the catalog
/// content for stitching.
pub fn run_distributed(
	sources: &[String],
	addrs: &[String],
	options: &DispatchOptions,
	catalog_dir: &Path,
	ui: Arc<dyn UiSink>,
) -> Result<Vec<FinalTile>> {
	if addrs.is_empty() {
		return Err(anyhow!(ErrorKind::BadInvocation).context("no worker addresses"));
	}
	let jobs: Vec<Job> = sources
		.iter()
		.enumerate()
		.map(|(id, source)| Job {
			id: id as u16,
			source: source.clone(),
			status: JobStatus::Pending,
			bbox: None,
		})
		.collect();
	let total = jobs.len();
	let catalog = TileCatalog::new(catalog_dir)?;
	let ctx = Arc::new(DispatchContext::new(jobs, addrs, catalog, ui));

	// connect everyone up front; a worker that cannot be reached at startup
	// is fatal for the whole run
	let mut conns = Vec::with_capacity(addrs.len());
	for addr in addrs {
		conns.push(Arc::new(Conn::connect(addr, options.primary_port)?));
	}

	let mut links = Vec::with_capacity(conns.len());
	for (index, conn) in conns.iter().enumerate() {
		let ctx = Arc::clone(&ctx);
		let conn = Arc::clone(conn);
		let options = options.clone();
		let all_addrs: Vec<String> = addrs.to_vec();
		links.push(thread::spawn(move || {
			worker_link::run(&ctx, index, &conn, &options, all_addrs);
		}));
	}

	let mut seen = 0u64;
	loop {
		distribute(&ctx);
		if ctx.catalog.len() + ctx.lost() >= total {
			break;
		}
		if ctx.all_workers_lost() {
			// nobody left to render the remaining jobs
			let pending: Vec<u16> = ctx
				.jobs
				.lock()
				.iter()
				.filter(|job| job.status != JobStatus::Complete && job.status != JobStatus::Lost)
				.map(|job| job.id)
				.collect();
			for job_id in pending {
				ctx.mark_job_lost(job_id);
			}
			continue;
		}
		ctx.wait_main(&mut seen);
	}

	for link in links {
		let _ = link.join();
	}
	for conn in &conns {
		let _ = conn.send(&Frame::End);
	}

	let lost = ctx.lost();
	if lost > 0 {
		log::warn!("{lost} of {total} jobs were lost; the final image will have gaps");
	}
	Ok(ctx.catalog.tiles())
}

/// Hands a pending job to every idle worker; workers with nothing left to
/// receive get their completion flag and one final signal.
fn distribute(ctx: &DispatchContext) {
	for slot in &ctx.workers {
		let mut state = slot.state.lock();
		if state.dispatch != DispatchState::NoJob {
			continue;
		}
		let mut jobs = ctx.jobs.lock();
		match jobs.iter_mut().find(|job| job.status == JobStatus::Pending) {
			Some(job) => {
				job.status = JobStatus::InProgress;
				state.dispatch = DispatchState::InProgress;
				state.owned.push(job.id);
				state.ready = true;
				ctx.ui.job_state(job.id, UiState::Pending);
				slot.ready.notify_one();
			}
			None => {
				if !state.complete {
					state.complete = true;
					state.ready = true;
					state.dispatch = DispatchState::Complete;
					slot.ready.notify_one();
				}
			}
		}
	}
}
