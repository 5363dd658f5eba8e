use super::{DispatchContext, DispatchOptions};
use anyhow::{Result, anyhow, bail};
use relievo_core::{DispatchState, ErrorKind, GLOBAL_JOB_ID, JobStatus, UiState};
use relievo_proto::{Conn, Frame, Init, Status, Tiff, TiffPayload};
use relievo_net::fetch;
use std::collections::HashSet;

/// Drives one worker's conversation. Any error makes the worker LOST: its
/// jobs will not be rendered, every other worker keeps going.
pub fn run(
	ctx: &DispatchContext,
	index: usize,
	conn: &Conn,
	options: &DispatchOptions,
	all_addrs: Vec<String>,
) {
	if let Err(e) = session(ctx, index, conn, options, all_addrs) {
		log::error!("worker {} lost: {e:#}", ctx.workers[index].addr);
		mark_worker_lost(ctx, index);
	}
	ctx.notify_main();
}

fn session(
	ctx: &DispatchContext,
	index: usize,
	conn: &Conn,
	options: &DispatchOptions,
	all_addrs: Vec<String>,
) -> Result<()> {
	conn.send(&Frame::Init(Init {
		scheme: options.scheme.clone(),
		worker_index: index as u8,
		relief: options.relief,
		projection: options.projection,
		scale: options.scale,
	}))?;
	conn.send(&Frame::Nodes(all_addrs))?;

	loop {
		// sleep until the dispatcher assigns a job or flips `complete`
		let assignment = {
			let slot = &ctx.workers[index];
			let mut state = slot.state.lock();
			while !state.ready {
				slot.ready.wait(&mut state);
			}
			state.ready = false;
			if state.complete {
				None
			} else {
				state.owned.last().copied()
			}
		};
		let Some(job_id) = assignment else { break };

		send_job(ctx, conn, job_id)?;
		ctx.ui.job_state(job_id, UiState::Receiving);

		// the worker answers with UI updates and finally a status change
		loop {
			match conn.recv()? {
				Frame::UiUpdate { job_id, state } => ctx.ui.job_state(job_id, state),
				Frame::Status(status) if status.job_id == GLOBAL_JOB_ID => {}
				Frame::Status(status) => {
					apply_job_status(ctx, &status);
					if status.status != JobStatus::Lost {
						ctx.ui.job_state(status.job_id, UiState::LocalCheck);
					}
					break;
				}
				other => {
					bail!(anyhow!(ErrorKind::BadFrame)
						.context(format!("unexpected frame 0x{:02X} while awaiting status", other.tag())))
				}
			}
		}

		// idle again; the main loop may assign the next job
		ctx.workers[index].state.lock().dispatch = DispatchState::NoJob;
		ctx.notify_main();
	}

	// no more jobs: close the stream and collect what the worker renders
	conn.send(&Frame::Tiff(Tiff {
		job_id: 0,
		payload: TiffPayload::Empty,
	}))?;
	drain(ctx, index, conn)
}

/// Sends one Tiff frame: URL sources travel as the URL alone, local files
/// are read fully first and shipped inside the frame.
fn send_job(ctx: &DispatchContext, conn: &Conn, job_id: u16) -> Result<()> {
	let source = {
		let jobs = ctx.jobs.lock();
		jobs[job_id as usize].source.clone()
	};
	let payload = if fetch::is_url(&source) {
		TiffPayload::Url(source)
	} else {
		let bytes = std::fs::read(&source)
			.map_err(|e| anyhow!(ErrorKind::MissingFile).context(format!("reading {source}: {e}")))?;
		TiffPayload::Data { name: source, bytes }
	};
	conn.send(&Frame::Tiff(Tiff { job_id, payload }))
}

/// After the terminator: statuses, UI updates and PNGs arrive in any order
/// until every owned job has either returned a PNG or been declared lost.
fn drain(ctx: &DispatchContext, index: usize, conn: &Conn) -> Result<()> {
	let owned: Vec<u16> = ctx.workers[index].state.lock().owned.clone();
	let mut received: HashSet<u16> = HashSet::new();
	// jobs already lost during the assignment phase will never send a PNG
	let mut lost: HashSet<u16> = {
		let jobs = ctx.jobs.lock();
		owned
			.iter()
			.copied()
			.filter(|id| jobs[*id as usize].status == JobStatus::Lost)
			.collect()
	};

	while received.len() + lost.len() < owned.len() {
		match conn.recv()? {
			Frame::Status(status) if status.job_id == GLOBAL_JOB_ID => {}
			Frame::Status(status) => {
				apply_job_status(ctx, &status);
				if status.status == JobStatus::Lost && owned.contains(&status.job_id) {
					lost.insert(status.job_id);
					ctx.notify_main();
				}
			}
			Frame::UiUpdate { job_id, state } => ctx.ui.job_state(job_id, state),
			Frame::Png(png) => {
				ctx.catalog.add_png(&png)?;
				{
					let mut jobs = ctx.jobs.lock();
					if let Some(job) = jobs.iter_mut().find(|job| job.id == png.job_id) {
						job.bbox = Some(png.bbox);
					}
				}
				ctx.ui.job_state(png.job_id, UiState::Complete);
				if owned.contains(&png.job_id) {
					received.insert(png.job_id);
				}
				ctx.notify_main();
			}
			other => {
				bail!(anyhow!(ErrorKind::BadFrame)
					.context(format!("unexpected frame 0x{:02X} while draining", other.tag())))
			}
		}
	}
	Ok(())
}

/// Job-scoped status from the worker: advance the job and remember its
/// bounding box (repeats are idempotent, last writer wins on the box).
fn apply_job_status(ctx: &DispatchContext, status: &Status) {
	if status.status == JobStatus::Lost {
		ctx.mark_job_lost(status.job_id);
		return;
	}
	let mut jobs = ctx.jobs.lock();
	if let Some(job) = jobs.iter_mut().find(|job| job.id == status.job_id) {
		job.status = status.status;
		job.bbox = Some(status.bbox);
	}
}

fn mark_worker_lost(ctx: &DispatchContext, index: usize) {
	let owned = {
		let mut state = ctx.workers[index].state.lock();
		state.dispatch = DispatchState::Lost;
		state.owned.clone()
	};
	for job_id in owned {
		ctx.mark_job_lost(job_id);
	}
}
