use super::{JobBoard, UiDrain};
use crate::types::UiState;
use std::sync::Arc;

/// Receiver of job progress notifications.
///
/// Implementations must tolerate repeated announcements of the same state;
/// every notification is idempotent per state.
pub trait UiSink: Send + Sync {
	/// A job moved to `state` (or re-announced it).
	fn job_state(&self, job_id: u16, state: UiState);

	/// The final stitch advanced to `done` of `total` output rows.
	fn stitch_progress(&self, done: u64, total: u64);
}

/// Creates a terminal job board, or a silent drain when `quiet` is set.
pub fn get_ui_sink(quiet: bool, job_names: Vec<String>) -> Arc<dyn UiSink> {
	if quiet {
		Arc::new(UiDrain)
	} else {
		Arc::new(JobBoard::new(job_names))
	}
}
