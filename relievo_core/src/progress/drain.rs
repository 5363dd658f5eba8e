use super::UiSink;
use crate::types::UiState;

/// A sink that swallows every notification. Used in quiet mode, on workers
/// and in tests.
pub struct UiDrain;

impl UiSink for UiDrain {
	fn job_state(&self, _job_id: u16, _state: UiState) {}

	fn stitch_progress(&self, _done: u64, _total: u64) {}
}
