//! Progress reporting for render jobs.
//!
//! The dispatcher and the worker orchestrator report job state transitions
//! through the narrow [`UiSink`] trait; the terminal board renders them and
//! the drain swallows them (quiet mode, workers, tests).

mod drain;
mod job_board;
mod traits;

pub use drain::UiDrain;
pub use job_board::JobBoard;
pub use traits::{UiSink, get_ui_sink};
