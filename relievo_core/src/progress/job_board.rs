use super::UiSink;
use crate::types::UiState;
use colored::Colorize;
use parking_lot::Mutex;
use std::io::{self, Write};
use terminal_size::{Width, terminal_size};

/// Terminal progress board: one line per job state transition, plus a
/// carriage-return progress line while stitching.
pub struct JobBoard {
	rows: Mutex<Vec<JobRow>>,
}

struct JobRow {
	name: String,
	state: UiState,
}

impl JobBoard {
	pub fn new(job_names: Vec<String>) -> JobBoard {
		JobBoard {
			rows: Mutex::new(
				job_names
					.into_iter()
					.map(|name| JobRow {
						name,
						state: UiState::Pending,
					})
					.collect(),
			),
		}
	}

	fn print_line(&self, line: &str) {
		let width = terminal_size().map_or(100, |(Width(w), _)| w as usize);
		let mut stderr = io::stderr();
		let _ = writeln!(stderr, "{:.width$}", line, width = width);
	}
}

impl UiSink for JobBoard {
	fn job_state(&self, job_id: u16, state: UiState) {
		let mut rows = self.rows.lock();
		let Some(row) = rows.get_mut(job_id as usize) else {
			return;
		};
		if row.state == state {
			return;
		}
		row.state = state;
		let label = if state == UiState::Complete {
			state.label().green().to_string()
		} else {
			state.label().cyan().to_string()
		};
		let line = format!("[{:>3}%] #{job_id} {}: {label}", state.percent(), row.name);
		drop(rows);
		self.print_line(&line);
	}

	fn stitch_progress(&self, done: u64, total: u64) {
		let percent = if total == 0 { 100 } else { done * 100 / total };
		let mut stderr = io::stderr();
		let _ = write!(stderr, "\rstitching: {percent:>3}%");
		if done >= total {
			let _ = stderr.write_all(b"\n");
		}
		let _ = stderr.flush();
	}
}
