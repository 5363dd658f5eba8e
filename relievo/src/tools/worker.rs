use anyhow::Result;
use clap::Args;
use relievo_core::{PEER_PORT, PRIMARY_PORT};
use relievo_net::{WorkerConfig, run_worker};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct Subcommand {
	/// Port to accept the primary on
	#[arg(long, default_value_t = PRIMARY_PORT)]
	port: u16,

	/// Port to accept peer workers on
	#[arg(long, default_value_t = PEER_PORT)]
	peer_port: u16,

	/// Scratch directory for received tiles
	#[arg(long)]
	work_dir: Option<PathBuf>,
}

pub fn run(args: &Subcommand) -> Result<()> {
	run_worker(&WorkerConfig {
		primary_port: args.port,
		peer_port: args.peer_port,
		work_dir: args.work_dir.clone().unwrap_or_else(std::env::temp_dir),
	})
}
