mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{ErrorLevel, Verbosity};

#[derive(Parser, Debug)]
#[command(
	author,
	version,
	about,
	long_about = None,
	propagate_version = true,
	disable_help_subcommand = true,
)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[command(flatten)]
	verbose: Verbosity<ErrorLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Render elevation rasters into one shaded relief image
	Render(tools::render::Subcommand),

	/// Wait for a primary and render tiles on its behalf
	Worker(tools::worker::Subcommand),
}

fn main() {
	let cli = Cli::parse();

	env_logger::Builder::new()
		.filter_level(cli.verbose.log_level_filter())
		.format_timestamp(None)
		.init();

	if let Err(error) = run(&cli) {
		eprintln!("Error: {error:#}");
		std::process::exit(relievo_core::error::exit_code(&error));
	}
}

fn run(cli: &Cli) -> Result<()> {
	match &cli.command {
		Commands::Render(arguments) => tools::render::run(arguments),
		Commands::Worker(arguments) => tools::worker::run(arguments),
	}
}
