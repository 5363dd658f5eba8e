use anyhow::{Result, anyhow};
use clap::Args;
use relievo::dispatch::{self, DispatchOptions};
use relievo::{local, nodes, stitch};
use relievo_core::{
	ColorScheme, ErrorKind, PRIMARY_PORT, Projection, Quadrant, progress::get_ui_sink,
};
use std::path::PathBuf;

#[derive(Args, Debug)]
#[command(arg_required_else_help = true)]
pub struct Subcommand {
	/// GeoTIFF files or URLs to render, one tile each
	#[arg(required = true)]
	sources: Vec<String>,

	/// Color scheme file; without it a relative black→white ramp is used
	#[arg(long, short = 'c')]
	colors: Option<PathBuf>,

	/// Destination list file; renders distributed across these workers
	#[arg(long, short = 'd')]
	nodes: Option<PathBuf>,

	/// Output PNG path
	#[arg(long, short = 'o', default_value = "out.png")]
	output: PathBuf,

	/// Map projection of the output
	#[arg(long, short = 'p', default_value = "EQUIRECTANGULAR")]
	projection: String,

	/// Relief shading with light from this direction (N, S, E, W, NE, NW, SE, SW)
	#[arg(long, short = 'r')]
	relief: Option<String>,

	/// Scale the output by this factor
	#[arg(long, short = 's', default_value_t = 1.0)]
	scale: f64,

	/// Detect bodies of water and paint them with the scheme's water color
	#[arg(long, short = 'w')]
	water: bool,

	/// Suppress the progress display
	#[arg(long, short = 'q')]
	quiet: bool,

	/// Port workers listen on for the primary
	#[arg(long, default_value_t = PRIMARY_PORT)]
	port: u16,

	/// Scratch directory for tiles in transit
	#[arg(long)]
	work_dir: Option<PathBuf>,
}

pub fn run(args: &Subcommand) -> Result<()> {
	let projection = match args.projection.as_str() {
		"EQUIRECTANGULAR" => Projection::Equirectangular,
		"MERCATOR" => Projection::Mercator,
		other => {
			return Err(
				anyhow!(ErrorKind::BadInvocation).context(format!("{other} is not a recognized projection")),
			);
		}
	};
	let relief = match &args.relief {
		Some(direction) => Some(
			Quadrant::from_compass(direction)
				.map_err(|e| anyhow!(ErrorKind::BadInvocation).context(format!("{e}")))?,
		),
		None => None,
	};
	let mut scheme = match &args.colors {
		Some(path) => ColorScheme::from_file(path, args.water)?,
		None => ColorScheme::default_relative(),
	};
	scheme.show_water = args.water && scheme.water.is_some();

	let ui = get_ui_sink(args.quiet, args.sources.clone());
	let work_dir = args.work_dir.clone().unwrap_or_else(std::env::temp_dir);
	let options = DispatchOptions {
		scheme,
		relief,
		projection,
		scale: args.scale,
		primary_port: args.port,
	};

	let tiles = match &args.nodes {
		Some(destinations) => {
			let addrs = nodes::load_destinations(destinations)?;
			log::info!("dispatching {} jobs to {} workers", args.sources.len(), addrs.len());
			dispatch::run_distributed(
				&args.sources,
				&addrs,
				&options,
				&work_dir.join("relievo_tiles"),
				ui.clone(),
			)?
		}
		None => local::run_local(&args.sources, &options, &work_dir, &ui)?,
	};

	stitch::stitch(tiles, &args.output, ui.as_ref())?;
	log::info!("wrote {:?}", args.output);
	Ok(())
}
