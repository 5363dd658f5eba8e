//! Single-process rendering: no primary/worker split, no peers.
//!
//! The same load → local adjacency → render pipeline the workers run, driven
//! inline. With no peers, every halo quadrant that the local pass leaves
//! unfilled is permanently unset, and a relative color scheme resolves from
//! the local extremes alone.

use crate::catalog::{FinalTile, TileCatalog};
use crate::dispatch::DispatchOptions;
use anyhow::Result;
use relievo_core::{JobStatus, UiState, progress::UiSink};
use relievo_net::exchange;
use relievo_net::fetch;
use relievo_net::shared::{LocalTile, WorkerShared};
use relievo_raster::{
	HaloProbes, RenderOptions, TileStore, geotiff, project::apply_projection, render_tile, write_png,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub fn run_local(
	sources: &[String],
	options: &DispatchOptions,
	work_dir: &Path,
	ui: &Arc<dyn UiSink>,
) -> Result<Vec<FinalTile>> {
	let store_dir = work_dir.join("relievo_local");
	let store = TileStore::new(&store_dir)?;
	let shared = Arc::new(WorkerShared::new(0, Vec::new(), store, store_dir, 0));
	let catalog = TileCatalog::new(work_dir.join("relievo_tiles"))?;

	let mut scheme = options.scheme.clone();
	let render_options = RenderOptions {
		water: scheme.show_water,
		relief: options.relief,
		scale: options.scale,
	};

	// load every tile into the store
	for (index, source) in sources.iter().enumerate() {
		let job_id = index as u16;
		ui.job_state(job_id, UiState::Receiving);
		let path = if fetch::is_url(source) {
			let path = shared.work_dir.join(format!("src_{job_id}.tif"));
			fetch::fetch_url(source, &path)?;
			path
		} else {
			PathBuf::from(source)
		};

		ui.job_state(job_id, UiState::Processing);
		let decoded = geotiff::decode(&path)?;
		let grid = apply_projection(&decoded.grid, &decoded.bbox, options.projection);
		shared
			.extremes
			.lock()
			.fold_local(grid.min_elevation(), grid.max_elevation());
		shared.store.write(job_id, &grid)?;
		let probes = HaloProbes::new(&decoded.bbox, grid.vertical_scale(), grid.horizontal_scale());
		shared
			.tiles
			.lock()
			.push(LocalTile::new(job_id, source.clone(), decoded.bbox, probes));
		ui.job_state(job_id, UiState::LocalCheck);
	}

	// neighbors are all local; whatever stays unset has none
	exchange::fill_local_halos(&shared)?;
	for tile in shared.tiles.lock().iter_mut() {
		if tile.status == JobStatus::Loaded {
			tile.status = JobStatus::Rendering;
		}
	}

	if !scheme.absolute {
		let (min, max) = shared.extremes.lock().resolved();
		scheme.resolve_relative(min, max);
	}

	// render everything
	let ready: Vec<_> = shared
		.tiles
		.lock()
		.iter()
		.map(|tile| (tile.job_id, tile.bbox))
		.collect();
	for (job_id, bbox) in ready {
		ui.job_state(job_id, UiState::Rendering);
		let grid = shared.store.read(job_id)?;
		let image = render_tile(&grid, &scheme, &render_options);
		let path = catalog.dir().join(format!("tile_{job_id}.png"));
		write_png(&image, &path)?;
		let (width, height) = image.dimensions();
		catalog.add_file(job_id, path, width, height, bbox);
		ui.job_state(job_id, UiState::Complete);
	}

	Ok(catalog.tiles())
}
