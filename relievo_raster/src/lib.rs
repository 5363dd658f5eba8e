//! Raster side of the relievo renderer.
//!
//! Everything that touches elevation cells lives here: the halo-carrying
//! elevation grid, the on-disk tile store, GeoTIFF decoding, the adjacency
//! probes, the pixel kernels (water detection, relief shading, colorize),
//! scaling, projection resampling and the per-tile render pipeline.

pub mod adjacency;
pub mod geotiff;
pub mod kernels;
pub mod matrix;
pub mod project;
pub mod render;
pub mod scale;
pub mod store;

pub use adjacency::{HaloProbes, find_neighbor};
pub use geotiff::DecodedTile;
pub use matrix::ElevationGrid;
pub use render::{RenderOptions, render_tile, write_png};
pub use store::TileStore;
