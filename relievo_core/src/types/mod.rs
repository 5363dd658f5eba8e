mod color_scheme;
mod geo_bbox;
mod status;

pub use color_scheme::{ColorScheme, ColorStop, Rgb};
pub use geo_bbox::GeoBBox;
pub use status::{DispatchState, JobStatus, Projection, Quadrant, UiState};
