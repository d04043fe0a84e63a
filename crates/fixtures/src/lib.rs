#![deny(unsafe_code)]
//! Test-fixture production for gauss-grid: `.npy` grids with JSON
//! sidecars, measured spectra on disk, the per-seed validation pipeline and
//! the comparison plot.
//!
//! The plot's pixel buffer is built in [`raster`] (always available); PNG
//! encoding in [`plot`] is gated behind the `png` feature.

mod font;
pub mod grid_file;
pub mod pipeline;
pub mod raster;
pub mod spectrum_file;

#[cfg(feature = "png")]
pub mod plot;

pub use grid_file::{load_grid, load_grid_with_metadata, save_grid, GridMetadata};
pub use pipeline::{GridStats, Pipeline, RunReport, SeedFailure, SeedRecord};
pub use spectrum_file::{load_spectrum, save_spectrum};
