#![deny(unsafe_code)]
//! Core types for gauss-grid, a generator of synthetic density grids with a
//! known power spectrum.
//!
//! Provides the `PowerSpectrum` trait and synthetic spectra, the periodic
//! `Grid`, cubic FFTs, the `GaussianFieldGenerator`, the shell-averaging
//! `SpectrumEstimator` with its validation report, and `RunConfig`.

pub mod config;
pub mod error;
pub mod estimator;
pub mod fft;
pub mod generator;
pub mod grid;
pub mod params;
pub mod prng;
pub mod spectrum;
pub mod validate;

pub use config::RunConfig;
pub use error::GridError;
pub use estimator::{average, measure, MeasuredSpectrum, ShellBinning, SpectrumBin, SpectrumEstimator};
pub use generator::{generate, GaussianFieldGenerator, GeneratorOptions};
pub use grid::Grid;
pub use spectrum::{ConstantPower, PowerLaw, PowerSpectrum, TabulatedPower};
pub use validate::{BinCheck, ValidationReport};
