//! Reproducible description of a fixture run.
//!
//! A [`RunConfig`] captures everything needed to regenerate a set of test
//! grids: box and grid size, seeds, redshift, spectrum model and its
//! parameters, shell layout and output location. Two identical configs fed
//! to the same binary produce bit-identical grids.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GridError;
use crate::estimator::ShellBinning;
use crate::fft::fundamental_wavenumber;
use crate::generator::GeneratorOptions;
use crate::grid::{cell_count, check_box_size};

fn default_box_size() -> f64 {
    1000.0
}

fn default_grid_size() -> usize {
    512
}

fn default_seeds() -> Vec<u64> {
    vec![1, 2]
}

fn default_spectrum() -> String {
    "linear-lcdm".to_owned()
}

fn default_params() -> Value {
    Value::Object(serde_json::Map::new())
}

fn default_plot() -> bool {
    true
}

/// Settings for one fixture run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Box side length in Mpc/h.
    #[serde(default = "default_box_size")]
    pub box_size: f64,
    /// Cells per side.
    #[serde(default = "default_grid_size")]
    pub grid_size: usize,
    /// One realization per seed, in order.
    #[serde(default = "default_seeds")]
    pub seeds: Vec<u64>,
    /// Redshift handed to cosmological spectrum models.
    #[serde(default)]
    pub redshift: f64,
    /// Spectrum model name understood by the registry.
    #[serde(default = "default_spectrum")]
    pub spectrum: String,
    /// Model parameters as a JSON object.
    #[serde(default = "default_params")]
    pub spectrum_params: Value,
    /// Directory receiving grids, spectra and the plot.
    pub output_dir: PathBuf,
    /// File name prefix; defaults to `test_grid_<N>_`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Shell width; defaults to the fundamental wavenumber `2π/L`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dk: Option<f64>,
    /// First shell edge; defaults to `dk / 2`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kmin: Option<f64>,
    #[serde(default)]
    pub options: GeneratorOptions,
    /// Write `pk_comparison.png` after the loop.
    #[serde(default = "default_plot")]
    pub plot: bool,
    /// Continue with later seeds after a failed one.
    #[serde(default)]
    pub keep_going: bool,
}

impl RunConfig {
    /// Creates a config with the reference defaults: `L = 1000`, `N = 512`,
    /// `z = 0`, seeds `[1, 2]`, linear ΛCDM spectrum.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            box_size: default_box_size(),
            grid_size: default_grid_size(),
            seeds: default_seeds(),
            redshift: 0.0,
            spectrum: default_spectrum(),
            spectrum_params: default_params(),
            output_dir: output_dir.into(),
            prefix: None,
            dk: None,
            kmin: None,
            options: GeneratorOptions::default(),
            plot: default_plot(),
            keep_going: false,
        }
    }

    /// Reads a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self, GridError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            GridError::Persistence(format!("cannot read config {}: {e}", path.display()))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            GridError::invalid(format!("malformed config {}: {e}", path.display()))
        })
    }

    /// File name prefix in effect.
    pub fn file_prefix(&self) -> String {
        self.prefix
            .clone()
            .unwrap_or_else(|| format!("test_grid_{}_", self.grid_size))
    }

    /// Shell layout in effect.
    pub fn binning(&self) -> Result<ShellBinning, GridError> {
        check_box_size(self.box_size)?;
        let dk = self
            .dk
            .unwrap_or_else(|| fundamental_wavenumber(self.box_size));
        ShellBinning::new(dk, self.kmin.unwrap_or(0.5 * dk))
    }

    /// Validates sizes, seeds, redshift and shell layout.
    pub fn validate(&self) -> Result<(), GridError> {
        check_box_size(self.box_size)?;
        cell_count(self.grid_size)?;
        if self.seeds.is_empty() {
            return Err(GridError::invalid("at least one seed is required"));
        }
        if let Some(dup) = self
            .seeds
            .iter()
            .enumerate()
            .find_map(|(i, s)| self.seeds[..i].contains(s).then_some(*s))
        {
            return Err(GridError::invalid(format!(
                "seed {dup} is listed twice; its files would collide"
            )));
        }
        if !self.redshift.is_finite() || self.redshift < 0.0 {
            return Err(GridError::invalid(format!(
                "redshift must be non-negative, got {}",
                self.redshift
            )));
        }
        if !self.spectrum_params.is_object() {
            return Err(GridError::invalid("spectrum_params must be a JSON object"));
        }
        self.binning()?;
        Ok(())
    }
}
