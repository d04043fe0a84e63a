#![deny(unsafe_code)]
//! Spectrum registry: maps model names to `PowerSpectrum` implementations.
//!
//! This crate sits between `gauss-grid-core` (which defines the
//! `PowerSpectrum` trait and the synthetic spectra) and the run pipeline.
//! It adds the linear ΛCDM model and string-based construction for the CLI
//! and run configuration files.

pub mod cosmology;
pub mod linear;
pub mod transfer;

use std::path::Path;

use gauss_grid_core::error::GridError;
use gauss_grid_core::params::{param_f64, param_f64_list, param_str, require_f64};
use gauss_grid_core::spectrum::{ConstantPower, PowerLaw, PowerSpectrum, TabulatedPower};
use serde_json::Value;

pub use cosmology::Cosmology;
pub use linear::LinearPower;
pub use transfer::{EisensteinHuTransfer, NoWiggleTransfer, Transfer, TransferKind};

/// All available spectrum model names.
const MODEL_NAMES: &[&str] = &["constant", "power-law", "linear-lcdm", "tabulated"];

/// Enumeration of all spectrum models constructible by name.
///
/// Use [`SpectrumKind::from_name`] for string-based construction.
#[derive(Debug, Clone)]
pub enum SpectrumKind {
    /// White noise.
    Constant(ConstantPower),
    /// `A (k / k0)^n`.
    PowerLaw(PowerLaw),
    /// σ8-normalized linear ΛCDM.
    Linear(Box<LinearPower>),
    /// Interpolated `(k, P)` table.
    Tabulated(TabulatedPower),
}

impl SpectrumKind {
    /// Constructs a model by name.
    ///
    /// `redshift` is used only by `linear-lcdm`. Returns
    /// `GridError::UnknownSpectrum` if the name is not recognized.
    ///
    /// | model | params |
    /// |-------|--------|
    /// | `constant` | `value` (required) |
    /// | `power-law` | `amplitude`, `index` (required), `pivot` (default 1) |
    /// | `linear-lcdm` | any `Cosmology` field, Planck15 otherwise; `transfer` (`EisensteinHu` or `NoWiggleEisensteinHu`) |
    /// | `tabulated` | `path` to a two-column text file, or `k` and `power` arrays |
    pub fn from_name(name: &str, redshift: f64, params: &Value) -> Result<Self, GridError> {
        if !params.is_null() && !params.is_object() {
            return Err(GridError::invalid("spectrum parameters must be a JSON object"));
        }
        match name {
            "constant" => {
                let value = require_f64(params, "value")?;
                if !value.is_finite() || value < 0.0 {
                    return Err(GridError::invalid(format!(
                        "constant power must be non-negative, got {value}"
                    )));
                }
                Ok(SpectrumKind::Constant(ConstantPower::new(value)))
            }
            "power-law" => Ok(SpectrumKind::PowerLaw(PowerLaw::new(
                require_f64(params, "amplitude")?,
                require_f64(params, "index")?,
                param_f64(params, "pivot", 1.0)?,
            )?)),
            "linear-lcdm" => {
                let transfer = match param_str(params, "transfer")? {
                    Some(name) => TransferKind::from_name(&name)?,
                    None => TransferKind::default(),
                };
                Ok(SpectrumKind::Linear(Box::new(LinearPower::with_transfer(
                    Cosmology::from_json(params)?,
                    redshift,
                    transfer,
                )?)))
            }
            "tabulated" => tabulated_from_params(params).map(SpectrumKind::Tabulated),
            _ => Err(GridError::UnknownSpectrum(name.to_string())),
        }
    }

    /// Returns a slice of all recognized model names.
    pub fn list_models() -> &'static [&'static str] {
        MODEL_NAMES
    }

    fn inner(&self) -> &dyn PowerSpectrum {
        match self {
            SpectrumKind::Constant(p) => p,
            SpectrumKind::PowerLaw(p) => p,
            SpectrumKind::Linear(p) => p.as_ref(),
            SpectrumKind::Tabulated(p) => p,
        }
    }
}

fn tabulated_from_params(params: &Value) -> Result<TabulatedPower, GridError> {
    if let Some(path) = param_str(params, "path")? {
        let text = std::fs::read_to_string(Path::new(&path))
            .map_err(|e| GridError::Persistence(format!("cannot read {path}: {e}")))?;
        return TabulatedPower::from_text(&text);
    }
    let k = param_f64_list(params, "k")?;
    let power = param_f64_list(params, "power")?;
    match (k, power) {
        (Some(k), Some(power)) => {
            if k.len() != power.len() {
                return Err(GridError::invalid(format!(
                    "tabulated spectrum has {} k values but {} power values",
                    k.len(),
                    power.len()
                )));
            }
            TabulatedPower::new(k.into_iter().zip(power).collect())
        }
        _ => Err(GridError::invalid(
            "tabulated spectrum needs either `path` or both `k` and `power`",
        )),
    }
}

impl PowerSpectrum for SpectrumKind {
    fn power(&self, k: f64) -> f64 {
        self.inner().power(k)
    }

    fn name(&self) -> &str {
        self.inner().name()
    }

    fn params(&self) -> Value {
        self.inner().params()
    }
}
