//! Power spectrum models: the injected `k → P(k)` function.
//!
//! Cosmological models live in `gauss-grid-models`; this module holds the
//! trait and the synthetic spectra used for testing and external tables.
//! All implementations are pure: the same `k` always yields the same power.

use serde_json::{json, Value};

use crate::error::GridError;

/// An isotropic power spectrum `P(k)`, k in h/Mpc, P in (Mpc/h)³.
///
/// Implementations must be deterministic. Negative or non-finite return
/// values are rejected by the generator.
pub trait PowerSpectrum: Send + Sync {
    /// Spectral power at wavenumber magnitude `k ≥ 0`.
    fn power(&self, k: f64) -> f64;

    /// Registry name of the model.
    fn name(&self) -> &str;

    /// Parameters that reproduce this model through the registry.
    fn params(&self) -> Value {
        json!({})
    }
}

/// White noise: `P(k) = c`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantPower {
    pub value: f64,
}

impl ConstantPower {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl PowerSpectrum for ConstantPower {
    fn power(&self, _k: f64) -> f64 {
        self.value
    }

    fn name(&self) -> &str {
        "constant"
    }

    fn params(&self) -> Value {
        json!({ "value": self.value })
    }
}

/// Power law `P(k) = A (k / k0)^n`, zero at `k = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerLaw {
    pub amplitude: f64,
    pub index: f64,
    pub pivot: f64,
}

impl PowerLaw {
    pub fn new(amplitude: f64, index: f64, pivot: f64) -> Result<Self, GridError> {
        if !pivot.is_finite() || pivot <= 0.0 {
            return Err(GridError::invalid(format!(
                "power-law pivot must be positive, got {pivot}"
            )));
        }
        Ok(Self {
            amplitude,
            index,
            pivot,
        })
    }
}

impl PowerSpectrum for PowerLaw {
    fn power(&self, k: f64) -> f64 {
        if k <= 0.0 {
            return 0.0;
        }
        self.amplitude * (k / self.pivot).powf(self.index)
    }

    fn name(&self) -> &str {
        "power-law"
    }

    fn params(&self) -> Value {
        json!({
            "amplitude": self.amplitude,
            "index": self.index,
            "pivot": self.pivot,
        })
    }
}

/// Tabulated spectrum with log–log interpolation between samples.
///
/// Outside the tabulated k range the power is zero. Segments touching a
/// zero power sample fall back to linear interpolation.
#[derive(Debug, Clone, PartialEq)]
pub struct TabulatedPower {
    k: Vec<f64>,
    p: Vec<f64>,
}

impl TabulatedPower {
    /// Builds a table from `(k, P)` pairs.
    ///
    /// Requires at least two samples, strictly increasing positive `k`, and
    /// finite non-negative `P`.
    pub fn new(points: Vec<(f64, f64)>) -> Result<Self, GridError> {
        if points.len() < 2 {
            return Err(GridError::invalid("tabulated spectrum needs at least two samples"));
        }
        let mut prev = 0.0;
        for &(k, p) in &points {
            if !k.is_finite() || k <= prev {
                return Err(GridError::invalid(format!(
                    "tabulated k must be positive and strictly increasing, got {k} after {prev}"
                )));
            }
            if !p.is_finite() || p < 0.0 {
                return Err(GridError::invalid(format!(
                    "tabulated power must be non-negative, got P({k}) = {p}"
                )));
            }
            prev = k;
        }
        let (k, p) = points.into_iter().unzip();
        Ok(Self { k, p })
    }

    /// Parses a two-column text table (`k P` per line).
    ///
    /// Columns may be separated by whitespace or commas. Blank lines and
    /// lines starting with `#` are ignored; extra columns are ignored.
    pub fn from_text(text: &str) -> Result<Self, GridError> {
        let mut points = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut cols = line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty());
            let mut next = |what: &str| -> Result<f64, GridError> {
                let raw = cols.next().ok_or_else(|| {
                    GridError::invalid(format!("line {}: missing {what} column", lineno + 1))
                })?;
                raw.parse::<f64>().map_err(|e| {
                    GridError::invalid(format!("line {}: bad {what} '{raw}': {e}", lineno + 1))
                })
            };
            let k = next("k")?;
            let p = next("P")?;
            points.push((k, p));
        }
        Self::new(points)
    }

    /// Tabulated `(k, P)` samples.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.k.iter().copied().zip(self.p.iter().copied())
    }
}

impl PowerSpectrum for TabulatedPower {
    fn power(&self, k: f64) -> f64 {
        let last = self.k.len() - 1;
        if k < self.k[0] || k > self.k[last] {
            return 0.0;
        }
        // First sample strictly above k, clamped so the segment is valid.
        let hi = self.k.partition_point(|&x| x <= k).clamp(1, last);
        let lo = hi - 1;
        let (k0, k1) = (self.k[lo], self.k[hi]);
        let (p0, p1) = (self.p[lo], self.p[hi]);
        if p0 > 0.0 && p1 > 0.0 {
            let t = (k / k0).ln() / (k1 / k0).ln();
            (p0.ln() + t * (p1.ln() - p0.ln())).exp()
        } else {
            let t = (k - k0) / (k1 - k0);
            p0 + t * (p1 - p0)
        }
    }

    fn name(&self) -> &str {
        "tabulated"
    }

    fn params(&self) -> Value {
        json!({
            "k": self.k,
            "power": self.p,
        })
    }
}
