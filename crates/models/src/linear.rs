//! Linear ΛCDM matter power spectrum.
//!
//! `P(k, z) = A kⁿˢ T(k)² D(z)²`, with `A` fixed so that the top-hat
//! variance in 8 Mpc/h spheres at `z = 0` equals `σ8²`. `T` is the full
//! Eisenstein-Hu fit unless another [`TransferKind`] is chosen.

use std::f64::consts::PI;

use gauss_grid_core::error::GridError;
use gauss_grid_core::spectrum::PowerSpectrum;
use serde_json::Value;
use tracing::debug;

use crate::cosmology::Cosmology;
use crate::transfer::{Transfer, TransferKind};

/// Integration range in ln k (k in h/Mpc) for top-hat variances.
const LN_K_MIN: f64 = -11.512_925_464_970_229; // ln 1e-5
const LN_K_MAX: f64 = 6.907_755_278_982_137; // ln 1e3
/// Simpson intervals; must be even.
const INTEGRATION_STEPS: usize = 8192;

/// Fourier transform of a unit-volume spherical top-hat of radius 1.
fn top_hat_window(x: f64) -> f64 {
    if x < 1e-3 {
        1.0 - x * x / 10.0
    } else {
        3.0 * (x.sin() - x * x.cos()) / (x * x * x)
    }
}

/// `∫ dlnk k³ P(k) W²(kR) / 2π²` by composite Simpson in ln k.
fn top_hat_variance(power: impl Fn(f64) -> f64, radius: f64) -> f64 {
    let step = (LN_K_MAX - LN_K_MIN) / INTEGRATION_STEPS as f64;
    let integrand = |i: usize| {
        let k = (LN_K_MIN + i as f64 * step).exp();
        let w = top_hat_window(k * radius);
        k * k * k * power(k) * w * w / (2.0 * PI * PI)
    };
    let mut sum = integrand(0) + integrand(INTEGRATION_STEPS);
    for i in 1..INTEGRATION_STEPS {
        let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
        sum += weight * integrand(i);
    }
    sum * step / 3.0
}

/// Linear matter power spectrum at a fixed redshift.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearPower {
    cosmology: Cosmology,
    redshift: f64,
    transfer: Transfer,
    amplitude: f64,
    growth: f64,
}

impl LinearPower {
    /// Builds and σ8-normalizes the spectrum at redshift `z`.
    pub fn new(cosmology: Cosmology, redshift: f64) -> Result<Self, GridError> {
        Self::with_transfer(cosmology, redshift, TransferKind::default())
    }

    /// As [`LinearPower::new`], with an explicit transfer function.
    pub fn with_transfer(
        cosmology: Cosmology,
        redshift: f64,
        kind: TransferKind,
    ) -> Result<Self, GridError> {
        cosmology.validate()?;
        if !redshift.is_finite() || redshift < 0.0 {
            return Err(GridError::invalid(format!(
                "redshift must be non-negative, got {redshift}"
            )));
        }
        let transfer = Transfer::new(kind, &cosmology);
        let shape = |k: f64| k.powf(cosmology.n_s) * transfer.transfer(k).powi(2);
        let unnormalized = top_hat_variance(shape, 8.0);
        let amplitude = cosmology.sigma8 * cosmology.sigma8 / unnormalized;
        let growth = cosmology.growth_factor(redshift);
        debug!(
            redshift,
            growth,
            amplitude,
            transfer = kind.name(),
            "normalized linear power spectrum"
        );
        Ok(Self {
            cosmology,
            redshift,
            transfer,
            amplitude,
            growth,
        })
    }

    /// Planck15 cosmology at redshift `z`.
    pub fn planck15(redshift: f64) -> Result<Self, GridError> {
        Self::new(Cosmology::planck15(), redshift)
    }

    pub fn cosmology(&self) -> &Cosmology {
        &self.cosmology
    }

    pub fn redshift(&self) -> f64 {
        self.redshift
    }

    pub fn transfer_kind(&self) -> TransferKind {
        self.transfer.kind()
    }

    /// Growth factor `D(z)` applied to the z = 0 spectrum.
    pub fn growth(&self) -> f64 {
        self.growth
    }

    /// RMS linear fluctuation in top-hat spheres of radius `r` Mpc/h.
    pub fn sigma_r(&self, r: f64) -> f64 {
        top_hat_variance(|k| self.power(k), r).sqrt()
    }
}

impl PowerSpectrum for LinearPower {
    fn power(&self, k: f64) -> f64 {
        if k <= 0.0 {
            return 0.0;
        }
        let t = self.transfer.transfer(k);
        self.amplitude * k.powf(self.cosmology.n_s) * t * t * self.growth * self.growth
    }

    fn name(&self) -> &str {
        "linear-lcdm"
    }

    fn params(&self) -> Value {
        let mut v = self.cosmology.to_json();
        v["redshift"] = Value::from(self.redshift);
        v["transfer"] = Value::from(self.transfer.kind().name());
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_continuous_at_series_switch() {
        let below = top_hat_window(0.999e-3);
        let above = top_hat_window(1.001e-3);
        assert!((below - above).abs() < 1e-9);
        assert_eq!(top_hat_window(0.0), 1.0);
    }

    #[test]
    fn sigma8_is_reproduced() {
        let p = LinearPower::planck15(0.0).unwrap();
        assert!((p.sigma_r(8.0) - 0.8159).abs() < 1e-6, "σ8 = {}", p.sigma_r(8.0));
    }

    #[test]
    fn reference_values_at_z0() {
        let p = LinearPower::planck15(0.0).unwrap();
        assert_eq!(p.transfer_kind(), TransferKind::EisensteinHu);
        // Full Eisenstein-Hu, Planck15, σ8-normalized. 0.05 and 0.07 sit on
        // the first trough and peak of the acoustic oscillations.
        for (k, expected) in [
            (0.01, 21_967.9),
            (0.05, 12_474.6),
            (0.07, 9_716.97),
            (0.1, 5_674.43),
            (0.5, 310.108),
        ] {
            let got = p.power(k);
            assert!(
                (got / expected - 1.0).abs() < 1e-3,
                "P({k}) = {got}, expected about {expected}"
            );
        }
    }

    #[test]
    fn no_wiggle_reference_values_at_z0() {
        let p = LinearPower::with_transfer(
            Cosmology::planck15(),
            0.0,
            TransferKind::NoWiggleEisensteinHu,
        )
        .unwrap();
        assert!((p.sigma_r(8.0) - 0.8159).abs() < 1e-6);
        for (k, expected) in [(0.01, 22_156.0), (0.05, 13_060.0), (0.1, 5_838.0), (0.5, 307.9)] {
            let got = p.power(k);
            assert!(
                (got / expected - 1.0).abs() < 0.01,
                "P({k}) = {got}, expected about {expected}"
            );
        }
    }

    #[test]
    fn redshift_scales_by_growth_squared() {
        let p0 = LinearPower::planck15(0.0).unwrap();
        let p1 = LinearPower::planck15(1.0).unwrap();
        let d = p1.growth();
        assert!(d > 0.5 && d < 0.7, "D(1) = {d}");
        for k in [0.01, 0.1, 1.0] {
            assert!((p1.power(k) / p0.power(k) - d * d).abs() < 1e-12);
        }
    }

    #[test]
    fn rejects_negative_redshift() {
        assert!(LinearPower::planck15(-1.0).is_err());
        assert!(LinearPower::planck15(f64::NAN).is_err());
    }

    #[test]
    fn power_vanishes_at_zero_k() {
        let p = LinearPower::planck15(0.0).unwrap();
        assert_eq!(p.power(0.0), 0.0);
    }

    #[test]
    fn params_include_redshift_and_cosmology() {
        let p = LinearPower::planck15(0.5).unwrap();
        let v = p.params();
        assert_eq!(v["redshift"], 0.5);
        assert_eq!(v["sigma8"], 0.8159);
        assert_eq!(v["transfer"], "EisensteinHu");
        assert_eq!(p.name(), "linear-lcdm");
    }
}
