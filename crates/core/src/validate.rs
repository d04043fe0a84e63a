//! Numerical comparison of a measured spectrum against its input model.
//!
//! For a Gaussian field each independent Fourier mode's power is
//! exponentially distributed, and `k⃗`/`-k⃗` pairs carry identical power, so a
//! shell of `m` cells averages `m / 2` independent modes:
//!
//! ```text
//!   σ(P̂) = P(k) · sqrt(2 / m)
//! ```

use serde::{Deserialize, Serialize};

use crate::estimator::MeasuredSpectrum;
use crate::spectrum::PowerSpectrum;

/// Outcome for one shell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinCheck {
    pub k: f64,
    pub measured: f64,
    pub expected: f64,
    /// Expected cosmic-variance scatter of `measured`.
    pub sigma: f64,
    /// `(measured - expected) / sigma`; zero when both power and scatter vanish.
    pub deviation: f64,
    pub within: bool,
}

/// Per-shell comparison at a fixed `n_sigma` tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub n_sigma: f64,
    pub bins: Vec<BinCheck>,
}

impl ValidationReport {
    /// True when every shell lies within tolerance.
    pub fn passed(&self) -> bool {
        self.bins.iter().all(|b| b.within)
    }

    /// Shells outside tolerance.
    pub fn failures(&self) -> impl Iterator<Item = &BinCheck> {
        self.bins.iter().filter(|b| !b.within)
    }

    /// Shell with the largest absolute deviation.
    pub fn worst(&self) -> Option<&BinCheck> {
        self.bins
            .iter()
            .max_by(|a, b| a.deviation.abs().total_cmp(&b.deviation.abs()))
    }
}

impl MeasuredSpectrum {
    /// Compares every shell against `model(k_mean)` within `n_sigma` scatter.
    pub fn validate_against(&self, model: &dyn PowerSpectrum, n_sigma: f64) -> ValidationReport {
        let bins = self
            .bins()
            .iter()
            .map(|bin| {
                let expected = model.power(bin.k_mean);
                let sigma = expected * (2.0 / bin.modes as f64).sqrt();
                let diff = bin.power - expected;
                let deviation = if sigma > 0.0 {
                    diff / sigma
                } else if diff == 0.0 {
                    0.0
                } else {
                    f64::INFINITY.copysign(diff)
                };
                BinCheck {
                    k: bin.k,
                    measured: bin.power,
                    expected,
                    sigma,
                    deviation,
                    within: deviation.abs() <= n_sigma,
                }
            })
            .collect();
        ValidationReport { n_sigma, bins }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::{measure, SpectrumEstimator, ShellBinning};
    use crate::fft::fundamental_wavenumber;
    use crate::generator::generate;
    use crate::grid::Grid;
    use crate::spectrum::{ConstantPower, PowerLaw};

    #[test]
    fn generated_field_validates_against_its_model() {
        let l = 200.0;
        let model = PowerLaw::new(500.0, -1.0, 0.1).unwrap();
        let grid = generate(&model, l, 32, 4).unwrap();
        let dk = fundamental_wavenumber(l);
        let spec = measure(&grid, l, dk, 0.5 * dk).unwrap();
        let report = spec.validate_against(&model, 5.0);
        assert!(
            report.passed(),
            "worst shell: {:?}",
            report.worst()
        );
    }

    #[test]
    fn wrong_amplitude_is_detected() {
        let l = 200.0;
        let grid = generate(&ConstantPower::new(100.0), l, 32, 4).unwrap();
        let spec = SpectrumEstimator::new(ShellBinning::fundamental(l).unwrap())
            .unwrap()
            .measure(&grid)
            .unwrap();
        let report = spec.validate_against(&ConstantPower::new(200.0), 3.0);
        assert!(!report.passed());
        assert!(report.failures().count() > 0);
        assert!(report.worst().unwrap().deviation < 0.0);
    }

    #[test]
    fn zero_model_on_zero_grid_passes() {
        let grid = Grid::new(8, 100.0).unwrap();
        let spec = SpectrumEstimator::new(ShellBinning::fundamental(100.0).unwrap())
            .unwrap()
            .measure(&grid)
            .unwrap();
        let report = spec.validate_against(&ConstantPower::new(0.0), 1.0);
        assert!(report.passed());
        assert!(report.bins.iter().all(|b| b.deviation == 0.0));
    }

    #[test]
    fn zero_model_with_power_fails() {
        let grid = generate(&ConstantPower::new(1.0), 100.0, 8, 1).unwrap();
        let spec = SpectrumEstimator::new(ShellBinning::fundamental(100.0).unwrap())
            .unwrap()
            .measure(&grid)
            .unwrap();
        let report = spec.validate_against(&ConstantPower::new(0.0), 10.0);
        assert!(!report.passed());
        assert!(report.bins.iter().all(|b| b.deviation == f64::INFINITY));
    }
}
