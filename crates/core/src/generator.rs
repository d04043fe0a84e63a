//! Gaussian random field realizations with a prescribed power spectrum.
//!
//! Fourier amplitudes are drawn per mode with variance `P(k) / V`, made
//! Hermitian so the field is real, and inverse transformed without a
//! `1/N³` factor. The estimator in [`crate::estimator`] then recovers
//! `P(k)` in expectation:
//!
//! ```text
//!   δ̂(k) = N³ Ã(k),   P̂(k) = V |δ̂(k)|² / N⁶ = V |Ã(k)|²,   E[P̂] = P(k)
//! ```

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GridError;
use crate::fft::{fundamental_wavenumber, mirror_index, signed_frequency, Fft3};
use crate::grid::{check_box_size, Grid};
use crate::prng::PlaneStream;
use crate::spectrum::PowerSpectrum;

/// Variants of the amplitude draw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorOptions {
    /// Fix every amplitude to `sqrt(P / V)` and randomize only the phase.
    /// Self-conjugate modes take a random sign.
    #[serde(default)]
    pub unitary_amplitude: bool,
    /// Negate every amplitude, producing the sign-flipped partner field.
    #[serde(default)]
    pub inverted_phase: bool,
}

/// Draws realizations for one box size and grid size.
///
/// The FFT plan is built once and reused across seeds.
#[derive(Debug, Clone)]
pub struct GaussianFieldGenerator {
    box_size: f64,
    grid_size: usize,
    options: GeneratorOptions,
    fft: Fft3,
}

impl GaussianFieldGenerator {
    /// Creates a generator for an `N³` grid in a box of side `L`.
    ///
    /// Returns `GridError::InvalidParameter` if `L` is not positive and
    /// finite or `N` is zero.
    pub fn new(box_size: f64, grid_size: usize) -> Result<Self, GridError> {
        check_box_size(box_size)?;
        Ok(Self {
            box_size,
            grid_size,
            options: GeneratorOptions::default(),
            fft: Fft3::new(grid_size)?,
        })
    }

    /// Replaces the amplitude options.
    pub fn with_options(mut self, options: GeneratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn box_size(&self) -> f64 {
        self.box_size
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    pub fn options(&self) -> GeneratorOptions {
        self.options
    }

    /// Draws one real-space realization.
    pub fn generate(&self, spectrum: &dyn PowerSpectrum, seed: u64) -> Result<Grid, GridError> {
        let mut modes = self.fourier_modes(spectrum, seed)?;
        self.fft.inverse(&mut modes)?;
        let data = modes.into_iter().map(|c| c.re).collect();
        Grid::from_data(self.grid_size, self.box_size, data)
    }

    /// Draws the Hermitian Fourier amplitudes `Ã(k)` of one realization.
    ///
    /// Layout matches [`Fft3`]: row-major `[x][y][z]` in FFT frequency
    /// order. The unnormalized inverse transform of the result is the
    /// real-space field returned by [`generate`](Self::generate).
    pub fn fourier_modes(
        &self,
        spectrum: &dyn PowerSpectrum,
        seed: u64,
    ) -> Result<Vec<Complex64>, GridError> {
        let variance = self.variance_table(spectrum)?;
        let n = self.grid_size;
        let mut modes = vec![Complex64::default(); n * n * n];

        for x in 0..n {
            let mut stream = PlaneStream::new(seed, x as u64);
            let fx = signed_frequency(x, n);
            let mx = mirror_index(x, n);
            for y in 0..n {
                let fy = signed_frequency(y, n);
                let my = mirror_index(y, n);
                for z in 0..n {
                    let idx = (x * n + y) * n + z;
                    let mirror = (mx * n + my) * n + mirror_index(z, n);
                    if mirror < idx {
                        // Filled as the conjugate of its owner.
                        continue;
                    }
                    let fz = signed_frequency(z, n);
                    let n2 = (fx * fx + fy * fy + fz * fz) as usize;
                    if n2 == 0 {
                        continue;
                    }
                    let var = variance[n2];
                    let value = if mirror == idx {
                        let draw = if self.options.unitary_amplitude {
                            stream.next_sign()
                        } else {
                            stream.next_normal()
                        };
                        Complex64::new(var.sqrt() * draw, 0.0)
                    } else if self.options.unitary_amplitude {
                        Complex64::from_polar(var.sqrt(), stream.next_phase())
                    } else {
                        let sigma = (0.5 * var).sqrt();
                        let re = stream.next_normal();
                        let im = stream.next_normal();
                        Complex64::new(sigma * re, sigma * im)
                    };
                    modes[idx] = value;
                    modes[mirror] = value.conj();
                }
            }
        }

        if self.options.inverted_phase {
            modes.iter_mut().for_each(|m| *m = -*m);
        }
        Ok(modes)
    }

    /// `P(k) / V` for every integer `|n|²` reachable on the grid.
    ///
    /// Evaluating per shell radius rather than per mode also validates the
    /// spectrum before any random draw happens.
    fn variance_table(&self, spectrum: &dyn PowerSpectrum) -> Result<Vec<f64>, GridError> {
        let half = self.grid_size / 2;
        let max_n2 = 3 * half * half;
        let dk = fundamental_wavenumber(self.box_size);
        let volume = self.box_size.powi(3);
        let mut table = vec![0.0; max_n2 + 1];
        for (n2, slot) in table.iter_mut().enumerate().skip(1) {
            let k = dk * (n2 as f64).sqrt();
            let p = spectrum.power(k);
            if !p.is_finite() || p < 0.0 {
                return Err(GridError::invalid(format!(
                    "power spectrum '{}' returned P({k}) = {p}; power must be finite and non-negative",
                    spectrum.name()
                )));
            }
            *slot = p / volume;
        }
        debug!(
            spectrum = spectrum.name(),
            shells = max_n2,
            grid_size = self.grid_size,
            "evaluated power spectrum on grid shells"
        );
        Ok(table)
    }
}

/// One-shot realization: `generate(P, L, N, seed)`.
pub fn generate(
    power_spectrum: &dyn PowerSpectrum,
    box_size: f64,
    grid_size: usize,
    seed: u64,
) -> Result<Grid, GridError> {
    GaussianFieldGenerator::new(box_size, grid_size)?.generate(power_spectrum, seed)
}
