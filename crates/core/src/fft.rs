//! Cubic 3-D FFTs built from 1-D `rustfft` plans, plus wavenumber helpers.
//!
//! Transforms are unnormalized in both directions: a forward transform
//! followed by an inverse multiplies every sample by `N³`.

use std::f64::consts::PI;
use std::sync::Arc;

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::error::GridError;
use crate::grid::cell_count;

/// Fundamental wavenumber `2π / L` of a periodic box.
pub fn fundamental_wavenumber(box_size: f64) -> f64 {
    2.0 * PI / box_size
}

/// Nyquist wavenumber `π N / L` along one axis.
pub fn nyquist_wavenumber(box_size: f64, grid_size: usize) -> f64 {
    PI * grid_size as f64 / box_size
}

/// Signed integer frequency of FFT index `i` on an `n`-point axis.
///
/// Indices below `(n + 1) / 2` are non-negative; the rest map to `i - n`.
/// For even `n` the Nyquist index `n / 2` maps to `-n / 2`.
pub fn signed_frequency(i: usize, n: usize) -> i64 {
    if i < (n + 1) / 2 {
        i as i64
    } else {
        i as i64 - n as i64
    }
}

/// Index of the mirrored frequency `-f` on an `n`-point axis.
pub fn mirror_index(i: usize, n: usize) -> usize {
    (n - i) % n
}

/// Forward and inverse 3-D transforms for one grid size.
#[derive(Clone)]
pub struct Fft3 {
    size: usize,
    len: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for Fft3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fft3").field("size", &self.size).finish()
    }
}

impl Fft3 {
    /// Plans forward and inverse transforms for an `N×N×N` grid.
    pub fn new(size: usize) -> Result<Self, GridError> {
        let len = cell_count(size)?;
        let mut planner = FftPlanner::<f64>::new();
        Ok(Self {
            size,
            len,
            forward: planner.plan_fft_forward(size),
            inverse: planner.plan_fft_inverse(size),
        })
    }

    /// Cells per side this plan was built for.
    pub fn size(&self) -> usize {
        self.size
    }

    /// In-place forward transform, `Σ x e^{-ik·r}`.
    pub fn forward(&self, data: &mut [Complex64]) -> Result<(), GridError> {
        self.transform(data, self.forward.as_ref())
    }

    /// In-place inverse transform, `Σ x e^{+ik·r}` (no `1/N³` factor).
    pub fn inverse(&self, data: &mut [Complex64]) -> Result<(), GridError> {
        self.transform(data, self.inverse.as_ref())
    }

    fn transform(&self, data: &mut [Complex64], fft: &dyn Fft<f64>) -> Result<(), GridError> {
        if data.len() != self.len {
            return Err(GridError::DimensionMismatch {
                expected: self.len,
                got: data.len(),
            });
        }
        let n = self.size;
        let plane = n * n;
        let mut scratch = vec![Complex64::default(); fft.get_inplace_scratch_len()];

        // z lines are contiguous; rustfft walks every length-n chunk.
        fft.process_with_scratch(data, &mut scratch);

        let mut line = vec![Complex64::default(); n];
        for x in 0..n {
            for z in 0..n {
                let base = x * plane + z;
                for (y, slot) in line.iter_mut().enumerate() {
                    *slot = data[base + y * n];
                }
                fft.process_with_scratch(&mut line, &mut scratch);
                for (y, value) in line.iter().enumerate() {
                    data[base + y * n] = *value;
                }
            }
        }

        for y in 0..n {
            for z in 0..n {
                let base = y * n + z;
                for (x, slot) in line.iter_mut().enumerate() {
                    *slot = data[base + x * plane];
                }
                fft.process_with_scratch(&mut line, &mut scratch);
                for (x, value) in line.iter().enumerate() {
                    data[base + x * plane] = *value;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn real_buffer(values: &[f64]) -> Vec<Complex64> {
        values.iter().map(|&v| Complex64::new(v, 0.0)).collect()
    }

    #[test]
    fn signed_frequency_even_layout() {
        let freqs: Vec<i64> = (0..8).map(|i| signed_frequency(i, 8)).collect();
        assert_eq!(freqs, vec![0, 1, 2, 3, -4, -3, -2, -1]);
    }

    #[test]
    fn signed_frequency_odd_layout() {
        let freqs: Vec<i64> = (0..5).map(|i| signed_frequency(i, 5)).collect();
        assert_eq!(freqs, vec![0, 1, 2, -2, -1]);
    }

    #[test]
    fn mirror_index_fixes_zero_and_nyquist() {
        assert_eq!(mirror_index(0, 8), 0);
        assert_eq!(mirror_index(4, 8), 4);
        assert_eq!(mirror_index(1, 8), 7);
        assert_eq!(mirror_index(2, 5), 3);
    }

    #[test]
    fn wavenumber_scales() {
        assert!((fundamental_wavenumber(100.0) - 2.0 * PI / 100.0).abs() < 1e-15);
        assert!((nyquist_wavenumber(100.0, 64) - 32.0 * 2.0 * PI / 100.0).abs() < 1e-12);
    }

    #[test]
    fn forward_of_delta_is_flat() {
        let n = 4;
        let mut data = vec![Complex64::default(); n * n * n];
        data[0] = Complex64::new(1.0, 0.0);
        let fft = Fft3::new(n).unwrap();
        fft.forward(&mut data).unwrap();
        for v in &data {
            assert!((v.re - 1.0).abs() < 1e-12 && v.im.abs() < 1e-12);
        }
    }

    #[test]
    fn forward_of_constant_concentrates_in_dc() {
        let n = 4;
        let mut data = real_buffer(&vec![2.0; n * n * n]);
        let fft = Fft3::new(n).unwrap();
        fft.forward(&mut data).unwrap();
        assert!((data[0].re - 128.0).abs() < 1e-9);
        assert!(data[1..].iter().all(|v| v.norm() < 1e-9));
    }

    #[test]
    fn forward_then_inverse_scales_by_cell_count() {
        let n = 6;
        let values: Vec<f64> = (0..n * n * n).map(|i| ((i * 37) % 11) as f64 - 5.0).collect();
        let mut data = real_buffer(&values);
        let fft = Fft3::new(n).unwrap();
        fft.forward(&mut data).unwrap();
        fft.inverse(&mut data).unwrap();
        let scale = (n * n * n) as f64;
        for (orig, v) in values.iter().zip(&data) {
            assert!((v.re / scale - orig).abs() < 1e-9);
            assert!(v.im.abs() < 1e-9);
        }
    }

    #[test]
    fn single_plane_wave_lands_on_its_mode() {
        let n = 8;
        let fft = Fft3::new(n).unwrap();
        let mut data = vec![Complex64::default(); n * n * n];
        // e^{+i 2π (1·x + 2·y + 3·z) / n}
        for x in 0..n {
            for y in 0..n {
                for z in 0..n {
                    let phase = 2.0 * PI * (x + 2 * y + 3 * z) as f64 / n as f64;
                    data[(x * n + y) * n + z] = Complex64::from_polar(1.0, phase);
                }
            }
        }
        fft.forward(&mut data).unwrap();
        let target = (n + 2) * n + 3;
        for (i, v) in data.iter().enumerate() {
            if i == target {
                assert!((v.re - 512.0).abs() < 1e-8, "peak = {v}");
            } else {
                assert!(v.norm() < 1e-8, "leak at {i}: {v}");
            }
        }
    }

    #[test]
    fn wrong_buffer_length_is_rejected() {
        let fft = Fft3::new(4).unwrap();
        let mut data = vec![Complex64::default(); 63];
        assert!(matches!(
            fft.forward(&mut data),
            Err(GridError::DimensionMismatch {
                expected: 64,
                got: 63
            })
        ));
    }

    #[test]
    fn zero_size_plan_is_rejected() {
        assert!(Fft3::new(0).is_err());
    }
}
