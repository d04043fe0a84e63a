//! Shell-averaged power spectrum estimation.
//!
//! The grid is Fourier transformed, each mode's power `V |δ̂|² / N⁶` is
//! assigned to a radial shell `[kmin + i·dk, kmin + (i+1)·dk)` and averaged
//! per shell. Every Fourier cell counts once, so `k⃗` and `-k⃗` both
//! contribute; the mode count reported per bin includes both.
//!
//! A mode lying exactly on a shell boundary belongs to the upper shell.
//! Modes below `kmin` and the DC mode are never binned. The upper limit
//! defaults to the Nyquist wavenumber and only whole shells below it are
//! kept.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GridError;
use crate::fft::{fundamental_wavenumber, nyquist_wavenumber, signed_frequency, Fft3};
use crate::grid::{check_box_size, Grid};

/// Distance below which a shell coordinate is snapped to the boundary.
const BOUNDARY_TOLERANCE: f64 = 1e-9;

/// Upper bound on the number of shells a layout may define (2³²).
const MAX_SHELLS: f64 = 4_294_967_296.0;

/// Radial shell layout for the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShellBinning {
    /// Shell width in h/Mpc.
    pub dk: f64,
    /// Lower edge of the first shell.
    pub kmin: f64,
    /// Upper limit; `None` means the Nyquist wavenumber of the grid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kmax: Option<f64>,
}

impl ShellBinning {
    /// Shells of width `dk` starting at `kmin`, up to Nyquist.
    pub fn new(dk: f64, kmin: f64) -> Result<Self, GridError> {
        let binning = Self {
            dk,
            kmin,
            kmax: None,
        };
        binning.validate()?;
        Ok(binning)
    }

    /// One shell per fundamental mode, centred on `2π n / L`.
    pub fn fundamental(box_size: f64) -> Result<Self, GridError> {
        check_box_size(box_size)?;
        let dk = fundamental_wavenumber(box_size);
        Self::new(dk, 0.5 * dk)
    }

    /// Caps the shells at `kmax` instead of Nyquist.
    pub fn with_kmax(mut self, kmax: f64) -> Result<Self, GridError> {
        self.kmax = Some(kmax);
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), GridError> {
        if !self.dk.is_finite() || self.dk <= 0.0 {
            return Err(GridError::invalid(format!(
                "bin width dk must be positive, got {}",
                self.dk
            )));
        }
        if !self.kmin.is_finite() || self.kmin < 0.0 {
            return Err(GridError::invalid(format!(
                "kmin must be non-negative, got {}",
                self.kmin
            )));
        }
        if let Some(kmax) = self.kmax {
            if !kmax.is_finite() || kmax <= self.kmin {
                return Err(GridError::invalid(format!(
                    "kmax must exceed kmin ({}), got {kmax}",
                    self.kmin
                )));
            }
        }
        Ok(())
    }

    /// Number of whole shells between `kmin` and the effective `kmax`.
    ///
    /// Fails when `dk` is so small that the count leaves the exactly
    /// representable index range.
    pub fn shell_count(&self, box_size: f64, grid_size: usize) -> Result<usize, GridError> {
        let kmax = self
            .kmax
            .unwrap_or_else(|| nyquist_wavenumber(box_size, grid_size));
        if kmax <= self.kmin {
            return Ok(0);
        }
        let count = ((kmax - self.kmin) / self.dk + BOUNDARY_TOLERANCE).floor();
        if !(count < MAX_SHELLS) {
            return Err(GridError::invalid(format!(
                "bin width dk = {} gives {count:e} shells below k = {kmax}, at most {MAX_SHELLS:e} allowed",
                self.dk
            )));
        }
        Ok(count as usize)
    }

    /// Shell index of wavenumber `k`, if it lies in one of `shells` shells.
    pub fn shell_of(&self, k: f64, shells: usize) -> Option<usize> {
        if k < self.kmin {
            return None;
        }
        let mut u = (k - self.kmin) / self.dk;
        if (u - u.round()).abs() < BOUNDARY_TOLERANCE {
            u = u.round();
        }
        let i = u.floor() as usize;
        (i < shells).then_some(i)
    }

    /// Centre of shell `i`.
    pub fn center(&self, i: usize) -> f64 {
        self.kmin + (i as f64 + 0.5) * self.dk
    }

    fn same_layout(&self, other: &Self) -> bool {
        (self.dk - other.dk).abs() <= 1e-12 * self.dk
            && (self.kmin - other.kmin).abs() <= 1e-12 * self.dk
    }
}

/// One radial shell of a measured spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectrumBin {
    /// Shell centre.
    pub k: f64,
    /// Mean `|k⃗|` of the modes in the shell.
    pub k_mean: f64,
    /// Mean measured power, (Mpc/h)³.
    pub power: f64,
    /// Fourier cells in the shell, counting `k⃗` and `-k⃗` separately.
    pub modes: u64,
}

/// Shell-averaged power of one grid (or an ensemble of grids).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasuredSpectrum {
    box_size: f64,
    grid_size: usize,
    binning: ShellBinning,
    bins: Vec<SpectrumBin>,
}

impl MeasuredSpectrum {
    pub fn box_size(&self) -> f64 {
        self.box_size
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    pub fn binning(&self) -> ShellBinning {
        self.binning
    }

    /// Non-empty shells in increasing k.
    pub fn bins(&self) -> &[SpectrumBin] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// `(k, P)` pairs using shell centres.
    pub fn pairs(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.bins.iter().map(|b| (b.k, b.power))
    }

    /// The shell whose `[k - dk/2, k + dk/2)` range contains `k`.
    pub fn bin_at(&self, k: f64) -> Option<&SpectrumBin> {
        let half = 0.5 * self.binning.dk;
        self.bins.iter().find(|b| k >= b.k - half && k < b.k + half)
    }

    /// Copy restricted to shells whose centre lies in `[lo, hi]`.
    pub fn restricted(&self, lo: f64, hi: f64) -> MeasuredSpectrum {
        MeasuredSpectrum {
            bins: self
                .bins
                .iter()
                .filter(|b| b.k >= lo && b.k <= hi)
                .copied()
                .collect(),
            ..self.clone()
        }
    }
}

/// Measures spectra for one shell layout.
#[derive(Debug, Clone, Copy)]
pub struct SpectrumEstimator {
    binning: ShellBinning,
}

impl SpectrumEstimator {
    pub fn new(binning: ShellBinning) -> Result<Self, GridError> {
        binning.validate()?;
        Ok(Self { binning })
    }

    pub fn binning(&self) -> ShellBinning {
        self.binning
    }

    /// Measures a grid using its own box size.
    pub fn measure(&self, grid: &Grid) -> Result<MeasuredSpectrum, GridError> {
        self.measure_in_box(grid, grid.box_size())
    }

    /// Measures a grid as if it sampled a box of side `box_size`.
    pub fn measure_in_box(
        &self,
        grid: &Grid,
        box_size: f64,
    ) -> Result<MeasuredSpectrum, GridError> {
        check_box_size(box_size)?;
        let n = grid.size();
        let kf = fundamental_wavenumber(box_size);
        let shells = self.binning.shell_count(box_size, n)?;

        // Accumulators exist only for shells some |k| on the grid reaches.
        // Shell indices grow with n², so each new shell is pushed once.
        let half = n / 2;
        let mut slot_shell: Vec<usize> = Vec::new();
        let slot_by_n2: Vec<Option<usize>> = (0..=3 * half * half)
            .map(|n2| {
                if n2 == 0 {
                    return None;
                }
                let shell = self.binning.shell_of(kf * (n2 as f64).sqrt(), shells)?;
                if slot_shell.last() != Some(&shell) {
                    slot_shell.push(shell);
                }
                Some(slot_shell.len() - 1)
            })
            .collect();

        let mut modes: Vec<Complex64> = grid
            .data()
            .iter()
            .map(|&v| Complex64::new(v, 0.0))
            .collect();
        Fft3::new(n)?.forward(&mut modes)?;

        let cells = (n * n * n) as f64;
        let norm = box_size.powi(3) / (cells * cells);
        let slots = slot_shell.len();
        let mut power_sum = vec![0.0; slots];
        let mut k_sum = vec![0.0; slots];
        let mut count = vec![0u64; slots];

        for x in 0..n {
            let fx = signed_frequency(x, n);
            for y in 0..n {
                let fy = signed_frequency(y, n);
                for z in 0..n {
                    let fz = signed_frequency(z, n);
                    let n2 = (fx * fx + fy * fy + fz * fz) as usize;
                    if let Some(i) = slot_by_n2[n2] {
                        power_sum[i] += modes[(x * n + y) * n + z].norm_sqr() * norm;
                        k_sum[i] += kf * (n2 as f64).sqrt();
                        count[i] += 1;
                    }
                }
            }
        }

        let bins: Vec<SpectrumBin> = (0..slots)
            .filter(|&i| count[i] > 0)
            .map(|i| SpectrumBin {
                k: self.binning.center(slot_shell[i]),
                k_mean: k_sum[i] / count[i] as f64,
                power: power_sum[i] / count[i] as f64,
                modes: count[i],
            })
            .collect();
        debug!(
            grid_size = n,
            box_size,
            shells,
            filled = bins.len(),
            "measured power spectrum"
        );

        Ok(MeasuredSpectrum {
            box_size,
            grid_size: n,
            binning: self.binning,
            bins,
        })
    }
}

/// One-shot measurement: `measure(grid, L, dk, kmin)`.
///
/// `box_size` overrides the grid's own box size.
pub fn measure(
    grid: &Grid,
    box_size: f64,
    dk: f64,
    kmin: f64,
) -> Result<MeasuredSpectrum, GridError> {
    SpectrumEstimator::new(ShellBinning::new(dk, kmin)?)?.measure_in_box(grid, box_size)
}

/// Mode-weighted mean of spectra measured with the same shells.
///
/// Returns `GridError::IncompatibleBinning` if box sizes, shell layouts or
/// the set of filled shells differ.
pub fn average(spectra: &[MeasuredSpectrum]) -> Result<MeasuredSpectrum, GridError> {
    let (first, rest) = spectra
        .split_first()
        .ok_or_else(|| GridError::invalid("cannot average an empty set of spectra"))?;
    let mut power_sum: Vec<f64> = first.bins.iter().map(|b| b.power * b.modes as f64).collect();
    let mut k_sum: Vec<f64> = first.bins.iter().map(|b| b.k_mean * b.modes as f64).collect();
    let mut count: Vec<u64> = first.bins.iter().map(|b| b.modes).collect();

    for (j, other) in rest.iter().enumerate() {
        if (other.box_size - first.box_size).abs() > 1e-12 * first.box_size
            || !other.binning.same_layout(&first.binning)
        {
            return Err(GridError::IncompatibleBinning(format!(
                "spectrum {} has box {} and dk {}, expected box {} and dk {}",
                j + 1,
                other.box_size,
                other.binning.dk,
                first.box_size,
                first.binning.dk
            )));
        }
        if other.bins.len() != first.bins.len() {
            return Err(GridError::IncompatibleBinning(format!(
                "spectrum {} has {} shells, expected {}",
                j + 1,
                other.bins.len(),
                first.bins.len()
            )));
        }
        for (i, (a, b)) in first.bins.iter().zip(&other.bins).enumerate() {
            if (a.k - b.k).abs() > 1e-9 * first.binning.dk {
                return Err(GridError::IncompatibleBinning(format!(
                    "spectrum {} shell {i} is centred at {}, expected {}",
                    j + 1,
                    b.k,
                    a.k
                )));
            }
            power_sum[i] += b.power * b.modes as f64;
            k_sum[i] += b.k_mean * b.modes as f64;
            count[i] += b.modes;
        }
    }

    let bins = first
        .bins
        .iter()
        .enumerate()
        .map(|(i, b)| SpectrumBin {
            k: b.k,
            k_mean: k_sum[i] / count[i] as f64,
            power: power_sum[i] / count[i] as f64,
            modes: count[i],
        })
        .collect();
    Ok(MeasuredSpectrum {
        bins,
        ..first.clone()
    })
}
