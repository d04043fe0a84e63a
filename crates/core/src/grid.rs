//! Three-dimensional scalar grid on a periodic cubic box.
//!
//! A `Grid` stores `N³` f64 samples in row-major `[x][y][z]` layout
//! (z fastest), matching the C-order arrays written to `.npy` files.
//! Coordinate access uses periodic addressing so negative and overflowing
//! indices are valid.

use crate::error::GridError;

/// Checks a box side length: positive and finite.
pub(crate) fn check_box_size(box_size: f64) -> Result<(), GridError> {
    if !box_size.is_finite() || box_size <= 0.0 {
        return Err(GridError::invalid(format!(
            "box size must be positive and finite, got {box_size}"
        )));
    }
    Ok(())
}

/// Returns `n³`, rejecting zero and overflow.
pub(crate) fn cell_count(grid_size: usize) -> Result<usize, GridError> {
    if grid_size == 0 {
        return Err(GridError::invalid("grid size must be at least 1"));
    }
    grid_size
        .checked_mul(grid_size)
        .and_then(|sq| sq.checked_mul(grid_size))
        .ok_or_else(|| GridError::invalid(format!("grid size {grid_size} overflows N³")))
}

/// A real scalar field sampled on an `N×N×N` periodic box of side `L`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    size: usize,
    box_size: f64,
    data: Vec<f64>,
}

impl Grid {
    /// Creates a zero-filled grid.
    ///
    /// Returns `GridError::InvalidParameter` if `size` is zero, `size³`
    /// overflows, or `box_size` is not a positive finite number.
    pub fn new(size: usize, box_size: f64) -> Result<Self, GridError> {
        check_box_size(box_size)?;
        let len = cell_count(size)?;
        Ok(Self {
            size,
            box_size,
            data: vec![0.0; len],
        })
    }

    /// Creates a grid from a pre-built row-major data vector.
    ///
    /// Returns `GridError::DimensionMismatch` if `data.len() != size³`.
    pub fn from_data(size: usize, box_size: f64, data: Vec<f64>) -> Result<Self, GridError> {
        check_box_size(box_size)?;
        let expected = cell_count(size)?;
        if data.len() != expected {
            return Err(GridError::DimensionMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            size,
            box_size,
            data,
        })
    }

    /// Cells per side (N).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Physical side length (L), in Mpc/h.
    pub fn box_size(&self) -> f64 {
        self.box_size
    }

    /// Physical side length of one cell, `L / N`.
    pub fn cell_size(&self) -> f64 {
        self.box_size / self.size as f64
    }

    /// Box volume `L³`.
    pub fn volume(&self) -> f64 {
        self.box_size.powi(3)
    }

    /// Total number of cells, `N³`.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false for a constructed grid; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read-only access to the row-major samples.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Mutable access to the row-major samples.
    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Consumes the grid, returning its samples.
    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Converts signed coordinates to a flat index using periodic wrapping.
    fn index(&self, x: isize, y: isize, z: isize) -> usize {
        let n = self.size as isize;
        let xi = x.rem_euclid(n) as usize;
        let yi = y.rem_euclid(n) as usize;
        let zi = z.rem_euclid(n) as usize;
        (xi * self.size + yi) * self.size + zi
    }

    /// Gets the value at `(x, y, z)` with periodic wrapping.
    pub fn get(&self, x: isize, y: isize, z: isize) -> f64 {
        self.data[self.index(x, y, z)]
    }

    /// Sets the value at `(x, y, z)` with periodic wrapping.
    pub fn set(&mut self, x: isize, y: isize, z: isize, value: f64) {
        let idx = self.index(x, y, z);
        self.data[idx] = value;
    }

    /// Spatial mean of all samples.
    pub fn mean(&self) -> f64 {
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }

    /// Population variance of all samples.
    pub fn variance(&self) -> f64 {
        let mean = self.mean();
        self.data.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / self.data.len() as f64
    }

    /// Largest absolute sample value.
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }

    /// Iterates over all cells yielding `(x, y, z, value)` in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, usize, f64)> + '_ {
        let n = self.size;
        self.data.iter().enumerate().map(move |(i, &v)| {
            let z = i % n;
            let y = (i / n) % n;
            let x = i / (n * n);
            (x, y, z, v)
        })
    }
}
