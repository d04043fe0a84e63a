//! Seed-and-plane addressable random streams for Fourier mode draws.
//!
//! Each x-plane of Fourier space gets its own ChaCha8 stream selected by
//! `(seed, plane)`. A plane's draws never depend on how many other planes
//! were processed before it, so a realization is identical whether planes
//! are visited sequentially, out of order or by several workers.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use std::f64::consts::TAU;

/// Independent random stream owned by one Fourier plane.
#[derive(Debug, Clone)]
pub struct PlaneStream {
    rng: ChaCha8Rng,
}

impl PlaneStream {
    /// Opens the stream for `plane` under `seed`.
    pub fn new(seed: u64, plane: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(plane);
        Self { rng }
    }

    /// Next standard-normal deviate.
    pub fn next_normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    /// Next uniform phase in [0, 2π).
    pub fn next_phase(&mut self) -> f64 {
        self.rng.gen::<f64>() * TAU
    }

    /// Next random sign, ±1.
    pub fn next_sign(&mut self) -> f64 {
        if self.rng.gen::<bool>() {
            1.0
        } else {
            -1.0
        }
    }
}
