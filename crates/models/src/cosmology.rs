//! Flat ΛCDM background parameters and linear growth.

use gauss_grid_core::error::GridError;
use gauss_grid_core::params::param_f64;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Background cosmology. Flat: `Ω_Λ = 1 - Ω_m`, radiation neglected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cosmology {
    /// Dimensionless Hubble parameter.
    pub h: f64,
    /// Cold dark matter density today.
    pub omega_cdm: f64,
    /// Baryon density today.
    pub omega_b: f64,
    /// Primordial spectral index.
    pub n_s: f64,
    /// RMS linear fluctuation in 8 Mpc/h spheres at z = 0.
    pub sigma8: f64,
    /// CMB temperature in K.
    pub t_cmb: f64,
}

impl Cosmology {
    /// Planck 2015 (TT,TE,EE+lowP+lensing+ext) parameters.
    pub fn planck15() -> Self {
        Self {
            h: 0.6774,
            omega_cdm: 0.2589,
            omega_b: 0.0486,
            n_s: 0.9667,
            sigma8: 0.8159,
            t_cmb: 2.7255,
        }
    }

    /// Planck15 with any of `h`, `omega_cdm`, `omega_b`, `n_s`, `sigma8`,
    /// `t_cmb` overridden from a JSON object.
    pub fn from_json(params: &Value) -> Result<Self, GridError> {
        let base = Self::planck15();
        let c = Self {
            h: param_f64(params, "h", base.h)?,
            omega_cdm: param_f64(params, "omega_cdm", base.omega_cdm)?,
            omega_b: param_f64(params, "omega_b", base.omega_b)?,
            n_s: param_f64(params, "n_s", base.n_s)?,
            sigma8: param_f64(params, "sigma8", base.sigma8)?,
            t_cmb: param_f64(params, "t_cmb", base.t_cmb)?,
        };
        c.validate()?;
        Ok(c)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "h": self.h,
            "omega_cdm": self.omega_cdm,
            "omega_b": self.omega_b,
            "n_s": self.n_s,
            "sigma8": self.sigma8,
            "t_cmb": self.t_cmb,
        })
    }

    pub fn validate(&self) -> Result<(), GridError> {
        let positive = [
            ("h", self.h),
            ("omega_b", self.omega_b),
            ("sigma8", self.sigma8),
            ("t_cmb", self.t_cmb),
        ];
        for (name, v) in positive {
            if !v.is_finite() || v <= 0.0 {
                return Err(GridError::invalid(format!("{name} must be positive, got {v}")));
            }
        }
        if !self.omega_cdm.is_finite() || self.omega_cdm < 0.0 {
            return Err(GridError::invalid(format!(
                "omega_cdm must be non-negative, got {}",
                self.omega_cdm
            )));
        }
        if self.omega_m() > 1.0 {
            return Err(GridError::invalid(format!(
                "omega_m = {} exceeds 1 in a flat cosmology",
                self.omega_m()
            )));
        }
        if !self.n_s.is_finite() {
            return Err(GridError::invalid("n_s must be finite"));
        }
        Ok(())
    }

    /// Total matter density today.
    pub fn omega_m(&self) -> f64 {
        self.omega_cdm + self.omega_b
    }

    pub fn omega_lambda(&self) -> f64 {
        1.0 - self.omega_m()
    }

    /// `E(z)² = H(z)² / H0²`.
    pub fn efunc2(&self, z: f64) -> f64 {
        self.omega_m() * (1.0 + z).powi(3) + self.omega_lambda()
    }

    /// Linear growth factor normalized to `D(0) = 1`.
    ///
    /// Carroll, Press & Turner (1992) fit, accurate to about 1% for flat ΛCDM.
    pub fn growth_factor(&self, z: f64) -> f64 {
        self.growth_suppression(z) / (self.growth_suppression(0.0) * (1.0 + z))
    }

    fn growth_suppression(&self, z: f64) -> f64 {
        let e2 = self.efunc2(z);
        let om = self.omega_m() * (1.0 + z).powi(3) / e2;
        let ol = self.omega_lambda() / e2;
        2.5 * om / (om.powf(4.0 / 7.0) - ol + (1.0 + 0.5 * om) * (1.0 + ol / 70.0))
    }
}
