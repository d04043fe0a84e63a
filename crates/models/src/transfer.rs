//! Eisenstein & Hu (1998) matter transfer functions.
//!
//! Two fits are provided: the full one, with baryon acoustic oscillations
//! (EH98 eqs. 2-24), and the "no-wiggle" one that keeps the baryon
//! suppression of the small-scale shape but drops the oscillations
//! (eqs. 26, 28-31). Wavenumbers are in h/Mpc and `T(0) = 1` for both.

use std::f64::consts::E;

use gauss_grid_core::error::GridError;

use crate::cosmology::Cosmology;

/// Transfer functions selectable by name, as the `transfer` model parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferKind {
    /// Full fit with acoustic oscillations.
    #[default]
    EisensteinHu,
    /// Smooth fit without acoustic oscillations.
    NoWiggleEisensteinHu,
}

impl TransferKind {
    pub const NAMES: &'static [&'static str] = &["EisensteinHu", "NoWiggleEisensteinHu"];

    pub fn name(self) -> &'static str {
        match self {
            TransferKind::EisensteinHu => "EisensteinHu",
            TransferKind::NoWiggleEisensteinHu => "NoWiggleEisensteinHu",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, GridError> {
        match name {
            "EisensteinHu" => Ok(TransferKind::EisensteinHu),
            "NoWiggleEisensteinHu" => Ok(TransferKind::NoWiggleEisensteinHu),
            other => Err(GridError::invalid(format!(
                "unknown transfer function {other:?}, expected one of {:?}",
                Self::NAMES
            ))),
        }
    }
}

/// A transfer function set up for one cosmology.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transfer {
    EisensteinHu(EisensteinHuTransfer),
    NoWiggle(NoWiggleTransfer),
}

impl Transfer {
    pub fn new(kind: TransferKind, cosmo: &Cosmology) -> Self {
        match kind {
            TransferKind::EisensteinHu => Transfer::EisensteinHu(EisensteinHuTransfer::new(cosmo)),
            TransferKind::NoWiggleEisensteinHu => Transfer::NoWiggle(NoWiggleTransfer::new(cosmo)),
        }
    }

    pub fn kind(&self) -> TransferKind {
        match self {
            Transfer::EisensteinHu(_) => TransferKind::EisensteinHu,
            Transfer::NoWiggle(_) => TransferKind::NoWiggleEisensteinHu,
        }
    }

    pub fn transfer(&self, k: f64) -> f64 {
        match self {
            Transfer::EisensteinHu(t) => t.transfer(k),
            Transfer::NoWiggle(t) => t.transfer(k),
        }
    }
}

/// `sin x / x`, finite at the origin.
fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-4 {
        1.0 - x * x / 6.0
    } else {
        x.sin() / x
    }
}

/// Full EH98 fit: CDM and baryon pieces weighted by their density fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EisensteinHuTransfer {
    h: f64,
    f_baryon: f64,
    /// Equality scale in 1/Mpc.
    k_equality: f64,
    /// Sound horizon at the drag epoch in Mpc.
    sound_horizon: f64,
    /// Silk damping scale in 1/Mpc.
    k_silk: f64,
    alpha_c: f64,
    beta_c: f64,
    alpha_b: f64,
    beta_b: f64,
    beta_node: f64,
}

impl EisensteinHuTransfer {
    pub fn new(cosmo: &Cosmology) -> Self {
        let h2 = cosmo.h * cosmo.h;
        let om_h2 = cosmo.omega_m() * h2;
        let ob_h2 = cosmo.omega_b * h2;
        let fb = cosmo.omega_b / cosmo.omega_m();
        let theta = cosmo.t_cmb / 2.7;
        let theta4 = theta.powi(4);

        // Equality (eqs. 2-3). `z_eq` is 1 + z.
        let z_eq = 2.5e4 * om_h2 / theta4;
        let k_eq = 0.0746 * om_h2 / (theta * theta);

        // Drag epoch (eq. 4).
        let b1 = 0.313 * om_h2.powf(-0.419) * (1.0 + 0.607 * om_h2.powf(0.674));
        let b2 = 0.238 * om_h2.powf(0.223);
        let z_drag = 1291.0 * om_h2.powf(0.251) / (1.0 + 0.659 * om_h2.powf(0.828))
            * (1.0 + b1 * ob_h2.powf(b2));

        // Baryon to photon momentum density ratio (eq. 5) at 1 + z.
        let ratio = |one_plus_z: f64| 31.5 * ob_h2 / theta4 * (1000.0 / one_plus_z);
        let r_drag = ratio(1.0 + z_drag);
        let r_eq = ratio(z_eq);

        // Sound horizon (eq. 6) and Silk scale (eq. 7).
        let sound_horizon = 2.0 / (3.0 * k_eq)
            * (6.0 / r_eq).sqrt()
            * (((1.0 + r_drag).sqrt() + (r_drag + r_eq).sqrt()) / (1.0 + r_eq.sqrt())).ln();
        let k_silk =
            1.6 * ob_h2.powf(0.52) * om_h2.powf(0.73) * (1.0 + (10.4 * om_h2).powf(-0.95));

        // CDM suppression and log shift (eqs. 11-12).
        let a1 = (46.9 * om_h2).powf(0.670) * (1.0 + (32.1 * om_h2).powf(-0.532));
        let a2 = (12.0 * om_h2).powf(0.424) * (1.0 + (45.0 * om_h2).powf(-0.582));
        let alpha_c = a1.powf(-fb) * a2.powf(-fb.powi(3));
        let c1 = 0.944 / (1.0 + (458.0 * om_h2).powf(-0.708));
        let c2 = (0.395 * om_h2).powf(-0.0266);
        let beta_c = 1.0 / (1.0 + c1 * ((1.0 - fb).powf(c2) - 1.0));

        // Baryon amplitude, envelope and node shift (eqs. 14-15, 23-24).
        let y = z_eq / (1.0 + z_drag);
        let sy = (1.0 + y).sqrt();
        let g = y * (-6.0 * sy + (2.0 + 3.0 * y) * ((sy + 1.0) / (sy - 1.0)).ln());
        let alpha_b = 2.07 * k_eq * sound_horizon * (1.0 + r_drag).powf(-0.75) * g;
        let beta_b = 0.5 + fb + (3.0 - 2.0 * fb) * ((17.2 * om_h2).powi(2) + 1.0).sqrt();
        let beta_node = 8.41 * om_h2.powf(0.435);

        Self {
            h: cosmo.h,
            f_baryon: fb,
            k_equality: k_eq,
            sound_horizon,
            k_silk,
            alpha_c,
            beta_c,
            alpha_b,
            beta_b,
            beta_node,
        }
    }

    pub fn sound_horizon(&self) -> f64 {
        self.sound_horizon
    }

    /// `T(k)` for `k` in h/Mpc.
    pub fn transfer(&self, k: f64) -> f64 {
        if k <= 0.0 {
            return 1.0;
        }
        let k = k * self.h;
        let q = k / (13.41 * self.k_equality);
        let ks = k * self.sound_horizon;

        // Pressureless shape with log shift `beta` and suppression `alpha` (eqs. 19-20).
        let t0 = |alpha: f64, beta: f64| {
            let l = (E + 1.8 * beta * q).ln();
            let c = 14.2 / alpha + 386.0 / (1.0 + 69.9 * q.powf(1.08));
            l / (l + c * q * q)
        };

        let f = 1.0 / (1.0 + (ks / 5.4).powi(4));
        let cdm = f * t0(1.0, self.beta_c) + (1.0 - f) * t0(self.alpha_c, self.beta_c);

        let s_tilde = self.sound_horizon / (1.0 + (self.beta_node / ks).powi(3)).cbrt();
        let envelope = t0(1.0, 1.0) / (1.0 + (ks / 5.2).powi(2))
            + self.alpha_b / (1.0 + (self.beta_b / ks).powi(3))
                * (-(k / self.k_silk).powf(1.4)).exp();
        let baryon = envelope * sinc(k * s_tilde);

        self.f_baryon * baryon + (1.0 - self.f_baryon) * cdm
    }
}

/// Shape-only EH98 fit without the acoustic oscillations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoWiggleTransfer {
    h: f64,
    omega_m_h: f64,
    theta2: f64,
    /// Approximate sound horizon in Mpc.
    sound_horizon: f64,
    alpha_gamma: f64,
}

impl NoWiggleTransfer {
    pub fn new(cosmo: &Cosmology) -> Self {
        let h2 = cosmo.h * cosmo.h;
        let om_h2 = cosmo.omega_m() * h2;
        let ob_h2 = cosmo.omega_b * h2;
        let fb = cosmo.omega_b / cosmo.omega_m();
        let theta = cosmo.t_cmb / 2.7;
        let sound_horizon = 44.5 * (9.83 / om_h2).ln() / (1.0 + 10.0 * ob_h2.powf(0.75)).sqrt();
        let alpha_gamma = 1.0 - 0.328 * (431.0 * om_h2).ln() * fb
            + 0.38 * (22.3 * om_h2).ln() * fb * fb;
        Self {
            h: cosmo.h,
            omega_m_h: cosmo.omega_m() * cosmo.h,
            theta2: theta * theta,
            sound_horizon,
            alpha_gamma,
        }
    }

    pub fn sound_horizon(&self) -> f64 {
        self.sound_horizon
    }

    /// `T(k)` for `k` in h/Mpc.
    pub fn transfer(&self, k: f64) -> f64 {
        if k <= 0.0 {
            return 1.0;
        }
        let ks = 0.43 * k * self.h * self.sound_horizon;
        let gamma_eff =
            self.omega_m_h * (self.alpha_gamma + (1.0 - self.alpha_gamma) / (1.0 + ks.powi(4)));
        let q = k * self.theta2 / gamma_eff;
        let l0 = (2.0 * E + 1.8 * q).ln();
        let c0 = 14.2 + 731.0 / (1.0 + 62.5 * q);
        l0 / (l0 + c0 * q * q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baryon_rich() -> Cosmology {
        let base = Cosmology::planck15();
        Cosmology {
            omega_b: 0.08,
            omega_cdm: base.omega_m() - 0.08,
            ..base
        }
    }

    #[test]
    fn kind_names_round_trip() {
        for name in TransferKind::NAMES {
            assert_eq!(TransferKind::from_name(name).unwrap().name(), *name);
        }
        assert_eq!(TransferKind::default(), TransferKind::EisensteinHu);
        assert!(matches!(
            TransferKind::from_name("BBKS"),
            Err(GridError::InvalidParameter(_))
        ));
    }

    #[test]
    fn both_fits_are_unity_on_large_scales() {
        let c = Cosmology::planck15();
        for t in [
            Transfer::new(TransferKind::EisensteinHu, &c),
            Transfer::new(TransferKind::NoWiggleEisensteinHu, &c),
        ] {
            assert_eq!(t.transfer(0.0), 1.0);
            assert!((t.transfer(1e-5) - 1.0).abs() < 1e-3, "{:?}", t.kind());
        }
    }

    #[test]
    fn full_fit_reference_value_near_first_peak() {
        let t = EisensteinHuTransfer::new(&Cosmology::planck15());
        let got = t.transfer(0.07);
        assert!((got / 0.202_154_68 - 1.0).abs() < 1e-5, "T(0.07) = {got}");
        assert!(
            (t.sound_horizon() - 151.406).abs() < 0.01,
            "s = {}",
            t.sound_horizon()
        );
    }

    #[test]
    fn full_fit_oscillates_around_smooth_fit() {
        let c = Cosmology::planck15();
        let full = EisensteinHuTransfer::new(&c);
        let smooth = NoWiggleTransfer::new(&c);
        let ratio = |k: f64| full.transfer(k) / smooth.transfer(k);
        // Trough near 0.05 h/Mpc, first peak near 0.07 h/Mpc.
        assert!(ratio(0.05) < 0.985, "ratio at 0.05: {}", ratio(0.05));
        assert!(ratio(0.07) > 1.015, "ratio at 0.07: {}", ratio(0.07));
        for k in [1e-4, 1e-3, 0.5, 1.0, 5.0] {
            assert!((ratio(k) - 1.0).abs() < 0.02, "ratio at {k}: {}", ratio(k));
        }
    }

    #[test]
    fn full_fit_survives_extreme_wavenumbers() {
        let t = EisensteinHuTransfer::new(&Cosmology::planck15());
        for k in [1e-200, 1e-12, 1e3, 1e6] {
            let v = t.transfer(k);
            assert!(v.is_finite(), "T({k}) = {v}");
        }
    }

    #[test]
    fn no_wiggle_decreases_monotonically() {
        let t = NoWiggleTransfer::new(&Cosmology::planck15());
        let mut prev = 1.0;
        let mut k = 1e-4;
        while k < 10.0 {
            let v = t.transfer(k);
            assert!(v > 0.0 && v <= prev, "T({k}) = {v} after {prev}");
            prev = v;
            k *= 1.5;
        }
    }

    #[test]
    fn no_wiggle_sound_horizon_is_near_150_mpc() {
        let t = NoWiggleTransfer::new(&Cosmology::planck15());
        assert!(
            (140.0..160.0).contains(&t.sound_horizon()),
            "s = {}",
            t.sound_horizon()
        );
    }

    #[test]
    fn more_baryons_suppress_small_scales() {
        let base = Cosmology::planck15();
        for kind in [TransferKind::EisensteinHu, TransferKind::NoWiggleEisensteinHu] {
            let a = Transfer::new(kind, &base).transfer(1.0);
            let b = Transfer::new(kind, &baryon_rich()).transfer(1.0);
            assert!(b < a, "{kind:?}: baryon-rich T = {b}, base T = {a}");
        }
    }
}
