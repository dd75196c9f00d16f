// Copyright 2015-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

/*! Synchrotron radiative-transfer coefficients.

The interesting work here is done by implementations of the
[`SynchrotronCalculator`](crate::SynchrotronCalculator) trait; detailed
integrations of nontrivial electron distributions live in external tools, and
this module provides an analytic calculator good enough for isotropic
power-law electrons.

Calculators work in a frame where Stokes Q is aligned with the projection of
the magnetic field on the sky. The ray tracer, however, references its linear
Stokes parameters to the observer's y axis, so the intrinsic coefficients are
rotated by twice the polarization position angle *psi* before being returned.

*/

use special_fun::FloatSpecial;

use crate::{
    SynchCoefficients, SynchrotronCalculator, ELECTRON_CHARGE, MASS_ELECTRON, SPEED_LIGHT, TWO_PI,
};

const POWER_LAW_PARAMS: &[&str] = &["p"];

/// Synchrotron coefficients for an isotropic power-law electron distribution,
/// evaluated with analytic fitting formulae.
///
/// The electron energy distribution is `dN/dgamma ~ gamma^(-p)` between
/// `gamma_min` and `gamma_max`. Emission and absorption coefficients come
/// from the fits of Pandya et al. (2016ApJ...822...34P); the Faraday mixing
/// coefficients from the high-frequency power-law approximations of Huang &
/// Shcherbakov (2011MNRAS.416.2574H), equation 51. The fits are accurate to
/// tens of percent when the harmonic number `nu / nu_c` is large, which is
/// very much the case for the radio frequencies and radiation-belt field
/// strengths this crate is aimed at.
///
/// The power-law index is not baked in: it is pulled from the particle
/// distribution at each sample point, via the `extras` mechanism.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PowerLawSynchrotronCalculator {
    gamma_min: f64,
    gamma_max: f64,
}

impl PowerLawSynchrotronCalculator {
    /// Create a new calculator with the default energy bounds,
    /// `gamma_min` = 1 and `gamma_max` = 10^12.
    pub fn new() -> Self {
        PowerLawSynchrotronCalculator {
            gamma_min: 1.,
            gamma_max: 1e12,
        }
    }

    /// Alter the gamma bounds of the underlying electron distribution.
    pub fn gamma_limits(mut self, gamma_min: f64, gamma_max: f64) -> Self {
        self.gamma_min = gamma_min;
        self.gamma_max = gamma_max;
        self
    }

    /// The intrinsic coefficients, in the frame where Stokes Q is aligned
    /// with the sky projection of the field. U terms are identically zero in
    /// this frame.
    fn intrinsic(&self, nu: f64, b: f64, n_e: f64, theta: f64, p: f64) -> SynchCoefficients {
        let mut c = SynchCoefficients::zero();

        let nu_c = ELECTRON_CHARGE * b / (TWO_PI * MASS_ELECTRON * SPEED_LIGHT);
        let sin_th = theta.sin();
        let gamma_term = self.gamma_min.powf(1. - p) - self.gamma_max.powf(1. - p);

        // Pandya et al. (2016) equations 29/30, power-law emission.

        let j_i = n_e * ELECTRON_CHARGE.powi(2) * nu_c / SPEED_LIGHT
            * 3_f64.powf(0.5 * p)
            * (p - 1.)
            * sin_th
            / (2. * (p + 1.) * gamma_term)
            * ((3. * p - 1.) / 12.).gamma()
            * ((3. * p + 19.) / 12.).gamma()
            * (nu / (nu_c * sin_th)).powf(-0.5 * (p - 1.));

        c.j[0] = j_i;
        c.j[1] = -j_i * (p + 1.) / (p + 7. / 3.);
        c.j[2] = 0.;
        c.j[3] = -j_i * 171. / 250. * p.powf(0.49) / theta.tan()
            * (nu / (3. * nu_c * sin_th)).powf(-0.5);

        // Pandya et al. (2016) equations 35/36, power-law absorption.

        let alpha_i = n_e * ELECTRON_CHARGE.powi(2) / (nu * MASS_ELECTRON * SPEED_LIGHT)
            * 3_f64.powf(0.5 * (p + 1.))
            * (p - 1.)
            / (4. * gamma_term)
            * ((3. * p + 2.) / 12.).gamma()
            * ((3. * p + 22.) / 12.).gamma()
            * (nu / (nu_c * sin_th)).powf(-0.5 * (p + 2.));

        c.alpha[0] = alpha_i;
        c.alpha[1] = -alpha_i * (17. / 500. * p - 43. / 1250.).powf(43. / 500.);
        c.alpha[2] = 0.;
        c.alpha[3] = -alpha_i
            * (71. / 100. * p + 22. / 625.).powf(197. / 500.)
            * (31. / 10. * sin_th.powf(-48. / 25.) - 31. / 10.).powf(64. / 125.)
            * (nu / (nu_c * sin_th)).powf(-0.5);

        // Huang & Shcherbakov (2011) equation 51 gives the Faraday
        // coefficients normalized by omega_p^2 / (omega c).

        let s = nu / nu_c;
        let rho_factor = 2. * n_e * ELECTRON_CHARGE.powi(2) / (MASS_ELECTRON * nu * SPEED_LIGHT);

        let rho_q = 0.0085 * 2. / (p - 2.)
            * ((s / (sin_th * self.gamma_min.powi(2))).powf(0.5 * (p - 2.)) - 1.)
            * (p - 1.)
            / self.gamma_min.powf(1. - p)
            * (sin_th / s).powf(0.5 * (p + 2.));

        let rho_v = 0.017 * (self.gamma_min.ln() * (p - 1.)) / ((p + 1.) * self.gamma_min.powi(2))
            / s
            * theta.cos();

        c.rho[0] = rho_factor * rho_q;
        c.rho[1] = 0.;
        c.rho[2] = rho_factor * rho_v;

        c
    }
}

impl Default for PowerLawSynchrotronCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl SynchrotronCalculator for PowerLawSynchrotronCalculator {
    fn param_names(&self) -> &'static [&'static str] {
        POWER_LAW_PARAMS
    }

    fn coefficients(
        &self,
        nu: f64,
        b: f64,
        n_e: f64,
        theta: f64,
        psi: f64,
        extras: &[f64],
    ) -> SynchCoefficients {
        // Vacuum contributes nothing; don't let the fits chew on p = 0.
        if n_e <= 0. {
            return SynchCoefficients::zero();
        }

        let p = extras[0];
        let mut c = self.intrinsic(nu, b, n_e, theta, p);

        // Rotate the linear Stokes parameters from the field-aligned frame
        // into the observer frame. Stokes Q and U transform as a spin-2
        // quantity, hence the factor of two on the position angle; V is
        // unaffected.
        let c2p = (2. * psi).cos();
        let s2p = (2. * psi).sin();

        let rot = |q: f64, u: f64| (q * c2p - u * s2p, q * s2p + u * c2p);

        let (q, u) = rot(c.j[1], c.j[2]);
        c.j[1] = q;
        c.j[2] = u;

        let (q, u) = rot(c.alpha[1], c.alpha[2]);
        c.alpha[1] = q;
        c.alpha[2] = u;

        let (q, u) = rot(c.rho[0], c.rho[1]);
        c.rho[0] = q;
        c.rho[1] = u;

        c
    }
}
