// Copyright 2015-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

/*! Rays traced through the simulation volume.

A [`Ray`] holds everything known about one line of sight: the observer-frame
sample positions, the body-centric and magnetic coordinates they map to, the
local field strength and geometry angles, and the sampled particle-
distribution parameters. The radiative-transfer coefficients are computed
lazily from those samples and memoized, since they are by far the most
expensive piece and some workflows never need them.

Rays borrow their [`VanAllenSetup`](crate::VanAllenSetup), which is how they
reach the field model, the synchrotron calculator, and the transfer
integrator.

*/

use ndarray::{Array1, Array2};

use crate::setup::VanAllenSetup;
use crate::{Error, Result, ELECTRON_CHARGE, MASS_ELECTRON, SPEED_LIGHT, TWO_PI};

/// Trapezoidal integration of *y* over *x*.
fn trapz(x: &Array1<f64>, y: &Array1<f64>) -> f64 {
    let mut acc = 0.;

    for i in 1..x.len() {
        acc += 0.5 * (y[i] + y[i - 1]) * (x[i] - x[i - 1]);
    }

    acc
}

/// Radiative-transfer coefficients evaluated at each sample of a ray.
#[derive(Clone, Debug)]
pub struct RtCoefficients {
    /// Emission coefficients, shape (n, 4), in erg/(s Hz sr cm^3).
    pub j: Array2<f64>,
    /// Absorption coefficients, shape (n, 4), in cm^-1.
    pub alpha: Array2<f64>,
    /// Faraday mixing coefficients, shape (n, 3), in cm^-1.
    pub rho: Array2<f64>,
}

/// The result of an [`Ray::integrate_with_extras`] call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntegrationExtras {
    /// The Stokes IQUV intensities at the end of the ray, in
    /// erg/(s Hz sr cm^2).
    pub iquv: [f64; 4],
    /// The Stokes I optical depth integrated along the ray.
    pub optical_depth: f64,
    /// The total electron column along the ray, in cm^-2.
    pub electron_column: f64,
}

/// Data regarding a ray traced through the simulation volume.
///
/// The sample positions *z* are in units of the body's radius and strictly
/// increasing: integration runs from far behind the body toward the
/// observer. Path lengths *s* are in cm, starting at zero at the first
/// sample.
#[derive(Clone, Debug)]
pub struct Ray<'a> {
    setup: &'a VanAllenSetup,
    x: f64,
    y: f64,
    empty: bool,

    z: Array1<f64>,
    s: Array1<f64>,
    bc_lat: Array1<f64>,
    bc_lon: Array1<f64>,
    bc_r: Array1<f64>,
    mlat: Array1<f64>,
    mlon: Array1<f64>,
    l: Array1<f64>,
    b: Array1<f64>,
    theta: Array1<f64>,
    psi: Array1<f64>,

    /// Sampled distribution parameters, keyed by the distribution's own
    /// parameter names. The first entry is always `"n_e"`.
    params: Vec<(&'static str, Array1<f64>)>,

    coeffs: Option<RtCoefficients>,
}

impl<'a> Ray<'a> {
    /// Create a ray by fully sampling the setup's models at the given,
    /// strictly increasing observer-frame *z* positions.
    pub fn sample(x: f64, y: f64, z: Array1<f64>, setup: &'a VanAllenSetup) -> Self {
        let n = z.len();
        let mut ray = Ray::zeroed(x, y, z, setup);
        ray.empty = false;

        let names = setup.distrib().parameter_names();
        ray.params = names
            .iter()
            .map(|&name| (name, Array1::zeros(n)))
            .collect();

        for i in 0..n {
            let (lat, lon, r) = setup.o2b().to_body_centric(x, y, ray.z[i]);
            let (mlat, mlon, l) = setup.bfield().magnetic_coordinates(lat, lon, r);
            let (bh_lat, bh_lon, bh_r) = setup.bfield().bhat(lat, lon, r);

            ray.bc_lat[i] = lat;
            ray.bc_lon[i] = lon;
            ray.bc_r[i] = r;
            ray.mlat[i] = mlat;
            ray.mlon[i] = mlon;
            ray.l[i] = l;
            ray.b[i] = setup.bfield().bmag(lat, lon, r);
            ray.theta[i] = setup.o2b().theta_zhat(x, y, ray.z[i], bh_lat, bh_lon, bh_r);
            ray.psi[i] = setup
                .o2b()
                .theta_yhat_projected(x, y, ray.z[i], bh_lat, bh_lon, bh_r);

            for (pv, slot) in setup
                .distrib()
                .sample(mlat, mlon, l)
                .into_iter()
                .zip(ray.params.iter_mut())
            {
                slot.1[i] = pv;
            }
        }

        ray
    }

    /// Create an "empty" ray: one whose line of sight misses the electron
    /// population entirely.
    ///
    /// The coordinates are still filled in, but the physical samples (field,
    /// angles, distribution parameters) are identically zero, and the
    /// radiative-transfer coefficients will be zero without the synchrotron
    /// calculator ever being consulted. This is a valid terminal state, not
    /// an error.
    pub fn empty(x: f64, y: f64, z: Array1<f64>, setup: &'a VanAllenSetup) -> Self {
        let n = z.len();
        let mut ray = Ray::zeroed(x, y, z, setup);

        ray.params = setup
            .distrib()
            .parameter_names()
            .iter()
            .map(|&name| (name, Array1::zeros(n)))
            .collect();

        for i in 0..n {
            let (lat, lon, r) = setup.o2b().to_body_centric(x, y, ray.z[i]);
            let (mlat, mlon, l) = setup.bfield().magnetic_coordinates(lat, lon, r);
            ray.bc_lat[i] = lat;
            ray.bc_lon[i] = lon;
            ray.bc_r[i] = r;
            ray.mlat[i] = mlat;
            ray.mlon[i] = mlon;
            ray.l[i] = l;
        }

        ray
    }

    /// Create a ray directly from arrays of precomputed samples.
    ///
    /// This is for ray tracers and caches that evaluate the physical state
    /// themselves: *z*, *b*, *theta*, and *psi* must all have the same
    /// length, and every entry of *params* must too. *coeffs*, if given,
    /// seeds the memoized radiative-transfer coefficients so that later
    /// integrations reuse them instead of re-running the calculator.
    #[allow(clippy::too_many_arguments)]
    pub fn from_samples(
        x: f64,
        y: f64,
        z: Array1<f64>,
        b: Array1<f64>,
        theta: Array1<f64>,
        psi: Array1<f64>,
        params: Vec<(&'static str, Array1<f64>)>,
        coeffs: Option<RtCoefficients>,
        setup: &'a VanAllenSetup,
    ) -> Self {
        let mut ray = Ray::zeroed(x, y, z, setup);
        ray.empty = false;

        for i in 0..ray.z.len() {
            let (lat, lon, r) = setup.o2b().to_body_centric(x, y, ray.z[i]);
            let (mlat, mlon, l) = setup.bfield().magnetic_coordinates(lat, lon, r);
            ray.bc_lat[i] = lat;
            ray.bc_lon[i] = lon;
            ray.bc_r[i] = r;
            ray.mlat[i] = mlat;
            ray.mlon[i] = mlon;
            ray.l[i] = l;
        }

        ray.b = b;
        ray.theta = theta;
        ray.psi = psi;
        ray.params = params;
        ray.coeffs = coeffs;
        ray
    }

    fn zeroed(x: f64, y: f64, z: Array1<f64>, setup: &'a VanAllenSetup) -> Self {
        let n = z.len();
        let s = z.mapv(|zi| (zi - z[0]) * setup.radius());

        Ray {
            setup,
            x,
            y,
            empty: true,
            z,
            s,
            bc_lat: Array1::zeros(n),
            bc_lon: Array1::zeros(n),
            bc_r: Array1::zeros(n),
            mlat: Array1::zeros(n),
            mlon: Array1::zeros(n),
            l: Array1::zeros(n),
            b: Array1::zeros(n),
            theta: Array1::zeros(n),
            psi: Array1::zeros(n),
            params: Vec::new(),
            coeffs: None,
        }
    }

    /// The observer-frame x coordinate of this ray, in body radii.
    pub fn x(&self) -> f64 {
        self.x
    }

    /// The observer-frame y coordinate of this ray, in body radii.
    pub fn y(&self) -> f64 {
        self.y
    }

    /// Whether this ray misses the electron population entirely.
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// The number of samples along this ray.
    pub fn n_samples(&self) -> usize {
        self.z.len()
    }

    /// The observer-frame z samples, in body radii, strictly increasing.
    pub fn z(&self) -> &Array1<f64> {
        &self.z
    }

    /// The path length along the ray, in cm, starting at zero.
    pub fn s(&self) -> &Array1<f64> {
        &self.s
    }

    /// The magnetic field strengths along the ray, in Gauss.
    pub fn b(&self) -> &Array1<f64> {
        &self.b
    }

    /// The angles between the field and the line of sight, in radians.
    pub fn theta(&self) -> &Array1<f64> {
        &self.theta
    }

    /// The angles between the linear-polarization axis and the observer's y
    /// axis, in radians.
    pub fn psi(&self) -> &Array1<f64> {
        &self.psi
    }

    /// The McIlwain L parameter along the ray.
    pub fn l(&self) -> &Array1<f64> {
        &self.l
    }

    /// A sampled distribution parameter, by name; None if the distribution
    /// does not provide it.
    pub fn param(&self, name: &str) -> Option<&Array1<f64>> {
        self.params
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    /// The energetic electron densities along the ray, in cm^-3.
    pub fn n_e(&self) -> &Array1<f64> {
        // Every distribution provides n_e as its first parameter.
        &self.params[0].1
    }

    /// The local (nonrelativistic) electron cyclotron frequency along the
    /// ray, in Hz.
    pub fn nu_cyc(&self) -> Array1<f64> {
        self.b
            .mapv(|b| ELECTRON_CHARGE * b / (TWO_PI * MASS_ELECTRON * SPEED_LIGHT))
    }

    /// The harmonic number probed along the ray: the ratio of the observing
    /// frequency to the local cyclotron frequency.
    pub fn harmonic_number(&self) -> Array1<f64> {
        self.nu_cyc().mapv(|nc| self.setup.nu() / nc)
    }

    /// A reference Lorentz factor for the electrons contributing most of the
    /// emission along the ray.
    ///
    /// Approximate, for diagnostic use. Per Rybicki & Lightman figure 6.6
    /// the peak synchrotron contribution is at nu ~= 0.29 nu_synch, and
    /// their equation 6.11 gives nu_synch = (3/2) gamma^3 nu_cyc sin(pitch
    /// angle), so the relevant gamma scales as the cube root of the harmonic
    /// number. We take sin(pitch angle) = 0.5.
    pub fn gamma_ref(&self) -> Array1<f64> {
        self.harmonic_number()
            .mapv(|s| (2. * s / (0.29 * 3. * 0.5)).cbrt())
    }

    /// The electron column density along the ray, in cm^-2.
    pub fn sigma_e(&self) -> f64 {
        trapz(&self.s, self.n_e())
    }

    /// The Stokes I optical depth of the ray.
    pub fn optical_depth(&mut self) -> Result<f64> {
        let s = self.s.clone();
        let coeffs = self.rt_coefficients()?;
        let alpha_i = coeffs.alpha.column(0).to_owned();
        Ok(trapz(&s, &alpha_i))
    }

    /// Compute, memoize, and return the radiative-transfer coefficients for
    /// every sample of this ray.
    ///
    /// Repeat calls return the memoized values, so this is idempotent; ray
    /// tracers that evaluate coefficients as a byproduct of their sampling
    /// seed the memo themselves and skip this work entirely.
    pub fn rt_coefficients(&mut self) -> Result<&RtCoefficients> {
        if self.coeffs.is_none() {
            self.coeffs = Some(self.compute_rt_coefficients()?);
        }

        Ok(self.coeffs.as_ref().unwrap())
    }

    fn compute_rt_coefficients(&self) -> Result<RtCoefficients> {
        let n = self.z.len();
        let mut j = Array2::zeros((n, 4));
        let mut alpha = Array2::zeros((n, 4));
        let mut rho = Array2::zeros((n, 3));

        // Resolve the calculator's extra parameters against the ones the
        // distribution sampled, up front.
        let extra_arrays: Vec<&Array1<f64>> = self
            .setup
            .synch_calc()
            .param_names()
            .iter()
            .map(|&name| {
                self.param(name)
                    .ok_or(Error::MissingDistributionParameter(name))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut extras = vec![0.; extra_arrays.len()];
        let n_e = self.n_e();

        for i in 0..n {
            // Vacuum samples contribute nothing, and in particular empty
            // rays never touch the calculator at all.
            if n_e[i] <= 0. {
                continue;
            }

            for (slot, arr) in extras.iter_mut().zip(&extra_arrays) {
                *slot = arr[i];
            }

            let c = self.setup.synch_calc().coefficients(
                self.setup.nu(),
                self.b[i],
                n_e[i],
                self.theta[i],
                self.psi[i],
                &extras,
            );

            for k in 0..4 {
                j[(i, k)] = c.j[k];
                alpha[(i, k)] = c.alpha[k];
            }
            for k in 0..3 {
                rho[(i, k)] = c.rho[k];
            }
        }

        Ok(RtCoefficients { j, alpha, rho })
    }

    /// Compute the Stokes IQUV intensities at the end of this ray, in
    /// erg/(s Hz sr cm^2).
    ///
    /// If *j_times_b* is true, the emission coefficients are weighted by the
    /// local field strength before integrating. Dividing such an integral by
    /// the unweighted one estimates the mean field strength in the emitting
    /// region.
    pub fn integrate(&mut self, j_times_b: bool) -> Result<[f64; 4]> {
        let iquv = self.integrate_profile(j_times_b)?;
        let last = iquv.nrows() - 1;
        Ok([
            iquv[(last, 0)],
            iquv[(last, 1)],
            iquv[(last, 2)],
            iquv[(last, 3)],
        ])
    }

    /// Like [`Ray::integrate`], but also report the ray's Stokes I optical
    /// depth and electron column.
    pub fn integrate_with_extras(&mut self) -> Result<IntegrationExtras> {
        let iquv = self.integrate(false)?;
        let coeffs = self.coeffs.as_ref().unwrap();
        let alpha_i = coeffs.alpha.column(0).to_owned();

        Ok(IntegrationExtras {
            iquv,
            optical_depth: trapz(&self.s, &alpha_i),
            electron_column: self.sigma_e(),
        })
    }

    /// Compute the Stokes intensity profile along the entire ray: shape
    /// (n, 4), final row equal to what [`Ray::integrate`] returns.
    pub fn integrate_whole_ray(&mut self) -> Result<Array2<f64>> {
        self.integrate_profile(false)
    }

    fn integrate_profile(&mut self, j_times_b: bool) -> Result<Array2<f64>> {
        self.rt_coefficients()?;
        let coeffs = self.coeffs.as_ref().unwrap();

        let j = if j_times_b {
            let mut j = coeffs.j.clone();
            for (mut row, &b) in j.outer_iter_mut().zip(self.b.iter()) {
                row *= b;
            }
            j
        } else {
            coeffs.j.clone()
        };

        Ok(self
            .setup
            .rad_trans()
            .integrate(&self.s, &j, &coeffs.alpha, &coeffs.rho))
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use ndarray::arr1;

    use super::*;

    #[test]
    fn test_trapz() {
        let x = arr1(&[0., 1., 3.]);
        let y = arr1(&[0., 2., 2.]);
        assert_approx_eq!(trapz(&x, &y), 5., 1e-12);
    }

    #[test]
    fn test_trapz_single_sample_is_zero() {
        let x = arr1(&[1.]);
        let y = arr1(&[17.]);
        assert_eq!(trapz(&x, &y), 0.);
    }
}
