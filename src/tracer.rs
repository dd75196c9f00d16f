// Copyright 2015-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

/*! Strategies for sampling rays through the magnetosphere.

Rays by definition end at a specified (x, y) location in observer
coordinates, traveling along the observer z axis from behind the body toward
the observer. (They might not *start* at the same (x, y) if refraction were
ever implemented.) A tracer's job is to choose the z samples: find the
stretch of the line of sight that actually contains electrons, then sample it
finely enough for the radiative-transfer integration to succeed.

The two tracers here share their bound-finding logic and differ in the
sampling itself: [`BasicRayTracer`] uses a fixed number of uniform samples,
while [`FormalRayTracer`] adapts its step size to the local stiffness of the
transfer problem so that the formal (matrix-exponential) integrator stays
accurate.

*/

use ndarray::Array1;
use slog::warn;

use crate::ray::{Ray, RtCoefficients};
use crate::setup::VanAllenSetup;
use crate::{Error, RayTracer, Result};

/// The endpoints of the interesting stretch of a line of sight, in
/// observer-frame z.
enum Bounds {
    /// No particles anywhere along the ray.
    Empty { z0: f64, z1: f64 },
    /// Particles lie between these bounds.
    Span { z0: f64, z1: f64 },
}

/// The configuration of the search for a ray's usable bounds.
///
/// If the starting point of a ray has zero electron density, the emission
/// and absorption coefficients there are zero, step-size control has nothing
/// to work with, and the integration goes badly. So before sampling we
/// coarsely scan the line of sight for the region where the density exceeds
/// a small cutoff, and tighten the endpoints with a root-find.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundsSearch {
    /// A z coordinate well behind the body, in body radii.
    pub way_back_z: f64,
    /// A z coordinate well in front of the body, in body radii.
    pub way_front_z: f64,
    /// Rays emerging from the body's surface start this far above it, in
    /// body radii. Various coordinates blow up right at r = 1.
    pub surface_delta_radius: f64,
    /// The electron density, in cm^-3, below which a location is treated as
    /// particle-free.
    pub ne0_cutoff: f64,
    /// The step, in body radii, of the coarse scan along z.
    pub delta_z: f64,
}

impl Default for BoundsSearch {
    fn default() -> Self {
        BoundsSearch {
            way_back_z: -15.,
            way_front_z: 15.,
            surface_delta_radius: 0.03,
            ne0_cutoff: 1.,
            delta_z: 1.,
        }
    }
}

impl BoundsSearch {
    fn find(&self, x: f64, y: f64, setup: &VanAllenSetup) -> Result<Bounds> {
        let ne_at = |z: f64| {
            let (lat, lon, r) = setup.o2b().to_body_centric(x, y, z);
            let (mlat, mlon, l) = setup.bfield().magnetic_coordinates(lat, lon, r);
            setup.distrib().density(mlat, mlon, l)
        };

        let rsq = x * x + y * y;
        let mut z0 = if rsq <= 1. {
            // The ray hits the body; start just above its surface.
            ((1. + self.surface_delta_radius).powi(2) - rsq).sqrt()
        } else {
            self.way_back_z
        };
        let mut z1 = self.way_front_z;

        // Coarse scan for the region containing particles.

        let mut zsamps = Vec::new();
        let mut nesamps = Vec::new();
        let mut z = z0;

        while z < z1 {
            zsamps.push(z);
            nesamps.push(ne_at(z));
            z += self.delta_z;
        }

        let mut first_inside = None;
        let mut last_inside = None;

        for (i, &ne) in nesamps.iter().enumerate() {
            if ne > self.ne0_cutoff {
                if first_inside.is_none() {
                    first_inside = Some(i);
                }
                last_inside = Some(i);
            }
        }

        let (first_inside, last_inside) = match (first_inside, last_inside) {
            (Some(a), Some(b)) => (a, b),
            _ => return Ok(Bounds::Empty { z0, z1 }),
        };

        // Tighten each endpoint to where the density crosses the cutoff, so
        // that our sampling resolution is spent where it counts.

        let ofs_ne = |z: f64| ne_at(z) - self.ne0_cutoff;

        if nesamps[0] < self.ne0_cutoff {
            z0 = bisect(&ofs_ne, z0, zsamps[first_inside]).ok_or(Error::BoundSearchFailed {
                x,
                y,
                z_low: z0,
                z_high: zsamps[first_inside],
            })?;
        }

        if *nesamps.last().unwrap() < self.ne0_cutoff {
            z1 = bisect(&ofs_ne, z1, zsamps[last_inside]).ok_or(Error::BoundSearchFailed {
                x,
                y,
                z_low: zsamps[last_inside],
                z_high: z1,
            })?;
        }

        Ok(Bounds::Span { z0, z1 })
    }
}

/// Find a root of *f* between *a* and *b* by bisection. The endpoints need
/// not be ordered, but *f* must change sign between them; otherwise None.
fn bisect<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64) -> Option<f64> {
    const MAX_ITERS: usize = 100;

    let (mut lo, mut hi) = if a < b { (a, b) } else { (b, a) };
    let mut f_lo = f(lo);
    let f_hi = f(hi);

    if !(f_lo * f_hi < 0.) {
        return None;
    }

    let tol = 1e-10 * (hi - lo).abs();

    for _ in 0..MAX_ITERS {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);

        if f_mid == 0. || hi - lo < tol {
            return Some(mid);
        }

        if f_lo * f_mid < 0. {
            hi = mid;
        } else {
            lo = mid;
            f_lo = f_mid;
        }
    }

    Some(0.5 * (lo + hi))
}

/// A ray tracer that samples the usable stretch of each ray at a fixed
/// number of uniformly spaced points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BasicRayTracer {
    /// How the usable bounds of each ray are located.
    pub bounds: BoundsSearch,
    /// The number of samples along each ray.
    pub nsamps: usize,
}

impl Default for BasicRayTracer {
    fn default() -> Self {
        BasicRayTracer {
            bounds: BoundsSearch::default(),
            nsamps: 300,
        }
    }
}

impl RayTracer for BasicRayTracer {
    fn create_ray<'a>(&self, x: f64, y: f64, setup: &'a VanAllenSetup) -> Result<Ray<'a>> {
        match self.bounds.find(x, y, setup)? {
            Bounds::Empty { z0, z1 } => Ok(Ray::empty(x, y, Array1::linspace(z0, z1, 2), setup)),
            Bounds::Span { z0, z1 } => Ok(Ray::sample(
                x,
                y,
                Array1::linspace(z0, z1, self.nsamps),
                setup,
            )),
        }
    }
}

/// A ray tracer whose sampling is computed dynamically so that the "formal"
/// constant-coefficient integrator can handle the result.
///
/// The formal integrator evaluates `exp(dx * lambda1)` per step, where
/// `lambda1` is the stiffness scale of the local transfer matrix, so
/// `dx * lambda1` must be kept modest. The tracer evaluates the full
/// radiative-transfer coefficients as it walks the ray and chooses each step
/// accordingly; since the coefficients are in hand anyway, the returned ray
/// is born with them memoized.
///
/// Note that the stiffness depends on `setup.nu()`! If the same ray sampling
/// will be reused at several frequencies, the setup should specify the
/// *lowest* one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FormalRayTracer {
    /// How the usable bounds of each ray are located.
    pub bounds: BoundsSearch,
    /// The maximum value of `dx * lambda1` allowed for any step. Bigger
    /// values mean fewer steps but worse numerics in the integrator.
    pub max_dxlam1: f64,
    /// The minimum number of samples along the usable stretch of any ray,
    /// enforced by capping the step size. This guards against missing
    /// spatial variations of the models in regions that happen to be easy on
    /// the integrator.
    pub min_n_pts: usize,
    /// Log a warning every time a ray grows by this many more samples than
    /// expected. Such rays are pathological but not fatal.
    pub warn_n_pts: usize,
}

impl Default for FormalRayTracer {
    fn default() -> Self {
        FormalRayTracer {
            bounds: BoundsSearch::default(),
            max_dxlam1: 50.,
            min_n_pts: 200,
            warn_n_pts: 1000,
        }
    }
}

impl RayTracer for FormalRayTracer {
    fn create_ray<'a>(&self, x: f64, y: f64, setup: &'a VanAllenSetup) -> Result<Ray<'a>> {
        let (z0, z1) = match self.bounds.find(x, y, setup)? {
            Bounds::Empty { z0, z1 } => {
                return Ok(Ray::empty(x, y, Array1::linspace(z0, z1, 2), setup));
            }
            Bounds::Span { z0, z1 } => (z0, z1),
        };

        let dist_names = setup.distrib().parameter_names();

        // Which distribution parameters feed the calculator, by index.
        let extra_indices: Vec<usize> = setup
            .synch_calc()
            .param_names()
            .iter()
            .map(|&name| {
                dist_names
                    .iter()
                    .position(|&n| n == name)
                    .ok_or(Error::MissingDistributionParameter(name))
            })
            .collect::<Result<Vec<_>>>()?;

        // Regular steps are capped a touch below the maximum so that the
        // final, exact landing on z1 never exceeds it.
        let max_step = (z1 - z0) / self.min_n_pts as f64;
        let min_step = 1e-5 * (z1 - z0);

        let mut zs = Vec::with_capacity(self.min_n_pts);
        let mut bs = Vec::with_capacity(self.min_n_pts);
        let mut thetas = Vec::with_capacity(self.min_n_pts);
        let mut psis = Vec::with_capacity(self.min_n_pts);
        let mut js = Vec::with_capacity(4 * self.min_n_pts);
        let mut alphas = Vec::with_capacity(4 * self.min_n_pts);
        let mut rhos = Vec::with_capacity(3 * self.min_n_pts);
        let mut dsamp_bufs: Vec<Vec<f64>> = dist_names.iter().map(|_| Vec::new()).collect();
        let mut extras = vec![0.; extra_indices.len()];

        let mut z = z0;
        let mut last = false;

        loop {
            if zs.len() >= self.warn_n_pts && zs.len() % self.warn_n_pts == 0 {
                warn!(setup.logger(), "challenging ray";
                      "x" => x, "y" => y, "n_pts" => zs.len());
            }

            let (lat, lon, r) = setup.o2b().to_body_centric(x, y, z);
            let (mlat, mlon, l) = setup.bfield().magnetic_coordinates(lat, lon, r);
            let (bh_lat, bh_lon, bh_r) = setup.bfield().bhat(lat, lon, r);
            let theta = setup.o2b().theta_zhat(x, y, z, bh_lat, bh_lon, bh_r);
            let b = setup.bfield().bmag(lat, lon, r);
            let psi = setup.o2b().theta_yhat_projected(x, y, z, bh_lat, bh_lon, bh_r);
            let dsamps = setup.distrib().sample(mlat, mlon, l);

            for (slot, &idx) in extras.iter_mut().zip(&extra_indices) {
                *slot = dsamps[idx];
            }

            let c = if dsamps[0] > 0. {
                setup
                    .synch_calc()
                    .coefficients(setup.nu(), b, dsamps[0], theta, psi, &extras)
            } else {
                crate::SynchCoefficients::zero()
            };

            zs.push(z);
            bs.push(b);
            thetas.push(theta);
            psis.push(psi);
            js.extend_from_slice(&c.j);
            alphas.extend_from_slice(&c.alpha);
            rhos.extend_from_slice(&c.rho);

            for (buf, &v) in dsamp_bufs.iter_mut().zip(&dsamps) {
                buf.push(v);
            }

            if last {
                break;
            }

            // The stiffness scale lambda1 of the local transfer matrix, from
            // its alpha-QUV and rho pieces.
            let a2 = c.alpha[1].powi(2) + c.alpha[2].powi(2) + c.alpha[3].powi(2);
            let rho2 = c.rho[0].powi(2) + c.rho[1].powi(2) + c.rho[2].powi(2);
            let arho = c.alpha[1] * c.rho[0] + c.alpha[2] * c.rho[1] + c.alpha[3] * c.rho[2];
            let q = 0.5 * (a2 - rho2);
            let lam1 = ((q * q + arho * arho).sqrt() + q).sqrt();

            let dz = (self.max_dxlam1 / lam1 / setup.radius())
                .min(max_step - min_step)
                .max(min_step);

            if z1 - z <= dz + min_step {
                // Land exactly on z1 with a step no larger than max_step.
                z = z1;
                last = true;
            } else {
                z += dz;
            }
        }

        let n = zs.len();
        let params = dist_names
            .iter()
            .zip(dsamp_bufs)
            .map(|(&name, buf)| (name, Array1::from(buf)))
            .collect();

        let coeffs = RtCoefficients {
            j: ndarray::Array2::from_shape_vec((n, 4), js).unwrap(),
            alpha: ndarray::Array2::from_shape_vec((n, 4), alphas).unwrap(),
            rho: ndarray::Array2::from_shape_vec((n, 3), rhos).unwrap(),
        };

        Ok(Ray::from_samples(
            x,
            y,
            Array1::from(zs),
            Array1::from(bs),
            Array1::from(thetas),
            Array1::from(psis),
            params,
            Some(coeffs),
            setup,
        ))
    }
}

#[cfg(test)]
mod tests {
    use slog::o;

    use super::*;
    use crate::distribution::SimpleTorusDistribution;
    use crate::rt::FormalRTIntegrator;
    use crate::synchrotron::PowerLawSynchrotronCalculator;
    use crate::{ObserverToBodycentric, TiltedDipoleField, RJUP};

    fn torus_setup(tracer: Box<dyn RayTracer>) -> VanAllenSetup {
        VanAllenSetup::new(
            ObserverToBodycentric::new(0.2, 0.).unwrap(),
            TiltedDipoleField::new(0.2, 3000.).unwrap(),
            Box::new(SimpleTorusDistribution::new(5., 2., 1e5, 3.)),
            tracer,
            Box::new(PowerLawSynchrotronCalculator::new()),
            Box::new(FormalRTIntegrator::new()),
            1.1 * RJUP,
            95e9,
            slog::Logger::root(slog::Discard, o!()),
        )
    }

    #[test]
    fn test_bisect() {
        let f = |x: f64| x * x - 2.;
        let root = bisect(&f, 0., 2.).unwrap();
        assert!((root - 2_f64.sqrt()).abs() < 1e-9);

        // Endpoint order doesn't matter.
        let root = bisect(&f, 2., 0.).unwrap();
        assert!((root - 2_f64.sqrt()).abs() < 1e-9);

        // No sign change, no root.
        assert!(bisect(&f, 3., 4.).is_none());
    }

    #[test]
    fn test_basic_tracer_through_torus() {
        let setup = torus_setup(Box::new(BasicRayTracer::default()));
        let ray = setup.get_ray(0., 0.).unwrap();

        assert!(!ray.is_empty());
        assert_eq!(ray.n_samples(), 300);

        // z strictly increasing, and bracketed by the coarse search limits.
        let z = ray.z();
        for i in 1..z.len() {
            assert!(z[i] > z[i - 1]);
        }
        assert!(z[0] >= -15. && z[z.len() - 1] <= 15.);

        // The ray starts and ends inside the particle population.
        let n_e = ray.n_e();
        assert!(n_e[0] >= 1.);
        assert!(n_e[n_e.len() - 1] >= 1.);
    }

    #[test]
    fn test_ray_through_disk_starts_above_surface() {
        let setup = torus_setup(Box::new(BasicRayTracer::default()));
        let ray = setup.get_ray(0., 0.).unwrap();
        assert!(ray.z()[0] >= 1.);
    }

    #[test]
    fn test_miss_yields_empty_ray() {
        let setup = torus_setup(Box::new(BasicRayTracer::default()));
        let ray = setup.get_ray(100., 100.).unwrap();

        assert!(ray.is_empty());
        assert_eq!(ray.n_samples(), 2);
        assert_eq!(ray.n_e()[0], 0.);
    }

    #[test]
    fn test_formal_tracer_step_bounds() {
        let setup = torus_setup(Box::new(FormalRayTracer::default()));
        let mut ray = setup.get_ray(0.5, 0.3).unwrap();

        assert!(!ray.is_empty());
        assert!(ray.n_samples() >= 2);

        let z = ray.z().clone();
        let span = z[z.len() - 1] - z[0];
        let max_step = span / 200.;
        let min_step = 1e-5 * span;

        for i in 1..z.len() {
            let dz = z[i] - z[i - 1];
            assert!(dz >= 0.999 * min_step);
            assert!(dz <= 1.001 * max_step);
        }

        // The ray arrives memoized: integrating must not touch the
        // calculator again, and must produce finite intensities.
        let iquv = ray.integrate(false).unwrap();
        assert!(iquv[0].is_finite() && iquv[0] > 0.);
    }
}
