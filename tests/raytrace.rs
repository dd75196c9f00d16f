// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

//! End-to-end checks of the ray tracing and transfer integration pipeline.

use vanallen::{
    BasicRayTracer, FormalRTIntegrator, FormalRayTracer, ImageMaker, ObserverToBodycentric,
    ParticleDistribution, PowerLawSynchrotronCalculator, RayTracer, SimpleTorusDistribution,
    StokesParam, TiltedDipoleField, VanAllenSetup, RJUP,
};

fn jupiter_like(
    distrib: Box<dyn ParticleDistribution>,
    tracer: Box<dyn RayTracer>,
) -> VanAllenSetup {
    VanAllenSetup::new(
        ObserverToBodycentric::new(10_f64.to_radians(), 20_f64.to_radians()).unwrap(),
        TiltedDipoleField::new(15_f64.to_radians(), 3000.).unwrap(),
        distrib,
        tracer,
        Box::new(PowerLawSynchrotronCalculator::new()),
        Box::new(FormalRTIntegrator::new()),
        1.1 * RJUP,
        95e9,
        vanallen_test_support::default_log(),
    )
}

fn torus_setup(tracer: Box<dyn RayTracer>) -> VanAllenSetup {
    jupiter_like(
        Box::new(SimpleTorusDistribution::new(5., 2., 1e5, 3.)),
        tracer,
    )
}

#[test]
fn central_pixel_emits() {
    let setup = torus_setup(Box::new(BasicRayTracer::default()));
    let mut ray = setup.get_ray(0., 0.).unwrap();

    let iquv = ray.integrate(false).unwrap();

    assert!(iquv[0] > 0.);
    assert!(iquv.iter().all(|v| v.is_finite()));

    // The polarized intensities can't exceed the total.
    let pol = (iquv[1].powi(2) + iquv[2].powi(2) + iquv[3].powi(2)).sqrt();
    assert!(pol <= iquv[0]);
}

#[test]
fn far_pixel_is_empty() {
    let setup = torus_setup(Box::new(BasicRayTracer::default()));
    let mut ray = setup.get_ray(100., 100.).unwrap();

    assert!(ray.is_empty());
    assert_eq!(ray.n_samples(), 2);
    assert_eq!(ray.integrate(false).unwrap(), [0., 0., 0., 0.]);
    assert_eq!(ray.sigma_e(), 0.);
}

#[test]
fn whole_ray_profile_ends_at_terminal_intensity() {
    let setup = torus_setup(Box::new(BasicRayTracer::default()));
    let mut ray = setup.get_ray(0.3, -0.2).unwrap();

    let terminal = ray.integrate(false).unwrap();
    let profile = ray.integrate_whole_ray().unwrap();
    let last = profile.nrows() - 1;

    for k in 0..4 {
        assert_eq!(profile[(last, k)], terminal[k]);
    }

    // Intensity starts dark at the back of the ray.
    assert_eq!(profile[(0, 0)], 0.);
}

#[test]
fn extras_match_diagnostics() {
    let setup = torus_setup(Box::new(BasicRayTracer::default()));
    let mut ray = setup.get_ray(0., 0.).unwrap();

    let extras = ray.integrate_with_extras().unwrap();

    assert!(extras.optical_depth > 0.);
    assert_eq!(extras.electron_column, ray.sigma_e());
    assert_eq!(extras.optical_depth, ray.optical_depth().unwrap());
    assert_eq!(extras.iquv, ray.integrate(false).unwrap());
}

#[test]
fn coefficient_memoization_is_idempotent() {
    let setup = torus_setup(Box::new(BasicRayTracer::default()));
    let mut ray = setup.get_ray(0., 0.).unwrap();

    let j_first = ray.rt_coefficients().unwrap().j.clone();
    let j_again = ray.rt_coefficients().unwrap().j.clone();
    assert_eq!(j_first, j_again);

    let iquv1 = ray.integrate(false).unwrap();
    let iquv2 = ray.integrate(false).unwrap();
    assert_eq!(iquv1, iquv2);
}

/// A density field that fills all of space, so that the coarse bound scan
/// finds particles everywhere and the usable span of every ray runs from one
/// search limit to the other.
struct UniformFog;

impl ParticleDistribution for UniformFog {
    fn parameter_names(&self) -> &'static [&'static str] {
        &["n_e", "p"]
    }

    fn sample(&self, _mlat: f64, _mlon: f64, _l: f64) -> Vec<f64> {
        vec![1e4, 3.]
    }

    fn density(&self, _mlat: f64, _mlon: f64, _l: f64) -> f64 {
        1e4
    }
}

#[test]
fn adaptive_sampling_lands_exactly_on_the_far_bound() {
    let setup = jupiter_like(Box::new(UniformFog), Box::new(FormalRayTracer::default()));
    let ray = setup.get_ray(3., 0.).unwrap();

    let z = ray.z();
    let n = z.len();

    // The fog is everywhere, so the bounds are the raw search limits, and
    // the final sample must land on the far one exactly.
    assert_eq!(z[0], -15.);
    assert_eq!(z[n - 1], 15.);

    // Step sizes honor the configured bounds.
    let span = 30.;
    let max_step = span / 200.;
    let min_step = 1e-5 * span;

    for i in 1..n {
        let dz = z[i] - z[i - 1];
        assert!(dz >= 0.999 * min_step);
        assert!(dz <= 1.001 * max_step);
    }

    assert!(n >= 200);
}

#[test]
fn adaptive_ray_matches_its_own_coefficients() {
    // A ray from the adaptive tracer is born with memoized coefficients;
    // they must agree with what a fresh computation produces.
    let setup = torus_setup(Box::new(FormalRayTracer::default()));
    let mut ray = setup.get_ray(0.5, 0.1).unwrap();

    let born = ray.rt_coefficients().unwrap().j.clone();

    let mut resampled = vanallen::Ray::sample(0.5, 0.1, ray.z().clone(), &setup);
    let fresh = resampled.rt_coefficients().unwrap().j.clone();

    assert_eq!(born.dim(), fresh.dim());

    for (a, b) in born.iter().zip(fresh.iter()) {
        assert!((a - b).abs() <= 1e-12 * a.abs().max(b.abs()));
    }
}

#[test]
fn small_image_is_sane() {
    let setup = torus_setup(Box::new(BasicRayTracer::default()));
    let im = ImageMaker::new(&setup).grid(5, 5, 7., 7.);
    let cube = im.compute().unwrap();

    assert_eq!(cube.dim(), (4, 5, 5));

    let flux_i = StokesParam::I.flux(&cube);
    assert!(flux_i > 0. && flux_i.is_finite());

    // Every pixel's polarized intensity is bounded by its Stokes I.
    for iy in 0..5 {
        for ix in 0..5 {
            let i = cube[(0, iy, ix)];
            let pol = (cube[(1, iy, ix)].powi(2)
                + cube[(2, iy, ix)].powi(2)
                + cube[(3, iy, ix)].powi(2))
            .sqrt();
            assert!(pol <= i * (1. + 1e-9) + 1e-30);
        }
    }

    // The corner pixels miss the torus entirely.
    assert_eq!(cube[(0, 0, 0)], 0.);
    assert_eq!(cube[(0, 4, 4)], 0.);
}
