// Copyright 2015-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

/*! Synchrotron radio imaging of a tilted dipolar planetary magnetosphere.

This crate models the synchrotron emission of energetic electrons trapped in
the radiation belts of a body with a tilted dipolar magnetic field, producing
synthetic Stokes-IQUV images as seen by a distant observer. Each observer
pixel defines a straight line of sight; the crate transforms it into
body-centric and magnetic coordinates, searches it for the region containing
emitting particles, samples it finely enough for the stiff radiative-transfer
problem to stay tractable, and integrates the polarized transfer equation
along it.

The pipeline for one pixel is:

```text
(x, y) → ObserverToBodycentric → (lat, lon, r) samples along z
       → TiltedDipoleField → (mlat, mlon, L)
       → ParticleDistribution → n_e and friends
       → SynchrotronCalculator → (j, α, ρ) per sample
       → RTIntegrator → Stokes IQUV at the ray end
```

The particle distribution, the coefficient calculator, and the transfer
integrator are capability traits so that detailed external implementations
(gridded particle models, full synchrotron integrations, alternative ODE
kernels) can be plugged in; simple concrete versions of each are provided.

Ray paths are straight lines in the observer frame: there is no refraction or
relativistic bending. Distances along rays are in units of the body's radius
except where noted; path lengths handed to the transfer integrator are in cm.

*/

#![deny(missing_docs)]

use ndarray::{Array1, Array2};
use thiserror::Error;

pub use std::f64::consts::PI;

/// Two times pi, as an `f64`.
pub const TWO_PI: f64 = 2. * PI;

/// The mass of the electron in cgs (grams).
pub const MASS_ELECTRON: f64 = 9.1093826e-28;

/// The speed of light in cgs (centimeters per second).
pub const SPEED_LIGHT: f64 = 2.99792458e10;

/// The charge of the electron, in cgs (esu's).
pub const ELECTRON_CHARGE: f64 = 4.80320680e-10;

/// The equatorial radius of Jupiter, in cm. Handy for scaling body radii.
pub const RJUP: f64 = 7.1492e9;

/// Things that can go wrong while setting up or tracing rays.
///
/// Invalid construction parameters and bad indices are surfaced eagerly;
/// numerical degeneracies in angle computations are *not* errors and instead
/// propagate as NaN.
#[derive(Error, Debug)]
pub enum Error {
    /// The observer's latitude-of-center must lie in [0, pi/2]; south-pole
    /// views are represented by rolling the body, not by negative values.
    #[error("illegal latitude-of-center {0} (must lie within [0, pi/2])")]
    IllegalLatitudeOfCenter(f64),

    /// The dipole tilt must lie in [0, pi); reversed polarity is expressed
    /// through the sign of the moment, not by tilting past pi.
    #[error("illegal dipole tilt {0} (must lie within [0, pi))")]
    IllegalTilt(f64),

    /// The search for the z where the electron density crosses the cutoff
    /// failed to converge. This indicates a broken density profile and is
    /// fatal for the ray in question.
    #[error(
        "could not locate the density cutoff between z = {z_low} and z = {z_high} \
         for the ray at x = {x}, y = {y}"
    )]
    BoundSearchFailed {
        /// The ray's horizontal observer coordinate.
        x: f64,
        /// The ray's vertical observer coordinate.
        y: f64,
        /// The lower end of the attempted bracket.
        z_low: f64,
        /// The upper end of the attempted bracket.
        z_high: f64,
    },

    /// A pixel index fell outside a precomputed ray cache.
    #[error("bad pixel index ({ix}, {iy}); nx = {nx}, ny = {ny}")]
    PixelOutOfRange {
        /// The offending column index.
        ix: usize,
        /// The offending row index.
        iy: usize,
        /// The number of columns in the cache.
        nx: usize,
        /// The number of rows in the cache.
        ny: usize,
    },

    /// A textual Stokes-parameter mnemonic was not recognized.
    #[error("unrecognized textual Stokes parameter {0:?}")]
    UnknownStokesParam(String),

    /// The synchrotron calculator asked for a distribution parameter that
    /// the particle distribution does not provide.
    #[error("the distribution provides no parameter named {0:?}")]
    MissingDistributionParameter(&'static str),

    /// A gridded particle distribution was constructed from inconsistent
    /// arrays.
    #[error("inconsistent distribution grid: {0}")]
    InvalidDistributionGrid(String),

    /// A precomputed ray cache was constructed from inconsistent arrays.
    #[error("inconsistent precomputed-ray data: {0}")]
    InvalidRayCache(String),
}

/// A `Result` whose error type is our [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Emission, absorption, and Faraday coefficients at one sample point.
///
/// Units are cgs: emission in erg/(s Hz sr cm^3), absorption and Faraday
/// mixing in cm^-1. The Stokes ordering is IQUV; the Faraday vector is
/// (rho_Q, rho_U, rho_V).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SynchCoefficients {
    /// Emission coefficients for Stokes IQUV.
    pub j: [f64; 4],
    /// Absorption coefficients for Stokes IQUV.
    pub alpha: [f64; 4],
    /// Faraday mixing coefficients for Stokes QUV.
    pub rho: [f64; 3],
}

impl SynchCoefficients {
    /// Coefficients that are identically zero: vacuum.
    pub fn zero() -> Self {
        SynchCoefficients {
            j: [0.; 4],
            alpha: [0.; 4],
            rho: [0.; 3],
        }
    }
}

/// A model of the energetic-electron population, queried in magnetic
/// coordinates.
///
/// The distribution is characterized by a fixed list of named scalar
/// parameters; the first is always `n_e`, the energetic electron density in
/// cm^-3. Implementations must be cheap enough to call once per ray sample.
pub trait ParticleDistribution: Send + Sync {
    /// The names of the parameters this distribution provides. The first
    /// entry is always `"n_e"`.
    fn parameter_names(&self) -> &'static [&'static str];

    /// Sample every parameter at the given magnetic coordinates. The
    /// returned values correspond one-to-one with `parameter_names()`.
    fn sample(&self, mlat: f64, mlon: f64, l: f64) -> Vec<f64>;

    /// Sample only the electron density. This is the cheap fast path used
    /// while searching for a ray's usable bounds, where the other
    /// parameters would be wasted work.
    fn density(&self, mlat: f64, mlon: f64, l: f64) -> f64;
}

/// A calculator of synchrotron radiative-transfer coefficients.
///
/// This is the seam where a detailed synchrotron code (or an approximation
/// thereof) plugs into the ray tracer. Implementations receive the local
/// physical state plus any extra distribution parameters they declared via
/// `param_names`.
pub trait SynchrotronCalculator: Send + Sync {
    /// The names of the distribution parameters (beyond `n_e`) that this
    /// calculator consumes, in the order it wants them in `extras`.
    fn param_names(&self) -> &'static [&'static str];

    /// Compute coefficients for the given observing frequency *nu* (Hz),
    /// field strength *b* (Gauss), electron density *n_e* (cm^-3),
    /// field/line-of-sight angle *theta* (radians), and polarization-axis
    /// angle *psi* (radians). `extras` matches `param_names()`.
    fn coefficients(
        &self,
        nu: f64,
        b: f64,
        n_e: f64,
        theta: f64,
        psi: f64,
        extras: &[f64],
    ) -> SynchCoefficients;
}

/// A numerical kernel that integrates the polarized radiative transfer
/// equation along a sampled ray.
pub trait RTIntegrator: Send + Sync {
    /// Integrate the transfer equation.
    ///
    /// *s* is the path length in cm, strictly increasing, with at least two
    /// samples. *j* and *alpha* have shape (n, 4); *rho* has shape (n, 3).
    /// Returns the Stokes IQUV intensities along the ray, shape (n, 4), in
    /// erg/(s Hz sr cm^2); the final row is the intensity reaching the
    /// observer.
    fn integrate(
        &self,
        s: &Array1<f64>,
        j: &Array2<f64>,
        alpha: &Array2<f64>,
        rho: &Array2<f64>,
    ) -> Array2<f64>;
}

/// A strategy for constructing the sample sequence of a ray.
pub trait RayTracer: Send + Sync {
    /// Create and initialize a [`Ray`] for the observer pixel (x, y),
    /// in units of the body's radius.
    ///
    /// A line of sight that never crosses any plausible electron population
    /// yields an "empty" ray, which is a valid terminal state and not an
    /// error; a bound search that fails to converge is an error.
    fn create_ray<'a>(&self, x: f64, y: f64, setup: &'a VanAllenSetup) -> Result<Ray<'a>>;
}

pub mod coords;
pub mod dipole;
pub mod distribution;
pub mod image;
pub mod observer;
pub mod ray;
pub mod rt;
pub mod setup;
pub mod synchrotron;
pub mod tracer;

pub use dipole::TiltedDipoleField;
pub use distribution::{GriddedDistribution, SimpleTorusDistribution, SimpleWasherDistribution};
pub use image::{ImageMaker, PrecomputedRays, StokesParam};
pub use observer::ObserverToBodycentric;
pub use ray::{IntegrationExtras, Ray, RtCoefficients};
pub use rt::FormalRTIntegrator;
pub use setup::VanAllenSetup;
pub use synchrotron::PowerLawSynchrotronCalculator;
pub use tracer::{BasicRayTracer, FormalRayTracer};
