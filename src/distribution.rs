// Copyright 2015-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

/*! Models of the trapped energetic-electron population.

Every model implements [`ParticleDistribution`](crate::ParticleDistribution):
a fixed list of named parameters, a full pointwise sampler, and a cheap
density-only query used while hunting for ray bounds. All of the models here
report two parameters, the electron density `n_e` (cm^-3) and the power-law
index `p` of the electron energy spectrum, N(>E) ~ E^(-p).

Positions are given in magnetic coordinates (mlat, mlon, L); the models map
them back to dipole-centric space via r = L cos²(mlat) as needed.

*/

use ndarray::{Array1, Array2};

use crate::coords::sph_to_cart;
use crate::ParticleDistribution;

const TORUS_PARAMETERS: &[&str] = &["n_e", "p"];

/// A uniformly filled torus with fixed electron energetics.
///
/// *r1* and *r2* are the major and minor radii, in units of the body's
/// radius. *n_e* is the density of energetic electrons inside the torus, in
/// cm^-3; *p* is their power-law index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimpleTorusDistribution {
    r1: f64,
    r2: f64,
    n_e: f64,
    p: f64,
}

impl SimpleTorusDistribution {
    /// Create a new torus.
    pub fn new(r1: f64, r2: f64, n_e: f64, p: f64) -> Self {
        SimpleTorusDistribution { r1, r2, n_e, p }
    }

    fn inside(&self, mlat: f64, mlon: f64, l: f64) -> bool {
        let r = l * mlat.cos().powi(2);
        let (x, y, z) = sph_to_cart(mlat, mlon, r);

        // The classic quartic inside-a-torus test. Thanks, Internet.
        let a = self.r1;
        let b = self.r2;
        let q = (x * x + y * y + z * z - (a * a + b * b)).powi(2) - 4. * a * b * (b * b - z * z);
        q < 0.
    }
}

impl ParticleDistribution for SimpleTorusDistribution {
    fn parameter_names(&self) -> &'static [&'static str] {
        TORUS_PARAMETERS
    }

    fn sample(&self, mlat: f64, mlon: f64, l: f64) -> Vec<f64> {
        if self.inside(mlat, mlon, l) {
            vec![self.n_e, self.p]
        } else {
            vec![0., 0.]
        }
    }

    fn density(&self, mlat: f64, mlon: f64, l: f64) -> f64 {
        if self.inside(mlat, mlon, l) {
            self.n_e
        } else {
            0.
        }
    }
}

/// A hard-edged "washer" shape.
///
/// The washer occupies inner radius < cylindrical radius < outer radius,
/// |z| < thickness / 2, all in units of the body's radius, in dipole-centric
/// space. The density may be concentrated toward the inner edge:
///
/// ```text
/// n_e(r) ∝ ((r_outer - r) / (r_outer - r_inner))^radial_concentration
/// ```
///
/// Zero concentration gives a flat washer; 1 a linear increase from outer to
/// inner edge. The total number of electrons is conserved as the
/// concentration changes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimpleWasherDistribution {
    r_inner: f64,
    r_outer: f64,
    thickness: f64,
    p: f64,
    radial_concentration: f64,
    density_factor: f64,
}

impl SimpleWasherDistribution {
    /// Create a new washer with the given geometry, mean energetic electron
    /// density *n_e* (cm^-3), power-law index *p*, and radial
    /// concentration.
    pub fn new(
        r_inner: f64,
        r_outer: f64,
        thickness: f64,
        n_e: f64,
        p: f64,
        radial_concentration: f64,
    ) -> Self {
        // Choose the density normalization so that the total number of
        // electrons stays fixed as radial_concentration varies. For c = 0,
        // N = n_e · thickness · pi · (r_outer² - r_inner²) and the factor
        // reduces to n_e, as one would hope; the generic integral
        // simplifies to the expression below.
        let c = radial_concentration;
        let numer = n_e * (r_outer.powi(2) - r_inner.powi(2));
        let denom =
            2. * (r_outer - r_inner) * ((c + 1.) * r_inner + r_outer) / ((c + 1.) * (c + 2.));

        SimpleWasherDistribution {
            r_inner,
            r_outer,
            thickness,
            p,
            radial_concentration,
            density_factor: numer / denom,
        }
    }

    fn density_at(&self, mlat: f64, mlon: f64, l: f64) -> f64 {
        let r = l * mlat.cos().powi(2);
        let (x, y, z) = sph_to_cart(mlat, mlon, r);
        let rcyl2 = x * x + y * y;

        if rcyl2 <= self.r_inner.powi(2)
            || rcyl2 >= self.r_outer.powi(2)
            || z.abs() >= 0.5 * self.thickness
        {
            return 0.;
        }

        self.density_factor
            * ((self.r_outer - rcyl2.sqrt()) / (self.r_outer - self.r_inner))
                .powf(self.radial_concentration)
    }
}

impl ParticleDistribution for SimpleWasherDistribution {
    fn parameter_names(&self) -> &'static [&'static str] {
        TORUS_PARAMETERS
    }

    fn sample(&self, mlat: f64, mlon: f64, l: f64) -> Vec<f64> {
        let n_e = self.density_at(mlat, mlon, l);
        let p = if n_e > 0. { self.p } else { 0. };
        vec![n_e, p]
    }

    fn density(&self, mlat: f64, mlon: f64, l: f64) -> f64 {
        self.density_at(mlat, mlon, l)
    }
}

/// A distribution of particles evaluated numerically on an (L, |mlat|) grid.
///
/// This stands in for particle models that are computed offline on a grid of
/// shells and latitudes: densities and power-law indices are interpolated
/// bilinearly between grid nodes, and positions outside the grid report
/// zeros, which the ray tracer treats as vacuum. The model is axially
/// symmetric (mlon is ignored) and symmetric about the magnetic equator
/// (latitudes enter as |mlat|).
#[derive(Clone, Debug)]
pub struct GriddedDistribution {
    l_axis: Array1<f64>,
    lat_axis: Array1<f64>,
    n_e: Array2<f64>,
    p: Array2<f64>,
}

impl GriddedDistribution {
    /// Create a new gridded distribution.
    ///
    /// *l_axis* (length nl) and *lat_axis* (length nlat, nonnegative) must
    /// be strictly increasing; *n_e* and *p* have shape (nl, nlat).
    pub fn new(
        l_axis: Array1<f64>,
        lat_axis: Array1<f64>,
        n_e: Array2<f64>,
        p: Array2<f64>,
    ) -> crate::Result<Self> {
        let shape = (l_axis.len(), lat_axis.len());

        if n_e.dim() != shape || p.dim() != shape {
            return Err(crate::Error::InvalidDistributionGrid(format!(
                "gridded distribution arrays have shape {:?}/{:?} but axes imply {:?}",
                n_e.dim(),
                p.dim(),
                shape
            )));
        }

        Ok(GriddedDistribution {
            l_axis,
            lat_axis,
            n_e,
            p,
        })
    }

    /// Locate `x` within `axis`, returning the left node index and the
    /// fractional position within the cell; None if outside the grid.
    fn locate(axis: &Array1<f64>, x: f64) -> Option<(usize, f64)> {
        let n = axis.len();

        if n < 2 || x < axis[0] || x > axis[n - 1] {
            return None;
        }

        let mut i = match axis
            .as_slice()
            .map(|s| s.partition_point(|&v| v <= x))
        {
            Some(k) => k,
            None => return None,
        };

        // partition_point gives the first node beyond x; step back to the
        // cell's left edge, keeping the top edge in the final cell.
        i = i.saturating_sub(1).min(n - 2);
        let frac = (x - axis[i]) / (axis[i + 1] - axis[i]);
        Some((i, frac))
    }

    fn interp(&self, mlat: f64, l: f64) -> (f64, f64) {
        let (il, fl) = match Self::locate(&self.l_axis, l) {
            Some(t) => t,
            None => return (0., 0.),
        };
        let (ia, fa) = match Self::locate(&self.lat_axis, mlat.abs()) {
            Some(t) => t,
            None => return (0., 0.),
        };

        let bilin = |arr: &Array2<f64>| {
            arr[(il, ia)] * (1. - fl) * (1. - fa)
                + arr[(il + 1, ia)] * fl * (1. - fa)
                + arr[(il, ia + 1)] * (1. - fl) * fa
                + arr[(il + 1, ia + 1)] * fl * fa
        };

        (bilin(&self.n_e), bilin(&self.p))
    }
}

impl ParticleDistribution for GriddedDistribution {
    fn parameter_names(&self) -> &'static [&'static str] {
        TORUS_PARAMETERS
    }

    fn sample(&self, mlat: f64, _mlon: f64, l: f64) -> Vec<f64> {
        let (n_e, p) = self.interp(mlat, l);
        vec![n_e, p]
    }

    fn density(&self, mlat: f64, _mlon: f64, l: f64) -> f64 {
        self.interp(mlat, l).0
    }
}
