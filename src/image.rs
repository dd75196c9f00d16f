// Copyright 2015-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

/*! Making and interpreting synthetic Stokes images.

[`ImageMaker`] maps a grid of observer pixels onto rays, runs an arbitrary
per-ray reduction over the grid with the rows computed in parallel, and
reassembles the results into an image cube. [`StokesParam`] names the
quantities that can be read out of such a cube, including derived ones like
the linear polarization fraction. [`PrecomputedRays`] replays ray samplings
computed earlier, which makes re-rendering the same geometry at a different
frequency cheap.

*/

use std::str::FromStr;

use ndarray::{Array1, Array2, Array3, Axis};
use rayon::prelude::*;

use crate::ray::Ray;
use crate::setup::VanAllenSetup;
use crate::{Error, RayTracer, Result};

/// A Stokes parameter, or a quantity derived from several of them, to read
/// out of an image cube.
///
/// The textual forms accepted by the `FromStr` implementation are `i`, `q`,
/// `u`, `v`, `absv`, `l`, `fl`, and `fc`, case-insensitively.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StokesParam {
    /// Total intensity.
    I,
    /// Linear polarization referenced to the observer's y axis.
    Q,
    /// Linear polarization referenced 45 degrees from the observer's y axis.
    U,
    /// Circular polarization.
    V,
    /// The absolute value of Stokes V.
    AbsV,
    /// The total linearly polarized intensity, `sqrt(Q^2 + U^2)`.
    Linear,
    /// The linear polarization fraction, `sqrt(Q^2 + U^2) / I`; zero where
    /// I is zero.
    FracLinear,
    /// The circular polarization fraction, `V / I` (signed); zero where I is
    /// zero.
    FracCircular,
}

impl FromStr for StokesParam {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "i" => Ok(StokesParam::I),
            "q" => Ok(StokesParam::Q),
            "u" => Ok(StokesParam::U),
            "v" => Ok(StokesParam::V),
            "absv" => Ok(StokesParam::AbsV),
            "l" => Ok(StokesParam::Linear),
            "fl" => Ok(StokesParam::FracLinear),
            "fc" => Ok(StokesParam::FracCircular),
            _ => Err(Error::UnknownStokesParam(s.to_owned())),
        }
    }
}

impl StokesParam {
    /// Extract this quantity from an IQUV image cube of shape (4, ny, nx),
    /// as one image of shape (ny, nx).
    ///
    /// Note that for the derived quantities, each *pixel* is combined
    /// separately: a `Linear` frame is everywhere positive, so summing it
    /// loses the cancellation between pixels of opposite polarization sign
    /// that real observations would see. When comparing to photometry, use
    /// [`StokesParam::flux`].
    pub fn frame(&self, cube: &Array3<f64>) -> Array2<f64> {
        let plane = |i: usize| cube.index_axis(Axis(0), i).to_owned();

        match self {
            StokesParam::I => plane(0),
            StokesParam::Q => plane(1),
            StokesParam::U => plane(2),
            StokesParam::V => plane(3),
            StokesParam::AbsV => plane(3).mapv(f64::abs),
            StokesParam::Linear => {
                let q = plane(1);
                let u = plane(2);
                (&q * &q + &u * &u).mapv(f64::sqrt)
            }
            StokesParam::FracLinear => {
                let i = plane(0);
                let lin = StokesParam::Linear.frame(cube);
                frac_guarded(&lin, &i)
            }
            StokesParam::FracCircular => {
                let i = plane(0);
                let v = plane(3);
                frac_guarded(&v, &i)
            }
        }
    }

    /// Extract this quantity integrated over the image: the sum of the pixel
    /// values for the plain Stokes parameters (NaN pixels ignored), with the
    /// derived quantities combined *after* summing.
    pub fn flux(&self, cube: &Array3<f64>) -> f64 {
        let plane_sum = |i: usize| {
            cube.index_axis(Axis(0), i)
                .iter()
                .filter(|v| !v.is_nan())
                .sum::<f64>()
        };

        match self {
            StokesParam::I => plane_sum(0),
            StokesParam::Q => plane_sum(1),
            StokesParam::U => plane_sum(2),
            StokesParam::V => plane_sum(3),
            StokesParam::AbsV => plane_sum(3).abs(),
            StokesParam::Linear => (plane_sum(1).powi(2) + plane_sum(2).powi(2)).sqrt(),
            StokesParam::FracLinear => {
                let i = plane_sum(0);
                if i == 0. {
                    0.
                } else {
                    StokesParam::Linear.flux(cube) / i
                }
            }
            StokesParam::FracCircular => {
                let i = plane_sum(0);
                if i == 0. {
                    0.
                } else {
                    plane_sum(3) / i
                }
            }
        }
    }
}

/// Elementwise `num / den`, with zero where the denominator is zero.
fn frac_guarded(num: &Array2<f64>, den: &Array2<f64>) -> Array2<f64> {
    let mut out = num.clone();

    for (o, &d) in out.iter_mut().zip(den.iter()) {
        if d == 0. {
            *o = 0.;
        } else {
            *o /= d;
        }
    }

    out
}

/// A pixel grid over the observer's sky plane, plus the machinery to render
/// it.
///
/// Pixel (ix, iy) = (0, 0) is the bottom-left corner of the image; the grid
/// spans ±xhalfsize and ±yhalfsize body radii around the body.
#[derive(Clone, Copy, Debug)]
pub struct ImageMaker<'a> {
    setup: &'a VanAllenSetup,
    /// The number of pixel columns.
    pub nx: usize,
    /// The number of pixel rows.
    pub ny: usize,
    /// The image half-width, in body radii.
    pub xhalfsize: f64,
    /// The image half-height, in body radii.
    pub yhalfsize: f64,
}

impl<'a> ImageMaker<'a> {
    /// Create an image maker with the default grid: 23×23 pixels spanning
    /// ±7 body radii.
    pub fn new(setup: &'a VanAllenSetup) -> Self {
        ImageMaker {
            setup,
            nx: 23,
            ny: 23,
            xhalfsize: 7.,
            yhalfsize: 7.,
        }
    }

    /// Alter the pixel grid.
    pub fn grid(mut self, nx: usize, ny: usize, xhalfsize: f64, yhalfsize: f64) -> Self {
        self.nx = nx;
        self.ny = ny;
        self.xhalfsize = xhalfsize;
        self.yhalfsize = yhalfsize;
        self
    }

    /// The observer-frame (x, y) of the center of pixel (ix, iy), in body
    /// radii.
    pub fn map_pixel(&self, ix: usize, iy: usize) -> (f64, f64) {
        let map = |i: usize, n: usize, halfsize: f64| {
            if n < 2 {
                0.
            } else {
                -halfsize + 2. * halfsize * i as f64 / (n - 1) as f64
            }
        };

        (
            map(ix, self.nx, self.xhalfsize),
            map(iy, self.ny, self.yhalfsize),
        )
    }

    /// Trace the ray for pixel (ix, iy).
    pub fn get_ray(&self, ix: usize, iy: usize) -> Result<Ray<'a>> {
        let (x, y) = self.map_pixel(ix, iy);
        self.setup.get_ray(x, y)
    }

    /// Compute a Stokes IQUV image cube, shape (4, ny, nx), in
    /// erg/(s Hz sr cm^2).
    pub fn compute(&self) -> Result<Array3<f64>> {
        self.image_ray_func(|mut ray| ray.integrate(false).map(|iquv| iquv.to_vec()), 0, None)
    }

    /// Map an arbitrary per-ray reduction over (part of) the pixel grid.
    ///
    /// *func* receives each traced ray and returns a fixed-length vector of
    /// values; the result has shape (len, n_rows, nx). Rows are computed in
    /// parallel, and reassembled in row-index order no matter which finishes
    /// first. The first failing ray aborts the whole image.
    pub fn image_ray_func<F>(
        &self,
        func: F,
        first_row: usize,
        n_rows: Option<usize>,
    ) -> Result<Array3<f64>>
    where
        F: Fn(Ray<'a>) -> Result<Vec<f64>> + Sync,
    {
        let n_rows = n_rows.unwrap_or(self.ny - first_row);

        let rows: Vec<Vec<Vec<f64>>> = (first_row..first_row + n_rows)
            .into_par_iter()
            .map(|iy| {
                let mut row = Vec::with_capacity(self.nx);

                for ix in 0..self.nx {
                    row.push(self.get_ray(ix, iy).and_then(&func)?);
                }

                Ok(row)
            })
            .collect::<Result<Vec<_>>>()?;

        let v_len = rows[0][0].len();
        let mut data = Array3::zeros((v_len, n_rows, self.nx));

        for (iy, row) in rows.iter().enumerate() {
            for (ix, value) in row.iter().enumerate() {
                for (iv, &v) in value.iter().enumerate() {
                    data[(iv, iy, ix)] = v;
                }
            }
        }

        Ok(data)
    }
}

/// An in-memory cache of precomputed ray samplings, one per pixel of an
/// image grid.
///
/// Tracing rays is expensive and purely geometric apart from the
/// radiative-transfer coefficients, so a sampling computed once can be
/// replayed to render the same configuration at, say, several frequencies.
/// Each pixel stores its own sample count; the per-sample arrays have shape
/// (ny, nx, max_count) and only the leading `counts[iy, ix]` entries of each
/// pixel's slice are meaningful.
///
/// The cache implements [`RayTracer`] by snapping the requested (x, y) to
/// the nearest stored pixel, so it can serve as the ray-tracing strategy of
/// a [`VanAllenSetup`] and drive an unmodified [`ImageMaker`].
#[derive(Clone, Debug)]
pub struct PrecomputedRays {
    xvals: Array1<f64>,
    yvals: Array1<f64>,
    counts: Array2<usize>,
    z: Array3<f64>,
    b: Array3<f64>,
    theta: Array3<f64>,
    psi: Array3<f64>,
    params: Vec<(&'static str, Array3<f64>)>,
}

impl PrecomputedRays {
    /// Assemble a cache from its arrays.
    ///
    /// *xvals* (length nx) and *yvals* (length ny) give the pixel centers in
    /// body radii; *counts* has shape (ny, nx); the per-sample arrays all
    /// have shape (ny, nx, max_count), and *params* must lead with `n_e`.
    /// The arrays are cross-validated eagerly, so that a malformed cache
    /// fails at construction rather than at some arbitrary pixel later.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        xvals: Array1<f64>,
        yvals: Array1<f64>,
        counts: Array2<usize>,
        z: Array3<f64>,
        b: Array3<f64>,
        theta: Array3<f64>,
        psi: Array3<f64>,
        params: Vec<(&'static str, Array3<f64>)>,
    ) -> Result<Self> {
        let ny = yvals.len();
        let nx = xvals.len();

        if counts.dim() != (ny, nx) {
            return Err(Error::InvalidRayCache(format!(
                "counts have shape {:?} but the grid is ({}, {})",
                counts.dim(),
                ny,
                nx
            )));
        }

        let shape = z.dim();

        for (name, arr) in [("z", &z), ("b", &b), ("theta", &theta), ("psi", &psi)] {
            if arr.dim() != shape || shape.0 != ny || shape.1 != nx {
                return Err(Error::InvalidRayCache(format!(
                    "sample array {:?} has shape {:?}; expected ({}, {}, {})",
                    name, arr.dim(), ny, nx, shape.2
                )));
            }
        }

        for (name, arr) in &params {
            if arr.dim() != shape {
                return Err(Error::InvalidRayCache(format!(
                    "parameter array {:?} has shape {:?}; expected {:?}",
                    name,
                    arr.dim(),
                    shape
                )));
            }
        }

        if params.first().map(|(n, _)| *n) != Some("n_e") {
            return Err(Error::InvalidRayCache(
                "the first parameter array must be n_e".to_owned(),
            ));
        }

        for &count in counts.iter() {
            if count < 2 || count > shape.2 {
                return Err(Error::InvalidRayCache(format!(
                    "pixel sample count {} outside the legal range [2, {}]",
                    count, shape.2
                )));
            }
        }

        Ok(PrecomputedRays {
            xvals,
            yvals,
            counts,
            z,
            b,
            theta,
            psi,
            params,
        })
    }

    /// The number of pixel columns.
    pub fn nx(&self) -> usize {
        self.xvals.len()
    }

    /// The number of pixel rows.
    pub fn ny(&self) -> usize {
        self.yvals.len()
    }

    /// Rebuild the ray stored for pixel (ix, iy).
    pub fn get_ray<'a>(&self, ix: usize, iy: usize, setup: &'a VanAllenSetup) -> Result<Ray<'a>> {
        if ix >= self.nx() || iy >= self.ny() {
            return Err(Error::PixelOutOfRange {
                ix,
                iy,
                nx: self.nx(),
                ny: self.ny(),
            });
        }

        let n = self.counts[(iy, ix)];
        let slice = |arr: &Array3<f64>| {
            arr.slice(ndarray::s![iy, ix, 0..n]).to_owned()
        };

        let params = self
            .params
            .iter()
            .map(|(name, arr)| {
                let mut vals = slice(arr);

                // Old caches sometimes hold wild fitted values from noisy
                // particle models; keep them inside the ranges the
                // synchrotron calculations can stomach.
                match *name {
                    "p" => vals.mapv_inplace(|v| v.max(1.5).min(7.)),
                    "k" => vals.mapv_inplace(|v| v.max(0.).min(9.)),
                    _ => {}
                }

                (*name, vals)
            })
            .collect();

        Ok(Ray::from_samples(
            self.xvals[ix],
            self.yvals[iy],
            slice(&self.z),
            slice(&self.b),
            slice(&self.theta),
            slice(&self.psi),
            params,
            None,
            setup,
        ))
    }

    /// Snap an observer coordinate to a pixel index; None if it falls
    /// outside the grid.
    fn locate(vals: &Array1<f64>, v: f64) -> Option<usize> {
        let n = vals.len();

        if n == 1 {
            return Some(0);
        }

        let step = (vals[n - 1] - vals[0]) / (n - 1) as f64;
        let i = ((v - vals[0]) / step).round();

        if i < 0. || i >= n as f64 {
            None
        } else {
            Some(i as usize)
        }
    }
}

impl RayTracer for PrecomputedRays {
    fn create_ray<'a>(&self, x: f64, y: f64, setup: &'a VanAllenSetup) -> Result<Ray<'a>> {
        let ix = Self::locate(&self.xvals, x);
        let iy = Self::locate(&self.yvals, y);

        match (ix, iy) {
            (Some(ix), Some(iy)) => self.get_ray(ix, iy, setup),
            _ => Err(Error::PixelOutOfRange {
                ix: ix.unwrap_or(usize::MAX),
                iy: iy.unwrap_or(usize::MAX),
                nx: self.nx(),
                ny: self.ny(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use ndarray::{arr1, arr2, Array3};
    use slog::o;

    use super::*;
    use crate::distribution::SimpleTorusDistribution;
    use crate::rt::FormalRTIntegrator;
    use crate::synchrotron::PowerLawSynchrotronCalculator;
    use crate::tracer::BasicRayTracer;
    use crate::{ObserverToBodycentric, TiltedDipoleField, RJUP};

    fn torus_setup(tracer: Box<dyn RayTracer>) -> VanAllenSetup {
        VanAllenSetup::new(
            ObserverToBodycentric::new(0.2, 0.3).unwrap(),
            TiltedDipoleField::new(0.15, 3000.).unwrap(),
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
    fn test_stokes_param_parsing() {
        assert_eq!("i".parse::<StokesParam>().unwrap(), StokesParam::I);
        assert_eq!("Q".parse::<StokesParam>().unwrap(), StokesParam::Q);
        assert_eq!("absV".parse::<StokesParam>().unwrap(), StokesParam::AbsV);
        assert_eq!("fl".parse::<StokesParam>().unwrap(), StokesParam::FracLinear);
        assert!("w".parse::<StokesParam>().is_err());
    }

    fn sample_cube() -> Array3<f64> {
        // One 1x2 "image": pixel 0 has I=2, Q=0.6, U=0.8, V=-0.5;
        // pixel 1 is dark.
        let mut cube = Array3::zeros((4, 1, 2));
        cube[(0, 0, 0)] = 2.;
        cube[(1, 0, 0)] = 0.6;
        cube[(2, 0, 0)] = 0.8;
        cube[(3, 0, 0)] = -0.5;
        cube
    }

    #[test]
    fn test_stokes_frames() {
        let cube = sample_cube();

        let lin = StokesParam::Linear.frame(&cube);
        assert_approx_eq!(lin[(0, 0)], 1., 1e-12);
        assert_eq!(lin[(0, 1)], 0.);

        let fl = StokesParam::FracLinear.frame(&cube);
        assert_approx_eq!(fl[(0, 0)], 0.5, 1e-12);
        assert_eq!(fl[(0, 1)], 0.); // guarded against I = 0

        let fc = StokesParam::FracCircular.frame(&cube);
        assert_approx_eq!(fc[(0, 0)], -0.25, 1e-12);

        let absv = StokesParam::AbsV.frame(&cube);
        assert_approx_eq!(absv[(0, 0)], 0.5, 1e-12);
    }

    #[test]
    fn test_stokes_fluxes() {
        let cube = sample_cube();
        assert_approx_eq!(StokesParam::I.flux(&cube), 2., 1e-12);
        assert_approx_eq!(StokesParam::Linear.flux(&cube), 1., 1e-12);
        assert_approx_eq!(StokesParam::FracCircular.flux(&cube), -0.25, 1e-12);
    }

    #[test]
    fn test_map_pixel() {
        let setup = torus_setup(Box::new(BasicRayTracer::default()));
        let im = ImageMaker::new(&setup);

        // The default 23-pixel axes put pixel 11 at the image center.
        let (x, y) = im.map_pixel(11, 11);
        assert_approx_eq!(x, 0., 1e-12);
        assert_approx_eq!(y, 0., 1e-12);

        let (x, y) = im.map_pixel(0, 22);
        assert_approx_eq!(x, -7., 1e-12);
        assert_approx_eq!(y, 7., 1e-12);
    }

    #[test]
    fn test_small_image() {
        let setup = torus_setup(Box::new(BasicRayTracer::default()));
        let im = ImageMaker::new(&setup).grid(3, 3, 7., 7.);
        let cube = im.compute().unwrap();

        assert_eq!(cube.dim(), (4, 3, 3));

        // The central pixel looks through the heart of the torus.
        assert!(cube[(0, 1, 1)] > 0.);
        assert!(cube[(0, 1, 1)].is_finite());

        // The top-left corner, 7 radii off axis, sees nothing.
        assert_eq!(cube[(0, 2, 0)], 0.);
    }

    fn tiny_cache() -> PrecomputedRays {
        let shape = (1, 1, 3);
        let mut z = Array3::zeros(shape);
        z[(0, 0, 0)] = 4.;
        z[(0, 0, 1)] = 5.;
        z[(0, 0, 2)] = 6.;

        let mut b = Array3::zeros(shape);
        b.fill(10.);
        let mut theta = Array3::zeros(shape);
        theta.fill(0.7);
        let psi = Array3::zeros(shape);

        let mut n_e = Array3::zeros(shape);
        n_e.fill(1e5);
        let mut p = Array3::zeros(shape);
        p.fill(10.); // out of range on purpose

        PrecomputedRays::new(
            arr1(&[0.]),
            arr1(&[0.]),
            arr2(&[[3usize]]),
            z,
            b,
            theta,
            psi,
            vec![("n_e", n_e), ("p", p)],
        )
        .unwrap()
    }

    #[test]
    fn test_precomputed_round_trip() {
        let cache = tiny_cache();
        let setup = torus_setup(Box::new(BasicRayTracer::default()));

        let mut ray = cache.get_ray(0, 0, &setup).unwrap();
        assert_eq!(ray.n_samples(), 3);

        // The wild p value gets clamped.
        assert_eq!(ray.param("p").unwrap()[0], 7.);

        let iquv = ray.integrate(false).unwrap();
        assert!(iquv[0] > 0. && iquv[0].is_finite());
    }

    #[test]
    fn test_precomputed_index_validation() {
        let cache = tiny_cache();
        let setup = torus_setup(Box::new(BasicRayTracer::default()));

        match cache.get_ray(1, 0, &setup) {
            Err(Error::PixelOutOfRange { ix, nx, .. }) => {
                assert_eq!(ix, 1);
                assert_eq!(nx, 1);
            }
            other => panic!("expected PixelOutOfRange, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_precomputed_shape_validation() {
        let shape = (1, 1, 3);
        let bad = PrecomputedRays::new(
            arr1(&[0.]),
            arr1(&[0.]),
            arr2(&[[3usize]]),
            Array3::zeros(shape),
            Array3::zeros(shape),
            Array3::zeros((1, 1, 2)),
            Array3::zeros(shape),
            vec![("n_e", Array3::zeros(shape))],
        );
        assert!(bad.is_err());
    }
}
