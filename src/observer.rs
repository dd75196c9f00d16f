// Copyright 2015-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

/*! The mapping between observer and body-centric coordinates.

The observer's (x, y, z) frame is a sky-like orthographic projection: x is a
horizontal coordinate increasing left to right, y is a vertical coordinate
increasing bottom to top, and z is a distance coordinate increasing far to
near, so that a radiative transfer integration starts at negative z (or the
body's surface) and proceeds toward the observer. (x=0, y=0) is the center of
the image; z=0 is centered on the target body. The unit of distance is the
body's radius.

The body-centric (lat, lon, r) system is rooted on the body of interest, with
latitudes and longitudes in radians and r again in body radii.

Since the body is never resolved, we do not care about its rotation on the
sky plane, so no third orientation angle is needed.

*/

use crate::coords::{angcen, cart_to_sph, rot2d, sph_to_cart, sph_vec_to_cart_vec};
use crate::{Error, Result, PI};

/// The orthographic mapping from observer coordinates to body-centric
/// coordinates.
///
/// *loc* is the latitude of the center of the projection; note that
/// `i = pi/2 - loc` where *i* is the body's inclination in the conventional
/// astronomical sense. *cml* is the central meridian longitude: (x=0, y=0,
/// z=anything) maps to (lat=loc, lon=cml, r=something).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObserverToBodycentric {
    loc: f64,
    cml: f64,
}

impl ObserverToBodycentric {
    /// Create a new mapping from the latitude-of-center and central meridian
    /// longitude, both in radians.
    ///
    /// Negative latitudes-of-center would correspond to viewing the body's
    /// south pole rather than its north pole; these are indistinguishable
    /// from rolling the body 180 degrees, so they are disallowed rather
    /// than silently accepted.
    pub fn new(loc: f64, cml: f64) -> Result<Self> {
        if !(0. ..=0.5 * PI).contains(&loc) || !loc.is_finite() {
            return Err(Error::IllegalLatitudeOfCenter(loc));
        }

        Ok(ObserverToBodycentric {
            loc,
            cml: angcen(cml),
        })
    }

    /// The latitude of center, in radians.
    pub fn loc(&self) -> f64 {
        self.loc
    }

    /// The central meridian longitude, in radians, centered to (-pi, pi].
    pub fn cml(&self) -> f64 {
        self.cml
    }

    /// Convert observer rectangular coordinates to body-aligned rectangular
    /// coordinates: a permutation and two rotations.
    fn to_bc(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
        // Patch up the axes first. Our definition of z corresponds to x in
        // the standard spherical-trig setup, while our y maps to z. After
        // the permutation, +z points up, +x points into our face, and +y
        // points to the right.
        let (x, y, z) = (z, x, y);

        // Spin on the (new) y axis, transforming from the frame where +z is
        // aligned with lat = pi/2 - loc to one where it is aligned with
        // lat = pi/2 ...
        let (x, z) = rot2d(x, z, self.loc);

        // ... then spin on the polar axis, from the frame where +x is
        // aligned with -cml to one where it is aligned with the cml.
        let (x, y) = rot2d(x, y, self.cml);

        (x, y, z)
    }

    /// The inverse of `to_bc`.
    fn from_bc(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
        let (x, y) = rot2d(x, y, -self.cml);
        let (x, z) = rot2d(x, z, -self.loc);
        (y, z, x)
    }

    /// Map observer coordinates (x, y, z) to body-centric (lat, lon, r).
    pub fn to_body_centric(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
        let (x, y, z) = self.to_bc(x, y, z);
        cart_to_sph(x, y, z)
    }

    /// Map body-centric (lat, lon, r) back to observer coordinates
    /// (x, y, z). The exact algebraic inverse of `to_body_centric`.
    pub fn inverse(&self, lat: f64, lon: f64, r: f64) -> (f64, f64, f64) {
        let (x, y, z) = sph_to_cart(lat, lon, r);
        self.from_bc(x, y, z)
    }

    /// The angle, in radians, between a direction vector expressed in the
    /// body-centric spherical basis and the observer's z-hat (the line of
    /// sight).
    ///
    /// (x, y, z) is the observer-frame position at which the vector is
    /// rooted; (dir_blat, dir_blon, dir_r) are its components on the local
    /// (lat-hat, lon-hat, r-hat) basis there. The result lies in [0, pi].
    /// This is what gives the angle between the line of sight and the
    /// magnetic field when ray-tracing. A zero-length direction vector
    /// yields NaN.
    pub fn theta_zhat(
        &self,
        x: f64,
        y: f64,
        z: f64,
        dir_blat: f64,
        dir_blon: f64,
        dir_r: f64,
    ) -> f64 {
        let (lat, lon, _r) = self.to_body_centric(x, y, z);
        let (dx, dy, dz) = sph_vec_to_cart_vec(lat, lon, dir_blat, dir_blon, dir_r);

        // The z-hat direction expressed in the body-aligned frame; a unit
        // vector by construction, so it contributes nothing to the scale.
        let (zx, zy, zz) = self.to_bc(0., 0., 1.);

        let dot = zx * dx + zy * dy + zz * dz;
        let scale = (dx * dx + dy * dy + dz * dz).sqrt();
        (dot / scale).acos()
    }

    /// The signed angle, in radians, between a direction vector expressed in
    /// the body-centric spherical basis and the observer's y-hat, after
    /// projecting onto the observer's x/y plane. The result lies in
    /// (-pi, pi].
    ///
    /// This gives the angle between the magnetic-field Stokes-Q polarization
    /// axis, which lies in the field/line-of-sight plane, and the observer y
    /// axis, which is the common reference for the linear Stokes parameters.
    ///
    /// This is subtler than it looks because the direction vector is an
    /// infinitesimal offset rooted at (x, y, z); but the
    /// observer-to-bodycentric transform is linear and invertible, so it is
    /// OK to run the inverse transform on the vector itself.
    pub fn theta_yhat_projected(
        &self,
        x: f64,
        y: f64,
        z: f64,
        dir_blat: f64,
        dir_blon: f64,
        dir_r: f64,
    ) -> f64 {
        let (lat, lon, _r) = self.to_body_centric(x, y, z);
        let (dx, dy, dz) = sph_vec_to_cart_vec(lat, lon, dir_blat, dir_blon, dir_r);
        let (ox, oy, _oz) = self.from_bc(dx, dy, dz);
        ox.atan2(oy)
    }
}
