// Copyright 2015-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

/*! A tilted magnetic dipole field.

This is mostly a coordinate transform: it maps body-centric coordinates
(lat, lon, r) into magnetic coordinates (mlat, mlon, L), where L is the
McIlwain shell parameter. The dipole axis is pinned to body-centric longitude
zero, so internally the field works in a "dipole-centric" spherical system
that is just the body-centric one rotated by the tilt in the
prime-meridian/north-pole plane. The moment may be negative, which flips the
field direction without having to move the axis to lon = pi.

*/

use crate::coords::{cart_to_sph, rot2d, sph_to_cart, sph_vec_to_cart_vec};
use crate::{Error, Result, PI};

/// The epsilon used for the finite-difference field-direction evaluation.
/// Small enough for linearity, large enough to stay clear of catastrophic
/// cancellation.
const BHAT_EPSILON: f64 = 1e-8;

/// A tilted dipolar magnetic field.
///
/// *tilt* is the angular offset of the dipole axis away from the body's
/// rotation axis, in radians. *moment* is the dipole moment in units of
/// Gauss·R_body³; because of that choice of length unit, the moment is the
/// surface field strength at the magnetic equator by construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TiltedDipoleField {
    tilt: f64,
    moment: f64,
}

impl TiltedDipoleField {
    /// Create a new field. The tilt must lie in [0, pi); the moment is
    /// signed.
    pub fn new(tilt: f64, moment: f64) -> Result<Self> {
        if !(tilt >= 0. && tilt < PI) {
            return Err(Error::IllegalTilt(tilt));
        }

        Ok(TiltedDipoleField { tilt, moment })
    }

    /// The tilt, in radians.
    pub fn tilt(&self) -> f64 {
        self.tilt
    }

    /// The dipole moment, in Gauss·R_body³.
    pub fn moment(&self) -> f64 {
        self.moment
    }

    /// Convert body-centric spherical coordinates to dipole-centric ones.
    ///
    /// The magnetic axis lies at body longitude 0, so this is one spin on
    /// the Cartesian y axis, taking blat = pi/2 - tilt to lat = pi/2.
    pub fn to_dipole_centric(&self, bc_lat: f64, bc_lon: f64, bc_r: f64) -> (f64, f64, f64) {
        let (x, y, z) = sph_to_cart(bc_lat, bc_lon, bc_r);
        let (x, z) = rot2d(x, z, self.tilt);
        cart_to_sph(x, y, z)
    }

    /// The inverse of `to_dipole_centric`.
    pub fn from_dipole_centric(&self, dc_lat: f64, dc_lon: f64, dc_r: f64) -> (f64, f64, f64) {
        let (x, y, z) = sph_to_cart(dc_lat, dc_lon, dc_r);
        let (x, z) = rot2d(x, z, -self.tilt);
        cart_to_sph(x, y, z)
    }

    /// Magnetic coordinates (mlat, mlon, L) for the given body-centric
    /// position.
    ///
    /// These are the coordinates relevant to trapped-particle distribution
    /// calculations: the dipole-centric latitude and longitude plus the
    /// McIlwain L shell parameter, L = r / cos²(mlat), measured in body
    /// radii.
    pub fn magnetic_coordinates(&self, bc_lat: f64, bc_lon: f64, bc_r: f64) -> (f64, f64, f64) {
        let (dc_lat, dc_lon, dc_r) = self.to_dipole_centric(bc_lat, bc_lon, bc_r);
        let clat = dc_lat.cos();
        (dc_lat, dc_lon, dc_r / (clat * clat))
    }

    /// The direction of the magnetic field at a body-centric position,
    /// expressed as a unit vector on the local body-centric spherical basis
    /// (lat-hat, lon-hat, r-hat).
    ///
    /// For a dipole, in dipole-centric coordinates,
    ///
    /// ```text
    /// B_r   =  2 M sin(mlat) / r³
    /// B_lat =   -M cos(mlat) / r³
    /// B_lon =    0
    /// ```
    ///
    /// Rather than rotating these components analytically, we scale them to
    /// a tiny magnitude (dropping the common r³, but keeping M since its
    /// sign matters), offset the dipole-centric position by them, map the
    /// offset point back to body-centric coordinates, difference, and
    /// renormalize. The same code path keeps working if the field model
    /// ever stops being analytic.
    pub fn bhat(&self, pos_blat: f64, pos_blon: f64, pos_r: f64) -> (f64, f64, f64) {
        let (mlat0, mlon0, mr0) = self.to_dipole_centric(pos_blat, pos_blon, pos_r);

        let mut bhat_r = 2. * self.moment * mlat0.sin();
        let mut bhat_lat = -self.moment * mlat0.cos();
        let scale = BHAT_EPSILON / (bhat_r * bhat_r + bhat_lat * bhat_lat).sqrt();
        bhat_r *= scale;
        bhat_lat *= scale;

        let (blat1, blon1, br1) = self.from_dipole_centric(mlat0 + bhat_lat, mlon0, mr0 + bhat_r);

        // Unit offset vector. The unit-ization mixes angular and radial
        // pieces so it doesn't really make dimensional sense, but it is
        // consistent with how the direction vectors are consumed.
        let dlat = blat1 - pos_blat;
        let dlon = blon1 - pos_blon;
        let dr = br1 - pos_r;
        let scale = 1. / (dlat * dlat + dlon * dlon + dr * dr).sqrt();
        (scale * dlat, scale * dlon, scale * dr)
    }

    /// The angle, in radians, between the local magnetic field at a
    /// body-centric position and a direction vector expressed on the same
    /// local spherical basis.
    ///
    /// The magnitude of the direction vector does not matter in theory, but
    /// it is assumed to be around unity. Degenerate inputs yield NaN.
    pub fn theta_b(
        &self,
        pos_blat: f64,
        pos_blon: f64,
        pos_r: f64,
        dir_blat: f64,
        dir_blon: f64,
        dir_r: f64,
    ) -> f64 {
        let (bh_lat, bh_lon, bh_r) = self.bhat(pos_blat, pos_blon, pos_r);

        // Just be dumb and convert both to Cartesian.
        let (bx, by, bz) = sph_vec_to_cart_vec(pos_blat, pos_blon, bh_lat, bh_lon, bh_r);
        let (dx, dy, dz) = sph_vec_to_cart_vec(pos_blat, pos_blon, dir_blat, dir_blon, dir_r);

        let dot = bx * dx + by * dy + bz * dz;
        let scale = ((bx * bx + by * by + bz * bz) * (dx * dx + dy * dy + dz * dz)).sqrt();
        (dot / scale).acos()
    }

    /// The magnitude of the magnetic field at a body-centric position, in
    /// Gauss: |M| sqrt(1 + 3 sin²(mlat)) / mr³.
    pub fn bmag(&self, blat: f64, blon: f64, r: f64) -> f64 {
        let (mlat, _mlon, mr) = self.to_dipole_centric(blat, blon, r);
        let s = mlat.sin();
        self.moment.abs() * (1. + 3. * s * s).sqrt() / (mr * mr * mr)
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use rand::Rng;

    use super::*;

    #[test]
    fn test_constructor_validation() {
        assert!(TiltedDipoleField::new(-0.01, 3000.).is_err());
        assert!(TiltedDipoleField::new(PI, 3000.).is_err());
        assert!(TiltedDipoleField::new(f64::NAN, 3000.).is_err());
        assert!(TiltedDipoleField::new(0., -3000.).is_ok());
        assert!(TiltedDipoleField::new(3., 3000.).is_ok());
    }

    #[test]
    fn test_dipole_centric_round_trip() {
        let mut rng = rand::thread_rng();

        for _ in 0..300 {
            let tilt = rng.gen::<f64>() * (PI - 1e-6);
            let field = TiltedDipoleField::new(tilt, 3000.).unwrap();

            let lat = (rng.gen::<f64>() - 0.5) * PI * 0.98;
            let lon = (rng.gen::<f64>() - 0.5) * 2. * PI;
            let r = 0.5 + rng.gen::<f64>() * 10.;

            let (dlat, dlon, dr) = field.to_dipole_centric(lat, lon, r);
            let (lat2, lon2, r2) = field.from_dipole_centric(dlat, dlon, dr);
            assert_approx_eq!(lat, lat2, 1e-9);
            assert_approx_eq!(crate::coords::angcen(lon - lon2), 0., 1e-9);
            assert_approx_eq!(r, r2, 1e-9);
        }
    }

    #[test]
    fn test_untilted_magnetic_coordinates_are_trivial() {
        let field = TiltedDipoleField::new(0., 3000.).unwrap();

        for &(lat, lon, r) in &[(0.0, 0.0, 1.0), (0.4, 1.3, 2.5), (-1.1, 5.9, 7.0)] {
            let (mlat, mlon, l) = field.magnetic_coordinates(lat, lon, r);
            assert_approx_eq!(mlat, lat, 1e-12);
            assert_approx_eq!(crate::coords::angcen(mlon - lon), 0., 1e-12);
            assert_approx_eq!(l, r / lat.cos().powi(2), 1e-9);
        }

        // On the magnetic equator, L is just r.
        let (_, _, l) = field.magnetic_coordinates(0., 2., 4.5);
        assert_approx_eq!(l, 4.5, 1e-12);
    }

    #[test]
    fn test_bmag_untilted() {
        let field = TiltedDipoleField::new(0., 3000.).unwrap();

        // Surface equator: |B| = M. Surface pole: |B| = 2 M. And the field
        // falls off as r^-3.
        assert_approx_eq!(field.bmag(0., 0., 1.), 3000., 1e-6);
        assert_approx_eq!(field.bmag(0.5 * PI, 0., 1.), 6000., 1e-6);
        assert_approx_eq!(field.bmag(0., 1., 2.), 375., 1e-9);
    }

    #[test]
    fn test_bhat_equator_and_sign() {
        // Untilted field, positive moment: on the magnetic equator the
        // field points along -lat-hat (north magnetic pole is up).
        let field = TiltedDipoleField::new(0., 3000.).unwrap();
        let (blat, blon, br) = field.bhat(0., 0.3, 2.);
        assert_approx_eq!(blat, -1., 1e-6);
        assert_approx_eq!(blon, 0., 1e-6);
        assert_approx_eq!(br, 0., 1e-6);

        // Flipping the moment flips the direction.
        let field = TiltedDipoleField::new(0., -3000.).unwrap();
        let (blat, blon, br) = field.bhat(0., 0.3, 2.);
        assert_approx_eq!(blat, 1., 1e-6);
        assert_approx_eq!(blon, 0., 1e-6);
        assert_approx_eq!(br, 0., 1e-6);
    }

    #[test]
    fn test_theta_b_perpendicular_on_equator() {
        let field = TiltedDipoleField::new(0., 3000.).unwrap();

        // On the untilted magnetic equator the field is horizontal, so the
        // radial direction is perpendicular to it.
        let theta = field.theta_b(0., 0., 3., 0., 0., 1.);
        assert_approx_eq!(theta, 0.5 * PI, 1e-6);

        // A direction slightly off -lat-hat makes a correspondingly small
        // angle.
        let theta = field.theta_b(0., 0., 3., -1., 0., 0.01);
        assert_approx_eq!(theta, 0.01, 1e-4);
    }
}
