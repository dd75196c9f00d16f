// Copyright 2015-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

/*! Primitive coordinate conversions.

These are the building blocks for everything else: conversions between
Cartesian and latitude/longitude spherical coordinates, 2D rotations, and the
conversion of a *vector* expressed in a local spherical basis into global
Cartesian components. Angles are radians throughout; latitudes lie in
[-pi/2, pi/2] and longitudes come out of `atan2` in (-pi, pi].

*/

/// Convert Cartesian coordinates (x, y, z) to spherical (lat, lon, r).
///
/// The +x direction points towards (lat=0, lon=0); +y towards (lat=0,
/// lon=pi/2); +z towards lat=pi/2. The units of the inputs are arbitrary but
/// must agree; *r* is returned in the same units.
///
/// The radius is floored at 1e-10 inside the arcsine so that the origin maps
/// to (0, 0, 0) instead of NaN.
pub fn cart_to_sph(x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    let r = (x * x + y * y + z * z).sqrt();
    let lat = (z / r.max(1e-10)).max(-1.).min(1.).asin();
    let lon = y.atan2(x);
    (lat, lon, r)
}

/// Convert spherical coordinates (lat, lon, r) to Cartesian (x, y, z).
///
/// *r* should not be negative; that is the caller's responsibility.
pub fn sph_to_cart(lat: f64, lon: f64, r: f64) -> (f64, f64, f64) {
    let x = r * lat.cos() * lon.cos();
    let y = r * lat.cos() * lon.sin();
    let z = r * lat.sin();
    (x, y, z)
}

/// Perform a simple 2D rotation of coordinates *u* and *v*. *theta* measures
/// the rotation angle from *u* toward *v*: if theta is pi/2, `(u=1, v=0)`
/// maps to `(u=0, v=1)` and `(u=0, v=1)` maps to `(u=-1, v=0)`.
///
/// Negating *theta* is equivalent to swapping *u* and *v*.
pub fn rot2d(u: f64, v: f64, theta: f64) -> (f64, f64) {
    let c = theta.cos();
    let s = theta.sin();
    (c * u - s * v, s * u + c * v)
}

/// Convert a vector in a local spherical basis to Cartesian components.
///
/// Note that this converts a *vector*, not a *position*: the vector is
/// defined by its contributions towards the local basis vectors
/// (latitude-hat, longitude-hat, r-hat), and the conversion of those
/// components into (x-hat, y-hat, z-hat) depends on where the vector is
/// rooted. We consider the vector as being rooted at latitude *lat0* and
/// longitude *lon0*, with components (*vlat*, *vlon*, *vr*).
///
/// The matrix is the standard spherical-to-Cartesian basis Jacobian. Most
/// references write it for ISO-style colatitude theta = pi/2 - lat, whence
/// cos(theta) = sin(lat), sin(theta) = cos(lat), and theta-hat = -(lat-hat).
pub fn sph_vec_to_cart_vec(
    lat0: f64,
    lon0: f64,
    vlat: f64,
    vlon: f64,
    vr: f64,
) -> (f64, f64, f64) {
    let slat = lat0.sin();
    let clat = lat0.cos();
    let slon = lon0.sin();
    let clon = lon0.cos();

    let vx = (-slat * clon) * vlat + (-slon) * vlon + (clat * clon) * vr;
    let vy = (-slat * slon) * vlat + clon * vlon + (clat * slon) * vr;
    let vz = clat * vlat + slat * vr;
    (vx, vy, vz)
}

/// Center an angle into the range (-pi, pi].
pub fn angcen(a: f64) -> f64 {
    let mut t = a.rem_euclid(crate::TWO_PI);
    if t > crate::PI {
        t -= crate::TWO_PI;
    }
    t
}
