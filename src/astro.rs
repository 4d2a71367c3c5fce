//! Magnitude and coordinate helpers.
//!
//! Positions are Cartesian light-years in the J2000 ecliptic frame with the
//! y axis pointing to the ecliptic north pole, which is the frame the octree
//! and all queries work in.

use crate::Vector3;

/// Light-years in one parsec.
pub const LY_PER_PARSEC: f32 = 3.261_563_8;

/// Obliquity of the ecliptic at J2000, in degrees.
pub const J2000_OBLIQUITY_DEG: f64 = 23.439_291_1;

/// Parallaxes at or below this value (milliarcseconds) are clamped to it so
/// that poorly measured stars are not placed implausibly far away.
pub const MIN_PARALLAX_MAS: f32 = 0.4;

/// Apparent magnitude of a star with absolute magnitude `abs_mag` seen from
/// `distance_ly` light-years.
#[inline]
pub fn abs_to_app_mag(abs_mag: f32, distance_ly: f32) -> f32 {
    abs_mag - 5.0 + 5.0 * (distance_ly / LY_PER_PARSEC).log10()
}

/// Absolute magnitude of a star with apparent magnitude `app_mag` seen from
/// `distance_ly` light-years.
#[inline]
pub fn app_to_abs_mag(app_mag: f32, distance_ly: f32) -> f32 {
    app_mag + 5.0 - 5.0 * (distance_ly / LY_PER_PARSEC).log10()
}

/// Distance in light-years for a parallax in milliarcseconds.
#[inline]
pub fn parallax_to_light_years(parallax_mas: f32) -> f32 {
    1000.0 / parallax_mas * LY_PER_PARSEC
}

/// Convert equatorial coordinates (degrees) and a distance into the
/// ecliptic Cartesian frame.
///
/// The angles follow the same convention as the rest of the crate: right
/// ascension zero lies on the -x axis and the celestial pole is rotated away
/// from +y by the J2000 obliquity.
pub fn equatorial_to_cartesian(ra_deg: f64, dec_deg: f64, distance: f64) -> Vector3 {
    use std::f64::consts::PI;

    let theta = ra_deg.to_radians() + PI;
    let phi = dec_deg.to_radians() - PI / 2.0;
    let (stheta, ctheta) = theta.sin_cos();
    let (sphi, cphi) = phi.sin_cos();

    let equatorial = nalgebra::Vector3::new(
        ctheta * sphi * distance,
        cphi * distance,
        -stheta * sphi * distance,
    );
    (equatorial_to_ecliptic() * equatorial).cast::<f32>()
}

/// Inverse of [`equatorial_to_cartesian`]: `(ra_deg, dec_deg, distance)`.
pub fn cartesian_to_equatorial(position: &Vector3) -> (f64, f64, f64) {
    let v = equatorial_to_ecliptic().inverse() * position.cast::<f64>();
    let distance = v.norm();
    if distance == 0.0 {
        return (0.0, 0.0, 0.0);
    }
    let dec = (v.y / distance).clamp(-1.0, 1.0).asin().to_degrees();
    let ra = (-v.z).atan2(v.x).to_degrees().rem_euclid(360.0);
    (ra, dec, distance)
}

/// Rotation from the J2000 equatorial frame into the ecliptic frame.
pub fn equatorial_to_ecliptic() -> nalgebra::Rotation3<f64> {
    nalgebra::Rotation3::from_axis_angle(
        &nalgebra::Vector3::x_axis(),
        -J2000_OBLIQUITY_DEG.to_radians(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_parsec_distance_modulus() {
        let distance = parallax_to_light_years(1000.0);
        assert!((distance - LY_PER_PARSEC).abs() < 1e-5);
        let abs_mag = app_to_abs_mag(0.0, distance);
        assert!((abs_mag - 5.0).abs() < 1e-3);
    }

    #[test]
    fn ten_parsecs_is_identity() {
        let d = 10.0 * LY_PER_PARSEC;
        assert!((abs_to_app_mag(4.83, d) - 4.83).abs() < 1e-4);
        assert!((app_to_abs_mag(abs_to_app_mag(-1.5, 250.0), 250.0) + 1.5).abs() < 1e-4);
    }

    #[test]
    fn cartesian_preserves_distance() {
        for &(ra, dec) in &[(0.0, 0.0), (101.28, -16.71), (279.23, 38.78), (37.95, 89.26)] {
            let v = equatorial_to_cartesian(ra, dec, 8.6);
            assert!((v.norm() - 8.6).abs() < 1e-4, "ra={ra} dec={dec}");
        }
    }

    #[test]
    fn equatorial_round_trip() {
        let v = equatorial_to_cartesian(101.28, -16.71, 8.6);
        let (ra, dec, d) = cartesian_to_equatorial(&v);
        assert!((ra - 101.28).abs() < 1e-4);
        assert!((dec + 16.71).abs() < 1e-4);
        assert!((d - 8.6).abs() < 1e-5);
    }

    #[test]
    fn celestial_pole_is_tilted_from_ecliptic_pole() {
        let pole = equatorial_to_cartesian(0.0, 90.0, 1.0);
        let angle = pole.y.clamp(-1.0, 1.0).acos().to_degrees();
        assert!((angle - J2000_OBLIQUITY_DEG as f32).abs() < 1e-3);
    }
}
