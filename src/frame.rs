//! Geodetic, ECEF and local East-North-Up coordinates on the WGS84 ellipsoid.
//!
//! The conversions are done by [`sguaba`]. Its local frames are types, so one
//! private ENU system stands in for every tangent plane and the origin a vector
//! belongs to is tracked at runtime by [`EnuVector`] instead.

use crate::error::Error;
use nalgebra::{Matrix3, Rotation3, Vector3};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use sguaba::{
    Coordinate,
    math::RigidBodyTransform,
    system,
    systems::{Ecef as EarthFixed, Wgs84},
};
use uom::si::{
    angle::{degree, radian},
    f64::{Angle, Length},
    length::meter,
};

system!(struct LocalEnu using ENU);

/// A longitude, latitude and altitude above the WGS84 ellipsoid.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "UncheckedGeodeticPoint")
)]
pub struct GeodeticPoint {
    longitude: Angle,
    latitude: Angle,
    altitude: Length,
}

impl GeodeticPoint {
    /// Creates a new `GeodeticPoint`.
    ///
    /// Returns an error if any component is not finite or if `latitude` is not
    /// between -90 and 90 degrees.
    pub fn new(longitude: Angle, latitude: Angle, altitude: Length) -> Result<Self, Error> {
        let (lon, lat, alt) = (
            longitude.get::<degree>(),
            latitude.get::<degree>(),
            altitude.get::<meter>(),
        );

        if !(lon.is_finite() && lat.is_finite() && alt.is_finite()) {
            return Err(Error::NonFinite {
                x: lon,
                y: lat,
                z: alt,
            });
        }

        if !(-90.0..=90.0).contains(&lat) {
            return Err(Error::InvalidLatitude { latitude: lat });
        }

        Ok(Self {
            longitude,
            latitude,
            altitude,
        })
    }

    /// Creates a new `GeodeticPoint` from decimal degrees and meters.
    pub fn from_degrees(longitude: f64, latitude: f64, altitude: f64) -> Result<Self, Error> {
        Self::new(
            Angle::new::<degree>(longitude),
            Angle::new::<degree>(latitude),
            Length::new::<meter>(altitude),
        )
    }

    pub fn longitude(&self) -> Angle {
        self.longitude
    }

    pub fn latitude(&self) -> Angle {
        self.latitude
    }

    pub fn altitude(&self) -> Length {
        self.altitude
    }

    /// Returns the same horizontal position at `altitude`.
    pub fn with_altitude(self, altitude: Length) -> Self {
        Self { altitude, ..self }
    }

    /// Converts the point into earth centered, earth fixed coordinates.
    pub fn to_ecef(&self) -> Ecef {
        // The origin of the tangent plane at this point is the point itself.
        Ecef {
            inner: self.ecef_to_enu().inverse_transform(Coordinate::<LocalEnu>::origin()),
        }
    }

    fn wgs84(&self) -> Wgs84 {
        Wgs84::builder()
            .latitude(self.latitude)
            // Checked by `GeodeticPoint::new`, which deserialization goes through too.
            .expect("latitude is between -90 and 90")
            .longitude(self.longitude)
            .altitude(self.altitude)
            .build()
    }

    fn ecef_to_enu(&self) -> RigidBodyTransform<EarthFixed, LocalEnu> {
        // SAFETY: every `LocalEnu` value produced through this transform is
        // wrapped in an `EnuVector` tagged with `self` as its origin.
        unsafe { RigidBodyTransform::ecef_to_enu_at(&self.wgs84()) }
    }
}

#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct UncheckedGeodeticPoint {
    longitude: Angle,
    latitude: Angle,
    altitude: Length,
}

#[cfg(feature = "serde")]
impl TryFrom<UncheckedGeodeticPoint> for GeodeticPoint {
    type Error = Error;

    fn try_from(point: UncheckedGeodeticPoint) -> Result<Self, Self::Error> {
        Self::new(point.longitude, point.latitude, point.altitude)
    }
}

/// A point in the earth centered, earth fixed frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ecef {
    inner: Coordinate<EarthFixed>,
}

impl Ecef {
    pub fn new(x: Length, y: Length, z: Length) -> Self {
        Self {
            inner: Coordinate::<EarthFixed>::builder().x(x).y(y).z(z).build(),
        }
    }

    pub(crate) fn from_meters(position: Vector3<f64>) -> Self {
        Self::new(
            Length::new::<meter>(position.x),
            Length::new::<meter>(position.y),
            Length::new::<meter>(position.z),
        )
    }

    /// Returns the position in meters.
    pub fn as_vec3(&self) -> Vector3<f64> {
        Vector3::new(
            self.inner.x().get::<meter>(),
            self.inner.y().get::<meter>(),
            self.inner.z().get::<meter>(),
        )
    }

    /// Converts the point back into geodetic coordinates.
    pub fn to_geodetic(&self) -> Result<GeodeticPoint, Error> {
        let wgs84 = self.inner.to_wgs84();
        GeodeticPoint::new(wgs84.longitude(), wgs84.latitude(), wgs84.altitude())
    }
}

/// Returns the rotation from the east-north-up frame at `latitude` and
/// `longitude` into ECEF.
///
/// The columns are the east, north and up unit vectors expressed in ECEF.
pub fn local_basis(latitude: Angle, longitude: Angle) -> Matrix3<f64> {
    let (sin_lat, cos_lat) = latitude.get::<radian>().sin_cos();
    let (sin_lon, cos_lon) = longitude.get::<radian>().sin_cos();

    #[rustfmt::skip]
    let basis = Matrix3::new(
        -sin_lon, -sin_lat * cos_lon, cos_lat * cos_lon,
        cos_lon,  -sin_lat * sin_lon, cos_lat * sin_lon,
        0.0,      cos_lat,            sin_lat,
    );
    basis
}

/// An east, north, up displacement in meters from a specific origin.
///
/// Vectors only come out of an [`EnuFrame`] and remember the origin of that
/// frame. Handing one to a frame with a different origin is an error.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnuVector {
    origin: GeodeticPoint,
    inner: Vector3<f64>,
}

impl EnuVector {
    pub fn origin(&self) -> &GeodeticPoint {
        &self.origin
    }

    pub fn east(&self) -> Length {
        Length::new::<meter>(self.inner.x)
    }

    pub fn north(&self) -> Length {
        Length::new::<meter>(self.inner.y)
    }

    pub fn up(&self) -> Length {
        Length::new::<meter>(self.inner.z)
    }

    /// Returns the components in meters.
    pub fn as_vec3(&self) -> &Vector3<f64> {
        &self.inner
    }

    pub fn norm(&self) -> Length {
        Length::new::<meter>(self.inner.norm())
    }

    /// Returns the yaw and pitch under which the vector is seen from its origin.
    pub fn direction(&self) -> Direction {
        direction(&self.inner)
    }

    /// Signed angle from north to the vector, positive counter-clockwise.
    pub fn heading(&self) -> Angle {
        angle_between(&Vector3::y(), &self.inner, &Vector3::z())
    }

    /// Applies `f` to the components while keeping the origin.
    pub fn map(self, f: impl FnOnce(Vector3<f64>) -> Vector3<f64>) -> Self {
        Self {
            inner: f(self.inner),
            ..self
        }
    }
}

/// A local tangent plane anchored at a geodetic origin.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnuFrame {
    origin: GeodeticPoint,
}

impl EnuFrame {
    pub fn new(origin: GeodeticPoint) -> Self {
        Self { origin }
    }

    pub fn origin(&self) -> &GeodeticPoint {
        &self.origin
    }

    /// Creates a vector in this frame.
    pub fn vector(&self, east: Length, north: Length, up: Length) -> EnuVector {
        self.from_vec3(Vector3::new(
            east.get::<meter>(),
            north.get::<meter>(),
            up.get::<meter>(),
        ))
    }

    /// Creates a vector in this frame from components in meters.
    pub fn from_vec3(&self, inner: Vector3<f64>) -> EnuVector {
        EnuVector {
            origin: self.origin,
            inner,
        }
    }

    /// Expresses `point` relative to the origin of the frame.
    ///
    /// Accurate for points within a few kilometers of the origin. Further away
    /// the result stays finite but loses its meaning as a tangent plane offset.
    pub fn to_enu(&self, point: &GeodeticPoint) -> EnuVector {
        let local = self.origin.ecef_to_enu().transform(point.to_ecef().inner);
        self.from_vec3(Vector3::new(
            local.enu_east().get::<meter>(),
            local.enu_north().get::<meter>(),
            local.enu_up().get::<meter>(),
        ))
    }

    /// Inverse of [`EnuFrame::to_enu`].
    pub fn to_geodetic(&self, vector: &EnuVector) -> Result<GeodeticPoint, Error> {
        self.to_ecef(vector)?.to_geodetic()
    }

    pub fn to_ecef(&self, vector: &EnuVector) -> Result<Ecef, Error> {
        if vector.origin != self.origin {
            return Err(Error::MismatchedOrigin);
        }

        let local = Coordinate::<LocalEnu>::builder()
            .enu_east(vector.east())
            .enu_north(vector.north())
            .enu_up(vector.up())
            .build();
        Ok(Ecef {
            inner: self.origin.ecef_to_enu().inverse_transform(local),
        })
    }
}

/// A viewing direction.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Direction {
    /// Clockwise from north.
    yaw: Angle,

    /// Upwards from the horizontal plane.
    pitch: Angle,
}

impl Direction {
    pub fn new(yaw: Angle, pitch: Angle) -> Self {
        Self { yaw, pitch }
    }

    pub fn from_degrees(yaw: f64, pitch: f64) -> Self {
        Self::new(Angle::new::<degree>(yaw), Angle::new::<degree>(pitch))
    }

    pub fn yaw(&self) -> Angle {
        self.yaw
    }

    pub fn pitch(&self) -> Angle {
        self.pitch
    }
}

/// Rotates `vector` counter-clockwise about the up axis by `angle`.
pub fn rotate(vector: &Vector3<f64>, angle: Angle) -> Vector3<f64> {
    Rotation3::from_axis_angle(&Vector3::z_axis(), angle.get::<radian>()) * *vector
}

/// Returns the angle between `v1` and `v2`, oriented by `up`.
///
/// The angle is negative when `v1 x v2` points away from `up`.
pub fn angle_between(v1: &Vector3<f64>, v2: &Vector3<f64>, up: &Vector3<f64>) -> Angle {
    // Rounding can push the cosine of (anti)parallel vectors just outside [-1, 1].
    let cos = (v1.dot(v2) / (v1.norm() * v2.norm())).clamp(-1.0, 1.0);
    let angle = Angle::new::<radian>(cos.acos());

    match v1.cross(v2).dot(up) < 0.0 {
        true => -angle,
        false => angle,
    }
}

/// Returns the yaw and pitch of an east, north, up `vector`.
///
/// Yaw is measured clockwise from north on [0, 360). Pitch is the elevation
/// above the horizontal plane and negative when looking down.
///
/// The zero vector has no direction. It comes out with a yaw of zero and a
/// NaN pitch, which [`Direction`] consumers such as ground projection reject.
pub fn direction(vector: &Vector3<f64>) -> Direction {
    let yaw = wrap_degrees(vector.x.atan2(vector.y).to_degrees(), 360.0);

    // Turn the vector back into the north-up plane before measuring from up.
    let level = rotate(vector, Angle::new::<degree>(yaw));
    let from_up = angle_between(&Vector3::z(), &level, &Vector3::x()).abs();

    Direction {
        yaw: Angle::new::<degree>(yaw),
        pitch: Angle::new::<degree>(90.0) - from_up,
    }
}

/// Floored modulo of `value` into [0, `period`).
pub(crate) fn wrap_degrees(value: f64, period: f64) -> f64 {
    let wrapped = value.rem_euclid(period);
    match wrapped >= period {
        true => 0.0,
        false => wrapped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use quickcheck::quickcheck;
    use rstest::rstest;

    fn origin() -> GeodeticPoint {
        GeodeticPoint::from_degrees(48.0, 5.0, 10.0).unwrap()
    }

    #[test]
    fn look_at_vector() {
        let frame = EnuFrame::new(origin());
        let target = GeodeticPoint::from_degrees(48.001, 5.01, 10.0).unwrap();
        let enu = frame.to_enu(&target);

        assert_abs_diff_eq!(enu.east().get::<meter>(), 110.897, epsilon = 5e-4);
        assert_abs_diff_eq!(enu.north().get::<meter>(), 1105.829, epsilon = 5e-4);
        assert_abs_diff_eq!(enu.up().get::<meter>(), -0.097, epsilon = 5e-4);
        assert_abs_diff_eq!(enu.norm().get::<meter>(), 1111.376, epsilon = 5e-4);
        assert_abs_diff_eq!(enu.heading().get::<degree>(), -5.727, epsilon = 5e-4);
    }

    #[test]
    fn origin_maps_to_itself() {
        let frame = EnuFrame::new(origin());
        let point = frame
            .to_geodetic(&frame.from_vec3(Vector3::zeros()))
            .unwrap();

        assert_abs_diff_eq!(point.longitude().get::<degree>(), 48.0, epsilon = 1e-8);
        assert_abs_diff_eq!(point.latitude().get::<degree>(), 5.0, epsilon = 1e-8);
        assert_abs_diff_eq!(point.altitude().get::<meter>(), 10.0, epsilon = 1e-3);
    }

    #[test]
    fn foreign_vector_is_rejected() {
        let frame = EnuFrame::new(origin());
        let other = EnuFrame::new(GeodeticPoint::from_degrees(4.0, 52.0, 0.0).unwrap());
        let vector = other.from_vec3(Vector3::new(1.0, 2.0, 3.0));

        assert!(matches!(
            frame.to_geodetic(&vector),
            Err(Error::MismatchedOrigin)
        ));
    }

    #[rstest]
    #[case(0.0, 89.5, 100.0)]
    #[case(-120.0, -89.5, -5.0)]
    #[case(179.9, -33.0, 8000.0)]
    #[case(10.0, 0.0, 0.0)]
    fn ecef_roundtrip(#[case] lon: f64, #[case] lat: f64, #[case] alt: f64) {
        let point = GeodeticPoint::from_degrees(lon, lat, alt).unwrap();
        let result = point.to_ecef().to_geodetic().unwrap();

        assert_abs_diff_eq!(result.longitude().get::<degree>(), lon, epsilon = 1e-8);
        assert_abs_diff_eq!(result.latitude().get::<degree>(), lat, epsilon = 1e-8);
        assert_abs_diff_eq!(result.altitude().get::<meter>(), alt, epsilon = 1e-3);
    }

    #[test]
    fn equator_on_prime_meridian() {
        let ecef = GeodeticPoint::from_degrees(0.0, 0.0, 0.0)
            .unwrap()
            .to_ecef()
            .as_vec3();
        assert_abs_diff_eq!(ecef, Vector3::new(6_378_137.0, 0.0, 0.0), epsilon = 1e-3);
    }

    #[rstest]
    #[case(48.0, 5.0)]
    #[case(-76.4747, 44.2187)]
    #[case(150.0, -60.0)]
    fn basis_matches_conversion(#[case] lon: f64, #[case] lat: f64) {
        let frame = EnuFrame::new(GeodeticPoint::from_degrees(lon, lat, 30.0).unwrap());
        let local = Vector3::new(12.0, -7.0, 3.0);

        let moved = frame.to_ecef(&frame.from_vec3(local)).unwrap().as_vec3();
        let offset = moved - frame.origin().to_ecef().as_vec3();
        let basis = local_basis(frame.origin().latitude(), frame.origin().longitude());

        assert_abs_diff_eq!(basis * local, offset, epsilon = 1e-5);
    }

    #[rstest]
    #[case(91.0)]
    #[case(-90.5)]
    fn invalid_latitude(#[case] lat: f64) {
        assert!(matches!(
            GeodeticPoint::from_degrees(0.0, lat, 0.0),
            Err(Error::InvalidLatitude { .. })
        ));
    }

    #[test]
    fn non_finite_point() {
        assert!(matches!(
            GeodeticPoint::from_degrees(f64::NAN, 0.0, 0.0),
            Err(Error::NonFinite { .. })
        ));
    }

    #[test]
    fn rotate_north_clockwise() {
        let east = rotate(&Vector3::y(), Angle::new::<degree>(-90.0));
        assert_abs_diff_eq!(east, Vector3::x(), epsilon = 1e-12);
    }

    #[rstest]
    #[case(Vector3::new(1.0, 0.0, 0.0), -90.0)]
    #[case(Vector3::new(-1.0, 0.0, 0.0), 90.0)]
    #[case(Vector3::new(0.0, 1.0, 0.0), 0.0)]
    #[case(Vector3::new(0.0, 2.0, 0.0), 0.0)]
    fn signed_angle_from_north(#[case] v: Vector3<f64>, #[case] expected: f64) {
        let angle = angle_between(&Vector3::y(), &v, &Vector3::z());
        assert_abs_diff_eq!(angle.get::<degree>(), expected, epsilon = 1e-9);
    }

    #[test]
    fn antiparallel_angle_is_finite() {
        let v = Vector3::new(0.1, 0.2, 0.3);
        let angle = angle_between(&v, &(-v * 3.0), &Vector3::z());

        // acos is badly conditioned next to -1.
        assert_abs_diff_eq!(angle.get::<degree>().abs(), 180.0, epsilon = 1e-5);
    }

    #[test]
    fn zero_vector_has_no_pitch() {
        let result = direction(&Vector3::zeros());
        assert_eq!(result.yaw().get::<degree>(), 0.0);
        assert!(result.pitch().get::<degree>().is_nan());
    }

    #[rstest]
    #[case(Vector3::new(1.0, 1.0, 0.0), 45.0, 0.0)]
    #[case(Vector3::new(0.0, -1.0, -1.0), 180.0, -45.0)]
    #[case(Vector3::new(-1.0, 0.0, 0.0), 270.0, 0.0)]
    #[case(Vector3::new(0.0, 3.0, 3.0_f64.sqrt()), 0.0, 30.0)]
    #[case(Vector3::new(-1.0, 1.0, -2.0_f64.sqrt()), 315.0, -45.0)]
    fn yaw_and_pitch(#[case] v: Vector3<f64>, #[case] yaw: f64, #[case] pitch: f64) {
        let result = direction(&v);
        assert_abs_diff_eq!(result.yaw().get::<degree>(), yaw, epsilon = 1e-9);
        assert_abs_diff_eq!(result.pitch().get::<degree>(), pitch, epsilon = 1e-9);
    }

    #[rstest]
    #[case(-240.0, 180.0, 120.0)]
    #[case(170.0, 180.0, 170.0)]
    #[case(-45.0, 90.0, 45.0)]
    #[case(-1e-18, 360.0, 0.0)]
    fn floored_modulo(#[case] value: f64, #[case] period: f64, #[case] expected: f64) {
        assert_eq!(wrap_degrees(value, period), expected);
    }

    quickcheck! {
        fn enu_roundtrip(
            lon_seed: i16,
            lat_seed: i8,
            dlon_seed: i16,
            dlat_seed: i16,
            dalt_seed: i16
        ) -> bool {
            // Origins away from the antimeridian and the poles, targets within
            // a few kilometers of them.
            let lon = lon_seed as f64 * 170.0 / i16::MAX as f64;
            let lat = lat_seed as f64 * 80.0 / i8::MAX as f64;
            let origin = GeodeticPoint::from_degrees(lon, lat, 25.0).unwrap();
            let target = GeodeticPoint::from_degrees(
                lon + dlon_seed as f64 * 0.03 / i16::MAX as f64,
                lat + dlat_seed as f64 * 0.03 / i16::MAX as f64,
                25.0 + dalt_seed as f64 * 500.0 / i16::MAX as f64,
            )
            .unwrap();

            let frame = EnuFrame::new(origin);
            let result = frame.to_geodetic(&frame.to_enu(&target)).unwrap();

            (result.longitude() - target.longitude()).abs().get::<degree>() < 1e-6
                && (result.latitude() - target.latitude()).abs().get::<degree>() < 1e-6
                && (result.altitude() - target.altitude()).abs().get::<meter>() < 1e-3
        }
    }
}
