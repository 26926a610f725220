//! Least squares intersection of viewing rays.

use crate::{
    error::Error,
    frame::{Direction, Ecef, GeodeticPoint, local_basis},
};
use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;
use uom::si::{
    angle::radian,
    f64::{Angle, Length},
    length::meter,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Relative to the number of rays, the smallest eigenvalue of the normal
/// matrix below which the rays are treated as parallel.
const DEGENERACY_TOLERANCE: f64 = 1e-10;

/// A half line from an observer towards an observed point.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ViewingRay {
    origin: GeodeticPoint,

    /// Clockwise from north.
    bearing: Angle,

    /// Upwards from the horizontal plane.
    pitch: Angle,
}

impl ViewingRay {
    pub fn new(origin: GeodeticPoint, bearing: Angle, pitch: Angle) -> Self {
        Self {
            origin,
            bearing,
            pitch,
        }
    }

    pub fn from_direction(origin: GeodeticPoint, direction: &Direction) -> Self {
        Self::new(origin, direction.yaw(), direction.pitch())
    }

    pub fn origin(&self) -> &GeodeticPoint {
        &self.origin
    }

    pub fn bearing(&self) -> Angle {
        self.bearing
    }

    pub fn pitch(&self) -> Angle {
        self.pitch
    }

    /// Unit direction of the ray in ECEF, if it has one.
    pub fn ecef_direction(&self) -> Option<Vector3<f64>> {
        let (sin_b, cos_b) = self.bearing.get::<radian>().sin_cos();
        let (sin_p, cos_p) = self.pitch.get::<radian>().sin_cos();
        let local = Vector3::new(cos_p * sin_b, cos_p * cos_b, sin_p);

        let basis = local_basis(self.origin.latitude(), self.origin.longitude());
        (basis * local).try_normalize(f64::EPSILON)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TriangulatedPoint {
    point: GeodeticPoint,
    ray_count: usize,

    /// Root mean square distance from the point to the rays.
    residual: Length,
}

impl TriangulatedPoint {
    pub fn point(&self) -> &GeodeticPoint {
        &self.point
    }

    pub fn ray_count(&self) -> usize {
        self.ray_count
    }

    pub fn residual(&self) -> Length {
        self.residual
    }
}

/// Finds the point closest to all `rays` in the least squares sense.
///
/// Solves `sum(I - d d^T) x = sum(I - d d^T) p` over ray origins `p` and unit
/// directions `d`, relative to the first origin to keep the magnitudes small.
/// Fewer than two rays, or rays that are all parallel, have no unique
/// solution.
pub fn triangulate(rays: &[ViewingRay]) -> Result<TriangulatedPoint, Error> {
    let degenerate = || Error::DegenerateTriangulation { rays: rays.len() };

    let first = rays.first().ok_or_else(degenerate)?;
    let anchor = first.origin.to_ecef().as_vec3();

    let lines = rays
        .iter()
        .map(|ray| {
            let direction = ray.ecef_direction().ok_or_else(degenerate)?;
            let offset = ray.origin.to_ecef().as_vec3() - anchor;
            Ok((Matrix3::identity() - direction * direction.transpose(), offset))
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let (lhs, rhs) = lines.iter().fold(
        (Matrix3::<f64>::zeros(), Vector3::<f64>::zeros()),
        |(lhs, rhs), (projector, offset)| (lhs + projector, rhs + projector * offset),
    );

    let smallest = lhs
        .symmetric_eigen()
        .eigenvalues
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    if !(smallest > DEGENERACY_TOLERANCE * rays.len() as f64) {
        return Err(degenerate());
    }

    let solution = lhs.try_inverse().ok_or_else(degenerate)? * rhs;

    let squared: f64 = lines
        .iter()
        .map(|(projector, offset)| (projector * (solution - offset)).norm_squared())
        .sum();
    let residual = (squared / rays.len() as f64).sqrt();

    let point = Ecef::from_meters(solution + anchor).to_geodetic()?;
    log::debug!(
        "triangulated {} rays with a residual of {residual:.3} m",
        rays.len()
    );

    Ok(TriangulatedPoint {
        point,
        ray_count: rays.len(),
        residual: Length::new::<meter>(residual),
    })
}

/// Triangulates independent groups of rays in parallel.
pub fn par_triangulate(groups: &[Vec<ViewingRay>]) -> Vec<Result<TriangulatedPoint, Error>> {
    groups.par_iter().map(|rays| triangulate(rays)).collect()
}
