use crate::{
    camera::CameraModel,
    error::Error,
    frame::{Direction, EnuVector, GeodeticPoint, rotate},
};
use nalgebra::Vector3;
use rayon::prelude::*;
use uom::{
    ConstZero,
    si::{
        angle::{degree, radian},
        f64::{Angle, Length},
        length::meter,
    },
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Where a downward viewing direction meets flat ground.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GroundObservation {
    distance: Length,
    relative: EnuVector,
    absolute: GeodeticPoint,
}

impl GroundObservation {
    /// Horizontal distance from the camera.
    pub fn distance(&self) -> Length {
        self.distance
    }

    /// Offset from the camera.
    pub fn relative(&self) -> &EnuVector {
        &self.relative
    }

    pub fn absolute(&self) -> &GeodeticPoint {
        &self.absolute
    }
}

/// Intersects viewing directions of a camera with the ground below it.
///
/// The ground is a plane `height` below the camera origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundProjector {
    model: CameraModel,
    height: Length,
}

impl GroundProjector {
    pub fn new(model: CameraModel, height: Length) -> Result<Self, Error> {
        if !(height > Length::ZERO) {
            return Err(Error::InvalidCameraHeight {
                height: height.get::<meter>(),
            });
        }

        Ok(Self { model, height })
    }

    pub fn model(&self) -> &CameraModel {
        &self.model
    }

    pub fn height(&self) -> Length {
        self.height
    }

    /// Projects `direction`, with yaw relative to north, onto the ground.
    ///
    /// Only directions below the horizon and not straight down hit the
    /// ground at a well defined distance.
    pub fn project(&self, direction: &Direction) -> Result<GroundObservation, Error> {
        let pitch = direction.pitch();
        if !(Angle::new::<degree>(-90.0) < pitch && pitch < Angle::ZERO) {
            return Err(Error::InvalidPitch {
                pitch: pitch.get::<degree>(),
            });
        }

        let height = self.height.get::<meter>();
        let distance = (Angle::new::<degree>(90.0) + pitch).get::<radian>().tan() * height;

        let horizontal = rotate(&Vector3::new(0.0, distance, 0.0), -direction.yaw());
        let relative = self
            .model
            .frame()
            .from_vec3(Vector3::new(horizontal.x, horizontal.y, -height));
        let absolute = self.model.to_geodetic(&relative)?;

        Ok(GroundObservation {
            distance: Length::new::<meter>(distance),
            relative,
            absolute,
        })
    }

    pub fn par_project(&self, directions: &[Direction]) -> Vec<Result<GroundObservation, Error>> {
        directions
            .par_iter()
            .map(|direction| self.project(direction))
            .collect()
    }
}
