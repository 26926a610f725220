//! Georeferencing of pixels in images acquired by a [`Camera`].
//!
//! [`Camera`]: crate::camera::Camera

use crate::{
    camera::{CameraModel, Frame, View},
    error::Error,
    frame::{Direction, GeodeticPoint},
    ground::{GroundObservation, GroundProjector},
    triangulate::{TriangulatedPoint, ViewingRay, triangulate},
};
use std::collections::BTreeMap;
use uom::si::f64::Length;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pixel {
    row: u32,
    col: u32,
}

impl Pixel {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn col(&self) -> u32 {
        self.col
    }
}

/// Knows under which angles the pixels of a view are seen, for instance the
/// renderer that produced the view.
pub trait ViewingAngleSource {
    /// Returns the direction, with yaw relative to north, seen through `pixel`.
    fn viewing_angles(&self, view: &View, pixel: Pixel) -> Result<Direction, Error>;
}

impl<F> ViewingAngleSource for F
where
    F: Fn(&View, Pixel) -> Result<Direction, Error>,
{
    fn viewing_angles(&self, view: &View, pixel: Pixel) -> Result<Direction, Error> {
        self(view, pixel)
    }
}

/// A pixel together with the ray it was seen along.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ViewParameterizedPixel {
    pixel: Pixel,
    ray: ViewingRay,
    frame_index: u64,
}

impl ViewParameterizedPixel {
    pub fn pixel(&self) -> Pixel {
        self.pixel
    }

    pub fn ray(&self) -> &ViewingRay {
        &self.ray
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }
}

/// A pixel located on the ground.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoReferencedPixel {
    view_parameterized: ViewParameterizedPixel,
    ground: GroundObservation,
}

impl GeoReferencedPixel {
    pub fn view_parameterized(&self) -> &ViewParameterizedPixel {
        &self.view_parameterized
    }

    pub fn ground(&self) -> &GroundObservation {
        &self.ground
    }

    pub fn location(&self) -> &GeodeticPoint {
        self.ground.absolute()
    }
}

/// An image taken by a camera at a recorded frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Acquisition {
    view: View,
    frame: Frame,
    model: CameraModel,
    camera_height: Length,
    view_parameterized: BTreeMap<String, ViewParameterizedPixel>,
    geo_referenced: BTreeMap<String, GeoReferencedPixel>,
}

impl Acquisition {
    pub(crate) fn new(view: View, frame: Frame, model: CameraModel, camera_height: Length) -> Self {
        Self {
            view,
            frame,
            model,
            camera_height,
            view_parameterized: BTreeMap::new(),
            geo_referenced: BTreeMap::new(),
        }
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn model(&self) -> &CameraModel {
        &self.model
    }

    pub fn camera_height(&self) -> Length {
        self.camera_height
    }

    /// The recorded location of the frame.
    pub fn camera_location(&self) -> GeodeticPoint {
        *self.frame.location()
    }

    /// The point on the ground below the recorded location.
    pub fn ground_location(&self) -> GeodeticPoint {
        let location = *self.frame.location();
        location.with_altitude(location.altitude() - self.camera_height)
    }

    pub fn view_parameterized_pixel(
        &self,
        source: &impl ViewingAngleSource,
        pixel: Pixel,
    ) -> Result<ViewParameterizedPixel, Error> {
        let direction = source.viewing_angles(&self.view, pixel)?;

        Ok(ViewParameterizedPixel {
            pixel,
            ray: ViewingRay::from_direction(*self.model.origin(), &direction),
            frame_index: self.frame.index(),
        })
    }

    pub fn project_pixel_on_ground(
        &self,
        source: &impl ViewingAngleSource,
        pixel: Pixel,
    ) -> Result<GeoReferencedPixel, Error> {
        let view_parameterized = self.view_parameterized_pixel(source, pixel)?;
        let projector = GroundProjector::new(self.model, self.camera_height)?;

        let ray = view_parameterized.ray();
        let ground = projector.project(&Direction::new(ray.bearing(), ray.pitch()))?;

        Ok(GeoReferencedPixel {
            view_parameterized,
            ground,
        })
    }

    /// Keeps `pixel` under `label`, returning the pixel it replaces.
    pub fn store_view_parameterized(
        &mut self,
        label: impl Into<String>,
        pixel: ViewParameterizedPixel,
    ) -> Option<ViewParameterizedPixel> {
        self.view_parameterized.insert(label.into(), pixel)
    }

    /// Keeps `pixel` under `label`, returning the pixel it replaces.
    pub fn store_geo_referenced(
        &mut self,
        label: impl Into<String>,
        pixel: GeoReferencedPixel,
    ) -> Option<GeoReferencedPixel> {
        self.geo_referenced.insert(label.into(), pixel)
    }

    pub fn view_parameterized(&self, label: &str) -> Option<&ViewParameterizedPixel> {
        self.view_parameterized.get(label)
    }

    pub fn geo_referenced(&self, label: &str) -> Option<&GeoReferencedPixel> {
        self.geo_referenced.get(label)
    }

    /// Rays of all pixels stored under `label`.
    pub fn rays(&self, label: &str) -> impl Iterator<Item = &ViewingRay> {
        let geo_referenced = self
            .geo_referenced
            .get(label)
            .map(|pixel| pixel.view_parameterized.ray());
        let view_parameterized = self.view_parameterized.get(label).map(|pixel| pixel.ray());

        geo_referenced.into_iter().chain(view_parameterized)
    }
}

/// Triangulates the pixels stored under `label` across `acquisitions`.
pub fn triangulate_label(
    label: &str,
    acquisitions: &[Acquisition],
) -> Result<TriangulatedPoint, Error> {
    let rays: Vec<ViewingRay> = acquisitions
        .iter()
        .flat_map(|acquisition| acquisition.rays(label))
        .copied()
        .collect();

    triangulate(&rays)
}
