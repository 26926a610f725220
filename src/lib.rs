// #![warn(missing_docs)]

//! Panoramic Imagery Georeferencing
//!
//! Selects and stitches the tiles of a spherical panorama, then turns what a
//! camera sees into positions on the WGS84 ellipsoid, either by intersecting a
//! single viewing ray with the ground or by triangulating several rays.

pub mod acquisition;
pub mod camera;

#[allow(missing_docs)]
pub mod error;

pub mod frame;
pub mod geometry;
pub mod grid;
pub mod ground;
pub mod stitch;
pub mod triangulate;

pub mod prelude {
    pub use crate::{
        acquisition::{Acquisition, Pixel, ViewingAngleSource, triangulate_label},
        camera::{Camera, CameraModel, Frame, ImageSize, Lens, LeverArm, Setup},
        error::Error,
        frame::{Direction, EnuFrame, EnuVector, GeodeticPoint},
        grid::{AngularBounds, AngularGrid, GridCell, Scale},
        ground::GroundProjector,
        stitch::{CompositeImage, Tile, TileSource, TileStitcher},
        triangulate::{ViewingRay, triangulate},
    };
}
