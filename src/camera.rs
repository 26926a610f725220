use crate::{
    acquisition::Acquisition,
    error::Error,
    frame::{Direction, EnuFrame, EnuVector, GeodeticPoint, angle_between, direction, rotate},
};
use nalgebra::Vector3;
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

/// Offset of the camera from the recorded position, in the vehicle frame.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LeverArm {
    /// Along the heading.
    forward: Length,

    /// Perpendicular to the heading, towards the left.
    left: Length,

    up: Length,
}

impl LeverArm {
    pub fn new(forward: Length, left: Length, up: Length) -> Self {
        Self { forward, left, up }
    }

    pub fn forward(&self) -> Length {
        self.forward
    }

    pub fn left(&self) -> Length {
        self.left
    }

    pub fn up(&self) -> Length {
        self.up
    }

    fn as_vec3(&self) -> Vector3<f64> {
        Vector3::new(
            self.forward.get::<meter>(),
            self.left.get::<meter>(),
            self.up.get::<meter>(),
        )
    }
}

impl Default for LeverArm {
    fn default() -> Self {
        Self::new(Length::ZERO, Length::ZERO, Length::ZERO)
    }
}

/// A camera position and heading on the globe.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CameraModel {
    frame: EnuFrame,
    heading: Angle,

    /// Unit vector the camera faces, in the ENU frame at the origin.
    orientation: Vector3<f64>,
}

impl CameraModel {
    /// Creates a camera at `origin` facing `heading`, clockwise from north.
    pub fn new(origin: GeodeticPoint, heading: Angle) -> Self {
        Self {
            frame: EnuFrame::new(origin),
            heading,
            orientation: rotate(&Vector3::y(), -heading),
        }
    }

    /// Creates a camera mounted at `lever_arm` from the recorded `origin`.
    pub fn with_lever_arm(
        origin: GeodeticPoint,
        heading: Angle,
        lever_arm: &LeverArm,
    ) -> Result<Self, Error> {
        let frame = EnuFrame::new(origin);

        // Forward is +x of the arm; turning it by (90 - heading) lines it up
        // with the heading measured clockwise from north.
        let offset = rotate(&lever_arm.as_vec3(), Angle::new::<degree>(90.0) - heading);
        let corrected = frame.to_geodetic(&frame.from_vec3(offset))?;

        Ok(Self::new(corrected, heading))
    }

    pub fn origin(&self) -> &GeodeticPoint {
        self.frame.origin()
    }

    pub fn heading(&self) -> Angle {
        self.heading
    }

    pub fn orientation(&self) -> &Vector3<f64> {
        &self.orientation
    }

    pub fn frame(&self) -> &EnuFrame {
        &self.frame
    }

    pub fn to_enu(&self, point: &GeodeticPoint) -> EnuVector {
        self.frame.to_enu(point)
    }

    pub fn to_geodetic(&self, vector: &EnuVector) -> Result<GeodeticPoint, Error> {
        self.frame.to_geodetic(vector)
    }

    /// Direction, relative to north, under which `target` is seen.
    ///
    /// The direction of a target at the origin itself is undefined, see
    /// [`direction`].
    pub fn look_at(&self, target: &GeodeticPoint) -> Direction {
        direction(self.to_enu(target).as_vec3())
    }

    /// Signed angle between the camera orientation and `target`.
    pub fn look_at_angle(&self, target: &GeodeticPoint) -> Angle {
        angle_between(
            &self.orientation,
            self.to_enu(target).as_vec3(),
            &Vector3::z(),
        )
    }
}

/// An angle bounded by the capabilities of a lens.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldOfView {
    value: Angle,
    min: Angle,
    max: Angle,
}

impl FieldOfView {
    pub fn new(value: Angle, min: Angle, max: Angle) -> Result<Self, Error> {
        let mut fov = Self {
            value: min,
            min,
            max,
        };
        fov.set(value)?;
        Ok(fov)
    }

    pub fn value(&self) -> Angle {
        self.value
    }

    pub fn min(&self) -> Angle {
        self.min
    }

    pub fn max(&self) -> Angle {
        self.max
    }

    /// Replaces the value, keeping the previous one when `value` is outside
    /// the inclusive range of the lens.
    pub fn set(&mut self, value: Angle) -> Result<(), Error> {
        if !(self.min <= value && value <= self.max) {
            return Err(self.out_of_bounds(value));
        }

        self.value = value;
        Ok(())
    }

    /// Whether `value` lies strictly between the limits.
    pub fn admits(&self, value: Angle) -> bool {
        self.min < value && value < self.max
    }

    fn out_of_bounds(&self, value: Angle) -> Error {
        Error::FieldOfViewOutOfBounds {
            fov: value.get::<degree>(),
            min: self.min.get::<degree>(),
            max: self.max.get::<degree>(),
        }
    }
}

impl Default for FieldOfView {
    fn default() -> Self {
        Self {
            value: Angle::new::<degree>(90.0),
            min: Angle::new::<degree>(1.0),
            max: Angle::new::<degree>(160.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Lens {
    /// Renders at a fixed field of view.
    Fixed,

    /// Renders any horizontal field of view within its range.
    Spherical { horizontal: FieldOfView },
}

impl Lens {
    pub fn spherical() -> Self {
        Self::Spherical {
            horizontal: FieldOfView::default(),
        }
    }

    pub fn horizontal_fov(&self) -> Option<&FieldOfView> {
        match self {
            Self::Fixed => None,
            Self::Spherical { horizontal } => Some(horizontal),
        }
    }
}

/// A recorded position of the camera rig.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Frame {
    index: u64,
    location: GeodeticPoint,

    /// Clockwise from north.
    heading: Angle,
}

impl Frame {
    pub fn new(index: u64, location: GeodeticPoint, heading: Angle) -> Self {
        Self {
            index,
            location,
            heading,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn location(&self) -> &GeodeticPoint {
        &self.location
    }

    pub fn heading(&self) -> Angle {
        self.heading
    }
}

/// How the camera was mounted during a recording.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Setup {
    /// Height of the recorded location above the ground.
    camera_height: Length,
    lever_arm: Option<LeverArm>,
}

impl Setup {
    pub fn new(camera_height: Length, lever_arm: Option<LeverArm>) -> Self {
        Self {
            camera_height,
            lever_arm,
        }
    }

    pub fn camera_height(&self) -> Length {
        self.camera_height
    }

    pub fn lever_arm(&self) -> Option<&LeverArm> {
        self.lever_arm.as_ref()
    }
}

impl Default for Setup {
    fn default() -> Self {
        Self::new(Length::new::<meter>(2.5), None)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImageSize {
    width: u32,
    height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// What an acquired image shows.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct View {
    size: ImageSize,

    /// Relative to the heading of the frame.
    direction: Direction,
    horizontal_fov: Angle,
    vertical_fov: Angle,
    frame_index: u64,
}

impl View {
    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn direction(&self) -> &Direction {
        &self.direction
    }

    pub fn horizontal_fov(&self) -> Angle {
        self.horizontal_fov
    }

    pub fn vertical_fov(&self) -> Angle {
        self.vertical_fov
    }

    /// Index of the frame the view was acquired at.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }
}

/// A virtual camera placed at recorded frames.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    lens: Lens,

    /// Yaw is relative to the heading of the frame.
    direction: Direction,
    height: Length,
    frame: Option<Frame>,
    lever_arm: Option<LeverArm>,

    /// Derived from the frame and the lever arm. Cleared when either changes.
    model: Option<CameraModel>,
}

impl Camera {
    pub fn new(lens: Lens) -> Self {
        Self {
            lens,
            direction: Direction::from_degrees(0.0, 0.0),
            height: Setup::default().camera_height(),
            frame: None,
            lever_arm: None,
            model: None,
        }
    }

    pub fn spherical() -> Self {
        Self::new(Lens::spherical())
    }

    pub fn lens(&self) -> &Lens {
        &self.lens
    }

    pub fn direction(&self) -> &Direction {
        &self.direction
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    pub fn height(&self) -> Length {
        self.height
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    pub fn set_horizontal_fov(&mut self, fov: Angle) -> Result<(), Error> {
        match &mut self.lens {
            Lens::Fixed => Err(Error::FieldOfViewUnsupported),
            Lens::Spherical { horizontal } => horizontal.set(fov),
        }
    }

    /// Moves the camera to `frame`.
    ///
    /// The setup of the recording, when known, provides the camera height and
    /// the lever arm. Without one the height is kept and no lever arm is used.
    pub fn set_frame(&mut self, frame: Frame, setup: Option<&Setup>) {
        if let Some(setup) = setup {
            self.height = setup.camera_height();
        }
        self.lever_arm = setup.and_then(|setup| setup.lever_arm().copied());
        self.frame = Some(frame);
        self.model = None;
    }

    /// Returns the model of the camera at its current frame.
    pub fn model(&mut self) -> Result<&CameraModel, Error> {
        let frame = self.frame.ok_or(Error::NoFrame)?;

        let model = match self.model {
            Some(model) => model,
            None => match &self.lever_arm {
                Some(arm) => CameraModel::with_lever_arm(*frame.location(), frame.heading(), arm)?,
                None => CameraModel::new(*frame.location(), frame.heading()),
            },
        };

        Ok(self.model.insert(model))
    }

    /// Turns the camera towards `target`.
    ///
    /// Looking at the camera's own position leaves an undefined direction, as
    /// in [`CameraModel::look_at`].
    pub fn look_at(&mut self, target: &GeodeticPoint) -> Result<(), Error> {
        let model = *self.model()?;
        let seen = model.look_at(target);
        self.direction = Direction::new(seen.yaw() - model.heading(), seen.pitch());
        Ok(())
    }

    /// Captures an image of `size` in the current direction.
    ///
    /// The vertical field of view follows from the aspect ratio and must fall
    /// strictly within the range of the lens.
    pub fn acquire(&mut self, size: ImageSize) -> Result<Acquisition, Error> {
        let horizontal = *self
            .lens
            .horizontal_fov()
            .ok_or(Error::FieldOfViewUnsupported)?;
        let model = *self.model()?;
        let frame = self.frame.ok_or(Error::NoFrame)?;

        let ratio = f64::from(size.height()) / f64::from(size.width());
        let half = horizontal.value().get::<radian>() / 2.0;
        let vertical = Angle::new::<radian>(2.0 * (ratio * half.tan()).atan());
        if !horizontal.admits(vertical) {
            return Err(horizontal.out_of_bounds(vertical));
        }

        let view = View {
            size,
            direction: self.direction,
            horizontal_fov: horizontal.value(),
            vertical_fov: vertical,
            frame_index: frame.index(),
        };

        Ok(Acquisition::new(view, frame, model, self.height))
    }
}
