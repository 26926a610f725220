use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid grid bounds: {reason}")]
    InvalidGridBounds { reason: String },
    #[error("expected latitude in range [-90, 90] but got: {latitude}")]
    InvalidLatitude { latitude: f64 },
    #[error("expected finite coordinates but got: ({x}, {y}, {z})")]
    NonFinite { x: f64, y: f64, z: f64 },
    #[error("enu vector belongs to a different origin than the frame it was used with")]
    MismatchedOrigin,
    #[error("{rays} rays do not intersect in a unique point")]
    DegenerateTriangulation { rays: usize },
    #[error("expected pitch in range (-90, 0) but got: {pitch}")]
    InvalidPitch { pitch: f64 },
    #[error("expected a positive camera height but got: {height} m")]
    InvalidCameraHeight { height: f64 },
    #[error("expected a positive length but got: {length} m")]
    InvalidLength { length: f64 },
    #[error("unsupported geometry: {kind}")]
    UnsupportedGeometry { kind: &'static str },
    #[error("failed to decode tile {index}")]
    TileDecode {
        index: usize,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to fetch tile {index}: {reason}")]
    TileFetch { index: usize, reason: String },
    #[error("no tiles of the grid were supplied")]
    EmptyComposite,
    #[error("failed to encode composite")]
    Encode(#[from] image::ImageError),
    #[error("lens does not support an adjustable field of view")]
    FieldOfViewUnsupported,
    #[error("expected field of view between {min} and {max} degrees but got: {fov}")]
    FieldOfViewOutOfBounds { fov: f64, min: f64, max: f64 },
    #[error("camera is not placed at a frame")]
    NoFrame,
    #[error("viewing angles unavailable: {reason}")]
    ViewingAngles { reason: String },
}
