//! Simple shapes moved between geodetic coordinates and a local tangent plane.

use crate::{
    error::Error,
    frame::{EnuFrame, EnuVector, GeodeticPoint, rotate},
};
use geo::{Buffer, Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use nalgebra::Vector3;
use uom::si::{
    f64::{Angle, Length},
    length::meter,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pieces of a split line string at most this long are dropped.
const MIN_PIECE_LENGTH: f64 = 0.01;

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Shape<P> {
    Point(P),
    LineString(Vec<P>),

    /// The exterior ring. The closing point may be left out.
    Polygon(Vec<P>),
    Collection(Vec<Shape<P>>),
}

impl<P> Shape<P> {
    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Point(_) => "point",
            Shape::LineString(_) => "linestring",
            Shape::Polygon(_) => "polygon",
            Shape::Collection(_) => "collection",
        }
    }

    /// Coordinates of a point, line string or polygon.
    pub fn points(&self) -> Result<&[P], Error> {
        match self {
            Shape::Point(point) => Ok(std::slice::from_ref(point)),
            Shape::LineString(points) | Shape::Polygon(points) => Ok(points.as_slice()),
            Shape::Collection(_) => Err(Error::UnsupportedGeometry { kind: self.kind() }),
        }
    }

    fn try_map<Q>(&self, mut f: impl FnMut(&P) -> Result<Q, Error>) -> Result<Shape<Q>, Error> {
        match self {
            Shape::Point(point) => Ok(Shape::Point(f(point)?)),
            Shape::LineString(points) => Ok(Shape::LineString(
                points.iter().map(f).collect::<Result<_, _>>()?,
            )),
            Shape::Polygon(points) => Ok(Shape::Polygon(
                points.iter().map(f).collect::<Result<_, _>>()?,
            )),
            Shape::Collection(_) => Err(Error::UnsupportedGeometry { kind: self.kind() }),
        }
    }
}

/// A tangent plane fitted to one shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    frame: EnuFrame,
}

impl Projection {
    pub fn new(origin: GeodeticPoint) -> Self {
        Self {
            frame: EnuFrame::new(origin),
        }
    }

    /// A projection centered on the first coordinate of `shape`.
    pub fn for_shape(shape: &Shape<GeodeticPoint>) -> Result<Self, Error> {
        let origin = shape
            .points()?
            .first()
            .ok_or(Error::UnsupportedGeometry { kind: "empty shape" })?;
        Ok(Self::new(*origin))
    }

    pub fn frame(&self) -> &EnuFrame {
        &self.frame
    }

    pub fn to_enu(&self, shape: &Shape<GeodeticPoint>) -> Result<Shape<EnuVector>, Error> {
        shape.try_map(|point| Ok(self.frame.to_enu(point)))
    }

    pub fn to_geodetic(&self, shape: &Shape<EnuVector>) -> Result<Shape<GeodeticPoint>, Error> {
        shape.try_map(|vector| self.frame.to_geodetic(vector))
    }

    /// Rotates `shape` counter-clockwise about the up axis through the origin.
    pub fn rotate(
        &self,
        shape: &Shape<EnuVector>,
        angle: Angle,
    ) -> Result<Shape<EnuVector>, Error> {
        shape.try_map(|vector| match vector.origin() == self.frame.origin() {
            true => Ok(vector.map(|inner| rotate(&inner, angle))),
            false => Err(Error::MismatchedOrigin),
        })
    }

    /// Grows a point, line string or polygon by `distance` on the tangent plane.
    ///
    /// Corners and ends are rounded. The outline is returned as a polygon at
    /// the height of the first coordinate, or as a collection of polygons if
    /// the buffer falls apart. Holes are dropped.
    pub fn buffer(
        &self,
        shape: &Shape<EnuVector>,
        distance: Length,
    ) -> Result<Shape<EnuVector>, Error> {
        let distance = distance.get::<meter>();
        if !(distance > 0.0) {
            return Err(Error::InvalidLength { length: distance });
        }

        let points = shape.points()?;
        let first = points
            .first()
            .ok_or(Error::UnsupportedGeometry { kind: "empty shape" })?;
        if points.iter().any(|vector| vector.origin() != self.frame.origin()) {
            return Err(Error::MismatchedOrigin);
        }

        let planar = |vector: &EnuVector| Coord {
            x: vector.as_vec3().x,
            y: vector.as_vec3().y,
        };
        let geometry: Geometry = match shape {
            Shape::Point(vector) => Point::from(planar(vector)).into(),
            Shape::LineString(points) => points.iter().map(planar).collect::<LineString>().into(),
            Shape::Polygon(points) => {
                Polygon::new(points.iter().map(planar).collect(), Vec::new()).into()
            }
            Shape::Collection(_) => return Err(Error::UnsupportedGeometry { kind: shape.kind() }),
        };

        let up = first.as_vec3().z;
        let MultiPolygon(polygons) = geometry.buffer(distance);
        let mut outlines: Vec<_> = polygons
            .iter()
            .map(|polygon| {
                // Rings are closed, the first coordinate repeats at the end.
                let ring = polygon
                    .exterior()
                    .coords()
                    .skip(1)
                    .map(|coord| self.frame.from_vec3(Vector3::new(coord.x, coord.y, up)))
                    .collect();
                Shape::Polygon(ring)
            })
            .collect();

        match outlines.len() {
            0 => Err(Error::UnsupportedGeometry { kind: "empty buffer" }),
            1 => Ok(outlines.swap_remove(0)),
            _ => Ok(Shape::Collection(outlines)),
        }
    }
}

/// Grows `shape` by `distance` in every horizontal direction.
///
/// Works on the tangent plane at the first coordinate of the shape, see
/// [`Projection::buffer`].
pub fn buffer(
    shape: &Shape<GeodeticPoint>,
    distance: Length,
) -> Result<Shape<GeodeticPoint>, Error> {
    let projection = Projection::for_shape(shape)?;
    let buffered = projection.buffer(&projection.to_enu(shape)?, distance)?;

    match buffered {
        Shape::Collection(outlines) => Ok(Shape::Collection(
            outlines
                .iter()
                .map(|outline| projection.to_geodetic(outline))
                .collect::<Result<_, _>>()?,
        )),
        outline => projection.to_geodetic(&outline),
    }
}

/// Cuts a line string into pieces of equal horizontal length no longer than
/// `max_length`.
pub fn split_linestring(
    shape: &Shape<GeodeticPoint>,
    max_length: Length,
) -> Result<Vec<Shape<GeodeticPoint>>, Error> {
    if !matches!(shape, Shape::LineString(_)) {
        return Err(Error::UnsupportedGeometry { kind: shape.kind() });
    }

    let max_length = max_length.get::<meter>();
    if !(max_length > 0.0) {
        return Err(Error::InvalidLength { length: max_length });
    }

    let projection = Projection::for_shape(shape)?;
    let coords: Vec<Vector3<f64>> = projection
        .to_enu(shape)?
        .points()?
        .iter()
        .map(|vector| *vector.as_vec3())
        .collect();

    let total: f64 = coords.windows(2).map(|pair| horizontal(&pair[0], &pair[1])).sum();
    if total <= MIN_PIECE_LENGTH {
        return Ok(Vec::new());
    }
    let step = total / (total / max_length).ceil();

    let mut pieces = Vec::new();
    let mut current = vec![coords[0]];
    let mut budget = step;

    for pair in coords.windows(2) {
        let (mut start, end) = (pair[0], pair[1]);
        let mut remaining = horizontal(&start, &end);

        while remaining > budget {
            let split = start + (end - start) * (budget / remaining);
            current.push(split);
            pieces.push(std::mem::replace(&mut current, vec![split]));
            start = split;
            remaining = horizontal(&start, &end);
            budget = step;
        }

        current.push(end);
        budget -= remaining;
    }
    pieces.push(current);

    pieces
        .into_iter()
        .filter(|piece| {
            let length: f64 = piece
                .windows(2)
                .map(|pair| horizontal(&pair[0], &pair[1]))
                .sum();
            length > MIN_PIECE_LENGTH
        })
        .map(|piece| {
            let piece = piece
                .into_iter()
                .map(|inner| projection.frame.from_vec3(inner))
                .collect();
            projection.to_geodetic(&Shape::LineString(piece))
        })
        .collect()
}

/// Returns a square of `width` centered on a point, aligned with east and
/// north.
pub fn point_to_square(
    shape: &Shape<GeodeticPoint>,
    width: Length,
) -> Result<Shape<GeodeticPoint>, Error> {
    let Shape::Point(center) = shape else {
        return Err(Error::UnsupportedGeometry { kind: shape.kind() });
    };

    let half = width.get::<meter>() / 2.0;
    if !(half > 0.0) {
        return Err(Error::InvalidLength {
            length: width.get::<meter>(),
        });
    }

    let projection = Projection::new(*center);
    let corners = [(half, half), (-half, half), (-half, -half), (half, -half)]
        .into_iter()
        .map(|(east, north)| projection.frame.from_vec3(Vector3::new(east, north, 0.0)))
        .collect();

    projection.to_geodetic(&Shape::Polygon(corners))
}

fn horizontal(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}
