//! Partitioning of the sphere of viewing angles into rectangular tiles.

use crate::error::Error;
use std::cmp::Ordering;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A box of longitudes and latitudes in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AngularBounds {
    lon_min: f64,
    lon_max: f64,
    lat_min: f64,
    lat_max: f64,
}

impl AngularBounds {
    pub fn new(lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64) -> Result<Self, Error> {
        let bounds = [lon_min, lon_max, lat_min, lat_max];
        if bounds.iter().any(|bound| !bound.is_finite()) {
            return Err(Error::InvalidGridBounds {
                reason: format!("expected finite bounds but got: {bounds:?}"),
            });
        }

        if lon_min >= lon_max || lat_min >= lat_max {
            return Err(Error::InvalidGridBounds {
                reason: format!("expected min < max but got: {bounds:?}"),
            });
        }

        Ok(Self {
            lon_min,
            lon_max,
            lat_min,
            lat_max,
        })
    }

    pub fn whole_sphere() -> Self {
        Self {
            lon_min: -180.0,
            lon_max: 180.0,
            lat_min: -90.0,
            lat_max: 90.0,
        }
    }

    /// A band of longitudes covering all latitudes.
    pub fn longitudes(lon_min: f64, lon_max: f64) -> Result<Self, Error> {
        Self::new(lon_min, lon_max, -90.0, 90.0)
    }

    /// A `width` by `height` box centered on a direction.
    pub fn around(lon: f64, lat: f64, width: f64, height: f64) -> Result<Self, Error> {
        Self::new(
            lon - width / 2.0,
            lon + width / 2.0,
            lat - height / 2.0,
            lat + height / 2.0,
        )
    }

    pub fn lon_min(&self) -> f64 {
        self.lon_min
    }

    pub fn lon_max(&self) -> f64 {
        self.lon_max
    }

    pub fn lat_min(&self) -> f64 {
        self.lat_min
    }

    pub fn lat_max(&self) -> f64 {
        self.lat_max
    }

    pub fn width(&self) -> f64 {
        self.lon_max - self.lon_min
    }

    pub fn height(&self) -> f64 {
        self.lat_max - self.lat_min
    }
}

impl Default for AngularBounds {
    fn default() -> Self {
        Self::whole_sphere()
    }
}

/// One tile of an [`AngularGrid`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridCell {
    x: usize,
    y: usize,
    anchor_lon: f64,
    anchor_lat: f64,
    index: usize,
}

impl GridCell {
    /// Column, counted from the west.
    pub fn x(&self) -> usize {
        self.x
    }

    /// Row, counted from the south.
    pub fn y(&self) -> usize {
        self.y
    }

    /// Western edge in degrees.
    pub fn anchor_lon(&self) -> f64 {
        self.anchor_lon
    }

    /// Southern edge in degrees.
    pub fn anchor_lat(&self) -> f64 {
        self.anchor_lat
    }

    /// Position in the grid, row major from the north-west corner.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Construction parameters of an [`AngularGrid`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridSpec {
    pub bounds: AngularBounds,
    pub rows: usize,
    pub cols: usize,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            bounds: AngularBounds::whole_sphere(),
            rows: 4,
            cols: 8,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AngularGrid {
    bounds: AngularBounds,
    rows: usize,
    cols: usize,
    cell_width: f64,
    cell_height: f64,
    cells: Vec<GridCell>,
}

impl AngularGrid {
    pub fn new(bounds: AngularBounds, rows: usize, cols: usize) -> Result<Self, Error> {
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidGridBounds {
                reason: format!("expected at least one row and column but got {rows}x{cols}"),
            });
        }

        Ok(Self::build(bounds, rows, cols))
    }

    fn build(bounds: AngularBounds, rows: usize, cols: usize) -> Self {
        let cell_width = bounds.width() / cols as f64;
        let cell_height = bounds.height() / rows as f64;

        let cells = (0..rows * cols)
            .map(|index| {
                let x = index % cols;
                let y = (rows - 1) - index / cols;
                GridCell {
                    x,
                    y,
                    anchor_lon: x as f64 * cell_width - bounds.lon_max,
                    anchor_lat: y as f64 * cell_height - bounds.lat_max,
                    index,
                }
            })
            .collect();

        Self {
            bounds,
            rows,
            cols,
            cell_width,
            cell_height,
            cells,
        }
    }

    pub fn bounds(&self) -> &AngularBounds {
        &self.bounds
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cell_width(&self) -> f64 {
        self.cell_width
    }

    pub fn cell_height(&self) -> f64 {
        self.cell_height
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> Option<&GridCell> {
        self.cells.get(index)
    }

    /// Whether `cell` was produced by this grid.
    pub fn contains(&self, cell: &GridCell) -> bool {
        self.cell(cell.index) == Some(cell)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GridCell> {
        self.cells.iter()
    }

    /// Returns the cells overlapping `query`, in index order.
    ///
    /// Longitudes of the query may lie outside [-180, 180] and are wrapped
    /// around the antimeridian one bound at a time, so a query wider than a
    /// full turn only keeps what its wrapped bounds enclose. When both bounds
    /// wrap onto the same meridian the query matches every column.
    pub fn filter(&self, query: &AngularBounds) -> Result<Vec<GridCell>, Error> {
        if query.lat_min < -90.0 || query.lat_max > 90.0 {
            return Err(Error::InvalidGridBounds {
                reason: format!(
                    "expected latitudes in range [-90, 90] but got: ({}, {})",
                    query.lat_min, query.lat_max
                ),
            });
        }

        let latitude = Span {
            min: query.lat_min,
            max: query.lat_max,
        };
        let longitude = LongitudeSpan::new(query.lon_min, query.lon_max);

        let cells: Vec<_> = self
            .cells
            .iter()
            .filter(|cell| {
                latitude.overlaps(cell.anchor_lat, self.cell_height)
                    && longitude.overlaps(cell.anchor_lon, self.cell_width)
            })
            .copied()
            .collect();

        log::debug!(
            "{} of {} cells overlap {query:?}",
            cells.len(),
            self.cells.len()
        );

        Ok(cells)
    }
}

impl Default for AngularGrid {
    fn default() -> Self {
        let spec = GridSpec::default();
        Self::build(spec.bounds, spec.rows, spec.cols)
    }
}

impl TryFrom<GridSpec> for AngularGrid {
    type Error = Error;

    fn try_from(spec: GridSpec) -> Result<Self, Self::Error> {
        Self::new(spec.bounds, spec.rows, spec.cols)
    }
}

impl<'a> IntoIterator for &'a AngularGrid {
    type Item = &'a GridCell;
    type IntoIter = std::slice::Iter<'a, GridCell>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Clone, Copy, Debug)]
struct Span {
    min: f64,
    max: f64,
}

impl Span {
    fn overlaps(&self, anchor: f64, size: f64) -> bool {
        self.min < anchor + size && anchor < self.max
    }
}

#[derive(Clone, Copy, Debug)]
enum LongitudeSpan {
    Everything,
    Contiguous(Span),

    /// Crosses the antimeridian: everything east of `min` or west of `max`.
    Wrapped { min: f64, max: f64 },
}

impl LongitudeSpan {
    fn new(lon_min: f64, lon_max: f64) -> Self {
        let min = match wrap(lon_min) {
            min if min < -180.0 => min + 360.0,
            min => min,
        };
        let max = match wrap(lon_max) {
            max if max > 180.0 => max - 360.0,
            max => max,
        };

        // Bounds are strictly ordered, so equal wrapped bounds are whole turns apart.
        match min.partial_cmp(&max) {
            Some(Ordering::Equal) => Self::Everything,
            Some(Ordering::Greater) => Self::Wrapped { min, max },
            _ => Self::Contiguous(Span { min, max }),
        }
    }

    fn overlaps(&self, anchor: f64, size: f64) -> bool {
        match *self {
            Self::Everything => true,
            Self::Contiguous(span) => span.overlaps(anchor, size),
            Self::Wrapped { min, max } => {
                Span { min: -180.0, max }.overlaps(anchor, size)
                    || Span { min, max: 180.0 }.overlaps(anchor, size)
            }
        }
    }
}

/// Brings a longitude into (-360, 360) keeping its sign.
fn wrap(lon: f64) -> f64 {
    match lon < 0.0 {
        true => lon.rem_euclid(360.0) - 360.0,
        false => lon.rem_euclid(360.0),
    }
}

/// Tile edge lengths offered by the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Scale {
    Px256,
    Px512,
    Px1024,
    Px2048,
    Px4096,
}

impl Scale {
    pub const ALL: [Scale; 5] = [
        Scale::Px256,
        Scale::Px512,
        Scale::Px1024,
        Scale::Px2048,
        Scale::Px4096,
    ];

    /// Identifier of the scale in renderer requests.
    pub fn id(&self) -> u8 {
        match self {
            Scale::Px256 => 1,
            Scale::Px512 => 2,
            Scale::Px1024 => 3,
            Scale::Px2048 => 4,
            Scale::Px4096 => 5,
        }
    }

    /// Tile edge length in pixels.
    pub fn size(&self) -> u32 {
        match self {
            Scale::Px256 => 256,
            Scale::Px512 => 512,
            Scale::Px1024 => 1024,
            Scale::Px2048 => 2048,
            Scale::Px4096 => 4096,
        }
    }

    /// Smallest scale with tiles of at least `size` pixels.
    pub fn from_size(size: u32) -> Self {
        Self::ALL
            .into_iter()
            .find(|scale| scale.size() >= size)
            .unwrap_or(Scale::Px4096)
    }
}
