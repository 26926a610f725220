//! Assembly of grid tiles into one composite image.

use crate::{
    error::Error,
    grid::{AngularGrid, GridCell, Scale},
};
use image::{RgbImage, codecs::jpeg::JpegEncoder, imageops};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Encoded image bytes of one grid cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    cell: GridCell,
    bytes: Vec<u8>,
}

impl Tile {
    pub fn new(cell: GridCell, bytes: Vec<u8>) -> Self {
        Self { cell, bytes }
    }

    pub fn cell(&self) -> &GridCell {
        &self.cell
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Provides the encoded image of a grid cell, for instance a renderer.
pub trait TileSource {
    fn fetch(&self, cell: &GridCell) -> Result<Vec<u8>, Error>;
}

impl<F> TileSource for F
where
    F: Fn(&GridCell) -> Result<Vec<u8>, Error>,
{
    fn fetch(&self, cell: &GridCell) -> Result<Vec<u8>, Error> {
        self(cell)
    }
}

/// An axis aligned rectangle of viewing angles in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AngularRect {
    /// Western edge.
    x: f64,

    /// Southern edge.
    y: f64,
    width: f64,
    height: f64,
}

impl AngularRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }
}

/// Column and row in a composite, counted from the top left corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelPoint {
    x: i64,
    y: i64,
}

impl PixelPoint {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> i64 {
        self.x
    }

    pub fn y(&self) -> i64 {
        self.y
    }
}

/// A stitched image and the angles it covers.
#[derive(Debug)]
pub struct CompositeImage {
    image: RgbImage,
    fov: AngularRect,
    failures: Vec<Error>,
}

impl CompositeImage {
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn fov(&self) -> &AngularRect {
        &self.fov
    }

    /// Tiles left blank because they could not be fetched or decoded.
    pub fn failures(&self) -> &[Error] {
        &self.failures
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Maps a viewing angle in degrees onto the pixel grid of the composite.
    ///
    /// Angles outside the composite map outside the image bounds.
    pub fn to_pixel_coordinates(&self, x: f64, y: f64) -> PixelPoint {
        let px = x.rem_euclid(180.0) + 180.0;
        let dx = self.fov.x.rem_euclid(180.0) + 180.0;
        let col = (px - dx) / self.fov.width * f64::from(self.width());

        let py = y.rem_euclid(90.0) + 90.0;
        let dy = 180.0 - self.fov.y.rem_euclid(90.0);
        let row = (1.0 + (py - dy) / self.fov.height) * f64::from(self.height());

        PixelPoint::new(col.floor() as i64, row.floor() as i64)
    }

    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, Error> {
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, quality).encode_image(&self.image)?;
        Ok(bytes)
    }
}

/// Pastes the tiles of an [`AngularGrid`] next to each other.
#[derive(Clone, Debug)]
pub struct TileStitcher {
    grid: AngularGrid,
    tile_width: u32,
    tile_height: u32,
}

impl TileStitcher {
    pub fn new(grid: AngularGrid, tile_width: u32, tile_height: u32) -> Self {
        Self {
            grid,
            tile_width,
            tile_height,
        }
    }

    /// Square tiles as rendered at `scale`.
    pub fn with_scale(grid: AngularGrid, scale: Scale) -> Self {
        Self::new(grid, scale.size(), scale.size())
    }

    pub fn grid(&self) -> &AngularGrid {
        &self.grid
    }

    /// Decodes and stitches `tiles`.
    ///
    /// Tiles that fail to decode stay black and are reported by
    /// [`CompositeImage::failures`].
    pub fn combine(&self, tiles: &[Tile]) -> Result<CompositeImage, Error> {
        let decoded = tiles
            .par_iter()
            .map(|tile| (tile.cell, decode(tile.cell.index(), &tile.bytes)))
            .collect();

        self.compose(decoded)
    }

    /// Fetches the tiles of `cells` from `source` and stitches them.
    ///
    /// A tile that cannot be fetched is treated like one that cannot be
    /// decoded.
    pub fn stitch<S>(&self, source: &S, cells: &[GridCell]) -> Result<CompositeImage, Error>
    where
        S: TileSource + Sync,
    {
        let decoded = cells
            .par_iter()
            .map(|cell| {
                let image = source
                    .fetch(cell)
                    .and_then(|bytes| decode(cell.index(), &bytes));
                (*cell, image)
            })
            .collect();

        self.compose(decoded)
    }

    fn compose(
        &self,
        tiles: Vec<(GridCell, Result<RgbImage, Error>)>,
    ) -> Result<CompositeImage, Error> {
        let tiles: Vec<_> = tiles
            .into_iter()
            .filter(|(cell, _)| {
                let known = self.grid.contains(cell);
                if !known {
                    log::warn!("skipping tile {} which is not part of the grid", cell.index());
                }
                known
            })
            .collect();

        if tiles.is_empty() {
            return Err(Error::EmptyComposite);
        }

        let rows: BTreeSet<usize> = tiles.iter().map(|(cell, _)| cell.y()).collect();
        let cols: BTreeSet<usize> = tiles.iter().map(|(cell, _)| cell.x()).collect();
        let row_map = positions(rows);
        let col_map = positions(seam_first(cols));
        let top = row_map.len() - 1;

        let fov = AngularRect::new(
            min_of(tiles.iter().map(|(cell, _)| cell.anchor_lon())),
            min_of(tiles.iter().map(|(cell, _)| cell.anchor_lat())),
            col_map.len() as f64 * self.grid.cell_width(),
            row_map.len() as f64 * self.grid.cell_height(),
        );

        let mut image = RgbImage::new(
            self.tile_width * col_map.len() as u32,
            self.tile_height * row_map.len() as u32,
        );
        let mut failures = Vec::new();

        for (cell, tile) in tiles {
            let tile = match tile {
                Ok(tile) => tile,
                Err(err) => {
                    log::error!("{err}. Leaving cell {} blank", cell.index());
                    failures.push(err);
                    continue;
                }
            };

            let (Some(&col), Some(&row)) = (col_map.get(&cell.x()), row_map.get(&cell.y()))
            else {
                continue;
            };
            let x = col as i64 * i64::from(self.tile_width);
            let y = (top - row) as i64 * i64::from(self.tile_height);
            imageops::replace(&mut image, &tile, x, y);
        }

        Ok(CompositeImage {
            image,
            fov,
            failures,
        })
    }
}

fn decode(index: usize, bytes: &[u8]) -> Result<RgbImage, Error> {
    image::load_from_memory(bytes)
        .map(|image| image.to_rgb8())
        .map_err(|source| Error::TileDecode { index, source })
}

/// Orders columns so a run crossing the antimeridian stays contiguous.
///
/// Whenever a gap shows up between ascending columns, the columns seen so far
/// move behind everything that follows.
fn seam_first(cols: BTreeSet<usize>) -> Vec<usize> {
    let mut head: Vec<usize> = Vec::new();
    let mut tail: Vec<usize> = Vec::new();

    for col in cols {
        if head.last().is_some_and(|&last| col - last > 1) {
            std::mem::swap(&mut head, &mut tail);
        }
        head.push(col);
    }

    head.extend(tail);
    head
}

/// Maps each value to its position in `values`.
fn positions(values: impl IntoIterator<Item = usize>) -> BTreeMap<usize, usize> {
    values
        .into_iter()
        .enumerate()
        .map(|(position, value)| (value, position))
        .collect()
}

fn min_of(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::AngularBounds;
    use approx::assert_relative_eq;
    use image::{DynamicImage, ImageFormat, Rgb};
    use quickcheck_macros::quickcheck;
    use rstest::rstest;
    use std::io::Cursor;

    fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let tile = RgbImage::from_pixel(width, height, Rgb(color));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(tile)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn tiles(grid: &AngularGrid, indices: &[usize]) -> Vec<Tile> {
        indices
            .iter()
            .map(|&index| Tile::new(*grid.cell(index).unwrap(), png(4, 4, [255, 0, 0])))
            .collect()
    }

    #[rstest]
    #[case(vec![3, 4, 5], vec![3, 4, 5])]
    #[case(vec![0, 1, 7], vec![7, 0, 1])]
    #[case(vec![0, 1, 5, 6, 7], vec![5, 6, 7, 0, 1])]
    #[case(vec![0, 1, 6, 7], vec![6, 7, 0, 1])]
    #[case(vec![2], vec![2])]
    fn column_order(#[case] cols: Vec<usize>, #[case] expected: Vec<usize>) {
        assert_eq!(seam_first(cols.into_iter().collect()), expected);
    }

    #[quickcheck]
    fn seam_order_keeps_every_column_once(cols: BTreeSet<u8>) -> bool {
        let cols: BTreeSet<usize> = cols.into_iter().map(usize::from).collect();
        let ordered = seam_first(cols.clone());

        // Two ascending runs at most, joined where the seam is.
        let descents = ordered.windows(2).filter(|pair| pair[1] < pair[0]).count();
        ordered.len() == cols.len()
            && ordered.iter().copied().collect::<BTreeSet<_>>() == cols
            && descents <= 1
    }

    #[test]
    fn single_cell() {
        let grid = AngularGrid::default();
        let composite = TileStitcher::new(grid.clone(), 1024, 1024)
            .combine(&tiles(&grid, &[3]))
            .unwrap();

        assert_eq!((composite.width(), composite.height()), (1024, 1024));
        assert_eq!(
            composite.fov(),
            &AngularRect::new(-45.0, 45.0, 45.0, 45.0)
        );
        assert_eq!(
            composite.to_pixel_coordinates(170.0, 0.0),
            PixelPoint::new(796, 0)
        );
    }

    #[test]
    fn wrapped_east() {
        let grid = AngularGrid::default();
        let query = AngularBounds::new(70.0, 246.0, 0.0, 90.0).unwrap();
        let cells = grid.filter(&query).unwrap();
        let indices: Vec<_> = cells.iter().map(GridCell::index).collect();

        let composite = TileStitcher::new(grid.clone(), 1024, 1024)
            .combine(&tiles(&grid, &indices))
            .unwrap();

        assert_eq!((composite.width(), composite.height()), (5120, 2048));
        assert_relative_eq!(composite.fov().x(), -180.0);
        assert_relative_eq!(composite.fov().y(), 0.0);
        assert_relative_eq!(composite.fov().width(), 225.0);
        assert_relative_eq!(composite.fov().height(), 90.0);
        assert_eq!(composite.to_pixel_coordinates(70.0, 0.0).x(), 1592);
    }

    #[test]
    fn wrapped_both_ways() {
        let grid = AngularGrid::default();
        let query = AngularBounds::longitudes(-240.0, 246.0).unwrap();
        let cells = grid.filter(&query).unwrap();
        assert_eq!(cells.len(), 16);

        let indices: Vec<_> = cells.iter().map(GridCell::index).collect();
        let composite = TileStitcher::new(grid.clone(), 1024, 1024)
            .combine(&tiles(&grid, &indices))
            .unwrap();

        assert_eq!((composite.width(), composite.height()), (4096, 4096));
        assert_eq!(
            composite.fov(),
            &AngularRect::new(-180.0, -90.0, 180.0, 180.0)
        );
        assert_eq!(composite.to_pixel_coordinates(-240.0, 0.0).x(), 2730);
    }

    #[test]
    fn whole_sphere() {
        let grid = AngularGrid::default();
        let indices: Vec<_> = (0..32).collect();
        let composite = TileStitcher::new(grid.clone(), 8, 8)
            .combine(&tiles(&grid, &indices))
            .unwrap();

        assert_eq!((composite.width(), composite.height()), (64, 32));
        assert_eq!(composite.to_pixel_coordinates(0.0, 0.0).x(), 0);
        assert!(!composite.is_partial());
    }

    #[test]
    fn nothing_to_stitch() {
        let stitcher = TileStitcher::with_scale(AngularGrid::default(), Scale::Px256);
        assert!(matches!(stitcher.combine(&[]), Err(Error::EmptyComposite)));
    }

    #[test]
    fn foreign_cells_are_skipped() {
        let small = AngularGrid::new(AngularBounds::whole_sphere(), 1, 2).unwrap();
        let stitcher = TileStitcher::new(AngularGrid::default(), 4, 4);
        assert!(matches!(
            stitcher.combine(&tiles(&small, &[1])),
            Err(Error::EmptyComposite)
        ));
    }

    #[test]
    fn jpeg_output() {
        let grid = AngularGrid::default();
        let composite = TileStitcher::new(grid.clone(), 4, 4)
            .combine(&tiles(&grid, &[0, 1]))
            .unwrap();

        let bytes = composite.encode_jpeg(90).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
