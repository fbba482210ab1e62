//! Slippy-map tiles and tile sets covering a bounding box.
//!
//! Tile coordinates follow https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames:
//! at zoom `z` there are `2^z × 2^z` tiles, `x` grows eastwards and `y` grows
//! southwards, so the north edge of a box lands on the smallest `y`.

use std::fmt;

use slippy_map_tilenames::{lonlat2tile, tile2lonlat};

use crate::bounding_box::{BoundingBox, MAX_LATITUDE};
use crate::entity::GeoPoint;
use crate::error::{Error, Result};
use crate::flinger::Flinger;

/// Deepest zoom level tiles are computed for.
pub const MAX_ZOOM: u8 = 24;

/// Fractional tile coordinates closer than this to an integer are treated as
/// lying on the tile edge.
const EDGE_TOLERANCE: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tile {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl Tile {
    pub fn new(zoom: u8, x: u32, y: u32) -> Self {
        Tile { zoom, x, y }
    }

    /// The tile containing `point`.
    pub fn from_coordinates(point: GeoPoint, zoom: u8) -> Self {
        let (x, y) = lonlat2tile(point.lon, point.lat, zoom);
        Tile { zoom, x, y }
    }

    /// Geographic position of the north-west corner.
    pub fn north_west(&self) -> GeoPoint {
        let (lon, lat) = tile2lonlat(self.x, self.y, self.zoom);
        GeoPoint::new(lat, lon)
    }

    /// Exact geographic extent of the tile.
    pub fn bounding_box(&self) -> BoundingBox {
        rectangle_bounding_box(self.zoom, (self.x, self.y), (self.x, self.y))
    }

    /// Extent of the tile rounded to three decimals and grown by a small
    /// margin, for loading the data of neighbouring features too.
    pub fn extended_bounding_box(&self) -> BoundingBox {
        self.bounding_box().extended()
    }

    /// All tiles at the deeper `zoom` covering this tile.
    pub fn subdivide(&self, zoom: u8) -> Result<Vec<Tile>> {
        if zoom < self.zoom || zoom > MAX_ZOOM {
            return Err(Error::InvalidZoom(format!(
                "cannot subdivide a zoom {} tile to zoom {}",
                self.zoom, zoom
            )));
        }
        let factor = 1u32 << (zoom - self.zoom);
        let mut tiles = Vec::with_capacity((factor * factor) as usize);
        for x in self.x * factor..(self.x + 1) * factor {
            for y in self.y * factor..(self.y + 1) * factor {
                tiles.push(Tile { zoom, x, y });
            }
        }
        Ok(tiles)
    }

    pub fn file_name(&self) -> String {
        format!("tile_{}_{}_{}.svg", self.zoom, self.x, self.y)
    }

    /// What a backend needs to render this tile into one file.
    pub fn descriptor(&self) -> TileDescriptor {
        let bounding_box = self.bounding_box();
        let size = Flinger::new(bounding_box, self.zoom as f64).size();
        TileDescriptor {
            tile: *self,
            bounding_box,
            width: size.x.round() as u32,
            height: size.y.round() as u32,
        }
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// One tile to render: its address, the geographic area it shows and its
/// pixel dimensions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileDescriptor {
    pub tile: Tile,
    pub bounding_box: BoundingBox,
    pub width: u32,
    pub height: u32,
}

/// Rectangle of tiles at one zoom level, bounds inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileSet {
    pub zoom: u8,
    pub min: (u32, u32),
    pub max: (u32, u32),
}

impl TileSet {
    pub fn len(&self) -> usize {
        ((self.max.0 - self.min.0 + 1) as usize) * ((self.max.1 - self.min.1 + 1) as usize)
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, tile: &Tile) -> bool {
        tile.zoom == self.zoom
            && (self.min.0..=self.max.0).contains(&tile.x)
            && (self.min.1..=self.max.1).contains(&tile.y)
    }

    /// Tiles column by column, north to south.
    pub fn tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        (self.min.0..=self.max.0)
            .flat_map(move |x| (self.min.1..=self.max.1).map(move |y| Tile::new(self.zoom, x, y)))
    }

    /// Exact geographic union of the tiles.
    pub fn bounding_box(&self) -> BoundingBox {
        rectangle_bounding_box(self.zoom, self.min, self.max)
    }

    /// Union of the tiles rounded to three decimals and grown by a small
    /// margin.
    pub fn extended_bounding_box(&self) -> BoundingBox {
        self.bounding_box().extended()
    }

    pub fn descriptors(&self) -> Vec<TileDescriptor> {
        self.tiles().map(|tile| tile.descriptor()).collect()
    }
}

fn check_zoom(zoom: u8) -> Result<()> {
    if zoom > MAX_ZOOM {
        return Err(Error::InvalidZoom(format!("zoom {} is above {}", zoom, MAX_ZOOM)));
    }
    Ok(())
}

/// Fractional Web-Mercator tile coordinates.
fn fractional_tile(lon: f64, lat: f64, zoom: u8) -> (f64, f64) {
    let scale = 2f64.powi(zoom as i32);
    let x = (lon + 180.0) / 360.0 * scale;
    let y = (1.0 - lat.to_radians().tan().asinh() / std::f64::consts::PI) / 2.0 * scale;
    (x, y)
}

fn snap(value: f64) -> f64 {
    let rounded = value.round();
    if (value - rounded).abs() < EDGE_TOLERANCE {
        rounded
    } else {
        value
    }
}

/// Index range `[first, last]` of the tiles spanning `[min, max)`. A bound
/// lying on a tile edge does not pull in the tile beyond it.
fn index_range(min: f64, max: f64, tile_count: u32) -> (u32, u32) {
    let last_index = (tile_count - 1) as f64;
    let first = snap(min).floor().clamp(0.0, last_index);
    let last = (snap(max).ceil() - 1.0).clamp(first, last_index);
    (first as u32, last as u32)
}

fn rectangle_bounding_box(zoom: u8, min: (u32, u32), max: (u32, u32)) -> BoundingBox {
    let (left, top) = tile2lonlat(min.0, min.1, zoom);
    let (right, bottom) = tile2lonlat(max.0 + 1, max.1 + 1, zoom);
    BoundingBox {
        left: left.max(-180.0),
        bottom: bottom.max(-MAX_LATITUDE),
        right: right.min(180.0),
        top: top.min(MAX_LATITUDE),
    }
}

/// The smallest rectangle of tiles at `zoom` covering `bounding_box`.
pub fn tiles_for(bounding_box: &BoundingBox, zoom: u8) -> Result<TileSet> {
    check_zoom(zoom)?;
    let tile_count = 1u32 << zoom;

    let (min_x, min_y) = fractional_tile(bounding_box.left, bounding_box.top, zoom);
    let (max_x, max_y) = fractional_tile(bounding_box.right, bounding_box.bottom, zoom);
    let (first_x, last_x) = index_range(min_x, max_x, tile_count);
    let (first_y, last_y) = index_range(min_y, max_y, tile_count);

    let tile_set = TileSet {
        zoom,
        min: (first_x, first_y),
        max: (last_x, last_y),
    };
    tracing::debug!(
        "{} tiles at zoom {} cover {}",
        tile_set.len(),
        zoom,
        bounding_box
    );
    Ok(tile_set)
}

/// The geographic box exactly covered by `tiles_for(bounding_box, zoom)`.
pub fn minimal_bbox_for(bounding_box: &BoundingBox, zoom: u8) -> Result<BoundingBox> {
    Ok(tiles_for(bounding_box, zoom)?.bounding_box())
}

/// One independent tile set per requested zoom level.
pub fn tile_sets_for(bounding_box: &BoundingBox, zooms: &[u8]) -> Result<Vec<TileSet>> {
    zooms.iter().map(|zoom| tiles_for(bounding_box, *zoom)).collect()
}

/// Parses a zoom specification: one level (`18`), an inclusive span
/// (`16-18`) or a comma-separated list (`16,18`).
pub fn parse_zoom_levels(text: &str) -> Result<Vec<u8>> {
    let invalid = || Error::InvalidZoom(format!("cannot parse zoom levels `{}`", text));
    let parse = |part: &str| -> Result<u8> {
        let zoom = part.trim().parse::<u8>().map_err(|_| invalid())?;
        check_zoom(zoom)?;
        Ok(zoom)
    };

    let zooms = if let Some((from, to)) = text.split_once('-') {
        let (from, to) = (parse(from)?, parse(to)?);
        if from > to {
            return Err(invalid());
        }
        (from..=to).collect()
    } else {
        text.split(',').map(parse).collect::<Result<Vec<u8>>>()?
    };
    Ok(zooms)
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    fn paris() -> BoundingBox {
        BoundingBox::new(2.284, 48.860, 2.290, 48.865).unwrap()
    }

    #[test]
    fn test_tile_from_coordinates() {
        let tile = Tile::from_coordinates(GeoPoint::new(48.862, 2.287), 18);
        let bounding_box = tile.bounding_box();
        assert!(bounding_box.left <= 2.287 && 2.287 < bounding_box.right);
        assert!(bounding_box.bottom < 48.862 && 48.862 <= bounding_box.top);
        assert_eq!("tile_18_132736_90150.svg", Tile::new(18, 132736, 90150).file_name());
    }

    #[test]
    fn test_north_west() {
        let corner = Tile::new(1, 1, 1).north_west();
        assert_approx_eq!(0.0, corner.lat);
        assert_approx_eq!(0.0, corner.lon);
        let top = Tile::new(0, 0, 0).north_west();
        assert_approx_eq!(MAX_LATITUDE, top.lat, 1e-6);
    }

    #[test]
    fn test_paris_tiles_strictly_contain_box() {
        let tile_set = tiles_for(&paris(), 18).unwrap();
        assert!(tile_set.len() > 1);
        assert!(tile_set.bounding_box().strictly_contains(&paris()));
        assert!(tile_set.extended_bounding_box().contains(&tile_set.bounding_box()));
    }

    #[test]
    fn test_tiles_for_is_idempotent() {
        for zoom in [0, 5, 12, 16, 18, 20] {
            let tile_set = tiles_for(&paris(), zoom).unwrap();
            let snapped = minimal_bbox_for(&paris(), zoom).unwrap();
            assert_eq!(tile_set, tiles_for(&snapped, zoom).unwrap(), "zoom {}", zoom);
        }
    }

    #[test]
    fn test_latitude_inverts_y() {
        let tile_set = tiles_for(&paris(), 18).unwrap();
        let north = Tile::from_coordinates(GeoPoint::new(48.865, 2.284), 18);
        let south = Tile::from_coordinates(GeoPoint::new(48.860, 2.284), 18);
        assert_eq!(tile_set.min.1, north.y);
        assert_eq!(tile_set.max.1, south.y);
        assert!(tile_set.contains(&north));
    }

    #[test]
    fn test_subdivide() {
        let tile = Tile::new(16, 33184, 22537);
        let tiles = tile.subdivide(18).unwrap();
        assert_eq!(16, tiles.len());
        assert!(tiles.iter().all(|sub| tile.bounding_box().contains(&sub.bounding_box())));
        assert_eq!(vec![tile], tile.subdivide(16).unwrap());
        assert!(tile.subdivide(15).is_err());
    }

    #[test]
    fn test_descriptor_size() {
        let descriptor = Tile::new(18, 132736, 90150).descriptor();
        assert_eq!(256, descriptor.width);
        assert_eq!(256, descriptor.height);
    }

    #[test]
    fn test_parse_zoom_levels() {
        assert_eq!(vec![18], parse_zoom_levels("18").unwrap());
        assert_eq!(vec![16, 17, 18], parse_zoom_levels("16-18").unwrap());
        assert_eq!(vec![16, 18], parse_zoom_levels("16, 18").unwrap());
        assert!(parse_zoom_levels("18-16").is_err());
        assert!(parse_zoom_levels("25").is_err());
        assert!(parse_zoom_levels("high").is_err());
    }

    #[test]
    fn test_tile_sets_are_independent() {
        let tile_sets = tile_sets_for(&paris(), &[16, 18]).unwrap();
        assert_eq!(2, tile_sets.len());
        assert_eq!(16, tile_sets[0].zoom);
        assert!(tile_sets[0].len() <= tile_sets[1].len());
    }
}
