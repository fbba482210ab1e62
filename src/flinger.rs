//! Geo to pixel projection.

use crate::bounding_box::BoundingBox;
use crate::entity::GeoPoint;
use crate::geometry::Point;

/// Length of the equator in metres.
pub const EARTH_EQUATOR_LENGTH: f64 = 40_075_017.0;

/// Pixel side of one slippy-map tile.
pub const TILE_SIZE: f64 = 256.0;

/// Pseudo-Mercator projection of a position, in degree-like units.
fn pseudo_mercator(point: GeoPoint) -> Point {
    let y = (std::f64::consts::FRAC_PI_4 + point.lat.to_radians() / 2.0)
        .tan()
        .ln()
        .to_degrees();
    Point::new(point.lon, y)
}

/// Maps geographic positions inside a bounding box onto a pixel canvas for a
/// zoom level. The canvas origin is the north-west corner of the box and `y`
/// grows southwards.
#[derive(Clone, Debug)]
pub struct Flinger {
    bounding_box: BoundingBox,
    zoom: f64,
    ratio: f64,
    size: Point,
    origin: Point,
    pixels_per_meter: f64,
}

impl Flinger {
    pub fn new(bounding_box: BoundingBox, zoom: f64) -> Self {
        let ratio = 2f64.powf(zoom) * TILE_SIZE / 360.0;
        let origin = pseudo_mercator(GeoPoint::new(bounding_box.bottom, bounding_box.left));
        let corner = pseudo_mercator(GeoPoint::new(bounding_box.top, bounding_box.right));
        let size = (corner - origin) * ratio;

        Flinger {
            bounding_box,
            zoom,
            ratio,
            size,
            origin,
            pixels_per_meter: 2f64.powf(zoom) / EARTH_EQUATOR_LENGTH * TILE_SIZE,
        }
    }

    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Canvas size in pixels.
    pub fn size(&self) -> Point {
        self.size
    }

    pub fn fling(&self, point: GeoPoint) -> Point {
        let projected = (pseudo_mercator(point) - self.origin) * self.ratio;
        Point::new(projected.x, self.size.y - projected.y)
    }

    pub fn fling_all(&self, points: &[GeoPoint]) -> Vec<Point> {
        points.iter().map(|point| self.fling(*point)).collect()
    }

    /// Pixels per metre at the latitude of `point`.
    pub fn scale(&self, point: GeoPoint) -> f64 {
        self.pixels_per_meter / point.lat.to_radians().cos().abs()
    }

    /// Pixels per metre at the center of the bounding box.
    pub fn central_scale(&self) -> f64 {
        let (lat, lon) = self.bounding_box.center();
        self.scale(GeoPoint::new(lat, lon))
    }
}
