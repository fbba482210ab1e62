//! Map entities as handed over by the data layer: geometry already resolved
//! to coordinates, plus tags.

use crate::bounding_box::BoundingBox;
use crate::scheme::Scheme;
use crate::tags::Tags;

pub type EntityId = i64;

/// WGS84 position in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        GeoPoint { lat, lon }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Node,
    Way,
    Area,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Point(GeoPoint),
    Line(Vec<GeoPoint>),
    Polygon {
        outers: Vec<Vec<GeoPoint>>,
        inners: Vec<Vec<GeoPoint>>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub geometry: Geometry,
    pub tags: Tags,
}

impl Entity {
    pub fn node(id: EntityId, position: GeoPoint, tags: Tags) -> Self {
        Entity {
            id,
            geometry: Geometry::Point(position),
            tags,
        }
    }

    pub fn way(id: EntityId, points: Vec<GeoPoint>, tags: Tags) -> Self {
        Entity {
            id,
            geometry: Geometry::Line(points),
            tags,
        }
    }

    pub fn area(
        id: EntityId,
        outers: Vec<Vec<GeoPoint>>,
        inners: Vec<Vec<GeoPoint>>,
        tags: Tags,
    ) -> Self {
        Entity {
            id,
            geometry: Geometry::Polygon { outers, inners },
            tags,
        }
    }

    /// An OSM way. A closed way becomes an area when tagged `area=yes`, or
    /// when the scheme's area tags match and it is not tagged `area=no`.
    pub fn from_way(id: EntityId, points: Vec<GeoPoint>, tags: Tags, scheme: &Scheme) -> Self {
        let closed = points.len() > 3 && points.first() == points.last();
        let area = match tags.get("area").map(String::as_str) {
            Some("yes") => true,
            Some("no") => false,
            _ => scheme.is_area(&tags),
        };
        if closed && area {
            Entity::area(id, vec![points], Vec::new(), tags)
        } else {
            Entity::way(id, points, tags)
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self.geometry {
            Geometry::Point(_) => EntityKind::Node,
            Geometry::Line(_) => EntityKind::Way,
            Geometry::Polygon { .. } => EntityKind::Area,
        }
    }

    pub fn get_tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    fn points(&self) -> Box<dyn Iterator<Item = &GeoPoint> + '_> {
        match &self.geometry {
            Geometry::Point(point) => Box::new(std::iter::once(point)),
            Geometry::Line(points) => Box::new(points.iter()),
            Geometry::Polygon { outers, .. } => Box::new(outers.iter().flatten()),
        }
    }

    /// Position icons and point-like generators are anchored at: the node
    /// itself, the middle vertex of a way, or the vertex mean of the first
    /// outer ring of an area.
    pub fn anchor(&self) -> Option<GeoPoint> {
        match &self.geometry {
            Geometry::Point(point) => Some(*point),
            Geometry::Line(points) => points.get(points.len() / 2).copied(),
            Geometry::Polygon { outers, .. } => {
                let ring = outers.first()?;
                let ring = match ring.as_slice() {
                    [first, .., last] if first == last => &ring[..ring.len() - 1],
                    _ => ring.as_slice(),
                };
                if ring.is_empty() {
                    return None;
                }
                let count = ring.len() as f64;
                let (lat, lon) = ring
                    .iter()
                    .fold((0.0, 0.0), |(lat, lon), point| (lat + point.lat, lon + point.lon));
                Some(GeoPoint::new(lat / count, lon / count))
            }
        }
    }

    /// Whether any part of the entity's extent overlaps `bounding_box`.
    pub fn intersects(&self, bounding_box: &BoundingBox) -> bool {
        let mut points = self.points().peekable();
        if points.peek().is_none() {
            return false;
        }
        let (mut left, mut bottom) = (f64::INFINITY, f64::INFINITY);
        let (mut right, mut top) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for point in points {
            left = left.min(point.lon);
            right = right.max(point.lon);
            bottom = bottom.min(point.lat);
            top = top.max(point.lat);
        }
        left <= bounding_box.right
            && right >= bounding_box.left
            && bottom <= bounding_box.top
            && top >= bounding_box.bottom
    }
}
