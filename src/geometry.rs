//! Plane geometry in output (pixel) space.

use std::ops::{Add, Mul, Neg, Sub};

use serde::Deserialize;

/// A point or vector in output coordinates; `y` grows downwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
#[serde(from = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn dot(&self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Unit vector with the same direction, or zero for a zero vector.
    pub fn normalized(&self) -> Point {
        let length = self.length();
        if length == 0.0 {
            return Point::default();
        }
        Point::new(self.x / length, self.y / length)
    }

    /// The vector rotated by 90 degrees.
    pub fn perpendicular(&self) -> Point {
        Point::new(-self.y, self.x)
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Point::new(x, y)
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, factor: f64) -> Point {
        Point::new(self.x * factor, self.y * factor)
    }
}

impl Neg for Point {
    type Output = Point;

    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

/// Shoelace signed area. Positive when the ring turns from +x towards +y.
pub fn signed_area(ring: &[Point]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for (i, point) in ring.iter().enumerate() {
        let next = ring[(i + 1) % ring.len()];
        area += point.x * next.y - next.x * point.y;
    }
    area / 2.0
}

/// Mean of the distinct vertices, ignoring a closing duplicate.
pub fn centroid(points: &[Point]) -> Option<Point> {
    let points = match points {
        [first, .., last] if first == last && points.len() > 1 => &points[..points.len() - 1],
        _ => points,
    };
    if points.is_empty() {
        return None;
    }
    let sum = points.iter().fold(Point::default(), |sum, point| sum + *point);
    Some(sum * (1.0 / points.len() as f64))
}

/// Consecutive segments of a ring, closing it if the last vertex does not
/// repeat the first.
pub fn ring_segments(ring: &[Point]) -> Vec<(Point, Point)> {
    let mut segments: Vec<(Point, Point)> =
        ring.windows(2).map(|pair| (pair[0], pair[1])).collect();
    if let (Some(first), Some(last)) = (ring.first(), ring.last()) {
        if ring.len() > 2 && first != last {
            segments.push((*last, *first));
        }
    }
    segments.retain(|(a, b)| a != b);
    segments
}

/// Longest miter allowed when offsetting polylines, as a multiple of the
/// offset distance.
const MITER_LIMIT: f64 = 4.0;

/// Polyline shifted sideways by `distance`; positive distances move to the
/// left of the direction of travel when `y` grows downwards.
pub fn offset_polyline(points: &[Point], distance: f64) -> Vec<Point> {
    let mut points = points.to_vec();
    points.dedup();
    if points.len() < 2 {
        return points;
    }

    let normals: Vec<Point> = points
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).normalized().perpendicular() * -1.0)
        .collect();

    let mut result = Vec::with_capacity(points.len());
    for (i, point) in points.iter().enumerate() {
        let normal = if i == 0 {
            normals[0]
        } else if i == points.len() - 1 {
            normals[i - 1]
        } else {
            let bisector = (normals[i - 1] + normals[i]).normalized();
            let cosine = bisector.dot(normals[i]);
            if cosine.abs() < 1.0 / MITER_LIMIT {
                normals[i]
            } else {
                bisector * (1.0 / cosine)
            }
        };
        result.push(*point + normal * distance);
    }
    result
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ]
    }

    #[test]
    fn test_signed_area_and_centroid() {
        assert_approx_eq!(1.0, signed_area(&square()));
        let mut reversed = square();
        reversed.reverse();
        assert_approx_eq!(-1.0, signed_area(&reversed));

        let mut closed = square();
        closed.push(Point::new(0.0, 0.0));
        assert_eq!(Some(Point::new(0.5, 0.5)), centroid(&closed));
        assert_eq!(None, centroid(&[]));
    }

    #[test]
    fn test_ring_segments_close_the_ring() {
        assert_eq!(4, ring_segments(&square()).len());
        let mut closed = square();
        closed.push(Point::new(0.0, 0.0));
        assert_eq!(4, ring_segments(&closed).len());
    }

    #[test]
    fn test_offset_straight_line() {
        let line = vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)];
        let shifted = offset_polyline(&line, 2.0);
        assert_approx_eq!(-2.0, shifted[0].y);
        assert_approx_eq!(-2.0, shifted[1].y);
        assert_approx_eq!(10.0, shifted[1].x);
    }

    #[test]
    fn test_offset_keeps_distance_at_corners() {
        let line = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
        ];
        let shifted = offset_polyline(&line, 1.0);
        assert_approx_eq!(11.0, shifted[1].x);
        assert_approx_eq!(-1.0, shifted[1].y);
    }
}
