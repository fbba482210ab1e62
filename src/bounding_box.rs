//! Geographic bounding boxes.

use std::fmt;

use crate::error::{Error, Result};

/// Latitude limit of the Web-Mercator projection.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_6;

/// Largest extent accepted from textual input, in degrees.
pub const MAX_TEXT_EXTENT: f64 = 0.5;

/// Margin added around snapped boxes, in degrees.
pub const MARGIN: f64 = 0.001;

/// Rectangle in WGS84 degrees. Always satisfies `left < right` and
/// `bottom < top`; boxes crossing the antimeridian or reaching beyond the
/// Mercator latitude limit are never constructed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Minimum longitude.
    pub left: f64,
    /// Minimum latitude.
    pub bottom: f64,
    /// Maximum longitude.
    pub right: f64,
    /// Maximum latitude.
    pub top: f64,
}

impl BoundingBox {
    pub fn new(left: f64, bottom: f64, right: f64, top: f64) -> Result<BoundingBox> {
        let invalid = |reason: String| Err(Error::InvalidBoundingBox(reason));

        if ![left, bottom, right, top].iter().all(|value| value.is_finite()) {
            return invalid(String::from("coordinates must be finite"));
        }
        if left >= right {
            return invalid(format!(
                "minimum longitude {} is not less than maximum {}",
                left, right
            ));
        }
        if bottom >= top {
            return invalid(format!("minimum latitude {} is not less than maximum {}", bottom, top));
        }
        if left < -180.0 || right > 180.0 {
            return invalid(String::from("longitudes must stay within [-180, 180]"));
        }
        if bottom < -MAX_LATITUDE || top > MAX_LATITUDE {
            return invalid(format!("latitudes must stay within ±{}", MAX_LATITUDE));
        }

        Ok(BoundingBox {
            left,
            bottom,
            right,
            top,
        })
    }

    /// Parses `<left>,<bottom>,<right>,<top>`. Boxes from text may span at
    /// most `MAX_TEXT_EXTENT` degrees on each axis.
    pub fn from_text(text: &str) -> Result<BoundingBox> {
        let values = text
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<f64>, _>>()
            .map_err(|_| Error::InvalidBoundingBox(format!("cannot parse `{}`", text)))?;
        let [left, bottom, right, top] = values[..] else {
            return Err(Error::InvalidBoundingBox(format!(
                "expected four comma-separated numbers, got `{}`",
                text
            )));
        };

        let bounding_box = BoundingBox::new(left, bottom, right, top)?;
        if right - left > MAX_TEXT_EXTENT || top - bottom > MAX_TEXT_EXTENT {
            return Err(Error::InvalidBoundingBox(String::from("bounding box is too big")));
        }
        Ok(bounding_box)
    }

    /// The box rounded to three decimals and grown by `MARGIN` on every side,
    /// clamped to the valid coordinate range.
    pub fn extended(&self) -> BoundingBox {
        let round = |value: f64| (value * 1000.0).round() / 1000.0;
        BoundingBox {
            left: (round(self.left) - MARGIN).max(-180.0),
            bottom: (round(self.bottom) - MARGIN).max(-MAX_LATITUDE),
            right: (round(self.right) + MARGIN).min(180.0),
            top: (round(self.top) + MARGIN).min(MAX_LATITUDE),
        }
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.bottom + self.top) / 2.0, (self.left + self.right) / 2.0)
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.left <= other.left
            && self.bottom <= other.bottom
            && self.right >= other.right
            && self.top >= other.top
    }

    /// Contains `other` and is larger than it.
    pub fn strictly_contains(&self, other: &BoundingBox) -> bool {
        self.contains(other) && self != other
    }

    /// Text form `<left>,<bottom>,<right>,<top>` rounded outwards to three
    /// decimals, e.g. for naming cached data files.
    pub fn format(&self) -> String {
        format!(
            "{:.3},{:.3},{:.3},{:.3}",
            (self.left * 1000.0).floor() / 1000.0,
            (self.bottom * 1000.0).floor() / 1000.0,
            (self.right * 1000.0).ceil() / 1000.0,
            (self.top * 1000.0).ceil() / 1000.0
        )
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.left, self.bottom, self.right, self.top)
    }
}
