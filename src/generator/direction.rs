//! Direction sectors for `direction`-like tags.
//!
//! Bearings are in degrees, 0 is north and angles grow clockwise. On screen
//! `y` grows downwards, so a bearing `b` points along `(sin b, -cos b)`.

use serde::Deserialize;
use tracing::warn;

use crate::color::DEFAULT_COLOR;
use crate::drawing::{Paint, PaintStyle, Primitive, RadialGradient};
use crate::entity::Entity;
use crate::geometry::Point;
use crate::path::PathCommand;
use crate::tags::{parse_float, Tags};

use super::{GeneratorContext, GeneratorDirective};

/// Sector width when no angle is tagged, in degrees.
pub const DEFAULT_ANGLE: f64 = 15.0;

/// Sector radius in pixels when the rule sets none.
pub const DEFAULT_RADIUS: f64 = 50.0;

const DIRECTION_KEYS: [&str; 2] = ["direction", "camera:direction"];
const ANGLE_KEYS: [&str; 2] = ["camera:angle", "angle"];

pub(super) const INPUT_KEYS: &[&str] = &["direction", "camera:direction", "camera:angle", "angle"];

const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// How a sector fades.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gradient {
    /// Strongest at the center, fading towards the rim.
    Outward,
    /// Transparent at the center, strongest at the rim.
    Inward,
}

impl Gradient {
    /// Opacity at the center and at the rim.
    pub fn opacities(&self) -> (f64, f64) {
        match self {
            Gradient::Outward => (0.4, 0.0),
            Gradient::Inward => (0.0, 0.7),
        }
    }
}

/// Parses a bearing in degrees or as one of the 16 compass points.
pub fn parse_bearing(text: &str) -> Option<f64> {
    let text = text.trim();
    if let Ok(degrees) = parse_float("direction", text) {
        return Some(degrees.rem_euclid(360.0));
    }
    COMPASS_POINTS
        .iter()
        .position(|point| point.eq_ignore_ascii_case(text))
        .map(|index| index as f64 * 22.5)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sector {
    Full,
    /// Clockwise from `start` to `end`; `end - start` is in `(0, 360)`.
    Arc { start: f64, end: f64 },
}

impl Sector {
    /// Parses one sector: `all`, a range `from-to`, or a single bearing
    /// widened to `angle` degrees.
    pub fn parse(text: &str, angle: f64) -> Option<Sector> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("all") {
            return Some(Sector::Full);
        }

        if let Some((from, to)) = text.split_once('-').filter(|(from, _)| !from.is_empty()) {
            let from_degrees = parse_float("direction", from).ok();
            let to_degrees = parse_float("direction", to).ok();
            if let (Some(from), Some(to)) = (from_degrees, to_degrees) {
                if to - from >= 360.0 {
                    return Some(Sector::Full);
                }
            }
            let start = parse_bearing(from)?;
            let mut end = parse_bearing(to)?;
            if end <= start {
                end += 360.0;
            }
            return Some(Sector::Arc { start, end });
        }

        let bearing = parse_bearing(text)?;
        if angle >= 360.0 {
            return Some(Sector::Full);
        }
        Some(Sector::Arc {
            start: bearing - angle / 2.0,
            end: bearing + angle / 2.0,
        })
    }

    /// `Some(true)` when the sector looks to the right half of the screen,
    /// `Some(false)` for the left half, `None` when it is vertical or full.
    pub fn is_right(&self) -> Option<bool> {
        match self {
            Sector::Full => None,
            Sector::Arc { start, end } => {
                let x = ((start + end) / 2.0).to_radians().sin();
                if x.abs() < 1e-9 {
                    None
                } else {
                    Some(x > 0.0)
                }
            }
        }
    }

    pub fn path(&self, center: Point, radius: f64) -> Vec<PathCommand> {
        let (start, end) = match self {
            Sector::Full => (0.0, 360.0),
            Sector::Arc { start, end } => (*start, *end),
        };
        let rim = |bearing: f64| {
            let radians = bearing.to_radians();
            center + Point::new(radians.sin(), -radians.cos()) * radius
        };
        vec![
            PathCommand::MoveTo(center),
            PathCommand::LineTo(rim(start)),
            PathCommand::ArcTo {
                radii: Point::new(radius, radius),
                rotation: 0.0,
                large_arc: end - start > 180.0,
                sweep: true,
                to: rim(end),
            },
            PathCommand::Close,
        ]
    }
}

/// The sectors of a `;`-separated direction value.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectionSet {
    pub sectors: Vec<Sector>,
}

impl DirectionSet {
    /// Parses every part that can be parsed; `None` when nothing can.
    pub fn parse(text: &str, angle: Option<f64>) -> Option<DirectionSet> {
        let angle = angle.filter(|angle| *angle > 0.0).unwrap_or(DEFAULT_ANGLE);
        let sectors: Vec<Sector> = text
            .split(';')
            .filter_map(|part| {
                let sector = Sector::parse(part, angle);
                if sector.is_none() {
                    warn!("cannot parse direction `{}`", part);
                }
                sector
            })
            .collect();
        if sectors.is_empty() {
            None
        } else {
            Some(DirectionSet { sectors })
        }
    }

    /// Reads the direction and angle tags.
    pub fn from_tags(tags: &Tags) -> Option<DirectionSet> {
        let text = DIRECTION_KEYS.iter().find_map(|key| tags.get(*key))?;
        let angle = ANGLE_KEYS.iter().find_map(|key| {
            let value = tags.get(*key)?;
            parse_float(key, value)
                .map_err(|error| warn!("{}", error))
                .ok()
        });
        DirectionSet::parse(text, angle)
    }

    /// Whether all sectors agree on looking right or left.
    pub fn is_right(&self) -> Option<bool> {
        let first = self.sectors.first()?.is_right()?;
        if self.sectors.iter().all(|sector| sector.is_right() == Some(first)) {
            Some(first)
        } else {
            None
        }
    }
}

pub fn generate(
    directive: &GeneratorDirective,
    entity: &Entity,
    context: &GeneratorContext<'_>,
) -> Vec<Primitive> {
    let Some(anchor) = entity.anchor() else {
        return Vec::new();
    };
    let Some(directions) = DirectionSet::from_tags(&directive.inputs) else {
        return Vec::new();
    };

    let center = context.flinger.fling(anchor);
    let params = &directive.params;
    let radius = params.radius.unwrap_or(DEFAULT_RADIUS);
    let (inner_opacity, outer_opacity) = params.gradient.unwrap_or(Gradient::Inward).opacities();
    let style = PaintStyle {
        fill: Paint::Radial(RadialGradient {
            center,
            radius,
            color: params.color.unwrap_or(DEFAULT_COLOR),
            inner_opacity,
            outer_opacity,
        }),
        ..Default::default()
    };

    directions
        .sectors
        .iter()
        .map(|sector| match sector {
            Sector::Full => Primitive::Circle {
                center,
                radius,
                style: style.clone(),
            },
            Sector::Arc { .. } => Primitive::Path {
                commands: sector.path(center, radius),
                style: style.clone(),
            },
        })
        .collect()
}
