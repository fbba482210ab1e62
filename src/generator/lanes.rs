//! Lane separators along roads.

use tracing::warn;

use crate::color::DEFAULT_COLOR;
use crate::drawing::{polyline, PaintStyle, Primitive};
use crate::entity::{Entity, Geometry};
use crate::geometry::offset_polyline;
use crate::tags::{get_float, get_length, parse_length, MalformedTagValue, Tags};

use super::{GeneratorContext, GeneratorDirective};

/// Assumed width of one lane, in metres.
pub const DEFAULT_LANE_WIDTH: f64 = 3.7;

/// Lane counts above this are treated as malformed.
pub const MAX_LANES: usize = 20;

const SEPARATOR_OPACITY: f64 = 0.5;
const SEPARATOR_DASH: [f64; 2] = [4.0, 4.0];

/// Lanes of one road, widths in metres.
#[derive(Clone, Debug, PartialEq)]
pub struct LaneLayout {
    pub width: f64,
    pub lane_widths: Vec<f64>,
}

impl LaneLayout {
    /// Reads `lanes`, `width` and `width:lanes`. `None` without a usable
    /// lane count.
    pub fn from_tags(tags: &Tags) -> Option<LaneLayout> {
        let count = lane_count(tags)?;
        let lanes = count as f64;

        if let Some(lane_widths) = tags
            .get("width:lanes")
            .and_then(|value| per_lane(value, count))
        {
            return Some(LaneLayout {
                width: lane_widths.iter().sum(),
                lane_widths,
            });
        }

        let width = get_length(tags, "width")
            .filter(|width| *width > 0.0)
            .unwrap_or(lanes * DEFAULT_LANE_WIDTH);
        Some(LaneLayout {
            width,
            lane_widths: vec![width / lanes; count],
        })
    }

    /// Offsets of the separators from the centerline, left positive.
    pub fn separator_offsets(&self) -> Vec<f64> {
        let mut offsets = Vec::with_capacity(self.lane_widths.len().saturating_sub(1));
        let mut offset = self.width / 2.0;
        for lane_width in self.lane_widths.iter().take(self.lane_widths.len().saturating_sub(1)) {
            offset -= lane_width;
            offsets.push(offset);
        }
        offsets
    }
}

/// Whole lane count between 1 and `MAX_LANES`.
fn lane_count(tags: &Tags) -> Option<usize> {
    let lanes = get_float(tags, "lanes")?;
    let count = Some(lanes)
        .filter(|lanes| lanes.fract() == 0.0 && *lanes >= 1.0 && *lanes <= MAX_LANES as f64)
        .and_then(|lanes| usize::try_from(lanes as u64).ok());
    if count.is_none() {
        warn!("{}", MalformedTagValue::new("lanes", &tags["lanes"]));
    }
    count
}

/// Widths from a `|`-separated list, when it has one entry per lane.
fn per_lane(value: &str, count: usize) -> Option<Vec<f64>> {
    let widths = value
        .split('|')
        .map(|part| parse_length("width:lanes", part))
        .collect::<Result<Vec<f64>, _>>();
    match widths {
        Ok(widths) if widths.len() == count => Some(widths),
        Ok(widths) => {
            warn!("{} lane widths for {} lanes", widths.len(), count);
            None
        }
        Err(error) => {
            warn!("{}", error);
            None
        }
    }
}

pub fn generate(
    directive: &GeneratorDirective,
    entity: &Entity,
    context: &GeneratorContext<'_>,
) -> Vec<Primitive> {
    let Geometry::Line(points) = &entity.geometry else {
        return Vec::new();
    };
    let layout = LaneLayout::from_tags(&directive.inputs);
    let (Some(layout), Some(anchor)) = (layout, entity.anchor()) else {
        return Vec::new();
    };

    let flinger = context.flinger;
    let scale = flinger.scale(anchor);
    let centerline = flinger.fling_all(points);
    let color = directive.params.border_color.unwrap_or(DEFAULT_COLOR);

    layout
        .separator_offsets()
        .into_iter()
        .map(|offset| Primitive::Path {
            commands: polyline(&offset_polyline(&centerline, offset * scale)),
            style: PaintStyle {
                dash: Some(SEPARATOR_DASH.to_vec()),
                ..PaintStyle::stroked(color, 1.0)
            }
            .with_opacity(SEPARATOR_OPACITY),
        })
        .collect()
}
