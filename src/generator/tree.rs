//! Tree crowns and trunks.

use std::str::FromStr;

use tracing::warn;

use crate::color::{Color, DEFAULT_COLOR};
use crate::drawing::{PaintStyle, Primitive};
use crate::entity::Entity;
use crate::tags::{get_length, Tags};

use super::{GeneratorContext, GeneratorDirective};

/// Crown diameter assumed when `diameter_crown` is missing, in metres.
pub const DEFAULT_CROWN_DIAMETER: f64 = 4.0;

const CROWN_OPACITY: f64 = 0.3;
const NEEDLELEAVED_DARKENING: f64 = 0.2;

/// Conifer genera; trees of these count as needleleaved unless `leaf_type`
/// says otherwise.
pub const NEEDLELEAVED_GENERA: [&str; 10] = [
    "Abies",
    "Cedrus",
    "Cupressus",
    "Juniperus",
    "Larix",
    "Picea",
    "Pinus",
    "Pseudotsuga",
    "Taxus",
    "Thuja",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeafType {
    Broadleaved,
    Needleleaved,
    Mixed,
    Leafless,
}

impl FromStr for LeafType {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "broadleaved" => Ok(LeafType::Broadleaved),
            "needleleaved" => Ok(LeafType::Needleleaved),
            "mixed" => Ok(LeafType::Mixed),
            "leafless" => Ok(LeafType::Leafless),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeafCycle {
    Deciduous,
    Evergreen,
    SemiDeciduous,
    SemiEvergreen,
    Mixed,
}

impl FromStr for LeafCycle {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "deciduous" => Ok(LeafCycle::Deciduous),
            "evergreen" => Ok(LeafCycle::Evergreen),
            "semi_deciduous" => Ok(LeafCycle::SemiDeciduous),
            "semi_evergreen" => Ok(LeafCycle::SemiEvergreen),
            "mixed" => Ok(LeafCycle::Mixed),
            _ => Err(()),
        }
    }
}

/// What kind of tree an entity describes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TreeVariant {
    pub leaf_type: Option<LeafType>,
    pub leaf_cycle: Option<LeafCycle>,
}

fn parse_enum<T: FromStr>(tags: &Tags, key: &str) -> Option<T> {
    let value = tags.get(key)?;
    let parsed = value.parse().ok();
    if parsed.is_none() {
        warn!("unknown {} `{}`", key, value);
    }
    parsed
}

impl TreeVariant {
    /// Reads `leaf_type` and `leaf_cycle`. Without a usable `leaf_type`
    /// the leaf type is inferred from `genus`.
    pub fn from_tags(tags: &Tags) -> TreeVariant {
        let from_genus = || {
            tags.get("genus")
                .filter(|genus| NEEDLELEAVED_GENERA.contains(&genus.as_str()))
                .map(|_| LeafType::Needleleaved)
        };
        TreeVariant {
            leaf_type: parse_enum(tags, "leaf_type").or_else(from_genus),
            leaf_cycle: parse_enum(tags, "leaf_cycle"),
        }
    }

    fn crown_color(&self, base: Color) -> Color {
        match self.leaf_type {
            Some(LeafType::Needleleaved) => base.darken(NEEDLELEAVED_DARKENING),
            _ => base,
        }
    }
}

/// Crown circle, plus the trunk circle when `circumference` is known. Sizes
/// are in metres on the ground.
pub fn generate(
    directive: &GeneratorDirective,
    entity: &Entity,
    context: &GeneratorContext<'_>,
) -> Vec<Primitive> {
    let Some(anchor) = entity.anchor() else {
        return Vec::new();
    };
    let flinger = context.flinger;
    let center = flinger.fling(anchor);
    let scale = flinger.scale(anchor);
    let inputs = &directive.inputs;
    let variant = TreeVariant::from_tags(inputs);

    let crown_diameter = get_length(inputs, "diameter_crown")
        .filter(|diameter| *diameter > 0.0)
        .unwrap_or(DEFAULT_CROWN_DIAMETER);
    let crown_color = variant.crown_color(directive.params.color.unwrap_or(DEFAULT_COLOR));
    let mut primitives = vec![Primitive::Circle {
        center,
        radius: crown_diameter / 2.0 * scale,
        style: PaintStyle::filled(crown_color).with_opacity(CROWN_OPACITY),
    }];

    if let Some(circumference) = get_length(inputs, "circumference").filter(|value| *value > 0.0) {
        primitives.push(Primitive::Circle {
            center,
            radius: circumference / (2.0 * std::f64::consts::PI) * scale,
            style: PaintStyle::filled(directive.params.border_color.unwrap_or(DEFAULT_COLOR)),
        });
    }
    primitives
}
