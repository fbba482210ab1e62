//! Geometry generators: tag-driven drawing procedures that turn one entity
//! into renderable primitives.
//!
//! Every generator is a pure function of the entity geometry, the tag values
//! listed by `GeneratorKind::input_keys`, the rule parameters and the render
//! context. Malformed tag values fall back to defaults with a warning.

use std::fmt;
use std::str::FromStr;

use crate::color::Color;
use crate::config::MapConfiguration;
use crate::drawing::Primitive;
use crate::entity::Entity;
use crate::flinger::Flinger;
use crate::tags::Tags;

pub mod building;
pub mod crater;
pub mod direction;
pub mod lanes;
pub mod tree;

pub use direction::Gradient;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeneratorKind {
    Building,
    Crater,
    Direction,
    Lanes,
    Tree,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("Unknown generator `{0}`.")]
pub struct UnknownGenerator(pub String);

impl FromStr for GeneratorKind {
    type Err = UnknownGenerator;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        match id {
            "building" => Ok(GeneratorKind::Building),
            "crater" => Ok(GeneratorKind::Crater),
            "direction" => Ok(GeneratorKind::Direction),
            "lanes" => Ok(GeneratorKind::Lanes),
            "tree" => Ok(GeneratorKind::Tree),
            other => Err(UnknownGenerator(other.to_owned())),
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = match self {
            GeneratorKind::Building => "building",
            GeneratorKind::Crater => "crater",
            GeneratorKind::Direction => "direction",
            GeneratorKind::Lanes => "lanes",
            GeneratorKind::Tree => "tree",
        };
        f.write_str(id)
    }
}

impl GeneratorKind {
    /// Tag keys the generator reads its inputs from.
    pub fn input_keys(&self) -> &'static [&'static str] {
        match self {
            GeneratorKind::Building => &[
                "building:levels",
                "building:min_level",
                "height",
                "min_height",
            ],
            GeneratorKind::Crater => &["diameter"],
            GeneratorKind::Direction => direction::INPUT_KEYS,
            GeneratorKind::Lanes => &["lanes", "width", "width:lanes"],
            GeneratorKind::Tree => &[
                "leaf_type",
                "leaf_cycle",
                "genus",
                "diameter_crown",
                "circumference",
            ],
        }
    }
}

/// Rule-level generator parameters; each generator documents which ones it
/// reads.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeneratorParams {
    pub color: Option<Color>,
    pub border_color: Option<Color>,
    /// Pixel radius of direction sectors.
    pub radius: Option<f64>,
    pub gradient: Option<Gradient>,
}

/// A resolved generator invocation for one entity.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratorDirective {
    pub kind: GeneratorKind,
    pub params: GeneratorParams,
    /// The entity's values for the generator's input keys.
    pub inputs: Tags,
}

impl GeneratorDirective {
    pub fn new(kind: GeneratorKind, params: GeneratorParams, tags: &Tags) -> Self {
        let inputs = kind
            .input_keys()
            .iter()
            .filter_map(|key| tags.get_key_value(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        GeneratorDirective {
            kind,
            params,
            inputs,
        }
    }
}

/// Render-wide state generators may depend on.
#[derive(Clone, Copy)]
pub struct GeneratorContext<'a> {
    pub flinger: &'a Flinger,
    pub configuration: &'a MapConfiguration,
}

pub fn generate(
    directive: &GeneratorDirective,
    entity: &Entity,
    context: &GeneratorContext<'_>,
) -> Vec<Primitive> {
    match directive.kind {
        GeneratorKind::Building => building::generate(directive, entity, context),
        GeneratorKind::Crater => crater::generate(directive, entity, context),
        GeneratorKind::Direction => direction::generate(directive, entity, context),
        GeneratorKind::Lanes => lanes::generate(directive, entity, context),
        GeneratorKind::Tree => tree::generate(directive, entity, context),
    }
}
