//! Map drawing configuration.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::label::LabelMode;
use crate::tags::{parse_levels, Tags};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildingMode {
    No,
    Flat,
    Isometric,
    /// Isometric, but `building:part` entities are not extruded.
    IsometricNoParts,
}

impl BuildingMode {
    pub fn is_isometric(&self) -> bool {
        matches!(self, BuildingMode::Isometric | BuildingMode::IsometricNoParts)
    }
}

/// Which entities are drawn, by their `level` tag.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(try_from = "RawLevel")]
pub enum LevelFilter {
    /// Entities without a level, or on levels 0 and above.
    Overground,
    /// Entities on any level below 0.
    Underground,
    All,
    /// Entities whose level list contains the level.
    Level(f64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLevel {
    Number(f64),
    Name(String),
}

impl TryFrom<RawLevel> for LevelFilter {
    type Error = String;

    fn try_from(raw: RawLevel) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawLevel::Number(level) => Ok(LevelFilter::Level(level)),
            RawLevel::Name(name) => match name.as_str() {
                "overground" => Ok(LevelFilter::Overground),
                "underground" => Ok(LevelFilter::Underground),
                "all" => Ok(LevelFilter::All),
                other => other
                    .parse()
                    .map(LevelFilter::Level)
                    .map_err(|_| format!("unknown level `{}`", other)),
            },
        }
    }
}

impl LevelFilter {
    pub fn accepts(&self, tags: &Tags) -> bool {
        let levels = match tags.get("level") {
            Some(value) => match parse_levels("level", value) {
                Ok(levels) => Some(levels),
                Err(error) => {
                    tracing::warn!("{}", error);
                    None
                }
            },
            None => None,
        };

        match (self, levels) {
            (LevelFilter::All, _) => true,
            (LevelFilter::Overground, None) => true,
            (LevelFilter::Overground, Some(levels)) => levels.iter().all(|level| *level >= 0.0),
            (LevelFilter::Underground, None) => false,
            (LevelFilter::Underground, Some(levels)) => levels.iter().any(|level| *level < 0.0),
            (LevelFilter::Level(_), None) => false,
            (LevelFilter::Level(wanted), Some(levels)) => levels.contains(wanted),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapConfiguration {
    pub building_mode: BuildingMode,
    pub zoom_level: f64,
    /// Draw a generic marker for every tag no rule explains.
    pub show_missing_tags: bool,
    /// Draw secondary markers for lifecycle-prefixed and deprecated tags.
    pub lifecycle_markers: bool,
    pub level: LevelFilter,
    /// Country code matched against rule location restrictions.
    pub country: String,
    /// Apply rules regardless of their start zoom level.
    pub ignore_level_matching: bool,
    pub draw_roofs: bool,
    /// Which text labels are drawn under icons.
    pub label_mode: LabelMode,
}

impl Default for MapConfiguration {
    fn default() -> Self {
        MapConfiguration {
            building_mode: BuildingMode::Flat,
            zoom_level: 18.0,
            show_missing_tags: false,
            lifecycle_markers: true,
            level: LevelFilter::Overground,
            country: String::from("world"),
            ignore_level_matching: false,
            draw_roofs: true,
            label_mode: LabelMode::Main,
        }
    }
}

impl MapConfiguration {
    /// Constructs a configuration from YAML; missing fields keep their
    /// defaults.
    pub fn from_yaml(data: &str) -> Result<MapConfiguration> {
        serde_yaml::from_str(data).map_err(Error::Configuration)
    }
}
