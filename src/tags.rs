//! Tag sets and tag value parsing.

use std::collections::BTreeMap;

use tracing::warn;

/// Key/value tags of one entity. Ordered so that everything derived from a
/// tag set (cache keys, unmatched-key reports) is deterministic.
pub type Tags = BTreeMap<String, String>;

/// Lifecycle prefixes, from the most alive to the most gone.
///
/// Further reading: https://wiki.openstreetmap.org/wiki/Lifecycle_prefix#Stages_of_decay
pub const STAGES_OF_DECAY: [&str; 8] = [
    "disused",
    "abandoned",
    "ruins",
    "demolished",
    "removed",
    "razed",
    "destroyed",
    "was", // not actually a stage of decay
];

/// A tag value that could not be read as the type a consumer expects.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("Malformed value `{value}` for tag `{key}`.")]
pub struct MalformedTagValue {
    pub key: String,
    pub value: String,
}

impl MalformedTagValue {
    pub fn new(key: &str, value: &str) -> Self {
        MalformedTagValue {
            key: key.to_owned(),
            value: value.to_owned(),
        }
    }
}

/// Builds a tag set from string pairs.
pub fn tag_set(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Parses a plain decimal number. Infinite and NaN values are rejected.
pub fn parse_float(key: &str, value: &str) -> Result<f64, MalformedTagValue> {
    match value.trim().parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(number),
        _ => Err(MalformedTagValue::new(key, value)),
    }
}

/// Parses a length in metres: a bare number, or a number with an `m`, `km`
/// or `mi` unit.
pub fn parse_length(key: &str, value: &str) -> Result<f64, MalformedTagValue> {
    let text = value.trim();
    if let Ok(number) = parse_float(key, text) {
        return Ok(number);
    }

    for (unit, ratio) in [("km", 1000.0), ("mi", 1609.344), ("m", 1.0)] {
        if let Some(number) = text.strip_suffix(unit) {
            if let Ok(number) = parse_float(key, number) {
                return Ok(number * ratio);
            }
        }
    }

    Err(MalformedTagValue::new(key, value))
}

/// Parses a `;`-separated level list such as `-1;0` or `0,5`.
pub fn parse_levels(key: &str, value: &str) -> Result<Vec<f64>, MalformedTagValue> {
    value
        .replace(',', ".")
        .split(';')
        .map(|part| parse_float(key, part))
        .collect()
}

/// Reads an optional number from the tag set. A present but malformed value
/// is logged and treated as absent.
pub fn get_float(tags: &Tags, key: &str) -> Option<f64> {
    let value = tags.get(key)?;
    match parse_float(key, value) {
        Ok(number) => Some(number),
        Err(error) => {
            warn!("{}", error);
            None
        }
    }
}

/// Same as `get_float`, but accepts length units.
pub fn get_length(tags: &Tags, key: &str) -> Option<f64> {
    let value = tags.get(key)?;
    match parse_length(key, value) {
        Ok(number) => Some(number),
        Err(error) => {
            warn!("{}", error);
            None
        }
    }
}

/// Splits a lifecycle-prefixed key into the stage index and the bare key,
/// e.g. `disused:shop` into `(0, "shop")`.
pub fn split_lifecycle(key: &str) -> Option<(usize, &str)> {
    let (prefix, rest) = key.split_once(':')?;
    let stage = STAGES_OF_DECAY.iter().position(|stage| *stage == prefix)?;
    if rest.is_empty() {
        return None;
    }
    Some((stage, rest))
}

/// Opacity of a lifecycle marker for the given stage.
pub fn lifecycle_opacity(stage: usize) -> f64 {
    0.6 - 0.4 * stage as f64 / (STAGES_OF_DECAY.len() as f64 - 1.0)
}
