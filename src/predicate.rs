//! Tag predicates: the conditions rules are made of.

use serde::Deserialize;

use crate::tags::{parse_float, Tags};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum Comparison {
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = ">")]
    Greater,
}

impl Comparison {
    fn holds(&self, left: f64, right: f64) -> bool {
        match self {
            Comparison::Less => left < right,
            Comparison::LessOrEqual => left <= right,
            Comparison::Equal => left == right,
            Comparison::GreaterOrEqual => left >= right,
            Comparison::Greater => left > right,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TagPredicate {
    /// `key` has exactly `value`.
    Equals { key: String, value: String },
    /// `key` is set to anything.
    Present { key: String },
    /// `key` is not set.
    Absent { key: String },
    /// `key` has one of `values`.
    OneOf { key: String, values: Vec<String> },
    /// `key` parses as a number that compares to `value`. Unparseable values
    /// never match.
    Compare {
        key: String,
        comparison: Comparison,
        value: f64,
    },
    Not(Box<TagPredicate>),
}

impl TagPredicate {
    pub fn key(&self) -> &str {
        match self {
            TagPredicate::Equals { key, .. }
            | TagPredicate::Present { key }
            | TagPredicate::Absent { key }
            | TagPredicate::OneOf { key, .. }
            | TagPredicate::Compare { key, .. } => key,
            TagPredicate::Not(inner) => inner.key(),
        }
    }

    /// The key whose presence this predicate explains when it holds. Negative
    /// predicates explain nothing.
    pub fn explained_key(&self) -> Option<&str> {
        match self {
            TagPredicate::Absent { .. } | TagPredicate::Not(_) => None,
            _ => Some(self.key()),
        }
    }

    pub fn evaluate(&self, tags: &Tags) -> bool {
        match self {
            TagPredicate::Equals { key, value } => tags.get(key) == Some(value),
            TagPredicate::Present { key } => tags.contains_key(key),
            TagPredicate::Absent { key } => !tags.contains_key(key),
            TagPredicate::OneOf { key, values } => tags
                .get(key)
                .map_or(false, |value| values.iter().any(|candidate| candidate == value)),
            TagPredicate::Compare {
                key,
                comparison,
                value,
            } => tags
                .get(key)
                .and_then(|text| parse_float(key, text).ok())
                .map_or(false, |number| comparison.holds(number, *value)),
            TagPredicate::Not(inner) => !inner.evaluate(tags),
        }
    }
}

/// Conjunction of predicates.
pub fn all_hold(predicates: &[TagPredicate], tags: &Tags) -> bool {
    predicates.iter().all(|predicate| predicate.evaluate(tags))
}

/// Tag value matcher as written in scheme files: a value, `*` for any value,
/// or a list of values.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ValueMatcher {
    One(String),
    Many(Vec<String>),
}

impl ValueMatcher {
    pub fn predicate(&self, key: &str) -> TagPredicate {
        let key = key.to_owned();
        match self {
            ValueMatcher::One(value) if value == "*" => TagPredicate::Present { key },
            ValueMatcher::One(value) => TagPredicate::Equals {
                key,
                value: value.clone(),
            },
            ValueMatcher::Many(values) => TagPredicate::OneOf {
                key,
                values: values.clone(),
            },
        }
    }
}

/// Numeric condition as written in scheme files.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NumericMatcher {
    pub key: String,
    pub op: Comparison,
    pub value: f64,
}

impl NumericMatcher {
    pub fn predicate(&self) -> TagPredicate {
        TagPredicate::Compare {
            key: self.key.clone(),
            comparison: self.op,
            value: self.value,
        }
    }
}
