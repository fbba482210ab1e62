//! Style schemes.
//!
//! A scheme is loaded once from YAML and then only read: it owns the shape
//! library, named colors and the rule list. Rule order is significant, since
//! equal priorities are resolved in declaration order.
//!
//! ```yaml
//! colors:
//!   tree_color: "#98AC64"
//! shapes:
//!   default: {path: "M 4 4 L 10 4 L 10 10 L 4 10 Z"}
//!   default_small: {path: "M 6 6 L 8 6 L 8 8 L 6 8 Z"}
//!   tree: {path: "M 7 1 L 12 12 L 2 12 Z"}
//! rules:
//!   - tags: {natural: tree}
//!     priority: 40
//!     shapes: [tree]
//!     set_main_color: tree_color
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Deserialize;
use tracing::{info, warn};

use crate::color::{Color, DEFAULT_COLOR};
use crate::entity::EntityKind;
use crate::error::{Error, Result};
use crate::generator::{GeneratorKind, GeneratorParams, Gradient};
use crate::icon::{IconRef, IconSet};
use crate::predicate::{all_hold, NumericMatcher, TagPredicate, ValueMatcher};
use crate::shape::{ShapeDefinition, ShapeLibrary};
use crate::tags::Tags;

const DEFAULT_SCHEME: &str = include_str!("../data/default_scheme.yml");

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Applicability {
    Node,
    Way,
    Area,
    #[default]
    All,
}

impl Applicability {
    pub fn applies(&self, kind: EntityKind) -> bool {
        match self {
            Applicability::All => true,
            Applicability::Node => kind == EntityKind::Node,
            Applicability::Way => kind == EntityKind::Way,
            Applicability::Area => kind == EntityKind::Area,
        }
    }
}

/// Countries a rule is limited to or excluded from.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationRestrictions {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl LocationRestrictions {
    pub fn allows(&self, country: &str) -> bool {
        (self.include.is_empty() || self.include.iter().any(|code| code == country))
            && !self.exclude.iter().any(|code| code == country)
    }
}

/// Where a line takes its width from.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WidthSource {
    /// Fixed width in pixels.
    Fixed(f64),
    /// Width in metres read from a tag, with a default for missing or
    /// malformed values.
    Tag { tag: String, default: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct LineStyle {
    pub width: WidthSource,
    pub color: Color,
    pub dash: Option<Vec<f64>>,
    pub opacity: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AreaFill {
    pub color: Color,
    /// Name of a fill pattern the backend may know.
    pub pattern: Option<String>,
    pub opacity: f64,
}

/// The draw directive categories rules contribute to. Exclusivity works
/// within one category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Icon,
    Line,
    Fill,
    Generator,
}

/// What a matching rule contributes.
#[derive(Clone, Debug, PartialEq)]
pub enum RuleAction {
    /// Explains its tags without drawing anything.
    Explain,
    Icon(IconSet),
    Line(LineStyle),
    Fill(AreaFill),
    Generator {
        kind: GeneratorKind,
        params: GeneratorParams,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    /// Position in the scheme file.
    pub index: usize,
    pub predicates: Vec<TagPredicate>,
    /// The rule does not match if any of these holds.
    pub exceptions: Vec<TagPredicate>,
    pub applies_to: Applicability,
    pub priority: i32,
    /// Suppresses lower-priority matches of the same category.
    pub exclusive: bool,
    /// Main shapes are dropped when a non-fallback rule provides some.
    pub fallback: bool,
    pub start_zoom_level: Option<f64>,
    pub location_restrictions: Option<LocationRestrictions>,
    pub action: RuleAction,
}

impl Rule {
    pub fn matches(&self, tags: &Tags) -> bool {
        all_hold(&self.predicates, tags)
            && !self.exceptions.iter().any(|predicate| predicate.evaluate(tags))
    }

    /// Keys this rule explains when it matches.
    pub fn explained_keys(&self) -> impl Iterator<Item = &str> {
        self.predicates.iter().filter_map(TagPredicate::explained_key)
    }

    pub fn category(&self) -> Option<Category> {
        match self.action {
            RuleAction::Explain => None,
            RuleAction::Icon(_) => Some(Category::Icon),
            RuleAction::Line(_) => Some(Category::Line),
            RuleAction::Fill(_) => Some(Category::Fill),
            RuleAction::Generator { .. } => Some(Category::Generator),
        }
    }
}

fn yes() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawScheme {
    #[serde(default)]
    colors: BTreeMap<String, String>,
    #[serde(default)]
    material_colors: BTreeMap<String, String>,
    shapes: BTreeMap<String, ShapeDefinition>,
    #[serde(default)]
    rules: Vec<RawRule>,
    #[serde(default)]
    area_tags: BTreeMap<String, ValueMatcher>,
    /// Deprecated key and the key to use instead.
    #[serde(default)]
    deprecated_keys: BTreeMap<String, String>,
    #[serde(default)]
    keys_to_skip: Vec<String>,
    #[serde(default)]
    prefixes_to_skip: Vec<String>,
    /// Keys whose values are shown as labels.
    #[serde(default)]
    keys_to_write: Vec<String>,
    #[serde(default)]
    prefixes_to_write: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    #[serde(default)]
    tags: BTreeMap<String, ValueMatcher>,
    #[serde(default)]
    exception: BTreeMap<String, ValueMatcher>,
    #[serde(default)]
    absent: Vec<String>,
    #[serde(default, rename = "not")]
    negated: BTreeMap<String, ValueMatcher>,
    #[serde(default)]
    numeric: Vec<NumericMatcher>,
    #[serde(default)]
    applies_to: Applicability,
    #[serde(default)]
    priority: i32,
    #[serde(default)]
    exclusive: bool,
    #[serde(default)]
    fallback: bool,
    start_zoom_level: Option<f64>,
    location_restrictions: Option<LocationRestrictions>,
    #[serde(default = "yes")]
    draw: bool,
    #[serde(default)]
    shapes: Vec<IconRef>,
    #[serde(default)]
    add_shapes: Vec<IconRef>,
    set_main_color: Option<String>,
    set_opacity: Option<f64>,
    line: Option<RawLineStyle>,
    fill: Option<RawAreaFill>,
    generator: Option<RawGenerator>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLineStyle {
    width: WidthSource,
    color: String,
    dash: Option<Vec<f64>>,
    opacity: Option<f64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAreaFill {
    color: String,
    pattern: Option<String>,
    opacity: Option<f64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGenerator {
    id: String,
    color: Option<String>,
    border_color: Option<String>,
    radius: Option<f64>,
    gradient: Option<Gradient>,
}

impl RawRule {
    fn has_icon(&self) -> bool {
        !self.shapes.is_empty()
            || !self.add_shapes.is_empty()
            || self.set_main_color.is_some()
            || self.set_opacity.is_some()
    }
}

pub struct Scheme {
    colors: HashMap<String, Color>,
    material_colors: HashMap<String, Color>,
    shapes: ShapeLibrary,
    rules: Vec<Rule>,
    area_tags: Vec<TagPredicate>,
    deprecated_keys: BTreeMap<String, String>,
    keys_to_skip: HashSet<String>,
    prefixes_to_skip: Vec<String>,
    keys_to_write: HashSet<String>,
    prefixes_to_write: Vec<String>,
}

impl Scheme {
    /// Parses and validates a scheme. Any structural problem is fatal.
    pub fn from_yaml(data: &str) -> Result<Scheme> {
        let raw: RawScheme = serde_yaml::from_str(data)?;

        let colors = raw
            .colors
            .iter()
            .map(|(name, value)| {
                let color = value
                    .parse::<Color>()
                    .map_err(|error| Error::InvalidScheme(format!("color `{}`: {}", name, error)))?;
                Ok((name.clone(), color))
            })
            .collect::<Result<HashMap<_, _>>>()?;

        let mut scheme = Scheme {
            colors,
            material_colors: HashMap::new(),
            shapes: ShapeLibrary::from_definitions(&raw.shapes)?,
            rules: Vec::with_capacity(raw.rules.len()),
            area_tags: raw
                .area_tags
                .iter()
                .map(|(key, matcher)| matcher.predicate(key))
                .collect(),
            deprecated_keys: raw.deprecated_keys,
            keys_to_skip: raw.keys_to_skip.into_iter().collect(),
            prefixes_to_skip: raw.prefixes_to_skip,
            keys_to_write: raw.keys_to_write.into_iter().collect(),
            prefixes_to_write: raw.prefixes_to_write,
        };

        for (material, value) in &raw.material_colors {
            let color = scheme.resolve_color(value, &format!("material `{}`", material))?;
            scheme.material_colors.insert(material.clone(), color);
        }
        for (index, rule) in raw.rules.iter().enumerate() {
            let rule = scheme.compile_rule(index, rule)?;
            scheme.rules.push(rule);
        }

        info!(
            "loaded scheme with {} rules and {} shapes",
            scheme.rules.len(),
            scheme.shapes.len()
        );
        Ok(scheme)
    }

    /// The scheme shipped with the crate.
    pub fn builtin() -> Result<Scheme> {
        Scheme::from_yaml(DEFAULT_SCHEME)
    }

    fn resolve_color(&self, name: &str, context: &str) -> Result<Color> {
        self.color(name)
            .ok_or_else(|| Error::InvalidScheme(format!("{}: unknown color `{}`", context, name)))
    }

    fn check_shapes(&self, rule: &RawRule, context: &str) -> Result<()> {
        for icon in rule.shapes.iter().chain(&rule.add_shapes) {
            let shape = self.shapes.get(&icon.shape).ok_or_else(|| {
                Error::InvalidScheme(format!("{}: unknown shape `{}`", context, icon.shape))
            })?;
            let unfit = match rule.applies_to {
                Applicability::Node => !shape.for_node,
                Applicability::Area => !shape.for_area,
                _ => false,
            };
            if unfit {
                warn!(
                    "{}: shape `{}` is not meant for {:?} entities",
                    context, shape.id, rule.applies_to
                );
            }
        }
        Ok(())
    }

    fn compile_rule(&self, index: usize, raw: &RawRule) -> Result<Rule> {
        let context = format!("rule {}", index);
        let invalid = |reason: &str| Error::InvalidScheme(format!("{}: {}", context, reason));

        if raw.tags.is_empty() && raw.numeric.is_empty() {
            return Err(invalid("no tags to match"));
        }

        let groups = [
            raw.has_icon(),
            raw.line.is_some(),
            raw.fill.is_some(),
            raw.generator.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count();
        if groups > 1 {
            return Err(invalid("more than one kind of draw directive"));
        }
        if !raw.draw && groups > 0 {
            return Err(invalid("`draw: false` with a draw directive"));
        }
        self.check_shapes(raw, &context)?;

        let action = if !raw.draw || groups == 0 {
            RuleAction::Explain
        } else if let Some(line) = &raw.line {
            RuleAction::Line(LineStyle {
                width: line.width.clone(),
                color: self.resolve_color(&line.color, &context)?,
                dash: line.dash.clone(),
                opacity: line.opacity.unwrap_or(1.0),
            })
        } else if let Some(fill) = &raw.fill {
            RuleAction::Fill(AreaFill {
                color: self.resolve_color(&fill.color, &context)?,
                pattern: fill.pattern.clone(),
                opacity: fill.opacity.unwrap_or(1.0),
            })
        } else if let Some(generator) = &raw.generator {
            let kind = generator
                .id
                .parse::<GeneratorKind>()
                .map_err(|error| invalid(&error.to_string()))?;
            let color = |name: &Option<String>| -> Result<Option<Color>> {
                name.as_deref()
                    .map(|name| self.resolve_color(name, &context))
                    .transpose()
            };
            RuleAction::Generator {
                kind,
                params: GeneratorParams {
                    color: color(&generator.color)?,
                    border_color: color(&generator.border_color)?,
                    radius: generator.radius,
                    gradient: generator.gradient,
                },
            }
        } else {
            let color = raw
                .set_main_color
                .as_deref()
                .map(|name| self.resolve_color(name, &context))
                .transpose()?;
            RuleAction::Icon(IconSet {
                layers: raw.shapes.clone(),
                extras: raw.add_shapes.iter().map(|icon| vec![icon.clone()]).collect(),
                color,
                opacity: raw.set_opacity,
            })
        };

        let mut predicates: Vec<TagPredicate> = raw
            .tags
            .iter()
            .map(|(key, matcher)| matcher.predicate(key))
            .collect();
        predicates.extend(raw.numeric.iter().map(NumericMatcher::predicate));
        predicates.extend(
            raw.absent
                .iter()
                .map(|key| TagPredicate::Absent { key: key.clone() }),
        );
        predicates.extend(
            raw.negated
                .iter()
                .map(|(key, matcher)| TagPredicate::Not(Box::new(matcher.predicate(key)))),
        );

        Ok(Rule {
            index,
            predicates,
            exceptions: raw
                .exception
                .iter()
                .map(|(key, matcher)| matcher.predicate(key))
                .collect(),
            applies_to: raw.applies_to,
            priority: raw.priority,
            exclusive: raw.exclusive,
            fallback: raw.fallback,
            start_zoom_level: raw.start_zoom_level,
            location_restrictions: raw.location_restrictions.clone(),
            action,
        })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn shapes(&self) -> &ShapeLibrary {
        &self.shapes
    }

    /// A named scheme color or a literal color.
    pub fn color(&self, name: &str) -> Option<Color> {
        self.colors
            .get(name)
            .copied()
            .or_else(|| name.parse().ok())
    }

    /// Same as `color`, but unknown colors are logged and replaced by the
    /// default color.
    pub fn get_color(&self, name: &str) -> Color {
        self.color(name).unwrap_or_else(|| {
            warn!("unknown color `{}`", name);
            DEFAULT_COLOR
        })
    }

    pub fn material_color(&self, material: &str) -> Option<Color> {
        self.material_colors.get(material).copied()
    }

    /// Keys never reported as unmatched.
    pub fn is_skipped(&self, key: &str) -> bool {
        self.keys_to_skip.contains(key)
            || self
                .prefixes_to_skip
                .iter()
                .any(|prefix| key.starts_with(prefix.as_str()))
    }

    /// Keys whose values are shown as labels when `LabelMode::All` is set.
    pub fn is_writable(&self, key: &str) -> bool {
        if self.keys_to_skip.contains(key) {
            return false;
        }
        self.keys_to_write.contains(key)
            || self
                .prefixes_to_write
                .iter()
                .any(|prefix| key.starts_with(prefix.as_str()))
    }

    /// Replacement for a deprecated key.
    pub fn deprecated(&self, key: &str) -> Option<&str> {
        self.deprecated_keys.get(key).map(String::as_str)
    }

    /// Whether a closed way with these tags describes an area rather than a
    /// ring-shaped line.
    pub fn is_area(&self, tags: &Tags) -> bool {
        self.area_tags.iter().any(|predicate| predicate.evaluate(tags))
    }
}
