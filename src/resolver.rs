//! Rule matching and conflict resolution.
//!
//! `Resolver::resolve` turns one entity into the draw directives that render
//! it. Every rule applicable to the entity is evaluated and the matches are
//! ordered by descending priority, equal priorities in declaration order.
//! Within one directive category an `exclusive` match hides the matches after
//! it. Icon contributions accumulate into a single icon set, while the other
//! categories yield one directive per match. The directive list is finally
//! sorted by descending priority, which is the draw order.
//!
//! Alongside the directives the resolver reports the tag keys no matching
//! rule explains, so gaps in a scheme can be made visible.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashSet};

use tracing::{debug, warn};

use crate::color::Color;
use crate::config::{BuildingMode, MapConfiguration};
use crate::entity::{Entity, EntityKind};
use crate::generator::direction::DirectionSet;
use crate::generator::{GeneratorDirective, GeneratorKind};
use crate::icon::{IconRef, IconSet};
use crate::label::{construct_labels, Label};
use crate::scheme::{AreaFill, Category, LineStyle, Rule, RuleAction, Scheme};
use crate::shape::{Facing, DEFAULT_SHAPE_ID};
use crate::tags::{lifecycle_opacity, split_lifecycle, Tags};

/// Priority of markers; they are drawn after icons.
pub const MARKER_PRIORITY: i32 = -1000;

/// Priority of labels, drawn last.
pub const LABEL_PRIORITY: i32 = -2000;

/// Plain color keys, applied after `material` and the `*:colour` keys.
const COLOR_KEYS: [&str; 3] = ["colour", "color", "building:colour"];

#[derive(Clone, Debug, PartialEq)]
pub enum MarkerKind {
    /// A tag key no rule explains.
    MissingTag { key: String },
    /// A lifecycle-prefixed key whose bare form matches icon rules.
    Lifecycle { key: String, stage: usize, icon: IconSet },
    Deprecated { key: String, replacement: String },
}

/// A small secondary pictogram next to the entity's main icon.
#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    pub kind: MarkerKind,
    pub opacity: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawDirective {
    Icon(IconSet),
    Line(LineStyle),
    Fill(AreaFill),
    Generator(GeneratorDirective),
    Marker(Marker),
    /// Text labels, most important first.
    Labels(Vec<Label>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedDirective {
    pub priority: i32,
    pub directive: DrawDirective,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resolution {
    /// Directives in draw order.
    pub directives: Vec<ResolvedDirective>,
    /// Tag keys no matching rule explains; skipped keys are left out.
    pub unmatched: BTreeSet<String>,
    /// Deprecated keys present on the entity.
    pub deprecated: BTreeSet<String>,
    /// Lifecycle-prefixed keys that matched with the prefix stripped.
    pub lifecycle: BTreeSet<String>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// The accumulated main icon, if any.
    pub fn icon(&self) -> Option<&IconSet> {
        self.directives.iter().find_map(|resolved| match &resolved.directive {
            DrawDirective::Icon(icon) => Some(icon),
            _ => None,
        })
    }
}

pub struct Resolver<'a> {
    scheme: &'a Scheme,
    configuration: &'a MapConfiguration,
}

impl<'a> Resolver<'a> {
    pub fn new(scheme: &'a Scheme, configuration: &'a MapConfiguration) -> Self {
        Resolver {
            scheme,
            configuration,
        }
    }

    pub fn scheme(&self) -> &'a Scheme {
        self.scheme
    }

    pub fn configuration(&self) -> &'a MapConfiguration {
        self.configuration
    }

    /// Rules that match `tags` for an entity of `kind` under the current
    /// configuration, highest priority first.
    pub fn matching_rules(&self, kind: EntityKind, tags: &Tags) -> Vec<&'a Rule> {
        let configuration = self.configuration;
        let mut matched: Vec<&Rule> = self
            .scheme
            .rules()
            .iter()
            .filter(|rule| rule.applies_to.applies(kind))
            .filter(|rule| {
                configuration.ignore_level_matching
                    || rule
                        .start_zoom_level
                        .map_or(true, |zoom| configuration.zoom_level >= zoom)
            })
            .filter(|rule| {
                rule.location_restrictions
                    .as_ref()
                    .map_or(true, |restrictions| restrictions.allows(&configuration.country))
            })
            .filter(|rule| rule.matches(tags))
            .collect();
        matched.sort_by_key(|rule| (Reverse(rule.priority), rule.index));
        matched
    }

    pub fn resolve(&self, entity: &Entity) -> Resolution {
        let tags = &entity.tags;
        let kind = entity.kind();
        let mut resolution = Resolution::default();

        if !self.configuration.level.accepts(tags) {
            debug!("entity {} is not on the shown level", entity.id);
            return resolution;
        }

        let matched = self.matching_rules(kind, tags);
        let mut explained: HashSet<&str> =
            matched.iter().flat_map(|rule| rule.explained_keys()).collect();

        let mut closed: HashSet<Category> = HashSet::new();
        let mut active: Vec<&Rule> = Vec::new();
        for rule in &matched {
            let Some(category) = rule.category() else {
                continue;
            };
            if closed.contains(&category) {
                continue;
            }
            active.push(*rule);
            if rule.exclusive {
                closed.insert(category);
            }
        }

        let mut directives = Vec::new();
        if let Some((priority, icon, color_keys)) = self.accumulate_icon(&active, tags) {
            explained.extend(color_keys);
            directives.push(ResolvedDirective {
                priority,
                directive: DrawDirective::Icon(icon),
            });
        }

        for rule in &active {
            let directive = match &rule.action {
                RuleAction::Line(style) => DrawDirective::Line(style.clone()),
                RuleAction::Fill(fill) => DrawDirective::Fill(fill.clone()),
                RuleAction::Generator { kind, params } => {
                    if !self.generates(*kind, tags) {
                        continue;
                    }
                    explained.extend(
                        kind.input_keys()
                            .iter()
                            .copied()
                            .filter(|key| tags.contains_key(*key)),
                    );
                    DrawDirective::Generator(GeneratorDirective::new(*kind, params.clone(), tags))
                }
                RuleAction::Icon(_) | RuleAction::Explain => continue,
            };
            directives.push(ResolvedDirective {
                priority: rule.priority,
                directive,
            });
        }

        if !directives.is_empty() {
            let (labels, keys) = construct_labels(tags, self.scheme);
            explained.extend(keys);
            let shown = self.configuration.label_mode.select(&labels);
            if !shown.is_empty() {
                directives.push(ResolvedDirective {
                    priority: LABEL_PRIORITY,
                    directive: DrawDirective::Labels(shown.to_vec()),
                });
            }
        }

        for (key, value) in tags {
            let Some((stage, bare)) = split_lifecycle(key) else {
                continue;
            };
            let Some(icon) = self.lifecycle_icon(kind, bare, value) else {
                continue;
            };
            explained.insert(key.as_str());
            resolution.lifecycle.insert(key.clone());
            if self.configuration.lifecycle_markers {
                directives.push(marker(
                    MarkerKind::Lifecycle {
                        key: key.clone(),
                        stage,
                        icon,
                    },
                    lifecycle_opacity(stage),
                ));
            }
        }

        for key in tags.keys() {
            if let Some(replacement) = self.scheme.deprecated(key) {
                debug!("entity {} uses deprecated key `{}`, use `{}`", entity.id, key, replacement);
                resolution.deprecated.insert(key.clone());
                if self.configuration.lifecycle_markers {
                    directives.push(marker(
                        MarkerKind::Deprecated {
                            key: key.clone(),
                            replacement: replacement.to_owned(),
                        },
                        1.0,
                    ));
                }
            }
        }

        resolution.unmatched = tags
            .keys()
            .filter(|key| !explained.contains(key.as_str()) && !self.scheme.is_skipped(key))
            .cloned()
            .collect();
        if self.configuration.show_missing_tags {
            for key in &resolution.unmatched {
                directives.push(marker(MarkerKind::MissingTag { key: key.clone() }, 1.0));
            }
        }

        directives.sort_by_key(|resolved| Reverse(resolved.priority));
        resolution.directives = directives;
        resolution
    }

    /// Merges the icon contributions of the active rules. Returns the icon
    /// with the priority of its strongest contributor and the color keys it
    /// was colored by.
    fn accumulate_icon<'t>(
        &self,
        active: &[&Rule],
        tags: &'t Tags,
    ) -> Option<(i32, IconSet, Vec<&'t str>)> {
        let contributions: Vec<(&Rule, &IconSet)> = active
            .iter()
            .filter_map(|rule| match &rule.action {
                RuleAction::Icon(set) => Some((*rule, set)),
                _ => None,
            })
            .collect();
        let priority = contributions.first()?.0.priority;
        let has_main = contributions
            .iter()
            .any(|(rule, set)| !rule.fallback && !set.layers.is_empty());

        let mut icon = IconSet::default();
        for (rule, set) in &contributions {
            if rule.fallback && has_main {
                let mut set = (*set).clone();
                set.layers.clear();
                icon.merge(&set);
            } else {
                icon.merge(set);
            }
        }
        if icon.layers.is_empty() && !icon.extras.is_empty() {
            icon.layers.push(IconRef::new(DEFAULT_SHAPE_ID));
        }
        if icon.is_empty() {
            return None;
        }

        let mut color_keys = Vec::new();
        if let Some((color, keys)) = self.tag_color(tags) {
            icon.color = Some(color);
            color_keys = keys;
        }
        self.orient(&mut icon, tags);
        Some((priority, icon, color_keys))
    }

    /// Color from the entity's own tags: `material`, then any `*:colour`
    /// key, then the plain color keys, a later key overriding an earlier
    /// one. Returns the color with every key that supplied one.
    fn tag_color<'t>(&self, tags: &'t Tags) -> Option<(Color, Vec<&'t str>)> {
        let mut color = None;
        let mut keys = Vec::new();
        if let Some((key, material)) = tags.get_key_value("material") {
            if let Some(material_color) = self.scheme.material_color(material) {
                color = Some(material_color);
                keys.push(key.as_str());
            }
        }

        let suffixed = tags
            .keys()
            .map(String::as_str)
            .filter(|key| !COLOR_KEYS.contains(key))
            .filter(|key| key.ends_with(":colour") || key.ends_with(":color"));
        let plain = COLOR_KEYS
            .iter()
            .filter_map(|key| tags.get_key_value(*key).map(|(key, _)| key.as_str()));
        for key in suffixed.chain(plain) {
            let value = &tags[key];
            match self.scheme.color(value) {
                Some(parsed) => {
                    color = Some(parsed);
                    keys.push(key);
                }
                None => warn!("unknown color `{}` in `{}`", value, key),
            }
        }
        color.map(|color| (color, keys))
    }

    /// Mirrors directed shapes to face the way the entity's `direction`
    /// points.
    fn orient(&self, icon: &mut IconSet, tags: &Tags) {
        let directions = DirectionSet::from_tags(tags);
        let Some(right) = directions.and_then(|directions| directions.is_right()) else {
            return;
        };
        let shapes = self.scheme.shapes();
        for layer in &mut icon.layers {
            let facing = shapes.get(&layer.shape).and_then(|shape| shape.directed);
            let flip = match facing {
                Some(Facing::Right) => !right,
                Some(Facing::Left) => right,
                None => false,
            };
            layer.mirrored ^= flip;
        }
    }

    fn generates(&self, kind: GeneratorKind, tags: &Tags) -> bool {
        if kind != GeneratorKind::Building {
            return true;
        }
        match self.configuration.building_mode {
            BuildingMode::No => false,
            BuildingMode::IsometricNoParts => !tags.contains_key("building:part"),
            BuildingMode::Flat | BuildingMode::Isometric => true,
        }
    }

    fn lifecycle_icon(&self, kind: EntityKind, key: &str, value: &str) -> Option<IconSet> {
        let stripped: Tags = [(key.to_owned(), value.to_owned())].into_iter().collect();
        let mut icon = IconSet::default();
        for rule in self.matching_rules(kind, &stripped) {
            if let RuleAction::Icon(set) = &rule.action {
                icon.layers.extend(set.layers.iter().cloned());
                icon.color = icon.color.or(set.color);
            }
        }
        if icon.layers.is_empty() {
            None
        } else {
            Some(icon)
        }
    }
}

fn marker(kind: MarkerKind, opacity: f64) -> ResolvedDirective {
    ResolvedDirective {
        priority: MARKER_PRIORITY,
        directive: DrawDirective::Marker(Marker { kind, opacity }),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::config::LevelFilter;
    use crate::entity::GeoPoint;
    use crate::tags::tag_set;

    fn scheme() -> Scheme {
        let data = fs::read_to_string("test_data/scheme.yml")
            .expect("Unable to read the test yml file.");
        Scheme::from_yaml(&data).unwrap()
    }

    fn node(pairs: &[(&str, &str)]) -> Entity {
        Entity::node(1, GeoPoint::new(48.862, 2.287), tag_set(pairs))
    }

    fn area(pairs: &[(&str, &str)]) -> Entity {
        let ring = vec![
            GeoPoint::new(48.861, 2.285),
            GeoPoint::new(48.861, 2.286),
            GeoPoint::new(48.862, 2.286),
            GeoPoint::new(48.861, 2.285),
        ];
        Entity::area(2, vec![ring], vec![], tag_set(pairs))
    }

    fn shapes(icon: &IconSet) -> Vec<&str> {
        icon.layers.iter().map(|layer| layer.shape.as_str()).collect()
    }

    #[test]
    fn test_unknown_tags_are_invisible() {
        let scheme = scheme();
        let configuration = MapConfiguration::default();
        let resolution = Resolver::new(&scheme, &configuration).resolve(&node(&[("foo", "bar")]));
        assert!(resolution.is_empty());
        assert_eq!(BTreeSet::from(["foo".to_owned()]), resolution.unmatched);
    }

    #[test]
    fn test_categories_combine_in_priority_order() {
        let scheme = scheme();
        let configuration = MapConfiguration::default();
        let resolver = Resolver::new(&scheme, &configuration);
        let resolution = resolver.resolve(&area(&[
            ("building", "yes"),
            ("shop", "bakery"),
            ("building:levels", "3"),
        ]));

        assert_eq!(2, resolution.directives.len());
        assert!(matches!(resolution.directives[0].directive, DrawDirective::Generator(_)));
        assert_eq!(vec!["bakery"], shapes(resolution.icon().unwrap()));
        assert!(resolution.directives[0].priority > resolution.directives[1].priority);
        assert!(resolution.unmatched.is_empty());
    }

    #[test]
    fn test_icons_accumulate() {
        let scheme = scheme();
        let configuration = MapConfiguration::default();
        let resolver = Resolver::new(&scheme, &configuration);
        let resolution = resolver.resolve(&node(&[("amenity", "cafe"), ("wheelchair", "yes")]));
        let icon = resolution.icon().unwrap();
        assert_eq!(vec!["cup"], shapes(icon));
        assert_eq!(vec![vec![IconRef::new("wheelchair")]], icon.extras);

        // only a secondary icon: the main one becomes the default shape
        let resolution = resolver.resolve(&node(&[("wheelchair", "yes")]));
        assert_eq!(vec![DEFAULT_SHAPE_ID], shapes(resolution.icon().unwrap()));
    }

    #[test]
    fn test_fallback_shapes() {
        let scheme = scheme();
        let configuration = MapConfiguration::default();
        let resolver = Resolver::new(&scheme, &configuration);
        let generic = resolver.resolve(&node(&[("shop", "convenience")]));
        assert_eq!(vec!["shop"], shapes(generic.icon().unwrap()));
        assert!(generic.unmatched.is_empty());
        let bakery = resolver.resolve(&node(&[("shop", "bakery")]));
        assert_eq!(vec!["bakery"], shapes(bakery.icon().unwrap()));
    }

    #[test]
    fn test_exclusive_rule_suppresses_lower_matches() {
        let scheme = scheme();
        let configuration = MapConfiguration::default();
        let resolver = Resolver::new(&scheme, &configuration);
        let plain = resolver.resolve(&node(&[("natural", "tree")]));
        assert_eq!(vec!["tree"], shapes(plain.icon().unwrap()));
        let conifer =
            resolver.resolve(&node(&[("natural", "tree"), ("leaf_type", "needleleaved")]));
        assert_eq!(vec!["tree_needleleaved"], shapes(conifer.icon().unwrap()));
        assert!(conifer.unmatched.is_empty());
    }

    #[test]
    fn test_color_cascade() {
        let scheme = scheme();
        let configuration = MapConfiguration::default();
        let resolver = Resolver::new(&scheme, &configuration);

        let tree = resolver.resolve(&node(&[("natural", "tree")]));
        assert_eq!(scheme.color("tree_color"), tree.icon().unwrap().color);

        let red = resolver.resolve(&node(&[("natural", "tree"), ("colour", "red")]));
        assert_eq!(Some(Color::rgb(255, 0, 0)), red.icon().unwrap().color);
        assert!(red.unmatched.is_empty());

        let brick = resolver.resolve(&node(&[("amenity", "cafe"), ("material", "brick")]));
        assert_eq!(scheme.material_color("brick"), brick.icon().unwrap().color);
        assert!(brick.unmatched.is_empty());

        // plain color keys override the material and suffixed keys
        let painted = resolver.resolve(&node(&[
            ("amenity", "cafe"),
            ("material", "brick"),
            ("roof:colour", "blue"),
            ("colour", "red"),
        ]));
        assert_eq!(Some(Color::rgb(255, 0, 0)), painted.icon().unwrap().color);
        assert!(painted.unmatched.is_empty());
        let roof = resolver.resolve(&node(&[
            ("amenity", "cafe"),
            ("material", "brick"),
            ("roof:colour", "blue"),
        ]));
        assert_eq!(Some(Color::rgb(0, 0, 255)), roof.icon().unwrap().color);

        // no icon, so the color explains nothing
        let plain = resolver.resolve(&node(&[("colour", "red")]));
        assert_eq!(BTreeSet::from(["colour".to_owned()]), plain.unmatched);
    }

    #[test]
    fn test_zoom_and_location_restrictions() {
        let scheme = scheme();
        let lamp = node(&[("highway", "street_lamp")]);
        let post_box = node(&[("amenity", "post_box")]);

        let far = MapConfiguration {
            zoom_level: 16.0,
            ..Default::default()
        };
        assert!(Resolver::new(&scheme, &far).resolve(&lamp).is_empty());
        let ignoring = MapConfiguration {
            zoom_level: 16.0,
            ignore_level_matching: true,
            ..Default::default()
        };
        assert!(!Resolver::new(&scheme, &ignoring).resolve(&lamp).is_empty());

        let world = MapConfiguration::default();
        let world_color = Resolver::new(&scheme, &world).resolve(&post_box).icon().unwrap().color;
        let british = MapConfiguration {
            country: "gb".to_owned(),
            ..Default::default()
        };
        let british_color = Resolver::new(&scheme, &british)
            .resolve(&post_box)
            .icon()
            .unwrap()
            .color;
        assert_eq!(Some(Color::rgb(255, 0, 0)), british_color);
        assert_ne!(world_color, british_color);
    }

    #[test]
    fn test_exception_and_explain_only_rules() {
        let scheme = scheme();
        let configuration = MapConfiguration::default();
        let resolver = Resolver::new(&scheme, &configuration);
        assert!(resolver.resolve(&node(&[("leisure", "picnic_table")])).icon().is_some());
        let private =
            resolver.resolve(&node(&[("leisure", "picnic_table"), ("access", "private")]));
        assert!(private.icon().is_none());

        let fixme = resolver.resolve(&node(&[("fixme", "position")]));
        assert!(fixme.is_empty());
        assert!(fixme.unmatched.is_empty());
    }

    #[test]
    fn test_lifecycle_and_deprecated_markers() {
        let scheme = scheme();
        let configuration = MapConfiguration::default();
        let resolver = Resolver::new(&scheme, &configuration);

        let disused = resolver.resolve(&node(&[("disused:shop", "bakery")]));
        assert!(disused.unmatched.is_empty());
        assert_eq!(BTreeSet::from(["disused:shop".to_owned()]), disused.lifecycle);
        let DrawDirective::Marker(marker) = &disused.directives[0].directive else {
            panic!("expected a lifecycle marker");
        };
        assert_approx_eq!(0.6, marker.opacity);
        assert_eq!(MARKER_PRIORITY, disused.directives[0].priority);

        let unknown = resolver.resolve(&node(&[("was:foo", "bar")]));
        assert_eq!(BTreeSet::from(["was:foo".to_owned()]), unknown.unmatched);

        let deprecated = resolver.resolve(&node(&[("amenity", "cafe"), ("shop_amenity", "cafe")]));
        assert_eq!(BTreeSet::from(["shop_amenity".to_owned()]), deprecated.deprecated);
        assert!(matches!(
            deprecated.directives.last().map(|resolved| &resolved.directive),
            Some(DrawDirective::Marker(Marker {
                kind: MarkerKind::Deprecated { .. },
                ..
            }))
        ));

        let quiet = MapConfiguration {
            lifecycle_markers: false,
            ..Default::default()
        };
        let disused = node(&[("disused:shop", "bakery")]);
        assert!(Resolver::new(&scheme, &quiet).resolve(&disused).is_empty());
    }

    #[test]
    fn test_skipped_keys_are_never_unmatched() {
        let scheme = scheme();
        let configuration = MapConfiguration::default();
        let resolution = Resolver::new(&scheme, &configuration).resolve(&node(&[
            ("amenity", "cafe"),
            ("source", "survey"),
            ("addr:street", "Rue Cler"),
        ]));
        assert!(resolution.unmatched.is_empty());
    }

    #[test]
    fn test_directed_shapes_follow_direction() {
        let scheme = scheme();
        let configuration = MapConfiguration::default();
        let resolver = Resolver::new(&scheme, &configuration);
        let camera = |direction: &str| {
            resolver.resolve(&node(&[
                ("man_made", "surveillance"),
                ("camera:direction", direction),
            ]))
        };
        let east = camera("90");
        let west = camera("270");
        assert!(!east.icon().unwrap().layers[0].mirrored);
        assert!(west.icon().unwrap().layers[0].mirrored);
        assert!(west
            .directives
            .iter()
            .any(|resolved| matches!(
                &resolved.directive,
                DrawDirective::Generator(directive) if directive.kind == GeneratorKind::Direction
            )));
        assert!(west.unmatched.is_empty());
    }

    #[test]
    fn test_building_modes_and_levels() {
        let scheme = scheme();
        let part = area(&[("building:part", "yes"), ("building", "yes")]);
        let has_generator = |resolution: &Resolution| {
            resolution
                .directives
                .iter()
                .any(|resolved| matches!(resolved.directive, DrawDirective::Generator(_)))
        };

        let flat = MapConfiguration::default();
        assert!(has_generator(&Resolver::new(&scheme, &flat).resolve(&part)));
        let no_parts = MapConfiguration {
            building_mode: BuildingMode::IsometricNoParts,
            ..Default::default()
        };
        assert!(!has_generator(&Resolver::new(&scheme, &no_parts).resolve(&part)));
        let none = MapConfiguration {
            building_mode: BuildingMode::No,
            ..Default::default()
        };
        let building = area(&[("building", "yes")]);
        assert!(!has_generator(&Resolver::new(&scheme, &none).resolve(&building)));

        let underground = node(&[("amenity", "cafe"), ("level", "-1")]);
        assert!(Resolver::new(&scheme, &flat).resolve(&underground).is_empty());
        let basement = MapConfiguration {
            level: LevelFilter::Underground,
            ..Default::default()
        };
        assert!(!Resolver::new(&scheme, &basement).resolve(&underground).is_empty());
    }

    #[test]
    fn test_show_missing_tags() {
        let scheme = scheme();
        let configuration = MapConfiguration {
            show_missing_tags: true,
            ..Default::default()
        };
        let resolution = Resolver::new(&scheme, &configuration).resolve(&node(&[("foo", "bar")]));
        assert_eq!(
            vec![ResolvedDirective {
                priority: MARKER_PRIORITY,
                directive: DrawDirective::Marker(Marker {
                    kind: MarkerKind::MissingTag { key: "foo".to_owned() },
                    opacity: 1.0,
                }),
            }],
            resolution.directives
        );
    }
}
