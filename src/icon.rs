//! Icon composition.
//!
//! An icon is an ordered stack of shapes, each with a color and a grid offset.
//! Two icons are the same icon when their stacks are the same, so composed
//! icons are memoized by that stack in an `IconCache` shared by one render
//! session. The cache may be used from several threads: lookups take a read
//! lock, and a miss composes outside of any lock and then keeps whichever
//! instance reached the map first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::color::{Color, EXTRA_ICON_COLOR};
use crate::geometry::Point;
use crate::path::PathCommand;
use crate::shape::{ShapeLibrary, DEFAULT_SHAPE_ID};

/// Reference to a shape as a part of an icon.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "RawIconRef")]
pub struct IconRef {
    pub shape: String,
    /// Overrides every cascaded color.
    pub color: Option<Color>,
    /// Shift in grid units.
    pub offset: [i32; 2],
    pub mirrored: bool,
}

/// Scheme files name a shape either by a bare identifier or by a map with
/// `shape`, `color`, `offset` and `mirrored` keys.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawIconRef {
    Id(String),
    Full {
        shape: String,
        color: Option<Color>,
        #[serde(default)]
        offset: [i32; 2],
        #[serde(default)]
        mirrored: bool,
    },
}

impl From<RawIconRef> for IconRef {
    fn from(raw: RawIconRef) -> Self {
        match raw {
            RawIconRef::Id(shape) => IconRef::new(&shape),
            RawIconRef::Full {
                shape,
                color,
                offset,
                mirrored,
            } => IconRef {
                shape,
                color,
                offset,
                mirrored,
            },
        }
    }
}

impl IconRef {
    pub fn new(shape: &str) -> Self {
        IconRef {
            shape: shape.to_owned(),
            color: None,
            offset: [0, 0],
            mirrored: false,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    fn layer_key(&self, cascaded: Color) -> LayerKey {
        LayerKey {
            shape: self.shape.clone(),
            color: self.color.unwrap_or(cascaded),
            offset: self.offset,
            mirrored: self.mirrored,
        }
    }
}

/// Everything an entity shows as pictograms: the main icon stack plus
/// separate secondary icons.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IconSet {
    /// Main icon layers, bottom first.
    pub layers: Vec<IconRef>,
    /// Secondary icons drawn next to the main one.
    pub extras: Vec<Vec<IconRef>>,
    /// Color for layers without their own color.
    pub color: Option<Color>,
    pub opacity: Option<f64>,
}

impl IconSet {
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty() && self.extras.is_empty()
    }

    /// Adds another contribution on top of this one. Colors and opacity
    /// already set here are kept.
    pub fn merge(&mut self, other: &IconSet) {
        self.layers.extend(other.layers.iter().cloned());
        self.extras.extend(other.extras.iter().cloned());
        self.color = self.color.or(other.color);
        self.opacity = self.opacity.or(other.opacity);
    }

    /// Cache key of the main icon; layers without a color get `fallback`
    /// unless the set has its own color.
    pub fn key(&self, fallback: Color) -> IconKey {
        let cascaded = self.color.unwrap_or(fallback);
        IconKey(self.layers.iter().map(|layer| layer.layer_key(cascaded)).collect())
    }

    /// Cache keys of the secondary icons, grey unless colored explicitly.
    pub fn extra_keys(&self) -> Vec<IconKey> {
        self.extras
            .iter()
            .map(|icon| {
                IconKey(
                    icon.iter()
                        .map(|layer| layer.layer_key(EXTRA_ICON_COLOR))
                        .collect(),
                )
            })
            .collect()
    }
}

/// One layer of a composed icon, fully specified.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LayerKey {
    pub shape: String,
    pub color: Color,
    pub offset: [i32; 2],
    pub mirrored: bool,
}

/// Identity of a composite icon: its ordered layers.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IconKey(pub Vec<LayerKey>);

impl IconKey {
    pub fn single(shape: &str, color: Color) -> Self {
        IconKey(vec![IconRef::new(shape).layer_key(color)])
    }
}

#[derive(Clone, Debug)]
pub struct IconLayer {
    pub color: Color,
    /// Path in icon-local units, centered on the anchor.
    pub path: Arc<[PathCommand]>,
    /// Closed paths are filled, open ones stroked.
    pub closed: bool,
}

#[derive(Debug)]
pub struct CompositeIcon {
    key: IconKey,
    layers: Vec<IconLayer>,
}

impl CompositeIcon {
    pub fn key(&self) -> &IconKey {
        &self.key
    }

    /// Layers in paint order; later layers are drawn on top.
    pub fn layers(&self) -> &[IconLayer] {
        &self.layers
    }

    /// Outline color contrasting with the topmost layer.
    pub fn outline_color(&self) -> Color {
        match self.layers.last() {
            Some(layer) if !layer.color.is_bright() => Color::rgb(255, 255, 255),
            _ => Color::rgb(0, 0, 0),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

type PathKey = (String, [i32; 2], bool);

/// Memoized composite icons for one render session.
#[derive(Default)]
pub struct IconCache {
    icons: RwLock<HashMap<IconKey, Arc<CompositeIcon>>>,
    // placed geometry is color independent; recolored icons reuse it
    paths: RwLock<HashMap<PathKey, (Arc<[PathCommand]>, bool)>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl IconCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Composes the icon for `key`, or returns the instance composed before.
    pub fn compose(&self, shapes: &ShapeLibrary, key: &IconKey) -> Arc<CompositeIcon> {
        if let Some(icon) = self.icons.read().get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return icon.clone();
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let layers = key
            .0
            .iter()
            .map(|layer| {
                let (path, closed) = self.placed_path(shapes, layer);
                IconLayer {
                    color: layer.color,
                    path,
                    closed,
                }
            })
            .collect();
        let icon = Arc::new(CompositeIcon {
            key: key.clone(),
            layers,
        });
        debug!("composed icon with {} layers", key.0.len());

        self.icons.write().entry(key.clone()).or_insert(icon).clone()
    }

    fn placed_path(&self, shapes: &ShapeLibrary, layer: &LayerKey) -> (Arc<[PathCommand]>, bool) {
        let path_key = (layer.shape.clone(), layer.offset, layer.mirrored);
        if let Some(placed) = self.paths.read().get(&path_key) {
            return placed.clone();
        }

        let shape = match shapes.get(&layer.shape) {
            Some(shape) => shape,
            None => {
                warn!("unknown shape `{}`, using `{}`", layer.shape, DEFAULT_SHAPE_ID);
                shapes.get_or_default(DEFAULT_SHAPE_ID)
            }
        };
        let offset = Point::new(layer.offset[0] as f64, layer.offset[1] as f64);
        let placed: (Arc<[PathCommand]>, bool) = (
            shape.placed_path(offset, layer.mirrored).into(),
            shape.is_closed(),
        );

        self.paths.write().entry(path_key).or_insert(placed).clone()
    }

    pub fn len(&self) -> usize {
        self.icons.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::thread;

    use super::*;
    use crate::shape::ShapeDefinition;

    fn library() -> ShapeLibrary {
        let definitions: BTreeMap<String, ShapeDefinition> = serde_yaml::from_str(
            "default: {path: \"M 4 4 L 10 4 L 10 10 L 4 10 Z\"}\n\
             default_small: {path: \"M 6 6 L 8 6 L 8 8 L 6 8 Z\"}\n\
             tree: {path: \"M 7 1 L 12 12 L 2 12 Z\"}\n\
             leaf: {path: \"M 1 1 L 3 3\"}\n",
        )
        .unwrap();
        ShapeLibrary::from_definitions(&definitions).unwrap()
    }

    fn black() -> Color {
        Color::rgb(0, 0, 0)
    }

    #[test]
    fn test_parse_icon_refs() {
        let yaml = "[tree, {shape: leaf, color: \"#00ff00\", offset: [3, -3]}]";
        let refs: Vec<IconRef> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(IconRef::new("tree"), refs[0]);
        assert_eq!(Some(Color::rgb(0, 255, 0)), refs[1].color);
        assert_eq!([3, -3], refs[1].offset);
    }

    #[test]
    fn test_compose_is_order_sensitive() {
        let cache = IconCache::new();
        let shapes = library();
        let tree_leaf = IconSet {
            layers: vec![IconRef::new("tree"), IconRef::new("leaf")],
            ..Default::default()
        };
        let leaf_tree = IconSet {
            layers: vec![IconRef::new("leaf"), IconRef::new("tree")],
            ..Default::default()
        };
        let a = cache.compose(&shapes, &tree_leaf.key(black()));
        let b = cache.compose(&shapes, &leaf_tree.key(black()));
        assert_ne!(a.key(), b.key());
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(a.layers()[0].closed);
        assert!(!a.layers()[1].closed);
    }

    #[test]
    fn test_compose_returns_cached_instance() {
        let cache = IconCache::new();
        let shapes = library();
        let key = IconKey::single("tree", black());
        let first = cache.compose(&shapes, &key);
        let second = cache.compose(&shapes, &key);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(1, cache.len());
        assert_eq!(CacheStats { hits: 1, misses: 1 }, cache.stats());
    }

    #[test]
    fn test_recolor_reuses_geometry() {
        let cache = IconCache::new();
        let shapes = library();
        let dark = cache.compose(&shapes, &IconKey::single("tree", black()));
        let red = cache.compose(&shapes, &IconKey::single("tree", Color::rgb(255, 0, 0)));
        assert!(!Arc::ptr_eq(&dark, &red));
        assert!(Arc::ptr_eq(&dark.layers()[0].path, &red.layers()[0].path));
        assert_eq!(Color::rgb(255, 255, 255), dark.outline_color());
    }

    #[test]
    fn test_color_cascade() {
        let set = IconSet {
            layers: vec![
                IconRef::new("tree"),
                IconRef::new("leaf").with_color(Color::rgb(0, 255, 0)),
            ],
            extras: vec![vec![IconRef::new("leaf")]],
            color: Some(Color::rgb(0, 0, 255)),
            opacity: None,
        };
        let key = set.key(black());
        assert_eq!(Color::rgb(0, 0, 255), key.0[0].color);
        assert_eq!(Color::rgb(0, 255, 0), key.0[1].color);
        assert_eq!(EXTRA_ICON_COLOR, set.extra_keys()[0].0[0].color);
    }

    #[test]
    fn test_concurrent_compose_converges() {
        let cache = IconCache::new();
        let shapes = library();
        let key = IconKey(vec![
            IconRef::new("tree").layer_key(black()),
            IconRef::new("leaf").layer_key(black()),
        ]);
        let icons: Vec<Arc<CompositeIcon>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| cache.compose(&shapes, &key)))
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });
        assert!(icons.iter().all(|icon| Arc::ptr_eq(icon, &icons[0])));
        assert_eq!(1, cache.len());
    }
}
