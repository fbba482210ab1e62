//! Materializing resolutions into render calls.
//!
//! The painter resolves every entity, runs the generators and composes the
//! icons, and hands the resulting calls to a `RenderBackend` in draw order.
//! Entities are independent of each other, so they are resolved on scoped
//! worker threads that share the session's icon cache.

use std::cmp::Reverse;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, info};

use crate::color::{Color, DEFAULT_COLOR, EXTRA_ICON_COLOR};
use crate::config::MapConfiguration;
use crate::drawing::{polygon, polyline, Paint, PaintStyle, Primitive};
use crate::entity::{Entity, EntityId, Geometry};
use crate::flinger::Flinger;
use crate::generator::{generate, GeneratorContext};
use crate::geometry::Point;
use crate::icon::{CompositeIcon, IconCache, IconKey};
use crate::resolver::{DrawDirective, MarkerKind, Resolver};
use crate::scheme::{AreaFill, LineStyle, Scheme, WidthSource};
use crate::shape::{DEFAULT_SMALL_SHAPE_ID, ICON_GRID};
use crate::tags::get_length;
use crate::tile::{Tile, TileSet};
use crate::RenderBackend;

/// Distance between secondary icons, in pixels.
const EXTRA_ICON_SPACING: f64 = 16.0;

/// Size of markers relative to regular icons.
const MARKER_SCALE: f64 = 0.5;

/// Distance from the icon anchor down to the first label.
const LABEL_OFFSET: f64 = ICON_GRID / 2.0 + 2.0;
const LABEL_SPACING: f64 = 2.0;

/// Below this many entities everything runs on the calling thread.
const PARALLEL_THRESHOLD: usize = 256;

const DEPRECATED_MARKER_COLOR: Color = Color::rgb(0xff, 0x00, 0x00);

#[derive(Clone, Debug)]
pub enum RenderKind {
    Primitive(Primitive),
    Icon {
        icon: Arc<CompositeIcon>,
        /// Canvas position of the icon anchor.
        position: Point,
        opacity: f64,
        scale: f64,
    },
    Text {
        text: String,
        /// Canvas position of the text's top center.
        position: Point,
        color: Color,
        size: f64,
    },
}

/// One drawing instruction for the backend.
#[derive(Clone, Debug)]
pub struct RenderCall {
    pub entity: EntityId,
    pub priority: i32,
    pub kind: RenderKind,
}

/// Outcome of a tile batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TileReport {
    /// Tiles that were fully rendered, in rendering order.
    pub rendered: Vec<Tile>,
    pub cancelled: bool,
}

pub struct Painter<'a> {
    resolver: Resolver<'a>,
    icons: &'a IconCache,
}

impl<'a> Painter<'a> {
    pub fn new(
        scheme: &'a Scheme,
        configuration: &'a MapConfiguration,
        icons: &'a IconCache,
    ) -> Self {
        Painter {
            resolver: Resolver::new(scheme, configuration),
            icons,
        }
    }

    pub fn resolver(&self) -> &Resolver<'a> {
        &self.resolver
    }

    /// Render calls of one entity, in its own draw order.
    pub fn render_calls(&self, entity: &Entity, flinger: &Flinger) -> Vec<RenderCall> {
        let resolution = self.resolver.resolve(entity);
        if resolution.is_empty() {
            return Vec::new();
        }

        let context = GeneratorContext {
            flinger,
            configuration: self.resolver.configuration(),
        };
        let anchor = entity.anchor();
        let position = anchor.map(|anchor| flinger.fling(anchor));
        let scale = anchor.map_or_else(
            || flinger.central_scale(),
            |anchor| flinger.scale(anchor),
        );
        let shapes = self.resolver.scheme().shapes();

        let mut calls = Vec::new();
        let mut markers = 0;
        let mut label_top = LABEL_OFFSET;
        for resolved in &resolution.directives {
            let priority = resolved.priority;
            let mut push = |kind: RenderKind| {
                calls.push(RenderCall {
                    entity: entity.id,
                    priority,
                    kind,
                })
            };

            match &resolved.directive {
                DrawDirective::Icon(icon) => {
                    let Some(position) = position else {
                        continue;
                    };
                    let opacity = icon.opacity.unwrap_or(1.0);
                    push(RenderKind::Icon {
                        icon: self.icons.compose(shapes, &icon.key(DEFAULT_COLOR)),
                        position,
                        opacity,
                        scale: 1.0,
                    });
                    let extras = icon.extra_keys();
                    if !extras.is_empty() {
                        label_top = EXTRA_ICON_SPACING + LABEL_OFFSET;
                    }
                    let middle = (extras.len() as f64 - 1.0) / 2.0;
                    for (index, key) in extras.iter().enumerate() {
                        let shift = Point::new(
                            (index as f64 - middle) * EXTRA_ICON_SPACING,
                            EXTRA_ICON_SPACING,
                        );
                        push(RenderKind::Icon {
                            icon: self.icons.compose(shapes, key),
                            position: position + shift,
                            opacity,
                            scale: 1.0,
                        });
                    }
                }
                DrawDirective::Line(style) => {
                    if let Some(primitive) = line(entity, flinger, style, scale) {
                        push(RenderKind::Primitive(primitive));
                    }
                }
                DrawDirective::Fill(fill) => {
                    if let Some(primitive) = area(entity, flinger, fill) {
                        push(RenderKind::Primitive(primitive));
                    }
                }
                DrawDirective::Generator(directive) => {
                    for primitive in generate(directive, entity, &context) {
                        push(RenderKind::Primitive(primitive));
                    }
                }
                DrawDirective::Marker(marker) => {
                    let Some(position) = position else {
                        continue;
                    };
                    let key = match &marker.kind {
                        MarkerKind::MissingTag { .. } => {
                            IconKey::single(DEFAULT_SMALL_SHAPE_ID, EXTRA_ICON_COLOR)
                        }
                        MarkerKind::Deprecated { .. } => {
                            IconKey::single(DEFAULT_SMALL_SHAPE_ID, DEPRECATED_MARKER_COLOR)
                        }
                        MarkerKind::Lifecycle { icon, .. } => icon.key(DEFAULT_COLOR),
                    };
                    // markers line up to the right of the main icon
                    let shift = Point::new(
                        ICON_GRID / 2.0 + markers as f64 * ICON_GRID * MARKER_SCALE,
                        -ICON_GRID / 2.0,
                    );
                    markers += 1;
                    push(RenderKind::Icon {
                        icon: self.icons.compose(shapes, &key),
                        position: position + shift,
                        opacity: marker.opacity,
                        scale: MARKER_SCALE,
                    });
                }
                DrawDirective::Labels(labels) => {
                    let Some(position) = position else {
                        continue;
                    };
                    for label in labels {
                        push(RenderKind::Text {
                            text: label.display_text(),
                            position: position + Point::new(0.0, label_top),
                            color: label.color,
                            size: label.size,
                        });
                        label_top += label.size + LABEL_SPACING;
                    }
                }
            }
        }
        calls
    }

    /// Renders `entities` onto one canvas. Returns the number of calls made.
    pub fn paint(
        &self,
        entities: &[Entity],
        flinger: &Flinger,
        backend: &mut dyn RenderBackend,
    ) -> usize {
        let entities: Vec<&Entity> = entities.iter().collect();
        self.paint_entities(&entities, flinger, backend)
    }

    fn paint_entities(
        &self,
        entities: &[&Entity],
        flinger: &Flinger,
        backend: &mut dyn RenderBackend,
    ) -> usize {
        let mut calls = self.collect_calls(entities, flinger);
        // stable: equal priorities keep entity order
        calls.sort_by_key(|call| Reverse(call.priority));
        for call in &calls {
            backend.draw(call);
        }
        debug!(
            "painted {} entities with {} calls, icon cache {:?}",
            entities.len(),
            calls.len(),
            self.icons.stats()
        );
        calls.len()
    }

    fn collect_calls(&self, entities: &[&Entity], flinger: &Flinger) -> Vec<RenderCall> {
        let workers = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        if workers == 1 || entities.len() < PARALLEL_THRESHOLD {
            return entities
                .iter()
                .flat_map(|entity| self.render_calls(entity, flinger))
                .collect();
        }

        let chunk_size = (entities.len() + workers - 1) / workers;
        thread::scope(|scope| {
            let handles: Vec<_> = entities
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .flat_map(|entity| self.render_calls(entity, flinger))
                            .collect::<Vec<RenderCall>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect()
        })
    }

    /// Renders one file per tile of `tile_set`, each with the entities
    /// touching the tile's extended bounding box. Rules are matched at the
    /// tile set's zoom level. Setting `cancel` stops the batch before the
    /// next tile; tiles already rendered stay complete.
    pub fn render_tiles(
        &self,
        tile_set: &TileSet,
        entities: &[Entity],
        backend: &mut dyn RenderBackend,
        cancel: &AtomicBool,
    ) -> TileReport {
        let configuration = MapConfiguration {
            zoom_level: tile_set.zoom as f64,
            ..self.resolver.configuration().clone()
        };
        let painter = Painter::new(self.resolver.scheme(), &configuration, self.icons);

        let mut report = TileReport::default();
        for descriptor in tile_set.descriptors() {
            if cancel.load(Ordering::Relaxed) {
                info!(
                    "tile rendering cancelled after {} of {} tiles",
                    report.rendered.len(),
                    tile_set.len()
                );
                report.cancelled = true;
                break;
            }

            let extended = descriptor.bounding_box.extended();
            let visible: Vec<&Entity> = entities
                .iter()
                .filter(|entity| entity.intersects(&extended))
                .collect();
            let flinger = Flinger::new(descriptor.bounding_box, tile_set.zoom as f64);

            backend.begin_tile(&descriptor);
            painter.paint_entities(&visible, &flinger, backend);
            backend.end_tile(&descriptor);
            debug!("rendered tile {} with {} entities", descriptor.tile, visible.len());
            report.rendered.push(descriptor.tile);
        }
        report
    }
}

fn line(entity: &Entity, flinger: &Flinger, style: &LineStyle, scale: f64) -> Option<Primitive> {
    let commands = match &entity.geometry {
        Geometry::Point(_) => return None,
        Geometry::Line(points) => polyline(&flinger.fling_all(points)),
        Geometry::Polygon { outers, inners } => {
            let rings: Vec<Vec<Point>> = outers
                .iter()
                .chain(inners)
                .map(|ring| flinger.fling_all(ring))
                .collect();
            polygon(&rings, Point::default())
        }
    };
    let width = match &style.width {
        WidthSource::Fixed(width) => *width,
        WidthSource::Tag { tag, default } => {
            get_length(&entity.tags, tag).unwrap_or(*default) * scale
        }
    };
    Some(Primitive::Path {
        commands,
        style: PaintStyle {
            dash: style.dash.clone(),
            ..PaintStyle::stroked(style.color, width)
        }
        .with_opacity(style.opacity),
    })
}

fn area(entity: &Entity, flinger: &Flinger, fill: &AreaFill) -> Option<Primitive> {
    let Geometry::Polygon { outers, inners } = &entity.geometry else {
        return None;
    };
    let rings: Vec<Vec<Point>> = outers
        .iter()
        .chain(inners)
        .map(|ring| flinger.fling_all(ring))
        .collect();
    Some(Primitive::Path {
        commands: polygon(&rings, Point::default()),
        style: PaintStyle {
            fill: Paint::Solid(fill.color),
            pattern: fill.pattern.clone(),
            opacity: fill.opacity,
            ..Default::default()
        },
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::bounding_box::BoundingBox;
    use crate::entity::GeoPoint;
    use crate::label::LabelMode;
    use crate::tags::tag_set;
    use crate::tile::tiles_for;
    use crate::TileDescriptor;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<RenderCall>,
        tiles: Vec<Tile>,
    }

    impl RenderBackend for Recorder {
        fn draw(&mut self, call: &RenderCall) {
            self.calls.push(call.clone());
        }

        fn end_tile(&mut self, tile: &TileDescriptor) {
            self.tiles.push(tile.tile);
        }
    }

    fn scheme() -> Scheme {
        let data = fs::read_to_string("test_data/scheme.yml")
            .expect("Unable to read the test yml file.");
        Scheme::from_yaml(&data).unwrap()
    }

    fn paris() -> BoundingBox {
        BoundingBox::new(2.284, 48.860, 2.290, 48.865).unwrap()
    }

    fn entities() -> Vec<Entity> {
        let ring = vec![
            GeoPoint::new(48.8610, 2.2850),
            GeoPoint::new(48.8610, 2.2860),
            GeoPoint::new(48.8620, 2.2860),
            GeoPoint::new(48.8620, 2.2850),
            GeoPoint::new(48.8610, 2.2850),
        ];
        vec![
            Entity::node(
                1,
                GeoPoint::new(48.8615, 2.2855),
                tag_set(&[("amenity", "cafe"), ("wheelchair", "yes")]),
            ),
            Entity::area(2, vec![ring], vec![], tag_set(&[("landuse", "grass")])),
            Entity::way(
                3,
                vec![GeoPoint::new(48.8630, 2.2840), GeoPoint::new(48.8630, 2.2890)],
                tag_set(&[("highway", "primary"), ("lanes", "3")]),
            ),
        ]
    }

    #[test]
    fn test_calls_follow_priority() {
        let scheme = scheme();
        let configuration = MapConfiguration::default();
        let icons = IconCache::new();
        let painter = Painter::new(&scheme, &configuration, &icons);
        let flinger = Flinger::new(paris(), 18.0);
        let mut recorder = Recorder::default();

        let count = painter.paint(&entities(), &flinger, &mut recorder);
        assert_eq!(count, recorder.calls.len());
        assert!(recorder
            .calls
            .windows(2)
            .all(|pair| pair[0].priority >= pair[1].priority));
        // grass fill first, cafe icons last
        assert_eq!(2, recorder.calls[0].entity);
        assert_eq!(1, recorder.calls.last().map(|call| call.entity).unwrap_or_default());
        // road line plus two lane separators
        assert_eq!(3, recorder.calls.iter().filter(|call| call.entity == 3).count());
    }

    #[test]
    fn test_icons_are_shared() {
        let scheme = scheme();
        let configuration = MapConfiguration::default();
        let icons = IconCache::new();
        let painter = Painter::new(&scheme, &configuration, &icons);
        let flinger = Flinger::new(paris(), 18.0);

        let cafes: Vec<Entity> = (0..300)
            .map(|id| {
                Entity::node(id, GeoPoint::new(48.862, 2.287), tag_set(&[("amenity", "cafe")]))
            })
            .collect();
        let mut recorder = Recorder::default();
        painter.paint(&cafes, &flinger, &mut recorder);

        assert_eq!(300, recorder.calls.len());
        let icons_of = |call: &RenderCall| match &call.kind {
            RenderKind::Icon { icon, .. } => Some(icon.clone()),
            _ => None,
        };
        let first = icons_of(&recorder.calls[0]).unwrap();
        assert!(recorder
            .calls
            .iter()
            .all(|call| icons_of(call).map_or(false, |icon| Arc::ptr_eq(&icon, &first))));
        assert_eq!(1, icons.len());
    }

    #[test]
    fn test_markers_are_small() {
        let scheme = scheme();
        let configuration = MapConfiguration {
            show_missing_tags: true,
            ..Default::default()
        };
        let icons = IconCache::new();
        let painter = Painter::new(&scheme, &configuration, &icons);
        let flinger = Flinger::new(paris(), 18.0);
        let calls = painter.render_calls(
            &Entity::node(7, GeoPoint::new(48.862, 2.287), tag_set(&[("foo", "bar")])),
            &flinger,
        );
        assert_eq!(1, calls.len());
        assert!(matches!(calls[0].kind, RenderKind::Icon { scale, .. } if scale == MARKER_SCALE));
    }

    #[test]
    fn test_labels_sit_under_extra_icons() {
        let scheme = scheme();
        let configuration = MapConfiguration {
            label_mode: LabelMode::All,
            ..Default::default()
        };
        let icons = IconCache::new();
        let painter = Painter::new(&scheme, &configuration, &icons);
        let flinger = Flinger::new(paris(), 18.0);
        let position = GeoPoint::new(48.862, 2.287);
        let cafe = Entity::node(
            8,
            position,
            tag_set(&[
                ("amenity", "cafe"),
                ("wheelchair", "yes"),
                ("name", "Café Paul"),
                ("cuisine", "french"),
            ]),
        );

        let calls = painter.render_calls(&cafe, &flinger);
        let texts: Vec<(&str, Point)> = calls
            .iter()
            .filter_map(|call| match &call.kind {
                RenderKind::Text { text, position, .. } => Some((text.as_str(), *position)),
                _ => None,
            })
            .collect();
        assert_eq!(2, texts.len());
        assert_eq!("Café Paul", texts[0].0);
        assert_eq!("french", texts[1].0);
        let anchor = flinger.fling(position);
        assert_approx_eq!(anchor.y + EXTRA_ICON_SPACING + LABEL_OFFSET, texts[0].1.y);
        assert!(texts[1].1.y > texts[0].1.y);
        assert!(matches!(calls.last().map(|call| &call.kind), Some(RenderKind::Text { .. })));

        let main = MapConfiguration::default();
        let painter = Painter::new(&scheme, &main, &icons);
        let calls = painter.render_calls(&cafe, &flinger);
        let count = calls
            .iter()
            .filter(|call| matches!(call.kind, RenderKind::Text { .. }))
            .count();
        assert_eq!(1, count);
    }

    #[test]
    fn test_render_tiles() {
        let scheme = scheme();
        let configuration = MapConfiguration::default();
        let icons = IconCache::new();
        let painter = Painter::new(&scheme, &configuration, &icons);
        let tile_set = tiles_for(&paris(), 17).unwrap();
        let mut recorder = Recorder::default();

        let cancel = AtomicBool::new(false);
        let report = painter.render_tiles(&tile_set, &entities(), &mut recorder, &cancel);
        assert!(!report.cancelled);
        assert_eq!(tile_set.len(), report.rendered.len());
        assert_eq!(report.rendered, recorder.tiles);
        assert!(!recorder.calls.is_empty());
    }

    #[test]
    fn test_cancel_stops_between_tiles() {
        struct Cancelling<'a> {
            cancel: &'a AtomicBool,
            tiles: usize,
        }

        impl RenderBackend for Cancelling<'_> {
            fn draw(&mut self, _call: &RenderCall) {}

            fn end_tile(&mut self, _tile: &TileDescriptor) {
                self.tiles += 1;
                self.cancel.store(true, Ordering::Relaxed);
            }
        }

        let scheme = scheme();
        let configuration = MapConfiguration::default();
        let icons = IconCache::new();
        let painter = Painter::new(&scheme, &configuration, &icons);
        let tile_set = tiles_for(&paris(), 18).unwrap();
        assert!(tile_set.len() > 1);

        let cancel = AtomicBool::new(false);
        let mut backend = Cancelling {
            cancel: &cancel,
            tiles: 0,
        };
        let report = painter.render_tiles(&tile_set, &entities(), &mut backend, &cancel);
        assert!(report.cancelled);
        assert_eq!(1, report.rendered.len());
        assert_eq!(1, backend.tiles);
    }
}
