//! Building massing.
//!
//! Heights are derived in metres from the level and height tags. In flat mode
//! a building is its plan polygon, tinted darker the more levels it has. In
//! isometric mode the footprint is extruded along a fixed screen vector: a
//! shade on the ground, then one slab of visible walls per level from the
//! bottom up, then the roof.

use tracing::warn;

use crate::color::{Color, DEFAULT_COLOR};
use crate::config::BuildingMode;
use crate::drawing::{polygon, Paint, PaintStyle, Primitive};
use crate::entity::{Entity, Geometry};
use crate::geometry::{ring_segments, signed_area, Point};
use crate::path::PathCommand;
use crate::tags::{get_float, get_length, MalformedTagValue, Tags};

use super::{GeneratorContext, GeneratorDirective};

/// Height of one building level, in metres.
pub const BUILDING_HEIGHT_SCALE: f64 = 2.5;

/// Levels assumed when no height information parses.
pub const DEFAULT_LEVELS: f64 = 1.0;

/// Heights above this, in metres, are treated as malformed.
pub const MAX_BUILDING_HEIGHT: f64 = 1000.0;

/// Most slabs a building is drawn with.
pub const MAX_SLABS: usize = 400;

const SHADE_OPACITY: f64 = 0.1;
const FLAT_SHADE_PER_LEVEL: f64 = 0.03;
const MAX_FLAT_SHADE: f64 = 0.5;

/// Screen shift per metre of height, before scaling. Walls rise up and to
/// the left, so faces turned down and to the right are visible.
const EXTRUSION: Point = Point::new(-0.5, -1.0);

/// Vertical extent of a building in metres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Massing {
    pub min_height: f64,
    pub height: f64,
}

impl Massing {
    /// Reads `building:levels`, then `height`; the bottom from
    /// `building:min_level`, then `min_height`. Unparseable values and
    /// heights above `MAX_BUILDING_HEIGHT` are skipped.
    pub fn from_tags(tags: &Tags) -> Massing {
        let height = get_float(tags, "building:levels")
            .filter(|levels| *levels > 0.0)
            .and_then(|levels| bounded(tags, "building:levels", levels * BUILDING_HEIGHT_SCALE))
            .or_else(|| {
                get_length(tags, "height")
                    .filter(|height| *height > 0.0)
                    .and_then(|height| bounded(tags, "height", height))
            })
            .unwrap_or(DEFAULT_LEVELS * BUILDING_HEIGHT_SCALE);

        let min_height = get_float(tags, "building:min_level")
            .and_then(|levels| bounded(tags, "building:min_level", levels * BUILDING_HEIGHT_SCALE))
            .or_else(|| {
                get_length(tags, "min_height")
                    .and_then(|min_height| bounded(tags, "min_height", min_height))
            })
            .unwrap_or(0.0);
        let min_height = if min_height < 0.0 || min_height >= height {
            warn!("building bottom {} m is not below its top {} m, using 0", min_height, height);
            0.0
        } else {
            min_height
        };

        Massing { min_height, height }
    }

    pub fn levels(&self) -> f64 {
        self.height / BUILDING_HEIGHT_SCALE
    }

    /// Level slabs as `(bottom, top)` heights; the last one may be partial.
    /// At most `MAX_SLABS` are returned.
    pub fn slabs(&self) -> Vec<(f64, f64)> {
        let span = self.height - self.min_height;
        if span.is_nan() || span <= 0.0 {
            return Vec::new();
        }
        let count = (span / BUILDING_HEIGHT_SCALE).ceil().min(MAX_SLABS as f64) as usize;
        (0..count)
            .map(|index| {
                let bottom = self.min_height + index as f64 * BUILDING_HEIGHT_SCALE;
                (bottom, (bottom + BUILDING_HEIGHT_SCALE).min(self.height))
            })
            .collect()
    }

    /// Screen distance between the footprint and the roof, in pixels.
    pub fn extruded_height(&self, scale: f64) -> f64 {
        (extrusion(scale) * (self.height - self.min_height)).length()
    }
}

/// `metres` when it is a believable building height.
fn bounded(tags: &Tags, key: &str, metres: f64) -> Option<f64> {
    if metres.abs() > MAX_BUILDING_HEIGHT {
        warn!("{}", MalformedTagValue::new(key, &tags[key]));
        return None;
    }
    Some(metres)
}

fn extrusion(scale: f64) -> Point {
    EXTRUSION * (scale / 3.0)
}

/// Colors of one building.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BuildingStyle {
    pub fill: Color,
    pub border: Color,
    pub draw_roof: bool,
}

fn wall(from: Point, to: Point, bottom: Point, top: Point, color: Color) -> Primitive {
    Primitive::Path {
        commands: vec![
            PathCommand::MoveTo(from + bottom),
            PathCommand::LineTo(to + bottom),
            PathCommand::LineTo(to + top),
            PathCommand::LineTo(from + top),
            PathCommand::Close,
        ],
        style: PaintStyle {
            stroke: Some(color),
            ..PaintStyle::filled(color)
        },
    }
}

/// Segments of every ring, each with its outward normal.
fn faces(outers: &[Vec<Point>], inners: &[Vec<Point>]) -> Vec<(Point, Point, Point)> {
    let mut faces = Vec::new();
    let rings = outers
        .iter()
        .map(|ring| (ring, false))
        .chain(inners.iter().map(|ring| (ring, true)));
    for (ring, is_inner) in rings {
        let counter = (signed_area(ring) > 0.0) != is_inner;
        for (from, to) in ring_segments(ring) {
            let d = to - from;
            let normal = if counter {
                Point::new(d.y, -d.x)
            } else {
                Point::new(-d.y, d.x)
            };
            faces.push((from, to, normal));
        }
    }
    faces
}

/// Shade, walls and roof of an extruded footprint. `scale` is pixels per
/// metre.
pub fn isometric(
    outers: &[Vec<Point>],
    inners: &[Vec<Point>],
    massing: &Massing,
    scale: f64,
    style: &BuildingStyle,
) -> Vec<Primitive> {
    let mut primitives = Vec::new();
    let rings: Vec<Vec<Point>> = outers.iter().chain(inners).cloned().collect();

    let shade_shift = |height: f64| Point::new(scale / 3.0 * height, 0.0);
    let mut shade = polygon(&rings, shade_shift(massing.min_height));
    for ring in &rings {
        for (from, to) in ring_segments(ring) {
            shade.extend([
                PathCommand::MoveTo(from + shade_shift(massing.min_height)),
                PathCommand::LineTo(to + shade_shift(massing.min_height)),
                PathCommand::LineTo(to + shade_shift(massing.height)),
                PathCommand::LineTo(from + shade_shift(massing.height)),
                PathCommand::Close,
            ]);
        }
    }
    primitives.push(Primitive::Path {
        commands: shade,
        style: PaintStyle::filled(Color::rgb(0, 0, 0)).with_opacity(SHADE_OPACITY),
    });

    let shift = extrusion(scale);
    let mut visible: Vec<(Point, Point, Point)> = faces(outers, inners)
        .into_iter()
        .filter(|(_, _, normal)| normal.dot(-EXTRUSION) > 0.0)
        .collect();
    // back to front
    visible.sort_by(|a, b| (a.0.y + a.1.y).total_cmp(&(b.0.y + b.1.y)));

    for (bottom, top) in massing.slabs() {
        for (from, to, normal) in &visible {
            let angle = normal.y.atan2(normal.x).abs() / std::f64::consts::PI;
            let color = Color::gray(0.8 + angle * 0.2);
            primitives.push(wall(*from, *to, shift * bottom, shift * top, color));
        }
    }

    if style.draw_roof {
        primitives.push(Primitive::Path {
            commands: polygon(&rings, shift * massing.height),
            style: PaintStyle {
                stroke: Some(style.border),
                ..PaintStyle::filled(style.fill)
            },
        });
    }
    primitives
}

/// Plan polygon tinted by the number of levels.
pub fn flat(
    outers: &[Vec<Point>],
    inners: &[Vec<Point>],
    massing: &Massing,
    style: &BuildingStyle,
) -> Primitive {
    let rings: Vec<Vec<Point>> = outers.iter().chain(inners).cloned().collect();
    let shade = (massing.levels() * FLAT_SHADE_PER_LEVEL).min(MAX_FLAT_SHADE);
    Primitive::Path {
        commands: polygon(&rings, Point::default()),
        style: PaintStyle {
            fill: Paint::Solid(style.fill.darken(shade)),
            stroke: Some(style.border),
            ..Default::default()
        },
    }
}

pub fn generate(
    directive: &GeneratorDirective,
    entity: &Entity,
    context: &GeneratorContext<'_>,
) -> Vec<Primitive> {
    let Geometry::Polygon { outers, inners } = &entity.geometry else {
        return Vec::new();
    };
    let flinger = context.flinger;
    let outers: Vec<Vec<Point>> = outers.iter().map(|ring| flinger.fling_all(ring)).collect();
    let inners: Vec<Vec<Point>> = inners.iter().map(|ring| flinger.fling_all(ring)).collect();

    let massing = Massing::from_tags(&directive.inputs);
    let style = BuildingStyle {
        fill: directive.params.color.unwrap_or(DEFAULT_COLOR),
        border: directive.params.border_color.unwrap_or(DEFAULT_COLOR),
        draw_roof: context.configuration.draw_roofs,
    };

    match context.configuration.building_mode {
        BuildingMode::No => Vec::new(),
        BuildingMode::Flat => vec![flat(&outers, &inners, &massing, &style)],
        BuildingMode::Isometric | BuildingMode::IsometricNoParts => {
            let scale = entity
                .anchor()
                .map_or_else(|| flinger.central_scale(), |anchor| flinger.scale(anchor));
            isometric(&outers, &inners, &massing, scale, &style)
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::tags::tag_set;

    fn footprint() -> Vec<Vec<Point>> {
        vec![vec![
            Point::new(0.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(20.0, 10.0),
            Point::new(0.0, 10.0),
        ]]
    }

    fn style() -> BuildingStyle {
        BuildingStyle {
            fill: Color::rgb(0xd8, 0xd0, 0xc8),
            border: Color::rgb(0xc3, 0xb8, 0xb0),
            draw_roof: true,
        }
    }

    fn top(primitives: &[Primitive]) -> f64 {
        primitives
            .iter()
            .flat_map(|primitive| primitive.points())
            .map(|point| point.y)
            .fold(f64::INFINITY, f64::min)
    }

    #[test]
    fn test_heights_fall_back_in_order() {
        let levels = Massing::from_tags(&tag_set(&[("building:levels", "4"), ("height", "30")]));
        assert_approx_eq!(10.0, levels.height);
        let height =
            Massing::from_tags(&tag_set(&[("building:levels", "many"), ("height", "30 m")]));
        assert_approx_eq!(30.0, height.height);
        let nothing = Massing::from_tags(&tag_set(&[("height", "tall")]));
        assert_approx_eq!(BUILDING_HEIGHT_SCALE, nothing.height);
        assert_approx_eq!(1.0, nothing.levels());

        let raised = Massing::from_tags(&tag_set(&[
            ("building:levels", "5"),
            ("building:min_level", "2"),
        ]));
        assert_approx_eq!(5.0, raised.min_height);
        let broken =
            Massing::from_tags(&tag_set(&[("building:levels", "1"), ("min_height", "20")]));
        assert_approx_eq!(0.0, broken.min_height);
    }

    #[test]
    fn test_absurd_heights_fall_back() {
        let absurd = Massing::from_tags(&tag_set(&[
            ("building:levels", "2e17"),
            ("building:min_level", "1e17"),
        ]));
        assert_eq!(
            Massing {
                min_height: 0.0,
                height: DEFAULT_LEVELS * BUILDING_HEIGHT_SCALE,
            },
            absurd
        );
        assert_eq!(1, absurd.slabs().len());

        let measured =
            Massing::from_tags(&tag_set(&[("building:levels", "1e8"), ("height", "40")]));
        assert_approx_eq!(40.0, measured.height);
        assert_eq!(16, measured.slabs().len());
    }

    #[test]
    fn test_slab_count_is_bounded() {
        let unreachable = Massing {
            min_height: 2.5e17,
            height: 5e17,
        };
        assert_eq!(MAX_SLABS, unreachable.slabs().len());
        let empty = Massing {
            min_height: 3.0,
            height: 3.0,
        };
        assert!(empty.slabs().is_empty());
    }

    #[test]
    fn test_slabs() {
        let massing = Massing {
            min_height: 0.0,
            height: 6.0,
        };
        assert_eq!(vec![(0.0, 2.5), (2.5, 5.0), (5.0, 6.0)], massing.slabs());
    }

    #[test]
    fn test_extruded_height_is_monotonic_in_levels() {
        let mut previous = (0.0, f64::INFINITY);
        for levels in 1..8 {
            let levels = levels.to_string();
            let massing = Massing::from_tags(&tag_set(&[("building:levels", levels.as_str())]));
            let primitives = isometric(&footprint(), &[], &massing, 2.0, &style());
            let extruded = massing.extruded_height(2.0);
            assert!(extruded > previous.0);
            assert!(top(&primitives) < previous.1);
            previous = (extruded, top(&primitives));
        }
    }

    #[test]
    fn test_isometric_draws_visible_walls_per_level() {
        let massing = Massing {
            min_height: 0.0,
            height: 5.0,
        };
        let primitives = isometric(&footprint(), &[], &massing, 3.0, &style());
        // shade, two visible faces on each of two slabs, roof
        assert_eq!(1 + 2 * 2 + 1, primitives.len());
        assert_approx_eq!(SHADE_OPACITY, primitives[0].style().opacity);
        assert_eq!(Paint::Solid(style().fill), primitives[5].style().fill);
        // walls of the lower slab come first
        assert!(top(&primitives[1..3]) > top(&primitives[3..5]));

        let mut reversed = footprint();
        reversed[0].reverse();
        assert_eq!(primitives.len(), isometric(&reversed, &[], &massing, 3.0, &style()).len());
    }

    #[test]
    fn test_flat_shade_grows_with_levels() {
        let massing = |levels: &str| Massing::from_tags(&tag_set(&[("building:levels", levels)]));
        let low = flat(&footprint(), &[], &massing("1"), &style());
        let high = flat(&footprint(), &[], &massing("9"), &style());
        let red = |primitive: &Primitive| match primitive.style().fill {
            Paint::Solid(color) => color.r,
            _ => 0,
        };
        assert!(red(&high) < red(&low));
    }
}
