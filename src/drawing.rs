//! Renderable primitives handed to the backend.

use crate::color::Color;
use crate::geometry::Point;
use crate::path::PathCommand;

/// Radial gradient of a single color whose opacity changes from the center
/// (`inner_opacity`) to the rim (`outer_opacity`).
#[derive(Clone, Debug, PartialEq)]
pub struct RadialGradient {
    pub center: Point,
    pub radius: f64,
    pub color: Color,
    pub inner_opacity: f64,
    pub outer_opacity: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Paint {
    None,
    Solid(Color),
    Radial(RadialGradient),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PaintStyle {
    pub fill: Paint,
    pub stroke: Option<Color>,
    pub stroke_width: f64,
    pub dash: Option<Vec<f64>>,
    /// Named fill pattern drawn over `fill`, if the backend knows it.
    pub pattern: Option<String>,
    pub opacity: f64,
}

impl Default for PaintStyle {
    fn default() -> Self {
        PaintStyle {
            fill: Paint::None,
            stroke: None,
            stroke_width: 1.0,
            dash: None,
            pattern: None,
            opacity: 1.0,
        }
    }
}

impl PaintStyle {
    pub fn filled(color: Color) -> Self {
        PaintStyle {
            fill: Paint::Solid(color),
            ..Default::default()
        }
    }

    pub fn stroked(color: Color, width: f64) -> Self {
        PaintStyle {
            stroke: Some(color),
            stroke_width: width,
            ..Default::default()
        }
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Path {
        commands: Vec<PathCommand>,
        style: PaintStyle,
    },
    Circle {
        center: Point,
        radius: f64,
        style: PaintStyle,
    },
}

impl Primitive {
    pub fn style(&self) -> &PaintStyle {
        match self {
            Primitive::Path { style, .. } | Primitive::Circle { style, .. } => style,
        }
    }

    /// Every point the primitive passes through; a circle contributes its
    /// center.
    pub fn points(&self) -> Vec<Point> {
        match self {
            Primitive::Path { commands, .. } => commands
                .iter()
                .filter_map(|command| match command {
                    PathCommand::MoveTo(p)
                    | PathCommand::LineTo(p)
                    | PathCommand::QuadTo(_, p)
                    | PathCommand::CubicTo(_, _, p) => Some(*p),
                    PathCommand::ArcTo { to, .. } => Some(*to),
                    PathCommand::Close => None,
                })
                .collect(),
            Primitive::Circle { center, .. } => vec![*center],
        }
    }
}

/// Path commands for an open polyline.
pub fn polyline(points: &[Point]) -> Vec<PathCommand> {
    points
        .iter()
        .enumerate()
        .map(|(i, point)| {
            if i == 0 {
                PathCommand::MoveTo(*point)
            } else {
                PathCommand::LineTo(*point)
            }
        })
        .collect()
}

/// Path commands for closed rings, each ring shifted by `shift`.
pub fn polygon(rings: &[Vec<Point>], shift: Point) -> Vec<PathCommand> {
    let mut commands = Vec::new();
    for ring in rings.iter().filter(|ring| ring.len() > 2) {
        let shifted: Vec<Point> = ring.iter().map(|point| *point + shift).collect();
        commands.extend(polyline(&shifted));
        commands.push(PathCommand::Close);
    }
    commands
}
