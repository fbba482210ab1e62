//! Shape library: the primitive pictograms icons are composed from.
//!
//! Shapes are authored on a shared 14×14 grid. A shape's default offset moves
//! its grid cell so that the cell center lands on the icon anchor.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::geometry::Point;
use crate::path::{parse_path, PathCommand};

/// Side of the square grid every shape is drawn on.
pub const ICON_GRID: f64 = 14.0;

/// Shape used when nothing more specific is known.
pub const DEFAULT_SHAPE_ID: &str = "default";

/// Small dot used for secondary markers.
pub const DEFAULT_SMALL_SHAPE_ID: &str = "default_small";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Left,
    Right,
}

/// Shape as written in the scheme file.
#[derive(Clone, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct ShapeDefinition {
    pub path: String,
    pub name: Option<String>,
    pub offset: Option<Point>,
    #[serde(default = "yes")]
    pub node: bool,
    #[serde(default = "yes")]
    pub area: bool,
    pub directed: Option<Facing>,
}

fn yes() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    pub id: String,
    pub name: Option<String>,
    pub path: Vec<PathCommand>,
    pub offset: Point,
    pub for_node: bool,
    pub for_area: bool,
    /// Shapes with a facing may be mirrored to follow a `direction` tag.
    pub directed: Option<Facing>,
}

impl Shape {
    pub fn from_definition(id: &str, definition: &ShapeDefinition) -> Result<Shape> {
        let path = parse_path(&definition.path)
            .map_err(|error| Error::InvalidScheme(format!("shape `{}`: {}", id, error)))?;
        Ok(Shape {
            id: id.to_owned(),
            name: definition.name.clone(),
            path,
            offset: definition
                .offset
                .unwrap_or(Point::new(-ICON_GRID / 2.0, -ICON_GRID / 2.0)),
            for_node: definition.node,
            for_area: definition.area,
            directed: definition.directed,
        })
    }

    /// A shape is closed when every one of its subpaths ends with a close
    /// command; open shapes are stroked rather than filled.
    pub fn is_closed(&self) -> bool {
        let mut open = false;
        for command in &self.path {
            match command {
                PathCommand::MoveTo(_) if open => return false,
                PathCommand::MoveTo(_) => open = true,
                PathCommand::Close => open = false,
                _ => {}
            }
        }
        !open
    }

    /// Path placed at `offset` grid units from the default position,
    /// optionally mirrored inside its grid cell first.
    pub fn placed_path(&self, offset: Point, mirrored: bool) -> Vec<PathCommand> {
        let shift = self.offset + offset;
        self.path
            .iter()
            .map(|command| {
                let command = if mirrored {
                    command.mirror(ICON_GRID / 2.0)
                } else {
                    command.clone()
                };
                command.translate(shift)
            })
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct ShapeLibrary {
    shapes: HashMap<String, Shape>,
    fallback: Shape,
}

impl ShapeLibrary {
    pub fn from_definitions<'a, I>(definitions: I) -> Result<ShapeLibrary>
    where
        I: IntoIterator<Item = (&'a String, &'a ShapeDefinition)>,
    {
        let shapes = definitions
            .into_iter()
            .map(|(id, definition)| Ok((id.clone(), Shape::from_definition(id, definition)?)))
            .collect::<Result<HashMap<_, _>>>()?;

        let missing =
            |id: &str| Error::InvalidScheme(format!("shape library has no `{}` shape", id));
        if !shapes.contains_key(DEFAULT_SMALL_SHAPE_ID) {
            return Err(missing(DEFAULT_SMALL_SHAPE_ID));
        }
        let fallback = shapes
            .get(DEFAULT_SHAPE_ID)
            .cloned()
            .ok_or_else(|| missing(DEFAULT_SHAPE_ID))?;

        Ok(ShapeLibrary { shapes, fallback })
    }

    pub fn get(&self, id: &str) -> Option<&Shape> {
        self.shapes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.shapes.contains_key(id)
    }

    /// Shape by identifier, or the default shape for unknown identifiers.
    pub fn get_or_default(&self, id: &str) -> &Shape {
        self.shapes.get(id).unwrap_or(&self.fallback)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}
