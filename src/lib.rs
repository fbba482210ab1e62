//! # Map Stylist
//!
//! Styling engine for OpenStreetMap data: decides how every map entity is
//! drawn from its tags, and renders the result through a pluggable backend.
//!
//! ## Current status
//!
//! The rule engine and the geometry generators should be regarded as stable in
//! terms of behavior, but not yet in terms of trait and method signatures. We
//! are releasing this code in Rust tradition as 0.x until we feel the
//! interface and feature set have stabilized.
//!
//! ## Current features
//!
//! Given a style scheme (a YAML file, or the one shipped with the crate) and
//! entities with resolved coordinates, this crate will
//!
//! * match entities against the scheme rules and resolve conflicts between
//!   them into icons, lines, fills and generator calls;
//! * compose and memoize multi-layer icons;
//! * generate isometric buildings, direction sectors, lane separators, craters
//!   and tree crowns;
//! * build text labels from names, addresses and descriptive tags;
//! * cover a bounding box with slippy map tiles and render each tile.
//!
//! ## Known Limitations
//!
//! Reading OSM files and writing image formats are left to the calling
//! application. The crate hands out vector primitives through the
//! `RenderBackend` trait and never touches the file system besides reading
//! scheme and configuration files the caller points it to.

#![deny(warnings)]

pub mod bounding_box;
pub mod color;
pub mod config;
pub mod drawing;
pub mod entity;
pub mod error;
pub mod flinger;
pub mod generator;
pub mod geometry;
pub mod icon;
pub mod label;
pub mod painter;
pub mod path;
pub mod predicate;
pub mod resolver;
pub mod scheme;
pub mod shape;
pub mod tags;
pub mod tile;

pub use bounding_box::BoundingBox;
pub use config::{BuildingMode, MapConfiguration};
pub use entity::{Entity, GeoPoint};
pub use error::{Error, Result};
pub use flinger::Flinger;
pub use icon::IconCache;
pub use label::{Label, LabelMode};
pub use painter::{Painter, RenderCall, RenderKind, TileReport};
pub use resolver::{Resolution, Resolver};
pub use scheme::Scheme;
pub use tile::{Tile, TileDescriptor, TileSet};

/// This is the main trait implemented by users of this crate: it receives
/// render calls in draw order. Tile batches bracket every tile with
/// `begin_tile` and `end_tile`.
pub trait RenderBackend {
    fn draw(&mut self, call: &RenderCall);

    fn begin_tile(&mut self, _tile: &TileDescriptor) {}

    fn end_tile(&mut self, _tile: &TileDescriptor) {}
}
