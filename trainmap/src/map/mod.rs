//! Map surface abstraction.
//!
//! The engine never draws anything itself. Every visual change goes through
//! [`MapSurface`], which an embedding application implements on top of its
//! mapping library (marker creation with a bound popup, marker moves, path
//! layers, layer removal). Click events flow the other way, as
//! [`SessionEvent`](crate::session::SessionEvent)s.
//!
//! [`MemoryMap`] is a headless implementation that keeps layers in memory.
//! The CLI runs on it, and tests use it to count handles.

mod memory;

pub use memory::{MapLayer, MemoryMap};

use std::fmt;

use thiserror::Error;

use crate::model::{Coordinate, InvalidCoordinate};

/// Handle to a layer placed on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u64);

impl LayerId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer-{}", self.0)
    }
}

/// Which icon a marker uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerIcon {
    /// Train icon for a vehicle's current position.
    Vehicle,
    /// Default pin for a stop of the selected trip.
    Station,
}

/// Everything needed to place a marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub position: Coordinate,
    pub icon: MarkerIcon,
    /// Popup content bound to the marker.
    pub popup: String,
    /// Whether opening the popup pans the map.
    pub auto_pan: bool,
}

impl MarkerSpec {
    /// Vehicle marker; its popup never pans the map since the marker moves.
    pub fn vehicle(position: Coordinate, popup: impl Into<String>) -> Self {
        Self {
            position,
            icon: MarkerIcon::Vehicle,
            popup: popup.into(),
            auto_pan: false,
        }
    }

    pub fn station(position: Coordinate, popup: impl Into<String>) -> Self {
        Self {
            position,
            icon: MarkerIcon::Station,
            popup: popup.into(),
            auto_pan: true,
        }
    }
}

/// Stroke style of a path layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PathStyle {
    pub color: String,
    pub weight: u32,
    pub opacity: f64,
}

impl Default for PathStyle {
    fn default() -> Self {
        Self {
            color: "blue".to_string(),
            weight: 4,
            opacity: 1.0,
        }
    }
}

/// Errors reported by a map surface.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapError {
    /// The surface refused a coordinate.
    #[error("map rejected {0}")]
    InvalidCoordinate(#[from] InvalidCoordinate),

    /// The handle does not refer to a layer on this map.
    #[error("unknown {0}")]
    UnknownLayer(LayerId),

    /// A path needs at least two points.
    #[error("path has {0} point(s), need at least 2")]
    PathTooShort(usize),

    /// Surface-specific failure.
    #[error("map surface error: {0}")]
    Surface(String),
}

/// Operations the engine needs from a mapping library.
///
/// Implementations own the actual drawing. Handles returned by the `add_*`
/// methods stay valid until passed to [`remove_layer`](Self::remove_layer).
pub trait MapSurface {
    /// Place a marker with its popup and return its handle.
    fn add_marker(&mut self, marker: MarkerSpec) -> Result<LayerId, MapError>;

    /// Move an existing marker.
    fn move_marker(&mut self, layer: LayerId, position: Coordinate) -> Result<(), MapError>;

    /// Draw a polyline through `path`.
    fn add_path(&mut self, path: &[Coordinate], style: &PathStyle) -> Result<LayerId, MapError>;

    /// Remove a layer. Returns `false` if the handle was unknown.
    fn remove_layer(&mut self, layer: LayerId) -> bool;
}

/// Remove every handle in `layers`, returning how many were on the map.
pub fn remove_all(map: &mut dyn MapSurface, layers: &[LayerId]) -> usize {
    layers.iter().filter(|l| map.remove_layer(**l)).count()
}
