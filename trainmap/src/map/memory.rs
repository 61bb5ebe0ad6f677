//! Headless in-memory map surface.

use std::collections::BTreeMap;

use tracing::trace;

use super::{LayerId, MapError, MapSurface, MarkerIcon, MarkerSpec, PathStyle};
use crate::model::Coordinate;

/// A layer held by [`MemoryMap`].
#[derive(Debug, Clone, PartialEq)]
pub enum MapLayer {
    Marker(MarkerSpec),
    Path {
        points: Vec<Coordinate>,
        style: PathStyle,
    },
}

/// Map surface that keeps its layers in memory.
///
/// Handles are allocated from a counter and never reused, so a stale handle
/// can never alias a newer layer.
#[derive(Debug, Clone)]
pub struct MemoryMap {
    layers: BTreeMap<LayerId, MapLayer>,
    next_id: u64,
    center: Coordinate,
    zoom: u8,
    added: u64,
    removed: u64,
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMap {
    /// Empty map centered on (0, 0).
    pub fn new() -> Self {
        Self::with_view(Coordinate::new(0.0, 0.0), 1)
    }

    /// Empty map with an initial view.
    pub fn with_view(center: Coordinate, zoom: u8) -> Self {
        Self {
            layers: BTreeMap::new(),
            next_id: 1,
            center,
            zoom,
            added: 0,
            removed: 0,
        }
    }

    pub fn center(&self) -> Coordinate {
        self.center
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Number of layers currently on the map.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn contains(&self, layer: LayerId) -> bool {
        self.layers.contains_key(&layer)
    }

    pub fn layer(&self, layer: LayerId) -> Option<&MapLayer> {
        self.layers.get(&layer)
    }

    /// Number of markers using `icon`.
    pub fn marker_count(&self, icon: MarkerIcon) -> usize {
        self.layers
            .values()
            .filter(|l| matches!(l, MapLayer::Marker(m) if m.icon == icon))
            .count()
    }

    pub fn path_count(&self) -> usize {
        self.layers
            .values()
            .filter(|l| matches!(l, MapLayer::Path { .. }))
            .count()
    }

    /// Total layers ever added.
    pub fn added_total(&self) -> u64 {
        self.added
    }

    /// Total layers ever removed.
    pub fn removed_total(&self) -> u64 {
        self.removed
    }

    pub fn iter(&self) -> impl Iterator<Item = (LayerId, &MapLayer)> {
        self.layers.iter().map(|(id, layer)| (*id, layer))
    }

    fn insert(&mut self, layer: MapLayer) -> LayerId {
        let id = LayerId::new(self.next_id);
        self.next_id += 1;
        self.layers.insert(id, layer);
        self.added += 1;
        id
    }
}

impl MapSurface for MemoryMap {
    fn add_marker(&mut self, marker: MarkerSpec) -> Result<LayerId, MapError> {
        marker.position.validate()?;
        let icon = marker.icon;
        let id = self.insert(MapLayer::Marker(marker));
        trace!(layer = %id, ?icon, "Marker added");
        Ok(id)
    }

    fn move_marker(&mut self, layer: LayerId, position: Coordinate) -> Result<(), MapError> {
        position.validate()?;
        match self.layers.get_mut(&layer) {
            Some(MapLayer::Marker(marker)) => {
                marker.position = position;
                Ok(())
            }
            _ => Err(MapError::UnknownLayer(layer)),
        }
    }

    fn add_path(&mut self, path: &[Coordinate], style: &PathStyle) -> Result<LayerId, MapError> {
        if path.len() < 2 {
            return Err(MapError::PathTooShort(path.len()));
        }
        for point in path {
            point.validate()?;
        }
        let id = self.insert(MapLayer::Path {
            points: path.to_vec(),
            style: style.clone(),
        });
        trace!(layer = %id, points = path.len(), "Path added");
        Ok(id)
    }

    fn remove_layer(&mut self, layer: LayerId) -> bool {
        let removed = self.layers.remove(&layer).is_some();
        if removed {
            self.removed += 1;
            trace!(layer = %layer, "Layer removed");
        }
        removed
    }
}
