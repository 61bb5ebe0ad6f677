//! Marker registry: vehicle id to on-map state.
//!
//! The registry is the only owner of visual handles. Each tracked vehicle has
//! a [`MarkerEntry`] holding its primary marker, the detail slot used by the
//! selection controller, and the token of the last snapshot that contained
//! it. Layers are only ever removed through [`MarkerRegistry::sweep`],
//! [`MarkerRegistry::teardown`] or the selection controller's deselect, so no
//! handle is forgotten while still on the map.
//!
//! # Reconciliation
//!
//! ```text
//! snapshot N ──► upsert(v, N) for every vehicle ──► sweep(N)
//!                 │ new id    → add marker             │ token != N
//!                 │ known id  → move marker            ▼
//!                 └ token := N                 deselect if active,
//!                                              remove marker, drop entry
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use tracing::{debug, warn};

use crate::map::{remove_all, LayerId, MapError, MapSurface, MarkerSpec};
use crate::model::{Coordinate, SnapshotToken, TripId, VehiclePosition};
use crate::render::PopupFormatter;
use crate::selection::{SelectionController, SelectionTicket};

/// What the registry remembers about a vehicle between snapshots.
///
/// Used to match deep links whose identifier scheme differs from the feed's.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleSummary {
    pub line_name: String,
    pub direction: String,
    pub final_arrival: Option<DateTime<FixedOffset>>,
}

impl From<&VehiclePosition> for VehicleSummary {
    fn from(vehicle: &VehiclePosition) -> Self {
        Self {
            line_name: vehicle.line.name.clone(),
            direction: vehicle.direction.clone(),
            final_arrival: vehicle.final_arrival(),
        }
    }
}

/// Detail layers of one entry.
///
/// A fetch in flight is represented by `Pending`; its result is only stored
/// if the slot still holds the same ticket when it arrives.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DetailSlot {
    #[default]
    Empty,
    Pending(SelectionTicket),
    Ready {
        ticket: SelectionTicket,
        layers: Vec<LayerId>,
    },
}

impl DetailSlot {
    /// Resolved layer handles (empty unless `Ready`).
    pub fn layers(&self) -> &[LayerId] {
        match self {
            DetailSlot::Ready { layers, .. } => layers,
            _ => &[],
        }
    }

    pub fn ticket(&self) -> Option<SelectionTicket> {
        match self {
            DetailSlot::Empty => None,
            DetailSlot::Pending(ticket) | DetailSlot::Ready { ticket, .. } => Some(*ticket),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, DetailSlot::Empty)
    }
}

/// On-map state of one tracked vehicle.
#[derive(Debug, Clone)]
pub struct MarkerEntry {
    marker: LayerId,
    position: Coordinate,
    summary: VehicleSummary,
    detail: DetailSlot,
    last_seen: SnapshotToken,
}

impl MarkerEntry {
    /// Handle of the primary (vehicle) marker.
    pub fn marker(&self) -> LayerId {
        self.marker
    }

    pub fn position(&self) -> Coordinate {
        self.position
    }

    pub fn summary(&self) -> &VehicleSummary {
        &self.summary
    }

    pub fn detail(&self) -> &DetailSlot {
        &self.detail
    }

    pub fn last_seen(&self) -> SnapshotToken {
        self.last_seen
    }
}

/// Result of a successful [`MarkerRegistry::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// A new marker was placed.
    Created(LayerId),
    /// The existing marker was moved.
    Moved,
}

/// Mapping from vehicle id to its on-map state.
///
/// Entries are kept sorted by id so iteration order is stable.
#[derive(Debug, Default)]
pub struct MarkerRegistry {
    entries: BTreeMap<TripId, MarkerEntry>,
    formatter: PopupFormatter,
}

impl MarkerRegistry {
    pub fn new(formatter: PopupFormatter) -> Self {
        Self {
            entries: BTreeMap::new(),
            formatter,
        }
    }

    /// Create or move the vehicle's primary marker and stamp it with `token`.
    ///
    /// Detail layers of an existing entry are never touched. If the map
    /// rejects a new marker no entry is created; if it rejects a move the
    /// entry keeps its old position but is still stamped.
    pub fn upsert(
        &mut self,
        vehicle: &VehiclePosition,
        token: SnapshotToken,
        map: &mut dyn MapSurface,
    ) -> Result<Upsert, MapError> {
        if let Some(entry) = self.entries.get_mut(&vehicle.trip_id) {
            entry.last_seen = token;
            entry.summary = VehicleSummary::from(vehicle);
            map.move_marker(entry.marker, vehicle.location)?;
            entry.position = vehicle.location;
            return Ok(Upsert::Moved);
        }

        let popup = self.formatter.vehicle_label(vehicle);
        let marker = map.add_marker(MarkerSpec::vehicle(vehicle.location, popup))?;
        self.entries.insert(
            vehicle.trip_id.clone(),
            MarkerEntry {
                marker,
                position: vehicle.location,
                summary: VehicleSummary::from(vehicle),
                detail: DetailSlot::Empty,
                last_seen: token,
            },
        );
        debug!(trip_id = %vehicle.trip_id, layer = %marker, "Vehicle marker created");
        Ok(Upsert::Created(marker))
    }

    /// Expire every entry not stamped with `token`.
    ///
    /// An expiring vehicle that is the active selection is deselected first.
    /// Returns the expired ids in registry order.
    pub fn sweep(
        &mut self,
        token: SnapshotToken,
        selection: &mut SelectionController,
        map: &mut dyn MapSurface,
    ) -> Vec<TripId> {
        let stale: Vec<TripId> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.last_seen != token)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            if selection.active() == Some(id) {
                selection.deselect(id, self, map);
            }
            if let Some(entry) = self.remove_entry(id, map) {
                debug!(trip_id = %id, last_seen = %entry.last_seen, "Vehicle expired");
            }
        }

        stale
    }

    pub fn get(&self, id: &TripId) -> Option<&MarkerEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &TripId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in id order.
    pub fn entries(&self) -> impl Iterator<Item = (&TripId, &MarkerEntry)> {
        self.entries.iter()
    }

    /// Number of entries whose detail slot holds resolved layers.
    pub fn entries_with_detail(&self) -> usize {
        self.entries
            .values()
            .filter(|e| !e.detail.layers().is_empty())
            .count()
    }

    /// Total resolved detail layers across all entries.
    pub fn detail_layer_count(&self) -> usize {
        self.entries.values().map(|e| e.detail.layers().len()).sum()
    }

    /// Remove every layer and forget all entries. Returns layers removed.
    pub fn teardown(&mut self, map: &mut dyn MapSurface) -> usize {
        let ids: Vec<TripId> = self.entries.keys().cloned().collect();
        let mut removed = 0;
        for id in ids {
            if let Some(entry) = self.entries.remove(&id) {
                removed += remove_all(map, entry.detail.layers());
                removed += usize::from(map.remove_layer(entry.marker));
            }
        }
        removed
    }

    /// Replace an entry's detail slot. Returns `None` for unknown ids.
    pub(crate) fn set_detail(&mut self, id: &TripId, slot: DetailSlot) -> Option<DetailSlot> {
        self.entries
            .get_mut(id)
            .map(|entry| std::mem::replace(&mut entry.detail, slot))
    }

    /// Take an entry's detail slot, leaving it empty.
    pub(crate) fn take_detail(&mut self, id: &TripId) -> Option<DetailSlot> {
        self.set_detail(id, DetailSlot::Empty)
    }

    fn remove_entry(&mut self, id: &TripId, map: &mut dyn MapSurface) -> Option<MarkerEntry> {
        let entry = self.entries.remove(id)?;
        let orphaned = remove_all(map, entry.detail.layers());
        if orphaned > 0 {
            warn!(trip_id = %id, layers = orphaned, "Removed detail layers of inactive vehicle");
        }
        map.remove_layer(entry.marker);
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{MarkerIcon, MemoryMap};
    use crate::testing::vehicle;

    fn token(n: u64) -> SnapshotToken {
        SnapshotToken::new(n)
    }

    #[test]
    fn test_upsert_creates_then_moves() {
        let mut registry = MarkerRegistry::default();
        let mut map = MemoryMap::new();

        let created = registry
            .upsert(&vehicle("T1", 54.31, 10.12), token(1), &mut map)
            .unwrap();
        let marker = match created {
            Upsert::Created(id) => id,
            other => panic!("expected creation, got {:?}", other),
        };

        let moved = registry
            .upsert(&vehicle("T1", 54.32, 10.13), token(2), &mut map)
            .unwrap();

        assert_eq!(moved, Upsert::Moved);
        let entry = registry.get(&TripId::from("T1")).unwrap();
        assert_eq!(entry.marker(), marker);
        assert_eq!(entry.position(), Coordinate::new(54.32, 10.13));
        assert_eq!(entry.last_seen(), token(2));
        assert_eq!(map.marker_count(MarkerIcon::Vehicle), 1);
    }

    #[test]
    fn test_upsert_keeps_detail_layers() {
        let mut registry = MarkerRegistry::default();
        let mut map = MemoryMap::new();
        let id = TripId::from("T1");
        registry
            .upsert(&vehicle("T1", 54.31, 10.12), token(1), &mut map)
            .unwrap();
        let slot = DetailSlot::Ready {
            ticket: SelectionTicket::new(7),
            layers: vec![LayerId::new(100)],
        };
        registry.set_detail(&id, slot.clone());

        registry
            .upsert(&vehicle("T1", 54.0, 10.0), token(2), &mut map)
            .unwrap();

        assert_eq!(registry.get(&id).unwrap().detail(), &slot);
    }

    #[test]
    fn test_sweep_removes_entries_absent_from_snapshot() {
        let mut registry = MarkerRegistry::default();
        let mut selection = SelectionController::new();
        let mut map = MemoryMap::new();
        registry.upsert(&vehicle("A", 54.0, 10.0), token(1), &mut map).unwrap();
        registry.upsert(&vehicle("B", 54.1, 10.1), token(1), &mut map).unwrap();
        registry.upsert(&vehicle("A", 54.0, 10.0), token(2), &mut map).unwrap();

        let expired = registry.sweep(token(2), &mut selection, &mut map);

        assert_eq!(expired, vec![TripId::from("B")]);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&TripId::from("A")));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_sweep_on_empty_snapshot_clears_everything() {
        let mut registry = MarkerRegistry::default();
        let mut selection = SelectionController::new();
        let mut map = MemoryMap::new();
        registry.upsert(&vehicle("T1", 54.31, 10.12), token(1), &mut map).unwrap();

        registry.sweep(token(2), &mut selection, &mut map);

        assert!(registry.is_empty());
        assert!(map.is_empty());
    }

    #[test]
    fn test_failed_marker_creation_tracks_nothing() {
        let mut registry = MarkerRegistry::default();
        let mut map = crate::testing::FailingMap::fail_after(0);

        let result = registry.upsert(&vehicle("T1", 54.31, 10.12), token(1), &mut map);

        assert!(result.is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_teardown_removes_all_layers() {
        let mut registry = MarkerRegistry::default();
        let mut map = MemoryMap::new();
        registry.upsert(&vehicle("A", 54.0, 10.0), token(1), &mut map).unwrap();
        registry.upsert(&vehicle("B", 54.1, 10.1), token(1), &mut map).unwrap();
        let station = map
            .add_marker(MarkerSpec::station(Coordinate::new(54.2, 10.2), "stop"))
            .unwrap();
        registry.set_detail(
            &TripId::from("A"),
            DetailSlot::Ready {
                ticket: SelectionTicket::new(1),
                layers: vec![station],
            },
        );

        assert_eq!(registry.teardown(&mut map), 3);
        assert!(registry.is_empty());
        assert!(map.is_empty());
    }

    #[test]
    fn test_summary_tracks_latest_snapshot() {
        let mut registry = MarkerRegistry::default();
        let mut map = MemoryMap::new();
        let mut v = vehicle("T1", 54.31, 10.12);
        registry.upsert(&v, token(1), &mut map).unwrap();

        v.direction = "Flensburg".to_string();
        registry.upsert(&v, token(2), &mut map).unwrap();

        assert_eq!(
            registry.get(&TripId::from("T1")).unwrap().summary().direction,
            "Flensburg"
        );
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        const IDS: [&str; 5] = ["A", "B", "C", "D", "E"];

        proptest! {
            #[test]
            fn test_registry_mirrors_latest_snapshot(
                snapshots in proptest::collection::vec(proptest::collection::vec(any::<bool>(), IDS.len()), 1..20)
            ) {
                let mut registry = MarkerRegistry::default();
                let mut selection = SelectionController::new();
                let mut map = MemoryMap::new();
                let mut current = SnapshotToken::default();

                for present in snapshots {
                    current = current.next();
                    let ids: Vec<&str> = IDS
                        .iter()
                        .zip(&present)
                        .filter(|(_, here)| **here)
                        .map(|(id, _)| *id)
                        .collect();
                    for (i, id) in ids.iter().enumerate() {
                        registry
                            .upsert(&vehicle(id, 54.0 + i as f64 * 0.01, 10.0), current, &mut map)
                            .unwrap();
                    }
                    registry.sweep(current, &mut selection, &mut map);

                    let tracked: Vec<&str> = registry.entries().map(|(id, _)| id.as_str()).collect();
                    prop_assert_eq!(tracked, ids);
                    prop_assert_eq!(map.marker_count(MarkerIcon::Vehicle), registry.len());
                    prop_assert_eq!(map.len(), registry.len());
                }
            }
        }
    }
}
