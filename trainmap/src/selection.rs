//! Selection controller.
//!
//! Owns the single active vehicle and its fetch-then-render cycle. Each
//! vehicle moves through:
//!
//! ```text
//!            select                 complete (ticket matches)
//!   Idle ───────────► Selecting ─────────────────────────► Selected
//!    ▲                    │                                    │
//!    └────────────────────┴────────────────────────────────────┘
//!      deselect / expiry / superseding select / fetch or render failure
//! ```
//!
//! Fetch results arrive asynchronously and may arrive out of order. Every
//! `select` allocates a fresh [`SelectionTicket`] and parks it in the entry's
//! detail slot as `Pending`. A completion is applied only while that exact
//! ticket is still parked there; anything else is a superseded result and is
//! dropped before it reaches the map.

use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fetch::FetchError;
use crate::map::{remove_all, MapError, MapSurface};
use crate::model::{TripDetail, TripId};
use crate::registry::{DetailSlot, MarkerRegistry};
use crate::render::LayerRenderer;

/// Identifies one selection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SelectionTicket(u64);

impl SelectionTicket {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SelectionTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ticket-{}", self.0)
    }
}

/// Selection state of one vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPhase {
    Idle,
    /// Fetch in flight, nothing drawn yet.
    Selecting,
    /// Detail layers on the map.
    Selected,
}

/// What happened to a fetch result handed to [`SelectionController::complete`].
#[derive(Debug)]
pub enum SelectionOutcome {
    /// Layers drawn; the vehicle is now selected.
    Selected { layers: usize },
    /// A newer selection or a deselect took over; result dropped.
    Superseded,
    /// The fetch failed; the vehicle is idle again.
    FetchFailed(FetchError),
    /// The map refused a layer; partial layers removed, vehicle idle again.
    RenderFailed(MapError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("vehicle {0} is not tracked")]
    UnknownVehicle(TripId),
}

/// Owns the active selection.
#[derive(Debug, Default)]
pub struct SelectionController {
    active: Option<TripId>,
    next_ticket: u64,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently selected (or selecting) vehicle.
    pub fn active(&self) -> Option<&TripId> {
        self.active.as_ref()
    }

    /// Phase of `id`, derived from its detail slot.
    pub fn phase(&self, id: &TripId, registry: &MarkerRegistry) -> SelectionPhase {
        match registry.get(id).map(|e| e.detail()) {
            Some(DetailSlot::Pending(_)) => SelectionPhase::Selecting,
            Some(DetailSlot::Ready { .. }) => SelectionPhase::Selected,
            _ => SelectionPhase::Idle,
        }
    }

    /// Start selecting `id`.
    ///
    /// Any current selection, including `id` itself, is deselected first.
    /// The returned ticket must accompany the fetch result passed to
    /// [`complete`](Self::complete).
    pub fn select(
        &mut self,
        id: &TripId,
        registry: &mut MarkerRegistry,
        map: &mut dyn MapSurface,
    ) -> Result<SelectionTicket, SelectionError> {
        if !registry.contains(id) {
            return Err(SelectionError::UnknownVehicle(id.clone()));
        }

        self.clear(registry, map);

        self.next_ticket += 1;
        let ticket = SelectionTicket(self.next_ticket);
        registry.set_detail(id, DetailSlot::Pending(ticket));
        self.active = Some(id.clone());

        debug!(trip_id = %id, %ticket, "Selection started");
        Ok(ticket)
    }

    /// Apply a fetch result if `ticket` is still the one parked for `id`.
    pub fn complete(
        &mut self,
        id: &TripId,
        ticket: SelectionTicket,
        result: Result<TripDetail, FetchError>,
        registry: &mut MarkerRegistry,
        map: &mut dyn MapSurface,
        renderer: &LayerRenderer,
    ) -> SelectionOutcome {
        let still_pending = matches!(
            registry.get(id).map(|e| e.detail()),
            Some(DetailSlot::Pending(parked)) if *parked == ticket
        );
        if !still_pending {
            debug!(trip_id = %id, %ticket, "Discarding superseded trip result");
            return SelectionOutcome::Superseded;
        }

        let trip = match result {
            Ok(trip) => trip,
            Err(e) => {
                warn!(trip_id = %id, error = %e, "Trip fetch failed, selection reverted");
                self.revert(id, registry);
                return SelectionOutcome::FetchFailed(e);
            }
        };

        match renderer.render(&trip, map) {
            Ok(layers) => {
                let count = layers.len();
                registry.set_detail(id, DetailSlot::Ready { ticket, layers });
                self.active = Some(id.clone());
                info!(trip_id = %id, layers = count, "Vehicle selected");
                SelectionOutcome::Selected { layers: count }
            }
            Err(partial) => {
                let removed = remove_all(map, &partial.layers);
                warn!(
                    trip_id = %id,
                    removed,
                    error = %partial.source,
                    "Rendering trip failed, selection reverted"
                );
                self.revert(id, registry);
                SelectionOutcome::RenderFailed(partial.source)
            }
        }
    }

    /// Remove `id`'s detail layers and return it to idle.
    ///
    /// A fetch still in flight for `id` is orphaned: its ticket is gone, so
    /// its result is discarded on arrival. Returns the number of layers
    /// removed; deselecting an idle vehicle removes nothing.
    pub fn deselect(
        &mut self,
        id: &TripId,
        registry: &mut MarkerRegistry,
        map: &mut dyn MapSurface,
    ) -> usize {
        let removed = registry
            .take_detail(id)
            .map(|slot| remove_all(map, slot.layers()))
            .unwrap_or(0);

        if self.active.as_ref() == Some(id) {
            self.active = None;
            debug!(trip_id = %id, removed, "Vehicle deselected");
        }
        removed
    }

    /// Deselect the active vehicle, if any.
    pub fn clear(&mut self, registry: &mut MarkerRegistry, map: &mut dyn MapSurface) -> usize {
        match self.active.clone() {
            Some(id) => self.deselect(&id, registry, map),
            None => 0,
        }
    }

    fn revert(&mut self, id: &TripId, registry: &mut MarkerRegistry) {
        registry.take_detail(id);
        if self.active.as_ref() == Some(id) {
            self.active = None;
        }
    }
}
