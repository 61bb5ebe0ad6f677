//! Map session: the event loop that owns the map.
//!
//! A [`MapSession`] owns the map surface, the marker registry and the
//! selection controller, and handles one [`SessionEvent`] at a time to
//! completion. Network work never runs inside the loop: trip fetches and
//! deep-link lookups are spawned as tasks that post their result back as an
//! event, so the only interleaving is between whole events.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  FeedMessage / FeedStatus
//! │FeedConnection│──────────────────────────┐
//! └──────────────┘                          ▼
//!  user input ──VehicleClicked/MapClicked──► ┌────────────────────────────┐
//!                                           │         MapSession         │
//!  ┌────────────┐  TripLoaded{ticket}       │  registry  selection  map  │
//!  │ fetch task │──────────────────────────►│                            │
//!  └────────────┘◄──── spawn on select ─────└────────────────────────────┘
//! ```
//!
//! # Snapshot handling
//!
//! Each snapshot is decoded and validated as a whole, then reconciled in
//! three steps: upsert every vehicle, try the pending deep link, sweep
//! every entry the snapshot did not contain.
//!
//! # Example
//!
//! ```ignore
//! use trainmap::session::{MapSession, SessionConfig};
//!
//! let (session, events) = MapSession::new(MemoryMap::new(), fetcher, SessionConfig::default());
//! let shutdown = CancellationToken::new();
//! tokio::spawn(FeedConnection::new(url).run(events.clone(), shutdown.clone()));
//!
//! let stats = session.run(shutdown).await;
//! ```

mod stats;

pub use stats::{SessionStats, SessionStatus};

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::deep_link::{
    DeepLink, DeepLinkMatch, DeepLinkTracker, ResolvedTrip, DEFAULT_MAX_MISSES,
};
use crate::feed::FeedStatus;
use crate::fetch::{DeepLinkResolver, FetchError, TripFetcher};
use crate::map::{MapSurface, PathStyle};
use crate::model::{PayloadError, Snapshot, SnapshotToken, TripDetail, TripId, UpdateStamp};
use crate::registry::{MarkerRegistry, Upsert};
use crate::render::{LayerRenderer, PopupFormatter};
use crate::selection::{
    SelectionController, SelectionError, SelectionOutcome, SelectionPhase, SelectionTicket,
};

// =============================================================================
// Configuration
// =============================================================================

/// Default capacity of the session event channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub channel_capacity: usize,
    pub path_style: PathStyle,
    pub formatter: PopupFormatter,
    /// Vehicle to auto-select once it shows up.
    pub deep_link: Option<DeepLink>,
    /// Snapshots to try before giving up on the deep link.
    pub deep_link_max_misses: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            path_style: PathStyle::default(),
            formatter: PopupFormatter::default(),
            deep_link: None,
            deep_link_max_misses: DEFAULT_MAX_MISSES,
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Everything that can happen to a session.
#[derive(Debug)]
pub enum SessionEvent {
    /// Raw text frame from the feed; decoded by the session.
    FeedMessage(String),
    /// Already decoded snapshot.
    Snapshot(Snapshot),
    /// Connection state change of the feed.
    FeedStatus(FeedStatus),
    /// The user clicked a vehicle marker.
    VehicleClicked(TripId),
    /// The user clicked the map background.
    MapClicked,
    /// A trip fetch finished.
    TripLoaded {
        trip_id: TripId,
        ticket: SelectionTicket,
        result: Result<TripDetail, FetchError>,
    },
    /// The deep-link lookup finished.
    DeepLinkResolved(Result<ResolvedTrip, FetchError>),
    /// Status query.
    Status(oneshot::Sender<SessionStatus>),
}

/// What one snapshot did to the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotReport {
    pub token: SnapshotToken,
    pub created: usize,
    pub moved: usize,
    /// Vehicles the map refused to place or move.
    pub failed: usize,
    pub expired: Vec<TripId>,
    /// Vehicle auto-selected through the deep link.
    pub auto_selected: Option<TripId>,
}

// =============================================================================
// Session
// =============================================================================

/// Live map session.
pub struct MapSession<M: MapSurface> {
    map: M,
    registry: MarkerRegistry,
    selection: SelectionController,
    renderer: LayerRenderer,
    fetcher: Arc<dyn TripFetcher>,
    resolver: Option<Arc<dyn DeepLinkResolver>>,
    deep_link: Option<DeepLinkTracker>,
    token: SnapshotToken,
    last_update: Option<UpdateStamp>,
    feed: FeedStatus,
    stats: SessionStats,
    started: bool,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
}

impl<M: MapSurface> MapSession<M> {
    /// Creates a session and the sender used to feed it events.
    pub fn new(
        map: M,
        fetcher: Arc<dyn TripFetcher>,
        config: SessionConfig,
    ) -> (Self, mpsc::Sender<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::channel(config.channel_capacity.max(1));
        let deep_link = config
            .deep_link
            .map(|link| DeepLinkTracker::new(link, config.deep_link_max_misses.max(1)));

        let session = Self {
            map,
            registry: MarkerRegistry::new(config.formatter.clone()),
            selection: SelectionController::new(),
            renderer: LayerRenderer::new(config.path_style, config.formatter),
            fetcher,
            resolver: None,
            deep_link,
            token: SnapshotToken::default(),
            last_update: None,
            feed: FeedStatus::default(),
            stats: SessionStats::default(),
            started: false,
            events_tx: events_tx.clone(),
            events_rx,
        };

        (session, events_tx)
    }

    /// Use `resolver` to match deep links whose id is not a feed id.
    pub fn with_resolver(mut self, resolver: Arc<dyn DeepLinkResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Another sender for this session's events.
    pub fn sender(&self) -> mpsc::Sender<SessionEvent> {
        self.events_tx.clone()
    }

    /// Kick off the deep-link lookup, if there is one to do.
    ///
    /// Called by [`run`](Self::run); only needed directly when driving the
    /// session with [`step`](Self::step). Must be called inside a tokio
    /// runtime.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        let (Some(tracker), Some(resolver)) = (self.deep_link.as_mut(), self.resolver.as_ref())
        else {
            return;
        };

        tracker.begin_resolution();
        let resolver = Arc::clone(resolver);
        let external_id = tracker.link().as_str().to_string();
        let tx = self.events_tx.clone();
        debug!(link = %external_id, "Resolving deep link");
        tokio::spawn(async move {
            let result = resolver.resolve(&external_id).await;
            let _ = tx.send(SessionEvent::DeepLinkResolved(result)).await;
        });
    }

    /// Handle one event to completion.
    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::FeedMessage(text) => match serde_json::from_str::<Snapshot>(&text) {
                Ok(snapshot) => {
                    let _ = self.apply_snapshot(snapshot);
                }
                Err(e) => {
                    self.stats.snapshots_dropped += 1;
                    warn!(error = %e, "Dropping malformed snapshot");
                }
            },
            SessionEvent::Snapshot(snapshot) => {
                let _ = self.apply_snapshot(snapshot);
            }
            SessionEvent::FeedStatus(status) => self.set_feed_status(status),
            SessionEvent::VehicleClicked(id) => {
                if let Err(e) = self.select(&id) {
                    warn!(error = %e, "Ignoring click");
                }
            }
            SessionEvent::MapClicked => {
                self.deselect_active();
            }
            SessionEvent::TripLoaded {
                trip_id,
                ticket,
                result,
            } => {
                self.complete(&trip_id, ticket, result);
            }
            SessionEvent::DeepLinkResolved(result) => {
                if let Some(tracker) = self.deep_link.as_mut() {
                    tracker.finish_resolution(result);
                }
            }
            SessionEvent::Status(reply) => {
                let _ = reply.send(self.status());
            }
        }
    }

    /// Reconcile a snapshot: upsert, deep link, sweep.
    ///
    /// An invalid snapshot is rejected whole and leaves the registry as it
    /// was.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) -> Result<SnapshotReport, PayloadError> {
        if let Err(e) = snapshot.validate() {
            self.stats.snapshots_dropped += 1;
            warn!(error = %e, "Dropping invalid snapshot");
            return Err(e);
        }

        self.token = self.token.next();
        let token = self.token;
        let mut report = SnapshotReport {
            token,
            ..SnapshotReport::default()
        };

        for vehicle in &snapshot.movements {
            match self.registry.upsert(vehicle, token, &mut self.map) {
                Ok(Upsert::Created(_)) => report.created += 1,
                Ok(Upsert::Moved) => report.moved += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(trip_id = %vehicle.trip_id, error = %e, "Vehicle marker update failed");
                }
            }
        }

        report.auto_selected = self.try_deep_link(token);
        report.expired = self
            .registry
            .sweep(token, &mut self.selection, &mut self.map);

        self.last_update = snapshot.realtime_data_updated_at;
        self.stats.snapshots_applied += 1;
        self.stats.vehicles_added += report.created as u64;
        self.stats.vehicles_expired += report.expired.len() as u64;
        self.stats.marker_failures += report.failed as u64;

        debug!(
            token = %token,
            updated_at = ?self.last_update.as_ref().map(UpdateStamp::as_str),
            created = report.created,
            moved = report.moved,
            expired = report.expired.len(),
            tracked = self.registry.len(),
            "Snapshot applied"
        );
        Ok(report)
    }

    /// Select `id` and dispatch its trip fetch.
    ///
    /// Must be called inside a tokio runtime.
    pub fn select(&mut self, id: &TripId) -> Result<SelectionTicket, SelectionError> {
        let ticket = self
            .selection
            .select(id, &mut self.registry, &mut self.map)?;
        self.stats.selections_started += 1;

        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.events_tx.clone();
        let trip_id = id.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch_trip(&trip_id).await;
            let _ = tx
                .send(SessionEvent::TripLoaded {
                    trip_id,
                    ticket,
                    result,
                })
                .await;
        });

        Ok(ticket)
    }

    /// Deselect the active vehicle. Returns layers removed.
    pub fn deselect_active(&mut self) -> usize {
        self.selection.clear(&mut self.registry, &mut self.map)
    }

    /// Wait for the next event and handle it.
    ///
    /// The session holds a sender of its own, so the channel stays open and
    /// this returns `true` whenever it returns at all. Callers that need to
    /// stop should race it against a shutdown token, as [`run`](Self::run)
    /// does.
    pub async fn step(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.handle(event);
                true
            }
            None => false,
        }
    }

    /// Handle every event already queued. Returns how many were handled.
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle(event);
            handled += 1;
        }
        handled
    }

    /// Run until `shutdown` fires, then tear the map down.
    pub async fn run(mut self, shutdown: CancellationToken) -> SessionStats {
        info!("Map session starting");
        self.start();

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Map session shutting down");
                    break;
                }

                Some(event) = self.events_rx.recv() => {
                    self.handle(event);
                }
            }
        }

        let removed = self.teardown();
        info!(removed, stats = %self.stats, "Map session stopped");
        self.stats
    }

    /// Remove every layer this session placed. Returns layers removed.
    pub fn teardown(&mut self) -> usize {
        let detail = self.selection.clear(&mut self.registry, &mut self.map);
        detail + self.registry.teardown(&mut self.map)
    }

    pub fn status(&self) -> SessionStatus {
        let active = self.selection.active().cloned();
        let phase = active
            .as_ref()
            .map(|id| self.selection.phase(id, &self.registry))
            .unwrap_or(SelectionPhase::Idle);

        SessionStatus {
            feed: self.feed,
            token: self.token,
            last_update: self.last_update.clone(),
            tracked: self.registry.len(),
            active,
            phase,
            detail_layers: self.registry.detail_layer_count(),
            deep_link_pending: self.deep_link.is_some(),
            stats: self.stats.clone(),
        }
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn registry(&self) -> &MarkerRegistry {
        &self.registry
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    fn complete(&mut self, id: &TripId, ticket: SelectionTicket, result: Result<TripDetail, FetchError>) {
        let outcome = self.selection.complete(
            id,
            ticket,
            result,
            &mut self.registry,
            &mut self.map,
            &self.renderer,
        );
        match outcome {
            SelectionOutcome::Selected { .. } => self.stats.selections_completed += 1,
            SelectionOutcome::Superseded => self.stats.selections_superseded += 1,
            SelectionOutcome::FetchFailed(_) | SelectionOutcome::RenderFailed(_) => {
                self.stats.selections_failed += 1
            }
        }
    }

    fn try_deep_link(&mut self, token: SnapshotToken) -> Option<TripId> {
        let tracker = self.deep_link.as_mut()?;
        match tracker.find_match(&self.registry, token) {
            DeepLinkMatch::Matched(id) => {
                info!(link = tracker.link().as_str(), trip_id = %id, "Deep link matched");
                self.deep_link = None;
                self.stats.deep_links_matched += 1;
                match self.select(&id) {
                    Ok(_) => Some(id),
                    Err(e) => {
                        warn!(error = %e, "Deep link selection failed");
                        None
                    }
                }
            }
            DeepLinkMatch::Miss => None,
            DeepLinkMatch::Abandoned => {
                info!(link = tracker.link().as_str(), "Deep link abandoned, no matching vehicle");
                self.deep_link = None;
                self.stats.deep_links_abandoned += 1;
                None
            }
        }
    }

    fn set_feed_status(&mut self, status: FeedStatus) {
        if status == self.feed {
            return;
        }
        match status {
            FeedStatus::Disconnected => warn!("Feed disconnected, live updates paused"),
            _ => info!(status = %status, "Feed status changed"),
        }
        self.feed = status;
    }
}
