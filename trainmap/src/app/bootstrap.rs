//! Application bootstrap implementation.
//!
//! This module contains `TrainMapApp`, which wires the backend client, the
//! map session and the feed connection together and owns their tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::config::AppConfig;
use super::error::AppError;
use crate::feed::FeedConnection;
use crate::fetch::HttpTripClient;
use crate::map::MemoryMap;
use crate::model::TripId;
use crate::session::{MapSession, SessionEvent, SessionStats, SessionStatus};

/// How long `shutdown` waits for the feed task to close its socket.
const FEED_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Live train map application.
///
/// Services are started in this order:
/// 1. Backend client (trip and lookup endpoints)
/// 2. Map session on a headless map, with the deep-link resolver attached
///    when a deep link is configured
/// 3. Feed connection, posting into the session
///
/// # Example
///
/// ```ignore
/// use trainmap::app::{AppConfig, TrainMapApp};
///
/// let app = TrainMapApp::start(AppConfig::from_config_file(&file))?;
/// app.select("1|234|0").await?;
/// println!("{}", app.status().await?);
///
/// let stats = app.shutdown().await?;
/// ```
pub struct TrainMapApp {
    events: mpsc::Sender<SessionEvent>,
    shutdown: CancellationToken,
    session_handle: JoinHandle<SessionStats>,
    feed_handle: JoinHandle<()>,
    config: AppConfig,
}

impl TrainMapApp {
    /// Start the application with the given configuration.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend client cannot be created.
    pub fn start(config: AppConfig) -> Result<Self, AppError> {
        info!(feed = %config.feed.url, api = %config.api.url, "Starting train map");

        // 1. Backend client
        let client = Arc::new(
            HttpTripClient::with_timeout(config.api.url.clone(), config.api.timeout_secs)?
                .with_paths(config.api.trip_path.clone(), config.api.lookup_path.clone()),
        );

        // 2. Session
        let map = MemoryMap::with_view(config.center, config.zoom);
        let (mut session, events) = MapSession::new(map, client.clone(), config.session.clone());
        if config.session.deep_link.is_some() {
            session = session.with_resolver(client);
        }

        let shutdown = CancellationToken::new();
        let session_handle = tokio::spawn(session.run(shutdown.clone()));

        // 3. Feed
        let feed = FeedConnection::new(config.feed.url.clone()).with_max_backoff(config.feed.max_backoff);
        let feed_handle = tokio::spawn(feed.run(events.clone(), shutdown.clone()));

        info!("Train map started");

        Ok(Self {
            events,
            shutdown,
            session_handle,
            feed_handle,
            config,
        })
    }

    /// Sender for injecting session events directly.
    pub fn events(&self) -> mpsc::Sender<SessionEvent> {
        self.events.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Select a vehicle, as if its marker was clicked.
    pub async fn select(&self, id: impl Into<TripId>) -> Result<(), AppError> {
        self.send(SessionEvent::VehicleClicked(id.into())).await
    }

    /// Clear the selection, as if the map background was clicked.
    pub async fn clear(&self) -> Result<(), AppError> {
        self.send(SessionEvent::MapClicked).await
    }

    /// Current session status.
    pub async fn status(&self) -> Result<SessionStatus, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionEvent::Status(reply)).await?;
        rx.await.map_err(|_| AppError::SessionClosed)
    }

    async fn send(&self, event: SessionEvent) -> Result<(), AppError> {
        self.events
            .send(event)
            .await
            .map_err(|_| AppError::SessionClosed)
    }

    /// Shutdown the application gracefully.
    ///
    /// Stops the feed, then lets the session remove every layer it placed.
    pub async fn shutdown(self) -> Result<SessionStats, AppError> {
        info!("Shutting down train map");
        self.shutdown.cancel();

        if tokio::time::timeout(FEED_STOP_TIMEOUT, self.feed_handle)
            .await
            .is_err()
        {
            warn!("Feed connection did not stop in time");
        }

        let stats = self
            .session_handle
            .await
            .map_err(|e| AppError::SessionFailed(e.to_string()))?;

        info!(%stats, "Train map shutdown complete");
        Ok(stats)
    }
}
