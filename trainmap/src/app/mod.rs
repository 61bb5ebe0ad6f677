//! Application bootstrap and lifecycle management.
//!
//! This module provides the `TrainMapApp` type which starts the backend
//! client, the map session and the feed connection in the right order, and
//! shuts them down so that every layer is removed from the map.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         TrainMapApp                             │
//! │                                                                 │
//! │  1. HttpTripClient ──────► TripFetcher + DeepLinkResolver       │
//! │                                                                 │
//! │  2. MapSession (task) ◄─── SessionEvent channel ◄── select/clear│
//! │     └── MemoryMap, MarkerRegistry, SelectionController          │
//! │                                                                 │
//! │  3. FeedConnection (task) ──► FeedMessage / FeedStatus          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use trainmap::app::{TrainMapApp, AppConfig};
//!
//! let app = TrainMapApp::start(config)?;
//! let status = app.status().await?;
//! let stats = app.shutdown().await?;
//! ```

mod bootstrap;
mod config;
mod error;

pub use bootstrap::TrainMapApp;
pub use config::{ApiAppConfig, AppConfig, FeedAppConfig};
pub use error::AppError;
