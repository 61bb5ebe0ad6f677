//! trainmap - Live train map engine
//!
//! This library keeps a map in sync with a live feed of vehicle positions:
//! one marker per running train, moved on every snapshot and removed when
//! the train leaves the feed. Selecting a train fetches its trip and draws
//! its path and stops; only the latest selection ever reaches the map.
//!
//! # Modules
//!
//! - [`model`] - feed and trip payloads
//! - [`map`] - the map surface abstraction and a headless implementation
//! - [`registry`] - vehicle id to on-map state
//! - [`selection`] - the single active selection and its supersession check
//! - [`render`] - trip detail to map layers, popup text
//! - [`fetch`] - backend API client
//! - [`feed`] - WebSocket feed connection
//! - [`deep_link`] - auto-selection from a URL fragment
//! - [`session`] - the event loop tying it together
//! - [`app`] - bootstrap for a complete live session

pub mod app;
pub mod config;
pub mod deep_link;
pub mod feed;
pub mod fetch;
pub mod logging;
pub mod map;
pub mod model;
pub mod registry;
pub mod render;
pub mod selection;
pub mod session;

#[cfg(test)]
mod testing;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
