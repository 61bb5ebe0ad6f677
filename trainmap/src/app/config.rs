//! Application configuration for TrainMapApp.
//!
//! `AppConfig` gathers everything needed to start a live session: where the
//! feed and the backend live, how the map and popups look, and which vehicle
//! to auto-select.

use std::time::Duration;

use crate::config::ConfigFile;
use crate::deep_link::DeepLink;
use crate::map::PathStyle;
use crate::model::Coordinate;
use crate::render::PopupFormatter;
use crate::session::SessionConfig;

/// Feed connection settings.
#[derive(Clone, Debug)]
pub struct FeedAppConfig {
    pub url: String,
    pub max_backoff: Duration,
}

/// Backend API settings.
#[derive(Clone, Debug)]
pub struct ApiAppConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub trip_path: String,
    pub lookup_path: String,
}

/// Application configuration combining all component configs.
///
/// This is the top-level configuration passed to `TrainMapApp::start()`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub feed: FeedAppConfig,
    pub api: ApiAppConfig,

    /// Initial map view.
    pub center: Coordinate,
    pub zoom: u8,

    /// Session settings (styles, popup format, deep link).
    pub session: SessionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_config_file(&ConfigFile::default())
    }
}

impl AppConfig {
    /// Create application config from the configuration file.
    pub fn from_config_file(config: &ConfigFile) -> Self {
        Self {
            feed: FeedAppConfig {
                url: config.feed.url.clone(),
                max_backoff: Duration::from_secs(config.feed.max_backoff_secs),
            },
            api: ApiAppConfig {
                url: config.api.url.clone(),
                timeout_secs: config.api.timeout_secs,
                trip_path: config.api.trip_path.clone(),
                lookup_path: config.api.lookup_path.clone(),
            },
            center: config.map.center,
            zoom: config.map.zoom,
            session: SessionConfig {
                path_style: config.map.line.clone(),
                formatter: config.formatter(),
                deep_link_max_misses: config.deep_link.max_snapshots,
                ..SessionConfig::default()
            },
        }
    }

    /// Override the feed URL.
    pub fn with_feed_url(mut self, url: impl Into<String>) -> Self {
        self.feed.url = url.into();
        self
    }

    /// Override the backend URL.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api.url = url.into();
        self
    }

    /// Auto-select the vehicle named by `link` once it appears.
    pub fn with_deep_link(mut self, link: Option<DeepLink>) -> Self {
        self.session.deep_link = link;
        self
    }

    pub fn path_style(&self) -> &PathStyle {
        &self.session.path_style
    }

    pub fn formatter(&self) -> &PopupFormatter {
        &self.session.formatter
    }
}
