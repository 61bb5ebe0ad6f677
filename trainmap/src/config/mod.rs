//! Configuration file handling.
//!
//! Settings live in an INI file at `~/.trainmap/config.ini`. A missing file
//! means defaults everywhere; keys that are absent fall back to their
//! default individually, and unknown keys are ignored.
//!
//! ```ini
//! [feed]
//! url = ws://localhost:1934
//! max_backoff_secs = 30
//!
//! [api]
//! url = http://localhost:1825
//! timeout_secs = 30
//! trip_path = /trip
//! lookup_path = /trip/lookup
//!
//! [map]
//! center = 54.3126897,10.129182
//! zoom = 17
//! line_color = blue
//! line_weight = 4
//! line_opacity = 1.0
//!
//! [display]
//! timezone = Europe/Berlin
//! time_format = %H:%M
//!
//! [deep_link]
//! max_snapshots = 10
//!
//! [logging]
//! level = info
//! file =
//! ```

mod keys;

pub use keys::ConfigKey;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono_tz::Tz;
use ini::Ini;
use thiserror::Error;

use crate::deep_link::DEFAULT_MAX_MISSES;
use crate::feed::DEFAULT_MAX_BACKOFF_SECS;
use crate::fetch::{DEFAULT_LOOKUP_PATH, DEFAULT_TIMEOUT_SECS, DEFAULT_TRIP_PATH};
use crate::map::PathStyle;
use crate::model::Coordinate;
use crate::render::popup::{DEFAULT_TIMEZONE, DEFAULT_TIME_FORMAT};

/// Default feed endpoint.
pub const DEFAULT_FEED_URL: &str = "ws://localhost:1934";

/// Default backend API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:1825";

/// Default initial map view.
pub const DEFAULT_CENTER: Coordinate = Coordinate {
    latitude: 54.3126897,
    longitude: 10.129182,
};

pub const DEFAULT_ZOOM: u8 = 17;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors from loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value '{value}' for [{section}] {key}: {reason}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
}

// =============================================================================
// Sections
// =============================================================================

/// `[feed]`
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSettings {
    pub url: String,
    /// Upper bound for the reconnect delay.
    pub max_backoff_secs: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            max_backoff_secs: DEFAULT_MAX_BACKOFF_SECS,
        }
    }
}

/// `[api]`
#[derive(Debug, Clone, PartialEq)]
pub struct ApiSettings {
    pub url: String,
    pub timeout_secs: u64,
    pub trip_path: String,
    pub lookup_path: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            trip_path: DEFAULT_TRIP_PATH.to_string(),
            lookup_path: DEFAULT_LOOKUP_PATH.to_string(),
        }
    }
}

/// `[map]`
#[derive(Debug, Clone, PartialEq)]
pub struct MapSettings {
    pub center: Coordinate,
    pub zoom: u8,
    pub line: PathStyle,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            line: PathStyle::default(),
        }
    }
}

/// `[display]`
#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySettings {
    pub timezone: Tz,
    pub time_format: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }
}

/// `[deep_link]`
#[derive(Debug, Clone, PartialEq)]
pub struct DeepLinkSettings {
    /// Snapshots to try before giving up on an unmatched link.
    pub max_snapshots: u32,
}

impl Default for DeepLinkSettings {
    fn default() -> Self {
        Self {
            max_snapshots: DEFAULT_MAX_MISSES,
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is not set.
    pub level: String,
    /// Optional log file, in addition to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

// =============================================================================
// Config file
// =============================================================================

/// Contents of `config.ini`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub feed: FeedSettings,
    pub api: ApiSettings,
    pub map: MapSettings,
    pub display: DisplaySettings,
    pub deep_link: DeepLinkSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    /// Build from parsed INI contents.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|props| props.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Every setting as INI.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini
    }

    /// Save to the default location, creating the directory if needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        self.to_ini().write_to_file(path).map_err(write_err)
    }

    /// Popup formatter for the display settings.
    pub fn formatter(&self) -> crate::render::PopupFormatter {
        crate::render::PopupFormatter::new(self.display.timezone, self.display.time_format.clone())
    }
}

/// Directory holding the configuration file.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".trainmap")
}

/// Full path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

// =============================================================================
// Value parsing
// =============================================================================

pub(crate) fn parse_value<T: FromStr>(
    section: &'static str,
    key: &'static str,
    value: &str,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            section,
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

pub(crate) fn parse_coordinate(
    section: &'static str,
    key: &'static str,
    value: &str,
) -> Result<Coordinate, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        section,
        key,
        value: value.to_string(),
        reason,
    };
    let (lat, lon) = value
        .split_once(',')
        .ok_or_else(|| invalid("expected 'latitude,longitude'".to_string()))?;
    let lat: f64 = lat.trim().parse().map_err(|e| invalid(format!("{}", e)))?;
    let lon: f64 = lon.trim().parse().map_err(|e| invalid(format!("{}", e)))?;
    let coordinate = Coordinate::new(lat, lon);
    coordinate.validate().map_err(|e| invalid(e.to_string()))?;
    Ok(coordinate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("config.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
        assert_eq!(config.feed.url, "ws://localhost:1934");
        assert_eq!(config.map.zoom, 17);
        assert_eq!(config.display.timezone, chrono_tz::Europe::Berlin);
    }

    #[test]
    fn test_partial_file_overrides_only_given_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(
            &path,
            "[api]\nurl = http://backend:8080\n\n[map]\ncenter = 53.55, 10.0\nline_weight = 6\n\n[unknown]\nfoo = bar\n",
        )
        .unwrap();

        let config = ConfigFile::load_from(&path).unwrap();

        assert_eq!(config.api.url, "http://backend:8080");
        assert_eq!(config.api.trip_path, "/trip");
        assert_eq!(config.map.center, Coordinate::new(53.55, 10.0));
        assert_eq!(config.map.line.weight, 6);
        assert_eq!(config.map.line.color, "blue");
    }

    #[test]
    fn test_invalid_value_names_section_and_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[display]\ntimezone = Mars/Olympus\n").unwrap();

        let err = ConfigFile::load_from(&path).unwrap_err();
        match err {
            ConfigError::InvalidValue { section, key, .. } => {
                assert_eq!(section, "display");
                assert_eq!(key, "timezone");
            }
            other => panic!("expected invalid value, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_center_rejected() {
        let mut ini = Ini::new();
        ini.with_section(Some("map")).set("center", "95.0,10.0");
        assert!(matches!(
            ConfigFile::from_ini(&ini),
            Err(ConfigError::InvalidValue { key: "center", .. })
        ));
    }

    #[test]
    fn test_save_then_load_preserves_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.ini");
        let mut config = ConfigFile::default();
        config.feed.url = "wss://trains.example/ws".to_string();
        config.logging.file = Some(PathBuf::from("/tmp/trainmap.log"));
        config.display.timezone = chrono_tz::Europe::Vienna;

        config.save_to(&path).unwrap();
        let loaded = ConfigFile::load_from(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_empty_log_file_means_none() {
        let mut ini = Ini::new();
        ini.with_section(Some("logging")).set("file", "");
        let config = ConfigFile::from_ini(&ini).unwrap();
        assert_eq!(config.logging.file, None);
    }

    #[test]
    fn test_config_path_under_home() {
        let path = config_file_path();
        assert!(path.ends_with(".trainmap/config.ini"));
    }
}
