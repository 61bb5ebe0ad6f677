//! Addressable configuration keys (`section.key`).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::format::{Item, StrftimeItems};
use chrono_tz::Tz;

use super::{parse_coordinate, parse_value, ConfigError, ConfigFile};

/// One setting in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    FeedUrl,
    FeedMaxBackoffSecs,
    ApiUrl,
    ApiTimeoutSecs,
    ApiTripPath,
    ApiLookupPath,
    MapCenter,
    MapZoom,
    MapLineColor,
    MapLineWeight,
    MapLineOpacity,
    DisplayTimezone,
    DisplayTimeFormat,
    DeepLinkMaxSnapshots,
    LoggingLevel,
    LoggingFile,
}

impl ConfigKey {
    /// Every key, in file order.
    pub fn all() -> &'static [ConfigKey] {
        use ConfigKey::*;
        &[
            FeedUrl,
            FeedMaxBackoffSecs,
            ApiUrl,
            ApiTimeoutSecs,
            ApiTripPath,
            ApiLookupPath,
            MapCenter,
            MapZoom,
            MapLineColor,
            MapLineWeight,
            MapLineOpacity,
            DisplayTimezone,
            DisplayTimeFormat,
            DeepLinkMaxSnapshots,
            LoggingLevel,
            LoggingFile,
        ]
    }

    pub fn section(self) -> &'static str {
        use ConfigKey::*;
        match self {
            FeedUrl | FeedMaxBackoffSecs => "feed",
            ApiUrl | ApiTimeoutSecs | ApiTripPath | ApiLookupPath => "api",
            MapCenter | MapZoom | MapLineColor | MapLineWeight | MapLineOpacity => "map",
            DisplayTimezone | DisplayTimeFormat => "display",
            DeepLinkMaxSnapshots => "deep_link",
            LoggingLevel | LoggingFile => "logging",
        }
    }

    pub fn key_name(self) -> &'static str {
        use ConfigKey::*;
        match self {
            FeedUrl | ApiUrl => "url",
            FeedMaxBackoffSecs => "max_backoff_secs",
            ApiTimeoutSecs => "timeout_secs",
            ApiTripPath => "trip_path",
            ApiLookupPath => "lookup_path",
            MapCenter => "center",
            MapZoom => "zoom",
            MapLineColor => "line_color",
            MapLineWeight => "line_weight",
            MapLineOpacity => "line_opacity",
            DisplayTimezone => "timezone",
            DisplayTimeFormat => "time_format",
            DeepLinkMaxSnapshots => "max_snapshots",
            LoggingLevel => "level",
            LoggingFile => "file",
        }
    }

    /// `section.key`
    pub fn name(self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as written to the file.
    pub fn get(self, config: &ConfigFile) -> String {
        use ConfigKey::*;
        match self {
            FeedUrl => config.feed.url.clone(),
            FeedMaxBackoffSecs => config.feed.max_backoff_secs.to_string(),
            ApiUrl => config.api.url.clone(),
            ApiTimeoutSecs => config.api.timeout_secs.to_string(),
            ApiTripPath => config.api.trip_path.clone(),
            ApiLookupPath => config.api.lookup_path.clone(),
            MapCenter => format!(
                "{},{}",
                config.map.center.latitude, config.map.center.longitude
            ),
            MapZoom => config.map.zoom.to_string(),
            MapLineColor => config.map.line.color.clone(),
            MapLineWeight => config.map.line.weight.to_string(),
            MapLineOpacity => config.map.line.opacity.to_string(),
            DisplayTimezone => config.display.timezone.name().to_string(),
            DisplayTimeFormat => config.display.time_format.clone(),
            DeepLinkMaxSnapshots => config.deep_link.max_snapshots.to_string(),
            LoggingLevel => config.logging.level.clone(),
            LoggingFile => config
                .logging
                .file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Parse `value` and store it.
    pub fn set(self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        use ConfigKey::*;
        let (section, key) = (self.section(), self.key_name());
        let text = value.trim();
        match self {
            FeedUrl => config.feed.url = non_empty(section, key, text)?,
            FeedMaxBackoffSecs => config.feed.max_backoff_secs = parse_value(section, key, text)?,
            ApiUrl => config.api.url = non_empty(section, key, text)?,
            ApiTimeoutSecs => config.api.timeout_secs = parse_value(section, key, text)?,
            ApiTripPath => config.api.trip_path = non_empty(section, key, text)?,
            ApiLookupPath => config.api.lookup_path = non_empty(section, key, text)?,
            MapCenter => config.map.center = parse_coordinate(section, key, text)?,
            MapZoom => config.map.zoom = parse_value(section, key, text)?,
            MapLineColor => config.map.line.color = non_empty(section, key, text)?,
            MapLineWeight => config.map.line.weight = parse_value(section, key, text)?,
            MapLineOpacity => {
                let opacity: f64 = parse_value(section, key, text)?;
                if !(0.0..=1.0).contains(&opacity) {
                    return Err(invalid(section, key, text, "must be between 0 and 1"));
                }
                config.map.line.opacity = opacity;
            }
            DisplayTimezone => config.display.timezone = parse_value::<Tz>(section, key, text)?,
            DisplayTimeFormat => config.display.time_format = time_format(section, key, text)?,
            DeepLinkMaxSnapshots => {
                let max: u32 = parse_value(section, key, text)?;
                if max == 0 {
                    return Err(invalid(section, key, text, "must be at least 1"));
                }
                config.deep_link.max_snapshots = max;
            }
            LoggingLevel => config.logging.level = non_empty(section, key, text)?,
            LoggingFile => {
                config.logging.file = (!text.is_empty()).then(|| PathBuf::from(text));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == s)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

fn non_empty(section: &'static str, key: &'static str, value: &str) -> Result<String, ConfigError> {
    if value.is_empty() {
        Err(invalid(section, key, value, "must not be empty"))
    } else {
        Ok(value.to_string())
    }
}

/// A strftime pattern chrono can render without error.
fn time_format(section: &'static str, key: &'static str, value: &str) -> Result<String, ConfigError> {
    let pattern = non_empty(section, key, value)?;
    if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
        return Err(invalid(section, key, value, "not a valid strftime pattern"));
    }
    Ok(pattern)
}

fn invalid(section: &'static str, key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section,
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
