//! Wire and domain types shared by every engine component.
//!
//! The feed and the trip endpoint both speak JSON; the types here deserialize
//! those payloads directly and validate them before any engine state is
//! touched. A payload that fails validation is rejected whole.
//!
//! # Types
//!
//! - [`TripId`] - feed-provided identifier of one run of a train
//! - [`Coordinate`] - WGS84 latitude/longitude pair
//! - [`VehiclePosition`] / [`Snapshot`] - one feed message
//! - [`TripDetail`] / [`Stopover`] - the on-demand trip lookup

mod trip;
mod vehicle;

pub use trip::{Remark, Stop, Stopover, TripDetail, TripResponse};
pub use vehicle::{Line, Snapshot, SnapshotToken, UpcomingStopover, UpdateStamp, VehiclePosition};

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a vehicle run, as provided by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripId(String);

impl TripId {
    /// Create a trip identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TripId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TripId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A geographic position in degrees.
///
/// Deserializes from `{"latitude": .., "longitude": ..}` and also from the
/// short `{"lat": .., "lon": ..}` form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees (-90..=90).
    #[serde(alias = "lat")]
    pub latitude: f64,
    /// Longitude in degrees (-180..=180).
    #[serde(alias = "lon", alias = "lng")]
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate without validation.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Build a coordinate from a GeoJSON position (`[lon, lat, ...]`).
    pub fn from_geojson_position(position: &[f64]) -> Option<Self> {
        match position {
            [lon, lat, ..] => Some(Self::new(*lat, *lon)),
            _ => None,
        }
    }

    /// Check that both components are finite and inside WGS84 bounds.
    pub fn validate(&self) -> Result<(), InvalidCoordinate> {
        let in_range = self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude);

        if in_range {
            Ok(())
        } else {
            Err(InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.latitude, self.longitude)
    }
}

/// A coordinate outside WGS84 bounds or not finite.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("invalid coordinate ({latitude}, {longitude})")]
pub struct InvalidCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Errors raised while decoding feed or trip payloads.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// Body is not valid JSON or lacks required fields.
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A movement has an empty trip id.
    #[error("movement without trip id")]
    MissingTripId,

    /// A movement carries an unusable position.
    #[error("vehicle {trip_id}: {source}")]
    InvalidLocation {
        trip_id: TripId,
        source: InvalidCoordinate,
    },

    /// A stopover carries an unusable stop location.
    #[error("stop {stop:?}: {source}")]
    InvalidStop {
        stop: String,
        source: InvalidCoordinate,
    },

    /// The path geometry contains an unusable coordinate.
    #[error("path geometry: {0}")]
    InvalidPath(InvalidCoordinate),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_accepts_long_and_short_names() {
        let long: Coordinate =
            serde_json::from_str(r#"{"latitude": 54.31, "longitude": 10.12}"#).unwrap();
        let short: Coordinate = serde_json::from_str(r#"{"lat": 54.31, "lon": 10.12}"#).unwrap();

        assert_eq!(long, short);
        assert_eq!(long.latitude, 54.31);
    }

    #[test]
    fn test_coordinate_validate_bounds() {
        assert!(Coordinate::new(54.3, 10.1).validate().is_ok());
        assert!(Coordinate::new(90.0, -180.0).validate().is_ok());
        assert!(Coordinate::new(91.0, 0.0).validate().is_err());
        assert!(Coordinate::new(0.0, 180.5).validate().is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).validate().is_err());
    }

    #[test]
    fn test_coordinate_from_geojson_position_swaps_axes() {
        let coord = Coordinate::from_geojson_position(&[10.12, 54.31]).unwrap();
        assert_eq!(coord, Coordinate::new(54.31, 10.12));

        assert!(Coordinate::from_geojson_position(&[10.12]).is_none());
    }

    #[test]
    fn test_trip_id_display() {
        let id = TripId::from("1|2345|0|80|16102026");
        assert_eq!(id.to_string(), "1|2345|0|80|16102026");
        assert_eq!(id.as_str(), "1|2345|0|80|16102026");
    }
}
