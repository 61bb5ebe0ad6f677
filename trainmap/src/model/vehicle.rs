//! Feed message types: one snapshot of every active vehicle.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};

use super::{Coordinate, PayloadError, TripId};

/// Line a vehicle is running on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// Display name, e.g. `"RE 7"`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Product class, e.g. `"regional"`; used for remark applicability.
    #[serde(default)]
    pub product: Option<String>,
}

/// One of the stopovers still ahead of a vehicle.
///
/// Only the arrival time is read; it identifies the run's final arrival
/// when matching deep links.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpcomingStopover {
    #[serde(default)]
    pub arrival: Option<DateTime<FixedOffset>>,
}

/// Position of one vehicle inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePosition {
    /// Feed identifier of the run.
    pub trip_id: TripId,
    /// Current position.
    pub location: Coordinate,
    /// Line name and product.
    #[serde(default, deserialize_with = "null_as_default")]
    pub line: Line,
    /// Direction label (usually the terminus).
    #[serde(default, deserialize_with = "null_as_default")]
    pub direction: String,
    /// Remaining stopovers, when the feed includes them.
    #[serde(default, deserialize_with = "null_as_default")]
    pub next_stopovers: Vec<UpcomingStopover>,
}

impl VehiclePosition {
    /// Create a position with no upcoming stopovers.
    pub fn new(
        trip_id: impl Into<TripId>,
        location: Coordinate,
        line_name: impl Into<String>,
        direction: impl Into<String>,
    ) -> Self {
        Self {
            trip_id: trip_id.into(),
            location,
            line: Line {
                name: line_name.into(),
                product: None,
            },
            direction: direction.into(),
            next_stopovers: Vec::new(),
        }
    }

    /// Arrival time at the last listed stopover.
    pub fn final_arrival(&self) -> Option<DateTime<FixedOffset>> {
        self.next_stopovers.last().and_then(|s| s.arrival)
    }
}

/// Labels sent as `null` read the same as missing ones.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Server-side update stamp (`realtimeDataUpdatedAt`).
///
/// Backends send it either as a number or as a string; it is kept as text
/// and only used for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UpdateStamp(String);

impl UpdateStamp {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UpdateStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for UpdateStamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Integer(i64),
            Float(f64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => UpdateStamp(s),
            Raw::Integer(n) => UpdateStamp(n.to_string()),
            Raw::Float(n) => UpdateStamp(n.to_string()),
        })
    }
}

/// One feed message: all currently active vehicles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Vehicle positions, in feed order.
    pub movements: Vec<VehiclePosition>,
    /// Server stamp of the underlying realtime data.
    #[serde(default)]
    pub realtime_data_updated_at: Option<UpdateStamp>,
}

impl Snapshot {
    /// Parse and validate a feed message.
    ///
    /// Every movement must carry a non-empty trip id and a valid coordinate;
    /// otherwise the whole message is rejected.
    pub fn from_json(text: &str) -> Result<Self, PayloadError> {
        let snapshot: Snapshot = serde_json::from_str(text)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Validate every movement.
    pub fn validate(&self) -> Result<(), PayloadError> {
        for vehicle in &self.movements {
            if vehicle.trip_id.as_str().is_empty() {
                return Err(PayloadError::MissingTripId);
            }
            vehicle
                .location
                .validate()
                .map_err(|source| PayloadError::InvalidLocation {
                    trip_id: vehicle.trip_id.clone(),
                    source,
                })?;
        }
        Ok(())
    }
}

/// Session-local token identifying which snapshot last touched an entry.
///
/// Assigned by the session in arrival order; the first applied snapshot gets
/// token 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotToken(u64);

impl SnapshotToken {
    pub fn new(sequence: u64) -> Self {
        Self(sequence)
    }

    /// The token for the following snapshot.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn sequence(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SnapshotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_parses_feed_message() {
        let json = r#"{
            "movements": [{
                "tripId": "T1",
                "location": {"lat": 54.31, "lon": 10.12},
                "line": {"name": "R1"},
                "direction": "Kiel"
            }],
            "realtimeDataUpdatedAt": "100"
        }"#;

        let snapshot = Snapshot::from_json(json).unwrap();
        assert_eq!(snapshot.movements.len(), 1);
        assert_eq!(snapshot.movements[0].trip_id, TripId::from("T1"));
        assert_eq!(snapshot.movements[0].line.name, "R1");
        assert_eq!(snapshot.movements[0].direction, "Kiel");
        assert_eq!(
            snapshot.realtime_data_updated_at.as_ref().map(|s| s.as_str()),
            Some("100")
        );
    }

    #[test]
    fn test_null_labels_read_as_empty() {
        let json = r#"{"movements": [
            {"tripId": "T1", "location": {"lat": 54.3, "lon": 10.1}, "direction": null},
            {"tripId": "T2", "location": {"lat": 54.4, "lon": 10.2},
             "line": {"name": null, "product": "regional"}, "nextStopovers": null},
            {"tripId": "T3", "location": {"lat": 54.5, "lon": 10.3}, "line": null}
        ]}"#;

        let snapshot = Snapshot::from_json(json).unwrap();
        assert_eq!(snapshot.movements.len(), 3);
        assert_eq!(snapshot.movements[0].direction, "");
        assert_eq!(snapshot.movements[1].line.name, "");
        assert_eq!(snapshot.movements[1].line.product.as_deref(), Some("regional"));
        assert!(snapshot.movements[1].next_stopovers.is_empty());
        assert_eq!(snapshot.movements[2].line, Line::default());
    }

    #[test]
    fn test_update_stamp_accepts_numbers() {
        let json = r#"{"movements": [], "realtimeDataUpdatedAt": 1760000000}"#;
        let snapshot = Snapshot::from_json(json).unwrap();
        assert_eq!(
            snapshot.realtime_data_updated_at.unwrap().as_str(),
            "1760000000"
        );
    }

    #[test]
    fn test_snapshot_rejects_invalid_location() {
        let json = r#"{"movements": [
            {"tripId": "ok", "location": {"latitude": 54.0, "longitude": 10.0}},
            {"tripId": "bad", "location": {"latitude": 154.0, "longitude": 10.0}}
        ]}"#;

        let err = Snapshot::from_json(json).unwrap_err();
        assert!(matches!(err, PayloadError::InvalidLocation { ref trip_id, .. } if trip_id.as_str() == "bad"));
    }

    #[test]
    fn test_snapshot_rejects_missing_movements() {
        assert!(Snapshot::from_json(r#"{"realtimeDataUpdatedAt": 1}"#).is_err());
        assert!(Snapshot::from_json("not json").is_err());
    }

    #[test]
    fn test_snapshot_rejects_empty_trip_id() {
        let json = r#"{"movements": [{"tripId": "", "location": {"lat": 1.0, "lon": 1.0}}]}"#;
        assert!(matches!(
            Snapshot::from_json(json),
            Err(PayloadError::MissingTripId)
        ));
    }

    #[test]
    fn test_final_arrival_uses_last_stopover() {
        let json = r#"{
            "tripId": "T1",
            "location": {"lat": 54.31, "lon": 10.12},
            "nextStopovers": [
                {"arrival": "2026-10-16T10:00:00+02:00"},
                {"arrival": null},
                {"arrival": "2026-10-16T11:30:00+02:00"}
            ]
        }"#;
        let vehicle: VehiclePosition = serde_json::from_str(json).unwrap();

        let arrival = vehicle.final_arrival().unwrap();
        assert_eq!(arrival.to_rfc3339(), "2026-10-16T11:30:00+02:00");
    }

    #[test]
    fn test_snapshot_token_next() {
        let token = SnapshotToken::default().next();
        assert_eq!(token.sequence(), 1);
        assert!(token.next() > token);
    }
}
