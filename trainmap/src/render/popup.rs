//! Popup text for vehicle and station markers.
//!
//! Lines are joined with `<br>` since the map surface renders popups as
//! markup. Labels are German, matching the network the feed covers.

use std::fmt::Write;

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;

use crate::model::{Stopover, VehiclePosition};

/// Default display time zone.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Berlin;

/// Default clock format (`HH:MM`).
pub const DEFAULT_TIME_FORMAT: &str = "%H:%M";

const LINE_BREAK: &str = "<br>";

/// Builds popup text for markers.
#[derive(Debug, Clone)]
pub struct PopupFormatter {
    timezone: Tz,
    time_format: String,
}

impl Default for PopupFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE, DEFAULT_TIME_FORMAT)
    }
}

impl PopupFormatter {
    pub fn new(timezone: Tz, time_format: impl Into<String>) -> Self {
        Self {
            timezone,
            time_format: time_format.into(),
        }
    }

    /// `"<line> nach <direction>"`, or just the line when the direction is
    /// unknown.
    pub fn vehicle_label(&self, vehicle: &VehiclePosition) -> String {
        let line = vehicle.line.name.trim();
        let direction = vehicle.direction.trim();
        match (line.is_empty(), direction.is_empty()) {
            (false, false) => format!("{} nach {}", line, direction),
            (false, true) => line.to_string(),
            (true, false) => format!("nach {}", direction),
            (true, true) => vehicle.trip_id.to_string(),
        }
    }

    /// Stop name, arrival and departure times, then applicable warnings.
    pub fn station_text(&self, stopover: &Stopover, product: Option<&str>) -> String {
        let mut parts = vec![stopover.stop.name.clone()];

        if let Some(arrival) = stopover.arrival {
            parts.push(format!("Ankunft: {}", self.format_time(arrival)));
        }
        if let Some(departure) = stopover.departure {
            parts.push(format!("Abfahrt: {}", self.format_time(departure)));
        }

        parts.extend(
            stopover
                .remarks()
                .iter()
                .filter(|r| r.is_warning() && r.applies_to(product))
                .filter_map(|r| r.display_text())
                .map(|text| format!("Hinweis: {}", text)),
        );

        parts.join(LINE_BREAK)
    }

    /// Local wall-clock time in the configured zone. A pattern chrono
    /// cannot render falls back to [`DEFAULT_TIME_FORMAT`].
    pub fn format_time(&self, time: DateTime<FixedOffset>) -> String {
        let local = time.with_timezone(&self.timezone);
        let mut out = String::new();
        if write!(out, "{}", local.format(&self.time_format)).is_err() {
            out.clear();
            let _ = write!(out, "{}", local.format(DEFAULT_TIME_FORMAT));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Coordinate, Remark, Stop, TripResponse};
    use crate::testing::TRIP_JSON;

    fn stopover(arrival: Option<&str>, departure: Option<&str>) -> Stopover {
        Stopover {
            stop: Stop {
                name: "Neumünster".to_string(),
                location: Coordinate::new(54.07, 9.98),
            },
            arrival: arrival.map(|t| DateTime::parse_from_rfc3339(t).unwrap()),
            departure: departure.map(|t| DateTime::parse_from_rfc3339(t).unwrap()),
            remarks: None,
        }
    }

    #[test]
    fn test_vehicle_label() {
        let formatter = PopupFormatter::default();
        let mut vehicle =
            VehiclePosition::new("T1", Coordinate::new(54.3, 10.1), "R1", "Kiel");
        assert_eq!(formatter.vehicle_label(&vehicle), "R1 nach Kiel");

        vehicle.direction.clear();
        assert_eq!(formatter.vehicle_label(&vehicle), "R1");

        vehicle.line.name.clear();
        assert_eq!(formatter.vehicle_label(&vehicle), "T1");
    }

    #[test]
    fn test_station_text_uses_own_times() {
        let formatter = PopupFormatter::default();
        let s = stopover(
            Some("2026-10-16T10:02:00+02:00"),
            Some("2026-10-16T10:04:00+02:00"),
        );

        assert_eq!(
            formatter.station_text(&s, None),
            "Neumünster<br>Ankunft: 10:02<br>Abfahrt: 10:04"
        );
    }

    #[test]
    fn test_station_text_converts_to_local_time() {
        let formatter = PopupFormatter::default();
        let s = stopover(None, Some("2026-10-16T08:04:00Z"));

        assert_eq!(formatter.station_text(&s, None), "Neumünster<br>Abfahrt: 10:04");
    }

    #[test]
    fn test_station_text_without_times() {
        let formatter = PopupFormatter::new(chrono_tz::UTC, "%H:%M");
        assert_eq!(formatter.station_text(&stopover(None, None), None), "Neumünster");
    }

    #[test]
    fn test_invalid_time_format_falls_back() {
        let formatter = PopupFormatter::new(chrono_tz::UTC, "%Q");
        let time = DateTime::parse_from_rfc3339("2026-10-16T08:04:00Z").unwrap();
        assert_eq!(formatter.format_time(time), "08:04");
    }

    #[test]
    fn test_station_text_includes_applicable_warnings_only() {
        let formatter = PopupFormatter::default();
        let trip = TripResponse::from_json(TRIP_JSON).unwrap();

        let regional = formatter.station_text(&trip.stopovers[0], Some("regional"));
        assert!(regional.contains("Hinweis: Track works near Elmshorn"));
        assert!(!regional.contains("Bicycles"), "hints are not warnings");

        let express = formatter.station_text(&trip.stopovers[0], Some("nationalExpress"));
        assert!(!express.contains("Hinweis"));
    }

    #[test]
    fn test_warning_falls_back_to_summary() {
        let formatter = PopupFormatter::default();
        let mut s = stopover(None, None);
        s.remarks = Some(vec![Remark {
            kind: "warning".to_string(),
            summary: Some("Ersatzverkehr".to_string()),
            text: None,
            products: None,
        }]);

        assert_eq!(
            formatter.station_text(&s, Some("regional")),
            "Neumünster<br>Hinweis: Ersatzverkehr"
        );
    }
}
