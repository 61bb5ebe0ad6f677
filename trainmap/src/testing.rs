//! Shared test fixtures.

use crate::map::{LayerId, MapError, MapSurface, MarkerSpec, MemoryMap, PathStyle};
use crate::model::{Coordinate, Snapshot, Stop, Stopover, TripDetail, VehiclePosition};

pub(crate) const TRIP_JSON: &str = r#"{
    "trip": {
        "line": {"name": "RE 7", "product": "regional"},
        "direction": "Kiel Hbf",
        "stopovers": [
            {
                "stop": {"name": "Hamburg Hbf", "location": {"latitude": 53.553, "longitude": 10.006}},
                "arrival": null,
                "departure": "2026-10-16T10:05:00+02:00",
                "remarks": [
                    {"type": "hint", "text": "Bicycles allowed"},
                    {"type": "warning", "summary": "Works", "text": "Track works near Elmshorn",
                     "products": {"regional": true, "nationalExpress": false}}
                ]
            },
            {
                "stop": {"name": "Kiel Hbf", "location": {"latitude": 54.315, "longitude": 10.132}},
                "arrival": "2026-10-16T11:20:00+02:00",
                "departure": null
            }
        ],
        "polyline": {
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [10.006, 53.553]}},
                {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [9.99, 53.9]}},
                {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [10.132, 54.315]}}
            ]
        }
    }
}"#;

/// A vehicle on line R1 towards Kiel.
pub(crate) fn vehicle(id: &str, lat: f64, lon: f64) -> VehiclePosition {
    VehiclePosition::new(id, Coordinate::new(lat, lon), "R1", "Kiel")
}

/// Snapshot containing the given trip ids, spread out along a meridian.
pub(crate) fn snapshot_of(ids: &[&str]) -> Snapshot {
    Snapshot {
        movements: ids
            .iter()
            .enumerate()
            .map(|(i, id)| vehicle(id, 54.0 + i as f64 * 0.01, 10.0))
            .collect(),
        realtime_data_updated_at: None,
    }
}

/// Trip with `stops` stopovers and a path of `path_points` points.
pub(crate) fn trip_with(stops: usize, path_points: usize) -> TripDetail {
    let features: Vec<String> = (0..path_points)
        .map(|i| {
            format!(
                r#"{{"type": "Feature", "properties": {{}}, "geometry": {{"type": "Point", "coordinates": [{}, {}]}}}}"#,
                10.0 + i as f64 * 0.01,
                54.0 + i as f64 * 0.01
            )
        })
        .collect();
    let polyline = format!(
        r#"{{"type": "FeatureCollection", "features": [{}]}}"#,
        features.join(",")
    );

    TripDetail {
        stopovers: (0..stops)
            .map(|i| Stopover {
                stop: Stop {
                    name: format!("Stop {}", i),
                    location: Coordinate::new(54.0 + i as f64 * 0.02, 10.0),
                },
                arrival: None,
                departure: None,
                remarks: None,
            })
            .collect(),
        polyline: serde_json::from_str(&polyline).ok(),
        line: None,
        direction: None,
    }
}

/// Map that accepts a fixed number of additions, then rejects every one.
pub(crate) struct FailingMap {
    pub inner: MemoryMap,
    remaining: usize,
}

impl FailingMap {
    pub fn fail_after(successes: usize) -> Self {
        Self {
            inner: MemoryMap::new(),
            remaining: successes,
        }
    }

    fn take(&mut self) -> Result<(), MapError> {
        if self.remaining == 0 {
            return Err(MapError::Surface("layer limit reached".to_string()));
        }
        self.remaining -= 1;
        Ok(())
    }
}

impl MapSurface for FailingMap {
    fn add_marker(&mut self, marker: MarkerSpec) -> Result<LayerId, MapError> {
        self.take()?;
        self.inner.add_marker(marker)
    }

    fn move_marker(&mut self, layer: LayerId, position: Coordinate) -> Result<(), MapError> {
        self.inner.move_marker(layer, position)
    }

    fn add_path(&mut self, path: &[Coordinate], style: &PathStyle) -> Result<LayerId, MapError> {
        self.take()?;
        self.inner.add_path(path, style)
    }

    fn remove_layer(&mut self, layer: LayerId) -> bool {
        self.inner.remove_layer(layer)
    }
}
