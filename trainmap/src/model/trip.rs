//! Trip detail returned by the trip endpoint.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use geojson::{FeatureCollection, Value};
use serde::{Deserialize, Serialize};

use super::{Coordinate, Line, PayloadError};

/// Envelope of the trip endpoint response: `{"trip": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripResponse {
    pub trip: TripDetail,
}

impl TripResponse {
    /// Parse and validate a trip endpoint response body.
    pub fn from_json(text: &str) -> Result<TripDetail, PayloadError> {
        let response: TripResponse = serde_json::from_str(text)?;
        response.trip.validate()?;
        Ok(response.trip)
    }
}

/// Stop list and path geometry of one trip.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TripDetail {
    /// Stopovers in travel order.
    #[serde(default)]
    pub stopovers: Vec<Stopover>,
    /// Path geometry as a GeoJSON feature collection of points.
    #[serde(default)]
    pub polyline: Option<FeatureCollection>,
    #[serde(default)]
    pub line: Option<Line>,
    #[serde(default)]
    pub direction: Option<String>,
}

impl TripDetail {
    /// Product class of the trip's line, if known.
    pub fn product(&self) -> Option<&str> {
        self.line.as_ref().and_then(|l| l.product.as_deref())
    }

    /// Ordered path coordinates extracted from the polyline.
    ///
    /// Point features contribute one coordinate each, line strings all of
    /// theirs. Other geometry types are ignored.
    pub fn path(&self) -> Vec<Coordinate> {
        let Some(collection) = &self.polyline else {
            return Vec::new();
        };

        let mut path = Vec::new();
        for feature in &collection.features {
            let Some(geometry) = &feature.geometry else {
                continue;
            };
            match &geometry.value {
                Value::Point(position) => {
                    path.extend(Coordinate::from_geojson_position(position));
                }
                Value::LineString(positions) => {
                    path.extend(
                        positions
                            .iter()
                            .filter_map(|p| Coordinate::from_geojson_position(p)),
                    );
                }
                _ => {}
            }
        }
        path
    }

    /// Arrival at the last stopover, falling back to its departure.
    pub fn final_arrival(&self) -> Option<DateTime<FixedOffset>> {
        self.stopovers
            .last()
            .and_then(|s| s.arrival.or(s.departure))
    }

    /// Check stop locations and path coordinates.
    pub fn validate(&self) -> Result<(), PayloadError> {
        for stopover in &self.stopovers {
            stopover
                .stop
                .location
                .validate()
                .map_err(|source| PayloadError::InvalidStop {
                    stop: stopover.stop.name.clone(),
                    source,
                })?;
        }
        for coordinate in self.path() {
            coordinate.validate().map_err(PayloadError::InvalidPath)?;
        }
        Ok(())
    }
}

/// A stop served by the trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub name: String,
    pub location: Coordinate,
}

/// One stop call with its (possibly realtime) times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stopover {
    pub stop: Stop,
    #[serde(default)]
    pub arrival: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub departure: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub remarks: Option<Vec<Remark>>,
}

impl Stopover {
    /// Remarks attached to this stopover (empty when absent).
    pub fn remarks(&self) -> &[Remark] {
        self.remarks.as_deref().unwrap_or(&[])
    }
}

/// Free-text annotation attached to a stopover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Remark {
    /// Remark class, e.g. `"hint"`, `"status"` or `"warning"`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// Per-product applicability; absent means "applies to all".
    #[serde(default)]
    pub products: Option<HashMap<String, bool>>,
}

impl Remark {
    pub fn is_warning(&self) -> bool {
        self.kind == "warning"
    }

    /// Whether the remark applies to trips of `product`.
    pub fn applies_to(&self, product: Option<&str>) -> bool {
        match (&self.products, product) {
            (None, _) | (_, None) => true,
            (Some(products), Some(product)) => products.get(product).copied().unwrap_or(false),
        }
    }

    /// Best text to show: the full text, else the summary.
    pub fn display_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .or(self.summary.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}
