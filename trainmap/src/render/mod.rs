//! Layer renderer: trip detail to map layers.
//!
//! [`LayerRenderer::render`] draws the trip path and one marker per
//! stopover, adding each layer to the map as soon as it is created. If the
//! map refuses a layer halfway through, the handles created so far are handed
//! back inside [`RenderError`] so the caller can remove them; the renderer
//! never removes layers itself.

pub mod popup;

pub use popup::PopupFormatter;

use thiserror::Error;
use tracing::debug;

use crate::map::{LayerId, MapError, MapSurface, MarkerSpec, PathStyle};
use crate::model::TripDetail;

/// Rendering stopped early; `layers` are already on the map.
#[derive(Debug, Error)]
#[error("rendering stopped after {} layer(s): {source}", .layers.len())]
pub struct RenderError {
    pub layers: Vec<LayerId>,
    pub source: MapError,
}

/// Translates trip detail into detail layers.
#[derive(Debug, Clone, Default)]
pub struct LayerRenderer {
    path_style: PathStyle,
    formatter: PopupFormatter,
}

impl LayerRenderer {
    pub fn new(path_style: PathStyle, formatter: PopupFormatter) -> Self {
        Self {
            path_style,
            formatter,
        }
    }

    pub fn formatter(&self) -> &PopupFormatter {
        &self.formatter
    }

    /// Draw `trip` and return the handles in creation order.
    ///
    /// The path comes first and is skipped when the geometry has fewer than
    /// two coordinates. Station markers follow in stopover order.
    pub fn render(
        &self,
        trip: &TripDetail,
        map: &mut dyn MapSurface,
    ) -> Result<Vec<LayerId>, RenderError> {
        let mut layers = Vec::with_capacity(trip.stopovers.len() + 1);

        let path = trip.path();
        if path.len() >= 2 {
            match map.add_path(&path, &self.path_style) {
                Ok(id) => layers.push(id),
                Err(source) => return Err(RenderError { layers, source }),
            }
        } else {
            debug!(points = path.len(), "Trip geometry too short, no path drawn");
        }

        let product = trip.product();
        for stopover in &trip.stopovers {
            let popup = self.formatter.station_text(stopover, product);
            match map.add_marker(MarkerSpec::station(stopover.stop.location, popup)) {
                Ok(id) => layers.push(id),
                Err(source) => return Err(RenderError { layers, source }),
            }
        }

        Ok(layers)
    }
}
