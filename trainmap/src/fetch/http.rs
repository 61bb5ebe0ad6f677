//! Backend API client using reqwest.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use super::{BoxFuture, DeepLinkResolver, FetchError, TripFetcher};
use crate::deep_link::ResolvedTrip;
use crate::model::{TripDetail, TripId, TripResponse};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Path of the trip detail endpoint.
pub const DEFAULT_TRIP_PATH: &str = "/trip";

/// Path of the external trip lookup endpoint.
pub const DEFAULT_LOOKUP_PATH: &str = "/trip/lookup";

#[derive(Serialize)]
struct TripRequest<'a> {
    id: &'a str,
}

/// Client for the trip and lookup endpoints.
///
/// Both endpoints take `POST {"id": "..."}` and answer with
/// `{"trip": {...}}`.
#[derive(Debug, Clone)]
pub struct HttpTripClient {
    client: reqwest::Client,
    base_url: String,
    trip_path: String,
    lookup_path: String,
}

impl HttpTripClient {
    /// Create a client with the default timeout and paths.
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT_SECS)
    }

    /// Create a client with a custom timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| FetchError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            trip_path: DEFAULT_TRIP_PATH.to_string(),
            lookup_path: DEFAULT_LOOKUP_PATH.to_string(),
        })
    }

    /// Override the endpoint paths.
    pub fn with_paths(mut self, trip_path: impl Into<String>, lookup_path: impl Into<String>) -> Self {
        self.trip_path = trip_path.into();
        self.lookup_path = lookup_path.into();
        self
    }

    pub fn trip_url(&self) -> String {
        join_url(&self.base_url, &self.trip_path)
    }

    pub fn lookup_url(&self) -> String {
        join_url(&self.base_url, &self.lookup_path)
    }

    async fn post_trip(&self, url: String, id: &str) -> Result<TripDetail, FetchError> {
        debug!(url = %url, id, "Requesting trip");

        let response = self
            .client
            .post(&url)
            .json(&TripRequest { id })
            .send()
            .await
            .map_err(|e| FetchError::Http(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Http(format!("Failed to read response: {}", e)))?;

        TripResponse::from_json(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

impl TripFetcher for HttpTripClient {
    fn fetch_trip<'a>(&'a self, id: &'a TripId) -> BoxFuture<'a, Result<TripDetail, FetchError>> {
        Box::pin(self.post_trip(self.trip_url(), id.as_str()))
    }
}

impl DeepLinkResolver for HttpTripClient {
    fn resolve<'a>(
        &'a self,
        external_id: &'a str,
    ) -> BoxFuture<'a, Result<ResolvedTrip, FetchError>> {
        Box::pin(async move {
            let trip = self.post_trip(self.lookup_url(), external_id).await?;
            Ok(ResolvedTrip::from_trip(&trip))
        })
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
