//! Detail fetcher: trip lookups over the backend API.
//!
//! Two lookups exist, both single request/response round trips with no
//! retry and no caching:
//!
//! - [`TripFetcher::fetch_trip`] - stop list and path of a tracked vehicle
//! - [`DeepLinkResolver::resolve`] - trip data for an externally sourced
//!   identifier, used to find the matching tracked vehicle
//!
//! Both traits are dyn-compatible so the session can hold them as
//! `Arc<dyn ...>` and tests can inject scripted implementations.

mod http;

pub use http::{HttpTripClient, DEFAULT_LOOKUP_PATH, DEFAULT_TIMEOUT_SECS, DEFAULT_TRIP_PATH};

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::deep_link::ResolvedTrip;
use crate::model::{TripDetail, TripId};

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors surfaced by a lookup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Body could not be decoded or failed validation.
    #[error("invalid response: {0}")]
    Decode(String),

    /// The source cannot answer this kind of lookup.
    #[error("lookup not supported")]
    Unsupported,
}

/// Looks up trip detail for a tracked vehicle.
pub trait TripFetcher: Send + Sync {
    fn fetch_trip<'a>(&'a self, id: &'a TripId) -> BoxFuture<'a, Result<TripDetail, FetchError>>;
}

/// Resolves an external trip identifier to matchable trip data.
pub trait DeepLinkResolver: Send + Sync {
    fn resolve<'a>(&'a self, external_id: &'a str)
        -> BoxFuture<'a, Result<ResolvedTrip, FetchError>>;
}
