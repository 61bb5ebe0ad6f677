//! WebSocket connection loop with reconnect.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{FeedError, FeedStatus};
use crate::session::SessionEvent;

/// Default upper bound for the reconnect delay.
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 30;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Long-running connection to the live feed.
#[derive(Debug, Clone)]
pub struct FeedConnection {
    url: String,
    max_backoff: Duration,
}

impl FeedConnection {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_backoff: Duration::from_secs(DEFAULT_MAX_BACKOFF_SECS),
        }
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff.max(INITIAL_BACKOFF);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Forward frames to `events` until `shutdown` fires or the session goes
    /// away.
    ///
    /// Connection loss is reported as [`FeedStatus::Disconnected`] and
    /// retried with exponential backoff.
    pub async fn run(self, events: mpsc::Sender<SessionEvent>, shutdown: CancellationToken) {
        info!(url = %self.url, "Feed connection starting");
        let mut backoff = INITIAL_BACKOFF;

        loop {
            let connect = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                result = connect_async(self.url.as_str()) => result,
            };

            let mut ws = match connect {
                Ok((ws, _)) => ws,
                Err(e) => {
                    let err = FeedError::Connect {
                        url: self.url.clone(),
                        message: e.to_string(),
                    };
                    warn!(error = %err, retry_in_secs = backoff.as_secs(), "Feed connect failed");
                    if !sleep_or_cancel(backoff, &shutdown).await {
                        break;
                    }
                    backoff = next_backoff(backoff, self.max_backoff);
                    continue;
                }
            };

            backoff = INITIAL_BACKOFF;
            info!(url = %self.url, "Feed connected");
            if events
                .send(SessionEvent::FeedStatus(FeedStatus::Connected))
                .await
                .is_err()
            {
                break;
            }

            let session_alive = loop {
                let frame = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        let _ = ws.close(None).await;
                        info!("Feed connection stopped");
                        return;
                    }
                    frame = ws.next() => frame,
                };

                match frame {
                    Some(Ok(message)) => match frame_text(message) {
                        Ok(Some(text)) => {
                            if events.send(SessionEvent::FeedMessage(text)).await.is_err() {
                                break false;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!(error = %e, "Dropping feed frame"),
                    },
                    Some(Err(e)) => {
                        let err = FeedError::Stream(e.to_string());
                        warn!(error = %err, "Feed connection lost");
                        break true;
                    }
                    None => {
                        debug!("Feed closed by server");
                        break true;
                    }
                }
            };

            let _ = ws.close(None).await;
            if !session_alive {
                break;
            }
            if events
                .send(SessionEvent::FeedStatus(FeedStatus::Disconnected))
                .await
                .is_err()
            {
                break;
            }
            if !sleep_or_cancel(backoff, &shutdown).await {
                break;
            }
            backoff = next_backoff(backoff, self.max_backoff);
        }

        info!("Feed connection stopped");
    }
}

/// Text payload of a frame, if it carries one.
///
/// Binary frames are accepted when they hold UTF-8; control frames yield
/// `None`.
pub(crate) fn frame_text(message: Message) -> Result<Option<String>, FeedError> {
    match message {
        Message::Text(text) => Ok(Some(text)),
        Message::Binary(bytes) => String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| FeedError::InvalidUtf8),
        _ => Ok(None),
    }
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    (current * 2).min(max)
}

/// Returns `false` if shutdown fired first.
async fn sleep_or_cancel(delay: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
