//! Session counters and status reports.

use std::fmt;

use crate::feed::FeedStatus;
use crate::model::{SnapshotToken, TripId, UpdateStamp};
use crate::selection::SelectionPhase;

/// Cumulative counters for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Snapshots reconciled into the registry.
    pub snapshots_applied: u64,
    /// Snapshots rejected as malformed.
    pub snapshots_dropped: u64,
    pub vehicles_added: u64,
    pub vehicles_expired: u64,
    /// Vehicle markers the map refused to place or move.
    pub marker_failures: u64,
    pub selections_started: u64,
    pub selections_completed: u64,
    /// Results discarded because a newer selection or a deselect took over.
    pub selections_superseded: u64,
    /// Fetch or render failures.
    pub selections_failed: u64,
    pub deep_links_matched: u64,
    pub deep_links_abandoned: u64,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "snapshots {} applied / {} dropped, vehicles {} added / {} expired, \
             selections {} started / {} completed / {} superseded / {} failed",
            self.snapshots_applied,
            self.snapshots_dropped,
            self.vehicles_added,
            self.vehicles_expired,
            self.selections_started,
            self.selections_completed,
            self.selections_superseded,
            self.selections_failed,
        )
    }
}

/// Point-in-time view of a session, answered to [`SessionEvent::Status`].
///
/// [`SessionEvent::Status`]: super::SessionEvent::Status
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub feed: FeedStatus,
    pub token: SnapshotToken,
    /// Server stamp of the last applied snapshot.
    pub last_update: Option<UpdateStamp>,
    pub tracked: usize,
    pub active: Option<TripId>,
    /// Phase of the active vehicle; `Idle` when nothing is selected.
    pub phase: SelectionPhase,
    pub detail_layers: usize,
    pub deep_link_pending: bool,
    pub stats: SessionStats,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "feed:      {}", self.feed)?;
        match &self.last_update {
            Some(stamp) => writeln!(f, "snapshot:  {} (updated {})", self.token, stamp)?,
            None => writeln!(f, "snapshot:  {}", self.token)?,
        }
        writeln!(f, "vehicles:  {}", self.tracked)?;
        match &self.active {
            Some(id) => writeln!(
                f,
                "selected:  {} ({:?}, {} layers)",
                id, self.phase, self.detail_layers
            )?,
            None => writeln!(f, "selected:  none")?,
        }
        if self.deep_link_pending {
            writeln!(f, "deep link: waiting for match")?;
        }
        write!(f, "stats:     {}", self.stats)
    }
}
