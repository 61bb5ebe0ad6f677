//! Deep-link auto-selection.
//!
//! A session may start with an identifier taken from a URL fragment. Once a
//! snapshot has been applied, the tracker looks for the vehicle it names:
//!
//! 1. an entry whose feed id equals the identifier exactly, else
//! 2. an entry matching the trip data returned by the lookup endpoint for
//!    that identifier: same digits in the line name, same direction, same
//!    final arrival time.
//!
//! The second step exists because links can come from sources whose trip ids
//! differ from the feed's. It is a best-effort heuristic: the first entry in
//! registry order that matches wins, and a miss is silently skipped. After a
//! configured number of misses the link is abandoned.

use chrono::{DateTime, FixedOffset};
use tracing::debug;

use crate::fetch::FetchError;
use crate::model::{SnapshotToken, TripDetail, TripId};
use crate::registry::{MarkerRegistry, VehicleSummary};

/// Default number of snapshots to try before giving up on a link.
pub const DEFAULT_MAX_MISSES: u32 = 10;

/// Identifier taken from a URL fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLink(String);

impl DeepLink {
    /// Parse `#id`, a full URL with a fragment, or a bare identifier.
    ///
    /// Returns `None` when nothing usable remains.
    pub fn parse(input: &str) -> Option<Self> {
        let raw = match input.split_once('#') {
            Some((_, fragment)) => fragment,
            None => input,
        };
        let raw = raw.trim();
        if raw.is_empty() {
            None
        } else {
            Some(Self(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Matchable facts about the trip a deep link refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTrip {
    pub line_name: String,
    pub direction: String,
    pub final_arrival: Option<DateTime<FixedOffset>>,
}

impl ResolvedTrip {
    pub fn from_trip(trip: &TripDetail) -> Self {
        Self {
            line_name: trip
                .line
                .as_ref()
                .map(|l| l.name.clone())
                .unwrap_or_default(),
            direction: trip.direction.clone().unwrap_or_default(),
            final_arrival: trip.final_arrival(),
        }
    }

    /// Line digits, direction and final arrival must all agree.
    pub fn matches(&self, vehicle: &VehicleSummary) -> bool {
        let digits = line_digits(&self.line_name);
        if digits.is_empty() || digits != line_digits(&vehicle.line_name) {
            return false;
        }
        if normalize(&self.direction) != normalize(&vehicle.direction) {
            return false;
        }
        match (self.final_arrival, vehicle.final_arrival) {
            (Some(expected), Some(actual)) => expected == actual,
            _ => false,
        }
    }
}

/// Digits of a line name: `"RE 7"` → `"7"`, `"S 21"` → `"21"`.
pub fn line_digits(name: &str) -> String {
    name.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Progress of the lookup request.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// No lookup source configured; only exact matches are possible.
    Unavailable,
    /// Lookup in flight.
    Pending,
    Resolved(ResolvedTrip),
    /// Lookup failed; only exact matches are possible.
    Failed,
}

/// Result of one matching attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeepLinkMatch {
    /// A tracked vehicle was found; the link is consumed.
    Matched(TripId),
    /// Nothing found this time.
    Miss,
    /// Too many misses; the link is dropped.
    Abandoned,
}

/// Pending deep link and its matching state.
#[derive(Debug, Clone)]
pub struct DeepLinkTracker {
    link: DeepLink,
    resolution: Resolution,
    misses: u32,
    max_misses: u32,
}

impl DeepLinkTracker {
    pub fn new(link: DeepLink, max_misses: u32) -> Self {
        Self {
            link,
            resolution: Resolution::Unavailable,
            misses: 0,
            max_misses,
        }
    }

    pub fn link(&self) -> &DeepLink {
        &self.link
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    /// Mark the lookup as in flight.
    pub fn begin_resolution(&mut self) {
        self.resolution = Resolution::Pending;
    }

    /// Record the lookup result.
    pub fn finish_resolution(&mut self, result: Result<ResolvedTrip, FetchError>) {
        self.resolution = match result {
            Ok(resolved) => {
                debug!(link = self.link.as_str(), ?resolved, "Deep link resolved");
                Resolution::Resolved(resolved)
            }
            Err(e) => {
                debug!(link = self.link.as_str(), error = %e, "Deep link lookup failed");
                Resolution::Failed
            }
        };
    }

    /// Look for the linked vehicle among entries stamped with `token`.
    ///
    /// Misses are only counted once the lookup has settled, so a slow lookup
    /// does not use up the attempts.
    pub fn find_match(&mut self, registry: &MarkerRegistry, token: SnapshotToken) -> DeepLinkMatch {
        let exact = TripId::from(self.link.as_str());
        if registry.get(&exact).is_some_and(|e| e.last_seen() == token) {
            return DeepLinkMatch::Matched(exact);
        }

        if let Resolution::Resolved(resolved) = &self.resolution {
            if let Some((id, _)) = registry
                .entries()
                .filter(|(_, entry)| entry.last_seen() == token)
                .find(|(_, entry)| resolved.matches(entry.summary()))
            {
                return DeepLinkMatch::Matched(id.clone());
            }
        }

        if self.resolution == Resolution::Pending {
            return DeepLinkMatch::Miss;
        }

        self.misses += 1;
        if self.misses >= self.max_misses {
            DeepLinkMatch::Abandoned
        } else {
            DeepLinkMatch::Miss
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MemoryMap;
    use crate::model::{UpcomingStopover, VehiclePosition};
    use crate::testing::vehicle;

    fn arrival(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn resolved() -> ResolvedTrip {
        ResolvedTrip {
            line_name: "RE7".to_string(),
            direction: "Kiel Hbf".to_string(),
            final_arrival: Some(arrival("2026-10-16T11:20:00+02:00")),
        }
    }

    fn tracked(id: &str, line: &str, direction: &str, final_arrival: &str) -> VehiclePosition {
        let mut v = vehicle(id, 54.0, 10.0);
        v.line.name = line.to_string();
        v.direction = direction.to_string();
        v.next_stopovers = vec![UpcomingStopover {
            arrival: Some(arrival(final_arrival)),
        }];
        v
    }

    fn registry_with(vehicles: &[VehiclePosition]) -> MarkerRegistry {
        let mut registry = MarkerRegistry::default();
        let mut map = MemoryMap::new();
        for v in vehicles {
            registry.upsert(v, SnapshotToken::new(1), &mut map).unwrap();
        }
        registry
    }

    #[test]
    fn test_parse_fragment_forms() {
        assert_eq!(DeepLink::parse("#T1").unwrap().as_str(), "T1");
        assert_eq!(
            DeepLink::parse("http://localhost:3000/#1|234|0").unwrap().as_str(),
            "1|234|0"
        );
        assert_eq!(DeepLink::parse("T1").unwrap().as_str(), "T1");
        assert!(DeepLink::parse("#").is_none());
        assert!(DeepLink::parse("http://localhost:3000/#  ").is_none());
    }

    #[test]
    fn test_line_digits() {
        assert_eq!(line_digits("RE 7"), "7");
        assert_eq!(line_digits("S21"), "21");
        assert_eq!(line_digits("ICE"), "");
    }

    #[test]
    fn test_matches_requires_all_three() {
        let r = resolved();
        let summary = |line: &str, dir: &str, at: &str| VehicleSummary {
            line_name: line.to_string(),
            direction: dir.to_string(),
            final_arrival: Some(arrival(at)),
        };

        assert!(r.matches(&summary("RE 7", "kiel hbf ", "2026-10-16T11:20:00+02:00")));
        assert!(!r.matches(&summary("RE 70", "Kiel Hbf", "2026-10-16T11:20:00+02:00")));
        assert!(!r.matches(&summary("RE 7", "Flensburg", "2026-10-16T11:20:00+02:00")));
        assert!(!r.matches(&summary("RE 7", "Kiel Hbf", "2026-10-16T11:21:00+02:00")));
        assert!(r.matches(&summary("RE 7", "Kiel Hbf", "2026-10-16T09:20:00Z")));
    }

    #[test]
    fn test_exact_id_wins_without_lookup() {
        let registry = registry_with(&[vehicle("T1", 54.0, 10.0)]);
        let mut tracker = DeepLinkTracker::new(DeepLink::parse("#T1").unwrap(), 3);

        assert_eq!(
            tracker.find_match(&registry, SnapshotToken::new(1)),
            DeepLinkMatch::Matched(TripId::from("T1"))
        );
    }

    #[test]
    fn test_heuristic_match_after_resolution() {
        let registry = registry_with(&[
            tracked("a", "RE 7", "Flensburg", "2026-10-16T11:20:00+02:00"),
            tracked("b", "RE 7", "Kiel Hbf", "2026-10-16T11:20:00+02:00"),
        ]);
        let mut tracker = DeepLinkTracker::new(DeepLink::parse("#ext-99").unwrap(), 3);
        tracker.begin_resolution();

        assert_eq!(tracker.find_match(&registry, SnapshotToken::new(1)), DeepLinkMatch::Miss);

        tracker.finish_resolution(Ok(resolved()));
        assert_eq!(
            tracker.find_match(&registry, SnapshotToken::new(1)),
            DeepLinkMatch::Matched(TripId::from("b"))
        );
    }

    #[test]
    fn test_pending_lookup_does_not_count_misses() {
        let registry = registry_with(&[]);
        let mut tracker = DeepLinkTracker::new(DeepLink::parse("#x").unwrap(), 1);
        tracker.begin_resolution();

        for _ in 0..5 {
            assert_eq!(tracker.find_match(&registry, SnapshotToken::new(1)), DeepLinkMatch::Miss);
        }

        tracker.finish_resolution(Err(FetchError::Unsupported));
        assert_eq!(tracker.find_match(&registry, SnapshotToken::new(1)), DeepLinkMatch::Abandoned);
    }

    #[test]
    fn test_abandoned_after_max_misses() {
        let registry = registry_with(&[vehicle("T1", 54.0, 10.0)]);
        let mut tracker = DeepLinkTracker::new(DeepLink::parse("#T9").unwrap(), 3);

        assert_eq!(tracker.find_match(&registry, SnapshotToken::new(1)), DeepLinkMatch::Miss);
        assert_eq!(tracker.find_match(&registry, SnapshotToken::new(1)), DeepLinkMatch::Miss);
        assert_eq!(tracker.find_match(&registry, SnapshotToken::new(1)), DeepLinkMatch::Abandoned);
    }

    #[test]
    fn test_stale_entries_are_not_matched() {
        let registry = registry_with(&[vehicle("T1", 54.0, 10.0)]);
        let mut tracker = DeepLinkTracker::new(DeepLink::parse("#T1").unwrap(), 3);

        assert_eq!(
            tracker.find_match(&registry, SnapshotToken::new(2)),
            DeepLinkMatch::Miss
        );
    }

    #[test]
    fn test_resolved_trip_from_trip_detail() {
        let trip = crate::model::TripResponse::from_json(crate::testing::TRIP_JSON).unwrap();
        let r = ResolvedTrip::from_trip(&trip);

        assert_eq!(r.line_name, "RE 7");
        assert_eq!(r.direction, "Kiel Hbf");
        assert_eq!(r.final_arrival, Some(arrival("2026-10-16T11:20:00+02:00")));
    }
}
