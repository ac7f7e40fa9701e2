//! Aircraft Snapshot
//!
//! The consumer-side mapping of station code to last known aircraft state.
//!
//! # Design
//!
//! The live feed delivers partial or full batches of aircraft and never
//! deduplicates them itself. The snapshot is where batches are merged:
//! - At most one record per station code
//! - A later update for a known code replaces the prior record
//! - Each record remembers when this client received it
//!
//! Station codes are compared after normalization (trimmed, uppercase).

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::aircraft::{Aircraft, IcaoCode, normalize_icao};

// =============================================================================
// Types
// =============================================================================

/// An aircraft together with the time this client received it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedAircraft {
    /// Last known state.
    pub aircraft: Aircraft,
    /// When the state was received.
    pub received_at: DateTime<Utc>,
}

/// Result of applying a batch to the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotChanges {
    /// Station codes seen for the first time.
    pub inserted: Vec<IcaoCode>,
    /// Station codes whose record was replaced.
    pub updated: Vec<IcaoCode>,
}

impl SnapshotChanges {
    /// Check if the batch changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty()
    }

    /// Number of records touched by the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inserted.len() + self.updated.len()
    }
}

#[derive(Debug, Default)]
struct SnapshotState {
    aircraft: HashMap<IcaoCode, TrackedAircraft>,
    last_update: Option<DateTime<Utc>>,
}

// =============================================================================
// Aircraft Snapshot
// =============================================================================

/// Thread-safe snapshot of tracked aircraft.
///
/// # Example
///
/// ```rust
/// use adsb_live_feed::domain::aircraft::Aircraft;
/// use adsb_live_feed::domain::snapshot::AircraftSnapshot;
///
/// let snapshot = AircraftSnapshot::new();
///
/// let changes = snapshot.apply(vec![Aircraft::new("a1b2c3")]);
/// assert_eq!(changes.inserted, vec!["A1B2C3".to_string()]);
///
/// // Same station code again - replaced, not duplicated
/// let changes = snapshot.apply(vec![Aircraft::new("A1B2C3").with_callsign("BAW123")]);
/// assert_eq!(changes.updated.len(), 1);
/// assert_eq!(snapshot.len(), 1);
/// assert_eq!(snapshot.get("a1b2c3").unwrap().callsign.as_deref(), Some("BAW123"));
/// ```
#[derive(Debug, Default)]
pub struct AircraftSnapshot {
    state: RwLock<SnapshotState>,
}

impl AircraftSnapshot {
    /// Create an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch of aircraft, stamped with the current time.
    pub fn apply(&self, batch: Vec<Aircraft>) -> SnapshotChanges {
        self.apply_at(batch, Utc::now())
    }

    /// Merge a batch of aircraft received at `received_at`.
    ///
    /// Entities with an empty station code are skipped.
    pub fn apply_at(&self, batch: Vec<Aircraft>, received_at: DateTime<Utc>) -> SnapshotChanges {
        let mut changes = SnapshotChanges::default();
        let mut state = self.state.write();

        for aircraft in batch {
            let key = aircraft.key();
            if key.is_empty() {
                tracing::debug!("Skipping aircraft without station code");
                continue;
            }

            let tracked = TrackedAircraft {
                aircraft,
                received_at,
            };

            if state.aircraft.insert(key.clone(), tracked).is_some() {
                changes.updated.push(key);
            } else {
                changes.inserted.push(key);
            }
        }

        state.last_update = Some(received_at);
        changes
    }

    /// Get the last known state of one aircraft.
    #[must_use]
    pub fn get(&self, icao_code: &str) -> Option<Aircraft> {
        self.state
            .read()
            .aircraft
            .get(&normalize_icao(icao_code))
            .map(|tracked| tracked.aircraft.clone())
    }

    /// Get one aircraft with its receive time.
    #[must_use]
    pub fn get_tracked(&self, icao_code: &str) -> Option<TrackedAircraft> {
        self.state
            .read()
            .aircraft
            .get(&normalize_icao(icao_code))
            .cloned()
    }

    /// All tracked aircraft, ordered by station code.
    #[must_use]
    pub fn all(&self) -> Vec<Aircraft> {
        let state = self.state.read();
        let mut entries: Vec<_> = state.aircraft.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
            .into_iter()
            .map(|(_, tracked)| tracked.aircraft.clone())
            .collect()
    }

    /// Number of tracked aircraft.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().aircraft.len()
    }

    /// Check if no aircraft are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().aircraft.is_empty()
    }

    /// Number of tracked aircraft with a known position.
    #[must_use]
    pub fn positioned_count(&self) -> usize {
        self.state
            .read()
            .aircraft
            .values()
            .filter(|tracked| tracked.aircraft.has_position())
            .count()
    }

    /// Receive time of the most recently applied batch.
    #[must_use]
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_update
    }

    /// Stop tracking one aircraft.
    pub fn remove(&self, icao_code: &str) -> Option<Aircraft> {
        self.state
            .write()
            .aircraft
            .remove(&normalize_icao(icao_code))
            .map(|tracked| tracked.aircraft)
    }

    /// Drop every tracked aircraft.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.aircraft.clear();
        state.last_update = None;
    }

    /// Remove aircraft not refreshed within `max_age` of `now`.
    ///
    /// Returns the removed station codes, sorted.
    pub fn prune_older_than(&self, max_age: Duration, now: DateTime<Utc>) -> Vec<IcaoCode> {
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return vec![];
        };
        let cutoff = now - max_age;

        let mut state = self.state.write();
        let mut removed: Vec<IcaoCode> = state
            .aircraft
            .iter()
            .filter(|(_, tracked)| tracked.received_at < cutoff)
            .map(|(code, _)| code.clone())
            .collect();

        for code in &removed {
            state.aircraft.remove(code);
        }

        removed.sort_unstable();
        removed
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn apply_inserts_new_aircraft() {
        let snapshot = AircraftSnapshot::new();

        let changes = snapshot.apply(vec![Aircraft::new("ABC123"), Aircraft::new("DEF456")]);

        assert_eq!(changes.inserted, vec!["ABC123", "DEF456"]);
        assert!(changes.updated.is_empty());
        assert_eq!(changes.len(), 2);
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn later_update_replaces_never_duplicates() {
        let snapshot = AircraftSnapshot::new();

        snapshot.apply(vec![Aircraft::new("ABC123").with_position(1.0, 2.0, None)]);
        let changes =
            snapshot.apply(vec![Aircraft::new("abc123").with_position(3.0, 4.0, Some(9000.0))]);

        assert_eq!(changes.updated, vec!["ABC123"]);
        assert_eq!(snapshot.len(), 1);

        let aircraft = snapshot.get("ABC123").unwrap();
        assert_eq!(aircraft.latitude, Some(3.0));
        assert_eq!(aircraft.altitude, Some(9000.0));
    }

    #[test]
    fn duplicates_within_one_batch_keep_last() {
        let snapshot = AircraftSnapshot::new();

        let changes = snapshot.apply(vec![
            Aircraft::new("ABC123").with_callsign("FIRST"),
            Aircraft::new("ABC123").with_callsign("SECOND"),
        ]);

        assert_eq!(changes.inserted, vec!["ABC123"]);
        assert_eq!(changes.updated, vec!["ABC123"]);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot.get("ABC123").unwrap().callsign.as_deref(),
            Some("SECOND")
        );
    }

    #[test]
    fn empty_station_code_is_skipped() {
        let snapshot = AircraftSnapshot::new();

        let changes = snapshot.apply(vec![Aircraft::new("  ")]);

        assert!(changes.is_empty());
        assert!(snapshot.is_empty());
    }

    #[test]
    fn all_is_ordered_by_station_code() {
        let snapshot = AircraftSnapshot::new();
        snapshot.apply(vec![
            Aircraft::new("FFF000"),
            Aircraft::new("000AAA"),
            Aircraft::new("ABC123"),
        ]);

        let codes: Vec<_> = snapshot.all().into_iter().map(|a| a.icao_code).collect();
        assert_eq!(codes, vec!["000AAA", "ABC123", "FFF000"]);
    }

    #[test]
    fn last_update_tracks_latest_batch() {
        let snapshot = AircraftSnapshot::new();
        assert!(snapshot.last_update().is_none());

        snapshot.apply_at(vec![Aircraft::new("ABC123")], at(0));
        snapshot.apply_at(vec![], at(5));

        assert_eq!(snapshot.last_update(), Some(at(5)));
        assert_eq!(snapshot.get_tracked("ABC123").unwrap().received_at, at(0));
    }

    #[test]
    fn remove_and_clear() {
        let snapshot = AircraftSnapshot::new();
        snapshot.apply(vec![Aircraft::new("ABC123"), Aircraft::new("DEF456")]);

        assert!(snapshot.remove("abc123").is_some());
        assert!(snapshot.remove("ABC123").is_none());
        assert_eq!(snapshot.len(), 1);

        snapshot.clear();
        assert!(snapshot.is_empty());
        assert!(snapshot.last_update().is_none());
    }

    #[test]
    fn prune_removes_stale_aircraft() {
        let snapshot = AircraftSnapshot::new();
        snapshot.apply_at(vec![Aircraft::new("OLD001")], at(0));
        snapshot.apply_at(vec![Aircraft::new("NEW001")], at(100));

        let removed = snapshot.prune_older_than(Duration::from_secs(60), at(120));

        assert_eq!(removed, vec!["OLD001"]);
        assert!(snapshot.get("NEW001").is_some());
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn positioned_count_ignores_unknown_positions() {
        let snapshot = AircraftSnapshot::new();
        snapshot.apply(vec![
            Aircraft::new("ABC123").with_position(51.0, 0.0, None),
            Aircraft::new("DEF456"),
        ]);

        assert_eq!(snapshot.positioned_count(), 1);
    }
}
