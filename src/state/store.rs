//! StateStore - The relay's single detection record behind one mutex
//!
//! Every operation takes the lock once, mutates or copies the record, and
//! releases it before returning. Input validation and logging happen outside
//! the lock, so a rejected write never touches the record.

use super::clock::{Clock, SystemClock};
use super::types::{iso_timestamp, DetectionState, Position};
use crate::error::RelayResult;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Result of one staleness inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// No external write has happened yet
    NeverUpdated,
    /// Already in STOP; nothing to enforce
    Idle,
    /// Last external write is within the allowed age
    Fresh { elapsed: Duration },
    /// Record was forced back to STOP
    Reset { elapsed: Duration },
}

/// Holds the detection record and serializes all access to it
pub struct StateStore {
    state: Mutex<DetectionState>,
    clock: Arc<dyn Clock>,
}

impl StateStore {
    /// Create a store backed by the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store reading time from the given clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let initial = DetectionState::initial(clock.now());
        Self {
            state: Mutex::new(initial),
            clock,
        }
    }

    /// Snapshot of the full record
    pub fn read(&self) -> DetectionState {
        self.state.lock().clone()
    }

    /// Replace position, confidence and detection flag from an external producer
    ///
    /// `position` is matched case-insensitively. Sets both `timestamp` and
    /// `last_update` from a single clock reading.
    pub fn write(
        &self,
        position: &str,
        confidence: f64,
        object_detected: bool,
    ) -> RelayResult<DetectionState> {
        let position: Position = position.parse()?;

        let mut state = self.state.lock();
        let now = self.clock.now();
        state.position = position;
        state.confidence = confidence;
        state.object_detected = object_detected;
        Self::mark_external_write(&mut state, now);
        Ok(state.clone())
    }

    /// Direct override for testing the motors
    ///
    /// Derives `object_detected` from the position and leaves `confidence` alone.
    pub fn manual_write(&self, position: &str) -> RelayResult<DetectionState> {
        let position: Position = position.parse()?;

        let mut state = self.state.lock();
        let now = self.clock.now();
        state.position = position;
        state.object_detected = position.is_active();
        Self::mark_external_write(&mut state, now);
        Ok(state.clone())
    }

    /// Force the record to STOP without counting as an external write
    pub fn force_reset(&self) -> DetectionState {
        let mut state = self.state.lock();
        let now = self.clock.now();
        Self::apply_reset(&mut state, now);
        state.clone()
    }

    /// Inspect staleness and reset to STOP if needed, under one lock acquisition
    ///
    /// Resets only when `now - last_update > max_age` and the position is
    /// active. The reset leaves `last_update` untouched, so once in STOP this
    /// keeps returning [`ResetOutcome::Idle`] until the next external write.
    pub fn reset_if_stale(&self, max_age: Duration) -> ResetOutcome {
        let mut state = self.state.lock();

        let Some(last_update) = state.last_update else {
            return ResetOutcome::NeverUpdated;
        };
        if !state.position.is_active() {
            return ResetOutcome::Idle;
        }

        let now = self.clock.now();
        // A clock stepping backwards reads as zero elapsed
        let elapsed = (now - last_update).to_std().unwrap_or_default();
        if elapsed > max_age {
            Self::apply_reset(&mut state, now);
            ResetOutcome::Reset { elapsed }
        } else {
            ResetOutcome::Fresh { elapsed }
        }
    }

    fn mark_external_write(state: &mut DetectionState, now: DateTime<Local>) {
        state.timestamp = iso_timestamp(&now);
        // Concurrent writers read the clock under the lock, so this never goes backwards
        state.last_update = Some(now);
    }

    fn apply_reset(state: &mut DetectionState, now: DateTime<Local>) {
        state.position = Position::Stop;
        state.object_detected = false;
        state.timestamp = iso_timestamp(&now);
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use crate::state::clock::ManualClock;
    use proptest::prelude::*;
    use std::thread;

    const MAX_AGE: Duration = Duration::from_secs(2);

    fn make_test_store() -> (StateStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let store = StateStore::with_clock(clock.clone());
        (store, clock)
    }

    #[test]
    fn test_initial_state() {
        let store = StateStore::new();
        let state = store.read();

        assert_eq!(state.position, Position::Stop);
        assert_eq!(state.confidence, 0.0);
        assert!(!state.object_detected);
        assert!(state.last_update.is_none());
    }

    #[test]
    fn test_write_and_read() {
        let (store, clock) = make_test_store();
        let call_time = clock.now();

        let returned = store.write("left", 0.87, true).unwrap();
        let read = store.read();

        assert_eq!(returned, read);
        assert_eq!(read.position, Position::Left);
        assert_eq!(read.confidence, 0.87);
        assert!(read.object_detected);
        assert!(read.last_update.unwrap() >= call_time);
        assert_eq!(read.timestamp, iso_timestamp(&read.last_update.unwrap()));
    }

    #[test]
    fn test_write_stores_confidence_unchecked() {
        let (store, _clock) = make_test_store();
        store.write("RIGHT", 7.5, false).unwrap();
        assert_eq!(store.read().confidence, 7.5);
    }

    #[test]
    fn test_invalid_write_leaves_state_unchanged() {
        let (store, clock) = make_test_store();
        store.write("CENTER", 0.5, true).unwrap();
        let before = store.read();

        clock.advance(Duration::from_millis(300));
        let err = store.write("bogus", 0.9, false).unwrap_err();
        assert!(matches!(err, RelayError::InvalidArgument(_)));
        let err = store.manual_write("up").unwrap_err();
        assert!(matches!(err, RelayError::InvalidArgument(_)));

        assert_eq!(store.read(), before);
    }

    #[test]
    fn test_manual_write_derives_object_detected() {
        let (store, _clock) = make_test_store();
        store.write("LEFT", 0.42, false).unwrap();

        let state = store.manual_write("right").unwrap();
        assert_eq!(state.position, Position::Right);
        assert!(state.object_detected);
        assert_eq!(state.confidence, 0.42, "manual write keeps confidence");

        let state = store.manual_write("STOP").unwrap();
        assert!(!state.object_detected);
        assert!(state.last_update.is_some());
    }

    #[test]
    fn test_force_reset_keeps_last_update_and_confidence() {
        let (store, clock) = make_test_store();
        let written = store.write("LEFT", 0.66, true).unwrap();

        clock.advance(Duration::from_secs(3));
        let reset = store.force_reset();

        assert_eq!(reset.position, Position::Stop);
        assert!(!reset.object_detected);
        assert_eq!(reset.confidence, 0.66);
        assert_eq!(reset.last_update, written.last_update);
        assert_ne!(reset.timestamp, written.timestamp);
    }

    #[test]
    fn test_reset_if_stale_never_updated() {
        let (store, clock) = make_test_store();
        clock.advance(Duration::from_secs(60));
        assert_eq!(store.reset_if_stale(MAX_AGE), ResetOutcome::NeverUpdated);
        assert_eq!(store.read().position, Position::Stop);
    }

    #[test]
    fn test_reset_if_stale_boundary() {
        let (store, clock) = make_test_store();
        store.write("LEFT", 0.9, true).unwrap();

        // Exactly at the limit is not stale
        clock.advance(MAX_AGE);
        assert!(matches!(
            store.reset_if_stale(MAX_AGE),
            ResetOutcome::Fresh { .. }
        ));
        assert_eq!(store.read().position, Position::Left);

        clock.advance(Duration::from_millis(1));
        assert!(matches!(
            store.reset_if_stale(MAX_AGE),
            ResetOutcome::Reset { .. }
        ));
        assert_eq!(store.read().position, Position::Stop);
    }

    #[test]
    fn test_reset_if_stale_is_idle_once_stopped() {
        let (store, clock) = make_test_store();
        store.write("CENTER", 0.3, true).unwrap();
        clock.advance(Duration::from_secs(5));

        assert!(matches!(
            store.reset_if_stale(MAX_AGE),
            ResetOutcome::Reset { .. }
        ));
        let after_reset = store.read();

        clock.advance(Duration::from_secs(5));
        assert_eq!(store.reset_if_stale(MAX_AGE), ResetOutcome::Idle);
        assert_eq!(store.read(), after_reset, "idle check must not touch the record");
    }

    #[test]
    fn test_clock_stepping_back_is_not_stale() {
        let (store, clock) = make_test_store();
        let start = clock.now();
        clock.advance(Duration::from_secs(10));
        store.write("LEFT", 0.5, true).unwrap();

        clock.set(start);
        assert_eq!(
            store.reset_if_stale(MAX_AGE),
            ResetOutcome::Fresh {
                elapsed: Duration::ZERO
            }
        );
    }

    /// Each writer uses a fixed (position, confidence, flag) triple, so any
    /// snapshot mixing fields from two writes is detectable.
    #[test]
    fn test_concurrent_readers_see_consistent_records() {
        let store = Arc::new(StateStore::new());
        let triples = [
            ("LEFT", 0.25, true),
            ("RIGHT", 0.5, false),
            ("CENTER", 0.75, true),
            ("STOP", 1.0, false),
        ];

        let mut writers = Vec::new();
        for &(position, confidence, detected) in &triples {
            let store = store.clone();
            writers.push(thread::spawn(move || {
                for _ in 0..2_000 {
                    store.write(position, confidence, detected).unwrap();
                }
            }));
        }

        let mut readers = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            readers.push(thread::spawn(move || {
                for _ in 0..2_000 {
                    let state = store.read();
                    let Some(last_update) = state.last_update else {
                        continue;
                    };
                    let expected = triples
                        .iter()
                        .find(|(p, _, _)| *p == state.position.as_str())
                        .unwrap();
                    assert_eq!(state.confidence, expected.1);
                    assert_eq!(state.object_detected, expected.2);
                    assert_eq!(state.timestamp, iso_timestamp(&last_update));
                }
            }));
        }

        for handle in writers.into_iter().chain(readers) {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_last_update_is_monotonic_under_contention() {
        let store = Arc::new(StateStore::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                let mut prev = None;
                for _ in 0..1_000 {
                    let state = store.write("LEFT", 0.1, true).unwrap();
                    let seen = store.read().last_update;
                    assert!(seen >= state.last_update);
                    assert!(seen >= prev);
                    prev = seen;
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }

    proptest! {
        #[test]
        fn prop_write_round_trips(
            idx in 0usize..4,
            lowercase in any::<bool>(),
            confidence in 0.0f64..=1.0,
            detected in any::<bool>(),
        ) {
            let (store, clock) = make_test_store();
            let expected = Position::ALL[idx];
            let input = if lowercase {
                expected.as_str().to_lowercase()
            } else {
                expected.as_str().to_string()
            };
            let call_time = clock.now();

            store.write(&input, confidence, detected).unwrap();
            let state = store.read();

            prop_assert_eq!(state.position, expected);
            prop_assert_eq!(state.confidence, confidence);
            prop_assert_eq!(state.object_detected, detected);
            prop_assert!(state.last_update.unwrap() >= call_time);
        }
    }
}
