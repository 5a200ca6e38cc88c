//! # Recitation Tracker
//!
//! Per-session state machine classifying each confirmed ayah position as
//! correct, repeat, skip, or wrong relative to the expected next position.
//!
//! ## Classification Rules (checked in order):
//! 1. **Correct**: the position equals the expected one; expectation
//!    advances by one
//! 2. **Repeat**: the position was already seen, either recited earlier or
//!    recorded inside an earlier skip range; expectation unchanged
//! 3. **Skip**: the position jumps ahead; the entry records exactly which
//!    positions were jumped over and expectation lands past the jump
//! 4. **Wrong**: the position falls behind the expectation without ever
//!    having been seen; expectation unchanged
//!
//! The branch order matters: an exact match always wins over "already
//! seen", so re-reciting the current expected ayah is correct, not repeat.
//!
//! The tracker does no I/O and produces no errors. Callers confirm
//! positions (threshold gating, surah filtering) before updates reach it;
//! non-positive positions are a caller contract violation.

use serde::Serialize;

/// Classification of one accepted recitation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecitationStatus {
    /// The expected ayah, recited in order
    Correct,
    /// An ayah already seen earlier in the session
    Repeat,
    /// A jump ahead; `skipped` holds the contiguous jumped-over positions
    Skip { skipped: Vec<u32> },
    /// A backward jump to an ayah never seen in this session
    Wrong,
}

impl RecitationStatus {
    /// Convert status to string for API responses.
    pub fn as_str(&self) -> &str {
        match self {
            RecitationStatus::Correct => "correct",
            RecitationStatus::Repeat => "repeat",
            RecitationStatus::Skip { .. } => "skip",
            RecitationStatus::Wrong => "wrong",
        }
    }
}

/// One accepted update in a session's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecitationEntry {
    /// The recited ayah number
    pub ayah: u32,

    /// How it was classified
    #[serde(flatten)]
    pub status: RecitationStatus,
}

/// The per-session recitation state machine.
///
/// History is append-only and insertion-ordered; every accepted update
/// adds exactly one entry, repeats and wrongs included. The expected
/// position never decreases.
#[derive(Debug, Clone)]
pub struct RecitationTracker {
    /// Next ayah the tracker expects
    expected: u32,

    /// All accepted updates, chronological
    history: Vec<RecitationEntry>,
}

impl RecitationTracker {
    /// Create a tracker locked onto its first confirmed ayah.
    ///
    /// The lock-on ayah counts as the session's first correct recitation:
    /// it is seeded into history and expectation moves past it. Sessions
    /// may start mid-surah.
    pub fn start_at(first_ayah: u32) -> Self {
        Self {
            expected: first_ayah + 1,
            history: vec![RecitationEntry {
                ayah: first_ayah,
                status: RecitationStatus::Correct,
            }],
        }
    }

    /// Next ayah the tracker expects.
    pub fn expected(&self) -> u32 {
        self.expected
    }

    /// All accepted updates so far, oldest first.
    pub fn history(&self) -> &[RecitationEntry] {
        &self.history
    }

    /// Whether an ayah was already seen this session.
    ///
    /// Covers both recited entries and the jumped-over positions recorded
    /// inside skip entries, so reciting a previously-skipped ayah counts
    /// as a repeat rather than a wrong.
    fn seen(&self, ayah: u32) -> bool {
        self.history.iter().any(|entry| {
            entry.ayah == ayah
                || matches!(&entry.status, RecitationStatus::Skip { skipped } if skipped.contains(&ayah))
        })
    }

    /// Classify a confirmed ayah and update state.
    ///
    /// ## Returns:
    /// The classification appended to history. The same value is also the
    /// last history entry's status.
    pub fn update(&mut self, ayah: u32) -> RecitationStatus {
        let status = if ayah == self.expected {
            self.expected += 1;
            RecitationStatus::Correct
        } else if self.seen(ayah) {
            RecitationStatus::Repeat
        } else if ayah > self.expected {
            let skipped: Vec<u32> = (self.expected..ayah).collect();
            self.expected = ayah + 1;
            RecitationStatus::Skip { skipped }
        } else {
            RecitationStatus::Wrong
        };

        self.history.push(RecitationEntry {
            ayah,
            status: status.clone(),
        });
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_recitation_is_all_correct() {
        let mut tracker = RecitationTracker::start_at(1);
        assert_eq!(tracker.expected(), 2);

        for ayah in 2..=5 {
            assert_eq!(tracker.update(ayah), RecitationStatus::Correct);
            assert_eq!(tracker.expected(), ayah + 1);
        }
        assert_eq!(tracker.history().len(), 5);
    }

    #[test]
    fn test_lock_on_seeds_history() {
        let tracker = RecitationTracker::start_at(1);
        assert_eq!(
            tracker.history(),
            &[RecitationEntry {
                ayah: 1,
                status: RecitationStatus::Correct,
            }]
        );
    }

    #[test]
    fn test_reciting_expected_twice_is_correct_then_repeat() {
        let mut tracker = RecitationTracker::start_at(1);
        assert_eq!(tracker.update(2), RecitationStatus::Correct);
        assert_eq!(tracker.update(2), RecitationStatus::Repeat);
        // Expectation did not move on the repeat
        assert_eq!(tracker.expected(), 3);
        assert_eq!(tracker.history().len(), 3);
    }

    #[test]
    fn test_reciting_the_lock_on_ayah_again_is_repeat() {
        let mut tracker = RecitationTracker::start_at(1);
        assert_eq!(tracker.update(1), RecitationStatus::Repeat);
    }

    #[test]
    fn test_jump_ahead_records_exact_skipped_range() {
        let mut tracker = RecitationTracker::start_at(1);
        // expected = 2, jump to 5
        assert_eq!(
            tracker.update(5),
            RecitationStatus::Skip {
                skipped: vec![2, 3, 4],
            }
        );
        assert_eq!(tracker.expected(), 6);
    }

    #[test]
    fn test_unseen_backward_position_is_wrong() {
        let mut tracker = RecitationTracker::start_at(3);
        assert_eq!(tracker.expected(), 4);

        assert_eq!(tracker.update(1), RecitationStatus::Wrong);
        assert_eq!(tracker.expected(), 4);
        // The wrong attempt still lands in history
        assert_eq!(tracker.history().len(), 2);
    }

    #[test]
    fn test_previously_skipped_position_is_repeat() {
        let mut tracker = RecitationTracker::start_at(1);
        tracker.update(3);  // skip over 2
        assert_eq!(tracker.update(2), RecitationStatus::Repeat);
        assert_eq!(tracker.expected(), 4);
    }

    #[test]
    fn test_skip_target_recited_again_is_repeat() {
        let mut tracker = RecitationTracker::start_at(1);
        tracker.update(4);
        assert_eq!(tracker.update(4), RecitationStatus::Repeat);
    }

    #[test]
    fn test_wrong_position_becomes_repeat_when_recited_again() {
        let mut tracker = RecitationTracker::start_at(5);
        assert_eq!(tracker.update(2), RecitationStatus::Wrong);
        assert_eq!(tracker.update(2), RecitationStatus::Repeat);
    }

    #[test]
    fn test_out_of_bounds_jump_is_permissive() {
        // The tracker does not know surah lengths; a jump past any real
        // surah end still classifies as a skip
        let mut tracker = RecitationTracker::start_at(1);
        let status = tracker.update(999);
        match status {
            RecitationStatus::Skip { skipped } => {
                assert_eq!(skipped.len(), 997);
                assert_eq!(skipped.first(), Some(&2));
                assert_eq!(skipped.last(), Some(&998));
            }
            other => panic!("expected skip, got {:?}", other),
        }
        assert_eq!(tracker.expected(), 1000);
    }

    #[test]
    fn test_start_mid_surah() {
        let mut tracker = RecitationTracker::start_at(50);
        assert_eq!(tracker.expected(), 51);
        assert_eq!(tracker.update(51), RecitationStatus::Correct);
    }

    #[test]
    fn test_expected_position_never_decreases() {
        let mut tracker = RecitationTracker::start_at(1);
        let sequence = [2, 5, 2, 3, 1, 7, 6, 100, 4];

        let mut last_expected = tracker.expected();
        for ayah in sequence {
            tracker.update(ayah);
            assert!(
                tracker.expected() >= last_expected,
                "expected position decreased after update({})",
                ayah
            );
            last_expected = tracker.expected();
        }
        // One entry per accepted update plus the lock-on seed
        assert_eq!(tracker.history().len(), sequence.len() + 1);
    }

    #[test]
    fn test_history_entry_serialization_shape() {
        let mut tracker = RecitationTracker::start_at(1);
        tracker.update(4);

        let json = serde_json::to_value(tracker.history()).unwrap();
        assert_eq!(json[0], serde_json::json!({"ayah": 1, "status": "correct"}));
        assert_eq!(
            json[1],
            serde_json::json!({"ayah": 4, "status": "skip", "skipped": [2, 3]})
        );
    }
}
