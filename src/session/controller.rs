//! # Session Controller
//!
//! Drives one recitation session: transcript in, outcome out. The
//! controller owns the phase state (unlocked vs locked onto a surah), the
//! two-threshold gate, the tracker lifecycle, and the attempt sinks.
//!
//! ## The Two Phases:
//! - **Unlocked**: every transcript is matched against the whole corpus.
//!   Only a candidate at or above the lock-on threshold starts a session;
//!   anything weaker is a no-op and the user just keeps reciting.
//! - **Locked**: matching narrows to the locked surah and the looser
//!   in-session threshold applies. Accepted candidates flow into the
//!   tracker and its classification is reported.
//!
//! A below-threshold or candidate-less round leaves session state fully
//! untouched, exactly like silence. Collaborator failures (the embedder
//! erroring out) propagate as errors and also leave state untouched.

use crate::config::MatchingConfig;
use crate::corpus::MatchCandidate;
use crate::matching::MatchEngine;
use crate::session::attempts::{AttemptRecord, AttemptSink};
use crate::session::tracker::{RecitationEntry, RecitationStatus, RecitationTracker};
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::sync::Arc;

/// Threshold and sizing policy for one session.
///
/// Captured at construction; later config changes apply only to sessions
/// created afterwards. Both gates accept similarity exactly equal to the
/// threshold.
#[derive(Debug, Clone, Copy)]
pub struct MatchPolicy {
    pub lock_on_threshold: f32,
    pub in_session_threshold: f32,
    pub top_k: usize,
}

impl MatchPolicy {
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self {
            lock_on_threshold: config.lock_on_threshold,
            in_session_threshold: config.in_session_threshold,
            top_k: config.top_k,
        }
    }

    /// Whether a similarity clears the bar for starting a session.
    pub fn lock_on_accepts(&self, similarity: f32) -> bool {
        similarity >= self.lock_on_threshold
    }

    /// Whether a similarity clears the bar inside an active session.
    pub fn in_session_accepts(&self, similarity: f32) -> bool {
        similarity >= self.in_session_threshold
    }
}

/// What one transcript round produced.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RoundOutcome {
    /// No candidate at all (blank transcript or empty filter result)
    NoMatch,
    /// Best candidate fell below the applicable threshold; state untouched
    BelowThreshold {
        candidate: MatchCandidate,
        threshold: f32,
    },
    /// Lock-on succeeded; the session is now tracking this surah
    SessionStarted { candidate: MatchCandidate },
    /// An in-session candidate was accepted and classified
    Tracked {
        candidate: MatchCandidate,
        classification: RecitationStatus,
    },
}

/// Serializable view of a session's current state.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub active: bool,
    pub surah: Option<u32>,
    /// Verse count of the locked surah, for client-side completion display
    pub total_ayahs: Option<u32>,
    pub expected_ayah: Option<u32>,
    pub history: Vec<RecitationEntry>,
}

/// State held only while locked onto a surah.
struct LockedState {
    surah: u32,
    tracker: RecitationTracker,
}

/// Orchestrates one recitation session.
///
/// ## Concurrency:
/// One transcript is fully processed before the next; the registry wraps
/// each controller in an async mutex to guarantee this. Controllers share
/// no mutable state with each other.
pub struct SessionController {
    engine: Arc<MatchEngine>,
    policy: MatchPolicy,
    sinks: Vec<Arc<dyn AttemptSink>>,
    locked: Option<LockedState>,
}

impl SessionController {
    /// Create an unlocked session.
    ///
    /// ## Parameters:
    /// - **engine**: Shared transcript-to-candidates pipeline
    /// - **policy**: Thresholds and top_k for this session's lifetime
    /// - **sinks**: Receivers notified once per accepted match
    pub fn new(
        engine: Arc<MatchEngine>,
        policy: MatchPolicy,
        sinks: Vec<Arc<dyn AttemptSink>>,
    ) -> Self {
        Self {
            engine,
            policy,
            sinks,
            locked: None,
        }
    }

    /// Whether the session has locked onto a surah.
    pub fn is_active(&self) -> bool {
        self.locked.is_some()
    }

    /// The policy this session was created with.
    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Process one transcript round.
    ///
    /// ## Returns:
    /// - **Ok(outcome)**: What the round produced; `NoMatch` and
    ///   `BelowThreshold` leave state untouched
    /// - **Err(anyhow::Error)**: A collaborator failed before a candidate
    ///   was accepted; session state is untouched
    pub fn handle_transcript(&mut self, transcript: &str) -> Result<RoundOutcome> {
        match &mut self.locked {
            None => {
                let candidates =
                    self.engine
                        .match_transcript(transcript, None, self.policy.top_k)?;
                let Some(best) = candidates.into_iter().next() else {
                    return Ok(RoundOutcome::NoMatch);
                };

                if !self.policy.lock_on_accepts(best.similarity) {
                    tracing::debug!(
                        "Best candidate {}:{} at {:.3} below lock-on threshold {}",
                        best.surah,
                        best.ayah,
                        best.similarity,
                        self.policy.lock_on_threshold
                    );
                    return Ok(RoundOutcome::BelowThreshold {
                        threshold: self.policy.lock_on_threshold,
                        candidate: best,
                    });
                }

                self.locked = Some(LockedState {
                    surah: best.surah,
                    tracker: RecitationTracker::start_at(best.ayah),
                });
                self.record_attempt(&best, transcript);
                tracing::info!(
                    "Session locked onto surah {} at ayah {} (similarity {:.3})",
                    best.surah,
                    best.ayah,
                    best.similarity
                );
                Ok(RoundOutcome::SessionStarted { candidate: best })
            }
            Some(locked) => {
                let surah = locked.surah;
                let candidates =
                    self.engine
                        .match_transcript(transcript, Some(surah), self.policy.top_k)?;
                let Some(best) = candidates.into_iter().next() else {
                    return Ok(RoundOutcome::NoMatch);
                };

                // The query was filtered to the locked surah, so this can
                // only fire if the index itself misbehaves
                if best.surah != surah {
                    return Err(anyhow!(
                        "Index returned surah {} for a query filtered to surah {}",
                        best.surah,
                        surah
                    ));
                }

                if !self.policy.in_session_accepts(best.similarity) {
                    tracing::debug!(
                        "Candidate {}:{} at {:.3} below in-session threshold {}",
                        best.surah,
                        best.ayah,
                        best.similarity,
                        self.policy.in_session_threshold
                    );
                    return Ok(RoundOutcome::BelowThreshold {
                        threshold: self.policy.in_session_threshold,
                        candidate: best,
                    });
                }

                let classification = locked.tracker.update(best.ayah);
                self.record_attempt(&best, transcript);
                tracing::info!(
                    "Surah {} ayah {}: {} (similarity {:.3})",
                    best.surah,
                    best.ayah,
                    classification.as_str(),
                    best.similarity
                );
                Ok(RoundOutcome::Tracked {
                    candidate: best,
                    classification,
                })
            }
        }
    }

    /// Discard all session state back to unlocked.
    ///
    /// History is gone after this; durable records live in the sinks.
    pub fn reset(&mut self) {
        if self.locked.take().is_some() {
            tracing::info!("Session reset to unlocked");
        }
    }

    /// Current state of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        match &self.locked {
            None => SessionSnapshot {
                active: false,
                surah: None,
                total_ayahs: None,
                expected_ayah: None,
                history: Vec::new(),
            },
            Some(locked) => SessionSnapshot {
                active: true,
                surah: Some(locked.surah),
                total_ayahs: self.engine.index().ayah_count(locked.surah),
                expected_ayah: Some(locked.tracker.expected()),
                history: locked.tracker.history().to_vec(),
            },
        }
    }

    fn record_attempt(&self, candidate: &MatchCandidate, transcript: &str) {
        let record = AttemptRecord {
            surah: candidate.surah,
            ayah: candidate.ayah,
            similarity: candidate.similarity,
            transcript: transcript.to_string(),
        };
        for sink in &self.sinks {
            sink.record(&record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{VerseIndex, VerseRecord};
    use crate::embedding::TextEmbedder;
    use crate::session::attempts::{InMemoryAttemptLog, ProgressLedger};
    use std::collections::HashMap;

    /// Embedder that maps known transcripts to fixed vectors.
    struct ScriptedEmbedder {
        vectors: HashMap<String, Vec<f32>>,
    }

    impl ScriptedEmbedder {
        fn new(entries: Vec<(&str, Vec<f32>)>) -> Self {
            Self {
                vectors: entries
                    .into_iter()
                    .map(|(text, vector)| (text.to_string(), vector))
                    .collect(),
            }
        }
    }

    impl TextEmbedder for ScriptedEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.vectors
                .get(text)
                .cloned()
                .ok_or_else(|| anyhow!("unscripted transcript: {}", text))
        }

        fn dimension(&self) -> usize {
            7
        }
    }

    /// Corpus: surah 2 ayahs 1..5 on axes 0..4, surah 1 ayah 1 on axis 5.
    fn test_index() -> Arc<VerseIndex> {
        let mut records = Vec::new();
        for ayah in 1..=5u32 {
            let mut embedding = vec![0.0f32; 7];
            embedding[(ayah - 1) as usize] = 1.0;
            records.push(VerseRecord {
                surah: 2,
                ayah,
                arabic_text: String::new(),
                english_text: String::new(),
                embedding,
            });
        }
        let mut embedding = vec![0.0f32; 7];
        embedding[5] = 1.0;
        records.push(VerseRecord {
            surah: 1,
            ayah: 1,
            arabic_text: String::new(),
            english_text: String::new(),
            embedding,
        });
        Arc::new(VerseIndex::new(records).unwrap())
    }

    /// Query vector scoring `similarity` against surah 2's given ayah.
    ///
    /// Puts the residual weight on axis 6, which no verse occupies, so
    /// the vector stays unit-length and every other verse scores ~0.
    fn query_for(ayah: u32, similarity: f32) -> Vec<f32> {
        let mut vector = vec![0.0f32; 7];
        vector[(ayah - 1) as usize] = similarity;
        vector[6] = (1.0 - similarity * similarity).sqrt();
        vector
    }

    fn default_policy() -> MatchPolicy {
        MatchPolicy {
            lock_on_threshold: 0.59,
            in_session_threshold: 0.35,
            top_k: 1,
        }
    }

    fn controller_with(
        entries: Vec<(&str, Vec<f32>)>,
        sinks: Vec<Arc<dyn AttemptSink>>,
    ) -> SessionController {
        let engine = Arc::new(MatchEngine::new(
            test_index(),
            Arc::new(ScriptedEmbedder::new(entries)),
        ));
        SessionController::new(engine, default_policy(), sinks)
    }

    #[test]
    fn test_threshold_boundaries_are_inclusive() {
        let policy = default_policy();
        assert!(policy.lock_on_accepts(0.59));
        assert!(!policy.lock_on_accepts(0.589));
        assert!(policy.in_session_accepts(0.35));
        assert!(!policy.in_session_accepts(0.349));
    }

    #[test]
    fn test_lock_on_below_threshold_is_a_no_op() {
        let mut controller = controller_with(
            vec![("faint recitation", query_for(1, 0.5))],
            Vec::new(),
        );

        let outcome = controller.handle_transcript("faint recitation").unwrap();
        match outcome {
            RoundOutcome::BelowThreshold { threshold, candidate } => {
                assert_eq!(threshold, 0.59);
                assert_eq!((candidate.surah, candidate.ayah), (2, 1));
            }
            other => panic!("expected below_threshold, got {:?}", other),
        }
        assert!(!controller.is_active());
        assert!(controller.snapshot().history.is_empty());
    }

    #[test]
    fn test_blank_transcript_is_no_match() {
        let mut controller = controller_with(Vec::new(), Vec::new());
        let outcome = controller.handle_transcript("   ").unwrap();
        assert!(matches!(outcome, RoundOutcome::NoMatch));
        assert!(!controller.is_active());
    }

    #[test]
    fn test_embedder_failure_propagates_and_leaves_state_untouched() {
        let mut controller = controller_with(Vec::new(), Vec::new());

        // ScriptedEmbedder errors on anything it does not know
        assert!(controller.handle_transcript("unknown words").is_err());
        assert!(!controller.is_active());
        assert!(controller.snapshot().history.is_empty());
    }

    #[test]
    fn test_exact_threshold_similarity_locks_on() {
        // Pythagorean vectors make the cosine exact in f32: [1,0] against
        // [3,4] is precisely 0.6, and the threshold is the same literal,
        // so this exercises the >= comparison with true equality
        let index = Arc::new(
            VerseIndex::new(vec![VerseRecord {
                surah: 2,
                ayah: 1,
                arabic_text: String::new(),
                english_text: String::new(),
                embedding: vec![3.0, 4.0],
            }])
            .unwrap(),
        );
        let embedder = Arc::new(ScriptedEmbedder::new(vec![("borderline", vec![1.0, 0.0])]));
        let engine = Arc::new(MatchEngine::new(index, embedder));
        let policy = MatchPolicy {
            lock_on_threshold: 0.6,
            in_session_threshold: 0.35,
            top_k: 1,
        };
        let mut controller = SessionController::new(engine, policy, Vec::new());

        let outcome = controller.handle_transcript("borderline").unwrap();
        match outcome {
            RoundOutcome::SessionStarted { candidate } => {
                assert_eq!(candidate.similarity, 0.6);
            }
            other => panic!("expected session_started, got {:?}", other),
        }
        assert!(controller.is_active());
    }

    #[test]
    fn test_full_recitation_scenario() {
        let log = Arc::new(InMemoryAttemptLog::new(50));
        let ledger = Arc::new(ProgressLedger::new());
        let mut controller = controller_with(
            vec![
                ("first ayah", query_for(1, 0.70)),
                ("third ayah", query_for(3, 0.50)),
                ("second ayah", query_for(2, 0.40)),
                ("fourth ayah faint", query_for(4, 0.20)),
            ],
            vec![
                log.clone() as Arc<dyn AttemptSink>,
                ledger.clone() as Arc<dyn AttemptSink>,
            ],
        );

        // Lock-on at (2,1) with similarity 0.70
        let outcome = controller.handle_transcript("first ayah").unwrap();
        match outcome {
            RoundOutcome::SessionStarted { candidate } => {
                assert_eq!((candidate.surah, candidate.ayah), (2, 1));
            }
            other => panic!("expected session_started, got {:?}", other),
        }
        let snapshot = controller.snapshot();
        assert!(snapshot.active);
        assert_eq!(snapshot.surah, Some(2));
        assert_eq!(snapshot.total_ayahs, Some(5));
        assert_eq!(snapshot.expected_ayah, Some(2));
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(snapshot.history[0].status, RecitationStatus::Correct);

        // (2,3) at 0.50 skips over ayah 2
        let outcome = controller.handle_transcript("third ayah").unwrap();
        match outcome {
            RoundOutcome::Tracked { classification, .. } => {
                assert_eq!(
                    classification,
                    RecitationStatus::Skip { skipped: vec![2] }
                );
            }
            other => panic!("expected tracked, got {:?}", other),
        }
        assert_eq!(controller.snapshot().expected_ayah, Some(4));

        // (2,2) at 0.40 was skipped earlier, so it reads as a repeat
        let outcome = controller.handle_transcript("second ayah").unwrap();
        match outcome {
            RoundOutcome::Tracked { classification, .. } => {
                assert_eq!(classification, RecitationStatus::Repeat);
            }
            other => panic!("expected tracked, got {:?}", other),
        }

        // (2,4) at 0.20 falls below the in-session threshold: full no-op
        let history_before = controller.snapshot().history;
        let outcome = controller.handle_transcript("fourth ayah faint").unwrap();
        match outcome {
            RoundOutcome::BelowThreshold { threshold, .. } => {
                assert_eq!(threshold, 0.35);
            }
            other => panic!("expected below_threshold, got {:?}", other),
        }
        assert_eq!(controller.snapshot().history, history_before);
        assert_eq!(controller.snapshot().expected_ayah, Some(4));

        // Three accepted matches reached the sinks; the rejected one did not
        assert_eq!(log.len(), 3);
        let positions: Vec<(u32, u32)> = log
            .recent(10)
            .iter()
            .map(|a| (a.surah, a.ayah))
            .collect();
        assert_eq!(positions, vec![(2, 2), (2, 3), (2, 1)]);
        assert_eq!(ledger.tracked_ayah_count(), 3);
    }

    #[test]
    fn test_locked_session_queries_only_its_surah() {
        // "other surah" scores highest against surah 1's verse, but the
        // locked session's filtered query never sees it
        let mut controller = controller_with(
            vec![
                ("first ayah", query_for(1, 0.70)),
                ("other surah", {
                    let mut vector = vec![0.0f32; 7];
                    vector[5] = 1.0;
                    vector
                }),
            ],
            Vec::new(),
        );

        controller.handle_transcript("first ayah").unwrap();
        assert_eq!(controller.snapshot().surah, Some(2));

        // Within surah 2, the best candidate for an orthogonal vector
        // scores 0.0: below threshold, nothing tracked
        let outcome = controller.handle_transcript("other surah").unwrap();
        assert!(matches!(outcome, RoundOutcome::BelowThreshold { .. }));
        assert_eq!(controller.snapshot().surah, Some(2));
        assert_eq!(controller.snapshot().history.len(), 1);
    }

    #[test]
    fn test_reset_returns_to_unlocked() {
        let mut controller = controller_with(
            vec![("first ayah", query_for(1, 0.70))],
            Vec::new(),
        );

        controller.handle_transcript("first ayah").unwrap();
        assert!(controller.is_active());

        controller.reset();
        assert!(!controller.is_active());
        let snapshot = controller.snapshot();
        assert!(!snapshot.active);
        assert!(snapshot.history.is_empty());
        assert_eq!(snapshot.surah, None);
        assert_eq!(snapshot.expected_ayah, None);
    }

    #[test]
    fn test_lock_on_can_start_mid_surah() {
        let mut controller = controller_with(
            vec![("third ayah", query_for(3, 0.80))],
            Vec::new(),
        );

        let outcome = controller.handle_transcript("third ayah").unwrap();
        match outcome {
            RoundOutcome::SessionStarted { candidate } => {
                assert_eq!(candidate.ayah, 3);
            }
            other => panic!("expected session_started, got {:?}", other),
        }
        assert_eq!(controller.snapshot().expected_ayah, Some(4));
    }
}
