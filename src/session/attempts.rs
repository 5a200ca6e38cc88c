//! # Attempt Sinks
//!
//! Extension point fed once per accepted match: whenever a session
//! controller accepts a candidate (lock-on included), every registered
//! sink receives the matched position, its similarity, and the raw
//! transcript.
//!
//! Durable storage is an external concern. The two implementations here
//! keep everything in memory and back the read-side endpoints:
//! - **InMemoryAttemptLog**: Bounded recent-attempts log, newest first
//! - **ProgressLedger**: Per-ayah aggregates (attempt count, last
//!   attempted time), reduced from accepted matches without touching
//!   the tracker

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::RwLock;

/// One accepted match, as handed to the sinks.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub surah: u32,
    pub ayah: u32,
    pub similarity: f32,
    pub transcript: String,
}

/// Receiver of accepted matches.
///
/// Sinks must not fail the recitation loop: implementations absorb their
/// own problems and return nothing. Called once per accepted match, after
/// session state has been updated.
pub trait AttemptSink: Send + Sync {
    fn record(&self, attempt: &AttemptRecord);
}

/// A logged attempt with its receipt time.
#[derive(Debug, Clone, Serialize)]
pub struct LoggedAttempt {
    pub surah: u32,
    pub ayah: u32,
    pub similarity: f32,
    pub transcript: String,
    pub recorded_at: DateTime<Utc>,
}

/// Bounded in-memory log of accepted attempts.
///
/// ## Thread Safety:
/// RwLock around a deque; writers push, readers copy out the most recent
/// entries. The oldest entries fall off once capacity is reached.
pub struct InMemoryAttemptLog {
    entries: RwLock<VecDeque<LoggedAttempt>>,
    capacity: usize,
}

impl InMemoryAttemptLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// The most recent attempts, newest first.
    pub fn recent(&self, limit: usize) -> Vec<LoggedAttempt> {
        let entries = self.entries.read().unwrap();
        entries.iter().rev().take(limit).cloned().collect()
    }

    /// Number of attempts currently held.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }
}

impl AttemptSink for InMemoryAttemptLog {
    fn record(&self, attempt: &AttemptRecord) {
        let mut entries = self.entries.write().unwrap();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(LoggedAttempt {
            surah: attempt.surah,
            ayah: attempt.ayah,
            similarity: attempt.similarity,
            transcript: attempt.transcript.clone(),
            recorded_at: Utc::now(),
        });
    }
}

/// Per-ayah aggregate of accepted attempts.
#[derive(Debug, Clone, Serialize)]
pub struct AyahProgress {
    pub surah: u32,
    pub ayah: u32,
    pub times_attempted: u64,
    pub last_attempted: DateTime<Utc>,
}

/// Reduces accepted matches into per-ayah progress aggregates.
///
/// ## Thread Safety:
/// RwLock around the aggregate map; recording upserts one entry.
pub struct ProgressLedger {
    stats: RwLock<HashMap<(u32, u32), AyahProgress>>,
}

impl ProgressLedger {
    pub fn new() -> Self {
        Self {
            stats: RwLock::new(HashMap::new()),
        }
    }

    /// Aggregates for all ayahs attempted so far, ordered by (surah, ayah).
    ///
    /// ## Parameters:
    /// - **surah_filter**: When set, only that surah's aggregates are returned
    pub fn stats(&self, surah_filter: Option<u32>) -> Vec<AyahProgress> {
        let stats = self.stats.read().unwrap();
        let mut results: Vec<AyahProgress> = stats
            .values()
            .filter(|p| surah_filter.map_or(true, |surah| p.surah == surah))
            .cloned()
            .collect();
        results.sort_by_key(|p| (p.surah, p.ayah));
        results
    }

    /// Number of distinct ayahs attempted.
    pub fn tracked_ayah_count(&self) -> usize {
        self.stats.read().unwrap().len()
    }
}

impl Default for ProgressLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl AttemptSink for ProgressLedger {
    fn record(&self, attempt: &AttemptRecord) {
        let mut stats = self.stats.write().unwrap();
        let entry = stats
            .entry((attempt.surah, attempt.ayah))
            .or_insert_with(|| AyahProgress {
                surah: attempt.surah,
                ayah: attempt.ayah,
                times_attempted: 0,
                last_attempted: Utc::now(),
            });
        entry.times_attempted += 1;
        entry.last_attempted = Utc::now();
    }
}
