//! # Recitation Session Module
//!
//! The sequencing core of the service: per-session state machines that
//! decide whether a recited ayah was correct, repeated, skipped over, or
//! out of order, plus the orchestration around them.
//!
//! ## Key Components:
//! - **RecitationTracker**: Classifies confirmed ayah positions against the
//!   expected next position and keeps the session history
//! - **SessionController**: Drives one session: matching, threshold gates,
//!   lock-on, tracker updates, attempt sinks
//! - **SessionRegistry**: Concurrent-session bookkeeping with limits and
//!   idle cleanup
//! - **Attempt sinks**: Extension point fed once per accepted match, with
//!   in-memory log and per-ayah progress implementations
//!
//! ## Session Lifecycle:
//! 1. **Unlocked**: No surah established; every transcript searches the
//!    whole corpus against the strict lock-on threshold
//! 2. **Locked**: Searches narrow to the locked surah against the looser
//!    in-session threshold; accepted ayahs flow into the tracker
//! 3. **Reset/removed**: State discarded, back to unlocked

pub mod attempts;     // Attempt sink trait + in-memory implementations
pub mod controller;   // Per-session orchestration
pub mod registry;     // Concurrent session bookkeeping
pub mod tracker;      // The correct/repeat/skip/wrong state machine

pub use attempts::{AttemptRecord, AttemptSink, InMemoryAttemptLog, ProgressLedger};
pub use controller::{MatchPolicy, RoundOutcome, SessionController, SessionSnapshot};
pub use registry::SessionRegistry;
pub use tracker::{RecitationEntry, RecitationStatus, RecitationTracker};
