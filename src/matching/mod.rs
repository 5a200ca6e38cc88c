//! # Verse Matching Module
//!
//! Connects transcript text to the verse corpus: embed the transcript,
//! query the index, return ranked candidates. Thresholding is session
//! policy and lives with the session controller, not here.

pub mod engine;   // Transcript-to-candidates pipeline

pub use engine::MatchEngine;
