//! # Verse Corpus Module
//!
//! Loads the Quranic verse corpus and serves nearest-neighbor queries over
//! its precomputed embedding vectors.
//!
//! ## Key Components:
//! - **Loader**: Reads the two parallel corpus artifacts (binary embeddings
//!   plus JSON verse metadata) with eager integrity validation
//! - **VerseIndex**: Immutable in-memory index answering cosine-similarity
//!   queries, optionally restricted to a single surah
//!
//! ## Corpus Artifacts:
//! - **embeddings.bin**: Little-endian binary: `u32` verse count, `u32`
//!   vector dimension, then `count * dim` f32 values, row-major
//! - **verses.json**: JSON array of verse records (surah, ayah, texts),
//!   index-aligned with the embedding rows
//!
//! Both artifacts are produced offline by the data pipeline; the service
//! never writes them.

pub mod index;    // In-memory similarity index
pub mod loader;   // Artifact reading and validation

pub use index::{MatchCandidate, VerseIndex, VerseRecord};
pub use loader::load_corpus;
