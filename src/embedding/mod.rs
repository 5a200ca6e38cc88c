//! # Sentence Embedding Module
//!
//! Turns transcript text into the same vector space the verse corpus was
//! embedded in, so the index can score similarity between them.
//!
//! ## Key Components:
//! - **TextEmbedder**: The capability trait the match engine depends on.
//!   Production uses the Candle-backed model below; tests inject stubs.
//! - **SentenceEmbedder**: Loads a sentence-transformers BERT checkpoint
//!   from HuggingFace and runs mean-pooled, L2-normalized forward passes
//!
//! The corpus artifacts and the runtime model must agree on the embedding
//! dimension; startup checks this and refuses to serve on a mismatch.

pub mod model;    // Candle-backed sentence embedder

pub use model::{EmbeddingModel, SentenceEmbedder};

use anyhow::Result;

/// Capability of turning text into an embedding vector.
///
/// ## Contract:
/// - `embed` returns a vector of exactly `dimension()` values
/// - Implementations are injected at construction; the match engine never
///   constructs its own embedder
/// - Errors are propagated, never swallowed: a failed embedding must be
///   distinguishable from "no verse matched"
pub trait TextEmbedder: Send + Sync {
    /// Embed one piece of text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Dimension of the vectors this embedder produces.
    fn dimension(&self) -> usize;
}
