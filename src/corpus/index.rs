//! # Verse Similarity Index
//!
//! Immutable in-memory index over the verse corpus. Queries score every
//! verse against a query vector by cosine similarity and return the top
//! candidates, optionally restricted to one surah.
//!
//! ## Query Semantics:
//! - Results sorted by similarity descending; ties broken by ascending
//!   (surah, ayah) so identical queries always return identical orderings
//! - A surah filter that matches nothing yields an empty result, not an error
//! - Queries never mutate the index

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::HashMap;

/// A single verse with its precomputed embedding.
///
/// Records are immutable after loading. Ayah numbers within a surah are
/// assumed contiguous starting at 1; the loader validates positivity but
/// not contiguity.
#[derive(Debug, Clone)]
pub struct VerseRecord {
    /// Surah (chapter) number, 1-based
    pub surah: u32,

    /// Ayah (verse) number within the surah, 1-based
    pub ayah: u32,

    /// Original Arabic text
    pub arabic_text: String,

    /// English translation
    pub english_text: String,

    /// Precomputed sentence embedding, unit-normalized by the data pipeline
    pub embedding: Vec<f32>,
}

/// A scored verse returned from an index query.
///
/// Candidates are ephemeral: they carry copies of the display texts so
/// callers never need to reach back into the index, and they are never
/// persisted by the core.
#[derive(Debug, Clone, Serialize)]
pub struct MatchCandidate {
    pub surah: u32,
    pub ayah: u32,
    pub similarity: f32,
    pub arabic_text: String,
    pub english_text: String,
}

/// In-memory nearest-neighbor index over the verse corpus.
///
/// ## Thread Safety:
/// The index is read-only after construction, so it can be shared across
/// request handlers behind a plain `Arc` with no locking.
pub struct VerseIndex {
    /// All verse records, in artifact order
    records: Vec<VerseRecord>,

    /// Embedding vector dimension (uniform across records)
    dimension: usize,

    /// Number of verses present per surah
    ayah_counts: HashMap<u32, u32>,
}

impl VerseIndex {
    /// Build an index from loaded verse records.
    ///
    /// ## Validation:
    /// - At least one record
    /// - All embeddings share one non-zero dimension
    /// - All surah and ayah numbers are at least 1
    ///
    /// These are corpus integrity checks: any failure means the artifacts
    /// are malformed, and startup should halt rather than serve against a
    /// broken index.
    pub fn new(records: Vec<VerseRecord>) -> Result<Self> {
        let first = records
            .first()
            .ok_or_else(|| anyhow!("Verse corpus is empty"))?;

        let dimension = first.embedding.len();
        if dimension == 0 {
            return Err(anyhow!("Verse embeddings have zero dimension"));
        }

        let mut ayah_counts: HashMap<u32, u32> = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            if record.surah == 0 || record.ayah == 0 {
                return Err(anyhow!(
                    "Verse record {} has non-positive position {}:{}",
                    i,
                    record.surah,
                    record.ayah
                ));
            }
            if record.embedding.len() != dimension {
                return Err(anyhow!(
                    "Verse record {} has embedding dimension {} but the corpus uses {}",
                    i,
                    record.embedding.len(),
                    dimension
                ));
            }
            *ayah_counts.entry(record.surah).or_insert(0) += 1;
        }

        Ok(Self {
            records,
            dimension,
            ayah_counts,
        })
    }

    /// Total number of verses in the index.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Embedding vector dimension the index was built with.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of distinct surahs present in the corpus.
    pub fn surah_count(&self) -> usize {
        self.ayah_counts.len()
    }

    /// Number of verses present for a surah, if the surah exists.
    pub fn ayah_count(&self, surah: u32) -> Option<u32> {
        self.ayah_counts.get(&surah).copied()
    }

    /// Find the verses most similar to a query vector.
    ///
    /// ## Parameters:
    /// - **vector**: Query embedding (same dimension as the corpus)
    /// - **surah_filter**: When set, only verses of that surah are scored
    /// - **top_k**: Maximum number of candidates to return
    ///
    /// ## Returns:
    /// Up to `top_k` candidates sorted by similarity descending, ties by
    /// ascending (surah, ayah). An empty filter result yields an empty list.
    pub fn query(
        &self,
        vector: &[f32],
        surah_filter: Option<u32>,
        top_k: usize,
    ) -> Vec<MatchCandidate> {
        let mut scored: Vec<(f32, &VerseRecord)> = self
            .records
            .iter()
            .filter(|record| surah_filter.map_or(true, |surah| record.surah == surah))
            .map(|record| (cosine_similarity(vector, &record.embedding), record))
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| (a.1.surah, a.1.ayah).cmp(&(b.1.surah, b.1.ayah)))
        });

        scored
            .into_iter()
            .take(top_k)
            .map(|(similarity, record)| MatchCandidate {
                surah: record.surah,
                ayah: record.ayah,
                similarity,
                arabic_text: record.arabic_text.clone(),
                english_text: record.english_text.clone(),
            })
            .collect()
    }
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths or zero-norm inputs, so degenerate
/// vectors rank last instead of poisoning the sort with NaN.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
