//! # Match Engine
//!
//! Turns a transcript into ranked verse candidates. The engine owns no
//! policy: it never applies similarity thresholds and never mutates
//! session state. Both collaborators are injected at construction.

use crate::corpus::{MatchCandidate, VerseIndex};
use crate::embedding::TextEmbedder;
use anyhow::Result;
use std::sync::Arc;

/// Transcript-to-candidates pipeline over the verse index.
///
/// ## Thread Safety:
/// Both collaborators are immutable after construction, so the engine can
/// be shared across request handlers behind an `Arc`.
pub struct MatchEngine {
    index: Arc<VerseIndex>,
    embedder: Arc<dyn TextEmbedder>,
}

impl MatchEngine {
    pub fn new(index: Arc<VerseIndex>, embedder: Arc<dyn TextEmbedder>) -> Self {
        Self { index, embedder }
    }

    /// The verse index this engine queries.
    pub fn index(&self) -> &VerseIndex {
        &self.index
    }

    /// Match a transcript against the corpus.
    ///
    /// ## Parameters:
    /// - **transcript**: Raw transcript text; surrounding whitespace ignored
    /// - **surah_filter**: When set, only verses of that surah are considered
    /// - **top_k**: Maximum number of candidates to return
    ///
    /// ## Returns:
    /// - **Ok(candidates)**: Ranked by similarity descending. Empty when the
    ///   transcript is blank (the embedder is not invoked) or when the
    ///   filter matches nothing
    /// - **Err(anyhow::Error)**: The embedder failed; distinct from "no
    ///   verse matched"
    pub fn match_transcript(
        &self,
        transcript: &str,
        surah_filter: Option<u32>,
        top_k: usize,
    ) -> Result<Vec<MatchCandidate>> {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(transcript)?;
        let candidates = self.index.query(&vector, surah_filter, top_k);

        if let Some(best) = candidates.first() {
            tracing::debug!(
                "Top match for transcript: {}:{} (similarity {:.3})",
                best.surah,
                best.ayah,
                best.similarity
            );
        } else {
            tracing::debug!("No candidates for transcript (filter: {:?})", surah_filter);
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::VerseRecord;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stub embedder returning a fixed vector and counting invocations.
    struct StubEmbedder {
        vector: Vec<f32>,
        calls: AtomicUsize,
    }

    impl StubEmbedder {
        fn new(vector: Vec<f32>) -> Self {
            Self {
                vector,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TextEmbedder for StubEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.vector.clone())
        }

        fn dimension(&self) -> usize {
            self.vector.len()
        }
    }

    /// Stub embedder that always fails.
    struct FailingEmbedder;

    impl TextEmbedder for FailingEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(anyhow!("model exploded"))
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    fn verse(surah: u32, ayah: u32, embedding: Vec<f32>) -> VerseRecord {
        VerseRecord {
            surah,
            ayah,
            arabic_text: String::new(),
            english_text: String::new(),
            embedding,
        }
    }

    fn test_index() -> Arc<VerseIndex> {
        Arc::new(
            VerseIndex::new(vec![
                verse(1, 1, vec![1.0, 0.0]),
                verse(1, 2, vec![0.0, 1.0]),
                verse(2, 1, vec![3.0, 4.0]),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn test_match_returns_ranked_candidates() {
        let embedder = Arc::new(StubEmbedder::new(vec![1.0, 0.0]));
        let engine = MatchEngine::new(test_index(), embedder);

        let candidates = engine.match_transcript("bismillah", None, 3).unwrap();
        assert_eq!(candidates.len(), 3);
        assert_eq!((candidates[0].surah, candidates[0].ayah), (1, 1));
        assert_eq!(candidates[0].similarity, 1.0);
        // (2,1) = [3,4] scores exactly 0.6 against [1,0]
        assert_eq!((candidates[1].surah, candidates[1].ayah), (2, 1));
        assert_eq!(candidates[1].similarity, 0.6);
    }

    #[test]
    fn test_blank_transcript_skips_the_embedder() {
        let embedder = Arc::new(StubEmbedder::new(vec![1.0, 0.0]));
        let engine = MatchEngine::new(test_index(), embedder.clone());

        assert!(engine.match_transcript("", None, 3).unwrap().is_empty());
        assert!(engine.match_transcript("   \t\n", None, 3).unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_surah_filter_narrows_candidates() {
        let embedder = Arc::new(StubEmbedder::new(vec![1.0, 0.0]));
        let engine = MatchEngine::new(test_index(), embedder);

        let candidates = engine.match_transcript("text", Some(1), 5).unwrap();
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.surah == 1));

        // Filter matching nothing is Ok(empty), not an error
        let candidates = engine.match_transcript("text", Some(9), 5).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_embedder_failure_propagates() {
        let engine = MatchEngine::new(test_index(), Arc::new(FailingEmbedder));

        let result = engine.match_transcript("some recitation", None, 1);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("model exploded"));
    }
}
