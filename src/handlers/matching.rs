//! # One-Shot Matching REST API Handler
//!
//! Stateless transcript matching for clients that manage their own recitation
//! state. Returns ranked candidates straight from the verse index without any
//! threshold filtering; callers decide what similarity is good enough.

use crate::session::{AttemptRecord, AttemptSink};
use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

/// Request body for one-shot transcript matching.
#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    /// Transcribed recitation text to match against the corpus
    pub transcript: String,
    /// Optional surah number to restrict candidates to
    pub surah_filter: Option<u32>,
    /// How many candidates to return (defaults to the configured top_k)
    pub top_k: Option<usize>,
}

/// Match a transcript against the verse corpus.
///
/// ## Endpoint: `POST /api/v1/match`
///
/// ## Request Body:
/// ```json
/// {
///   "transcript": "bismillahi rahmani raheem",
///   "surah_filter": 1,
///   "top_k": 3
/// }
/// ```
///
/// ## Response:
/// ```json
/// {
///   "count": 1,
///   "candidates": [
///     {"surah": 1, "ayah": 1, "similarity": 0.91, "arabic_text": "...", "english_text": "..."}
///   ]
/// }
/// ```
pub async fn match_transcript(
    state: web::Data<AppState>,
    request: web::Json<MatchRequest>,
) -> Result<HttpResponse, AppError> {
    let request = request.into_inner();

    let top_k = request.top_k.unwrap_or_else(|| state.get_config().matching.top_k);
    if top_k == 0 {
        return Err(AppError::ValidationError(
            "top_k must be greater than zero".to_string(),
        ));
    }

    let candidates = state
        .engine
        .match_transcript(&request.transcript, request.surah_filter, top_k)?;

    // The best candidate counts as an attempt at that verse, same as in a
    // live session, so stateless clients still show up in /attempts.
    if let Some(best) = candidates.first() {
        let attempt = AttemptRecord {
            surah: best.surah,
            ayah: best.ayah,
            similarity: best.similarity,
            transcript: request.transcript.trim().to_string(),
        };
        state.attempt_log.record(&attempt);
        state.progress.record(&attempt);
    }

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "surah_filter": request.surah_filter,
        "top_k": top_k,
        "count": candidates.len(),
        "candidates": candidates
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_request_parsing() {
        let json = r#"{"transcript": "alhamdulillahi rabbil alameen", "surah_filter": 1}"#;
        let request: MatchRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.transcript, "alhamdulillahi rabbil alameen");
        assert_eq!(request.surah_filter, Some(1));
        assert_eq!(request.top_k, None);
    }

    #[test]
    fn test_match_request_rejects_missing_transcript() {
        let json = r#"{"surah_filter": 1}"#;
        assert!(serde_json::from_str::<MatchRequest>(json).is_err());
    }
}
