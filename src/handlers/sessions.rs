//! # Recitation Session REST API Handlers
//!
//! Lifecycle endpoints for live recitation sessions: create, feed transcripts,
//! inspect, reset, and delete. Each session owns a controller that locks onto
//! a surah on the first confident match and classifies every verse after that.
//!
//! ## Available Endpoints:
//! - `POST /api/v1/sessions` - Create a session
//! - `POST /api/v1/sessions/{id}/transcript` - Process one transcript round
//! - `GET /api/v1/sessions/{id}` - Session state snapshot
//! - `POST /api/v1/sessions/{id}/reset` - Drop back to the unlocked state
//! - `DELETE /api/v1/sessions/{id}` - Remove the session

use crate::session::{AttemptSink, MatchPolicy, SessionController};
use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Request body for session creation. The whole body is optional.
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    /// Caller-chosen session ID; a UUID is generated when omitted
    pub session_id: Option<String>,
}

/// Request body for one transcript round.
#[derive(Debug, Deserialize)]
pub struct TranscriptRequest {
    /// Transcribed recitation text for this round
    pub transcript: String,
}

/// Create a new recitation session.
///
/// ## Endpoint: `POST /api/v1/sessions`
///
/// ## Response:
/// ```json
/// {
///   "session_id": "6e3898f5-8708-4a2b-9d30-1f4bb0ccfa31",
///   "policy": {"lock_on_threshold": 0.59, "in_session_threshold": 0.35, "top_k": 1}
/// }
/// ```
pub async fn create_session(
    state: web::Data<AppState>,
    request: Option<web::Json<CreateSessionRequest>>,
) -> Result<HttpResponse, AppError> {
    let requested_id = request
        .map(|body| body.into_inner())
        .unwrap_or_default()
        .session_id;

    let config = state.get_config();
    let policy = MatchPolicy::from_config(&config.matching);

    let controller = SessionController::new(
        state.engine.clone(),
        policy,
        vec![
            state.attempt_log.clone() as Arc<dyn AttemptSink>,
            state.progress.clone() as Arc<dyn AttemptSink>,
        ],
    );

    let session_id = state
        .sessions
        .create_session(requested_id, controller)
        .map_err(AppError::ValidationError)?;

    state.increment_active_sessions();

    Ok(HttpResponse::Created().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "session_id": session_id,
        "policy": {
            "lock_on_threshold": policy.lock_on_threshold,
            "in_session_threshold": policy.in_session_threshold,
            "top_k": policy.top_k
        }
    })))
}

/// Process one transcript round for a session.
///
/// ## Endpoint: `POST /api/v1/sessions/{id}/transcript`
///
/// ## Request Body:
/// ```json
/// {"transcript": "alhamdulillahi rabbil alameen"}
/// ```
///
/// ## Response:
/// The round outcome plus the session state after the round:
/// ```json
/// {
///   "outcome": {
///     "outcome": "tracked",
///     "candidate": {"surah": 1, "ayah": 2, "similarity": 0.82, "arabic_text": "...", "english_text": "..."},
///     "classification": {"status": "correct"}
///   },
///   "session": {"active": true, "surah": 1, "total_ayahs": 7, "expected_ayah": 3, "history": [...]}
/// }
/// ```
pub async fn process_transcript(
    state: web::Data<AppState>,
    path: web::Path<String>,
    request: web::Json<TranscriptRequest>,
) -> Result<HttpResponse, AppError> {
    let session_id = path.into_inner();

    let entry = state
        .sessions
        .get(&session_id)
        .ok_or_else(|| AppError::NotFound(format!("Session '{}' not found", session_id)))?;

    entry.touch();

    let mut controller = entry.controller.lock().await;
    let outcome = controller.handle_transcript(&request.transcript)?;
    let snapshot = controller.snapshot();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "session_id": session_id,
        "outcome": outcome,
        "session": snapshot
    })))
}

/// Get the current state of a session.
///
/// ## Endpoint: `GET /api/v1/sessions/{id}`
pub async fn get_session(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let session_id = path.into_inner();

    let entry = state
        .sessions
        .get(&session_id)
        .ok_or_else(|| AppError::NotFound(format!("Session '{}' not found", session_id)))?;

    let snapshot = entry.controller.lock().await.snapshot();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "session_id": entry.session_id,
        "created_at": entry.created_at.to_rfc3339(),
        "idle_seconds": entry.idle_seconds(),
        "session": snapshot
    })))
}

/// Reset a session to the unlocked state, keeping it registered.
///
/// ## Endpoint: `POST /api/v1/sessions/{id}/reset`
pub async fn reset_session(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let session_id = path.into_inner();

    let entry = state
        .sessions
        .get(&session_id)
        .ok_or_else(|| AppError::NotFound(format!("Session '{}' not found", session_id)))?;

    entry.touch();

    let mut controller = entry.controller.lock().await;
    controller.reset();
    let snapshot = controller.snapshot();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "session_id": session_id,
        "session": snapshot
    })))
}

/// Delete a session.
///
/// ## Endpoint: `DELETE /api/v1/sessions/{id}`
pub async fn delete_session(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let session_id = path.into_inner();

    if !state.sessions.remove(&session_id) {
        return Err(AppError::NotFound(format!(
            "Session '{}' not found",
            session_id
        )));
    }

    state.decrement_active_sessions();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "session_id": session_id,
        "status": "deleted"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_session_request_parsing() {
        let json = r#"{"session_id": "morning-revision"}"#;
        let request: CreateSessionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.session_id, Some("morning-revision".to_string()));

        let empty: CreateSessionRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.session_id, None);
    }

    #[test]
    fn test_transcript_request_rejects_missing_field() {
        assert!(serde_json::from_str::<TranscriptRequest>("{}").is_err());
    }
}
