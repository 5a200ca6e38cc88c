//! # Attempt History and Progress REST API Handlers
//!
//! Read-only views over what has been recited: the rolling attempt log
//! (newest first) and per-ayah aggregates for progress displays.

use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

const DEFAULT_ATTEMPT_LIMIT: usize = 50;

/// Query parameters for the attempt log.
#[derive(Debug, Deserialize)]
pub struct AttemptsQuery {
    /// Maximum number of attempts to return (newest first)
    pub limit: Option<usize>,
}

/// Query parameters for progress aggregates.
#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    /// Restrict to one surah
    pub surah: Option<u32>,
}

/// List recent accepted attempts, newest first.
///
/// ## Endpoint: `GET /api/v1/attempts?limit=20`
pub async fn recent_attempts(
    state: web::Data<AppState>,
    query: web::Query<AttemptsQuery>,
) -> Result<HttpResponse, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_ATTEMPT_LIMIT);
    if limit == 0 {
        return Err(AppError::ValidationError(
            "limit must be greater than zero".to_string(),
        ));
    }

    let attempts = state.attempt_log.recent(limit);

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "count": attempts.len(),
        "attempts": attempts
    })))
}

/// Per-ayah attempt aggregates, ordered by surah then ayah.
///
/// ## Endpoint: `GET /api/v1/progress?surah=2`
pub async fn surah_progress(
    state: web::Data<AppState>,
    query: web::Query<ProgressQuery>,
) -> Result<HttpResponse, AppError> {
    let stats = state.progress.stats(query.surah);

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "surah": query.surah,
        "tracked_ayahs": stats.len(),
        "progress": stats
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempts_query_defaults() {
        let query: AttemptsQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, None);
    }

    #[test]
    fn test_progress_query_parses_surah() {
        let query: ProgressQuery = serde_json::from_str(r#"{"surah": 2}"#).unwrap();
        assert_eq!(query.surah, Some(2));
    }
}
