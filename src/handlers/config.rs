use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": {
            "server": {
                "host": config.server.host,
                "port": config.server.port
            },
            "corpus": {
                "embeddings_path": config.corpus.embeddings_path,
                "metadata_path": config.corpus.metadata_path
            },
            "embedding": {
                "model": config.embedding.model,
                "device": config.embedding.device,
                "revision": config.embedding.revision
            },
            "matching": {
                "lock_on_threshold": config.matching.lock_on_threshold,
                "in_session_threshold": config.matching.in_session_threshold,
                "top_k": config.matching.top_k
            },
            "performance": {
                "max_concurrent_sessions": config.performance.max_concurrent_sessions,
                "session_idle_timeout_seconds": config.performance.session_idle_timeout_seconds
            }
        }
    })))
}

pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    let json_str = serde_json::to_string(&body.into_inner())?;

    let mut current_config = state.get_config();
    current_config
        .update_from_json(&json_str)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    state.update_config(current_config.clone())
        .map_err(AppError::ValidationError)?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": {
            "server": {
                "host": current_config.server.host,
                "port": current_config.server.port
            },
            "matching": {
                "lock_on_threshold": current_config.matching.lock_on_threshold,
                "in_session_threshold": current_config.matching.in_session_threshold,
                "top_k": current_config.matching.top_k
            },
            "performance": {
                "max_concurrent_sessions": current_config.performance.max_concurrent_sessions,
                "session_idle_timeout_seconds": current_config.performance.session_idle_timeout_seconds
            }
        }
    })))
}
