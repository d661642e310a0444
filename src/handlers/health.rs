use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;

use crate::{errors::Result, handlers::AppState, utils::timeout::with_timeout};

/// Storage id looked up by the readiness probe. It never exists; the call
/// only proves the backend answers.
const PROBE_STORAGE_ID: &str = "readiness-probe";

pub async fn liveness() -> Result<Json<serde_json::Value>> {
    Ok(Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let db_status = match state.images.ping().await {
        Ok(()) => "healthy",
        Err(e) => {
            tracing::warn!(error = %e, "readiness: database check failed");
            "unhealthy"
        }
    };

    let storage_status = match with_timeout("storage.exists", state.config.timeouts.storage, || {
        state.storage.exists(PROBE_STORAGE_ID)
    })
    .await
    {
        Ok(_) => "healthy",
        Err(e) => {
            tracing::warn!(error = %e, "readiness: storage check failed");
            "unhealthy"
        }
    };

    let ready = db_status == "healthy" && storage_status == "healthy";
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if ready { "ready" } else { "not_ready" },
            "checks": {
                "database": db_status,
                "storage": storage_status,
                "storageBackend": state.storage.backend_name()
            },
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}
