//! Operational endpoints

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use tracing::warn;

use crate::web::AppState;

#[derive(Debug, Serialize)]
pub struct DbTypeResponse {
    pub db_type: &'static str,
}

/// Which database engine backs the image store
pub async fn dbtype(State(state): State<AppState>) -> Json<DbTypeResponse> {
    Json(DbTypeResponse {
        db_type: state.database.database_type().config_name(),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: String,
    pub cache: &'static str,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let (status, database) = match state.database.ping().await {
        Ok(()) => (StatusCode::OK, "ok".to_string()),
        Err(e) => {
            warn!("Health check database ping failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, format!("error: {}", e))
        }
    };

    let body = HealthResponse {
        status: if status.is_success() { "healthy" } else { "unhealthy" },
        database,
        cache: state.lookup_service.cache_backend(),
    };

    (status, Json(body))
}
