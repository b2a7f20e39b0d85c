use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::sync::Arc;

use crate::error::CoreError;
use crate::metrics;
use crate::services::AppState;

pub mod activity;
pub mod chat;
pub mod learning;
pub mod progression;

/// Error body shared by every `/api/v1` handler: `{"message", "status"}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        let status = match &error {
            CoreError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::InvalidState(_) => StatusCode::CONFLICT,
            CoreError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {:#}", error);
        }

        let message = match error {
            CoreError::Storage(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        Self::new(status, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "message": self.message,
            "status": self.status.as_u16()
        });
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut status = "healthy";
    let mut dependencies = serde_json::Map::new();
    let mut all_healthy = true;

    let store_health = check_store(&state).await;
    let store_ok = store_health.get("status").and_then(|v| v.as_str()) == Some("healthy");
    dependencies.insert("store".to_string(), json!(store_health));
    if !store_ok {
        all_healthy = false;
        status = "degraded";
    }

    // Redis is optional; only a configured but unreachable instance degrades.
    if let Some(redis_health) = check_redis(&state).await {
        if redis_health.get("status").and_then(|v| v.as_str()) != Some("healthy") {
            all_healthy = false;
            status = "degraded";
        }
        dependencies.insert("redis".to_string(), json!(redis_health));
    }

    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(json!({
            "status": status,
            "service": "guarani-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": dependencies
        })),
    )
}

async fn check_store(state: &AppState) -> serde_json::Map<String, serde_json::Value> {
    let mut result = serde_json::Map::new();

    match tokio::time::timeout(std::time::Duration::from_secs(1), state.store.ping()).await {
        Ok(Ok(())) => {
            result.insert("status".to_string(), json!("healthy"));
            result.insert("message".to_string(), json!("Record store reachable"));
        }
        Ok(Err(e)) => {
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert("error".to_string(), json!(format!("Store error: {}", e)));
        }
        Err(_) => {
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert("error".to_string(), json!("Store timeout after 1s"));
        }
    }

    result
}

async fn check_redis(state: &AppState) -> Option<serde_json::Map<String, serde_json::Value>> {
    let mut conn = state.redis.clone()?;
    let mut result = serde_json::Map::new();

    match tokio::time::timeout(
        std::time::Duration::from_millis(500),
        redis::cmd("PING").query_async::<String>(&mut conn),
    )
    .await
    {
        Ok(Ok(_)) => {
            result.insert("status".to_string(), json!("healthy"));
            result.insert("message".to_string(), json!("Redis connection successful"));
        }
        Ok(Err(e)) => {
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert("error".to_string(), json!(format!("Redis error: {}", e)));
        }
        Err(_) => {
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert("error".to_string(), json!("Redis timeout after 500ms"));
        }
    }

    Some(result)
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// Guards `/metrics` with HTTP Basic credentials from `METRICS_AUTH`
/// (`user:password`).
pub async fn metrics_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let encoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let expected = std::env::var("METRICS_AUTH").unwrap_or_else(|_| "admin:changeme".to_string());
    if credentials != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_http_statuses() {
        let cases = [
            (CoreError::invalid_argument("bad"), StatusCode::BAD_REQUEST),
            (CoreError::not_found("Flashcard x"), StatusCode::NOT_FOUND),
            (CoreError::invalid_state("closed"), StatusCode::CONFLICT),
            (CoreError::external("timeout"), StatusCode::BAD_GATEWAY),
            (
                CoreError::Storage(anyhow::anyhow!("disk")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status(), expected);
        }
    }

    #[test]
    fn storage_details_are_not_leaked() {
        let error = ApiError::from(CoreError::Storage(anyhow::anyhow!("mongo password wrong")));
        assert_eq!(error.message, "Internal server error");
    }
}
