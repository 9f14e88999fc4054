use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::data::{Actor, AlertView, BlackoutRequest, BlackoutWindow, Scope, WindowStatus};
use crate::error::BlackoutError;
use crate::lifecycle::{AuditStats, AuditStatsSnapshot, LifecycleGuard};
use crate::query::BlackoutQuery;
use crate::storage::MemoryWindowStore;
use crate::suppression::{Suppression, SuppressionEvaluator};

/// Headers set by the authenticating proxy in front of this service
pub const USER_HEADER: &str = "x-actor-user";
pub const SCOPES_HEADER: &str = "x-actor-scopes";
pub const CUSTOMERS_HEADER: &str = "x-actor-customers";

/// Application state shared across handlers
pub struct AppState {
    pub store: Arc<MemoryWindowStore>,
    pub guard: LifecycleGuard<MemoryWindowStore>,
    pub evaluator: SuppressionEvaluator<MemoryWindowStore>,
    pub audit_stats: Option<Arc<AuditStats>>,
}

/// Build the calling actor from request headers
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or("")
    };
    // Customer names may contain spaces, scope names never do
    let customers = |value: &str| -> Vec<String> {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    };

    let user = header_str(USER_HEADER);
    if user.is_empty() {
        return Err(ApiError::Unauthorized("Missing actor identity".to_string()));
    }

    let mut actor = Actor::new(user);
    actor.scopes = header_str(SCOPES_HEADER)
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter_map(Scope::parse)
        .collect();
    actor.customers = customers(header_str(CUSTOMERS_HEADER));
    Ok(actor)
}

/// Window as returned to clients, with its derived status
#[derive(Serialize)]
pub struct BlackoutView<'a> {
    #[serde(flatten)]
    pub window: &'a BlackoutWindow,
    pub status: WindowStatus,
    pub remaining: i64,
}

impl<'a> BlackoutView<'a> {
    pub fn at(window: &'a BlackoutWindow, now: DateTime<Utc>) -> Self {
        Self {
            window,
            status: window.status(now),
            remaining: window.remaining(now),
        }
    }
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Blackout Administration
// ============================================================================

pub async fn create_blackout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<BlackoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let now = Utc::now();

    let window = state.guard.create(&actor, request, now).await?;

    let body = serde_json::json!({
        "status": "ok",
        "id": window.id,
        "blackout": BlackoutView::at(&window, now),
    });
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/blackout/{}", window.id))],
        Json(body),
    ))
}

pub async fn list_blackouts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let query = BlackoutQuery::from_params(params).map_err(BlackoutError::from)?;
    let now = Utc::now();

    let windows = state.guard.list(&actor, &query, now).await?;
    let views: Vec<BlackoutView<'_>> = windows.iter().map(|w| BlackoutView::at(w, now)).collect();

    let body = if views.is_empty() {
        serde_json::json!({
            "status": "ok",
            "message": "not found",
            "blackouts": [],
            "total": 0,
        })
    } else {
        serde_json::json!({
            "status": "ok",
            "total": views.len(),
            "blackouts": views,
        })
    };
    Ok(Json(body))
}

pub async fn get_blackout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    let window = state.guard.get(&actor, &id).await?;

    Ok(Json(serde_json::json!({
        "status": "ok",
        "total": 1,
        "blackout": BlackoutView::at(&window, Utc::now()),
    })))
}

pub async fn delete_blackout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let actor = actor_from_headers(&headers)?;
    state.guard.delete(&actor, &id, Utc::now()).await?;

    Ok(Json(serde_json::json!({ "status": "ok" })))
}

// ============================================================================
// Suppression
// ============================================================================

#[derive(Deserialize)]
pub struct SuppressionRequest {
    pub alert: AlertView,
    /// Evaluation time, defaults to now
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}

pub async fn check_suppression(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SuppressionRequest>,
) -> Result<Json<Suppression>, ApiError> {
    let now = request.time.unwrap_or_else(Utc::now);
    let result = state.evaluator.is_suppressed(&request.alert, now).await?;
    Ok(Json(result))
}

// ============================================================================
// Stats
// ============================================================================

#[derive(Serialize)]
pub struct StatsResponse {
    pub blackouts: usize,
    pub audit: Option<AuditStatsSnapshot>,
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        blackouts: state.store.len(),
        audit: state.audit_stats.as_ref().map(|s| s.snapshot()),
    })
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Unavailable(String),
}

impl From<BlackoutError> for ApiError {
    fn from(err: BlackoutError) -> Self {
        let message = err.to_string();
        match err {
            BlackoutError::Validation(_) => ApiError::BadRequest(message),
            BlackoutError::NotFound(_) => ApiError::NotFound("not found".to_string()),
            BlackoutError::Conflict(_) => ApiError::Conflict(message),
            BlackoutError::Forbidden(_) => ApiError::Forbidden(message),
            BlackoutError::StorageFailure(_) => ApiError::Unavailable(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = serde_json::json!({
            "status": "error",
            "message": message,
            "code": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_actor_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, HeaderValue::from_static("alice"));
        headers.insert(
            SCOPES_HEADER,
            HeaderValue::from_static("write:blackouts, read:blackouts read:alerts"),
        );
        headers.insert(
            CUSTOMERS_HEADER,
            HeaderValue::from_static("acme, Acme Corp ,,globex"),
        );

        let actor = actor_from_headers(&headers).unwrap();
        assert_eq!(actor.user, "alice");
        assert_eq!(actor.scopes.len(), 2);
        assert!(actor.has_scope(Scope::WriteBlackouts));
        assert_eq!(actor.customers, vec!["acme", "Acme Corp", "globex"]);
    }

    #[test]
    fn test_missing_user_is_unauthorized() {
        let headers = HeaderMap::new();
        assert!(matches!(
            actor_from_headers(&headers),
            Err(ApiError::Unauthorized(_))
        ));
    }
}
