// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0

use axum::{
    extract::{rejection::JsonRejection, Path, Query, Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::application::lifecycle::{
    CreateOutcome, DeleteOutcome, LifecycleError, TenantHealth, TenantLifecycleService, TenantLogs,
    TenantSummary,
};
use crate::domain::tenant::{TenantId, TenantRequest, ValidationError};

pub const DEFAULT_LOG_LINES: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: TenantLifecycleService,
    manager_token: Arc<str>,
}

impl AppState {
    pub fn new(lifecycle: TenantLifecycleService, manager_token: impl Into<Arc<str>>) -> Self {
        Self {
            lifecycle,
            manager_token: manager_token.into(),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let tenants = Router::new()
        .route("/containers", get(list_containers).post(create_container))
        .route("/containers/{business_id}", delete(delete_container))
        .route("/containers/{business_id}/health", get(container_health))
        .route("/containers/{business_id}/logs", get(container_logs))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/health", get(service_health))
        .merge(tenants)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Auth
// ============================================================================

/// Check an `Authorization` header against the manager token.
pub fn verify_bearer(headers: &HeaderMap, expected: &str) -> Result<(), ApiError> {
    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    if expected.len() == provided.len() && bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    verify_bearer(request.headers(), &state.manager_token)?;
    Ok(next.run(request).await)
}

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateContainerRequest {
    pub business_id: u64,
    pub business_name: String,
    pub telegram_bot_token: String,
    pub telegram_user_id: String,
    pub api_key: String,
    pub flyapp_api_url: String,
}

impl TryFrom<CreateContainerRequest> for TenantRequest {
    type Error = ValidationError;

    fn try_from(body: CreateContainerRequest) -> Result<Self, Self::Error> {
        TenantRequest::new(
            TenantId(body.business_id),
            body.business_name,
            body.telegram_bot_token,
            body.telegram_user_id,
            body.api_key,
            body.flyapp_api_url,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub cleanup: bool,
}

#[derive(Debug, Deserialize)]
pub struct LogParams {
    #[serde(default = "default_lines")]
    pub lines: usize,
}

fn default_lines() -> usize {
    DEFAULT_LOG_LINES
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Forbidden,
    NotFound(String),
    Unprocessable(String),
    Unavailable(String),
    Internal(String),
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::NotFound { .. } => Self::NotFound(err.to_string()),
            LifecycleError::Validation(_) => Self::Unprocessable(err.to_string()),
            LifecycleError::RuntimeUnavailable(_) => Self::Unavailable(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Missing or invalid Authorization header".to_string(),
            ),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Invalid token".to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Unavailable(msg) => {
                error!("Runtime unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            ApiError::Internal(msg) => {
                error!("Request failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(ErrorBody { detail })).into_response()
    }
}

fn parse_tenant(raw: &str) -> Result<TenantId, ApiError> {
    raw.parse::<TenantId>()
        .map_err(|e| LifecycleError::from(e).into())
}

// ============================================================================
// Handlers
// ============================================================================

async fn service_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_container(
    State(state): State<AppState>,
    payload: Result<Json<CreateContainerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateOutcome>), ApiError> {
    let Json(body) = payload.map_err(|e| ApiError::Unprocessable(e.body_text()))?;
    let request = TenantRequest::try_from(body).map_err(LifecycleError::from)?;
    let outcome = state.lifecycle.create_tenant(request).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn delete_container(
    State(state): State<AppState>,
    Path(business_id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<DeleteOutcome>, ApiError> {
    let tenant = parse_tenant(&business_id)?;
    let outcome = state.lifecycle.delete_tenant(tenant, params.cleanup).await?;
    Ok(Json(outcome))
}

async fn container_health(
    State(state): State<AppState>,
    Path(business_id): Path<String>,
) -> Result<Json<TenantHealth>, ApiError> {
    let tenant = parse_tenant(&business_id)?;
    Ok(Json(state.lifecycle.tenant_health(tenant).await?))
}

async fn container_logs(
    State(state): State<AppState>,
    Path(business_id): Path<String>,
    Query(params): Query<LogParams>,
) -> Result<Json<TenantLogs>, ApiError> {
    let tenant = parse_tenant(&business_id)?;
    Ok(Json(state.lifecycle.tenant_logs(tenant, params.lines).await?))
}

async fn list_containers(State(state): State<AppState>) -> Result<Json<Vec<TenantSummary>>, ApiError> {
    Ok(Json(state.lifecycle.list_tenants().await?))
}
