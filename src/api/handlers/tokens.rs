use axum::extract::State;
use axum::Json;
use chrono::Duration;
use std::sync::Arc;

use crate::api::response::{ApiError, JSend};
use crate::storage::models::TokenIntrospection;
use crate::storage::StorageError;
use crate::tokens::service;
use crate::tokens::service::IssueError;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct IssueTokenRequest {
    pub subject_id: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct IssueTokenResponse {
    pub token: String,
}

#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct TokenRequest {
    pub token: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IssueTokenRequest>,
) -> Result<Json<JSend<IssueTokenResponse>>, ApiError> {
    let ttl = Duration::seconds(state.config.tokens.ttl_seconds as i64);

    let token = service::issue(state.store.as_ref(), &state.codec, req.subject_id, ttl)
        .await
        .map_err(issue_error)?;

    tracing::debug!(subject_id = req.subject_id, "issued token");
    Ok(JSend::success(IssueTokenResponse { token }))
}

pub async fn introspect_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<JSend<TokenIntrospection>>, ApiError> {
    if req.token.trim().is_empty() {
        return Err(ApiError::bad_request("token is required"));
    }

    // All failure modes collapse into the inactive shape inside the service;
    // this handler never discloses which check failed.
    let result = service::introspect(state.store.as_ref(), &state.codec, &req.token).await;
    Ok(JSend::success(result))
}

pub async fn revoke_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<JSend<()>>, ApiError> {
    if req.token.trim().is_empty() {
        return Err(ApiError::bad_request("token is required"));
    }

    service::revoke(state.store.as_ref(), &state.codec, &req.token)
        .await
        .map_err(storage_error)?;

    tracing::debug!("revoked token");
    Ok(JSend::success(()))
}

// ============================================================================
// Helpers
// ============================================================================

fn issue_error(e: IssueError) -> ApiError {
    match e {
        IssueError::Codec(e) => ApiError::internal(format!("Failed to generate token: {e}")),
        IssueError::Storage(e) => storage_error(e),
    }
}

fn storage_error(e: StorageError) -> ApiError {
    match e {
        StorageError::Unavailable => ApiError::unavailable("Storage is not available"),
        e => ApiError::internal(e.to_string()),
    }
}
