use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use crate::api::response::{ApiError, JSend};
use crate::storage::StorageError;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub login: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct CreateUserResponse {
    pub user_id: i64,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<JSend<CreateUserResponse>>, ApiError> {
    if req.login.trim().is_empty() {
        return Err(ApiError::bad_request("login is required"));
    }
    if req.email.trim().is_empty() {
        return Err(ApiError::bad_request("email is required"));
    }

    let user_id = state
        .users
        .create_user(&req.login, &req.email)
        .await
        .map_err(|e| match e {
            StorageError::Unavailable => ApiError::unavailable("Storage is not available"),
            e => ApiError::internal(format!("Failed to create user: {e}")),
        })?;

    // Best-effort background maintenance; the response never waits on it
    Arc::clone(&state.partitions).spawn_growth_check(user_id);

    tracing::debug!(user_id, "created user");
    Ok(JSend::success(CreateUserResponse { user_id }))
}
