//! User baseline inspection and reset

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
};
use crate::baseline::UserBaselines;

#[derive(Debug, Deserialize)]
pub struct BaselineQuery {
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    user_id: Option<String>,
}

/// GET /api/user/baselines?user_id=
///
/// Snapshot of everything learned for the user, grouped by activity level.
pub async fn get_baselines(
    State(state): State<ApiState>,
    Query(query): Query<BaselineQuery>,
) -> ApiResult<Json<UserBaselines>> {
    let user_id = resolve_user(&state, query.user_id)?;
    Ok(Json(state.detector.registry().stats(&user_id)))
}

/// POST /api/user/reset_baselines
pub async fn reset_baselines(
    State(state): State<ApiState>,
    Json(request): Json<ResetRequest>,
) -> ApiResult<Json<Value>> {
    let user_id = resolve_user(&state, request.user_id)?;
    state.detector.registry().reset(&user_id);
    Ok(Json(json!({ "ok": true })))
}

/// Fall back to the active detector's user when the request names none.
fn resolve_user(state: &ApiState, user_id: Option<String>) -> ApiResult<String> {
    let user_id = user_id.unwrap_or_else(|| state.detector.current().user_id);
    if user_id.is_empty() {
        return Err(ApiError::InvalidRequest("user_id must not be empty".to_string()));
    }
    Ok(user_id)
}
