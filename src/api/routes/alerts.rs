//! Alert history

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::api::{error::ApiResult, state::ApiState};
use crate::Alert;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<usize>,
    user_id: Option<String>,
}

/// GET /api/alerts/history?limit=&user_id=
///
/// Most recent alerts first. `limit` defaults to 50 and is clamped to
/// 1..=1000.
pub async fn alert_history(
    State(state): State<ApiState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<Alert>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let user_id = query
        .user_id
        .unwrap_or_else(|| state.detector.current().user_id);

    let alerts = state.store.alert_history(&user_id, limit).await?;
    Ok(Json(alerts))
}
