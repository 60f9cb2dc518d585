//! Trend queries and LLM trend analysis

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
};
use crate::llm::TrendWindow;
use crate::trends;

/// GET /api/trends
///
/// The full five-scale envelope; every scale and parameter is present even
/// when its window holds no samples.
pub async fn get_trends(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let envelope = trends::collect_trends(state.store.as_ref(), Utc::now()).await?;
    Ok(Json(json!({ "trends": envelope })))
}

/// POST /api/trends/llm_analysis
///
/// Forwards one trend window to the external analyst and passes the
/// markdown through verbatim.
pub async fn llm_analysis(
    State(state): State<ApiState>,
    Json(window): Json<TrendWindow>,
) -> ApiResult<Json<Value>> {
    let markdown = state.analyst.analyze(&window).await.map_err(|e| {
        warn!("LLM analysis failed: {e:#}");
        ApiError::Llm(e.to_string())
    })?;

    Ok(Json(json!({ "markdown": markdown })))
}
