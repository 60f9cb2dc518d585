//! Detector inspection and switching

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
};
use crate::broker::Outbound;
use crate::{DetectorConfig, DetectorKind};

/// Request body for POST /api/detector/set
///
/// `detector_type` arrives as a string so a bad value produces a
/// descriptive 400 instead of a deserializer rejection.
#[derive(Debug, Deserialize)]
pub struct SetDetectorRequest {
    detector_type: String,
    user_id: Option<String>,
}

/// GET /api/detector/current
pub async fn current_detector(State(state): State<ApiState>) -> Json<DetectorConfig> {
    Json(state.detector.current())
}

/// POST /api/detector/set
///
/// Installs the new strategy and echoes the configuration on the broker's
/// config topic.
pub async fn set_detector(
    State(state): State<ApiState>,
    Json(request): Json<SetDetectorRequest>,
) -> ApiResult<Json<Value>> {
    let detector_type: DetectorKind = request.detector_type.parse().map_err(|_| {
        ApiError::InvalidRequest(format!("invalid detector type: {}", request.detector_type))
    })?;

    let user_id = request
        .user_id
        .unwrap_or_else(|| state.detector.current().user_id);
    if user_id.is_empty() {
        return Err(ApiError::InvalidRequest("user_id must not be empty".to_string()));
    }

    let config = DetectorConfig {
        detector_type,
        user_id,
    };
    state.detector.switch(config.clone());
    state.publisher.publish(Outbound::Config(config));

    Ok(Json(json!({ "ok": true })))
}
