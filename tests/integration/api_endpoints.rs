//! Integration tests for API endpoints
//!
//! These tests drive a real server on an ephemeral port and verify:
//! - Response shapes of every endpoint
//! - Detector switching and its config echo on the broker
//! - Error mapping (400 for bad config, 502 for LLM failures)

use chrono::Utc;
use serde_json::{json, Value};
use vitalhub::broker::Outbound;
use vitalhub::storage::StorageBackend;
use vitalhub::{
    next_alert_id, ActivityLevel, Alert, DetectorKind, Severity, VitalParameter,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_trends_empty_store_returns_full_envelope() {
    let api = spawn_test_api("http://127.0.0.1:1").await;

    let response = api.client.get(api.url("/api/trends")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    let trends = body["trends"].as_object().unwrap();
    assert_eq!(trends.len(), 5);

    for scale in ["1min", "30min", "1h", "1day", "7day"] {
        let per_parameter = trends[scale].as_object().unwrap();
        assert_eq!(per_parameter.len(), 6, "{scale}");
        for series in per_parameter.values() {
            assert_eq!(series["times"].as_array().unwrap().len(), 0);
            assert_eq!(series["values"].as_array().unwrap().len(), 0);
        }
    }
}

#[tokio::test]
async fn test_detector_switch_round_trip_and_config_echo() {
    let mut api = spawn_test_api("http://127.0.0.1:1").await;

    let response = api
        .client
        .post(api.url("/api/detector/set"))
        .json(&json!({"detector_type": "range_based", "user_id": "u1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["ok"], true);

    let response = api
        .client
        .get(api.url("/api/detector/current"))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detector_type"], "range_based");
    assert_eq!(body["user_id"], "u1");

    // The switch is echoed on the config topic with the same body.
    match api.outbound_rx.recv().await.unwrap() {
        Outbound::Config(config) => {
            assert_eq!(config.detector_type, DetectorKind::RangeBased);
            assert_eq!(config.user_id, "u1");
        }
        other => panic!("expected config echo, got {other:?}"),
    }
}

#[tokio::test]
async fn test_detector_set_rejects_bad_requests() {
    let api = spawn_test_api("http://127.0.0.1:1").await;

    let response = api
        .client
        .post(api.url("/api/detector/set"))
        .json(&json!({"detector_type": "clairvoyant", "user_id": "u1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("detector type"));

    let response = api
        .client
        .post(api.url("/api/detector/set"))
        .json(&json!({"detector_type": "user_baseline", "user_id": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_baseline_inspection_and_reset() {
    let api = spawn_test_api("http://127.0.0.1:1").await;

    let registry = api.detector.registry();
    for value in [64.0, 65.0, 66.0] {
        registry.update("alice", ActivityLevel::Low, VitalParameter::HeartRate, value);
    }

    let response = api
        .client
        .get(api.url("/api/user/baselines?user_id=alice"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user_id"], "alice");
    let hr = &body["activity_levels"]["low"]["parameters"]["heart_rate"];
    assert_eq!(hr["count"], 3);
    assert_eq!(hr["mean"], 65.0);
    assert_eq!(body["activity_levels"]["low"]["total_samples"], 3);

    let response = api
        .client
        .post(api.url("/api/user/reset_baselines"))
        .json(&json!({"user_id": "alice"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["ok"], true);

    let response = api
        .client
        .get(api.url("/api/user/baselines?user_id=alice"))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert!(body["activity_levels"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn test_alert_history_is_newest_first_and_limited() {
    let api = spawn_test_api("http://127.0.0.1:1").await;

    let base = Utc::now();
    for i in 0..5i64 {
        let alert = Alert {
            id: next_alert_id(),
            timestamp: base + chrono::Duration::seconds(i),
            user_id: "default".to_string(),
            parameter: VitalParameter::HeartRate,
            value: 150.0,
            activity_level: ActivityLevel::Low,
            normal_range: [60.0, 80.0],
            deviation_percent: 87.5,
            severity: Severity::High,
            detector_type: DetectorKind::RangeBased,
        };
        api.store.insert_alert(&alert).await.unwrap();
    }

    let response = api
        .client
        .get(api.url("/api/alerts/history?limit=3"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Vec<Value> = response.json().await.unwrap();
    assert_eq!(body.len(), 3);
    let timestamps: Vec<&str> = body
        .iter()
        .map(|alert| alert["timestamp"].as_str().unwrap())
        .collect();
    assert!(timestamps.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(body[0]["severity"], "high");
    assert_eq!(body[0]["normal_range"], json!([60.0, 80.0]));
}

#[tokio::test]
async fn test_llm_analysis_passes_markdown_through() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [
                {"message": {"role": "assistant", "content": "## Trend\nLooks stable."}}
            ]
        })))
        .mount(&mock_server)
        .await;

    let api = spawn_test_api(&mock_server.uri()).await;

    let response = api
        .client
        .post(api.url("/api/trends/llm_analysis"))
        .json(&json!({
            "parameter": "heart_rate",
            "time_scale": "1h",
            "unit": "bpm",
            "timestamps": ["09:00", "09:05"],
            "values": [68.2, 69.0]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["markdown"], "## Trend\nLooks stable.");
}

#[tokio::test]
async fn test_llm_upstream_failure_maps_to_502() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&mock_server)
        .await;

    let api = spawn_test_api(&mock_server.uri()).await;

    let response = api
        .client
        .post(api.url("/api/trends/llm_analysis"))
        .json(&json!({
            "parameter": "heart_rate",
            "time_scale": "1h",
            "unit": "bpm",
            "timestamps": [],
            "values": []
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn test_trends_reflect_ingested_samples() {
    let api = spawn_test_api("http://127.0.0.1:1").await;

    let now = Utc::now();
    for i in 0..3i64 {
        let sample = vitalhub::EnrichedSample::from_sample(normal_sample(
            "default",
            now - chrono::Duration::seconds(i * 5),
        ));
        api.store.insert_vitals(&sample).await.unwrap();
    }

    let response = api.client.get(api.url("/api/trends")).send().await.unwrap();
    let body: Value = response.json().await.unwrap();

    let series = &body["trends"]["1h"]["heart_rate"];
    let values = series["values"].as_array().unwrap();
    assert!(!values.is_empty());
    assert!(values.iter().all(|v| v.as_f64().unwrap() == 72.0));
}
