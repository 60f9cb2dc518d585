//! Concurrency tests
//!
//! Many users across all workers at once: nothing is lost, per-user order
//! holds, and the shared registry and detector state stay consistent under
//! concurrent mutation.

use chrono::{Duration, Utc};
use vitalhub::storage::StorageBackend;
use vitalhub::{ActivityLevel, DetectorConfig, DetectorKind, VitalParameter};

use crate::helpers::*;

#[tokio::test]
async fn test_many_users_across_all_workers() {
    let pipeline = spawn_pipeline();

    let users: Vec<String> = (0..16).map(|i| format!("user-{i}")).collect();
    let now = Utc::now();

    for round in 0..20i64 {
        for user in &users {
            let mut sample = normal_sample(user, now + Duration::seconds(round));
            sample.activity = round as f64;
            pipeline.ingest(sample).await;
        }
    }

    let (store, _outbound) = pipeline.drain().await;

    let rows = store.vitals_rows();
    assert_eq!(rows.len(), 16 * 20);

    for user in &users {
        let activities: Vec<f64> = rows
            .iter()
            .filter(|row| &row.sample.user_id == user)
            .map(|row| row.sample.activity)
            .collect();
        assert_eq!(activities.len(), 20);
        assert!(activities.windows(2).all(|w| w[0] < w[1]), "{user}");
    }
}

#[tokio::test]
async fn test_registry_counts_are_exact_under_concurrency() {
    let pipeline = spawn_pipeline();

    let now = Utc::now();
    for i in 0..25i64 {
        for user in ["alice", "bob", "carol", "dave"] {
            pipeline
                .ingest(normal_sample(user, now + Duration::seconds(i)))
                .await;
        }
    }

    let detector = pipeline.detector.clone();
    let (_store, _outbound) = pipeline.drain().await;

    for user in ["alice", "bob", "carol", "dave"] {
        let cell = detector
            .registry()
            .cell(user, ActivityLevel::Low, VitalParameter::HeartRate)
            .unwrap();
        assert_eq!(cell.count(), 25, "{user}");
        assert!((cell.mean() - 72.0).abs() < 1e-9);
    }
}

#[tokio::test]
async fn test_detector_switch_mid_stream_is_clean() {
    let pipeline = spawn_pipeline();

    let now = Utc::now();
    for i in 0..10i64 {
        pipeline
            .ingest(normal_sample("alice", now + Duration::seconds(i)))
            .await;
    }

    // Swap strategies while samples may still be in flight.
    pipeline.detector.switch(DetectorConfig {
        detector_type: DetectorKind::UserBaseline,
        user_id: "alice".to_string(),
    });

    for i in 10..20i64 {
        pipeline
            .ingest(normal_sample("alice", now + Duration::seconds(i)))
            .await;
    }

    let (store, _outbound) = pipeline.drain().await;

    // All samples processed, none alerted (everything is in range for both
    // strategies; the cold baseline falls back to the population table).
    assert_eq!(store.vitals_count(), 20);
    assert!(store.alert_history("alice", 50).await.unwrap().is_empty());
}
