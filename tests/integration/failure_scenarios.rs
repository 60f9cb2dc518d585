//! Failure-path tests
//!
//! The ingestion path is defensive: a broken store, a saturated publish
//! queue or malformed payloads must never take a worker down.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use vitalhub::actors::ingest::IngestWorker;
use vitalhub::baseline::BaselineRegistry;
use vitalhub::broker::{parse_raw_sample, Outbound, Publisher};
use vitalhub::detector::DetectorState;
use vitalhub::storage::{StorageBackend, StorageError, StorageResult, TrendPoint};
use vitalhub::{Alert, EnrichedSample, VitalParameter};

use crate::helpers::normal_sample;

/// A backend where every operation fails.
struct FailingBackend {
    attempts: AtomicUsize,
}

impl FailingBackend {
    fn new() -> Self {
        Self {
            attempts: AtomicUsize::new(0),
        }
    }

    fn fail<T>(&self) -> StorageResult<T> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::QueryFailed("backend is down".to_string()))
    }
}

#[async_trait]
impl StorageBackend for FailingBackend {
    async fn insert_vitals(&self, _sample: &EnrichedSample) -> StorageResult<()> {
        self.fail()
    }

    async fn insert_alert(&self, _alert: &Alert) -> StorageResult<()> {
        self.fail()
    }

    async fn bucketed_means(
        &self,
        _parameter: VitalParameter,
        _since: DateTime<Utc>,
        _bucket_seconds: i64,
    ) -> StorageResult<Vec<TrendPoint>> {
        self.fail()
    }

    async fn alert_history(&self, _user_id: &str, _limit: usize) -> StorageResult<Vec<Alert>> {
        self.fail()
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.fail()
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_storage_failures_do_not_stall_ingestion() {
    let registry = Arc::new(BaselineRegistry::new());
    let detector = Arc::new(DetectorState::new(registry));
    let store = Arc::new(FailingBackend::new());

    let (outbound_tx, mut outbound_rx) = mpsc::channel(64);
    let (workers, handles) = IngestWorker::spawn_pool(
        Arc::clone(&detector),
        Arc::clone(&store) as Arc<dyn StorageBackend>,
        Publisher::from_sender(outbound_tx),
    );

    // An alerting sample hits both failing insert paths.
    let mut sample = normal_sample("alice", Utc::now());
    sample.heart_rate = Some(150.0);
    workers[0].send(sample).await.unwrap();

    workers[0]
        .send(normal_sample("alice", Utc::now()))
        .await
        .unwrap();

    drop(workers);
    for handle in handles {
        handle.await.unwrap();
    }

    // Every sample still made it through to republication.
    let mut enriched = 0;
    let mut alerts = 0;
    while let Ok(message) = outbound_rx.try_recv() {
        match message {
            Outbound::Enriched(_) => enriched += 1,
            Outbound::Alert(_) => alerts += 1,
            Outbound::Config(_) => {}
        }
    }
    assert_eq!(enriched, 2);
    assert_eq!(alerts, 1);

    // Both vitals inserts and the alert insert were attempted.
    assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_full_outbound_queue_drops_instead_of_blocking() {
    let (outbound_tx, mut outbound_rx) = mpsc::channel(1);
    let publisher = Publisher::from_sender(outbound_tx);

    let enriched = EnrichedSample::from_sample(normal_sample("alice", Utc::now()));
    publisher.publish(Outbound::Enriched(enriched.clone()));
    publisher.publish(Outbound::Enriched(enriched.clone()));
    publisher.publish(Outbound::Enriched(enriched));

    // Only the first fits; the rest were dropped without blocking us.
    assert!(outbound_rx.try_recv().is_ok());
    assert!(outbound_rx.try_recv().is_err());
}

#[test]
fn test_malformed_payloads_are_rejected_not_panicking() {
    let bad_payloads: [&[u8]; 5] = [
        b"",
        b"not json at all",
        b"{\"timestamp\": \"yesterday\", \"activity\": 5}",
        b"[1, 2, 3]",
        b"{\"activity\": 5}",
    ];

    for payload in bad_payloads {
        assert!(parse_raw_sample(payload).is_err());
    }
}
