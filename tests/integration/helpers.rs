//! Helper functions for integration tests

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use vitalhub::{
    actors::ingest::IngestWorker,
    api::{spawn_api_server, ApiState},
    baseline::BaselineRegistry,
    broker::{Outbound, Publisher},
    config::LlmConfig,
    detector::DetectorState,
    llm::TrendAnalyst,
    storage::{MemoryBackend, StorageBackend},
    VitalSample,
};

/// A full ingestion pipeline over an in-memory store, with the outbound
/// broker stream captured on a channel.
pub struct TestPipeline {
    pub workers: Vec<mpsc::Sender<VitalSample>>,
    pub handles: Vec<tokio::task::JoinHandle<()>>,
    pub detector: Arc<DetectorState>,
    pub store: Arc<MemoryBackend>,
    pub outbound_rx: mpsc::Receiver<Outbound>,
}

pub fn spawn_pipeline() -> TestPipeline {
    let registry = Arc::new(BaselineRegistry::new());
    let detector = Arc::new(DetectorState::new(registry));
    let store = Arc::new(MemoryBackend::new());

    let (outbound_tx, outbound_rx) = mpsc::channel(1024);
    let publisher = Publisher::from_sender(outbound_tx);

    let (workers, handles) = IngestWorker::spawn_pool(
        Arc::clone(&detector),
        Arc::clone(&store) as Arc<dyn StorageBackend>,
        publisher,
    );

    TestPipeline {
        workers,
        handles,
        detector,
        store,
        outbound_rx,
    }
}

impl TestPipeline {
    /// Send one sample through its sticky worker, exactly as the gateway
    /// would route it.
    pub async fn ingest(&self, sample: VitalSample) {
        let index = vitalhub::broker::sticky_worker(&sample.user_id, self.workers.len());
        self.workers[index].send(sample).await.unwrap();
    }

    /// Close the work channels and wait for every worker to drain.
    pub async fn drain(mut self) -> (Arc<MemoryBackend>, mpsc::Receiver<Outbound>) {
        self.workers.clear();
        for handle in self.handles.drain(..) {
            handle.await.unwrap();
        }
        (self.store, self.outbound_rx)
    }
}

/// The scenario sample: all vitals in their low-activity normal ranges.
pub fn normal_sample(user_id: &str, timestamp: DateTime<Utc>) -> VitalSample {
    VitalSample {
        timestamp,
        user_id: user_id.to_string(),
        activity: 20.0,
        heart_rate: Some(72.0),
        blood_pressure_systolic: Some(115.0),
        blood_pressure_diastolic: Some(75.0),
        temperature: Some(36.8),
        oxygen_saturation: Some(98.0),
    }
}

/// An API server bound on an ephemeral port over the given store and
/// detector state, with the outbound stream captured.
pub struct TestApi {
    pub addr: SocketAddr,
    pub detector: Arc<DetectorState>,
    pub store: Arc<MemoryBackend>,
    pub outbound_rx: mpsc::Receiver<Outbound>,
    pub client: reqwest::Client,
    /// Keeps the server's shutdown signal pending for the test's lifetime.
    _shutdown_tx: watch::Sender<bool>,
}

impl TestApi {
    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.addr.port())
    }
}

/// Spawn a test API server; `llm_base_url` points the analyst at a mock
/// (or at a dead port for tests that never call it).
pub async fn spawn_test_api(llm_base_url: &str) -> TestApi {
    let registry = Arc::new(BaselineRegistry::new());
    let detector = Arc::new(DetectorState::new(registry));
    let store = Arc::new(MemoryBackend::new());

    let (outbound_tx, outbound_rx) = mpsc::channel(64);
    let publisher = Publisher::from_sender(outbound_tx);

    let analyst = TrendAnalyst::new(LlmConfig {
        base_url: llm_base_url.to_string(),
        api_key: "test-key".to_string(),
        model: "test-model".to_string(),
        temperature: 0.2,
    })
    .unwrap();

    let state = ApiState::new(
        Arc::clone(&detector),
        Arc::clone(&store) as Arc<dyn StorageBackend>,
        publisher,
        analyst,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let addr = spawn_api_server(0, state, shutdown_rx).await.unwrap();

    TestApi {
        addr,
        detector,
        store,
        outbound_rx,
        client: reqwest::Client::new(),
        _shutdown_tx: shutdown_tx,
    }
}
