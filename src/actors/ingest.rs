//! IngestWorker - end-to-end processing of one sample stream partition
//!
//! Each worker owns one bounded work channel and handles every sample on it
//! to completion:
//!
//! 1. enrich with the derived activity level
//! 2. classify against the active detector
//! 3. fold non-flagged parameters into the baseline registry
//! 4. persist the enriched sample (best-effort)
//! 5. persist and publish each alert (best-effort)
//! 6. publish the enriched sample
//!
//! Parsing and validation happen at the gateway boundary, so everything a
//! worker receives is well-formed. Storage and publish failures are logged
//! and skipped; detection and learning are pure CPU and cannot fail.
//!
//! Shutdown is channel-driven: when the gateway drops the work senders, the
//! workers drain what is left and exit.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::broker::{Outbound, Publisher};
use crate::detector::DetectorState;
use crate::storage::StorageBackend;
use crate::{EnrichedSample, VitalParameter, VitalSample};

/// Number of ingestion workers.
pub const WORKER_COUNT: usize = 4;

/// Per-worker channel capacity; with [`WORKER_COUNT`] workers about 1024
/// samples can be in flight before the gateway blocks.
pub const WORK_CHANNEL_CAPACITY: usize = 256;

/// One partition's worker.
pub struct IngestWorker {
    index: usize,
    work_rx: mpsc::Receiver<VitalSample>,
    detector: Arc<DetectorState>,
    store: Arc<dyn StorageBackend>,
    publisher: Publisher,
}

impl IngestWorker {
    /// Spawn the worker pool. Returns the work channel senders in worker
    /// index order (for the gateway's sticky dispatch) and the task handles
    /// (so shutdown can wait for the drain).
    pub fn spawn_pool(
        detector: Arc<DetectorState>,
        store: Arc<dyn StorageBackend>,
        publisher: Publisher,
    ) -> (Vec<mpsc::Sender<VitalSample>>, Vec<tokio::task::JoinHandle<()>>) {
        let mut senders = Vec::with_capacity(WORKER_COUNT);
        let mut handles = Vec::with_capacity(WORKER_COUNT);

        for index in 0..WORKER_COUNT {
            let (work_tx, work_rx) = mpsc::channel(WORK_CHANNEL_CAPACITY);
            let worker = IngestWorker {
                index,
                work_rx,
                detector: Arc::clone(&detector),
                store: Arc::clone(&store),
                publisher: publisher.clone(),
            };
            senders.push(work_tx);
            handles.push(tokio::spawn(worker.run()));
        }

        (senders, handles)
    }

    /// Run until the work channel closes, then drain and exit.
    #[instrument(skip(self), fields(worker = self.index))]
    pub async fn run(mut self) {
        debug!("starting ingestion worker");

        while let Some(sample) = self.work_rx.recv().await {
            self.process(sample).await;
        }

        debug!("ingestion worker stopped");
    }

    /// Handle one sample end-to-end.
    async fn process(&self, sample: VitalSample) {
        let enriched = EnrichedSample::from_sample(sample);

        let detector = self.detector.detector();
        let alerts = detector.classify(&enriched);

        // Learn only from parameters the detector considered normal in this
        // sample, so anomalies cannot poison the mean.
        let flagged: HashSet<VitalParameter> = alerts.iter().map(|a| a.parameter).collect();
        let registry = self.detector.registry();
        for parameter in VitalParameter::DETECTED {
            if flagged.contains(&parameter) {
                continue;
            }
            if let Some(value) = parameter.value_of(&enriched.sample) {
                registry.update(
                    &enriched.sample.user_id,
                    enriched.activity_level,
                    parameter,
                    value,
                );
            }
        }

        if let Err(e) = self.store.insert_vitals(&enriched).await {
            warn!("failed to store sample: {e}");
        }

        for alert in &alerts {
            info!(
                "anomaly: {} = {} for user {} ({} severity)",
                alert.parameter,
                alert.value,
                alert.user_id,
                alert.severity.as_str()
            );
            if let Err(e) = self.store.insert_alert(alert).await {
                warn!("failed to store alert: {e}");
            }
            self.publisher.publish(Outbound::Alert(alert.clone()));
        }

        self.publisher.publish(Outbound::Enriched(enriched));
    }
}
