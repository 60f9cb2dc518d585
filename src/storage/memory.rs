//! In-memory storage backend (no persistence)
//!
//! Stores samples and alerts in plain vectors behind mutexes and computes
//! the bucketed means in Rust. Useful for:
//! - Testing without a database
//! - Running the backend against a broker with no store attached
//!
//! All data is lost on restart and memory grows with every insert, so this
//! is not a production backend.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;

use super::backend::{StorageBackend, TrendPoint};
use super::error::StorageResult;
use crate::{Alert, EnrichedSample, VitalParameter};

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    vitals: Mutex<Vec<EnrichedSample>>,
    alerts: Mutex<Vec<Alert>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vitals rows stored (test helper).
    pub fn vitals_count(&self) -> usize {
        self.vitals.lock().expect("memory backend poisoned").len()
    }

    /// Copy of all stored samples, in insertion order (test helper).
    pub fn vitals_rows(&self) -> Vec<EnrichedSample> {
        self.vitals.lock().expect("memory backend poisoned").clone()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn insert_vitals(&self, sample: &EnrichedSample) -> StorageResult<()> {
        self.vitals
            .lock()
            .expect("memory backend poisoned")
            .push(sample.clone());
        Ok(())
    }

    async fn insert_alert(&self, alert: &Alert) -> StorageResult<()> {
        self.alerts
            .lock()
            .expect("memory backend poisoned")
            .push(alert.clone());
        Ok(())
    }

    async fn bucketed_means(
        &self,
        parameter: VitalParameter,
        since: DateTime<Utc>,
        bucket_seconds: i64,
    ) -> StorageResult<Vec<TrendPoint>> {
        // (sum, count) per bucket start; BTreeMap keeps buckets ascending.
        let mut buckets: BTreeMap<i64, (f64, u64)> = BTreeMap::new();

        let vitals = self.vitals.lock().expect("memory backend poisoned");
        for row in vitals.iter() {
            if row.sample.timestamp < since {
                continue;
            }
            let Some(value) = parameter.value_of(&row.sample) else {
                continue;
            };
            let bucket = row.sample.timestamp.timestamp().div_euclid(bucket_seconds) * bucket_seconds;
            let entry = buckets.entry(bucket).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
        drop(vitals);

        let points = buckets
            .into_iter()
            .map(|(bucket, (sum, count))| TrendPoint {
                bucket_time: Utc.timestamp_opt(bucket, 0).unwrap(),
                mean: sum / count as f64,
            })
            .collect();

        Ok(points)
    }

    async fn alert_history(&self, user_id: &str, limit: usize) -> StorageResult<Vec<Alert>> {
        let alerts = self.alerts.lock().expect("memory backend poisoned");
        let mut history: Vec<Alert> = alerts
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        history.truncate(limit);
        Ok(history)
    }

    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend (no-op)");
        Ok(())
    }
}
