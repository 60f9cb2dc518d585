//! Storage backend trait definition

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::StorageResult;
use crate::{Alert, EnrichedSample, VitalParameter};

/// One downsampled point: the bucket start and the mean of all values that
/// fell into the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub bucket_time: DateTime<Utc>,
    pub mean: f64,
}

/// Trait for vital-signs storage backends
///
/// The ingestion pipeline is the only writer and the API the only reader.
/// Write methods are best-effort from the caller's point of view: the
/// pipeline logs and swallows storage errors, so a broken store degrades the
/// system to detection-and-republish instead of stopping ingestion.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`; a single instance is shared by
/// every ingestion worker and API handler.
///
/// ## Idempotence
///
/// The broker delivers at-least-once, so duplicate inserts are possible and
/// accepted; trend aggregation averages over buckets, which absorbs them.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Insert one enriched sample into the vitals table.
    async fn insert_vitals(&self, sample: &EnrichedSample) -> StorageResult<()>;

    /// Append one alert.
    async fn insert_alert(&self, alert: &Alert) -> StorageResult<()>;

    /// Per-bucket means of one parameter since `since`, bucket width
    /// `bucket_seconds`, ordered by bucket ascending. Buckets without
    /// samples do not appear.
    async fn bucketed_means(
        &self,
        parameter: VitalParameter,
        since: DateTime<Utc>,
        bucket_seconds: i64,
    ) -> StorageResult<Vec<TrendPoint>>;

    /// The most recent alerts for a user, newest first.
    async fn alert_history(&self, user_id: &str, limit: usize) -> StorageResult<Vec<Alert>>;

    /// Lightweight connectivity probe.
    async fn health_check(&self) -> StorageResult<()>;

    /// Release connections and flush pending work.
    async fn close(&self) -> StorageResult<()>;
}
