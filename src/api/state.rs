//! API shared state

use std::sync::Arc;

use crate::broker::Publisher;
use crate::detector::DetectorState;
use crate::llm::TrendAnalyst;
use crate::storage::StorageBackend;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Active detector configuration and strategy
    pub detector: Arc<DetectorState>,

    /// Time-series store for trends and alert history
    pub store: Arc<dyn StorageBackend>,

    /// Outbound broker publishes (config echoes)
    pub publisher: Publisher,

    /// External LLM client for trend analysis
    pub analyst: TrendAnalyst,
}

impl ApiState {
    pub fn new(
        detector: Arc<DetectorState>,
        store: Arc<dyn StorageBackend>,
        publisher: Publisher,
        analyst: TrendAnalyst,
    ) -> Self {
        Self {
            detector,
            store,
            publisher,
            analyst,
        }
    }
}
