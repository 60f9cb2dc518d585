//! Per-user baseline registry
//!
//! Process-wide running statistics for every (user, activity level,
//! parameter) combination, learned online from samples the detector
//! classified as normal. Cells live for the lifetime of the process and are
//! dropped only by an explicit reset.
//!
//! Updates use Welford's algorithm, so a cell is a constant-size triple
//! regardless of how many samples it has absorbed and the update is
//! allocation-free. All cells sit behind a single mutex; updates and
//! snapshots hold it only long enough to touch or copy the map.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use tracing::debug;

use crate::{ActivityLevel, VitalParameter};

/// Samples required before a cell is trusted by the user-baseline detector.
pub const WARM_SAMPLE_COUNT: u64 = 30;

/// Running Gaussian summary for one (user, activity level, parameter).
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineCell {
    count: u64,
    mean: f64,
    /// Running sum of squared deviations from the mean (Welford's M2).
    m2: f64,
}

impl BaselineCell {
    /// Fold one observation into the cell.
    pub fn record(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample standard deviation, defined from two observations on.
    ///
    /// M2 is non-negative by construction; a tiny negative value from
    /// floating-point drift is clamped rather than propagated into `sqrt`.
    pub fn std_dev(&self) -> Option<f64> {
        if self.count < 2 {
            return None;
        }
        Some((self.m2.max(0.0) / (self.count - 1) as f64).sqrt())
    }

    /// A cell is warm once it has absorbed [`WARM_SAMPLE_COUNT`] samples.
    pub fn is_warm(&self) -> bool {
        self.count >= WARM_SAMPLE_COUNT
    }
}

type BaselineKey = (String, ActivityLevel, VitalParameter);

/// Concurrent map of baseline cells.
#[derive(Debug, Default)]
pub struct BaselineRegistry {
    cells: Mutex<HashMap<BaselineKey, BaselineCell>>,
}

impl BaselineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a normal (non-alerting) observation into its cell.
    pub fn update(
        &self,
        user_id: &str,
        activity_level: ActivityLevel,
        parameter: VitalParameter,
        value: f64,
    ) {
        let mut cells = self.cells.lock().expect("baseline registry poisoned");
        cells
            .entry((user_id.to_string(), activity_level, parameter))
            .or_default()
            .record(value);
    }

    /// Copy of a single cell, if it exists.
    pub fn cell(
        &self,
        user_id: &str,
        activity_level: ActivityLevel,
        parameter: VitalParameter,
    ) -> Option<BaselineCell> {
        let cells = self.cells.lock().expect("baseline registry poisoned");
        cells
            .get(&(user_id.to_string(), activity_level, parameter))
            .copied()
    }

    /// Snapshot of everything learned for one user, for the inspection API.
    pub fn stats(&self, user_id: &str) -> UserBaselines {
        let mut activity_levels: HashMap<String, ActivityLevelStats> = HashMap::new();

        let cells = self.cells.lock().expect("baseline registry poisoned");
        for ((user, level, parameter), cell) in cells.iter() {
            if user != user_id {
                continue;
            }
            let entry = activity_levels.entry(level.as_str().to_string()).or_default();
            entry.total_samples += cell.count();
            entry.parameters.insert(
                parameter.as_str().to_string(),
                ParameterStats {
                    mean: round2(cell.mean()),
                    std_dev: round2(cell.std_dev().unwrap_or(0.0)),
                    count: cell.count(),
                },
            );
        }
        drop(cells);

        UserBaselines {
            user_id: user_id.to_string(),
            activity_levels,
        }
    }

    /// Drop every cell belonging to `user_id`. Returns the number removed.
    pub fn reset(&self, user_id: &str) -> usize {
        let mut cells = self.cells.lock().expect("baseline registry poisoned");
        let before = cells.len();
        cells.retain(|(user, _, _), _| user != user_id);
        let removed = before - cells.len();
        debug!("reset {removed} baseline cells for user {user_id}");
        removed
    }
}

/// Inspection snapshot for one user.
#[derive(Debug, Clone, Serialize)]
pub struct UserBaselines {
    pub user_id: String,
    pub activity_levels: HashMap<String, ActivityLevelStats>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivityLevelStats {
    pub total_samples: u64,
    pub parameters: HashMap<String, ParameterStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParameterStats {
    pub mean: f64,
    pub std_dev: f64,
    pub count: u64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
