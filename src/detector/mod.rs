//! Anomaly detection
//!
//! Two interchangeable strategies behind a single `classify` entry point:
//!
//! - **Range-based**: a fixed population table of per-activity-level normal
//!   ranges ([`ranges`]).
//! - **User-baseline**: per-user learned ranges of `mean ± 2σ` from the
//!   [`BaselineRegistry`]; cells that have not seen enough samples fall back
//!   to the population table.
//!
//! A [`Detector`] is immutable once built. The active strategy lives in a
//! [`DetectorState`] behind one mutex; switching installs a fresh strategy
//! object, so the ingestion workers always classify against a consistent
//! configuration. Classification itself is pure CPU and never fails: a
//! missing parameter simply yields no alert.

pub mod ranges;

use std::sync::{Arc, Mutex};

use tracing::info;

use crate::baseline::BaselineRegistry;
use crate::{
    next_alert_id, ActivityLevel, Alert, DetectorConfig, DetectorKind, EnrichedSample, Severity,
    VitalParameter,
};

/// An immutable detection strategy.
#[derive(Debug, Clone)]
pub enum Detector {
    RangeBased,
    UserBaseline {
        user_id: String,
        registry: Arc<BaselineRegistry>,
    },
}

impl Detector {
    pub fn kind(&self) -> DetectorKind {
        match self {
            Detector::RangeBased => DetectorKind::RangeBased,
            Detector::UserBaseline { .. } => DetectorKind::UserBaseline,
        }
    }

    /// Classify one enriched sample, emitting zero or more alerts.
    pub fn classify(&self, enriched: &EnrichedSample) -> Vec<Alert> {
        let mut alerts = Vec::new();

        for parameter in VitalParameter::DETECTED {
            let Some(value) = parameter.value_of(&enriched.sample) else {
                continue;
            };
            let Some(range) = self.range_for(parameter, enriched.activity_level) else {
                continue;
            };
            if let Some(alert) = evaluate(enriched, parameter, value, range, self.kind()) {
                alerts.push(alert);
            }
        }

        alerts
    }

    /// The `[low, high]` this strategy holds the parameter to.
    fn range_for(
        &self,
        parameter: VitalParameter,
        activity_level: ActivityLevel,
    ) -> Option<[f64; 2]> {
        match self {
            Detector::RangeBased => ranges::normal_range(activity_level, parameter),
            Detector::UserBaseline { user_id, registry } => {
                let learned = registry
                    .cell(user_id, activity_level, parameter)
                    .filter(|cell| cell.is_warm())
                    .and_then(|cell| {
                        let std_dev = cell.std_dev()?;
                        Some([
                            round1(cell.mean() - 2.0 * std_dev),
                            round1(cell.mean() + 2.0 * std_dev),
                        ])
                    });

                // Unwarm cells fall through to the population table.
                learned.or_else(|| ranges::normal_range(activity_level, parameter))
            }
        }
    }
}

/// Range decision and alert construction, shared by both strategies.
fn evaluate(
    enriched: &EnrichedSample,
    parameter: VitalParameter,
    value: f64,
    normal_range: [f64; 2],
    detector_type: DetectorKind,
) -> Option<Alert> {
    let [low, high] = normal_range;
    if value >= low && value <= high {
        return None;
    }

    let edge = if value > high { high } else { low };
    let deviation_percent = if edge == 0.0 || !edge.is_finite() {
        // A degenerate edge would divide the deviation away; clamp instead.
        100.0 * (value - edge).signum()
    } else {
        100.0 * (value - edge) / edge
    };

    Some(Alert {
        id: next_alert_id(),
        timestamp: enriched.sample.timestamp,
        user_id: enriched.sample.user_id.clone(),
        parameter,
        value,
        activity_level: enriched.activity_level,
        normal_range,
        deviation_percent,
        severity: Severity::from_deviation_percent(deviation_percent),
        detector_type,
    })
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Process-wide active-detector state.
///
/// Readers grab the current strategy with [`DetectorState::detector`], one
/// `Arc` clone under the lock. Switches are serialized through
/// [`DetectorState::switch`] and install a new immutable [`Detector`].
#[derive(Debug)]
pub struct DetectorState {
    registry: Arc<BaselineRegistry>,
    active: Mutex<(DetectorConfig, Arc<Detector>)>,
}

impl DetectorState {
    /// Start with the range-based strategy for the default user.
    pub fn new(registry: Arc<BaselineRegistry>) -> Self {
        let config = DetectorConfig {
            detector_type: DetectorKind::RangeBased,
            user_id: crate::default_user_id(),
        };
        let detector = Arc::new(Detector::RangeBased);
        Self {
            registry,
            active: Mutex::new((config, detector)),
        }
    }

    /// The currently installed strategy.
    pub fn detector(&self) -> Arc<Detector> {
        let active = self.active.lock().expect("detector state poisoned");
        Arc::clone(&active.1)
    }

    /// The current configuration.
    pub fn current(&self) -> DetectorConfig {
        let active = self.active.lock().expect("detector state poisoned");
        active.0.clone()
    }

    /// Install a new strategy.
    pub fn switch(&self, config: DetectorConfig) {
        let detector = Arc::new(match config.detector_type {
            DetectorKind::RangeBased => Detector::RangeBased,
            DetectorKind::UserBaseline => Detector::UserBaseline {
                user_id: config.user_id.clone(),
                registry: Arc::clone(&self.registry),
            },
        });

        let mut active = self.active.lock().expect("detector state poisoned");
        info!(
            "detector switched to {} (user {})",
            config.detector_type.as_str(),
            config.user_id
        );
        *active = (config, detector);
    }

    pub fn registry(&self) -> &Arc<BaselineRegistry> {
        &self.registry
    }
}
