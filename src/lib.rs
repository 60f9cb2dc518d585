use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod actors;
pub mod api;
pub mod baseline;
pub mod broker;
pub mod config;
pub mod detector;
pub mod llm;
pub mod storage;
pub mod trends;

/// One raw vital-signs reading as published on the raw-vitals topic.
///
/// Any vital may be absent; absent vitals are skipped by detection and
/// never fabricated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VitalSample {
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default)]
    pub activity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_pressure_systolic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_pressure_diastolic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oxygen_saturation: Option<f64>,
}

pub fn default_user_id() -> String {
    "default".to_string()
}

/// A raw sample plus its derived activity level, as republished on the
/// vitals topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedSample {
    #[serde(flatten)]
    pub sample: VitalSample,
    pub activity_level: ActivityLevel,
}

impl EnrichedSample {
    pub fn from_sample(sample: VitalSample) -> Self {
        let activity_level = ActivityLevel::from_activity(sample.activity);
        Self {
            sample,
            activity_level,
        }
    }
}

/// Ternary motion-intensity classification derived from steps/min.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    Low,
    Medium,
    High,
}

impl ActivityLevel {
    /// `> 100 → High`, `> 50 → Medium`, else `Low`.
    pub fn from_activity(activity: f64) -> Self {
        if activity > 100.0 {
            ActivityLevel::High
        } else if activity > 50.0 {
            ActivityLevel::Medium
        } else {
            ActivityLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLevel::Low => "low",
            ActivityLevel::Medium => "medium",
            ActivityLevel::High => "high",
        }
    }

    pub const ALL: [ActivityLevel; 3] = [
        ActivityLevel::Low,
        ActivityLevel::Medium,
        ActivityLevel::High,
    ];
}

impl std::str::FromStr for ActivityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(ActivityLevel::Low),
            "medium" => Ok(ActivityLevel::Medium),
            "high" => Ok(ActivityLevel::High),
            other => Err(format!("unknown activity level: {other}")),
        }
    }
}

/// The vital parameters the system tracks.
///
/// The first five are subject to anomaly detection; `Activity` only
/// participates in trend aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VitalParameter {
    HeartRate,
    BloodPressureSystolic,
    BloodPressureDiastolic,
    Temperature,
    OxygenSaturation,
    Activity,
}

impl VitalParameter {
    /// Parameters checked by the anomaly detector.
    pub const DETECTED: [VitalParameter; 5] = [
        VitalParameter::HeartRate,
        VitalParameter::BloodPressureSystolic,
        VitalParameter::BloodPressureDiastolic,
        VitalParameter::Temperature,
        VitalParameter::OxygenSaturation,
    ];

    /// Parameters covered by trend aggregation.
    pub const TRENDED: [VitalParameter; 6] = [
        VitalParameter::HeartRate,
        VitalParameter::BloodPressureSystolic,
        VitalParameter::BloodPressureDiastolic,
        VitalParameter::Temperature,
        VitalParameter::OxygenSaturation,
        VitalParameter::Activity,
    ];

    /// Wire and column name. Doubles as the SQL column identifier, so the
    /// set of valid column names is closed over this enum.
    pub fn as_str(&self) -> &'static str {
        match self {
            VitalParameter::HeartRate => "heart_rate",
            VitalParameter::BloodPressureSystolic => "blood_pressure_systolic",
            VitalParameter::BloodPressureDiastolic => "blood_pressure_diastolic",
            VitalParameter::Temperature => "temperature",
            VitalParameter::OxygenSaturation => "oxygen_saturation",
            VitalParameter::Activity => "activity",
        }
    }

    /// Extract this parameter's value from a sample, if present.
    pub fn value_of(&self, sample: &VitalSample) -> Option<f64> {
        match self {
            VitalParameter::HeartRate => sample.heart_rate,
            VitalParameter::BloodPressureSystolic => sample.blood_pressure_systolic,
            VitalParameter::BloodPressureDiastolic => sample.blood_pressure_diastolic,
            VitalParameter::Temperature => sample.temperature,
            VitalParameter::OxygenSaturation => sample.oxygen_saturation,
            VitalParameter::Activity => Some(sample.activity),
        }
    }
}

impl std::str::FromStr for VitalParameter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "heart_rate" => Ok(VitalParameter::HeartRate),
            "blood_pressure_systolic" => Ok(VitalParameter::BloodPressureSystolic),
            "blood_pressure_diastolic" => Ok(VitalParameter::BloodPressureDiastolic),
            "temperature" => Ok(VitalParameter::Temperature),
            "oxygen_saturation" => Ok(VitalParameter::OxygenSaturation),
            "activity" => Ok(VitalParameter::Activity),
            other => Err(format!("unknown parameter: {other}")),
        }
    }
}

impl std::fmt::Display for VitalParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity, a pure function of the absolute deviation percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// `|dev| < 10 → Low`, `10 ≤ |dev| < 20 → Medium`, `|dev| ≥ 20 → High`.
    pub fn from_deviation_percent(deviation_percent: f64) -> Self {
        let dev = deviation_percent.abs();
        if dev >= 20.0 {
            Severity::High
        } else if dev >= 10.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Which detection strategy produced an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    RangeBased,
    UserBaseline,
}

impl DetectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::RangeBased => "range_based",
            DetectorKind::UserBaseline => "user_baseline",
        }
    }
}

impl std::str::FromStr for DetectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "range_based" => Ok(DetectorKind::RangeBased),
            "user_baseline" => Ok(DetectorKind::UserBaseline),
            other => Err(format!("unknown detector type: {other}")),
        }
    }
}

/// Active detector configuration, as exchanged on the config topic and the
/// detector API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub detector_type: DetectorKind,
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

/// One anomaly record, as persisted and as published on the alerts topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub parameter: VitalParameter,
    pub value: f64,
    pub activity_level: ActivityLevel,
    /// The `[low, high]` range the decision was made against.
    pub normal_range: [f64; 2],
    /// Signed percent distance from the violated range edge.
    pub deviation_percent: f64,
    pub severity: Severity,
    pub detector_type: DetectorKind,
}

static ALERT_ID: AtomicI64 = AtomicI64::new(1);

/// Allocate the next process-monotonic alert id.
pub fn next_alert_id() -> i64 {
    ALERT_ID.fetch_add(1, Ordering::Relaxed)
}
