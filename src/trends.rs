//! Multi-resolution trend aggregation
//!
//! Five fixed time scales, each a (window, bucket) pair. For every scale
//! the aggregator asks the store for per-bucket means of each tracked
//! parameter inside the window and renders bucket times in the scale's
//! display format. Buckets without samples are omitted, so the chart
//! contract is "draw gaps", not "draw zeroes".

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::storage::{StorageBackend, StorageResult};
use crate::VitalParameter;

/// One downsampling resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendScale {
    OneMinute,
    ThirtyMinutes,
    OneHour,
    OneDay,
    SevenDays,
}

impl TrendScale {
    pub const ALL: [TrendScale; 5] = [
        TrendScale::OneMinute,
        TrendScale::ThirtyMinutes,
        TrendScale::OneHour,
        TrendScale::OneDay,
        TrendScale::SevenDays,
    ];

    /// Wire label, used as the envelope key.
    pub fn label(&self) -> &'static str {
        match self {
            TrendScale::OneMinute => "1min",
            TrendScale::ThirtyMinutes => "30min",
            TrendScale::OneHour => "1h",
            TrendScale::OneDay => "1day",
            TrendScale::SevenDays => "7day",
        }
    }

    /// How far back the scale looks.
    pub fn window(&self) -> Duration {
        match self {
            TrendScale::OneMinute => Duration::seconds(60),
            TrendScale::ThirtyMinutes => Duration::minutes(30),
            TrendScale::OneHour => Duration::hours(1),
            TrendScale::OneDay => Duration::days(1),
            TrendScale::SevenDays => Duration::days(7),
        }
    }

    /// Bucket width in seconds.
    pub fn bucket_seconds(&self) -> i64 {
        match self {
            TrendScale::OneMinute => 5,
            TrendScale::ThirtyMinutes => 60,
            TrendScale::OneHour => 300,
            TrendScale::OneDay => 3_600,
            TrendScale::SevenDays => 86_400,
        }
    }

    /// Render a bucket start in the scale's display format.
    pub fn format_bucket(&self, bucket_time: DateTime<Utc>) -> String {
        let format = match self {
            TrendScale::OneMinute => "%H:%M:%S",
            TrendScale::ThirtyMinutes | TrendScale::OneHour => "%H:%M",
            TrendScale::OneDay => "%m-%d %H",
            TrendScale::SevenDays => "%Y-%m-%d",
        };
        bucket_time.format(format).to_string()
    }
}

impl std::str::FromStr for TrendScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1min" => Ok(TrendScale::OneMinute),
            "30min" => Ok(TrendScale::ThirtyMinutes),
            "1h" => Ok(TrendScale::OneHour),
            "1day" => Ok(TrendScale::OneDay),
            "7day" => Ok(TrendScale::SevenDays),
            other => Err(format!("unknown time scale: {other}")),
        }
    }
}

/// One downsampled series: parallel arrays of rendered bucket times and
/// bucket means.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrendSeries {
    pub times: Vec<String>,
    pub values: Vec<f64>,
}

/// `scale label → parameter → series`, always containing every scale and
/// every parameter (empty series when the window holds no samples).
pub type TrendEnvelope = HashMap<String, HashMap<String, TrendSeries>>;

/// Produce the full five-scale envelope from the store.
pub async fn collect_trends(
    store: &dyn StorageBackend,
    now: DateTime<Utc>,
) -> StorageResult<TrendEnvelope> {
    let mut envelope = TrendEnvelope::new();

    for scale in TrendScale::ALL {
        let since = now - scale.window();
        let mut per_parameter = HashMap::new();

        for parameter in VitalParameter::TRENDED {
            let points = store
                .bucketed_means(parameter, since, scale.bucket_seconds())
                .await?;

            let mut series = TrendSeries {
                times: Vec::with_capacity(points.len()),
                values: Vec::with_capacity(points.len()),
            };
            for point in points {
                series.times.push(scale.format_bucket(point.bucket_time));
                series.values.push(round2(point.mean));
            }
            per_parameter.insert(parameter.as_str().to_string(), series);
        }

        envelope.insert(scale.label().to_string(), per_parameter);
    }

    debug!("trend envelope computed for {} scales", TrendScale::ALL.len());
    Ok(envelope)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
