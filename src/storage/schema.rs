//! Database schema
//!
//! Two tables:
//!
//! - `vitals`: one row per enriched sample, keyed by `time`. Organized as a
//!   TimescaleDB hypertable so the bucketed trend queries stay cheap as the
//!   table grows. Every numeric parameter is its own `double precision`
//!   column; the set of valid column names is closed over
//!   [`crate::VitalParameter`], which is what lets the trend query
//!   interpolate a column identifier safely.
//! - `alerts`: append-only anomaly log with the full decision context
//!   (range, deviation, severity, strategy) so history queries need no
//!   joins.
//!
//! The schema is created imperatively at startup rather than through
//! migrations: the hypertable conversion has to tolerate re-runs and
//! pre-converted tables, which `IF NOT EXISTS` DDL expresses directly.

/// Vitals table, one column per parameter.
pub const CREATE_VITALS: &str = r#"
    CREATE TABLE IF NOT EXISTS vitals (
        time TIMESTAMPTZ NOT NULL,
        user_id TEXT NOT NULL DEFAULT 'default',
        activity DOUBLE PRECISION,
        heart_rate DOUBLE PRECISION,
        blood_pressure_systolic DOUBLE PRECISION,
        blood_pressure_diastolic DOUBLE PRECISION,
        temperature DOUBLE PRECISION,
        oxygen_saturation DOUBLE PRECISION
    )
"#;

/// Convert `vitals` into a hypertable partitioned on `time`.
///
/// Fails when the table already is one; the caller treats that as success.
pub const CREATE_HYPERTABLE: &str =
    "SELECT create_hypertable('vitals', 'time', if_not_exists => TRUE)";

/// Append-only alert log.
pub const CREATE_ALERTS: &str = r#"
    CREATE TABLE IF NOT EXISTS alerts (
        id BIGSERIAL PRIMARY KEY,
        time TIMESTAMPTZ NOT NULL,
        user_id TEXT NOT NULL DEFAULT 'default',
        parameter TEXT NOT NULL,
        value DOUBLE PRECISION NOT NULL,
        activity_level TEXT NOT NULL,
        normal_low DOUBLE PRECISION NOT NULL,
        normal_high DOUBLE PRECISION NOT NULL,
        deviation_percent DOUBLE PRECISION NOT NULL,
        severity TEXT NOT NULL,
        detector_type TEXT NOT NULL
    )
"#;
