//! TimescaleDB (Postgres) storage backend
//!
//! ## Features
//!
//! - **Connection pooling**: fixed pool of 8 with health checks
//! - **Hypertable**: `vitals` is converted on startup so time_bucket
//!   aggregations stay efficient
//! - **Statement timeout**: 5 s per statement, set on every pooled
//!   connection
//!
//! ## Failure model
//!
//! Inserts run on the ingestion path and must never stall it: callers log
//! and drop errors. Queries surface errors to the API layer.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Row};
use tracing::{debug, info, instrument};

use super::backend::{StorageBackend, TrendPoint};
use super::error::{StorageError, StorageResult};
use super::schema;
use crate::config::DbConfig;
use crate::{Alert, EnrichedSample, VitalParameter};

/// Pool size; matches the number of ingestion workers plus API headroom.
const POOL_SIZE: u32 = 8;

/// Per-statement timeout, enforced server-side.
const STATEMENT_TIMEOUT_MS: u64 = 5_000;

pub struct TimescaleBackend {
    pool: PgPool,
}

impl TimescaleBackend {
    /// Connect to the database and ensure the schema exists.
    ///
    /// The hypertable conversion is attempted every startup; a table that
    /// already is a hypertable is not an error.
    #[instrument(skip_all, fields(host = %config.host, db = %config.name))]
    pub async fn connect(config: &DbConfig) -> StorageResult<Self> {
        info!(
            "connecting to database {} at {}:{}",
            config.name, config.host, config.port
        );

        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user)
            .password(&config.password)
            .options([("statement_timeout", STATEMENT_TIMEOUT_MS.to_string().as_str())]);

        let pool = PgPoolOptions::new()
            .max_connections(POOL_SIZE)
            .acquire_timeout(Duration::from_secs(5))
            .test_before_acquire(true)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        let backend = Self { pool };
        backend.ensure_schema().await?;

        info!("database ready");
        Ok(backend)
    }

    async fn ensure_schema(&self) -> StorageResult<()> {
        debug!("ensuring database schema");

        sqlx::query(schema::CREATE_VITALS)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::SchemaFailed(e.to_string()))?;

        match sqlx::query(schema::CREATE_HYPERTABLE)
            .execute(&self.pool)
            .await
        {
            Ok(_) => debug!("vitals hypertable ensured"),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("already a hypertable") || msg.contains("already exists") {
                    debug!("vitals is already a hypertable");
                } else {
                    return Err(StorageError::SchemaFailed(msg));
                }
            }
        }

        sqlx::query(schema::CREATE_ALERTS)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::SchemaFailed(e.to_string()))?;

        Ok(())
    }

    fn alert_from_row(row: &sqlx::postgres::PgRow) -> StorageResult<Alert> {
        let parse = |column: &str, raw: String| {
            StorageError::DecodeError(format!("column {column}: unexpected value {raw:?}"))
        };

        let parameter: String = row.try_get("parameter")?;
        let activity_level: String = row.try_get("activity_level")?;
        let severity: String = row.try_get("severity")?;
        let detector_type: String = row.try_get("detector_type")?;

        Ok(Alert {
            id: row.try_get("id")?,
            timestamp: row.try_get("time")?,
            user_id: row.try_get("user_id")?,
            parameter: parameter
                .parse()
                .map_err(|_| parse("parameter", parameter.clone()))?,
            value: row.try_get("value")?,
            activity_level: activity_level
                .parse()
                .map_err(|_| parse("activity_level", activity_level.clone()))?,
            normal_range: [row.try_get("normal_low")?, row.try_get("normal_high")?],
            deviation_percent: row.try_get("deviation_percent")?,
            severity: severity
                .parse()
                .map_err(|_| parse("severity", severity.clone()))?,
            detector_type: detector_type
                .parse()
                .map_err(|_| parse("detector_type", detector_type.clone()))?,
        })
    }
}

#[async_trait]
impl StorageBackend for TimescaleBackend {
    #[instrument(skip(self, sample), fields(user_id = %sample.sample.user_id))]
    async fn insert_vitals(&self, sample: &EnrichedSample) -> StorageResult<()> {
        let s = &sample.sample;

        sqlx::query(
            r#"
            INSERT INTO vitals (
                time, user_id, activity, heart_rate, blood_pressure_systolic,
                blood_pressure_diastolic, temperature, oxygen_saturation
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(s.timestamp)
        .bind(&s.user_id)
        .bind(s.activity)
        .bind(s.heart_rate)
        .bind(s.blood_pressure_systolic)
        .bind(s.blood_pressure_diastolic)
        .bind(s.temperature)
        .bind(s.oxygen_saturation)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self, alert), fields(parameter = %alert.parameter))]
    async fn insert_alert(&self, alert: &Alert) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO alerts (
                time, user_id, parameter, value, activity_level,
                normal_low, normal_high, deviation_percent, severity, detector_type
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(alert.timestamp)
        .bind(&alert.user_id)
        .bind(alert.parameter.as_str())
        .bind(alert.value)
        .bind(alert.activity_level.as_str())
        .bind(alert.normal_range[0])
        .bind(alert.normal_range[1])
        .bind(alert.deviation_percent)
        .bind(alert.severity.as_str())
        .bind(alert.detector_type.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(parameter = %parameter))]
    async fn bucketed_means(
        &self,
        parameter: VitalParameter,
        since: DateTime<Utc>,
        bucket_seconds: i64,
    ) -> StorageResult<Vec<TrendPoint>> {
        // The column identifier comes from the closed VitalParameter enum,
        // never from request input.
        let column = parameter.as_str();
        let sql = format!(
            r#"
            SELECT time_bucket($1::interval, time) AS bucket_time,
                   AVG({column}) AS mean_value
            FROM vitals
            WHERE {column} IS NOT NULL AND time >= $2
            GROUP BY bucket_time
            ORDER BY bucket_time ASC
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(format!("{bucket_seconds} seconds"))
            .bind(since)
            .fetch_all(&self.pool)
            .await?;

        let mut points = Vec::with_capacity(rows.len());
        for row in rows {
            points.push(TrendPoint {
                bucket_time: row.try_get("bucket_time")?,
                mean: row.try_get("mean_value")?,
            });
        }

        debug!("bucketed query returned {} points", points.len());
        Ok(points)
    }

    #[instrument(skip(self))]
    async fn alert_history(&self, user_id: &str, limit: usize) -> StorageResult<Vec<Alert>> {
        let rows = sqlx::query(
            r#"
            SELECT id, time, user_id, parameter, value, activity_level,
                   normal_low, normal_high, deviation_percent, severity, detector_type
            FROM alerts
            WHERE user_id = $1
            ORDER BY time DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::alert_from_row).collect()
    }

    async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing database pool");
        self.pool.close().await;
        Ok(())
    }
}
