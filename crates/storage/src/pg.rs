use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eyre::{Result, WrapErr};
use models::{AlertRecipient, CheckResult, Incident, Monitor};
use serde::de::DeserializeOwned;
use sqlx::{
    Row,
    postgres::{PgPool, PgPoolOptions, PgRow},
};
use uuid::Uuid;

use crate::Store;

/// Postgres-backed [`Store`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .wrap_err("connecting to postgres")?;
        Ok(Self { pool })
    }

    /// Run the embedded migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await.wrap_err("running migrations")?;
        Ok(())
    }

    /// Cheap connectivity probe for health endpoints.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn enum_from_label<T: DeserializeOwned>(label: String) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(label)).map_err(Into::into)
}

fn monitor_from_row(row: &PgRow) -> Result<Monitor> {
    let codes: serde_json::Value = row.try_get("expected_status_codes")?;
    let headers: Option<serde_json::Value> = row.try_get("headers")?;

    Ok(Monitor {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        url: row.try_get("url")?,
        method: enum_from_label(row.try_get::<String, _>("method")?)?,
        expected_status_codes: serde_json::from_value(codes)?,
        timeout: row.try_get::<i32, _>("timeout")?.max(0) as u64,
        interval: row.try_get::<i32, _>("interval")?.max(0) as u32,
        retries: row.try_get::<i32, _>("retries")?.max(0) as u32,
        headers: headers.map(serde_json::from_value).transpose()?,
        body: row.try_get("body")?,
        slug: row.try_get("slug")?,
        is_active: row.try_get("is_active")?,
        is_deleted: row.try_get("is_deleted")?,
        current_status: enum_from_label(row.try_get::<String, _>("current_status")?)?,
        last_checked_at: row.try_get("last_checked_at")?,
        last_incident_at: row.try_get("last_incident_at")?,
    })
}

fn incident_from_row(row: &PgRow) -> Result<Incident> {
    Ok(Incident {
        id: row.try_get("id")?,
        monitor_id: row.try_get("monitor_id")?,
        status: enum_from_label(row.try_get::<String, _>("status")?)?,
        started_at: row.try_get("started_at")?,
        resolved_at: row.try_get("resolved_at")?,
        duration_seconds: row.try_get("duration_seconds")?,
        error_message: row.try_get("error_message")?,
        last_notified_at: row.try_get("last_notified_at")?,
    })
}

const MONITOR_COLUMNS: &str = "id, name, url, method, expected_status_codes, timeout, \
     \"interval\", retries, headers, body, slug, is_active, is_deleted, current_status, \
     last_checked_at, last_incident_at";

const INCIDENT_COLUMNS: &str = "id, monitor_id, status, started_at, resolved_at, \
     duration_seconds, error_message, last_notified_at";

#[async_trait]
impl Store for PgStore {
    async fn active_monitors(&self) -> Result<Vec<Monitor>> {
        let rows = sqlx::query(&format!(
            "SELECT {MONITOR_COLUMNS} FROM monitors WHERE is_active AND NOT is_deleted"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(monitor_from_row).collect()
    }

    async fn monitor(&self, id: &str) -> Result<Option<Monitor>> {
        let row = sqlx::query(&format!("SELECT {MONITOR_COLUMNS} FROM monitors WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(monitor_from_row).transpose()
    }

    async fn mark_scheduled(&self, monitor_ids: &[String], at: DateTime<Utc>) -> Result<()> {
        if monitor_ids.is_empty() {
            return Ok(());
        }
        sqlx::query("UPDATE monitors SET last_checked_at = $2, updated_at = $2 WHERE id = ANY($1)")
            .bind(monitor_ids)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_check_result(&self, result: &CheckResult) -> Result<()> {
        sqlx::query(
            "INSERT INTO monitor_results \
             (id, monitor_id, region, status, response_time_ms, status_code, error_message, checked_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&result.monitor_id)
        .bind(result.region.as_str())
        .bind(result.status.as_str())
        .bind(result.response_time_ms.map(|ms| ms as i64))
        .bind(result.status_code.map(i32::from))
        .bind(&result.error_message)
        .bind(result.checked_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn apply_result_to_monitor(&self, result: &CheckResult) -> Result<()> {
        sqlx::query(
            "UPDATE monitors SET \
             current_status = $2, \
             last_checked_at = $3, \
             last_incident_at = CASE WHEN $4 THEN $3 ELSE last_incident_at END, \
             updated_at = now() \
             WHERE id = $1",
        )
        .bind(&result.monitor_id)
        .bind(result.status.as_str())
        .bind(result.checked_at)
        .bind(result.is_down())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn open_incident_for(&self, monitor_id: &str) -> Result<Option<Incident>> {
        let row = sqlx::query(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE monitor_id = $1 AND status = 'OPEN'"
        ))
        .bind(monitor_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(incident_from_row).transpose()
    }

    async fn create_incident(
        &self,
        monitor_id: &str,
        started_at: DateTime<Utc>,
        error_message: Option<&str>,
    ) -> Result<Option<Incident>> {
        // The partial unique index turns a concurrent second insert into a
        // no-op; the caller treats None as "lost the race".
        let row = sqlx::query(&format!(
            "INSERT INTO incidents (id, monitor_id, status, started_at, error_message) \
             VALUES ($1, $2, 'OPEN', $3, $4) \
             ON CONFLICT (monitor_id) WHERE status = 'OPEN' DO NOTHING \
             RETURNING {INCIDENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(monitor_id)
        .bind(started_at)
        .bind(error_message)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(incident_from_row).transpose()
    }

    async fn refresh_incident_message(
        &self,
        incident_id: &str,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE incidents SET error_message = $2, updated_at = now() WHERE id = $1",
        )
        .bind(incident_id)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn resolve_incident(
        &self,
        incident_id: &str,
        resolved_at: DateTime<Utc>,
    ) -> Result<Incident> {
        let row = sqlx::query(&format!(
            "UPDATE incidents SET \
             status = 'RESOLVED', \
             resolved_at = $2, \
             duration_seconds = EXTRACT(EPOCH FROM ($2 - started_at))::BIGINT, \
             updated_at = $2 \
             WHERE id = $1 \
             RETURNING {INCIDENT_COLUMNS}"
        ))
        .bind(incident_id)
        .bind(resolved_at)
        .fetch_one(&self.pool)
        .await?;
        incident_from_row(&row)
    }

    async fn incident(&self, id: &str) -> Result<Option<Incident>> {
        let row = sqlx::query(&format!("SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(incident_from_row).transpose()
    }

    async fn claim_incident_notification(
        &self,
        incident_id: &str,
        at: DateTime<Utc>,
        resend_after: DateTime<Utc>,
    ) -> Result<bool> {
        // Conditional update: of any number of concurrent claimants,
        // exactly one row update wins per throttle window.
        let outcome = sqlx::query(
            "UPDATE incidents SET last_notified_at = $2, updated_at = $2 \
             WHERE id = $1 AND (last_notified_at IS NULL OR last_notified_at < $3)",
        )
        .bind(incident_id)
        .bind(at)
        .bind(resend_after)
        .execute(&self.pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    async fn active_recipients(&self, monitor_id: &str) -> Result<Vec<AlertRecipient>> {
        let rows = sqlx::query(
            "SELECT id, monitor_id, email, is_active FROM alert_recipients \
             WHERE monitor_id = $1 AND is_active",
        )
        .bind(monitor_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                Ok(AlertRecipient {
                    id: row.try_get("id")?,
                    monitor_id: row.try_get("monitor_id")?,
                    email: row.try_get("email")?,
                    is_active: row.try_get("is_active")?,
                })
            })
            .collect()
    }

    async fn append_monitor_log(
        &self,
        monitor_id: &str,
        action: &str,
        details: serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO monitor_logs (id, monitor_id, action, details) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(monitor_id)
        .bind(action)
        .bind(details)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
