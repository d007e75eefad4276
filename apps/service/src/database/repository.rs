use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::params;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::models::{
    DigestRecord, SampleRow, datetime_to_millis, datetime_to_seconds, millis_to_datetime,
    seconds_to_datetime,
};
use crate::monitoring::types::{CheckSample, EndpointConfig};
use crate::pool::{LibsqlManager, LibsqlPool};

/// Durable state shared by the check cycle, the dispatcher and the digest
#[async_trait]
pub trait Database: Send + Sync {
    /// Persisted endpoint catalog, in display order
    async fn load_endpoints(&self) -> Result<Vec<EndpointConfig>>;

    /// Replace the whole endpoint catalog
    async fn replace_endpoints(&self, endpoints: &[EndpointConfig]) -> Result<()>;

    /// All persisted samples for an endpoint, oldest first
    async fn load_samples(&self, endpoint_id: &str) -> Result<Vec<CheckSample>>;

    /// Append a sample and trim the endpoint's history to `capacity`, oldest first.
    ///
    /// Insert and trim commit together. Returns the updated history.
    async fn append_sample(
        &self,
        endpoint_id: &str,
        sample: &CheckSample,
        capacity: usize,
    ) -> Result<Vec<CheckSample>>;

    /// Drop every persisted sample
    async fn clear_samples(&self) -> Result<()>;

    /// Cooldown key -> last time an alert with that key fired
    async fn load_cooldowns(&self) -> Result<HashMap<String, DateTime<Utc>>>;

    async fn save_cooldown(&self, key: &str, fired_at: DateTime<Utc>) -> Result<()>;

    async fn load_digest(&self) -> Result<Option<DigestRecord>>;

    async fn save_digest(&self, record: &DigestRecord) -> Result<()>;
}

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
    /// Writers queue here so history trimming and cooldown updates never interleave
    write_lock: Mutex<()>,
}

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool, write_lock: Mutex::new(()) }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }
}

async fn query_samples(conn: &libsql::Connection, endpoint_id: &str) -> Result<Vec<CheckSample>> {
    let stmt = conn
        .prepare("SELECT endpoint_id, at_ms, state, status_code, latency_ms, message, simulated FROM samples WHERE endpoint_id = ? ORDER BY seq ASC")
        .await?;

    let mut rows = stmt.query(params![endpoint_id]).await?;
    let mut samples = Vec::new();

    while let Some(row) = rows.next().await? {
        let sample_row = SampleRow {
            endpoint_id: row.get(0)?,
            at_ms: row.get(1)?,
            state: row.get(2)?,
            status_code: row.get::<Option<i64>>(3)?,
            latency_ms: row.get::<Option<i64>>(4)?,
            message: row.get::<Option<String>>(5)?,
            simulated: row.get(6)?,
        };
        samples.push(sample_row.into_sample()?);
    }

    Ok(samples)
}

#[async_trait]
impl Database for DatabaseImpl {
    async fn load_endpoints(&self) -> Result<Vec<EndpointConfig>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query("SELECT id, name, url FROM endpoints ORDER BY position ASC", ())
            .await?;

        let mut endpoints = Vec::new();
        while let Some(row) = rows.next().await? {
            endpoints.push(EndpointConfig { id: row.get(0)?, name: row.get(1)?, url: row.get(2)? });
        }

        Ok(endpoints)
    }

    async fn replace_endpoints(&self, endpoints: &[EndpointConfig]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let conn = self.get_conn().await?;
        let tx = conn.transaction().await?;

        tx.execute("DELETE FROM endpoints", ()).await?;
        for (position, endpoint) in endpoints.iter().enumerate() {
            tx.execute(
                "INSERT INTO endpoints (position, id, name, url) VALUES (?, ?, ?, ?)",
                params![
                    position as i64,
                    endpoint.id.clone(),
                    endpoint.name.clone(),
                    endpoint.url.clone()
                ],
            )
            .await
            .with_context(|| format!("Failed to persist endpoint {}", endpoint.id))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_samples(&self, endpoint_id: &str) -> Result<Vec<CheckSample>> {
        let conn = self.get_conn().await?;
        query_samples(&conn, endpoint_id).await
    }

    async fn append_sample(
        &self,
        endpoint_id: &str,
        sample: &CheckSample,
        capacity: usize,
    ) -> Result<Vec<CheckSample>> {
        let row = SampleRow::from_sample(endpoint_id, sample);
        let conn = self.get_conn().await?;

        {
            let _guard = self.write_lock.lock().await;
            let tx = conn.transaction().await?;

            tx.execute(
                "INSERT INTO samples (endpoint_id, at_ms, state, status_code, latency_ms, message, simulated) VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    row.endpoint_id,
                    row.at_ms,
                    row.state,
                    row.status_code,
                    row.latency_ms,
                    row.message,
                    row.simulated
                ],
            )
            .await?;

            tx.execute(
                "DELETE FROM samples WHERE endpoint_id = ?1 AND seq NOT IN (
                    SELECT seq FROM samples WHERE endpoint_id = ?1 ORDER BY seq DESC LIMIT ?2
                )",
                params![endpoint_id, capacity as i64],
            )
            .await?;

            tx.commit().await?;
        }

        query_samples(&conn, endpoint_id).await
    }

    async fn clear_samples(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let conn = self.get_conn().await?;
        conn.execute("DELETE FROM samples", ()).await?;
        Ok(())
    }

    async fn load_cooldowns(&self) -> Result<HashMap<String, DateTime<Utc>>> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query("SELECT key, last_fired FROM notification_cooldowns", ()).await?;

        let mut cooldowns = HashMap::new();
        while let Some(row) = rows.next().await? {
            let key: String = row.get(0)?;
            if key.is_empty() {
                continue;
            }
            cooldowns.insert(key, seconds_to_datetime(row.get::<f64>(1)?));
        }

        Ok(cooldowns)
    }

    async fn save_cooldown(&self, key: &str, fired_at: DateTime<Utc>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO notification_cooldowns (key, last_fired) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET last_fired = excluded.last_fired",
            params![key, datetime_to_seconds(fired_at)],
        )
        .await?;
        Ok(())
    }

    async fn load_digest(&self) -> Result<Option<DigestRecord>> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query("SELECT text, generated_at FROM digest_cache WHERE id = 1", ()).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(DigestRecord {
                text: row.get(0)?,
                generated_at: millis_to_datetime(row.get(1)?),
            }))
        } else {
            Ok(None)
        }
    }

    async fn save_digest(&self, record: &DigestRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO digest_cache (id, text, generated_at) VALUES (1, ?, ?)
             ON CONFLICT(id) DO UPDATE SET text = excluded.text, generated_at = excluded.generated_at",
            params![record.text.clone(), datetime_to_millis(record.generated_at)],
        )
        .await?;
        Ok(())
    }
}
