//! Bounded, durable per-endpoint sample history.
//!
//! Only `healthy`, `degrading`, `down` and `error` samples are kept. Appending a
//! transient state is accepted and ignored.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::database::Database;
use crate::monitoring::types::CheckSample;

/// Maximum persisted samples per endpoint
pub const MAX_SAMPLES_PER_ENDPOINT: usize = 200;

#[async_trait]
pub trait SampleStore: Send + Sync {
    /// History for an endpoint, in insertion order
    async fn load_samples(&self, endpoint_id: &str) -> Result<Vec<CheckSample>>;

    /// Append one sample, evicting the oldest beyond capacity, and return the updated history
    async fn append_sample(&self, endpoint_id: &str, sample: CheckSample) -> Result<Vec<CheckSample>>;

    async fn clear_all_samples(&self) -> Result<()>;
}

/// Sample store persisted in the service database
pub struct PersistentSampleStore {
    database: Arc<dyn Database>,
    capacity: usize,
}

impl PersistentSampleStore {
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self::with_capacity(database, MAX_SAMPLES_PER_ENDPOINT)
    }

    pub fn with_capacity(database: Arc<dyn Database>, capacity: usize) -> Self {
        Self { database, capacity }
    }
}

#[async_trait]
impl SampleStore for PersistentSampleStore {
    async fn load_samples(&self, endpoint_id: &str) -> Result<Vec<CheckSample>> {
        self.database.load_samples(endpoint_id).await
    }

    async fn append_sample(&self, endpoint_id: &str, sample: CheckSample) -> Result<Vec<CheckSample>> {
        if !sample.state.is_persistable() {
            return self.load_samples(endpoint_id).await;
        }
        self.database.append_sample(endpoint_id, &sample, self.capacity).await
    }

    async fn clear_all_samples(&self) -> Result<()> {
        self.database.clear_samples().await
    }
}

/// Process-local sample store, for tests and ephemeral runs
pub struct MemorySampleStore {
    storage: Mutex<HashMap<String, Vec<CheckSample>>>,
    capacity: usize,
}

impl MemorySampleStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_SAMPLES_PER_ENDPOINT)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { storage: Mutex::new(HashMap::new()), capacity }
    }
}

impl Default for MemorySampleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SampleStore for MemorySampleStore {
    async fn load_samples(&self, endpoint_id: &str) -> Result<Vec<CheckSample>> {
        Ok(self.storage.lock().await.get(endpoint_id).cloned().unwrap_or_default())
    }

    async fn append_sample(&self, endpoint_id: &str, sample: CheckSample) -> Result<Vec<CheckSample>> {
        let mut storage = self.storage.lock().await;
        let history = storage.entry(endpoint_id.to_string()).or_default();

        if sample.state.is_persistable() {
            history.push(sample);
            if history.len() > self.capacity {
                let excess = history.len() - self.capacity;
                history.drain(..excess);
            }
        }

        Ok(history.clone())
    }

    async fn clear_all_samples(&self) -> Result<()> {
        self.storage.lock().await.clear();
        Ok(())
    }
}
