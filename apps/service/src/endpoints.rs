//! Endpoint catalog: the ordered list of monitored endpoints.
//!
//! The persisted list wins; when it is empty the seed list from the config
//! file is used. Either way ids are normalised and any correction is persisted.

use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::database::Database;
use crate::monitoring::types::EndpointConfig;

pub struct EndpointCatalog {
    database: Arc<dyn Database>,
    seed: Vec<EndpointConfig>,
}

impl EndpointCatalog {
    pub fn new(database: Arc<dyn Database>, seed: Vec<EndpointConfig>) -> Self {
        Self { database, seed }
    }

    pub async fn load(&self) -> Result<Vec<EndpointConfig>> {
        let saved = self.database.load_endpoints().await?;

        if !saved.is_empty() {
            let normalized = normalize_ids(&saved);
            if normalized != saved {
                info!("Regenerated malformed or duplicate endpoint ids");
                self.database.replace_endpoints(&normalized).await?;
            }
            return Ok(normalized);
        }

        if self.seed.is_empty() {
            return Ok(Vec::new());
        }

        let normalized = normalize_ids(&self.seed);
        self.database.replace_endpoints(&normalized).await?;
        info!("Seeded endpoint catalog with {} endpoints", normalized.len());
        Ok(normalized)
    }

    pub async fn save(&self, endpoints: &[EndpointConfig]) -> Result<Vec<EndpointConfig>> {
        let normalized = normalize_ids(endpoints);
        self.database.replace_endpoints(&normalized).await?;
        Ok(normalized)
    }

    /// Forget the persisted list and start again from the seed
    pub async fn reset_to_seed(&self) -> Result<Vec<EndpointConfig>> {
        self.database.replace_endpoints(&[]).await?;
        self.load().await
    }

    pub async fn add(&self, name: &str, url: &str) -> Result<EndpointConfig> {
        let mut endpoints = self.load().await?;
        let endpoint = EndpointConfig::new(name.trim(), url.trim());
        endpoints.push(endpoint.clone());
        self.save(&endpoints).await?;
        Ok(endpoint)
    }

    /// Returns the removed endpoint, if `id` was present
    pub async fn remove(&self, id: &str) -> Result<Option<EndpointConfig>> {
        let mut endpoints = self.load().await?;
        let Some(index) = endpoints.iter().position(|endpoint| endpoint.id == id) else {
            return Ok(None);
        };
        let removed = endpoints.remove(index);
        self.save(&endpoints).await?;
        Ok(Some(removed))
    }
}

/// Keep each trimmed id that is a UUID not seen earlier in the list; regenerate the rest
pub fn normalize_ids(endpoints: &[EndpointConfig]) -> Vec<EndpointConfig> {
    let mut seen: HashSet<String> = HashSet::new();

    endpoints
        .iter()
        .map(|endpoint| {
            let trimmed = endpoint.id.trim();
            let id = if Uuid::parse_str(trimmed).is_ok() && !seen.contains(trimmed) {
                trimmed.to_string()
            } else {
                Uuid::new_v4().to_string()
            };
            seen.insert(id.clone());
            EndpointConfig { id, ..endpoint.clone() }
        })
        .collect()
}
