//! Daily digest: a bounded text report over the last 24 hours, handed to a
//! summarizer and cached for the rest of the calendar day.

pub mod correlation;
pub mod report;

pub use report::build_report;

use anyhow::Result;
use chrono::{Local, TimeZone};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::database::Database;
use crate::database::models::DigestRecord;
use crate::monitoring::types::EndpointStatus;

/// Turns the structured digest input into the text shown to the user
#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    /// `None` when the summarizer has nothing to say
    async fn summarize(&self, input: &str) -> Result<Option<String>>;
}

/// Passes the structured report through unchanged
pub struct ReportSummarizer;

#[async_trait::async_trait]
impl Summarizer for ReportSummarizer {
    async fn summarize(&self, input: &str) -> Result<Option<String>> {
        Ok(Some(input.to_string()))
    }
}

pub struct DigestService {
    database: Arc<dyn Database>,
    summarizer: Arc<dyn Summarizer>,
    clock: Arc<dyn Clock>,
}

impl DigestService {
    pub fn new(database: Arc<dyn Database>, summarizer: Arc<dyn Summarizer>, clock: Arc<dyn Clock>) -> Self {
        Self { database, summarizer, clock }
    }

    /// Today's digest in local time, reusing the cached one unless `force` is set
    pub async fn daily_digest(&self, statuses: &[EndpointStatus], force: bool) -> Result<Option<String>> {
        self.daily_digest_in(statuses, force, &Local).await
    }

    /// Same as [`Self::daily_digest`], with calendar days taken in `tz`
    pub async fn daily_digest_in<Tz>(
        &self,
        statuses: &[EndpointStatus],
        force: bool,
        tz: &Tz,
    ) -> Result<Option<String>>
    where
        Tz: TimeZone + Sync,
        Tz::Offset: Display,
    {
        let now = self.clock.now();

        if !force {
            match self.database.load_digest().await {
                Ok(Some(cached)) if cached.is_fresh_at(now, tz) => {
                    debug!("Using cached digest from {}", cached.generated_at);
                    return Ok(Some(cached.text));
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to load cached digest: {}", e),
            }
        }

        let Some(input) = build_report(statuses, now, tz) else {
            return Ok(None);
        };

        let text = match self.summarizer.summarize(&input).await? {
            Some(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => return Ok(None),
        };

        let record = DigestRecord { text: text.clone(), generated_at: now };
        if let Err(e) = self.database.save_digest(&record).await {
            warn!("Failed to cache digest: {}", e);
        }

        info!("Generated digest for {} endpoints", statuses.len());
        Ok(Some(text))
    }
}
