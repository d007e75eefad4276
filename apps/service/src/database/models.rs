use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::monitoring::types::{CheckSample, HealthState};

/// Convert a timestamp to Unix milliseconds
pub fn datetime_to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// Convert Unix milliseconds to a timestamp
pub fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Convert a timestamp to fractional seconds since the epoch
pub fn datetime_to_seconds(time: DateTime<Utc>) -> f64 {
    time.timestamp_millis() as f64 / 1000.0
}

/// Convert fractional seconds since the epoch to a timestamp
pub fn seconds_to_datetime(seconds: f64) -> DateTime<Utc> {
    millis_to_datetime((seconds * 1000.0).round() as i64)
}

/// Sample row as persisted in the `samples` table
#[derive(Debug, Clone)]
pub struct SampleRow {
    pub endpoint_id: String,
    pub at_ms: i64,
    pub state: String,
    pub status_code: Option<i64>,
    pub latency_ms: Option<i64>,
    pub message: Option<String>,
    pub simulated: i64,
}

impl SampleRow {
    pub fn from_sample(endpoint_id: &str, sample: &CheckSample) -> Self {
        Self {
            endpoint_id: endpoint_id.to_string(),
            at_ms: datetime_to_millis(sample.at),
            state: sample.state.to_string(),
            status_code: sample.status_code.map(i64::from),
            latency_ms: sample.latency_ms.map(|v| i64::try_from(v).unwrap_or(i64::MAX)),
            message: sample.message.clone(),
            simulated: i64::from(sample.simulated),
        }
    }

    pub fn into_sample(self) -> anyhow::Result<CheckSample> {
        Ok(CheckSample {
            at: millis_to_datetime(self.at_ms),
            state: self.state.parse::<HealthState>()?,
            status_code: self.status_code.map(u16::try_from).transpose()?,
            latency_ms: self.latency_ms.map(u64::try_from).transpose()?,
            message: self.message,
            simulated: self.simulated != 0,
        })
    }
}

/// Last generated digest text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestRecord {
    pub text: String,
    pub generated_at: DateTime<Utc>,
}

impl DigestRecord {
    /// A digest stays fresh for the rest of the calendar day it was generated on,
    /// as seen in `tz`.
    pub fn is_fresh_at<Tz: TimeZone>(&self, now: DateTime<Utc>, tz: &Tz) -> bool {
        self.generated_at.with_timezone(tz).date_naive() == now.with_timezone(tz).date_naive()
    }
}
