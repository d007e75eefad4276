use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use super::report::{outage_starts, samples_in_window};
use crate::monitoring::types::EndpointStatus;

/// Width of a correlation bucket
pub const BUCKET_SECONDS: i64 = 300;

/// Endpoints whose outages began in the same 5-minute bucket.
///
/// Only buckets shared by at least two endpoints are reported, oldest first,
/// with names sorted alphabetically. Bucket start times are shown in `tz`.
pub fn correlated_outage_lines<Tz>(statuses: &[EndpointStatus], window_start: DateTime<Utc>, tz: &Tz) -> Vec<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut buckets: BTreeMap<i64, BTreeSet<&str>> = BTreeMap::new();

    for status in statuses {
        let recent = samples_in_window(status, window_start);
        for started_at in outage_starts(&recent) {
            let bucket = started_at.timestamp().div_euclid(BUCKET_SECONDS);
            buckets.entry(bucket).or_default().insert(status.name.as_str());
        }
    }

    buckets
        .into_iter()
        .filter(|(_, names)| names.len() >= 2)
        .filter_map(|(bucket, names)| {
            let at = DateTime::from_timestamp(bucket * BUCKET_SECONDS, 0)?.with_timezone(tz);
            Some(format!(
                "- {} services down around {}: {}",
                names.len(),
                at.format("%H:%M"),
                names.into_iter().collect::<Vec<_>>().join(", ")
            ))
        })
        .collect()
}
