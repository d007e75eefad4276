use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::fmt::Display;

use super::correlation::correlated_outage_lines;
use crate::monitoring::types::{CheckSample, EndpointStatus};

/// Trailing window every digest statistic covers
pub const DIGEST_WINDOW_HOURS: i64 = 24;

/// Endpoints listed individually before the rest are only counted
pub const MAX_ENDPOINT_LINES: usize = 20;

const TREND_MIN_POINTS: usize = 6;
const TREND_SPAN: usize = 3;
const TREND_THRESHOLD: f64 = 0.15;

const NO_CORRELATION_LINE: &str = "No correlated multi-service outages detected in the last 24h.";

const SUMMARY_INSTRUCTIONS: &str = "Write a 2-3 sentence plain English summary of overall infrastructure health.\n\
Highlight concerning patterns and likely shared-cause incidents when applicable.\n\
Keep it concise and actionable.";

/// Build the line-oriented digest input over the trailing 24 hours.
///
/// Correlation times are rendered in `tz`. `None` when there are no endpoints.
pub fn build_report<Tz>(statuses: &[EndpointStatus], now: DateTime<Utc>, tz: &Tz) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if statuses.is_empty() {
        return None;
    }

    let window_start = now - TimeDelta::hours(DIGEST_WINDOW_HOURS);
    let lines: Vec<String> = statuses.iter().map(|status| endpoint_line(status, window_start)).collect();

    let hidden = lines.len().saturating_sub(MAX_ENDPOINT_LINES);
    let mut header = "Daily infrastructure health summary input:".to_string();
    if hidden > 0 {
        header.push_str(&format!(
            " (showing {} of {} services; {} summarized separately)",
            MAX_ENDPOINT_LINES,
            lines.len(),
            hidden
        ));
    }

    let hidden_summary = if hidden > 0 {
        format!("Additional services not listed individually: {}", hidden)
    } else {
        "No additional hidden services.".to_string()
    };

    let correlations = correlated_outage_lines(statuses, window_start, tz);
    let correlation_section = if correlations.is_empty() {
        NO_CORRELATION_LINE.to_string()
    } else {
        correlations.join("\n")
    };

    let listed = &lines[..lines.len().min(MAX_ENDPOINT_LINES)];

    Some(format!(
        "{}\n{}\n{}\n\nCorrelated failures (within 5-minute windows):\n{}\n\n{}",
        header,
        listed.join("\n"),
        hidden_summary,
        correlation_section,
        SUMMARY_INSTRUCTIONS
    ))
}

/// Samples at or after `window_start`, oldest first
pub(crate) fn samples_in_window(status: &EndpointStatus, window_start: DateTime<Utc>) -> Vec<&CheckSample> {
    let mut recent: Vec<&CheckSample> = status.samples.iter().filter(|s| s.at >= window_start).collect();
    recent.sort_by_key(|s| s.at);
    recent
}

/// Timestamps where a run of consecutive `down`/`error` samples starts
pub(crate) fn outage_starts(samples: &[&CheckSample]) -> Vec<DateTime<Utc>> {
    let mut starts = Vec::new();
    let mut previously_failing = false;

    for sample in samples {
        let failing = sample.state.is_failure();
        if failing && !previously_failing {
            starts.push(sample.at);
        }
        previously_failing = failing;
    }

    starts
}

fn endpoint_line(status: &EndpointStatus, window_start: DateTime<Utc>) -> String {
    let recent = samples_in_window(status, window_start);
    let latencies: Vec<u64> = recent.iter().filter_map(|s| s.latency_ms).collect();

    let avg_latency = if latencies.is_empty() {
        "n/a".to_string()
    } else {
        let mean = latencies.iter().sum::<u64>() as f64 / latencies.len() as f64;
        format!("{}ms", mean.round() as u64)
    };

    let latest_latency = latencies.last().map(|ms| format!("{}ms", ms)).unwrap_or_else(|| "n/a".to_string());

    format!(
        "- {} | status: {} | avg latency (24h): {} | latest latency: {} | trend: {} | outages (24h): {}",
        status.name,
        status.state,
        avg_latency,
        latest_latency,
        latency_trend(&latencies),
        outage_starts(&recent).len()
    )
}

/// Compare the mean of the last three latencies with the three before them
fn latency_trend(latencies: &[u64]) -> String {
    if latencies.len() < TREND_MIN_POINTS {
        return "insufficient data".to_string();
    }

    let mean = |values: &[u64]| values.iter().sum::<u64>() as f64 / values.len() as f64;
    let split = latencies.len() - TREND_SPAN;
    let latest = mean(&latencies[split..]);
    let previous = mean(&latencies[split - TREND_SPAN..split]);

    if previous <= 0.0 {
        return "stable".to_string();
    }

    let ratio = (latest - previous) / previous;
    let percent = (ratio * 100.0).round() as i64;

    if ratio >= TREND_THRESHOLD {
        format!("increasing (+{}%)", percent)
    } else if ratio <= -TREND_THRESHOLD {
        format!("decreasing ({}%)", percent)
    } else {
        format!("stable ({}%)", percent)
    }
}
