use serde::Serialize;

use crate::monitoring::types::{EndpointStatus, HealthState};

/// Per-state counts across the working set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthSummary {
    pub total: usize,
    pub healthy: usize,
    pub degrading: usize,
    pub down: usize,
    pub error: usize,
    pub checking: usize,
}

impl HealthSummary {
    pub fn from_statuses(statuses: &[EndpointStatus]) -> Self {
        let count = |state: HealthState| statuses.iter().filter(|s| s.state == state).count();
        Self {
            total: statuses.len(),
            healthy: count(HealthState::Healthy),
            degrading: count(HealthState::Degrading),
            down: count(HealthState::Down),
            error: count(HealthState::Error),
            checking: count(HealthState::Checking),
        }
    }
}

/// One-line result of a check-all pass, listing failing hosts
pub fn check_all_summary(statuses: &[EndpointStatus]) -> String {
    let summary = HealthSummary::from_statuses(statuses);
    let issues: Vec<&str> = statuses
        .iter()
        .filter(|s| s.state.is_failure())
        .map(EndpointStatus::display_name)
        .collect();

    if issues.is_empty() && summary.degrading == 0 {
        return format!("{} services checked. {} healthy, 0 down.", summary.total, summary.healthy);
    }

    if issues.is_empty() {
        return format!(
            "{} services checked. {} healthy, {} degrading.",
            summary.total, summary.healthy, summary.degrading
        );
    }

    format!(
        "{} services checked. {} healthy, {} degrading, {} down: {}",
        summary.total,
        summary.healthy,
        summary.degrading,
        issues.len(),
        issues.join(", ")
    )
}

/// `name: state (message)`
pub fn single_endpoint_summary(status: &EndpointStatus) -> String {
    match status.message.as_deref().filter(|m| !m.is_empty()) {
        Some(message) => format!("{}: {} ({})", status.name, status.state, message),
        None => format!("{}: {}", status.name, status.state),
    }
}

/// Best match for a free-text query.
///
/// Tried in order: exact name, exact host, partial name, partial host.
pub fn find_endpoint<'a>(query: &str, statuses: &'a [EndpointStatus]) -> Option<&'a EndpointStatus> {
    let needle = normalize_query(query);
    if needle.is_empty() {
        return None;
    }

    let name = |s: &EndpointStatus| normalize_query(&s.name);
    let host = |s: &EndpointStatus| {
        normalize_query(s.endpoint.as_ref().and_then(|url| url.host_str()).unwrap_or_default())
    };

    statuses
        .iter()
        .find(|s| name(s) == needle)
        .or_else(|| statuses.iter().find(|s| host(s) == needle))
        .or_else(|| statuses.iter().find(|s| name(s).contains(&needle)))
        .or_else(|| statuses.iter().find(|s| host(s).contains(&needle)))
}

/// Lower-case and collapse every run of non-alphanumerics to one space
fn normalize_query(raw: &str) -> String {
    let mut normalized = String::with_capacity(raw.len());
    let mut pending_gap = false;

    for c in raw.to_lowercase().chars() {
        if c.is_alphanumeric() {
            if pending_gap && !normalized.is_empty() {
                normalized.push(' ');
            }
            pending_gap = false;
            normalized.push(c);
        } else {
            pending_gap = true;
        }
    }

    normalized
}
