//! Alerting: outage grouping, cooldown-gated dispatch and delivery backends.

pub mod delivery;
pub mod dispatcher;
pub mod grouper;

pub use delivery::{LogNotifier, Notifier, WebhookNotifier};
pub use dispatcher::{DispatchOutcome, NotificationDispatcher};
pub use grouper::{GroupingDecision, OutageGrouper};

use serde::Serialize;
use uuid::Uuid;

/// Names shown in a grouped alert before the remainder is summarised
pub const GROUPED_PREVIEW_LIMIT: usize = 4;

const GROUPED_OUTAGE_KEY: &str = "groupedOutage";
const GROUPED_DEGRADING_KEY: &str = "groupedDegrading";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    EndpointDown,
    EndpointDegrading,
    GroupedOutage,
    GroupedDegrading,
}

impl AlertKind {
    fn request_prefix(self) -> &'static str {
        match self {
            AlertKind::EndpointDown => "down",
            AlertKind::EndpointDegrading => "degrading",
            AlertKind::GroupedOutage => "grouped",
            AlertKind::GroupedDegrading => "groupedDegrading",
        }
    }

    pub fn category(self) -> AlertCategory {
        match self {
            AlertKind::EndpointDown | AlertKind::EndpointDegrading => AlertCategory::ServiceDown,
            AlertKind::GroupedOutage | AlertKind::GroupedDegrading => AlertCategory::GroupOutage,
        }
    }
}

/// Actions a notification surface offers alongside an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertAction {
    #[serde(rename = "OPEN_APP")]
    OpenApp,
    #[serde(rename = "CHECK_NOW")]
    CheckNow,
}

impl AlertAction {
    pub fn title(self) -> &'static str {
        match self {
            AlertAction::OpenApp => "Open App",
            AlertAction::CheckNow => "Check Now",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertCategory {
    #[serde(rename = "SERVICE_DOWN")]
    ServiceDown,
    #[serde(rename = "GROUP_OUTAGE")]
    GroupOutage,
}

impl AlertCategory {
    pub fn identifier(self) -> &'static str {
        match self {
            AlertCategory::ServiceDown => "SERVICE_DOWN",
            AlertCategory::GroupOutage => "GROUP_OUTAGE",
        }
    }

    pub fn actions(self) -> &'static [AlertAction] {
        match self {
            AlertCategory::ServiceDown => &[AlertAction::OpenApp],
            AlertCategory::GroupOutage => &[AlertAction::CheckNow, AlertAction::OpenApp],
        }
    }
}

/// A fully rendered alert, ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub category: AlertCategory,
    /// Alerts sharing a key are throttled together
    pub cooldown_key: String,
    /// Unique per delivery attempt, `<prefix>.<uuid>`
    pub request_id: String,
    pub title: String,
    pub body: String,
}

impl Alert {
    fn new(kind: AlertKind, cooldown_key: String, title: String, body: String) -> Self {
        Self {
            kind,
            category: kind.category(),
            cooldown_key,
            request_id: format!("{}.{}", kind.request_prefix(), Uuid::new_v4()),
            title,
            body,
        }
    }

    pub fn endpoint_down(endpoint_id: &str, name: &str, url: &str, detail: Option<&str>) -> Self {
        Self::new(
            AlertKind::EndpointDown,
            endpoint_id.to_string(),
            format!("Service down: {}", name),
            join_body_parts(&[Some(url), detail]),
        )
    }

    pub fn endpoint_degrading(endpoint_id: &str, name: &str, url: &str, detail: Option<&str>) -> Self {
        Self::new(
            AlertKind::EndpointDegrading,
            format!("{}.degrading", endpoint_id),
            format!("Service degrading: {}", name),
            join_body_parts(&[Some(url), detail]),
        )
    }

    /// `None` when no usable names remain after trimming
    pub fn grouped_outage<S: AsRef<str>>(names: &[S]) -> Option<Self> {
        let names = normalize_names(names);
        if names.is_empty() {
            return None;
        }
        let body = format!(
            "Possible outage - {} services affected: {}",
            names.len(),
            preview_names(&names)
        );
        Some(Self::new(
            AlertKind::GroupedOutage,
            GROUPED_OUTAGE_KEY.to_string(),
            "Possible outage".to_string(),
            body,
        ))
    }

    /// `None` when no usable names remain after trimming
    pub fn grouped_degrading<S: AsRef<str>>(names: &[S]) -> Option<Self> {
        let names = normalize_names(names);
        if names.is_empty() {
            return None;
        }
        let body = format!(
            "Latency issues - {} services degrading: {}",
            names.len(),
            preview_names(&names)
        );
        Some(Self::new(
            AlertKind::GroupedDegrading,
            GROUPED_DEGRADING_KEY.to_string(),
            "Performance degrading".to_string(),
            body,
        ))
    }
}

fn join_body_parts(parts: &[Option<&str>]) -> String {
    parts.iter().flatten().copied().collect::<Vec<_>>().join(" • ")
}

fn normalize_names<S: AsRef<str>>(names: &[S]) -> Vec<&str> {
    names.iter().map(|name| name.as_ref().trim()).filter(|name| !name.is_empty()).collect()
}

/// First few names, with a `+N more` suffix when truncated
pub fn preview_names(names: &[&str]) -> String {
    let preview = names
        .iter()
        .take(GROUPED_PREVIEW_LIMIT)
        .copied()
        .collect::<Vec<_>>()
        .join(", ");

    if names.len() > GROUPED_PREVIEW_LIMIT {
        format!("{}, +{} more", preview, names.len() - GROUPED_PREVIEW_LIMIT)
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_alert_keys_and_bodies() {
        let down = Alert::endpoint_down("abc", "API", "https://api.example.com", Some("HTTP 503"));
        assert_eq!(down.cooldown_key, "abc");
        assert_eq!(down.title, "Service down: API");
        assert_eq!(down.body, "https://api.example.com • HTTP 503");
        assert_eq!(down.category, AlertCategory::ServiceDown);
        assert!(down.request_id.starts_with("down."));

        let degrading = Alert::endpoint_degrading("abc", "API", "https://api.example.com", None);
        assert_eq!(degrading.cooldown_key, "abc.degrading");
        assert_eq!(degrading.body, "https://api.example.com");
        assert!(degrading.request_id.starts_with("degrading."));
    }

    #[test]
    fn test_grouped_outage_truncates_names() {
        let names = ["a", "b", "c", "d", "e", "f"];
        let alert = Alert::grouped_outage(&names).unwrap();

        assert_eq!(alert.cooldown_key, "groupedOutage");
        assert_eq!(alert.title, "Possible outage");
        assert_eq!(alert.body, "Possible outage - 6 services affected: a, b, c, d, +2 more");
        assert_eq!(alert.category.actions(), &[AlertAction::CheckNow, AlertAction::OpenApp]);
    }

    #[test]
    fn test_grouped_degrading_without_truncation() {
        let names = vec!["api".to_string(), " web ".to_string(), "  ".to_string()];
        let alert = Alert::grouped_degrading(&names).unwrap();

        assert_eq!(alert.cooldown_key, "groupedDegrading");
        assert_eq!(alert.body, "Latency issues - 2 services degrading: api, web");
    }

    #[test]
    fn test_grouped_alert_needs_names() {
        assert!(Alert::grouped_outage(&["", "   "]).is_none());
        assert!(Alert::grouped_degrading::<&str>(&[]).is_none());
    }

    #[test]
    fn test_preview_exactly_at_limit() {
        assert_eq!(preview_names(&["a", "b", "c", "d"]), "a, b, c, d");
        assert_eq!(preview_names(&["a", "b", "c", "d", "e"]), "a, b, c, d, +1 more");
    }

    #[test]
    fn test_category_identifiers() {
        assert_eq!(AlertCategory::ServiceDown.identifier(), "SERVICE_DOWN");
        assert_eq!(AlertCategory::GroupOutage.identifier(), "GROUP_OUTAGE");
        assert_eq!(AlertAction::CheckNow.title(), "Check Now");
    }
}
