use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use super::validation::parse_target;

/// Health of an endpoint as of its last check.
///
/// Variants are declared in ascending alert severity, so `Ord` can be used to
/// rank endpoints for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Unknown,
    Checking,
    Healthy,
    Degrading,
    Down,
    Error,
}

impl HealthState {
    /// `down` or `error`
    pub fn is_failure(self) -> bool {
        matches!(self, HealthState::Down | HealthState::Error)
    }

    pub fn is_alert_eligible(self) -> bool {
        matches!(self, HealthState::Degrading | HealthState::Down | HealthState::Error)
    }

    /// States whose samples carry a meaningful response time
    pub fn is_latency_eligible(self) -> bool {
        matches!(self, HealthState::Healthy | HealthState::Degrading)
    }

    /// `unknown` and `checking` are in-memory transients only
    pub fn is_persistable(self) -> bool {
        self.is_latency_eligible() || self.is_alert_eligible()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthState::Unknown => "unknown",
            HealthState::Checking => "checking",
            HealthState::Healthy => "healthy",
            HealthState::Degrading => "degrading",
            HealthState::Down => "down",
            HealthState::Error => "error",
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognised health state: {0}")]
pub struct UnknownHealthState(pub String);

impl FromStr for HealthState {
    type Err = UnknownHealthState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(HealthState::Unknown),
            "checking" => Ok(HealthState::Checking),
            "healthy" => Ok(HealthState::Healthy),
            "degrading" => Ok(HealthState::Degrading),
            "down" => Ok(HealthState::Down),
            "error" => Ok(HealthState::Error),
            other => Err(UnknownHealthState(other.to_string())),
        }
    }
}

/// One recorded check outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSample {
    /// When the check completed
    pub at: DateTime<Utc>,

    /// Resulting state
    pub state: HealthState,

    /// HTTP status code (if a response was received)
    pub status_code: Option<u16>,

    /// Response time in milliseconds, including any injected delay
    pub latency_ms: Option<u64>,

    /// Message shown for the endpoint at the time of the check
    pub message: Option<String>,

    /// Whether artificial latency was injected into this check
    pub simulated: bool,
}

impl CheckSample {
    pub fn new(at: DateTime<Utc>, state: HealthState) -> Self {
        Self { at, state, status_code: None, latency_ms: None, message: None, simulated: false }
    }

    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn simulated(mut self, simulated: bool) -> Self {
        self.simulated = simulated;
        self
    }

    /// Samples written before the flag existed are recognised by their message.
    pub fn is_simulated(&self) -> bool {
        self.simulated
            || self
                .message
                .as_deref()
                .is_some_and(|message| message.to_lowercase().contains("simulated"))
    }
}

/// Endpoint definition as stored in configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Stable identifier; malformed or duplicate ids are regenerated on load
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub url: String,
}

impl EndpointConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self { id: uuid::Uuid::new_v4().to_string(), name: name.into(), url: url.into() }
    }
}

/// In-memory status of one monitored endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointStatus {
    pub id: String,
    pub name: String,
    /// `None` when the configured URL is missing or not a usable http(s) target
    pub endpoint: Option<Url>,
    pub state: HealthState,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub samples: Vec<CheckSample>,
}

impl EndpointStatus {
    /// Fresh status for a (re)loaded endpoint, rehydrated with its persisted history
    pub fn from_config(config: &EndpointConfig, samples: Vec<CheckSample>) -> Self {
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            endpoint: parse_target(&config.url),
            state: HealthState::Unknown,
            last_checked_at: None,
            message: None,
            samples,
        }
    }

    /// Host of the configured endpoint, falling back to the display name
    pub fn display_name(&self) -> &str {
        self.endpoint
            .as_ref()
            .and_then(|url| url.host_str())
            .filter(|host| !host.is_empty())
            .unwrap_or(&self.name)
    }

    /// Adopt state, message and check time from the newest stored sample.
    ///
    /// Only applies while the endpoint is still `unknown`, i.e. it has not been
    /// checked since the last reload.
    pub fn restore_last_known_state(&mut self) {
        if self.state != HealthState::Unknown {
            return;
        }
        if let Some(last) = self.samples.last() {
            self.state = last.state;
            self.message = last.message.clone();
            self.last_checked_at = Some(last.at);
        }
    }

    pub fn endpoint_label(&self) -> String {
        self.endpoint.as_ref().map(Url::to_string).unwrap_or_else(|| "—".to_string())
    }
}
