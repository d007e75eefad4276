/// Orchestrator module - drives endpoints through check cycles
///
/// The orchestrator owns the in-memory status of every endpoint and:
/// - Runs single checks, alerting immediately on a bad transition
/// - Runs concurrent check-all passes, alerting once per batch afterwards
/// - Feeds every outcome to the sample store and anomaly detector
///
/// Each endpoint's status sits behind its own lock, so concurrent checks of
/// different endpoints never contend. No lock is held across a probe.

pub mod summary;

#[cfg(test)]
mod tests;

pub use summary::{HealthSummary, check_all_summary, find_endpoint, single_endpoint_summary};

use anyhow::Result;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::clock::Clock;
use crate::config::SimulationConfig;
use crate::detection::{AnomalyDetector, Trend};
use crate::monitoring::checker::{DEFAULT_TIMEOUT_SECONDS, ProbeError, Prober};
use crate::monitoring::types::{CheckSample, EndpointConfig, EndpointStatus, HealthState};
use crate::notify::{GroupingDecision, NotificationDispatcher, OutageGrouper};
use crate::storage::{MAX_SAMPLES_PER_ENDPOINT, SampleStore};

/// Appended to an endpoint's message when its latency is anomalous
pub const LATENCY_DEGRADING_HINT: &str = "latency degrading";

const NO_ENDPOINT_MESSAGE: &str = "No endpoint configured";

/// Default number of endpoints probed at once during a check-all pass
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// How one endpoint's state moved during a check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub endpoint_id: String,
    pub name: String,
    pub url: String,
    pub message: Option<String>,
    pub old_state: HealthState,
    pub new_state: HealthState,
    /// Entered `down`/`error` from a non-failure state
    pub newly_failed: bool,
    /// Entered `degrading` from any other state
    pub newly_degrading: bool,
}

impl TransitionOutcome {
    fn new(status: &EndpointStatus, old_state: HealthState) -> Self {
        let new_state = status.state;
        Self {
            endpoint_id: status.id.clone(),
            name: status.name.clone(),
            url: status.endpoint_label(),
            message: status.message.clone(),
            old_state,
            new_state,
            newly_failed: !old_state.is_failure() && new_state.is_failure(),
            newly_degrading: old_state != HealthState::Degrading
                && new_state == HealthState::Degrading,
        }
    }
}

/// One endpoint's live status, keyed by its stable id
#[derive(Clone)]
struct EndpointSlot {
    id: String,
    status: Arc<Mutex<EndpointStatus>>,
}

/// Main coordinator for endpoint checks
pub struct Orchestrator {
    prober: Arc<dyn Prober>,
    samples: Arc<dyn SampleStore>,
    dispatcher: Arc<NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    detector: AnomalyDetector,
    grouper: OutageGrouper,
    probe_timeout: Duration,
    max_concurrency: usize,
    notifications_enabled: bool,
    slots: RwLock<Vec<EndpointSlot>>,
}

impl Orchestrator {
    pub fn new(
        prober: Arc<dyn Prober>,
        samples: Arc<dyn SampleStore>,
        dispatcher: Arc<NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            prober,
            samples,
            dispatcher,
            clock,
            detector: AnomalyDetector::default(),
            grouper: OutageGrouper::default(),
            probe_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            notifications_enabled: true,
            slots: RwLock::new(Vec::new()),
        }
    }

    pub fn with_detector(mut self, detector: AnomalyDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.notifications_enabled = enabled;
        self
    }

    /// Replace the working set, rehydrating each endpoint's history.
    ///
    /// Every endpoint restarts in `unknown`.
    pub async fn reload(&self, endpoints: &[EndpointConfig]) {
        let mut slots = Vec::with_capacity(endpoints.len());

        for endpoint in endpoints {
            let samples = match self.samples.load_samples(&endpoint.id).await {
                Ok(samples) => samples,
                Err(e) => {
                    warn!(endpoint = %endpoint.id, "Failed to load sample history: {}", e);
                    Vec::new()
                }
            };
            slots.push(EndpointSlot {
                id: endpoint.id.clone(),
                status: Arc::new(Mutex::new(EndpointStatus::from_config(endpoint, samples))),
            });
        }

        info!("Loaded {} endpoints", slots.len());
        *self.slots.write().await = slots;
    }

    /// Snapshot of every endpoint, in catalog order
    pub async fn statuses(&self) -> Vec<EndpointStatus> {
        let slots = self.slots.read().await.clone();
        let mut snapshot = Vec::with_capacity(slots.len());
        for slot in slots {
            snapshot.push(slot.status.lock().await.clone());
        }
        snapshot
    }

    pub async fn status(&self, endpoint_id: &str) -> Option<EndpointStatus> {
        let handle = self.find(endpoint_id).await?;
        let status = handle.lock().await.clone();
        Some(status)
    }

    async fn find(&self, endpoint_id: &str) -> Option<Arc<Mutex<EndpointStatus>>> {
        self.slots
            .read()
            .await
            .iter()
            .find(|slot| slot.id == endpoint_id)
            .map(|slot| slot.status.clone())
    }

    /// Check one endpoint and alert right away if it newly failed or degraded.
    ///
    /// Unknown ids are ignored.
    pub async fn check_one(
        &self,
        endpoint_id: &str,
        simulation: SimulationConfig,
    ) -> Option<TransitionOutcome> {
        let outcome = self.run_check(endpoint_id, simulation).await?;

        if self.notifications_enabled {
            if outcome.newly_failed {
                self.notify_down(&outcome).await;
            }
            if outcome.newly_degrading {
                self.notify_degrading(&outcome).await;
            }
        }

        Some(outcome)
    }

    /// Check every endpoint concurrently, then run one alerting pass over the batch.
    ///
    /// Outcomes are returned in catalog order regardless of completion order.
    pub async fn check_all(&self, simulation: SimulationConfig) -> Vec<TransitionOutcome> {
        let ids: Vec<String> = self.slots.read().await.iter().map(|slot| slot.id.clone()).collect();

        let mut indexed: Vec<(usize, TransitionOutcome)> = futures::stream::iter(ids.into_iter().enumerate())
            .map(move |(index, id)| async move {
                self.run_check(&id, simulation).await.map(|outcome| (index, outcome))
            })
            .buffer_unordered(self.max_concurrency)
            .filter_map(futures::future::ready)
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        let outcomes: Vec<TransitionOutcome> = indexed.into_iter().map(|(_, outcome)| outcome).collect();

        if self.notifications_enabled {
            self.notify_batch(&outcomes).await;
        }

        outcomes
    }

    /// Drop persisted and in-memory history for every endpoint
    pub async fn clear_history(&self) -> Result<()> {
        self.samples.clear_all_samples().await?;
        let slots = self.slots.read().await.clone();
        for slot in slots {
            slot.status.lock().await.samples.clear();
        }
        info!("Cleared sample history");
        Ok(())
    }

    async fn run_check(
        &self,
        endpoint_id: &str,
        simulation: SimulationConfig,
    ) -> Option<TransitionOutcome> {
        let handle = self.find(endpoint_id).await?;

        let (old_state, target) = {
            let mut status = handle.lock().await;
            let old_state = status.state;
            status.state = HealthState::Checking;
            status.message = None;
            (old_state, status.endpoint.clone())
        };

        let sample = match target {
            Some(url) => self.probe(&url, simulation).await,
            None => CheckSample::new(self.clock.now(), HealthState::Error).with_message(NO_ENDPOINT_MESSAGE),
        };

        let persisted = self.samples.append_sample(endpoint_id, sample.clone()).await;

        let mut status = handle.lock().await;
        status.samples = match persisted {
            Ok(history) => history,
            Err(e) => {
                warn!(endpoint = %endpoint_id, "Failed to persist sample, keeping it in memory: {}", e);
                let mut history = std::mem::take(&mut status.samples);
                history.push(sample.clone());
                let excess = history.len().saturating_sub(MAX_SAMPLES_PER_ENDPOINT);
                history.drain(..excess);
                history
            }
        };

        let mut state = sample.state;
        let mut message = sample.message.clone();

        if state == HealthState::Healthy && self.detector.classify(&status.samples) == Trend::Degrading {
            state = HealthState::Degrading;
            message = Some(with_degrading_hint(message));
        }

        status.state = state;
        status.message = message;
        status.last_checked_at = Some(sample.at);

        if old_state != state {
            info!(endpoint = %status.name, from = %old_state, to = %state, "Endpoint state changed");
        } else {
            debug!(endpoint = %status.name, state = %state, "Endpoint checked");
        }

        Some(TransitionOutcome::new(&status, old_state))
    }

    /// Probe a target, honouring injected latency, and turn the result into a sample
    async fn probe(&self, target: &Url, simulation: SimulationConfig) -> CheckSample {
        let injected_ms = simulation.injected_latency_ms();

        let attempt = async {
            if injected_ms > 0 {
                tokio::time::sleep(Duration::from_millis(injected_ms)).await;
            }
            self.prober.probe(target).await
        };

        let result = tokio::time::timeout(self.probe_timeout + Duration::from_millis(injected_ms), attempt)
            .await
            .unwrap_or(Err(ProbeError::Timeout));

        let now = self.clock.now();

        match result {
            Ok(response) => {
                let state = if (200..=399).contains(&response.status_code) {
                    HealthState::Healthy
                } else {
                    HealthState::Down
                };

                let mut message = format!("HTTP {}", response.status_code);
                if injected_ms > 0 {
                    message.push_str(&format!(" (simulated +{}ms)", injected_ms));
                }

                CheckSample::new(now, state)
                    .with_status_code(response.status_code)
                    .with_latency(response.elapsed_ms + injected_ms)
                    .with_message(message)
                    .simulated(injected_ms > 0)
            }
            Err(e) => CheckSample::new(now, HealthState::Error).with_message(e.to_string()),
        }
    }

    /// Group or split the batch's new failures and new degradations, per kind
    async fn notify_batch(&self, outcomes: &[TransitionOutcome]) {
        let failed: Vec<&TransitionOutcome> = outcomes.iter().filter(|o| o.newly_failed).collect();
        let degrading: Vec<&TransitionOutcome> = outcomes.iter().filter(|o| o.newly_degrading).collect();

        if !failed.is_empty() {
            match self.grouper.decide(&failed) {
                GroupingDecision::Grouped => {
                    let names: Vec<&str> = failed.iter().map(|o| o.name.as_str()).collect();
                    self.dispatcher.notify_grouped_outage(&names).await;
                }
                GroupingDecision::Individual => {
                    for outcome in &failed {
                        self.notify_down(outcome).await;
                    }
                }
            }
        }

        if !degrading.is_empty() {
            match self.grouper.decide(&degrading) {
                GroupingDecision::Grouped => {
                    let names: Vec<&str> = degrading.iter().map(|o| o.name.as_str()).collect();
                    self.dispatcher.notify_grouped_degrading(&names).await;
                }
                GroupingDecision::Individual => {
                    for outcome in &degrading {
                        self.notify_degrading(outcome).await;
                    }
                }
            }
        }
    }

    async fn notify_down(&self, outcome: &TransitionOutcome) {
        self.dispatcher
            .notify_endpoint_down(&outcome.endpoint_id, &outcome.name, &outcome.url, outcome.message.as_deref())
            .await;
    }

    async fn notify_degrading(&self, outcome: &TransitionOutcome) {
        self.dispatcher
            .notify_endpoint_degrading(&outcome.endpoint_id, &outcome.name, &outcome.url, outcome.message.as_deref())
            .await;
    }
}

fn with_degrading_hint(message: Option<String>) -> String {
    match message {
        Some(message) if message.contains(LATENCY_DEGRADING_HINT) => message,
        Some(message) if !message.is_empty() => format!("{} • {}", message, LATENCY_DEGRADING_HINT),
        _ => LATENCY_DEGRADING_HINT.to_string(),
    }
}
