use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};

use crate::config::SimulationConfig;
use crate::orchestrator::{Orchestrator, TransitionOutcome};

/// Periodic check-all driver
pub struct MonitoringScheduler {
    orchestrator: Arc<Orchestrator>,
    result_tx: mpsc::Sender<Vec<TransitionOutcome>>,
}

impl MonitoringScheduler {
    pub fn new(orchestrator: Arc<Orchestrator>, result_tx: mpsc::Sender<Vec<TransitionOutcome>>) -> Self {
        Self { orchestrator, result_tx }
    }

    /// Run a check-all pass every `interval_seconds`, starting immediately.
    ///
    /// Each pass's outcomes go to the result channel; the task ends once the
    /// receiver is dropped. A pass that overruns delays the next tick rather
    /// than bunching them.
    pub fn schedule(&self, interval_seconds: u64, simulation: SimulationConfig) -> tokio::task::JoinHandle<()> {
        let orchestrator = self.orchestrator.clone();
        let result_tx = self.result_tx.clone();

        tokio::spawn(async move {
            let mut timer = interval(Duration::from_secs(interval_seconds.max(1)));
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                timer.tick().await;

                let outcomes = orchestrator.check_all(simulation).await;

                if let Err(e) = result_tx.send(outcomes).await {
                    tracing::debug!("Check results receiver closed, stopping scheduler: {}", e);
                    break;
                }
            }
        })
    }
}
