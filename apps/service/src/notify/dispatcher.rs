use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Alert, Notifier};
use crate::clock::Clock;
use crate::database::Database;

/// Default minimum interval between two alerts sharing a cooldown key
pub const DEFAULT_COOLDOWN_SECONDS: i64 = 60;

/// What happened to one alert intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    /// Same key fired within the cooldown window
    Suppressed,
    /// Cooldown recorded, but the backend failed
    DeliveryFailed,
    /// Nothing to say (e.g. a grouped alert with no names)
    Skipped,
}

/// Cooldown-gated alert emission.
///
/// The last-fired time is recorded durably before delivery is attempted, so a
/// crash mid-delivery errs on the side of staying quiet.
pub struct NotificationDispatcher {
    database: Arc<dyn Database>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    cooldown: TimeDelta,
    last_fired: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl NotificationDispatcher {
    /// Build a dispatcher, restoring persisted cooldowns.
    ///
    /// Unreadable cooldown state starts empty rather than failing.
    pub async fn load(
        database: Arc<dyn Database>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        cooldown: TimeDelta,
    ) -> Self {
        let last_fired = match database.load_cooldowns().await {
            Ok(cooldowns) => cooldowns,
            Err(e) => {
                warn!("Failed to load notification cooldowns, starting empty: {}", e);
                HashMap::new()
            }
        };

        Self { database, notifier, clock, cooldown, last_fired: Mutex::new(last_fired) }
    }

    pub async fn notify_endpoint_down(
        &self,
        endpoint_id: &str,
        name: &str,
        url: &str,
        detail: Option<&str>,
    ) -> DispatchOutcome {
        self.fire(Alert::endpoint_down(endpoint_id, name, url, detail)).await
    }

    pub async fn notify_endpoint_degrading(
        &self,
        endpoint_id: &str,
        name: &str,
        url: &str,
        detail: Option<&str>,
    ) -> DispatchOutcome {
        self.fire(Alert::endpoint_degrading(endpoint_id, name, url, detail)).await
    }

    pub async fn notify_grouped_outage<S: AsRef<str> + Sync>(&self, names: &[S]) -> DispatchOutcome {
        match Alert::grouped_outage(names) {
            Some(alert) => self.fire(alert).await,
            None => DispatchOutcome::Skipped,
        }
    }

    pub async fn notify_grouped_degrading<S: AsRef<str> + Sync>(&self, names: &[S]) -> DispatchOutcome {
        match Alert::grouped_degrading(names) {
            Some(alert) => self.fire(alert).await,
            None => DispatchOutcome::Skipped,
        }
    }

    async fn fire(&self, alert: Alert) -> DispatchOutcome {
        let now = self.clock.now();

        {
            let mut last_fired = self.last_fired.lock().await;
            if let Some(previous) = last_fired.get(&alert.cooldown_key) {
                if now.signed_duration_since(*previous) < self.cooldown {
                    debug!(key = %alert.cooldown_key, "Alert suppressed by cooldown");
                    return DispatchOutcome::Suppressed;
                }
            }

            last_fired.insert(alert.cooldown_key.clone(), now);
            if let Err(e) = self.database.save_cooldown(&alert.cooldown_key, now).await {
                warn!(key = %alert.cooldown_key, "Failed to persist alert cooldown: {}", e);
            }
        }

        match self.notifier.deliver(&alert).await {
            Ok(()) => DispatchOutcome::Delivered,
            Err(e) => {
                warn!(request_id = %alert.request_id, "Alert delivery failed: {}", e);
                DispatchOutcome::DeliveryFailed
            }
        }
    }
}
