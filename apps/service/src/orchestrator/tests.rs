/// End-to-end tests for the check orchestrator
///
/// These drive real orchestrator passes against:
/// - A scripted prober (no network)
/// - An in-memory or failing sample store
/// - A libsql-backed dispatcher with a recording notifier
use super::*;
use crate::clock::ManualClock;
use crate::database::{Database, open_database};
use crate::digest::build_report;
use crate::monitoring::checker::ProbeResponse;
use crate::notify::AlertKind;
use crate::notify::dispatcher::tests::RecordingNotifier;
use crate::storage::MemorySampleStore;
use anyhow::anyhow;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use tempfile::{TempDir, tempdir};

/// What the scripted prober answers for one host
#[derive(Clone)]
enum Script {
    Respond(u16, u64),
    /// Answer 200 after sleeping this many milliseconds
    Delay(u64),
    Fail(ProbeError),
    Hang,
}

/// Prober answering from a per-host script, settable between passes
#[derive(Default)]
struct ScriptedProber {
    scripts: std::sync::Mutex<HashMap<String, Script>>,
}

impl ScriptedProber {
    fn set(&self, host: &str, script: Script) {
        self.scripts.lock().unwrap().insert(host.to_string(), script);
    }
}

#[async_trait::async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, target: &Url) -> Result<ProbeResponse, ProbeError> {
        let host = target.host_str().unwrap_or_default().to_string();
        let script = self.scripts.lock().unwrap().get(&host).cloned().unwrap_or(Script::Respond(200, 100));

        match script {
            Script::Respond(status_code, elapsed_ms) => Ok(ProbeResponse { status_code, elapsed_ms }),
            Script::Delay(ms) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(ProbeResponse { status_code: 200, elapsed_ms: ms })
            }
            Script::Fail(e) => Err(e),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProbeError::Timeout)
            }
        }
    }
}

/// Sample store whose writes always fail
struct FailingStore;

#[async_trait::async_trait]
impl SampleStore for FailingStore {
    async fn load_samples(&self, _endpoint_id: &str) -> Result<Vec<CheckSample>> {
        Ok(Vec::new())
    }

    async fn append_sample(&self, _endpoint_id: &str, _sample: CheckSample) -> Result<Vec<CheckSample>> {
        Err(anyhow!("disk full"))
    }

    async fn clear_all_samples(&self) -> Result<()> {
        Err(anyhow!("disk full"))
    }
}

struct Harness {
    _dir: TempDir,
    prober: Arc<ScriptedProber>,
    notifier: Arc<RecordingNotifier>,
    clock: Arc<ManualClock>,
    orchestrator: Orchestrator,
}

fn start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn endpoint(name: &str, url: &str) -> EndpointConfig {
    EndpointConfig::new(name, url)
}

async fn harness_with_store(samples: Arc<dyn SampleStore>, endpoints: &[EndpointConfig]) -> Result<Harness> {
    let dir = tempdir()?;
    let database: Arc<dyn Database> = open_database(dir.path().join("orchestrator.db")).await?;
    let prober = Arc::new(ScriptedProber::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let clock = Arc::new(ManualClock::new(start()));

    let dispatcher = Arc::new(
        NotificationDispatcher::load(database, notifier.clone(), clock.clone(), TimeDelta::seconds(60)).await,
    );

    let orchestrator = Orchestrator::new(prober.clone(), samples, dispatcher, clock.clone())
        .with_probe_timeout(Duration::from_millis(200));
    orchestrator.reload(endpoints).await;

    Ok(Harness { _dir: dir, prober, notifier, clock, orchestrator })
}

async fn harness(endpoints: &[EndpointConfig]) -> Result<Harness> {
    harness_with_store(Arc::new(MemorySampleStore::new()), endpoints).await
}

fn no_simulation() -> SimulationConfig {
    SimulationConfig::default()
}

#[tokio::test]
async fn test_reload_starts_unknown() -> Result<()> {
    let h = harness(&[endpoint("API", "https://api.test"), endpoint("Web", "https://web.test")]).await?;

    let statuses = h.orchestrator.statuses().await;
    assert_eq!(statuses.len(), 2);
    assert!(statuses.iter().all(|s| s.state == HealthState::Unknown));
    assert_eq!(statuses[0].name, "API");
    assert_eq!(statuses[1].name, "Web");
    Ok(())
}

#[tokio::test]
async fn test_status_code_classification() -> Result<()> {
    let api = endpoint("API", "https://api.test");
    let h = harness(std::slice::from_ref(&api)).await?;

    for (code, expected) in [
        (200, HealthState::Healthy),
        (301, HealthState::Healthy),
        (399, HealthState::Healthy),
        (404, HealthState::Down),
        (503, HealthState::Down),
    ] {
        h.prober.set("api.test", Script::Respond(code, 80));
        let outcome = h.orchestrator.check_one(&api.id, no_simulation()).await.unwrap();
        assert_eq!(outcome.new_state, expected, "status {}", code);
        assert_eq!(outcome.message.as_deref(), Some(format!("HTTP {}", code).as_str()));
    }

    let status = h.orchestrator.status(&api.id).await.unwrap();
    assert_eq!(status.samples.len(), 5);
    assert_eq!(status.samples[4].status_code, Some(503));
    assert_eq!(status.samples[0].latency_ms, Some(80));
    assert_eq!(status.last_checked_at, Some(start()));
    Ok(())
}

#[tokio::test]
async fn test_missing_url_is_error_without_probe() -> Result<()> {
    let blank = endpoint("Nowhere", "");
    let h = harness(std::slice::from_ref(&blank)).await?;

    let outcome = h.orchestrator.check_one(&blank.id, no_simulation()).await.unwrap();

    assert_eq!(outcome.new_state, HealthState::Error);
    assert_eq!(outcome.message.as_deref(), Some("No endpoint configured"));
    assert!(outcome.newly_failed);

    let status = h.orchestrator.status(&blank.id).await.unwrap();
    assert_eq!(status.samples.len(), 1);
    assert_eq!(status.samples[0].state, HealthState::Error);
    Ok(())
}

#[tokio::test]
async fn test_probe_failure_carries_message() -> Result<()> {
    let api = endpoint("API", "https://api.test");
    let h = harness(std::slice::from_ref(&api)).await?;
    h.prober.set("api.test", Script::Fail(ProbeError::Transport("connection refused".to_string())));

    let outcome = h.orchestrator.check_one(&api.id, no_simulation()).await.unwrap();

    assert_eq!(outcome.new_state, HealthState::Error);
    assert_eq!(outcome.message.as_deref(), Some("connection refused"));
    let status = h.orchestrator.status(&api.id).await.unwrap();
    assert_eq!(status.samples[0].latency_ms, None);
    Ok(())
}

#[tokio::test]
async fn test_hung_probe_times_out_and_never_stays_checking() -> Result<()> {
    let api = endpoint("API", "https://api.test");
    let web = endpoint("Web", "https://web.test");
    let h = harness(&[api.clone(), web.clone()]).await?;
    h.prober.set("api.test", Script::Hang);

    let outcomes = h.orchestrator.check_all(no_simulation()).await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].new_state, HealthState::Error);
    assert_eq!(outcomes[0].message.as_deref(), Some("Request timed out"));
    assert_eq!(outcomes[1].new_state, HealthState::Healthy);

    let statuses = h.orchestrator.statuses().await;
    assert!(statuses.iter().all(|s| s.state != HealthState::Checking));
    Ok(())
}

#[tokio::test]
async fn test_alerts_only_on_rising_edge() -> Result<()> {
    let api = endpoint("API", "https://api.test");
    let h = harness(std::slice::from_ref(&api)).await?;
    h.prober.set("api.test", Script::Respond(500, 50));

    let first = h.orchestrator.check_one(&api.id, no_simulation()).await.unwrap();
    h.clock.advance(TimeDelta::seconds(120));
    let second = h.orchestrator.check_one(&api.id, no_simulation()).await.unwrap();

    assert!(first.newly_failed);
    assert!(!second.newly_failed);
    assert_eq!(second.old_state, HealthState::Down);

    let alerts = h.notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::EndpointDown);
    assert_eq!(alerts[0].title, "Service down: API");
    assert!(alerts[0].body.contains("HTTP 500"));

    // down -> error is still a failure, no new edge
    h.prober.set("api.test", Script::Fail(ProbeError::InvalidResponse));
    h.clock.advance(TimeDelta::seconds(120));
    let third = h.orchestrator.check_one(&api.id, no_simulation()).await.unwrap();
    assert!(!third.newly_failed);
    assert_eq!(h.notifier.alerts().len(), 1);

    // recovery then failure fires again
    h.prober.set("api.test", Script::Respond(200, 50));
    h.orchestrator.check_one(&api.id, no_simulation()).await;
    h.clock.advance(TimeDelta::seconds(120));
    h.prober.set("api.test", Script::Respond(502, 50));
    h.orchestrator.check_one(&api.id, no_simulation()).await;
    assert_eq!(h.notifier.alerts().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_check_all_groups_simultaneous_failures() -> Result<()> {
    let endpoints = vec![
        endpoint("API", "https://api.test"),
        endpoint("Web", "https://web.test"),
        endpoint("Docs", "https://docs.test"),
    ];
    let h = harness(&endpoints).await?;
    h.prober.set("api.test", Script::Respond(503, 40));
    h.prober.set("web.test", Script::Fail(ProbeError::Timeout));

    let outcomes = h.orchestrator.check_all(no_simulation()).await;

    assert_eq!(outcomes.iter().filter(|o| o.newly_failed).count(), 2);
    let alerts = h.notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::GroupedOutage);
    assert_eq!(alerts[0].body, "Possible outage - 2 services affected: API, Web");
    Ok(())
}

#[tokio::test]
async fn test_check_all_single_failure_alerts_individually() -> Result<()> {
    let endpoints = vec![endpoint("API", "https://api.test"), endpoint("Web", "https://web.test")];
    let h = harness(&endpoints).await?;
    h.prober.set("web.test", Script::Respond(500, 40));

    h.orchestrator.check_all(no_simulation()).await;

    let alerts = h.notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::EndpointDown);
    assert_eq!(alerts[0].title, "Service down: Web");
    Ok(())
}

#[tokio::test]
async fn test_check_one_never_groups() -> Result<()> {
    let api = endpoint("API", "https://api.test");
    let web = endpoint("Web", "https://web.test");
    let h = harness(&[api.clone(), web.clone()]).await?;
    h.prober.set("api.test", Script::Respond(500, 40));
    h.prober.set("web.test", Script::Respond(500, 40));

    h.orchestrator.check_one(&api.id, no_simulation()).await;
    h.orchestrator.check_one(&web.id, no_simulation()).await;

    let alerts = h.notifier.alerts();
    assert_eq!(alerts.len(), 2);
    assert!(alerts.iter().all(|a| a.kind == AlertKind::EndpointDown));
    Ok(())
}

#[tokio::test]
async fn test_latency_spike_demotes_to_degrading() -> Result<()> {
    let api = endpoint("API", "https://api.test");
    let h = harness(std::slice::from_ref(&api)).await?;
    h.prober.set("api.test", Script::Respond(200, 100));

    for _ in 0..10 {
        let outcome = h.orchestrator.check_one(&api.id, no_simulation()).await.unwrap();
        assert_eq!(outcome.new_state, HealthState::Healthy);
    }

    h.prober.set("api.test", Script::Respond(200, 1000));
    let outcome = h.orchestrator.check_one(&api.id, no_simulation()).await.unwrap();

    assert_eq!(outcome.new_state, HealthState::Degrading);
    assert!(outcome.newly_degrading);
    assert_eq!(outcome.message.as_deref(), Some("HTTP 200 • latency degrading"));

    // The stored sample keeps the probe's own verdict
    let status = h.orchestrator.status(&api.id).await.unwrap();
    assert_eq!(status.samples.last().map(|s| s.state), Some(HealthState::Healthy));

    let alerts = h.notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::EndpointDegrading);
    Ok(())
}

#[tokio::test]
async fn test_check_all_groups_degradations() -> Result<()> {
    let endpoints = vec![endpoint("API", "https://api.test"), endpoint("Web", "https://web.test")];
    let h = harness(&endpoints).await?;

    for _ in 0..10 {
        h.orchestrator.check_all(no_simulation()).await;
    }
    h.prober.set("api.test", Script::Respond(200, 900));
    h.prober.set("web.test", Script::Respond(200, 900));
    h.orchestrator.check_all(no_simulation()).await;

    let alerts = h.notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::GroupedDegrading);
    assert_eq!(alerts[0].body, "Latency issues - 2 services degrading: API, Web");
    Ok(())
}

#[tokio::test]
async fn test_simulated_latency_is_annotated() -> Result<()> {
    let api = endpoint("API", "https://api.test");
    let h = harness(std::slice::from_ref(&api)).await?;
    h.prober.set("api.test", Script::Respond(200, 100));

    let simulation = SimulationConfig { enabled: true, additional_latency_ms: 20 };
    let outcome = h.orchestrator.check_one(&api.id, simulation).await.unwrap();

    assert_eq!(outcome.new_state, HealthState::Healthy);
    assert_eq!(outcome.message.as_deref(), Some("HTTP 200 (simulated +20ms)"));

    let status = h.orchestrator.status(&api.id).await.unwrap();
    let sample = &status.samples[0];
    assert!(sample.simulated);
    assert!(sample.is_simulated());
    assert_eq!(sample.latency_ms, Some(120));
    Ok(())
}

#[tokio::test]
async fn test_notifications_disabled_stays_quiet() -> Result<()> {
    let api = endpoint("API", "https://api.test");
    let mut h = harness(std::slice::from_ref(&api)).await?;
    h.orchestrator = h.orchestrator.with_notifications(false);
    h.prober.set("api.test", Script::Respond(500, 40));

    let outcome = h.orchestrator.check_one(&api.id, no_simulation()).await.unwrap();

    assert!(outcome.newly_failed);
    assert!(h.notifier.alerts().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_storage_failure_keeps_samples_in_memory() -> Result<()> {
    let api = endpoint("API", "https://api.test");
    let h = harness_with_store(Arc::new(FailingStore), std::slice::from_ref(&api)).await?;

    for _ in 0..3 {
        let outcome = h.orchestrator.check_one(&api.id, no_simulation()).await.unwrap();
        assert_eq!(outcome.new_state, HealthState::Healthy);
    }

    let status = h.orchestrator.status(&api.id).await.unwrap();
    assert_eq!(status.samples.len(), 3);
    assert!(h.orchestrator.clear_history().await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_reload_rehydrates_history_and_keeps_ids() -> Result<()> {
    let store: Arc<dyn SampleStore> = Arc::new(MemorySampleStore::new());
    let api = endpoint("API", "https://api.test");
    let h = harness_with_store(store.clone(), std::slice::from_ref(&api)).await?;

    h.orchestrator.check_one(&api.id, no_simulation()).await;
    h.orchestrator.check_one(&api.id, no_simulation()).await;
    h.orchestrator.reload(std::slice::from_ref(&api)).await;

    let status = h.orchestrator.status(&api.id).await.unwrap();
    assert_eq!(status.id, api.id);
    assert_eq!(status.state, HealthState::Unknown);
    assert_eq!(status.samples.len(), 2);

    h.orchestrator.clear_history().await?;
    assert!(h.orchestrator.status(&api.id).await.unwrap().samples.is_empty());
    assert!(store.load_samples(&api.id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unknown_id_is_ignored() -> Result<()> {
    let h = harness(&[endpoint("API", "https://api.test")]).await?;
    assert!(h.orchestrator.check_one("missing", no_simulation()).await.is_none());
    assert!(h.notifier.alerts().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_report_after_reload_uses_last_stored_state() -> Result<()> {
    let store: Arc<dyn SampleStore> = Arc::new(MemorySampleStore::new());
    let api = endpoint("API", "https://api.test");
    let h = harness_with_store(store, std::slice::from_ref(&api)).await?;
    h.prober.set("api.test", Script::Respond(503, 40));

    h.orchestrator.check_one(&api.id, no_simulation()).await;
    h.orchestrator.reload(std::slice::from_ref(&api)).await;

    let mut statuses = h.orchestrator.statuses().await;
    assert_eq!(statuses[0].state, HealthState::Unknown);
    statuses.iter_mut().for_each(EndpointStatus::restore_last_known_state);

    let report = build_report(&statuses, h.clock.now(), &Utc).unwrap();
    assert!(report.contains("- API | status: down | avg latency (24h): 40ms"));
    Ok(())
}

#[tokio::test]
async fn test_check_all_runs_probes_concurrently() -> Result<()> {
    let endpoints: Vec<EndpointConfig> =
        (0..5).map(|i| endpoint(&format!("svc-{}", i), &format!("https://svc{}.test", i))).collect();
    let mut h = harness(&endpoints).await?;
    h.orchestrator = h.orchestrator.with_probe_timeout(Duration::from_secs(5));
    for i in 0..5 {
        h.prober.set(&format!("svc{}.test", i), Script::Delay(1000));
    }

    // Set up against the real clock, then measure the pass in paused time
    tokio::time::pause();
    let started = tokio::time::Instant::now();
    let outcomes = h.orchestrator.check_all(no_simulation()).await;
    let elapsed = started.elapsed();

    assert_eq!(outcomes.len(), 5);
    assert!(outcomes.iter().all(|o| o.new_state == HealthState::Healthy));
    assert!(elapsed >= Duration::from_secs(1), "took {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(2), "took {:?}", elapsed);
    Ok(())
}
