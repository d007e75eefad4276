use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use chrono::TimeDelta;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};

use isitup_service::clock::{Clock, SystemClock};
use isitup_service::config::{Config, SimulationConfig};
use isitup_service::database::{Database, open_database};
use isitup_service::detection::AnomalyDetector;
use isitup_service::digest::{DigestService, ReportSummarizer};
use isitup_service::endpoints::EndpointCatalog;
use isitup_service::monitoring::validation::validate_target;
use isitup_service::monitoring::{EndpointStatus, HttpProber, MockProber, MonitoringScheduler, Prober};
use isitup_service::notify::{LogNotifier, NotificationDispatcher, Notifier, WebhookNotifier};
use isitup_service::orchestrator::{Orchestrator, check_all_summary, find_endpoint, single_endpoint_summary};
use isitup_service::storage::PersistentSampleStore;

mod cli;

use cli::{Cli, Commands, EndpointsAction, HistoryAction};

/// Everything a command needs, wired from one config
struct Services {
    catalog: EndpointCatalog,
    orchestrator: Arc<Orchestrator>,
    digest: DigestService,
}

impl Services {
    async fn build(config: &Config, mock: bool) -> Result<Self> {
        let database: Arc<dyn Database> = open_database(config.database_path()).await?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let prober: Arc<dyn Prober> = if mock {
            info!("Using mock prober");
            Arc::new(MockProber)
        } else {
            Arc::new(HttpProber::new(config.probe.timeout_seconds)?)
        };

        let notifier: Arc<dyn Notifier> = match &config.notifications.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url, Duration::from_secs(config.probe.timeout_seconds))?),
            None => Arc::new(LogNotifier),
        };

        let dispatcher = Arc::new(
            NotificationDispatcher::load(
                database.clone(),
                notifier,
                clock.clone(),
                TimeDelta::seconds(config.notifications.cooldown_seconds),
            )
            .await,
        );

        let orchestrator = Orchestrator::new(
            prober,
            Arc::new(PersistentSampleStore::new(database.clone())),
            dispatcher,
            clock.clone(),
        )
        .with_detector(AnomalyDetector::new(config.detector.clone()))
        .with_probe_timeout(Duration::from_secs(config.probe.timeout_seconds))
        .with_max_concurrency(config.checks.max_concurrency)
        .with_notifications(config.notifications.enabled);

        Ok(Self {
            catalog: EndpointCatalog::new(database.clone(), config.endpoints.clone()),
            orchestrator: Arc::new(orchestrator),
            digest: DigestService::new(database, Arc::new(ReportSummarizer), clock),
        })
    }

    /// Load the catalog into the orchestrator, returning the fresh statuses
    async fn reload(&self) -> Result<Vec<EndpointStatus>> {
        let endpoints = self.catalog.load().await?;
        self.orchestrator.reload(&endpoints).await;
        Ok(self.orchestrator.statuses().await)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logger::init();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_deref())?;

    if let Commands::Config = cli.command {
        print!("{}", config);
        return Ok(());
    }

    let simulation = match cli.simulate_latency {
        Some(ms) => SimulationConfig::enabled(ms),
        None => config.simulation,
    };

    let services = Services::build(&config, cli.mock).await?;

    match cli.command {
        Commands::Run => run(&services, &config, simulation).await?,
        Commands::CheckAll => {
            services.reload().await?;
            services.orchestrator.check_all(simulation).await;
            println!("{}", check_all_summary(&services.orchestrator.statuses().await));
        }
        Commands::Check { query } => {
            let statuses = services.reload().await?;
            let Some(target) = find_endpoint(&query, &statuses) else {
                bail!("No endpoint matches \"{}\"", query);
            };
            services.orchestrator.check_one(&target.id, simulation).await;
            if let Some(status) = services.orchestrator.status(&target.id).await {
                println!("{}", single_endpoint_summary(&status));
            }
        }
        Commands::Digest { force } => {
            let mut statuses = services.reload().await?;
            statuses.iter_mut().for_each(EndpointStatus::restore_last_known_state);
            match services.digest.daily_digest(&statuses, force).await? {
                Some(digest) => println!("{}", digest),
                None => println!("Nothing to summarise yet."),
            }
        }
        Commands::Endpoints { action } => endpoints(&services, action).await?,
        Commands::History { action } => history(&services, action).await?,
        Commands::Config => {}
    }

    Ok(())
}

async fn run(services: &Services, config: &Config, simulation: SimulationConfig) -> Result<()> {
    let statuses = services.reload().await?;
    info!(
        "Monitoring {} endpoints every {}s",
        statuses.len(),
        config.checks.interval_seconds
    );

    let (tx, mut rx) = mpsc::channel(4);
    let scheduler = MonitoringScheduler::new(services.orchestrator.clone(), tx);
    let handle = scheduler.schedule(config.checks.interval_seconds, simulation);

    loop {
        tokio::select! {
            received = rx.recv() => {
                if received.is_none() {
                    error!("Scheduler stopped unexpectedly");
                    break;
                }
                info!("{}", check_all_summary(&services.orchestrator.statuses().await));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    handle.abort();
    Ok(())
}

async fn endpoints(services: &Services, action: EndpointsAction) -> Result<()> {
    match action {
        EndpointsAction::List => {
            let statuses = services.reload().await?;
            if statuses.is_empty() {
                println!("No endpoints configured.");
            }
            for (index, status) in statuses.iter().enumerate() {
                println!("{:>3}. {} {} ({})", index + 1, status.name, status.endpoint_label(), status.id);
            }
        }
        EndpointsAction::Add { name, url } => {
            validate_target(&url)?;
            let endpoint = services.catalog.add(&name, &url).await?;
            println!("Added {} ({})", endpoint.name, endpoint.id);
        }
        EndpointsAction::Remove { query } => {
            let statuses = services.reload().await?;
            let Some(target) = find_endpoint(&query, &statuses) else {
                bail!("No endpoint matches \"{}\"", query);
            };
            if let Some(removed) = services.catalog.remove(&target.id).await? {
                println!("Removed {}", removed.name);
            }
        }
        EndpointsAction::Reset => {
            let endpoints = services.catalog.reset_to_seed().await?;
            println!("Catalog reset to {} configured endpoints", endpoints.len());
        }
    }

    Ok(())
}

async fn history(services: &Services, action: HistoryAction) -> Result<()> {
    match action {
        HistoryAction::Show { query, limit } => {
            let statuses = services.reload().await?;
            let Some(target) = find_endpoint(&query, &statuses) else {
                bail!("No endpoint matches \"{}\"", query);
            };

            println!("{} ({} samples stored)", target.name, target.samples.len());
            let skip = target.samples.len().saturating_sub(limit);
            for sample in &target.samples[skip..] {
                let latency = sample.latency_ms.map(|ms| format!("{}ms", ms)).unwrap_or_else(|| "-".to_string());
                println!(
                    "  {}  {:<9} {:>7}  {}",
                    sample.at.format("%Y-%m-%d %H:%M:%S"),
                    sample.state.as_str(),
                    latency,
                    sample.message.as_deref().unwrap_or("")
                );
            }
        }
        HistoryAction::Clear => {
            services.reload().await?;
            services.orchestrator.clear_history().await?;
            println!("Sample history cleared");
        }
    }

    Ok(())
}
