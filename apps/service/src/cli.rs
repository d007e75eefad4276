//! CLI definitions for isitup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// isitup CLI.
#[derive(Parser)]
#[command(name = "isitup")]
#[command(about = "Watch HTTP endpoints, flag slowdowns and group outages")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: $XDG_CONFIG_HOME/isitup/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Use the randomised mock prober instead of real HTTP requests
    #[arg(long, global = true)]
    pub mock: bool,

    /// Add artificial latency to every probe (default 1200ms, capped at 5000ms)
    #[arg(long, global = true, value_name = "MS", num_args = 0..=1, default_missing_value = "1200")]
    pub simulate_latency: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Check all endpoints on the configured interval until Ctrl-C
    Run,

    /// Check every endpoint once
    ///
    /// A one-shot run starts with no previous state, so an endpoint that is
    /// still failing alerts again on every run once its cooldown has passed.
    /// Use `run` for alerts on state changes only.
    CheckAll,

    /// Check the endpoint best matching a name or host
    ///
    /// Alerting follows the same one-shot rule as `check-all`.
    Check {
        /// Name or host, matched loosely
        query: String,
    },

    /// Print today's digest
    Digest {
        /// Regenerate even if today's digest is cached
        #[arg(long)]
        force: bool,
    },

    /// Endpoint catalog commands
    Endpoints {
        #[command(subcommand)]
        action: EndpointsAction,
    },

    /// Sample history commands
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
pub(crate) enum EndpointsAction {
    /// List monitored endpoints
    List,

    /// Add an endpoint
    Add {
        /// Display name
        name: String,

        /// http(s) URL to probe
        url: String,
    },

    /// Remove the endpoint best matching a name or host
    Remove {
        query: String,
    },

    /// Replace the catalog with the config file's endpoints
    Reset,
}

#[derive(Subcommand)]
pub(crate) enum HistoryAction {
    /// Show recent samples for one endpoint
    Show {
        query: String,

        /// Number of most recent samples to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Delete all stored samples
    Clear,
}
