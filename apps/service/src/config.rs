use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};

use crate::detection::DetectorConfig;
use crate::monitoring::checker::DEFAULT_TIMEOUT_SECONDS;
use crate::monitoring::types::EndpointConfig;
use crate::monitoring::validation::{validate_check_interval, validate_target, validate_timeout};
use crate::notify::dispatcher::DEFAULT_COOLDOWN_SECONDS;
use crate::orchestrator::DEFAULT_MAX_CONCURRENCY;

const DEFAULT_DATABASE_FILE: &str = "isitup.db";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read { path: path::PathBuf, source: std::io::Error },
    #[error("failed to write config {path}: {source}")]
    Write { path: path::PathBuf, source: std::io::Error },
    #[error("failed to parse config {path}: {source}")]
    Parse { path: path::PathBuf, source: toml::de::Error },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no config directory available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: Storage,
    pub probe: Probe,
    pub checks: Checks,
    pub detector: DetectorConfig,
    pub notifications: Notifications,
    pub simulation: SimulationConfig,
    pub endpoints: Vec<EndpointConfig>,
    /// Where this config was loaded from
    #[serde(skip)]
    pub source_path: Option<path::PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Storage {
    /// Relative paths resolve against the config file's directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<path::PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Probe {
    pub timeout_seconds: u64,
}

impl Default for Probe {
    fn default() -> Self {
        Self { timeout_seconds: DEFAULT_TIMEOUT_SECONDS }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Checks {
    pub interval_seconds: u64,
    pub max_concurrency: usize,
}

impl Default for Checks {
    fn default() -> Self {
        Self { interval_seconds: 60, max_concurrency: DEFAULT_MAX_CONCURRENCY }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notifications {
    pub enabled: bool,
    pub cooldown_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

impl Default for Notifications {
    fn default() -> Self {
        Self { enabled: true, cooldown_seconds: DEFAULT_COOLDOWN_SECONDS, webhook_url: None }
    }
}

/// Artificial extra latency added to every probe, for exercising the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub enabled: bool,
    pub additional_latency_ms: u64,
}

impl SimulationConfig {
    pub const MAX_ADDITIONAL_LATENCY_MS: u64 = 5000;
    pub const DEFAULT_ADDITIONAL_LATENCY_MS: u64 = 1200;

    pub fn enabled(additional_latency_ms: u64) -> Self {
        Self { enabled: true, additional_latency_ms }
    }

    /// Milliseconds to add to the next probe, `0` when disabled
    pub fn injected_latency_ms(&self) -> u64 {
        if self.enabled { self.additional_latency_ms.min(Self::MAX_ADDITIONAL_LATENCY_MS) } else { 0 }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { enabled: false, additional_latency_ms: Self::DEFAULT_ADDITIONAL_LATENCY_MS }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/isitup/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("isitup/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Configuration:")?;
        if let Some(source) = &self.source_path {
            write_1(f, "Loaded From", &source.display())?;
        }

        write_title_1(f, "Storage")?;
        write_1(f, "Database", &self.database_path().display())?;

        write_title_1(f, "Checks")?;
        write_1(f, "Probe Timeout (s)", &self.probe.timeout_seconds)?;
        write_1(f, "Interval (s)", &self.checks.interval_seconds)?;
        write_1(f, "Max Concurrency", &self.checks.max_concurrency)?;

        write_title_1(f, "Detector")?;
        write_1(f, "Minimum Samples", &self.detector.minimum_samples)?;
        write_1(f, "Window Size", &self.detector.window_size)?;
        write_1(f, "Threshold Multiplier", &self.detector.threshold_multiplier)?;
        write_1(f, "Simulated Fallback (ms)", &self.detector.simulated_fallback_degrading_ms)?;

        write_title_1(f, "Notifications")?;
        write_1(f, "Enabled", &self.notifications.enabled)?;
        write_1(f, "Cooldown (s)", &self.notifications.cooldown_seconds)?;
        write_1(f, "Webhook", &self.notifications.webhook_url.as_deref().unwrap_or("none (log only)"))?;

        write_title_1(f, "Simulation")?;
        write_1(f, "Enabled", &self.simulation.enabled)?;
        write_1(f, "Additional Latency (ms)", &self.simulation.injected_latency_ms())?;

        write_title_1(f, "Seed Endpoints")?;
        write_1(f, "Count", &self.endpoints.len())?;
        for endpoint in &self.endpoints {
            write_1(f, &endpoint.name, &endpoint.url)?;
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/isitup/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```rust,no_run
    /// use isitup_service::config::Config;
    ///
    /// let cfg = Config::from_config(None::<&std::path::Path>)?;
    /// println!("{}", cfg);
    /// # Ok::<(), isitup_service::config::ConfigError>(())
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let mut config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::Read { path: config_path.clone(), source })?;
            toml::from_str::<Self>(raw_string.as_str())
                .map_err(|source| ConfigError::Parse { path: config_path.clone(), source })?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.source_path = Some(config_path);
        config.validate()?;
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })?;
        }

        fs::write(path, config_str).map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })
    }

    /// Reject values the checker cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout(self.probe.timeout_seconds).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        validate_check_interval(self.checks.interval_seconds)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.checks.max_concurrency == 0 {
            return Err(ConfigError::Invalid("max_concurrency must be at least 1".to_string()));
        }
        if self.notifications.cooldown_seconds < 0 {
            return Err(ConfigError::Invalid("cooldown_seconds cannot be negative".to_string()));
        }
        if let Some(webhook) = &self.notifications.webhook_url {
            validate_target(webhook).map_err(|e| ConfigError::Invalid(format!("webhook_url: {}", e)))?;
        }

        Ok(())
    }

    /// Database location, resolved against the config file's directory
    pub fn database_path(&self) -> path::PathBuf {
        let base = self
            .source_path
            .as_deref()
            .and_then(path::Path::parent)
            .map(path::Path::to_path_buf)
            .unwrap_or_default();

        match &self.storage.database_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => base.join(path),
            None => base.join(DEFAULT_DATABASE_FILE),
        }
    }
}
