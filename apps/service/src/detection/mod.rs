//! Latency anomaly detection.
//!
//! The newest latency sample is compared against a rolling baseline built from
//! the samples before it. Short histories are never judged statistically, and
//! samples with injected latency are only ever compared against real ones.

use serde::{Deserialize, Serialize};

use crate::monitoring::types::CheckSample;

/// Verdict on the most recent latency sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Unknown,
    Stable,
    Degrading,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Samples required before a statistical verdict is given
    pub minimum_samples: usize,
    /// Most recent latency samples considered
    pub window_size: usize,
    /// Standard deviations above the baseline mean that count as degrading
    pub threshold_multiplier: f64,
    /// Absolute latency that marks a simulated sample degrading when there is no baseline
    pub simulated_fallback_degrading_ms: f64,
    /// Margin over the baseline mean that marks a simulated sample degrading
    pub simulated_margin_ms: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            minimum_samples: 10,
            window_size: 50,
            threshold_multiplier: 2.5,
            simulated_fallback_degrading_ms: 1800.0,
            simulated_margin_ms: 500.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LatencyPoint {
    latency_ms: f64,
    simulated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    config: DetectorConfig,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Classify the newest latency sample in `samples` (oldest first)
    pub fn classify(&self, samples: &[CheckSample]) -> Trend {
        let points: Vec<LatencyPoint> = samples
            .iter()
            .filter(|sample| sample.state.is_latency_eligible())
            .filter_map(|sample| {
                sample.latency_ms.map(|latency| LatencyPoint {
                    latency_ms: latency as f64,
                    simulated: sample.is_simulated(),
                })
            })
            .collect();

        let window = &points[points.len().saturating_sub(self.config.window_size)..];

        let Some((latest, previous)) = window.split_last() else {
            return Trend::Unknown;
        };

        if window.len() < self.config.minimum_samples {
            return if latest.simulated { self.fallback(latest) } else { Trend::Unknown };
        }

        let baseline: Vec<f64> = previous
            .iter()
            .filter(|point| !latest.simulated || !point.simulated)
            .map(|point| point.latency_ms)
            .collect();

        if baseline.is_empty() {
            return self.fallback(latest);
        }

        let (mean, stddev) = mean_and_stddev(&baseline);

        let above_std_threshold =
            latest.latency_ms > mean + self.config.threshold_multiplier * stddev;
        let above_simulated_threshold =
            latest.simulated && latest.latency_ms > mean + self.config.simulated_margin_ms;

        if above_std_threshold || above_simulated_threshold {
            Trend::Degrading
        } else {
            Trend::Stable
        }
    }

    fn fallback(&self, latest: &LatencyPoint) -> Trend {
        if latest.latency_ms >= self.config.simulated_fallback_degrading_ms {
            Trend::Degrading
        } else {
            Trend::Unknown
        }
    }
}

/// Mean and population standard deviation
fn mean_and_stddev(values: &[f64]) -> (f64, f64) {
    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;
    let variance = values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / count;
    (mean, variance.sqrt())
}
