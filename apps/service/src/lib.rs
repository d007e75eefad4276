//! Endpoint health monitoring: concurrent checks, latency anomaly detection,
//! bounded sample history, cooldown-gated alerting and a daily digest.

pub mod clock;
pub mod config;
pub mod database;
pub mod detection;
pub mod digest;
pub mod endpoints;
pub mod monitoring;
pub mod notify;
pub mod orchestrator;
pub mod pool;
pub mod storage;
