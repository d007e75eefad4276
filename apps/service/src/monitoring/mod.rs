/// Monitoring module - probing, validation and scheduling of endpoint checks
///
/// This module is responsible for:
/// - Probing HTTP/HTTPS endpoints
/// - Validating configured targets and check settings
/// - Scheduling periodic check-all passes
pub mod checker;
pub mod scheduler;
pub mod types;
pub mod validation;

pub use checker::{HttpProber, MockProber, Prober};
pub use scheduler::MonitoringScheduler;
pub use types::{CheckSample, EndpointConfig, EndpointStatus, HealthState};
