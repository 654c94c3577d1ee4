//! Application services and ports.

#![forbid(unsafe_code)]

mod dashboard_service;
mod rule_ports;
mod rule_replica;
mod rule_service;
mod storage;

pub use dashboard_service::DashboardService;
pub use rule_ports::{RateLimitBandInput, RuleChangeNotifier, RuleInput, RuleRepository};
pub use rule_replica::{RuleReplica, RuleSnapshot};
pub use rule_service::RuleService;
pub use storage::DEFAULT_OPERATION_TIMEOUT;
