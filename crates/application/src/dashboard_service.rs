use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use fluxgate_core::AppResult;
use fluxgate_domain::DashboardStats;

use crate::rule_ports::RuleRepository;
use crate::storage::{DEFAULT_OPERATION_TIMEOUT, bounded_storage_call};

/// Read-only aggregation over the rule collection.
#[derive(Clone)]
pub struct DashboardService {
    repository: Arc<dyn RuleRepository>,
    operation_timeout: Duration,
}

impl DashboardService {
    /// Creates a new dashboard service.
    #[must_use]
    pub fn new(repository: Arc<dyn RuleRepository>) -> Self {
        Self {
            repository,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Bounds the repository scan by `timeout`.
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Scans all rules once and returns aggregate counts.
    pub async fn stats(&self) -> AppResult<DashboardStats> {
        debug!("fetching dashboard statistics");
        let rules = bounded_storage_call(
            self.operation_timeout,
            "getStats",
            self.repository.find_all(),
        )
        .await?;

        Ok(DashboardStats::from_rules(&rules, Utc::now()))
    }
}
