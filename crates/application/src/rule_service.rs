//! Rule mutation service.
//!
//! Every mutation validates its input, enforces existence or uniqueness
//! against the repository, writes a freshly built immutable rule and then
//! hands the committed result to [`RuleService::propagate`], which emits the
//! change notification. Notification faults never fail the call: the
//! repository write is the commit point.

use std::sync::Arc;
use std::time::Duration;

use crate::rule_ports::{RuleChangeNotifier, RuleRepository};
use crate::storage::DEFAULT_OPERATION_TIMEOUT;

mod mutations;
mod propagation;
mod queries;

#[cfg(test)]
mod tests;

/// Application service for administrative rule management.
#[derive(Clone)]
pub struct RuleService {
    repository: Arc<dyn RuleRepository>,
    notifier: Arc<dyn RuleChangeNotifier>,
    operation_timeout: Duration,
}

impl RuleService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        repository: Arc<dyn RuleRepository>,
        notifier: Arc<dyn RuleChangeNotifier>,
    ) -> Self {
        Self {
            repository,
            notifier,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Bounds every repository and notifier call by `timeout`.
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}
