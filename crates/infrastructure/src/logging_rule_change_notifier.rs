//! Rule change notifier that only logs events. Used when no broker is
//! configured; enforcement nodes then rely on periodic full resync.

use async_trait::async_trait;
use tracing::info;

use fluxgate_application::RuleChangeNotifier;
use fluxgate_core::AppResult;
use fluxgate_domain::RuleChangeEvent;

/// Development notifier that writes change events to tracing output.
#[derive(Debug, Clone, Default)]
pub struct LoggingRuleChangeNotifier;

impl LoggingRuleChangeNotifier {
    /// Creates a new logging notifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RuleChangeNotifier for LoggingRuleChangeNotifier {
    async fn notify(&self, event: RuleChangeEvent) -> AppResult<()> {
        info!(
            event_id = %event.event_id(),
            scope = event.scope().scope_type(),
            rule_set_id = event.scope().rule_set_id(),
            emitted_at = %event.emitted_at(),
            "rule change (log only)"
        );

        Ok(())
    }
}
