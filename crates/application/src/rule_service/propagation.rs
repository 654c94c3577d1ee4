use tracing::{debug, warn};

use fluxgate_domain::{RuleChangeEvent, RuleChangeScope};

use super::RuleService;

/// Result of a committed repository write plus the scope it invalidates.
#[derive(Debug)]
pub(super) struct Committed<T> {
    value: T,
    scope: RuleChangeScope,
}

impl<T> Committed<T> {
    pub(super) fn new(value: T, scope: RuleChangeScope) -> Self {
        Self { value, scope }
    }
}

impl RuleService {
    /// Emits the change event for a committed mutation and returns its value.
    ///
    /// Delivery is best effort from the caller's point of view; failures and
    /// timeouts are logged and left to the notifier's own resync design.
    pub(super) async fn propagate<T>(&self, committed: Committed<T>) -> T {
        let Committed { value, scope } = committed;
        let event = RuleChangeEvent::new(scope);
        let event_id = event.event_id();
        let scope_type = event.scope().scope_type();
        let rule_set_id = event.scope().rule_set_id().map(str::to_owned);

        match tokio::time::timeout(self.operation_timeout, self.notifier.notify(event)).await {
            Ok(Ok(())) => {
                debug!(
                    %event_id,
                    scope = scope_type,
                    rule_set_id = rule_set_id.as_deref(),
                    "rule change notified"
                );
            }
            Ok(Err(error)) => {
                warn!(
                    %event_id,
                    scope = scope_type,
                    rule_set_id = rule_set_id.as_deref(),
                    error = %error,
                    "rule change notification failed"
                );
            }
            Err(_) => {
                warn!(
                    %event_id,
                    scope = scope_type,
                    rule_set_id = rule_set_id.as_deref(),
                    "rule change notification timed out"
                );
            }
        }

        value
    }
}
