//! Redis pub/sub transport for rule change events.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, warn};

use fluxgate_application::RuleChangeNotifier;
use fluxgate_core::{AppError, AppResult};
use fluxgate_domain::RuleChangeEvent;

/// Default channel enforcement nodes subscribe to.
pub const DEFAULT_RULE_CHANGE_CHANNEL: &str = "fluxgate:rule-changes";

const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Publishes JSON-encoded change events on one Redis channel.
///
/// Pub/sub delivery is fire-and-forget on the broker side; subscribers that
/// were disconnected recover through their periodic full resync.
#[derive(Clone)]
pub struct RedisRuleChangeNotifier {
    client: redis::Client,
    channel: String,
    publish_attempts: u32,
}

impl RedisRuleChangeNotifier {
    /// Creates a notifier publishing on `channel`.
    #[must_use]
    pub fn new(client: redis::Client, channel: impl Into<String>) -> Self {
        Self {
            client,
            channel: channel.into(),
            publish_attempts: 3,
        }
    }

    /// Sets how many times one event is published before giving up.
    #[must_use]
    pub fn with_publish_attempts(mut self, attempts: u32) -> Self {
        self.publish_attempts = attempts.max(1);
        self
    }

    /// Returns the channel name.
    #[must_use]
    pub fn channel(&self) -> &str {
        self.channel.as_str()
    }

    async fn publish_once(&self, payload: &str) -> AppResult<u64> {
        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        connection
            .publish::<_, _, u64>(self.channel.as_str(), payload)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to publish rule change event: {error}"))
            })
    }
}

#[async_trait]
impl RuleChangeNotifier for RedisRuleChangeNotifier {
    async fn notify(&self, event: RuleChangeEvent) -> AppResult<()> {
        let payload = serde_json::to_string(&event).map_err(|error| {
            AppError::Internal(format!("failed to encode rule change event: {error}"))
        })?;

        let mut attempt = 1;
        loop {
            match self.publish_once(payload.as_str()).await {
                Ok(receivers) => {
                    debug!(
                        channel = %self.channel,
                        event_id = %event.event_id(),
                        receivers,
                        "rule change event published"
                    );
                    return Ok(());
                }
                Err(error) if attempt < self.publish_attempts => {
                    warn!(
                        channel = %self.channel,
                        event_id = %event.event_id(),
                        attempt,
                        error = %error,
                        "retrying rule change publish"
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
