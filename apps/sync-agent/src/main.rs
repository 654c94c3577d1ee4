//! Fluxgate rule sync agent.
//!
//! Keeps an enforcement-side [`RuleReplica`] current by applying change
//! events from the Redis channel and running a periodic full resync that
//! repairs anything a dropped event left stale.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use fluxgate_application::{DEFAULT_OPERATION_TIMEOUT, RuleReplica};
use fluxgate_core::{AppError, AppResult};
use fluxgate_domain::RuleChangeEvent;
use fluxgate_infrastructure::{DEFAULT_RULE_CHANGE_CHANNEL, PostgresRuleRepository};
use futures::StreamExt;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
struct SyncAgentConfig {
    database_url: String,
    redis_url: String,
    channel: String,
    full_resync_interval: Duration,
    storage_timeout: Duration,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = SyncAgentConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let replica = Arc::new(
        RuleReplica::new(Arc::new(PostgresRuleRepository::new(pool)))
            .with_operation_timeout(config.storage_timeout),
    );
    let client = redis::Client::open(config.redis_url.as_str())
        .map_err(|error| AppError::Internal(format!("invalid REDIS_URL: {error}")))?;

    info!(
        channel = %config.channel,
        full_resync_interval_secs = config.full_resync_interval.as_secs(),
        "fluxgate-sync-agent started"
    );

    replica.full_reload().await?;

    loop {
        if let Err(error) = follow_channel(&client, &replica, &config).await {
            warn!(
                channel = %config.channel,
                error = %error,
                "rule change subscription interrupted"
            );
        }

        tokio::time::sleep(RECONNECT_DELAY).await;

        // Events published while disconnected are lost; resync before resubscribing.
        if let Err(error) = replica.full_reload().await {
            warn!(error = %error, "full resync after reconnect failed");
        }
    }
}

/// Applies channel events until the subscription ends.
async fn follow_channel(
    client: &redis::Client,
    replica: &RuleReplica,
    config: &SyncAgentConfig,
) -> AppResult<()> {
    let mut pubsub = client
        .get_async_pubsub()
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;
    pubsub
        .subscribe(config.channel.as_str())
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to subscribe to '{}': {error}",
                config.channel
            ))
        })?;
    info!(channel = %config.channel, "subscribed to rule changes");

    let mut messages = pubsub.on_message();
    let mut resync = tokio::time::interval(config.full_resync_interval);
    resync.set_missed_tick_behavior(MissedTickBehavior::Delay);
    resync.tick().await;

    loop {
        tokio::select! {
            message = messages.next() => {
                let Some(message) = message else {
                    return Err(AppError::Internal("redis subscription closed".to_owned()));
                };

                let payload = match message.get_payload::<String>() {
                    Ok(payload) => payload,
                    Err(error) => {
                        warn!(error = %error, "ignoring non-text rule change message");
                        continue;
                    }
                };

                handle_payload(replica, payload.as_str()).await;
            }
            _ = resync.tick() => {
                if let Err(error) = replica.full_reload().await {
                    warn!(error = %error, "periodic full resync failed");
                }
            }
        }
    }
}

async fn handle_payload(replica: &RuleReplica, payload: &str) {
    let event = match decode_event(payload) {
        Ok(event) => event,
        Err(error) => {
            warn!(error = %error, "ignoring malformed rule change event");
            return;
        }
    };

    debug!(
        event_id = %event.event_id(),
        scope = event.scope().scope_type(),
        rule_set_id = event.scope().rule_set_id(),
        "applying rule change"
    );

    match replica.apply(event.scope()).await {
        Ok(snapshot) => {
            debug!(
                event_id = %event.event_id(),
                generation = snapshot.generation(),
                cached_rules = snapshot.len(),
                enforced_rules = snapshot.enabled_rules().count(),
                "rule replica updated"
            );
        }
        Err(error) => {
            // The next periodic resync converges the replica.
            warn!(
                event_id = %event.event_id(),
                error = %error,
                "failed to apply rule change"
            );
        }
    }
}

fn decode_event(payload: &str) -> AppResult<RuleChangeEvent> {
    serde_json::from_str(payload)
        .map_err(|error| AppError::Internal(format!("invalid rule change event: {error}")))
}

impl SyncAgentConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let redis_url = required_env("REDIS_URL")?;
        let channel = env::var("RULE_CHANGE_CHANNEL")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_RULE_CHANGE_CHANNEL.to_owned());
        let full_resync_interval_secs = parse_env_u64("FULL_RESYNC_INTERVAL_SECS", 60)?;
        let storage_timeout_ms = parse_env_u64(
            "STORAGE_TIMEOUT_MS",
            u64::try_from(DEFAULT_OPERATION_TIMEOUT.as_millis()).unwrap_or(5_000),
        )?;

        if full_resync_interval_secs == 0 {
            return Err(AppError::Internal(
                "FULL_RESYNC_INTERVAL_SECS must be greater than zero".to_owned(),
            ));
        }
        if storage_timeout_ms == 0 {
            return Err(AppError::Internal(
                "STORAGE_TIMEOUT_MS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            redis_url,
            channel,
            full_resync_interval: Duration::from_secs(full_resync_interval_secs),
            storage_timeout: Duration::from_millis(storage_timeout_ms),
        })
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(4)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Internal(format!("{name} is required")))
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Internal(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
