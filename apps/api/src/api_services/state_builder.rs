use std::sync::Arc;

use fluxgate_application::{DashboardService, RuleChangeNotifier, RuleRepository, RuleService};
use fluxgate_core::AppError;
use fluxgate_infrastructure::{
    InMemoryRuleRepository, LoggingRuleChangeNotifier, PostgresRuleRepository,
    RedisRuleChangeNotifier,
};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::api_config::{ApiConfig, RuleChangeNotifierKind};
use crate::state::{AppState, RuleChangeChannel};

use super::redis::build_redis_client;

pub fn build_app_state(pool: Option<PgPool>, config: &ApiConfig) -> Result<AppState, AppError> {
    let repository: Arc<dyn RuleRepository> = match &pool {
        Some(pool) => Arc::new(PostgresRuleRepository::new(pool.clone())),
        None => {
            warn!("using in-memory rule store; rules are lost on restart");
            Arc::new(InMemoryRuleRepository::new())
        }
    };

    let rule_change_channel = match config.rule_change_notifier {
        RuleChangeNotifierKind::Redis => {
            let redis_url = config.redis_url.as_deref().ok_or_else(|| {
                AppError::Internal("REDIS_URL is required when RULE_CHANGE_NOTIFIER=redis".to_owned())
            })?;
            Some(RuleChangeChannel {
                client: build_redis_client(redis_url)?,
                name: config.rule_change_channel.clone(),
            })
        }
        RuleChangeNotifierKind::Log => None,
    };

    let notifier: Arc<dyn RuleChangeNotifier> = match &rule_change_channel {
        Some(channel) => Arc::new(
            RedisRuleChangeNotifier::new(channel.client.clone(), channel.name.as_str())
                .with_publish_attempts(config.rule_change_publish_attempts),
        ),
        None => Arc::new(LoggingRuleChangeNotifier::new()),
    };

    info!(
        notifier = ?config.rule_change_notifier,
        channel = %config.rule_change_channel,
        storage_timeout_ms = u64::try_from(config.storage_timeout.as_millis()).unwrap_or(u64::MAX),
        "rule services configured"
    );

    Ok(AppState {
        rule_service: RuleService::new(repository.clone(), notifier)
            .with_operation_timeout(config.storage_timeout),
        dashboard_service: DashboardService::new(repository)
            .with_operation_timeout(config.storage_timeout),
        admin_api_token: config.admin_api_token.clone(),
        postgres_pool: pool,
        rule_change_channel,
    })
}
