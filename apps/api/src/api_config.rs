use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use fluxgate_application::DEFAULT_OPERATION_TIMEOUT;
use fluxgate_core::AppError;
use fluxgate_infrastructure::DEFAULT_RULE_CHANGE_CHANNEL;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleStoreConfig {
    Postgres { database_url: String },
    Memory,
}

impl RuleStoreConfig {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres { .. } => "postgres",
            Self::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleChangeNotifierKind {
    Redis,
    Log,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub api_host: String,
    pub api_port: u16,
    pub rule_store: RuleStoreConfig,
    pub redis_url: Option<String>,
    pub rule_change_notifier: RuleChangeNotifierKind,
    pub rule_change_channel: String,
    pub rule_change_publish_attempts: u32,
    pub storage_timeout: Duration,
    pub cors_allowed_origins: Vec<String>,
    pub admin_api_token: Option<String>,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");
        Self::from_lookup(migrate_only, |name| env::var(name).ok())
    }

    fn from_lookup(
        migrate_only: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_host = non_empty("API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned());
        let api_port = parse_or("API_PORT", non_empty("API_PORT"), 8090_u16)?;

        let rule_store = match non_empty("RULE_STORE")
            .unwrap_or_else(|| "postgres".to_owned())
            .as_str()
        {
            "postgres" => RuleStoreConfig::Postgres {
                database_url: non_empty("DATABASE_URL").ok_or_else(|| {
                    AppError::Internal("DATABASE_URL is required when RULE_STORE=postgres".to_owned())
                })?,
            },
            "memory" => RuleStoreConfig::Memory,
            other => {
                return Err(AppError::Internal(format!(
                    "RULE_STORE must be either 'postgres' or 'memory', got '{other}'"
                )));
            }
        };

        let redis_url = non_empty("REDIS_URL");
        let rule_change_notifier = match non_empty("RULE_CHANGE_NOTIFIER").as_deref() {
            Some("redis") => RuleChangeNotifierKind::Redis,
            Some("log") => RuleChangeNotifierKind::Log,
            Some(other) => {
                return Err(AppError::Internal(format!(
                    "RULE_CHANGE_NOTIFIER must be either 'redis' or 'log', got '{other}'"
                )));
            }
            None if redis_url.is_some() => RuleChangeNotifierKind::Redis,
            None => RuleChangeNotifierKind::Log,
        };
        if rule_change_notifier == RuleChangeNotifierKind::Redis && redis_url.is_none() {
            return Err(AppError::Internal(
                "REDIS_URL is required when RULE_CHANGE_NOTIFIER=redis".to_owned(),
            ));
        }

        let rule_change_channel = non_empty("RULE_CHANGE_CHANNEL")
            .unwrap_or_else(|| DEFAULT_RULE_CHANGE_CHANNEL.to_owned());
        let rule_change_publish_attempts = parse_or(
            "RULE_CHANGE_PUBLISH_ATTEMPTS",
            non_empty("RULE_CHANGE_PUBLISH_ATTEMPTS"),
            3_u32,
        )?;
        let default_timeout_ms =
            u64::try_from(DEFAULT_OPERATION_TIMEOUT.as_millis()).unwrap_or(5_000);
        let storage_timeout_ms = parse_or(
            "STORAGE_TIMEOUT_MS",
            non_empty("STORAGE_TIMEOUT_MS"),
            default_timeout_ms,
        )?;
        if storage_timeout_ms == 0 {
            return Err(AppError::Internal(
                "STORAGE_TIMEOUT_MS must be greater than zero".to_owned(),
            ));
        }
        let storage_timeout = Duration::from_millis(storage_timeout_ms);

        let cors_allowed_origins = non_empty("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_owned())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_owned)
            .collect();

        Ok(Self {
            migrate_only,
            api_host,
            api_port,
            rule_store,
            redis_url,
            rule_change_notifier,
            rule_change_channel,
            rule_change_publish_attempts,
            storage_timeout,
            cors_allowed_origins,
            admin_api_token: non_empty("ADMIN_API_TOKEN"),
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_or<T>(name: &str, value: Option<String>, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|error| AppError::Internal(format!("invalid {name} '{value}': {error}"))),
        None => Ok(default),
    }
}
