//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_rule_repository;
mod logging_rule_change_notifier;
mod postgres_rule_repository;
mod redis_rule_change_notifier;

pub use in_memory_rule_repository::InMemoryRuleRepository;
pub use logging_rule_change_notifier::LoggingRuleChangeNotifier;
pub use postgres_rule_repository::PostgresRuleRepository;
pub use redis_rule_change_notifier::{DEFAULT_RULE_CHANGE_CHANNEL, RedisRuleChangeNotifier};
