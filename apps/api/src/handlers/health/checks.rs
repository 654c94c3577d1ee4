use crate::state::RuleChangeChannel;

use super::*;

pub(super) async fn check_postgres(pool: Option<sqlx::PgPool>) -> HealthDependencyStatus {
    let Some(pool) = pool else {
        return HealthDependencyStatus {
            status: "disabled",
            detail: Some("rule store is in memory".to_owned()),
        };
    };

    let check = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&pool)
        .await;

    match check {
        Ok(_) => HealthDependencyStatus {
            status: "ok",
            detail: None,
        },
        Err(error) => HealthDependencyStatus {
            status: "error",
            detail: Some(format!("postgres check failed: {error}")),
        },
    }
}

/// Reports whether rule changes can be published and how many sync agents
/// currently listen on the channel.
pub(super) async fn check_rule_change_channel(
    channel: Option<RuleChangeChannel>,
) -> HealthDependencyStatus {
    let Some(channel) = channel else {
        return HealthDependencyStatus {
            status: "disabled",
            detail: Some("rule changes are logged only".to_owned()),
        };
    };

    let mut connection = match channel.client.get_multiplexed_async_connection().await {
        Ok(connection) => connection,
        Err(error) => {
            return HealthDependencyStatus {
                status: "error",
                detail: Some(format!("redis connection failed: {error}")),
            };
        }
    };

    let subscribers = redis::cmd("PUBSUB")
        .arg("NUMSUB")
        .arg(channel.name.as_str())
        .query_async::<(String, u64)>(&mut connection)
        .await;

    match subscribers {
        Ok((_, 0)) => HealthDependencyStatus {
            status: "ok",
            detail: Some(format!("no sync agents subscribed to '{}'", channel.name)),
        },
        Ok((_, count)) => HealthDependencyStatus {
            status: "ok",
            detail: Some(format!("{count} subscriber(s) on '{}'", channel.name)),
        },
        Err(error) => HealthDependencyStatus {
            status: "error",
            detail: Some(format!("redis channel check failed: {error}")),
        },
    }
}
