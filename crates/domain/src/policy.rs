use std::fmt::{Display, Formatter};
use std::str::FromStr;

use fluxgate_core::AppError;
use serde::{Deserialize, Serialize};

/// Traffic dimension a rule partitions requests by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LimitScope {
    /// One shared budget for all traffic.
    Global,
    /// Budget per API key.
    PerApiKey,
    /// Budget per authenticated user.
    PerUser,
    /// Budget per client IP address.
    PerIp,
    /// Budget keyed by a custom key strategy.
    Custom,
}

impl LimitScope {
    /// Returns the stable transport and storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "GLOBAL",
            Self::PerApiKey => "PER_API_KEY",
            Self::PerUser => "PER_USER",
            Self::PerIp => "PER_IP",
            Self::Custom => "CUSTOM",
        }
    }

    /// Returns all known scopes.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[LimitScope] = &[
            LimitScope::Global,
            LimitScope::PerApiKey,
            LimitScope::PerUser,
            LimitScope::PerIp,
            LimitScope::Custom,
        ];

        ALL
    }
}

impl FromStr for LimitScope {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|scope| scope.as_str() == value)
            .ok_or_else(|| {
                AppError::validation(
                    "scope",
                    format!(
                        "unknown scope '{value}', expected one of: GLOBAL, PER_API_KEY, PER_USER, PER_IP, CUSTOM"
                    ),
                )
            })
    }
}

impl Display for LimitScope {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Enforcement behavior once a band is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnLimitExceedPolicy {
    /// Reject the request immediately.
    RejectRequest,
    /// Hold the request until the band refills.
    WaitForRefill,
}

impl OnLimitExceedPolicy {
    /// Returns the stable transport and storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RejectRequest => "REJECT_REQUEST",
            Self::WaitForRefill => "WAIT_FOR_REFILL",
        }
    }
}

impl FromStr for OnLimitExceedPolicy {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "REJECT_REQUEST" => Ok(Self::RejectRequest),
            "WAIT_FOR_REFILL" => Ok(Self::WaitForRefill),
            _ => Err(AppError::validation(
                "onLimitExceedPolicy",
                format!(
                    "unknown policy '{value}', expected one of: REJECT_REQUEST, WAIT_FOR_REFILL"
                ),
            )),
        }
    }
}

impl Display for OnLimitExceedPolicy {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}
