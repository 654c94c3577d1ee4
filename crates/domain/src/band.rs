use std::time::Duration;

use fluxgate_core::{AppError, AppResult};
use serde::Serialize;

/// One throughput ceiling: `capacity` requests per `window_seconds`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitBand {
    window_seconds: u64,
    capacity: u64,
    label: Option<String>,
}

impl RateLimitBand {
    /// Creates a validated band. Window and capacity must both be at least 1.
    pub fn new(window_seconds: u64, capacity: u64, label: Option<String>) -> AppResult<Self> {
        if window_seconds < 1 {
            return Err(AppError::validation(
                "bands.windowSeconds",
                "window must be at least 1 second",
            ));
        }

        if capacity < 1 {
            return Err(AppError::validation(
                "bands.capacity",
                "capacity must be at least 1",
            ));
        }

        Ok(Self {
            window_seconds,
            capacity,
            label: label.filter(|value| !value.trim().is_empty()),
        })
    }

    /// Returns the band window in whole seconds.
    #[must_use]
    pub fn window_seconds(&self) -> u64 {
        self.window_seconds
    }

    /// Returns the band window.
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    /// Returns the number of requests allowed per window.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Returns the optional display label.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}
