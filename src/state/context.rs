use std::time::Duration;

use serde::{Serialize, Serializer};
use thiserror::Error;

pub const INITIAL_RECONNECTION_DELAY: Duration = Duration::from_secs(1);
pub const MAX_RECONNECTION_DELAY: Duration = Duration::from_secs(180);
pub const RECONNECTION_DELAY_MULTIPLIER: f64 = 1.3;
/// Accumulated retry delay after which a retry re-fetches tokens, VPN info
/// and the location list before reselecting an endpoint.
pub const REFRESH_THRESHOLD: Duration = Duration::from_secs(70);

// ─── BackoffPolicy ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub refresh_threshold: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: INITIAL_RECONNECTION_DELAY,
            max_delay: MAX_RECONNECTION_DELAY,
            multiplier: RECONNECTION_DELAY_MULTIPLIER,
            refresh_threshold: REFRESH_THRESHOLD,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("initial reconnection delay must be non-zero")]
    ZeroInitialDelay,
    #[error("max reconnection delay {max:?} is below the initial delay {initial:?}")]
    MaxBelowInitial { initial: Duration, max: Duration },
    #[error("backoff multiplier {0} must be a finite number >= 1.0")]
    InvalidMultiplier(f64),
}

impl BackoffPolicy {
    pub fn validate(self) -> Result<Self, PolicyError> {
        if self.initial_delay.is_zero() {
            return Err(PolicyError::ZeroInitialDelay);
        }
        if self.max_delay < self.initial_delay {
            return Err(PolicyError::MaxBelowInitial {
                initial: self.initial_delay,
                max: self.max_delay,
            });
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(PolicyError::InvalidMultiplier(self.multiplier));
        }
        Ok(self)
    }

    /// Next delay in the sequence, capped at `max_delay`.
    pub fn grow(&self, delay: Duration) -> Duration {
        let grown = delay.as_secs_f64() * self.multiplier;
        match grown >= self.max_delay.as_secs_f64() {
            true => self.max_delay,
            false => Duration::from_secs_f64(grown).max(delay),
        }
    }
}

// ─── ConnectivityContext ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectivityContext {
    pub retry_count: u32,
    #[serde(rename = "current_reconnection_delay_ms", serialize_with = "as_millis")]
    pub reconnection_delay: Duration,
    #[serde(
        rename = "time_since_last_retry_with_refresh_ms",
        serialize_with = "as_millis"
    )]
    pub time_since_last_retry_with_refresh: Duration,
    pub desktop_vpn_enabled: bool,
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

impl ConnectivityContext {
    pub fn new(policy: &BackoffPolicy) -> Self {
        Self {
            retry_count: 0,
            reconnection_delay: policy.initial_delay,
            time_since_last_retry_with_refresh: Duration::ZERO,
            desktop_vpn_enabled: false,
        }
    }

    pub fn increment_reconnection_delay(&mut self, policy: &BackoffPolicy) {
        self.reconnection_delay = policy.grow(self.reconnection_delay);
    }

    /// Counts the retry and accumulates the delay that was just waited out.
    pub fn increment_retry_count(&mut self) {
        self.retry_count = self.retry_count.saturating_add(1);
        self.time_since_last_retry_with_refresh = self
            .time_since_last_retry_with_refresh
            .saturating_add(self.reconnection_delay);
    }

    pub fn needs_refresh(&self, policy: &BackoffPolicy) -> bool {
        self.time_since_last_retry_with_refresh > policy.refresh_threshold
    }

    pub fn update_refresh_timer(&mut self, policy: &BackoffPolicy) {
        if self.needs_refresh(policy) {
            self.time_since_last_retry_with_refresh = Duration::ZERO;
        }
    }

    /// Back to defaults; the desktop flag is owned by its own event.
    pub fn reset(&mut self, policy: &BackoffPolicy) {
        *self = Self {
            desktop_vpn_enabled: self.desktop_vpn_enabled,
            ..Self::new(policy)
        };
    }
}
