//! Retry policy
//!
//! Every retry loop in the pipeline runs under a [`RetryPolicy`]: a bounded
//! attempt budget plus a delay curve. Exhausting the budget surfaces as
//! [`HarvestError::RetriesExhausted`] instead of looping forever, so a
//! persistent upstream outage reaches the operator.

use std::time::Duration;

use harvester_common::{HarvestError, Result};
use tokio_util::sync::CancellationToken;

/// Cap on a single backoff delay. Exponential curves with a high attempt
/// count would otherwise sleep for years.
const MAX_DELAY_SECS: u64 = 300;

/// Delay curve between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    /// Same delay before every retry.
    Fixed(Duration),
    /// `base^attempt` seconds before retry number `attempt` (0-based).
    Exponential { base_secs: u64 },
}

impl Delay {
    /// Delay to sleep before the given 0-based retry attempt.
    pub fn for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Delay::Fixed(d) => *d,
            Delay::Exponential { base_secs } => {
                let secs = base_secs.saturating_pow(attempt).min(MAX_DELAY_SECS);
                Duration::from_secs(secs)
            },
        }
    }
}

/// Bounded retry policy: attempt budget + delay curve
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts allowed (including the first).
    pub max_attempts: u32,
    pub delay: Delay,
}

impl RetryPolicy {
    /// Policy for calls whose failures are assumed transient: fixed short
    /// delay, large bounded budget.
    pub fn transient(delay_secs: u64, max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Delay::Fixed(Duration::from_secs(delay_secs)),
        }
    }

    /// Policy for token acquisition: exponential backoff with a hard ceiling.
    pub fn exponential(base_secs: u64, max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Delay::Exponential { base_secs },
        }
    }

    /// Sleep before the given 0-based retry attempt, waking early on
    /// cancellation.
    pub async fn pause(&self, attempt: u32, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(HarvestError::Cancelled);
        }

        tokio::select! {
            _ = cancel.cancelled() => Err(HarvestError::Cancelled),
            _ = tokio::time::sleep(self.delay.for_attempt(attempt)) => Ok(()),
        }
    }
}
