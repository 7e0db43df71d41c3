// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retry policy: bounded attempts with exponential backoff.
//
// Classifies errors into Transient (auto-retry), UserAction (wait for an
// operator) and Permanent (give up).  Only transient errors trigger automatic
// redelivery.  The schedule is deterministic, with no jitter: a single
// printer has no thundering herd to spread out.

use std::time::Duration;

use ticketpress_core::error::TicketpressError;
use ticketpress_core::types::ErrorClass;
use tracing::{debug, info, warn};

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delivery attempts allowed before a job is marked failed.
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles each time.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
        }
    }
}

/// What to do with a job whose delivery just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Put it back after this delay.
    RetryAfter(Duration),
    /// Do not retry; the error class says it cannot help.
    GiveUp(ErrorClass),
    /// Attempt cap reached.
    Exhausted,
}

/// Classify a `TicketpressError` for retry decisions.
pub fn classify_error(err: &TicketpressError) -> ErrorClass {
    match err {
        // Network, timeout, or a momentarily busy store.
        TicketpressError::TransientDelivery(_) => ErrorClass::Transient,
        TicketpressError::Upstream(_) => ErrorClass::Transient,
        TicketpressError::Database(_) => ErrorClass::Transient,
        TicketpressError::Io(_) => ErrorClass::Transient,

        // Already out of automatic attempts.
        TicketpressError::ExhaustedRetries { .. } => ErrorClass::UserAction,

        // Missing order, corrupt row, bad input.
        TicketpressError::NotFound { .. } => ErrorClass::Permanent,
        TicketpressError::Validation(_) => ErrorClass::Permanent,
        TicketpressError::Authenticity(_) => ErrorClass::Permanent,
        TicketpressError::Serialization(_) => ErrorClass::Permanent,
    }
}

/// Decide what happens after a failure.  `attempts` counts every delivery
/// started for the job, including the one that just failed.
pub fn should_retry(err: &TicketpressError, attempts: u32, config: &RetryConfig) -> RetryDecision {
    match classify_error(err) {
        ErrorClass::Permanent => {
            info!("permanent error; not retrying");
            RetryDecision::GiveUp(ErrorClass::Permanent)
        }
        ErrorClass::UserAction => {
            info!("operator action required; not auto-retrying");
            RetryDecision::GiveUp(ErrorClass::UserAction)
        }
        ErrorClass::Transient => {
            if attempts >= config.max_attempts {
                warn!(attempts, max = config.max_attempts, "retry limit exhausted");
                RetryDecision::Exhausted
            } else {
                let delay = backoff_delay(attempts, config);
                debug!(attempts, delay_ms = delay.as_millis(), "scheduling retry");
                RetryDecision::RetryAfter(delay)
            }
        }
    }
}

/// `min(base * 2^(attempts-1), max)`.
///
/// With the defaults the delays after attempts 1..=5 are 5, 10, 20, 40 and
/// 80 seconds.
pub fn backoff_delay(attempts: u32, config: &RetryConfig) -> Duration {
    let exponent = attempts.saturating_sub(1).min(20);
    config
        .base_delay
        .saturating_mul(1u32 << exponent)
        .min(config.max_delay)
}
