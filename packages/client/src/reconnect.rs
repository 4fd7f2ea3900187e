//! Reconnection policy.
//!
//! This module contains pure functions that decide whether and when to
//! reconnect, without side effects, making them easy to test.

use std::time::Duration;

const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(250);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
const DEFAULT_MULTIPLIER: u32 = 2;

/// Delay schedule between reconnection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first attempt after a close
    pub initial_delay: Duration,
    /// Upper bound for any delay
    pub max_delay: Duration,
    /// Growth factor between consecutive attempts
    pub multiplier: u32,
    /// Give up after this many consecutive failed attempts; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Constant delay between attempts.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1,
            max_attempts: None,
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Delay before attempt number `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1).checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Check if the client should attempt to reconnect.
///
/// # Arguments
///
/// * `can_connect` - `false` once the user stopped the client
/// * `current_attempt` - The current reconnection attempt count (0-indexed)
/// * `policy` - The reconnection policy in effect
///
/// # Returns
///
/// `true` if reconnection should be attempted, `false` otherwise
pub fn should_attempt_reconnect(
    can_connect: bool,
    current_attempt: u32,
    policy: &ReconnectPolicy,
) -> bool {
    // An explicit stop always wins
    if !can_connect {
        return false;
    }

    match policy.max_attempts {
        Some(max_attempts) => current_attempt < max_attempts,
        None => true,
    }
}
