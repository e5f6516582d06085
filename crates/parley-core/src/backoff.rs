//! Reconnect policy and backoff calculation.
//!
//! Provides the portable, sync-only building blocks for the connection
//! manager's reconnect loop. The actual async scheduling lives in
//! `parley-session` (which has access to tokio); this module contains only
//! the policy parameters and the delay math.
//!
//! The protocol uses *linear* backoff: attempt `n` waits `base_delay * n`.
//! Attempts are capped by `max_attempts`, after which the connection settles
//! in terminal `Disconnected`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default base delay between reconnect attempts in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Default maximum number of reconnect attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Parameters governing reconnection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectPolicy {
    /// Base delay for linear backoff in ms (default: 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum reconnect attempts before giving up (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based).
    ///
    /// Linear backoff: `base_delay * attempt`. An attempt number of 0 is
    /// clamped to 1 so a buggy caller still gets a non-zero delay.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let n = u64::from(attempt.max(1));
        Duration::from_millis(self.base_delay_ms.saturating_mul(n))
    }

    /// Whether `attempt` (1-based) exceeds the configured maximum.
    #[must_use]
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt > self.max_attempts
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.base_delay_ms, 1000);
        assert_eq!(policy.max_attempts, 5);
    }

    #[test]
    fn linear_growth() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(3000));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(5000));
    }

    #[test]
    fn attempt_zero_clamps_to_one() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(1000));
    }

    #[test]
    fn large_attempt_does_not_overflow() {
        let policy = ReconnectPolicy {
            base_delay_ms: u64::MAX / 2,
            max_attempts: 5,
        };
        // Saturates rather than panicking.
        let _ = policy.delay_for_attempt(u32::MAX);
    }

    #[test]
    fn exhaustion_boundary() {
        let policy = ReconnectPolicy {
            base_delay_ms: 100,
            max_attempts: 3,
        };
        assert!(!policy.is_exhausted(1));
        assert!(!policy.is_exhausted(3));
        assert!(policy.is_exhausted(4));
    }

    #[test]
    fn serde_defaults() {
        let policy: ReconnectPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy, ReconnectPolicy::default());
    }

    #[test]
    fn serde_roundtrip() {
        let policy = ReconnectPolicy {
            base_delay_ms: 250,
            max_attempts: 8,
        };
        let json = serde_json::to_string(&policy).unwrap();
        assert!(json.contains("baseDelayMs"));
        let back: ReconnectPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, policy);
    }
}
