// ── Tracker tuning ──
//
// Retry budgets and delays for each pending-query category, plus the
// model cache switch. Core never reads config files; `avdecc-config`
// builds a `TrackerConfig` and hands it in.

use std::time::Duration;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay for every attempt.
    #[default]
    Fixed,
    /// Delay doubles with every attempt, capped at `max_delay`.
    Exponential { max_delay: Duration },
}

/// Retry budget of one query category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of retries granted before the category is exhausted.
    pub max_attempts: u16,
    /// Delay before the first retry.
    pub delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);

    pub fn fixed(max_attempts: u16, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: Backoff::Fixed,
        }
    }

    pub fn exponential(max_attempts: u16, delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: Backoff::Exponential { max_delay },
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u16) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { max_delay } => {
                let exponent = u32::from(attempt.saturating_sub(1)).min(31);
                self.delay
                    .checked_mul(1u32 << exponent)
                    .map_or(max_delay, |delay| delay.min(max_delay))
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(1, Self::DEFAULT_DELAY)
    }
}

/// Configuration for the per-entity trackers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// REGISTER_UNSOLICITED_NOTIFICATION.
    pub register_unsol: RetryPolicy,
    /// GET_MILAN_INFO.
    pub milan_info: RetryPolicy,
    /// READ_DESCRIPTOR (static model).
    pub descriptor: RetryPolicy,
    /// Dynamic state queries (acquire/lock state, stream state, counters, ...).
    pub dynamic_info: RetryPolicy,
    /// Current values stored inside descriptors (names, formats, ...).
    pub descriptor_dynamic_info: RetryPolicy,
    /// Reuse complete static models across entities sharing a model ID.
    pub model_cache_enabled: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            register_unsol: RetryPolicy::default(),
            milan_info: RetryPolicy::default(),
            descriptor: RetryPolicy::default(),
            dynamic_info: RetryPolicy::default(),
            descriptor_dynamic_info: RetryPolicy::default(),
            model_cache_enabled: true,
        }
    }
}
