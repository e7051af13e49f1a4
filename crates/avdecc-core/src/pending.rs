// ── Pending query tracking ──
//
// One tracker per query category. A key present in the outstanding set
// means a request was sent and nothing has cleared it yet; absence means
// either "never requested" or "already answered", which callers do not
// need to tell apart. Each category carries its own retry budget.

use std::collections::HashSet;
use std::hash::Hash;
use std::time::Duration;

use tracing::debug;

use crate::config::RetryPolicy;

/// Outcome of consulting a category's retry budget after a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Resend after the given delay.
    Retry(Duration),
    /// Budget spent; the caller should treat the category as failed.
    Exhausted,
}

impl RetryDecision {
    pub fn should_retry(self) -> bool {
        matches!(self, Self::Retry(_))
    }

    /// Delay before the next attempt, zero once exhausted.
    pub fn delay(self) -> Duration {
        match self {
            Self::Retry(delay) => delay,
            Self::Exhausted => Duration::ZERO,
        }
    }
}

/// Outstanding queries of one category.
#[derive(Debug, Clone)]
pub struct PendingQueryTracker<K> {
    outstanding: HashSet<K>,
    retries: u16,
    policy: RetryPolicy,
}

impl<K: Eq + Hash> PendingQueryTracker<K> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            outstanding: HashSet::new(),
            retries: 0,
            policy,
        }
    }

    /// Record that a request for `key` was sent. Idempotent.
    pub fn mark_expected(&mut self, key: K) {
        self.outstanding.insert(key);
    }

    /// Clear `key` on response. Returns whether it was outstanding; a
    /// `false` means the response is late, duplicated or unsolicited.
    pub fn check_and_clear(&mut self, key: &K) -> bool {
        self.outstanding.remove(key)
    }

    pub fn is_expected(&self, key: &K) -> bool {
        self.outstanding.contains(key)
    }

    /// Nothing outstanding.
    pub fn all_satisfied(&self) -> bool {
        self.outstanding.is_empty()
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    /// Drop every outstanding key. The retry counter is left as is.
    pub fn clear_all(&mut self) {
        self.outstanding.clear();
    }

    /// Drop every outstanding key matching `predicate`.
    pub fn clear_matching(&mut self, mut predicate: impl FnMut(&K) -> bool) {
        self.outstanding.retain(|key| !predicate(key));
    }

    /// Consume one retry. The first `max_attempts` calls grant a retry;
    /// every later call reports the budget as exhausted.
    pub fn retry_timer(&mut self) -> RetryDecision {
        if self.retries >= self.policy.max_attempts {
            debug!(
                retries = self.retries,
                max_attempts = self.policy.max_attempts,
                "retry budget exhausted"
            );
            return RetryDecision::Exhausted;
        }
        self.retries += 1;
        let delay = self.policy.delay_for(self.retries);
        debug!(attempt = self.retries, ?delay, "scheduling retry");
        RetryDecision::Retry(delay)
    }

    /// Retries consumed so far.
    pub fn retries(&self) -> u16 {
        self.retries
    }

    /// No retry left: the next `retry_timer` call would report exhaustion.
    pub fn is_exhausted(&self) -> bool {
        self.retries >= self.policy.max_attempts
    }

    pub fn reset_retries(&mut self) {
        self.retries = 0;
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<K: Eq + Hash> Default for PendingQueryTracker<K> {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_and_clear_accepts_only_outstanding_keys() {
        let mut tracker = PendingQueryTracker::default();
        assert!(!tracker.check_and_clear(&7u32));

        tracker.mark_expected(7u32);
        tracker.mark_expected(7u32);
        assert_eq!(tracker.outstanding_count(), 1);
        assert!(tracker.check_and_clear(&7));
        assert!(!tracker.check_and_clear(&7));
    }

    #[test]
    fn re_marking_after_clear_makes_the_key_outstanding_again() {
        let mut tracker = PendingQueryTracker::default();
        tracker.mark_expected("name");
        assert!(tracker.check_and_clear(&"name"));
        tracker.mark_expected("name");
        assert!(tracker.is_expected(&"name"));
        assert!(tracker.check_and_clear(&"name"));
    }

    #[test]
    fn all_satisfied_tracks_the_outstanding_set() {
        let mut tracker = PendingQueryTracker::default();
        assert!(tracker.all_satisfied());

        tracker.mark_expected(1u8);
        tracker.mark_expected(2u8);
        assert!(!tracker.all_satisfied());

        tracker.check_and_clear(&1);
        assert!(!tracker.all_satisfied());
        tracker.check_and_clear(&2);
        assert!(tracker.all_satisfied());
    }

    #[test]
    fn retry_budget_grants_exactly_max_attempts() {
        let mut tracker: PendingQueryTracker<u8> =
            PendingQueryTracker::new(RetryPolicy::fixed(3, Duration::from_millis(250)));

        let decisions: Vec<_> = (0..5).map(|_| tracker.retry_timer()).collect();
        assert_eq!(
            decisions,
            vec![
                RetryDecision::Retry(Duration::from_millis(250)),
                RetryDecision::Retry(Duration::from_millis(250)),
                RetryDecision::Retry(Duration::from_millis(250)),
                RetryDecision::Exhausted,
                RetryDecision::Exhausted,
            ]
        );
        assert!(tracker.is_exhausted());
        assert_eq!(tracker.retries(), 3);
    }

    #[test]
    fn exhaustion_is_visible_right_after_the_last_granted_retry() {
        let mut tracker: PendingQueryTracker<u8> =
            PendingQueryTracker::new(RetryPolicy::fixed(1, Duration::from_millis(500)));
        assert!(!tracker.is_exhausted());
        assert!(tracker.retry_timer().should_retry());
        assert!(tracker.is_exhausted());
        assert_eq!(tracker.retry_timer().delay(), Duration::ZERO);
    }

    #[test]
    fn clear_matching_only_drops_selected_keys() {
        let mut tracker = PendingQueryTracker::default();
        tracker.mark_expected((0u16, 1u32));
        tracker.mark_expected((1u16, 1u32));
        tracker.clear_matching(|(config, _)| *config == 0);
        assert!(!tracker.is_expected(&(0, 1)));
        assert!(tracker.is_expected(&(1, 1)));
    }
}
