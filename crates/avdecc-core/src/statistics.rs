// ── Entity statistics ──
//
// AECP counters, a running response-time mean updated in O(1) per
// sample, and the enumeration duration measured on the monotonic clock.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default)]
pub struct EntityStatistics {
    aecp_retry_counter: u64,
    aecp_timeout_counter: u64,
    aecp_unexpected_response_counter: u64,
    aem_aecp_unsolicited_counter: u64,
    aecp_responses: u64,
    aecp_response_average: Duration,
    enumeration_start: Option<Instant>,
    enumeration_time: Option<Duration>,
}

/// Serializable copy of the statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub aecp_retry_counter: u64,
    pub aecp_timeout_counter: u64,
    pub aecp_unexpected_response_counter: u64,
    pub aem_aecp_unsolicited_counter: u64,
    pub aecp_response_average_time_ms: u64,
    pub enumeration_time_ms: u64,
}

impl EntityStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Counters ─────────────────────────────────────────────────────

    pub fn increment_aecp_retry_counter(&mut self) -> u64 {
        self.aecp_retry_counter += 1;
        self.aecp_retry_counter
    }

    pub fn increment_aecp_timeout_counter(&mut self) -> u64 {
        self.aecp_timeout_counter += 1;
        self.aecp_timeout_counter
    }

    pub fn increment_aecp_unexpected_response_counter(&mut self) -> u64 {
        self.aecp_unexpected_response_counter += 1;
        self.aecp_unexpected_response_counter
    }

    pub fn increment_aem_aecp_unsolicited_counter(&mut self) -> u64 {
        self.aem_aecp_unsolicited_counter += 1;
        self.aem_aecp_unsolicited_counter
    }

    pub fn aecp_retry_counter(&self) -> u64 {
        self.aecp_retry_counter
    }

    pub fn aecp_timeout_counter(&self) -> u64 {
        self.aecp_timeout_counter
    }

    pub fn aecp_unexpected_response_counter(&self) -> u64 {
        self.aecp_unexpected_response_counter
    }

    pub fn aem_aecp_unsolicited_counter(&self) -> u64 {
        self.aem_aecp_unsolicited_counter
    }

    pub fn set_aecp_retry_counter(&mut self, value: u64) {
        self.aecp_retry_counter = value;
    }

    pub fn set_aecp_timeout_counter(&mut self, value: u64) {
        self.aecp_timeout_counter = value;
    }

    pub fn set_aecp_unexpected_response_counter(&mut self, value: u64) {
        self.aecp_unexpected_response_counter = value;
    }

    pub fn set_aem_aecp_unsolicited_counter(&mut self, value: u64) {
        self.aem_aecp_unsolicited_counter = value;
    }

    // ── Response time ────────────────────────────────────────────────

    /// Fold one response time into the running mean and return the new
    /// mean: `avg + (sample - avg) / n`.
    pub fn update_aecp_response_time_average(&mut self, sample: Duration) -> Duration {
        self.aecp_responses += 1;
        let average = nanos(self.aecp_response_average);
        let delta = (nanos(sample) - average) / i128::from(self.aecp_responses);
        self.aecp_response_average = from_nanos(average + delta);
        self.aecp_response_average
    }

    pub fn aecp_response_average_time(&self) -> Duration {
        self.aecp_response_average
    }

    /// Restore a previously measured mean. It counts as one sample.
    pub fn set_aecp_response_average_time(&mut self, value: Duration) {
        self.aecp_response_average = value;
        self.aecp_responses = u64::from(value > Duration::ZERO);
    }

    // ── Enumeration time ─────────────────────────────────────────────

    pub fn set_start_enumeration_time(&mut self, start: Instant) {
        self.enumeration_start = Some(start);
        self.enumeration_time = None;
    }

    /// Close the measurement. Ignored if no start time was recorded.
    pub fn set_end_enumeration_time(&mut self, end: Instant) {
        if let Some(start) = self.enumeration_start {
            self.enumeration_time = Some(end.saturating_duration_since(start));
        }
    }

    pub fn set_enumeration_time(&mut self, value: Duration) {
        self.enumeration_time = Some(value);
    }

    /// Zero until both ends of the measurement are known.
    pub fn enumeration_time(&self) -> Duration {
        self.enumeration_time.unwrap_or_default()
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            aecp_retry_counter: self.aecp_retry_counter,
            aecp_timeout_counter: self.aecp_timeout_counter,
            aecp_unexpected_response_counter: self.aecp_unexpected_response_counter,
            aem_aecp_unsolicited_counter: self.aem_aecp_unsolicited_counter,
            aecp_response_average_time_ms: millis(self.aecp_response_average),
            enumeration_time_ms: millis(self.enumeration_time()),
        }
    }

    pub fn restore(&mut self, snapshot: &StatisticsSnapshot) {
        self.aecp_retry_counter = snapshot.aecp_retry_counter;
        self.aecp_timeout_counter = snapshot.aecp_timeout_counter;
        self.aecp_unexpected_response_counter = snapshot.aecp_unexpected_response_counter;
        self.aem_aecp_unsolicited_counter = snapshot.aem_aecp_unsolicited_counter;
        self.set_aecp_response_average_time(Duration::from_millis(
            snapshot.aecp_response_average_time_ms,
        ));
        self.set_enumeration_time(Duration::from_millis(snapshot.enumeration_time_ms));
    }
}

fn nanos(duration: Duration) -> i128 {
    i128::try_from(duration.as_nanos()).unwrap_or(i128::MAX)
}

fn from_nanos(value: i128) -> Duration {
    u64::try_from(value.max(0)).map_or(Duration::MAX, Duration::from_nanos)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
