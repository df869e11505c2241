use crate::RollupInfoResponse;
use std::{fmt, time::Duration};
use tokio::time::Instant;

/// Counters of the producer activity, logged periodically.
#[derive(Debug)]
pub(super) struct ProducerStatistics {
    started_at: Instant,
    last_log: Instant,
    ranges_requested: u64,
    ranges_retried: u64,
    ranges_received: u64,
    ranges_failed: u64,
    blocks_received: u64,
    fetch_time: Duration,
}

impl ProducerStatistics {
    pub(super) fn new() -> Self {
        let now = Instant::now();
        Self {
            started_at: now,
            last_log: now,
            ranges_requested: 0,
            ranges_retried: 0,
            ranges_received: 0,
            ranges_failed: 0,
            blocks_received: 0,
            fetch_time: Duration::ZERO,
        }
    }

    pub(super) fn on_request(&mut self, retry: bool) {
        self.ranges_requested += 1;
        if retry {
            self.ranges_retried += 1;
        }
    }

    pub(super) fn on_response(&mut self, response: &RollupInfoResponse) {
        self.fetch_time += response.duration;
        if response.is_ok() {
            self.ranges_received += 1;
            self.blocks_received += response.result.blocks.len() as u64;
        } else {
            self.ranges_failed += 1;
        }
    }

    /// Returns the mean duration of a fetch, failed ones included.
    pub(super) fn mean_fetch_time(&self) -> Duration {
        let responses = self.ranges_received + self.ranges_failed;
        if responses == 0 {
            return Duration::ZERO
        }
        Duration::from_secs_f64(self.fetch_time.as_secs_f64() / responses as f64)
    }

    /// Returns true if the statistics should be logged. A zero interval disables the logs.
    pub(super) fn is_due(&self, interval: Duration) -> bool {
        !interval.is_zero() && self.last_log.elapsed() >= interval
    }

    pub(super) fn mark_logged(&mut self) {
        self.last_log = Instant::now();
    }
}

impl fmt::Display for ProducerStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed = self.started_at.elapsed();
        write!(
            f,
            "requested: {} retried: {} received: {} failed: {} blocks: {} mean_fetch: {:?} uptime: {:?}",
            self.ranges_requested,
            self.ranges_retried,
            self.ranges_received,
            self.ranges_failed,
            self.blocks_received,
            self.mean_fetch_time(),
            elapsed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_statistics_log_interval() {
        let mut statistics = ProducerStatistics::new();
        assert!(!statistics.is_due(Duration::from_secs(60)));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(statistics.is_due(Duration::from_secs(60)));
        assert!(!statistics.is_due(Duration::ZERO));

        statistics.mark_logged();
        assert!(!statistics.is_due(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_mean_fetch_time_over_many_responses() {
        let mut statistics = ProducerStatistics::new();
        assert_eq!(statistics.mean_fetch_time(), Duration::ZERO);

        statistics.ranges_received = u64::from(u32::MAX) + 1;
        statistics.ranges_failed = u64::from(u32::MAX) + 1;
        statistics.fetch_time = Duration::from_secs(2 * (u64::from(u32::MAX) + 1));

        assert_eq!(statistics.mean_fetch_time(), Duration::from_secs(1));
    }
}
