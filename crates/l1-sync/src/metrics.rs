use metrics::{Counter, Gauge, Histogram};
use metrics_derive::Metrics;
use std::time::Duration;

/// The metrics for the [`super::L1RollupInfoProducer`].
#[derive(Metrics, Clone)]
#[metrics(scope = "l1_sync_producer")]
pub struct ProducerMetrics {
    /// A counter on the rollup info requests dispatched to the workers.
    pub requests_launched: Counter,
    /// A counter on the rollup info requests retried after a failure.
    pub requests_retried: Counter,
    /// A counter on the failed rollup info requests.
    pub requests_failed: Counter,
    /// A counter on the refreshes of the latest L1 block.
    pub head_refreshes: Counter,
    /// The latest known L1 block.
    pub last_block_on_l1: Gauge,
    /// A histogram of the rollup info fetch durations, in seconds.
    pub fetch_duration: Histogram,
}

impl ProducerMetrics {
    /// Records the outcome of a rollup info fetch.
    pub fn record_response(&self, ok: bool, duration: Duration) {
        if !ok {
            self.requests_failed.increment(1);
        }
        self.fetch_duration.record(duration.as_secs_f64());
    }
}

/// The metrics for the [`super::L1RollupInfoConsumer`].
#[derive(Metrics, Clone)]
#[metrics(scope = "l1_sync_consumer")]
pub struct ConsumerMetrics {
    /// A counter on the rollup info applied to the state.
    pub ranges_applied: Counter,
    /// A counter on the blocks applied to the state.
    pub blocks_applied: Counter,
    /// A counter on the reorgs detected.
    pub reorgs: Counter,
    /// A histogram of the apply durations, in seconds.
    pub apply_duration: Histogram,
    /// The highest block processed.
    pub highest_block_processed: Gauge,
}
