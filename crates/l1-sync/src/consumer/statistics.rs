use crate::{BlockRange, ConsumerConfig};
use std::{fmt, time::Duration};
use tokio::time::Instant;

/// Counters of the consumer activity.
#[derive(Debug)]
pub(super) struct ConsumerStatistics {
    started_at: Instant,
    processed_rollup_info: usize,
    processed_blocks: u64,
    previous_process_time: Duration,
}

impl ConsumerStatistics {
    pub(super) fn new() -> Self {
        Self {
            started_at: Instant::now(),
            processed_rollup_info: 0,
            processed_blocks: 0,
            previous_process_time: Duration::ZERO,
        }
    }

    /// Warns if the consumer waited longer than acceptable for the rollup info of `range`. The
    /// first rollup info received are not monitored.
    pub(super) fn on_received(
        &self,
        waited: Duration,
        range: &BlockRange,
        config: &ConsumerConfig,
    ) {
        if self.processed_rollup_info > config.apply_after_num_rollup_received &&
            waited > config.acceptable_inactivity_time
        {
            tracing::warn!(target: "scroll::l1_sync::consumer", ?waited, %range, previous_process_time = ?self.previous_process_time, blocks_per_second = self.blocks_per_second(), "too much time waiting for rollup info, the producer is lagging");
        }
    }

    pub(super) fn on_processed(&mut self, blocks: usize, process_time: Duration) {
        self.processed_rollup_info += 1;
        self.processed_blocks += blocks as u64;
        self.previous_process_time = process_time;
    }

    pub(super) const fn processed_rollup_info(&self) -> usize {
        self.processed_rollup_info
    }

    fn blocks_per_second(&self) -> f64 {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0
        }
        self.processed_blocks as f64 / elapsed
    }
}

impl fmt::Display for ConsumerStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed: {} blocks: {} last_process_time: {:?} blocks_per_second: {:.2}",
            self.processed_rollup_info,
            self.processed_blocks,
            self.previous_process_time,
            self.blocks_per_second()
        )
    }
}
