use crate::{constants::*, error::L1SyncError};
use std::time::Duration;

/// The configuration of the [`crate::L1RollupInfoProducer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerConfig {
    /// The count of blocks requested in each range.
    pub sync_chunk_size: u64,
    /// The time after which the latest L1 block is requested again.
    pub ttl_of_last_block_on_l1: Duration,
    /// The timeout of a request for the latest L1 block.
    pub timeout_for_request_last_block_on_l1: Duration,
    /// The count of attempts at requesting the latest L1 block.
    pub num_of_allowed_retries_for_request_last_block_on_l1: u32,
    /// The maximum time the producer waits for an event before stepping.
    pub timeout_main_loop: Duration,
    /// The interval between two statistics logs, zero disables the logs.
    pub time_for_show_up_statistics_log: Duration,
    /// The minimum time between two attempts at fetching the same range.
    pub min_time_between_retries_for_rollup_info: Duration,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            sync_chunk_size: DEFAULT_SYNC_CHUNK_SIZE,
            ttl_of_last_block_on_l1: DEFAULT_TTL_OF_LAST_BLOCK_ON_L1,
            timeout_for_request_last_block_on_l1: DEFAULT_TIMEOUT_FOR_REQUEST_LAST_BLOCK_ON_L1,
            num_of_allowed_retries_for_request_last_block_on_l1:
                DEFAULT_RETRIES_FOR_REQUEST_LAST_BLOCK_ON_L1,
            timeout_main_loop: DEFAULT_TIMEOUT_MAIN_LOOP,
            time_for_show_up_statistics_log: DEFAULT_TIME_FOR_SHOW_UP_STATISTICS_LOG,
            min_time_between_retries_for_rollup_info:
                DEFAULT_MIN_TIME_BETWEEN_RETRIES_FOR_ROLLUP_INFO,
        }
    }
}

impl ProducerConfig {
    /// Checks the configuration, warning on values below the recommended minimums. A zero chunk
    /// size is rejected.
    pub fn normalize(&mut self) -> Result<(), L1SyncError> {
        if self.sync_chunk_size == 0 {
            return Err(L1SyncError::InvalidConfig("sync chunk size must be greater than 0"));
        }
        if self.num_of_allowed_retries_for_request_last_block_on_l1 == 0 {
            tracing::warn!(target: "scroll::l1_sync", min = MIN_RETRIES_FOR_REQUEST_LAST_BLOCK_ON_L1, "no attempt allowed for the latest L1 block, using the minimum");
            self.num_of_allowed_retries_for_request_last_block_on_l1 =
                MIN_RETRIES_FOR_REQUEST_LAST_BLOCK_ON_L1;
        }
        if self.ttl_of_last_block_on_l1 < MIN_TTL_OF_LAST_BLOCK_ON_L1 {
            tracing::warn!(target: "scroll::l1_sync", ttl = ?self.ttl_of_last_block_on_l1, min = ?MIN_TTL_OF_LAST_BLOCK_ON_L1, "TTL of the last L1 block is below the recommended minimum");
        }
        if self.timeout_for_request_last_block_on_l1 < MIN_TIMEOUT_FOR_REQUEST_LAST_BLOCK_ON_L1 {
            tracing::warn!(target: "scroll::l1_sync", timeout = ?self.timeout_for_request_last_block_on_l1, min = ?MIN_TIMEOUT_FOR_REQUEST_LAST_BLOCK_ON_L1, "timeout of the last L1 block request is below the recommended minimum");
        }
        if self.timeout_main_loop < MIN_TIMEOUT_MAIN_LOOP {
            tracing::warn!(target: "scroll::l1_sync", timeout = ?self.timeout_main_loop, min = ?MIN_TIMEOUT_MAIN_LOOP, "main loop timeout is below the recommended minimum");
        }
        Ok(())
    }
}

/// The configuration of the [`crate::L1RollupInfoConsumer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// The count of rollup info processed before the idle time is monitored.
    pub apply_after_num_rollup_received: usize,
    /// The time the consumer can wait for new rollup info without warning.
    pub acceptable_inactivity_time: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            apply_after_num_rollup_received: DEFAULT_APPLY_AFTER_NUM_ROLLUP_RECEIVED,
            acceptable_inactivity_time: DEFAULT_ACCEPTABLE_INACTIVITY_TIME,
        }
    }
}

impl ConsumerConfig {
    /// Warns on values below the recommended minimums.
    pub fn normalize(&self) {
        if self.acceptable_inactivity_time < MIN_ACCEPTABLE_INACTIVITY_TIME {
            tracing::warn!(target: "scroll::l1_sync", time = ?self.acceptable_inactivity_time, min = ?MIN_ACCEPTABLE_INACTIVITY_TIME, "acceptable inactivity time is below the recommended minimum");
        }
        if self.apply_after_num_rollup_received < MIN_APPLY_AFTER_NUM_ROLLUP_RECEIVED {
            tracing::warn!(target: "scroll::l1_sync", count = self.apply_after_num_rollup_received, min = MIN_APPLY_AFTER_NUM_ROLLUP_RECEIVED, "apply after num rollup received is below the recommended minimum");
        }
    }
}

/// The configuration of the [`crate::WorkerPool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkersConfig {
    /// The timeout of a rollup info fetch.
    pub rollup_info_timeout: Duration,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self { rollup_info_timeout: DEFAULT_ROLLUP_INFO_TIMEOUT }
    }
}

/// The configuration of the L1 synchronization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L1SyncConfig {
    /// The producer configuration.
    pub producer: ProducerConfig,
    /// The consumer configuration.
    pub consumer: ConsumerConfig,
    /// The workers configuration.
    pub workers: WorkersConfig,
    /// The capacity of the channel between the producer and the consumer. Raised to the count of
    /// workers plus one if lower.
    pub channel_capacity: usize,
}

impl Default for L1SyncConfig {
    fn default() -> Self {
        Self {
            producer: ProducerConfig::default(),
            consumer: ConsumerConfig::default(),
            workers: WorkersConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl L1SyncConfig {
    /// Normalizes every section of the configuration.
    pub fn normalize(&mut self) -> Result<(), L1SyncError> {
        self.producer.normalize()?;
        self.consumer.normalize();
        if self.workers.rollup_info_timeout.is_zero() {
            return Err(L1SyncError::InvalidConfig("rollup info timeout must be greater than 0"));
        }
        Ok(())
    }

    /// Returns the capacity of the channel for the provided count of workers.
    pub fn channel_capacity_for(&self, num_workers: usize) -> usize {
        self.channel_capacity.max(num_workers + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_rejects_zero_chunk_size() {
        let mut config = L1SyncConfig::default();
        config.producer.sync_chunk_size = 0;

        assert!(matches!(config.normalize(), Err(L1SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_normalize_raises_retries() {
        let mut config = ProducerConfig {
            num_of_allowed_retries_for_request_last_block_on_l1: 0,
            ..Default::default()
        };
        config.normalize().unwrap();

        assert_eq!(
            config.num_of_allowed_retries_for_request_last_block_on_l1,
            MIN_RETRIES_FOR_REQUEST_LAST_BLOCK_ON_L1
        );
    }

    #[test]
    fn test_channel_capacity() {
        let config = L1SyncConfig { channel_capacity: 2, ..Default::default() };

        assert_eq!(config.channel_capacity_for(4), 5);
        assert_eq!(L1SyncConfig::default().channel_capacity_for(4), DEFAULT_CHANNEL_CAPACITY);
    }
}
