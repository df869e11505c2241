use crate::constants;
use alloy_primitives::Address;
use rollup_node_l1_sync::{
    constants as sync_constants, ConsumerConfig, L1SyncConfig, ProducerConfig, WorkersConfig,
};
use std::time::Duration;

/// The arguments of the L1 synchronization node.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "l1-sync", about = "Synchronizes the rollup info from the L1")]
pub struct L1SyncNodeArgs {
    /// The L1 provider arguments
    #[command(flatten)]
    pub l1_provider_args: L1ProviderArgs,
    /// The synchronization arguments
    #[command(flatten)]
    pub sync_args: L1SyncArgs,
}

impl L1SyncNodeArgs {
    /// Validates the arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.l1_provider_args.url.is_none() {
            return Err("An L1 URL is required".to_string());
        }
        if self.l1_provider_args.workers == 0 {
            return Err("At least one L1 worker is required".to_string());
        }
        if self.l1_provider_args.filter_addresses.is_empty() {
            return Err(
                "At least one contract address to filter the L1 logs is required".to_string()
            );
        }
        if self.sync_args.chunk_size == 0 {
            return Err("The sync chunk size must be greater than 0".to_string());
        }
        if self.sync_args.start_block == 0 {
            return Err("The start block must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// The arguments for the L1 provider.
#[derive(Debug, Default, Clone, clap::Args)]
pub struct L1ProviderArgs {
    /// The URL for the L1 RPC.
    #[arg(long = "l1.url", id = "l1_url", value_name = "L1_URL")]
    pub url: Option<reqwest::Url>,
    /// The compute units per second for the provider.
    #[arg(long = "l1.cups", id = "l1_compute_units_per_second", value_name = "L1_COMPUTE_UNITS_PER_SECOND", default_value_t = constants::PROVIDER_COMPUTE_UNITS_PER_SECOND)]
    pub compute_units_per_second: u64,
    /// The max amount of retries for the provider.
    #[arg(long = "l1.max-retries", id = "l1_max_retries", value_name = "L1_MAX_RETRIES", default_value_t = constants::L1_PROVIDER_MAX_RETRIES)]
    pub max_retries: u32,
    /// The initial backoff for the provider.
    #[arg(long = "l1.initial-backoff", id = "l1_initial_backoff", value_name = "L1_INITIAL_BACKOFF", default_value_t = constants::L1_PROVIDER_INITIAL_BACKOFF)]
    pub initial_backoff: u64,
    /// The count of parallel workers fetching the rollup info. Each worker uses its own client.
    #[arg(long = "l1.workers", id = "l1_workers", value_name = "L1_WORKERS", default_value_t = constants::DEFAULT_L1_WORKERS)]
    pub workers: usize,
    /// The addresses of the rollup contracts whose logs are synchronized.
    #[arg(
        long = "l1.filter-address",
        id = "l1_filter_address",
        value_name = "L1_FILTER_ADDRESS",
        value_delimiter = ','
    )]
    pub filter_addresses: Vec<Address>,
}

/// The arguments for the L1 synchronization.
#[derive(Debug, Clone, clap::Args)]
pub struct L1SyncArgs {
    /// The count of blocks requested in each range.
    #[arg(long = "sync.chunk-size", value_name = "SYNC_CHUNK_SIZE", default_value_t = sync_constants::DEFAULT_SYNC_CHUNK_SIZE)]
    pub chunk_size: u64,
    /// The block from which the synchronization starts.
    #[arg(long = "sync.start-block", value_name = "SYNC_START_BLOCK", default_value_t = constants::DEFAULT_START_BLOCK)]
    pub start_block: u64,
    /// The time in seconds after which the latest L1 block is requested again.
    #[arg(long = "sync.head-ttl", value_name = "SYNC_HEAD_TTL", default_value_t = sync_constants::DEFAULT_TTL_OF_LAST_BLOCK_ON_L1.as_secs())]
    pub head_ttl: u64,
    /// The interval in seconds between two statistics logs, 0 disables the logs.
    #[arg(long = "sync.statistics-interval", value_name = "SYNC_STATISTICS_INTERVAL", default_value_t = sync_constants::DEFAULT_TIME_FOR_SHOW_UP_STATISTICS_LOG.as_secs())]
    pub statistics_interval: u64,
    /// The minimum time in milliseconds between two attempts at fetching the same range.
    #[arg(long = "sync.retry-interval", value_name = "SYNC_RETRY_INTERVAL", default_value_t = sync_constants::DEFAULT_MIN_TIME_BETWEEN_RETRIES_FOR_ROLLUP_INFO.as_millis() as u64)]
    pub retry_interval: u64,
    /// The timeout in seconds of a rollup info fetch.
    #[arg(long = "sync.fetch-timeout", value_name = "SYNC_FETCH_TIMEOUT", default_value_t = sync_constants::DEFAULT_ROLLUP_INFO_TIMEOUT.as_secs())]
    pub fetch_timeout: u64,
    /// The capacity of the channel between the producer and the consumer.
    #[arg(long = "sync.channel-capacity", value_name = "SYNC_CHANNEL_CAPACITY", default_value_t = sync_constants::DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,
    /// The count of blocks rolled back when an L1 reorg is detected.
    #[arg(long = "sync.reorg-rollback", value_name = "SYNC_REORG_ROLLBACK", default_value_t = constants::REORG_ROLLBACK_DEPTH)]
    pub reorg_rollback: u64,
}

impl Default for L1SyncArgs {
    fn default() -> Self {
        Self {
            chunk_size: sync_constants::DEFAULT_SYNC_CHUNK_SIZE,
            start_block: constants::DEFAULT_START_BLOCK,
            head_ttl: sync_constants::DEFAULT_TTL_OF_LAST_BLOCK_ON_L1.as_secs(),
            statistics_interval: sync_constants::DEFAULT_TIME_FOR_SHOW_UP_STATISTICS_LOG.as_secs(),
            retry_interval: sync_constants::DEFAULT_MIN_TIME_BETWEEN_RETRIES_FOR_ROLLUP_INFO
                .as_millis() as u64,
            fetch_timeout: sync_constants::DEFAULT_ROLLUP_INFO_TIMEOUT.as_secs(),
            channel_capacity: sync_constants::DEFAULT_CHANNEL_CAPACITY,
            reorg_rollback: constants::REORG_ROLLBACK_DEPTH,
        }
    }
}

impl L1SyncArgs {
    /// Returns the [`L1SyncConfig`] built from the arguments.
    pub fn config(&self) -> L1SyncConfig {
        L1SyncConfig {
            producer: ProducerConfig {
                sync_chunk_size: self.chunk_size,
                ttl_of_last_block_on_l1: Duration::from_secs(self.head_ttl),
                time_for_show_up_statistics_log: Duration::from_secs(self.statistics_interval),
                min_time_between_retries_for_rollup_info: Duration::from_millis(
                    self.retry_interval,
                ),
                ..Default::default()
            },
            consumer: ConsumerConfig::default(),
            workers: WorkersConfig { rollup_info_timeout: Duration::from_secs(self.fetch_timeout) },
            channel_capacity: self.channel_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_args() {
        let args = L1SyncNodeArgs::try_parse_from([
            "l1-sync",
            "--l1.url",
            "http://localhost:8545",
            "--l1.workers",
            "8",
            "--l1.filter-address",
            "0x0000000000000000000000000000000000000001,0x0000000000000000000000000000000000000002",
            "--sync.chunk-size",
            "500",
            "--sync.head-ttl",
            "12",
        ])
        .unwrap();

        assert!(args.validate().is_ok());
        assert_eq!(args.l1_provider_args.workers, 8);
        assert_eq!(args.l1_provider_args.filter_addresses.len(), 2);

        let config = args.sync_args.config();
        assert_eq!(config.producer.sync_chunk_size, 500);
        assert_eq!(config.producer.ttl_of_last_block_on_l1, Duration::from_secs(12));
        assert_eq!(config.workers, WorkersConfig::default());
    }

    #[test]
    fn test_validate_args() {
        let args = L1SyncNodeArgs::try_parse_from([
            "l1-sync",
            "--l1.filter-address",
            "0x0000000000000000000000000000000000000001",
        ])
        .unwrap();
        assert!(args.validate().is_err());

        let args = L1SyncNodeArgs::try_parse_from([
            "l1-sync",
            "--l1.url",
            "http://localhost:8545",
            "--l1.filter-address",
            "0x0000000000000000000000000000000000000001",
            "--sync.chunk-size",
            "0",
        ])
        .unwrap();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_default_sync_args_match_config() {
        assert_eq!(L1SyncArgs::default().config(), L1SyncConfig::default());
    }
}
