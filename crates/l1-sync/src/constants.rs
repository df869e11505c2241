//! Constants and default values of the L1 synchronization.

use std::time::Duration;

/// The distance to the L1 head under which a block could still be reorged.
pub const UNSAFE_ZONE_DISTANCE: u64 = 96;

/// The delay between two attempts at requesting the latest L1 block.
#[cfg(any(test, feature = "test-utils"))]
pub const LAST_BLOCK_RETRY_BACKOFF: Duration = Duration::from_millis(1);
/// The delay between two attempts at requesting the latest L1 block.
#[cfg(not(any(test, feature = "test-utils")))]
pub const LAST_BLOCK_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// The lifetime of an entry in the retry throttle cache.
pub const RETRY_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// The default count of blocks requested in each range.
pub const DEFAULT_SYNC_CHUNK_SIZE: u64 = 100;

/// The default time after which the latest L1 block is requested again.
pub const DEFAULT_TTL_OF_LAST_BLOCK_ON_L1: Duration = Duration::from_secs(5);

/// The minimum recommended time after which the latest L1 block is requested again.
pub const MIN_TTL_OF_LAST_BLOCK_ON_L1: Duration = Duration::from_secs(1);

/// The default timeout of a request for the latest L1 block.
pub const DEFAULT_TIMEOUT_FOR_REQUEST_LAST_BLOCK_ON_L1: Duration = Duration::from_secs(5);

/// The minimum recommended timeout of a request for the latest L1 block.
pub const MIN_TIMEOUT_FOR_REQUEST_LAST_BLOCK_ON_L1: Duration = Duration::from_secs(1);

/// The default count of attempts at requesting the latest L1 block.
pub const DEFAULT_RETRIES_FOR_REQUEST_LAST_BLOCK_ON_L1: u32 = 3;

/// The minimum recommended count of attempts at requesting the latest L1 block.
pub const MIN_RETRIES_FOR_REQUEST_LAST_BLOCK_ON_L1: u32 = 1;

/// The default maximum time the producer waits for an event before stepping.
pub const DEFAULT_TIMEOUT_MAIN_LOOP: Duration = Duration::from_secs(5 * 60);

/// The minimum recommended time the producer waits for an event before stepping.
pub const MIN_TIMEOUT_MAIN_LOOP: Duration = Duration::from_secs(5 * 60);

/// The default interval between two statistics logs of the producer.
pub const DEFAULT_TIME_FOR_SHOW_UP_STATISTICS_LOG: Duration = Duration::from_secs(60);

/// The default minimum time between two attempts at fetching the same range.
pub const DEFAULT_MIN_TIME_BETWEEN_RETRIES_FOR_ROLLUP_INFO: Duration = Duration::from_secs(5);

/// The default timeout of a rollup info fetch.
pub const DEFAULT_ROLLUP_INFO_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// The default count of rollup info processed before the consumer monitors its idle time.
pub const DEFAULT_APPLY_AFTER_NUM_ROLLUP_RECEIVED: usize = 10;

/// The minimum recommended count of rollup info processed before the consumer monitors its idle
/// time.
pub const MIN_APPLY_AFTER_NUM_ROLLUP_RECEIVED: usize = 5;

/// The default time the consumer can wait for new rollup info without warning.
pub const DEFAULT_ACCEPTABLE_INACTIVITY_TIME: Duration = Duration::from_secs(5);

/// The minimum recommended time the consumer can wait for new rollup info without warning.
pub const MIN_ACCEPTABLE_INACTIVITY_TIME: Duration = Duration::from_secs(1);

/// The default capacity of the channel between the producer and the consumer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 25;
