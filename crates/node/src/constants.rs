//! Constants related to the [`crate::L1SyncNode`].

use std::time::Duration;

/// The max retries for the L1 provider.
pub(crate) const L1_PROVIDER_MAX_RETRIES: u32 = 10;

/// The initial backoff for the L1 provider.
pub(crate) const L1_PROVIDER_INITIAL_BACKOFF: u64 = 100;

/// The default provider compute units per second.
pub(crate) const PROVIDER_COMPUTE_UNITS_PER_SECOND: u64 = 10000;

/// The default count of parallel workers fetching rollup info.
pub(crate) const DEFAULT_L1_WORKERS: usize = 4;

/// The default block the synchronization starts from.
pub(crate) const DEFAULT_START_BLOCK: u64 = 1;

/// The count of blocks rolled back when a reorg is detected. Matches the count of unfinalized
/// blocks on Ethereum.
pub(crate) const REORG_ROLLBACK_DEPTH: u64 = 96;

/// The interval between two synchronization runs once the node reached the L1 head.
pub(crate) const SYNC_POLL_INTERVAL: Duration = Duration::from_secs(12);
