use crate::BlockRange;
use alloy_primitives::B256;
use rollup_node_providers::L1ProviderError;
use std::time::Duration;

/// A [`Result`] that uses [`L1SyncError`] as the error type.
pub(crate) type L1SyncResult<T> = Result<T, L1SyncError>;

/// An error that terminates a synchronization run.
#[derive(Debug, thiserror::Error)]
pub enum L1SyncError {
    /// The bookkeeping of the block ranges is corrupted.
    #[error("block range bookkeeping error: {0}")]
    RangeBookkeeping(#[from] RangeError),
    /// An error with the worker pool.
    #[error(transparent)]
    Workers(#[from] WorkersError),
    /// The hash chain of the L1 does not match the blocks previously received.
    #[error("L1 reorg detected at block {number}: cached hash {cached}, received hash {received}")]
    L1Reorg {
        /// The block number at which the mismatch was found.
        number: u64,
        /// The hash of the block previously received.
        cached: B256,
        /// The hash reported for the same block number in the latest rollup info.
        received: B256,
    },
    /// The consumer and the producer disagree on the highest block once fully synced.
    #[error("consumer highest block {consumer} differs from producer highest block {producer}")]
    Desynchronized {
        /// The highest block processed by the consumer.
        consumer: u64,
        /// The highest block reported by the producer.
        producer: u64,
    },
    /// The downstream state failed to apply a block range.
    #[error("failed to apply block range {range}: {source}")]
    ApplyBlockRange {
        /// The range which failed.
        range: BlockRange,
        /// The error returned by the state applier.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The run succeeded but no synced block is known.
    #[error("missing last synced L1 block after a successful run")]
    MissingLastBlockSynced,
    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The run was aborted.
    #[error("synchronization aborted")]
    Aborted,
    /// The producer or the consumer was lost in a previous failed run.
    #[error("synchronization components unavailable after a task failure")]
    Unavailable,
    /// A synchronization task panicked or was cancelled by the runtime.
    #[error("synchronization task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// An error in the bookkeeping of block ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    /// The block range is invalid.
    #[error("invalid block range {0}")]
    Invalid(BlockRange),
    /// The block range overlaps with a tracked range.
    #[error("block range {0} overlaps with {1}")]
    Overlap(BlockRange, BlockRange),
    /// The block range is not tracked.
    #[error("block range {0} not found")]
    NotFound(BlockRange),
}

/// An error returned by the workers.
#[derive(Debug, thiserror::Error)]
pub enum WorkersError {
    /// No worker is idle. This is a backpressure signal, the request never reached the network.
    #[error("all workers are busy")]
    AllWorkersBusy,
    /// The pool needs a dedicated data source for head requests plus at least one worker.
    #[error("at least two data sources are required, got {0}")]
    NotEnoughDataSources(usize),
    /// Requesting the latest L1 block failed on every attempt.
    #[error("failed to request the latest L1 block after {attempts} attempts: {source}")]
    LastBlock {
        /// The count of attempts.
        attempts: u32,
        /// The last error.
        source: FetchError,
    },
}

/// An error that occurred while fetching from the L1 data source.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// An error with the L1 data source.
    #[error("l1 data source error: {0}")]
    Provider(#[from] L1ProviderError),
    /// The request timed out.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// The request was cancelled.
    #[error("request cancelled")]
    Cancelled,
}

impl FetchError {
    /// Returns true if the error is a cancellation.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
