//! The workers fetching rollup info from the L1 in parallel.

mod fetch;

mod pool;
pub use pool::WorkerPool;

mod throttle;
pub use throttle::RetryThrottledWorkers;

use crate::{error::WorkersError, BlockRange};
use rollup_node_primitives::L1Block;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// When to fetch the literal last block of a requested range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LastBlockMode {
    /// Never fetch the last block.
    Never,
    /// Fetch the last block after the range if the range holds no rollup block.
    #[default]
    IfEmpty,
    /// Fetch the last block before the range.
    Always,
}

/// A request for the rollup info of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollupInfoRequest {
    /// The requested range.
    pub range: BlockRange,
    /// The delay before the fetch starts.
    pub sleep_before: Duration,
    /// When to fetch the last block of the range.
    pub last_block_mode: LastBlockMode,
    /// Whether to fetch the block preceding the range.
    pub request_previous_block: bool,
}

impl RollupInfoRequest {
    /// Returns a new [`RollupInfoRequest`] for the range, without delay nor previous block.
    pub const fn new(range: BlockRange, last_block_mode: LastBlockMode) -> Self {
        Self { range, sleep_before: Duration::ZERO, last_block_mode, request_previous_block: false }
    }

    /// Sets the request of the block preceding the range.
    pub const fn with_previous_block(mut self, request_previous_block: bool) -> Self {
        self.request_previous_block = request_previous_block;
        self
    }

    /// Sets the delay before the fetch starts.
    pub const fn with_sleep_before(mut self, sleep_before: Duration) -> Self {
        self.sleep_before = sleep_before;
        self
    }
}

/// Implementers can dispatch rollup info requests to parallel workers. The responses are
/// delivered asynchronously on the channel attached to the implementation.
#[async_trait::async_trait]
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait Workers: Send + Sync {
    /// Dispatches the request to an idle worker. Fails immediately with
    /// [`WorkersError::AllWorkersBusy`] if no worker is idle.
    fn request_rollup_info(
        &self,
        cancel: &CancellationToken,
        request: RollupInfoRequest,
    ) -> Result<(), WorkersError>;

    /// Requests the latest L1 block on the dedicated head worker, with up to `max_retries`
    /// attempts each bounded by `timeout`.
    async fn request_last_block_with_retries(
        &self,
        cancel: &CancellationToken,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<L1Block, WorkersError>;

    /// Cancels the requests in flight.
    fn stop(&self);

    /// Waits until every worker is idle. A worker becomes idle once its response is queued, so the
    /// responses must keep being received while waiting on a full channel.
    async fn wait_finish_all(&self);

    /// Returns the count of workers running a request.
    fn running_workers(&self) -> usize;

    /// Returns the count of workers available for rollup info requests.
    fn num_workers(&self) -> usize;
}
