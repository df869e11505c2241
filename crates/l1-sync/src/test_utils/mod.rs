//! Test utils for the L1 synchronization.

pub use rollup_node_providers::test_utils::*;

use crate::{
    error::{FetchError, WorkersError},
    workers::{RollupInfoRequest, Workers},
    StateApplier,
};
use parking_lot::Mutex;
use rollup_node_primitives::{EventsByBlockHash, L1Block};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

/// The error returned by the [`MockStateApplier`] when instructed to fail.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("mock state applier failure")]
pub struct MockApplyError;

#[derive(Debug, Default)]
struct MockApplierState {
    applied: Vec<Vec<L1Block>>,
    failures: usize,
}

/// A [`StateApplier`] recording the applied block ranges.
#[derive(Debug, Clone, Default)]
pub struct MockStateApplier {
    inner: Arc<Mutex<MockApplierState>>,
}

impl MockStateApplier {
    /// Makes the next `times` calls fail.
    pub fn fail_next(&self, times: usize) {
        self.inner.lock().failures = times;
    }

    /// Returns the applied block ranges.
    pub fn applied(&self) -> Vec<Vec<L1Block>> {
        self.inner.lock().applied.clone()
    }

    /// Returns every applied block, in order.
    pub fn applied_blocks(&self) -> Vec<L1Block> {
        self.inner.lock().applied.iter().flatten().copied().collect()
    }

    /// Returns the last applied block.
    pub fn last_applied(&self) -> Option<L1Block> {
        self.inner.lock().applied.iter().flatten().last().copied()
    }

    /// Forgets the applied blocks above `number`, as a state rollback would.
    pub fn rollback_to(&self, number: u64) {
        let mut inner = self.inner.lock();
        for range in &mut inner.applied {
            range.retain(|b| b.number <= number);
        }
        inner.applied.retain(|range| !range.is_empty());
    }
}

#[async_trait::async_trait]
impl StateApplier for MockStateApplier {
    type Error = MockApplyError;

    async fn apply_block_range(
        &self,
        blocks: &[L1Block],
        _events: &EventsByBlockHash,
    ) -> Result<(), Self::Error> {
        let mut inner = self.inner.lock();
        if inner.failures > 0 {
            inner.failures -= 1;
            return Err(MockApplyError);
        }
        inner.applied.push(blocks.to_vec());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MockWorkersState {
    requests: Vec<RollupInfoRequest>,
    running: usize,
    stops: usize,
    head_requests: usize,
}

/// A [`Workers`] recording the dispatched requests without running them. A request occupies a
/// worker until [`MockWorkers::finish`] is called.
#[derive(Debug, Default)]
pub struct MockWorkers {
    capacity: usize,
    head: Option<L1Block>,
    state: Mutex<MockWorkersState>,
}

impl MockWorkers {
    /// Returns a new [`MockWorkers`] with `capacity` workers.
    pub fn new(capacity: usize) -> Self {
        Self { capacity, ..Default::default() }
    }

    /// Sets the block returned as the latest L1 block.
    pub fn with_head(mut self, head: L1Block) -> Self {
        self.head = Some(head);
        self
    }

    /// Returns the dispatched requests.
    pub fn requests(&self) -> Vec<RollupInfoRequest> {
        self.state.lock().requests.clone()
    }

    /// Frees `count` workers.
    pub fn finish(&self, count: usize) {
        let mut state = self.state.lock();
        state.running = state.running.saturating_sub(count);
    }

    /// Returns the count of requests for the latest L1 block.
    pub fn head_requests(&self) -> usize {
        self.state.lock().head_requests
    }

    /// Returns the count of calls to [`Workers::stop`].
    pub fn stops(&self) -> usize {
        self.state.lock().stops
    }
}

#[async_trait::async_trait]
impl Workers for MockWorkers {
    fn request_rollup_info(
        &self,
        _cancel: &CancellationToken,
        request: RollupInfoRequest,
    ) -> Result<(), WorkersError> {
        let mut state = self.state.lock();
        if state.running >= self.capacity {
            return Err(WorkersError::AllWorkersBusy);
        }
        state.running += 1;
        state.requests.push(request);
        Ok(())
    }

    async fn request_last_block_with_retries(
        &self,
        _cancel: &CancellationToken,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<L1Block, WorkersError> {
        self.state.lock().head_requests += 1;
        self.head.ok_or(WorkersError::LastBlock {
            attempts: max_retries,
            source: FetchError::Timeout(timeout),
        })
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.running = 0;
        state.stops += 1;
    }

    async fn wait_finish_all(&self) {}

    fn running_workers(&self) -> usize {
        self.state.lock().running
    }

    fn num_workers(&self) -> usize {
        self.capacity
    }
}
