use super::{RollupInfoRequest, Workers};
use crate::{cache::TtlCache, constants::RETRY_CACHE_TTL, error::WorkersError, BlockRange};
use parking_lot::Mutex;
use rollup_node_primitives::L1Block;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
struct Attempt {
    at: Instant,
    count: u32,
}

/// A [`Workers`] decorator which spaces out the attempts at fetching the same range by at least
/// the configured interval. A request arriving too early is delayed rather than rejected.
#[derive(Debug)]
pub struct RetryThrottledWorkers<W> {
    inner: W,
    min_time_between_retries: Duration,
    attempts: Mutex<TtlCache<BlockRange, Attempt>>,
}

impl<W> RetryThrottledWorkers<W> {
    /// Returns a new [`RetryThrottledWorkers`] wrapping the workers.
    pub fn new(inner: W, min_time_between_retries: Duration) -> Self {
        Self {
            inner,
            min_time_between_retries,
            attempts: Mutex::new(TtlCache::new(RETRY_CACHE_TTL)),
        }
    }

    /// Returns the count of attempts recorded for the range.
    pub fn attempts_for(&self, range: &BlockRange) -> u32 {
        self.attempts.lock().get(range).map(|a| a.count).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl<W: Workers> Workers for RetryThrottledWorkers<W> {
    fn request_rollup_info(
        &self,
        cancel: &CancellationToken,
        mut request: RollupInfoRequest,
    ) -> Result<(), WorkersError> {
        let mut attempts = self.attempts.lock();
        let previous = attempts.get(&request.range).copied();

        if let Some(previous) = previous {
            let elapsed = previous.at.elapsed();
            if elapsed < self.min_time_between_retries {
                let wait = self.min_time_between_retries - elapsed;
                tracing::debug!(target: "scroll::l1_sync::workers", range = %request.range, ?wait, retries = previous.count, "delaying retry of rollup info request");
                request.sleep_before += wait;
            }
        }

        self.inner.request_rollup_info(cancel, request)?;
        let count = previous.map(|a| a.count + 1).unwrap_or(1);
        // the attempt starts once the request delay has elapsed.
        let at = Instant::now() + request.sleep_before;
        attempts.insert(request.range, Attempt { at, count });
        Ok(())
    }

    async fn request_last_block_with_retries(
        &self,
        cancel: &CancellationToken,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<L1Block, WorkersError> {
        self.inner.request_last_block_with_retries(cancel, timeout, max_retries).await
    }

    fn stop(&self) {
        self.inner.stop()
    }

    async fn wait_finish_all(&self) {
        self.inner.wait_finish_all().await
    }

    fn running_workers(&self) -> usize {
        self.inner.running_workers()
    }

    fn num_workers(&self) -> usize {
        self.inner.num_workers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_utils::MockWorkers, workers::LastBlockMode};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_should_delay_early_retries() -> eyre::Result<()> {
        // Given
        let inner = Arc::new(MockWorkers::new(10));
        let workers = RetryThrottledWorkers::new(inner.clone(), Duration::from_secs(5));
        let cancel = CancellationToken::new();
        let request = RollupInfoRequest::new(BlockRange::new(1, 10), LastBlockMode::IfEmpty);

        // When
        workers.request_rollup_info(&cancel, request)?;
        tokio::time::advance(Duration::from_secs(2)).await;
        workers.request_rollup_info(&cancel, request)?;
        tokio::time::advance(Duration::from_secs(6)).await;
        workers.request_rollup_info(&cancel, request)?;
        tokio::time::advance(Duration::from_secs(8)).await;
        workers.request_rollup_info(&cancel, request)?;

        // Then
        // the delayed second attempt starts at 5s, so the third one at 8s waits until 10s.
        let delays: Vec<_> = inner.requests().iter().map(|r| r.sleep_before).collect();
        assert_eq!(
            delays,
            vec![Duration::ZERO, Duration::from_secs(3), Duration::from_secs(2), Duration::ZERO]
        );
        assert_eq!(workers.attempts_for(&request.range), 4);

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_not_record_rejected_requests() -> eyre::Result<()> {
        // Given
        let inner = Arc::new(MockWorkers::new(1));
        let workers = RetryThrottledWorkers::new(inner.clone(), Duration::from_secs(5));
        let cancel = CancellationToken::new();
        workers.request_rollup_info(
            &cancel,
            RollupInfoRequest::new(BlockRange::new(1, 10), LastBlockMode::IfEmpty),
        )?;

        // When
        let range = BlockRange::new(11, 20);
        let res = workers
            .request_rollup_info(&cancel, RollupInfoRequest::new(range, LastBlockMode::IfEmpty));

        // Then
        assert!(matches!(res, Err(WorkersError::AllWorkersBusy)));
        assert_eq!(workers.attempts_for(&range), 0);

        inner.finish(1);
        workers
            .request_rollup_info(&cancel, RollupInfoRequest::new(range, LastBlockMode::IfEmpty))?;
        assert_eq!(inner.requests()[1].sleep_before, Duration::ZERO);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_forward_stop() {
        let inner = Arc::new(MockWorkers::new(2));
        let workers = RetryThrottledWorkers::new(inner.clone(), Duration::from_secs(5));

        workers.stop();

        assert_eq!(inner.stops(), 1);
        assert_eq!(workers.num_workers(), 2);
    }
}
