use super::{fetch, RollupInfoRequest, Workers};
use crate::{
    constants::LAST_BLOCK_RETRY_BACKOFF,
    error::{FetchError, WorkersError},
    RollupInfoResponse, WorkersConfig,
};
use parking_lot::Mutex;
use rollup_node_primitives::L1Block;
use rollup_node_providers::L1DataSource;
use std::{pin::pin, sync::Arc, time::Duration};
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

/// A worker of the pool. A worker runs at most one request at a time.
#[derive(Debug)]
struct Worker<DS> {
    source: Arc<DS>,
    /// The cancellation token of the request in flight, if any.
    running: Option<CancellationToken>,
}

#[derive(Debug)]
struct Shared<DS> {
    workers: Mutex<Vec<Worker<DS>>>,
    /// Notified every time a worker becomes idle.
    idle: Notify,
}

impl<DS> Shared<DS> {
    fn running_workers(&self) -> usize {
        self.workers.lock().iter().filter(|w| w.running.is_some()).count()
    }

    fn set_idle(&self, index: usize) {
        if let Some(worker) = self.workers.lock().get_mut(index) {
            worker.running = None;
        }
        self.idle.notify_waiters();
    }
}

/// A pool of workers fetching rollup info in parallel, each on its own [`L1DataSource`]. One
/// extra data source is reserved to the requests for the latest L1 block, so that head polling
/// never waits behind range fetches.
#[derive(Debug)]
pub struct WorkerPool<DS> {
    /// The data source dedicated to the latest block requests.
    head_source: Arc<DS>,
    shared: Arc<Shared<DS>>,
    /// The sender part of the channel for [`RollupInfoResponse`].
    responses: mpsc::Sender<RollupInfoResponse>,
    config: WorkersConfig,
}

impl<DS> WorkerPool<DS>
where
    DS: L1DataSource + 'static,
{
    /// Returns a new [`WorkerPool`] over the data sources, along with the receiver of the
    /// responses. The first data source serves the latest block requests, the others the rollup
    /// info requests.
    pub fn new(
        sources: Vec<DS>,
        config: WorkersConfig,
    ) -> Result<(Self, mpsc::Receiver<RollupInfoResponse>), WorkersError> {
        if sources.len() < 2 {
            return Err(WorkersError::NotEnoughDataSources(sources.len()));
        }
        let mut sources = sources.into_iter().map(Arc::new);
        let head_source = sources.next().ok_or(WorkersError::NotEnoughDataSources(0))?;
        let workers: Vec<_> = sources.map(|source| Worker { source, running: None }).collect();

        let (tx, rx) = mpsc::channel(workers.len() + 1);
        tracing::info!(target: "scroll::l1_sync::workers", workers = workers.len(), "created worker pool");

        let shared = Arc::new(Shared { workers: Mutex::new(workers), idle: Notify::new() });
        Ok((Self { head_source, shared, responses: tx, config }, rx))
    }
}

#[async_trait::async_trait]
impl<DS> Workers for WorkerPool<DS>
where
    DS: L1DataSource + 'static,
{
    fn request_rollup_info(
        &self,
        cancel: &CancellationToken,
        request: RollupInfoRequest,
    ) -> Result<(), WorkersError> {
        // claim an idle worker under the lock.
        let (index, source, token) = {
            let mut workers = self.shared.workers.lock();
            let (index, worker) = workers
                .iter_mut()
                .enumerate()
                .find(|(_, w)| w.running.is_none())
                .ok_or(WorkersError::AllWorkersBusy)?;
            let token = cancel.child_token();
            worker.running = Some(token.clone());
            (index, worker.source.clone(), token)
        };

        tracing::debug!(target: "scroll::l1_sync::workers", worker = index, range = %request.range, ?request.last_block_mode, request.request_previous_block, "dispatching rollup info request");

        let shared = self.shared.clone();
        let responses = self.responses.clone();
        let timeout = self.config.rollup_info_timeout;
        tokio::spawn(async move {
            let response = fetch::run_request(source.as_ref(), request, token, timeout).await;
            // the worker stays busy until its response is queued, so that no response is left in
            // flight once every worker is idle.
            if responses.send(response).await.is_err() {
                tracing::debug!(target: "scroll::l1_sync::workers", worker = index, "response channel closed");
            }
            shared.set_idle(index);
        });

        Ok(())
    }

    #[tracing::instrument(target = "scroll::l1_sync::workers", skip(self, cancel))]
    async fn request_last_block_with_retries(
        &self,
        cancel: &CancellationToken,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<L1Block, WorkersError> {
        let attempts = max_retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(FetchError::Cancelled),
                res = tokio::time::timeout(timeout, self.head_source.header_by_number(None)) => {
                    res.map_err(|_| FetchError::Timeout(timeout)).and_then(|r| r.map_err(Into::into))
                }
            };

            match outcome {
                Ok(block) => return Ok(block),
                Err(err) if err.is_cancelled() || attempt >= attempts => {
                    return Err(WorkersError::LastBlock { attempts: attempt, source: err })
                }
                Err(err) => {
                    tracing::warn!(target: "scroll::l1_sync::workers", ?err, attempt, "failed to request the latest L1 block, retrying");
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(WorkersError::LastBlock { attempts: attempt, source: FetchError::Cancelled })
                }
                _ = tokio::time::sleep(LAST_BLOCK_RETRY_BACKOFF) => {}
            }
        }
    }

    fn stop(&self) {
        let workers = self.shared.workers.lock();
        for token in workers.iter().filter_map(|w| w.running.as_ref()) {
            token.cancel();
        }
        tracing::debug!(target: "scroll::l1_sync::workers", "stopped workers");
    }

    async fn wait_finish_all(&self) {
        loop {
            let mut notified = pin!(self.shared.idle.notified());
            notified.as_mut().enable();
            if self.shared.running_workers() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn running_workers(&self) -> usize {
        self.shared.running_workers()
    }

    fn num_workers(&self) -> usize {
        self.shared.workers.lock().len()
    }
}
