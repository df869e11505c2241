//! The producer of rollup info: schedules the range requests on the workers and forwards the
//! results, in order, to the consumer.

mod handle;
pub use handle::ProducerHandle;

mod statistics;
use statistics::ProducerStatistics;

use crate::{
    error::{L1SyncResult, WorkersError},
    metrics::ProducerMetrics,
    workers::{LastBlockMode, RollupInfoRequest, Workers},
    ControlEvent, L1SyncMessage, ProducerConfig, ReorderingFilter, RollupInfoResponse, SyncStatus,
};
use parking_lot::Mutex;
use std::{fmt, ops::ControlFlow, sync::Arc, time::Duration};
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;

/// The status of the [`L1RollupInfoProducer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerStatus {
    /// Waiting for the latest L1 block and a starting block.
    Idle,
    /// Requesting ranges.
    Working,
    /// Every block up to the latest L1 block was received.
    Synchronized,
    /// The producer is not running.
    NoRunning,
    /// A reset was requested and is not handled yet.
    Reseting,
}

/// Commands that can be sent to the [`L1RollupInfoProducer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerCommand {
    /// Stop the producer.
    Stop,
    /// Reset the producer to the provided starting block.
    Reset(u64),
}

/// The producer of rollup info. It tracks the synchronization progress in a [`SyncStatus`],
/// dispatches the pending ranges to the [`Workers`] and sends the results to the consumer through
/// a [`ReorderingFilter`].
pub struct L1RollupInfoProducer<W> {
    config: ProducerConfig,
    workers: W,
    /// The responses of the workers.
    responses: mpsc::Receiver<RollupInfoResponse>,
    /// The sender part of the channel to the consumer.
    to_consumer_tx: mpsc::Sender<L1SyncMessage>,
    sync_status: SyncStatus,
    filter: ReorderingFilter,
    /// The status, shared with the [`ProducerHandle`].
    status: Arc<Mutex<ProducerStatus>>,
    cmd_rx: mpsc::UnboundedReceiver<ProducerCommand>,
    /// The time of the last successful request for the latest L1 block.
    last_head_refresh: Option<Instant>,
    /// Whether the next iteration should step without waiting for an event.
    immediate_step: bool,
    metrics: ProducerMetrics,
    statistics: ProducerStatistics,
}

impl<W> fmt::Debug for L1RollupInfoProducer<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("L1RollupInfoProducer")
            .field("config", &self.config)
            .field("sync_status", &self.sync_status)
            .field("status", &*self.status.lock())
            .finish_non_exhaustive()
    }
}

impl<W: Workers> L1RollupInfoProducer<W> {
    /// Returns a new [`L1RollupInfoProducer`] along with its [`ProducerHandle`]. The producer must
    /// be reset to a starting block before running.
    pub fn new(
        config: ProducerConfig,
        workers: W,
        responses: mpsc::Receiver<RollupInfoResponse>,
        to_consumer_tx: mpsc::Sender<L1SyncMessage>,
    ) -> (Self, ProducerHandle) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let status = Arc::new(Mutex::new(ProducerStatus::NoRunning));
        let producer = Self {
            sync_status: SyncStatus::new(0, config.sync_chunk_size),
            filter: ReorderingFilter::new(0),
            config,
            workers,
            responses,
            to_consumer_tx,
            status: status.clone(),
            cmd_rx,
            last_head_refresh: None,
            immediate_step: false,
            metrics: ProducerMetrics::default(),
            statistics: ProducerStatistics::new(),
        };
        (producer, ProducerHandle::new(cmd_tx, status))
    }

    /// Returns the current status.
    pub fn status(&self) -> ProducerStatus {
        *self.status.lock()
    }

    fn set_status(&self, status: ProducerStatus) {
        let mut current = self.status.lock();
        if *current != status {
            tracing::debug!(target: "scroll::l1_sync::producer", from = ?*current, to = ?status, "producer status change");
            *current = status;
        }
    }

    /// Returns the synchronization progress.
    pub const fn sync_status(&self) -> &SyncStatus {
        &self.sync_status
    }

    /// Resets the producer to `starting_block`. The requests in flight are cancelled and their
    /// responses discarded, as are the commands not handled yet.
    pub async fn reset(&mut self, starting_block: u64) {
        while let Ok(command) = self.cmd_rx.try_recv() {
            tracing::debug!(target: "scroll::l1_sync::producer", ?command, "discarding command");
        }
        self.on_reset(starting_block).await;
    }

    async fn on_reset(&mut self, starting_block: u64) {
        tracing::info!(target: "scroll::l1_sync::producer", starting_block, "resetting producer");
        self.stop_workers().await;
        self.sync_status.reset(starting_block);
        self.filter.reset(starting_block);
        // the known head is kept but refreshed before the next range.
        self.last_head_refresh = None;
        self.set_status(ProducerStatus::Idle);
        self.immediate_step = true;
    }

    /// Runs the producer until it is stopped, cancelled or fails.
    #[tracing::instrument(target = "scroll::l1_sync::producer", skip_all)]
    pub async fn run(&mut self, cancel: CancellationToken) -> L1SyncResult<()> {
        self.sync_status.verify()?;
        if self.status() == ProducerStatus::NoRunning {
            self.set_status(ProducerStatus::Idle);
        }
        tracing::info!(target: "scroll::l1_sync::producer", status = %self.sync_status, "starting producer");

        let result = self.run_loop(&cancel).await;

        self.stop_workers().await;
        self.set_status(ProducerStatus::NoRunning);
        tracing::info!(target: "scroll::l1_sync::producer", ?result, "producer stopped");
        result
    }

    async fn run_loop(&mut self, cancel: &CancellationToken) -> L1SyncResult<()> {
        loop {
            let timeout = self.next_timeout();
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::info!(target: "scroll::l1_sync::producer", "producer cancelled");
                    return Ok(())
                }
                Some(command) = self.cmd_rx.recv() => match command {
                    ProducerCommand::Stop => {
                        tracing::info!(target: "scroll::l1_sync::producer", "received stop command");
                        return Ok(())
                    }
                    ProducerCommand::Reset(starting_block) => self.on_reset(starting_block).await,
                },
                Some(response) = self.responses.recv() => {
                    if self.on_response(response, cancel).await?.is_break() {
                        return Ok(())
                    }
                }
                _ = tokio::time::sleep(timeout) => {}
            }

            if self.step(cancel).await?.is_break() {
                return Ok(())
            }
            self.log_statistics_if_due();
        }
    }

    /// Returns the time to wait for an event before the next step.
    fn next_timeout(&mut self) -> Duration {
        if std::mem::take(&mut self.immediate_step) {
            return Duration::ZERO
        }

        let ttl = self.config.ttl_of_last_block_on_l1;
        match self.status() {
            ProducerStatus::Synchronized => {
                let left = self
                    .last_head_refresh
                    .map(|at| ttl.saturating_sub(at.elapsed()))
                    .unwrap_or_default();
                if left.is_zero() {
                    ttl
                } else {
                    left
                }
            }
            ProducerStatus::Idle => ttl,
            // no response will wake the loop without running workers.
            ProducerStatus::Working if self.workers.running_workers() == 0 => ttl,
            _ => self.config.timeout_main_loop,
        }
    }

    async fn step(&mut self, cancel: &CancellationToken) -> L1SyncResult<ControlFlow<()>> {
        match self.status() {
            ProducerStatus::Idle => {
                self.renew_last_block_if_needed(cancel).await;
                if self.sync_status.has_all_data_to_work() {
                    self.set_status(ProducerStatus::Working);
                    self.immediate_step = true;
                }
            }
            ProducerStatus::Working => {
                self.launch_work(cancel)?;
                if self.sync_status.have_requested_all_blocks() {
                    self.renew_last_block_if_needed(cancel).await;
                }
                // requests close to the head could target reorged blocks.
                if self.sync_status.is_inside_unsafe_zone(None) {
                    self.renew_last_block_if_needed(cancel).await;
                }

                if self.sync_status.is_fully_synchronized() {
                    return Ok(self.on_fully_synchronized(cancel).await)
                }
                self.launch_work(cancel)?;
            }
            ProducerStatus::Synchronized => {
                self.renew_last_block_if_needed(cancel).await;
                if self.launch_work(cancel)? > 0 {
                    self.set_status(ProducerStatus::Working);
                }
            }
            ProducerStatus::NoRunning | ProducerStatus::Reseting => {}
        }
        Ok(ControlFlow::Continue(()))
    }

    async fn on_fully_synchronized(&mut self, cancel: &CancellationToken) -> ControlFlow<()> {
        self.set_status(ProducerStatus::Synchronized);
        let highest = self.sync_status.highest_block_received();
        tracing::info!(target: "scroll::l1_sync::producer", highest, head = ?self.sync_status.last_block_on_l1(), "producer fully synchronized");

        let messages = self.filter.filter(ControlEvent::ProducerFullySynced(highest).into());
        self.send_to_consumer(messages, cancel).await
    }

    /// Returns true if the consumer is lagging: the messages held by the filter plus the messages
    /// queued in the channel reach the channel capacity. Only retries are launched meanwhile.
    fn is_backpressured(&self) -> bool {
        let max = self.to_consumer_tx.max_capacity();
        let queued = max - self.to_consumer_tx.capacity();
        self.filter.pending_len() + queued >= max
    }

    /// Dispatches ranges until no range is pending or every worker is busy. Returns the count of
    /// dispatched ranges.
    fn launch_work(&mut self, cancel: &CancellationToken) -> L1SyncResult<usize> {
        let mut launched = 0;
        loop {
            let range = if self.is_backpressured() {
                self.sync_status.next_range_only_retries()
            } else {
                self.sync_status.next_range()?
            };
            let Some(range) = range else { break };

            // close to the head the range could be reorged, fetch its boundaries.
            let request = if self.sync_status.is_inside_unsafe_zone(Some(range.from_block)) {
                RollupInfoRequest::new(range, LastBlockMode::Always).with_previous_block(true)
            } else {
                RollupInfoRequest::new(range, LastBlockMode::IfEmpty)
            };

            match self.workers.request_rollup_info(cancel, request) {
                Ok(()) => {}
                Err(WorkersError::AllWorkersBusy) => {
                    tracing::trace!(target: "scroll::l1_sync::producer", %range, "all workers busy");
                    break
                }
                Err(err) => return Err(err.into()),
            }

            let retry = self.sync_status.on_started_new_worker(range)?;
            self.metrics.requests_launched.increment(1);
            if retry {
                self.metrics.requests_retried.increment(1);
            }
            self.statistics.on_request(retry);
            tracing::debug!(target: "scroll::l1_sync::producer", %range, ?request.last_block_mode, retry, "launched rollup info request");
            launched += 1;
        }
        Ok(launched)
    }

    async fn on_response(
        &mut self,
        response: RollupInfoResponse,
        cancel: &CancellationToken,
    ) -> L1SyncResult<ControlFlow<()>> {
        if self.status() == ProducerStatus::Reseting {
            tracing::debug!(target: "scroll::l1_sync::producer", range = %response.result.range, "ignoring response while resetting");
            return Ok(ControlFlow::Continue(()))
        }

        let ok = response.is_ok();
        self.metrics.record_response(ok, response.duration);
        self.statistics.on_response(&response);

        let range = response.result.range;
        let highest = response.result.highest_block_number();
        if !self.sync_status.on_finish_worker(range, ok, highest)? {
            return Ok(ControlFlow::Continue(()))
        }

        match response.error {
            None => {
                tracing::debug!(target: "scroll::l1_sync::producer", result = %response.result, duration = ?response.duration, "received rollup info");
                let messages = self.filter.filter(response.result.into());
                Ok(self.send_to_consumer(messages, cancel).await)
            }
            Some(err) if err.is_cancelled() => {
                tracing::info!(target: "scroll::l1_sync::producer", %range, "rollup info request cancelled");
                Ok(ControlFlow::Continue(()))
            }
            Some(err) => {
                tracing::warn!(target: "scroll::l1_sync::producer", %range, ?err, "rollup info request failed");
                Ok(ControlFlow::Continue(()))
            }
        }
    }

    /// Sends the messages to the consumer. Breaks if the channel is closed or the producer is
    /// cancelled.
    async fn send_to_consumer(
        &self,
        messages: Vec<L1SyncMessage>,
        cancel: &CancellationToken,
    ) -> ControlFlow<()> {
        for message in messages {
            tracing::trace!(target: "scroll::l1_sync::producer", %message, "sending message to consumer");
            tokio::select! {
                biased;

                _ = cancel.cancelled() => return ControlFlow::Break(()),
                res = self.to_consumer_tx.send(message) => {
                    if res.is_err() {
                        tracing::warn!(target: "scroll::l1_sync::producer", "consumer channel closed");
                        return ControlFlow::Break(())
                    }
                }
            }
        }
        ControlFlow::Continue(())
    }

    /// Requests the latest L1 block if the known one is older than the TTL. A failure is logged
    /// and the request is attempted again on the next step.
    async fn renew_last_block_if_needed(&mut self, cancel: &CancellationToken) {
        let ttl = self.config.ttl_of_last_block_on_l1;
        if self.last_head_refresh.is_some_and(|at| at.elapsed() < ttl) {
            return
        }

        let res = self
            .workers
            .request_last_block_with_retries(
                cancel,
                self.config.timeout_for_request_last_block_on_l1,
                self.config.num_of_allowed_retries_for_request_last_block_on_l1,
            )
            .await;

        match res {
            Ok(block) => {
                self.last_head_refresh = Some(Instant::now());
                self.metrics.head_refreshes.increment(1);
                self.metrics.last_block_on_l1.set(block.number as f64);

                let response = self.sync_status.on_new_last_block_on_l1(block.number);
                if let Some(extended) = response.extended_range {
                    tracing::debug!(target: "scroll::l1_sync::producer", %extended, pending = %response.full_range, "new latest L1 block");
                }
            }
            Err(_) if cancel.is_cancelled() => {}
            Err(err) => {
                tracing::warn!(target: "scroll::l1_sync::producer", ?err, "failed to renew the latest L1 block");
            }
        }
    }

    fn log_statistics_if_due(&mut self) {
        if !self.statistics.is_due(self.config.time_for_show_up_statistics_log) {
            return
        }
        tracing::info!(
            target: "scroll::l1_sync::producer",
            statistics = %self.statistics,
            status = ?self.status(),
            head = ?self.sync_status.last_block_on_l1(),
            running = self.workers.running_workers(),
            workers = self.workers.num_workers(),
            pending = self.filter.pending_len(),
            "producer statistics"
        );
        self.statistics.mark_logged();
    }

    /// Cancels the requests in flight and discards their responses.
    async fn stop_workers(&mut self) {
        self.workers.stop();
        loop {
            tokio::select! {
                _ = self.workers.wait_finish_all() => break,
                Some(_) = self.responses.recv() => {}
            }
        }
        let mut discarded = 0;
        while self.responses.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            tracing::debug!(target: "scroll::l1_sync::producer", discarded, "discarded responses of stopped workers");
        }
    }
}
