//! The orchestrator of the L1 synchronization: runs the producer and the consumer as two tasks
//! sharing a bounded channel and supervises them until the run ends.

use crate::{
    error::L1SyncError, ConsumerHandle, L1RollupInfoConsumer, L1RollupInfoProducer,
    L1SyncConfig, ProducerHandle, ProducerStatus, RetryThrottledWorkers, RollupInfoResponse,
    StateApplier, WorkerPool, Workers,
};
use futures::future::{BoxFuture, OptionFuture};
use parking_lot::Mutex;
use rollup_node_primitives::L1Block;
use rollup_node_providers::L1DataSource;
use std::{fmt, sync::Arc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Handle to interact with a running [`L1SyncOrchestrator`].
#[derive(Debug, Clone)]
pub struct L1SyncHandle {
    run_token: Arc<Mutex<CancellationToken>>,
    producer_handle: ProducerHandle,
    consumer_handle: ConsumerHandle,
}

impl L1SyncHandle {
    /// Aborts the current run. [`L1SyncOrchestrator::start`] returns [`L1SyncError::Aborted`]
    /// once both tasks have stopped.
    pub fn abort(&self) {
        tracing::info!(target: "scroll::l1_sync", "aborting L1 synchronization");
        self.run_token.lock().cancel();
    }

    /// Resets the producer and the consumer of the current run to `starting_block`.
    pub fn reset(&self, starting_block: u64) {
        self.consumer_handle.reset(starting_block);
        self.producer_handle.reset(starting_block);
    }

    /// Returns the status of the producer.
    pub fn producer_status(&self) -> ProducerStatus {
        self.producer_handle.status()
    }

    /// Returns the last block applied to the state.
    pub fn last_block_synced(&self) -> Option<L1Block> {
        self.consumer_handle.last_block_synced()
    }
}

/// Runs the synchronization of the rollup info from the L1. Each call to
/// [`L1SyncOrchestrator::start`] is a run that ends when the consumer stops: the L1 head was
/// reached, a fatal error occurred or the run was aborted.
pub struct L1SyncOrchestrator<W, SA> {
    /// The producer, `None` while it runs.
    producer: Option<L1RollupInfoProducer<W>>,
    /// The consumer, `None` while it runs.
    consumer: Option<L1RollupInfoConsumer<SA>>,
    producer_handle: ProducerHandle,
    consumer_handle: ConsumerHandle,
    parent: CancellationToken,
    run_token: Arc<Mutex<CancellationToken>>,
}

impl<W, SA> fmt::Debug for L1SyncOrchestrator<W, SA> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("L1SyncOrchestrator")
            .field("producer_status", &self.producer_handle.status())
            .field("last_block_synced", &self.consumer_handle.last_block_synced())
            .field("running", &self.producer.is_none())
            .finish_non_exhaustive()
    }
}

impl<DS, SA> L1SyncOrchestrator<RetryThrottledWorkers<WorkerPool<DS>>, SA>
where
    DS: L1DataSource + 'static,
    SA: StateApplier + 'static,
{
    /// Returns a new [`L1SyncOrchestrator`] fetching from the data sources. The first data source
    /// serves the latest block requests, the others are the parallel workers.
    pub fn from_data_sources(
        mut config: L1SyncConfig,
        sources: Vec<DS>,
        applier: SA,
        parent: CancellationToken,
    ) -> Result<Self, L1SyncError> {
        config.normalize()?;
        let (pool, responses) = WorkerPool::new(sources, config.workers.clone())?;
        let workers = RetryThrottledWorkers::new(
            pool,
            config.producer.min_time_between_retries_for_rollup_info,
        );
        Ok(Self::with_normalized_config(config, workers, responses, applier, parent))
    }
}

impl<W, SA> L1SyncOrchestrator<W, SA>
where
    W: Workers + 'static,
    SA: StateApplier + 'static,
{
    /// Returns a new [`L1SyncOrchestrator`] dispatching on the workers, which deliver their
    /// responses on `responses`.
    pub fn new(
        mut config: L1SyncConfig,
        workers: W,
        responses: mpsc::Receiver<RollupInfoResponse>,
        applier: SA,
        parent: CancellationToken,
    ) -> Result<Self, L1SyncError> {
        config.normalize()?;
        Ok(Self::with_normalized_config(config, workers, responses, applier, parent))
    }

    fn with_normalized_config(
        config: L1SyncConfig,
        workers: W,
        responses: mpsc::Receiver<RollupInfoResponse>,
        applier: SA,
        parent: CancellationToken,
    ) -> Self {
        let capacity = config.channel_capacity_for(workers.num_workers());
        let (tx, rx) = mpsc::channel(capacity);
        tracing::info!(target: "scroll::l1_sync", capacity, workers = workers.num_workers(), chunk_size = config.producer.sync_chunk_size, "created L1 synchronization");

        let (producer, producer_handle) =
            L1RollupInfoProducer::new(config.producer, workers, responses, tx.clone());
        let (consumer, consumer_handle) =
            L1RollupInfoConsumer::new(config.consumer, applier, rx, tx);

        Self {
            producer: Some(producer),
            consumer: Some(consumer),
            producer_handle,
            consumer_handle,
            run_token: Arc::new(Mutex::new(parent.child_token())),
            parent,
        }
    }

    /// Returns a [`L1SyncHandle`] to the orchestrator.
    pub fn handle(&self) -> L1SyncHandle {
        L1SyncHandle {
            run_token: self.run_token.clone(),
            producer_handle: self.producer_handle.clone(),
            consumer_handle: self.consumer_handle.clone(),
        }
    }

    /// Synchronizes from `last_block`, the last block applied to the state. Returns the last block
    /// applied when the run ends, or the first fatal error.
    #[tracing::instrument(target = "scroll::l1_sync", skip_all, fields(last_block = %last_block))]
    pub async fn start(&mut self, last_block: L1Block) -> Result<L1Block, L1SyncError> {
        let (Some(mut producer), Some(mut consumer)) = (self.producer.take(), self.consumer.take())
        else {
            return Err(L1SyncError::Unavailable)
        };

        let cancel = self.parent.child_token();
        *self.run_token.lock() = cancel.clone();

        producer.reset(last_block.number).await;
        consumer.reset_to_block(last_block);

        let mut producer_task = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let res = producer.run(cancel).await;
                (producer, res)
            }
        });
        let mut consumer_task = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let res = consumer.run(cancel).await;
                (consumer, res)
            }
        });

        let mut producer_joined = None;
        let mut stop_consumer: Option<BoxFuture<'static, ()>> = None;
        let consumer_joined = loop {
            tokio::select! {
                biased;

                joined = &mut consumer_task => break joined,
                joined = &mut producer_task, if producer_joined.is_none() => {
                    tracing::info!(target: "scroll::l1_sync", "producer finished, stopping consumer once its queue is processed");
                    producer_joined = Some(joined);
                    let handle = self.consumer_handle.clone();
                    stop_consumer =
                        Some(Box::pin(async move { handle.stop_after_process_channel_queue().await }));
                }
                Some(()) = OptionFuture::from(stop_consumer.as_mut()), if stop_consumer.is_some() => {
                    stop_consumer = None;
                }
            }
        };
        drop(stop_consumer);

        let aborted = cancel.is_cancelled();
        // the producer may still be running.
        cancel.cancel();
        let producer_joined = match producer_joined {
            Some(joined) => joined,
            None => producer_task.await,
        };

        let consumer_res = match consumer_joined {
            Ok((consumer, res)) => {
                self.consumer = Some(consumer);
                res
            }
            Err(err) => Err(err.into()),
        };
        let producer_res = match producer_joined {
            Ok((producer, res)) => {
                self.producer = Some(producer);
                res
            }
            Err(err) => Err(err.into()),
        };

        if let Err(err) = consumer_res.and(producer_res) {
            tracing::warn!(target: "scroll::l1_sync", ?err, "L1 synchronization failed");
            return Err(err)
        }
        if aborted {
            return Err(L1SyncError::Aborted)
        }

        let synced =
            self.consumer_handle.last_block_synced().ok_or(L1SyncError::MissingLastBlockSynced)?;
        tracing::info!(target: "scroll::l1_sync", %synced, "L1 synchronization finished");
        Ok(synced)
    }

    /// Resets the producer and the consumer to `starting_block`.
    pub fn reset(&self, starting_block: u64) {
        tracing::info!(target: "scroll::l1_sync", starting_block, "resetting L1 synchronization");
        self.consumer_handle.reset(starting_block);
        self.producer_handle.reset(starting_block);
    }

    /// Cancels the current run, drops the messages queued for the consumer and prepares a new
    /// cancellation token for the next run.
    pub fn abort(&mut self) {
        let mut run_token = self.run_token.lock();
        run_token.cancel();
        *run_token = self.parent.child_token();
        drop(run_token);

        if let Some(consumer) = self.consumer.as_mut() {
            let discarded = consumer.discard_queued();
            tracing::info!(target: "scroll::l1_sync", discarded, "aborted L1 synchronization");
        }
    }
}
