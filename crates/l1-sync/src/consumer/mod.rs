//! The consumer of rollup info: checks the continuity of the received ranges and applies them to
//! the state.

mod handle;
pub use handle::ConsumerHandle;

mod statistics;
use statistics::ConsumerStatistics;

use crate::{
    error::{L1SyncError, L1SyncResult},
    metrics::ConsumerMetrics,
    ConsumerConfig, ControlEvent, L1SyncMessage, RollupInfoResult, StateApplier,
};
use parking_lot::Mutex;
use rollup_node_primitives::L1Block;
use std::{fmt, ops::ControlFlow, sync::Arc};
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;

/// Commands that can be sent to the [`L1RollupInfoConsumer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerCommand {
    /// Reanchor the consumer at the provided block.
    Reset(u64),
}

/// The progress of the consumer, shared with the [`ConsumerHandle`].
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ConsumerState {
    /// The highest block covered by the processed rollup info.
    highest_block_processed: u64,
    /// The highest block received, used to detect reorgs between ranges.
    last_block_received: Option<L1Block>,
    /// The last block applied to the state.
    last_block_synced: Option<L1Block>,
}

/// The consumer of rollup info. Applies the rollup info received from the producer to the state,
/// in order, and stops on the first inconsistency.
pub struct L1RollupInfoConsumer<SA> {
    config: ConsumerConfig,
    applier: SA,
    from_producer_rx: mpsc::Receiver<L1SyncMessage>,
    cmd_rx: mpsc::UnboundedReceiver<ConsumerCommand>,
    state: Arc<Mutex<ConsumerState>>,
    metrics: ConsumerMetrics,
    statistics: ConsumerStatistics,
}

impl<SA> fmt::Debug for L1RollupInfoConsumer<SA> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("L1RollupInfoConsumer")
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl<SA: StateApplier> L1RollupInfoConsumer<SA> {
    /// Returns a new [`L1RollupInfoConsumer`] receiving on `from_producer_rx`, along with its
    /// [`ConsumerHandle`]. `to_consumer_tx` must be the sender of the same channel.
    pub fn new(
        config: ConsumerConfig,
        applier: SA,
        from_producer_rx: mpsc::Receiver<L1SyncMessage>,
        to_consumer_tx: mpsc::Sender<L1SyncMessage>,
    ) -> (Self, ConsumerHandle) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(ConsumerState::default()));
        let consumer = Self {
            config,
            applier,
            from_producer_rx,
            cmd_rx,
            state: state.clone(),
            metrics: ConsumerMetrics::default(),
            statistics: ConsumerStatistics::new(),
        };
        (consumer, ConsumerHandle::new(cmd_tx, to_consumer_tx, state))
    }

    /// Anchors the consumer at `block`, the last block applied to the state, and drops the
    /// messages and commands queued. The block is used to verify the continuity of the first
    /// range received.
    pub fn reset_to_block(&mut self, block: L1Block) {
        while let Ok(command) = self.cmd_rx.try_recv() {
            tracing::debug!(target: "scroll::l1_sync::consumer", ?command, "discarding command");
        }
        *self.state.lock() = ConsumerState {
            highest_block_processed: block.number,
            last_block_received: Some(block),
            last_block_synced: Some(block),
        };
        self.metrics.highest_block_processed.set(block.number as f64);
        let drained = self.discard_queued();
        tracing::info!(target: "scroll::l1_sync::consumer", %block, drained, "consumer reset to block");
    }

    /// Runs the consumer until it is stopped, cancelled, fully synced or fails.
    #[tracing::instrument(target = "scroll::l1_sync::consumer", skip_all)]
    pub async fn run(&mut self, cancel: CancellationToken) -> L1SyncResult<()> {
        tracing::info!(target: "scroll::l1_sync::consumer", highest_block_processed = self.state.lock().highest_block_processed, "starting consumer");
        let result = self.run_loop(&cancel).await;
        tracing::info!(target: "scroll::l1_sync::consumer", ?result, statistics = %self.statistics, "consumer stopped");
        result
    }

    async fn run_loop(&mut self, cancel: &CancellationToken) -> L1SyncResult<()> {
        loop {
            let waiting_since = Instant::now();
            let message = tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::info!(target: "scroll::l1_sync::consumer", "consumer cancelled");
                    return Ok(())
                }
                Some(command) = self.cmd_rx.recv() => {
                    match command {
                        ConsumerCommand::Reset(starting_block) => self.on_reset(starting_block),
                    }
                    continue
                }
                message = self.from_producer_rx.recv() => match message {
                    Some(message) => message,
                    None => {
                        tracing::info!(target: "scroll::l1_sync::consumer", "producer channel closed");
                        return Ok(())
                    }
                },
            };

            match message {
                L1SyncMessage::Data(result) => {
                    self.statistics.on_received(
                        waiting_since.elapsed(),
                        &result.range,
                        &self.config,
                    );
                    self.process_rollup_info(*result).await?;
                }
                L1SyncMessage::Control(event) => {
                    if self.process_control(event)?.is_break() {
                        return Ok(())
                    }
                }
            }
        }
    }

    /// Reanchors the consumer at `starting_block`. The queued messages are kept: the ones not
    /// following the new anchor are discarded on reception.
    fn on_reset(&mut self, starting_block: u64) {
        tracing::info!(target: "scroll::l1_sync::consumer", starting_block, "resetting consumer");
        *self.state.lock() = ConsumerState {
            highest_block_processed: starting_block,
            last_block_received: None,
            last_block_synced: None,
        };
        self.metrics.highest_block_processed.set(starting_block as f64);
    }

    fn process_control(&mut self, event: ControlEvent) -> L1SyncResult<ControlFlow<()>> {
        match event {
            ControlEvent::Stop => {
                tracing::info!(target: "scroll::l1_sync::consumer", ignored = self.from_producer_rx.len(), "received stop");
                Ok(ControlFlow::Break(()))
            }
            ControlEvent::ProducerFullySynced(highest) => {
                if !self.from_producer_rx.is_empty() {
                    tracing::info!(target: "scroll::l1_sync::consumer", queued = self.from_producer_rx.len(), "producer fully synced but rollup info still queued");
                    return Ok(ControlFlow::Continue(()))
                }

                let processed = self.state.lock().highest_block_processed;
                if processed != highest {
                    tracing::warn!(target: "scroll::l1_sync::consumer", processed, highest, "consumer and producer desynchronized");
                    return Err(L1SyncError::Desynchronized {
                        consumer: processed,
                        producer: highest,
                    })
                }
                tracing::info!(target: "scroll::l1_sync::consumer", highest, "producer fully synced and nothing queued, stopping");
                Ok(ControlFlow::Break(()))
            }
        }
    }

    async fn process_rollup_info(&mut self, result: RollupInfoResult) -> L1SyncResult<()> {
        let range = result.range;
        let (highest_processed, cached) = {
            let state = self.state.lock();
            (state.highest_block_processed, state.last_block_received)
        };

        if range.from_block != highest_processed + 1 {
            tracing::warn!(target: "scroll::l1_sync::consumer", %range, highest_processed, "ignoring rollup info not following the highest processed block");
            return Ok(())
        }

        if let (Some(previous), Some(cached)) = (result.previous_block_of_range, cached) {
            if previous.number == cached.number &&
                (previous.hash != cached.hash || previous.parent_hash != cached.parent_hash)
            {
                self.metrics.reorgs.increment(1);
                tracing::error!(target: "scroll::l1_sync::consumer", %range, %cached, %previous, "L1 reorg detected");
                return Err(L1SyncError::L1Reorg {
                    number: previous.number,
                    cached: cached.hash,
                    received: previous.hash,
                })
            }
        }
        self.state.lock().last_block_received = result.highest_block_received().copied();

        let blocks = if !result.blocks.is_empty() {
            result.blocks.as_slice()
        } else if let Some(last) = result.last_block_of_range.as_ref() {
            std::slice::from_ref(last)
        } else {
            &[]
        };

        let start = Instant::now();
        if !blocks.is_empty() {
            self.applier.apply_block_range(blocks, &result.events).await.map_err(|err| {
                tracing::error!(target: "scroll::l1_sync::consumer", %range, ?err, "failed to apply block range");
                L1SyncError::ApplyBlockRange { range, source: Box::new(err) }
            })?;
        }
        let process_time = start.elapsed();

        let highest = result.highest_block_number();
        {
            let mut state = self.state.lock();
            state.highest_block_processed = highest;
            if let Some(last) = blocks.last() {
                state.last_block_synced = Some(*last);
            }
        }

        self.metrics.ranges_applied.increment(1);
        self.metrics.blocks_applied.increment(blocks.len() as u64);
        self.metrics.apply_duration.record(process_time.as_secs_f64());
        self.metrics.highest_block_processed.set(highest as f64);
        self.statistics.on_processed(result.blocks.len(), process_time);

        tracing::info!(
            target: "scroll::l1_sync::consumer",
            processed = self.statistics.processed_rollup_info(),
            %range,
            blocks = result.blocks.len(),
            highest,
            ?process_time,
            "processed rollup info"
        );
        Ok(())
    }

    /// Drops the messages queued in the channel, returning their count.
    pub(crate) fn discard_queued(&mut self) -> usize {
        let mut drained = 0;
        while self.from_producer_rx.try_recv().is_ok() {
            drained += 1;
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_utils::MockStateApplier, BlockRange};
    use rollup_node_providers::test_utils::{chain, chain_from};

    fn consumer(
        applier: &MockStateApplier,
    ) -> (L1RollupInfoConsumer<MockStateApplier>, ConsumerHandle, mpsc::Sender<L1SyncMessage>) {
        let (tx, rx) = mpsc::channel(10);
        let (consumer, handle) =
            L1RollupInfoConsumer::new(ConsumerConfig::default(), applier.clone(), rx, tx.clone());
        (consumer, handle, tx)
    }

    fn result(range: BlockRange, blocks: &[L1Block]) -> L1SyncMessage {
        let mut result = RollupInfoResult::new(range);
        result.blocks = blocks.to_vec();
        result.into()
    }

    #[tokio::test]
    async fn test_should_apply_ranges_in_sequence() -> eyre::Result<()> {
        // Given
        let blocks = chain(1, 40);
        let applier = MockStateApplier::default();
        let (mut consumer, handle, tx) = consumer(&applier);
        consumer.reset_to_block(blocks[9]);

        // When
        tx.send(result(BlockRange::new(11, 20), &blocks[12..14])).await?;
        tx.send(result(BlockRange::new(25, 30), &blocks[25..26])).await?;
        tx.send(result(BlockRange::new(21, 30), &blocks[22..23])).await?;
        tx.send(ControlEvent::ProducerFullySynced(30).into()).await?;
        consumer.run(CancellationToken::new()).await?;

        // Then
        assert_eq!(applier.applied(), vec![blocks[12..14].to_vec(), blocks[22..23].to_vec()]);
        assert_eq!(handle.highest_block_processed(), 30);
        assert_eq!(handle.last_block_synced(), Some(blocks[22]));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_apply_last_block_of_empty_range() -> eyre::Result<()> {
        // Given
        let blocks = chain(1, 40);
        let applier = MockStateApplier::default();
        let (mut consumer, handle, tx) = consumer(&applier);
        consumer.reset_to_block(blocks[9]);

        let mut empty = RollupInfoResult::new(BlockRange::new(11, 20));
        empty.last_block_of_range = Some(blocks[19]);
        let mut open = RollupInfoResult::new(BlockRange::to_latest(21));
        open.previous_block_of_range = Some(blocks[19]);

        // When
        tx.send(empty.into()).await?;
        tx.send(open.into()).await?;
        handle.stop_after_process_channel_queue().await;
        consumer.run(CancellationToken::new()).await?;

        // Then
        assert_eq!(applier.applied(), vec![vec![blocks[19]]]);
        assert_eq!(handle.highest_block_processed(), 20);
        assert_eq!(handle.last_block_synced(), Some(blocks[19]));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_detect_reorg_on_previous_block() -> eyre::Result<()> {
        // Given
        let blocks = chain(1, 40);
        let applier = MockStateApplier::default();
        let (mut consumer, handle, tx) = consumer(&applier);
        consumer.reset_to_block(blocks[9]);

        let mut first = RollupInfoResult::new(BlockRange::new(11, 20));
        first.blocks = vec![blocks[14]];
        first.last_block_of_range = Some(blocks[19]);
        let fork = chain_from(&blocks[17], 3, 1);
        let mut second = RollupInfoResult::new(BlockRange::new(21, 30));
        second.blocks = vec![fork[2]];
        second.previous_block_of_range = Some(fork[1]);

        // When
        tx.send(first.into()).await?;
        tx.send(second.into()).await?;
        let res = consumer.run(CancellationToken::new()).await;

        // Then
        assert!(matches!(
            res,
            Err(L1SyncError::L1Reorg { number: 20, cached, received })
                if cached == blocks[19].hash && received == fork[1].hash
        ));
        assert_eq!(applier.applied(), vec![vec![blocks[14]]]);
        assert_eq!(handle.last_block_synced(), Some(blocks[14]));
        assert_eq!(handle.highest_block_processed(), 20);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_detect_reorg_against_starting_block() -> eyre::Result<()> {
        // Given
        let blocks = chain(1, 20);
        let applier = MockStateApplier::default();
        let (mut consumer, _handle, tx) = consumer(&applier);
        consumer.reset_to_block(blocks[9]);

        let fork = chain_from(&blocks[8], 2, 1);
        let mut first = RollupInfoResult::new(BlockRange::new(11, 20));
        first.previous_block_of_range = Some(fork[0]);

        // When
        tx.send(first.into()).await?;
        let res = consumer.run(CancellationToken::new()).await;

        // Then
        assert!(matches!(res, Err(L1SyncError::L1Reorg { number: 10, .. })));
        assert!(applier.applied().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_should_fail_on_desynchronized_producer() -> eyre::Result<()> {
        // Given
        let blocks = chain(1, 40);
        let applier = MockStateApplier::default();
        let (mut consumer, _handle, tx) = consumer(&applier);
        consumer.reset_to_block(blocks[9]);

        // When
        tx.send(result(BlockRange::new(11, 20), &blocks[12..13])).await?;
        tx.send(ControlEvent::ProducerFullySynced(25).into()).await?;
        let res = consumer.run(CancellationToken::new()).await;

        // Then
        assert!(matches!(res, Err(L1SyncError::Desynchronized { consumer: 20, producer: 25 })));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_continue_when_fully_synced_with_queued_data() -> eyre::Result<()> {
        // Given
        let blocks = chain(1, 40);
        let applier = MockStateApplier::default();
        let (mut consumer, handle, tx) = consumer(&applier);
        consumer.reset_to_block(blocks[9]);

        // When
        tx.send(ControlEvent::ProducerFullySynced(10).into()).await?;
        tx.send(result(BlockRange::new(11, 20), &blocks[12..13])).await?;
        handle.stop_after_process_channel_queue().await;
        consumer.run(CancellationToken::new()).await?;

        // Then
        assert_eq!(applier.applied().len(), 1);
        assert_eq!(handle.highest_block_processed(), 20);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_fail_when_apply_fails() -> eyre::Result<()> {
        // Given
        let blocks = chain(1, 40);
        let applier = MockStateApplier::default();
        applier.fail_next(1);
        let (mut consumer, handle, tx) = consumer(&applier);
        consumer.reset_to_block(blocks[9]);

        // When
        tx.send(result(BlockRange::new(11, 20), &blocks[12..13])).await?;
        let res = consumer.run(CancellationToken::new()).await;

        // Then
        assert!(matches!(
            res,
            Err(L1SyncError::ApplyBlockRange { range, .. }) if range == BlockRange::new(11, 20)
        ));
        assert_eq!(handle.highest_block_processed(), 10);
        assert_eq!(handle.last_block_synced(), Some(blocks[9]));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_reanchor_on_reset_command() -> eyre::Result<()> {
        // Given
        let blocks = chain(1, 40);
        let applier = MockStateApplier::default();
        let (mut consumer, handle, tx) = consumer(&applier);
        consumer.reset_to_block(blocks[29]);

        // When
        handle.reset(10);
        tx.send(result(BlockRange::new(31, 35), &blocks[32..33])).await?;
        tx.send(result(BlockRange::new(11, 20), &blocks[12..13])).await?;
        handle.stop_after_process_channel_queue().await;
        consumer.run(CancellationToken::new()).await?;

        // Then
        assert_eq!(applier.applied(), vec![blocks[12..13].to_vec()]);
        assert_eq!(handle.last_block_synced(), Some(blocks[12]));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_drain_channel_on_reset_to_block() -> eyre::Result<()> {
        // Given
        let blocks = chain(1, 40);
        let applier = MockStateApplier::default();
        let (mut consumer, handle, tx) = consumer(&applier);
        tx.send(result(BlockRange::new(11, 20), &blocks[12..13])).await?;

        // When
        consumer.reset_to_block(blocks[9]);
        handle.stop_after_process_channel_queue().await;
        consumer.run(CancellationToken::new()).await?;

        // Then
        assert!(applier.applied().is_empty());
        assert_eq!(handle.last_block_synced(), Some(blocks[9]));

        Ok(())
    }
}
