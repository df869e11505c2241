use super::{ConsumerCommand, ConsumerState};
use crate::{ControlEvent, L1SyncMessage};
use parking_lot::Mutex;
use rollup_node_primitives::L1Block;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Handle to interact with the [`super::L1RollupInfoConsumer`].
#[derive(Debug, Clone)]
pub struct ConsumerHandle {
    to_consumer_cmd_tx: mpsc::UnboundedSender<ConsumerCommand>,
    /// A sender on the data channel of the consumer, used to queue control events.
    to_consumer_tx: mpsc::Sender<L1SyncMessage>,
    state: Arc<Mutex<ConsumerState>>,
}

impl ConsumerHandle {
    pub(crate) const fn new(
        to_consumer_cmd_tx: mpsc::UnboundedSender<ConsumerCommand>,
        to_consumer_tx: mpsc::Sender<L1SyncMessage>,
        state: Arc<Mutex<ConsumerState>>,
    ) -> Self {
        Self { to_consumer_cmd_tx, to_consumer_tx, state }
    }

    /// Reanchors the consumer at `starting_block` once the command is handled.
    pub fn reset(&self, starting_block: u64) {
        if let Err(err) = self.to_consumer_cmd_tx.send(ConsumerCommand::Reset(starting_block)) {
            tracing::error!(target: "scroll::l1_sync::consumer", ?err, "failed to send command to consumer");
        }
    }

    /// Queues a stop behind the messages already in the channel.
    pub async fn stop_after_process_channel_queue(&self) {
        tracing::info!(target: "scroll::l1_sync::consumer", queued = self.queued(), "queueing stop for consumer");
        if self.to_consumer_tx.send(ControlEvent::Stop.into()).await.is_err() {
            tracing::warn!(target: "scroll::l1_sync::consumer", "consumer channel closed");
        }
    }

    /// Returns the last block applied to the state, if any.
    pub fn last_block_synced(&self) -> Option<L1Block> {
        self.state.lock().last_block_synced
    }

    /// Returns the highest block processed.
    pub fn highest_block_processed(&self) -> u64 {
        self.state.lock().highest_block_processed
    }

    fn queued(&self) -> usize {
        self.to_consumer_tx.max_capacity() - self.to_consumer_tx.capacity()
    }
}
