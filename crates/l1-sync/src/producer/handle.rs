use super::{ProducerCommand, ProducerStatus};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Handle to interact with the [`super::L1RollupInfoProducer`].
#[derive(Debug, Clone)]
pub struct ProducerHandle {
    to_producer_tx: UnboundedSender<ProducerCommand>,
    status: Arc<Mutex<ProducerStatus>>,
}

impl ProducerHandle {
    /// Create a new handle with the given command sender and shared status.
    pub(crate) const fn new(
        to_producer_tx: UnboundedSender<ProducerCommand>,
        status: Arc<Mutex<ProducerStatus>>,
    ) -> Self {
        Self { to_producer_tx, status }
    }

    /// Send a command to the producer without waiting for a response.
    fn send_command(&self, command: ProducerCommand) {
        if let Err(err) = self.to_producer_tx.send(command) {
            tracing::error!(target: "scroll::l1_sync::producer", ?err, "failed to send command to producer");
        }
    }

    /// Resets the producer to `starting_block`. The responses received until the command is
    /// handled are ignored.
    pub fn reset(&self, starting_block: u64) {
        *self.status.lock() = ProducerStatus::Reseting;
        self.send_command(ProducerCommand::Reset(starting_block));
    }

    /// Stops the producer once the command is handled.
    pub fn stop(&self) {
        self.send_command(ProducerCommand::Stop);
    }

    /// Returns the current status of the producer.
    pub fn status(&self) -> ProducerStatus {
        *self.status.lock()
    }
}
