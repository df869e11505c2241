//! Parallel synchronization of the rollup info from the L1.
//!
//! The [`L1RollupInfoProducer`] splits the blocks between the last applied block and the L1 head
//! into [`BlockRange`]s fetched in parallel by a [`WorkerPool`]. The results go through a
//! [`ReorderingFilter`] so the [`L1RollupInfoConsumer`] receives them in block order and applies
//! them to the state via a [`StateApplier`]. The [`L1SyncOrchestrator`] runs both sides.

mod applier;
pub use applier::StateApplier;

mod block_range;
pub use block_range::{BlockRange, ToBlock};

mod cache;

mod config;
pub use config::{ConsumerConfig, L1SyncConfig, ProducerConfig, WorkersConfig};

pub mod constants;

mod consumer;
pub use consumer::{ConsumerCommand, ConsumerHandle, L1RollupInfoConsumer};

mod error;
pub use error::{FetchError, L1SyncError, RangeError, WorkersError};

mod filter;
pub use filter::ReorderingFilter;

mod live_ranges;
pub use live_ranges::LiveBlockRanges;

mod message;
pub use message::{ControlEvent, L1SyncMessage, RollupInfoResponse, RollupInfoResult};

mod metrics;
pub use metrics::{ConsumerMetrics, ProducerMetrics};

mod orchestrator;
pub use orchestrator::{L1SyncHandle, L1SyncOrchestrator};

mod producer;
pub use producer::{L1RollupInfoProducer, ProducerCommand, ProducerHandle, ProducerStatus};

mod status;
pub use status::{NewLastBlockResponse, SyncStatus};

mod workers;
pub use workers::{LastBlockMode, RetryThrottledWorkers, RollupInfoRequest, WorkerPool, Workers};

#[cfg(any(test, feature = "test-utils"))]
/// Common test helpers
pub mod test_utils;
