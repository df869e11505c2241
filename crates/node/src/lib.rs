//! The L1 synchronization node: parses its arguments, connects to the L1 and runs the parallel
//! synchronization of the rollup info.

mod applier;
pub use applier::TracingStateApplier;

mod args;
pub use args::{L1ProviderArgs, L1SyncArgs, L1SyncNodeArgs};

pub(crate) mod constants;

mod node;
pub use node::L1SyncNode;
