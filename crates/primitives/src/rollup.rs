use crate::L1Block;
use alloy_primitives::B256;
use alloy_rpc_types_eth::Log;
use std::collections::HashMap;

/// The rollup events of a range of blocks, keyed by the hash of the block that emitted them. The
/// events of a block are kept in log order.
pub type EventsByBlockHash = HashMap<B256, Vec<Log>>;

/// The rollup information contained in a range of L1 blocks: the blocks holding relevant events
/// and the events themselves.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RollupInfo {
    /// The blocks, in ascending order.
    pub blocks: Vec<L1Block>,
    /// The ordered events of each block.
    pub events: EventsByBlockHash,
}

impl RollupInfo {
    /// Returns a new instance of [`RollupInfo`].
    pub const fn new(blocks: Vec<L1Block>, events: EventsByBlockHash) -> Self {
        Self { blocks, events }
    }

    /// Returns the total count of events.
    pub fn events_count(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }
}
