use alloy_primitives::B256;
use alloy_rpc_types_eth::Header;
use std::fmt;

/// Information about a block.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BlockInfo {
    /// The block number.
    pub number: u64,
    /// The block hash.
    pub hash: B256,
}

impl BlockInfo {
    /// Returns a new instance of [`BlockInfo`].
    pub const fn new(number: u64, hash: B256) -> Self {
        Self { number, hash }
    }
}

impl fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockInfo {{ number: {}, hash: {} }}", self.number, self.hash)
    }
}

impl From<&L1Block> for BlockInfo {
    fn from(value: &L1Block) -> Self {
        Self { number: value.number, hash: value.hash }
    }
}

/// The subset of an L1 header the synchronization engine relies on. The parent hash is retained
/// in order to verify hash chain continuity between consecutive ranges.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct L1Block {
    /// The block number.
    pub number: u64,
    /// The block hash.
    pub hash: B256,
    /// The hash of the parent block.
    pub parent_hash: B256,
    /// The block timestamp.
    pub timestamp: u64,
}

impl L1Block {
    /// Returns a new instance of [`L1Block`].
    pub const fn new(number: u64, hash: B256, parent_hash: B256, timestamp: u64) -> Self {
        Self { number, hash, parent_hash, timestamp }
    }

    /// Returns the [`BlockInfo`] of the block.
    pub const fn info(&self) -> BlockInfo {
        BlockInfo::new(self.number, self.hash)
    }
}

impl fmt::Display for L1Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "L1Block {{ number: {}, hash: {}, parent: {} }}",
            self.number, self.hash, self.parent_hash
        )
    }
}

impl From<&Header> for L1Block {
    fn from(value: &Header) -> Self {
        Self {
            number: value.number,
            hash: value.hash,
            parent_hash: value.parent_hash,
            timestamp: value.timestamp,
        }
    }
}

impl From<Header> for L1Block {
    fn from(value: Header) -> Self {
        (&value).into()
    }
}

