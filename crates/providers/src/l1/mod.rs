mod online;
pub use online::OnlineL1DataSource;

use alloy_eips::BlockNumberOrTag;
use alloy_primitives::B256;
use alloy_transport::{RpcError, TransportErrorKind};
use rollup_node_primitives::{L1Block, RollupInfo};

/// An instance of the trait can be used to read the L1 chain segments needed to synchronize the
/// rollup node.
#[async_trait::async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait L1DataSource: Send + Sync {
    /// Returns the header of the block at `number`, or of the latest block if `None`.
    async fn header_by_number(&self, number: Option<u64>) -> Result<L1Block, L1ProviderError>;

    /// Returns the block at `number`.
    async fn block_by_number(&self, number: u64) -> Result<L1Block, L1ProviderError>;

    /// Returns the rollup info contained in the inclusive range `[from, to]`. A `None` upper bound
    /// reads up to the latest block.
    async fn rollup_info_by_block_range(
        &self,
        from: u64,
        to: Option<u64>,
    ) -> Result<RollupInfo, L1ProviderError>;
}

/// An error occurring at the [`L1DataSource`].
#[derive(Debug, thiserror::Error)]
pub enum L1ProviderError {
    /// L1 RPC error.
    #[error(transparent)]
    Rpc(#[from] RpcError<TransportErrorKind>),
    /// The requested block does not exist.
    #[error("unknown block {0}")]
    MissingBlock(BlockNumberOrTag),
    /// The block referenced by a log does not exist.
    #[error("unknown block hash {0}")]
    MissingBlockHash(B256),
    /// A log returned by the RPC is missing a field.
    #[error("missing {0} for log")]
    InvalidLog(&'static str),
    /// Other error.
    #[error("{0}")]
    Other(&'static str),
}
