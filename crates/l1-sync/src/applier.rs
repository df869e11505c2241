use rollup_node_primitives::{EventsByBlockHash, L1Block};

/// Implementers apply the rollup info of L1 blocks to the downstream state.
#[async_trait::async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait StateApplier: Send + Sync {
    /// The error returned when a block range can't be applied.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Applies the blocks, in order, along with their events. The call must be atomic: on error
    /// none of the blocks is considered applied.
    async fn apply_block_range(
        &self,
        blocks: &[L1Block],
        events: &EventsByBlockHash,
    ) -> Result<(), Self::Error>;
}
