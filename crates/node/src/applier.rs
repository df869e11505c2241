use parking_lot::Mutex;
use rollup_node_l1_sync::StateApplier;
use rollup_node_primitives::{EventsByBlockHash, L1Block};
use std::{convert::Infallible, sync::Arc};

/// A [`StateApplier`] which logs the applied rollup info and records the applied tip.
#[derive(Debug, Clone, Default)]
pub struct TracingStateApplier {
    tip: Arc<Mutex<Option<L1Block>>>,
}

impl TracingStateApplier {
    /// Returns the last block applied, if any.
    pub fn tip(&self) -> Option<L1Block> {
        *self.tip.lock()
    }

    /// Moves the tip back to `block`.
    pub fn rollback_to(&self, block: L1Block) {
        let mut tip = self.tip.lock();
        tracing::warn!(target: "scroll::node", from = ?tip.map(|b| b.number), to = %block, "rolling back applied L1 state");
        *tip = Some(block);
    }
}

#[async_trait::async_trait]
impl StateApplier for TracingStateApplier {
    type Error = Infallible;

    async fn apply_block_range(
        &self,
        blocks: &[L1Block],
        events: &EventsByBlockHash,
    ) -> Result<(), Self::Error> {
        let (Some(first), Some(last)) = (blocks.first(), blocks.last()) else { return Ok(()) };
        let logs: usize = blocks.iter().filter_map(|b| events.get(&b.hash)).map(Vec::len).sum();
        tracing::info!(target: "scroll::node", first = first.number, tip = %last.info(), blocks = blocks.len(), logs, "applied rollup info");
        *self.tip.lock() = Some(*last);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;

    #[tokio::test]
    async fn test_should_record_applied_tip() {
        let applier = TracingStateApplier::default();
        let first = L1Block::new(10, B256::repeat_byte(1), B256::ZERO, 120);
        let last = L1Block::new(12, B256::repeat_byte(2), B256::repeat_byte(3), 144);

        let _ = applier.apply_block_range(&[first, last], &EventsByBlockHash::new()).await;
        assert_eq!(applier.tip(), Some(last));

        let _ = applier.apply_block_range(&[], &EventsByBlockHash::new()).await;
        assert_eq!(applier.tip(), Some(last));

        applier.rollback_to(first);
        assert_eq!(applier.tip(), Some(first));
    }
}
