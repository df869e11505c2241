//! Test utils for providers.

use crate::{L1DataSource, L1ProviderError};

use alloy_eips::BlockNumberOrTag;
use alloy_primitives::{keccak256, B256};
use alloy_rpc_types_eth::Log;
use rollup_node_primitives::{EventsByBlockHash, L1Block, RollupInfo};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};
use tokio::sync::Mutex;

/// Returns the deterministic hash of the block at `number` on the branch identified by `fork`.
pub fn block_hash(number: u64, fork: u8) -> B256 {
    let mut preimage = [0u8; 9];
    preimage[..8].copy_from_slice(&number.to_be_bytes());
    preimage[8] = fork;
    keccak256(preimage)
}

/// Returns a linked chain of `len` blocks starting at block `start`.
pub fn chain(start: u64, len: usize) -> Vec<L1Block> {
    assert!(start > 0, "block 0 is not a valid start");
    let parent = L1Block::new(start - 1, block_hash(start - 1, 0), B256::ZERO, 0);
    chain_from(&parent, len, 0)
}

/// Returns a linked chain of `len` blocks on top of `parent`, on the branch `fork`.
pub fn chain_from(parent: &L1Block, len: usize, fork: u8) -> Vec<L1Block> {
    let mut blocks = Vec::with_capacity(len);
    let mut parent = *parent;
    for _ in 0..len {
        let number = parent.number + 1;
        let block = L1Block::new(number, block_hash(number, fork), parent.hash, number * 12);
        blocks.push(block);
        parent = block;
    }
    blocks
}

/// A call received by the [`MockL1DataSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCall {
    /// A header request.
    HeaderByNumber(Option<u64>),
    /// A block request.
    BlockByNumber(u64),
    /// A rollup info request.
    RollupInfo {
        /// The lower bound of the range.
        from: u64,
        /// The upper bound of the range.
        to: Option<u64>,
    },
}

#[derive(Debug, Default)]
struct MockChain {
    blocks: BTreeMap<u64, L1Block>,
    events: EventsByBlockHash,
    head: Option<u64>,
    range_failures: HashMap<u64, usize>,
    head_failures: usize,
    delay: Duration,
    calls: Vec<MockCall>,
}

impl MockChain {
    fn head(&self) -> Option<u64> {
        self.head.or_else(|| self.blocks.keys().next_back().copied())
    }

    fn block(&self, number: u64) -> Result<L1Block, L1ProviderError> {
        self.blocks
            .get(&number)
            .copied()
            .ok_or(L1ProviderError::MissingBlock(BlockNumberOrTag::Number(number)))
    }
}

/// An in-memory [`L1DataSource`]. Rollup info only reports the blocks for which events were
/// registered with [`MockL1DataSource::with_events`].
#[derive(Debug, Clone, Default)]
pub struct MockL1DataSource {
    inner: Arc<Mutex<MockChain>>,
}

impl MockL1DataSource {
    /// Returns a new [`MockL1DataSource`] serving the provided blocks.
    pub fn new(blocks: impl IntoIterator<Item = L1Block>) -> Self {
        let blocks = blocks.into_iter().map(|b| (b.number, b)).collect();
        Self { inner: Arc::new(Mutex::new(MockChain { blocks, ..Default::default() })) }
    }

    /// Registers events for the block with the provided number.
    pub async fn with_events(&self, number: u64, logs: Vec<Log>) -> &Self {
        let mut chain = self.inner.lock().await;
        if let Some(block) = chain.blocks.get(&number).copied() {
            chain.events.insert(block.hash, logs);
        }
        self
    }

    /// Registers a single default event on each of the provided block numbers.
    pub async fn with_event_on_each(&self, numbers: impl IntoIterator<Item = u64>) -> &Self {
        for number in numbers {
            self.with_events(number, vec![Log::default()]).await;
        }
        self
    }

    /// Overrides the latest block. By default the highest block is the latest.
    pub async fn set_head(&self, number: u64) {
        self.inner.lock().await.head = Some(number);
    }

    /// Replaces the blocks above `blocks[0].number - 1` with `blocks`, simulating a reorg. The
    /// events registered on the replaced blocks are moved to the new blocks at the same height.
    pub async fn reorg(&self, blocks: Vec<L1Block>) {
        let mut chain = self.inner.lock().await;
        let Some(first) = blocks.first() else { return };
        let removed = chain.blocks.split_off(&first.number);
        for block in &blocks {
            if let Some(old) = removed.get(&block.number) {
                if let Some(logs) = chain.events.remove(&old.hash) {
                    chain.events.insert(block.hash, logs);
                }
            }
        }
        chain.blocks.extend(blocks.into_iter().map(|b| (b.number, b)));
    }

    /// Makes the next `times` rollup info requests starting at `from` fail.
    pub async fn fail_range(&self, from: u64, times: usize) {
        self.inner.lock().await.range_failures.insert(from, times);
    }

    /// Makes the next `times` requests for the latest header fail.
    pub async fn fail_head(&self, times: usize) {
        self.inner.lock().await.head_failures = times;
    }

    /// Delays every request by `delay`.
    pub async fn set_delay(&self, delay: Duration) {
        self.inner.lock().await.delay = delay;
    }

    /// Returns the calls received so far.
    pub async fn calls(&self) -> Vec<MockCall> {
        self.inner.lock().await.calls.clone()
    }

    /// Returns the calls received so far, clearing the log.
    pub async fn take_calls(&self) -> Vec<MockCall> {
        std::mem::take(&mut self.inner.lock().await.calls)
    }

    async fn record(&self, call: MockCall) {
        let delay = {
            let mut chain = self.inner.lock().await;
            chain.calls.push(call);
            chain.delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl L1DataSource for MockL1DataSource {
    async fn header_by_number(&self, number: Option<u64>) -> Result<L1Block, L1ProviderError> {
        self.record(MockCall::HeaderByNumber(number)).await;
        let mut chain = self.inner.lock().await;
        match number {
            Some(number) => chain.block(number),
            None => {
                if chain.head_failures > 0 {
                    chain.head_failures -= 1;
                    return Err(L1ProviderError::Other("mock head failure"));
                }
                let head = chain.head().ok_or(L1ProviderError::Other("empty chain"))?;
                chain.block(head)
            }
        }
    }

    async fn block_by_number(&self, number: u64) -> Result<L1Block, L1ProviderError> {
        self.record(MockCall::BlockByNumber(number)).await;
        self.inner.lock().await.block(number)
    }

    async fn rollup_info_by_block_range(
        &self,
        from: u64,
        to: Option<u64>,
    ) -> Result<RollupInfo, L1ProviderError> {
        self.record(MockCall::RollupInfo { from, to }).await;
        let mut chain = self.inner.lock().await;
        if let Some(remaining) = chain.range_failures.get_mut(&from) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(L1ProviderError::Other("mock range failure"));
            }
        }

        let to = to.or_else(|| chain.head()).unwrap_or_default();
        let blocks: Vec<_> = chain
            .blocks
            .range(from..=to)
            .map(|(_, b)| *b)
            .filter(|b| chain.events.contains_key(&b.hash))
            .collect();
        let events = blocks
            .iter()
            .filter_map(|b| chain.events.get(&b.hash).map(|logs| (b.hash, logs.clone())))
            .collect();

        Ok(RollupInfo::new(blocks, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_should_return_blocks_with_events_in_range() -> eyre::Result<()> {
        // Given
        let source = MockL1DataSource::new(chain(1, 20));
        source.with_event_on_each([3, 7, 15]).await;

        // When
        let info = source.rollup_info_by_block_range(2, Some(10)).await?;
        let latest = source.rollup_info_by_block_range(8, None).await?;

        // Then
        assert_eq!(info.blocks.iter().map(|b| b.number).collect::<Vec<_>>(), vec![3, 7]);
        assert_eq!(latest.blocks.iter().map(|b| b.number).collect::<Vec<_>>(), vec![15]);
        assert_eq!(source.header_by_number(None).await?.number, 20);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_move_events_on_reorg() -> eyre::Result<()> {
        // Given
        let blocks = chain(1, 10);
        let source = MockL1DataSource::new(blocks.clone());
        source.with_event_on_each([9]).await;

        // When
        let fork = chain_from(&blocks[6], 3, 1);
        source.reorg(fork.clone()).await;

        // Then
        let info = source.rollup_info_by_block_range(1, None).await?;
        assert_eq!(info.blocks, vec![fork[1]]);
        assert_eq!(source.block_by_number(8).await?.parent_hash, blocks[6].hash);
        assert_ne!(source.block_by_number(8).await?.hash, blocks[7].hash);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_fail_requested_times() -> eyre::Result<()> {
        // Given
        let source = MockL1DataSource::new(chain(1, 5));
        source.fail_range(2, 1).await;
        source.fail_head(2).await;

        // Then
        assert!(source.rollup_info_by_block_range(2, Some(4)).await.is_err());
        assert!(source.rollup_info_by_block_range(2, Some(4)).await.is_ok());
        assert!(source.header_by_number(None).await.is_err());
        assert!(source.header_by_number(None).await.is_err());
        assert!(source.header_by_number(None).await.is_ok());
        assert_eq!(source.calls().await.len(), 5);

        Ok(())
    }
}
