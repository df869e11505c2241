use super::{L1DataSource, L1ProviderError};

use alloy_eips::BlockNumberOrTag;
use alloy_primitives::Address;
use alloy_provider::Provider;
use alloy_rpc_types_eth::Filter;
use rollup_node_primitives::{EventsByBlockHash, L1Block, RollupInfo};
use std::collections::hash_map::Entry;

/// An implementation of the [`L1DataSource`] on top of an execution node provider. The rollup
/// events are the logs emitted by the configured contract addresses.
#[derive(Debug, Clone)]
pub struct OnlineL1DataSource<P> {
    /// The L1 execution node provider. The provider should implement some backoff strategy using
    /// [`alloy_transport::layers::RetryBackoffLayer`] in order to avoid excessive queries on the
    /// RPC provider.
    provider: P,
    /// The log filter of the rollup contracts.
    filter: Filter,
}

impl<P> OnlineL1DataSource<P> {
    /// Returns a new [`OnlineL1DataSource`] which reads the logs of the provided addresses.
    pub fn new(provider: P, addresses: Vec<Address>) -> Self {
        Self { provider, filter: Filter::new().address(addresses) }
    }
}

impl<P: Provider> OnlineL1DataSource<P> {
    async fn block_by_tag(&self, tag: BlockNumberOrTag) -> Result<L1Block, L1ProviderError> {
        let block = self
            .provider
            .get_block_by_number(tag)
            .await?
            .ok_or(L1ProviderError::MissingBlock(tag))?;
        Ok((&block.header).into())
    }
}

#[async_trait::async_trait]
impl<P: Provider> L1DataSource for OnlineL1DataSource<P> {
    async fn header_by_number(&self, number: Option<u64>) -> Result<L1Block, L1ProviderError> {
        self.block_by_tag(number.map_or(BlockNumberOrTag::Latest, BlockNumberOrTag::Number)).await
    }

    async fn block_by_number(&self, number: u64) -> Result<L1Block, L1ProviderError> {
        self.block_by_tag(BlockNumberOrTag::Number(number)).await
    }

    async fn rollup_info_by_block_range(
        &self,
        from: u64,
        to: Option<u64>,
    ) -> Result<RollupInfo, L1ProviderError> {
        let filter = self
            .filter
            .clone()
            .from_block(from)
            .to_block(to.map_or(BlockNumberOrTag::Latest, BlockNumberOrTag::Number));
        let logs = self.provider.get_logs(&filter).await?;
        tracing::trace!(target: "scroll::providers", from, ?to, logs = logs.len(), "fetched rollup logs");

        let mut blocks = Vec::new();
        let mut events = EventsByBlockHash::new();
        for log in logs {
            let hash = log.block_hash.ok_or(L1ProviderError::InvalidLog("block hash"))?;
            match events.entry(hash) {
                Entry::Occupied(mut entry) => entry.get_mut().push(log),
                Entry::Vacant(entry) => {
                    let block = self
                        .provider
                        .get_block_by_hash(hash)
                        .await?
                        .ok_or(L1ProviderError::MissingBlockHash(hash))?;
                    blocks.push(L1Block::from(&block.header));
                    entry.insert(vec![log]);
                }
            }
        }
        blocks.sort_unstable_by_key(|b| b.number);

        Ok(RollupInfo::new(blocks, events))
    }
}
