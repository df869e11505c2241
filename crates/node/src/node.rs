use crate::{constants, L1SyncNodeArgs, TracingStateApplier};
use alloy_provider::RootProvider;
use alloy_rpc_client::RpcClient;
use alloy_transport::layers::RetryBackoffLayer;
use rollup_node_l1_sync::{
    L1SyncConfig, L1SyncError, L1SyncHandle, L1SyncOrchestrator, RetryThrottledWorkers,
    WorkerPool, WorkersError,
};
use rollup_node_primitives::L1Block;
use rollup_node_providers::{L1DataSource, OnlineL1DataSource};
use std::{fmt, time::Duration};
use tokio_util::sync::CancellationToken;

/// The orchestrator driven by the [`L1SyncNode`].
type Orchestrator<DS> =
    L1SyncOrchestrator<RetryThrottledWorkers<WorkerPool<DS>>, TracingStateApplier>;

/// The L1 synchronization node. Runs the synchronization repeatedly, following the L1 head, and
/// restarts from an earlier block on reorgs.
pub struct L1SyncNode<DS> {
    orchestrator: Orchestrator<DS>,
    /// The data source used to read the starting blocks.
    source: DS,
    applier: TracingStateApplier,
    reorg_rollback: u64,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl<DS> fmt::Debug for L1SyncNode<DS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("L1SyncNode")
            .field("orchestrator", &self.orchestrator)
            .field("applier", &self.applier)
            .field("reorg_rollback", &self.reorg_rollback)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl L1SyncNode<OnlineL1DataSource<RootProvider>> {
    /// Returns a new [`L1SyncNode`] built from the arguments. One client is created per worker,
    /// plus one for the latest block requests.
    pub fn from_args(args: &L1SyncNodeArgs, cancel: CancellationToken) -> eyre::Result<Self> {
        args.validate().map_err(|err| eyre::eyre!(err))?;
        let provider_args = &args.l1_provider_args;
        let url = provider_args.url.clone().ok_or_else(|| eyre::eyre!("missing L1 url"))?;

        let sources = (0..=provider_args.workers)
            .map(|_| {
                let client = RpcClient::builder()
                    .layer(RetryBackoffLayer::new(
                        provider_args.max_retries,
                        provider_args.initial_backoff,
                        provider_args.compute_units_per_second,
                    ))
                    .http(url.clone());
                OnlineL1DataSource::new(
                    RootProvider::new(client),
                    provider_args.filter_addresses.clone(),
                )
            })
            .collect();

        Ok(Self::new(
            args.sync_args.config(),
            sources,
            args.sync_args.reorg_rollback,
            constants::SYNC_POLL_INTERVAL,
            cancel,
        )?)
    }
}

impl<DS> L1SyncNode<DS>
where
    DS: L1DataSource + Clone + 'static,
{
    /// Returns a new [`L1SyncNode`] over the data sources.
    pub fn new(
        config: L1SyncConfig,
        sources: Vec<DS>,
        reorg_rollback: u64,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Result<Self, L1SyncError> {
        let source = sources
            .first()
            .cloned()
            .ok_or(L1SyncError::Workers(WorkersError::NotEnoughDataSources(0)))?;
        let applier = TracingStateApplier::default();
        let orchestrator = L1SyncOrchestrator::from_data_sources(
            config,
            sources,
            applier.clone(),
            cancel.clone(),
        )?;
        Ok(Self { orchestrator, source, applier, reorg_rollback, poll_interval, cancel })
    }

    /// Returns the state applier of the node.
    pub const fn applier(&self) -> &TracingStateApplier {
        &self.applier
    }

    /// Returns a handle to the synchronization.
    pub fn handle(&self) -> L1SyncHandle {
        self.orchestrator.handle()
    }

    /// Synchronizes from `start_block` until cancelled.
    pub async fn run(mut self, start_block: u64) -> eyre::Result<()> {
        let mut last = self.source.block_by_number(start_block).await?;
        tracing::info!(target: "scroll::node", %last, "starting L1 synchronization");

        loop {
            match self.orchestrator.start(last).await {
                Ok(synced) => {
                    last = synced;
                    tracing::info!(target: "scroll::node", %last, "synchronized with the L1 head");
                    tokio::select! {
                        biased;

                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
                Err(L1SyncError::L1Reorg { number, .. }) => {
                    last = self.rollback(number).await?;
                }
                Err(L1SyncError::Aborted) => break,
                Err(err) => return Err(err.into()),
            }
        }

        tracing::info!(target: "scroll::node", tip = ?self.applier.tip(), "L1 synchronization stopped");
        Ok(())
    }

    /// Rolls the state back a fixed distance below the reorged block.
    async fn rollback(&self, reorged: u64) -> eyre::Result<L1Block> {
        let target = reorged.saturating_sub(self.reorg_rollback).max(1);
        let block = self.source.block_by_number(target).await?;
        tracing::warn!(target: "scroll::node", reorged, %block, "L1 reorg detected, restarting from an earlier block");
        self.applier.rollback_to(block);
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_node_l1_sync::ProducerConfig;
    use rollup_node_providers::test_utils::{chain, chain_from, MockL1DataSource};

    fn node(source: &MockL1DataSource, cancel: CancellationToken) -> L1SyncNode<MockL1DataSource> {
        let config = L1SyncConfig {
            producer: ProducerConfig {
                sync_chunk_size: 20,
                min_time_between_retries_for_rollup_info: Duration::from_millis(10),
                ..Default::default()
            },
            ..Default::default()
        };
        L1SyncNode::new(config, vec![source.clone(); 3], 10, Duration::from_millis(50), cancel)
            .unwrap()
    }

    async fn wait_for_tip(applier: &TracingStateApplier, tip: L1Block) -> eyre::Result<()> {
        tokio::time::timeout(Duration::from_secs(10), async {
            while applier.tip() != Some(tip) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_should_follow_the_l1_head() -> eyre::Result<()> {
        // Given
        let blocks = chain(1, 200);
        let source = MockL1DataSource::new(blocks.clone());
        source.with_event_on_each([50, 140]).await;
        source.set_head(150).await;
        source.with_event_on_each([190]).await;
        let cancel = CancellationToken::new();
        let node = node(&source, cancel.clone());
        let applier = node.applier().clone();

        // When
        let task = tokio::spawn(node.run(1));
        wait_for_tip(&applier, blocks[139]).await?;
        source.set_head(200).await;

        // Then
        wait_for_tip(&applier, blocks[189]).await?;
        cancel.cancel();
        task.await??;

        Ok(())
    }

    #[tokio::test]
    async fn test_should_restart_before_reorged_block() -> eyre::Result<()> {
        // Given
        let blocks = chain(1, 150);
        let source = MockL1DataSource::new(blocks.clone());
        source.with_event_on_each([140]).await;
        let cancel = CancellationToken::new();
        let node = node(&source, cancel.clone());
        let applier = node.applier().clone();
        let task = tokio::spawn(node.run(100));
        wait_for_tip(&applier, blocks[139]).await?;

        // When
        let fork = chain_from(&blocks[129], 30, 1);
        source.reorg(fork.clone()).await;
        source.with_event_on_each([145]).await;

        // Then
        wait_for_tip(&applier, fork[14]).await?;
        cancel.cancel();
        task.await??;

        Ok(())
    }
}
