//! Integration tests of the L1 reorg detection.
#![cfg(feature = "test-utils")]

use rollup_node_l1_sync::{
    test_utils::{chain, chain_from, MockL1DataSource, MockStateApplier},
    L1SyncConfig, L1SyncError, L1SyncOrchestrator, ProducerConfig,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{subscriber::set_global_default, Level};

fn setup() {
    let sub = tracing_subscriber::FmtSubscriber::builder().with_max_level(Level::TRACE).finish();
    let _ = set_global_default(sub);
}

fn config() -> L1SyncConfig {
    L1SyncConfig {
        producer: ProducerConfig {
            sync_chunk_size: 20,
            min_time_between_retries_for_rollup_info: Duration::from_millis(10),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn test_should_detect_reorg_below_last_synced_block_and_recover() -> eyre::Result<()> {
    setup();

    // Given
    let blocks = chain(1, 250);
    let source = MockL1DataSource::new(blocks.clone());
    source.with_event_on_each((1..=35).map(|i| i * 7)).await;
    let applier = MockStateApplier::default();
    let mut orchestrator = L1SyncOrchestrator::from_data_sources(
        config(),
        vec![source.clone(); 4],
        applier.clone(),
        CancellationToken::new(),
    )?;
    let synced = orchestrator.start(blocks[0]).await?;
    assert_eq!(synced, blocks[244]);

    // When
    let fork = chain_from(&blocks[239], 60, 1);
    source.reorg(fork.clone()).await;
    let res = orchestrator.start(synced).await;

    // Then
    assert!(matches!(
        res,
        Err(L1SyncError::L1Reorg { number: 245, cached, received })
            if cached == blocks[244].hash && received == fork[4].hash
    ));
    assert_eq!(applier.last_applied(), Some(blocks[244]));

    // restart from a block below the fork.
    applier.rollback_to(238);
    let synced = orchestrator.start(blocks[237]).await?;

    // the range without rollup block applies its last block.
    assert_eq!(synced, fork[39]);
    let applied = applier.applied_blocks();
    assert_eq!(applied.iter().rev().take(2).copied().collect::<Vec<_>>(), vec![fork[39], fork[4]]);
    assert!(!applied.contains(&blocks[244]));

    Ok(())
}

#[tokio::test]
async fn test_should_not_apply_ranges_after_reorg() -> eyre::Result<()> {
    setup();

    // Given
    let blocks = chain(1, 150);
    let source = MockL1DataSource::new(blocks.clone());
    source.with_event_on_each([120, 130, 140]).await;
    let applier = MockStateApplier::default();
    let mut orchestrator = L1SyncOrchestrator::from_data_sources(
        config(),
        vec![source.clone(); 3],
        applier.clone(),
        CancellationToken::new(),
    )?;
    let forked_start = chain_from(&blocks[98], 1, 1)[0];

    // When
    let res = orchestrator.start(forked_start).await;

    // Then
    assert!(matches!(res, Err(L1SyncError::L1Reorg { number: 100, .. })));
    assert!(applier.applied().is_empty());
    assert_eq!(orchestrator.handle().last_block_synced(), Some(forked_start));

    Ok(())
}
