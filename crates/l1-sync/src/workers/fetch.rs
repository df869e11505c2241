use super::{LastBlockMode, RollupInfoRequest};
use crate::{error::FetchError, RollupInfoResponse, RollupInfoResult};
use rollup_node_providers::L1DataSource;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Runs the request against the data source. The fetch is interrupted by the cancellation of the
/// token, and bounded by `timeout` once the initial delay elapsed.
pub(super) async fn run_request<DS: L1DataSource + ?Sized>(
    source: &DS,
    request: RollupInfoRequest,
    cancel: CancellationToken,
    timeout: Duration,
) -> RollupInfoResponse {
    let start = Instant::now();
    let mut result = RollupInfoResult::new(request.range);

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        outcome = async {
            if !request.sleep_before.is_zero() {
                tokio::time::sleep(request.sleep_before).await;
            }
            tokio::time::timeout(timeout, fetch_rollup_info(source, &request, &mut result))
                .await
                .map_err(|_| FetchError::Timeout(timeout))?
        } => outcome,
    };

    RollupInfoResponse { error: outcome.err(), duration: start.elapsed(), result }
}

/// Fetches the rollup info of the range into `result`. The steps are run in a fixed order: the
/// last block before the range, the range, the last block after the range and finally the block
/// preceding the range. Under a reorg happening during the request, the blocks fetched around the
/// range call are then inconsistent with each other, which the consumer detects.
///
/// The first failing step interrupts the fetch, leaving `result` partially filled.
pub(super) async fn fetch_rollup_info<DS: L1DataSource + ?Sized>(
    source: &DS,
    request: &RollupInfoRequest,
    result: &mut RollupInfoResult,
) -> Result<(), FetchError> {
    let range = request.range;
    let to = range.to_block.number();

    if let (Some(to), LastBlockMode::Always) = (to, request.last_block_mode) {
        result.last_block_of_range = Some(source.block_by_number(to).await?);
    }

    let info = source.rollup_info_by_block_range(range.from_block, to).await?;
    let events = info.events_count();
    result.blocks = info.blocks;
    result.events = info.events;

    if let (Some(to), LastBlockMode::IfEmpty) = (to, request.last_block_mode) {
        if result.blocks.is_empty() {
            result.last_block_of_range = Some(source.block_by_number(to).await?);
        }
    }

    if request.request_previous_block && range.from_block > 2 {
        result.previous_block_of_range = Some(source.block_by_number(range.from_block - 1).await?);
    }

    tracing::trace!(target: "scroll::l1_sync::workers", %range, blocks = result.blocks.len(), events, "fetched rollup info");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BlockRange;
    use rollup_node_providers::test_utils::{chain, MockCall, MockL1DataSource};

    #[tokio::test]
    async fn test_should_fetch_steps_in_order() -> eyre::Result<()> {
        // Given
        let source = MockL1DataSource::new(chain(1, 50));
        source.with_event_on_each([12, 15]).await;
        let request = RollupInfoRequest::new(BlockRange::new(10, 20), LastBlockMode::Always)
            .with_previous_block(true);

        // When
        let mut result = RollupInfoResult::new(request.range);
        fetch_rollup_info(&source, &request, &mut result).await?;

        // Then
        assert_eq!(
            source.calls().await,
            vec![
                MockCall::BlockByNumber(20),
                MockCall::RollupInfo { from: 10, to: Some(20) },
                MockCall::BlockByNumber(9),
            ]
        );
        assert_eq!(result.blocks.len(), 2);
        assert_eq!(result.events.len(), 2);
        assert_eq!(result.last_block_of_range.map(|b| b.number), Some(20));
        assert_eq!(result.previous_block_of_range.map(|b| b.number), Some(9));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_fetch_last_block_after_empty_range() -> eyre::Result<()> {
        // Given
        let source = MockL1DataSource::new(chain(1, 50));
        let empty = RollupInfoRequest::new(BlockRange::new(2, 20), LastBlockMode::IfEmpty);
        let latest = RollupInfoRequest::new(BlockRange::to_latest(21), LastBlockMode::IfEmpty)
            .with_previous_block(true);

        // When
        let mut result = RollupInfoResult::new(empty.range);
        fetch_rollup_info(&source, &empty, &mut result).await?;
        let mut latest_result = RollupInfoResult::new(latest.range);
        fetch_rollup_info(&source, &latest, &mut latest_result).await?;

        // Then
        assert_eq!(
            source.calls().await,
            vec![
                MockCall::RollupInfo { from: 2, to: Some(20) },
                MockCall::BlockByNumber(20),
                MockCall::RollupInfo { from: 21, to: None },
                MockCall::BlockByNumber(20),
            ]
        );
        assert_eq!(result.last_block_of_range.map(|b| b.number), Some(20));
        assert_eq!(latest_result.last_block_of_range, None);
        assert_eq!(latest_result.previous_block_of_range.map(|b| b.number), Some(20));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_return_partial_result_on_failure() -> eyre::Result<()> {
        // Given
        let source = MockL1DataSource::new(chain(1, 50));
        source.fail_range(10, 1).await;
        let request = RollupInfoRequest::new(BlockRange::new(10, 20), LastBlockMode::Always)
            .with_previous_block(true);

        // When
        let response =
            run_request(&source, request, CancellationToken::new(), Duration::from_secs(1)).await;

        // Then
        assert!(matches!(response.error, Some(FetchError::Provider(_))));
        assert_eq!(response.result.range, request.range);
        assert_eq!(response.result.last_block_of_range.map(|b| b.number), Some(20));
        assert_eq!(response.result.previous_block_of_range, None);
        assert_eq!(source.calls().await.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_cancel_during_initial_delay() -> eyre::Result<()> {
        // Given
        let source = MockL1DataSource::new(chain(1, 50));
        let request = RollupInfoRequest::new(BlockRange::new(10, 20), LastBlockMode::Never)
            .with_sleep_before(Duration::from_secs(60));
        let cancel = CancellationToken::new();

        // When
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                run_request(&source, request, cancel, Duration::from_secs(1)).await
            })
        };
        cancel.cancel();
        let response = handle.await?;

        // Then
        assert!(response.error.is_some_and(|err| err.is_cancelled()));
        assert_eq!(response.result.range, request.range);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_time_out() -> eyre::Result<()> {
        // Given
        let source = MockL1DataSource::new(chain(1, 50));
        source.set_delay(Duration::from_millis(200)).await;
        let request = RollupInfoRequest::new(BlockRange::new(10, 20), LastBlockMode::Never);

        // When
        let response =
            run_request(&source, request, CancellationToken::new(), Duration::from_millis(10))
                .await;

        // Then
        assert!(matches!(response.error, Some(FetchError::Timeout(_))));

        Ok(())
    }
}
