use crate::{
    constants::UNSAFE_ZONE_DISTANCE,
    error::{L1SyncError, RangeError},
    BlockRange, LiveBlockRanges, ToBlock,
};
use parking_lot::Mutex;
use std::fmt;

/// The ranges pending after a new L1 head was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewLastBlockResponse {
    /// The whole range of blocks not yet stored, `[last_block_stored, new_head]`.
    pub full_range: BlockRange,
    /// The range added to the pending blocks by the new head, if any.
    pub extended_range: Option<BlockRange>,
}

#[derive(Debug)]
struct SyncStatusInner {
    last_block_stored: u64,
    highest_block_requested: u64,
    last_block_on_l1: Option<u64>,
    chunk_size: u64,
    processing_ranges: LiveBlockRanges,
    error_ranges: LiveBlockRanges,
}

impl SyncStatusInner {
    fn next_range_only_retries(&mut self) -> Option<BlockRange> {
        let range = *self.error_ranges.first()?;
        if range.is_latest() {
            tracing::debug!(target: "scroll::l1_sync", %range, "discarding error range open to the latest block");
            // the range was returned by `first`, removal can't fail.
            let _ = self.error_ranges.remove(&range);
            return None;
        }
        Some(range)
    }

    fn highest_block_in_ranges(&self) -> Option<u64> {
        self.processing_ranges
            .highest_bounded_block()
            .into_iter()
            .chain(self.error_ranges.highest_bounded_block())
            .max()
    }

    fn have_requested_all_blocks(&self) -> bool {
        self.last_block_on_l1.is_some_and(|head| head <= self.highest_block_requested)
    }

    fn is_fully_synchronized(&self) -> bool {
        self.have_requested_all_blocks() &&
            self.processing_ranges.is_empty() &&
            self.error_ranges.is_empty()
    }
}

/// The synchronization progress of the L1: the last block stored in the state, the ranges in
/// flight and the ranges pending a retry.
///
/// The status is shared by the producer and the worker completions, all the fields are guarded by
/// a single lock.
#[derive(Debug)]
pub struct SyncStatus {
    inner: Mutex<SyncStatusInner>,
}

impl SyncStatus {
    /// Returns a new [`SyncStatus`] anchored at `last_block_stored`, requesting ranges of
    /// `chunk_size` blocks.
    pub fn new(last_block_stored: u64, chunk_size: u64) -> Self {
        Self {
            inner: Mutex::new(SyncStatusInner {
                last_block_stored,
                highest_block_requested: last_block_stored,
                last_block_on_l1: None,
                chunk_size,
                processing_ranges: LiveBlockRanges::new(),
                error_ranges: LiveBlockRanges::new(),
            }),
        }
    }

    /// Reanchors the status at `last_block_stored`, dropping every tracked range. The known L1
    /// head is kept.
    pub fn reset(&self, last_block_stored: u64) {
        let mut inner = self.inner.lock();
        tracing::info!(target: "scroll::l1_sync", last_block_stored, previous = inner.last_block_stored, "resetting sync status");
        inner.last_block_stored = last_block_stored;
        inner.highest_block_requested = last_block_stored;
        inner.processing_ranges.clear();
        inner.error_ranges.clear();
    }

    /// Checks the status can be used for synchronization.
    pub fn verify(&self) -> Result<(), L1SyncError> {
        let inner = self.inner.lock();
        if inner.chunk_size == 0 {
            return Err(L1SyncError::InvalidConfig("sync chunk size must be greater than 0"));
        }
        if inner.last_block_stored == 0 {
            return Err(L1SyncError::InvalidConfig("undefined starting block"));
        }
        Ok(())
    }

    /// Returns the last block stored in the state.
    pub fn highest_block_received(&self) -> u64 {
        self.inner.lock().last_block_stored
    }

    /// Returns the highest block requested.
    pub fn highest_block_requested(&self) -> u64 {
        self.inner.lock().highest_block_requested
    }

    /// Returns the latest known L1 block.
    pub fn last_block_on_l1(&self) -> Option<u64> {
        self.inner.lock().last_block_on_l1
    }

    /// Returns true if the status has both the latest L1 block and a starting block.
    pub fn has_all_data_to_work(&self) -> bool {
        let inner = self.inner.lock();
        inner.last_block_on_l1.is_some() && inner.last_block_stored != 0
    }

    /// Returns true if every block up to the latest known L1 block was requested.
    pub fn have_requested_all_blocks(&self) -> bool {
        self.inner.lock().have_requested_all_blocks()
    }

    /// Returns true if every block up to the latest known L1 block was requested and no range is
    /// in flight or pending a retry.
    pub fn is_fully_synchronized(&self) -> bool {
        self.inner.lock().is_fully_synchronized()
    }

    /// Returns true if the block is close enough to the L1 head to be reorged. The highest
    /// requested block is tested if no block is provided.
    pub fn is_inside_unsafe_zone(&self, number: Option<u64>) -> bool {
        let inner = self.inner.lock();
        let number = number.unwrap_or(inner.highest_block_requested);
        let head = inner.last_block_on_l1.unwrap_or_default();
        head.saturating_sub(number) < UNSAFE_ZONE_DISTANCE
    }

    /// Returns the first range pending a retry. A failed range open to the latest block is
    /// discarded instead of being retried.
    pub fn next_range_only_retries(&self) -> Option<BlockRange> {
        self.inner.lock().next_range_only_retries()
    }

    /// Returns the next range to request: a retry if any, otherwise a fresh range following the
    /// highest known block.
    pub fn next_range(&self) -> Result<Option<BlockRange>, RangeError> {
        let mut inner = self.inner.lock();
        if let Some(range) = inner.next_range_only_retries() {
            return Ok(Some(range));
        }

        let Some(head) = inner.last_block_on_l1 else {
            tracing::debug!(target: "scroll::l1_sync", "latest L1 block unknown, no range to request");
            return Ok(None);
        };
        if head <= inner.highest_block_requested {
            tracing::debug!(target: "scroll::l1_sync", head, "every block requested");
            return Ok(None);
        }
        if inner.processing_ranges.has_latest() || inner.error_ranges.has_latest() {
            tracing::debug!(target: "scroll::l1_sync", "range to the latest block in flight");
            return Ok(None);
        }

        let highest = inner.highest_block_in_ranges().unwrap_or_default();
        let from = highest.max(inner.last_block_stored) + 1;
        let to = head.min(from + inner.chunk_size);
        let range =
            if to == head { BlockRange::to_latest(from) } else { BlockRange::new(from, to) };
        range.validate()?;
        Ok(Some(range))
    }

    /// Registers the range as in flight, removing it from the ranges pending a retry. Returns true
    /// if the range is a retry.
    pub fn on_started_new_worker(&self, range: BlockRange) -> Result<bool, RangeError> {
        let mut inner = self.inner.lock();
        let retry = inner.error_ranges.remove(&range).is_ok();
        if retry {
            tracing::info!(target: "scroll::l1_sync", %range, "retrying range");
        }
        inner.processing_ranges.add(range)?;

        match range.to_block {
            ToBlock::Latest => {
                inner.highest_block_requested = inner.last_block_on_l1.unwrap_or_default()
            }
            ToBlock::Number(to) => {
                inner.highest_block_requested = inner.highest_block_requested.max(to)
            }
        }
        Ok(retry)
    }

    /// Registers the completion of the range. A successful range raises the last block stored to
    /// `highest_block_in_response`; a failed range is queued for a retry. Returns false if the
    /// range was not in flight, in which case nothing changes.
    pub fn on_finish_worker(
        &self,
        range: BlockRange,
        successful: bool,
        highest_block_in_response: u64,
    ) -> Result<bool, RangeError> {
        let mut inner = self.inner.lock();
        if inner.processing_ranges.remove(&range).is_err() {
            tracing::debug!(target: "scroll::l1_sync", %range, "finished range not in flight, ignoring");
            return Ok(false);
        }

        if successful {
            if highest_block_in_response != 0 && highest_block_in_response > inner.last_block_stored
            {
                inner.last_block_stored = highest_block_in_response;
            }
        } else {
            inner.error_ranges.add(range)?;
        }
        Ok(true)
    }

    /// Registers a new L1 head. A head lower than the known one is logged and ignored.
    pub fn on_new_last_block_on_l1(&self, last_block: u64) -> NewLastBlockResponse {
        let mut inner = self.inner.lock();
        let full_range = BlockRange::new(inner.last_block_stored, last_block);

        let extended_range = match inner.last_block_on_l1 {
            None => {
                inner.last_block_on_l1 = Some(last_block);
                Some(full_range)
            }
            Some(previous) if last_block > previous => {
                inner.last_block_on_l1 = Some(last_block);
                Some(BlockRange::new(previous + 1, last_block))
            }
            Some(previous) if last_block < previous => {
                tracing::warn!(target: "scroll::l1_sync", previous, last_block, "received a lower L1 head, keeping the previous one");
                None
            }
            Some(_) => None,
        };

        NewLastBlockResponse { full_range, extended_range }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        write!(
            f,
            "last_block_stored: {} highest_block_requested: {} last_block_on_l1: {:?} chunk_size: {} processing: {} errors: {}",
            inner.last_block_stored,
            inner.highest_block_requested,
            inner.last_block_on_l1,
            inner.chunk_size,
            inner.processing_ranges,
            inner.error_ranges,
        )
    }
}
