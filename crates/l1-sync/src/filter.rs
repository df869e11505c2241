use crate::L1SyncMessage;
use parking_lot::Mutex;

#[derive(Debug)]
struct FilterState {
    last_block_on_synchronizer: u64,
    pending: Vec<L1SyncMessage>,
}

impl FilterState {
    /// Removes and returns the next deliverable message from the pending buffer.
    fn next_deliverable(&mut self) -> Option<L1SyncMessage> {
        let expected = self.last_block_on_synchronizer + 1;
        let position = self.pending.iter().enumerate().position(|(i, msg)| {
            if msg.is_control() {
                return i == 0
            }
            msg.as_data().is_some_and(|data| data.range.from_block == expected)
        })?;

        let msg = self.pending.remove(position);
        if let Some(data) = msg.as_data() {
            let highest = data.highest_block_number();
            if highest != 0 {
                self.last_block_on_synchronizer = highest;
            }
        }
        Some(msg)
    }
}

/// Reorders the messages of the producer so that the rollup info reach the consumer in ascending
/// and gap free order. A control message is delivered once every message queued before it was
/// delivered.
#[derive(Debug)]
pub struct ReorderingFilter {
    state: Mutex<FilterState>,
}

impl ReorderingFilter {
    /// Returns a new [`ReorderingFilter`] expecting the block following
    /// `last_block_on_synchronizer`.
    pub fn new(last_block_on_synchronizer: u64) -> Self {
        Self { state: Mutex::new(FilterState { last_block_on_synchronizer, pending: Vec::new() }) }
    }

    /// Buffers the message and returns the messages that can be delivered, in delivery order.
    pub fn filter(&self, msg: L1SyncMessage) -> Vec<L1SyncMessage> {
        let mut state = self.state.lock();

        if let Some(data) = msg.as_data() {
            if data.range.from_block <= state.last_block_on_synchronizer {
                tracing::warn!(target: "scroll::l1_sync::producer", range = %data.range, last_block_on_synchronizer = state.last_block_on_synchronizer, "dropping rollup info for already delivered blocks");
                return Vec::new();
            }
        }
        state.pending.push(msg);

        let mut delivered = Vec::new();
        while let Some(msg) = state.next_deliverable() {
            delivered.push(msg);
        }

        if !state.pending.is_empty() {
            tracing::trace!(target: "scroll::l1_sync::producer", pending = state.pending.len(), expected = state.last_block_on_synchronizer + 1, "rollup info waiting for a gap");
        }
        delivered
    }

    /// Drops the pending messages and expects the block following `last_block_on_synchronizer`.
    pub fn reset(&self, last_block_on_synchronizer: u64) {
        let mut state = self.state.lock();
        state.pending.clear();
        state.last_block_on_synchronizer = last_block_on_synchronizer;
    }

    /// Returns the count of messages waiting in the buffer.
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Returns the highest block delivered.
    pub fn last_block_on_synchronizer(&self) -> u64 {
        self.state.lock().last_block_on_synchronizer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BlockRange, ControlEvent, RollupInfoResult};
    use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

    fn data(from: u64, to: u64) -> L1SyncMessage {
        RollupInfoResult::new(BlockRange::new(from, to)).into()
    }

    fn ranges(msgs: &[L1SyncMessage]) -> Vec<(u64, u64)> {
        msgs.iter()
            .filter_map(|m| m.as_data())
            .map(|d| (d.range.from_block, d.highest_block_number()))
            .collect()
    }

    #[test]
    fn test_should_deliver_out_of_order_ranges_in_order() {
        // Given
        let filter = ReorderingFilter::new(100);

        // When
        let first = filter.filter(data(131, 141));
        let second = filter.filter(data(120, 130));
        let third = filter.filter(data(101, 119));

        // Then
        assert!(first.is_empty());
        assert!(second.is_empty());
        assert_eq!(ranges(&third), vec![(101, 119), (120, 130), (131, 141)]);
        assert_eq!(filter.last_block_on_synchronizer(), 141);
        assert_eq!(filter.pending_len(), 0);
    }

    #[test]
    fn test_should_hold_ranges_behind_a_gap() {
        // Given
        let filter = ReorderingFilter::new(100);

        // When
        let delivered = filter.filter(data(102, 119));

        // Then
        assert!(delivered.is_empty());
        assert_eq!(filter.pending_len(), 1);
        assert_eq!(filter.last_block_on_synchronizer(), 100);
    }

    #[test]
    fn test_should_deliver_control_after_previous_data() {
        // Given
        let filter = ReorderingFilter::new(100);
        assert!(filter.filter(data(111, 120)).is_empty());

        // When
        let blocked = filter.filter(ControlEvent::ProducerFullySynced(120).into());
        let delivered = filter.filter(data(101, 110));

        // Then
        assert!(blocked.is_empty());
        assert_eq!(delivered.len(), 3);
        assert_eq!(ranges(&delivered[..2]), vec![(101, 110), (111, 120)]);
        assert_eq!(delivered[2], L1SyncMessage::Control(ControlEvent::ProducerFullySynced(120)));
    }

    #[test]
    fn test_should_deliver_control_immediately_on_empty_buffer() {
        let filter = ReorderingFilter::new(100);

        let delivered = filter.filter(ControlEvent::Stop.into());

        assert_eq!(delivered, vec![L1SyncMessage::Control(ControlEvent::Stop)]);
    }

    #[test]
    fn test_should_drop_stale_ranges() {
        // Given
        let filter = ReorderingFilter::new(100);
        assert_eq!(filter.filter(data(101, 110)).len(), 1);

        // When
        let stale = filter.filter(data(105, 115));

        // Then
        assert!(stale.is_empty());
        assert_eq!(filter.pending_len(), 0);
    }

    #[test]
    fn test_should_advance_on_open_range() {
        // Given
        let filter = ReorderingFilter::new(100);
        let mut open = RollupInfoResult::new(BlockRange::to_latest(101));
        open.last_block_of_range = Some(rollup_node_primitives::L1Block {
            number: 108,
            ..Default::default()
        });

        // When
        let delivered = filter.filter(open.into());

        // Then
        assert_eq!(delivered.len(), 1);
        assert_eq!(filter.last_block_on_synchronizer(), 108);
    }

    #[test]
    fn test_should_clear_buffer_on_reset() {
        let filter = ReorderingFilter::new(100);
        filter.filter(data(120, 130));

        filter.reset(119);

        assert_eq!(filter.pending_len(), 0);
        assert_eq!(filter.last_block_on_synchronizer(), 119);
        assert_eq!(filter.filter(data(120, 130)).len(), 1);
    }

    #[test]
    fn test_should_deliver_random_permutations_in_order() {
        // Given
        let mut bounds = Vec::new();
        let mut from = 1;
        for len in [3, 7, 1, 12, 5, 9, 2, 4] {
            bounds.push((from, from + len - 1));
            from += len;
        }

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let mut shuffled = bounds.clone();
            shuffled.shuffle(&mut rng);

            // When
            let filter = ReorderingFilter::new(0);
            let delivered: Vec<_> =
                shuffled.iter().flat_map(|(from, to)| filter.filter(data(*from, *to))).collect();

            // Then
            assert_eq!(ranges(&delivered), bounds);
        }
    }
}
