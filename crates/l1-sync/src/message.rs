use crate::{BlockRange, ToBlock};
use rollup_node_primitives::{EventsByBlockHash, L1Block};
use std::{fmt, time::Duration};

/// The rollup info fetched for a [`BlockRange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollupInfoResult {
    /// The requested range.
    pub range: BlockRange,
    /// The blocks of the range holding rollup events, in ascending order.
    pub blocks: Vec<L1Block>,
    /// The ordered events of each block.
    pub events: EventsByBlockHash,
    /// The last block of the range, fetched when the range is open ended or close to the L1 head.
    pub last_block_of_range: Option<L1Block>,
    /// The block preceding the range, fetched to check the hash chain continuity.
    pub previous_block_of_range: Option<L1Block>,
}

impl RollupInfoResult {
    /// Returns an empty [`RollupInfoResult`] for the range.
    pub fn new(range: BlockRange) -> Self {
        Self {
            range,
            blocks: Vec::new(),
            events: EventsByBlockHash::new(),
            last_block_of_range: None,
            previous_block_of_range: None,
        }
    }

    /// Returns the highest block number covered by the result: the upper bound of a bounded
    /// range, otherwise the highest block known in the result or the block preceding the range if
    /// none is known.
    pub fn highest_block_number(&self) -> u64 {
        match self.range.to_block {
            ToBlock::Number(to) => to,
            ToBlock::Latest => self
                .real_highest_block_number()
                .unwrap_or_else(|| self.range.from_block.saturating_sub(1)),
        }
    }

    /// Returns the highest block number of the fetched blocks and the last block of the range.
    pub fn real_highest_block_number(&self) -> Option<u64> {
        self.blocks.iter().chain(self.last_block_of_range.as_ref()).map(|b| b.number).max()
    }

    /// Returns the last block of the range if known, otherwise the highest fetched block.
    pub fn highest_block_received(&self) -> Option<&L1Block> {
        self.last_block_of_range.as_ref().or_else(|| self.blocks.iter().max_by_key(|b| b.number))
    }
}

impl fmt::Display for RollupInfoResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RollupInfoResult {{ range: {}, blocks: {}, last: {:?}, previous: {:?} }}",
            self.range,
            self.blocks.len(),
            self.last_block_of_range.map(|b| b.number),
            self.previous_block_of_range.map(|b| b.number),
        )
    }
}

/// A control event sent from the producer to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// The consumer should stop after processing the previous messages.
    Stop,
    /// The producer requested every block up to the L1 head. Carries the highest block received
    /// by the producer.
    ProducerFullySynced(u64),
}

/// A message sent from the producer to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum L1SyncMessage {
    /// The rollup info of a range.
    Data(Box<RollupInfoResult>),
    /// A control event.
    Control(ControlEvent),
}

impl L1SyncMessage {
    /// Returns the rollup info of the message, if any.
    pub fn as_data(&self) -> Option<&RollupInfoResult> {
        match self {
            Self::Data(data) => Some(data),
            Self::Control(_) => None,
        }
    }

    /// Returns true if the message is a control event.
    pub const fn is_control(&self) -> bool {
        matches!(self, Self::Control(_))
    }
}

impl From<RollupInfoResult> for L1SyncMessage {
    fn from(value: RollupInfoResult) -> Self {
        Self::Data(Box::new(value))
    }
}

impl From<ControlEvent> for L1SyncMessage {
    fn from(value: ControlEvent) -> Self {
        Self::Control(value)
    }
}

impl fmt::Display for L1SyncMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(data) => write!(f, "Data({data})"),
            Self::Control(event) => write!(f, "Control({event:?})"),
        }
    }
}

/// The outcome of a rollup info fetch.
#[derive(Debug)]
pub struct RollupInfoResponse {
    /// The error that interrupted the fetch, if any.
    pub error: Option<crate::FetchError>,
    /// The time spent on the fetch.
    pub duration: Duration,
    /// The rollup info, partial if the fetch failed.
    pub result: RollupInfoResult,
}

impl RollupInfoResponse {
    /// Returns true if the fetch succeeded.
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
