use crate::error::RangeError;
use std::fmt;

/// The upper bound of a [`BlockRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToBlock {
    /// A concrete block number.
    Number(u64),
    /// The latest block of the L1 at the time the range is fetched.
    Latest,
}

impl ToBlock {
    /// Returns the concrete block number, if any.
    pub const fn number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Latest => None,
        }
    }

    /// Returns true if the bound is [`ToBlock::Latest`].
    pub const fn is_latest(&self) -> bool {
        matches!(self, Self::Latest)
    }

    /// Returns the bound as an inclusive upper limit, with [`ToBlock::Latest`] mapped to
    /// [`u64::MAX`].
    const fn as_upper_limit(&self) -> u64 {
        match self {
            Self::Number(n) => *n,
            Self::Latest => u64::MAX,
        }
    }
}

impl fmt::Display for ToBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Latest => write!(f, "latest"),
        }
    }
}

/// An inclusive range of L1 block numbers `[from_block, to_block]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRange {
    /// The first block of the range.
    pub from_block: u64,
    /// The last block of the range.
    pub to_block: ToBlock,
}

impl BlockRange {
    /// Returns a new bounded [`BlockRange`].
    pub const fn new(from_block: u64, to_block: u64) -> Self {
        Self { from_block, to_block: ToBlock::Number(to_block) }
    }

    /// Returns a new [`BlockRange`] open up to the latest block.
    pub const fn to_latest(from_block: u64) -> Self {
        Self { from_block, to_block: ToBlock::Latest }
    }

    /// Returns true if the range is open up to the latest block.
    pub const fn is_latest(&self) -> bool {
        self.to_block.is_latest()
    }

    /// Returns the count of blocks in the range, 0 if the range is open ended.
    pub const fn block_count(&self) -> u64 {
        match self.to_block {
            ToBlock::Number(to) => to.saturating_sub(self.from_block) + 1,
            ToBlock::Latest => 0,
        }
    }

    /// Returns true if the block number is inside the range.
    pub const fn contains(&self, number: u64) -> bool {
        self.from_block <= number && number <= self.to_block.as_upper_limit()
    }

    /// Returns true if both closed intervals intersect.
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.from_block <= other.to_block.as_upper_limit() &&
            other.from_block <= self.to_block.as_upper_limit()
    }

    /// Returns the minimal range covering both ranges.
    pub fn union(&self, other: &Self) -> Self {
        let to_block = if self.is_latest() || other.is_latest() {
            ToBlock::Latest
        } else {
            ToBlock::Number(self.to_block.as_upper_limit().max(other.to_block.as_upper_limit()))
        };
        Self { from_block: self.from_block.min(other.from_block), to_block }
    }

    /// Validates the range: block 0 is never a valid bound and the bounds must be ordered.
    pub fn validate(&self) -> Result<(), RangeError> {
        if self.from_block == 0 {
            return Err(RangeError::Invalid(*self));
        }
        if let ToBlock::Number(to) = self.to_block {
            if to == 0 || self.from_block > to {
                return Err(RangeError::Invalid(*self));
            }
        }
        Ok(())
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.from_block, self.to_block)
    }
}
