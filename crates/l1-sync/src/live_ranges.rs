use crate::{error::RangeError, BlockRange};
use std::fmt;

/// A set of non overlapping [`BlockRange`]s sorted by first block. Used to track the ranges in
/// flight and the ranges pending a retry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LiveBlockRanges {
    ranges: Vec<BlockRange>,
}

impl LiveBlockRanges {
    /// Returns a new empty [`LiveBlockRanges`].
    pub const fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Adds the range. Fails without modifying the set if the range is invalid or overlaps with a
    /// range of the set.
    pub fn add(&mut self, range: BlockRange) -> Result<(), RangeError> {
        range.validate()?;
        if let Some(existing) = self.ranges.iter().find(|r| r.overlaps(&range)) {
            return Err(RangeError::Overlap(range, *existing));
        }
        let index = self.ranges.partition_point(|r| r.from_block < range.from_block);
        self.ranges.insert(index, range);
        Ok(())
    }

    /// Removes the range. Fails if the exact range is not in the set.
    pub fn remove(&mut self, range: &BlockRange) -> Result<(), RangeError> {
        let index =
            self.ranges.iter().position(|r| r == range).ok_or(RangeError::NotFound(*range))?;
        self.ranges.remove(index);
        Ok(())
    }

    /// Returns true if the exact range is in the set.
    pub fn contains(&self, range: &BlockRange) -> bool {
        self.ranges.contains(range)
    }

    /// Returns the range with the lowest first block.
    pub fn first(&self) -> Option<&BlockRange> {
        self.ranges.first()
    }

    /// Returns the minimal range covering every range of the set, `None` if the set is empty.
    pub fn super_range(&self) -> Option<BlockRange> {
        let first = *self.ranges.first()?;
        Some(self.ranges.iter().fold(first, |acc, r| acc.union(r)))
    }

    /// Returns the highest concrete upper bound of the set, ignoring open ended ranges.
    pub fn highest_bounded_block(&self) -> Option<u64> {
        self.ranges.iter().filter_map(|r| r.to_block.number()).max()
    }

    /// Returns true if one of the ranges is open ended.
    pub fn has_latest(&self) -> bool {
        self.ranges.iter().any(BlockRange::is_latest)
    }

    /// Returns the count of ranges.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Returns an iterator over the ranges.
    pub fn iter(&self) -> std::slice::Iter<'_, BlockRange> {
        self.ranges.iter()
    }

    /// Removes every range.
    pub fn clear(&mut self) {
        self.ranges.clear();
    }
}

impl<'a> IntoIterator for &'a LiveBlockRanges {
    type Item = &'a BlockRange;
    type IntoIter = std::slice::Iter<'a, BlockRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for LiveBlockRanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{range}")?;
        }
        write!(f, "}}")
    }
}
