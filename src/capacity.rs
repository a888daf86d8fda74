//! Word-count bounds for chunks.
//!
//! ## The Problem
//!
//! Transcript chunks are measured in words, not bytes. Two bounds matter:
//!
//! - Too few words: the chunk embeds poorly and carries no context.
//! - Too many words: the chunk dilutes retrieval and may exceed model limits.
//!
//! ```text
//! min = 3, max = 6
//!
//! [w w w w w] [w w w w w w] [w]
//!                            ^ below min: merged into its predecessor
//! ```
//!
//! `WordBudget` pairs the soft lower bound with the hard upper bound so both
//! chunkers share one definition of "fits".

use std::cmp::Ordering;

/// Minimum and maximum words per chunk.
///
/// # Examples
///
/// ```rust
/// use timeslab::WordBudget;
///
/// let budget = WordBudget::new(10, 200).unwrap();
/// assert_eq!(budget.min(), 10);
/// assert_eq!(budget.max(), 200);
///
/// // Range syntax
/// let budget = WordBudget::from(5..=50);
/// assert_eq!(budget.min(), 5);
/// assert_eq!(budget.max(), 50);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordBudget {
    min: usize,
    max: usize,
}

impl WordBudget {
    /// Create a budget.
    ///
    /// # Errors
    ///
    /// Returns an error if `max == 0` or `min > max`.
    pub fn new(min: usize, max: usize) -> Result<Self, WordBudgetError> {
        if max == 0 {
            return Err(WordBudgetError::ZeroMax);
        }
        if min > max {
            return Err(WordBudgetError::MinGreaterThanMax { min, max });
        }
        Ok(Self { min, max })
    }

    /// A budget with no lower bound.
    ///
    /// # Panics
    ///
    /// Panics if `max == 0`.
    #[must_use]
    pub fn at_most(max: usize) -> Self {
        assert!(max > 0, "max words must be > 0");
        Self { min: 0, max }
    }

    /// Soft lower bound: undersized chunks get merged.
    #[must_use]
    pub const fn min(&self) -> usize {
        self.min
    }

    /// Hard upper bound.
    #[must_use]
    pub const fn max(&self) -> usize {
        self.max
    }

    /// Where a chunk of `count` words falls relative to the budget.
    ///
    /// - `Ordering::Less`: below `min`, a merge candidate
    /// - `Ordering::Equal`: within `min..=max`
    /// - `Ordering::Greater`: above `max`
    #[must_use]
    pub fn fits(&self, count: usize) -> Ordering {
        if count < self.min {
            Ordering::Less
        } else if count > self.max {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }

    /// Whether adding `additional` words to `current` would pass `max`.
    #[must_use]
    pub fn would_overflow(&self, current: usize, additional: usize) -> bool {
        current.saturating_add(additional) > self.max
    }

    /// Whether `count` is below the lower bound.
    #[must_use]
    pub fn is_undersized(&self, count: usize) -> bool {
        count < self.min
    }
}

impl Default for WordBudget {
    fn default() -> Self {
        Self { min: 10, max: 200 }
    }
}

impl From<std::ops::RangeInclusive<usize>> for WordBudget {
    fn from(range: std::ops::RangeInclusive<usize>) -> Self {
        let max = (*range.end()).max(1);
        Self {
            min: (*range.start()).min(max),
            max,
        }
    }
}

/// Error when configuring a word budget.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WordBudgetError {
    /// Max words must be positive.
    #[error("max words must be > 0")]
    ZeroMax,

    /// Min words must not exceed max words.
    #[error("min ({min}) must be <= max ({max})")]
    MinGreaterThanMax {
        /// The requested minimum.
        min: usize,
        /// The requested maximum.
        max: usize,
    },
}
