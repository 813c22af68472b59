/*!
 * Address Ranges
 * Inclusive address intervals used by the free region search
 */

use super::math::add_with_overflow_cap;
use super::types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive interval of addresses `[start, end_inclusive]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressRange {
    pub start: Address,
    pub end_inclusive: Address,
}

impl AddressRange {
    #[inline]
    #[must_use]
    pub const fn new(start: Address, end_inclusive: Address) -> Self {
        Self {
            start,
            end_inclusive,
        }
    }

    /// Builds a range covering `length` bytes from `start`, capped at the top of the address space.
    /// A zero length yields a range holding only `start`.
    #[inline]
    #[must_use]
    pub fn from_start_and_length(start: Address, length: usize) -> Self {
        let end = add_with_overflow_cap(start, length.saturating_sub(1));
        Self::new(start, end)
    }

    /// Whether `other` lies entirely inside this range
    #[inline]
    #[must_use]
    pub const fn contains(&self, other: &AddressRange) -> bool {
        other.start >= self.start && other.end_inclusive <= self.end_inclusive
    }

    /// Whether the two ranges share at least one address
    #[inline]
    #[must_use]
    pub const fn overlaps(&self, other: &AddressRange) -> bool {
        self.start <= other.end_inclusive && other.start <= self.end_inclusive
    }

    /// Number of addresses covered, saturating for a range spanning the full address space
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        (self.end_inclusive - self.start).saturating_add(1)
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}..={:#x}", self.start, self.end_inclusive)
    }
}
