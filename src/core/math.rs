/*!
 * Address Arithmetic
 * Rounding to granularity boundaries and pointer-width saturating math
 */

use super::types::Address;

/// Rounds `number` up to the next multiple of `multiple`.
///
/// Saturates to the highest multiple representable in an [`Address`] instead of wrapping.
/// A `multiple` of zero leaves the number untouched.
#[inline]
#[must_use]
pub fn round_up(number: Address, multiple: usize) -> Address {
    if multiple == 0 {
        return number;
    }

    let remainder = number % multiple;
    if remainder == 0 {
        return number;
    }

    number
        .checked_add(multiple - remainder)
        .unwrap_or_else(|| round_down(Address::MAX, multiple))
}

/// Rounds `number` down to the previous multiple of `multiple`.
#[inline]
#[must_use]
pub fn round_down(number: Address, multiple: usize) -> Address {
    if multiple == 0 {
        return number;
    }

    number - (number % multiple)
}

/// Adds two values, capping at `usize::MAX` on overflow
#[inline]
#[must_use]
pub fn add_with_overflow_cap(a: usize, b: usize) -> usize {
    a.saturating_add(b)
}

/// Subtracts two values, capping at zero on underflow
#[inline]
#[must_use]
pub fn subtract_with_underflow_cap(a: usize, b: usize) -> usize {
    a.saturating_sub(b)
}
