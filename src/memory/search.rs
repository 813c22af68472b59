/*!
 * Candidate Address Search
 *
 * Given one free region and the caller's window, proposes up to four
 * granularity-aligned placements. Rounding can push a placement out of
 * either range independently, so each one is checked against both.
 */

use crate::core::limits::MAX_CANDIDATES;
use crate::core::math::{round_down, round_up, subtract_with_underflow_cap};
use crate::core::range::AddressRange;
use crate::core::types::Address;

/// Fixed-capacity list of candidate start addresses, in the order they should be tried
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Candidates {
    addresses: [Address; MAX_CANDIDATES],
    len: usize,
}

impl Candidates {
    #[inline]
    pub fn as_slice(&self) -> &[Address] {
        &self.addresses[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn push(&mut self, address: Address) {
        // Region and window extremes can coincide
        if self.as_slice().contains(&address) {
            return;
        }
        self.addresses[self.len] = address;
        self.len += 1;
    }
}

impl<'a> IntoIterator for &'a Candidates {
    type Item = &'a Address;
    type IntoIter = std::slice::Iter<'a, Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

/// Candidate start addresses for a `buf_size` buffer inside `free_region` and `window`
///
/// Order: region start rounded up, region end rounded down, window start
/// rounded up, window end rounded down. Every returned `[addr, addr + buf_size)`
/// lies inside both ranges and `addr` is a multiple of `granularity`.
pub fn possible_buffer_addresses(
    window: AddressRange,
    free_region: AddressRange,
    buf_size: usize,
    granularity: usize,
) -> Candidates {
    let mut candidates = Candidates::default();

    if buf_size == 0 || !free_region.overlaps(&window) || buf_size > free_region.size() {
        return candidates;
    }

    let last_start = |end_inclusive: Address| {
        subtract_with_underflow_cap(end_inclusive, buf_size - 1)
    };

    let proposals = [
        round_up(free_region.start, granularity),
        round_down(last_start(free_region.end_inclusive), granularity),
        round_up(window.start, granularity),
        round_down(last_start(window.end_inclusive), granularity),
    ];

    for address in proposals {
        let Some(end_inclusive) = address.checked_add(buf_size - 1) else {
            continue;
        };
        let placement = AddressRange::new(address, end_inclusive);

        if free_region.contains(&placement) && window.contains(&placement) {
            candidates.push(address);
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRANULARITY: usize = 65536;

    #[test]
    fn test_disjoint_region_and_window() {
        let window = AddressRange::new(100_000, 200_000);
        let region = AddressRange::new(200_001, 250_001);
        assert!(possible_buffer_addresses(window, region, 30_000, GRANULARITY).is_empty());
    }

    #[test]
    fn test_buffer_larger_than_region() {
        let window = AddressRange::new(100_000, 200_000);
        let region = AddressRange::new(100_000, 130_000);
        assert!(possible_buffer_addresses(window, region, 50_000, GRANULARITY).is_empty());
    }

    #[test]
    fn test_zero_sized_buffer() {
        let window = AddressRange::new(0, usize::MAX);
        assert!(possible_buffer_addresses(window, window, 0, GRANULARITY).is_empty());
    }

    #[test]
    fn test_region_start_is_preferred() {
        let window = AddressRange::new(0, usize::MAX);
        let region = AddressRange::new(0x10000, 0x10000 + 4 * GRANULARITY - 1);
        let candidates = possible_buffer_addresses(window, region, GRANULARITY, GRANULARITY);
        assert_eq!(candidates.as_slice()[0], 0x10000);
        assert_eq!(candidates.as_slice()[1], 0x10000 + 3 * GRANULARITY);
    }

    #[test]
    fn test_window_inside_region() {
        // Region straddles the whole window, only window-aligned placements fit
        let window = AddressRange::new(100_000, 200_000);
        let region = AddressRange::new(50_000, 250_000);
        let candidates = possible_buffer_addresses(window, region, 30_000, GRANULARITY);
        assert_eq!(candidates.as_slice(), &[131_072]);
    }

    #[test]
    fn test_window_end_aligned() {
        let window = AddressRange::new(0x8_0000, 0x10_0000 - 1);
        let region = AddressRange::new(0, 0x20_0000);
        let candidates = possible_buffer_addresses(window, region, 0x1000, 0x1000);
        assert_eq!(candidates.as_slice(), &[0x8_0000, 0xF_F000]);
    }

    #[test]
    fn test_candidates_at_top_of_address_space() {
        let window = AddressRange::new(0, usize::MAX);
        let region = AddressRange::new(usize::MAX - 3 * 4096 + 1, usize::MAX);
        let candidates = possible_buffer_addresses(window, region, 4096, 4096);
        assert!(!candidates.is_empty());
        for address in &candidates {
            assert_eq!(address % 4096, 0);
            assert!(region.contains(&AddressRange::from_start_and_length(*address, 4096)));
        }
    }
}
