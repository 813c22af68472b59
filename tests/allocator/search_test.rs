/*!
 * Candidate Search Properties
 * Every proposed placement is aligned and fits both the free region and the window
 */

use nearby_buffers::{possible_buffer_addresses, AddressRange};
use proptest::prelude::*;

const GRANULARITIES: [usize; 3] = [4096, 16384, 65536];

fn range() -> impl Strategy<Value = AddressRange> {
    (any::<usize>(), any::<usize>()).prop_map(|(a, b)| AddressRange::new(a.min(b), a.max(b)))
}

proptest! {
    #[test]
    fn candidates_fit_region_and_window(
        window in range(),
        region in range(),
        size in 1usize..0x10_0000,
        granularity in prop::sample::select(GRANULARITIES.to_vec()),
    ) {
        let candidates = possible_buffer_addresses(window, region, size, granularity);
        prop_assert!(candidates.len() <= 4);

        for &address in &candidates {
            let placement = AddressRange::new(address, address + (size - 1));
            prop_assert_eq!(address % granularity, 0);
            prop_assert!(region.contains(&placement));
            prop_assert!(window.contains(&placement));
        }
    }

    #[test]
    fn disjoint_ranges_yield_nothing(
        start in 0usize..usize::MAX / 4,
        gap in 1usize..0x1000_0000,
        len in 1usize..0x1000_0000,
        size in 1usize..0x1_0000,
    ) {
        let region = AddressRange::new(start, start + len);
        let window_start = start + len + gap;
        let window = AddressRange::new(window_start, window_start + len);

        prop_assert!(possible_buffer_addresses(window, region, size, 4096).is_empty());
        prop_assert!(possible_buffer_addresses(region, window, size, 4096).is_empty());
    }

    #[test]
    fn oversized_buffers_yield_nothing(region in range(), extra in 1usize..0x1000) {
        prop_assume!(region.size() < usize::MAX - extra);
        let size = region.size() + extra;
        let window = AddressRange::new(0, usize::MAX);
        prop_assert!(possible_buffer_addresses(window, region, size, 4096).is_empty());
    }
}

#[test]
fn aligned_placement_is_found_when_one_exists() {
    // A single aligned page lies inside both ranges, away from every edge
    let window = AddressRange::new(0x1_0800, 0x1_3800);
    let region = AddressRange::new(0x1_0100, 0x1_2FFF);
    let candidates = possible_buffer_addresses(window, region, 0x1000, 0x1000);
    assert_eq!(candidates.as_slice(), &[0x1_1000, 0x1_2000]);
}
