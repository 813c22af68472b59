/*!
 * Locator Header Tests
 * Item registration against the real allocator and growth of the chain
 */

use nearby_buffers::core::sysinfo::system_info;
use nearby_buffers::locator::MAX_ITEM_COUNT;
use nearby_buffers::{get_buffer_from, BufferSearchSettings, ItemAllocationError, LocatorHeader};
use pretty_assertions::assert_eq;

fn upper_half_search(size: u32) -> BufferSearchSettings {
    let max = system_info().max_address;
    BufferSearchSettings {
        min_address: max / 2,
        max_address: max,
        size,
    }
}

#[test]
fn allocated_item_is_locked_and_in_window() {
    let header = LocatorHeader::new_detached().unwrap();
    let settings = upper_half_search(4096);
    let before = header.item_count();

    let item = header
        .try_allocate_item(settings.size, settings.min_address, settings.max_address)
        .expect("allocation should succeed");

    assert_eq!(header.item_count(), before + 1);
    assert!(item.is_taken());
    assert_eq!(item.position(), 0);
    assert!(item.can_use(settings.size, settings.min_address, settings.max_address));

    let base = item.base_address();
    drop(item);

    // Released items are found again
    let reused = header
        .find_first_available_locked(settings.size, base, base + settings.size as usize - 1)
        .unwrap();
    assert_eq!(reused.base_address(), base);
}

#[test]
fn unsatisfiable_window_is_an_error() {
    let header = LocatorHeader::new_detached().unwrap();
    let granularity = system_info().allocation_granularity;

    let result = header.try_allocate_item(4096, granularity * 16, granularity * 16 + 1);
    assert!(matches!(result, Err(ItemAllocationError::Allocation(_))));
}

#[test]
fn full_header_chains_to_next() {
    let header = LocatorHeader::new_detached().unwrap();
    let settings = upper_half_search(4096);

    // Keep every item locked so nothing can be reused
    let mut held = Vec::new();
    held.extend(header.items().iter().filter_map(|item| item.try_acquire()));
    loop {
        match header.try_allocate_item(settings.size, settings.min_address, settings.max_address) {
            Ok(item) => held.push(item),
            Err(ItemAllocationError::HeaderFull) => break,
            Err(e) => panic!("allocation failed before the header filled up: {e}"),
        }
    }

    assert_eq!(header.item_count(), MAX_ITEM_COUNT);
    assert!(header.is_full());

    let buffer = get_buffer_from(header, &settings).expect("chain should grow");
    assert!(header.has_next_locator());

    let next = header.get_next_locator().unwrap();
    assert!(next
        .items()
        .iter()
        .any(|item| item.base_address() == buffer.base_address()));
    assert!(buffer.current_address() >= settings.min_address);
}
