/*!
 * Native Allocation Tests
 * Real commits in the upper half of this process's address space
 */

use nearby_buffers::core::sysinfo::system_info;
use nearby_buffers::{allocate, AddressRange, BufferAllocator, BufferAllocatorSettings, BufferError};
use std::thread;

fn upper_half(size: u32) -> BufferAllocatorSettings {
    let max = system_info().max_address;
    BufferAllocatorSettings {
        min_address: max / 2,
        max_address: max,
        size,
        ..BufferAllocatorSettings::new()
    }
}

#[test]
fn allocates_inside_window() {
    let settings = upper_half(4096);
    let allocation = allocate(&settings).expect("upper half should have room");

    let granularity = system_info().allocation_granularity;
    assert!(allocation.base_address >= settings.min_address);
    assert!(allocation.range().end_inclusive <= settings.max_address);
    assert_eq!(allocation.base_address % granularity, 0);
    assert_eq!(allocation.size as usize % granularity, 0);

    // Committed memory is writable
    unsafe {
        let ptr = allocation.base_address as *mut u8;
        ptr.write(0xCC);
        assert_eq!(ptr.read(), 0xCC);
    }
}

#[test]
fn unsatisfiable_window_fails() {
    let allocator = BufferAllocator::native().unwrap();
    let granularity = system_info().allocation_granularity;

    // Window smaller than one granule
    let settings = BufferAllocatorSettings {
        min_address: granularity * 16,
        max_address: granularity * 16 + 10,
        size: 4096,
        retry_count: 1,
        brute_force: false,
        ..BufferAllocatorSettings::new()
    };

    match allocator.allocate(&settings) {
        Err(BufferError::AllocationFailed { min_address, .. }) => {
            assert_eq!(min_address, granularity * 16)
        }
        other => panic!("expected allocation failure, got {other:?}"),
    }
}

#[test]
fn concurrent_allocations_never_overlap() {
    let handles: Vec<_> = (0..8)
        .map(|_| thread::spawn(|| allocate(&upper_half(4096)).map(|a| a.range())))
        .collect();

    let ranges: Vec<AddressRange> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().expect("allocation should succeed"))
        .collect();

    for (i, a) in ranges.iter().enumerate() {
        for b in &ranges[i + 1..] {
            assert!(!a.overlaps(b), "{a} overlaps {b}");
        }
    }
}
