/*!
 * Get Buffer Tests
 * End-to-end requests through the process-wide locator
 */

use nearby_buffers::core::sysinfo::system_info;
use nearby_buffers::{get_buffer, AddressRange, BufferError, BufferSearchSettings, Buffers};
use serial_test::serial;
use std::thread;

#[test]
#[serial]
fn increasing_sizes_stay_in_window_and_never_overlap() {
    let max = system_info().max_address;
    let mut written: Vec<AddressRange> = Vec::new();

    for i in 0..128u32 {
        let size = 4096 + i * 64;
        let settings = BufferSearchSettings {
            min_address: max / 2,
            max_address: max,
            size,
        };

        let mut buffer = get_buffer(&settings).expect("buffer should be available");
        let data = vec![i as u8; size as usize];
        let address = unsafe { buffer.append_bytes(&data) };
        let range = AddressRange::from_start_and_length(address, size as usize);

        assert!(range.start >= settings.min_address);
        assert!(range.end_inclusive <= settings.max_address);
        assert!(
            written.iter().all(|other| !other.overlaps(&range)),
            "{range} overlaps an earlier write"
        );
        written.push(range);
    }
}

#[test]
#[serial]
fn locked_buffers_are_exclusive() {
    let settings = BufferSearchSettings {
        size: 128,
        ..BufferSearchSettings::new()
    };

    let first = get_buffer(&settings).unwrap();
    let second = get_buffer(&settings).unwrap();
    assert_ne!(first.base_address(), second.base_address());
}

#[test]
#[serial]
fn concurrent_writers_get_disjoint_bytes() {
    let handles: Vec<_> = (0..8u8)
        .map(|n| {
            thread::spawn(move || {
                let settings = BufferSearchSettings {
                    size: 256,
                    ..BufferSearchSettings::new()
                };
                (0..16)
                    .map(|_| {
                        let mut buffer = Buffers::new().get_buffer(&settings).unwrap();
                        let address = unsafe { buffer.append_bytes(&[n; 256]) };
                        AddressRange::from_start_and_length(address, 256)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let ranges: Vec<AddressRange> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();

    for (i, a) in ranges.iter().enumerate() {
        for b in &ranges[i + 1..] {
            assert!(!a.overlaps(b), "{a} overlaps {b}");
        }
    }
}

#[test]
#[serial]
fn impossible_request_reports_allocation_failure() {
    let granularity = system_info().allocation_granularity;
    let settings = BufferSearchSettings {
        min_address: granularity * 16,
        max_address: granularity * 16 + 8,
        size: 4096,
    };

    assert!(matches!(
        get_buffer(&settings),
        Err(BufferError::AllocationFailed { .. })
    ));
}
