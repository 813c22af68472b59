/*!
 * Locator Finder Tests
 * Bootstrap outcomes for finders sharing or not sharing a mapping
 */

use nearby_buffers::{Buffers, BufferSearchSettings, FindReason, LocatorFinder};
use pretty_assertions::assert_eq;
use std::sync::Barrier;
use std::thread;

fn finder(dir: &std::path::Path, test: &str) -> LocatorFinder {
    LocatorFinder::new(
        dir,
        format!("nearby-buffers.locator.pid-{}.it-{test}", std::process::id()),
    )
}

#[test]
fn bootstrap_outcomes() {
    let dir = tempfile::tempdir().unwrap();
    let first = finder(dir.path(), "outcomes");
    let second = finder(dir.path(), "outcomes");

    let (created, reason) = first.locate().unwrap();
    assert_eq!(reason, FindReason::Created);

    let (cached, reason) = first.locate().unwrap();
    assert_eq!(reason, FindReason::Cached);
    assert_eq!(cached.this_address(), created.this_address());

    let (attached, reason) = second.locate().unwrap();
    assert_eq!(reason, FindReason::PreviouslyExisted);
    assert_eq!(attached.this_address(), created.this_address());

    let (_, reason) = second.locate().unwrap();
    assert_eq!(reason, FindReason::Cached);

    unsafe { first.reset() };
}

#[test]
fn buffers_shared_between_finders() {
    let dir = tempfile::tempdir().unwrap();
    let module_a = finder(dir.path(), "shared");
    let module_b = finder(dir.path(), "shared");
    let settings = BufferSearchSettings {
        size: 64,
        ..BufferSearchSettings::new()
    };

    let address = {
        let mut buffer = Buffers::with_finder(&module_a).get_buffer(&settings).unwrap();
        unsafe { buffer.append_bytes(&[0xAB; 64]) };
        buffer.base_address()
    };

    // The second module sees the item registered by the first
    let header = module_b.find().unwrap();
    assert!(header
        .items()
        .iter()
        .any(|item| item.base_address() == address && item.position() >= 64));

    unsafe { module_a.reset() };
}

#[test]
fn concurrent_bootstrap_creates_once() {
    const FINDERS: usize = 8;
    let dir = tempfile::tempdir().unwrap();
    let finders: Vec<LocatorFinder> = (0..FINDERS)
        .map(|_| finder(dir.path(), "concurrent"))
        .collect();
    let barrier = Barrier::new(FINDERS);

    let outcomes: Vec<(usize, usize, FindReason)> = thread::scope(|scope| {
        let handles: Vec<_> = finders
            .iter()
            .map(|module| {
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    let (header, reason) = module.locate().unwrap();
                    (header.this_address(), header.item_count(), reason)
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    let creators: Vec<_> = outcomes
        .iter()
        .filter(|(_, _, reason)| *reason == FindReason::Created)
        .collect();
    assert_eq!(creators.len(), 1);

    let (address, item_count, _) = *creators[0];
    for (attached, count, reason) in &outcomes {
        assert_eq!(*attached, address);
        assert_eq!(*count, item_count);
        assert!(matches!(reason, FindReason::Created | FindReason::PreviouslyExisted));
    }

    for module in &finders {
        unsafe { module.reset() };
    }
}
