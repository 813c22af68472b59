/*!
 * Buffers Benchmarks
 *
 * Cost of candidate search, a locator hit, and a fresh item allocation
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nearby_buffers::core::sysinfo::system_info;
use nearby_buffers::{get_buffer, possible_buffer_addresses, AddressRange, BufferSearchSettings};

fn bench_candidate_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("candidate_search");
    let window = AddressRange::new(0x1000_0000, 0x7FFF_FFFF);

    for granularity in [4096usize, 65536] {
        group.bench_with_input(
            BenchmarkId::from_parameter(granularity),
            &granularity,
            |b, &granularity| {
                b.iter(|| {
                    possible_buffer_addresses(
                        black_box(window),
                        black_box(AddressRange::new(0x0FFF_0123, 0x2000_0000)),
                        black_box(0x3000),
                        granularity,
                    )
                });
            },
        );
    }

    group.finish();
}

fn bench_locator_hit(c: &mut Criterion) {
    let settings = BufferSearchSettings {
        size: 16,
        ..BufferSearchSettings::new()
    };

    // Warm the chain so every iteration reuses an item
    drop(get_buffer(&settings).unwrap());

    c.bench_function("get_buffer_cached", |b| {
        b.iter(|| {
            let buffer = get_buffer(black_box(&settings)).unwrap();
            black_box(buffer.current_address())
        });
    });
}

fn bench_fresh_item(c: &mut Criterion) {
    let max = system_info().max_address;
    // Larger than any item, so each request allocates
    let settings = BufferSearchSettings {
        min_address: max / 2,
        max_address: max,
        size: (system_info().allocation_granularity * 4) as u32,
    };

    let mut group = c.benchmark_group("fresh_item");
    group.sample_size(10);
    group.bench_function("get_buffer_allocating", |b| {
        b.iter(|| {
            let mut buffer = get_buffer(&settings).unwrap();
            // Consume the item so the next iteration can't reuse it
            let remaining = buffer.bytes_left() as usize;
            unsafe { buffer.append_bytes(&vec![0u8; remaining]) };
        });
    });
    group.finish();
}

criterion_group!(benches, bench_candidate_search, bench_locator_hit, bench_fresh_item);
criterion_main!(benches);
