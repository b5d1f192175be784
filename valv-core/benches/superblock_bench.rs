#[macro_use]
extern crate criterion;

use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;

use criterion::Criterion;

use valv_config::ValvConfig;
use valv_core::alloc::superblock::Superblock;
use valv_core::ALIGNMENT;

fn bench_superblock_fast_paths(c: &mut Criterion) {
    let config = ValvConfig::default();
    let object_size = config.memory.superblock.min_object_size;
    let buffer_size = config.memory.superblock.superblock_bytes;

    let mut group = c.benchmark_group("superblock_fast_paths");

    group.bench_function(format!("free_list_cycle_{}", object_size), |b| {
        let layout =
            Layout::from_size_align(Superblock::footprint(buffer_size), ALIGNMENT).unwrap();
        let buf = NonNull::new(unsafe { alloc(layout) }).unwrap();
        let sb_ptr = unsafe { Superblock::initialize(buf, buffer_size, object_size, None) };
        let sb = unsafe { &mut *sb_ptr.as_ptr() };

        // Drain the reap cursor so the cycle measures the free list path,
        // holding one slot so a release never triggers a full reset.
        let slots: Vec<_> = std::iter::from_fn(|| sb.allocate()).collect();
        for slot in slots.iter().skip(1) {
            sb.release(*slot);
        }

        b.iter(|| {
            let ptr = sb.allocate().unwrap();
            sb.release(ptr);
        });

        sb.release(slots[0]);
        unsafe {
            Superblock::destroy(sb_ptr);
            dealloc(buf.as_ptr(), layout);
        }
    });

    group.bench_function(format!("pin_release_unpin_{}", object_size), |b| {
        let small_buffer = object_size * 64;
        let layout =
            Layout::from_size_align(Superblock::footprint(small_buffer), ALIGNMENT).unwrap();
        let buf = NonNull::new(unsafe { alloc(layout) }).unwrap();
        let sb_ptr = unsafe { Superblock::initialize(buf, small_buffer, object_size, None) };
        let sb = unsafe { &mut *sb_ptr.as_ptr() };

        let sentinel = sb.allocate().unwrap();

        b.iter(|| {
            let ptr = sb.allocate().unwrap();
            sb.pin(ptr);
            sb.release(ptr);
            sb.unpin(ptr);
        });

        sb.release(sentinel);
        unsafe {
            Superblock::destroy(sb_ptr);
            dealloc(buf.as_ptr(), layout);
        }
    });

    group.finish();
}

criterion_group!(benches, bench_superblock_fast_paths);
criterion_main!(benches);
