use secs::arena::Arena;
use std::alloc::Layout;

#[test]
fn test_large_alignment() {
    let arena = Arena::new();
    // Alignment above the chunk default (16)
    let layout = Layout::from_size_align(10, 4096).unwrap();

    let ptr1 = arena.allocate(layout);
    assert_eq!(ptr1.as_ptr() as usize % 4096, 0);

    for _ in 0..1000 {
        arena.allocate(Layout::new::<u64>());
    }

    let ptr2 = arena.allocate(layout);
    assert_eq!(ptr2.as_ptr() as usize % 4096, 0);
    assert_ne!(ptr1, ptr2);
}

#[test]
fn test_oversized_pages_get_their_own_chunk() {
    let arena = Arena::new();
    // Larger than a 64KB chunk
    let layout = Layout::from_size_align(65 * 1024, 16).unwrap();

    for _ in 0..64 {
        arena.allocate(layout);
    }
    assert_eq!(arena.live_pages(), 64);
    assert!(arena.reserved_bytes() >= 64 * 65 * 1024);
}

#[test]
fn test_deallocated_pages_are_recycled() {
    let arena = Arena::new();
    let layout = Layout::array::<u64>(256).unwrap();

    let a = arena.allocate(layout);
    let b = arena.allocate(layout);
    assert_eq!(arena.live_pages(), 2);
    let reserved = arena.reserved_bytes();

    unsafe { arena.deallocate(b, layout) };
    assert_eq!(arena.live_pages(), 1);
    assert_eq!(arena.recycled_pages(), 1);

    // Same layout comes back from the recycle list
    let c = arena.allocate(layout);
    assert_eq!(c, b);
    assert_ne!(c, a);
    assert_eq!(arena.recycled_pages(), 0);
    assert_eq!(arena.reserved_bytes(), reserved);
}

#[test]
fn test_recycle_lists_are_per_layout() {
    let arena = Arena::new();
    let small = Layout::array::<u32>(16).unwrap();
    let large = Layout::array::<u32>(64).unwrap();

    let page = arena.allocate(small);
    unsafe { arena.deallocate(page, small) };

    let other = arena.allocate(large);
    assert_ne!(other, page);
    assert_eq!(arena.recycled_pages(), 1);
}
