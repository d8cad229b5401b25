use secs::arena::Arena;
use secs::error::Error;
use secs::storage::{PagedStore, SparseIndex};
use std::rc::Rc;

#[test]
fn test_reserve_appends_whole_pages() {
    let arena = Rc::new(Arena::new());
    let mut store = PagedStore::<u64>::new(arena.clone(), 4).unwrap();
    assert_eq!(store.capacity(), 0);

    assert_eq!(store.reserve(5), 2);
    assert_eq!(store.page_count(), 2);
    assert_eq!(store.capacity(), 8);
    assert_eq!(arena.live_pages(), 2);

    // Already covered
    assert_eq!(store.reserve(8), 0);
    assert_eq!(store.page_count(), 2);
}

#[test]
fn test_slot_addresses_survive_growth() {
    let arena = Rc::new(Arena::new());
    let mut store = PagedStore::<u64>::new(arena, 8).unwrap();
    store.reserve(8);

    unsafe { store.write(3, 42) };
    let before = store.slot_ptr(3);

    store.reserve(1000);
    assert_eq!(store.slot_ptr(3), before);
    assert_eq!(unsafe { *store.get(3) }, 42);
}

#[test]
fn test_release_frees_only_trailing_pages() {
    let arena = Rc::new(Arena::new());
    let mut store = PagedStore::<u32>::new(arena.clone(), 4).unwrap();
    store.reserve(16);
    unsafe { store.write(0, 7) };
    let first_page = store.slot_ptr(0);

    assert_eq!(store.release(5), 2);
    assert_eq!(store.page_count(), 2);
    assert_eq!(store.slot_ptr(0), first_page);
    assert_eq!(unsafe { *store.get(0) }, 7);
    assert_eq!(arena.recycled_pages(), 2);

    let reserved = arena.reserved_bytes();
    store.reserve(16);
    assert_eq!(arena.recycled_pages(), 0);
    assert_eq!(arena.reserved_bytes(), reserved);
}

#[test]
fn test_dropping_store_returns_pages() {
    let arena = Rc::new(Arena::new());
    {
        let mut store = PagedStore::<u16>::new(arena.clone(), 32).unwrap();
        store.reserve(100);
        assert_eq!(arena.live_pages(), 4);
    }
    assert_eq!(arena.live_pages(), 0);
    assert_eq!(arena.recycled_pages(), 4);
}

#[test]
fn test_swap_and_relocate() {
    let arena = Rc::new(Arena::new());
    let mut store = PagedStore::<String>::new(arena, 2).unwrap();
    store.reserve(4);
    unsafe {
        store.write(0, "a".to_string());
        store.write(3, "b".to_string());

        // Across a page boundary
        store.swap(0, 3);
        assert_eq!(store.get(0), "b");
        assert_eq!(store.get(3), "a");

        store.relocate(3, 1);
        assert_eq!(store.get(1), "a");

        assert_eq!(store.read(0), "b");
        store.drop_in_place(1);
    }
}

#[test]
fn test_zero_sized_elements_are_rejected() {
    let arena = Rc::new(Arena::new());
    let err = PagedStore::<()>::new(arena, 16).unwrap_err();
    assert!(matches!(err, Error::ZeroSized { .. }));
}

#[test]
fn test_page_length_must_be_power_of_two() {
    let arena = Rc::new(Arena::new());
    assert!(matches!(
        PagedStore::<u32>::new(arena.clone(), 12),
        Err(Error::InvalidPageLength { len: 12, .. })
    ));
    assert!(matches!(
        PagedStore::<u32>::new(arena, 0),
        Err(Error::InvalidPageLength { len: 0, .. })
    ));
}

#[test]
fn test_sparse_index_fills_new_pages_with_absent() {
    let arena = Rc::new(Arena::new());
    let mut sparse = SparseIndex::new(arena, 8).unwrap();
    assert_eq!(sparse.get(0), None);
    assert_eq!(sparse.get(1_000_000), None);

    sparse.set(20, 5);
    assert_eq!(sparse.capacity(), 24);
    assert_eq!(sparse.get(20), Some(5));
    for index in 0..24 {
        if index != 20 {
            assert_eq!(sparse.get(index), None, "index {index}");
        }
    }

    sparse.clear(20);
    assert_eq!(sparse.get(20), None);
    // Clearing beyond capacity is a no-op
    sparse.clear(500);

    assert_eq!(sparse.release(0), 3);
    assert_eq!(sparse.page_count(), 0);
}
