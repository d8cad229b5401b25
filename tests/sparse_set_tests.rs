use secs::component::DeletionPolicy;
use secs::entity::Entity;
use secs::sparse_set::SparseSet;

fn e(index: u32) -> Entity {
    Entity::new(index, 0)
}

#[test]
fn test_insert_and_lookup() {
    let mut set = SparseSet::default();
    assert_eq!(set.insert(e(5)), 0);
    assert_eq!(set.insert(e(2)), 1);
    // Already present: same slot
    assert_eq!(set.insert(e(5)), 0);

    assert_eq!(set.len(), 2);
    assert!(set.contains(e(2)));
    assert!(!set.contains(Entity::new(2, 1)));
    assert_eq!(set.index_of(e(2)), Some(1));
    assert!(set.verify_invariants());
}

#[test]
fn test_swap_remove() {
    let mut set = SparseSet::new(DeletionPolicy::SwapRemove);
    for i in 0..4 {
        set.insert(e(i));
    }
    assert!(set.remove(e(0)));
    assert!(!set.remove(e(0)));
    assert_eq!(set.packed(), &[e(3), e(1), e(2)]);
    assert!(set.verify_invariants());
}

#[test]
fn test_in_place_free_list_lives_in_packed() {
    let mut set = SparseSet::new(DeletionPolicy::InPlace);
    for i in 0..4 {
        set.insert(e(i));
    }
    set.remove(e(0));
    set.remove(e(2));

    assert_eq!(set.len(), 2);
    assert_eq!(set.dense_len(), 4);
    // The hole at slot 2 links to the hole at slot 0
    assert!(set.packed()[2].is_none());
    assert_eq!(set.packed()[2].index(), 0);
    assert!(set.verify_invariants());

    assert_eq!(set.insert(e(10)), 2);
    assert_eq!(set.insert(e(11)), 0);
    assert_eq!(set.insert(e(12)), 4);
    assert!(set.verify_invariants());
}

#[test]
fn test_compact_keeps_order() {
    let mut set = SparseSet::new(DeletionPolicy::InPlace);
    for i in 0..6 {
        set.insert(e(i));
    }
    set.remove(e(1));
    set.remove(e(4));

    assert_eq!(set.compact(), 2);
    assert_eq!(set.packed(), &[e(0), e(2), e(3), e(5)]);
    assert_eq!(set.compact(), 0);
    assert!(set.verify_invariants());
}

#[test]
fn test_sort_by() {
    let mut set = SparseSet::new(DeletionPolicy::InPlace);
    for i in [4, 1, 3, 0, 2] {
        set.insert(e(i));
    }
    set.remove(e(3));
    set.sort_by(|a, b| a.index().cmp(&b.index()));
    assert_eq!(set.iter().collect::<Vec<_>>(), vec![e(0), e(1), e(2), e(4)]);
    assert!(set.verify_invariants());
}

#[test]
fn test_respect_other_order() {
    let mut set = SparseSet::default();
    for i in [0, 1, 2, 3, 4] {
        set.insert(e(i));
    }
    let mut other = SparseSet::default();
    for i in [3, 9, 1, 4] {
        other.insert(e(i));
    }

    set.respect(&other);
    let order: Vec<_> = set.iter().collect();
    assert_eq!(&order[..3], &[e(3), e(1), e(4)]);
    let mut rest = order[3..].to_vec();
    rest.sort();
    assert_eq!(rest, vec![e(0), e(2)]);
    assert!(set.verify_invariants());
}

#[test]
fn test_swap_and_clear() {
    let mut set = SparseSet::default();
    set.insert(e(0));
    set.insert(e(1));
    set.swap(e(0), e(1));
    assert_eq!(set.packed(), &[e(1), e(0)]);

    set.clear();
    assert!(set.is_empty());
    assert!(!set.contains(e(0)));
    set.insert(e(1));
    assert_eq!(set.index_of(e(1)), Some(0));
}

#[test]
#[should_panic(expected = "not both in the set")]
fn test_swap_absent_panics() {
    let mut set = SparseSet::default();
    set.insert(e(0));
    set.swap(e(0), e(7));
}
