use proptest::prelude::*;
use secs::component::DeletionPolicy;
use secs::ecs::Ecs;
use secs::entity::Entity;
use secs::ids::IdRegistry;
use secs::pool::Pool;
use secs::registry::Registry;
use secs::sparse_set::SparseSet;
use secs_macros::Component;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Component)]
struct Value(u32);

#[derive(Debug, Clone, Copy, Component)]
struct Tag;

#[derive(Debug, Clone)]
enum Op {
    Add(u32, u32),
    Remove(u32),
    Compact,
}

fn ops() -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        4 => (0u32..64, any::<u32>()).prop_map(|(i, v)| Op::Add(i, v)),
        3 => (0u32..64).prop_map(Op::Remove),
        1 => Just(Op::Compact),
    ];
    prop::collection::vec(op, 0..200)
}

fn policies() -> impl Strategy<Value = DeletionPolicy> {
    prop_oneof![Just(DeletionPolicy::SwapRemove), Just(DeletionPolicy::InPlace)]
}

proptest! {
    #[test]
    fn id_registry_tracks_live_count(steps in prop::collection::vec(any::<bool>(), 1..200)) {
        let mut ids = IdRegistry::new();
        let mut live: Vec<Entity> = Vec::new();
        let mut dead: Vec<Entity> = Vec::new();

        for create in steps {
            if create || live.is_empty() {
                live.push(ids.create());
            } else {
                let id = live.swap_remove(live.len() / 2);
                prop_assert!(ids.destroy(id));
                dead.push(id);
            }
            prop_assert_eq!(ids.len(), ids.slot_count() - ids.free_count());
            prop_assert_eq!(ids.len(), live.len());
        }

        for id in &live {
            prop_assert!(ids.is_valid(*id));
        }
        for id in &dead {
            prop_assert!(!ids.is_valid(*id));
        }
    }

    #[test]
    fn reused_slots_get_newer_versions(cycles in 1usize..50) {
        let mut ids = IdRegistry::new();
        let mut previous = ids.create();
        for _ in 0..cycles {
            ids.destroy(previous);
            let next = ids.create();
            prop_assert_eq!(next.index(), previous.index());
            prop_assert!(next.version() > previous.version());
            previous = next;
        }
    }

    #[test]
    fn pool_matches_model(policy in policies(), ops in ops()) {
        Ecs::register::<Value>();
        let mut pool = Pool::<Value>::with_policy(policy);
        let mut model: HashMap<u32, u32> = HashMap::new();

        for op in ops {
            match op {
                Op::Add(i, v) => {
                    pool.add(Entity::new(i, 0), Value(v));
                    model.insert(i, v);
                }
                Op::Remove(i) => {
                    prop_assert_eq!(pool.remove(Entity::new(i, 0)), model.remove(&i).is_some());
                }
                Op::Compact => {
                    let before: Vec<Entity> = pool.entities().collect();
                    pool.compact();
                    prop_assert_eq!(pool.tombstones(), 0);
                    prop_assert_eq!(pool.entities().collect::<Vec<_>>(), before);
                }
            }
            prop_assert!(pool.verify_invariants());
            prop_assert_eq!(pool.len(), model.len());
        }

        for (i, v) in &model {
            prop_assert_eq!(pool.try_get(Entity::new(*i, 0)), Some(&Value(*v)));
        }
    }

    #[test]
    fn in_place_removal_keeps_survivor_order(ops in ops()) {
        let mut pool = Pool::<Value>::with_policy(DeletionPolicy::InPlace);
        for op in ops {
            let before: Vec<Entity> = pool.entities().collect();
            if let Op::Remove(i) = op {
                let id = Entity::new(i, 0);
                pool.remove(id);
                let expected: Vec<Entity> = before.into_iter().filter(|&e| e != id).collect();
                prop_assert_eq!(pool.entities().collect::<Vec<_>>(), expected);
            } else if let Op::Add(i, v) = op {
                pool.add(Entity::new(i, 0), Value(v));
            }
        }
    }

    #[test]
    fn sparse_set_matches_model(policy in policies(), ops in ops()) {
        let mut set = SparseSet::new(policy);
        let mut model: Vec<u32> = Vec::new();
        for op in ops {
            match op {
                Op::Add(i, _) => {
                    set.insert(Entity::new(i, 0));
                    if !model.contains(&i) {
                        model.push(i);
                    }
                }
                Op::Remove(i) => {
                    let present = model.contains(&i);
                    model.retain(|&m| m != i);
                    prop_assert_eq!(set.remove(Entity::new(i, 0)), present);
                }
                Op::Compact => {
                    set.compact();
                }
            }
            prop_assert!(set.verify_invariants());
            prop_assert_eq!(set.len(), model.len());
        }
    }

    #[test]
    fn registry_pools_only_hold_valid_ids(ops in ops()) {
        Ecs::register::<Value>();
        Ecs::register::<Tag>();
        let mut registry = Registry::new();
        let mut live: Vec<Entity> = Vec::new();

        for op in ops {
            match op {
                Op::Add(_, v) if live.len() < 32 => {
                    let id = registry.create();
                    registry.add(id, Value(v));
                    if v % 2 == 0 {
                        registry.add(id, Tag);
                    }
                    live.push(id);
                }
                Op::Remove(i) if !live.is_empty() => {
                    let id = live.swap_remove(i as usize % live.len());
                    prop_assert!(registry.destroy(id));
                    prop_assert!(!registry.has::<Value>(id));
                }
                _ => {
                    registry.compact_all();
                }
            }
            prop_assert!(registry.verify_invariants());
            prop_assert_eq!(registry.view::<(Value,)>().count(), live.len());
        }
    }
}
