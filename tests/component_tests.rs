use secs::component::{Component, ComponentSet, DeletionPolicy, is_tag};
use secs::ecs::{Ecs, TypeKey};
use secs_macros::Component;
use std::sync::Once;

fn register_components_once() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        Ecs::register::<Position>();
        Ecs::register::<Velocity>();
        Ecs::register::<Health>();
    });
}

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, Component)]
struct Position {
    x: f32,
    y: f32,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, Component)]
struct Velocity {
    x: f32,
    y: f32,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, Component)]
#[component(in_place)]
struct Health {
    value: i32,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, Component)]
struct Frozen;

#[test]
fn test_component_id() {
    register_components_once();
    let pos_id = Position::id();
    let vel_id = Velocity::id();

    // Different component types should have different keys
    assert_ne!(pos_id, vel_id);
    assert_ne!(pos_id.get(), TypeKey::UNASSIGNED);
    assert_ne!(vel_id.get(), TypeKey::UNASSIGNED);
}

#[test]
fn test_component_id_consistency() {
    register_components_once();
    let id1 = Position::id();
    let id2 = Position::id();
    assert_eq!(id1, id2);
}

#[test]
fn test_register_returns_assigned_key() {
    register_components_once();
    assert_eq!(Ecs::register::<Health>(), Health::id());
    // Registered in order, so keys are ordered the same way
    assert!(Position::id() < Velocity::id());
    assert!(Velocity::id() < Health::id());
}

#[test]
fn test_lazy_key_on_first_use() {
    // Frozen is never registered; its key is bound on first read
    let key = Frozen::id();
    assert_eq!(Frozen::id(), key);
    assert_ne!(key.get(), TypeKey::UNASSIGNED);
}

#[test]
fn test_deletion_policy_attribute() {
    assert_eq!(Position::POLICY, DeletionPolicy::SwapRemove);
    assert_eq!(Health::POLICY, DeletionPolicy::InPlace);
    assert_eq!(DeletionPolicy::default(), DeletionPolicy::SwapRemove);
}

#[test]
fn test_zero_sized_components_are_tags() {
    assert!(is_tag::<Frozen>());
    assert!(!is_tag::<Position>());
}

#[test]
fn test_component_set_keys_follow_tuple_order() {
    register_components_once();
    let keys = <(Velocity, Position, Health)>::keys();
    assert_eq!(keys, [Velocity::id(), Position::id(), Health::id()]);
    assert_eq!(<(Position,)>::keys().as_ref().len(), 1);
}
