//! # Deferred Command Tests
//!
//! Structural changes recorded during iteration and applied afterwards, plus
//! building an ECS from a TOML configuration.
//!
//! Run with: cargo test --package oroboros_ecs --test commands_test

use oroboros_ecs::{CommandQueue, Component, Ecs, EcsConfig, EntityHandle};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Health(u32);
impl Component for Health {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Burning(u8);
impl Component for Burning {}

fn build_ecs() -> Ecs {
    Ecs::builder()
        .register::<Health>()
        .register::<Burning>()
        .build()
}

#[test]
fn test_destroy_recorded_during_iteration() {
    let mut ecs = build_ecs();
    let entities: Vec<_> = (0..10u32)
        .map(|i| {
            let e = ecs.create_entity();
            ecs.add_component(e, Health(i % 3));
            e
        })
        .collect();

    let mut commands = CommandQueue::new();
    ecs.for_each_entity(|e: EntityHandle, health: &mut Health| {
        if health.0 == 0 {
            commands.destroy(e);
        }
    });
    assert_eq!(commands.len(), 4);
    assert_eq!(ecs.entity_count(), 10);

    assert_eq!(ecs.apply_commands(&mut commands), 4);
    assert!(commands.is_empty());
    assert_eq!(ecs.entity_count(), 6);
    assert_eq!(ecs.table::<Health>().len(), 6);
    for (i, e) in entities.iter().enumerate() {
        assert_eq!(ecs.is_valid(*e), i % 3 != 0);
    }
    assert!(ecs.check_consistency());
}

#[test]
fn test_add_and_remove_recorded_during_iteration() {
    let mut ecs = build_ecs();
    let hot = ecs.create_entity();
    ecs.add_component(hot, Health(5));
    let cold = ecs.create_entity();
    ecs.add_component(cold, Health(50));
    ecs.add_component(cold, Burning(1));

    let mut commands = CommandQueue::new();
    ecs.for_each_entity(|e: EntityHandle, health: &mut Health| {
        if health.0 < 10 {
            commands.add_component(e, Burning(3));
        } else {
            commands.remove_component::<Burning>(e);
        }
    });
    assert_eq!(ecs.apply_commands(&mut commands), 2);

    assert_eq!(ecs.get_component::<Burning>(hot), Some(&Burning(3)));
    assert!(!ecs.has_component::<Burning>(cold));
    assert!(ecs.check_consistency());
}

#[test]
fn test_commands_for_stale_entities_are_skipped() {
    let mut ecs = build_ecs();
    let e = ecs.create_entity();
    ecs.add_component(e, Health(1));

    let mut commands = CommandQueue::new();
    commands.destroy(e);
    commands.add_component(e, Burning(1));
    commands.remove_component::<Health>(e);
    commands.destroy(e);

    // Only the first destroy runs; the rest target a dead handle.
    assert_eq!(ecs.apply_commands(&mut commands), 1);
    assert!(!ecs.is_valid(e));
    assert!(ecs.table::<Burning>().is_empty());

    // The recycled slot must not receive the queued component.
    let reused = ecs.create_entity();
    assert_eq!(reused.id(), e.id());
    assert!(!ecs.has_component::<Burning>(reused));
}

#[test]
fn test_remove_of_absent_component_is_skipped() {
    let mut ecs = build_ecs();
    let e = ecs.create_entity();

    let mut commands = CommandQueue::new();
    commands.remove_component::<Burning>(e);
    commands.add_component(e, Burning(2));
    ecs.apply_commands(&mut commands);

    assert_eq!(ecs.get_component::<Burning>(e), Some(&Burning(2)));
}

#[test]
fn test_cleared_queue_does_nothing() {
    let mut ecs = build_ecs();
    let e = ecs.create_entity();

    let mut commands = CommandQueue::new();
    commands.destroy(e);
    commands.clear();
    assert_eq!(ecs.apply_commands(&mut commands), 0);
    assert!(ecs.is_valid(e));
}

#[test]
fn test_build_from_toml_config() {
    let config = EcsConfig::from_toml_str(
        r"
        initial_table_capacity = 8
        initial_entity_capacity = 4
        scratch_pool_size = 1
        bucket_capacity = 2
        ",
    )
    .unwrap();

    let mut ecs = Ecs::builder()
        .register::<Health>()
        .with_config(config.clone())
        .build();
    assert_eq!(ecs.config(), &config);

    // Capacities are hints; storage grows past them.
    let entities: Vec<_> = (0..20).map(|_| ecs.create_entity()).collect();
    for (i, &e) in entities.iter().enumerate() {
        ecs.add_component(e, Health(i as u32));
    }
    assert_eq!(ecs.table::<Health>().len(), 20);
    assert!(ecs.check_consistency());
}
