//! # ECS Behaviour Tests
//!
//! End-to-end checks of the public `Ecs` API:
//!
//! 1. **Storage**: add/remove round trips and dense packing
//! 2. **Archetypes**: every entity in exactly one bucket matching its signature
//! 3. **Queries**: cached and uncached results agree, new archetypes evict
//! 4. **Handles**: destroyed handles stay invalid after slot reuse
//!
//! Run with: cargo test --package oroboros_ecs --test ecs_test

use std::collections::HashSet;

use oroboros_ecs::{
    ArchetypeId, BitSet, Component, Ecs, EcsConfig, EcsError, EntityFlags, EntityHandle,
};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}
impl Component for Position {}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Size {
    w: f32,
    h: f32,
}
impl Component for Size {}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
}
impl Component for Velocity {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Health(u32);
impl Component for Health {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Team(u8);
impl Component for Team {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Mass(u16);
impl Component for Mass {}

/// Never registered with any ECS built here.
#[derive(Clone, Copy, Debug, Default)]
struct Unregistered;
impl Component for Unregistered {}

fn build_ecs() -> Ecs {
    Ecs::builder()
        .register::<Position>()
        .register::<Size>()
        .register::<Velocity>()
        .register::<Health>()
        .register::<Team>()
        .register::<Mass>()
        .with_config(EcsConfig::minimal())
        .build()
}

/// Tiny deterministic generator so sequences are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        self.0 >> 33
    }
}

/// Every live entity sits in exactly one bucket, and that bucket's key is the
/// entity's signature.
fn assert_partition(ecs: &Ecs, live: &[EntityHandle]) {
    let mut seen = HashSet::new();
    for summary in ecs.archetype_summaries() {
        for &id in &summary.entities {
            assert!(seen.insert(id), "entity {id} appears in two buckets");
        }
    }
    assert_eq!(seen.len(), live.len());

    for &handle in live {
        assert!(seen.contains(&handle.id()));
        let archetype = ecs.archetype_of(handle).unwrap();
        assert_eq!(ecs.archetype_signature(archetype), ecs.signature(handle));
        assert!(ecs.archetype_entities(archetype).contains(&handle.id()));
    }
    assert!(ecs.check_consistency());
}

// ============================================================================
// STORAGE
// ============================================================================

#[test]
fn test_add_remove_round_trip() {
    let mut ecs = build_ecs();
    let entities: Vec<_> = (0..10).map(|_| ecs.create_entity()).collect();

    for (i, &e) in entities.iter().enumerate() {
        let value = Position { x: i as f32, y: -(i as f32) };
        ecs.add_component(e, value);
        ecs.add_component(e, Health(i as u32));
        assert_eq!(ecs.get_component::<Position>(e), Some(&value));
        assert_eq!(ecs.get_component::<Health>(e), Some(&Health(i as u32)));
    }

    for (i, &e) in entities.iter().enumerate() {
        assert_eq!(ecs.remove_component::<Position>(e), Position { x: i as f32, y: -(i as f32) });
        assert!(!ecs.has_component::<Position>(e));
        assert!(ecs.has_component::<Health>(e));
    }
    assert_partition(&ecs, &entities);
}

#[test]
fn test_dense_packing_after_mixed_operations() {
    let mut ecs = build_ecs();
    let entities: Vec<_> = (0..64).map(|_| ecs.create_entity()).collect();
    let mut rng = Lcg(7);

    for round in 0..500u32 {
        let e = entities[(rng.next() % 64) as usize];
        if ecs.has_component::<Velocity>(e) {
            ecs.remove_component::<Velocity>(e);
        } else {
            ecs.add_component(e, Velocity { dx: round as f32, dy: 0.0 });
        }
    }

    let table = ecs.table::<Velocity>();
    for dense in 1..table.count() as u32 {
        let owner = table.entity_at(dense).unwrap();
        assert_eq!(table.dense_index(owner), Some(dense));
    }
    let holders = entities
        .iter()
        .filter(|&&e| ecs.has_component::<Velocity>(e))
        .count();
    assert_eq!(table.len(), holders);
    assert_eq!(table.entities().len(), holders);
    assert_partition(&ecs, &entities);
}

#[test]
fn test_hundred_entities_remove_even() {
    let mut ecs = build_ecs();
    let entities: Vec<_> = (0..100).map(|_| ecs.create_entity()).collect();
    for (i, &e) in entities.iter().enumerate() {
        ecs.add_component(e, Health(i as u32 * 3));
    }
    for &e in entities.iter().step_by(2) {
        ecs.remove_component::<Health>(e);
    }

    let table = ecs.table::<Health>();
    assert_eq!(table.count(), 51);

    let mut remaining: Vec<_> = table.iter().map(|(id, health)| (id, health.0)).collect();
    remaining.sort_unstable();
    let expected: Vec<_> = entities
        .iter()
        .enumerate()
        .skip(1)
        .step_by(2)
        .map(|(i, e)| (e.id(), i as u32 * 3))
        .collect();
    assert_eq!(remaining, expected);
}

// ============================================================================
// ARCHETYPES
// ============================================================================

#[test]
fn test_archetype_partition_invariant() {
    let mut ecs = build_ecs();
    let mut live: Vec<EntityHandle> = Vec::new();
    let mut rng = Lcg(42);

    for _ in 0..400 {
        match rng.next() % 6 {
            0 | 1 => live.push(ecs.create_entity()),
            2 if !live.is_empty() => {
                let e = live.swap_remove((rng.next() as usize) % live.len());
                assert!(ecs.destroy_entity(e));
            }
            3 if !live.is_empty() => {
                let e = live[(rng.next() as usize) % live.len()];
                if ecs.has_component::<Position>(e) {
                    ecs.remove_component::<Position>(e);
                } else {
                    ecs.add_component(e, Position::default());
                }
            }
            4 if !live.is_empty() => {
                let e = live[(rng.next() as usize) % live.len()];
                if ecs.has_component::<Size>(e) {
                    ecs.remove_component::<Size>(e);
                } else {
                    ecs.add_component(e, Size::default());
                }
            }
            5 if !live.is_empty() => {
                let e = live[(rng.next() as usize) % live.len()];
                assert!(ecs.clear_components(e));
                assert_eq!(ecs.archetype_of(e), Some(ArchetypeId::EMPTY));
            }
            _ => {}
        }
        assert_partition(&ecs, &live);
    }
}

#[test]
fn test_empty_archetype_survives() {
    let mut ecs = build_ecs();
    assert_eq!(ecs.archetype_count(), 1);
    let e = ecs.create_entity();
    ecs.add_component(e, Team(1));
    ecs.destroy_entity(e);

    // Buckets are kept even when they empty out.
    assert_eq!(ecs.archetype_count(), 2);
    assert!(ecs.archetype_signature(ArchetypeId::EMPTY).unwrap().is_empty());
    assert!(ecs
        .archetype_summaries()
        .iter()
        .all(|summary| summary.entities.is_empty()));
}

// ============================================================================
// QUERIES
// ============================================================================

fn expected_matches(ecs: &Ecs, mask: &BitSet) -> Vec<ArchetypeId> {
    ecs.archetype_summaries()
        .iter()
        .map(|summary| summary.id)
        .filter(|&id| ecs.archetype_signature(id).unwrap().is_superset_of(mask))
        .collect()
}

#[test]
fn test_query_cached_equals_uncached() {
    let mut ecs = build_ecs();
    let mut rng = Lcg(3);
    for _ in 0..50 {
        let e = ecs.create_entity();
        let pick = rng.next();
        if pick & 1 != 0 {
            ecs.add_component(e, Position::default());
        }
        if pick & 2 != 0 {
            ecs.add_component(e, Size::default());
        }
        if pick & 4 != 0 {
            ecs.add_component(e, Velocity::default());
        }
    }

    for combo in 0u32..8 {
        let bits: Vec<u32> = (0..3).filter(|bit| combo & (1 << bit) != 0).collect();
        let mask = ecs.mask_of(&bits);
        let expected = expected_matches(&ecs, &mask);

        let first = ecs.query(&mask).to_vec();
        let cached = ecs.query(&mask).to_vec();
        ecs.clear_query_cache();
        let fresh = ecs.query(&mask).to_vec();

        assert_eq!(first, expected);
        assert_eq!(cached, expected);
        assert_eq!(fresh, expected);
    }
}

#[test]
fn test_query_cache_invalidated_by_new_archetype() {
    let mut ecs = build_ecs();
    let position = ecs.component_bit::<Position>();
    let mask = ecs.mask_of(&[position]);

    assert!(ecs.query(&mask).is_empty());
    assert_eq!(ecs.stats().cached_queries, 1);

    let e = ecs.create_entity();
    ecs.add_component(e, Position { x: 1.0, y: 1.0 });

    let matched = ecs.query(&mask).to_vec();
    assert_eq!(matched, vec![ecs.archetype_of(e).unwrap()]);
    assert_eq!(ecs.archetype_entities(matched[0]), &[e.id()]);
}

#[test]
fn test_unrelated_archetype_keeps_cache_entry() {
    let mut ecs = build_ecs();
    let e = ecs.create_entity();
    ecs.add_component(e, Position::default());

    let position_mask = ecs.mask_of(&[ecs.component_bit::<Position>()]);
    let before = ecs.query(&position_mask).to_vec();

    // {Team} does not satisfy {Position}, so the entry stays cached.
    let other = ecs.create_entity();
    ecs.add_component(other, Team(2));
    assert_eq!(ecs.stats().cached_queries, 1);
    assert_eq!(ecs.query(&position_mask), before.as_slice());
}

#[test]
fn test_empty_archetypes_stay_in_cached_results() {
    let mut ecs = build_ecs();
    let e = ecs.create_entity();
    ecs.add_component(e, Mass(5));
    let mask = ecs.mask_of(&[ecs.component_bit::<Mass>()]);
    let matched = ecs.query(&mask).to_vec();

    ecs.remove_component::<Mass>(e);
    assert_eq!(ecs.query(&mask), matched.as_slice());
    assert!(ecs.archetype_entities(matched[0]).is_empty());

    let mut visited = 0;
    ecs.for_each(|_: &mut Mass| visited += 1);
    assert_eq!(visited, 0);
}

// ============================================================================
// ITERATION
// ============================================================================

#[test]
fn test_position_size_scenario() {
    let mut ecs = build_ecs();
    let e1 = ecs.create_entity();
    ecs.add_component(e1, Position { x: 0.0, y: 0.0 });
    ecs.add_component(e1, Size { w: 1.0, h: 1.0 });

    let mut visits = Vec::new();
    ecs.for_each_entity(|e: EntityHandle, pos: &mut Position, size: &mut Size| {
        visits.push((e, *pos, *size));
    });
    assert_eq!(
        visits,
        vec![(e1, Position { x: 0.0, y: 0.0 }, Size { w: 1.0, h: 1.0 })]
    );

    ecs.remove_component::<Size>(e1);

    let mut both = 0;
    ecs.for_each(|_: &mut Position, _: &mut Size| both += 1);
    assert_eq!(both, 0);

    let mut positions = 0;
    ecs.for_each(|_: &mut Position| positions += 1);
    assert_eq!(positions, 1);
}

#[test]
fn test_for_each_writes_are_visible() {
    let mut ecs = build_ecs();
    let moving = ecs.create_entity();
    ecs.add_component(moving, Position::default());
    ecs.add_component(moving, Velocity { dx: 2.0, dy: -1.0 });
    let still = ecs.create_entity();
    ecs.add_component(still, Position { x: 5.0, y: 5.0 });

    for _ in 0..3 {
        ecs.for_each(|pos: &mut Position, vel: &mut Velocity| {
            pos.x += vel.dx;
            pos.y += vel.dy;
        });
    }

    assert_eq!(ecs.get_component::<Position>(moving), Some(&Position { x: 6.0, y: -3.0 }));
    assert_eq!(ecs.get_component::<Position>(still), Some(&Position { x: 5.0, y: 5.0 }));
}

#[test]
fn test_for_each_six_components() {
    let mut ecs = build_ecs();
    let full = ecs.create_entity();
    ecs.add_component(full, Position::default());
    ecs.add_component(full, Size::default());
    ecs.add_component(full, Velocity::default());
    ecs.add_component(full, Health(10));
    ecs.add_component(full, Team(1));
    ecs.add_component(full, Mass(3));

    let partial = ecs.create_entity();
    ecs.add_component(partial, Position::default());
    ecs.add_component(partial, Health(10));

    let mut visited = Vec::new();
    ecs.for_each_entity(
        |e: EntityHandle,
         _: &mut Position,
         _: &mut Size,
         _: &mut Velocity,
         health: &mut Health,
         team: &mut Team,
         mass: &mut Mass| {
            health.0 -= u32::from(mass.0);
            team.0 += 1;
            visited.push(e);
        },
    );
    assert_eq!(visited, vec![full]);
    assert_eq!(ecs.get_component::<Health>(full), Some(&Health(7)));
    assert_eq!(ecs.get_component::<Team>(full), Some(&Team(2)));
    assert_eq!(ecs.get_component::<Health>(partial), Some(&Health(10)));
}

#[test]
fn test_for_each_visits_every_archetype_once() {
    let mut ecs = build_ecs();
    let mut expected = HashSet::new();
    for i in 0..30u32 {
        let e = ecs.create_entity();
        ecs.add_component(e, Health(i));
        if i % 3 == 0 {
            ecs.add_component(e, Team(0));
        }
        if i % 5 == 0 {
            ecs.add_component(e, Mass(0));
        }
        expected.insert(e);
    }

    let mut seen = HashSet::new();
    ecs.for_each_entity(|e: EntityHandle, _: &mut Health| {
        assert!(seen.insert(e));
    });
    assert_eq!(seen, expected);
}

#[test]
fn test_bucket_order_survives_archetype_move() {
    let mut ecs = build_ecs();
    let entities: Vec<_> = (0..3)
        .map(|_| {
            let e = ecs.create_entity();
            ecs.add_component(e, Position::default());
            e
        })
        .collect();
    ecs.add_component(entities[0], Size::default());

    let mut visited = Vec::new();
    ecs.for_each_entity(|e: EntityHandle, _: &mut Position| visited.push(e));
    assert_eq!(visited, vec![entities[1], entities[2], entities[0]]);

    // Moving back appends to the end of the original bucket.
    ecs.remove_component::<Size>(entities[0]);
    ecs.add_component(entities[1], Size::default());
    ecs.remove_component::<Size>(entities[1]);
    visited.clear();
    ecs.for_each_entity(|e: EntityHandle, _: &mut Position| visited.push(e));
    assert_eq!(visited, vec![entities[2], entities[0], entities[1]]);
    assert!(ecs.check_consistency());
}

// ============================================================================
// HANDLES
// ============================================================================

#[test]
fn test_destroyed_handle_stays_invalid() {
    let mut ecs = build_ecs();
    let old = ecs.create_entity();
    ecs.add_component(old, Health(1));
    assert!(ecs.destroy_entity(old));
    assert!(!ecs.is_valid(old));

    let new = ecs.create_entity();
    assert_eq!(new.id(), old.id());
    assert_ne!(new.generation(), old.generation());
    assert_ne!(new, old);

    assert!(!ecs.has_component::<Health>(old));
    assert!(!ecs.has_component::<Health>(new));
    assert_eq!(ecs.get_component::<Health>(old), None);
    assert_eq!(ecs.archetype_of(old), None);
    assert!(!ecs.is_valid(EntityHandle::ZERO));
}

#[test]
fn test_stale_handle_errors() {
    let mut ecs = build_ecs();
    let e = ecs.create_entity();
    ecs.destroy_entity(e);

    assert_eq!(
        ecs.try_add_component(e, Health(1)).map(|h| *h),
        Err(EcsError::StaleEntity { id: e.id(), generation: e.generation() })
    );
    assert_eq!(
        ecs.try_remove_component::<Health>(e),
        Err(EcsError::StaleEntity { id: e.id(), generation: e.generation() })
    );
    assert!(!ecs.clear_components(e));
}

#[test]
fn test_adopt_registry_entity() {
    let mut ecs = build_ecs();
    let baked = ecs.entities_mut().create_handle(EntityFlags::ECS | EntityFlags::DYNAMIC);
    assert_eq!(ecs.archetype_of(baked), None);

    ecs.adopt_entity(baked).unwrap();
    assert_eq!(ecs.archetype_of(baked), Some(ArchetypeId::EMPTY));
    assert_eq!(ecs.adopt_entity(baked), Err(EcsError::AlreadyAttached { id: baked.id() }));

    ecs.add_component(baked, Size { w: 2.0, h: 2.0 });
    assert!(ecs.has_component::<Size>(baked));

    // Attached entities can only be destroyed through the ECS.
    assert!(!ecs.entities_mut().destroy(baked));
    assert!(ecs.destroy_entity(baked));
}

#[test]
fn test_non_ecs_entity_is_refused() {
    let mut ecs = build_ecs();
    let plain = ecs.entities_mut().create_handle(EntityFlags::DYNAMIC);

    assert_eq!(ecs.adopt_entity(plain), Err(EcsError::NotEcsManaged { id: plain.id() }));
    assert_eq!(
        ecs.try_add_component(plain, Team(0)).map(|t| *t),
        Err(EcsError::NotEcsManaged { id: plain.id() })
    );
    assert!(ecs.entities_mut().destroy(plain));
}

#[test]
fn test_flagged_entity_adopted_on_first_add() {
    let mut ecs = build_ecs();
    let e = ecs.entities_mut().create_handle(EntityFlags::ECS_ONLY);
    ecs.add_component(e, Team(4));
    assert_eq!(ecs.signature(e), Some(&ecs.mask_of(&[ecs.component_bit::<Team>()])));
    assert_eq!(ecs.entity_count(), 1);
}

// ============================================================================
// FATAL MISUSE
// ============================================================================

#[test]
#[should_panic(expected = "component Position already attached")]
fn test_double_add_panics() {
    let mut ecs = build_ecs();
    let e = ecs.create_entity();
    ecs.add_component(e, Position::default());
    ecs.add_component(e, Position::default());
}

#[test]
#[should_panic(expected = "component Size is not attached")]
fn test_remove_missing_panics() {
    let mut ecs = build_ecs();
    let e = ecs.create_entity();
    ecs.remove_component::<Size>(e);
}

#[test]
#[should_panic(expected = "component Unregistered is not registered")]
fn test_for_each_unregistered_panics() {
    let mut ecs = build_ecs();
    ecs.for_each(|_: &mut Unregistered| {});
}

#[test]
#[should_panic(expected = "requested twice")]
fn test_for_each_same_component_twice_panics() {
    let mut ecs = build_ecs();
    let e = ecs.create_entity();
    ecs.add_component(e, Health(1));
    ecs.for_each(|_: &mut Health, _: &mut Health| {});
}

#[test]
#[should_panic(expected = "is not ECS managed")]
fn test_add_to_plain_entity_panics() {
    let mut ecs = build_ecs();
    let plain = ecs.entities_mut().create_handle(EntityFlags::NONE);
    ecs.add_component(plain, Health(1));
}

#[test]
fn test_unregistered_try_add_is_recoverable() {
    let mut ecs = build_ecs();
    let e = ecs.create_entity();
    assert_eq!(
        ecs.try_add_component(e, Unregistered).map(|_| ()),
        Err(EcsError::UnregisteredComponent { component: "Unregistered" })
    );
    assert_eq!(ecs.archetype_of(e), Some(ArchetypeId::EMPTY));
}
