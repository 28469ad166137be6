//! # Queries
//!
//! A query mask is a [`BitSet`] of required components. An archetype matches
//! when its signature is a superset of the mask (`signature AND mask == mask`).
//!
//! ## Cache
//!
//! Resolved masks are memoised in [`QueryCache`]. When a structural change
//! creates a new archetype, every cached mask the new signature satisfies is
//! evicted and resolved again on next use. Archetypes are never deleted, so
//! nothing else can make a cached list wrong.
//!
//! ## Iteration
//!
//! [`Ecs::for_each`](crate::Ecs::for_each) accepts closures taking 1 to 6
//! `&mut` components. Each requested table is borrowed mutably at the same
//! time, so asking for the same component twice in one closure panics.

use std::collections::HashMap;

use super::archetype::{ArchetypeId, ArchetypeIndex};
use super::bitset::BitSet;
use super::component::{short_name, Component, ComponentRegistry};
use super::entity::EntityHandle;
use super::registry::EntityRegistry;
use super::storage::{ComponentTable, ErasedTable};

/// Memoised mask → matching archetypes.
#[derive(Default)]
pub struct QueryCache {
    entries: HashMap<BitSet, Vec<ArchetypeId>>,
}

impl QueryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached masks.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if nothing is cached.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached result for a mask, without resolving.
    #[must_use]
    pub fn cached(&self, mask: &BitSet) -> Option<&[ArchetypeId]> {
        self.entries.get(mask).map(Vec::as_slice)
    }

    /// Returns the archetypes matching `mask`, scanning and caching on miss.
    ///
    /// `scratch` receives intermediate AND results and must have the mask's
    /// width.
    pub fn resolve(
        &mut self,
        mask: &BitSet,
        archetypes: &ArchetypeIndex,
        scratch: &mut BitSet,
    ) -> &[ArchetypeId] {
        if self.entries.contains_key(mask) {
            return &self.entries[mask];
        }

        let mut matched = Vec::new();
        for (id, archetype) in archetypes.iter() {
            archetype.signature().and(mask, scratch);
            if *scratch == *mask {
                matched.push(id);
            }
        }
        tracing::trace!(mask = ?mask, matched = matched.len(), "resolved query");

        self.entries.entry(mask.copy()).or_insert(matched).as_slice()
    }

    /// Evicts every cached mask that `signature` satisfies. Call this when an
    /// archetype with that signature has just been created.
    ///
    /// Returns the number of evicted entries.
    pub fn invalidate_matching(&mut self, signature: &BitSet) -> usize {
        let before = self.entries.len();
        self.entries.retain(|mask, _| !signature.is_superset_of(mask));
        let evicted = before - self.entries.len();
        if evicted > 0 {
            tracing::debug!(signature = ?signature, evicted, "evicted cached queries");
        }
        evicted
    }

    /// Drops every cached result.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Borrowed ECS state handed to an iteration callback.
pub struct QueryContext<'w> {
    pub(crate) tables: &'w mut [Box<dyn ErasedTable>],
    pub(crate) archetypes: &'w ArchetypeIndex,
    pub(crate) entities: &'w EntityRegistry,
    pub(crate) components: &'w ComponentRegistry,
    pub(crate) matched: &'w [ArchetypeId],
}

/// Closure usable with [`Ecs::for_each`](crate::Ecs::for_each).
///
/// Implemented for every `FnMut(&mut T0, ..., &mut Tn)` with 1 to 6
/// components. `Args` is the tuple of component types and is inferred from
/// the closure's parameter annotations.
pub trait ForEachCallback<Args> {
    /// Sets the bit of every requested component.
    ///
    /// # Panics
    ///
    /// Panics if a requested component is not registered.
    fn write_mask(components: &ComponentRegistry, mask: &mut BitSet);

    /// Runs the closure over every entity of the matched archetypes.
    fn visit(&mut self, context: QueryContext<'_>);
}

/// Closure usable with [`Ecs::for_each_entity`](crate::Ecs::for_each_entity).
///
/// Same as [`ForEachCallback`] with the entity handle as first argument.
pub trait ForEachEntityCallback<Args> {
    /// Sets the bit of every requested component.
    ///
    /// # Panics
    ///
    /// Panics if a requested component is not registered.
    fn write_mask(components: &ComponentRegistry, mask: &mut BitSet);

    /// Runs the closure over every entity of the matched archetypes.
    fn visit(&mut self, context: QueryContext<'_>);
}

/// Splits out `N` distinct tables for simultaneous mutable access.
///
/// # Panics
///
/// Panics if the same bit appears twice or a bit has no table.
fn disjoint_tables_mut<const N: usize>(
    tables: &mut [Box<dyn ErasedTable>],
    bits: [u32; N],
) -> [&mut Box<dyn ErasedTable>; N] {
    let mut picked: [Option<&mut Box<dyn ErasedTable>>; N] = std::array::from_fn(|_| None);
    for (bit, table) in tables.iter_mut().enumerate() {
        if let Some(slot) = bits.iter().position(|&wanted| wanted as usize == bit) {
            picked[slot] = Some(table);
        }
    }

    let mut index = 0;
    picked.map(|table| {
        let bit = bits[index];
        index += 1;
        match table {
            Some(table) => table,
            None => panic!("component bit {bit} requested twice in one iteration, or has no table"),
        }
    })
}

fn downcast_table_mut<'a, T: Component>(
    table: &'a mut (dyn ErasedTable + 'static),
) -> &'a mut ComponentTable<T> {
    match table.as_any_mut().downcast_mut::<ComponentTable<T>>() {
        Some(table) => table,
        None => panic!("table does not store {}", short_name::<T>()),
    }
}

macro_rules! impl_for_each {
    ($($ty:ident => $table:ident),+) => {
        impl<F, $($ty: Component),+> ForEachCallback<($($ty,)+)> for F
        where
            F: FnMut($(&mut $ty),+),
        {
            fn write_mask(components: &ComponentRegistry, mask: &mut BitSet) {
                $(mask.set_bit(components.expect_bit::<$ty>());)+
            }

            fn visit(&mut self, context: QueryContext<'_>) {
                let QueryContext { tables, archetypes, components, matched, .. } = context;
                let [$($table),+] =
                    disjoint_tables_mut(tables, [$(components.expect_bit::<$ty>()),+]);
                $(let $table = downcast_table_mut::<$ty>(&mut **$table);)+

                for &archetype in matched {
                    for &entity in archetypes.entities(archetype) {
                        (self)($($table.get_mut(entity)),+);
                    }
                }
            }
        }

        impl<F, $($ty: Component),+> ForEachEntityCallback<($($ty,)+)> for F
        where
            F: FnMut(EntityHandle, $(&mut $ty),+),
        {
            fn write_mask(components: &ComponentRegistry, mask: &mut BitSet) {
                $(mask.set_bit(components.expect_bit::<$ty>());)+
            }

            fn visit(&mut self, context: QueryContext<'_>) {
                let QueryContext { tables, archetypes, entities, components, matched } = context;
                let [$($table),+] =
                    disjoint_tables_mut(tables, [$(components.expect_bit::<$ty>()),+]);
                $(let $table = downcast_table_mut::<$ty>(&mut **$table);)+

                for &archetype in matched {
                    for &entity in archetypes.entities(archetype) {
                        let Some(handle) = entities.handle_of(entity) else {
                            continue;
                        };
                        (self)(handle, $($table.get_mut(entity)),+);
                    }
                }
            }
        }
    };
}

impl_for_each!(T0 => t0);
impl_for_each!(T0 => t0, T1 => t1);
impl_for_each!(T0 => t0, T1 => t1, T2 => t2);
impl_for_each!(T0 => t0, T1 => t1, T2 => t2, T3 => t3);
impl_for_each!(T0 => t0, T1 => t1, T2 => t2, T3 => t3, T4 => t4);
impl_for_each!(T0 => t0, T1 => t1, T2 => t2, T3 => t3, T4 => t4, T5 => t5);
