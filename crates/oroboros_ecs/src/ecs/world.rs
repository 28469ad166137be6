//! # ECS World
//!
//! The [`Ecs`] owns every component table, the entity registry, the archetype
//! index and the query cache. All structural changes go through it so the
//! four stay consistent:
//!
//! 1. The component value lives in its table.
//! 2. The component's bit is set in the entity's signature.
//! 3. The entity sits in the bucket keyed by that signature.
//! 4. No cached query misses an archetype it should match.
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut ecs = Ecs::builder()
//!     .register::<Position>()
//!     .register::<Size>()
//!     .build();
//!
//! let e = ecs.create_entity();
//! ecs.add_component(e, Position { x: 0.0, y: 0.0 });
//! ecs.add_component(e, Size { w: 1.0, h: 1.0 });
//!
//! ecs.for_each(|pos: &mut Position, size: &mut Size| {
//!     pos.x += size.w;
//! });
//! ```

use std::fmt;

use tracing::{debug, trace, warn};

use super::archetype::{ArchetypeId, ArchetypeIndex, ArchetypeSummary};
use super::bitset::BitSet;
use super::commands::CommandQueue;
use super::component::{short_name, Component, ComponentInfo, ComponentRegistry};
use super::entity::{EntityFlags, EntityHandle};
use super::query::{ForEachCallback, ForEachEntityCallback, QueryCache, QueryContext};
use super::registry::EntityRegistry;
use super::storage::{ComponentTable, ErasedTable};
use crate::config::EcsConfig;
use crate::error::{EcsError, EcsResult};
use crate::memory::BitSetPool;

/// Counters for the debug overlay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EcsStats {
    /// Entities attached to the ECS.
    pub entities: usize,
    /// Archetypes ever created, including the empty one.
    pub archetypes: usize,
    /// Masks currently memoised in the query cache.
    pub cached_queries: usize,
    /// Registered component types.
    pub components: u32,
}

impl fmt::Display for EcsStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entities, {} archetypes, {} cached queries, {} components",
            self.entities, self.archetypes, self.cached_queries, self.components
        )
    }
}

/// Collects component registrations before the ECS is built.
///
/// Registration order decides bit assignment. Nothing can be registered
/// after [`build`](Self::build).
#[derive(Default)]
pub struct EcsBuilder {
    components: ComponentRegistry,
    config: EcsConfig,
}

impl EcsBuilder {
    /// Registers a component type. Registering twice keeps the first bit.
    #[must_use]
    pub fn register<T: Component>(mut self) -> Self {
        self.components.register::<T>();
        self
    }

    /// Replaces the default capacities.
    #[must_use]
    pub fn with_config(mut self, config: EcsConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the ECS. The set of component types is fixed from here on.
    #[must_use]
    pub fn build(self) -> Ecs {
        Ecs::new(self.components, self.config)
    }
}

/// Archetype-aware entity component system.
///
/// Single-threaded. Structural changes (`add_component`, `remove_component`,
/// `destroy_entity`) must not happen inside a [`for_each`](Self::for_each)
/// callback; record them in a [`CommandQueue`] instead.
pub struct Ecs {
    entities: EntityRegistry,
    components: ComponentRegistry,
    /// Indexed by component bit.
    tables: Vec<Box<dyn ErasedTable>>,
    archetypes: ArchetypeIndex,
    queries: QueryCache,
    scratch: BitSetPool,
    config: EcsConfig,
}

impl Ecs {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> EcsBuilder {
        EcsBuilder::default()
    }

    /// Creates an ECS over an already filled component registry.
    ///
    /// One table is created per registered type and the empty archetype is
    /// put in place.
    #[must_use]
    pub fn new(components: ComponentRegistry, config: EcsConfig) -> Self {
        let width = components.len();
        let tables: Vec<Box<dyn ErasedTable>> = components
            .iter()
            .map(|info| info.create_table(&config))
            .collect();

        debug!(
            components = width,
            table_capacity = config.initial_table_capacity,
            entity_capacity = config.initial_entity_capacity,
            "built ecs"
        );

        Self {
            entities: EntityRegistry::with_capacity(config.initial_entity_capacity),
            archetypes: ArchetypeIndex::new(
                width,
                config.bucket_capacity,
                config.initial_entity_capacity,
            ),
            queries: QueryCache::new(),
            scratch: BitSetPool::new(width, config.scratch_pool_size),
            tables,
            components,
            config,
        }
    }

    /// Settings this ECS was built with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EcsConfig {
        &self.config
    }

    /// The entity registry.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    /// The entity registry, for creating entities outside the ECS.
    ///
    /// Signature storage stays private to the ECS; entities created here
    /// join it through [`adopt_entity`](Self::adopt_entity).
    #[inline]
    pub fn entities_mut(&mut self) -> &mut EntityRegistry {
        &mut self.entities
    }

    /// The type → bit mapping.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    // ========================================================================
    // ENTITY LIFECYCLE
    // ========================================================================

    /// Creates an ECS-only entity with no components.
    pub fn create_entity(&mut self) -> EntityHandle {
        let handle = self.entities.create_handle(EntityFlags::ECS_ONLY);
        self.attach(handle.id());
        handle
    }

    /// Attaches an entity created directly through the registry, giving it
    /// the empty signature.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] for a dead handle,
    /// [`EcsError::NotEcsManaged`] when the entity lacks the `ECS` or
    /// `ECS_ONLY` flag and [`EcsError::AlreadyAttached`] when it is already
    /// part of the ECS.
    pub fn adopt_entity(&mut self, handle: EntityHandle) -> EcsResult<()> {
        self.check_managed(handle)?;
        if self.entities.is_attached(handle.id()) {
            return Err(EcsError::AlreadyAttached { id: handle.id() });
        }
        self.attach(handle.id());
        Ok(())
    }

    fn attach(&mut self, id: u32) {
        self.entities
            .allocate_empty_archetype(id, self.components.len());
        self.archetypes.insert(id, ArchetypeId::EMPTY);
    }

    /// Destroys an entity and every component it has.
    ///
    /// Returns `false` if the handle was already stale.
    pub fn destroy_entity(&mut self, handle: EntityHandle) -> bool {
        if !self.entities.is_valid(handle) {
            return false;
        }

        let id = handle.id();
        self.drop_components(id);
        self.archetypes.remove(id);
        debug!(entity = %handle, "destroyed entity");

        self.entities.release(handle)
    }

    /// Removes every component from an entity and moves it back to the empty
    /// archetype. The entity stays alive.
    ///
    /// Returns `false` if the handle is stale or not attached.
    pub fn clear_components(&mut self, handle: EntityHandle) -> bool {
        if !self.entities.is_valid(handle) || !self.entities.is_attached(handle.id()) {
            return false;
        }

        let id = handle.id();
        self.drop_components(id);
        self.archetypes.remove(id);
        self.entities.archetype_mut(id).clear_all();
        self.archetypes.insert(id, ArchetypeId::EMPTY);
        true
    }

    /// Removes every component present in the entity's signature from its
    /// table. The signature itself is left untouched.
    fn drop_components(&mut self, id: u32) {
        let Some(signature) = self.entities.archetype(id) else {
            return;
        };
        for bit in signature.ones() {
            let table = &mut self.tables[bit as usize];
            trace!(entity = id, component = table.component_name(), "removing component");
            table.remove_entity(id);
        }
    }

    /// Checks if `handle` names a live entity.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, handle: EntityHandle) -> bool {
        self.entities.is_valid(handle)
    }

    /// Current signature of an entity.
    #[must_use]
    pub fn signature(&self, handle: EntityHandle) -> Option<&BitSet> {
        if self.entities.is_valid(handle) {
            self.entities.archetype(handle.id())
        } else {
            None
        }
    }

    /// Archetype an entity currently belongs to.
    #[must_use]
    pub fn archetype_of(&self, handle: EntityHandle) -> Option<ArchetypeId> {
        if !self.entities.is_valid(handle) {
            return None;
        }
        self.archetypes
            .location(handle.id())
            .map(|location| location.archetype)
    }

    /// Number of entities attached to the ECS.
    #[inline]
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.archetypes.entity_count()
    }

    // ========================================================================
    // COMPONENTS
    // ========================================================================

    fn check_managed(&self, handle: EntityHandle) -> EcsResult<()> {
        if !self.entities.is_valid(handle) {
            return Err(EcsError::StaleEntity {
                id: handle.id(),
                generation: handle.generation(),
            });
        }
        if !self.entities.is_ecs_managed(handle) {
            return Err(EcsError::NotEcsManaged { id: handle.id() });
        }
        Ok(())
    }

    /// Attaches a component and returns it for in-place setup.
    ///
    /// # Panics
    ///
    /// Panics on a stale handle, a non-ECS entity, an unregistered type or a
    /// double add.
    pub fn add_component<T: Component>(&mut self, handle: EntityHandle, value: T) -> &mut T {
        match self.try_add_component(handle, value) {
            Ok(component) => component,
            Err(err) => panic!("{err}"),
        }
    }

    /// Attaches a component and returns it for in-place setup.
    ///
    /// An `ECS`-flagged entity created through the registry and never adopted
    /// is adopted first.
    ///
    /// # Errors
    ///
    /// Fails before any mutation with [`EcsError::UnregisteredComponent`],
    /// [`EcsError::StaleEntity`], [`EcsError::NotEcsManaged`] or
    /// [`EcsError::DuplicateComponent`].
    pub fn try_add_component<T: Component>(
        &mut self,
        handle: EntityHandle,
        value: T,
    ) -> EcsResult<&mut T> {
        let bit = self.components.try_bit_of::<T>()?;
        self.check_managed(handle)?;

        let id = handle.id();
        if self.tables[bit as usize].contains(id) {
            return Err(EcsError::DuplicateComponent {
                component: short_name::<T>(),
                entity: id,
            });
        }
        if !self.entities.is_attached(id) {
            self.attach(id);
        }

        self.archetypes.remove(id);
        self.table_mut::<T>(bit).insert(id, value);
        self.entities.archetype_mut(id).set_bit(bit);
        self.rebucket(id);

        Ok(self.table_mut::<T>(bit).get_mut(id))
    }

    /// Detaches a component and hands it back.
    ///
    /// # Panics
    ///
    /// Panics on a stale handle, an unregistered type or when the entity has
    /// no `T`.
    pub fn remove_component<T: Component>(&mut self, handle: EntityHandle) -> T {
        match self.try_remove_component(handle) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Detaches a component and hands it back.
    ///
    /// # Errors
    ///
    /// Fails before any mutation with [`EcsError::UnregisteredComponent`],
    /// [`EcsError::StaleEntity`] or [`EcsError::MissingComponent`].
    pub fn try_remove_component<T: Component>(&mut self, handle: EntityHandle) -> EcsResult<T> {
        let bit = self.components.try_bit_of::<T>()?;
        if !self.entities.is_valid(handle) {
            return Err(EcsError::StaleEntity {
                id: handle.id(),
                generation: handle.generation(),
            });
        }

        let id = handle.id();
        if !self.tables[bit as usize].contains(id) {
            return Err(EcsError::MissingComponent {
                component: short_name::<T>(),
                entity: id,
            });
        }

        self.archetypes.remove(id);
        let value = self.table_mut::<T>(bit).remove(id);
        self.entities.archetype_mut(id).clear_bit(bit);
        self.rebucket(id);

        Ok(value)
    }

    /// Puts an entity (already out of its old bucket) into the bucket for its
    /// current signature, creating it and evicting stale queries if needed.
    fn rebucket(&mut self, id: u32) {
        let Some(signature) = self.entities.archetype(id) else {
            panic!("entity {id} has no archetype signature");
        };

        let (archetype, created) = self.archetypes.get_or_create(signature);
        if created {
            let evicted = self.queries.invalidate_matching(signature);
            debug!(
                archetype = %archetype,
                components = ?self.component_names(signature),
                evicted,
                "created archetype"
            );
        }
        self.archetypes.insert(id, archetype);
    }

    /// Checks if a live entity has `T`. Stale handles give `false`.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not registered.
    #[must_use]
    pub fn has_component<T: Component>(&self, handle: EntityHandle) -> bool {
        let bit = self.components.expect_bit::<T>();
        self.entities.is_valid(handle) && self.tables[bit as usize].contains(handle.id())
    }

    /// Component of a live entity, if it has one.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not registered.
    #[must_use]
    pub fn get_component<T: Component>(&self, handle: EntityHandle) -> Option<&T> {
        if !self.entities.is_valid(handle) {
            return None;
        }
        self.table::<T>().try_get(handle.id())
    }

    /// Mutable component of a live entity, if it has one.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not registered.
    pub fn get_component_mut<T: Component>(&mut self, handle: EntityHandle) -> Option<&mut T> {
        if !self.entities.is_valid(handle) {
            return None;
        }
        let bit = self.components.expect_bit::<T>();
        self.table_mut::<T>(bit).try_get_mut(handle.id())
    }

    /// Read access to the whole table of `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not registered.
    #[must_use]
    pub fn table<T: Component>(&self) -> &ComponentTable<T> {
        let bit = self.components.expect_bit::<T>();
        match self.tables[bit as usize]
            .as_any()
            .downcast_ref::<ComponentTable<T>>()
        {
            Some(table) => table,
            None => panic!("table for bit {bit} does not store {}", short_name::<T>()),
        }
    }

    fn table_mut<T: Component>(&mut self, bit: u32) -> &mut ComponentTable<T> {
        match self.tables[bit as usize]
            .as_any_mut()
            .downcast_mut::<ComponentTable<T>>()
        {
            Some(table) => table,
            None => panic!("table for bit {bit} does not store {}", short_name::<T>()),
        }
    }

    /// Bit of `T` in signatures and masks.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not registered.
    #[must_use]
    pub fn component_bit<T: Component>(&self) -> u32 {
        self.components.expect_bit::<T>()
    }

    /// Number of registered component types, i.e. the signature width.
    #[inline]
    #[must_use]
    pub fn component_count(&self) -> u32 {
        self.components.len()
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Empty mask of the right width.
    #[must_use]
    pub fn new_mask(&self) -> BitSet {
        BitSet::new(self.components.len())
    }

    /// Mask with the given component bits set.
    ///
    /// # Panics
    ///
    /// Panics if a bit is out of range.
    #[must_use]
    pub fn mask_of(&self, bits: &[u32]) -> BitSet {
        let mut mask = self.new_mask();
        for &bit in bits {
            mask.set_bit(bit);
        }
        mask
    }

    /// Archetypes whose signature contains every bit of `mask`, in creation
    /// order. Memoised until a new matching archetype appears.
    ///
    /// # Panics
    ///
    /// Panics if `mask` does not have [`component_count`](Self::component_count) bits.
    pub fn query(&mut self, mask: &BitSet) -> &[ArchetypeId] {
        let mut scratch = self.scratch.acquire();
        let matched = self.queries.resolve(mask, &self.archetypes, &mut scratch);
        self.scratch.release(scratch);
        matched
    }

    /// Drops every memoised query result.
    pub fn clear_query_cache(&mut self) {
        self.queries.clear();
    }

    /// Signature of an archetype.
    #[must_use]
    pub fn archetype_signature(&self, id: ArchetypeId) -> Option<&BitSet> {
        self.archetypes.get(id).map(|archetype| archetype.signature())
    }

    /// Entity ids currently in an archetype.
    #[must_use]
    pub fn archetype_entities(&self, id: ArchetypeId) -> &[u32] {
        self.archetypes.entities(id)
    }

    /// Number of archetypes ever created.
    #[inline]
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Calls `callback` with every entity that has all requested components.
    ///
    /// Parameter types must be annotated so the component set can be
    /// inferred:
    ///
    /// ```rust,ignore
    /// ecs.for_each(|pos: &mut Position, vel: &mut Velocity| {
    ///     pos.x += vel.x;
    /// });
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if a component is not registered or requested twice.
    pub fn for_each<Args, F>(&mut self, mut callback: F)
    where
        F: ForEachCallback<Args>,
    {
        let mut mask = self.scratch.acquire();
        <F as ForEachCallback<Args>>::write_mask(&self.components, &mut mask);

        let mut scratch = self.scratch.acquire();
        let matched = self.queries.resolve(&mask, &self.archetypes, &mut scratch);
        callback.visit(QueryContext {
            tables: &mut self.tables,
            archetypes: &self.archetypes,
            entities: &self.entities,
            components: &self.components,
            matched,
        });

        self.scratch.release(scratch);
        self.scratch.release(mask);
    }

    /// Like [`for_each`](Self::for_each), with the entity handle passed first.
    ///
    /// # Panics
    ///
    /// Panics if a component is not registered or requested twice.
    pub fn for_each_entity<Args, F>(&mut self, mut callback: F)
    where
        F: ForEachEntityCallback<Args>,
    {
        let mut mask = self.scratch.acquire();
        <F as ForEachEntityCallback<Args>>::write_mask(&self.components, &mut mask);

        let mut scratch = self.scratch.acquire();
        let matched = self.queries.resolve(&mask, &self.archetypes, &mut scratch);
        callback.visit(QueryContext {
            tables: &mut self.tables,
            archetypes: &self.archetypes,
            entities: &self.entities,
            components: &self.components,
            matched,
        });

        self.scratch.release(scratch);
        self.scratch.release(mask);
    }

    /// Applies and drains a command queue recorded during iteration.
    ///
    /// Returns the number of commands that ran.
    pub fn apply_commands(&mut self, commands: &mut CommandQueue) -> usize {
        let total = commands.len();
        let applied = commands.apply(self);
        if applied < total {
            debug!(applied, skipped = total - applied, "applied deferred commands");
        }
        applied
    }

    // ========================================================================
    // DIAGNOSTICS
    // ========================================================================

    /// One summary per archetype, in creation order.
    #[must_use]
    pub fn archetype_summaries(&self) -> Vec<ArchetypeSummary> {
        self.archetypes
            .iter()
            .map(|(id, archetype)| ArchetypeSummary {
                id,
                components: self.component_names(archetype.signature()),
                entities: archetype.entities().to_vec(),
            })
            .collect()
    }

    fn component_names(&self, signature: &BitSet) -> Vec<&'static str> {
        signature
            .ones()
            .filter_map(|bit| self.components.info(bit).map(ComponentInfo::name))
            .collect()
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> EcsStats {
        EcsStats {
            entities: self.archetypes.entity_count(),
            archetypes: self.archetypes.len(),
            cached_queries: self.queries.len(),
            components: self.components.len(),
        }
    }

    /// Logs a warning for every table whose size disagrees with the archetype
    /// index. Returns `true` when everything agrees.
    #[must_use]
    pub fn check_consistency(&self) -> bool {
        let mut consistent = true;
        for table in &self.tables {
            let bit = table.component_bit();
            let expected: usize = self
                .archetypes
                .iter()
                .filter(|(_, archetype)| archetype.signature().test_bit(bit))
                .map(|(_, archetype)| archetype.len())
                .sum();
            let stored = table.count() - 1;
            if stored != expected {
                warn!(
                    component = table.component_name(),
                    stored,
                    expected,
                    "component table out of sync with archetypes"
                );
                consistent = false;
            }
        }
        consistent
    }
}

impl fmt::Debug for Ecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ecs").field("stats", &self.stats()).finish_non_exhaustive()
    }
}
