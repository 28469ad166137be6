//! # Component Storage
//!
//! Sparse-set storage, one table per component type.
//!
//! - `dense`: component values, packed with no gaps
//! - `sparse`: entity id → dense index (0 = absent)
//! - `entity_by_dense_index`: dense index → entity id
//!
//! Dense index 0 and entity id 0 are reserved sentinels, so
//! `sparse[e] == 0` unambiguously means "no component".
//!
//! ```text
//! sparse:  [0, 2, 0, 1]          entity 1 -> dense 2, entity 3 -> dense 1
//! dense:   [--, C(e3), C(e1)]
//! owner:   [0,  3,     1   ]
//! ```
//!
//! Removal swaps the last dense element into the hole, so any dense index
//! held across a removal is stale. Re-resolve through the entity id.

use std::any::Any;

use super::component::{short_name, Component};
use crate::error::{EcsError, EcsResult};

/// Type-erased view of a [`ComponentTable`], used where the ECS must treat
/// every table uniformly (entity destruction, diagnostics).
pub trait ErasedTable: Any {
    /// Bit of the stored component type.
    fn component_bit(&self) -> u32;
    /// Short type name of the stored component type.
    fn component_name(&self) -> &'static str;
    /// Number of dense slots in use, including reserved slot 0.
    fn count(&self) -> usize;
    /// Checks if `entity_id` has this component.
    fn contains(&self, entity_id: u32) -> bool;
    /// Drops the component of `entity_id`.
    ///
    /// # Panics
    ///
    /// Panics if the entity has no such component.
    fn remove_entity(&mut self, entity_id: u32);
    /// Upcast for downcasting to the concrete table.
    fn as_any(&self) -> &dyn Any;
    /// Mutable upcast for downcasting to the concrete table.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Dense storage for a single component type.
///
/// This storage guarantees:
/// - O(1) add, lookup and remove by entity id
/// - Components packed contiguously in `dense[1..count]`
/// - `entity_by_dense_index[sparse[e]] == e` for every entity that has one
///
/// # Example
///
/// ```rust,ignore
/// let mut table: ComponentTable<Position> = ComponentTable::new(0);
/// table.insert(7, Position { x: 1.0, y: 2.0 });
/// assert!(table.contains(7));
/// ```
pub struct ComponentTable<T: Component> {
    /// Packed component values. Slot 0 is a reserved default.
    dense: Vec<T>,
    /// Entity id → dense index, 0 = absent.
    sparse: Vec<u32>,
    /// Dense index → entity id. Slot 0 is 0.
    entity_by_dense_index: Vec<u32>,
    /// Bit of `T` in archetype signatures.
    component_bit: u32,
}

impl<T: Component> ComponentTable<T> {
    /// Creates an empty table with small default reservations.
    #[must_use]
    pub fn new(component_bit: u32) -> Self {
        Self::with_capacity(component_bit, 0, 0)
    }

    /// Creates an empty table, reserving `dense_capacity` dense slots and
    /// `entity_capacity` sparse entries.
    #[must_use]
    pub fn with_capacity(component_bit: u32, dense_capacity: usize, entity_capacity: usize) -> Self {
        let mut dense = Vec::with_capacity(dense_capacity.max(1));
        dense.push(T::default());
        let mut entity_by_dense_index = Vec::with_capacity(dense_capacity.max(1));
        entity_by_dense_index.push(0);

        Self {
            dense,
            sparse: vec![0; entity_capacity],
            entity_by_dense_index,
            component_bit,
        }
    }

    /// Bit of `T` in archetype signatures.
    #[inline]
    #[must_use]
    pub const fn component_bit(&self) -> u32 {
        self.component_bit
    }

    /// Number of dense slots in use, including reserved slot 0.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.dense.len()
    }

    /// Number of stored components.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.dense.len() - 1
    }

    /// Checks if no component is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks if `entity_id` has a component. Ids past the sparse array are
    /// treated as absent.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity_id: u32) -> bool {
        self.sparse.get(entity_id as usize).is_some_and(|&dense| dense != 0)
    }

    /// Dense index of an entity's component.
    ///
    /// Invalidated by any later removal from this table.
    #[inline]
    #[must_use]
    pub fn dense_index(&self, entity_id: u32) -> Option<u32> {
        self.sparse.get(entity_id as usize).copied().filter(|&dense| dense != 0)
    }

    /// Entity owning a dense slot. Slot 0 and out-of-range slots give `None`.
    #[inline]
    #[must_use]
    pub fn entity_at(&self, dense_index: u32) -> Option<u32> {
        if dense_index == 0 {
            return None;
        }
        self.entity_by_dense_index.get(dense_index as usize).copied()
    }

    /// Stores `value` for `entity_id` and returns it for in-place setup.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateComponent`] if the entity already has a
    /// `T`, and [`EcsError::StaleEntity`] for the reserved id 0. The table is
    /// untouched on error.
    pub fn try_insert(&mut self, entity_id: u32, value: T) -> EcsResult<&mut T> {
        if entity_id == 0 {
            return Err(EcsError::StaleEntity { id: 0, generation: 0 });
        }
        if self.contains(entity_id) {
            return Err(EcsError::DuplicateComponent {
                component: short_name::<T>(),
                entity: entity_id,
            });
        }

        let slot = entity_id as usize;
        if slot >= self.sparse.len() {
            let new_len = (slot + 1).max(self.sparse.len() * 2);
            self.sparse.resize(new_len, 0);
        }

        let dense_index = self.dense.len();
        // `Vec::push` grows the dense arrays geometrically.
        self.dense.push(value);
        self.entity_by_dense_index.push(entity_id);
        self.sparse[slot] = dense_index as u32;

        Ok(&mut self.dense[dense_index])
    }

    /// Stores `value` for `entity_id`; double add is a programming error.
    ///
    /// # Panics
    ///
    /// Panics if the entity already has a `T`, or for entity id 0.
    pub fn insert(&mut self, entity_id: u32, value: T) -> &mut T {
        match self.try_insert(entity_id, value) {
            Ok(component) => component,
            Err(err) => panic!("{err}"),
        }
    }

    /// Component of `entity_id`, or `None` if absent.
    #[inline]
    #[must_use]
    pub fn try_get(&self, entity_id: u32) -> Option<&T> {
        let dense = self.dense_index(entity_id)?;
        self.dense.get(dense as usize)
    }

    /// Mutable component of `entity_id`, or `None` if absent.
    #[inline]
    pub fn try_get_mut(&mut self, entity_id: u32) -> Option<&mut T> {
        let dense = self.dense_index(entity_id)?;
        self.dense.get_mut(dense as usize)
    }

    /// Component of `entity_id`.
    ///
    /// # Panics
    ///
    /// Panics if the entity has no `T`.
    #[inline]
    #[must_use]
    pub fn get(&self, entity_id: u32) -> &T {
        match self.dense_index(entity_id) {
            Some(dense) => &self.dense[dense as usize],
            None => panic!("{}", Self::missing(entity_id)),
        }
    }

    /// Mutable component of `entity_id`.
    ///
    /// # Panics
    ///
    /// Panics if the entity has no `T`.
    #[inline]
    pub fn get_mut(&mut self, entity_id: u32) -> &mut T {
        match self.dense_index(entity_id) {
            Some(dense) => &mut self.dense[dense as usize],
            None => panic!("{}", Self::missing(entity_id)),
        }
    }

    /// Removes and returns the component of `entity_id` by swapping the last
    /// dense element into its slot.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`] if the entity has no `T`.
    pub fn try_remove(&mut self, entity_id: u32) -> EcsResult<T> {
        let Some(dense) = self.dense_index(entity_id) else {
            return Err(Self::missing(entity_id));
        };
        let dense = dense as usize;

        let value = self.dense.swap_remove(dense);
        self.entity_by_dense_index.swap_remove(dense);
        if let Some(&moved) = self.entity_by_dense_index.get(dense) {
            self.sparse[moved as usize] = dense as u32;
        }
        self.sparse[entity_id as usize] = 0;

        Ok(value)
    }

    /// Removes and returns the component of `entity_id`.
    ///
    /// # Panics
    ///
    /// Panics if the entity has no `T`.
    pub fn remove(&mut self, entity_id: u32) -> T {
        match self.try_remove(entity_id) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Iterates `(entity_id, &component)` in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.entity_by_dense_index[1..]
            .iter()
            .copied()
            .zip(self.dense[1..].iter())
    }

    /// Iterates `(entity_id, &mut component)` in dense order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, &mut T)> {
        self.entity_by_dense_index[1..]
            .iter()
            .copied()
            .zip(self.dense[1..].iter_mut())
    }

    /// Owners of the stored components, in dense order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[u32] {
        &self.entity_by_dense_index[1..]
    }

    /// Stored components, in dense order.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.dense[1..]
    }

    fn missing(entity_id: u32) -> EcsError {
        EcsError::MissingComponent {
            component: short_name::<T>(),
            entity: entity_id,
        }
    }
}

impl<T: Component> ErasedTable for ComponentTable<T> {
    fn component_bit(&self) -> u32 {
        self.component_bit
    }

    fn component_name(&self) -> &'static str {
        short_name::<T>()
    }

    fn count(&self) -> usize {
        ComponentTable::count(self)
    }

    fn contains(&self, entity_id: u32) -> bool {
        ComponentTable::contains(self, entity_id)
    }

    fn remove_entity(&mut self, entity_id: u32) {
        let _ = self.remove(entity_id);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
