//! # Entity Registry
//!
//! Issues generational handles, tracks liveness and flags, and owns the
//! per-entity archetype signature. Only the [`Ecs`](super::Ecs) mutates
//! those signatures; everything signature-related that could break the
//! archetype index is crate-private.

use tracing::warn;

use super::bitset::BitSet;
use super::entity::{EntityFlags, EntityHandle};

/// One registry slot.
#[derive(Clone, Debug, Default)]
struct EntitySlot {
    /// Bumped every time the slot is released.
    generation: u32,
    /// Whether the slot currently holds a live entity.
    alive: bool,
    /// Flags given at creation.
    flags: EntityFlags,
    /// Whether the ECS has attached this occupant.
    attached: bool,
    /// Signature buffer. Kept across reuse of the slot; only meaningful while
    /// `attached` is set.
    archetype: Option<BitSet>,
}

/// Generational entity allocator.
///
/// Slot 0 is reserved so that `EntityHandle::ZERO` never names a live entity
/// and so that id 0 can mean "absent" in the component tables.
pub struct EntityRegistry {
    /// All slots, index = entity id.
    slots: Vec<EntitySlot>,
    /// Free list of released ids, reused LIFO.
    free_ids: Vec<u32>,
    /// Number of currently alive entities.
    alive_count: usize,
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl EntityRegistry {
    /// Creates a registry with room for `capacity` entities before growing.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity + 1);
        slots.push(EntitySlot::default());
        Self {
            slots,
            free_ids: Vec::new(),
            alive_count: 0,
        }
    }

    /// Returns the number of currently alive entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Number of slots ever allocated, including reserved slot 0.
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Allocates (or recycles) an id and returns its handle.
    ///
    /// Recycled slots keep the generation bumped at release, so stale
    /// handles to the previous occupant stay invalid.
    pub fn create_handle(&mut self, flags: EntityFlags) -> EntityHandle {
        let id = if let Some(id) = self.free_ids.pop() {
            id
        } else {
            let id = u32::try_from(self.slots.len()).unwrap_or_else(|_| {
                panic!("entity registry exhausted: more than {} entities", u32::MAX)
            });
            self.slots.push(EntitySlot::default());
            id
        };

        let slot = &mut self.slots[id as usize];
        slot.alive = true;
        slot.flags = flags;
        self.alive_count += 1;

        EntityHandle::new(id, slot.generation)
    }

    /// Checks if `handle` names a live entity of the current generation.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, handle: EntityHandle) -> bool {
        if handle.is_zero() {
            return false;
        }
        self.slots
            .get(handle.id() as usize)
            .is_some_and(|slot| slot.alive && slot.generation == handle.generation())
    }

    /// Checks if `handle` is valid and flagged to receive components.
    #[inline]
    #[must_use]
    pub fn is_ecs_managed(&self, handle: EntityHandle) -> bool {
        self.flags(handle).is_some_and(EntityFlags::is_ecs)
    }

    /// Flags of a valid handle.
    #[must_use]
    pub fn flags(&self, handle: EntityHandle) -> Option<EntityFlags> {
        if self.is_valid(handle) {
            Some(self.slots[handle.id() as usize].flags)
        } else {
            None
        }
    }

    /// Rebuilds the current handle for a live id.
    #[must_use]
    pub fn handle_of(&self, id: u32) -> Option<EntityHandle> {
        let slot = self.slots.get(id as usize)?;
        (id != 0 && slot.alive).then(|| EntityHandle::new(id, slot.generation))
    }

    /// Live archetype signature of an entity, if the ECS has attached it.
    #[must_use]
    pub fn archetype(&self, id: u32) -> Option<&BitSet> {
        let slot = self.slots.get(id as usize)?;
        if slot.alive && slot.attached {
            slot.archetype.as_ref()
        } else {
            None
        }
    }

    /// Mutable signature for in-place bit flips by the ECS.
    ///
    /// # Panics
    ///
    /// Panics if the entity was never given a signature.
    pub(crate) fn archetype_mut(&mut self, id: u32) -> &mut BitSet {
        self.slots
            .get_mut(id as usize)
            .filter(|slot| slot.alive && slot.attached)
            .and_then(|slot| slot.archetype.as_mut())
            .unwrap_or_else(|| panic!("entity {id} has no archetype signature"))
    }

    /// Gives an entity a zeroed signature of the right width, reusing the
    /// previous occupant's buffer when the width matches.
    pub(crate) fn allocate_empty_archetype(&mut self, id: u32, component_count: u32) {
        let slot = &mut self.slots[id as usize];
        slot.attached = true;
        match slot.archetype.as_mut() {
            Some(bits) if bits.bit_count() == component_count => bits.clear_all(),
            _ => slot.archetype = Some(BitSet::new(component_count)),
        }
    }

    /// Releases a slot: marks it dead, bumps its generation and queues the id
    /// for reuse. The signature buffer is kept for the next occupant.
    ///
    /// Returns `false` if the handle was already stale.
    pub(crate) fn release(&mut self, handle: EntityHandle) -> bool {
        if !self.is_valid(handle) {
            return false;
        }

        let slot = &mut self.slots[handle.id() as usize];
        slot.alive = false;
        slot.attached = false;
        slot.flags = EntityFlags::NONE;
        slot.generation = slot.generation.wrapping_add(1);
        if let Some(bits) = slot.archetype.as_mut() {
            bits.clear_all();
        }
        self.alive_count -= 1;
        self.free_ids.push(handle.id());

        true
    }

    /// Destroys an entity that is not attached to the ECS.
    ///
    /// ECS-attached entities must go through
    /// [`Ecs::destroy_entity`](super::Ecs::destroy_entity) so their components
    /// and archetype bucket are cleaned up; this refuses them.
    pub fn destroy(&mut self, handle: EntityHandle) -> bool {
        if self.is_valid(handle) && self.is_attached(handle.id()) {
            warn!(entity = %handle, "refusing to destroy an ECS-attached entity through the registry");
            return false;
        }
        self.release(handle)
    }

    /// Whether the ECS has given this live id a signature.
    pub(crate) fn is_attached(&self, id: u32) -> bool {
        self.slots
            .get(id as usize)
            .is_some_and(|slot| slot.alive && slot.attached)
    }
}
