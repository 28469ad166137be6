//! # Entity Handles
//!
//! Entities are referenced through generational handles:
//! - An id indexing the registry slot and every sparse array
//! - A generation counter for detecting stale references
//!
//! A handle is a weak reference. Holding one keeps nothing alive; check it
//! with [`EntityRegistry::is_valid`](super::EntityRegistry::is_valid) before
//! every dereference.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Generational reference to an entity.
///
/// Equality requires both id and generation to match, so a handle to a
/// destroyed entity never compares equal to the handle of the entity that
/// later reuses its slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle {
    id: u32,
    generation: u32,
}

impl EntityHandle {
    /// Reserved "no entity" sentinel. Id 0 is never handed out.
    pub const ZERO: Self = Self { id: 0, generation: 0 };

    /// Creates a handle from its parts.
    #[inline]
    #[must_use]
    pub const fn new(id: u32, generation: u32) -> Self {
        Self { id, generation }
    }

    /// Slot id; also the index into every component table's sparse array.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u32 {
        self.id
    }

    /// Generation of the slot when this handle was issued.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Checks if this is the `ZERO` sentinel.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.id == 0 && self.generation == 0
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.id, self.generation)
    }
}

/// Per-entity flags kept by the registry.
///
/// Only `ECS` / `ECS_ONLY` entities may receive components.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct EntityFlags(u32);

impl EntityFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Entity is updated every frame.
    pub const DYNAMIC: Self = Self(0x1);
    /// Entity participates in the ECS alongside other systems.
    pub const ECS: Self = Self(0x2);
    /// Entity exists only inside the ECS.
    pub const ECS_ONLY: Self = Self(0x4);

    /// Raw bit value.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Checks if every flag in `other` is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Checks if any flag in `other` is set.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Checks if the entity may receive components.
    #[inline]
    #[must_use]
    pub const fn is_ecs(self) -> bool {
        self.intersects(Self(Self::ECS.0 | Self::ECS_ONLY.0))
    }
}

impl BitOr for EntityFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for EntityFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}
