//! # OROBOROS ECS
//!
//! Archetype-aware Entity Component System for the engine's gameplay layer:
//! - Sparse-set tables with O(1) add, lookup and swap-remove
//! - Generational entity handles
//! - Per-entity archetype signatures with incremental bucket bookkeeping
//! - Memoised queries invalidated only when a new archetype appears
//!
//! ## Architecture Rules
//!
//! 1. **Register before build** - the type → bit mapping never changes afterwards
//! 2. **Copy before keying** - a signature stored as a map key is never mutated
//! 3. **No structural changes while iterating** - defer them with a [`CommandQueue`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use oroboros_ecs::{Component, Ecs};
//!
//! #[derive(Default)]
//! struct Position { x: f32, y: f32 }
//! impl Component for Position {}
//!
//! let mut ecs = Ecs::builder().register::<Position>().build();
//! let e = ecs.create_entity();
//! ecs.add_component(e, Position { x: 1.0, y: 2.0 });
//! ecs.for_each(|pos: &mut Position| pos.x += 1.0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;

pub use config::EcsConfig;
pub use ecs::{
    Archetype, ArchetypeId, ArchetypeSummary, BitSet, CommandQueue, Component, ComponentRegistry,
    ComponentTable, Ecs, EcsBuilder, EcsStats, EntityFlags, EntityHandle, EntityRegistry,
    ErasedTable, ForEachCallback, ForEachEntityCallback,
};
pub use error::{EcsError, EcsResult};
pub use memory::BitSetPool;
