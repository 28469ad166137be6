//! # Entity Component System
//!
//! Archetype-aware ECS over sparse-set component tables.
//!
//! ## Design Philosophy
//!
//! - Component types are registered explicitly, once, before the ECS exists
//! - Components are stored in dense arrays for cache efficiency
//! - Entity handles carry a generation counter so stale handles are detected
//! - Every entity is tracked in exactly one archetype bucket
//! - Query results are cached per mask and evicted when a new archetype appears

mod archetype;
mod bitset;
mod commands;
mod component;
mod entity;
mod query;
mod registry;
mod storage;
mod world;

pub use archetype::{Archetype, ArchetypeId, ArchetypeIndex, ArchetypeSummary, EntityLocation};
pub use bitset::{BitSet, Ones};
pub use commands::CommandQueue;
pub use component::{Component, ComponentInfo, ComponentRegistry};
pub use entity::{EntityFlags, EntityHandle};
pub use query::{ForEachCallback, ForEachEntityCallback, QueryCache, QueryContext};
pub use registry::EntityRegistry;
pub use storage::{ComponentTable, ErasedTable};
pub use world::{Ecs, EcsBuilder, EcsStats};
