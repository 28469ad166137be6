//! # Memory Management
//!
//! Pre-allocated scratch storage for query construction.
//!
//! Mask bitsets are recycled through a free list instead of being allocated
//! per query, so a steady-state frame does not touch the heap to build them.

mod pool;

pub use pool::BitSetPool;
