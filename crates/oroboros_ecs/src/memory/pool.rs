//! # Scratch Bitset Pool
//!
//! Free list of pre-allocated, same-width [`BitSet`]s used for query masks
//! and intersection scratch space.

use crate::ecs::BitSet;

/// A pool of reusable bitsets, all `bit_count` bits wide.
///
/// Sets come back zeroed from [`acquire`](Self::acquire). When the free list
/// is empty a fresh set is allocated, so the pool never fails.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. It lives inside the single-threaded
/// [`Ecs`](crate::Ecs).
///
/// # Example
///
/// ```rust,ignore
/// let mut pool = BitSetPool::new(16, 4);
/// let mut mask = pool.acquire();
/// mask.set_bit(3);
/// pool.release(mask);
/// ```
pub struct BitSetPool {
    /// Free list of idle sets.
    free_list: Vec<BitSet>,
    /// Width shared by every pooled set.
    bit_count: u32,
}

impl BitSetPool {
    /// Creates a pool holding `prefill` zeroed sets of `bit_count` bits.
    #[must_use]
    pub fn new(bit_count: u32, prefill: usize) -> Self {
        let free_list = (0..prefill).map(|_| BitSet::new(bit_count)).collect();
        Self { free_list, bit_count }
    }

    /// Width of every pooled set.
    #[inline]
    #[must_use]
    pub const fn bit_count(&self) -> u32 {
        self.bit_count
    }

    /// Number of idle sets ready to hand out.
    #[inline]
    #[must_use]
    pub fn available(&self) -> usize {
        self.free_list.len()
    }

    /// Takes a zeroed set from the pool, allocating one if it is empty.
    pub fn acquire(&mut self) -> BitSet {
        self.free_list
            .pop()
            .unwrap_or_else(|| BitSet::new(self.bit_count))
    }

    /// Returns a set to the pool. It is cleared before the next `acquire`.
    ///
    /// # Panics
    ///
    /// Panics if the set does not have the pool's width.
    pub fn release(&mut self, mut bits: BitSet) {
        assert_eq!(
            bits.bit_count(),
            self.bit_count,
            "released a {}-bit set into a {}-bit pool",
            bits.bit_count(),
            self.bit_count
        );
        bits.clear_all();
        self.free_list.push(bits);
    }
}
