//! # Component-Set Bitsets
//!
//! Fixed-width bit vectors used as archetype signatures and query masks.
//! One bit per registered component type, 64 bits per word.
//!
//! ## Key hazard
//!
//! A `BitSet` that is used as a `HashMap` key must never be mutated while it
//! is stored. Every collaborator that inserts a signature as a key inserts a
//! `clone()`, and the index never hands out `&mut` to a stored key.

use std::fmt;
use std::hash::{Hash, Hasher};

const BITS_PER_WORD: u32 = u64::BITS;

/// Fixed-capacity set of component bits.
///
/// ## Performance
///
/// - Set/clear/test: O(1) - single word operation
/// - AND into a scratch set: O(words), no allocation
/// - Iterate set bits: O(set bits) via `trailing_zeros`
#[derive(Clone)]
pub struct BitSet {
    /// Backing words. Bits at or above `bit_count` are always zero.
    words: Box<[u64]>,
    /// Number of addressable bits.
    bit_count: u32,
}

impl BitSet {
    /// Creates an all-zero set able to hold `bit_count` bits.
    ///
    /// At least one word is always allocated, so a world with zero
    /// registered components still has a valid (empty) signature.
    #[must_use]
    pub fn new(bit_count: u32) -> Self {
        let word_count = (bit_count.div_ceil(BITS_PER_WORD) as usize).max(1);
        Self {
            words: vec![0u64; word_count].into_boxed_slice(),
            bit_count,
        }
    }

    /// Number of addressable bits.
    #[inline]
    #[must_use]
    pub const fn bit_count(&self) -> u32 {
        self.bit_count
    }

    /// Raw backing words, lowest bits first.
    #[inline]
    #[must_use]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    #[inline]
    fn locate(&self, bit: u32) -> (usize, u64) {
        assert!(
            bit < self.bit_count,
            "bit {bit} out of range for a {}-bit set",
            self.bit_count
        );
        ((bit / BITS_PER_WORD) as usize, 1u64 << (bit % BITS_PER_WORD))
    }

    /// Sets `bit`.
    ///
    /// # Panics
    ///
    /// Panics if `bit >= bit_count`.
    #[inline]
    pub fn set_bit(&mut self, bit: u32) {
        let (word, mask) = self.locate(bit);
        self.words[word] |= mask;
    }

    /// Clears `bit`.
    ///
    /// # Panics
    ///
    /// Panics if `bit >= bit_count`.
    #[inline]
    pub fn clear_bit(&mut self, bit: u32) {
        let (word, mask) = self.locate(bit);
        self.words[word] &= !mask;
    }

    /// Flips `bit`.
    ///
    /// # Panics
    ///
    /// Panics if `bit >= bit_count`.
    #[inline]
    pub fn toggle_bit(&mut self, bit: u32) {
        let (word, mask) = self.locate(bit);
        self.words[word] ^= mask;
    }

    /// Returns whether `bit` is set.
    ///
    /// # Panics
    ///
    /// Panics if `bit >= bit_count`.
    #[inline]
    #[must_use]
    pub fn test_bit(&self, bit: u32) -> bool {
        let (word, mask) = self.locate(bit);
        self.words[word] & mask != 0
    }

    /// Clears every bit.
    pub fn clear_all(&mut self) {
        self.words.fill(0);
    }

    /// Sets every addressable bit. Bits past `bit_count` stay zero so that
    /// equality and hashing remain consistent.
    pub fn set_all(&mut self) {
        self.words.fill(u64::MAX);
        let tail = self.bit_count % BITS_PER_WORD;
        let full_words = (self.bit_count / BITS_PER_WORD) as usize;
        if tail != 0 {
            self.words[full_words] = (1u64 << tail) - 1;
        }
        for word in self.words.iter_mut().skip(full_words + usize::from(tail != 0)) {
            *word = 0;
        }
    }

    /// Writes `self AND other` into `out` without allocating.
    ///
    /// # Panics
    ///
    /// Panics if the three sets do not share the same width.
    pub fn and(&self, other: &Self, out: &mut Self) {
        assert!(
            self.bit_count == other.bit_count && self.bit_count == out.bit_count,
            "bitset width mismatch: {} & {} -> {}",
            self.bit_count,
            other.bit_count,
            out.bit_count
        );
        for ((dst, a), b) in out.words.iter_mut().zip(self.words.iter()).zip(other.words.iter()) {
            *dst = a & b;
        }
    }

    /// Returns whether every bit of `mask` is also set in `self`
    /// (`self AND mask == mask`).
    #[must_use]
    pub fn is_superset_of(&self, mask: &Self) -> bool {
        self.bit_count == mask.bit_count
            && self
                .words
                .iter()
                .zip(mask.words.iter())
                .all(|(word, m)| word & m == *m)
    }

    /// Returns whether no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Number of set bits.
    #[must_use]
    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Deep copy. Equivalent to `clone()`; spelled out at the call sites that
    /// insert a signature as a map key.
    #[must_use]
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Iterates over the indices of set bits, lowest first.
    pub fn ones(&self) -> Ones<'_> {
        Ones {
            words: &self.words,
            word_idx: 0,
            current_word: self.words.first().copied().unwrap_or(0),
        }
    }
}

impl PartialEq for BitSet {
    fn eq(&self, other: &Self) -> bool {
        self.bit_count == other.bit_count && self.words == other.words
    }
}

impl Eq for BitSet {}

impl Hash for BitSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Sum of words; collisions are resolved by `Eq`.
        let sum = self.words.iter().fold(0u64, |acc, w| acc.wrapping_add(*w));
        state.write_u64(sum);
    }
}

impl fmt::Debug for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.ones()).finish()
    }
}

/// Iterator over set bit indices of a [`BitSet`].
pub struct Ones<'a> {
    words: &'a [u64],
    word_idx: usize,
    current_word: u64,
}

impl Iterator for Ones<'_> {
    type Item = u32;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let bit = self.current_word.trailing_zeros();
                self.current_word &= self.current_word - 1;
                return Some(self.word_idx as u32 * BITS_PER_WORD + bit);
            }

            self.word_idx += 1;
            if self.word_idx >= self.words.len() {
                return None;
            }
            self.current_word = self.words[self.word_idx];
        }
    }
}
