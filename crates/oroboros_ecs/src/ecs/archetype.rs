//! # Archetype Index
//!
//! Entities are grouped by their exact component set (their signature).
//!
//! ```text
//! signature {}                 -> [e4]
//! signature {Position}         -> [e2, e7]
//! signature {Position, Size}   -> [e1]
//! ```
//!
//! Every attached entity sits in exactly one bucket, the one whose key equals
//! its current signature. Buckets are never deleted; an archetype whose last
//! entity left simply has an empty list.

use std::collections::HashMap;
use std::fmt;

use super::bitset::BitSet;

/// Stable index of an archetype. Ids are handed out in creation order and
/// never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchetypeId(u32);

impl ArchetypeId {
    /// The empty signature, created with the ECS.
    pub const EMPTY: Self = Self(0);

    /// Raw index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One bucket: a signature and the ids of every entity that has exactly it.
pub struct Archetype {
    signature: BitSet,
    entities: Vec<u32>,
}

impl Archetype {
    /// Key of this bucket. Never mutated after creation.
    #[inline]
    #[must_use]
    pub fn signature(&self) -> &BitSet {
        &self.signature
    }

    /// Entity ids in this bucket.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[u32] {
        &self.entities
    }

    /// Number of entities in this bucket.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Checks if no entity has this signature right now.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Where an attached entity currently lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityLocation {
    /// Bucket holding the entity.
    pub archetype: ArchetypeId,
    /// Position inside the bucket's entity list.
    pub row: u32,
}

/// All archetype buckets plus the entity → bucket mapping.
pub struct ArchetypeIndex {
    archetypes: Vec<Archetype>,
    by_signature: HashMap<BitSet, ArchetypeId>,
    /// Indexed by entity id.
    locations: Vec<Option<EntityLocation>>,
    bucket_capacity: usize,
    entity_count: usize,
}

impl ArchetypeIndex {
    /// Creates the index with its empty-signature bucket already in place.
    #[must_use]
    pub fn new(component_count: u32, bucket_capacity: usize, entity_capacity: usize) -> Self {
        let mut index = Self {
            archetypes: Vec::new(),
            by_signature: HashMap::new(),
            locations: Vec::with_capacity(entity_capacity),
            bucket_capacity,
            entity_count: 0,
        };
        let (empty, _) = index.get_or_create(&BitSet::new(component_count));
        debug_assert_eq!(empty, ArchetypeId::EMPTY);
        index
    }

    /// Number of archetypes ever created, including the empty one.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    /// Always false: the empty archetype exists from construction.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    /// Number of entities across all buckets.
    #[inline]
    #[must_use]
    pub const fn entity_count(&self) -> usize {
        self.entity_count
    }

    /// Bucket for an id.
    #[inline]
    #[must_use]
    pub fn get(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id.index())
    }

    /// Entity ids of a bucket; unknown ids give an empty slice.
    #[inline]
    #[must_use]
    pub fn entities(&self, id: ArchetypeId) -> &[u32] {
        match self.get(id) {
            Some(archetype) => archetype.entities(),
            None => &[],
        }
    }

    /// Bucket for an exact signature, if one was ever created.
    #[must_use]
    pub fn find(&self, signature: &BitSet) -> Option<ArchetypeId> {
        self.by_signature.get(signature).copied()
    }

    /// Every bucket with its id, in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (ArchetypeId, &Archetype)> {
        self.archetypes
            .iter()
            .enumerate()
            .map(|(index, archetype)| (ArchetypeId(index as u32), archetype))
    }

    /// Looks up the bucket for `signature`, creating it if needed.
    ///
    /// The stored key is a copy; the caller's live signature can keep
    /// changing. Returns `true` alongside the id when a bucket was created.
    pub fn get_or_create(&mut self, signature: &BitSet) -> (ArchetypeId, bool) {
        if let Some(&id) = self.by_signature.get(signature) {
            return (id, false);
        }

        let id = ArchetypeId(u32::try_from(self.archetypes.len()).unwrap_or_else(|_| {
            panic!("archetype index exhausted")
        }));
        self.archetypes.push(Archetype {
            signature: signature.copy(),
            entities: Vec::with_capacity(self.bucket_capacity),
        });
        self.by_signature.insert(signature.copy(), id);

        (id, true)
    }

    /// Current location of an entity, if it is in a bucket.
    #[inline]
    #[must_use]
    pub fn location(&self, entity_id: u32) -> Option<EntityLocation> {
        self.locations.get(entity_id as usize).copied().flatten()
    }

    /// Appends an entity to a bucket.
    ///
    /// # Panics
    ///
    /// Panics if the entity is already in a bucket or the archetype is unknown.
    pub fn insert(&mut self, entity_id: u32, archetype: ArchetypeId) {
        assert!(
            self.location(entity_id).is_none(),
            "entity {entity_id} is already in archetype bucket"
        );
        let bucket = &mut self.archetypes[archetype.index()].entities;
        let row = bucket.len() as u32;
        bucket.push(entity_id);

        let slot = entity_id as usize;
        if slot >= self.locations.len() {
            self.locations.resize(slot + 1, None);
        }
        self.locations[slot] = Some(EntityLocation { archetype, row });
        self.entity_count += 1;
    }

    /// Takes an entity out of its bucket and returns the bucket it left.
    ///
    /// The bucket keeps insertion order; entities after the removed one
    /// shift down a row.
    pub fn remove(&mut self, entity_id: u32) -> Option<ArchetypeId> {
        let location = self.locations.get_mut(entity_id as usize)?.take()?;
        let bucket = &mut self.archetypes[location.archetype.index()].entities;
        let row = location.row as usize;

        let removed = bucket.remove(row);
        debug_assert_eq!(removed, entity_id);
        for &shifted in &bucket[row..] {
            if let Some(Some(shifted_location)) = self.locations.get_mut(shifted as usize) {
                shifted_location.row -= 1;
            }
        }
        self.entity_count -= 1;

        Some(location.archetype)
    }
}

/// Snapshot of one archetype for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchetypeSummary {
    /// Archetype id.
    pub id: ArchetypeId,
    /// Component names in bit order.
    pub components: Vec<&'static str>,
    /// Entity ids in the bucket.
    pub entities: Vec<u32>,
}

impl fmt::Display for ArchetypeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "archetype {} ", self.id)?;
        if self.components.is_empty() {
            f.write_str("<empty>")?;
        } else {
            f.write_str(&self.components.join(" | "))?;
        }
        write!(f, ": {} entities", self.entities.len())?;
        if !self.entities.is_empty() {
            let ids: Vec<String> = self.entities.iter().map(u32::to_string).collect();
            write!(f, " [{}]", ids.join(", "))?;
        }
        Ok(())
    }
}
