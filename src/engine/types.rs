//! Core identifiers, capacities and bit-level type sets.
//!
//! This module defines the **small numeric identifiers** and **bitset
//! signatures** shared by every layer of the store: entity handles, component
//! and tag identifiers, archetype identifiers and the canonical
//! [`ArchetypeKey`] used to intern archetypes.
//!
//! ## Design Philosophy
//!
//! - Every type known to the store is a small dense integer assigned once by
//!   the schema and used as an array index everywhere.
//! - Component and tag sets are fixed-size arrays of `u64` words so that
//!   subset / intersection tests are a handful of word operations.
//! - The archetype signature hash is computed once, when the key is built, and
//!   reused by every map probe.
//!
//! ## Entity Representation
//!
//! Entities are plain dense `u32` handles scoped to one store. `0` is never
//! handed out and can be used by callers as a "no entity" sentinel inside
//! component data.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

/// Dense, reusable entity handle scoped to one store.
pub type EntityId = u32;

/// Identifier of a registered component type.
pub type ComponentId = u16;

/// Identifier of a registered tag type.
pub type TagId = u16;

/// Identifier of an interned archetype. Archetype `0` is the empty archetype.
pub type ArchetypeId = u32;

/// Number of rows held by one full chunk of a column.
pub const CHUNK_SIZE: usize = 512;

/// Maximum number of component types a schema may register.
pub const MAX_COMPONENT_TYPES: usize = 256;

/// Maximum number of tag types a schema may register.
pub const MAX_TAG_TYPES: usize = 256;

/// Maximum number of indexed component types (one bit each in the
/// per-entity owner / linked masks).
pub const MAX_INDEXED_TYPES: usize = 32;

/// Maximum number of component types one query accesses.
pub const MAX_QUERY_COMPONENTS: usize = 5;

/// Number of `u64` words in a [`TypeSet`].
pub const TYPE_SET_WORDS: usize = (MAX_COMPONENT_TYPES + 63) / 64;

const _: [(); 1] = [(); (MAX_TAG_TYPES <= TYPE_SET_WORDS * 64) as usize];
const _: [(); 1] = [(); (MAX_INDEXED_TYPES <= 32) as usize];

/// Fixed-size bitset over component or tag identifiers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TypeSet {
    words: [u64; TYPE_SET_WORDS],
}

/// Set of component types.
pub type ComponentTypes = TypeSet;

/// Set of tag types.
pub type Tags = TypeSet;

impl TypeSet {
    /// The empty set.
    pub const EMPTY: TypeSet = TypeSet { words: [0; TYPE_SET_WORDS] };

    /// Builds a set from a list of identifiers.
    pub fn from_ids(ids: &[u16]) -> Self {
        let mut set = Self::default();
        for &id in ids {
            set.set(id);
        }
        set
    }

    /// Sets the bit for `id`.
    #[inline]
    pub fn set(&mut self, id: u16) {
        let (word, bit) = Self::split(id);
        self.words[word] |= 1u64 << bit;
    }

    /// Clears the bit for `id`.
    #[inline]
    pub fn clear(&mut self, id: u16) {
        let (word, bit) = Self::split(id);
        self.words[word] &= !(1u64 << bit);
    }

    /// Returns `true` if `id` is in the set.
    #[inline]
    pub fn has(&self, id: u16) -> bool {
        let (word, bit) = Self::split(id);
        (self.words[word] >> bit) & 1 == 1
    }

    /// Returns a copy of this set with `id` added.
    #[inline]
    pub fn with(mut self, id: u16) -> Self {
        self.set(id);
        self
    }

    /// Returns a copy of this set with `id` removed.
    #[inline]
    pub fn without(mut self, id: u16) -> Self {
        self.clear(id);
        self
    }

    /// Returns the union of both sets.
    #[inline]
    pub fn union(&self, other: &TypeSet) -> TypeSet {
        let mut out = *self;
        for (a, b) in out.words.iter_mut().zip(other.words.iter()) {
            *a |= *b;
        }
        out
    }

    /// Returns the elements present in both sets.
    #[inline]
    pub fn intersection(&self, other: &TypeSet) -> TypeSet {
        let mut out = *self;
        for (a, b) in out.words.iter_mut().zip(other.words.iter()) {
            *a &= *b;
        }
        out
    }

    /// Returns the elements of `self` that are not in `other`.
    #[inline]
    pub fn difference(&self, other: &TypeSet) -> TypeSet {
        let mut out = *self;
        for (a, b) in out.words.iter_mut().zip(other.words.iter()) {
            *a &= !*b;
        }
        out
    }

    /// Returns `true` if every element of `other` is in `self`.
    #[inline]
    pub fn contains_all(&self, other: &TypeSet) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| (a & b) == *b)
    }

    /// Returns `true` if both sets share at least one element.
    #[inline]
    pub fn intersects(&self, other: &TypeSet) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| (a & b) != 0)
    }

    /// Returns `true` if the set has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Number of elements in the set.
    #[inline]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterates the identifiers in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.words
            .iter()
            .enumerate()
            .flat_map(|(word_index, &word)| {
                let base = word_index * 64;
                let mut bits = word;
                std::iter::from_fn(move || {
                    if bits == 0 {
                        return None;
                    }
                    let tz = bits.trailing_zeros() as usize;
                    bits &= bits - 1;
                    Some((base + tz) as u16)
                })
            })
    }

    #[inline]
    fn split(id: u16) -> (usize, usize) {
        let id = id as usize;
        debug_assert!(id < TYPE_SET_WORDS * 64, "type id {id} out of range");
        (id / 64, id % 64)
    }

    fn hash_words(&self, hasher: &mut FxHasher) {
        for word in &self.words {
            hasher.write_u64(*word);
        }
    }
}

/// Canonical archetype signature: component set, tag set and a precomputed
/// hash of both.
///
/// Two keys are equal exactly when their component and tag sets are equal.
/// [`Hash`] only feeds the cached value, so probing the archetype map never
/// re-hashes the bitsets.
#[derive(Clone, Copy, Debug)]
pub struct ArchetypeKey {
    components: ComponentTypes,
    tags: Tags,
    hash: u64,
}

impl ArchetypeKey {
    /// Builds a key and computes its hash.
    pub fn new(components: ComponentTypes, tags: Tags) -> Self {
        let mut hasher = FxHasher::default();
        components.hash_words(&mut hasher);
        let component_hash = hasher.finish();

        let mut hasher = FxHasher::default();
        tags.hash_words(&mut hasher);
        let tag_hash = hasher.finish();

        let hash = component_hash ^ tag_hash.rotate_left(31).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Self { components, tags, hash }
    }

    /// Key of the empty archetype.
    pub fn empty() -> Self {
        Self::new(TypeSet::EMPTY, TypeSet::EMPTY)
    }

    /// Component set of the key.
    #[inline]
    pub fn components(&self) -> &ComponentTypes {
        &self.components
    }

    /// Tag set of the key.
    #[inline]
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Precomputed signature hash.
    #[inline]
    pub fn signature_hash(&self) -> u64 {
        self.hash
    }

    /// Key with one more component type.
    pub fn with_component(&self, id: ComponentId) -> Self {
        Self::new(self.components.with(id), self.tags)
    }

    /// Key with one component type removed.
    pub fn without_component(&self, id: ComponentId) -> Self {
        Self::new(self.components.without(id), self.tags)
    }

    /// Key with a different tag set.
    pub fn with_tags(&self, tags: Tags) -> Self {
        Self::new(self.components, tags)
    }
}

impl PartialEq for ArchetypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.components == other.components && self.tags == other.tags
    }
}

impl Eq for ArchetypeKey {}

impl Hash for ArchetypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}
