//! `IndexKey` — a canonical value identifying an unordered set of small
//! integers, used both to key compositions by their component type-set and
//! to key enum-state values within one composition's state-tenant map.
//!
//! Grounded on the teacher's `component::Spec` (`engine/src/ecs/component/spec.rs`):
//! sorting and deduplicating the id vector once at construction makes the
//! derived `Hash`/`Eq` set-equality "for free" — two keys built from the
//! same set, inserted in any order, compare and hash equal. This module
//! generalizes that idea into a standalone key type (the teacher's `Spec` is
//! only ever a component type-set; this crate additionally needs the same
//! set-identity behavior for enum-state namespacing, spec.md §4.4).

use crate::component::ClassId;

/// Canonical, sorted, deduplicated key over small integers.
///
/// Construction normalizes the representation, so `Eq`/`Hash` implement
/// set-equality even though they are derived from sequence comparison —
/// exactly the property spec.md §4.4 calls for ("two buffers compare equal
/// iff their underlying sets are equal").
#[derive(Debug, Clone, Eq)]
pub struct IndexKey {
    entries: Vec<u64>,
    hash: u64,
}

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// A well-known multiplicative hash (FNV-1a) mixed over the sorted entries.
/// Order-sensitive by construction, but since `entries` is always sorted
/// before this runs, equal sets always produce equal hashes.
fn mix(entries: &[u64]) -> u64 {
    let mut h = FNV_OFFSET;
    for &e in entries {
        h ^= e;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

impl IndexKey {
    pub const EMPTY_HASH_SEED: u64 = FNV_OFFSET;

    fn new_sorted(mut entries: Vec<u64>) -> Self {
        entries.sort_unstable();
        entries.dedup();
        entries.shrink_to_fit();
        let hash = mix(&entries);
        Self { entries, hash }
    }

    /// The key of the empty set.
    pub fn empty() -> Self {
        Self::new_sorted(Vec::new())
    }

    /// Build the canonical key for a set of component classes — this is the
    /// composition type-set key.
    pub fn from_classes(ids: &[ClassId]) -> Self {
        Self::new_sorted(ids.iter().map(|c| c.raw() as u64).collect())
    }

    /// Build the key for one enum value, namespaced by its owning type's
    /// class id and its ordinal (spec.md §4.2/§4.4: "combining an enum-type
    /// id with the ordinal"). The pairing is a lossless 64-bit packing, not a
    /// hash, so distinct `(type, ordinal)` pairs never collide with each
    /// other regardless of which half carries the larger value.
    pub fn for_enum_state(type_class: ClassId, ordinal: u32) -> Self {
        let composite = ((type_class.raw() as u64) << 32) | ordinal as u64;
        Self::new_sorted(vec![composite])
    }

    /// Whether this key's set contains the given component class.
    #[inline]
    pub fn contains_class(&self, id: ClassId) -> bool {
        self.entries.binary_search(&(id.raw() as u64)).is_ok()
    }

    /// Whether this key's set is a superset of `other`'s.
    pub fn contains_all(&self, other: &IndexKey) -> bool {
        other.entries.iter().all(|e| self.entries.binary_search(e).is_ok())
    }

    /// The union of this key's set with `other`'s.
    pub fn merge(&self, other: &IndexKey) -> Self {
        let mut entries = Vec::with_capacity(self.entries.len() + other.entries.len());
        entries.extend_from_slice(&self.entries);
        entries.extend_from_slice(&other.entries);
        Self::new_sorted(entries)
    }

    /// The number of distinct integers in the underlying set.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The sorted entries, exposed for iteration (e.g. rebuilding an ordered
    /// class list from a key).
    #[inline]
    pub fn entries(&self) -> &[u64] {
        &self.entries
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl std::hash::Hash for IndexKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_equality_ignores_insertion_order() {
        let a = IndexKey::from_classes(&[ClassId::new(3), ClassId::new(1), ClassId::new(2)]);
        let b = IndexKey::from_classes(&[ClassId::new(1), ClassId::new(2), ClassId::new(3)]);
        assert_eq!(a, b);

        use std::hash::{DefaultHasher, Hash, Hasher};
        let mut ha = DefaultHasher::new();
        a.hash(&mut ha);
        let mut hb = DefaultHasher::new();
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    #[test]
    fn dedupes_repeated_classes() {
        let key = IndexKey::from_classes(&[ClassId::new(1), ClassId::new(1), ClassId::new(2)]);
        assert_eq!(key.len(), 2);
    }

    #[test]
    fn contains_and_contains_all() {
        let full = IndexKey::from_classes(&[ClassId::new(1), ClassId::new(2), ClassId::new(3)]);
        let partial = IndexKey::from_classes(&[ClassId::new(1), ClassId::new(2)]);
        let disjoint = IndexKey::from_classes(&[ClassId::new(1), ClassId::new(4)]);

        assert!(full.contains_class(ClassId::new(2)));
        assert!(!full.contains_class(ClassId::new(4)));
        assert!(full.contains_all(&partial));
        assert!(!full.contains_all(&disjoint));
    }

    #[test]
    fn enum_state_keys_do_not_collide_on_swapped_halves() {
        let a = IndexKey::for_enum_state(ClassId::new(2), 5);
        let b = IndexKey::for_enum_state(ClassId::new(5), 2);
        assert_ne!(a, b);
    }

    #[test]
    fn enum_state_keys_equal_for_same_pair() {
        let a = IndexKey::for_enum_state(ClassId::new(7), 3);
        let b = IndexKey::for_enum_state(ClassId::new(7), 3);
        assert_eq!(a, b);
    }

    #[test]
    fn merge_is_union() {
        let a = IndexKey::from_classes(&[ClassId::new(1), ClassId::new(2)]);
        let b = IndexKey::from_classes(&[ClassId::new(2), ClassId::new(3)]);
        let merged = a.merge(&b);
        assert_eq!(merged, IndexKey::from_classes(&[ClassId::new(1), ClassId::new(2), ClassId::new(3)]));
    }

    #[test]
    fn empty_key_hash_is_stable_seed() {
        let empty = IndexKey::empty();
        assert!(empty.is_empty());
        assert_eq!(empty.hash, IndexKey::EMPTY_HASH_SEED);
    }
}
