//! `ClassIndex` — bidirectional mapping from Rust type identity to a dense
//! `ClassId` in `[0, K)`.
//!
//! Grounded on `engine/src/ecs/component/registry.rs`'s `Registry`: a
//! `DashMap<TypeId, Id>` gives a lock-free fast-path read, and registration
//! races are resolved with `DashMap::entry().or_insert_with()` so the id
//! generator and metadata vector are only ever touched once per type. This
//! crate adds the capacity ceiling `K` (spec.md §4.2) and the enum-state key
//! derivation, neither of which the teacher's registry needed.

use std::any::TypeId;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;

use crate::component::{ClassId, ClassInfo, Component};
use crate::error::{EcsError, Result};
use crate::key::IndexKey;

/// Recommended ceiling on distinct registered types (spec.md §4.2: "K ≤ 1024
/// recommended").
pub const DEFAULT_CAPACITY: u32 = 1024;

/// Thread-safe, at-most-once registration of component types to dense ids.
pub struct ClassIndex {
    type_map: DashMap<TypeId, ClassId>,
    classes: RwLock<Vec<Option<ClassInfo>>>,
    next_id: AtomicU32,
    capacity: u32,
}

impl Default for ClassIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassIndex {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            type_map: DashMap::new(),
            classes: RwLock::new(Vec::new()),
            next_id: AtomicU32::new(0),
            capacity,
        }
    }

    /// `getIndex(T)`: return `T`'s class id, registering it if this is the
    /// first time `T` has been seen. Fails with [`EcsError::CapacityExceeded`]
    /// once more than `capacity` distinct types have been registered.
    pub fn get_index<C: Component>(&self) -> Result<ClassId> {
        let type_id = TypeId::of::<C>();

        if let Some(id) = self.type_map.get(&type_id) {
            return Ok(*id);
        }

        // A vacant entry is only ever filled on the success path below, so a
        // type that hit the capacity ceiling is never cached as registered —
        // every later call for it keeps failing instead of resolving to a
        // `ClassId` with no installed `ClassInfo`.
        match self.type_map.entry(type_id) {
            Entry::Occupied(e) => Ok(*e.get()),
            Entry::Vacant(e) => {
                let id_value = self.next_id.fetch_add(1, Ordering::Relaxed);
                if id_value >= self.capacity {
                    return Err(EcsError::CapacityExceeded);
                }
                let id = ClassId::new(id_value);
                let mut classes = self.classes.write();
                let idx = id.index();
                if idx >= classes.len() {
                    classes.resize(idx + 1, None);
                }
                classes[idx] = Some(ClassInfo::new::<C>(id));
                drop(classes);
                e.insert(id);
                Ok(id)
            }
        }
    }

    /// Existing class id for `T`, without registering it.
    #[inline]
    pub fn get<C: Component>(&self) -> Option<ClassId> {
        self.type_map.get(&TypeId::of::<C>()).map(|e| *e.value())
    }

    /// Metadata (layout, drop fn) for a registered class id.
    #[inline]
    pub fn info(&self, id: ClassId) -> Option<ClassInfo> {
        self.classes.read().get(id.index()).and_then(|i| *i)
    }

    /// `indexKeyOf(types…)`: canonical set key for a list of already-known
    /// class ids.
    #[inline]
    pub fn index_key_of(&self, ids: &[ClassId]) -> IndexKey {
        IndexKey::from_classes(ids)
    }

    /// Stable `(type-id, ordinal)` key for one enum value, used to key a
    /// composition's state-tenant map (spec.md §4.3 "State tenants").
    #[inline]
    pub fn enum_state_key<E: Component>(&self, ordinal: u32) -> Result<IndexKey> {
        let type_class = self.get_index::<E>()?;
        Ok(IndexKey::for_enum_state(type_class, ordinal))
    }

    pub fn len(&self) -> usize {
        self.next_id.load(Ordering::Relaxed) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    struct Position;
    impl Component for Position {}
    struct Velocity;
    impl Component for Velocity {}
    struct Health;
    impl Component for Health {}

    #[test]
    fn registers_once_and_is_idempotent() {
        let index = ClassIndex::new();
        let a = index.get_index::<Position>().unwrap();
        let b = index.get_index::<Position>().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_types_get_different_ids() {
        let index = ClassIndex::new();
        let pos = index.get_index::<Position>().unwrap();
        let vel = index.get_index::<Velocity>().unwrap();
        assert_ne!(pos, vel);
    }

    #[test]
    fn get_without_registering_returns_none() {
        let index = ClassIndex::new();
        assert!(index.get::<Position>().is_none());
        index.get_index::<Position>().unwrap();
        assert!(index.get::<Position>().is_some());
    }

    #[test]
    fn capacity_exceeded_is_reported() {
        let index = ClassIndex::with_capacity(2);
        index.get_index::<Position>().unwrap();
        index.get_index::<Velocity>().unwrap();
        assert_eq!(index.get_index::<Health>(), Err(EcsError::CapacityExceeded));
    }

    #[test]
    fn a_type_that_hit_the_ceiling_keeps_failing_instead_of_caching_a_bad_id() {
        let index = ClassIndex::with_capacity(2);
        index.get_index::<Position>().unwrap();
        index.get_index::<Velocity>().unwrap();
        assert_eq!(index.get_index::<Health>(), Err(EcsError::CapacityExceeded));
        assert_eq!(index.get_index::<Health>(), Err(EcsError::CapacityExceeded));
        assert!(index.get::<Health>().is_none());
    }

    #[test]
    fn enum_state_keys_are_stable_and_distinct() {
        let index = ClassIndex::new();
        let a1 = index.enum_state_key::<Position>(0).unwrap();
        let a1_again = index.enum_state_key::<Position>(0).unwrap();
        let a2 = index.enum_state_key::<Position>(1).unwrap();
        assert_eq!(a1, a1_again);
        assert_ne!(a1, a2);
    }

    #[test]
    fn concurrent_registration_agrees_on_one_id_per_type() {
        let index = Arc::new(ClassIndex::new());
        let handles: Vec<_> = (0..12)
            .map(|i| {
                let index = Arc::clone(&index);
                thread::spawn(move || match i % 3 {
                    0 => index.get_index::<Position>().unwrap(),
                    1 => index.get_index::<Velocity>().unwrap(),
                    _ => index.get_index::<Health>().unwrap(),
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let pos: Vec<_> = results.iter().step_by(3).collect();
        let vel: Vec<_> = results.iter().skip(1).step_by(3).collect();
        let health: Vec<_> = results.iter().skip(2).step_by(3).collect();
        assert!(pos.iter().all(|&&id| id == *pos[0]));
        assert!(vel.iter().all(|&&id| id == *vel[0]));
        assert!(health.iter().all(|&&id| id == *health[0]));
        assert_ne!(pos[0], vel[0]);
        assert_ne!(pos[0], health[0]);
    }
}
