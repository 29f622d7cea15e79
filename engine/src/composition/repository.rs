//! `CompositionRepository` — the `IndexKey -> DataComposition` table, plus
//! the superset lookup a multi-component query needs (spec.md §4.6).
//!
//! Grounded on `engine/src/ecs/archetype/registry.rs` (`Registry::table_ids_for`
//! — on-demand filter over `archetype.supports(spec)`, no precomputed
//! adjacency beyond the dashmap itself) and `engine/src/ecs/storage/mod.rs`
//! (`Storage::supporting`).

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::class_index::ClassIndex;
use crate::component::ClassId;
use crate::composition::DataComposition;
use crate::entity::EntityHandle;
use crate::error::{EcsError, Result};
use crate::key::IndexKey;
use crate::pool::ChunkedPool;

pub(crate) struct CompositionRepository {
    compositions: DashMap<IndexKey, Arc<DataComposition>>,
}

impl Default for CompositionRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositionRepository {
    pub(crate) fn new() -> Self {
        Self { compositions: DashMap::new() }
    }

    /// `getOrCreate`: the composition for exactly this (deduplicated, order-
    /// independent) set of component classes.
    pub(crate) fn get_or_create(
        &self,
        classes: &[ClassId],
        class_index: &ClassIndex,
        pool: &ChunkedPool<EntityHandle>,
    ) -> Result<Arc<DataComposition>> {
        let key = IndexKey::from_classes(classes);
        // `entry()` holds the shard lock for `key` across the whole match, so
        // two racing callers on a never-seen key don't both build a
        // `DataComposition` (each burning a tenant/chunk-id) before one wins.
        match self.compositions.entry(key.clone()) {
            Entry::Occupied(e) => Ok(Arc::clone(e.get())),
            Entry::Vacant(e) => {
                let mut sorted: Vec<ClassId> = classes.to_vec();
                sorted.sort_unstable_by_key(ClassId::raw);
                sorted.dedup();
                let infos = sorted
                    .iter()
                    .map(|c| class_index.info(*c).ok_or(EcsError::UnknownClass))
                    .collect::<Result<Vec<_>>>()?;

                let composition = Arc::new(DataComposition::new(key, sorted, pool, infos)?);
                Ok(Arc::clone(e.insert(composition)))
            }
        }
    }

    pub(crate) fn get(&self, key: &IndexKey) -> Option<Arc<DataComposition>> {
        self.compositions.get(key).map(|e| Arc::clone(e.value()))
    }

    /// Every composition whose type-set is a superset of `query_key`.
    pub(crate) fn matching(&self, query_key: &IndexKey) -> Vec<Arc<DataComposition>> {
        self.compositions
            .iter()
            .filter(|e| e.key().contains_all(query_key))
            .map(|e| Arc::clone(e.value()))
            .collect()
    }

    /// `modifyComponents`: the composition reached from `from` by adding
    /// `add` and removing `remove`, creating it on first use.
    pub(crate) fn modify(
        &self,
        from: &DataComposition,
        add: &[ClassId],
        remove: &[ClassId],
        class_index: &ClassIndex,
        pool: &ChunkedPool<EntityHandle>,
    ) -> Result<Arc<DataComposition>> {
        let mut classes: Vec<ClassId> =
            from.component_classes().iter().copied().filter(|c| !remove.contains(c)).collect();
        for c in add {
            if !classes.contains(c) {
                classes.push(*c);
            }
        }
        self.get_or_create(&classes, class_index, pool)
    }

    pub(crate) fn len(&self) -> usize {
        self.compositions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::id::IdSchema;

    struct Position;
    impl Component for Position {}
    struct Velocity;
    impl Component for Velocity {}

    #[test]
    fn get_or_create_is_idempotent_regardless_of_order() {
        let classes = ClassIndex::new();
        let pos = classes.get_index::<Position>().unwrap();
        let vel = classes.get_index::<Velocity>().unwrap();
        let pool: ChunkedPool<EntityHandle> = ChunkedPool::new(IdSchema::default_schema());
        let repo = CompositionRepository::new();

        let a = repo.get_or_create(&[pos, vel], &classes, &pool).unwrap();
        let b = repo.get_or_create(&[vel, pos], &classes, &pool).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn matching_finds_supersets_only() {
        let classes = ClassIndex::new();
        let pos = classes.get_index::<Position>().unwrap();
        let vel = classes.get_index::<Velocity>().unwrap();
        let pool: ChunkedPool<EntityHandle> = ChunkedPool::new(IdSchema::default_schema());
        let repo = CompositionRepository::new();

        repo.get_or_create(&[pos], &classes, &pool).unwrap();
        repo.get_or_create(&[pos, vel], &classes, &pool).unwrap();

        let query_key = IndexKey::from_classes(&[pos]);
        assert_eq!(repo.matching(&query_key).len(), 2);

        let query_key = IndexKey::from_classes(&[vel]);
        assert_eq!(repo.matching(&query_key).len(), 1);
    }

    #[test]
    fn modify_adds_and_removes_classes() {
        let classes = ClassIndex::new();
        let pos = classes.get_index::<Position>().unwrap();
        let vel = classes.get_index::<Velocity>().unwrap();
        let pool: ChunkedPool<EntityHandle> = ChunkedPool::new(IdSchema::default_schema());
        let repo = CompositionRepository::new();

        let base = repo.get_or_create(&[pos], &classes, &pool).unwrap();
        let next = repo.modify(&base, &[vel], &[pos], &classes, &pool).unwrap();
        assert_eq!(next.component_classes(), &[vel]);
    }
}
