//! `DataComposition` — one archetype: a fixed component type-set, its own
//! root [`crate::pool::TenantId`] for storage, and on-demand state-tenants
//! for enum-state namespacing (spec.md §4.5).
//!
//! Grounded on `engine/src/ecs/storage/table.rs` (`Table`: `columns: Vec<Column>`
//! addressed by a dense `component_id -> column index` map) for the shape of
//! "one table per distinct key, columns addressed by a precomputed index".

mod repository;

pub(crate) use repository::CompositionRepository;

use std::collections::HashMap;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::component::ClassId;
use crate::entity::EntityHandle;
use crate::error::Result;
use crate::key::IndexKey;
use crate::pool::{ChunkedPool, TenantId};

pub(crate) struct DataComposition {
    key: IndexKey,
    component_classes: Vec<ClassId>,
    component_index: HashMap<ClassId, usize>,
    tenant: TenantId,
    state_tenants: DashMap<IndexKey, TenantId>,
}

impl DataComposition {
    pub(crate) fn new(
        key: IndexKey,
        component_classes: Vec<ClassId>,
        pool: &ChunkedPool<EntityHandle>,
        class_infos: Vec<crate::component::ClassInfo>,
    ) -> Result<Self> {
        let component_index = component_classes.iter().enumerate().map(|(i, c)| (*c, i)).collect();
        let tenant = pool.new_tenant(class_infos)?;
        Ok(Self { key, component_classes, component_index, tenant, state_tenants: DashMap::new() })
    }

    #[inline]
    pub(crate) fn key(&self) -> &IndexKey {
        &self.key
    }

    #[inline]
    pub(crate) fn tenant(&self) -> TenantId {
        self.tenant
    }

    #[inline]
    pub(crate) fn component_classes(&self) -> &[ClassId] {
        &self.component_classes
    }

    #[inline]
    pub(crate) fn column_index_of(&self, class: ClassId) -> Option<usize> {
        self.component_index.get(&class).copied()
    }

    /// `fetchStateTenant` / `getStateTenant`: the sub-tenant that tracks
    /// membership for one enum-state value within this composition, created
    /// lazily on first use. State tenants own no columns of their own — they
    /// exist purely to let a query scan "entities of composition X currently
    /// in state Y" without visiting every entity of X.
    pub(crate) fn state_tenant(&self, state_key: IndexKey, pool: &ChunkedPool<EntityHandle>) -> Result<TenantId> {
        // `entry()` holds the shard lock for `state_key` across the whole
        // match, so two racing callers on a never-seen key don't both reach
        // `pool.new_tenant` — the second blocks until the first's entry is
        // resolved and then observes it `Occupied`.
        match self.state_tenants.entry(state_key) {
            Entry::Occupied(e) => Ok(*e.get()),
            Entry::Vacant(e) => {
                let tenant = pool.new_tenant(Vec::new())?;
                Ok(*e.insert(tenant))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_index::ClassIndex;
    use crate::component::Component;
    use crate::id::IdSchema;

    struct Position;
    impl Component for Position {}

    #[test]
    fn new_composition_registers_its_column_layout() {
        let classes = ClassIndex::new();
        let pos = classes.get_index::<Position>().unwrap();
        let pool: ChunkedPool<EntityHandle> = ChunkedPool::new(IdSchema::default_schema());
        let info = classes.info(pos).unwrap();
        let comp = DataComposition::new(IndexKey::from_classes(&[pos]), vec![pos], &pool, vec![info]).unwrap();
        assert_eq!(comp.column_index_of(pos), Some(0));
    }

    #[test]
    fn state_tenants_are_created_once_and_reused() {
        let pool: ChunkedPool<EntityHandle> = ChunkedPool::new(IdSchema::default_schema());
        let comp = DataComposition::new(IndexKey::empty(), Vec::new(), &pool, Vec::new()).unwrap();
        let key = IndexKey::for_enum_state(ClassId::new(0), 1);
        let a = comp.state_tenant(key.clone(), &pool).unwrap();
        let b = comp.state_tenant(key, &pool).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn racing_callers_on_an_unseen_state_key_agree_on_one_tenant() {
        use std::sync::Arc;
        use std::thread;

        let pool = Arc::new(ChunkedPool::new(IdSchema::default_schema()));
        let comp = Arc::new(DataComposition::new(IndexKey::empty(), Vec::new(), &pool, Vec::new()).unwrap());
        let key = IndexKey::for_enum_state(ClassId::new(0), 1);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let comp = Arc::clone(&comp);
                let key = key.clone();
                thread::spawn(move || comp.state_tenant(key, &pool).unwrap())
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.iter().all(|&t| t == results[0]));
    }
}
