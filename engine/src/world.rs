//! `World` — the top-level façade wiring a [`ChunkedPool`], [`ClassIndex`]
//! and [`CompositionRepository`] together (spec.md §6).
//!
//! Grounded on `engine/src/ecs/world/mod.rs` (`World`: owns the allocator,
//! type registry, and storage; `spawn`/`despawn`/`entity`/`query` as the
//! public surface) and its `storage::Values` trait (`engine/src/ecs/storage/value.rs`)
//! for the tuple-of-components bundle pattern `ComponentBundle` below
//! generalizes.

use std::sync::Arc;

use log::{debug, info};

use crate::component::{ClassId, Component};
use crate::composition::{CompositionRepository, DataComposition};
use crate::entity::{EntityHandle, IntEntity, IntEntityInner};
use crate::error::{EcsError, Result};
use crate::id::{IdSchema, SlotId};
use crate::class_index::ClassIndex;
use crate::pool::{Chunk, ChunkedPool};
use crate::query;

/// Shared state every [`IntEntity`] handle holds a reference to, so it can
/// serve `get`/`add`/`remove` without going back through a [`World`].
pub(crate) struct WorldInner {
    pub(crate) pool: ChunkedPool<EntityHandle>,
    pub(crate) classes: ClassIndex,
    pub(crate) repo: CompositionRepository,
}

/// The entity-component-system runtime. Cloning a `World` is cheap (an
/// `Arc` bump) and every clone shares the same underlying pool/registry.
#[derive(Clone)]
pub struct World {
    inner: Arc<WorldInner>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self::with_schema(IdSchema::default_schema())
    }

    /// Construct a world with a non-default chunk/slot bit layout — see
    /// spec.md §4.1's `IdSchema`.
    pub fn with_schema(schema: IdSchema) -> Self {
        info!("creating world with chunk capacity {}", schema.chunk_capacity());
        Self {
            inner: Arc::new(WorldInner {
                pool: ChunkedPool::new(schema),
                classes: ClassIndex::new(),
                repo: CompositionRepository::new(),
            }),
        }
    }

    /// `createEntity`: spawn a new entity carrying `bundle`'s components.
    /// Rejects a bundle that names the same component type twice — no
    /// entity is created (spec.md §7).
    pub fn create_entity<B: ComponentBundle>(&self, bundle: B) -> Result<IntEntity> {
        let classes = B::classes(&self.inner.classes)?;
        reject_duplicates(&classes)?;
        self.create_entity_with_classes(classes, bundle)
    }

    /// `createEntity` variant for a caller that has already resolved the
    /// target component class set (e.g. a pre-warmed composition), avoiding
    /// a redundant `ClassIndex` lookup per class. `classes` must already be
    /// duplicate-free; callers reached through the public API have it
    /// checked by [`reject_duplicates`] on the way in.
    pub(crate) fn create_entity_with_classes<B: ComponentBundle>(
        &self,
        classes: Vec<ClassId>,
        bundle: B,
    ) -> Result<IntEntity> {
        let mut sorted = classes;
        sorted.sort_unstable_by_key(ClassId::raw);
        let deduped_len = sorted.len();
        let composition = self.inner.repo.get_or_create(&sorted, &self.inner.classes, &self.inner.pool)?;

        let id = self.inner.pool.next_id(composition.tenant())?;
        let (chunk_id, slot) = self.inner.pool.schema().unpack(id);
        let chunk = self.inner.pool.chunk(chunk_id);

        bundle.write(&self.inner.classes, &composition, &chunk, slot)?;

        let handle = IntEntityInner::new(Arc::clone(&self.inner), id, composition);
        chunk.set_item(slot, Some(Arc::clone(&handle)));
        chunk.set_enabled(slot, true);

        debug!("created entity {id:#x} with {deduped_len} component(s)");
        Ok(IntEntity::from_handle(handle))
    }

    /// `createEntityAs(prefab, extra…)`: spawn a new entity carrying every
    /// component `prefab` currently has, plus `extra`'s components —
    /// `extra`'s values win on any overlap with `prefab` (spec.md §6).
    /// `prefab` itself is untouched.
    pub fn create_entity_as<B: ComponentBundle>(&self, prefab: &IntEntity, extra: B) -> Result<IntEntity> {
        if prefab.is_deleted() {
            return Err(EcsError::DeletedEntity);
        }
        let extra_classes = B::classes(&self.inner.classes)?;
        reject_duplicates(&extra_classes)?;

        let prefab_handle = prefab.handle();
        let from = prefab_handle.composition();
        let inherited: Vec<ClassId> =
            from.component_classes().iter().copied().filter(|c| !extra_classes.contains(c)).collect();

        let mut classes = inherited.clone();
        classes.extend_from_slice(&extra_classes);
        let composition = self.inner.repo.get_or_create(&classes, &self.inner.classes, &self.inner.pool)?;

        let id = self.inner.pool.next_id(composition.tenant())?;
        let (chunk_id, slot) = self.inner.pool.schema().unpack(id);
        let chunk = self.inner.pool.chunk(chunk_id);

        let (prefab_chunk_id, prefab_slot) = self.inner.pool.schema().unpack(prefab.id());
        let prefab_chunk = self.inner.pool.chunk(prefab_chunk_id);
        for class in &inherited {
            let from_idx = from.column_index_of(*class).expect("own composition always has its own classes");
            let to_idx = composition.column_index_of(*class).expect("included above");
            // SAFETY: both columns share `class`'s layout (same `ClassInfo`
            // from the shared `ClassIndex`); `prefab_slot` holds a live
            // value of this class; `slot` was just allocated and unread.
            unsafe {
                prefab_chunk.column(from_idx).copy_into(prefab_slot.index(), chunk.column(to_idx), slot.index());
            }
        }

        extra.write(&self.inner.classes, &composition, &chunk, slot)?;

        let handle = IntEntityInner::new(Arc::clone(&self.inner), id, composition);
        chunk.set_item(slot, Some(Arc::clone(&handle)));
        chunk.set_enabled(slot, true);

        debug!("created entity {id:#x} as a copy of {:#x}", prefab.id());
        Ok(IntEntity::from_handle(handle))
    }

    /// `destroyEntity`: drop every component value and release the id,
    /// fixing up whichever other entity compaction relocates.
    pub fn destroy_entity(&self, entity: &IntEntity) {
        if entity.is_deleted() {
            return;
        }
        let handle = entity.handle();
        handle.mark_deleted();

        let composition = handle.composition();
        let id = handle.id();
        let (chunk_id, slot) = self.inner.pool.schema().unpack(id);
        let chunk = self.inner.pool.chunk(chunk_id);

        for class in composition.component_classes() {
            let idx = composition.column_index_of(*class).expect("own composition always has its own classes");
            // SAFETY: `slot` still holds this entity's live component data.
            unsafe { chunk.column(idx).drop_slot(slot.index()) };
        }

        if let Some((state_tenant, state_id)) = handle.take_state_location() {
            if self.inner.pool.free_id(state_tenant, state_id).is_some() {
                if let Some(relocated) = self.inner.pool.get_entry(state_id) {
                    relocated.set_state_id(state_id);
                }
            }
        }

        if let Some(_relocated_old_id) = self.inner.pool.free_id(composition.tenant(), id) {
            if let Some(relocated) = self.inner.pool.get_entry(id) {
                relocated.set_id(id);
            }
        }
        debug!("destroyed entity {id:#x}");
    }

    /// `findComponents<C>`.
    pub fn find_components<C: Component + Clone>(&self) -> Vec<(IntEntity, C)> {
        query::scan1::<C>(&self.inner)
    }

    /// `findComponents<A, B>`.
    pub fn find_components2<A: Component + Clone, B: Component + Clone>(&self) -> Vec<(IntEntity, A, B)> {
        query::scan2::<A, B>(&self.inner)
    }

    /// `findComponents<A, B, C>`.
    pub fn find_components3<A: Component + Clone, B: Component + Clone, C: Component + Clone>(
        &self,
    ) -> Vec<(IntEntity, A, B, C)> {
        query::scan3::<A, B, C>(&self.inner)
    }

    /// `findComponents<A, B, C, D>`.
    pub fn find_components4<
        A: Component + Clone,
        B: Component + Clone,
        C: Component + Clone,
        D: Component + Clone,
    >(
        &self,
    ) -> Vec<(IntEntity, A, B, C, D)> {
        query::scan4::<A, B, C, D>(&self.inner)
    }

    /// `findComponents<A, B, C, D, E>`.
    pub fn find_components5<
        A: Component + Clone,
        B: Component + Clone,
        C: Component + Clone,
        D: Component + Clone,
        E: Component + Clone,
    >(
        &self,
    ) -> Vec<(IntEntity, A, B, C, D, E)> {
        query::scan5::<A, B, C, D, E>(&self.inner)
    }

    /// `findComponents<A, B, C, D, E, F>`.
    pub fn find_components6<
        A: Component + Clone,
        B: Component + Clone,
        C: Component + Clone,
        D: Component + Clone,
        E: Component + Clone,
        F: Component + Clone,
    >(
        &self,
    ) -> Vec<(IntEntity, A, B, C, D, E, F)> {
        query::scan6::<A, B, C, D, E, F>(&self.inner)
    }

    /// `close`: this crate's worlds own no external resources (file
    /// handles, threads) beyond their in-memory pool, so this only exists to
    /// round out the documented external interface — dropping the last
    /// `World` clone already releases everything.
    pub fn close(self) {
        info!("closing world");
    }

    pub fn registered_component_count(&self) -> usize {
        self.inner.classes.len()
    }

    pub fn composition_count(&self) -> usize {
        self.inner.repo.len()
    }
}

/// `createEntity`'s entry-point check: reject a component class list that
/// names the same class twice, before a composition is ever looked up or
/// created (spec.md §7 — no entity is created for an invalid bundle).
fn reject_duplicates(classes: &[ClassId]) -> Result<()> {
    let mut sorted: Vec<ClassId> = classes.to_vec();
    sorted.sort_unstable_by_key(ClassId::raw);
    if sorted.windows(2).any(|w| w[0] == w[1]) {
        return Err(EcsError::InvalidComponent);
    }
    Ok(())
}

/// A set of component values that can be written into a freshly-allocated
/// slot — implemented for single component types and for tuples of them,
/// mirroring the teacher's `storage::Values`/`IntoSpec` split.
pub trait ComponentBundle {
    fn classes(classes: &ClassIndex) -> Result<Vec<ClassId>>;

    fn write(
        self,
        classes: &ClassIndex,
        composition: &DataComposition,
        chunk: &Chunk<EntityHandle>,
        slot: SlotId,
    ) -> Result<()>;
}

impl ComponentBundle for () {
    fn classes(_classes: &ClassIndex) -> Result<Vec<ClassId>> {
        Ok(Vec::new())
    }

    fn write(self, _: &ClassIndex, _: &DataComposition, _: &Chunk<EntityHandle>, _: SlotId) -> Result<()> {
        Ok(())
    }
}

impl<C: Component> ComponentBundle for C {
    fn classes(classes: &ClassIndex) -> Result<Vec<ClassId>> {
        Ok(vec![classes.get_index::<C>()?])
    }

    fn write(
        self,
        classes: &ClassIndex,
        composition: &DataComposition,
        chunk: &Chunk<EntityHandle>,
        slot: SlotId,
    ) -> Result<()> {
        let class = classes.get_index::<C>()?;
        let idx = composition.column_index_of(class).ok_or(EcsError::UnknownClass)?;
        // SAFETY: `slot` was just allocated for this composition and has
        // never been written.
        unsafe { chunk.column(idx).write(slot.index(), self) };
        Ok(())
    }
}

macro_rules! bundle_tuple {
    ($($name:ident),+) => {
        impl<$($name: Component),+> ComponentBundle for ($($name,)+) {
            fn classes(classes: &ClassIndex) -> Result<Vec<ClassId>> {
                Ok(vec![$(classes.get_index::<$name>()?),+])
            }

            fn write(
                self,
                classes: &ClassIndex,
                composition: &DataComposition,
                chunk: &Chunk<EntityHandle>,
                slot: SlotId,
            ) -> Result<()> {
                #[allow(non_snake_case)]
                let ($($name,)+) = self;
                $(ComponentBundle::write($name, classes, composition, chunk, slot)?;)+
                Ok(())
            }
        }
    };
}

bundle_tuple!(A, B);
bundle_tuple!(A, B, C);
bundle_tuple!(A, B, C, D);
bundle_tuple!(A, B, C, D, E);
bundle_tuple!(A, B, C, D, E, F);
