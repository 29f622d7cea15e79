//! `IntEntity` — the per-entity handle (spec.md §4.7): a stable Rust value a
//! caller can hold onto across structural changes (component add/remove),
//! even though its underlying packed id changes when compaction relocates it.
//!
//! Grounded on `engine/src/core/ecs/entity/reference.rs` (`Ref`/`RefMut`:
//! component access scoped through a borrowed `table`/`row`) for the get/
//! has access pattern, and `engine/src/ecs/entity/mod.rs` (`Entity`: a
//! user-facing id wrapper distinct from the allocator's internal row) for
//! the "handle is not the allocator" separation. Identity-across-compaction
//! is resolved as recorded in `DESIGN.md`'s open-question section: the
//! packed id lives behind an `AtomicU32` so a relocated entity's existing
//! `Arc` clones observe their new id without any external bookkeeping.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::component::{ClassId, Component, StateValue};
use crate::composition::DataComposition;
use crate::error::{EcsError, Result};
use crate::id::RawId;
use crate::pool::TenantId;
use crate::world::WorldInner;

pub(crate) struct IntEntityInner {
    id: AtomicU32,
    composition: RwLock<Arc<DataComposition>>,
    enabled: AtomicBool,
    deleted: AtomicBool,
    /// The state-tenant this entity currently occupies, if any, and its id
    /// within that tenant — distinct from `id`, which never changes for a
    /// state move (spec.md §4.3: "primary id in root, state id in
    /// state-tenant").
    state: RwLock<Option<TenantId>>,
    state_id: AtomicU32,
    /// Serializes structural changes (add/remove component) on this entity;
    /// reads of already-present components never take it.
    guard: Mutex<()>,
    world: Arc<WorldInner>,
}

/// The value stored in every pool slot: one strong reference per live
/// entity, shared with every [`IntEntity`] handle a caller holds.
pub(crate) type EntityHandle = Arc<IntEntityInner>;

impl IntEntityInner {
    pub(crate) fn new(world: Arc<WorldInner>, id: RawId, composition: Arc<DataComposition>) -> EntityHandle {
        Arc::new(Self {
            id: AtomicU32::new(id),
            composition: RwLock::new(composition),
            enabled: AtomicBool::new(true),
            deleted: AtomicBool::new(false),
            state: RwLock::new(None),
            state_id: AtomicU32::new(0),
            guard: Mutex::new(()),
            world,
        })
    }

    #[inline]
    pub(crate) fn id(&self) -> RawId {
        self.id.load(Ordering::Acquire)
    }

    /// Called by the world/composition layer when compaction relocates this
    /// entity to a different slot within the same tenant.
    pub(crate) fn set_id(&self, id: RawId) {
        self.id.store(id, Ordering::Release);
    }

    #[inline]
    pub(crate) fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    pub(crate) fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
    }

    pub(crate) fn composition(&self) -> Arc<DataComposition> {
        Arc::clone(&self.composition.read())
    }

    pub(crate) fn set_composition(&self, composition: Arc<DataComposition>) {
        *self.composition.write() = composition;
    }

    pub(crate) fn state_location(&self) -> Option<(TenantId, RawId)> {
        self.state.read().map(|tenant| (tenant, self.state_id.load(Ordering::Acquire)))
    }

    pub(crate) fn set_state_location(&self, tenant: Option<TenantId>, id: RawId) {
        *self.state.write() = tenant;
        self.state_id.store(id, Ordering::Release);
    }

    /// Called by the world/composition layer when compaction relocates this
    /// entity's *state* id within its state-tenant — distinct from `set_id`,
    /// which tracks its root id.
    pub(crate) fn set_state_id(&self, id: RawId) {
        self.state_id.store(id, Ordering::Release);
    }

    /// Take and clear this entity's current state-tenant location, if any,
    /// serialized against a concurrent structural change. Used by
    /// `World::destroy_entity` to release a dangling state-tenant slot.
    pub(crate) fn take_state_location(&self) -> Option<(TenantId, RawId)> {
        let _guard = self.guard.lock();
        let current = self.state_location();
        if current.is_some() {
            self.set_state_location(None, 0);
        }
        current
    }
}

/// The public handle type. Cloning it is cheap (an `Arc` bump) and every
/// clone observes the same entity, including after it has been relocated or
/// deleted.
#[derive(Clone)]
pub struct IntEntity(pub(crate) EntityHandle);

impl IntEntity {
    pub(crate) fn from_handle(handle: EntityHandle) -> Self {
        Self(handle)
    }

    pub(crate) fn handle(&self) -> &EntityHandle {
        &self.0
    }

    /// The entity's current packed `(chunk, slot)` id. Not stable across a
    /// structural change or a compaction that relocates this entity — hold
    /// the [`IntEntity`] handle itself for a stable reference, not this id.
    pub fn id(&self) -> RawId {
        self.0.id()
    }

    pub fn is_deleted(&self) -> bool {
        self.0.is_deleted()
    }

    pub fn is_enabled(&self) -> bool {
        self.0.enabled.load(Ordering::Acquire)
    }

    /// `setEnabled`: flips the entity's enabled flag, mirrored into the
    /// chunk-local bitset queries check directly during a chunk scan
    /// (spec.md §4.8).
    pub fn set_enabled(&self, value: bool) {
        if self.is_deleted() {
            return;
        }
        let _guard = self.0.guard.lock();
        self.0.enabled.store(value, Ordering::Release);
        let (chunk_id, slot) = self.0.world.pool.schema().unpack(self.id());
        self.0.world.pool.chunk(chunk_id).set_enabled(slot, value);
    }

    /// `has<C>`: whether this entity's current composition carries `C`.
    pub fn has<C: Component>(&self) -> bool {
        if self.is_deleted() {
            return false;
        }
        let Some(class) = self.0.world.classes.get::<C>() else { return false };
        self.contains_class(class)
    }

    /// `contains(class)`: the untyped counterpart of `has<C>`, for callers
    /// that have already resolved a [`ClassId`] (e.g. from a query's
    /// composition) and want to avoid a redundant `ClassIndex` lookup.
    pub fn contains(&self, class: ClassId) -> bool {
        if self.is_deleted() {
            return false;
        }
        self.contains_class(class)
    }

    pub(crate) fn contains_class(&self, class: ClassId) -> bool {
        self.0.composition().column_index_of(class).is_some()
    }

    /// `get<C>`: a clone of the entity's current `C` value, or `None` if it
    /// does not carry that component or has been deleted.
    pub fn get<C: Component + Clone>(&self) -> Option<C> {
        if self.is_deleted() {
            return None;
        }
        let composition = self.0.composition();
        let class = self.0.world.classes.get::<C>()?;
        let idx = composition.column_index_of(class)?;
        let (chunk_id, slot) = self.0.world.pool.schema().unpack(self.id());
        let chunk = self.0.world.pool.chunk(chunk_id);
        // SAFETY: `idx` was resolved from this entity's own composition for
        // `class`'s type; `slot` is this entity's own live slot.
        let value = unsafe { chunk.column(idx).get::<C>(slot.index()) };
        Some(value.clone())
    }

    /// `add<C>`: attach (or overwrite) component `C`, migrating this entity
    /// to the composition that is its current type-set plus `C` if needed.
    pub fn add<C: Component>(&self, value: C) -> Result<()> {
        if self.is_deleted() {
            return Err(EcsError::DeletedEntity);
        }
        let _guard = self.0.guard.lock();
        let class = self.0.world.classes.get_index::<C>()?;
        let from = self.0.composition();
        if from.column_index_of(class).is_some() {
            // Already present: overwrite in place, no migration needed.
            let (chunk_id, slot) = self.0.world.pool.schema().unpack(self.id());
            let chunk = self.0.world.pool.chunk(chunk_id);
            let idx = from.column_index_of(class).unwrap();
            unsafe {
                chunk.column(idx).drop_slot(slot.index());
                chunk.column(idx).write(slot.index(), value);
            }
            return Ok(());
        }
        self.migrate(&from, &[class], &[], |to, chunk, slot| {
            let idx = to.column_index_of(class).expect("just added");
            unsafe { chunk.column(idx).write(slot.index(), value) };
        })
    }

    /// `remove<C>` / `removeType`: detach component `C`, migrating this
    /// entity to the composition that is its current type-set minus `C`.
    pub fn remove<C: Component>(&self) -> Result<()> {
        let Some(class) = self.0.world.classes.get::<C>() else { return Ok(()) };
        self.remove_type(class)
    }

    pub fn remove_type(&self, class: ClassId) -> Result<()> {
        if self.is_deleted() {
            return Err(EcsError::DeletedEntity);
        }
        let _guard = self.0.guard.lock();
        let from = self.0.composition();
        if from.column_index_of(class).is_none() {
            return Ok(());
        }
        self.migrate(&from, &[], &[class], |_, _, _| {})
    }

    /// `setState(enumValue?)`: move this entity into the state-tenant for
    /// `value` within its current composition, or clear its state entirely
    /// when `value` is `None`. A round trip — `set_state(Some(v))` then
    /// `set_state(None)` — leaves the entity queryable through its root
    /// composition and present in no state-tenant (spec.md §8).
    pub fn set_state<E: StateValue>(&self, value: Option<E>) -> Result<()> {
        if self.is_deleted() {
            return Err(EcsError::DeletedEntity);
        }
        let _guard = self.0.guard.lock();
        let world = &self.0.world;
        let composition = self.0.composition();
        let previous = self.0.state_location();

        let target_tenant = match &value {
            Some(v) => {
                let key = world.classes.enum_state_key::<E>(v.ordinal())?;
                Some(composition.state_tenant(key, &world.pool)?)
            }
            None => None,
        };

        if previous.map(|(tenant, _)| tenant) == target_tenant {
            return Ok(());
        }

        if let Some((old_tenant, old_id)) = previous {
            if world.pool.free_id(old_tenant, old_id).is_some() {
                if let Some(relocated) = world.pool.get_entry(old_id) {
                    relocated.set_state_id(old_id);
                }
            }
        }

        match target_tenant {
            Some(tenant) => {
                let new_id = world.pool.next_id(tenant)?;
                world.pool.place(new_id, Arc::clone(&self.0));
                self.0.set_state_location(Some(tenant), new_id);
            }
            None => self.0.set_state_location(None, 0),
        }

        Ok(())
    }

    /// Common structural-change path: compute the destination composition,
    /// allocate a new id there, copy every surviving component's value
    /// across, let `place_new` write any newly-added component, then free
    /// the old id (fixing up whichever other entity that free relocates).
    fn migrate(
        &self,
        from: &Arc<DataComposition>,
        add: &[ClassId],
        remove: &[ClassId],
        place_new: impl FnOnce(&DataComposition, &crate::pool::Chunk<EntityHandle>, crate::id::SlotId),
    ) -> Result<()> {
        let world = &self.0.world;
        let to = world.repo.modify(from, add, remove, &world.classes, &world.pool)?;

        // A state-tenant slot is namespaced under the composition being left
        // behind; it does not carry over to `to`.
        if let Some((old_state_tenant, old_state_id)) = self.0.state_location() {
            if world.pool.free_id(old_state_tenant, old_state_id).is_some() {
                if let Some(relocated) = world.pool.get_entry(old_state_id) {
                    relocated.set_state_id(old_state_id);
                }
            }
            self.0.set_state_location(None, 0);
        }

        let old_id = self.id();
        let (old_chunk_id, old_slot) = world.pool.schema().unpack(old_id);
        let old_chunk = world.pool.chunk(old_chunk_id);

        let new_id = world.pool.next_id(to.tenant())?;
        let (new_chunk_id, new_slot) = world.pool.schema().unpack(new_id);
        let new_chunk = world.pool.chunk(new_chunk_id);

        for class in from.component_classes() {
            if remove.contains(class) {
                // SAFETY: `old_slot` holds a live value of this class.
                unsafe { old_chunk.column(from.column_index_of(*class).unwrap()).drop_slot(old_slot.index()) };
                continue;
            }
            let from_idx = from.column_index_of(*class).unwrap();
            let to_idx = to.column_index_of(*class).unwrap();
            // SAFETY: both columns share `class`'s layout; `old_slot` holds a
            // live value, `new_slot` is freshly allocated and unread.
            unsafe {
                old_chunk.column(from_idx).copy_into(old_slot.index(), new_chunk.column(to_idx), new_slot.index());
            }
        }
        place_new(&to, &new_chunk, new_slot);

        new_chunk.set_item(new_slot, Some(Arc::clone(&self.0)));
        new_chunk.set_enabled(new_slot, self.is_enabled());
        self.0.set_id(new_id);
        self.0.set_composition(to);

        if let Some(_relocated_old_id) = world.pool.free_id(from.tenant(), old_id) {
            if let Some(relocated) = world.pool.get_entry(old_id) {
                relocated.set_id(old_id);
            }
        }

        Ok(())
    }
}
