//! `ChunkedPool` — the slab allocator described in spec.md §3/§4.3: a global
//! table of fixed-capacity [`chunk::Chunk`]s, shared across every
//! [`tenant::Tenant`] (a composition's root storage, or one of its
//! enum-state buckets), addressed by ids packed per an [`crate::id::IdSchema`].
//!
//! Grounded on `engine/src/ecs/archetype/registry.rs` for the "one table per
//! distinct key, chunk ids as the stable address, never move a live table" shape,
//! combined with `SOF3-dynec`'s `Recycling` allocator (see `tenant.rs`) for the
//! per-tenant optimistic allocation path.

mod chunk;
mod column;
mod tenant;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;

pub(crate) use chunk::Chunk;
pub(crate) use tenant::TenantId;

use crate::component::ClassInfo;
use crate::error::{EcsError, Result};
use crate::id::{ChunkId, IdSchema, RawId, SlotId};
use tenant::Tenant;

/// Global chunked slab, generic over the kind of item each slot stores (an
/// entity handle, in this crate's sole instantiation — see `entity.rs`).
pub(crate) struct ChunkedPool<Item> {
    schema: IdSchema,
    chunks: RwLock<Vec<Arc<Chunk<Item>>>>,
    tenants: RwLock<Vec<Arc<Tenant>>>,
}

impl<Item> ChunkedPool<Item> {
    pub(crate) fn new(schema: IdSchema) -> Self {
        Self { schema, chunks: RwLock::new(Vec::new()), tenants: RwLock::new(Vec::new()) }
    }

    #[inline]
    pub(crate) fn schema(&self) -> IdSchema {
        self.schema
    }

    fn push_chunk(&self, prev: Option<ChunkId>, component_info: &[ClassInfo]) -> Result<Arc<Chunk<Item>>> {
        let mut chunks = self.chunks.write();
        let next_chunk_id = chunks.len() as u32;
        if next_chunk_id >= self.schema.max_chunks() {
            return Err(EcsError::PoolFull);
        }
        let chunk = Arc::new(Chunk::new(ChunkId(next_chunk_id), self.schema.chunk_capacity(), prev, component_info));
        chunks.push(Arc::clone(&chunk));
        Ok(chunk)
    }

    /// Register a new tenant with its own first chunk, sized for the given
    /// component set (empty for a state-tenant, which stores no columns of
    /// its own — see `composition.rs`).
    pub(crate) fn new_tenant(&self, component_info: Vec<ClassInfo>) -> Result<TenantId> {
        let first = self.push_chunk(None, &component_info)?;
        let mut tenants = self.tenants.write();
        let id = TenantId(tenants.len() as u32);
        tenants.push(Arc::new(Tenant::new(first.id(), component_info)));
        Ok(id)
    }

    fn tenant(&self, id: TenantId) -> Arc<Tenant> {
        Arc::clone(&self.tenants.read()[id.0 as usize])
    }

    pub(crate) fn chunk(&self, id: ChunkId) -> Arc<Chunk<Item>> {
        Arc::clone(&self.chunks.read()[id.index()])
    }

    pub(crate) fn component_info(&self, tenant_id: TenantId) -> Vec<ClassInfo> {
        self.tenant(tenant_id).component_info.clone()
    }

    /// Every chunk currently linked to `tenant_id`, in allocation order, for
    /// a query chunk-scan.
    pub(crate) fn chunks_of(&self, tenant_id: TenantId) -> Vec<Arc<Chunk<Item>>> {
        let tenant = self.tenant(tenant_id);
        let mut result = Vec::new();
        let mut cursor = Some(tenant.first_chunk());
        while let Some(id) = cursor {
            let chunk = self.chunk(id);
            cursor = chunk.next();
            result.push(chunk);
        }
        result
    }

    /// `tenant.nextId()`: allocate a fresh or recycled id for `tenant_id`,
    /// growing a new linked chunk if the current one is full.
    pub(crate) fn next_id(&self, tenant_id: TenantId) -> Result<RawId> {
        let tenant = self.tenant(tenant_id);
        let component_info = tenant.component_info.clone();
        tenant.next_id(
            &self.schema,
            |chunk_id| {
                let chunk = self.chunk(chunk_id);
                // SAFETY: the chunk's heap allocation is pinned for the
                // pool's lifetime — it is only ever appended to `self.chunks`,
                // never removed, and `Chunk` is not relocated on growth of
                // the outer `Vec<Arc<_>>` since each element is an `Arc`.
                chunk.raw_index() as *const AtomicU32
            },
            |full_chunk_id| {
                let full = self.chunk(full_chunk_id);
                let new_chunk = self.push_chunk(Some(full_chunk_id), &component_info)?;
                full.link_next(new_chunk.id());
                Ok(new_chunk.id())
            },
        )
    }

    /// `tenant.freeId(id)`: release `id`. Returns the id of whichever entry
    /// was relocated to keep the tenant's chunks dense, if any — per spec.md
    /// §8's compaction scenario, freeing a non-frontier slot moves the
    /// chunk's last live slot into the gap, and the mover's old id is
    /// returned so callers can update anything keyed by it.
    ///
    /// This does not drop `id`'s own component values: the caller (the
    /// entity/composition layer) already knows which of them were dropped
    /// outright versus moved byte-for-byte into a destination composition,
    /// and must retire them itself before calling this — dropping them here
    /// too would double-drop whichever survived a migration.
    pub(crate) fn free_id(&self, tenant_id: TenantId, id: RawId) -> Option<RawId> {
        let tenant = self.tenant(tenant_id);
        let (chunk_id, slot) = self.schema.unpack(id);
        let chunk = self.chunk(chunk_id);

        let fill = chunk.raw_index().load(Ordering::Acquire);
        if fill == 0 {
            return None;
        }
        let last_slot = SlotId(fill - 1);

        chunk.take_item(slot);

        let moved = if slot != last_slot {
            let moved_item = chunk.take_item(last_slot);
            chunk.set_item(slot, moved_item);
            chunk.set_enabled(slot, chunk.is_enabled(last_slot));
            for col in chunk.columns() {
                // SAFETY: `last_slot` still holds a live value; `slot` was
                // just vacated above and is distinct from `last_slot`, so the
                // column's destination bytes need no prior drop.
                unsafe { col.move_slot(last_slot.index(), slot.index()) };
            }
            Some(self.schema.pack(chunk_id, last_slot))
        } else {
            None
        };

        if tenant.is_current(chunk_id) {
            // The frontier shrinks by one; the vacated position (whichever
            // slot that now is) is implicitly covered by the next `next_id`.
            chunk.raw_index().fetch_sub(1, Ordering::AcqRel);
        } else if let Some(old_id) = moved {
            tenant.push_free(old_id);
        } else {
            tenant.push_free(id);
        }

        moved
    }

    pub(crate) fn get_entry(&self, id: RawId) -> Option<Item>
    where
        Item: Clone,
    {
        let (chunk_id, slot) = self.schema.unpack(id);
        self.chunks.read().get(chunk_id.index()).and_then(|c| c.get_item(slot))
    }

    pub(crate) fn place(&self, id: RawId, item: Item) {
        let (chunk_id, slot) = self.schema.unpack(id);
        self.chunk(chunk_id).set_item(slot, Some(item));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_pool() -> ChunkedPool<u32> {
        ChunkedPool::new(IdSchema::new(1, 4)) // chunk capacity 2, up to 16 chunks
    }

    #[test]
    fn allocate_and_place_round_trip() {
        let pool = tiny_pool();
        let tenant = pool.new_tenant(Vec::new()).unwrap();
        let id = pool.next_id(tenant).unwrap();
        pool.place(id, 99);
        assert_eq!(pool.get_entry(id), Some(99));
    }

    #[test]
    fn overflowing_a_chunk_links_a_successor() {
        let pool = tiny_pool();
        let tenant = pool.new_tenant(Vec::new()).unwrap();
        let a = pool.next_id(tenant).unwrap();
        let b = pool.next_id(tenant).unwrap();
        let c = pool.next_id(tenant).unwrap(); // overflows capacity-2 chunk 0
        let (chunk_a, _) = pool.schema().unpack(a);
        let (chunk_b, _) = pool.schema().unpack(b);
        let (chunk_c, _) = pool.schema().unpack(c);
        assert_eq!(chunk_a, chunk_b);
        assert_ne!(chunk_b, chunk_c);
        assert_eq!(pool.chunk(chunk_a).next(), Some(chunk_c));
    }

    #[test]
    fn freeing_a_middle_slot_relocates_the_frontier_entry() {
        let pool = tiny_pool();
        let tenant = pool.new_tenant(Vec::new()).unwrap();
        let id0 = pool.next_id(tenant).unwrap();
        let id1 = pool.next_id(tenant).unwrap();
        pool.place(id0, 10);
        pool.place(id1, 11);

        let moved = pool.free_id(tenant, id0);
        assert_eq!(moved, Some(id1));
        assert_eq!(pool.get_entry(id0), Some(11));
    }

    #[test]
    fn freeing_the_frontier_slot_needs_no_relocation() {
        let pool = tiny_pool();
        let tenant = pool.new_tenant(Vec::new()).unwrap();
        let id0 = pool.next_id(tenant).unwrap();
        let id1 = pool.next_id(tenant).unwrap();
        pool.place(id0, 10);
        pool.place(id1, 11);

        let moved = pool.free_id(tenant, id1);
        assert_eq!(moved, None);
        assert_eq!(pool.get_entry(id0), Some(10));
    }

    #[test]
    fn freed_ids_are_recycled_before_growing() {
        let pool = tiny_pool();
        let tenant = pool.new_tenant(Vec::new()).unwrap();
        let a = pool.next_id(tenant).unwrap();
        let b = pool.next_id(tenant).unwrap();
        pool.free_id(tenant, a); // frontier slot, goes straight back to the index
        let c = pool.next_id(tenant).unwrap();
        assert_eq!(c, a);
        let _ = b;
    }

    #[test]
    fn exhausting_the_chunk_id_space_is_reported() {
        let pool: ChunkedPool<u32> = ChunkedPool::new(IdSchema::new(1, 1)); // capacity 2, max 2 chunks
        let tenant = pool.new_tenant(Vec::new()).unwrap();
        pool.next_id(tenant).unwrap();
        pool.next_id(tenant).unwrap();
        // Chunk 0 full (2 slots), chunk 1 already exists as... no, only one
        // chunk exists so far; this third alloc forces a second chunk.
        let third = pool.next_id(tenant);
        assert!(third.is_ok());
        pool.next_id(tenant).unwrap();
        // Both chunks (the only 2 this schema allows) are now full.
        assert_eq!(pool.next_id(tenant), Err(EcsError::PoolFull));
    }
}
