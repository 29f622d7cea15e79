//! Per-tenant allocation/free state and the stamped-lock (seqlock) protocol
//! described in spec.md §4.3/§5.
//!
//! Grounded on `examples/SOF3-dynec/src/entity/ealloc/recycling.rs`'s
//! `Recycling` allocator for the "atomic gauge plus a recycle list" shape
//! (there: `Arc<E::Atomic>` global gauge + per-shard recycle queues; here: a
//! per-chunk atomic fill counter plus one LIFO free-stack, since spec.md's
//! compaction model — unlike dynec's sharded/offline one — needs a single
//! ordered stack, not per-shard queues). The optimistic-read / escalate-to-
//! write-lock shape itself follows spec.md §9's explicit re-architecting
//! note ("map to a lightweight seqlock: an atomic counter incremented on
//! begin-write and end-write; readers snapshot, read, and verify").

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::component::ClassInfo;
use crate::error::{EcsError, Result};
use crate::id::{ChunkId, IdSchema, RawId, SlotId};

/// Dense id for one tenant, unique within a [`crate::pool::ChunkedPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TenantId(pub(crate) u32);

pub(crate) struct Tenant {
    pub(crate) component_info: Vec<ClassInfo>,
    first_chunk: ChunkId,
    current_chunk: AtomicU32,
    free_stack: Mutex<Vec<RawId>>,
    /// Seqlock version: even = quiescent, odd = a writer is mid-migration to
    /// a new chunk. Readers that observe an odd stamp, or whose stamp changes
    /// across their read, must not trust the chunk id they read.
    seq: AtomicU64,
    alloc_lock: Mutex<()>,
}

impl Tenant {
    pub(crate) fn new(first_chunk: ChunkId, component_info: Vec<ClassInfo>) -> Self {
        Self {
            component_info,
            first_chunk,
            current_chunk: AtomicU32::new(first_chunk.0),
            free_stack: Mutex::new(Vec::new()),
            seq: AtomicU64::new(0),
            alloc_lock: Mutex::new(()),
        }
    }

    #[inline]
    pub(crate) fn first_chunk(&self) -> ChunkId {
        self.first_chunk
    }

    #[inline]
    pub(crate) fn current_chunk(&self) -> ChunkId {
        ChunkId(self.current_chunk.load(Ordering::Acquire))
    }

    fn pop_free(&self) -> Option<RawId> {
        self.free_stack.lock().pop()
    }

    pub(crate) fn push_free(&self, id: RawId) {
        self.free_stack.lock().push(id);
    }

    /// `tenant.nextId()`. `current_fill` is a callback returning the current
    /// chunk's atomic fill counter; `grow` is called (under the tenant's
    /// write-lock escalation) to install a new current chunk when the
    /// present one is full, returning the new chunk's id.
    pub(crate) fn next_id(
        &self,
        schema: &IdSchema,
        fill_of: impl Fn(ChunkId) -> *const AtomicU32,
        grow: impl FnOnce(ChunkId) -> Result<ChunkId>,
    ) -> Result<RawId> {
        if let Some(id) = self.pop_free() {
            return Ok(id);
        }

        loop {
            let stamp0 = self.seq.load(Ordering::Acquire);
            if stamp0 & 1 == 1 {
                std::hint::spin_loop();
                continue;
            }

            let chunk_id = ChunkId(self.current_chunk.load(Ordering::Acquire));
            // SAFETY: the returned pointer outlives this call; the chunk
            // table never removes entries once installed.
            let fill = unsafe { &*fill_of(chunk_id) };
            let slot = fill.fetch_add(1, Ordering::AcqRel);

            if slot < schema.chunk_capacity() {
                // Optimistic validate: if nobody migrated `current_chunk`
                // while we were reading it, this allocation is final.
                return Ok(schema.pack(chunk_id, SlotId(slot)));
            }

            // Overflow: undo and escalate to the write path.
            fill.fetch_sub(1, Ordering::AcqRel);
            let _guard = self.alloc_lock.lock();

            if self.current_chunk.load(Ordering::Acquire) != chunk_id.0 {
                // Another thread already installed a new chunk.
                continue;
            }

            self.seq.fetch_add(1, Ordering::AcqRel); // begin write (odd)
            let new_chunk = grow(chunk_id)?;
            self.current_chunk.store(new_chunk.0, Ordering::Release);
            self.seq.fetch_add(1, Ordering::AcqRel); // end write (even)
            // Loop back and allocate from the new current chunk.
        }
    }

    /// Whether `chunk_id` is this tenant's present allocation frontier.
    pub(crate) fn is_current(&self, chunk_id: ChunkId) -> bool {
        self.current_chunk.load(Ordering::Acquire) == chunk_id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32 as StdAtomicU32;

    #[test]
    fn reuses_freed_ids_before_advancing() {
        let tenant = Tenant::new(ChunkId(0), Vec::new());
        tenant.push_free(7);
        let schema = IdSchema::default_schema();
        let counter = StdAtomicU32::new(0);
        let id = tenant
            .next_id(&schema, |_| &counter as *const _, |_| Ok(ChunkId(1)))
            .unwrap();
        assert_eq!(id, 7);
    }

    #[test]
    fn pool_full_is_surfaced_from_grow_callback() {
        let tenant = Tenant::new(ChunkId(0), Vec::new());
        let schema = IdSchema::new(2, 1); // capacity 4, tiny for the test
        let counter = StdAtomicU32::new(4); // already full
        let result = tenant.next_id(&schema, |_| &counter as *const _, |_| Err(EcsError::PoolFull));
        assert_eq!(result, Err(EcsError::PoolFull));
    }
}
