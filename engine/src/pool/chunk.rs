//! `Chunk` — a fixed-capacity block of item slots plus one parallel column
//! per component type, per spec.md §3.
//!
//! The chunk-linking and "becomes full once a successor exists" behavior is
//! modeled with plain ids rather than shared mutable references, per the
//! design notes' re-architecting guidance (§9: "Model chunks as arena-owned
//! nodes indexed by chunk-id; links are stored as chunk-ids, not pointers").

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crossbeam::utils::CachePadded;
use fixedbitset::FixedBitSet;
use parking_lot::RwLock;

use crate::component::ClassInfo;
use crate::id::{ChunkId, SlotId};
use crate::pool::column::Column;

/// Sentinel stored in `next` meaning "no successor chunk yet".
const NO_NEXT: u32 = u32::MAX;

/// A fixed-capacity block of slots, holding item references (generic `Item`,
/// e.g. an entity handle) and, for chunks that belong to a composition's root
/// tenant, one [`Column`] per component type.
pub(crate) struct Chunk<Item> {
    id: ChunkId,
    capacity: u32,
    /// Monotonic fill count / next free slot for this chunk. Only the
    /// tenant that owns this chunk increments it (during allocation) or
    /// decrements it (freeing the chunk's own frontier slot).
    index: CachePadded<AtomicU32>,
    prev: Option<ChunkId>,
    next: AtomicU32,
    size_offset: AtomicBool,
    items: Box<[RwLock<Option<Item>>]>,
    /// Per-slot enabled flag, checked during query chunk scans (spec.md
    /// §4.8: "disabled entities are skipped at the chunk-scan level").
    enabled: RwLock<FixedBitSet>,
    columns: Vec<Column>,
}

impl<Item> Chunk<Item> {
    pub(crate) fn new(id: ChunkId, capacity: u32, prev: Option<ChunkId>, component_info: &[ClassInfo]) -> Self {
        let cap = capacity as usize;
        let items = (0..cap).map(|_| RwLock::new(None)).collect::<Vec<_>>().into_boxed_slice();
        let mut enabled = FixedBitSet::with_capacity(cap);
        enabled.insert_range(..);
        let columns = component_info.iter().map(|info| Column::new(*info, cap)).collect();
        Self {
            id,
            capacity,
            index: CachePadded::new(AtomicU32::new(0)),
            prev,
            next: AtomicU32::new(NO_NEXT),
            size_offset: AtomicBool::new(false),
            items,
            enabled: RwLock::new(enabled),
            columns,
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> ChunkId {
        self.id
    }

    #[inline]
    pub(crate) fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    pub(crate) fn prev(&self) -> Option<ChunkId> {
        self.prev
    }

    #[inline]
    pub(crate) fn next(&self) -> Option<ChunkId> {
        let n = self.next.load(Ordering::Acquire);
        if n == NO_NEXT { None } else { Some(ChunkId(n)) }
    }

    pub(crate) fn link_next(&self, next: ChunkId) {
        self.next.store(next.0, Ordering::Release);
        self.size_offset.store(true, Ordering::Release);
    }

    /// Logical size of the chunk: once a successor exists the chunk reports
    /// itself as permanently full, even if later frees shrink `index`
    /// locally (spec.md §3: "`sizeOffset`... so that this chunk's logical
    /// size reports 'full' even while allocation moved on").
    #[inline]
    pub(crate) fn logical_size(&self) -> u32 {
        if self.size_offset.load(Ordering::Acquire) {
            self.capacity
        } else {
            self.index.load(Ordering::Acquire)
        }
    }

    /// Raw fill index (next free slot / current occupied count), independent
    /// of `sizeOffset`. Used by the allocation and compaction protocols.
    #[inline]
    pub(crate) fn raw_index(&self) -> &AtomicU32 {
        &self.index
    }

    pub(crate) fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub(crate) fn column(&self, i: usize) -> &Column {
        &self.columns[i]
    }

    pub(crate) fn get_item(&self, slot: SlotId) -> Option<Item>
    where
        Item: Clone,
    {
        self.items[slot.index()].read().clone()
    }

    pub(crate) fn set_item(&self, slot: SlotId, item: Option<Item>) {
        *self.items[slot.index()].write() = item;
    }

    pub(crate) fn take_item(&self, slot: SlotId) -> Option<Item> {
        self.items[slot.index()].write().take()
    }

    pub(crate) fn is_enabled(&self, slot: SlotId) -> bool {
        self.enabled.read()[slot.index()]
    }

    pub(crate) fn set_enabled(&self, slot: SlotId, value: bool) {
        self.enabled.write().set(slot.index(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chunk_has_no_successor_and_zero_fill() {
        let chunk: Chunk<u32> = Chunk::new(ChunkId(0), 4, None, &[]);
        assert_eq!(chunk.next(), None);
        assert_eq!(chunk.logical_size(), 0);
    }

    #[test]
    fn linking_a_successor_freezes_logical_size_full() {
        let chunk: Chunk<u32> = Chunk::new(ChunkId(0), 4, None, &[]);
        chunk.raw_index().store(2, Ordering::SeqCst);
        chunk.link_next(ChunkId(1));
        assert_eq!(chunk.logical_size(), chunk.capacity());
        assert_eq!(chunk.next(), Some(ChunkId(1)));
    }

    #[test]
    fn item_slot_round_trip() {
        let chunk: Chunk<&'static str> = Chunk::new(ChunkId(0), 4, None, &[]);
        chunk.set_item(SlotId(0), Some("a"));
        assert_eq!(chunk.get_item(SlotId(0)), Some("a"));
        assert_eq!(chunk.take_item(SlotId(0)), Some("a"));
        assert_eq!(chunk.get_item(SlotId(0)), None);
    }

    #[test]
    fn slots_start_enabled() {
        let chunk: Chunk<u32> = Chunk::new(ChunkId(0), 4, None, &[]);
        assert!(chunk.is_enabled(SlotId(0)));
        chunk.set_enabled(SlotId(0), false);
        assert!(!chunk.is_enabled(SlotId(0)));
    }
}
