//! `IdSchema` — the bit layout that packs a `(chunk-id, slot-id)` pair into a
//! single 32-bit entity id.
//!
//! This is a pure value object computed once from a chunk-bit width `S`: it
//! owns no state beyond the derived masks/shifts and has no failure modes.
//! The top bits beyond the chunk-id width are reserved; this crate assigns no
//! meaning to them (see the open-questions entry in `DESIGN.md`).

/// Raw packed entity identifier: `chunk-id << S | slot-id`.
pub type RawId = u32;

/// Dense chunk identifier, unique within one [`crate::pool::ChunkedPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkId(pub u32);

impl ChunkId {
    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for ChunkId {
    #[inline]
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Slot index within one chunk, in `[0, chunk_capacity)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(pub u32);

impl SlotId {
    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for SlotId {
    #[inline]
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Bit layout of a packed id: chunk-id occupies the high bits, slot-id the
/// low `chunk_bit` bits.
///
/// Typical configuration: `chunk_bit = 14` (chunk capacity 16384),
/// `chunk_id_bits = 16` (up to 65536 chunks per tenant) — the "typical
/// configuration" named in the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdSchema {
    chunk_bit: u32,
    chunk_id_bits: u32,
    slot_mask: u32,
}

impl IdSchema {
    /// `chunk_bit` is the width `S` of the slot-id field; `chunk_id_bits` is
    /// the width `C` of the chunk-id field. `S + C` must not exceed 32.
    pub const fn new(chunk_bit: u32, chunk_id_bits: u32) -> Self {
        assert!(chunk_bit > 0 && chunk_bit + chunk_id_bits <= 32);
        let slot_mask = if chunk_bit == 32 { u32::MAX } else { (1u32 << chunk_bit) - 1 };
        Self { chunk_bit, chunk_id_bits, slot_mask }
    }

    /// S=14, C=16: the "typical configuration" spec.md's data model names.
    pub const fn default_schema() -> Self {
        Self::new(14, 16)
    }

    /// Number of slots in one chunk (`2^S`).
    #[inline]
    pub const fn chunk_capacity(&self) -> u32 {
        1u32 << self.chunk_bit
    }

    /// Number of distinct chunk ids addressable by this schema (`2^C`).
    #[inline]
    pub const fn max_chunks(&self) -> u32 {
        if self.chunk_id_bits == 32 { u32::MAX } else { 1u32 << self.chunk_id_bits }
    }

    /// Pack `(chunk, slot)` into a raw 32-bit id.
    #[inline]
    pub const fn pack(&self, chunk: ChunkId, slot: SlotId) -> RawId {
        (chunk.0 << self.chunk_bit) | (slot.0 & self.slot_mask)
    }

    /// Unpack a raw id into `(chunk, slot)`.
    #[inline]
    pub const fn unpack(&self, id: RawId) -> (ChunkId, SlotId) {
        let slot = id & self.slot_mask;
        let chunk = id >> self.chunk_bit;
        (ChunkId(chunk), SlotId(slot))
    }
}

impl Default for IdSchema {
    fn default() -> Self {
        Self::default_schema()
    }
}
