//! Memory layout of a key array block.
//!
//! A block is a single byte allocation holding two regions:
//!
//! ```text
//! +-------------------------------+---------------------------------+
//! | slot table                    | arena                           |
//! | (depth_alloc + 1) * SLOT_SIZE | subsdata_alloc bytes            |
//! +-------------------------------+---------------------------------+
//! ```
//!
//! Slot 0 describes the name, slots `1..=depth` the subscripts. Each slot is encoded as three
//! little-endian `u32` (offset, bytes used, bytes allocated). Offsets are relative to the arena
//! base, so moving the arena never invalidates a slot; absolute addresses are only produced by
//! [`crate::key::RawKey`] when the key is handed to a native call.
//!
//! The header (depth, capacities, mode) is kept next to the bytes in [`Header`] rather than
//! inside them.
use log::{debug, trace};
use strum::EnumIs;

use crate::config::AllocPolicy;

/// Encoded size of one slot descriptor.
pub const SLOT_SIZE: usize = 12;

/// A slot descriptor, decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Slot {
    /// Offset of the content from the arena base.
    pub offset: u32,
    /// Bytes of content.
    pub len_used: u32,
    /// Bytes reserved at `offset`; informational, forwarded to the store.
    pub len_alloc: u32,
}

impl Slot {
    /// One past the last content byte, relative to the arena base.
    #[inline]
    pub fn end(&self) -> usize {
        self.offset as usize + self.len_used as usize
    }

    fn encode(&self) -> [u8; SLOT_SIZE] {
        let mut out = [0u8; SLOT_SIZE];
        out[0..4].copy_from_slice(&self.offset.to_le_bytes());
        out[4..8].copy_from_slice(&self.len_used.to_le_bytes());
        out[8..12].copy_from_slice(&self.len_alloc.to_le_bytes());
        out
    }

    fn decode(bytes: &[u8]) -> Self {
        let word = |i: usize| {
            let mut w = [0u8; 4];
            w.copy_from_slice(&bytes[i..i + 4]);
            u32::from_le_bytes(w)
        };
        Self {
            offset: word(0),
            len_used: word(4),
            len_alloc: word(8),
        }
    }
}

/// Growth discipline of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs)]
pub enum KeyMode {
    /// Packed with slack; appends may happen in place.
    Growable,
    /// No slot slack; only the last subscript may be substituted, appends always copy.
    Mutable,
}

/// Fixed header of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Subscripts committed to the block, not counting the name.
    pub depth: usize,
    /// Capacity of the slot table, not counting the name slot.
    pub depth_alloc: usize,
    /// Capacity of the arena in bytes.
    pub subsdata_alloc: usize,
    /// Growth discipline.
    pub mode: KeyMode,
}

impl Header {
    /// Size of the slot table, which is also the arena base within the block.
    #[inline]
    pub fn arena_base(&self) -> usize {
        table_len(self.depth_alloc)
    }

    /// Size of the whole block.
    #[inline]
    pub fn block_len(&self) -> usize {
        self.arena_base() + self.subsdata_alloc
    }

    /// Populated slots to trust, bounded by the table size in case `depth` is garbage.
    #[inline]
    fn trusted_depth(&self) -> usize {
        self.depth.min(self.depth_alloc)
    }
}

#[inline]
pub(crate) fn table_len(depth_alloc: usize) -> usize {
    (depth_alloc + 1) * SLOT_SIZE
}

/// Block bytes plus the header describing them.
///
/// `B` is either an owned boxed slice or a borrowed scratch slice supplied by the builder.
#[derive(Debug, Clone)]
pub struct Block<B> {
    pub(crate) header: Header,
    pub(crate) policy: AllocPolicy,
    pub(crate) bytes: B,
}

/// A heap-owned block.
pub type KeyBlock = Block<Box<[u8]>>;

impl<B: AsRef<[u8]>> Block<B> {
    /// Header of this block.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Policy this block grows with.
    pub fn policy(&self) -> &AllocPolicy {
        &self.policy
    }

    /// Decode slot `index` (0 is the name).
    pub fn slot(&self, index: usize) -> Slot {
        debug_assert!(index <= self.header.depth_alloc, "slot index out of table");
        let at = index * SLOT_SIZE;
        Slot::decode(&self.bytes.as_ref()[at..at + SLOT_SIZE])
    }

    /// Content of slot `index`.
    pub fn slot_bytes(&self, index: usize) -> &[u8] {
        let slot = self.slot(index);
        let base = self.header.arena_base();
        &self.bytes.as_ref()[base + slot.offset as usize..base + slot.end()]
    }

    /// Arena bytes used by the name and the first `depth` subscripts.
    pub fn used_len(&self, depth: usize) -> usize {
        self.slot(depth).end()
    }

    /// Copy the name and the first `keep_depth` subscripts into a fresh heap block sized for
    /// `depth_target` subscripts and `subslen_target` arena bytes, plus the policy's slack.
    ///
    /// The copy is always [`KeyMode::Growable`]; callers re-enter mutable mode themselves.
    pub fn regrow(&self, keep_depth: usize, depth_target: usize, subslen_target: usize) -> KeyBlock {
        let keep_depth = keep_depth.min(self.header.depth_alloc);
        let keep_len = self.used_len(keep_depth);
        debug_assert!(keep_depth <= depth_target);
        debug_assert!(keep_len <= subslen_target);

        let header = Header {
            depth: keep_depth,
            depth_alloc: self.policy.depth_alloc_for(depth_target),
            subsdata_alloc: self.policy.subsdata_alloc_for(subslen_target),
            mode: KeyMode::Growable,
        };
        trace!(
            "regrow key block: slots {} -> {}, arena {} -> {} bytes (keeping {} subscripts, {} bytes)",
            self.header.depth_alloc,
            header.depth_alloc,
            self.header.subsdata_alloc,
            header.subsdata_alloc,
            keep_depth,
            keep_len
        );

        let mut bytes = vec![0u8; header.block_len()].into_boxed_slice();
        let src = self.bytes.as_ref();
        let table = table_len(keep_depth);
        bytes[..table].copy_from_slice(&src[..table]);
        let (old_base, new_base) = (self.header.arena_base(), header.arena_base());
        bytes[new_base..new_base + keep_len].copy_from_slice(&src[old_base..old_base + keep_len]);

        let mut block = Block {
            header,
            policy: self.policy,
            bytes,
        };
        block.relocate();
        block
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Block<B> {
    /// Encode `slot` at `index`.
    pub(crate) fn set_slot(&mut self, index: usize, slot: Slot) {
        debug_assert!(index <= self.header.depth_alloc, "slot index out of table");
        let at = index * SLOT_SIZE;
        self.bytes.as_mut()[at..at + SLOT_SIZE].copy_from_slice(&slot.encode());
    }

    /// Store `content` at arena offset `offset` and describe it in slot `index`.
    ///
    /// The caller guarantees `offset + content.len() <= subsdata_alloc`.
    pub(crate) fn write_slot(&mut self, index: usize, offset: usize, content: &[u8]) {
        debug_assert!(offset + content.len() <= self.header.subsdata_alloc);
        debug_assert!(u32::try_from(offset + content.len()).is_ok());
        let base = self.header.arena_base() + offset;
        self.bytes.as_mut()[base..base + content.len()].copy_from_slice(content);
        let len = content.len() as u32;
        self.set_slot(
            index,
            Slot {
                offset: offset as u32,
                len_used: len,
                len_alloc: len,
            },
        );
    }

    /// Rewrite every populated slot offset from the cumulative lengths of its predecessors.
    ///
    /// Only `len_used` fields are read, so the walk is idempotent and does not depend on the
    /// offsets it is replacing.
    pub fn relocate(&mut self) {
        let mut offset = 0u32;
        for index in 0..=self.header.trusted_depth() {
            let mut slot = self.slot(index);
            slot.offset = offset;
            offset += slot.len_used;
            self.set_slot(index, slot);
        }
    }

    /// Drop slot slack so that any further append has to copy.
    ///
    /// The released table bytes are handed to the arena: content is shifted down over them and
    /// `subsdata_alloc` grows by the same amount, so the block length is unchanged.
    pub fn make_mutable(&mut self) {
        let depth = self.header.trusted_depth();
        let removed = (self.header.depth_alloc - depth) * SLOT_SIZE;
        let used = self.used_len(depth);
        let old_base = self.header.arena_base();

        self.header.depth = depth;
        self.header.depth_alloc = depth;
        self.header.subsdata_alloc += removed;
        self.header.mode = KeyMode::Mutable;

        let new_base = self.header.arena_base();
        self.bytes
            .as_mut()
            .copy_within(old_base..old_base + used, new_base);
        self.relocate();
        debug!(
            "key block entered mutable mode: depth {}, arena {} bytes ({} reclaimed)",
            depth, self.header.subsdata_alloc, removed
        );
    }
}
