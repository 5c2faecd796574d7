//! Key array handles.
//!
//! A [`KeyArray`] is a view of the first `depth` subscripts of a shared block. Appending to a
//! key whose block has an unclaimed slot right after its depth writes into that slot and returns
//! a deeper view of the same block; the original handle keeps its depth and never observes the
//! new subscript. Any other growth copies.
use std::{
    cell::{Ref, RefCell},
    fmt,
    marker::PhantomData,
    rc::Rc,
};

use log::trace;
use smallvec::SmallVec;

use crate::{
    build::{Filler, KeyBuilder, Source, Target},
    error::{KeyError, KeyResult},
    layout::{Header, KeyBlock, KeyMode},
    render::Rendered,
    value::Value,
};

const APPEND: &str = "append to key array";
const SUBSTITUTE: &str = "substitute key array subscript";

/// Cached name and subscripts of a hierarchical key.
///
/// Cloning is cheap and shares the block; growth through either clone never disturbs the other.
#[derive(Clone)]
pub struct KeyArray {
    block: Rc<RefCell<KeyBlock>>,
    depth: usize,
}

impl KeyArray {
    /// Build `name(source..., trailing...)` with the default policy.
    ///
    /// Shortcut for [`KeyBuilder`].
    pub fn construct<'a>(
        name: impl Into<Value<'a>>,
        source: Source<'a>,
        trailing: &'a [Value<'a>],
    ) -> KeyResult<Self> {
        KeyBuilder::new(name).source(source).trailing(trailing).build()
    }

    /// Construct, then enter mutable mode.
    pub fn create_mutable<'a>(
        name: impl Into<Value<'a>>,
        source: Source<'a>,
        trailing: &'a [Value<'a>],
    ) -> KeyResult<Self> {
        Ok(Self::construct(name, source, trailing)?.into_mutable())
    }

    pub(crate) fn from_block(block: KeyBlock) -> Self {
        let depth = block.header.depth;
        Self {
            block: Rc::new(RefCell::new(block)),
            depth,
        }
    }

    pub(crate) fn block(&self) -> Ref<'_, KeyBlock> {
        self.block.borrow()
    }

    /// Number of subscripts, not counting the name.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Header of the underlying block.
    ///
    /// The block depth may exceed [`KeyArray::depth`] when a deeper key shares the block.
    pub fn header(&self) -> Header {
        self.block().header
    }

    /// Growth discipline of this key.
    pub fn mode(&self) -> KeyMode {
        self.block().header.mode
    }

    /// Name bytes.
    pub fn name(&self) -> Ref<'_, [u8]> {
        Ref::map(self.block(), |b| b.slot_bytes(0))
    }

    /// Subscript `index` (0-based), if within depth.
    pub fn subscript(&self, index: usize) -> Option<Ref<'_, [u8]>> {
        (index < self.depth).then(|| Ref::map(self.block(), |b| b.slot_bytes(index + 1)))
    }

    /// Owned copies of all subscripts, in order.
    pub fn subscripts(&self) -> Vec<Vec<u8>> {
        let block = self.block();
        (1..=self.depth).map(|i| block.slot_bytes(i).to_vec()).collect()
    }

    /// Whether `self` and `other` share a block.
    pub fn shares_block(&self, other: &KeyArray) -> bool {
        Rc::ptr_eq(&self.block, &other.block)
    }

    /// Return a key with `additions` after the current subscripts.
    ///
    /// `self` is left untouched whatever happens: its depth does not change and, on error, no
    /// slot is claimed.
    pub fn append(&self, additions: &[Value<'_>]) -> KeyResult<KeyArray> {
        let depth = self.depth;
        let depth2 = depth + additions.len();
        let max = self.block().policy.max_depth;
        if depth2 > max {
            return Err(KeyError::DepthExceeded {
                operation: APPEND,
                max,
                requested: depth2,
            });
        }
        for (i, value) in additions.iter().enumerate() {
            value.check(APPEND, i + 2, None)?;
        }

        if let Some(mut block) = self.claim_next_slots(additions.len()) {
            let filler = Filler::new(Target::InPlace(&mut *block), depth + 1, depth2);
            return Ok(match fill(filler, additions) {
                None => {
                    drop(block);
                    KeyArray {
                        block: Rc::clone(&self.block),
                        depth: depth2,
                    }
                }
                Some(grown) => KeyArray::from_block(grown),
            });
        }

        let grown = {
            let block = self.block();
            let subslen = block.used_len(depth)
                + additions.len() * block.policy.typical_subscript_len;
            trace!(
                "copy-on-grow key array: depth {} -> {} (block depth {}, slots {}, {:?})",
                depth,
                depth2,
                block.header.depth,
                block.header.depth_alloc,
                block.header.mode
            );
            block.regrow(depth, depth2, subslen)
        };
        let filler = Filler::new(Target::Owned(grown), depth + 1, depth2);
        Ok(KeyArray::from_block(fill(filler, additions).unwrap_or_else(
            || unreachable!("owned fillers always return their block"),
        )))
    }

    /// Mutable access to the block when `additions` new slots may be written in place.
    ///
    /// Requires a growable block with enough slot slack whose next slot is not already claimed
    /// by a deeper key, and no outstanding borrow.
    fn claim_next_slots(&self, additions: usize) -> Option<std::cell::RefMut<'_, KeyBlock>> {
        let block = self.block.try_borrow_mut().ok()?;
        let header = block.header;
        let fits = header.mode.is_growable()
            && header.depth == self.depth
            && header.depth_alloc >= self.depth + additions;
        fits.then_some(block)
    }

    /// Enter mutable mode: no slot slack, so that deeper keys always copy.
    ///
    /// Compacts in place when this handle is the only one and covers the whole block, copies
    /// otherwise.
    pub fn into_mutable(self) -> KeyArray {
        let compacted = Rc::strong_count(&self.block) == 1
            && self.header().depth == self.depth
            && match self.block.try_borrow_mut() {
                Ok(mut block) => {
                    block.make_mutable();
                    true
                }
                Err(_) => false,
            };
        if compacted {
            return self;
        }
        let mut copy = {
            let block = self.block();
            block.regrow(self.depth, self.depth, block.used_len(self.depth))
        };
        copy.make_mutable();
        KeyArray::from_block(copy)
    }

    /// Overwrite the last subscript of a mutable key with `value`.
    ///
    /// Writes in place when the new content fits the arena and no other handle shares the
    /// block; otherwise moves to a new mutable block. The depth never changes.
    pub fn substitute<'v>(&mut self, value: impl Into<Value<'v>>) -> KeyResult<()> {
        let value = value.into();
        let depth = self.depth;
        if depth == 0 {
            return Err(KeyError::EmptyKey {
                operation: SUBSTITUTE,
            });
        }
        let header = self.header();
        if !header.mode.is_mutable() || header.depth_alloc != depth || header.depth != depth {
            return Err(KeyError::NotMutable {
                operation: SUBSTITUTE,
                depth,
                depth_alloc: header.depth_alloc,
            });
        }
        value.check(SUBSTITUTE, 2, None)?;
        let content = value.to_bytes().unwrap_or_default();

        let start = self.block().slot(depth).offset as usize;
        let fits = start + content.len() <= header.subsdata_alloc;
        if fits && Rc::strong_count(&self.block) == 1 {
            if let Ok(mut block) = self.block.try_borrow_mut() {
                block.write_slot(depth, start, &content);
                return Ok(());
            }
        }

        let mut moved = self.block().regrow(depth - 1, depth, start + content.len());
        moved.write_slot(depth, start, &content);
        moved.header.depth = depth;
        moved.make_mutable();
        *self = KeyArray::from_block(moved);
        Ok(())
    }

    /// Render the first `depth` subscripts (all when `None`).
    pub fn render(&self, depth: Option<i64>) -> KeyResult<Rendered> {
        crate::render::render(self, depth)
    }

    /// Descriptors with absolute addresses, for native store calls.
    pub fn raw(&self) -> RawKey<'_> {
        let block = self.block();
        let base = block.bytes.as_ptr();
        let arena = block.header.arena_base();
        let buffers = (0..=self.depth)
            .map(|i| {
                let slot = block.slot(i);
                RawBuffer {
                    len_alloc: slot.len_alloc,
                    len_used: slot.len_used,
                    buf_addr: base.wrapping_add(arena + slot.offset as usize),
                }
            })
            .collect();
        RawKey {
            buffers,
            _key: PhantomData,
        }
    }
}

/// Fill `additions` into `filler`, in order.
fn fill(mut filler: Filler<'_>, additions: &[Value<'_>]) -> Option<KeyBlock> {
    for (i, value) in additions.iter().enumerate() {
        let content = value.to_bytes().unwrap_or_default();
        filler.push(&content, additions.len() - i - 1);
    }
    filler.finish()
}

/// Store-facing buffer descriptor.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawBuffer {
    /// Bytes reserved at `buf_addr`.
    pub len_alloc: u32,
    /// Bytes of content at `buf_addr`.
    pub len_used: u32,
    /// Content address.
    pub buf_addr: *const u8,
}

/// Absolute-address view of a key, borrowed from its [`KeyArray`].
///
/// Addresses are only valid until the next append or substitution through any handle sharing
/// this key's block: those take a fresh mutable borrow of the whole block. Take a new view
/// after growing.
#[derive(Debug)]
pub struct RawKey<'a> {
    buffers: SmallVec<RawBuffer, 8>,
    _key: PhantomData<&'a KeyArray>,
}

impl RawKey<'_> {
    /// Name descriptor.
    pub fn varname(&self) -> &RawBuffer {
        &self.buffers[0]
    }

    /// Subscript descriptors, contiguous, in order.
    pub fn subsarray(&self) -> &[RawBuffer] {
        &self.buffers[1..]
    }

    /// Number of subscripts.
    pub fn depth(&self) -> usize {
        self.buffers.len() - 1
    }
}

impl fmt::Display for KeyArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self.render(None).map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&self.name()))?;
        if !rendered.text.is_empty() {
            write!(f, "({})", rendered.text)?;
        }
        Ok(())
    }
}

impl fmt::Debug for KeyArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.header();
        f.debug_struct("KeyArray")
            .field("key", &format_args!("{self}"))
            .field("depth", &self.depth)
            .field("header", &header)
            .finish()
    }
}
