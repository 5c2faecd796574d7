//! Construction of key arrays.
//!
//! Role
//! - Gather a name, a subscript source and trailing values into a new [`KeyArray`].
//! - Fill blocks sequentially, growing them on the fly when the size estimate falls short.
//!
//! Storage
//! - [`KeyBuilder::build`] first fills a stack scratch block (`stackalloc`) and commits it to
//!   the heap once the final size is known, so the common case pays for one exact allocation.
//! - [`KeyBuilder::build_in`] does the same with a caller-supplied scratch slice.
//! - [`KeyBuilder::build_on_heap`] skips the scratch step.
//!
//! All three produce identical key arrays.
use std::borrow::Cow;

use log::trace;

use crate::{
    config::AllocPolicy,
    error::{KeyError, KeyResult},
    key::KeyArray,
    layout::{Block, Header, KeyBlock, KeyMode, table_len},
    value::Value,
};

const CONSTRUCT: &str = "generate key array";

/// Where the subscripts of a new key come from.
#[derive(Debug, Clone, Copy)]
pub enum Source<'a> {
    /// No subscripts besides the trailing ones.
    None,
    /// Values passed one by one; each is its own argument position.
    List(&'a [Value<'a>]),
    /// A single sequence argument; errors report the element index.
    Sequence(&'a [Value<'a>]),
    /// The subscripts of an existing key, up to its depth.
    Key(&'a KeyArray),
}

impl Source<'_> {
    fn len(&self) -> usize {
        match self {
            Source::None => 0,
            Source::List(values) | Source::Sequence(values) => values.len(),
            Source::Key(key) => key.depth(),
        }
    }
}

/// Builder for a new [`KeyArray`].
///
/// ```
/// use keyarray::{KeyBuilder, Source, Value};
///
/// let key = KeyBuilder::new("^person")
///     .source(Source::Sequence(&["Smith".into(), 42.into()]))
///     .trailing(&[Value::from("age")])
///     .build()
///     .unwrap();
/// assert_eq!(key.depth(), 3);
/// assert_eq!(key.to_string(), r#"^person("Smith",42,"age")"#);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct KeyBuilder<'a> {
    name: Value<'a>,
    source: Source<'a>,
    trailing: &'a [Value<'a>],
    policy: AllocPolicy,
}

impl<'a> KeyBuilder<'a> {
    /// Start a key named `name`.
    pub fn new(name: impl Into<Value<'a>>) -> Self {
        Self {
            name: name.into(),
            source: Source::None,
            trailing: &[],
            policy: AllocPolicy::default(),
        }
    }

    /// Set the subscript source.
    pub fn source(mut self, source: Source<'a>) -> Self {
        self.source = source;
        self
    }

    /// Set the values appended after the source.
    pub fn trailing(mut self, trailing: &'a [Value<'a>]) -> Self {
        self.trailing = trailing;
        self
    }

    /// Use `policy` for this key and everything grown from it.
    pub fn policy(mut self, policy: AllocPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build using a stack scratch block for the first attempt.
    pub fn build(self) -> KeyResult<KeyArray> {
        let depth = self.check()?;
        let size = table_len(self.policy.depth_alloc_for(depth)) + self.policy.scratch_subsdata_len;
        stackalloc::stackalloc(size, 0u8, |scratch: &mut [u8]| self.fill_in(scratch, depth))
    }

    /// Build using `scratch` for the first attempt.
    ///
    /// A scratch slice too small for the slot table is ignored.
    pub fn build_in(self, scratch: &mut [u8]) -> KeyResult<KeyArray> {
        let depth = self.check()?;
        self.fill_in(scratch, depth)
    }

    /// Build directly into a heap block.
    pub fn build_on_heap(self) -> KeyResult<KeyArray> {
        let depth = self.check()?;
        Ok(self.fill_on_heap(depth))
    }

    /// Validate the name, the depth and every item type before anything is copied.
    fn check(&self) -> KeyResult<usize> {
        self.policy.validate()?;
        if !self.name.is_string() {
            return Err(KeyError::TypeError {
                operation: CONSTRUCT,
                position: 1,
                index: None,
                found: self.name.type_name(),
            });
        }
        self.name.check(CONSTRUCT, 1, None)?;
        let depth = self.source.len() + self.trailing.len();
        if depth > self.policy.max_depth {
            return Err(KeyError::DepthExceeded {
                operation: CONSTRUCT,
                max: self.policy.max_depth,
                requested: depth,
            });
        }
        let mut checked = Ok(());
        self.for_each_item(|position, index, value| {
            if checked.is_ok() {
                checked = value.check(CONSTRUCT, position, index);
            }
        });
        checked.map(|()| depth)
    }

    /// Visit every host value with its argument position and sequence index.
    ///
    /// Key sources are not visited: their subscripts are already byte-strings.
    fn for_each_item(&self, mut f: impl FnMut(usize, Option<usize>, &Value<'a>)) {
        let mut position = 2;
        match self.source {
            Source::None | Source::Key(_) => {}
            Source::List(values) => {
                for value in values {
                    f(position, None, value);
                    position += 1;
                }
            }
            Source::Sequence(values) => {
                for (i, value) in values.iter().enumerate() {
                    f(position, Some(i + 1), value);
                }
            }
        }
        if matches!(self.source, Source::Sequence(_) | Source::Key(_)) {
            position = 3;
        }
        for value in self.trailing {
            f(position, None, value);
            position += 1;
        }
    }

    fn fill_in(self, scratch: &mut [u8], depth: usize) -> KeyResult<KeyArray> {
        let depth_alloc = self.policy.depth_alloc_for(depth);
        let table = table_len(depth_alloc);
        if scratch.len() <= table {
            return Ok(self.fill_on_heap(depth));
        }
        // Caller scratch may hold anything; only the slot table has to start clean.
        scratch[..table].fill(0);
        let header = Header {
            depth: 0,
            depth_alloc,
            subsdata_alloc: scratch.len() - table,
            mode: KeyMode::Growable,
        };
        let block = Block {
            header,
            policy: self.policy,
            bytes: scratch,
        };
        Ok(KeyArray::from_block(self.fill(Target::Scratch(block), depth).commit()))
    }

    fn fill_on_heap(self, depth: usize) -> KeyArray {
        let mut estimate = self.name.known_len().unwrap_or_default();
        self.for_each_item(|_, _, value| {
            estimate += value
                .known_len()
                .unwrap_or(self.policy.typical_subscript_len);
        });
        if let Source::Key(key) = self.source {
            let block = key.block();
            estimate += block.used_len(key.depth()) - block.slot(0).len_used as usize;
        }
        let header = Header {
            depth: 0,
            depth_alloc: self.policy.depth_alloc_for(depth),
            subsdata_alloc: self.policy.subsdata_alloc_for(estimate),
            mode: KeyMode::Growable,
        };
        let block = Block {
            header,
            policy: self.policy,
            bytes: vec![0u8; header.block_len()].into_boxed_slice(),
        };
        KeyArray::from_block(self.fill(Target::Owned(block), depth).commit())
    }

    fn fill<'s>(&self, target: Target<'s>, depth: usize) -> Filler<'s> {
        let mut filler = Filler::new(target, 0, depth);
        let name = self.name.to_bytes().unwrap_or_default();
        filler.push(&name, depth);

        let mut remaining = depth;
        if let Source::Key(key) = self.source {
            let block = key.block();
            for index in 1..=key.depth() {
                remaining -= 1;
                filler.push(block.slot_bytes(index), remaining);
            }
        }
        self.for_each_item(|_, _, value| {
            remaining -= 1;
            let bytes: Cow<'_, [u8]> = value.to_bytes().unwrap_or_default();
            filler.push(&bytes, remaining);
        });
        filler
    }
}

/// Block being filled.
pub(crate) enum Target<'s> {
    /// Borrowed scratch memory; must be committed to the heap when done.
    Scratch(Block<&'s mut [u8]>),
    /// An existing heap block with unclaimed slots after `depth`.
    InPlace(&'s mut KeyBlock),
    /// A heap block owned by the filler.
    Owned(KeyBlock),
}

macro_rules! with_target {
    ($target:expr, $block:ident => $body:expr) => {
        match $target {
            Target::Scratch($block) => $body,
            Target::InPlace($block) => $body,
            Target::Owned($block) => $body,
        }
    };
}

/// Sequential writer shared by construction and append.
///
/// Slots are written one after the other, tightly packed. When the arena cannot hold the next
/// item, the filled prefix moves to a larger heap block and filling continues there.
pub(crate) struct Filler<'s> {
    target: Target<'s>,
    /// Next slot to write (0 is the name).
    next_slot: usize,
    /// Arena bytes written so far.
    subslen: usize,
    /// Depth the filler was sized for.
    depth_target: usize,
}

impl<'s> Filler<'s> {
    /// Start writing at slot `first_slot`, right after the content of the slot before it.
    pub(crate) fn new(target: Target<'s>, first_slot: usize, depth_target: usize) -> Self {
        let subslen = match first_slot {
            0 => 0,
            n => with_target!(&target, b => b.used_len(n - 1)),
        };
        Self {
            target,
            next_slot: first_slot,
            subslen,
            depth_target,
        }
    }

    /// Write `content` into the next slot; `remaining` items will follow it.
    pub(crate) fn push(&mut self, content: &[u8], remaining: usize) {
        let subsdata_alloc = with_target!(&self.target, b => b.header.subsdata_alloc);
        if self.subslen + content.len() > subsdata_alloc {
            let keep_depth = self.next_slot.saturating_sub(1);
            let typical = with_target!(&self.target, b => b.policy.typical_subscript_len);
            let subslen_target = self.subslen + content.len() + remaining * typical;
            trace!(
                "key array arena full at slot {} ({} + {} > {} bytes)",
                self.next_slot,
                self.subslen,
                content.len(),
                subsdata_alloc
            );
            let grown =
                with_target!(&self.target, b => b.regrow(keep_depth, self.depth_target, subslen_target));
            self.target = Target::Owned(grown);
        }
        let (slot, offset) = (self.next_slot, self.subslen);
        with_target!(&mut self.target, b => b.write_slot(slot, offset, content));
        self.next_slot += 1;
        self.subslen += content.len();
    }

    /// Number of subscripts written so far.
    fn depth(&self) -> usize {
        self.next_slot.saturating_sub(1)
    }

    /// Finish filling.
    ///
    /// Returns `None` when everything fit in the in-place block, in which case its depth now
    /// covers the new slots. Otherwise returns the heap block holding the result.
    pub(crate) fn finish(self) -> Option<KeyBlock> {
        let depth = self.depth();
        match self.target {
            Target::InPlace(block) => {
                block.header.depth = depth;
                None
            }
            Target::Owned(mut block) => {
                block.header.depth = depth;
                Some(block)
            }
            Target::Scratch(mut block) => {
                block.header.depth = depth;
                // Exact size plus slack; the scratch memory dies with the caller's frame.
                Some(block.regrow(depth, depth, self.subslen))
            }
        }
    }

    /// Finish a filler that never writes in place.
    pub(crate) fn commit(self) -> KeyBlock {
        match self.finish() {
            Some(block) => block,
            None => unreachable!("construction never fills in place"),
        }
    }
}
