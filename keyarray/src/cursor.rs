//! Iteration over sibling keys through a single mutable key array.
use crate::{
    build::{KeyBuilder, Source},
    error::KeyResult,
    key::KeyArray,
    value::Value,
};

/// Streams `parent(s)` for successive sibling subscripts `s` through one allocation.
///
/// The first [`seek`](SiblingCursor::seek) builds a mutable key one level below the parent; every
/// later call substitutes its last subscript in place. Keys borrowed from the cursor are only
/// valid until the next seek; use [`snapshot`](SiblingCursor::snapshot) to keep one.
///
/// ```
/// use keyarray::{KeyArray, SiblingCursor, Source};
///
/// let parent = KeyArray::construct("^x", Source::List(&["a".into()]), &[]).unwrap();
/// let mut cursor = SiblingCursor::new(&parent);
/// let mut seen = Vec::new();
/// for sub in ["1", "2", "three"] {
///     seen.push(cursor.seek(sub).unwrap().to_string());
/// }
/// assert_eq!(seen, [r#"^x("a",1)"#, r#"^x("a",2)"#, r#"^x("a","three")"#]);
/// ```
#[derive(Debug)]
pub struct SiblingCursor {
    parent: KeyArray,
    current: Option<KeyArray>,
}

impl SiblingCursor {
    /// Cursor over the children of `parent`.
    pub fn new(parent: &KeyArray) -> Self {
        Self {
            parent: parent.clone(),
            current: None,
        }
    }

    /// Parent key the siblings hang from.
    pub fn parent(&self) -> &KeyArray {
        &self.parent
    }

    /// Move to sibling `subscript`.
    pub fn seek<'v>(&mut self, subscript: impl Into<Value<'v>>) -> KeyResult<&KeyArray> {
        let subscript = subscript.into();
        let key = match self.current.take() {
            Some(mut key) => {
                if let Err(err) = key.substitute(subscript) {
                    self.current = Some(key);
                    return Err(err);
                }
                key
            }
            None => {
                let name = self.parent.name().to_vec();
                let trailing = [subscript];
                KeyBuilder::new(name.as_slice())
                    .source(Source::Key(&self.parent))
                    .trailing(&trailing)
                    .policy(*self.parent.block().policy())
                    .build()?
                    .into_mutable()
            }
        };
        Ok(self.current.insert(key))
    }

    /// Key at the current position, if any.
    pub fn current(&self) -> Option<&KeyArray> {
        self.current.as_ref()
    }

    /// Growable copy of the current key that outlives later seeks.
    pub fn snapshot(&self) -> KeyResult<Option<KeyArray>> {
        self.current
            .as_ref()
            .map(|key| {
                let name = key.name().to_vec();
                KeyBuilder::new(name.as_slice())
                    .source(Source::Key(key))
                    .policy(*key.block().policy())
                    .build()
            })
            .transpose()
    }
}
