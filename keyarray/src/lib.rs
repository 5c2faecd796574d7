//! Keyarray: cached subscript arrays for hierarchical key-value stores.
//!
//! A key such as `^person("Smith",42)` is a name plus an ordered list of byte-string
//! subscripts. Stores take keys as an array of buffer descriptors; rebuilding that array on
//! every access dominates traversal-heavy workloads. A [`KeyArray`] keeps the descriptors and
//! the bytes they point to in one block and reuses it:
//! - construction reserves slack so that child keys can usually be appended in place;
//! - a child appended in place shares its parent's block, and the parent never sees the extra
//!   subscript because each handle carries its own depth;
//! - when in-place growth could clobber another key, the block is copied instead;
//! - a mutable key has no slack and lets iteration substitute its last subscript without
//!   allocating.
//!
//! Example
//! ```
//! use keyarray::{KeyArray, KeyMode, Source, Value};
//!
//! let parent = KeyArray::construct("^person", Source::List(&["Smith".into()]), &[]).unwrap();
//! let child = parent.append(&[Value::from(42)]).unwrap();
//! assert!(child.shares_block(&parent));
//! assert_eq!(parent.to_string(), r#"^person("Smith")"#);
//! assert_eq!(child.to_string(), r#"^person("Smith",42)"#);
//!
//! // The next slot is claimed by `child`: a second child of `parent` is a copy.
//! let other = parent.append(&["age".into()]).unwrap();
//! assert!(!other.shares_block(&parent));
//!
//! let mut it = child.clone().into_mutable();
//! assert_eq!(it.mode(), KeyMode::Mutable);
//! it.substitute(43).unwrap();
//! assert_eq!(it.render(None).unwrap().text, r#""Smith",43"#);
//! ```

/// Key construction: sources and the builder.
pub mod build;
/// Allocation policy and store limits.
pub mod config;
/// Sibling iteration through a mutable key.
pub mod cursor;
/// Error type.
pub mod error;
/// Key array handles.
pub mod key;
/// Block layout: header, slot table and arena.
pub mod layout;
/// Text rendering.
pub mod render;
/// Host values.
pub mod value;

pub use build::{KeyBuilder, Source};
pub use config::{AllocPolicy, MAX_SUBSCRIPT_DEPTH};
pub use cursor::SiblingCursor;
pub use error::{KeyError, KeyResult};
pub use key::{KeyArray, RawBuffer, RawKey};
pub use layout::{Header, KeyMode};
pub use render::Rendered;
pub use value::Value;
