use strum::EnumIs;
use thiserror::Error;

/// Errors raised by key array operations.
///
/// Every variant is a contract violation by the caller; none of them is transient and no
/// operation retries internally.
#[derive(Debug, Clone, PartialEq, Eq, EnumIs, Error)]
pub enum KeyError {
    /// The requested or resulting depth is beyond the store's subscript cap.
    #[error("Cannot {operation}: maximum {max} number of subscripts exceeded (got {requested})")]
    DepthExceeded {
        operation: &'static str,
        max: usize,
        requested: usize,
    },

    /// An input value cannot be represented as a byte-string.
    #[error(
        "Cannot {operation}: string/number expected in parameter #{position}{} (got {found})",
        .index.map(|i| format!(" at index {i}")).unwrap_or_default()
    )]
    TypeError {
        operation: &'static str,
        position: usize,
        index: Option<usize>,
        found: &'static str,
    },

    /// A name or subscript is longer than a descriptor can describe.
    #[error(
        "Cannot {operation}: parameter #{position}{} is {len} bytes long (maximum {max})",
        .index.map(|i| format!(" at index {i}")).unwrap_or_default()
    )]
    TooLong {
        operation: &'static str,
        position: usize,
        index: Option<usize>,
        len: usize,
        max: usize,
    },

    /// Substitution was attempted on a growable key array.
    #[error("Cannot {operation}: key array must be mutable (depth {depth}, slots allocated {depth_alloc})")]
    NotMutable {
        operation: &'static str,
        depth: usize,
        depth_alloc: usize,
    },

    /// Substitution was attempted on a key array without subscripts.
    #[error("Cannot {operation}: key array must have at least one subscript")]
    EmptyKey { operation: &'static str },

    /// A depth limit outside `0..=depth` was supplied.
    #[error("Cannot {operation}: {requested} is not a valid node depth in the range 0-{depth}")]
    RangeError {
        operation: &'static str,
        requested: i64,
        depth: usize,
    },

    /// The allocation policy is invalid.
    #[error("Invalid allocation policy: {0}")]
    Config(String),
}

/// Result alias used throughout the crate.
pub type KeyResult<T> = Result<T, KeyError>;
