//! Allocation policy for key arrays.
//!
//! The policy is copied into every block it builds, so a key array keeps growing the same way
//! it was created even when later operations do not mention a policy.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{KeyError, KeyResult};

/// Hard cap on the number of subscripts the store accepts in a single key.
pub const MAX_SUBSCRIPT_DEPTH: usize = 31;

/// Largest name or subscript accepted, in bytes.
///
/// Keeps every arena offset and length representable in the `u32` fields of a descriptor.
pub const MAX_SUBSCRIPT_LEN: usize = 1 << 20;

/// Largest stack scratch arena a policy may ask for, in bytes.
pub const MAX_SCRATCH_SUBSDATA_LEN: usize = 1 << 16;

/// Extra slots reserved on every allocation.
pub const OVERALLOC_SLOTS: usize = 5;

/// Arena bytes budgeted per subscript whose length is not known up front.
pub const TYPICAL_SUBSCRIPT_LEN: usize = 32;

/// Arena capacity of the stack scratch block used while constructing.
pub const SCRATCH_SUBSDATA_LEN: usize = 1024;

/// Sizing constants used when a block is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct AllocPolicy {
    /// Slots added beyond the requested depth.
    pub overalloc_slots: usize,
    /// Per-subscript byte estimate for slack and unknown lengths.
    pub typical_subscript_len: usize,
    /// Arena bytes of the scratch block tried first by [`crate::build::KeyBuilder::build`].
    pub scratch_subsdata_len: usize,
    /// Maximum depth; never above [`MAX_SUBSCRIPT_DEPTH`].
    pub max_depth: usize,
}

impl AllocPolicy {
    /// Check the policy against the store limits.
    ///
    /// A policy that passes keeps every size computed from it far below `u32::MAX`.
    pub fn validate(&self) -> KeyResult<()> {
        let bounded = |field: &str, value: usize, max: usize| {
            if value > max {
                Err(KeyError::Config(format!(
                    "{field} {value} exceeds the limit of {max}"
                )))
            } else {
                Ok(())
            }
        };
        bounded("max_depth", self.max_depth, MAX_SUBSCRIPT_DEPTH)?;
        bounded("overalloc_slots", self.overalloc_slots, MAX_SUBSCRIPT_DEPTH)?;
        bounded(
            "typical_subscript_len",
            self.typical_subscript_len,
            MAX_SUBSCRIPT_LEN,
        )?;
        bounded(
            "scratch_subsdata_len",
            self.scratch_subsdata_len,
            MAX_SCRATCH_SUBSDATA_LEN,
        )?;
        if self.typical_subscript_len == 0 {
            return Err(KeyError::Config(
                "typical_subscript_len must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Slot capacity to allocate for `depth` subscripts.
    pub(crate) fn depth_alloc_for(&self, depth: usize) -> usize {
        // Slack never pushes the table past the cap; the cap itself is still reachable.
        depth
            .saturating_add(self.overalloc_slots)
            .min(self.max_depth.max(depth))
    }

    /// Arena capacity to allocate for `subslen` known bytes.
    pub(crate) fn subsdata_alloc_for(&self, subslen: usize) -> usize {
        subslen.saturating_add(
            self.overalloc_slots
                .saturating_mul(self.typical_subscript_len),
        )
    }

    /// Parse and validate a policy from a TOML document.
    ///
    /// Missing keys fall back to [`AllocPolicy::default`].
    /// ```
    /// # use keyarray::config::AllocPolicy;
    /// let policy = AllocPolicy::from_toml_str("overalloc_slots = 2").unwrap();
    /// assert_eq!(policy.overalloc_slots, 2);
    /// assert_eq!(policy.max_depth, keyarray::config::MAX_SUBSCRIPT_DEPTH);
    /// ```
    #[cfg(feature = "toml")]
    pub fn from_toml_str(source: &str) -> KeyResult<Self> {
        let policy: AllocPolicy =
            toml::from_str(source).map_err(|e| KeyError::Config(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }
}

impl Default for AllocPolicy {
    fn default() -> Self {
        Self {
            overalloc_slots: OVERALLOC_SLOTS,
            typical_subscript_len: TYPICAL_SUBSCRIPT_LEN,
            scratch_subsdata_len: SCRATCH_SUBSDATA_LEN,
            max_depth: MAX_SUBSCRIPT_DEPTH,
        }
    }
}
