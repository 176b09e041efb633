//! Translation of native status codes into the typed success/error taxonomy.
//!
//! The generated module builds one [`CodeTable`] from the registry's
//! success/error partition; every status-returning wrapper passes the raw
//! native code through [`CodeTable::check`] before returning a value.

use std::collections::HashMap;

use thiserror::Error;

/// A status code that landed in the error partition, or outside the known
/// partition entirely. The symbolic identity is preserved so callers can
/// match on a specific native error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VkFailure {
    #[error("{name} ({code})")]
    Known { code: i32, name: &'static str },
    /// A code outside the known partition. Never swallowed; surfaced as an
    /// opaque failure.
    #[error("unknown result code {code}")]
    Unknown { code: i32 },
}

impl VkFailure {
    pub fn code(&self) -> i32 {
        match *self {
            VkFailure::Known { code, .. } | VkFailure::Unknown { code } => code,
        }
    }

    /// The code's registry name, if it was part of the known partition.
    pub fn name(&self) -> Option<&'static str> {
        match *self {
            VkFailure::Known { name, .. } => Some(name),
            VkFailure::Unknown { .. } => None,
        }
    }
}

/// A successful return. Success-partition codes other than the canonical
/// "complete" value are surfaced here rather than collapsed into a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The canonical success code.
    Complete,
    /// A non-fatal, noteworthy success code (`VK_INCOMPLETE`, `VK_TIMEOUT`,
    /// `VK_NOT_READY`, ...).
    Other { code: i32, name: &'static str },
}

impl Completion {
    pub fn is_complete(&self) -> bool {
        matches!(self, Completion::Complete)
    }
}

/// The success/error partition of a status-code enumeration.
pub struct CodeTable {
    complete: i32,
    successes: HashMap<i32, &'static str>,
    errors: HashMap<i32, &'static str>,
}

impl CodeTable {
    /// Builds the table. `complete` is the canonical "ok" value and does not
    /// need to appear in `successes`.
    pub fn new(
        complete: i32,
        successes: &[(i32, &'static str)],
        errors: &[(i32, &'static str)],
    ) -> CodeTable {
        CodeTable {
            complete,
            successes: successes.iter().copied().collect(),
            errors: errors.iter().copied().collect(),
        }
    }

    /// Maps a raw native code onto the taxonomy: errors and unknown codes
    /// are failures, everything in the success partition is a [`Completion`].
    pub fn check(&self, code: i32) -> Result<Completion, VkFailure> {
        if code == self.complete {
            return Ok(Completion::Complete);
        }
        if let Some(name) = self.successes.get(&code) {
            return Ok(Completion::Other { code, name });
        }
        match self.errors.get(&code) {
            Some(name) => Err(VkFailure::Known { code, name }),
            None => Err(VkFailure::Unknown { code }),
        }
    }
}
