//! Runtime support for the generated Vulkan binding module. The generator
//! (`vulk_generator`) emits one wrapper per native entry point; every one of
//! those wrappers funnels through the primitives in this crate: the
//! process-wide loaded library ([`VulkanLibrary`]), the marshaling arena that
//! keeps intermediate buffers alive across a native call ([`MarshalArena`]),
//! the success/error partition lookup ([`CodeTable`]) and the dynamic
//! extension dispatch registry ([`ProcRegistry`]).
//!
//! Nothing here is thread-safe beyond what Rust statics force on us; the
//! intended use is a single native-call-issuing thread, matching the
//! underlying library's own external-synchronization model.

mod callback;
mod dispatch;
mod library;
mod marshal;
mod status;

pub use callback::CallbackSlot;
pub use dispatch::{BoundProc, ProcBinder, ProcRegistry, Scope};
pub use library::{PfnVoidFunction, VulkanLibrary};
pub use marshal::{
    cstr_to_string, query_then_fill, query_then_fill_void, DecodedStrings, MarshalArena,
};
pub use status::{CodeTable, Completion, VkFailure};

// The generated module keeps its statics lazy through the same crate the
// shim uses.
pub use once_cell::sync::Lazy;

use thiserror::Error;

/// Failures that can occur while bringing up the native library or resolving
/// an entry point, before any native code has run.
#[derive(Debug, Error)]
pub enum LoadingError {
    /// Every platform candidate failed to load. `tried` holds one
    /// `"name: cause"` entry per candidate, in the order they were attempted.
    #[error("native vulkan library not found; tried {tried:?}")]
    LibraryNotFound { tried: Vec<String> },

    /// The native resolver returned a null address for this name.
    #[error("procedure {name:?} not found")]
    ProcedureNotFound { name: String },

    /// The native resolver knows the name, but no typed wrapper was
    /// registered for it under the requested scope.
    #[error("extension function {name:?} is not supported ({scope:?} scope)")]
    ExtensionNotSupported { name: String, scope: Scope },
}

/// Everything a generated wrapper can fail with: bringing up the library or
/// resolving the entry point, and the native call itself. `?` converts from
/// both halves.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Loading(#[from] LoadingError),

    #[error(transparent)]
    Call(#[from] VkFailure),
}
