//! Generates the `vulk` binding module and the flattened C declarations
//! from the Vulkan XML registry. Parse the registry with
//! [`Registry::parse`], build the typed model with [`Model::build`], then
//! hand the model to [`generator::emit_bindings`] and
//! [`generator::flatten_declarations`]. The `vulk_generator` binary wires
//! those steps to the fixed file locations.

pub mod generator;
pub mod model;
pub mod registry;

pub use model::Model;
pub use registry::Registry;

use thiserror::Error;

/// Unrecoverable generation failures. Gaps in optional or extension-only
/// registry surface are logged and skipped instead of raised; anything
/// that could silently produce a wrong calling convention lands here.
#[derive(Debug, Error)]
pub enum GenError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] registry::ParseError),

    /// A function satisfied more than one convention class. Aborting beats
    /// guessing: a wrong class corrupts memory at the boundary.
    #[error("function {name} matches more than one calling convention")]
    AmbiguousClassification { name: String },

    #[error("C preprocessor failed: {status}")]
    Preprocessor { status: std::process::ExitStatus },

    #[error("missing core registry data: {0}")]
    MissingData(String),
}
