//! Renamer: scope-aware identifier rename for C-family source.
//!
//! This crate provides the `renamer` CLI binary and a facade over the
//! workspace crates.
//!
//! ## Modules
//!
//! - `cli` - command implementations behind the binary
//! - `engine` - the rename engine (`renamer-clike`)
//! - `diff`, `error`, `output`, `patch`, `text`, `types` - core
//!   infrastructure re-exported from `renamer-core`

pub mod cli;

// Core infrastructure - re-exported from renamer-core
pub use renamer_core::diff;
pub use renamer_core::error;
pub use renamer_core::output;
pub use renamer_core::patch;
pub use renamer_core::text;
pub use renamer_core::types;

// The engine
pub use renamer_clike as engine;

// Re-export the types most callers need
pub use renamer_clike::{rename, rename_with, DeclarationLocator, RenameError, RenameOptions};
pub use renamer_core::error::{OutputErrorCode, RenamerError};
pub use renamer_core::output::{ErrorInfo, ErrorResponse, SCHEMA_VERSION};
