//! Core infrastructure for renamer.
//!
//! Language-independent pieces shared by the engine and the CLI:
//!
//! - [`patch`]: byte spans, content hashes, edit reports
//! - [`text`]: byte offset and line:column conversion
//! - [`diff`]: unified diff rendering
//! - [`types`]: locations and symbol descriptions
//! - [`error`]: the unified error type and exit codes
//! - [`output`]: JSON response types

pub mod diff;
pub mod error;
pub mod output;
pub mod patch;
pub mod text;
pub mod types;
