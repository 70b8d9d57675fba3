// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Scope-aware rename engine for C-family source.
//!
//! A rename runs as five stages, each producing an immutable artifact:
//! - [`lexer`]: lossless tokens, trivia included
//! - [`scope`]: the scope tree and its declarations (on top of [`syntax`])
//! - [`binder`]: every use bound innermost-wins, or marked ambiguous,
//!   external or unresolved
//! - [`plan`]: the spans to replace, after ambiguity and collision checks
//! - [`rewrite`]: span-exact reassembly of the output text
//!
//! [`pipeline`] chains them, [`batch`] fans independent files out over
//! rayon, and [`index`] is the hook for resolving names defined elsewhere.

pub mod batch;
pub mod binder;
pub mod error;
pub mod index;
pub mod lexer;
pub mod pipeline;
pub mod plan;
pub mod rewrite;
pub mod scope;
pub mod syntax;
pub mod validation;

pub use error::{RenameError, RenameResult};
pub use index::{ExternalDecl, MapProjectIndex, NoProjectIndex, ProjectIndex};
pub use pipeline::{rename, rename_with, Analysis, Pipeline, RenameOptions};
pub use plan::{DeclarationLocator, RenamePlan};
