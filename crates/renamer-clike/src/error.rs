// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Engine errors.
//!
//! Every stage reports failure through [`RenameError`]; nothing is partially
//! applied. The `From<RenameError> for RenamerError` bridge maps each variant
//! onto the CLI's error codes.

use thiserror::Error;

use renamer_core::error::RenamerError;
use renamer_core::patch::Span;

use crate::lexer::LexError;
use crate::pipeline::Stage;
use crate::syntax::StructuralParseError;
use crate::validation::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenameError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),

    #[error("structural parse error: {0}")]
    Structural(#[from] StructuralParseError),

    #[error("no declaration matches {locator}")]
    DeclarationNotFound { locator: String },

    /// References that may or may not mean the target.
    #[error("{} reference(s) cannot be pinned to a single declaration", .spans.len())]
    AmbiguousReference { spans: Vec<Span> },

    /// A scope-path locator matching more than one declaration.
    #[error("{} declarations match {locator}", .candidates.len())]
    AmbiguousDeclaration {
        locator: String,
        candidates: Vec<Span>,
    },

    #[error("renaming to '{name}' conflicts with the declaration at {conflict}")]
    NameConflict { name: String, conflict: Span },

    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// The plan no longer matches the text it is applied to.
    #[error("stale rename plan: {reason}")]
    StalePlan { reason: String },

    #[error("cancelled before the {stage} stage")]
    Cancelled { stage: Stage },
}

pub type RenameResult<T> = Result<T, RenameError>;

impl From<ValidationError> for RenameError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidName { name, reason } => RenameError::InvalidName { name, reason },
        }
    }
}

impl RenameError {
    pub fn stale(reason: impl Into<String>) -> Self {
        RenameError::StalePlan {
            reason: reason.into(),
        }
    }

    /// Byte offset for parse errors.
    pub fn offset(&self) -> Option<u64> {
        match self {
            RenameError::Lex(e) => Some(e.offset()),
            RenameError::Structural(e) => Some(e.offset()),
            _ => None,
        }
    }

    /// Spans the error points at, if any.
    pub fn spans(&self) -> Vec<Span> {
        match self {
            RenameError::AmbiguousReference { spans } => spans.clone(),
            RenameError::AmbiguousDeclaration { candidates, .. } => candidates.clone(),
            RenameError::NameConflict { conflict, .. } => vec![*conflict],
            _ => Vec::new(),
        }
    }
}

// ============================================================================
// Bridge to the CLI error
// ============================================================================

impl From<RenameError> for RenamerError {
    fn from(err: RenameError) -> Self {
        match err {
            RenameError::Lex(e) => RenamerError::ParseError {
                message: e.to_string(),
                offset: e.offset(),
            },
            RenameError::Structural(e) => RenamerError::ParseError {
                message: e.to_string(),
                offset: e.offset(),
            },
            RenameError::DeclarationNotFound { locator } => {
                RenamerError::DeclarationNotFound { locator }
            }
            RenameError::AmbiguousReference { spans } => RenamerError::Ambiguous {
                what: "reference".to_string(),
                spans,
            },
            RenameError::AmbiguousDeclaration { candidates, .. } => RenamerError::Ambiguous {
                what: "declaration".to_string(),
                spans: candidates,
            },
            RenameError::NameConflict { name, conflict } => {
                RenamerError::NameConflict { name, conflict }
            }
            RenameError::InvalidName { name, reason } => {
                RenamerError::InvalidIdentifier { name, reason }
            }
            RenameError::StalePlan { reason } => RenamerError::apply(reason, None),
            RenameError::Cancelled { stage } => {
                RenamerError::internal(format!("cancelled before the {stage} stage"))
            }
        }
    }
}
