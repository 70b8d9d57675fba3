//! Error types and exit code mapping for renamer.
//!
//! `RenamerError` is the single error type the CLI renders. Engine errors
//! convert into it through `From` bridges, and each variant maps onto a
//! stable `OutputErrorCode` that doubles as the process exit code:
//!
//! - `2`: invalid arguments (bad locator syntax, invalid new name)
//! - `3`: resolution errors (declaration not found, ambiguous)
//! - `4`: apply errors (stale plan, failed write)
//! - `5`: parse errors (lex error, unbalanced delimiters)
//! - `6`: name conflict
//! - `10`: internal errors

use std::fmt;

use thiserror::Error;

use crate::patch::Span;
pub use crate::types::{Location, SymbolInfo};

// ============================================================================
// Output Error Codes
// ============================================================================

/// Stable numeric codes for JSON error output and process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from the caller.
    InvalidArguments = 2,
    /// Declaration not found or ambiguous.
    ResolutionError = 3,
    /// Failed to apply a plan or write the result.
    ApplyError = 4,
    /// The source could not be lexed or its delimiters do not balance.
    ParseError = 5,
    /// The new name would capture or be captured by another declaration.
    NameConflict = 6,
    /// Bugs and unexpected state.
    InternalError = 10,
}

impl OutputErrorCode {
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for CLI output.
#[derive(Debug, Error)]
pub enum RenamerError {
    #[error("invalid arguments: {message}")]
    InvalidArguments {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    /// The source text could not be tokenized or structured.
    #[error("parse error at byte {offset}: {message}")]
    ParseError { message: String, offset: u64 },

    #[error("declaration not found: {locator}")]
    DeclarationNotFound { locator: String },

    /// References (or locator matches) that cannot be pinned to one declaration.
    #[error("ambiguous {what}: {} candidate span(s)", .spans.len())]
    Ambiguous { what: String, spans: Vec<Span> },

    #[error("renaming to '{name}' conflicts with the declaration at {conflict}")]
    NameConflict { name: String, conflict: Span },

    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error("apply error: {message}")]
    ApplyError {
        message: String,
        file: Option<String>,
    },

    #[error("internal error: {message}")]
    InternalError { message: String },
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&RenamerError> for OutputErrorCode {
    fn from(err: &RenamerError) -> Self {
        match err {
            RenamerError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            RenamerError::InvalidIdentifier { .. } => OutputErrorCode::InvalidArguments,
            RenamerError::ParseError { .. } => OutputErrorCode::ParseError,
            RenamerError::DeclarationNotFound { .. } => OutputErrorCode::ResolutionError,
            RenamerError::Ambiguous { .. } => OutputErrorCode::ResolutionError,
            RenamerError::NameConflict { .. } => OutputErrorCode::NameConflict,
            RenamerError::FileNotFound { .. } => OutputErrorCode::ResolutionError,
            RenamerError::ApplyError { .. } => OutputErrorCode::ApplyError,
            RenamerError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<RenamerError> for OutputErrorCode {
    fn from(err: RenamerError) -> Self {
        OutputErrorCode::from(&err)
    }
}

impl From<std::io::Error> for RenamerError {
    fn from(err: std::io::Error) -> Self {
        RenamerError::InternalError {
            message: format!("IO error: {}", err),
        }
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl RenamerError {
    pub fn invalid_args(message: impl Into<String>) -> Self {
        RenamerError::InvalidArguments {
            message: message.into(),
            details: None,
        }
    }

    pub fn invalid_args_with_details(
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        RenamerError::InvalidArguments {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        RenamerError::FileNotFound { path: path.into() }
    }

    pub fn apply(message: impl Into<String>, file: Option<String>) -> Self {
        RenamerError::ApplyError {
            message: message.into(),
            file,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        RenamerError::InternalError {
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod error_code_mapping {
        use super::*;

        #[test]
        fn invalid_arguments_maps_to_2() {
            let err = RenamerError::invalid_args("missing --to");
            assert_eq!(err.error_code(), OutputErrorCode::InvalidArguments);
            assert_eq!(err.error_code().code(), 2);
        }

        #[test]
        fn invalid_identifier_maps_to_invalid_arguments() {
            let err = RenamerError::InvalidIdentifier {
                name: "9lives".to_string(),
                reason: "must start with a letter, '_' or '$'".to_string(),
            };
            assert_eq!(err.error_code(), OutputErrorCode::InvalidArguments);
        }

        #[test]
        fn resolution_failures_map_to_3() {
            let not_found = RenamerError::DeclarationNotFound {
                locator: "byte offset 12".to_string(),
            };
            let ambiguous = RenamerError::Ambiguous {
                what: "reference".to_string(),
                spans: vec![Span::new(1, 2)],
            };
            assert_eq!(not_found.error_code().code(), 3);
            assert_eq!(ambiguous.error_code().code(), 3);
            assert_eq!(RenamerError::file_not_found("A.java").error_code().code(), 3);
        }

        #[test]
        fn apply_error_maps_to_4() {
            let err = RenamerError::apply("plan is stale", Some("A.java".to_string()));
            assert_eq!(err.error_code().code(), 4);
        }

        #[test]
        fn parse_error_maps_to_5() {
            let err = RenamerError::ParseError {
                message: "unterminated string literal".to_string(),
                offset: 40,
            };
            assert_eq!(err.error_code().code(), 5);
        }

        #[test]
        fn name_conflict_maps_to_6() {
            let err = RenamerError::NameConflict {
                name: "total".to_string(),
                conflict: Span::new(10, 15),
            };
            assert_eq!(err.error_code().code(), 6);
        }

        #[test]
        fn io_error_becomes_internal() {
            let io = std::io::Error::other("disk on fire");
            let err = RenamerError::from(io);
            assert_eq!(err.error_code(), OutputErrorCode::InternalError);
            assert_eq!(err.error_code().code(), 10);
        }
    }

    mod error_display {
        use super::*;

        #[test]
        fn parse_error_display() {
            let err = RenamerError::ParseError {
                message: "unterminated block comment".to_string(),
                offset: 7,
            };
            assert_eq!(
                err.to_string(),
                "parse error at byte 7: unterminated block comment"
            );
        }

        #[test]
        fn conflict_display_names_span() {
            let err = RenamerError::NameConflict {
                name: "total".to_string(),
                conflict: Span::new(10, 15),
            };
            assert_eq!(
                err.to_string(),
                "renaming to 'total' conflicts with the declaration at [10, 15)"
            );
        }

        #[test]
        fn ambiguous_display_counts_spans() {
            let err = RenamerError::Ambiguous {
                what: "reference".to_string(),
                spans: vec![Span::new(1, 2), Span::new(5, 6)],
            };
            assert_eq!(err.to_string(), "ambiguous reference: 2 candidate span(s)");
        }
    }
}
