// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Identifier validation for rename targets.

use thiserror::Error;

use crate::lexer::{is_ident_continue, is_ident_start, is_keyword};

/// Error for validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate that `name` lexes as a single identifier.
///
/// Checks:
/// - Non-empty
/// - Starts with a letter, `_` or `$`
/// - Continues with letters, digits, `_` or `$`
/// - Not a reserved word
///
/// # Examples
///
/// ```
/// use renamer_clike::validation::validate_identifier;
///
/// assert!(validate_identifier("flag").is_ok());
/// assert!(validate_identifier("$cache").is_ok());
/// assert!(validate_identifier("").is_err());
/// assert!(validate_identifier("2fast").is_err());
/// assert!(validate_identifier("class").is_err());
/// ```
pub fn validate_identifier(name: &str) -> ValidationResult<()> {
    let invalid = |reason: String| ValidationError::InvalidName {
        name: name.to_string(),
        reason,
    };

    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(invalid("name cannot be empty".to_string()));
    };
    if !is_ident_start(first) {
        return Err(invalid("must start with a letter, '_' or '$'".to_string()));
    }
    if let Some(ch) = chars.find(|c| !is_ident_continue(*c)) {
        return Err(invalid(format!("invalid character: '{}'", ch)));
    }
    if is_keyword(name) {
        return Err(invalid("cannot use a reserved word as an identifier".to_string()));
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
