//! JSON output types for CLI responses.
//!
//! Every response leads with `status` and `schema_version`. Absent optional
//! fields are skipped rather than emitted as `null`, and all arrays are in
//! source order so the same input always yields the same bytes.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::error::{OutputErrorCode, RenamerError};
pub use crate::patch::{MaterializedPatch, OutputEdit, Span};
pub use crate::types::{Location, SymbolInfo};

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

// ============================================================================
// Building blocks
// ============================================================================

/// A use of a name and what it resolved to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferenceInfo {
    pub name: String,
    pub location: Location,
    /// One of: resolved, ambiguous, external, unresolved.
    pub resolution: String,
    /// Declaration ids this reference may denote.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
}

impl ReferenceInfo {
    pub fn new(name: impl Into<String>, location: Location, resolution: impl Into<String>) -> Self {
        ReferenceInfo {
            name: name.into(),
            location,
            resolution: resolution.into(),
            targets: Vec::new(),
        }
    }

    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }
}

/// A declaration with the extra facts the analyzer recorded for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeclarationInfo {
    #[serde(flatten)]
    pub symbol: SymbolInfo,
    /// Declared type (fields, locals, parameters) or return type (methods).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Parameter count, for methods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arity: Option<usize>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub variadic: bool,
}

/// A non-fatal observation attached to a response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Warning {
    /// Stable warning code.
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Warning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Warning {
            code: code.into(),
            message: message.into(),
            location: None,
        }
    }

    pub fn with_location(
        code: impl Into<String>,
        message: impl Into<String>,
        location: Location,
    ) -> Self {
        Warning {
            code: code.into(),
            message: message.into(),
            location: Some(location),
        }
    }
}

/// Counts describing one rewrite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Summary {
    pub edits_count: u32,
    pub bytes_added: i64,
    pub bytes_removed: i64,
}

impl Summary {
    pub fn from_patch(patch: &MaterializedPatch) -> Self {
        let bytes_added = patch.edits.iter().map(|e| e.new_text.len() as i64).sum();
        let bytes_removed = patch.edits.iter().map(|e| e.old_text.len() as i64).sum();
        Summary {
            edits_count: patch.edits.len() as u32,
            bytes_added,
            bytes_removed,
        }
    }
}

// ============================================================================
// Error info
// ============================================================================

/// Error payload of an [`ErrorResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: u8,
    pub message: String,
    /// Offsets, spans or paths implicated by the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    pub fn from_error(err: &RenamerError) -> Self {
        let code = OutputErrorCode::from(err).code();
        let message = err.to_string();

        let details = match err {
            RenamerError::InvalidArguments { details, .. } => details.clone(),
            RenamerError::InvalidIdentifier { name, reason } => {
                Some(serde_json::json!({ "name": name, "reason": reason }))
            }
            RenamerError::ParseError { offset, .. } => {
                Some(serde_json::json!({ "offset": offset }))
            }
            RenamerError::DeclarationNotFound { locator } => {
                Some(serde_json::json!({ "locator": locator }))
            }
            RenamerError::Ambiguous { what, spans } => {
                let spans: Vec<_> = spans
                    .iter()
                    .map(|s| serde_json::json!({ "start": s.start, "end": s.end }))
                    .collect();
                Some(serde_json::json!({ "kind": what, "spans": spans }))
            }
            RenamerError::NameConflict { name, conflict } => Some(serde_json::json!({
                "name": name,
                "conflict": { "start": conflict.start, "end": conflict.end }
            })),
            RenamerError::FileNotFound { path } => Some(serde_json::json!({ "path": path })),
            RenamerError::ApplyError { file, .. } => {
                file.as_ref().map(|f| serde_json::json!({ "file": f }))
            }
            RenamerError::InternalError { .. } => None,
        };

        ErrorInfo {
            code,
            message,
            details,
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Response for `renamer rename --format json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameResponse {
    pub status: String,
    pub schema_version: String,
    pub file: String,
    /// The renamed declaration, under its old name.
    pub symbol: SymbolInfo,
    pub new_name: String,
    pub patch: MaterializedPatch,
    pub summary: Summary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
    /// Whether the file on disk was rewritten.
    pub written: bool,
}

impl RenameResponse {
    pub fn new(
        file: impl Into<String>,
        symbol: SymbolInfo,
        new_name: impl Into<String>,
        patch: MaterializedPatch,
    ) -> Self {
        let summary = Summary::from_patch(&patch);
        RenameResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            file: file.into(),
            symbol,
            new_name: new_name.into(),
            patch,
            summary,
            warnings: Vec::new(),
            written: false,
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<Warning>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Response for `renamer analyze`: every declaration and reference in a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub status: String,
    pub schema_version: String,
    pub file: String,
    pub declarations: Vec<DeclarationInfo>,
    pub references: Vec<ReferenceInfo>,
}

impl AnalyzeResponse {
    pub fn new(
        file: impl Into<String>,
        declarations: Vec<DeclarationInfo>,
        references: Vec<ReferenceInfo>,
    ) -> Self {
        AnalyzeResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            file: file.into(),
            declarations,
            references,
        }
    }
}

/// Outcome for one file of a batch rename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFileResult {
    pub file: String,
    /// One of: renamed, unchanged, skipped, failed.
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

/// Response for `renamer batch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub status: String,
    pub schema_version: String,
    pub files: Vec<BatchFileResult>,
    pub renamed: u32,
    pub skipped: u32,
    pub failed: u32,
}

impl BatchResponse {
    pub fn new(files: Vec<BatchFileResult>) -> Self {
        let count = |outcome: &str| files.iter().filter(|f| f.outcome == outcome).count() as u32;
        let renamed = count("renamed");
        let skipped = count("skipped");
        let failed = count("failed");
        BatchResponse {
            status: if failed == 0 { "ok" } else { "partial" }.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            files,
            renamed,
            skipped,
            failed,
        }
    }
}

/// Response for any failed command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub schema_version: String,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn from_error(err: &RenamerError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

/// Write `response` as pretty JSON followed by a newline.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

// ============================================================================
// Tests
// ============================================================================
