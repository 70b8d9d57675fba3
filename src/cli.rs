//! CLI command implementations.
//!
//! Each `run_*` function does the work of one subcommand and returns a
//! response value; `main.rs` only parses arguments, picks the output format
//! and maps errors to exit codes. Keeping the logic here makes it callable
//! from tests without spawning the binary.
//!
//! ## File Handling
//!
//! Sources are read whole. In-place writes go through a temporary file in the
//! target's directory that is then persisted over the original, so a reader
//! never sees a half-written file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use renamer_clike::batch::{rename_batch, RenameJob};
use renamer_clike::pipeline::{Analysis, Pipeline, RenameOptions};
use renamer_clike::plan::DeclarationLocator;
use renamer_clike::rewrite;
use renamer_clike::scope::DeclKind;
use renamer_clike::RenameError;
use renamer_core::error::RenamerError;
use renamer_core::output::{
    AnalyzeResponse, BatchFileResult, BatchResponse, ErrorInfo, RenameResponse, Summary,
};
use renamer_core::text::position_to_offset;
use renamer_core::types::Location;

/// Include pattern used when `batch` is given none.
pub const DEFAULT_INCLUDE: &str = "**/*.java";

// ============================================================================
// Locators
// ============================================================================

/// A declaration locator as given on the command line.
///
/// Line and column positions need the file's text to become byte offsets,
/// so conversion to a [`DeclarationLocator`] happens after reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorSpec {
    /// 1-indexed line and byte column.
    Position { line: u32, col: u32 },
    Offset(u64),
    Path {
        scope: String,
        kind: DeclKind,
        name: String,
        type_name: Option<String>,
    },
}

/// Parse a declaration kind, listing the accepted ones on failure.
pub fn parse_kind(kind: &str) -> Result<DeclKind, RenamerError> {
    DeclKind::parse(kind).ok_or_else(|| {
        let valid: Vec<&str> = DeclKind::ALL.iter().map(|k| k.as_str()).collect();
        RenamerError::invalid_args_with_details(
            format!(
                "unknown declaration kind '{}', expected one of: {}",
                kind,
                valid.join(", ")
            ),
            serde_json::json!({ "kind": kind, "valid_kinds": valid }),
        )
    })
}

impl LocatorSpec {
    /// Parse `--kind`, rejecting unknown kinds.
    pub fn path(scope: Option<&str>, kind: &str, name: &str) -> Result<Self, RenamerError> {
        Ok(LocatorSpec::Path {
            scope: scope.unwrap_or_default().to_string(),
            kind: parse_kind(kind)?,
            name: name.to_string(),
            type_name: None,
        })
    }

    /// Restrict a path locator to declarations of one declared type.
    pub fn with_type_name(mut self, ty: impl Into<String>) -> Self {
        if let LocatorSpec::Path { type_name, .. } = &mut self {
            *type_name = Some(ty.into());
        }
        self
    }

    pub fn to_locator(&self, source: &str) -> Result<DeclarationLocator, RenamerError> {
        match self {
            LocatorSpec::Position { line, col } => position_to_offset(source, *line, *col)
                .map(DeclarationLocator::at)
                .ok_or_else(|| {
                    RenamerError::invalid_args(format!(
                        "position {}:{} is outside the file",
                        line, col
                    ))
                }),
            LocatorSpec::Offset(offset) => {
                if *offset as usize >= source.len() {
                    return Err(RenamerError::invalid_args(format!(
                        "offset {} is past the end of the file ({} bytes)",
                        offset,
                        source.len()
                    )));
                }
                Ok(DeclarationLocator::at(*offset))
            }
            LocatorSpec::Path {
                scope,
                kind,
                name,
                type_name,
            } => {
                let locator = DeclarationLocator::path(scope, *kind, name.as_str());
                Ok(match type_name {
                    Some(ty) => locator.with_type_name(ty.as_str()),
                    None => locator,
                })
            }
        }
    }
}

/// Split `--at FILE:LINE:COL` into the file and a position locator.
pub fn parse_at(at: &str) -> Result<(PathBuf, LocatorSpec), RenamerError> {
    let location = Location::parse(at).ok_or_else(|| {
        RenamerError::invalid_args(format!(
            "invalid location format '{}', expected path:line:col",
            at
        ))
    })?;
    Ok((
        PathBuf::from(location.file),
        LocatorSpec::Position {
            line: location.line,
            col: location.col,
        },
    ))
}

// ============================================================================
// File I/O
// ============================================================================

/// Read a source file, mapping a missing file to `FileNotFound`.
pub fn read_source(path: &Path) -> Result<String, RenamerError> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => RenamerError::file_not_found(path.display().to_string()),
        _ => RenamerError::from(e),
    })
}

/// Replace `path`'s contents atomically.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), RenamerError> {
    let file = path.display().to_string();
    let apply_err = |e: io::Error| RenamerError::apply(e.to_string(), Some(file.clone()));

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir).map_err(apply_err)?;
    temp.write_all(contents.as_bytes()).map_err(apply_err)?;
    temp.flush().map_err(apply_err)?;
    temp.persist(path).map_err(|e| apply_err(e.error))?;
    debug!(file = %file, bytes = contents.len(), "wrote file");
    Ok(())
}

/// Files under `root` whose root-relative path matches any include pattern,
/// sorted by path.
pub fn collect_files(root: &Path, includes: &[String]) -> Result<Vec<PathBuf>, RenamerError> {
    if !root.is_dir() {
        return Err(RenamerError::file_not_found(root.display().to_string()));
    }
    let matcher = build_globset(includes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let rel_path = match path.strip_prefix(root) {
            Ok(p) => p,
            Err(_) => continue,
        };
        if matcher.is_match(rel_path) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

fn build_globset(includes: &[String]) -> Result<GlobSet, RenamerError> {
    let default = [DEFAULT_INCLUDE.to_string()];
    let patterns = if includes.is_empty() {
        &default[..]
    } else {
        includes
    };

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            RenamerError::invalid_args(format!("invalid include pattern '{}': {}", pattern, e))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| RenamerError::invalid_args(format!("invalid include patterns: {}", e)))
}

// ============================================================================
// rename
// ============================================================================

/// Result of `rename`: the rewritten text plus its JSON description.
#[derive(Debug, Clone)]
pub struct RenameRun {
    pub text: String,
    pub response: RenameResponse,
}

/// Rename one declaration in one file, optionally writing the result back.
pub fn run_rename(
    file: &Path,
    spec: &LocatorSpec,
    to: &str,
    options: &RenameOptions,
    in_place: bool,
) -> Result<RenameRun, RenamerError> {
    let source = read_source(file)?;
    let locator = spec.to_locator(&source)?;
    let label = file.display().to_string();

    let pipeline = Pipeline::new().with_options(options.clone());
    let analysis = pipeline.analyze(&source).map_err(RenamerError::from)?;
    let plan = pipeline
        .plan(&analysis, &locator, to)
        .map_err(RenamerError::from)?;
    let text = analysis.apply(&plan).map_err(RenamerError::from)?;
    let patch = analysis.patch(&label, &plan).map_err(RenamerError::from)?;

    let symbol = analysis
        .symbol_info(&label, plan.target)
        .ok_or_else(|| RenamerError::internal(format!("planned {} is missing", plan.target)))?;
    let mut response = RenameResponse::new(&label, symbol, to, patch)
        .with_warnings(analysis.warnings(&label, &plan));

    if in_place && text != source {
        write_atomic(file, &text)?;
        response.written = true;
    }
    info!(
        file = %label,
        edits = response.summary.edits_count,
        written = response.written,
        "renamed {} '{}' to '{}'",
        plan.kind,
        plan.old_name,
        to
    );

    Ok(RenameRun { text, response })
}

// ============================================================================
// analyze
// ============================================================================

/// Dump every declaration and reference of one file.
pub fn run_analyze(file: &Path) -> Result<AnalyzeResponse, RenamerError> {
    let source = read_source(file)?;
    let label = file.display().to_string();
    let analysis = Analysis::new(&source).map_err(RenamerError::from)?;
    Ok(AnalyzeResponse::new(
        &label,
        analysis.declaration_infos(&label),
        analysis.reference_infos(&label),
    ))
}

// ============================================================================
// batch
// ============================================================================

/// Arguments of `batch` other than the directory.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub scope: String,
    pub kind: DeclKind,
    pub name: String,
    /// Only rename declarations of this declared type.
    pub type_name: Option<String>,
    pub to: String,
    pub includes: Vec<String>,
    pub in_place: bool,
}

/// Rename a declaration path in every matching file under `root`.
///
/// Files that do not declare the target are skipped. A failed file does not
/// stop the others; nothing is written unless that file's rename succeeded.
pub fn run_batch(
    root: &Path,
    request: &BatchRequest,
    options: &RenameOptions,
) -> Result<BatchResponse, RenamerError> {
    let files = collect_files(root, &request.includes)?;
    let mut locator = DeclarationLocator::path(&request.scope, request.kind, request.name.as_str());
    if let Some(ty) = &request.type_name {
        locator = locator.with_type_name(ty.as_str());
    }

    let mut jobs = Vec::with_capacity(files.len());
    let mut unreadable = Vec::new();
    for path in &files {
        let label = relative_label(root, path);
        match read_source(path) {
            Ok(source) => jobs.push(RenameJob::new(label, source, locator.clone(), request.to.as_str())),
            Err(err) => unreadable.push((label, err)),
        }
    }

    let pipeline = Pipeline::new().with_options(options.clone());
    let outcomes = rename_batch(&jobs, &pipeline);

    let mut results = Vec::with_capacity(files.len());
    for (job, outcome) in jobs.iter().zip(outcomes) {
        let result = match outcome.result {
            Ok(renamed) if renamed.text == job.source => BatchFileResult {
                file: job.label.clone(),
                outcome: "unchanged".to_string(),
                summary: None,
                error: None,
            },
            Ok(renamed) => {
                let written = rewrite::patch(&job.label, &job.source, &renamed.plan)
                    .map_err(RenamerError::from)
                    .and_then(|patch| {
                        if request.in_place {
                            write_atomic(&root.join(&job.label), &renamed.text)?;
                        }
                        Ok(patch)
                    });
                match written {
                    Ok(patch) => BatchFileResult {
                        file: job.label.clone(),
                        outcome: "renamed".to_string(),
                        summary: Some(Summary::from_patch(&patch)),
                        error: None,
                    },
                    Err(err) => {
                        warn!(file = %job.label, error = %err, "could not write file");
                        failed(&job.label, &err)
                    }
                }
            }
            Err(RenameError::DeclarationNotFound { .. }) => {
                warn!(file = %job.label, "declaration not present, skipping");
                BatchFileResult {
                    file: job.label.clone(),
                    outcome: "skipped".to_string(),
                    summary: None,
                    error: None,
                }
            }
            Err(err) => {
                let err = RenamerError::from(err);
                warn!(file = %job.label, error = %err, "rename failed");
                failed(&job.label, &err)
            }
        };
        results.push(result);
    }
    for (label, err) in unreadable {
        warn!(file = %label, error = %err, "could not read file");
        results.push(failed(&label, &err));
    }
    results.sort_by(|a, b| a.file.cmp(&b.file));

    Ok(BatchResponse::new(results))
}

fn failed(label: &str, err: &RenamerError) -> BatchFileResult {
    BatchFileResult {
        file: label.to_string(),
        outcome: "failed".to_string(),
        summary: None,
        error: Some(ErrorInfo::from_error(err)),
    }
}

fn relative_label(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

// ============================================================================
// Tests
// ============================================================================
