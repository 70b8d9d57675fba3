//! Compile-only test to verify public API surface.
//!
//! This file serves as a compile-time contract for the public API.
//! If this file fails to compile, the public API has regressed.
//!
//! Run with: cargo test -- api_surface

// Allow unused imports - this test is about compile-time verification, not runtime usage
#![allow(unused_imports)]

// ============================================================================
// Core Infrastructure Types
// ============================================================================

// patch module - spans, hashes and materialized edits
use renamer::patch::{ContentHash, MaterializedPatch, OutputEdit, Span};

// error module - error types and codes
use renamer::error::{OutputErrorCode, RenamerError};

// output module - JSON output types
use renamer::output::{
    emit_response, AnalyzeResponse, BatchFileResult, BatchResponse, DeclarationInfo, ErrorInfo,
    ErrorResponse, ReferenceInfo, RenameResponse, Summary, Warning, SCHEMA_VERSION,
};

// types module - shared location and symbol types
use renamer::types::{Location, SymbolInfo};

// text and diff helpers
use renamer::diff::generate_unified_diff;
use renamer::text::{line_bounds, line_of, offset_to_position, position_to_offset};

// ============================================================================
// Engine
// ============================================================================

use renamer::engine::batch::{rename_batch, JobOutcome, RenameJob};
use renamer::engine::binder::{bind, Bindings, Lookup, Reference, Resolution};
use renamer::engine::error::{RenameError, RenameResult};
use renamer::engine::index::{ExternalDecl, MapProjectIndex, NoProjectIndex, ProjectIndex};
use renamer::engine::lexer::{tokenize, LexError, Token, TokenKind};
use renamer::engine::pipeline::{
    Analysis, CancellationToken, Pipeline, RenameOptions, RenameOutcome, Stage,
};
use renamer::engine::plan::{CollisionVerdict, DeclarationLocator, Planner, RenamePlan};
use renamer::engine::rewrite;
use renamer::engine::scope::{DeclId, DeclKind, Declaration, Namespace, ScopeId, ScopeTree};
use renamer::engine::syntax::StructuralParseError;
use renamer::engine::validation::{validate_identifier, ValidationError};

// ============================================================================
// Facade re-exports and CLI
// ============================================================================

use renamer::cli::{
    collect_files, parse_at, parse_kind, read_source, run_analyze, run_batch, run_rename, write_atomic,
    BatchRequest, LocatorSpec, RenameRun,
};
use renamer::{rename, rename_with};

// ============================================================================
// Test
// ============================================================================

#[test]
fn api_surface_compiles() {
    // The imports above form the public API contract.
    let _ = std::any::type_name::<Span>();
    let _ = std::any::type_name::<RenamerError>();
    let _ = std::any::type_name::<Location>();
    let _ = std::any::type_name::<Pipeline<'static>>();
    let _ = std::any::type_name::<RenamePlan>();
    let _ = std::any::type_name::<ScopeTree>();
    let _ = std::any::type_name::<LocatorSpec>();
}

#[test]
fn schema_version_is_stable() {
    // The schema version is part of the public API contract
    assert_eq!(SCHEMA_VERSION, "1");
}

#[test]
fn facade_rename_matches_engine() {
    let source = "class A { int n; void f() { n = 1; } }";
    let locator = DeclarationLocator::at(14);
    assert_eq!(
        rename(source, &locator, "count").unwrap(),
        renamer::engine::pipeline::rename(source, &locator, "count").unwrap()
    );
}
