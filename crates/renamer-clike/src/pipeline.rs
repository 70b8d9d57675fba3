// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! The rename pipeline: lex, build scopes, bind, plan, rewrite.
//!
//! Each stage consumes the previous stage's artifact and produces a new one.
//! [`Analysis`] holds the artifacts of the first three stages so that one
//! analysed text can be planned against many times; [`rename`] runs all
//! five for the common single-rename case.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use renamer_core::output::{DeclarationInfo, ReferenceInfo, Warning};
use renamer_core::patch::{ContentHash, MaterializedPatch, Span};
use renamer_core::text::offset_to_position;
use renamer_core::types::{Location, SymbolInfo};

use crate::binder::{bind, Bindings, Resolution};
use crate::error::{RenameError, RenameResult};
use crate::index::{NoProjectIndex, ProjectIndex};
use crate::lexer::{tokenize, Token};
use crate::plan::{CollisionVerdict, DeclarationLocator, Planner, RenamePlan};
use crate::rewrite;
use crate::scope::{DeclId, ScopeTree};

// ============================================================================
// Options
// ============================================================================

/// Knobs for planning and binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameOptions {
    /// Treat shadowing an outer declaration as a conflict.
    pub strict_shadowing: bool,
    /// Ask the project index about names this file cannot resolve.
    pub consult_index: bool,
}

impl Default for RenameOptions {
    fn default() -> Self {
        RenameOptions {
            strict_shadowing: false,
            consult_index: true,
        }
    }
}

// ============================================================================
// Stages and cancellation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Lex,
    Scope,
    Bind,
    Plan,
    Rewrite,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Lex => "lex",
            Stage::Scope => "scope",
            Stage::Bind => "bind",
            Stage::Plan => "plan",
            Stage::Rewrite => "rewrite",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared flag for abandoning in-flight pipelines.
///
/// Clones observe the same flag. Pipelines check it between stages, never
/// within one.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Analysis
// ============================================================================

/// Tokens, scope tree and bindings of one source text.
#[derive(Debug)]
pub struct Analysis<'src> {
    source: &'src str,
    tokens: Vec<Token<'src>>,
    tree: ScopeTree,
    bindings: Bindings,
    hash: ContentHash,
}

impl<'src> Analysis<'src> {
    /// Analyse `source` without a project index.
    pub fn new(source: &'src str) -> RenameResult<Self> {
        Pipeline::new().analyze(source)
    }

    pub fn with_index(source: &'src str, index: &dyn ProjectIndex) -> RenameResult<Self> {
        Pipeline::new().with_index(index).analyze(source)
    }

    pub fn source(&self) -> &'src str {
        self.source
    }

    pub fn tokens(&self) -> &[Token<'src>] {
        &self.tokens
    }

    pub fn tree(&self) -> &ScopeTree {
        &self.tree
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    pub fn planner<'a>(&'a self, options: &'a RenameOptions) -> Planner<'a> {
        Planner::new(&self.tree, &self.bindings, options)
    }

    pub fn plan(
        &self,
        locator: &DeclarationLocator,
        new_name: &str,
        options: &RenameOptions,
    ) -> RenameResult<RenamePlan> {
        self.planner(options)
            .plan(locator, new_name, self.hash.clone())
    }

    /// Rewrite the analysed source according to `plan`.
    pub fn apply(&self, plan: &RenamePlan) -> RenameResult<String> {
        rewrite::apply(self.source, &self.tokens, plan)
    }

    pub fn patch(&self, file: &str, plan: &RenamePlan) -> RenameResult<MaterializedPatch> {
        rewrite::patch(file, self.source, plan)
    }

    // ------------------------------------------------------------------------
    // Reports
    // ------------------------------------------------------------------------

    fn location(&self, file: &str, span: Span) -> Location {
        let (line, col) = offset_to_position(self.source, span.start);
        Location::with_span(file, line, col, span.start, span.end)
    }

    pub fn symbol_info(&self, file: &str, decl: DeclId) -> Option<SymbolInfo> {
        let decl = self.tree.get_declaration(decl)?;
        Some(
            SymbolInfo::new(
                decl.id.to_string(),
                &decl.name,
                decl.kind.as_str(),
                self.location(file, decl.span),
            )
            .with_container(self.tree.scope_path(decl.scope).join(".")),
        )
    }

    /// Every declaration, in source order.
    pub fn declaration_infos(&self, file: &str) -> Vec<DeclarationInfo> {
        self.tree
            .declarations()
            .iter()
            .filter_map(|decl| {
                Some(DeclarationInfo {
                    symbol: self.symbol_info(file, decl.id)?,
                    type_name: decl.type_name.clone(),
                    arity: decl.arity,
                    variadic: decl.variadic,
                })
            })
            .collect()
    }

    /// Every reference, in source order.
    pub fn reference_infos(&self, file: &str) -> Vec<ReferenceInfo> {
        self.bindings
            .references()
            .iter()
            .map(|r| {
                let targets = match &r.resolution {
                    Resolution::Resolved(d) => vec![d.to_string()],
                    Resolution::Ambiguous(ds) => ds.iter().map(DeclId::to_string).collect(),
                    Resolution::External(ext) => vec![ext.to_string()],
                    Resolution::Unresolved => Vec::new(),
                };
                ReferenceInfo::new(&r.name, self.location(file, r.span), r.resolution.as_str())
                    .with_targets(targets)
            })
            .collect()
    }

    /// Warnings worth showing next to an accepted plan.
    pub fn warnings(&self, file: &str, plan: &RenamePlan) -> Vec<Warning> {
        match &plan.verdict {
            CollisionVerdict::Clear => Vec::new(),
            CollisionVerdict::ShadowsOuter { declarations } => declarations
                .iter()
                .filter_map(|id| self.tree.get_declaration(*id))
                .map(|outer| {
                    Warning::with_location(
                        "shadows_outer",
                        format!(
                            "'{}' hides the {} declared at line {}",
                            plan.new_name,
                            outer.kind,
                            offset_to_position(self.source, outer.span.start).0
                        ),
                        self.location(file, outer.span),
                    )
                })
                .collect(),
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// A rename run with its options, index and cancellation token.
///
/// Holds only shared references and flags, so one pipeline can serve many
/// files at once.
#[derive(Clone)]
pub struct Pipeline<'a> {
    options: RenameOptions,
    index: &'a dyn ProjectIndex,
    cancel: Option<CancellationToken>,
}

impl Default for Pipeline<'_> {
    fn default() -> Self {
        Pipeline {
            options: RenameOptions::default(),
            index: &NoProjectIndex,
            cancel: None,
        }
    }
}

impl fmt::Debug for Pipeline<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("options", &self.options)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

/// Output of a full run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameOutcome {
    pub text: String,
    pub plan: RenamePlan,
}

impl<'a> Pipeline<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: RenameOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_index<'b>(self, index: &'b dyn ProjectIndex) -> Pipeline<'b> {
        Pipeline {
            options: self.options,
            index,
            cancel: self.cancel,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn options(&self) -> &RenameOptions {
        &self.options
    }

    fn checkpoint(&self, stage: Stage) -> RenameResult<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => {
                debug!(%stage, "pipeline cancelled");
                Err(RenameError::Cancelled { stage })
            }
            _ => Ok(()),
        }
    }

    /// Lex, build scopes and bind.
    pub fn analyze<'src>(&self, source: &'src str) -> RenameResult<Analysis<'src>> {
        self.checkpoint(Stage::Lex)?;
        let tokens = {
            let _span = debug_span!("lex", bytes = source.len()).entered();
            tokenize(source)?
        };

        self.checkpoint(Stage::Scope)?;
        let tree = {
            let _span = debug_span!("scope", tokens = tokens.len()).entered();
            ScopeTree::build(&tokens)?
        };

        self.checkpoint(Stage::Bind)?;
        let bindings = {
            let _span = debug_span!("bind", declarations = tree.declarations().len()).entered();
            let index: &dyn ProjectIndex = if self.options.consult_index {
                self.index
            } else {
                &NoProjectIndex
            };
            bind(&tokens, &tree, index)
        };

        Ok(Analysis {
            source,
            tokens,
            tree,
            bindings,
            hash: ContentHash::compute(source.as_bytes()),
        })
    }

    pub fn plan(
        &self,
        analysis: &Analysis<'_>,
        locator: &DeclarationLocator,
        new_name: &str,
    ) -> RenameResult<RenamePlan> {
        self.checkpoint(Stage::Plan)?;
        let _span = debug_span!("plan", %locator, new_name).entered();
        analysis.plan(locator, new_name, &self.options)
    }

    /// All five stages.
    pub fn run(
        &self,
        source: &str,
        locator: &DeclarationLocator,
        new_name: &str,
    ) -> RenameResult<RenameOutcome> {
        let analysis = self.analyze(source)?;
        let plan = self.plan(&analysis, locator, new_name)?;

        self.checkpoint(Stage::Rewrite)?;
        let _span = debug_span!("rewrite", spans = plan.spans.len()).entered();
        let text = analysis.apply(&plan)?;
        Ok(RenameOutcome { text, plan })
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Rename the declaration `locator` identifies to `new_name` and return the
/// rewritten source.
///
/// # Examples
///
/// ```
/// use renamer_clike::pipeline::rename;
/// use renamer_clike::plan::DeclarationLocator;
///
/// let source = "class A { int n; void f() { n = 1; } }";
/// let out = rename(source, &DeclarationLocator::at(14), "count").unwrap();
/// assert_eq!(out, "class A { int count; void f() { count = 1; } }");
/// ```
pub fn rename(source: &str, locator: &DeclarationLocator, new_name: &str) -> RenameResult<String> {
    Pipeline::new()
        .run(source, locator, new_name)
        .map(|outcome| outcome.text)
}

/// [`rename`] with options and a project index.
pub fn rename_with(
    source: &str,
    locator: &DeclarationLocator,
    new_name: &str,
    options: &RenameOptions,
    index: &dyn ProjectIndex,
) -> RenameResult<String> {
    Pipeline::new()
        .with_options(options.clone())
        .with_index(index)
        .run(source, locator, new_name)
        .map(|outcome| outcome.text)
}

// ============================================================================
// Tests
// ============================================================================
