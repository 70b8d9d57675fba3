// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Rename planning.
//!
//! A [`RenamePlan`] is the declaration's own name span plus every reference
//! span resolved to it, nothing else. Before producing one the planner
//! rejects targets with ambiguous references and new names that would change
//! what some other reference binds to.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, warn};

use renamer_core::patch::{ContentHash, Span};

use crate::binder::{Bindings, Lookup, Reference, Resolution};
use crate::error::{RenameError, RenameResult};
use crate::pipeline::RenameOptions;
use crate::scope::{DeclId, DeclKind, Declaration, Namespace, ScopeTree};
use crate::validation::validate_identifier;

// ============================================================================
// Locator
// ============================================================================

/// Identifies the declaration to rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationLocator {
    /// Byte offset inside the declaring name token (or inside a reference
    /// to it).
    Offset(u64),
    /// Enclosing named scopes, kind and name, for scripted use.
    Path {
        scope_path: Vec<String>,
        kind: DeclKind,
        name: String,
        /// Declared type (simple name, `[]` for arrays) the declaration
        /// must have, when given.
        type_name: Option<String>,
    },
}

impl DeclarationLocator {
    pub fn at(offset: u64) -> Self {
        DeclarationLocator::Offset(offset)
    }

    /// Build a path locator from a dotted scope path such as `Outer.run`.
    pub fn path(scope: &str, kind: DeclKind, name: impl Into<String>) -> Self {
        DeclarationLocator::Path {
            scope_path: scope
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            kind,
            name: name.into(),
            type_name: None,
        }
    }

    /// Only match declarations of this declared type. No effect on offset
    /// locators.
    pub fn with_type_name(mut self, ty: impl Into<String>) -> Self {
        if let DeclarationLocator::Path { type_name, .. } = &mut self {
            *type_name = Some(ty.into());
        }
        self
    }
}

impl fmt::Display for DeclarationLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclarationLocator::Offset(offset) => write!(f, "byte offset {offset}"),
            DeclarationLocator::Path {
                scope_path,
                kind,
                name,
                type_name,
            } => {
                write!(f, "{kind} ")?;
                if !scope_path.is_empty() {
                    write!(f, "{}.", scope_path.join("."))?;
                }
                f.write_str(name)?;
                if let Some(ty) = type_name {
                    write!(f, " of type {ty}")?;
                }
                Ok(())
            }
        }
    }
}

// ============================================================================
// Plan
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollisionVerdict {
    Clear,
    /// The new name hides these outer declarations inside the target's
    /// region, without changing any existing binding.
    ShadowsOuter { declarations: Vec<DeclId> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    pub target: DeclId,
    pub kind: DeclKind,
    pub old_name: String,
    pub new_name: String,
    /// Declaration span and reference spans, sorted and distinct.
    pub spans: Vec<Span>,
    pub verdict: CollisionVerdict,
    /// Hash of the text the plan was computed against.
    pub source_hash: ContentHash,
}

impl RenamePlan {
    /// Renaming to the current name.
    pub fn is_identity(&self) -> bool {
        self.old_name == self.new_name
    }
}

// ============================================================================
// Planner
// ============================================================================

pub struct Planner<'a> {
    tree: &'a ScopeTree,
    bindings: &'a Bindings,
    options: &'a RenameOptions,
}

impl<'a> Planner<'a> {
    pub fn new(tree: &'a ScopeTree, bindings: &'a Bindings, options: &'a RenameOptions) -> Self {
        Planner {
            tree,
            bindings,
            options,
        }
    }

    /// Find the declaration a locator names.
    pub fn locate(&self, locator: &DeclarationLocator) -> RenameResult<DeclId> {
        let not_found = || RenameError::DeclarationNotFound {
            locator: locator.to_string(),
        };

        match locator {
            DeclarationLocator::Offset(offset) => {
                if let Some(decl) = self
                    .tree
                    .declarations()
                    .iter()
                    .find(|d| d.span.contains(*offset))
                {
                    return Ok(decl.id);
                }
                let reference = self.bindings.reference_at(*offset).ok_or_else(not_found)?;
                match &reference.resolution {
                    Resolution::Resolved(decl) => Ok(*decl),
                    Resolution::Ambiguous(_) => Err(RenameError::AmbiguousReference {
                        spans: vec![reference.span],
                    }),
                    Resolution::External(_) | Resolution::Unresolved => Err(not_found()),
                }
            }
            DeclarationLocator::Path {
                scope_path,
                kind,
                name,
                type_name,
            } => {
                let matches: Vec<&Declaration> = self
                    .tree
                    .declarations()
                    .iter()
                    .filter(|d| d.kind == *kind && d.name == *name)
                    .filter(|d| type_name.is_none() || d.type_name == *type_name)
                    .filter(|d| {
                        let path = self.tree.scope_path(d.scope);
                        path.len() == scope_path.len()
                            && path.iter().zip(scope_path).all(|(a, b)| *a == b.as_str())
                    })
                    .collect();
                match matches.as_slice() {
                    [] => Err(not_found()),
                    [decl] => Ok(decl.id),
                    _ => Err(RenameError::AmbiguousDeclaration {
                        locator: locator.to_string(),
                        candidates: matches.iter().map(|d| d.span).collect(),
                    }),
                }
            }
        }
    }

    pub fn plan(
        &self,
        locator: &DeclarationLocator,
        new_name: &str,
        source_hash: ContentHash,
    ) -> RenameResult<RenamePlan> {
        validate_identifier(new_name)?;
        let target = self.locate(locator)?;
        self.plan_for(target, new_name, source_hash)
    }

    /// Plan a rename of a declaration already identified by id.
    pub fn plan_for(
        &self,
        target: DeclId,
        new_name: &str,
        source_hash: ContentHash,
    ) -> RenameResult<RenamePlan> {
        validate_identifier(new_name)?;
        let decl = self
            .tree
            .get_declaration(target)
            .ok_or_else(|| RenameError::DeclarationNotFound {
                locator: target.to_string(),
            })?;

        let uncertain: Vec<Span> = self.bindings.ambiguous_with(target).map(|r| r.span).collect();
        if !uncertain.is_empty() {
            return Err(RenameError::AmbiguousReference { spans: uncertain });
        }

        let verdict = if decl.name == new_name {
            CollisionVerdict::Clear
        } else {
            self.check_collisions(decl, new_name)?
        };

        let mut spans: Vec<Span> = std::iter::once(decl.span)
            .chain(self.bindings.references_to(target).map(|r| r.span))
            .collect();
        spans.sort();
        spans.dedup();

        debug!(
            target = %target,
            kind = decl.kind.as_str(),
            old = %decl.name,
            new = new_name,
            spans = spans.len(),
            "planned rename"
        );

        Ok(RenamePlan {
            target,
            kind: decl.kind,
            old_name: decl.name.clone(),
            new_name: new_name.to_string(),
            spans,
            verdict,
            source_hash,
        })
    }

    // ------------------------------------------------------------------------
    // Collisions
    // ------------------------------------------------------------------------

    fn check_collisions(&self, target: &Declaration, new_name: &str) -> RenameResult<CollisionVerdict> {
        let tree = self.tree;
        let namespace = target.kind.namespace();
        let conflict = |span: Span| RenameError::NameConflict {
            name: new_name.to_string(),
            conflict: span,
        };

        let mut sites = vec![Lookup::Lexical(target.scope)];
        for reference in self.bindings.references_to(target.id) {
            if !sites.contains(&reference.lookup) {
                sites.push(reference.lookup);
            }
        }

        let mut shadowed = BTreeSet::new();
        for site in &sites {
            match *site {
                Lookup::Lexical(scope) => {
                    let Some((found_in, found)) = tree.lookup(scope, new_name, namespace, None) else {
                        continue;
                    };
                    let inside = tree.is_ancestor_or_self(target.scope, found_in);
                    for id in found {
                        let other = tree.declaration(id);
                        if !inside {
                            shadowed.insert(id);
                        } else if found_in != target.scope || clashes(target, other) {
                            return Err(conflict(other.span));
                        }
                    }
                }
                Lookup::Member(ty) => {
                    if let Some(other) = tree
                        .members(ty, new_name, namespace)
                        .into_iter()
                        .map(|id| tree.declaration(id))
                        .find(|other| clashes(target, other))
                    {
                        return Err(conflict(other.span));
                    }
                }
                Lookup::Foreign | Lookup::Opaque => {}
            }
        }

        for reference in self.bindings.references() {
            if let Some(span) = self.captured(target, namespace, new_name, reference) {
                return Err(conflict(span));
            }
        }

        if shadowed.is_empty() {
            return Ok(CollisionVerdict::Clear);
        }
        let declarations: Vec<DeclId> = shadowed.into_iter().collect();
        if self.options.strict_shadowing {
            let first = tree.declaration(declarations[0]);
            return Err(conflict(first.span));
        }
        warn!(
            target = %target.id,
            new = new_name,
            shadowed = declarations.len(),
            "new name shadows outer declarations"
        );
        Ok(CollisionVerdict::ShadowsOuter { declarations })
    }

    /// If renaming `target` would make `reference` bind to it instead of
    /// what it binds to now, the span to report.
    fn captured(
        &self,
        target: &Declaration,
        namespace: Namespace,
        new_name: &str,
        reference: &Reference,
    ) -> Option<Span> {
        let tree = self.tree;
        if reference.name != new_name {
            return None;
        }
        let compatible = reference.namespace == namespace
            || (namespace == Namespace::Type
                && reference.namespace == Namespace::Value
                && !reference.resolution.is_bound());
        if !compatible {
            return None;
        }
        let site = match reference.lookup {
            Lookup::Lexical(site) => site,
            // `receiver.name` on the target's own type finds the renamed
            // member before any inherited one.
            Lookup::Member(ty) if ty == target.scope => {
                return match &reference.resolution {
                    Resolution::External(_) | Resolution::Unresolved => Some(reference.span),
                    Resolution::Resolved(_) | Resolution::Ambiguous(_) => None,
                };
            }
            Lookup::Member(_) | Lookup::Foreign | Lookup::Opaque => return None,
        };
        if !tree.is_ancestor_or_self(target.scope, site) {
            return None;
        }
        if target.kind == DeclKind::Local && reference.span.start < target.span.start {
            return None;
        }

        // Bound to something declared outside the target's scope: the
        // renamed target would be found first.
        let outside = |id: &DeclId| {
            let scope = tree.declaration(*id).scope;
            scope != target.scope && tree.is_ancestor_or_self(scope, target.scope)
        };
        match &reference.resolution {
            Resolution::Resolved(id) if outside(id) => Some(tree.declaration(*id).span),
            Resolution::Ambiguous(ids) => ids
                .iter()
                .find(|id| outside(id))
                .map(|id| tree.declaration(*id).span),
            Resolution::External(_) | Resolution::Unresolved => Some(reference.span),
            Resolution::Resolved(_) => None,
        }
    }
}

/// Two declarations in one scope collide; overloads of different arity
/// do not.
fn clashes(target: &Declaration, other: &Declaration) -> bool {
    if other.id == target.id {
        return false;
    }
    if target.kind != DeclKind::Method || other.kind != DeclKind::Method {
        return true;
    }
    target.arity == other.arity || target.variadic || other.variadic
}

// ============================================================================
// Tests
// ============================================================================
