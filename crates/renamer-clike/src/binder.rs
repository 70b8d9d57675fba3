// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Reference binding.
//!
//! Every identifier token that is not itself a declaration becomes a
//! [`Reference`]. Its [`Resolution`] depends on how it is used:
//!
//! - a bare name resolves innermost-wins from the scope it sits in, in the
//!   namespace its position implies (`name(` is a method, type positions
//!   are types, anything else a value falling back to a type);
//! - `receiver.name` resolves only when the receiver's type is declared in
//!   this file, by looking among that type's own members;
//! - a method name with several overloads in the winning scope is narrowed
//!   by argument count, and stays ambiguous when that does not single one out;
//! - names only another file can explain go to the [`ProjectIndex`].

use std::collections::HashMap;

use tracing::debug;

use renamer_core::patch::Span;

use crate::index::{ExternalDecl, ProjectIndex};
use crate::lexer::{is_type_keyword, Token};
use crate::scope::{DeclId, DeclKind, Declaration, Namespace, ScopeId, ScopeTree};
use crate::syntax::Syntax;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(DeclId),
    /// Overloads the call site cannot choose between.
    Ambiguous(Vec<DeclId>),
    External(ExternalDecl),
    Unresolved,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Resolved(_) => "resolved",
            Resolution::Ambiguous(_) => "ambiguous",
            Resolution::External(_) => "external",
            Resolution::Unresolved => "unresolved",
        }
    }

    /// True when this resolution is, or might be, `decl`.
    pub fn includes(&self, decl: DeclId) -> bool {
        match self {
            Resolution::Resolved(d) => *d == decl,
            Resolution::Ambiguous(candidates) => candidates.contains(&decl),
            _ => false,
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, Resolution::Resolved(_) | Resolution::Ambiguous(_))
    }
}

/// Where a reference's name was looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Bare name, innermost-wins outward from this scope.
    Lexical(ScopeId),
    /// `receiver.name` where the receiver's type body is this scope.
    Member(ScopeId),
    /// `receiver.name` with a receiver this file cannot type.
    Foreign,
    /// `package` and `import` path segments.
    Opaque,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Index of the identifier in the full token stream.
    pub token: usize,
    pub span: Span,
    pub name: String,
    pub scope: ScopeId,
    pub namespace: Namespace,
    pub lookup: Lookup,
    pub resolution: Resolution,
}

/// All references of one file, with postings by declaration.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    references: Vec<Reference>,
    by_decl: HashMap<DeclId, Vec<usize>>,
    ambiguous_by_decl: HashMap<DeclId, Vec<usize>>,
}

impl Bindings {
    /// References in source order.
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// The reference whose span contains `offset`.
    pub fn reference_at(&self, offset: u64) -> Option<&Reference> {
        let i = self
            .references
            .partition_point(|r| r.span.end <= offset);
        self.references
            .get(i)
            .filter(|r| r.span.contains(offset))
    }

    /// References resolved to exactly `decl`.
    pub fn references_to(&self, decl: DeclId) -> impl Iterator<Item = &Reference> {
        self.by_decl
            .get(&decl)
            .into_iter()
            .flatten()
            .map(|&i| &self.references[i])
    }

    /// Ambiguous references that list `decl` among their candidates.
    pub fn ambiguous_with(&self, decl: DeclId) -> impl Iterator<Item = &Reference> {
        self.ambiguous_by_decl
            .get(&decl)
            .into_iter()
            .flatten()
            .map(|&i| &self.references[i])
    }

    fn push(&mut self, reference: Reference) -> usize {
        let i = self.references.len();
        match &reference.resolution {
            Resolution::Resolved(d) => self.by_decl.entry(*d).or_default().push(i),
            Resolution::Ambiguous(candidates) => {
                for d in candidates {
                    self.ambiguous_by_decl.entry(*d).or_default().push(i);
                }
            }
            _ => {}
        }
        self.references.push(reference);
        i
    }
}

/// Bind every reference in `tokens` against `tree`.
pub fn bind(tokens: &[Token<'_>], tree: &ScopeTree, index: &dyn ProjectIndex) -> Bindings {
    let bindings = Binder {
        syntax: tree.syntax(tokens),
        tree,
        index,
        at_position: HashMap::new(),
        bindings: Bindings::default(),
    }
    .run();

    let count = |kind: &str| {
        bindings
            .references()
            .iter()
            .filter(|r| r.resolution.as_str() == kind)
            .count()
    };
    debug!(
        references = bindings.references().len(),
        resolved = count("resolved"),
        ambiguous = count("ambiguous"),
        external = count("external"),
        "bound references"
    );
    bindings
}

// ============================================================================
// Binder
// ============================================================================

/// What a `receiver.` evaluates to.
enum Receiver {
    /// A type declared in this file; its body scope.
    Local(ScopeId),
    /// A type known only by name.
    Named(String),
    /// `super`: the enclosing type's supertypes.
    Inherited(Vec<String>),
    Unknown,
}

struct Binder<'a, 'src> {
    syntax: Syntax<'a, 'src>,
    tree: &'a ScopeTree,
    index: &'a dyn ProjectIndex,
    /// Reference index by significant-token position.
    at_position: HashMap<usize, usize>,
    bindings: Bindings,
}

impl<'a, 'src> Binder<'a, 'src> {
    fn run(mut self) -> Bindings {
        for pos in 0..self.syntax.len() {
            let Some(token) = self.syntax.token(pos) else {
                continue;
            };
            if !token.is_identifier() {
                continue;
            }
            let ti = self.syntax.token_index(pos);
            if self.tree.declaration_at_token(ti).is_some() {
                continue;
            }
            let scope = self.tree.scope_of_token(ti);

            let (namespace, lookup, resolution) = if self.tree.is_opaque(ti) {
                (Namespace::Value, Lookup::Opaque, Resolution::Unresolved)
            } else {
                self.resolve(pos, ti, token.text, token.span.start, scope)
            };

            let i = self.bindings.push(Reference {
                token: ti,
                span: token.span,
                name: token.text.to_string(),
                scope,
                namespace,
                lookup,
                resolution,
            });
            self.at_position.insert(pos, i);
        }
        self.bindings
    }

    fn resolve(
        &self,
        pos: usize,
        ti: usize,
        name: &str,
        offset: u64,
        scope: ScopeId,
    ) -> (Namespace, Lookup, Resolution) {
        let (namespace, arity) = if self.tree.is_type_position(ti) {
            (Namespace::Type, None)
        } else if self.syntax.prev_is_punct(pos, "::") {
            (Namespace::Method, None)
        } else if self.syntax.is_punct(pos + 1, "(") {
            (Namespace::Method, Some(self.syntax.arg_count(pos + 1)))
        } else {
            (Namespace::Value, None)
        };

        let qualified = pos >= 2
            && (self.syntax.prev_is_punct(pos, ".") || self.syntax.prev_is_punct(pos, "::"));
        if qualified {
            let (lookup, resolution) = self.member(pos - 2, name, namespace, arity);
            (namespace, lookup, resolution)
        } else {
            let resolution = self.lexical(scope, name, namespace, arity, offset);
            (namespace, Lookup::Lexical(scope), resolution)
        }
    }

    fn lexical(
        &self,
        scope: ScopeId,
        name: &str,
        namespace: Namespace,
        arity: Option<usize>,
        offset: u64,
    ) -> Resolution {
        if let Some((_, candidates)) = self.tree.lookup(scope, name, namespace, Some(offset)) {
            return self.choose(candidates, arity);
        }
        if namespace == Namespace::Value {
            if let Some((_, candidates)) =
                self.tree.lookup(scope, name, Namespace::Type, Some(offset))
            {
                return self.choose(candidates, None);
            }
        }
        if namespace != Namespace::Type {
            let inherited: Vec<String> = self
                .tree
                .ancestors(scope)
                .flat_map(|s| self.tree.scope(s).supertypes.iter().cloned())
                .collect();
            return self.external(&inherited, name);
        }
        Resolution::Unresolved
    }

    fn member(
        &self,
        receiver: usize,
        name: &str,
        namespace: Namespace,
        arity: Option<usize>,
    ) -> (Lookup, Resolution) {
        match self.receiver(receiver) {
            Receiver::Local(ty) => {
                let mut found = self.tree.members(ty, name, namespace);
                if found.is_empty() && namespace == Namespace::Value {
                    found = self.tree.members(ty, name, Namespace::Type);
                }
                if !found.is_empty() {
                    return (Lookup::Member(ty), self.choose(found, arity));
                }
                let supertypes = &self.tree.scope(ty).supertypes;
                (Lookup::Member(ty), self.external(supertypes, name))
            }
            Receiver::Named(ty) => (Lookup::Foreign, self.external(&[ty], name)),
            Receiver::Inherited(supertypes) => (Lookup::Foreign, self.external(&supertypes, name)),
            Receiver::Unknown => (Lookup::Foreign, Resolution::Unresolved),
        }
    }

    fn external(&self, types: &[String], name: &str) -> Resolution {
        types
            .iter()
            .find_map(|ty| self.index.resolve_external(ty, name))
            .map_or(Resolution::Unresolved, Resolution::External)
    }

    /// Pick among same-scope candidates, narrowing overloads by arity.
    fn choose(&self, candidates: Vec<DeclId>, arity: Option<usize>) -> Resolution {
        if candidates.len() == 1 {
            return Resolution::Resolved(candidates[0]);
        }
        let Some(arity) = arity else {
            return Resolution::Ambiguous(candidates);
        };
        let matching: Vec<DeclId> = candidates
            .iter()
            .copied()
            .filter(|d| accepts(self.tree.declaration(*d), arity))
            .collect();
        match matching.len() {
            1 => Resolution::Resolved(matching[0]),
            0 => Resolution::Ambiguous(candidates),
            _ => Resolution::Ambiguous(matching),
        }
    }

    // ------------------------------------------------------------------------
    // Receivers
    // ------------------------------------------------------------------------

    fn receiver(&self, pos: usize) -> Receiver {
        let Some(token) = self.syntax.token(pos) else {
            return Receiver::Unknown;
        };
        let scope = self.tree.scope_of_token(self.syntax.token_index(pos));

        if token.is_keyword("this") {
            // `Outer.this`
            if pos >= 2 && self.syntax.prev_is_punct(pos, ".") {
                return match self.receiver(pos - 2) {
                    Receiver::Local(ty) => Receiver::Local(ty),
                    _ => Receiver::Unknown,
                };
            }
            return self
                .tree
                .enclosing_type(scope)
                .map_or(Receiver::Unknown, Receiver::Local);
        }
        if token.is_keyword("super") {
            return self
                .tree
                .enclosing_type(scope)
                .map_or(Receiver::Unknown, |ty| {
                    Receiver::Inherited(self.tree.scope(ty).supertypes.clone())
                });
        }
        if token.is_identifier() {
            return match self.resolution_at(pos) {
                Some(Resolution::Resolved(d)) => self.receiver_of(self.tree.declaration(*d)),
                _ => Receiver::Unknown,
            };
        }
        if token.is_punct(")") {
            let callee = self.syntax.partner(pos).and_then(|open| open.checked_sub(1));
            if let Some(Resolution::Resolved(d)) = callee.and_then(|c| self.resolution_at(c)) {
                let decl = self.tree.declaration(*d);
                if decl.kind == DeclKind::Method {
                    return decl
                        .type_name
                        .as_deref()
                        .map_or(Receiver::Unknown, |t| self.typed(t, decl.scope));
                }
            }
        }
        Receiver::Unknown
    }

    fn resolution_at(&self, pos: usize) -> Option<&Resolution> {
        self.at_position
            .get(&pos)
            .map(|&i| &self.bindings.references[i].resolution)
    }

    fn receiver_of(&self, decl: &Declaration) -> Receiver {
        match decl.kind {
            DeclKind::Type => decl.body.map_or(Receiver::Unknown, Receiver::Local),
            DeclKind::Field | DeclKind::Local | DeclKind::Parameter => decl
                .type_name
                .as_deref()
                .map_or(Receiver::Unknown, |t| self.typed(t, decl.scope)),
            DeclKind::Method => Receiver::Unknown,
        }
    }

    /// Resolve a declared type name as seen from `scope`.
    fn typed(&self, type_name: &str, scope: ScopeId) -> Receiver {
        if type_name.ends_with("[]") || is_type_keyword(type_name) {
            return Receiver::Unknown;
        }
        match self.tree.lookup(scope, type_name, Namespace::Type, None) {
            Some((_, candidates)) if candidates.len() == 1 => self
                .tree
                .declaration(candidates[0])
                .body
                .map_or(Receiver::Unknown, Receiver::Local),
            Some(_) => Receiver::Unknown,
            None => Receiver::Named(type_name.to_string()),
        }
    }
}

/// A method with this declaration accepts `arity` arguments.
fn accepts(decl: &Declaration, arity: usize) -> bool {
    match decl.arity {
        Some(n) if decl.variadic => arity + 1 >= n,
        Some(n) => n == arity,
        None => false,
    }
}

// ============================================================================
// Tests
// ============================================================================
