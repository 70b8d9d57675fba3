// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Scope tree and declaration table.
//!
//! [`ScopeTree::build`] walks the significant tokens once and records:
//!
//! - a tree of [`Scope`]s (file, type, method, block), each with the byte
//!   span it covers and a symbol table of the names declared directly in it;
//! - every [`Declaration`] (type, field, method, parameter, local) with the
//!   span of its name token;
//! - the scope each token belongs to;
//! - which identifier tokens stand in type position (`new Foo`, `Foo x`,
//!   `extends Foo`, `@Foo`) and which are opaque (`package`/`import` paths).
//!
//! Inheritance clauses are recorded by name on the type scope; nothing here
//! resolves them.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use renamer_core::patch::Span;

use crate::lexer::{Token, TokenKind};
use crate::syntax::{StructuralParseError, Syntax, SyntaxIndex, TypeRun};

// ============================================================================
// Ids and kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(pub u32);

impl ScopeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeclId(pub u32);

impl DeclId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decl_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    File,
    Type,
    Method,
    Block,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::File => "file",
            ScopeKind::Type => "type",
            ScopeKind::Method => "method",
            ScopeKind::Block => "block",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    Type,
    Field,
    Method,
    Parameter,
    Local,
}

impl DeclKind {
    pub const ALL: [DeclKind; 5] = [
        DeclKind::Type,
        DeclKind::Field,
        DeclKind::Method,
        DeclKind::Parameter,
        DeclKind::Local,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeclKind::Type => "type",
            DeclKind::Field => "field",
            DeclKind::Method => "method",
            DeclKind::Parameter => "parameter",
            DeclKind::Local => "local",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "type" => Some(DeclKind::Type),
            "field" => Some(DeclKind::Field),
            "method" => Some(DeclKind::Method),
            "parameter" => Some(DeclKind::Parameter),
            "local" => Some(DeclKind::Local),
            _ => None,
        }
    }

    pub fn namespace(&self) -> Namespace {
        match self {
            DeclKind::Type => Namespace::Type,
            DeclKind::Method => Namespace::Method,
            DeclKind::Field | DeclKind::Parameter | DeclKind::Local => Namespace::Value,
        }
    }
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names in different namespaces never shadow each other: a field `size`
/// and a method `size()` coexist in one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Type,
    Method,
    Value,
}

// ============================================================================
// Scopes and declarations
// ============================================================================

#[derive(Debug, Clone)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    /// Type or method name; `None` for the file, blocks and anonymous types.
    pub name: Option<String>,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub span: Span,
    /// Declarations made directly in this scope, by name, in source order.
    pub symbols: BTreeMap<String, Vec<DeclId>>,
    /// Names from `extends`/`implements`/`permits`, unresolved.
    pub supertypes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub id: DeclId,
    pub kind: DeclKind,
    pub name: String,
    /// Scope the name is declared in (a method's is its type's scope).
    pub scope: ScopeId,
    /// Span of the declaring name token.
    pub span: Span,
    /// Index of the name token in the full token stream.
    pub token: usize,
    /// Declared type of a variable, or return type of a method.
    pub type_name: Option<String>,
    /// Parameter count, for methods.
    pub arity: Option<usize>,
    pub variadic: bool,
    /// Scope a type or method opens.
    pub body: Option<ScopeId>,
}

// ============================================================================
// Scope tree
// ============================================================================

#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    decls: Vec<Declaration>,
    /// Scope of every token, trivia included.
    token_scopes: Vec<ScopeId>,
    decl_tokens: HashMap<usize, DeclId>,
    type_positions: BTreeSet<usize>,
    opaque: BTreeSet<usize>,
    index: SyntaxIndex,
}

impl ScopeTree {
    /// Build the scope tree for a token stream from [`crate::lexer::tokenize`].
    pub fn build(tokens: &[Token<'_>]) -> Result<Self, StructuralParseError> {
        let index = SyntaxIndex::build(tokens)?;
        let mut tree = ScopeBuilder::new(tokens, &index).run();
        tree.index = index;
        debug!(
            scopes = tree.scopes.len(),
            declarations = tree.decls.len(),
            "built scope tree"
        );
        Ok(tree)
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn declaration(&self, id: DeclId) -> &Declaration {
        &self.decls[id.index()]
    }

    pub fn get_declaration(&self, id: DeclId) -> Option<&Declaration> {
        self.decls.get(id.index())
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.decls
    }

    pub fn scope_of_token(&self, token: usize) -> ScopeId {
        self.token_scopes.get(token).copied().unwrap_or(ScopeId(0))
    }

    pub fn declaration_at_token(&self, token: usize) -> Option<DeclId> {
        self.decl_tokens.get(&token).copied()
    }

    pub fn is_type_position(&self, token: usize) -> bool {
        self.type_positions.contains(&token)
    }

    pub fn is_opaque(&self, token: usize) -> bool {
        self.opaque.contains(&token)
    }

    /// Structural view over `tokens`, which must be the stream this tree
    /// was built from.
    pub fn syntax<'a, 'src>(&'a self, tokens: &'a [Token<'src>]) -> Syntax<'a, 'src> {
        Syntax::new(tokens, &self.index)
    }

    /// `scope` and its ancestors, innermost first.
    pub fn ancestors(&self, scope: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(scope), move |s| self.scope(*s).parent)
    }

    pub fn is_ancestor_or_self(&self, ancestor: ScopeId, scope: ScopeId) -> bool {
        self.ancestors(scope).any(|s| s == ancestor)
    }

    pub fn enclosing_type(&self, scope: ScopeId) -> Option<ScopeId> {
        self.ancestors(scope)
            .find(|s| self.scope(*s).kind == ScopeKind::Type)
    }

    /// Names of the named scopes from the file down to `scope`, e.g.
    /// `["Outer", "Inner", "run"]`. Blocks and anonymous types are skipped.
    pub fn scope_path(&self, scope: ScopeId) -> Vec<&str> {
        let mut path: Vec<&str> = self
            .ancestors(scope)
            .filter_map(|s| self.scope(s).name.as_deref())
            .collect();
        path.reverse();
        path
    }

    /// Locals are only visible after their declaration.
    fn visible_at(&self, decl: &Declaration, at: Option<u64>) -> bool {
        match (decl.kind, at) {
            (DeclKind::Local, Some(offset)) => decl.span.start <= offset,
            _ => true,
        }
    }

    /// Declarations of `name` in `namespace` made directly in `scope`.
    pub fn declared_in(&self, scope: ScopeId, name: &str, namespace: Namespace) -> Vec<DeclId> {
        self.scope(scope)
            .symbols
            .get(name)
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|id| self.declaration(*id).kind.namespace() == namespace)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Innermost-wins lookup of `name` starting at `scope`.
    ///
    /// Returns the nearest scope declaring `name` in `namespace` together with
    /// all of its matching declarations (several for overloads). With `at`,
    /// locals declared after that offset are invisible.
    pub fn lookup(
        &self,
        scope: ScopeId,
        name: &str,
        namespace: Namespace,
        at: Option<u64>,
    ) -> Option<(ScopeId, Vec<DeclId>)> {
        self.ancestors(scope).find_map(|s| {
            let found: Vec<DeclId> = self
                .declared_in(s, name, namespace)
                .into_iter()
                .filter(|id| self.visible_at(self.declaration(*id), at))
                .collect();
            (!found.is_empty()).then_some((s, found))
        })
    }

    /// Members named `name` declared directly in the type scope.
    pub fn members(&self, type_scope: ScopeId, name: &str, namespace: Namespace) -> Vec<DeclId> {
        self.declared_in(type_scope, name, namespace)
    }
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Frame {
    scope: ScopeId,
    /// Last position covered by the scope.
    end: usize,
    /// Paren depth at which the scope opened.
    paren_base: usize,
    /// Inside an enum body, before the `;` ending its constants.
    enum_constants: bool,
}

/// A declaration statement in progress; `, name` adds another declarator.
#[derive(Debug, Clone)]
struct Declarators {
    kind: DeclKind,
    type_name: Option<String>,
    paren_depth: usize,
    frame_depth: usize,
}

struct ScopeBuilder<'a, 'src> {
    syntax: Syntax<'a, 'src>,
    tokens: &'a [Token<'src>],
    scopes: Vec<Scope>,
    decls: Vec<Declaration>,
    token_scopes: Vec<Option<ScopeId>>,
    decl_tokens: HashMap<usize, DeclId>,
    type_positions: BTreeSet<usize>,
    opaque: BTreeSet<usize>,
    stack: Vec<Frame>,
    /// Body braces already covered by a header scope.
    claimed_braces: HashSet<usize>,
    paren_depth: usize,
    declarators: Option<Declarators>,
}

impl<'a, 'src> ScopeBuilder<'a, 'src> {
    fn new(tokens: &'a [Token<'src>], index: &'a SyntaxIndex) -> Self {
        let file_end = tokens.last().map_or(0, |t| t.span.end);
        let root = Scope {
            id: ScopeId(0),
            kind: ScopeKind::File,
            name: None,
            parent: None,
            children: Vec::new(),
            span: Span::new(0, file_end),
            symbols: BTreeMap::new(),
            supertypes: Vec::new(),
        };
        ScopeBuilder {
            syntax: Syntax::new(tokens, index),
            tokens,
            scopes: vec![root],
            decls: Vec::new(),
            token_scopes: vec![None; tokens.len()],
            decl_tokens: HashMap::new(),
            type_positions: BTreeSet::new(),
            opaque: BTreeSet::new(),
            stack: vec![Frame {
                scope: ScopeId(0),
                end: usize::MAX,
                paren_base: 0,
                enum_constants: false,
            }],
            claimed_braces: HashSet::new(),
            paren_depth: 0,
            declarators: None,
        }
    }

    fn run(mut self) -> ScopeTree {
        let n = self.syntax.len();
        let mut pos = 0;
        while pos < n {
            self.close_frames(pos);
            let scope = self.current().scope;
            self.assign(pos, scope);
            pos = self.step(pos);
        }
        self.finish()
    }

    fn finish(self) -> ScopeTree {
        let mut last = ScopeId(0);
        let token_scopes = self
            .token_scopes
            .iter()
            .map(|s| {
                if let Some(s) = s {
                    last = *s;
                }
                last
            })
            .collect();
        ScopeTree {
            scopes: self.scopes,
            decls: self.decls,
            token_scopes,
            decl_tokens: self.decl_tokens,
            type_positions: self.type_positions,
            opaque: self.opaque,
            index: SyntaxIndex::default(),
        }
    }

    // ------------------------------------------------------------------------
    // Bookkeeping
    // ------------------------------------------------------------------------

    fn current(&self) -> Frame {
        self.stack[self.stack.len() - 1]
    }

    fn close_frames(&mut self, pos: usize) {
        while self.stack.len() > 1 && self.current().end < pos {
            self.stack.pop();
        }
    }

    fn push_frame(&mut self, scope: ScopeId, end: usize) {
        self.stack.push(Frame {
            scope,
            end,
            paren_base: self.paren_depth,
            enum_constants: false,
        });
    }

    fn assign(&mut self, pos: usize, scope: ScopeId) {
        if pos < self.syntax.len() {
            let ti = self.syntax.token_index(pos);
            self.token_scopes[ti] = Some(scope);
        }
    }

    fn assign_range(&mut self, from: usize, to: usize, scope: ScopeId) {
        for pos in from..=to {
            self.assign(pos, scope);
        }
    }

    fn span_between(&self, from: usize, to: usize) -> Span {
        let start = self.syntax.token(from).map_or(0, |t| t.span.start);
        let end = self.syntax.token(to).map_or(start, |t| t.span.end);
        Span::new(start, end.max(start))
    }

    fn new_scope(&mut self, kind: ScopeKind, name: Option<String>, span: Span) -> ScopeId {
        let parent = self.current().scope;
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            id,
            kind,
            name,
            parent: Some(parent),
            children: Vec::new(),
            span,
            symbols: BTreeMap::new(),
            supertypes: Vec::new(),
        });
        self.scopes[parent.index()].children.push(id);
        id
    }

    fn declare(
        &mut self,
        kind: DeclKind,
        pos: usize,
        scope: ScopeId,
        type_name: Option<String>,
    ) -> DeclId {
        let ti = self.syntax.token_index(pos);
        let token = &self.tokens[ti];
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(Declaration {
            id,
            kind,
            name: token.text.to_string(),
            scope,
            span: token.span,
            token: ti,
            type_name,
            arity: None,
            variadic: false,
            body: None,
        });
        self.scopes[scope.index()]
            .symbols
            .entry(token.text.to_string())
            .or_default()
            .push(id);
        self.decl_tokens.insert(ti, id);
        id
    }

    fn mark_type(&mut self, pos: usize) {
        if self.syntax.is_ident(pos) {
            self.type_positions.insert(self.syntax.token_index(pos));
        }
    }

    /// Mark a possibly qualified, possibly generic type name starting at `pos`.
    fn mark_type_name(&mut self, pos: usize) {
        let mut p = pos;
        while self.syntax.is_ident(p) {
            self.mark_type(p);
            if self.syntax.is_punct(p + 1, ".") && self.syntax.is_ident(p + 2) {
                p += 2;
            } else {
                break;
            }
        }
        if self.syntax.is_punct(p + 1, "<") {
            if let Some(close) = self.syntax.angle_close(p + 1) {
                for q in p + 2..close {
                    self.mark_type(q);
                }
            }
        }
    }

    /// Type named by `run`, `[]`-suffixed for arrays. `var` has none.
    fn base_type_name(&self, run: &TypeRun) -> Option<String> {
        let base = self.syntax.text(run.simple.unwrap_or(run.start));
        match base {
            "var" => None,
            _ if run.array => Some(format!("{base}[]")),
            _ => Some(base.to_string()),
        }
    }

    /// Declared type of the name at `name_pos`.
    fn type_name(&self, run: &TypeRun, name_pos: usize) -> Option<String> {
        self.base_type_name(run).map(|t| self.with_dims(t, name_pos))
    }

    /// Apply C-style dimensions written after the name, as in `int a[]`.
    fn with_dims(&self, type_name: String, name_pos: usize) -> String {
        let dims = self.syntax.is_punct(name_pos + 1, "[") && self.syntax.is_punct(name_pos + 2, "]");
        if dims && !type_name.ends_with("[]") {
            format!("{type_name}[]")
        } else {
            type_name
        }
    }

    fn is_declarator_end(&self, pos: usize) -> bool {
        let s = &self.syntax;
        ["=", ";", ",", ":", ")"].iter().any(|p| s.is_punct(pos, p))
            || (s.is_punct(pos, "[") && s.is_punct(pos + 1, "]"))
    }

    fn is_catch_parameter(&self, type_start: usize) -> bool {
        (self.syntax.prev_is_punct(type_start, "(")
            && type_start >= 2
            && self.syntax.is_kw(type_start - 2, "catch"))
            || self.syntax.prev_is_punct(type_start, "|")
    }

    /// `case A, B ->` labels look like lambda parameters.
    fn is_case_label(&self, pos: usize) -> bool {
        let mut q = pos;
        while let Some(prev) = q.checked_sub(1) {
            if self.syntax.is_kw(prev, "case") {
                return true;
            }
            let Some(token) = self.syntax.token(prev) else {
                return false;
            };
            let continues = token.is_identifier()
                || token.is_punct(",")
                || token.is_punct(".")
                || matches!(
                    token.kind,
                    TokenKind::Number | TokenKind::StringLiteral
                );
            if !continues {
                return false;
            }
            q = prev;
        }
        false
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    fn step(&mut self, pos: usize) -> usize {
        let Some(token) = self.syntax.token(pos) else {
            return pos + 1;
        };
        match token.kind {
            TokenKind::Keyword => self.keyword(pos, token.text),
            TokenKind::Punctuation => self.punctuation(pos, token.text),
            TokenKind::Identifier => self.identifier(pos),
            _ => pos + 1,
        }
    }

    fn keyword(&mut self, pos: usize, text: &str) -> usize {
        let scope = self.current().scope;
        match text {
            "package" | "import" if self.scopes[scope.index()].kind == ScopeKind::File => {
                let n = self.syntax.len();
                let end = (pos..n)
                    .find(|&p| self.syntax.is_punct(p, ";"))
                    .unwrap_or(n - 1);
                for p in pos + 1..=end {
                    self.assign(p, scope);
                    if self.syntax.is_ident(p) {
                        self.opaque.insert(self.syntax.token_index(p));
                    }
                }
                end + 1
            }
            "class" | "interface" | "enum" | "record"
                if self.syntax.is_ident(pos + 1) && !self.syntax.prev_is_punct(pos, ".") =>
            {
                self.type_declaration(pos)
            }
            "for" | "catch" | "try" if self.syntax.is_punct(pos + 1, "(") => {
                self.header_scope(pos)
            }
            "new" | "instanceof" => {
                self.mark_type_name(pos + 1);
                pos + 1
            }
            _ => pos + 1,
        }
    }

    fn punctuation(&mut self, pos: usize, text: &str) -> usize {
        match text {
            "(" => {
                let is_lambda = self
                    .syntax
                    .partner(pos)
                    .is_some_and(|close| self.syntax.is_punct(close + 1, "->"));
                if is_lambda {
                    return self.lambda(pos);
                }
                self.paren_depth += 1;
                pos + 1
            }
            "[" => {
                self.paren_depth += 1;
                pos + 1
            }
            ")" | "]" => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
                if self
                    .declarators
                    .as_ref()
                    .is_some_and(|d| self.paren_depth < d.paren_depth)
                {
                    self.declarators = None;
                }
                pos + 1
            }
            "{" => self.open_brace(pos),
            ";" => {
                if self
                    .declarators
                    .as_ref()
                    .is_some_and(|d| d.paren_depth == self.paren_depth)
                {
                    self.declarators = None;
                }
                let depth = self.paren_depth;
                if let Some(frame) = self.stack.last_mut() {
                    if frame.enum_constants && depth == frame.paren_base {
                        frame.enum_constants = false;
                    }
                }
                pos + 1
            }
            "@" => {
                if self.syntax.is_ident(pos + 1) {
                    self.mark_type_name(pos + 1);
                }
                pos + 1
            }
            "," => self.comma(pos),
            _ => pos + 1,
        }
    }

    fn comma(&mut self, pos: usize) -> usize {
        let Some(d) = self.declarators.clone() else {
            return pos + 1;
        };
        if d.paren_depth == self.paren_depth
            && d.frame_depth == self.stack.len()
            && self.syntax.is_ident(pos + 1)
            && self.is_declarator_end(pos + 2)
        {
            let scope = self.current().scope;
            let type_name = d.type_name.map(|t| self.with_dims(t, pos + 1));
            self.assign(pos + 1, scope);
            self.declare(d.kind, pos + 1, scope, type_name);
            return pos + 2;
        }
        pos + 1
    }

    fn identifier(&mut self, pos: usize) -> usize {
        let frame = self.current();
        let scope = frame.scope;
        let scope_kind = self.scopes[scope.index()].kind;
        let at_base = self.paren_depth == frame.paren_base;

        if self.syntax.is_punct(pos + 1, "->") && !self.is_case_label(pos) {
            return self.lambda(pos);
        }

        if frame.enum_constants
            && at_base
            && (self.syntax.prev_is_punct(pos, "{") || self.syntax.prev_is_punct(pos, ","))
        {
            let type_name = self.scopes[scope.index()].name.clone();
            self.declare(DeclKind::Field, pos, scope, type_name);
            return pos + 1;
        }

        if scope_kind == ScopeKind::Type && at_base && self.syntax.is_punct(pos + 1, "(") {
            match self.syntax.type_before(pos) {
                Some(run) if self.syntax.starts_statement(run.start) => {
                    return self.method_declaration(pos, Some(run));
                }
                None if self.scopes[scope.index()].name.as_deref()
                    == Some(self.syntax.text(pos))
                    && self.syntax.starts_statement(pos) =>
                {
                    return self.method_declaration(pos, None);
                }
                _ => {}
            }
        }

        if self.is_declarator_end(pos + 1) {
            if let Some(run) = self.syntax.type_before(pos) {
                if self.syntax.starts_statement(run.start) {
                    let kind = if scope_kind == ScopeKind::Type && at_base {
                        DeclKind::Field
                    } else if self.is_catch_parameter(run.start) {
                        DeclKind::Parameter
                    } else {
                        DeclKind::Local
                    };
                    for &p in &run.idents {
                        self.mark_type(p);
                    }
                    let type_name = self.type_name(&run, pos);
                    self.declare(kind, pos, scope, type_name);
                    self.declarators = Some(Declarators {
                        kind,
                        type_name: self.base_type_name(&run),
                        paren_depth: self.paren_depth,
                        frame_depth: self.stack.len(),
                    });
                }
            }
        }
        pos + 1
    }

    // ------------------------------------------------------------------------
    // Scope openers
    // ------------------------------------------------------------------------

    /// `class`/`interface`/`enum`/`record` at `pos`, name at `pos + 1`.
    fn type_declaration(&mut self, pos: usize) -> usize {
        let n = self.syntax.len();
        let name_pos = pos + 1;
        let outer = self.current().scope;
        let is_enum = self.syntax.is_kw(pos, "enum");
        self.assign(name_pos, outer);
        let decl = self.declare(DeclKind::Type, name_pos, outer, None);

        let mut q = name_pos + 1;
        let mut type_params = Vec::new();
        if self.syntax.is_punct(q, "<") {
            if let Some(close) = self.syntax.angle_close(q) {
                let mut depth = 0usize;
                for p in q..=close {
                    if self.syntax.is_punct(p, "<") {
                        depth += 1;
                    } else if self.syntax.is_punct(p, ">") {
                        depth = depth.saturating_sub(1);
                    } else if self.syntax.is_ident(p) {
                        let starts_param =
                            self.syntax.prev_is_punct(p, "<") || self.syntax.prev_is_punct(p, ",");
                        if depth == 1 && starts_param {
                            type_params.push(p);
                        } else {
                            self.mark_type(p);
                        }
                    }
                }
                q = close + 1;
            }
        }

        let components = if self.syntax.is_punct(q, "(") {
            let open = q;
            q = self.syntax.partner(q).map_or(q + 1, |c| c + 1);
            Some(open)
        } else {
            None
        };

        let mut supertypes = Vec::new();
        let mut in_clause = false;
        let mut angle = 0usize;
        while q < n && !self.syntax.is_punct(q, "{") && !self.syntax.is_punct(q, ";") {
            if ["extends", "implements", "permits"]
                .iter()
                .any(|k| self.syntax.is_kw(q, k))
            {
                in_clause = true;
            } else if self.syntax.is_punct(q, "<") {
                angle += 1;
            } else if self.syntax.is_punct(q, ">") {
                angle = angle.saturating_sub(1);
            } else if self.syntax.is_ident(q) {
                self.mark_type(q);
                if in_clause && angle == 0 && !self.syntax.is_punct(q + 1, ".") {
                    supertypes.push(self.syntax.text(q).to_string());
                }
            }
            q += 1;
        }

        if !self.syntax.is_punct(q, "{") {
            return name_pos + 1;
        }
        let body = q;
        let end = self.syntax.partner(body).unwrap_or(n - 1);
        let name = self.syntax.text(name_pos).to_string();
        let span = self.span_between(name_pos, end);
        let tscope = self.new_scope(ScopeKind::Type, Some(name), span);
        self.scopes[tscope.index()].supertypes = supertypes;
        self.decls[decl.index()].body = Some(tscope);

        self.push_frame(tscope, end);
        if let Some(frame) = self.stack.last_mut() {
            frame.enum_constants = is_enum;
        }
        self.assign_range(name_pos + 1, body, tscope);
        for p in type_params {
            self.declare(DeclKind::Type, p, tscope, None);
        }
        if let Some(open) = components {
            for (a, b) in self.syntax.segments(open, true) {
                self.parameter(a, b, tscope, DeclKind::Field);
            }
        }
        body + 1
    }

    /// Method or constructor named at `pos`; `run` is the return type, absent
    /// for constructors.
    fn method_declaration(&mut self, pos: usize, run: Option<TypeRun>) -> usize {
        let n = self.syntax.len();
        let type_scope = self.current().scope;
        let open = pos + 1;
        let Some(close) = self.syntax.partner(open) else {
            return pos + 1;
        };

        let mut q = close + 1;
        let mut in_throws = false;
        while q < n && !self.syntax.is_punct(q, "{") && !self.syntax.is_punct(q, ";") {
            if self.syntax.is_kw(q, "throws") {
                in_throws = true;
            } else if in_throws {
                self.mark_type(q);
            }
            if self.syntax.is_opener(q) {
                q = self.syntax.partner(q).map_or(n, |c| c + 1);
                continue;
            }
            q += 1;
        }
        let end = if self.syntax.is_punct(q, "{") {
            self.syntax.partner(q).unwrap_or(n - 1)
        } else {
            q.min(n - 1)
        };

        // `<T, U>` before the return type
        let generics = run
            .as_ref()
            .and_then(|r| r.start.checked_sub(1))
            .filter(|&p| self.syntax.is_punct(p, ">"))
            .and_then(|p| self.syntax.angle_open(p).map(|o| (o, p)));

        let segments = self.syntax.segments(open, true);
        let variadic = segments
            .iter()
            .any(|&(a, b)| (a..=b).any(|p| self.syntax.is_punct(p, "...")));
        let name = self.syntax.text(pos).to_string();
        let span_start = generics.map_or(open, |(o, _)| o);
        let mscope = self.new_scope(ScopeKind::Method, Some(name), self.span_between(span_start, end));

        match &run {
            Some(run) => {
                for &p in &run.idents {
                    self.mark_type(p);
                }
                let type_name = self.type_name(run, pos);
                let id = self.declare(DeclKind::Method, pos, type_scope, type_name);
                let decl = &mut self.decls[id.index()];
                decl.arity = Some(segments.len());
                decl.variadic = variadic;
                decl.body = Some(mscope);
            }
            // constructor names refer to their type
            None => self.mark_type(pos),
        }

        self.push_frame(mscope, end);
        if let Some((o, c)) = generics {
            self.assign_range(o, pos - 1, mscope);
            for p in o + 1..c {
                let starts_param = self.syntax.prev_is_punct(p, "<") || self.syntax.prev_is_punct(p, ",");
                if self.syntax.is_ident(p) && starts_param {
                    self.declare(DeclKind::Type, p, mscope, None);
                    self.type_positions.remove(&self.syntax.token_index(p));
                }
            }
        }
        self.assign_range(open, q.min(n - 1), mscope);
        for (a, b) in segments {
            self.parameter(a, b, mscope, DeclKind::Parameter);
        }
        q + 1
    }

    /// One parameter (or record component) occupying positions `a..=b`.
    fn parameter(&mut self, a: usize, b: usize, scope: ScopeId, kind: DeclKind) {
        let mut q = b;
        while q > a && (self.syntax.is_punct(q, "]") || self.syntax.is_punct(q, "[")) {
            q -= 1;
        }
        if !self.syntax.is_ident(q) {
            return;
        }

        let mut p = a;
        while p < q {
            if self.syntax.is_punct(p, "@") {
                p += 1;
                while self.syntax.is_ident(p) {
                    self.mark_type(p);
                    if self.syntax.is_punct(p + 1, ".") {
                        p += 2;
                    } else {
                        p += 1;
                        break;
                    }
                }
                if self.syntax.is_punct(p, "(") {
                    p = self.syntax.partner(p).map_or(p + 1, |c| c + 1);
                }
                continue;
            }
            if self.syntax.is_opener(p) {
                p = self.syntax.partner(p).map_or(p + 1, |c| c + 1);
                continue;
            }
            self.mark_type(p);
            p += 1;
        }

        let type_name = self
            .syntax
            .type_before(q)
            .and_then(|run| self.type_name(&run, q));
        self.declare(kind, q, scope, type_name);
    }

    /// `for (`, `catch (` and `try (` open a block covering the header and
    /// the statement it governs.
    fn header_scope(&mut self, pos: usize) -> usize {
        let open = pos + 1;
        let Some(close) = self.syntax.partner(open) else {
            return pos + 1;
        };
        let body = close + 1;
        let braced = self.syntax.is_punct(body, "{");
        let end = if self.syntax.is_kw(pos, "for") || !braced {
            self.syntax.statement_end(body)
        } else {
            self.syntax.partner(body).unwrap_or(body)
        };
        let scope = self.new_scope(ScopeKind::Block, None, self.span_between(pos, end));
        self.push_frame(scope, end);
        self.assign(pos, scope);
        if braced {
            self.claimed_braces.insert(body);
        }
        pos + 1
    }

    /// Lambda whose parameters start at `pos`: a bare identifier or a `(`.
    fn lambda(&mut self, pos: usize) -> usize {
        let n = self.syntax.len();
        let (arrow, params) = if self.syntax.is_ident(pos) {
            (pos + 1, None)
        } else {
            match self.syntax.partner(pos) {
                Some(close) => (close + 1, Some(pos)),
                None => return pos + 1,
            }
        };
        let body = arrow + 1;
        let braced = self.syntax.is_punct(body, "{");
        let end = if braced {
            self.syntax.partner(body).unwrap_or(n - 1)
        } else {
            self.syntax.expression_end(body)
        };

        let scope = self.new_scope(ScopeKind::Block, None, self.span_between(pos, end));
        self.push_frame(scope, end);
        self.assign_range(pos, arrow, scope);
        match params {
            None => {
                self.declare(DeclKind::Parameter, pos, scope, None);
            }
            Some(open) => {
                for (a, b) in self.syntax.segments(open, true) {
                    self.parameter(a, b, scope, DeclKind::Parameter);
                }
            }
        }
        if braced {
            self.claimed_braces.insert(body);
        }
        arrow + 1
    }

    fn open_brace(&mut self, pos: usize) -> usize {
        if self.claimed_braces.remove(&pos) {
            return pos + 1;
        }
        let n = self.syntax.len();
        let end = self.syntax.partner(pos).unwrap_or(n - 1);
        let frame = self.current();

        let (kind, supertypes) = if let Some(base) = self.anonymous_supertype(pos) {
            (ScopeKind::Type, vec![base])
        } else if frame.enum_constants && self.paren_depth == frame.paren_base {
            let base = self.scopes[frame.scope.index()].name.clone();
            (ScopeKind::Type, base.into_iter().collect())
        } else {
            (ScopeKind::Block, Vec::new())
        };

        let scope = self.new_scope(kind, None, self.span_between(pos, end));
        self.scopes[scope.index()].supertypes = supertypes;
        self.push_frame(scope, end);
        self.assign(pos, scope);
        pos + 1
    }

    /// `new Base(...) {` opens an anonymous type extending `Base`.
    fn anonymous_supertype(&self, brace: usize) -> Option<String> {
        let close = brace.checked_sub(1)?;
        if !self.syntax.is_punct(close, ")") {
            return None;
        }
        let open = self.syntax.partner(close)?;
        let run = self.syntax.type_before(open)?;
        if !self.syntax.prev_is_kw(run.start, "new") {
            return None;
        }
        run.simple.map(|p| self.syntax.text(p).to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    const FIXTURE: &str = include_str!("../tests/fixtures/identifiers.java");

    fn build(source: &str) -> (Vec<Token<'_>>, ScopeTree) {
        let tokens = tokenize(source).unwrap();
        let tree = ScopeTree::build(&tokens).unwrap();
        (tokens, tree)
    }

    fn decls<'t>(tree: &'t ScopeTree, name: &str) -> Vec<&'t Declaration> {
        tree.declarations().iter().filter(|d| d.name == name).collect()
    }

    fn one<'t>(tree: &'t ScopeTree, name: &str) -> &'t Declaration {
        let found = decls(tree, name);
        assert_eq!(found.len(), 1, "expected one declaration of {name}");
        found[0]
    }

    fn summary(tree: &ScopeTree) -> Vec<(String, DeclKind)> {
        tree.declarations()
            .iter()
            .map(|d| (d.name.clone(), d.kind))
            .collect()
    }

    mod fixture {
        use super::*;

        #[test]
        fn declarations_in_order() {
            let (_, tree) = build(FIXTURE);
            assert_eq!(
                summary(&tree),
                vec![
                    ("LightningOvercharge".to_string(), DeclKind::Type),
                    ("charge".to_string(), DeclKind::Field),
                    ("number".to_string(), DeclKind::Field),
                    ("onSpawn".to_string(), DeclKind::Method),
                    ("me".to_string(), DeclKind::Parameter),
                ]
            );
        }

        #[test]
        fn supertype_is_recorded_by_name() {
            let (_, tree) = build(FIXTURE);
            let ty = one(&tree, "LightningOvercharge");
            let body = tree.scope(ty.body.unwrap());
            assert_eq!(body.kind, ScopeKind::Type);
            assert_eq!(body.supertypes, vec!["Lightning".to_string()]);
        }

        #[test]
        fn import_paths_are_opaque() {
            let (tokens, tree) = build(FIXTURE);
            let opaque: Vec<_> = tokens
                .iter()
                .enumerate()
                .filter(|(i, _)| tree.is_opaque(*i))
                .map(|(_, t)| t.text)
                .collect();
            assert!(opaque.contains(&"ResourceLoader"));
            assert!(opaque.contains(&"loadIcon"));
            assert!(opaque.contains(&"lightning"));
        }

        #[test]
        fn method_metadata() {
            let (_, tree) = build(FIXTURE);
            let method = one(&tree, "onSpawn");
            assert_eq!(method.arity, Some(1));
            assert_eq!(method.type_name.as_deref(), Some("void"));
            let body = tree.scope(method.body.unwrap());
            assert_eq!(body.kind, ScopeKind::Method);
            assert_eq!(tree.scope_path(body.id), vec!["LightningOvercharge", "onSpawn"]);
            let me = one(&tree, "me");
            assert_eq!(me.scope, body.id);
            assert_eq!(me.type_name.as_deref(), Some("Session"));
        }

        #[test]
        fn every_token_has_a_scope_inside_its_span() {
            let (tokens, tree) = build(FIXTURE);
            for (i, token) in tokens.iter().enumerate() {
                if token.kind.is_trivia() {
                    continue;
                }
                let scope = tree.scope(tree.scope_of_token(i));
                assert!(
                    scope.span.encloses(&token.span),
                    "{:?} outside {}",
                    token.text,
                    scope.id
                );
            }
        }
    }

    mod declarations {
        use super::*;

        #[test]
        fn multiple_declarators() {
            let (_, tree) = build("class A { int a = 1, b, c[] = {}; void f() { int x, y = g(1, 2); } }");
            let kinds = summary(&tree);
            assert!(kinds.contains(&("b".to_string(), DeclKind::Field)));
            assert!(kinds.contains(&("c".to_string(), DeclKind::Field)));
            assert!(kinds.contains(&("y".to_string(), DeclKind::Local)));
            assert_eq!(one(&tree, "c").type_name.as_deref(), Some("int[]"));
        }

        #[test]
        fn generic_types_and_arrays() {
            let (_, tree) =
                build("class A { Map<String, List<Integer>> m; String[] names; void f(String... args) {} }");
            assert_eq!(one(&tree, "m").type_name.as_deref(), Some("Map"));
            assert_eq!(one(&tree, "names").type_name.as_deref(), Some("String[]"));
            let f = one(&tree, "f");
            assert!(f.variadic);
            assert_eq!(f.arity, Some(1));
            assert_eq!(one(&tree, "args").kind, DeclKind::Parameter);
        }

        #[test]
        fn assignments_and_calls_are_not_declarations() {
            let (_, tree) = build("class A { void f() { x = 1; a.b = 2; g(x); return; } }");
            assert_eq!(summary(&tree).len(), 2);
        }

        #[test]
        fn constructor_is_not_a_declaration() {
            let (tokens, tree) = build("class Box { Box(int size) { } static Box INSTANCE = new Box(1); }");
            assert_eq!(decls(&tree, "Box").len(), 1);
            assert_eq!(one(&tree, "size").kind, DeclKind::Parameter);
            let ctor_name = tokens.iter().position(|t| t.text == "Box" && t.span.start == 12).unwrap();
            assert!(tree.is_type_position(ctor_name));
            let ctor_scope = tree.scope(one(&tree, "size").scope);
            assert_eq!(ctor_scope.name.as_deref(), Some("Box"));
            assert_eq!(one(&tree, "INSTANCE").kind, DeclKind::Field);
        }

        #[test]
        fn overloads_share_a_name() {
            let (_, tree) = build("class A { void f() {} void f(int a) {} void f(int a, int b) {} }");
            let arities: Vec<_> = decls(&tree, "f").iter().map(|d| d.arity).collect();
            assert_eq!(arities, vec![Some(0), Some(1), Some(2)]);
        }

        #[test]
        fn interface_and_abstract_methods() {
            let (_, tree) = build("interface Shape { double area(); default int sides() { return 0; } }");
            assert_eq!(one(&tree, "area").kind, DeclKind::Method);
            assert_eq!(one(&tree, "sides").kind, DeclKind::Method);
        }

        #[test]
        fn enum_constants_and_members() {
            let (_, tree) = build("enum Color { RED, GREEN(2) { void f() {} }, BLUE; int code; Color() {} }");
            assert_eq!(one(&tree, "RED").kind, DeclKind::Field);
            assert_eq!(one(&tree, "GREEN").kind, DeclKind::Field);
            assert_eq!(one(&tree, "BLUE").kind, DeclKind::Field);
            assert_eq!(one(&tree, "code").kind, DeclKind::Field);
            let f = one(&tree, "f");
            assert_eq!(tree.scope(f.scope).kind, ScopeKind::Type);
            assert_eq!(tree.scope(f.scope).supertypes, vec!["Color".to_string()]);
        }

        #[test]
        fn record_components_are_fields() {
            let (_, tree) = build("record Point(int x, int y) { int sum() { return x + y; } }");
            let x = one(&tree, "x");
            assert_eq!(x.kind, DeclKind::Field);
            assert_eq!(tree.scope(x.scope).name.as_deref(), Some("Point"));
        }

        #[test]
        fn type_parameters() {
            let (_, tree) = build("class Box<T extends Comparable<T>> { T value; <U> U map(U u) { return u; } }");
            let t = one(&tree, "T");
            assert_eq!(t.kind, DeclKind::Type);
            assert_eq!(tree.scope(t.scope).name.as_deref(), Some("Box"));
            let u = one(&tree, "U");
            assert_eq!(tree.scope(u.scope).kind, ScopeKind::Method);
        }

        #[test]
        fn catch_and_pattern_variables() {
            let (_, tree) =
                build("class A { void f(Object o) { try { g(); } catch (IOException e) { } if (o instanceof String s) { } } }");
            assert_eq!(one(&tree, "e").kind, DeclKind::Parameter);
            assert_eq!(one(&tree, "s").kind, DeclKind::Local);
            assert_eq!(one(&tree, "s").type_name.as_deref(), Some("String"));
        }

        #[test]
        fn var_has_no_type_name() {
            let (_, tree) = build("class A { void f() { var list = g(); } }");
            assert_eq!(one(&tree, "list").type_name, None);
        }
    }

    mod scopes {
        use super::*;

        #[test]
        fn nesting_and_kinds() {
            let (_, tree) = build("class A { void f() { { int x; } for (int i = 0; i < 3; i++) { int y; } } }");
            let x = one(&tree, "x");
            let i = one(&tree, "i");
            let y = one(&tree, "y");
            assert_eq!(tree.scope(x.scope).kind, ScopeKind::Block);
            assert_eq!(tree.scope(i.scope).kind, ScopeKind::Block);
            // the loop body shares the header's scope
            assert_eq!(i.scope, y.scope);
            assert_eq!(tree.scope_path(x.scope), vec!["A", "f"]);
        }

        #[test]
        fn unbraced_for_scope_ends_at_semicolon() {
            let source = "class A { void f() { for (int i = 0; i < 3; i++) g(i); int i = 4; } }";
            let (_, tree) = build(source);
            let found = decls(&tree, "i");
            assert_eq!(found.len(), 2);
            assert_ne!(found[0].scope, found[1].scope);
            assert_eq!(tree.scope(found[1].scope).kind, ScopeKind::Method);
        }

        #[test]
        fn lambdas_open_block_scopes() {
            let (_, tree) = build("class A { void f() { run(x -> x + 1); apply((a, b) -> { int c = a; }); } }");
            let x = one(&tree, "x");
            assert_eq!(x.kind, DeclKind::Parameter);
            assert_eq!(tree.scope(x.scope).kind, ScopeKind::Block);
            let a = one(&tree, "a");
            let c = one(&tree, "c");
            assert_eq!(a.scope, c.scope);
        }

        #[test]
        fn switch_case_arrows_are_not_lambdas() {
            let (_, tree) = build("class A { int f(int k) { switch (k) { case ONE, TWO -> g(); default -> h(); } return 0; } }");
            assert!(decls(&tree, "ONE").is_empty());
            assert!(decls(&tree, "TWO").is_empty());
        }

        #[test]
        fn anonymous_class_is_a_type_scope() {
            let (_, tree) =
                build("class A { void f() { Runnable r = new Runnable() { public void run() { int z; } }; } }");
            let run = one(&tree, "run");
            let anon = tree.scope(run.scope);
            assert_eq!(anon.kind, ScopeKind::Type);
            assert_eq!(anon.name, None);
            assert_eq!(anon.supertypes, vec!["Runnable".to_string()]);
            assert_eq!(one(&tree, "r").kind, DeclKind::Local);
        }

        #[test]
        fn local_visibility_follows_declaration_order() {
            let source = "class A { int v; void f() { g(v); int v = 2; } }";
            let (_, tree) = build(source);
            let method_scope = one(&tree, "f").body.unwrap();
            let use_offset = source.find("g(v)").unwrap() as u64 + 2;
            let (found_in, found) = tree
                .lookup(method_scope, "v", Namespace::Value, Some(use_offset))
                .unwrap();
            assert_eq!(tree.scope(found_in).kind, ScopeKind::Type);
            assert_eq!(tree.declaration(found[0]).kind, DeclKind::Field);
            let (found_in, _) = tree.lookup(method_scope, "v", Namespace::Value, None).unwrap();
            assert_eq!(found_in, method_scope);
        }

        #[test]
        fn namespaces_are_separate() {
            let (_, tree) = build("class A { int size; int size() { return size; } }");
            let ty = one(&tree, "A").body.unwrap();
            assert_eq!(tree.members(ty, "size", Namespace::Value).len(), 1);
            assert_eq!(tree.members(ty, "size", Namespace::Method).len(), 1);
        }

        #[test]
        fn empty_source() {
            let (_, tree) = build("");
            assert_eq!(tree.scopes().len(), 1);
            assert!(tree.declarations().is_empty());
        }

        #[test]
        fn structural_error_propagates() {
            let tokens = tokenize("class A { void f() { }").unwrap();
            let err = ScopeTree::build(&tokens).unwrap_err();
            assert_eq!(err.offset(), 8);
        }
    }
}
