// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Structural view over the significant tokens of a file.
//!
//! [`SyntaxIndex::build`] drops trivia and pairs every `(`/`)`, `[`/`]` and
//! `{`/`}`; an unbalanced delimiter is a [`StructuralParseError`]. The scope
//! builder and the binder then walk a [`Syntax`], which addresses tokens by
//! *position* (index among significant tokens) and offers the small pattern
//! queries both passes share: "what type precedes this name", "where does
//! this statement end", "how many arguments does this call pass".

use thiserror::Error;

use crate::lexer::{is_type_keyword, Token, TokenKind};

/// Unbalanced or mismatched scope delimiters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralParseError {
    #[error("unexpected '{found}' at byte {offset}")]
    UnexpectedCloser { offset: u64, found: char },

    #[error("expected '{expected}' but found '{found}' at byte {offset}")]
    Mismatched {
        offset: u64,
        expected: char,
        found: char,
    },

    #[error("'{opener}' at byte {offset} is never closed")]
    Unclosed { offset: u64, opener: char },
}

impl StructuralParseError {
    pub fn offset(&self) -> u64 {
        match self {
            StructuralParseError::UnexpectedCloser { offset, .. }
            | StructuralParseError::Mismatched { offset, .. }
            | StructuralParseError::Unclosed { offset, .. } => *offset,
        }
    }
}

fn closer_for(open: &str) -> Option<char> {
    match open {
        "(" => Some(')'),
        "[" => Some(']'),
        "{" => Some('}'),
        _ => None,
    }
}

fn is_closer(text: &str) -> bool {
    matches!(text, ")" | "]" | "}")
}

/// Positions of significant tokens and their delimiter partners.
#[derive(Debug, Clone, Default)]
pub struct SyntaxIndex {
    /// Token index of each significant token.
    sig: Vec<usize>,
    /// Matching delimiter position, for delimiter positions.
    partner: Vec<Option<usize>>,
}

impl SyntaxIndex {
    pub fn build(tokens: &[Token<'_>]) -> Result<Self, StructuralParseError> {
        let sig: Vec<usize> = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.kind.is_trivia())
            .map(|(i, _)| i)
            .collect();
        let mut partner = vec![None; sig.len()];
        let mut open: Vec<(usize, char)> = Vec::new();

        for (pos, &ti) in sig.iter().enumerate() {
            let token = &tokens[ti];
            if token.kind != TokenKind::Punctuation {
                continue;
            }
            if let Some(close) = closer_for(token.text) {
                open.push((pos, close));
            } else if is_closer(token.text) {
                let found = token.text.chars().next().unwrap_or(')');
                let offset = token.span.start;
                match open.pop() {
                    None => return Err(StructuralParseError::UnexpectedCloser { offset, found }),
                    Some((_, expected)) if expected != found => {
                        return Err(StructuralParseError::Mismatched {
                            offset,
                            expected,
                            found,
                        })
                    }
                    Some((opener, _)) => {
                        partner[opener] = Some(pos);
                        partner[pos] = Some(opener);
                    }
                }
            }
        }

        if let Some(&(pos, _)) = open.last() {
            let token = &tokens[sig[pos]];
            return Err(StructuralParseError::Unclosed {
                offset: token.span.start,
                opener: token.text.chars().next().unwrap_or('('),
            });
        }

        Ok(SyntaxIndex { sig, partner })
    }

    pub fn len(&self) -> usize {
        self.sig.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sig.is_empty()
    }
}

/// A run of tokens naming a type, as found by [`Syntax::type_before`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRun {
    /// First position of the type.
    pub start: usize,
    /// Positions of every identifier in the type, including generic arguments.
    pub idents: Vec<usize>,
    /// Position of the simple type name, when the type is not a keyword.
    pub simple: Option<usize>,
    /// Trailing `[]` or `...`.
    pub array: bool,
}

/// Significant tokens plus the delimiter index, addressed by position.
#[derive(Clone, Copy)]
pub struct Syntax<'a, 'src> {
    tokens: &'a [Token<'src>],
    index: &'a SyntaxIndex,
}

impl<'a, 'src> Syntax<'a, 'src> {
    pub fn new(tokens: &'a [Token<'src>], index: &'a SyntaxIndex) -> Self {
        Syntax { tokens, index }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn token(&self, pos: usize) -> Option<&'a Token<'src>> {
        self.index.sig.get(pos).map(|&ti| &self.tokens[ti])
    }

    /// Index into the full token stream of the token at `pos`.
    pub fn token_index(&self, pos: usize) -> usize {
        self.index.sig[pos]
    }

    pub fn text(&self, pos: usize) -> &'src str {
        self.token(pos).map_or("", |t| t.text)
    }

    pub fn is_punct(&self, pos: usize, text: &str) -> bool {
        self.token(pos).is_some_and(|t| t.is_punct(text))
    }

    pub fn is_kw(&self, pos: usize, text: &str) -> bool {
        self.token(pos).is_some_and(|t| t.is_keyword(text))
    }

    pub fn is_ident(&self, pos: usize) -> bool {
        self.token(pos).is_some_and(|t| t.is_identifier())
    }

    /// Punctuation test on the token before `pos`.
    pub fn prev_is_punct(&self, pos: usize, text: &str) -> bool {
        pos.checked_sub(1).is_some_and(|p| self.is_punct(p, text))
    }

    pub fn prev_is_kw(&self, pos: usize, text: &str) -> bool {
        pos.checked_sub(1).is_some_and(|p| self.is_kw(p, text))
    }

    pub fn partner(&self, pos: usize) -> Option<usize> {
        self.index.partner.get(pos).copied().flatten()
    }

    pub fn is_opener(&self, pos: usize) -> bool {
        self.token(pos)
            .is_some_and(|t| t.kind == TokenKind::Punctuation && closer_for(t.text).is_some())
    }

    pub fn is_closer(&self, pos: usize) -> bool {
        self.token(pos)
            .is_some_and(|t| t.kind == TokenKind::Punctuation && is_closer(t.text))
    }

    fn last(&self) -> usize {
        self.len().saturating_sub(1)
    }

    // ------------------------------------------------------------------------
    // Generic brackets
    // ------------------------------------------------------------------------

    /// Tokens that may appear between `<` and `>` of a generic argument list.
    fn is_generic_part(&self, pos: usize) -> bool {
        let Some(token) = self.token(pos) else {
            return false;
        };
        match token.kind {
            TokenKind::Identifier => true,
            TokenKind::Keyword => {
                matches!(token.text, "extends" | "super") || is_type_keyword(token.text)
            }
            TokenKind::Punctuation => {
                matches!(token.text, "," | "." | "?" | "&" | "[" | "]" | "<" | ">")
            }
            _ => false,
        }
    }

    /// The `<` matching the `>` at `close`, if everything between looks like
    /// type arguments.
    pub fn angle_open(&self, close: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut pos = close;
        loop {
            if !self.is_generic_part(pos) {
                return None;
            }
            if self.is_punct(pos, ">") {
                depth += 1;
            } else if self.is_punct(pos, "<") {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
            }
            pos = pos.checked_sub(1)?;
        }
    }

    /// Like [`Syntax::angle_open`], but only when the list follows a type
    /// name, as in `List<String>`.
    pub fn generic_open(&self, close: usize) -> Option<usize> {
        let open = self.angle_open(close)?;
        let before = open.checked_sub(1)?;
        self.is_ident(before).then_some(open)
    }

    /// The `>` matching the `<` at `open`.
    pub fn angle_close(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for pos in open..self.len() {
            if !self.is_generic_part(pos) {
                return None;
            }
            if self.is_punct(pos, "<") {
                depth += 1;
            } else if self.is_punct(pos, ">") {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
            }
        }
        None
    }

    // ------------------------------------------------------------------------
    // Types and statements
    // ------------------------------------------------------------------------

    /// The type written immediately before `pos`, if any.
    ///
    /// Accepts a type keyword, or an optionally qualified name with optional
    /// generic arguments, followed by any number of `[]` pairs.
    pub fn type_before(&self, pos: usize) -> Option<TypeRun> {
        let mut q = pos.checked_sub(1)?;
        let mut idents = Vec::new();
        let mut array = false;

        if self.is_punct(q, "...") {
            array = true;
            q = q.checked_sub(1)?;
        }
        while self.is_punct(q, "]") && q >= 1 && self.is_punct(q - 1, "[") {
            array = true;
            q = q.checked_sub(2)?;
        }

        if self.is_punct(q, ">") {
            let open = self.generic_open(q)?;
            idents.extend((open + 1..q).filter(|&p| self.is_ident(p)));
            q = open - 1;
        }

        let token = self.token(q)?;
        if token.kind == TokenKind::Keyword {
            if !is_type_keyword(token.text) {
                return None;
            }
            return Some(TypeRun {
                start: q,
                idents,
                simple: None,
                array,
            });
        }
        if !token.is_identifier() {
            return None;
        }

        let simple = q;
        idents.push(q);
        while q >= 2 && self.is_punct(q - 1, ".") && self.is_ident(q - 2) {
            q -= 2;
            idents.push(q);
        }
        idents.sort_unstable();
        Some(TypeRun {
            start: q,
            idents,
            simple: Some(simple),
            array,
        })
    }

    /// True when a declaration may begin at `pos`: start of file, after a
    /// statement boundary, a modifier, an annotation, or `instanceof`.
    pub fn starts_statement(&self, pos: usize) -> bool {
        let Some(prev) = pos.checked_sub(1) else {
            return true;
        };
        let Some(token) = self.token(prev) else {
            return true;
        };
        match token.kind {
            TokenKind::Punctuation => match token.text {
                ";" | "{" | "}" | "(" | ":" | "|" => true,
                ")" => self
                    .partner(prev)
                    .is_some_and(|open| open >= 2 && self.is_annotation_name(open - 1)),
                ">" => self
                    .angle_open(prev)
                    .is_some_and(|open| self.starts_statement(open)),
                _ => false,
            },
            TokenKind::Keyword => matches!(
                token.text,
                "final"
                    | "static"
                    | "public"
                    | "private"
                    | "protected"
                    | "abstract"
                    | "transient"
                    | "volatile"
                    | "synchronized"
                    | "native"
                    | "strictfp"
                    | "default"
                    | "sealed"
                    | "instanceof"
            ),
            TokenKind::Identifier => self.is_annotation_name(prev),
            _ => false,
        }
    }

    /// True for the last identifier of `@Name` or `@a.b.Name`.
    pub fn is_annotation_name(&self, pos: usize) -> bool {
        let mut q = pos;
        if !self.is_ident(q) {
            return false;
        }
        while q >= 2 && self.is_punct(q - 1, ".") && self.is_ident(q - 2) {
            q -= 2;
        }
        self.prev_is_punct(q, "@")
    }

    /// Last position of the statement starting at `pos`.
    ///
    /// Braced blocks end at their `}`; `if`/`else`, loops, `do`/`while` and
    /// `try` chains are followed through their bodies; anything else ends at
    /// its `;`, or just before an enclosing closer.
    pub fn statement_end(&self, pos: usize) -> usize {
        let last = self.last();
        if pos > last {
            return last;
        }
        if self.is_punct(pos, "{") {
            return self.partner(pos).unwrap_or(last);
        }

        let after_parens = |p: usize| -> Option<usize> {
            if self.is_punct(p, "(") {
                self.partner(p).map(|c| c + 1)
            } else {
                None
            }
        };

        if self.is_kw(pos, "for") || self.is_kw(pos, "while") || self.is_kw(pos, "synchronized") {
            if let Some(body) = after_parens(pos + 1) {
                return self.statement_end(body);
            }
        }
        if self.is_kw(pos, "if") {
            if let Some(body) = after_parens(pos + 1) {
                let end = self.statement_end(body);
                if self.is_kw(end + 1, "else") {
                    return self.statement_end(end + 2);
                }
                return end;
            }
        }
        if self.is_kw(pos, "do") {
            let body_end = self.statement_end(pos + 1);
            return self.scan_to_semicolon(body_end + 1);
        }
        if self.is_kw(pos, "try") {
            let block = after_parens(pos + 1).unwrap_or(pos + 1);
            let mut end = self.statement_end(block);
            loop {
                if self.is_kw(end + 1, "catch") {
                    let Some(block) = after_parens(end + 2) else {
                        return end;
                    };
                    end = self.statement_end(block);
                } else if self.is_kw(end + 1, "finally") {
                    end = self.statement_end(end + 2);
                } else {
                    return end;
                }
            }
        }

        self.scan_to_semicolon(pos)
    }

    fn scan_to_semicolon(&self, from: usize) -> usize {
        let last = self.last();
        let mut pos = from;
        while pos <= last {
            if self.is_punct(pos, ";") {
                return pos;
            }
            if self.is_opener(pos) {
                match self.partner(pos) {
                    Some(close) => {
                        pos = close + 1;
                        continue;
                    }
                    None => return last,
                }
            }
            if self.is_closer(pos) {
                return pos.saturating_sub(1).max(from);
            }
            pos += 1;
        }
        last
    }

    /// Last position of the expression starting at `pos`: it runs until a
    /// `,` or `;` at its own nesting level, or an enclosing closer.
    pub fn expression_end(&self, pos: usize) -> usize {
        let last = self.last();
        let mut end = pos.min(last);
        let mut cur = pos;
        while cur <= last {
            if self.is_punct(cur, ",") || self.is_punct(cur, ";") || self.is_closer(cur) {
                break;
            }
            if self.is_opener(cur) {
                let Some(close) = self.partner(cur) else {
                    break;
                };
                end = close;
                cur = close + 1;
                continue;
            }
            end = cur;
            cur += 1;
        }
        end
    }

    // ------------------------------------------------------------------------
    // Parameter and argument lists
    // ------------------------------------------------------------------------

    /// Comma-separated segments inside the group opened at `open`, as
    /// inclusive position ranges. With `generics`, commas inside `<...>`
    /// do not split.
    pub fn segments(&self, open: usize, generics: bool) -> Vec<(usize, usize)> {
        let Some(close) = self.partner(open) else {
            return Vec::new();
        };
        if close == open + 1 {
            return Vec::new();
        }

        let mut segments = Vec::new();
        let mut start = open + 1;
        let mut angle = 0usize;
        let mut pos = open + 1;
        while pos < close {
            if self.is_opener(pos) {
                pos = self.partner(pos).map_or(close, |c| c + 1);
                continue;
            }
            if generics && self.is_punct(pos, "<") {
                angle += 1;
            } else if generics && self.is_punct(pos, ">") {
                angle = angle.saturating_sub(1);
            } else if angle == 0 && self.is_punct(pos, ",") {
                if pos > start {
                    segments.push((start, pos - 1));
                }
                start = pos + 1;
            }
            pos += 1;
        }
        if close > start {
            segments.push((start, close - 1));
        }
        segments
    }

    /// Number of arguments in the call whose `(` is at `open`.
    pub fn arg_count(&self, open: usize) -> usize {
        self.segments(open, false).len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn with_syntax<R>(source: &str, f: impl FnOnce(Syntax<'_, '_>) -> R) -> R {
        let tokens = tokenize(source).unwrap();
        let index = SyntaxIndex::build(&tokens).unwrap();
        f(Syntax::new(&tokens, &index))
    }

    fn pos_of(syntax: &Syntax<'_, '_>, text: &str, nth: usize) -> usize {
        (0..syntax.len())
            .filter(|&p| syntax.text(p) == text)
            .nth(nth)
            .unwrap()
    }

    mod delimiters {
        use super::*;

        #[test]
        fn partners_are_symmetric() {
            with_syntax("class A { void f(int[] a) { } }", |s| {
                let open = pos_of(&s, "(", 0);
                let close = s.partner(open).unwrap();
                assert_eq!(s.text(close), ")");
                assert_eq!(s.partner(close), Some(open));
            });
        }

        #[test]
        fn unexpected_closer() {
            let tokens = tokenize("class A { } }").unwrap();
            let err = SyntaxIndex::build(&tokens).unwrap_err();
            assert_eq!(
                err,
                StructuralParseError::UnexpectedCloser {
                    offset: 12,
                    found: '}'
                }
            );
        }

        #[test]
        fn mismatched_closer() {
            let tokens = tokenize("void f() { g(; }").unwrap();
            let err = SyntaxIndex::build(&tokens).unwrap_err();
            assert_eq!(
                err,
                StructuralParseError::Mismatched {
                    offset: 15,
                    expected: ')',
                    found: '}'
                }
            );
        }

        #[test]
        fn unclosed_opener_reports_innermost() {
            let tokens = tokenize("class A { void f() {").unwrap();
            let err = SyntaxIndex::build(&tokens).unwrap_err();
            assert_eq!(err.offset(), 19);
        }

        #[test]
        fn delimiters_in_strings_and_comments_are_ignored() {
            let tokens = tokenize("class A { String s = \"{(\"; /* } */ }").unwrap();
            assert!(SyntaxIndex::build(&tokens).is_ok());
        }
    }

    mod types {
        use super::*;

        #[test]
        fn keyword_type() {
            with_syntax("int count;", |s| {
                let run = s.type_before(pos_of(&s, "count", 0)).unwrap();
                assert_eq!(run.start, 0);
                assert_eq!(run.simple, None);
            });
        }

        #[test]
        fn qualified_generic_array_type() {
            with_syntax("java.util.Map<String, List<Integer>>[] m;", |s| {
                let run = s.type_before(pos_of(&s, "m", 0)).unwrap();
                assert_eq!(run.start, 0);
                assert_eq!(s.text(run.simple.unwrap()), "Map");
                assert!(run.array);
                let names: Vec<_> = run.idents.iter().map(|&p| s.text(p)).collect();
                assert_eq!(names, vec!["java", "util", "Map", "String", "List", "Integer"]);
            });
        }

        #[test]
        fn comparison_is_not_a_type() {
            with_syntax("if (a < b && c > d) {}", |s| {
                assert!(s.type_before(pos_of(&s, "d", 0)).is_none());
            });
        }

        #[test]
        fn assignment_is_not_a_type() {
            with_syntax("x = y;", |s| {
                assert!(s.type_before(pos_of(&s, "y", 0)).is_none());
            });
        }

        #[test]
        fn statement_starts() {
            with_syntax("{ final int a; @Inject Foo b; return c; }", |s| {
                assert!(s.starts_statement(pos_of(&s, "int", 0)));
                assert!(s.starts_statement(pos_of(&s, "Foo", 0)));
                assert!(!s.starts_statement(pos_of(&s, "c", 0)));
            });
        }
    }

    mod extents {
        use super::*;

        #[test]
        fn braced_statement_ends_at_brace() {
            with_syntax("for (;;) { a(); } b();", |s| {
                assert_eq!(s.statement_end(0), pos_of(&s, "}", 0));
            });
        }

        #[test]
        fn unbraced_loop_ends_at_semicolon() {
            with_syntax("for (int i = 0; i < n; i++) total += i; after();", |s| {
                assert_eq!(s.statement_end(0), pos_of(&s, ";", 2));
            });
        }

        #[test]
        fn if_else_chain_is_followed() {
            with_syntax("if (a) x(); else if (b) y(); else z(); w();", |s| {
                assert_eq!(s.statement_end(0), pos_of(&s, ";", 2));
            });
        }

        #[test]
        fn try_catch_finally_chain() {
            with_syntax("try { a(); } catch (E e) { b(); } finally { c(); } d();", |s| {
                assert_eq!(s.statement_end(0), pos_of(&s, "}", 2));
            });
        }

        #[test]
        fn expression_stops_at_comma_and_closer() {
            with_syntax("f(x -> g(x, 1), y)", |s| {
                let body = pos_of(&s, "g", 0);
                assert_eq!(s.expression_end(body), pos_of(&s, ")", 0));
            });
        }

        #[test]
        fn argument_counts() {
            with_syntax("f(); g(a); h(a, b(c, d), new int[] {1, 2});", |s| {
                assert_eq!(s.arg_count(pos_of(&s, "(", 0)), 0);
                assert_eq!(s.arg_count(pos_of(&s, "(", 1)), 1);
                assert_eq!(s.arg_count(pos_of(&s, "(", 2)), 3);
            });
        }

        #[test]
        fn parameter_segments_respect_generics() {
            with_syntax("void f(Map<K, V> m, int n) {}", |s| {
                let segments = s.segments(pos_of(&s, "(", 0), true);
                assert_eq!(segments.len(), 2);
                assert_eq!(s.text(segments[0].1), "m");
                assert_eq!(s.text(segments[1].1), "n");
            });
        }
    }
}
