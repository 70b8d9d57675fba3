// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Lossless tokenizer for C-family source.
//!
//! [`tokenize`] splits a source text into [`Token`]s that cover every byte
//! exactly once, in order. Whitespace and comments come out as trivia tokens
//! rather than being skipped, so concatenating the token texts always
//! reproduces the input.
//!
//! Multi-character operators the scope builder cares about (`->`, `::`,
//! `...`, comparison and compound-assignment operators) lex as one token.
//! `<` and `>` always lex alone so that `Map<K, List<V>>` closes cleanly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use renamer_core::patch::Span;

/// Reserved words. Includes the contextual words this engine treats as
/// reserved and the `true`/`false`/`null` literals.
pub const KEYWORDS: &[&str] = &[
    "abstract",
    "assert",
    "boolean",
    "break",
    "byte",
    "case",
    "catch",
    "char",
    "class",
    "const",
    "continue",
    "default",
    "do",
    "double",
    "else",
    "enum",
    "extends",
    "false",
    "final",
    "finally",
    "float",
    "for",
    "goto",
    "if",
    "implements",
    "import",
    "instanceof",
    "int",
    "interface",
    "long",
    "native",
    "new",
    "null",
    "package",
    "permits",
    "private",
    "protected",
    "public",
    "record",
    "return",
    "sealed",
    "short",
    "static",
    "strictfp",
    "super",
    "switch",
    "synchronized",
    "this",
    "throw",
    "throws",
    "transient",
    "true",
    "try",
    "var",
    "void",
    "volatile",
    "while",
    "yield",
];

/// Keywords that can stand where a type name would.
const TYPE_KEYWORDS: &[&str] = &[
    "boolean", "byte", "char", "double", "float", "int", "long", "short", "var", "void",
];

/// Operators that lex as a single token, longest first.
const OPERATORS: &[&str] = &[
    "...", "->", "::", "==", "!=", "<=", ">=", "&&", "||", "++", "--", "+=", "-=", "*=", "/=",
    "%=", "&=", "|=", "^=",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// True for primitive type keywords, `void` and `var`.
pub fn is_type_keyword(word: &str) -> bool {
    TYPE_KEYWORDS.contains(&word)
}

pub fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

pub fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

// ============================================================================
// Tokens
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Identifier,
    Keyword,
    /// String, text block, or character literal.
    StringLiteral,
    Number,
    Comment,
    Whitespace,
    Punctuation,
    Other,
}

impl TokenKind {
    /// Whitespace and comments.
    pub fn is_trivia(&self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Comment)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Keyword => "keyword",
            TokenKind::StringLiteral => "string_literal",
            TokenKind::Number => "number",
            TokenKind::Comment => "comment",
            TokenKind::Whitespace => "whitespace",
            TokenKind::Punctuation => "punctuation",
            TokenKind::Other => "other",
        }
    }
}

/// A classified slice of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub span: Span,
    pub text: &'src str,
}

impl<'src> Token<'src> {
    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }

    pub fn is_punct(&self, text: &str) -> bool {
        self.is(TokenKind::Punctuation, text)
    }

    pub fn is_keyword(&self, text: &str) -> bool {
        self.is(TokenKind::Keyword, text)
    }

    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Identifier
    }
}

// ============================================================================
// Errors
// ============================================================================

/// A literal or comment that never closes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unterminated string literal starting at byte {offset}")]
    UnterminatedString { offset: u64 },

    #[error("unterminated character literal starting at byte {offset}")]
    UnterminatedChar { offset: u64 },

    #[error("unterminated text block starting at byte {offset}")]
    UnterminatedTextBlock { offset: u64 },

    #[error("unterminated block comment starting at byte {offset}")]
    UnterminatedComment { offset: u64 },
}

impl LexError {
    /// Byte offset where the offending token starts.
    pub fn offset(&self) -> u64 {
        match self {
            LexError::UnterminatedString { offset }
            | LexError::UnterminatedChar { offset }
            | LexError::UnterminatedTextBlock { offset }
            | LexError::UnterminatedComment { offset } => *offset,
        }
    }
}

// ============================================================================
// Lexer
// ============================================================================

/// Tokenize `source` losslessly.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, LexError> {
    Lexer::new(source).tokenize()
}

pub struct Lexer<'src> {
    src: &'src str,
    pos: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Self {
        Lexer { src, pos: 0 }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token<'src>>, LexError> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek() {
            tokens.push(self.next_token(c)?);
        }
        Ok(tokens)
    }

    fn rest(&self) -> &'src str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    /// Lex one token starting with `c`, the character at the cursor.
    fn next_token(&mut self, c: char) -> Result<Token<'src>, LexError> {
        let start = self.pos;
        let rest = self.rest();

        let kind = if c.is_whitespace() {
            self.eat_while(char::is_whitespace);
            TokenKind::Whitespace
        } else if rest.starts_with("//") {
            self.eat_while(|c| c != '\n');
            TokenKind::Comment
        } else if rest.starts_with("/*") {
            let close = rest[2..]
                .find("*/")
                .ok_or(LexError::UnterminatedComment {
                    offset: start as u64,
                })?;
            self.pos += 2 + close + 2;
            TokenKind::Comment
        } else if rest.starts_with("\"\"\"") {
            self.text_block(start)?;
            TokenKind::StringLiteral
        } else if c == '"' {
            self.quoted('"', start)?;
            TokenKind::StringLiteral
        } else if c == '\'' {
            self.quoted('\'', start)?;
            TokenKind::StringLiteral
        } else if is_ident_start(c) {
            self.eat_while(is_ident_continue);
            if is_keyword(&self.src[start..self.pos]) {
                TokenKind::Keyword
            } else {
                TokenKind::Identifier
            }
        } else if c.is_ascii_digit()
            || (c == '.' && self.peek_second().is_some_and(|n| n.is_ascii_digit()))
        {
            self.number();
            TokenKind::Number
        } else if c.is_ascii_punctuation() {
            let op_len = OPERATORS
                .iter()
                .find(|op| rest.starts_with(**op))
                .map_or(1, |op| op.len());
            self.pos += op_len;
            TokenKind::Punctuation
        } else {
            self.bump();
            TokenKind::Other
        };

        Ok(Token {
            kind,
            span: Span::from_range(start..self.pos),
            text: &self.src[start..self.pos],
        })
    }

    /// A `"` string or `'` character literal. Newlines may not appear inside.
    fn quoted(&mut self, quote: char, start: usize) -> Result<(), LexError> {
        let unterminated = || {
            let offset = start as u64;
            if quote == '"' {
                LexError::UnterminatedString { offset }
            } else {
                LexError::UnterminatedChar { offset }
            }
        };

        self.bump();
        loop {
            match self.bump() {
                None | Some('\n') | Some('\r') => return Err(unterminated()),
                Some('\\') => {
                    if self.bump().is_none() {
                        return Err(unterminated());
                    }
                }
                Some(c) if c == quote => return Ok(()),
                Some(_) => {}
            }
        }
    }

    fn text_block(&mut self, start: usize) -> Result<(), LexError> {
        self.pos += 3;
        loop {
            if self.rest().starts_with("\"\"\"") {
                self.pos += 3;
                return Ok(());
            }
            match self.bump() {
                None => {
                    return Err(LexError::UnterminatedTextBlock {
                        offset: start as u64,
                    })
                }
                Some('\\') => {
                    self.bump();
                }
                Some(_) => {}
            }
        }
    }

    /// Integer and floating literals, including `0x`/`0b` prefixes, `_`
    /// separators, exponents and type suffixes.
    fn number(&mut self) {
        let hex = self.rest().starts_with("0x") || self.rest().starts_with("0X");
        let mut prev = '\0';
        while let Some(c) = self.peek() {
            let accept = c.is_ascii_alphanumeric()
                || c == '_'
                || (c == '.' && self.peek_second().is_some_and(|n| n.is_ascii_digit()))
                || ((c == '+' || c == '-') && !hex && (prev == 'e' || prev == 'E'));
            if !accept {
                break;
            }
            prev = c;
            self.pos += c.len_utf8();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
