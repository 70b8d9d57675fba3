//! Span and edit primitives shared by the analysis and rewrite stages.
//!
//! Everything downstream of the lexer speaks in byte spans over the original
//! source text. A [`Span`] is half-open (`[start, end)`), so adjacent tokens
//! share a boundary but never overlap.
//!
//! [`OutputEdit`] is the reporting form of a single identifier replacement,
//! and [`MaterializedPatch`] groups the edits for one rewrite together with
//! the rendered unified diff.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// ContentHash
// ============================================================================

/// SHA-256 hash of a source text, hex encoded.
///
/// Plans remember the hash of the text they were computed from, so a plan
/// cannot be applied to a different revision of the file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Hash raw content.
    pub fn compute(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        ContentHash(hex::encode(hasher.finalize()))
    }

    /// First twelve hex digits, for log lines.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Span
// ============================================================================

/// Half-open byte range `[start, end)` into a source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: u64,
    /// End byte offset (exclusive).
    pub end: u64,
}

impl Span {
    /// Create a span. `start` must not exceed `end`.
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "span start {} > end {}", start, end);
        Span { start, end }
    }

    /// Span covering a `usize` range, as produced by `str::char_indices`.
    pub fn from_range(range: Range<usize>) -> Self {
        Span::new(range.start as u64, range.end as u64)
    }

    /// The span as a `usize` range, for slicing the source it came from.
    pub fn as_range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True when `offset` falls inside the span.
    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.start && offset < self.end
    }

    /// True when `other` lies entirely within this span.
    pub fn encloses(&self, other: &Span) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Slice `text` by this span, or `None` when out of bounds or not on a
    /// character boundary.
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.as_range())
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ============================================================================
// Output edits
// ============================================================================

/// One identifier replacement, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEdit {
    /// File the edit applies to.
    pub file: String,
    /// Byte span of the replaced token in the original text.
    pub span: Span,
    /// Text being replaced.
    pub old_text: String,
    /// Replacement text.
    pub new_text: String,
    /// 1-indexed line of the edit.
    pub line: u32,
    /// 1-indexed column of the edit (UTF-8 bytes).
    pub col: u32,
}

/// The edits of one rewrite plus their unified diff.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterializedPatch {
    pub edits: Vec<OutputEdit>,
    pub unified_diff: String,
}

impl MaterializedPatch {
    pub fn new(edits: Vec<OutputEdit>, unified_diff: String) -> Self {
        MaterializedPatch {
            edits,
            unified_diff,
        }
    }

    /// Net change in byte length if the edits were applied.
    pub fn byte_delta(&self) -> i64 {
        self.edits
            .iter()
            .map(|e| e.new_text.len() as i64 - e.old_text.len() as i64)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
