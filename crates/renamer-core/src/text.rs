//! Byte offset and line:column conversions.
//!
//! Lines and columns are 1-indexed and columns count UTF-8 bytes, which is
//! what the edit reports and the `FILE:LINE:COL` locator use. Byte offsets
//! are 0-indexed. A line or column of 0 is treated as 1.

use crate::patch::Span;

/// Convert a byte offset into a 1-indexed `(line, col)` pair.
///
/// Offsets past the end of `content` clamp to the end.
pub fn offset_to_position(content: &str, offset: u64) -> (u32, u32) {
    let offset = (offset as usize).min(content.len());
    let before = &content.as_bytes()[..offset];
    let line = before.iter().filter(|&&b| b == b'\n').count() as u32 + 1;
    let line_start = before
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    let col = (offset - line_start) as u32 + 1;
    (line, col)
}

/// Convert a 1-indexed `(line, col)` pair into a byte offset.
///
/// Returns `None` when the line does not exist or the column runs past the
/// end of the line (the newline position itself is accepted).
pub fn position_to_offset(content: &str, line: u32, col: u32) -> Option<u64> {
    let line = line.max(1) as usize;
    let col = col.max(1) as usize;

    let mut line_start = 0usize;
    for _ in 1..line {
        let rest = content.get(line_start..)?;
        let newline = rest.find('\n')?;
        line_start += newline + 1;
    }

    let (start, end) = line_bounds(content, line_start as u64);
    let offset = start as usize + col - 1;
    if offset > end as usize {
        return None;
    }
    Some(offset as u64)
}

/// Byte bounds `(start, end)` of the line containing `offset`, excluding the
/// trailing newline.
pub fn line_bounds(content: &str, offset: u64) -> (u64, u64) {
    let bytes = content.as_bytes();
    let offset = (offset as usize).min(bytes.len());
    let start = bytes[..offset]
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    let end = bytes[offset..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| offset + i)
        .unwrap_or(bytes.len());
    (start as u64, end as u64)
}

/// Text of the line containing `span.start`.
pub fn line_of(content: &str, span: Span) -> &str {
    let (start, end) = line_bounds(content, span.start);
    &content[start as usize..end as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = "class A {\n    int x;\n}\n";

    #[test]
    fn offset_zero_is_line_one_col_one() {
        assert_eq!(offset_to_position(SRC, 0), (1, 1));
    }

    #[test]
    fn offset_after_newline_starts_next_line() {
        // "    int x;" begins at byte 10
        assert_eq!(offset_to_position(SRC, 10), (2, 1));
        assert_eq!(offset_to_position(SRC, 18), (2, 9));
    }

    #[test]
    fn offset_past_end_clamps() {
        assert_eq!(offset_to_position(SRC, 999), (4, 1));
    }

    #[test]
    fn position_round_trips_through_offset() {
        let offset = position_to_offset(SRC, 2, 9).unwrap();
        assert_eq!(offset, 18);
        assert_eq!(&SRC[offset as usize..offset as usize + 1], "x");
    }

    #[test]
    fn position_on_missing_line_is_none() {
        assert_eq!(position_to_offset(SRC, 9, 1), None);
    }

    #[test]
    fn position_past_line_end_is_none() {
        assert_eq!(position_to_offset(SRC, 1, 40), None);
    }

    #[test]
    fn line_of_returns_whole_line_without_newline() {
        assert_eq!(line_of(SRC, Span::new(18, 19)), "    int x;");
    }

    #[test]
    fn line_bounds_on_last_line_without_newline() {
        let src = "a\nbc";
        assert_eq!(line_bounds(src, 3), (2, 4));
    }
}
