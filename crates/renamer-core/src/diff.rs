//! Unified diff rendering for rename edits.
//!
//! Rename edits never cross a line boundary, so every hunk is a single
//! changed line shown in full with all of that line's edits applied.

use std::collections::BTreeMap;

use crate::patch::OutputEdit;
use crate::text::line_bounds;

/// Render a unified diff of `edits` against `original`, the text of `file`.
///
/// Edits for other files are ignored. Hunks come out in line order.
pub fn generate_unified_diff(file: &str, original: &str, edits: &[OutputEdit]) -> String {
    let mut by_line: BTreeMap<u32, Vec<&OutputEdit>> = BTreeMap::new();
    for edit in edits.iter().filter(|e| e.file == file) {
        by_line.entry(edit.line).or_default().push(edit);
    }
    if by_line.is_empty() {
        return String::new();
    }

    let mut diff = String::new();
    diff.push_str(&format!("--- a/{}\n", file));
    diff.push_str(&format!("+++ b/{}\n", file));

    for (line, mut line_edits) in by_line {
        line_edits.sort_by_key(|e| e.span.start);
        let (start, end) = line_bounds(original, line_edits[0].span.start);
        let old_line = &original[start as usize..end as usize];

        let mut new_line = String::with_capacity(old_line.len());
        let mut cursor = start as usize;
        for edit in &line_edits {
            let edit_start = edit.span.start as usize;
            if edit_start < cursor || edit.span.end > end {
                continue;
            }
            new_line.push_str(&original[cursor..edit_start]);
            new_line.push_str(&edit.new_text);
            cursor = edit.span.end as usize;
        }
        new_line.push_str(&original[cursor..end as usize]);

        diff.push_str(&format!("@@ -{},1 +{},1 @@\n", line, line));
        diff.push_str(&format!("-{}\n", old_line));
        diff.push_str(&format!("+{}\n", new_line));
    }

    diff
}

// ============================================================================
// Tests
// ============================================================================
