// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Span-exact rewriting.
//!
//! Output is reassembled from the token stream into a fresh buffer. A token
//! is replaced only when its span is one the plan names; every other byte,
//! including comments and string literals that happen to contain the old
//! name, is copied through unchanged.

use tracing::debug;

use renamer_core::diff::generate_unified_diff;
use renamer_core::patch::{ContentHash, MaterializedPatch, OutputEdit};
use renamer_core::text::offset_to_position;

use crate::error::{RenameError, RenameResult};
use crate::lexer::Token;
use crate::plan::RenamePlan;

/// Apply `plan` to `source`, whose tokens are `tokens`.
///
/// Fails with [`RenameError::StalePlan`] when the source is not the text the
/// plan was computed against, or a planned span is not an identifier token
/// spelling the old name.
pub fn apply(source: &str, tokens: &[Token<'_>], plan: &RenamePlan) -> RenameResult<String> {
    check_fresh(source, plan)?;

    let mut output = String::with_capacity(source.len() + plan.spans.len() * plan.new_name.len());
    let mut pending = plan.spans.iter().peekable();

    for token in tokens {
        match pending.peek() {
            Some(span) if span.start < token.span.start => {
                return Err(RenameError::stale(format!(
                    "span {span} does not start at a token boundary"
                )));
            }
            Some(span) if span.start == token.span.start => {
                if **span != token.span || !token.is_identifier() || token.text != plan.old_name {
                    return Err(RenameError::stale(format!(
                        "span {span} is not the identifier '{}'",
                        plan.old_name
                    )));
                }
                output.push_str(&plan.new_name);
                pending.next();
            }
            _ => output.push_str(token.text),
        }
    }

    if let Some(span) = pending.next() {
        return Err(RenameError::stale(format!("span {span} lies past the end of the source")));
    }

    debug!(
        replaced = plan.spans.len(),
        bytes = output.len(),
        "rewrote source"
    );
    Ok(output)
}

/// The planned replacements as edits for `file`, in span order.
pub fn edits(file: &str, source: &str, plan: &RenamePlan) -> RenameResult<Vec<OutputEdit>> {
    check_fresh(source, plan)?;
    plan.spans
        .iter()
        .map(|span| {
            let old_text = span
                .slice(source)
                .ok_or_else(|| RenameError::stale(format!("span {span} is out of bounds")))?;
            let (line, col) = offset_to_position(source, span.start);
            Ok(OutputEdit {
                file: file.to_string(),
                span: *span,
                old_text: old_text.to_string(),
                new_text: plan.new_name.clone(),
                line,
                col,
            })
        })
        .collect()
}

/// Edits plus a unified diff.
pub fn patch(file: &str, source: &str, plan: &RenamePlan) -> RenameResult<MaterializedPatch> {
    let edits = edits(file, source, plan)?;
    let diff = generate_unified_diff(file, source, &edits);
    Ok(MaterializedPatch::new(edits, diff))
}

fn check_fresh(source: &str, plan: &RenamePlan) -> RenameResult<()> {
    let actual = ContentHash::compute(source.as_bytes());
    if actual != plan.source_hash {
        return Err(RenameError::stale(format!(
            "source hash {} does not match plan hash {}",
            actual.short(),
            plan.source_hash.short()
        )));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::plan::CollisionVerdict;
    use crate::scope::{DeclId, DeclKind};
    use renamer_core::patch::Span;

    fn plan_for(source: &str, old: &str, new: &str, spans: Vec<Span>) -> RenamePlan {
        RenamePlan {
            target: DeclId(0),
            kind: DeclKind::Field,
            old_name: old.to_string(),
            new_name: new.to_string(),
            spans,
            verdict: CollisionVerdict::Clear,
            source_hash: ContentHash::compute(source.as_bytes()),
        }
    }

    fn span_of(source: &str, needle: &str, nth: usize) -> Span {
        let start = source.match_indices(needle).nth(nth).unwrap().0;
        Span::from_range(start..start + needle.len())
    }

    mod apply {
        use super::*;

        #[test]
        fn replaces_only_planned_spans() {
            let source = "int n = 1; // n\nString s = \"n\"; n++; nn = n;";
            let tokens = tokenize(source).unwrap();
            let last = source.rfind("n;").unwrap() as u64;
            let plan = plan_for(source, "n", "count", vec![Span::new(4, 5), Span::new(last, last + 1)]);
            let out = apply(source, &tokens, &plan).unwrap();
            assert_eq!(out, "int count = 1; // n\nString s = \"n\"; n++; nn = count;");
        }

        #[test]
        fn empty_plan_is_identity() {
            let source = "class A { /* keep */ }\n";
            let tokens = tokenize(source).unwrap();
            let plan = plan_for(source, "A", "B", Vec::new());
            assert_eq!(apply(source, &tokens, &plan).unwrap(), source);
        }

        #[test]
        fn changed_source_is_stale() {
            let source = "int n;";
            let plan = plan_for("int n; ", "n", "m", vec![Span::new(4, 5)]);
            let tokens = tokenize(source).unwrap();
            let err = apply(source, &tokens, &plan).unwrap_err();
            assert!(err.to_string().starts_with("stale rename plan: source hash"));
        }

        #[test]
        fn span_inside_a_token_is_stale() {
            let source = "int number;";
            let tokens = tokenize(source).unwrap();
            let plan = plan_for(source, "number", "flag", vec![Span::new(5, 11)]);
            assert!(matches!(apply(source, &tokens, &plan), Err(RenameError::StalePlan { .. })));
        }

        #[test]
        fn span_on_wrong_text_is_stale() {
            let source = "int number;";
            let tokens = tokenize(source).unwrap();
            let plan = plan_for(source, "count", "flag", vec![Span::new(4, 10)]);
            assert!(matches!(apply(source, &tokens, &plan), Err(RenameError::StalePlan { .. })));
        }

        #[test]
        fn span_on_string_literal_is_stale() {
            let source = "s = \"number\";";
            let tokens = tokenize(source).unwrap();
            let plan = plan_for(source, "\"number\"", "flag", vec![Span::new(4, 12)]);
            assert!(matches!(apply(source, &tokens, &plan), Err(RenameError::StalePlan { .. })));
        }

        #[test]
        fn span_past_end_is_stale() {
            let source = "int n;";
            let tokens = tokenize(source).unwrap();
            let plan = plan_for(source, "n", "m", vec![Span::new(4, 5), Span::new(40, 41)]);
            let err = apply(source, &tokens, &plan).unwrap_err();
            assert!(err.to_string().contains("past the end"));
        }
    }

    mod reports {
        use super::*;

        #[test]
        fn edits_carry_positions() {
            let source = "class A {\n  int n;\n  void f() { n = 2; }\n}\n";
            let plan = plan_for(
                source,
                "n",
                "count",
                vec![span_of(source, "n;", 0), span_of(source, "n = 2", 0)]
                    .into_iter()
                    .map(|s| Span::new(s.start, s.start + 1))
                    .collect(),
            );
            let edits = edits("A.java", source, &plan).unwrap();
            assert_eq!(edits.len(), 2);
            assert_eq!((edits[0].line, edits[0].col), (2, 7));
            assert_eq!((edits[1].line, edits[1].col), (3, 14));
            assert!(edits.iter().all(|e| e.old_text == "n" && e.new_text == "count"));
        }

        #[test]
        fn patch_has_diff() {
            let source = "int n;\nn = 1;\n";
            let plan = plan_for(source, "n", "m", vec![Span::new(4, 5), Span::new(7, 8)]);
            let patch = patch("a.java", source, &plan).unwrap();
            assert_eq!(patch.edits.len(), 2);
            assert!(patch.unified_diff.contains("-int n;"));
            assert!(patch.unified_diff.contains("+int m;"));
            assert!(patch.unified_diff.contains("+m = 1;"));
        }
    }
}
