// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Behavioral properties of the rename pipeline.
//!
//! - lossless lexing over a small corpus
//! - idempotence of an applied rename
//! - non-interference between same-named declarations
//! - substring safety for comments, strings and longer identifiers
//! - shadowing: inner locals win over outer fields
//!
//! # Running These Tests
//!
//! ```bash
//! cargo nextest run -p renamer-clike properties
//! ```

use renamer_clike::binder::Resolution;
use renamer_clike::lexer::tokenize;
use renamer_clike::pipeline::{rename, Analysis, RenameOptions};
use renamer_clike::plan::DeclarationLocator;
use renamer_clike::scope::DeclKind;

const CORPUS: &[&str] = &[
    include_str!("fixtures/identifiers.java"),
    include_str!("fixtures/identifiers_replaced.java"),
    "",
    "   \n\t\r\n",
    "// only a comment",
    "class A { /* block */ String s = \"a \\\" b\"; char c = '\\''; }",
    "class T { String t = \"\"\"\n  text \"block\"\n  \"\"\"; }",
    "enum Color { RED, GREEN; Color next() { return values()[0]; } }",
    "class G<K, V extends Comparable<V>> { Map<K, List<V>> m; int x = a >>> 2; }",
    "class U { String größe = \"ü\"; int $dollar_1 = 0x1F + 1_000 + 1.5e3; }",
];

fn offset_of(source: &str, needle: &str) -> u64 {
    source.find(needle).unwrap_or_else(|| panic!("{needle:?} not in source")) as u64
}

// ============================================================================
// Losslessness
// ============================================================================

mod lossless {
    use super::*;

    #[test]
    fn test_tokens_reassemble_input() {
        for source in CORPUS {
            let tokens = tokenize(source).unwrap();
            let joined: String = tokens.iter().map(|t| t.text).collect();
            assert_eq!(&joined, source);
        }
    }

    #[test]
    fn test_token_spans_are_contiguous() {
        for source in CORPUS {
            let tokens = tokenize(source).unwrap();
            let mut cursor = 0u64;
            for token in &tokens {
                assert_eq!(token.span.start, cursor);
                assert_eq!(token.span.slice(source), Some(token.text));
                cursor = token.span.end;
            }
            assert_eq!(cursor, source.len() as u64);
        }
    }
}

// ============================================================================
// Idempotence
// ============================================================================

mod idempotence {
    use super::*;

    const SOURCE: &str = "class Account {\n    int balance;\n    void deposit(int amount) {\n        balance += amount;\n    }\n    int read() { return this.balance; }\n}\n";

    #[test]
    fn test_second_pass_finds_nothing_to_change() {
        let locator = DeclarationLocator::path("Account", DeclKind::Field, "balance");
        let once = rename(SOURCE, &locator, "funds").unwrap();

        let repointed = DeclarationLocator::path("Account", DeclKind::Field, "funds");
        let analysis = Analysis::new(&once).unwrap();
        let plan = analysis
            .plan(&repointed, "funds", &RenameOptions::default())
            .unwrap();
        assert!(plan.is_identity());
        assert_eq!(plan.spans.len(), 3);
        assert_eq!(analysis.apply(&plan).unwrap(), once);
    }

    #[test]
    fn test_old_name_is_gone_after_rename() {
        let locator = DeclarationLocator::path("Account", DeclKind::Field, "balance");
        let once = rename(SOURCE, &locator, "funds").unwrap();
        assert!(matches!(
            rename(&once, &locator, "funds"),
            Err(renamer_clike::RenameError::DeclarationNotFound { .. })
        ));
    }

    #[test]
    fn test_identity_rename_returns_input() {
        let locator = DeclarationLocator::path("Account.deposit", DeclKind::Parameter, "amount");
        assert_eq!(rename(SOURCE, &locator, "amount").unwrap(), SOURCE);
    }
}

// ============================================================================
// Non-interference
// ============================================================================

mod non_interference {
    use super::*;

    #[test]
    fn test_same_named_locals_in_sibling_methods() {
        let source = "class A { void f() { int n = 1; n++; } void g() { int n = 2; n--; } }";
        let out = rename(source, &DeclarationLocator::at(offset_of(source, "n = 1")), "m").unwrap();
        assert_eq!(out, "class A { void f() { int m = 1; m++; } void g() { int n = 2; n--; } }");
    }

    #[test]
    fn test_field_rename_skips_shadowing_parameter() {
        let source = "class A { int v; void set(int v) { this.v = v; } int get() { return v; } }";
        let out = rename(source, &DeclarationLocator::path("A", DeclKind::Field, "v"), "value").unwrap();
        assert_eq!(
            out,
            "class A { int value; void set(int v) { this.value = v; } int get() { return value; } }"
        );
    }

    #[test]
    fn test_members_of_other_types_untouched() {
        let source = "class P { int x; } class Q { int x; } class U { void f(P p, Q q) { p.x = q.x; } }";
        let out = rename(source, &DeclarationLocator::path("P", DeclKind::Field, "x"), "px").unwrap();
        assert_eq!(out, "class P { int px; } class Q { int x; } class U { void f(P p, Q q) { p.px = q.x; } }");
    }

    #[test]
    fn test_foreign_receivers_untouched() {
        let source = "class A { int size; int f(java.util.List l) { return l.size + size; } }";
        let out = rename(source, &DeclarationLocator::path("A", DeclKind::Field, "size"), "count").unwrap();
        assert_eq!(out, "class A { int count; int f(java.util.List l) { return l.size + count; } }");
    }
}

// ============================================================================
// Substring safety
// ============================================================================

mod substring_safety {
    use super::*;

    #[test]
    fn test_comments_strings_and_longer_names_survive() {
        let source = "class A {\n    int num; // num\n    int number;\n    String label = \"num\";\n    /* num */ int f() { return num + number + numb; }\n}\n";
        let out = rename(source, &DeclarationLocator::path("A", DeclKind::Field, "num"), "count").unwrap();
        assert_eq!(
            out,
            "class A {\n    int count; // num\n    int number;\n    String label = \"num\";\n    /* num */ int f() { return count + number + numb; }\n}\n"
        );
    }

    #[test]
    fn test_text_blocks_and_chars_survive() {
        let source = "class A { int c; String t = \"\"\"\n  c\n  \"\"\"; char k = 'c'; int f() { return c; } }";
        let out = rename(source, &DeclarationLocator::path("A", DeclKind::Field, "c"), "d").unwrap();
        assert_eq!(
            out,
            "class A { int d; String t = \"\"\"\n  c\n  \"\"\"; char k = 'c'; int f() { return d; } }"
        );
    }
}

// ============================================================================
// Shadowing
// ============================================================================

mod shadowing {
    use super::*;

    const SOURCE: &str =
        "class A { int value; void f() { int value = 3; use(value); } void g() { use(value); } }";

    #[test]
    fn test_inner_local_wins() {
        let analysis = Analysis::new(SOURCE).unwrap();
        let tree = analysis.tree();
        let local = tree
            .declarations()
            .iter()
            .find(|d| d.kind == DeclKind::Local)
            .unwrap();
        let field = tree
            .declarations()
            .iter()
            .find(|d| d.kind == DeclKind::Field)
            .unwrap();
        let uses: Vec<_> = analysis
            .bindings()
            .references()
            .iter()
            .filter(|r| r.name == "value")
            .collect();
        assert_eq!(uses.len(), 2);
        assert_eq!(uses[0].resolution, Resolution::Resolved(local.id));
        assert_eq!(uses[1].resolution, Resolution::Resolved(field.id));
    }

    #[test]
    fn test_field_rename_leaves_local_block_alone() {
        let out = rename(SOURCE, &DeclarationLocator::path("A", DeclKind::Field, "value"), "total").unwrap();
        assert_eq!(
            out,
            "class A { int total; void f() { int value = 3; use(value); } void g() { use(total); } }"
        );
    }

    #[test]
    fn test_local_rename_leaves_field_alone() {
        let out = rename(SOURCE, &DeclarationLocator::path("A.f", DeclKind::Local, "value"), "total").unwrap();
        assert_eq!(
            out,
            "class A { int value; void f() { int total = 3; use(total); } void g() { use(value); } }"
        );
    }
}
