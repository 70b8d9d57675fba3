//! Location and symbol descriptions shared by the error and output modules.

use serde::{Deserialize, Serialize};

// ============================================================================
// Location
// ============================================================================

/// A position in a source file.
///
/// `line` and `col` are 1-indexed; `col` counts UTF-8 bytes. The byte span
/// is present when the location describes a token rather than a cursor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    /// File path as given by the caller.
    pub file: String,
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed, UTF-8 bytes).
    pub col: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_start: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_end: Option<u64>,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32, col: u32) -> Self {
        Location {
            file: file.into(),
            line,
            col,
            byte_start: None,
            byte_end: None,
        }
    }

    /// A location covering the byte span `[byte_start, byte_end)`.
    pub fn with_span(
        file: impl Into<String>,
        line: u32,
        col: u32,
        byte_start: u64,
        byte_end: u64,
    ) -> Self {
        Location {
            file: file.into(),
            line,
            col,
            byte_start: Some(byte_start),
            byte_end: Some(byte_end),
        }
    }

    /// Parse `path:line:col`. The path may itself contain colons.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.rsplitn(3, ':');
        let col: u32 = parts.next()?.parse().ok()?;
        let line: u32 = parts.next()?.parse().ok()?;
        let file = parts.next()?;
        if file.is_empty() || line == 0 || col == 0 {
            return None;
        }
        Some(Location::new(file, line, col))
    }

    fn sort_key(&self) -> (&str, u32, u32) {
        (&self.file, self.line, self.col)
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

// ============================================================================
// SymbolInfo
// ============================================================================

/// A declaration as reported in JSON output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SymbolInfo {
    /// Declaration id, stable within one analysis of one text.
    pub id: String,
    pub name: String,
    /// One of: type, field, method, parameter, local.
    pub kind: String,
    /// Location of the declaring name token.
    pub location: Location,
    /// Dotted path of the enclosing named scopes, e.g. `Outer.run`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

impl SymbolInfo {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: impl Into<String>,
        location: Location,
    ) -> Self {
        SymbolInfo {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
            location,
            container: None,
        }
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        let container = container.into();
        self.container = if container.is_empty() {
            None
        } else {
            Some(container)
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod location {
        use super::*;

        #[test]
        fn parse_simple() {
            let loc = Location::parse("src/A.java:21:12").unwrap();
            assert_eq!(loc.file, "src/A.java");
            assert_eq!(loc.line, 21);
            assert_eq!(loc.col, 12);
        }

        #[test]
        fn parse_path_with_colon() {
            let loc = Location::parse("C:\\work\\A.java:3:4").unwrap();
            assert_eq!(loc.file, "C:\\work\\A.java");
            assert_eq!((loc.line, loc.col), (3, 4));
        }

        #[test]
        fn parse_rejects_missing_parts() {
            assert!(Location::parse("A.java:3").is_none());
            assert!(Location::parse("A.java:x:4").is_none());
            assert!(Location::parse(":3:4").is_none());
            assert!(Location::parse("A.java:0:4").is_none());
        }

        #[test]
        fn ordering_is_file_line_col() {
            let mut locs = vec![
                Location::new("b.java", 1, 1),
                Location::new("a.java", 2, 1),
                Location::new("a.java", 1, 5),
            ];
            locs.sort();
            assert_eq!(locs[0], Location::new("a.java", 1, 5));
            assert_eq!(locs[2], Location::new("b.java", 1, 1));
        }

        #[test]
        fn byte_span_is_omitted_when_absent() {
            let json = serde_json::to_string(&Location::new("A.java", 1, 2)).unwrap();
            assert!(!json.contains("byte_start"));
            let json =
                serde_json::to_string(&Location::with_span("A.java", 1, 2, 1, 4)).unwrap();
            assert!(json.contains("\"byte_end\":4"));
        }
    }

    mod symbol_info {
        use super::*;

        #[test]
        fn empty_container_is_none() {
            let sym = SymbolInfo::new("decl_1", "x", "field", Location::new("A.java", 1, 1))
                .with_container("");
            assert!(sym.container.is_none());
            let sym = sym.with_container("A");
            assert_eq!(sym.container.as_deref(), Some("A"));
        }
    }
}
