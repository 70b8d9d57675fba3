// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Cross-file resolution hook.
//!
//! The binder only knows the file it is given. When a name can only be
//! explained by another file, either a member reached through a receiver
//! whose type is not declared locally or a name inherited from an
//! unresolved supertype, it asks a [`ProjectIndex`]. The default
//! [`NoProjectIndex`] answers nothing and such references stay external
//! and untouched.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scope::DeclId;

/// A declaration living in another file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalDecl {
    pub file: String,
    /// Id within that file's own analysis.
    pub decl: DeclId,
}

impl ExternalDecl {
    pub fn new(file: impl Into<String>, decl: DeclId) -> Self {
        ExternalDecl {
            file: file.into(),
            decl,
        }
    }
}

impl fmt::Display for ExternalDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.file, self.decl)
    }
}

/// Resolves `type_name.member_name` to a declaration in another file.
///
/// Implementations are shared across batch workers, hence `Send + Sync`.
pub trait ProjectIndex: Send + Sync {
    fn resolve_external(&self, type_name: &str, member_name: &str) -> Option<ExternalDecl>;
}

/// Index that knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProjectIndex;

impl ProjectIndex for NoProjectIndex {
    fn resolve_external(&self, _type_name: &str, _member_name: &str) -> Option<ExternalDecl> {
        None
    }
}

/// In-memory index keyed by `(type name, member name)`.
#[derive(Debug, Clone, Default)]
pub struct MapProjectIndex {
    entries: HashMap<(String, String), ExternalDecl>,
}

impl MapProjectIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        type_name: impl Into<String>,
        member_name: impl Into<String>,
        decl: ExternalDecl,
    ) {
        self.entries
            .insert((type_name.into(), member_name.into()), decl);
    }

    pub fn with(
        mut self,
        type_name: impl Into<String>,
        member_name: impl Into<String>,
        decl: ExternalDecl,
    ) -> Self {
        self.insert(type_name, member_name, decl);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ProjectIndex for MapProjectIndex {
    fn resolve_external(&self, type_name: &str, member_name: &str) -> Option<ExternalDecl> {
        self.entries
            .get(&(type_name.to_string(), member_name.to_string()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_index_resolves_nothing() {
        assert_eq!(NoProjectIndex.resolve_external("Session", "x"), None);
    }

    #[test]
    fn map_index_lookup() {
        let index = MapProjectIndex::new().with(
            "Session",
            "x",
            ExternalDecl::new("Session.java", DeclId(3)),
        );
        assert_eq!(index.len(), 1);
        let found = index.resolve_external("Session", "x").unwrap();
        assert_eq!(found.to_string(), "Session.java#decl_3");
        assert!(index.resolve_external("Session", "y").is_none());
        assert!(index.resolve_external("Other", "x").is_none());
    }
}
