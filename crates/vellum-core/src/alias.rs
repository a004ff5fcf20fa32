/*
 * alias.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Alias scopes for schema inference.
//!
//! An alias maps a short name used in a template (`this`, `post`, `general`)
//! to the schema section it refers to. Each block that yields parameters
//! pushes a child scope; children shadow their parents without changing
//! them, so sibling blocks never see each other's bindings.

use std::sync::Arc;

use crate::schema::{GENERAL_SETTINGS, TemplateKind};

/// What an alias points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub section: String,
    pub kind: TemplateKind,
    /// References through a private alias never enter the schema.
    pub private: bool,
}

impl Alias {
    pub fn new(section: impl Into<String>, kind: TemplateKind, private: bool) -> Self {
        Self {
            section: section.into(),
            kind,
            private,
        }
    }
}

#[derive(Debug)]
struct Frame {
    name: String,
    alias: Alias,
    parent: Option<Arc<Frame>>,
}

/// A persistent name-to-alias table.
///
/// Cloning is cheap and [`AliasScope::bind`] never mutates `self`.
#[derive(Debug, Clone, Default)]
pub struct AliasScope {
    head: Option<Arc<Frame>>,
}

impl AliasScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// The root scope for walking the template `name` of `kind`: `this` and
    /// `meta` refer to it, `general` to the shared settings bucket.
    pub fn for_template(name: &str, kind: TemplateKind) -> Self {
        Self::new()
            .bind(
                GENERAL_SETTINGS,
                Alias::new(GENERAL_SETTINGS, TemplateKind::Settings, false),
            )
            .bind("meta", Alias::new(name, kind, false))
            .bind("this", Alias::new(name, kind, false))
    }

    /// A child scope with `name` bound to `alias`.
    pub fn bind(&self, name: impl Into<String>, alias: Alias) -> AliasScope {
        AliasScope {
            head: Some(Arc::new(Frame {
                name: name.into(),
                alias,
                parent: self.head.clone(),
            })),
        }
    }

    /// The innermost binding for `name`.
    pub fn get(&self, name: &str) -> Option<&Alias> {
        let mut frame = self.head.as_deref();
        while let Some(current) = frame {
            if current.name == name {
                return Some(&current.alias);
            }
            frame = current.parent.as_deref();
        }
        None
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_scope() {
        let scope = AliasScope::for_template("index", TemplateKind::Page);
        assert_eq!(
            scope.get("this"),
            Some(&Alias::new("index", TemplateKind::Page, false))
        );
        assert_eq!(scope.get("general").map(|a| a.kind), Some(TemplateKind::Settings));
        assert!(scope.contains("meta"));
        assert!(!scope.contains("post"));
    }

    #[test]
    fn test_child_shadows_without_mutating_parent() {
        let parent = AliasScope::for_template("index", TemplateKind::Page);
        let child = parent.bind("this", Alias::new("other", TemplateKind::Settings, true));

        assert_eq!(child.get("this").map(|a| a.section.as_str()), Some("other"));
        assert_eq!(parent.get("this").map(|a| a.section.as_str()), Some("index"));
        assert!(child.contains("general"));
    }

    #[test]
    fn test_siblings_are_isolated() {
        let root = AliasScope::new();
        let a = root.bind("post", Alias::new("blog", TemplateKind::Collection, false));
        let b = root.bind("item", Alias::new("item", TemplateKind::Settings, true));
        assert!(!a.contains("item"));
        assert!(!b.contains("post"));
    }
}
