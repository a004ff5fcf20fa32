/*
 * resolver.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Component resolution.
//!
//! A tag names a component when it starts with an uppercase ASCII letter
//! (`<Card>`, `<SiteHeader>`). Resolvers map such a tag to component source
//! text; lookup is case-insensitive on the component's file stem.

use std::collections::HashMap;

/// Trait for loading component source by tag.
pub trait ComponentResolver {
    /// Source text for the component `tag`, or `None` if unknown.
    fn resolve(&self, tag: &str) -> Option<String>;
}

/// Whether `tag` refers to a component rather than a markup element.
pub fn is_component_tag(tag: &str) -> bool {
    tag.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

/// Lookup key for a component tag or component name: the lowercased last
/// path segment without a leading `_`.
pub fn component_key(name: &str) -> String {
    let stem = name.rsplit('/').next().unwrap_or(name);
    stem.trim_start_matches('_').to_ascii_lowercase()
}

/// Resolver that knows no components.
#[derive(Debug, Clone, Default)]
pub struct NullResolver;

impl ComponentResolver for NullResolver {
    fn resolve(&self, _tag: &str) -> Option<String> {
        None
    }
}

/// Resolver backed by an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    components: HashMap<String, String>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component under `name` (a tag or a file name stem).
    pub fn add(&mut self, name: &str, source: impl Into<String>) -> &mut Self {
        self.components.insert(component_key(name), source.into());
        self
    }

    pub fn with_components(
        components: impl IntoIterator<Item = (impl AsRef<str>, impl Into<String>)>,
    ) -> Self {
        let mut resolver = Self::new();
        for (name, source) in components {
            resolver.add(name.as_ref(), source);
        }
        resolver
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl ComponentResolver for MemoryResolver {
    fn resolve(&self, tag: &str) -> Option<String> {
        self.components.get(&component_key(tag)).cloned()
    }
}

impl<R: ComponentResolver + ?Sized> ComponentResolver for &R {
    fn resolve(&self, tag: &str) -> Option<String> {
        (**self).resolve(tag)
    }
}
