/*
 * schema.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Content schema: templates and their fields.
//!
//! A [`Template`] is identified by `(name, kind)` alone, so the same logical
//! template discovered in several files merges into one entry. Merging is
//! idempotent, and commutative except where two files give the same field
//! different explicit types (the later merge wins and a warning is logged).

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Field type assumed when none is declared.
pub const DEFAULT_FIELD_TYPE: &str = "text";

/// Field type that links a field to a collection template.
pub const COLLECTION_FIELD_TYPE: &str = "collection";

/// Name of the shared settings bucket for site-wide values.
pub const GENERAL_SETTINGS: &str = "general";

/// Largest explicit priority. The range above it is left for the numbers
/// given to fields without one.
pub const MAX_PRIORITY: u32 = 2_147_483_647;

/// Free-form options attached to fields and templates.
pub type Options = IndexMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Page,
    Collection,
    Settings,
    Component,
}

impl TemplateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateKind::Page => "page",
            TemplateKind::Collection => "collection",
            TemplateKind::Settings => "settings",
            TemplateKind::Component => "component",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a template: `lowercase(name + "-" + kind)`.
pub fn template_id(name: &str, kind: TemplateKind) -> String {
    format!("{name}-{kind}").to_lowercase()
}

/// One typed, prioritized content slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub key: String,
    #[serde(rename = "type")]
    pub field_type: String,
    /// Lower sorts first. `None` until normalized after compilation.
    pub priority: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Template id of the linked collection, for collection-typed fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub options: Options,
}

impl Field {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            field_type: DEFAULT_FIELD_TYPE.to_string(),
            priority: None,
            label: None,
            collection: None,
            options: Options::new(),
        }
    }

    pub fn has_explicit_type(&self) -> bool {
        self.field_type != DEFAULT_FIELD_TYPE
    }

    /// Fold `other` into this field.
    ///
    /// An explicit type beats the default whichever side it comes from;
    /// the lower priority wins; label and options from `other` override.
    pub fn merge(&mut self, other: &Field) {
        if other.has_explicit_type() {
            if self.has_explicit_type() && self.field_type != other.field_type {
                warn!(
                    field = %self.key,
                    existing = %self.field_type,
                    incoming = %other.field_type,
                    "Conflicting field types, keeping the later one"
                );
            }
            self.field_type = other.field_type.clone();
        }
        self.priority = match (self.priority, other.priority) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        if other.label.is_some() {
            self.label = other.label.clone();
        }
        if other.collection.is_some() {
            self.collection = other.collection.clone();
        }
        for (key, value) in &other.options {
            self.options.insert(key.clone(), value.clone());
        }
    }
}

/// Insert `field` into `fields`, merging with any existing entry.
pub fn merge_field(fields: &mut IndexMap<String, Field>, field: Field) -> &Field {
    let key = field.key.clone();
    match fields.entry(key) {
        indexmap::map::Entry::Occupied(entry) => {
            let existing = entry.into_mut();
            existing.merge(&field);
            existing
        }
        indexmap::map::Entry::Vacant(entry) => entry.insert(field),
    }
}

/// The inferred schema of one page, collection, settings group or component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub kind: TemplateKind,
    pub fields: IndexMap<String, Field>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata: IndexMap<String, Field>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub options: Options,
    #[serde(default)]
    pub sortable: bool,
}

impl Template {
    pub fn new(name: impl Into<String>, kind: TemplateKind) -> Self {
        let name = name.into();
        Self {
            id: template_id(&name, kind),
            name,
            kind,
            fields: IndexMap::new(),
            metadata: IndexMap::new(),
            options: Options::new(),
            sortable: false,
        }
    }

    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields.get(key)
    }

    /// Deep-merge fields and metadata; shallow-merge options.
    pub fn merge(&mut self, other: &Template) {
        for field in other.fields.values() {
            merge_field(&mut self.fields, field.clone());
        }
        for field in other.metadata.values() {
            merge_field(&mut self.metadata, field.clone());
        }
        for (key, value) in &other.options {
            self.options.insert(key.clone(), value.clone());
        }
        self.sortable |= other.sortable;
    }

    /// Resolve unset priorities and sort fields by priority.
    pub fn normalize(&mut self) {
        normalize_fields(&mut self.fields);
        normalize_fields(&mut self.metadata);
    }
}

/// Give every unset priority a sequential number above the highest explicit
/// one, then sort. Equal priorities keep discovery order.
pub fn normalize_fields(fields: &mut IndexMap<String, Field>) {
    let mut next = fields
        .values()
        .filter_map(|field| field.priority)
        .max()
        .map_or(0, |max| max.saturating_add(1));
    for field in fields.values_mut() {
        if field.priority.is_none() {
            field.priority = Some(next);
            next = next.saturating_add(1);
        }
    }
    fields.sort_by(|_, a, _, b| a.priority.cmp(&b.priority));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(key: &str, field_type: &str) -> Field {
        Field {
            field_type: field_type.to_string(),
            ..Field::new(key)
        }
    }

    #[test]
    fn test_template_id() {
        assert_eq!(template_id("Blog", TemplateKind::Collection), "blog-collection");
        assert_eq!(Template::new("index", TemplateKind::Page).id, "index-page");
    }

    #[test]
    fn test_explicit_type_wins_in_both_orders() {
        let mut a = Field::new("date");
        a.merge(&typed("date", "date"));
        assert_eq!(a.field_type, "date");

        let mut b = typed("date", "date");
        b.merge(&Field::new("date"));
        assert_eq!(b.field_type, "date");
    }

    #[test]
    fn test_priority_takes_minimum() {
        let mut a = Field {
            priority: Some(2),
            ..Field::new("title")
        };
        a.merge(&Field::new("title"));
        assert_eq!(a.priority, Some(2));
        a.merge(&Field {
            priority: Some(1),
            ..Field::new("title")
        });
        assert_eq!(a.priority, Some(1));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut template = Template::new("index", TemplateKind::Page);
        merge_field(&mut template.fields, typed("title", "text"));
        merge_field(&mut template.fields, typed("date", "date"));
        let once = template.clone();
        template.merge(&once);
        assert_eq!(template, once);
    }

    #[test]
    fn test_normalize_assigns_after_max() {
        let mut fields = IndexMap::new();
        merge_field(&mut fields, Field::new("a"));
        merge_field(
            &mut fields,
            Field {
                priority: Some(5),
                ..Field::new("b")
            },
        );
        merge_field(&mut fields, Field::new("c"));
        normalize_fields(&mut fields);

        let order: Vec<(&str, Option<u32>)> = fields
            .values()
            .map(|f| (f.key.as_str(), f.priority))
            .collect();
        assert_eq!(order, vec![("b", Some(5)), ("a", Some(6)), ("c", Some(7))]);
    }

    #[test]
    fn test_normalize_ties_keep_discovery_order() {
        let mut fields = IndexMap::new();
        for key in ["z", "y", "x"] {
            merge_field(
                &mut fields,
                Field {
                    priority: Some(1),
                    ..Field::new(key)
                },
            );
        }
        normalize_fields(&mut fields);
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["z", "y", "x"]);
    }

    #[test]
    fn test_normalize_above_largest_priority() {
        let mut fields = IndexMap::new();
        merge_field(
            &mut fields,
            Field {
                priority: Some(MAX_PRIORITY),
                ..Field::new("a")
            },
        );
        merge_field(&mut fields, Field::new("b"));
        normalize_fields(&mut fields);
        assert_eq!(fields["b"].priority, Some(MAX_PRIORITY + 1));

        let mut fields = IndexMap::new();
        merge_field(
            &mut fields,
            Field {
                priority: Some(u32::MAX),
                ..Field::new("a")
            },
        );
        merge_field(&mut fields, Field::new("b"));
        normalize_fields(&mut fields);
        assert_eq!(fields["b"].priority, Some(u32::MAX));
    }
}
