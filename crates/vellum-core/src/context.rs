/*
 * context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Context builder.
//!
//! Turns stored content records into the `context` and `data` maps the
//! renderer consumes. Each field's stored value is passed through the
//! `data` hook of the helper named by the field's type, in schema order.
//! Records of a collection are resolved concurrently.

use futures::future::join_all;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::compiler::Theme;
use crate::expression::COLLECTION_DATA;
use crate::helper::HelperRegistry;
use crate::schema::{COLLECTION_FIELD_TYPE, Field, Template, TemplateKind};
use crate::value::{Value, ValueMap};

/// Parent id of records listed in the site navigation.
pub const NAVIGATION_GROUP: &str = "navigation";

/// A stored content record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub template_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub content: IndexMap<String, serde_json::Value>,
    #[serde(default)]
    pub metadata: IndexMap<String, serde_json::Value>,
}

impl Record {
    pub fn new(id: impl Into<String>, template_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            template_id: template_id.into(),
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_permalink(mut self, permalink: impl Into<String>) -> Self {
        self.permalink = permalink.into();
        self
    }

    pub fn with_position(mut self, position: i64) -> Self {
        self.position = position;
        self
    }

    pub fn with_content(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.content.insert(key.into(), value);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// What the renderer needs for one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContext {
    /// `this`, `meta` and one slot per settings or component template.
    pub context: ValueMap,
    /// `navigation`, `pages`, `collection`, `template`, `record`, `parent`
    /// and `children`, reached with `@name`.
    pub data: ValueMap,
}

/// Builds a [`PageContext`] from records and a compiled theme.
pub struct ContextBuilder<'a> {
    theme: &'a Theme,
    helpers: &'a HelperRegistry,
}

/// Records sorted by position, then id.
fn sorted<'r>(records: impl Iterator<Item = &'r Record>) -> Vec<&'r Record> {
    let mut records: Vec<&Record> = records.collect();
    records.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
    records
}

/// Whether `url` lies strictly below `permalink`.
pub fn is_parent_active(permalink: &str, url: &str) -> bool {
    if permalink.is_empty() || permalink == "/" || url.len() <= permalink.len() {
        return false;
    }
    url.starts_with(permalink)
        && (permalink.ends_with('/') || url[permalink.len()..].starts_with('/'))
}

impl<'a> ContextBuilder<'a> {
    pub fn new(theme: &'a Theme, helpers: &'a HelperRegistry) -> Self {
        Self { theme, helpers }
    }

    /// Build the render input for `current`, drawing related records from
    /// `records`.
    pub async fn build(&self, current: &Record, records: &[Record]) -> PageContext {
        let url = current.permalink.as_str();
        let template = self.theme.template(&current.template_id);

        let this = self.resolve_record(current, records, url).await;
        let meta = match template {
            Some(template) => {
                Value::Map(self.resolve_fields(&template.metadata, &current.metadata).await)
            }
            None => Value::Map(convert(&current.metadata)),
        };

        let mut context = ValueMap::new();
        context.insert("this".to_string(), this.clone());
        context.insert("meta".to_string(), meta);
        for template in self.theme.templates.values() {
            if matches!(template.kind, TemplateKind::Settings | TemplateKind::Component) {
                let value = self.resolve_slot(template, records, url).await;
                context.insert(template.name.clone(), value);
            }
        }

        let parent = match current.parent_id.as_deref() {
            Some(parent_id) => match records.iter().find(|record| record.id == parent_id) {
                Some(parent) => self.resolve_flat(parent, url).await,
                None => Value::Null,
            },
            None => Value::Null,
        };
        let children = sorted(
            records
                .iter()
                .filter(|record| record.parent_id.as_deref() == Some(current.id.as_str())),
        );
        let children =
            join_all(children.into_iter().map(|child| self.resolve_flat(child, url))).await;

        let mut data = ValueMap::new();
        data.insert(
            "navigation".to_string(),
            Value::List(
                sorted(
                    records
                        .iter()
                        .filter(|record| record.parent_id.as_deref() == Some(NAVIGATION_GROUP)),
                )
                .into_iter()
                .map(|record| link_entry(record, url))
                .collect(),
            ),
        );
        data.insert(
            "pages".to_string(),
            Value::List(
                sorted(
                    records
                        .iter()
                        .filter(|record| self.kind_of(record) == Some(TemplateKind::Page)),
                )
                .into_iter()
                .map(|record| link_entry(record, url))
                .collect(),
            ),
        );
        data.insert(
            COLLECTION_DATA.to_string(),
            Value::Map(self.resolve_collections(records, url).await),
        );
        data.insert(
            "template".to_string(),
            Value::map([
                ("id", Value::from(current.template_id.as_str())),
                (
                    "name",
                    Value::from(template.map_or(current.template_id.as_str(), |t| t.name.as_str())),
                ),
                (
                    "kind",
                    template.map_or(Value::Null, |t| Value::from(t.kind.as_str())),
                ),
            ]),
        );
        data.insert("record".to_string(), this);
        data.insert("parent".to_string(), parent);
        data.insert("children".to_string(), Value::List(children));

        debug!(
            record = %current.id,
            template = %current.template_id,
            records = records.len(),
            "Built page context"
        );
        PageContext { context, data }
    }

    fn kind_of(&self, record: &Record) -> Option<TemplateKind> {
        self.theme
            .template(&record.template_id)
            .map(|template| template.kind)
    }

    /// Every collection's records, resolved concurrently.
    async fn resolve_collections(&self, records: &[Record], url: &str) -> ValueMap {
        let mut collections = ValueMap::new();
        for template in self.theme.templates.values() {
            if template.kind != TemplateKind::Collection {
                continue;
            }
            let members = sorted(
                records
                    .iter()
                    .filter(|record| record.template_id == template.id),
            );
            let resolved =
                join_all(members.into_iter().map(|record| self.resolve_record(record, records, url)))
                    .await;
            trace!(collection = %template.name, records = resolved.len(), "Resolved collection");
            collections.insert(template.name.clone(), Value::List(resolved));
        }
        collections
    }

    /// A settings or component slot: its first record, or field defaults.
    async fn resolve_slot(&self, template: &Template, records: &[Record], url: &str) -> Value {
        match records.iter().find(|record| record.template_id == template.id) {
            Some(record) => self.resolve_record(record, records, url).await,
            None => Value::Map(self.resolve_fields(&template.fields, &IndexMap::new()).await),
        }
    }

    /// Resolve a record's fields, expanding collection-typed fields into
    /// their linked records.
    async fn resolve_record(&self, record: &Record, records: &[Record], url: &str) -> Value {
        let Some(template) = self.theme.template(&record.template_id) else {
            return entry(record, convert(&record.content), url);
        };

        let mut values = ValueMap::new();
        for field in template.fields.values() {
            let raw = record.content.get(&field.key);
            let value = if field.field_type == COLLECTION_FIELD_TYPE {
                let linked = linked_records(field, raw, records);
                Value::List(
                    join_all(linked.into_iter().map(|linked| self.resolve_flat(linked, url))).await,
                )
            } else {
                self.resolve_value(field, raw).await
            };
            values.insert(field.key.clone(), value);
        }
        append_unlisted(&mut values, &record.content);
        entry(record, values, url)
    }

    /// Resolve a record's fields without expanding collection-typed fields.
    async fn resolve_flat(&self, record: &Record, url: &str) -> Value {
        match self.theme.template(&record.template_id) {
            Some(template) => {
                let mut values = self.resolve_fields(&template.fields, &record.content).await;
                append_unlisted(&mut values, &record.content);
                entry(record, values, url)
            }
            None => entry(record, convert(&record.content), url),
        }
    }

    /// Fields in schema order, one at a time.
    async fn resolve_fields(
        &self,
        fields: &IndexMap<String, Field>,
        stored: &IndexMap<String, serde_json::Value>,
    ) -> ValueMap {
        let mut values = ValueMap::new();
        for field in fields.values() {
            let value = self.resolve_value(field, stored.get(&field.key)).await;
            values.insert(field.key.clone(), value);
        }
        values
    }

    /// Run a stored value through the `data` hook of the field's helper.
    async fn resolve_value(&self, field: &Field, raw: Option<&serde_json::Value>) -> Value {
        let raw = raw.map(Value::from).unwrap_or_default();
        match self.helpers.resolve(&field.field_type) {
            Some(helper) => helper.data(raw, field).await,
            None => raw,
        }
    }
}

/// Records a collection-typed field points at: the ids stored in the field,
/// in stored order, or else every record of the linked collection.
fn linked_records<'r>(
    field: &Field,
    raw: Option<&serde_json::Value>,
    records: &'r [Record],
) -> Vec<&'r Record> {
    if let Some(serde_json::Value::Array(ids)) = raw {
        return ids
            .iter()
            .filter_map(serde_json::Value::as_str)
            .filter_map(|id| records.iter().find(|record| record.id == id))
            .collect();
    }
    match field.collection.as_deref() {
        Some(collection) => sorted(
            records
                .iter()
                .filter(|record| record.template_id == collection),
        ),
        None => Vec::new(),
    }
}

fn convert(values: &IndexMap<String, serde_json::Value>) -> ValueMap {
    values
        .iter()
        .map(|(key, value)| (key.clone(), Value::from(value)))
        .collect()
}

/// Stored values the schema does not list are passed through unchanged.
fn append_unlisted(values: &mut ValueMap, stored: &IndexMap<String, serde_json::Value>) {
    for (key, value) in stored {
        if !values.contains_key(key) {
            values.insert(key.clone(), Value::from(value));
        }
    }
}

fn entry(record: &Record, mut values: ValueMap, url: &str) -> Value {
    values.insert("id".to_string(), Value::from(record.id.as_str()));
    values.insert(
        "permalink".to_string(),
        Value::from(record.permalink.as_str()),
    );
    values.insert(
        "isActive".to_string(),
        Value::Bool(!record.permalink.is_empty() && record.permalink == url),
    );
    values.insert(
        "isParentActive".to_string(),
        Value::Bool(is_parent_active(&record.permalink, url)),
    );
    Value::Map(values)
}

/// A navigation or page-list entry: stored content plus link flags.
fn link_entry(record: &Record, url: &str) -> Value {
    entry(record, convert(&record.content), url)
}
