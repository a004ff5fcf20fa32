/*
 * collection.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The `collection` helper: a windowed view over a list of records.
//!
//! ```text
//! {{#collection @collection.posts offset=1 limit=3 as |post|}}
//!   <h2>{{post.title}}</h2>
//! {{/collection}}
//! ```

use super::control::{each_item, iterable};
use crate::error::RenderResult;
use crate::helper::{BlockRenderer, Helper, HelperKind};
use crate::value::{Value, ValueMap};

#[derive(Debug, Default)]
pub struct CollectionHelper;

fn count(hash: &ValueMap, key: &str) -> Option<usize> {
    hash.get(key)
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n as usize)
}

impl Helper for CollectionHelper {
    fn kind(&self) -> HelperKind {
        HelperKind::Collection
    }

    fn render(
        &self,
        params: &[Value],
        hash: &ValueMap,
        blocks: &mut dyn BlockRenderer,
    ) -> RenderResult<Value> {
        let offset = count(hash, "offset").unwrap_or(0);
        let limit = count(hash, "limit").unwrap_or(usize::MAX);
        let items: Vec<(Value, Value)> = iterable(params.first())
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect();

        if blocks.has_block() {
            each_item(items, blocks)
        } else {
            Ok(Value::List(items.into_iter().map(|(item, _)| item).collect()))
        }
    }

    fn default_value(&self) -> Value {
        Value::List(Vec::new())
    }

    fn options_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "limit": { "type": "number" },
            "offset": { "type": "number" },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::NoBlocks;

    #[test]
    fn test_window() {
        let list = Value::List((0..5).map(|n| Value::Number(f64::from(n))).collect());
        let mut hash = ValueMap::new();
        hash.insert("offset".to_string(), Value::Number(1.0));
        hash.insert("limit".to_string(), Value::Number(2.0));

        let value = CollectionHelper
            .render(&[list], &hash, &mut NoBlocks)
            .unwrap();
        assert_eq!(
            value,
            Value::List(vec![Value::Number(1.0), Value::Number(2.0)])
        );
    }

    #[test]
    fn test_missing_list_is_empty() {
        let value = CollectionHelper
            .render(&[Value::Null], &ValueMap::new(), &mut NoBlocks)
            .unwrap();
        assert_eq!(value, Value::List(vec![]));
    }
}
