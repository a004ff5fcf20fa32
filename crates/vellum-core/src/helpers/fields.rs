/*
 * fields.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Minimal field directives: `text`, `html`, `number`, `link`.
//!
//! Used as `{{text this.title}}` or `{{#link this.cta as |cta|}}...{{/link}}`,
//! each marks its first parameter as a field of its own type and formats the
//! stored value for rendering.

use async_trait::async_trait;

use crate::error::RenderResult;
use crate::helper::{BlockRenderer, Helper, HelperKind};
use crate::schema::Field;
use crate::value::{Value, ValueMap};

/// Plain text, inserted escaped.
#[derive(Debug, Default)]
pub struct TextHelper;

#[async_trait]
impl Helper for TextHelper {
    fn kind(&self) -> HelperKind {
        HelperKind::Value
    }

    fn render(
        &self,
        params: &[Value],
        _hash: &ValueMap,
        _blocks: &mut dyn BlockRenderer,
    ) -> RenderResult<Value> {
        Ok(Value::String(
            params.first().map(Value::to_display).unwrap_or_default(),
        ))
    }

    async fn data(&self, raw: Value, _field: &Field) -> Value {
        match raw {
            Value::Null => self.default_value(),
            Value::String(_) => raw,
            other => Value::String(other.to_display()),
        }
    }

    fn default_value(&self) -> Value {
        Value::String(String::new())
    }
}

/// Rich text stored as sanitized markup.
#[derive(Debug, Default)]
pub struct HtmlHelper;

#[async_trait]
impl Helper for HtmlHelper {
    fn kind(&self) -> HelperKind {
        HelperKind::Value
    }

    fn render(
        &self,
        params: &[Value],
        _hash: &ValueMap,
        _blocks: &mut dyn BlockRenderer,
    ) -> RenderResult<Value> {
        Ok(Value::Markup(
            params.first().map(Value::to_display).unwrap_or_default(),
        ))
    }

    async fn data(&self, raw: Value, _field: &Field) -> Value {
        match raw {
            Value::Null => self.default_value(),
            Value::Markup(_) => raw,
            other => Value::Markup(other.to_display()),
        }
    }

    fn default_value(&self) -> Value {
        Value::Markup(String::new())
    }
}

/// Numbers, optionally rounded with `decimals=N`.
#[derive(Debug, Default)]
pub struct NumberHelper;

#[async_trait]
impl Helper for NumberHelper {
    fn kind(&self) -> HelperKind {
        HelperKind::Value
    }

    fn render(
        &self,
        params: &[Value],
        hash: &ValueMap,
        _blocks: &mut dyn BlockRenderer,
    ) -> RenderResult<Value> {
        let Some(number) = params.first().and_then(Value::as_f64) else {
            return Ok(Value::Null);
        };
        match hash.get("decimals").and_then(Value::as_f64) {
            Some(decimals) if decimals >= 0.0 => Ok(Value::String(format!(
                "{:.*}",
                decimals as usize,
                number
            ))),
            _ => Ok(Value::Number(number)),
        }
    }

    async fn data(&self, raw: Value, _field: &Field) -> Value {
        raw.as_f64().map_or_else(|| self.default_value(), Value::Number)
    }

    fn options_schema(&self) -> serde_json::Value {
        serde_json::json!({ "decimals": { "type": "number" } })
    }
}

/// Links stored as a URL or as `{ url, text }`.
#[derive(Debug, Default)]
pub struct LinkHelper;

#[async_trait]
impl Helper for LinkHelper {
    fn kind(&self) -> HelperKind {
        HelperKind::Value
    }

    fn render(
        &self,
        params: &[Value],
        _hash: &ValueMap,
        blocks: &mut dyn BlockRenderer,
    ) -> RenderResult<Value> {
        let link = params.first().cloned().unwrap_or_default();
        if blocks.has_block() {
            return blocks.block(vec![link], ValueMap::new());
        }
        Ok(match &link {
            Value::Map(map) => map.get("url").cloned().unwrap_or_default(),
            other => other.clone(),
        })
    }

    async fn data(&self, raw: Value, _field: &Field) -> Value {
        match raw {
            Value::String(url) => Value::map([
                ("url", Value::String(url.clone())),
                ("text", Value::String(url)),
            ]),
            Value::Map(_) => raw,
            _ => self.default_value(),
        }
    }
}
