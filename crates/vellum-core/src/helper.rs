/*
 * helper.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Helpers: the pluggable units behind block statements, helper calls and
//! field types.
//!
//! A [`HelperRegistry`] is an explicit value passed to the compiler, the
//! renderer and the context builder. It stores constructors rather than
//! instances, and every [`HelperRegistry::resolve`] builds a fresh helper,
//! so no helper state leaks between records or renders.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RenderResult;
use crate::schema::Field;
use crate::value::{Value, ValueMap};

/// What a helper produces, as far as schema inference is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HelperKind {
    /// Control flow or formatting; contributes nothing to the schema.
    Helper,
    /// A field directive: its first parameter is a field of this helper's type.
    Value,
    /// Produces a collection of records.
    Collection,
}

/// Re-entrant access to a block statement's bodies.
///
/// Each call renders the body again against a forked scope in which the
/// block's declared parameters are bound to `params` and `data` entries
/// are available as `@name`.
pub trait BlockRenderer {
    fn block(&mut self, params: Vec<Value>, data: ValueMap) -> RenderResult<Value>;
    fn inverse(&mut self, params: Vec<Value>, data: ValueMap) -> RenderResult<Value>;
    fn has_block(&self) -> bool;
    fn has_inverse(&self) -> bool;
}

/// Block renderer for helper calls that have no bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBlocks;

impl BlockRenderer for NoBlocks {
    fn block(&mut self, _params: Vec<Value>, _data: ValueMap) -> RenderResult<Value> {
        Ok(Value::Null)
    }

    fn inverse(&mut self, _params: Vec<Value>, _data: ValueMap) -> RenderResult<Value> {
        Ok(Value::Null)
    }

    fn has_block(&self) -> bool {
        false
    }

    fn has_inverse(&self) -> bool {
        false
    }
}

#[async_trait]
pub trait Helper: Send + Sync {
    fn kind(&self) -> HelperKind {
        HelperKind::Helper
    }

    /// Produce the value spliced at the call site.
    fn render(
        &self,
        params: &[Value],
        hash: &ValueMap,
        blocks: &mut dyn BlockRenderer,
    ) -> RenderResult<Value>;

    /// Turn a stored field value into its render-time form.
    async fn data(&self, raw: Value, _field: &Field) -> Value {
        if raw.is_null() {
            self.default_value()
        } else {
            raw
        }
    }

    /// Value used when a record has nothing stored for the field.
    fn default_value(&self) -> Value {
        Value::Null
    }

    /// Markup appended once to the document head when this helper is used.
    fn inject(&self) -> Option<String> {
        None
    }

    /// Shape of the options this helper accepts, for editors.
    fn options_schema(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

type HelperFactory = Arc<dyn Fn() -> Box<dyn Helper> + Send + Sync>;

/// Named helper constructors.
#[derive(Clone, Default)]
pub struct HelperRegistry {
    factories: BTreeMap<String, HelperFactory>,
}

impl HelperRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in control-flow helpers and field types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::helpers::register_builtins(&mut registry);
        registry
    }

    /// Register a constructor under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Helper> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Register a helper type constructed with `Default`.
    pub fn register_default<H>(&mut self, name: impl Into<String>) -> &mut Self
    where
        H: Helper + Default + 'static,
    {
        self.register(name, || Box::new(H::default()))
    }

    /// A fresh instance of the helper `name`.
    pub fn resolve(&self, name: &str) -> Option<Box<dyn Helper>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn kind(&self, name: &str) -> Option<HelperKind> {
        self.resolve(name).map(|helper| helper.kind())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl fmt::Debug for HelperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperRegistry")
            .field("helpers", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
