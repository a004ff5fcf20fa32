/*
 * control.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Control-flow helpers: `if`, `unless`, `each`, `with`, `eq`.

use crate::error::RenderResult;
use crate::helper::{BlockRenderer, Helper};
use crate::value::{Value, ValueMap};

/// Render the block when `condition` holds, the inverse otherwise.
///
/// Without bodies (`{{if cond "a" "b"}}`) the second or third parameter is
/// returned instead.
fn branch(
    condition: bool,
    params: &[Value],
    blocks: &mut dyn BlockRenderer,
) -> RenderResult<Value> {
    if !blocks.has_block() && !blocks.has_inverse() {
        let index = if condition { 1 } else { 2 };
        return Ok(params.get(index).cloned().unwrap_or_default());
    }
    if condition {
        blocks.block(Vec::new(), ValueMap::new())
    } else {
        blocks.inverse(Vec::new(), ValueMap::new())
    }
}

#[derive(Debug, Default)]
pub struct IfHelper;

impl Helper for IfHelper {
    fn render(
        &self,
        params: &[Value],
        _hash: &ValueMap,
        blocks: &mut dyn BlockRenderer,
    ) -> RenderResult<Value> {
        let condition = params.first().is_some_and(Value::is_truthy);
        branch(condition, params, blocks)
    }
}

#[derive(Debug, Default)]
pub struct UnlessHelper;

impl Helper for UnlessHelper {
    fn render(
        &self,
        params: &[Value],
        _hash: &ValueMap,
        blocks: &mut dyn BlockRenderer,
    ) -> RenderResult<Value> {
        let condition = !params.first().is_some_and(Value::is_truthy);
        branch(condition, params, blocks)
    }
}

/// Render the block once per item, binding `(item, key)` as block
/// parameters and `@index`, `@key`, `@first`, `@last` as data.
pub(crate) fn each_item(
    items: Vec<(Value, Value)>,
    blocks: &mut dyn BlockRenderer,
) -> RenderResult<Value> {
    if items.is_empty() {
        return blocks.inverse(Vec::new(), ValueMap::new());
    }
    let len = items.len();
    let mut rendered = Vec::with_capacity(len);
    for (index, (item, key)) in items.into_iter().enumerate() {
        let mut data = ValueMap::new();
        data.insert("index".to_string(), Value::from(index));
        data.insert("key".to_string(), key.clone());
        data.insert("first".to_string(), Value::Bool(index == 0));
        data.insert("last".to_string(), Value::Bool(index + 1 == len));
        rendered.push(blocks.block(vec![item, key], data)?);
    }
    Ok(Value::List(rendered))
}

/// Items of a list (keyed by index) or a map (keyed by name).
pub(crate) fn iterable(value: Option<&Value>) -> Vec<(Value, Value)> {
    match value {
        Some(Value::List(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| (item.clone(), Value::from(index)))
            .collect(),
        Some(Value::Map(map)) => map
            .iter()
            .map(|(key, item)| (item.clone(), Value::from(key.as_str())))
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Default)]
pub struct EachHelper;

impl Helper for EachHelper {
    fn render(
        &self,
        params: &[Value],
        _hash: &ValueMap,
        blocks: &mut dyn BlockRenderer,
    ) -> RenderResult<Value> {
        each_item(iterable(params.first()), blocks)
    }
}

#[derive(Debug, Default)]
pub struct WithHelper;

impl Helper for WithHelper {
    fn render(
        &self,
        params: &[Value],
        _hash: &ValueMap,
        blocks: &mut dyn BlockRenderer,
    ) -> RenderResult<Value> {
        match params.first() {
            Some(value) if value.is_truthy() => blocks.block(vec![value.clone()], ValueMap::new()),
            _ => blocks.inverse(Vec::new(), ValueMap::new()),
        }
    }
}

#[derive(Debug, Default)]
pub struct EqHelper;

impl Helper for EqHelper {
    fn render(
        &self,
        params: &[Value],
        _hash: &ValueMap,
        blocks: &mut dyn BlockRenderer,
    ) -> RenderResult<Value> {
        let equal = match (params.first(), params.get(1)) {
            (Some(a), Some(b)) => a.loose_eq(b),
            (None, None) => true,
            _ => false,
        };
        if blocks.has_block() {
            return if equal {
                blocks.block(Vec::new(), ValueMap::new())
            } else {
                blocks.inverse(Vec::new(), ValueMap::new())
            };
        }
        Ok(Value::Bool(equal))
    }
}
