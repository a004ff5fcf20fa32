/*
 * render.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Render interpreter.
//!
//! Walks a template AST against a `context` (alias bindings such as `this`,
//! `meta` and settings slots) and `data` (page-level values reached with
//! `@name`), emitting nodes into a [`Document`]. Blocks hand their bodies to
//! helpers through [`BlockRenderer`]; each body renders into a detached
//! fragment that the helper's return value splices back in.
//!
//! A missing value renders as nothing. A block naming an unregistered helper
//! fails the whole render.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, trace, warn};
use vellum_dom::{Document, Namespace, NodeData, NodeId};
use vellum_syntax::{
    AttrValue, BlockStatement, ConcatPart, ElementNode, Expression, Hash, Literal,
    MustacheStatement, PathExpression, Program, Statement, parse,
};

use crate::builder::YIELD;
use crate::error::{RenderError, RenderResult};
use crate::expression::COLLECTION_DATA;
use crate::helper::{BlockRenderer, Helper, HelperRegistry, NoBlocks};
use crate::markup;
use crate::options::{RenderMode, RenderOptions};
use crate::resolver::{ComponentResolver, component_key, is_component_tag};
use crate::stylesheet::{Stylesheet, linked_stylesheet};
use crate::value::{Value, ValueMap};

/// Attribute carrying the debug identifier of an interpolation.
pub const FIELD_MARKER_ATTRIBUTE: &str = "data-vellum-field";

/// Elements whose text content accumulates into a single node.
const RAW_TEXT_PARENTS: &[&str] = &["script", "style"];

/// A persistent name-to-value table layered over a base map.
#[derive(Clone, Default)]
struct Bindings {
    head: Option<Arc<Binding>>,
    base: Arc<ValueMap>,
}

struct Binding {
    name: String,
    value: Value,
    parent: Option<Arc<Binding>>,
}

impl Bindings {
    fn new(base: ValueMap) -> Self {
        Self {
            head: None,
            base: Arc::new(base),
        }
    }

    fn get(&self, name: &str) -> Option<&Value> {
        let mut binding = self.head.as_deref();
        while let Some(current) = binding {
            if current.name == name {
                return Some(&current.value);
            }
            binding = current.parent.as_deref();
        }
        self.base.get(name)
    }

    fn bind(&self, name: impl Into<String>, value: Value) -> Self {
        Self {
            head: Some(Arc::new(Binding {
                name: name.into(),
                value,
                parent: self.head.clone(),
            })),
            base: Arc::clone(&self.base),
        }
    }
}

/// What paths resolve against at one point of the walk.
#[derive(Clone, Default)]
struct Scope {
    context: Bindings,
    data: Bindings,
}

impl Scope {
    fn template_name(&self) -> Option<&str> {
        self.data
            .get("template")
            .and_then(|template| template.get("name"))
            .and_then(Value::as_str)
    }

    /// Records of the current template's own collection.
    fn own_collection(&self) -> Option<Value> {
        let name = self.template_name()?;
        self.data.get(COLLECTION_DATA)?.get(name).cloned()
    }
}

/// Where rendered nodes go.
#[derive(Debug, Clone, Copy)]
struct Frame {
    parent: NodeId,
    namespace: Namespace,
    /// Caller content a component body yields.
    yielded: Option<NodeId>,
}

impl Frame {
    fn with_parent(self, parent: NodeId) -> Self {
        Self { parent, ..self }
    }
}

/// Renders templates into a document.
pub struct Renderer<'a> {
    document: &'a mut Document,
    resolver: &'a dyn ComponentResolver,
    helpers: &'a HelperRegistry,
    options: RenderOptions,
    stylesheets: Option<&'a BTreeMap<String, Stylesheet>>,
    next_field: usize,
    /// Head markup contributed by helpers, once per helper name.
    injections: IndexMap<String, String>,
    components: HashMap<String, Arc<Program>>,
}

impl<'a> Renderer<'a> {
    pub fn new(
        document: &'a mut Document,
        resolver: &'a dyn ComponentResolver,
        helpers: &'a HelperRegistry,
    ) -> Self {
        Self {
            document,
            resolver,
            helpers,
            options: RenderOptions::default(),
            stylesheets: None,
            next_field: 0,
            injections: IndexMap::new(),
            components: HashMap::new(),
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    /// Compiled stylesheets that `<link>` elements are rewritten to.
    pub fn with_stylesheets(mut self, stylesheets: &'a BTreeMap<String, Stylesheet>) -> Self {
        self.stylesheets = Some(stylesheets);
        self
    }

    /// Render `program` and make its first element the document's only root.
    pub fn render(mut self, program: &Program, context: ValueMap, data: ValueMap) -> RenderResult<()> {
        let scope = Scope {
            context: Bindings::new(context),
            data: Bindings::new(data),
        };
        let fragment = self.document.create_fragment();
        let frame = Frame {
            parent: fragment,
            namespace: Namespace::Html,
            yielded: None,
        };
        self.render_program(program, &scope, frame)?;
        self.promote_root(fragment);
        self.inject_head();

        debug!(
            fields = self.next_field,
            injections = self.injections.len(),
            components = self.components.len(),
            "Rendered document"
        );
        Ok(())
    }

    fn promote_root(&mut self, fragment: NodeId) {
        let root = self.document.root();
        self.document.clear_children(root);
        match self.document.first_element_child(fragment) {
            Some(element) => self.document.append_child(root, element),
            None => self.document.append_child(root, fragment),
        }
    }

    fn inject_head(&mut self) {
        if self.injections.is_empty() {
            return;
        }
        let root = self.document.root();
        let Some(head) = self.document.find_element(root, "head") else {
            debug!(
                injections = self.injections.len(),
                "No head element, skipping helper injections"
            );
            return;
        };
        let frame = Frame {
            parent: head,
            namespace: Namespace::Html,
            yielded: None,
        };
        let injections = std::mem::take(&mut self.injections);
        for (name, markup) in &injections {
            trace!(helper = %name, "Injecting helper markup");
            self.insert_markup(markup, frame);
        }
        self.injections = injections;
    }

    fn render_program(&mut self, program: &Program, scope: &Scope, frame: Frame) -> RenderResult<()> {
        self.render_statements(&program.body, scope, frame)
    }

    fn render_statements(
        &mut self,
        statements: &[Statement],
        scope: &Scope,
        frame: Frame,
    ) -> RenderResult<()> {
        for statement in statements {
            match statement {
                Statement::Element(element) => self.render_element(element, scope, frame)?,
                Statement::Text(text) => self.append_text(frame.parent, &text.text),
                Statement::Comment(comment) => {
                    let node = self.document.create_comment(comment.text.as_str());
                    self.document.append_child(frame.parent, node);
                }
                Statement::Mustache(mustache) => self.render_mustache(mustache, scope, frame)?,
                Statement::Block(block) => self.render_block(block, scope, frame)?,
                Statement::MustacheComment(_) => {}
            }
        }
        Ok(())
    }

    fn render_element(
        &mut self,
        element: &ElementNode,
        scope: &Scope,
        frame: Frame,
    ) -> RenderResult<()> {
        if is_component_tag(&element.tag) {
            return self.render_component(element, scope, frame);
        }

        let sheets = self.stylesheets;
        let stylesheet = linked_stylesheet(element).and_then(|href| sheets?.get(href));
        if let Some(sheet) = stylesheet
            && self.options.mode == RenderMode::Development
        {
            let style = self.document.create_element("style", Namespace::Html);
            let css = self.document.create_text(sheet.contents.as_str());
            self.document.append_child(style, css);
            self.document.append_child(frame.parent, style);
            return Ok(());
        }

        let namespace = if element.tag.eq_ignore_ascii_case("svg") {
            Namespace::Svg
        } else {
            frame.namespace
        };
        let node = self.document.create_element(&element.tag, namespace);
        for attribute in &element.attributes {
            let value = self.attribute_value(&attribute.value, scope)?;
            let text = match value {
                Value::Null | Value::Bool(false) => continue,
                Value::Bool(true) => String::new(),
                other => other.to_display(),
            };
            self.document.set_attribute(node, &attribute.name, text);
        }
        if let Some(sheet) = stylesheet {
            self.document.set_attribute(node, "href", sheet.output.as_str());
        }
        self.document.append_child(frame.parent, node);

        let inner = Frame {
            parent: node,
            namespace,
            yielded: frame.yielded,
        };
        self.render_statements(&element.children, scope, inner)
    }

    fn render_component(
        &mut self,
        element: &ElementNode,
        scope: &Scope,
        frame: Frame,
    ) -> RenderResult<()> {
        let key = component_key(&element.tag);
        let ast = self.component(&element.tag, &key)?;

        let yielded = self.document.create_fragment();
        self.render_statements(&element.children, scope, frame.with_parent(yielded))?;

        let mut inner = scope.clone();
        for attribute in &element.attributes {
            let Some(name) = attribute.name.strip_prefix('@') else {
                continue;
            };
            let value = self.attribute_value(&attribute.value, scope)?;
            inner.data = inner.data.bind(name, value);
        }
        if let Some(values) = scope.context.get(&key).cloned() {
            inner.context = inner.context.bind("this", values);
        }

        let body = self.document.create_fragment();
        let body_frame = Frame {
            parent: body,
            namespace: frame.namespace,
            yielded: Some(yielded),
        };
        self.render_program(&ast, &inner, body_frame)?;
        self.document.append_child(frame.parent, body);
        trace!(component = %key, "Rendered component");
        Ok(())
    }

    /// Parsed component source, cached for the rest of the render.
    fn component(&mut self, tag: &str, key: &str) -> RenderResult<Arc<Program>> {
        if let Some(ast) = self.components.get(key) {
            return Ok(Arc::clone(ast));
        }
        let source = self
            .resolver
            .resolve(tag)
            .ok_or_else(|| RenderError::UnresolvedComponent {
                tag: tag.to_string(),
            })?;
        let ast = Arc::new(parse(&source)?);
        self.components.insert(key.to_string(), Arc::clone(&ast));
        Ok(ast)
    }

    fn render_mustache(
        &mut self,
        mustache: &MustacheStatement,
        scope: &Scope,
        frame: Frame,
    ) -> RenderResult<()> {
        if let Expression::Path(path) = &mustache.path
            && path.is_simple()
            && path.original == YIELD
            && mustache.params.is_empty()
        {
            if let Some(yielded) = frame.yielded {
                self.document.append_child(frame.parent, yielded);
            }
            return Ok(());
        }

        let value = match self.evaluate_mustache(mustache, scope)? {
            Value::String(text) if mustache.trusting => Value::Markup(text),
            other => other,
        };

        if self.options.debug_markers && !self.is_raw_text_parent(frame.parent) {
            let marker = self.document.create_element("span", frame.namespace);
            self.document.set_attribute(
                marker,
                FIELD_MARKER_ATTRIBUTE,
                self.next_field.to_string(),
            );
            self.next_field += 1;
            self.document.append_child(frame.parent, marker);
            return self.splice(value, frame.with_parent(marker));
        }
        self.splice(value, frame)
    }

    fn render_block(
        &mut self,
        block: &BlockStatement,
        scope: &Scope,
        frame: Frame,
    ) -> RenderResult<()> {
        let name = block.path.original.as_str();
        let Some(helper) = self.helpers.resolve(name) else {
            return Err(RenderError::UnknownHelper {
                name: name.to_string(),
            });
        };
        let params = self.evaluate_all(&block.params, scope)?;
        let hash = self.evaluate_hash(&block.hash, scope)?;
        self.record_injection(name, helper.as_ref());

        let value = {
            let mut bodies = BlockBodies {
                renderer: self,
                block,
                scope,
                frame,
            };
            helper.render(&params, &hash, &mut bodies)?
        };
        self.splice(value, frame)
    }

    fn record_injection(&mut self, name: &str, helper: &dyn Helper) {
        if self.injections.contains_key(name) {
            return;
        }
        if let Some(markup) = helper.inject() {
            self.injections.insert(name.to_string(), markup);
        }
    }

    /// Insert a value at `frame`.
    fn splice(&mut self, value: Value, frame: Frame) -> RenderResult<()> {
        match value.resolve() {
            // `false` interpolates like a missing value, as Handlebars does.
            Value::Null | Value::Bool(false) => {}
            Value::Fragment(fragment) => self.document.append_child(frame.parent, fragment),
            Value::List(items) => {
                for item in items {
                    self.splice(item, frame)?;
                }
            }
            Value::Markup(markup) => self.insert_markup(&markup, frame),
            other => {
                let text = other.to_display();
                if !text.is_empty() {
                    self.append_text(frame.parent, &text);
                }
            }
        }
        Ok(())
    }

    /// Insert trusted markup as plain nodes. Malformed markup never fails
    /// the render.
    fn insert_markup(&mut self, markup: &str, frame: Frame) {
        if self.is_raw_text_parent(frame.parent) {
            self.append_text(frame.parent, markup);
        } else {
            markup::insert_markup(self.document, frame.parent, frame.namespace, markup);
        }
    }

    fn is_raw_text_parent(&self, parent: NodeId) -> bool {
        self.document
            .name(parent)
            .is_some_and(|name| RAW_TEXT_PARENTS.contains(&name))
    }

    /// Append text, merging into the trailing text node of script-like
    /// parents.
    fn append_text(&mut self, parent: NodeId, text: &str) {
        if self.is_raw_text_parent(parent)
            && let Some(&last) = self.document.children(parent).last()
            && matches!(self.document.data(last), NodeData::Text(_))
        {
            self.document.append_text(last, text);
            return;
        }
        let node = self.document.create_text(text);
        self.document.append_child(parent, node);
    }

    fn attribute_value(&mut self, value: &AttrValue, scope: &Scope) -> RenderResult<Value> {
        match value {
            AttrValue::Text(text) => Ok(Value::String(text.clone())),
            AttrValue::Mustache(mustache) => self.evaluate_mustache(mustache, scope),
            AttrValue::Concat(parts) => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        ConcatPart::Text(literal) => text.push_str(literal),
                        ConcatPart::Mustache(mustache) => {
                            text.push_str(&self.evaluate_mustache(mustache, scope)?.to_display());
                        }
                    }
                }
                Ok(Value::String(text))
            }
        }
    }

    fn evaluate_mustache(&mut self, mustache: &MustacheStatement, scope: &Scope) -> RenderResult<Value> {
        match &mustache.path {
            Expression::Path(path) => self.call_or_lookup(path, &mustache.params, &mustache.hash, scope),
            other => self.evaluate(other, scope),
        }
    }

    fn evaluate(&mut self, expression: &Expression, scope: &Scope) -> RenderResult<Value> {
        match expression {
            Expression::Literal(literal) => Ok(literal_value(literal)),
            Expression::Path(path) => self.call_or_lookup(path, &[], &Hash::default(), scope),
            Expression::SubExpression(sub) => {
                self.call_or_lookup(&sub.path, &sub.params, &sub.hash, scope)
            }
        }
    }

    fn evaluate_all(&mut self, expressions: &[Expression], scope: &Scope) -> RenderResult<Vec<Value>> {
        expressions
            .iter()
            .map(|expression| self.evaluate(expression, scope))
            .collect()
    }

    fn evaluate_hash(&mut self, hash: &Hash, scope: &Scope) -> RenderResult<ValueMap> {
        let mut values = ValueMap::new();
        for pair in &hash.pairs {
            let value = self.evaluate(&pair.value, scope)?;
            values.insert(pair.key.clone(), value);
        }
        Ok(values)
    }

    /// A single bare segment is tried as a helper call first.
    fn call_or_lookup(
        &mut self,
        path: &PathExpression,
        params: &[Expression],
        hash: &Hash,
        scope: &Scope,
    ) -> RenderResult<Value> {
        if path.is_simple() {
            if let Some(helper) = self.helpers.resolve(&path.original) {
                let params = self.evaluate_all(params, scope)?;
                let hash = self.evaluate_hash(hash, scope)?;
                self.record_injection(&path.original, helper.as_ref());
                return helper.render(&params, &hash, &mut NoBlocks);
            }
            if !params.is_empty() {
                warn!(helper = %path.original, "Unknown helper, rendering nothing");
                return Ok(Value::Null);
            }
        }
        Ok(lookup(path, scope))
    }
}

/// Walk `path` through the scope, invoking callables along the way.
fn lookup(path: &PathExpression, scope: &Scope) -> Value {
    let empty: &[String] = &[];
    let (root, rest) = if path.data {
        match path.parts.as_slice() {
            [head] if head == COLLECTION_DATA => (scope.own_collection(), empty),
            [head, rest @ ..] => (scope.data.get(head).cloned(), rest),
            [] => (None, empty),
        }
    } else {
        match path.parts.as_slice() {
            [] => (scope.context.get("this").cloned(), empty),
            [head, rest @ ..] => {
                let root = scope.context.get(head).cloned().or_else(|| {
                    if scope.template_name() == Some(head.as_str()) {
                        scope.context.get("this").cloned()
                    } else {
                        None
                    }
                });
                (root, rest)
            }
        }
    };

    let Some(mut value) = root.map(Value::resolve) else {
        return Value::Null;
    };
    for segment in rest {
        value = match value.get(segment) {
            Some(next) => next.clone().resolve(),
            None => return Value::Null,
        };
    }
    value
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::String(text) => Value::String(text.clone()),
        Literal::Number(number) => Value::Number(*number),
        Literal::Boolean(flag) => Value::Bool(*flag),
        Literal::Null | Literal::Undefined => Value::Null,
    }
}

/// A block statement's bodies, rendered on demand for its helper.
struct BlockBodies<'r, 'a, 'p> {
    renderer: &'r mut Renderer<'a>,
    block: &'p BlockStatement,
    scope: &'p Scope,
    frame: Frame,
}

impl BlockBodies<'_, '_, '_> {
    fn render_body(
        &mut self,
        program: &Program,
        params: Vec<Value>,
        data: ValueMap,
    ) -> RenderResult<Value> {
        let mut scope = self.scope.clone();
        for (name, value) in program.block_params.iter().zip(params) {
            scope.context = scope.context.bind(name.as_str(), value);
        }
        for (name, value) in data {
            scope.data = scope.data.bind(name, value);
        }

        let fragment = self.renderer.document.create_fragment();
        self.renderer
            .render_program(program, &scope, self.frame.with_parent(fragment))?;
        Ok(Value::Fragment(fragment))
    }
}

impl BlockRenderer for BlockBodies<'_, '_, '_> {
    fn block(&mut self, params: Vec<Value>, data: ValueMap) -> RenderResult<Value> {
        let program = &self.block.program;
        self.render_body(program, params, data)
    }

    fn inverse(&mut self, params: Vec<Value>, data: ValueMap) -> RenderResult<Value> {
        match &self.block.inverse {
            Some(inverse) => self.render_body(inverse, params, data),
            None => Ok(Value::Null),
        }
    }

    fn has_block(&self) -> bool {
        true
    }

    fn has_inverse(&self) -> bool {
        self.block.inverse.is_some()
    }
}

/// Render `program` into `document` with the default options.
pub fn render(
    document: &mut Document,
    program: &Program,
    context: ValueMap,
    data: ValueMap,
    resolver: &dyn ComponentResolver,
    helpers: &HelperRegistry,
) -> RenderResult<()> {
    Renderer::new(document, resolver, helpers).render(program, context, data)
}
