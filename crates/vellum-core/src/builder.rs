/*
 * builder.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Schema inference for a single template file.
//!
//! [`SchemaBuilder`] parses a template and walks its AST once. Every
//! reference it meets (`this.title`, `general.footer`, `@collection.posts`,
//! `post.body` inside a block) is described, resolved against the alias scope
//! in effect at that point, and merged into the template it lands in.
//! Components are expanded the first time they are seen and their own fields
//! land in their component template.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, trace};
use vellum_syntax::{
    AttrValue, BlockStatement, ConcatPart, ElementNode, Expression, Hash, MustacheStatement,
    Program, Statement, parse,
};

use crate::alias::{Alias, AliasScope};
use crate::error::{CompileError, CompileResult};
use crate::expression::ExpressionDescriptor;
use crate::helper::{HelperKind, HelperRegistry};
use crate::resolver::{ComponentResolver, component_key, is_component_tag};
use crate::schema::{COLLECTION_FIELD_TYPE, Template, TemplateKind, merge_field, template_id};
use crate::stylesheet::linked_stylesheet;

/// Where a component's caller content is rendered.
pub const YIELD: &str = "yield";

/// The alias whose fields land in a template's metadata.
const META: &str = "meta";

/// A component reached while walking, with the AST the renderer expands.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub source: String,
    pub ast: Program,
}

/// Everything one template file contributes to a theme.
#[derive(Debug, Clone)]
pub struct ParsedTemplate {
    pub name: String,
    pub kind: TemplateKind,
    pub ast: Program,
    /// Templates touched while walking, keyed by id.
    pub templates: BTreeMap<String, Template>,
    /// Components expanded while walking, keyed by component key.
    pub components: BTreeMap<String, Component>,
    /// Stylesheet paths linked from this file or its components.
    pub stylesheets: BTreeSet<String>,
}

/// The template whose source is being walked.
#[derive(Debug, Clone)]
struct Owner {
    name: String,
    kind: TemplateKind,
}

impl Owner {
    fn new(name: &str, kind: TemplateKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

/// Infers the schema of one template file.
pub struct SchemaBuilder<'a> {
    resolver: &'a dyn ComponentResolver,
    helpers: &'a HelperRegistry,
    templates: BTreeMap<String, Template>,
    components: BTreeMap<String, Component>,
    stylesheets: BTreeSet<String>,
    /// Components whose expansion has started; guards against recursion.
    visiting: HashSet<String>,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(resolver: &'a dyn ComponentResolver, helpers: &'a HelperRegistry) -> Self {
        Self {
            resolver,
            helpers,
            templates: BTreeMap::new(),
            components: BTreeMap::new(),
            stylesheets: BTreeSet::new(),
            visiting: HashSet::new(),
        }
    }

    /// Parse `source` and infer the schema of template `name`.
    pub fn build(self, name: &str, kind: TemplateKind, source: &str) -> CompileResult<ParsedTemplate> {
        let ast = parse(source)?;
        self.build_ast(name, kind, ast)
    }

    /// Infer the schema of an already parsed template.
    pub fn build_ast(
        mut self,
        name: &str,
        kind: TemplateKind,
        ast: Program,
    ) -> CompileResult<ParsedTemplate> {
        let owner = Owner::new(name, kind);
        self.ensure_template(name, kind);
        match kind {
            TemplateKind::Collection => {
                self.ensure_template(name, TemplateKind::Page);
            }
            TemplateKind::Component => {
                self.visiting.insert(component_key(name));
            }
            TemplateKind::Page | TemplateKind::Settings => {}
        }

        let scope = AliasScope::for_template(name, kind);
        self.walk_program(&ast, &owner, &scope)?;

        debug!(
            template = name,
            kind = %kind,
            templates = self.templates.len(),
            components = self.components.len(),
            "Inferred template schema"
        );

        Ok(ParsedTemplate {
            name: name.to_string(),
            kind,
            ast,
            templates: self.templates,
            components: self.components,
            stylesheets: self.stylesheets,
        })
    }

    fn ensure_template(&mut self, name: &str, kind: TemplateKind) -> &mut Template {
        self.templates
            .entry(template_id(name, kind))
            .or_insert_with(|| Template::new(name, kind))
    }

    fn walk_program(&mut self, program: &Program, owner: &Owner, scope: &AliasScope) -> CompileResult<()> {
        for statement in &program.body {
            self.walk_statement(statement, owner, scope)?;
        }
        Ok(())
    }

    fn walk_statement(
        &mut self,
        statement: &Statement,
        owner: &Owner,
        scope: &AliasScope,
    ) -> CompileResult<()> {
        match statement {
            Statement::Element(element) => self.walk_element(element, owner, scope),
            Statement::Mustache(mustache) => self.walk_mustache(mustache, owner, scope),
            Statement::Block(block) => self.walk_block(block, owner, scope),
            Statement::Text(_) | Statement::Comment(_) | Statement::MustacheComment(_) => Ok(()),
        }
    }

    fn walk_element(
        &mut self,
        element: &ElementNode,
        owner: &Owner,
        scope: &AliasScope,
    ) -> CompileResult<()> {
        if is_component_tag(&element.tag) {
            self.walk_component(element)?;
        } else if let Some(href) = linked_stylesheet(element) {
            trace!(href, "Linked stylesheet");
            self.stylesheets.insert(href.to_string());
        }

        for attribute in &element.attributes {
            match &attribute.value {
                AttrValue::Text(_) => {}
                AttrValue::Mustache(mustache) => self.walk_mustache(mustache, owner, scope)?,
                AttrValue::Concat(parts) => {
                    for part in parts {
                        if let ConcatPart::Mustache(mustache) = part {
                            self.walk_mustache(mustache, owner, scope)?;
                        }
                    }
                }
            }
        }

        for child in &element.children {
            self.walk_statement(child, owner, scope)?;
        }
        Ok(())
    }

    /// Expand a component the first time it is seen. Its fields are scoped to
    /// its own component template, not the caller's.
    fn walk_component(&mut self, element: &ElementNode) -> CompileResult<()> {
        let key = component_key(&element.tag);
        if self.components.contains_key(&key) || !self.visiting.insert(key.clone()) {
            return Ok(());
        }

        let source = self
            .resolver
            .resolve(&element.tag)
            .ok_or_else(|| CompileError::UnresolvedComponent {
                tag: element.tag.clone(),
            })?;
        let ast = parse(&source)?;

        let owner = Owner::new(&key, TemplateKind::Component);
        self.ensure_template(&key, TemplateKind::Component);
        let scope = AliasScope::for_template(&key, TemplateKind::Component);
        self.walk_program(&ast, &owner, &scope)?;

        trace!(component = %key, "Expanded component");
        self.components.insert(
            key.clone(),
            Component {
                name: key,
                source,
                ast,
            },
        );
        Ok(())
    }

    fn walk_mustache(
        &mut self,
        mustache: &MustacheStatement,
        owner: &Owner,
        scope: &AliasScope,
    ) -> CompileResult<()> {
        match &mustache.path {
            Expression::Path(path) => {
                if path.is_simple() {
                    let name = path.original.as_str();
                    if name == YIELD && mustache.params.is_empty() {
                        return Ok(());
                    }
                    let kind = self.helpers.kind(name);
                    if kind.is_some() || !mustache.params.is_empty() {
                        let first = ExpressionDescriptor::from_call(
                            &mustache.params,
                            &mustache.hash,
                            &owner.name,
                        )?;
                        self.walk_call(kind, name, first, &mustache.params, &mustache.hash, owner, scope)?;
                        return Ok(());
                    }
                }
                if let Some(expr) = ExpressionDescriptor::from_mustache(mustache, &owner.name)? {
                    self.add_to_tree(&expr, owner, scope)?;
                }
                for param in &mustache.params {
                    self.walk_expression(param, owner, scope)?;
                }
                self.walk_hash(&mustache.hash, owner, scope)
            }
            Expression::SubExpression(_) => self.walk_expression(&mustache.path, owner, scope),
            Expression::Literal(_) => Ok(()),
        }
    }

    fn walk_block(
        &mut self,
        block: &BlockStatement,
        owner: &Owner,
        scope: &AliasScope,
    ) -> CompileResult<()> {
        let name = block.path.original.as_str();
        let kind = self.helpers.kind(name);
        let first = ExpressionDescriptor::from_block(block, &owner.name)?;
        let branch = self.walk_call(kind, name, first, &block.params, &block.hash, owner, scope)?;

        let mut inner = scope.clone();
        for (index, param) in block.program.block_params.iter().enumerate() {
            let alias = match &branch {
                Some(section) if index == 0 => {
                    Alias::new(section.clone(), TemplateKind::Collection, false)
                }
                _ => Alias::new(param.clone(), TemplateKind::Settings, true),
            };
            inner = inner.bind(param.clone(), alias);
        }

        self.walk_program(&block.program, owner, &inner)?;
        if let Some(inverse) = &block.inverse {
            self.walk_program(inverse, owner, &inner)?;
        }
        Ok(())
    }

    /// Walk a helper invocation. The first parameter, described by `first`,
    /// is typed by the helper when it is a value or collection helper; a
    /// reference to a collection configures that collection. Returns the
    /// collection the first parameter refers to, if any.
    fn walk_call(
        &mut self,
        kind: Option<HelperKind>,
        name: &str,
        first: Option<ExpressionDescriptor>,
        params: &[Expression],
        hash: &Hash,
        owner: &Owner,
        scope: &AliasScope,
    ) -> CompileResult<Option<String>> {
        let mut rest = params;
        let mut branch = None;

        if let Some(expr) = first {
            if self.is_branch_reference(&expr, scope) {
                branch = Some(self.ensure_branch(&expr, owner, scope, true)?);
                rest = &params[1..];
            } else {
                match kind {
                    Some(HelperKind::Value) => {
                        self.add_to_tree(&expr.with_type(name), owner, scope)?;
                        rest = &params[1..];
                    }
                    Some(HelperKind::Collection) => {
                        branch = self.add_to_tree(&expr.with_type(COLLECTION_FIELD_TYPE), owner, scope)?;
                        rest = &params[1..];
                    }
                    Some(HelperKind::Helper) | None => {}
                }
            }
        }

        for param in rest {
            self.walk_expression(param, owner, scope)?;
        }
        self.walk_hash(hash, owner, scope)?;
        Ok(branch)
    }

    fn walk_expression(
        &mut self,
        expression: &Expression,
        owner: &Owner,
        scope: &AliasScope,
    ) -> CompileResult<()> {
        match expression {
            Expression::Path(path) => {
                if path.is_simple() && self.helpers.contains(&path.original) {
                    return Ok(());
                }
                let expr = ExpressionDescriptor::from_path(path, &Hash::default(), &owner.name)?;
                self.add_to_tree(&expr, owner, scope).map(drop)
            }
            Expression::SubExpression(sub) => {
                let name = sub.path.original.as_str();
                let kind = if sub.path.is_simple() {
                    self.helpers.kind(name)
                } else {
                    None
                };
                let first = ExpressionDescriptor::from_call(&sub.params, &sub.hash, &owner.name)?;
                self.walk_call(kind, name, first, &sub.params, &sub.hash, owner, scope)
                    .map(drop)
            }
            Expression::Literal(_) => Ok(()),
        }
    }

    fn walk_hash(&mut self, hash: &Hash, owner: &Owner, scope: &AliasScope) -> CompileResult<()> {
        for pair in &hash.pairs {
            self.walk_expression(&pair.value, owner, scope)?;
        }
        Ok(())
    }

    /// `@collection...` or a bare alias bound to a collection.
    fn is_branch_reference(&self, expr: &ExpressionDescriptor, scope: &AliasScope) -> bool {
        expr.is_collection() || collection_alias(expr, scope).is_some()
    }

    /// Record the field `expr` declares in the template its context resolves
    /// to. Returns the linked collection name for collection-typed fields.
    fn add_to_tree(
        &mut self,
        expr: &ExpressionDescriptor,
        owner: &Owner,
        scope: &AliasScope,
    ) -> CompileResult<Option<String>> {
        if expr.is_collection() {
            return self.ensure_branch(expr, owner, scope, true).map(Some);
        }
        if expr.private {
            return Ok(None);
        }

        if expr.context.is_empty() {
            // A bare segment is only meaningful as a whole-section alias.
            return match scope.get(&expr.key) {
                Some(alias) => {
                    if !alias.private {
                        let (section, kind) = (alias.section.clone(), alias.kind);
                        self.ensure_template(&section, kind);
                    }
                    Ok(None)
                }
                None => Err(CompileError::MissingContext {
                    expression: expr.original.clone(),
                }),
            };
        }

        let Some(alias) = scope.get(&expr.context).cloned() else {
            return Err(CompileError::UnknownContext {
                context: expr.context.clone(),
                expression: expr.original.clone(),
            });
        };
        if alias.private {
            return Ok(None);
        }
        if expr.key.is_empty() {
            self.ensure_template(&alias.section, alias.kind);
            return Ok(None);
        }

        let is_meta = expr.context == META;
        let merged = {
            let template = self.ensure_template(&alias.section, alias.kind);
            let fields = if is_meta {
                &mut template.metadata
            } else {
                &mut template.fields
            };
            merge_field(fields, expr.to_field()).clone()
        };
        trace!(
            template = %template_id(&alias.section, alias.kind),
            field = %merged.key,
            field_type = %merged.field_type,
            "Recorded field"
        );

        if merged.field_type != COLLECTION_FIELD_TYPE {
            return Ok(None);
        }

        let collection = self.ensure_branch(expr, owner, scope, false)?;
        let template = self.ensure_template(&alias.section, alias.kind);
        let fields = if is_meta {
            &mut template.metadata
        } else {
            &mut template.fields
        };
        if let Some(field) = fields.get_mut(&merged.key) {
            field
                .collection
                .get_or_insert_with(|| template_id(&collection, TemplateKind::Collection));
        }
        Ok(Some(collection))
    }

    /// Ensure the collection `expr` refers to, and its companion page, exist.
    /// When `configure` is set the expression's hash also configures the
    /// collection: `sortable` and any non-reserved keys.
    fn ensure_branch(
        &mut self,
        expr: &ExpressionDescriptor,
        owner: &Owner,
        scope: &AliasScope,
        configure: bool,
    ) -> CompileResult<String> {
        let name = if let Some(name) = expr.collection_name() {
            name.to_string()
        } else if let Some(alias) = collection_alias(expr, scope) {
            alias.section.clone()
        } else if let Some(name) = expr.linked_collection().filter(|_| !expr.is_collection()) {
            name.to_string()
        } else {
            match owner.kind {
                TemplateKind::Page | TemplateKind::Collection => owner.name.clone(),
                TemplateKind::Settings | TemplateKind::Component => {
                    return Err(CompileError::UnnamedCollection {
                        expression: expr.original.clone(),
                        kind: owner.kind.to_string(),
                    });
                }
            }
        };

        let template = self.ensure_template(&name, TemplateKind::Collection);
        if configure {
            if expr.sortable() {
                template.sortable = true;
            }
            template.options.extend(expr.options());
        }
        self.ensure_template(&name, TemplateKind::Page);
        trace!(collection = %name, "Ensured collection branch");
        Ok(name)
    }
}

/// The alias `expr` names on its own, when that alias is a collection.
fn collection_alias<'s>(expr: &ExpressionDescriptor, scope: &'s AliasScope) -> Option<&'s Alias> {
    if expr.data || expr.parts.len() != 1 {
        return None;
    }
    scope
        .get(&expr.parts[0])
        .filter(|alias| alias.kind == TemplateKind::Collection)
}
