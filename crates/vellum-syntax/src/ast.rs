/*
 * ast.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template AST types.
//!
//! A template is ordinary markup interleaved with curly-brace expressions.
//! The parser produces a [`Program`], a list of [`Statement`]s where markup
//! elements and expression statements are siblings. Every node carries a
//! byte [`Span`] into the original source.

/// Byte range of a node in the template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A sequence of statements, optionally declaring block parameters.
///
/// The top level of a file is a `Program` with no block parameters. The body
/// and inverse of a [`BlockStatement`] are `Program`s too; for those,
/// `block_params` holds the names from `as |a b|`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub body: Vec<Statement>,
    pub block_params: Vec<String>,
    pub span: Span,
}

impl Program {
    pub fn new(body: Vec<Statement>) -> Self {
        Self {
            body,
            block_params: Vec::new(),
            span: Span::default(),
        }
    }
}

/// A node in the template AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// A markup element with attributes and children.
    Element(ElementNode),

    /// Literal text (entities already decoded).
    Text(TextNode),

    /// An HTML comment: `<!-- ... -->`
    Comment(CommentNode),

    /// An expression statement: `{{path params hash}}` or `{{{path}}}`
    Mustache(MustacheStatement),

    /// A block statement: `{{#name params}}...{{else}}...{{/name}}`
    Block(BlockStatement),

    /// A template comment, never rendered: `{{! ... }}`
    MustacheComment(CommentNode),
}

/// Markup element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    /// Tag name with its original case preserved.
    pub tag: String,
    pub attributes: Vec<AttrNode>,
    pub children: Vec<Statement>,
    /// Written as `<tag />`.
    pub self_closing: bool,
    pub span: Span,
}

impl ElementNode {
    /// Look up an attribute by (case-insensitive) name.
    pub fn attribute(&self, name: &str) -> Option<&AttrNode> {
        self.attributes
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
    }

    /// The literal text of an attribute, if it has no interpolation.
    pub fn literal_attribute(&self, name: &str) -> Option<&str> {
        match self.attribute(name).map(|attr| &attr.value) {
            Some(AttrValue::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }
}

/// An attribute on an element.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrNode {
    pub name: String,
    pub value: AttrValue,
    pub span: Span,
}

/// Attribute value forms.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// `name="literal"` or a bare `name` (empty text).
    Text(String),
    /// `name={{expr}}`
    Mustache(MustacheStatement),
    /// `name="text {{expr}} more"`
    Concat(Vec<ConcatPart>),
}

/// One part of an interpolated attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConcatPart {
    Text(String),
    Mustache(MustacheStatement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentNode {
    pub text: String,
    pub span: Span,
}

/// `{{path params hash}}`
#[derive(Debug, Clone, PartialEq)]
pub struct MustacheStatement {
    pub path: Expression,
    pub params: Vec<Expression>,
    pub hash: Hash,
    /// Written with triple braces; the value is inserted as markup.
    pub trusting: bool,
    pub span: Span,
}

/// `{{#path params hash as |a b|}}program{{else}}inverse{{/path}}`
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStatement {
    pub path: PathExpression,
    pub params: Vec<Expression>,
    pub hash: Hash,
    pub program: Program,
    pub inverse: Option<Program>,
    pub span: Span,
}

/// An expression in parameter, hash or callee position.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Path(PathExpression),
    SubExpression(SubExpression),
    Literal(Literal),
}

impl Expression {
    pub fn as_path(&self) -> Option<&PathExpression> {
        match self {
            Expression::Path(path) => Some(path),
            _ => None,
        }
    }
}

/// `(path params hash)`
#[derive(Debug, Clone, PartialEq)]
pub struct SubExpression {
    pub path: PathExpression,
    pub params: Vec<Expression>,
    pub hash: Hash,
    pub span: Span,
}

/// A dotted reference such as `this.title`, `post.body` or `@index`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpression {
    /// The path as written, including any `@` prefix.
    pub original: String,
    /// Dotted segments, without the `@` marker.
    pub parts: Vec<String>,
    /// Written with a leading `@` (a data reference).
    pub data: bool,
    /// The first segment is `this`.
    pub this: bool,
    pub span: Span,
}

impl PathExpression {
    /// Parse a dotted path as written in a template.
    pub fn from_original(original: &str, span: Span) -> Self {
        let data = original.starts_with('@');
        let body = original.trim_start_matches('@');
        let parts: Vec<String> = body
            .split(['.', '/'])
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect();
        let this = !data && parts.first().is_some_and(|head| head == "this");
        Self {
            original: original.to_string(),
            parts,
            data,
            this,
            span,
        }
    }

    /// First segment, if any.
    pub fn head(&self) -> Option<&str> {
        self.parts.first().map(String::as_str)
    }

    /// A single bare segment with no `this.` or `@` scoping.
    pub fn is_simple(&self) -> bool {
        self.parts.len() == 1 && !self.data && !self.this
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
    Undefined,
}

/// Named arguments: `key=value` pairs in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Hash {
    pub pairs: Vec<HashPair>,
}

impl Hash {
    pub fn get(&self, key: &str) -> Option<&Expression> {
        self.pairs
            .iter()
            .find(|pair| pair.key == key)
            .map(|pair| &pair.value)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: String,
    pub value: Expression,
}
