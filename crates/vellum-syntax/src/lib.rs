/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template source syntax for vellum.
//!
//! Templates are ordinary markup with a curly-brace expression language:
//!
//! - Value expressions: `{{this.title}}`, `{{{this.body}}}`
//! - Named arguments: `{{this.date type="date" priority=1}}`
//! - Blocks with parameters: `{{#each @collection as |post|}}...{{/each}}`
//! - Inverse sections and chains: `{{#if a}}...{{else if b}}...{{else}}...{{/if}}`
//! - Sub-expressions: `{{#if (eq this.layout "wide")}}`
//! - Comments: `{{! note }}` and `{{!-- note --}}`
//!
//! The parser produces a generic AST ([`Program`]) that downstream crates walk
//! twice: once to infer a content schema and once to render a document.
//!
//! # Example
//!
//! ```
//! use vellum_syntax::{parse, Statement};
//!
//! let program = parse("<h1>{{this.title}}</h1>").unwrap();
//! assert!(matches!(program.body[0], Statement::Element(_)));
//! ```

pub mod ast;
pub mod error;
pub mod parser;

pub use ast::{
    AttrNode, AttrValue, BlockStatement, CommentNode, ConcatPart, ElementNode, Expression, Hash,
    HashPair, Literal, MustacheStatement, PathExpression, Program, Span, Statement, SubExpression,
    TextNode,
};
pub use error::{SyntaxError, SyntaxResult};
pub use parser::{
    ParseOptions, RAW_TEXT_ELEMENTS, VOID_ELEMENTS, decode_entities, parse, parse_markup,
    parse_with_options,
};
