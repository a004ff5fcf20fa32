/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Schema inference, compilation and rendering for vellum templates.
//!
//! A vellum project is a directory of markup templates. Their expressions
//! double as the content schema:
//!
//! - [`compile`] walks every template with the [`SchemaBuilder`], merges
//!   what each file declares and returns a [`Theme`]: templates with typed,
//!   ordered fields, renderable pages, components and hashed stylesheets.
//! - [`ContextBuilder`] turns stored [`Record`]s into the values a page
//!   renders against, running each field through its helper.
//! - [`render`] interprets a page's AST against those values into a
//!   [`vellum_dom::Document`], which [`vellum_dom::diff`] can patch into a
//!   live preview.
//!
//! # Example
//!
//! ```
//! use vellum_core::{Compiler, SourceFile};
//!
//! let theme = Compiler::default()
//!     .compile_sources(vec![SourceFile::new(
//!         "index.html",
//!         "<h1>{{this.title}}</h1>{{#each @collection as |post|}}{{post.body}}{{/each}}",
//!     )])
//!     .unwrap();
//!
//! assert!(theme.template("index-page").unwrap().field("title").is_some());
//! assert!(theme.template("index-collection").unwrap().field("body").is_some());
//! ```

pub mod alias;
pub mod builder;
pub mod compiler;
pub mod context;
pub mod error;
pub mod expression;
pub mod helper;
pub mod helpers;
pub mod markup;
pub mod options;
pub mod render;
pub mod resolver;
pub mod schema;
pub mod stylesheet;
pub mod value;

pub use alias::{Alias, AliasScope};
pub use builder::{Component, ParsedTemplate, SchemaBuilder, YIELD};
pub use compiler::{Compiler, Page, SourceFile, Theme, classify, compile, discover};
pub use context::{ContextBuilder, NAVIGATION_GROUP, PageContext, Record, is_parent_active};
pub use error::{CompileError, CompileResult, RenderError, RenderResult};
pub use expression::ExpressionDescriptor;
pub use helper::{BlockRenderer, Helper, HelperKind, HelperRegistry, NoBlocks};
pub use options::{CompileOptions, OPTIONS_FILE, RenderMode, RenderOptions};
pub use render::{FIELD_MARKER_ATTRIBUTE, Renderer, render};
pub use resolver::{ComponentResolver, MemoryResolver, NullResolver, component_key, is_component_tag};
pub use schema::{Field, Options, Template, TemplateKind, template_id};
pub use stylesheet::{PassthroughProcessor, Stylesheet, StylesheetProcessor};
pub use value::{Value, ValueMap};
