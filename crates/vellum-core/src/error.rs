/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for compilation and rendering.

use thiserror::Error;
use vellum_syntax::SyntaxError;

/// Errors that abort compiling a template file.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    /// An element names a component that no resolver provides.
    #[error("Unresolved component <{tag}>")]
    UnresolvedComponent { tag: String },

    /// A bare `@collection` (or nameless collection field) where no
    /// enclosing page or collection can lend its name.
    #[error("Collection reference `{expression}` needs a name in a {kind} template")]
    UnnamedCollection { expression: String, kind: String },

    /// `priority` that is negative, fractional or not a number.
    #[error("Invalid priority `{value}` on `{expression}`")]
    InvalidPriority { expression: String, value: String },

    /// An unscoped reference such as `{{title}}`.
    #[error("Reference `{expression}` has no section context (write `this.{expression}`)")]
    MissingContext { expression: String },

    /// A scoped reference whose scope is not a known alias.
    #[error("Unknown context `{context}` in `{expression}`")]
    UnknownContext { context: String, expression: String },

    #[error("Invalid options in {path}: {message}")]
    Options { path: String, message: String },

    #[error("Stylesheet {path}: {message}")]
    Stylesheet { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any of the above, attributed to the file that caused it.
    #[error("{path}: {source}")]
    File {
        path: String,
        source: Box<CompileError>,
    },
}

impl CompileError {
    /// The underlying error, looking through [`CompileError::File`].
    pub fn root_cause(&self) -> &CompileError {
        match self {
            CompileError::File { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;

/// Errors that fail a render.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A block statement names a helper that is not registered.
    #[error("Unknown block helper `{name}`")]
    UnknownHelper { name: String },

    #[error("Unresolved component <{tag}>")]
    UnresolvedComponent { tag: String },

    /// Raised by a helper's own `render`.
    #[error("Helper `{name}` failed: {message}")]
    Helper { name: String, message: String },

    #[error("Syntax error: {0}")]
    Syntax(#[from] SyntaxError),
}

impl RenderError {
    pub fn helper(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Helper {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;
