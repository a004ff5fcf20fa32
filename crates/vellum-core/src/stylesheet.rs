/*
 * stylesheet.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Stylesheets referenced by templates.
//!
//! A `<link>` whose `href` is a literal root-relative path to a `.css` file
//! registers that stylesheet. The compiler runs each one through a
//! [`StylesheetProcessor`] once and names the result after its content hash,
//! so published pages can cache it forever.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use vellum_syntax::ElementNode;

use crate::error::CompileResult;

/// Hex digits of the content hash kept in output file names.
const HASH_PREFIX_LEN: usize = 8;

/// A processed stylesheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stylesheet {
    /// Root-relative path as referenced, e.g. `/css/site.css`.
    pub source: String,
    /// Cache-busted path, e.g. `/css/site.1a2b3c4d.css`.
    pub output: String,
    /// SHA-256 of `contents`, hex encoded.
    pub hash: String,
    /// Processed CSS.
    pub contents: String,
}

impl Stylesheet {
    pub fn new(source: impl Into<String>, contents: String) -> Self {
        let source = source.into();
        let hash = compute_hash(contents.as_bytes());
        Self {
            output: hashed_path(&source, &hash),
            source,
            hash,
            contents,
        }
    }
}

/// Post-processing applied to stylesheet sources.
pub trait StylesheetProcessor: Send + Sync {
    fn process(&self, path: &str, css: &str) -> CompileResult<String>;
}

/// Processor that returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughProcessor;

impl StylesheetProcessor for PassthroughProcessor {
    fn process(&self, _path: &str, css: &str) -> CompileResult<String> {
        Ok(css.to_string())
    }
}

/// Compute SHA-256 hash of content and return as hex string.
pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// `<dir>/<stem>.<hash8>.css`
pub fn hashed_path(source: &str, hash: &str) -> String {
    let (dir, file) = match source.rfind('/') {
        Some(slash) => (&source[..=slash], &source[slash + 1..]),
        None => ("", source),
    };
    let stem = file.strip_suffix(".css").unwrap_or(file);
    let short = &hash[..hash.len().min(HASH_PREFIX_LEN)];
    format!("{dir}{stem}.{short}.css")
}

/// A literal root-relative `.css` path (not protocol-relative).
pub fn is_stylesheet_reference(href: &str) -> bool {
    href.starts_with('/') && !href.starts_with("//") && href.ends_with(".css")
}

/// The stylesheet path a `<link>` element registers, if any.
pub fn linked_stylesheet(element: &ElementNode) -> Option<&str> {
    if !element.tag.eq_ignore_ascii_case("link") {
        return None;
    }
    let is_stylesheet_rel = element.literal_attribute("rel").is_none_or(|rel| {
        rel.split_ascii_whitespace()
            .any(|token| token.eq_ignore_ascii_case("stylesheet"))
    });
    element
        .literal_attribute("href")
        .filter(|href| is_stylesheet_rel && is_stylesheet_reference(href))
}
