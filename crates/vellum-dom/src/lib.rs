/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Document trees for rendered pages, and the differ that patches a live
//! tree to match a fresh render.
//!
//! ```
//! use vellum_dom::{Document, Namespace, diff};
//!
//! let mut fresh = Document::new();
//! let p = fresh.create_element("p", Namespace::Html);
//! let text = fresh.create_text("hello");
//! fresh.append_child(p, text);
//! fresh.append_child(fresh.root(), p);
//!
//! let mut live = Document::new();
//! diff(&fresh, &mut live);
//! assert_eq!(live.to_string(), "<p>hello</p>");
//! ```

pub mod diff;
pub mod document;
pub mod serialize;

pub use diff::{DiffPolicy, DiffStats, Differ, diff, is_unsafe_attribute};
pub use document::{Document, Element, Namespace, NodeData, NodeId, NodeKind};
pub use serialize::{VOID_ELEMENTS, to_html};
