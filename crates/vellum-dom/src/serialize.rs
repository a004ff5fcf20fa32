/*
 * serialize.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! HTML serialization of document subtrees.

use crate::document::{Document, Namespace, NodeData, NodeId};

/// Elements that never have content or a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text children are written without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Serialize the subtree rooted at `id`.
///
/// Document and fragment nodes serialize as their children.
pub fn to_html(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, id, false, &mut out);
    out
}

fn write_node(doc: &Document, id: NodeId, raw_text: bool, out: &mut String) {
    match doc.data(id) {
        NodeData::Document | NodeData::Fragment => {
            for &child in doc.children(id) {
                write_node(doc, child, false, out);
            }
        }
        NodeData::Text(text) => {
            if raw_text {
                out.push_str(text);
            } else {
                escape_text(text, out);
            }
        }
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeData::Element(element) => {
            out.push('<');
            out.push_str(&element.name);
            for (name, value) in &element.attributes {
                out.push(' ');
                out.push_str(name);
                if !value.is_empty() {
                    out.push_str("=\"");
                    escape_attribute(value, out);
                    out.push('"');
                }
            }

            let children = doc.children(id);
            match element.namespace {
                Namespace::Html if VOID_ELEMENTS.contains(&element.name.as_str()) => {
                    out.push('>');
                    return;
                }
                Namespace::Svg if children.is_empty() => {
                    out.push_str("/>");
                    return;
                }
                _ => out.push('>'),
            }

            let raw = element.namespace == Namespace::Html
                && RAW_TEXT_ELEMENTS.contains(&element.name.as_str());
            for &child in children {
                write_node(doc, child, raw, out);
            }
            out.push_str("</");
            out.push_str(&element.name);
            out.push('>');
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}
