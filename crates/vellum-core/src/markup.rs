/*
 * markup.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Markup values.
//!
//! Stored rich text is real-world HTML: unclosed, misnested and stray tags
//! are common. It is tokenized with `html5gum` and built straight into the
//! target document with a small open-element stack. A close tag pops back to
//! its matching open element; a close tag with no match is dropped. Elements
//! still open at the end stay where they are.

use html5gum::{State, Token, Tokenizer};
use tracing::trace;
use vellum_dom::{Document, Namespace, NodeData, NodeId, VOID_ELEMENTS, is_unsafe_attribute};

struct Open {
    node: NodeId,
    name: String,
    namespace: Namespace,
}

/// Append the nodes of `markup` to `parent`. Unsafe attributes are dropped.
pub fn insert_markup(document: &mut Document, parent: NodeId, namespace: Namespace, markup: &str) {
    let mut tokenizer = Tokenizer::new(markup);
    let mut stack: Vec<Open> = Vec::new();

    while let Some(Ok(token)) = tokenizer.next() {
        let (current, current_namespace) = stack
            .last()
            .map_or((parent, namespace), |open| (open.node, open.namespace));

        match token {
            Token::StartTag(tag) => {
                let name = String::from_utf8_lossy(&tag.name).to_ascii_lowercase();
                let namespace = if name == "svg" {
                    Namespace::Svg
                } else {
                    current_namespace
                };
                let node = document.create_element(&name, namespace);
                for (key, value) in &tag.attributes {
                    let key = String::from_utf8_lossy(key);
                    let value = String::from_utf8_lossy(value);
                    if !is_unsafe_attribute(&key, &value) {
                        document.set_attribute(node, &key, value.into_owned());
                    }
                }
                document.append_child(current, node);

                if tag.self_closing || VOID_ELEMENTS.contains(&name.as_str()) {
                    continue;
                }
                match name.as_str() {
                    "script" | "style" => tokenizer.set_state(State::ScriptData),
                    "textarea" | "title" => tokenizer.set_state(State::RcData),
                    _ => {}
                }
                stack.push(Open {
                    node,
                    name,
                    namespace,
                });
            }
            Token::EndTag(tag) => {
                let name = String::from_utf8_lossy(&tag.name).to_ascii_lowercase();
                match stack.iter().rposition(|open| open.name == name) {
                    Some(index) => stack.truncate(index),
                    None => trace!(tag = %name, "Dropping stray close tag in markup"),
                }
            }
            Token::String(text) => append_text(document, current, &String::from_utf8_lossy(&text)),
            Token::Comment(text) => {
                let node = document.create_comment(String::from_utf8_lossy(&text).into_owned());
                document.append_child(current, node);
            }
            Token::Doctype(_) | Token::Error(_) => {}
        }
    }
}

fn append_text(document: &mut Document, parent: NodeId, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(&last) = document.children(parent).last()
        && matches!(document.data(last), NodeData::Text(_))
    {
        document.append_text(last, text);
        return;
    }
    let node = document.create_text(text);
    document.append_child(parent, node);
}
