/*
 * diff_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Integration tests for the document differ.
 */

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use vellum_dom::{DiffPolicy, DiffStats, Differ, Document, Namespace, NodeId, diff};

fn el(doc: &mut Document, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
    let node = doc.create_element(tag, Namespace::Html);
    for (name, value) in attrs {
        doc.set_attribute(node, name, *value);
    }
    doc.append_child(parent, node);
    node
}

fn text(doc: &mut Document, parent: NodeId, value: &str) -> NodeId {
    let node = doc.create_text(value);
    doc.append_child(parent, node);
    node
}

/// `<ul><li key=..>..</li>...</ul>` with the given keys in order.
fn keyed_list(keys: &[&str]) -> (Document, Vec<NodeId>) {
    let mut doc = Document::new();
    let root = doc.root();
    let ul = el(&mut doc, root, "ul", &[]);
    let items = keys
        .iter()
        .map(|key| {
            let li = el(&mut doc, ul, "li", &[("key", *key)]);
            text(&mut doc, li, &key.to_uppercase());
            li
        })
        .collect();
    (doc, items)
}

#[test]
fn test_identical_trees_need_no_mutations() {
    let (template, _) = keyed_list(&["a", "b", "c"]);
    let mut existing = template.clone();
    let stats = Differ::new().diff(&template, &mut existing);
    assert_eq!(stats, DiffStats::default());
    assert_eq!(existing.to_string(), template.to_string());
}

#[test]
fn test_transposed_siblings_are_moved() {
    let (mut existing, items) = keyed_list(&["a", "b"]);
    let (template, _) = keyed_list(&["b", "a"]);

    let stats = Differ::new().diff(&template, &mut existing);

    assert_eq!(stats.moved, 1);
    assert_eq!(stats.inserted, 0);
    assert_eq!(stats.removed, 0);
    let ul = existing.first_element_child(existing.root()).unwrap();
    assert_eq!(existing.children(ul), &[items[1], items[0]]);
    assert_eq!(
        existing.to_string(),
        "<ul><li key=\"b\">B</li><li key=\"a\">A</li></ul>"
    );
}

#[test]
fn test_form_value_survives_rerender() {
    let mut existing = Document::new();
    let root = existing.root();
    let input = el(&mut existing, root, "input", &[("name", "title"), ("value", "draft")]);

    let mut template = Document::new();
    let root = template.root();
    el(
        &mut template,
        root,
        "input",
        &[("name", "title"), ("value", "saved"), ("placeholder", "Title")],
    );

    diff(&template, &mut existing);

    assert_eq!(existing.attribute(input, "value"), Some("draft"));
    assert_eq!(existing.attribute(input, "placeholder"), Some("Title"));
}

#[test]
fn test_checked_state_is_not_removed() {
    let mut existing = Document::new();
    let root = existing.root();
    let checkbox = el(&mut existing, root, "input", &[("type", "checkbox"), ("checked", "")]);

    let mut template = Document::new();
    let root = template.root();
    el(&mut template, root, "input", &[("type", "checkbox")]);

    let stats = Differ::new().diff(&template, &mut existing);
    assert_eq!(stats.attributes_removed, 0);
    assert_eq!(existing.attribute(checkbox, "checked"), Some(""));
}

#[test]
fn test_unsafe_attributes_are_skipped() {
    let mut existing = Document::new();
    let root = existing.root();
    let link = el(&mut existing, root, "a", &[]);

    let mut template = Document::new();
    let root = template.root();
    el(
        &mut template,
        root,
        "a",
        &[
            ("href", " javascript:alert(1)"),
            ("onclick", "steal()"),
            ("class", "nav"),
        ],
    );

    let stats = Differ::new().diff(&template, &mut existing);
    assert_eq!(stats.attributes_set, 1);
    assert_eq!(existing.attribute(link, "class"), Some("nav"));
    assert_eq!(existing.attribute(link, "href"), None);
    assert_eq!(existing.attribute(link, "onclick"), None);
}

#[test]
fn test_inserted_copies_are_sanitized() {
    let mut template = Document::new();
    let root = template.root();
    let div = el(&mut template, root, "div", &[]);
    el(&mut template, div, "img", &[("src", "/a.png"), ("onerror", "x()")]);

    let mut existing = Document::new();
    diff(&template, &mut existing);
    assert_eq!(existing.to_string(), "<div><img src=\"/a.png\"></div>");
}

#[test]
fn test_rerun_scripts_are_recreated() {
    let mut template = Document::new();
    let root = template.root();
    let script = el(&mut template, root, "script", &[("data-rerun", "")]);
    text(&mut template, script, "init()");

    let mut existing = template.clone();
    let old = existing.first_element_child(existing.root()).unwrap();

    let stats = Differ::new().diff(&template, &mut existing);
    assert_eq!(stats.inserted, 1);
    assert_eq!(stats.removed, 1);
    let new = existing.first_element_child(existing.root()).unwrap();
    assert_ne!(new, old);
    assert_eq!(existing.to_string(), template.to_string());
}

#[test]
fn test_changed_text_keeps_element() {
    let mut existing = Document::new();
    let root = existing.root();
    let p = el(&mut existing, root, "p", &[]);
    text(&mut existing, p, "old");

    let mut template = Document::new();
    let root = template.root();
    let tp = el(&mut template, root, "p", &[]);
    text(&mut template, tp, "new");

    let stats = Differ::new().diff(&template, &mut existing);
    assert_eq!(existing.first_element_child(existing.root()), Some(p));
    assert_eq!(existing.to_string(), "<p>new</p>");
    assert_eq!(stats.inserted, 1);
    assert_eq!(stats.removed, 1);
}

#[test]
fn test_children_cleared_when_template_is_empty() {
    let mut existing = Document::new();
    let root = existing.root();
    let div = el(&mut existing, root, "div", &[]);
    let b = el(&mut existing, div, "b", &[]);
    text(&mut existing, b, "gone");

    let mut template = Document::new();
    let root = template.root();
    el(&mut template, root, "div", &[]);

    let stats = Differ::new().diff(&template, &mut existing);
    assert_eq!(stats.children_cleared, 1);
    assert_eq!(existing.to_string(), "<div></div>");
}

#[test]
fn test_children_built_when_existing_is_empty() {
    let mut template = Document::new();
    let root = template.root();
    let ul = el(&mut template, root, "ul", &[]);
    for label in ["1", "2"] {
        let li = el(&mut template, ul, "li", &[]);
        text(&mut template, li, label);
    }

    let mut existing = Document::new();
    let root = existing.root();
    el(&mut existing, root, "ul", &[]);

    let stats = Differ::new().diff(&template, &mut existing);
    assert_eq!(stats.inserted, 2);
    assert_eq!(existing.to_string(), "<ul><li>1</li><li>2</li></ul>");
}

#[test]
fn test_excess_siblings_are_removed() {
    let (mut existing, _) = keyed_list(&["a", "b", "c"]);
    let (template, _) = keyed_list(&["a"]);
    let stats = Differ::new().diff(&template, &mut existing);
    assert_eq!(stats.removed, 2);
    assert_eq!(existing.to_string(), template.to_string());
}

#[test]
fn test_runtime_attributes_are_left_alone() {
    let mut existing = Document::new();
    let root = existing.root();
    let div = el(&mut existing, root, "div", &[("data-runtime-open", "true")]);

    let mut template = Document::new();
    let root = template.root();
    el(&mut template, root, "div", &[]);

    let stats = Differ::new().diff(&template, &mut existing);
    assert!(stats.is_empty());
    assert_eq!(existing.attribute(div, "data-runtime-open"), Some("true"));
}

#[test]
fn test_custom_identity_attributes() {
    let policy = DiffPolicy {
        identity_attributes: vec!["data-slot".to_string()],
        ..DiffPolicy::default()
    };

    let mut existing = Document::new();
    let root = existing.root();
    el(&mut existing, root, "section", &[("data-slot", "main")]);
    let aside = el(&mut existing, root, "section", &[("data-slot", "aside")]);

    let mut template = Document::new();
    let root = template.root();
    el(&mut template, root, "section", &[("data-slot", "aside")]);

    let stats = Differ::with_policy(policy).diff(&template, &mut existing);
    assert_eq!(stats.moved, 1);
    assert_eq!(stats.removed, 1);
    assert_eq!(existing.children(existing.root()), &[aside]);
}

// ----------------------------------------------------------------------
// Property tests
// ----------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Tree {
    Text(String),
    Element {
        tag: &'static str,
        key: Option<String>,
        class: Option<String>,
        children: Vec<Tree>,
    },
}

fn tree() -> impl Strategy<Value = Tree> {
    let leaf = "[a-z ]{0,6}".prop_map(Tree::Text);
    leaf.prop_recursive(4, 32, 4, |inner| {
        (
            prop::sample::select(vec!["div", "p", "span", "li"]),
            prop::option::of("[a-c]"),
            prop::option::of("[xy]"),
            prop::collection::vec(inner, 0..4),
        )
            .prop_map(|(tag, key, class, children)| Tree::Element {
                tag,
                key,
                class,
                children,
            })
    })
}

fn build(doc: &mut Document, parent: NodeId, tree: &Tree) {
    match tree {
        Tree::Text(value) => {
            text(doc, parent, value);
        }
        Tree::Element {
            tag,
            key,
            class,
            children,
        } => {
            let mut attrs = Vec::new();
            if let Some(key) = key {
                attrs.push(("key", key.as_str()));
            }
            if let Some(class) = class {
                attrs.push(("class", class.as_str()));
            }
            let node = el(doc, parent, tag, &attrs);
            for child in children {
                build(doc, node, child);
            }
        }
    }
}

fn document(trees: &[Tree]) -> Document {
    let mut doc = Document::new();
    let root = doc.root();
    for tree in trees {
        build(&mut doc, root, tree);
    }
    doc
}

proptest! {
    #[test]
    fn prop_diff_of_clone_is_a_no_op(trees in prop::collection::vec(tree(), 0..5)) {
        let template = document(&trees);
        let mut existing = template.clone();
        let stats = Differ::new().diff(&template, &mut existing);
        prop_assert!(stats.is_empty());
        prop_assert_eq!(existing.to_string(), template.to_string());
    }

    #[test]
    fn prop_diff_converges(
        fresh in prop::collection::vec(tree(), 0..5),
        stale in prop::collection::vec(tree(), 0..5),
    ) {
        let template = document(&fresh);
        let mut existing = document(&stale);
        Differ::new().diff(&template, &mut existing);
        prop_assert_eq!(existing.to_string(), template.to_string());

        let again = Differ::new().diff(&template, &mut existing);
        prop_assert!(again.is_empty());
    }
}
