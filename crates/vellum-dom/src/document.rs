/*
 * document.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Arena-backed document tree.
//!
//! Nodes live in a `Vec` owned by the [`Document`] and are addressed by
//! copyable [`NodeId`]s, so the renderer and the differ can hold on to node
//! handles while mutating the tree. Detaching a node unlinks it from its
//! parent but keeps it in the arena; it is reclaimed when the document is
//! dropped.
//!
//! Fragments follow DOM semantics: inserting a fragment moves its children
//! into the target position and leaves the fragment empty.

use indexmap::IndexMap;

/// Handle to a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the document arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Element namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Namespace {
    #[default]
    Html,
    Svg,
}

impl Namespace {
    pub fn uri(self) -> &'static str {
        match self {
            Namespace::Html => "http://www.w3.org/1999/xhtml",
            Namespace::Svg => "http://www.w3.org/2000/svg",
        }
    }
}

/// Element payload: name, namespace and ordered attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Lowercased for HTML elements, case preserved for SVG.
    pub name: String,
    pub namespace: Namespace,
    pub attributes: IndexMap<String, String>,
}

/// What a node holds.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Document,
    Fragment,
    Element(Element),
    Text(String),
    Comment(String),
}

/// Coarse node type, used when comparing nodes across documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Fragment,
    Element,
    Text,
    Comment,
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Document => NodeKind::Document,
            NodeData::Fragment => NodeKind::Fragment,
            NodeData::Element(_) => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Comment(_) => NodeKind::Comment,
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A mutable document tree.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document containing only its root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Create a detached element. HTML element names are lowercased.
    pub fn create_element(&mut self, name: &str, namespace: Namespace) -> NodeId {
        let name = match namespace {
            Namespace::Html => name.to_ascii_lowercase(),
            Namespace::Svg => name.to_string(),
        };
        self.alloc(NodeData::Element(Element {
            name,
            namespace,
            attributes: IndexMap::new(),
        }))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Comment(text.into()))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.alloc(NodeData::Fragment)
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.data(id).kind()
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.data(id) {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Element name, if the node is an element.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.name.as_str())
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn first_element_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&child| self.is_element(child))
    }

    /// Depth-first search for the first element named `name` under `from`.
    pub fn find_element(&self, from: NodeId, name: &str) -> Option<NodeId> {
        for &child in self.children(from) {
            if self.name(child).is_some_and(|n| n.eq_ignore_ascii_case(name)) {
                return Some(child);
            }
            if let Some(found) = self.find_element(child, name) {
                return Some(found);
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Tree mutation
    // ------------------------------------------------------------------

    /// Unlink a node from its parent. The node stays valid and can be reinserted.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&child| child != id);
        }
    }

    /// Append `child` as the last child of `parent`.
    ///
    /// A fragment contributes its children instead of itself.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Insert `child` under `parent` before `reference` (or last when `None`).
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let moved: Vec<NodeId> = if matches!(self.data(child), NodeData::Fragment) {
            std::mem::take(&mut self.nodes[child.0].children)
        } else {
            self.detach(child);
            vec![child]
        };

        for &node in &moved {
            self.nodes[node.0].parent = Some(parent);
        }

        let siblings = &mut self.nodes[parent.0].children;
        let position = reference
            .and_then(|reference| siblings.iter().position(|&s| s == reference))
            .unwrap_or(siblings.len());
        siblings.splice(position..position, moved);
    }

    /// Detach every child of `id`.
    pub fn clear_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
    }

    // ------------------------------------------------------------------
    // Attributes and text
    // ------------------------------------------------------------------

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)
            .and_then(|element| element.attributes.get(name))
            .map(String::as_str)
    }

    /// Set an attribute, returning whether the stored value changed.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        match self.element_mut(id) {
            Some(element) => {
                if element.attributes.get(name) == Some(&value) {
                    return false;
                }
                element.attributes.insert(name.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// Remove an attribute, returning whether it was present.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> bool {
        self.element_mut(id)
            .is_some_and(|element| element.attributes.shift_remove(name).is_some())
    }

    /// Text of a text or comment node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.data(id) {
            NodeData::Text(text) | NodeData::Comment(text) => Some(text),
            _ => None,
        }
    }

    /// Append to a text node's value.
    pub fn append_text(&mut self, id: NodeId, more: &str) {
        if let NodeData::Text(text) = &mut self.nodes[id.0].data {
            text.push_str(more);
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.data(id) {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Comment(_) => {}
            _ => {
                for &child in self.children(id) {
                    self.collect_text(child, out);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Copying
    // ------------------------------------------------------------------

    /// Deep-copy a subtree of `other` into this document, detached.
    pub fn import_node(&mut self, other: &Document, id: NodeId) -> NodeId {
        self.import_node_filtered(other, id, &|_, _| true)
    }

    /// Deep-copy a subtree of `other`, keeping only attributes accepted by `keep`.
    pub fn import_node_filtered(
        &mut self,
        other: &Document,
        id: NodeId,
        keep: &dyn Fn(&str, &str) -> bool,
    ) -> NodeId {
        let data = match other.data(id) {
            NodeData::Element(element) => NodeData::Element(Element {
                name: element.name.clone(),
                namespace: element.namespace,
                attributes: element
                    .attributes
                    .iter()
                    .filter(|(name, value)| keep(name, value))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect(),
            }),
            // A document root is copied as a fragment so it can be inserted.
            NodeData::Document => NodeData::Fragment,
            data => data.clone(),
        };
        let copy = self.alloc(data);
        for &child in other.children(id) {
            let child_copy = self.import_node_filtered(other, child, keep);
            self.nodes[child_copy.0].parent = Some(copy);
            self.nodes[copy.0].children.push(child_copy);
        }
        copy
    }

    /// Deep-copy a subtree within this document, detached.
    pub fn clone_node(&mut self, id: NodeId) -> NodeId {
        let snapshot = self.clone();
        self.import_node(&snapshot, id)
    }

    /// Serialize a subtree to HTML.
    pub fn to_html(&self, id: NodeId) -> String {
        crate::serialize::to_html(self, id)
    }
}

impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_html(self.root()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(doc: &mut Document, name: &str) -> NodeId {
        doc.create_element(name, Namespace::Html)
    }

    #[test]
    fn test_append_and_detach() {
        let mut doc = Document::new();
        let div = element(&mut doc, "div");
        let text = doc.create_text("hi");
        doc.append_child(doc.root(), div);
        doc.append_child(div, text);

        assert_eq!(doc.children(div), &[text]);
        assert_eq!(doc.parent(text), Some(div));

        doc.detach(text);
        assert!(doc.children(div).is_empty());
        assert_eq!(doc.parent(text), None);
    }

    #[test]
    fn test_append_moves_between_parents() {
        let mut doc = Document::new();
        let a = element(&mut doc, "a");
        let b = element(&mut doc, "b");
        let text = doc.create_text("x");
        doc.append_child(a, text);
        doc.append_child(b, text);
        assert!(doc.children(a).is_empty());
        assert_eq!(doc.children(b), &[text]);
    }

    #[test]
    fn test_insert_before() {
        let mut doc = Document::new();
        let ul = element(&mut doc, "ul");
        let first = element(&mut doc, "li");
        let second = element(&mut doc, "li");
        doc.append_child(ul, second);
        doc.insert_before(ul, first, Some(second));
        assert_eq!(doc.children(ul), &[first, second]);
    }

    #[test]
    fn test_fragment_contributes_children() {
        let mut doc = Document::new();
        let div = element(&mut doc, "div");
        let fragment = doc.create_fragment();
        let one = doc.create_text("1");
        let two = doc.create_text("2");
        doc.append_child(fragment, one);
        doc.append_child(fragment, two);
        doc.append_child(div, fragment);

        assert_eq!(doc.children(div), &[one, two]);
        assert!(doc.children(fragment).is_empty());
        assert_eq!(doc.parent(one), Some(div));
    }

    #[test]
    fn test_attributes() {
        let mut doc = Document::new();
        let input = element(&mut doc, "INPUT");
        assert_eq!(doc.name(input), Some("input"));
        assert!(doc.set_attribute(input, "value", "a"));
        assert!(!doc.set_attribute(input, "value", "a"));
        assert_eq!(doc.attribute(input, "value"), Some("a"));
        assert!(doc.remove_attribute(input, "value"));
        assert!(!doc.remove_attribute(input, "value"));
    }

    #[test]
    fn test_svg_names_keep_case() {
        let mut doc = Document::new();
        let node = doc.create_element("linearGradient", Namespace::Svg);
        assert_eq!(doc.name(node), Some("linearGradient"));
    }

    #[test]
    fn test_import_node_deep_copies() {
        let mut source = Document::new();
        let p = element(&mut source, "p");
        source.set_attribute(p, "class", "lead");
        let text = source.create_text("copy me");
        source.append_child(p, text);

        let mut target = Document::new();
        let copy = target.import_node(&source, p);
        assert_eq!(target.attribute(copy, "class"), Some("lead"));
        assert_eq!(target.text_content(copy), "copy me");
        assert_eq!(target.parent(copy), None);
    }

    #[test]
    fn test_find_element() {
        let mut doc = Document::new();
        let html = element(&mut doc, "html");
        let head = element(&mut doc, "head");
        doc.append_child(doc.root(), html);
        doc.append_child(html, head);
        assert_eq!(doc.find_element(doc.root(), "head"), Some(head));
        assert_eq!(doc.find_element(doc.root(), "body"), None);
    }
}
