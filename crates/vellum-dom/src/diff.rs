/*
 * diff.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * In-place reconciliation of a live document against a fresh render.
 */

//! Document differ.
//!
//! [`Differ::diff`] walks a freshly rendered *template* tree and mutates an
//! *existing* tree until it matches, reusing existing nodes wherever they are
//! "the same" so that focus, scroll position and user edits survive.
//!
//! Sibling lists are reconciled index by index. When the existing node at an
//! index does not match, the differ scans forward through the remaining
//! existing siblings for one that does and moves it into place. That scan is
//! linear per mismatch, so a fully reversed list costs O(n²); sibling lists in
//! rendered pages are short enough that this has not mattered.

use crate::document::{Document, NodeData, NodeId};
use tracing::{debug, trace};

/// Elements whose `value`/`checked`/`selected` attributes reflect user state.
const FORM_ELEMENTS: &[&str] = &["input", "textarea", "select", "option"];

/// Attributes that carry live form state.
const FORM_STATE_ATTRIBUTES: &[&str] = &["value", "checked", "selected"];

/// Attributes whose values are navigated to or fetched.
const URL_ATTRIBUTES: &[&str] = &[
    "href",
    "src",
    "action",
    "formaction",
    "xlink:href",
    "poster",
    "data",
];

/// URL schemes that execute or render script.
const UNSAFE_SCHEMES: &[&str] = &["javascript:", "vbscript:", "data:text/html"];

/// Knobs for node identity and attribute ownership.
#[derive(Debug, Clone)]
pub struct DiffPolicy {
    /// Attributes that identify an element among its siblings.
    pub identity_attributes: Vec<String>,
    /// A script carrying this attribute is recreated on every pass.
    pub rerun_attribute: String,
    /// Attributes with these prefixes belong to runtime scripts and are left alone.
    pub foreign_attribute_prefixes: Vec<String>,
}

impl Default for DiffPolicy {
    fn default() -> Self {
        Self {
            identity_attributes: vec!["id".to_string(), "key".to_string(), "src".to_string()],
            rerun_attribute: "data-rerun".to_string(),
            foreign_attribute_prefixes: vec!["data-runtime-".to_string()],
        }
    }
}

/// Mutations performed by one diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub inserted: usize,
    pub moved: usize,
    pub removed: usize,
    pub attributes_set: usize,
    pub attributes_removed: usize,
    pub children_cleared: usize,
}

impl DiffStats {
    /// Total number of mutations.
    pub fn mutations(&self) -> usize {
        self.inserted
            + self.moved
            + self.removed
            + self.attributes_set
            + self.attributes_removed
            + self.children_cleared
    }

    pub fn is_empty(&self) -> bool {
        self.mutations() == 0
    }
}

/// Reconciles documents under a [`DiffPolicy`].
#[derive(Debug, Clone, Default)]
pub struct Differ {
    policy: DiffPolicy,
    stats: DiffStats,
}

impl Differ {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: DiffPolicy) -> Self {
        Self {
            policy,
            stats: DiffStats::default(),
        }
    }

    pub fn policy(&self) -> &DiffPolicy {
        &self.policy
    }

    /// Mutate `existing` to match `template`, returning what changed.
    pub fn diff(&mut self, template: &Document, existing: &mut Document) -> DiffStats {
        self.stats = DiffStats::default();
        self.diff_children(template, template.root(), existing, existing.root());
        debug!(
            inserted = self.stats.inserted,
            moved = self.stats.moved,
            removed = self.stats.removed,
            attributes_set = self.stats.attributes_set,
            attributes_removed = self.stats.attributes_removed,
            "Document diff complete"
        );
        self.stats
    }

    fn diff_children(
        &mut self,
        template: &Document,
        template_parent: NodeId,
        existing: &mut Document,
        existing_parent: NodeId,
    ) {
        let template_children = template.children(template_parent);

        for (index, &template_child) in template_children.iter().enumerate() {
            let Some(existing_child) = existing.children(existing_parent).get(index).copied()
            else {
                let copy = self.import(template, template_child, existing);
                existing.append_child(existing_parent, copy);
                self.stats.inserted += 1;
                continue;
            };

            let target = if self.is_same(template, template_child, existing, existing_child) {
                existing_child
            } else {
                match self.find_later_match(
                    template,
                    template_child,
                    existing,
                    existing_parent,
                    index + 1,
                ) {
                    Some(found) => {
                        trace!(index, "Moving matching sibling into place");
                        existing.insert_before(existing_parent, found, Some(existing_child));
                        self.stats.moved += 1;
                        found
                    }
                    None => {
                        let copy = self.import(template, template_child, existing);
                        existing.insert_before(existing_parent, copy, Some(existing_child));
                        self.stats.inserted += 1;
                        continue;
                    }
                }
            };

            if template.is_element(template_child) {
                self.diff_attributes(template, template_child, existing, target);
                self.diff_element_children(template, template_child, existing, target);
            }
        }

        let keep = template_children.len();
        while existing.children(existing_parent).len() > keep {
            let Some(&excess) = existing.children(existing_parent).last() else {
                break;
            };
            existing.detach(excess);
            self.stats.removed += 1;
        }
    }

    fn diff_element_children(
        &mut self,
        template: &Document,
        template_node: NodeId,
        existing: &mut Document,
        existing_node: NodeId,
    ) {
        let template_has = !template.children(template_node).is_empty();
        let existing_has = !existing.children(existing_node).is_empty();

        match (template_has, existing_has) {
            (false, false) => {}
            (false, true) => {
                existing.clear_children(existing_node);
                self.stats.children_cleared += 1;
            }
            (true, false) => {
                // Build into a detached fragment, then attach once.
                let fragment = existing.create_fragment();
                self.diff_children(template, template_node, existing, fragment);
                existing.append_child(existing_node, fragment);
            }
            (true, true) => {
                self.diff_children(template, template_node, existing, existing_node);
            }
        }
    }

    fn diff_attributes(
        &mut self,
        template: &Document,
        template_node: NodeId,
        existing: &mut Document,
        existing_node: NodeId,
    ) {
        let (Some(template_element), Some(existing_element)) =
            (template.element(template_node), existing.element(existing_node))
        else {
            return;
        };
        let form_field = FORM_ELEMENTS.contains(&existing_element.name.as_str());

        let stale: Vec<String> = existing_element
            .attributes
            .keys()
            .filter(|name| !template_element.attributes.contains_key(*name))
            .filter(|name| !self.is_protected(form_field, name))
            .cloned()
            .collect();

        for (name, value) in &template_element.attributes {
            if self.is_protected(form_field, name) {
                continue;
            }
            if is_unsafe_attribute(name, value) {
                trace!(attribute = %name, "Skipping unsafe attribute");
                continue;
            }
            if existing.set_attribute(existing_node, name, value.as_str()) {
                self.stats.attributes_set += 1;
            }
        }

        for name in stale {
            if existing.remove_attribute(existing_node, &name) {
                self.stats.attributes_removed += 1;
            }
        }
    }

    /// Attributes the differ never writes or removes.
    fn is_protected(&self, form_field: bool, name: &str) -> bool {
        (form_field && FORM_STATE_ATTRIBUTES.contains(&name))
            || self
                .policy
                .foreign_attribute_prefixes
                .iter()
                .any(|prefix| name.starts_with(prefix.as_str()))
    }

    fn is_same(
        &self,
        template: &Document,
        template_node: NodeId,
        existing: &Document,
        existing_node: NodeId,
    ) -> bool {
        match (template.data(template_node), existing.data(existing_node)) {
            (NodeData::Text(a), NodeData::Text(b)) => a == b,
            (NodeData::Comment(a), NodeData::Comment(b)) => a == b,
            (NodeData::Element(a), NodeData::Element(b)) => {
                if a.name != b.name || a.namespace != b.namespace {
                    return false;
                }
                if a.name == "script" && a.attributes.contains_key(&self.policy.rerun_attribute) {
                    return false;
                }
                self.policy
                    .identity_attributes
                    .iter()
                    .all(|attr| a.attributes.get(attr) == b.attributes.get(attr))
            }
            (a, b) => a.kind() == b.kind(),
        }
    }

    fn find_later_match(
        &self,
        template: &Document,
        template_node: NodeId,
        existing: &Document,
        existing_parent: NodeId,
        from: usize,
    ) -> Option<NodeId> {
        existing
            .children(existing_parent)
            .iter()
            .skip(from)
            .copied()
            .find(|&candidate| self.is_same(template, template_node, existing, candidate))
    }

    fn import(&self, template: &Document, node: NodeId, existing: &mut Document) -> NodeId {
        existing.import_node_filtered(template, node, &|name, value| {
            !is_unsafe_attribute(name, value)
        })
    }
}

/// Reconcile `existing` with `template` using the default policy.
pub fn diff<'a>(template: &Document, existing: &'a mut Document) -> &'a mut Document {
    Differ::new().diff(template, existing);
    existing
}

/// Event handlers and script-bearing URLs.
pub fn is_unsafe_attribute(name: &str, value: &str) -> bool {
    let name = name.to_ascii_lowercase();
    if name.starts_with("on") {
        return true;
    }
    if !URL_ATTRIBUTES.contains(&name.as_str()) {
        return false;
    }
    let normalized: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .flat_map(char::to_lowercase)
        .collect();
    UNSAFE_SCHEMES
        .iter()
        .any(|scheme| normalized.starts_with(scheme))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Namespace;

    #[test]
    fn test_unsafe_attributes() {
        assert!(is_unsafe_attribute("onclick", "go()"));
        assert!(is_unsafe_attribute("ONLOAD", ""));
        assert!(is_unsafe_attribute("href", "javascript:alert(1)"));
        assert!(is_unsafe_attribute("href", "  JavaScript:alert(1)"));
        assert!(is_unsafe_attribute("href", "java\tscript:alert(1)"));
        assert!(is_unsafe_attribute("src", "data:text/html;base64,xx"));
        assert!(is_unsafe_attribute("formaction", "vbscript:x"));
        assert!(!is_unsafe_attribute("href", "/about"));
        assert!(!is_unsafe_attribute("src", "data:image/png;base64,xx"));
        assert!(!is_unsafe_attribute("title", "javascript:is fine here"));
    }

    #[test]
    fn test_is_same_respects_identity_attributes() {
        let mut a = Document::new();
        let left = a.create_element("li", Namespace::Html);
        a.set_attribute(left, "key", "1");

        let mut b = Document::new();
        let right = b.create_element("li", Namespace::Html);
        b.set_attribute(right, "key", "2");
        let unkeyed = b.create_element("li", Namespace::Html);

        let differ = Differ::new();
        assert!(!differ.is_same(&a, left, &b, right));
        assert!(!differ.is_same(&a, left, &b, unkeyed));
        b.set_attribute(right, "key", "1");
        assert!(differ.is_same(&a, left, &b, right));
    }

    #[test]
    fn test_rerun_script_is_never_same() {
        let mut a = Document::new();
        let script = a.create_element("script", Namespace::Html);
        a.set_attribute(script, "data-rerun", "");
        let b = a.clone();
        assert!(!Differ::new().is_same(&a, script, &b, script));
    }

    #[test]
    fn test_stats_mutations() {
        let stats = DiffStats {
            inserted: 1,
            moved: 2,
            ..Default::default()
        };
        assert_eq!(stats.mutations(), 3);
        assert!(!stats.is_empty());
        assert!(DiffStats::default().is_empty());
    }
}
