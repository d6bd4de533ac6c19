//! Form document model
//!
//! Nodes live in a flat arena owned by [`Document`] and are addressed by
//! [`NodeId`]. Parent and child links are stored on each node. Detaching a
//! node unlinks it from its parent; the node stays in the arena but is no
//! longer reachable from the root.

use indexmap::IndexMap;

/// Handle to a node inside a [`Document`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Element payload: tag name plus ordered attributes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: IndexMap<String, String>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
        }
    }
}

/// Node payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeData {
    Element(Element),
    Text(String),
    Comment(String),
}

/// A node in the arena
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

impl Node {
    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// A parsed form: one root element and everything below it
///
/// Cloning produces a fully independent document with identical node ids,
/// so a `NodeId` found in the original addresses the same node in the copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Document {
    /// Create a document with a single, empty root element
    pub fn new(root: Element) -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                data: NodeData::Element(root),
            }],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.node(id).map(Node::data) {
            Some(NodeData::Element(element)) => Some(element),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match self.node_mut(id).map(|node| &mut node.data) {
            Some(NodeData::Element(element)) => Some(element),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.name.as_str())
    }

    pub fn is_tag(&self, id: NodeId, name: &str) -> bool {
        self.tag_name(id) == Some(name)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(Node::parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(Node::children).unwrap_or_default()
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    // Attributes

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)
            .and_then(|element| element.attributes.get(name))
            .map(String::as_str)
    }

    /// Attribute value, or the empty string when absent
    pub fn attr_or_empty(&self, id: NodeId, name: &str) -> &str {
        self.attr(id, name).unwrap_or_default()
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let Some(element) = self.element_mut(id) {
            element.attributes.insert(name.to_string(), value.into());
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(element) = self.element_mut(id) {
            element.attributes.shift_remove(name);
        }
    }

    pub fn has_class(&self, id: NodeId, token: &str) -> bool {
        self.attr(id, "class")
            .is_some_and(|class| class.split_ascii_whitespace().any(|t| t == token))
    }

    /// Append a class token unless it is already present
    pub fn add_class(&mut self, id: NodeId, token: &str) {
        if self.has_class(id, token) {
            return;
        }
        let class = match self.attr(id, "class").map(str::trim) {
            Some(existing) if !existing.is_empty() => format!("{existing} {token}"),
            _ => token.to_string(),
        };
        self.set_attr(id, "class", class);
    }

    // Text

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.node(id).map(Node::data) {
            Some(NodeData::Text(text)) => out.push_str(text),
            Some(NodeData::Element(_)) => {
                for &child in self.children(id) {
                    self.collect_text(child, out);
                }
            }
            Some(NodeData::Comment(_)) | None => {}
        }
    }

    /// Replace all children of `id` with a single text node, or with nothing
    /// when `text` is empty
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        self.clear_children(id);
        if !text.is_empty() {
            let node = self.create_text(text);
            self.append_child(id, node);
        }
    }

    // Construction and mutation

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    /// Create a detached element
    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push(NodeData::Element(Element::new(name)))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    /// Create a detached comment node
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Comment(text.to_string()))
    }

    /// Create a detached element holding a single text child
    pub fn create_element_with_text(&mut self, name: &str, text: &str) -> NodeId {
        let element = self.create_element(name);
        let text = self.create_text(text);
        self.append_child(element, text);
        element
    }

    /// Unlink a node from its parent
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|&child| child != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_at(parent, child, usize::MAX);
    }

    /// Insert `child` before `reference`; appends when `reference` is `None`
    /// or not a child of `parent`
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        self.detach(child);
        let index = reference
            .and_then(|reference| self.children(parent).iter().position(|&c| c == reference))
            .unwrap_or(usize::MAX);
        self.insert_at(parent, child, index);
    }

    fn insert_at(&mut self, parent: NodeId, child: NodeId, index: usize) {
        if parent == child || self.is_ancestor(child, parent) {
            return;
        }
        self.detach(child);
        let Some(node) = self.node_mut(parent) else {
            return;
        };
        let index = index.min(node.children.len());
        node.children.insert(index, child);
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
    }

    /// Put `replacement` where `old` is, detaching `old`
    pub fn replace(&mut self, old: NodeId, replacement: NodeId) {
        if old == replacement {
            return;
        }
        let Some(parent) = self.parent(old) else {
            return;
        };
        self.detach(replacement);
        if let Some(index) = self.children(parent).iter().position(|&c| c == old) {
            self.detach(old);
            self.insert_at(parent, replacement, index);
        }
    }

    pub fn clear_children(&mut self, id: NodeId) {
        for child in self.children(id).to_vec() {
            self.detach(child);
        }
    }

    // Traversal

    /// Whether `ancestor` is a proper ancestor of `id`
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Whether the node is still reachable from the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root || self.is_ancestor(self.root, id)
    }

    /// `id` and every node below it, in document order
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, NodeId) {
        let mut doc = Document::new(Element::new("form"));
        let root = doc.root();
        let p = doc.create_element_with_text("p", "hello");
        doc.append_child(root, p);
        let input = doc.create_element("input");
        doc.set_attr(input, "name", "q");
        doc.append_child(root, input);
        (doc, p, input)
    }

    #[test]
    fn test_text_content_and_order() {
        let (doc, p, input) = sample();
        assert_eq!(doc.text_content(doc.root()), "hello");
        assert_eq!(doc.children(doc.root()), &[p, input]);
    }

    #[test]
    fn test_add_class_is_idempotent() {
        let (mut doc, _, input) = sample();
        doc.add_class(input, "invalid");
        doc.add_class(input, "invalid");
        assert_eq!(doc.attr(input, "class"), Some("invalid"));
        doc.set_attr(input, "class", "wide");
        doc.add_class(input, "invalid");
        assert_eq!(doc.attr(input, "class"), Some("wide invalid"));
        assert!(doc.has_class(input, "wide"));
        assert!(!doc.has_class(input, "wid"));
    }

    #[test]
    fn test_replace_keeps_position() {
        let (mut doc, p, input) = sample();
        let text = doc.create_text("q-value");
        doc.replace(p, text);
        assert_eq!(doc.children(doc.root()), &[text, input]);
        assert!(!doc.is_attached(p));
        assert!(doc.is_attached(text));
    }

    #[test]
    fn test_insert_before_first_child() {
        let (mut doc, p, input) = sample();
        let notice = doc.create_element("p");
        let root = doc.root();
        let first = doc.first_child(root);
        doc.insert_before(root, notice, first);
        assert_eq!(doc.children(root), &[notice, p, input]);
    }

    #[test]
    fn test_clone_is_independent() {
        let (doc, p, _) = sample();
        let mut copy = doc.clone();
        copy.detach(p);
        assert!(doc.is_attached(p));
        assert!(!copy.is_attached(p));
    }

    #[test]
    fn test_cannot_append_ancestor() {
        let (mut doc, p, _) = sample();
        let root = doc.root();
        doc.append_child(p, root);
        assert_eq!(doc.parent(p), Some(root));
        assert_eq!(doc.parent(root), None);
    }
}
