//! Arena-based document tree.
//!
//! Every node of a document lives in one `indextree` arena. Handles are
//! [`NodeId`]s: copyable, and equal only when they name the same node, so two
//! nodes with identical content stay distinct. The arena root is a synthetic
//! document node whose element child is the document element.

use indexmap::IndexMap;
use indextree::{Arena, NodeEdge, NodeError, NodeId};

use crate::DiffError;

/// What goes in each arena slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData {
    pub kind: NodeKind,
}

/// Node types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Document root (invisible, parent of the document element)
    Document,
    /// Element with name and attributes
    Element(ElementData),
    /// Character data
    Text(String),
    /// `<!-- ... -->`
    Comment(String),
    /// `<?target data?>`
    ProcessingInstruction(PiData),
}

impl NodeKind {
    /// An element without attributes.
    pub fn element(name: impl Into<String>) -> Self {
        NodeKind::Element(ElementData::new(name))
    }

    /// A text node.
    pub fn text(text: impl Into<String>) -> Self {
        NodeKind::Text(text.into())
    }

    /// A comment node.
    pub fn comment(text: impl Into<String>) -> Self {
        NodeKind::Comment(text.into())
    }

    /// A processing instruction.
    pub fn processing_instruction(target: impl Into<String>, data: impl Into<String>) -> Self {
        NodeKind::ProcessingInstruction(PiData {
            target: target.into(),
            data: data.into(),
        })
    }
}

/// Element data (name + attributes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    pub name: String,

    /// IndexMap keeps source order for printing; its equality ignores order,
    /// which is what attribute-set comparison needs.
    pub attrs: IndexMap<String, String>,
}

impl ElementData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: IndexMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }
}

/// Processing instruction target and data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiData {
    pub target: String,
    pub data: String,
}

/// The kind and label of a node, as used for sibling counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label<'a> {
    Document,
    Element(&'a str),
    Text,
    Comment,
    ProcessingInstruction(&'a str),
}

/// DOM node type, numbered the way DOM Level 1 numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Element,
    Attribute,
    Text,
    ProcessingInstruction,
    Comment,
    Document,
}

impl NodeType {
    /// The numeric DOM code (`1` element, `2` attribute, `3` text, ...).
    pub fn code(self) -> u16 {
        match self {
            NodeType::Element => 1,
            NodeType::Attribute => 2,
            NodeType::Text => 3,
            NodeType::ProcessingInstruction => 7,
            NodeType::Comment => 8,
            NodeType::Document => 9,
        }
    }
}

/// An ordered tree of XML nodes.
#[derive(Debug, Clone)]
pub struct Document {
    /// THE tree - all nodes live here
    pub arena: Arena<NodeData>,

    /// The document node
    pub root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document holding only its document node.
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeData {
            kind: NodeKind::Document,
        });
        Self { arena, root }
    }

    /// Get immutable reference to node data
    pub fn get(&self, id: NodeId) -> &NodeData {
        self.arena[id].get()
    }

    /// Get mutable reference to node data
    pub fn get_mut(&mut self, id: NodeId) -> &mut NodeData {
        self.arena[id].get_mut()
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.get(id).kind
    }

    /// Allocate a detached node.
    pub fn create(&mut self, kind: NodeKind) -> NodeId {
        self.arena.new_node(NodeData { kind })
    }

    /// Allocate a node and append it as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.create(kind);
        parent.append(id, &mut self.arena);
        id
    }

    /// The first element child of the document node.
    pub fn document_element(&self) -> Option<NodeId> {
        self.root
            .children(&self.arena)
            .find(|&id| matches!(self.kind(id), NodeKind::Element(_)))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id).and_then(|node| node.parent())
    }

    /// Iterate children of a node
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).count()
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.arena[id].first_child().is_none()
    }

    /// Siblings before `id`, nearest first.
    pub fn preceding_siblings(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.preceding_siblings(&self.arena).skip(1)
    }

    /// All live nodes in document (pre-)order, document node first.
    pub fn preorder(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.root.descendants(&self.arena)
    }

    /// All live nodes in post-order, document node last.
    pub fn post_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.root.traverse(&self.arena).filter_map(|edge| match edge {
            NodeEdge::End(id) => Some(id),
            NodeEdge::Start(_) => None,
        })
    }

    pub fn label(&self, id: NodeId) -> Label<'_> {
        match self.kind(id) {
            NodeKind::Document => Label::Document,
            NodeKind::Element(elem) => Label::Element(&elem.name),
            NodeKind::Text(_) => Label::Text,
            NodeKind::Comment(_) => Label::Comment,
            NodeKind::ProcessingInstruction(pi) => Label::ProcessingInstruction(&pi.target),
        }
    }

    pub fn node_type(&self, id: NodeId) -> NodeType {
        match self.kind(id) {
            NodeKind::Document => NodeType::Document,
            NodeKind::Element(_) => NodeType::Element,
            NodeKind::Text(_) => NodeType::Text,
            NodeKind::Comment(_) => NodeType::Comment,
            NodeKind::ProcessingInstruction(_) => NodeType::ProcessingInstruction,
        }
    }

    /// Element name or processing-instruction target.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Element(elem) => Some(&elem.name),
            NodeKind::ProcessingInstruction(pi) => Some(&pi.target),
            _ => None,
        }
    }

    /// Text, comment or processing-instruction data.
    pub fn value(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Text(text) | NodeKind::Comment(text) => Some(text),
            NodeKind::ProcessingInstruction(pi) => Some(&pi.data),
            _ => None,
        }
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Text(_))
    }

    /// Length of a text node in characters; zero for every other kind.
    pub fn text_len(&self, id: NodeId) -> usize {
        match self.kind(id) {
            NodeKind::Text(text) => text.chars().count(),
            _ => 0,
        }
    }

    /// Copy `id` from `other` into this arena without its children.
    /// The copy starts detached.
    pub fn import_shallow(&mut self, other: &Document, id: NodeId) -> NodeId {
        self.create(other.kind(id).clone())
    }

    /// Make `node` the first child of `parent`, detaching it first.
    pub fn prepend_child(&mut self, parent: NodeId, node: NodeId) -> Result<(), DiffError> {
        parent.checked_prepend(node, &mut self.arena)?;
        Ok(())
    }

    /// Place `node` immediately after `anchor`, detaching it first.
    pub fn insert_after(&mut self, anchor: NodeId, node: NodeId) -> Result<(), DiffError> {
        if anchor.ancestors(&self.arena).any(|id| id == node) {
            return Err(NodeError::AppendAncestor.into());
        }
        anchor.checked_insert_after(node, &mut self.arena)?;
        Ok(())
    }

    /// Remove `id` and everything below it.
    pub fn remove_subtree(&mut self, id: NodeId) {
        id.remove_subtree(&mut self.arena);
    }

    /// Wrap the document element in a new element named `name`, which
    /// becomes the document element. Returns the wrapper.
    pub fn wrap_document_element(&mut self, name: &str) -> Result<NodeId, DiffError> {
        let element = self
            .document_element()
            .ok_or(DiffError::NoDocumentElement)?;
        let wrapper = self.create(NodeKind::element(name));
        element.checked_insert_before(wrapper, &mut self.arena)?;
        wrapper.checked_append(element, &mut self.arena)?;
        Ok(wrapper)
    }

    /// Deep structural equality of the subtree at `a` with the subtree at `b`
    /// of `other`. Attribute order is not significant.
    pub fn subtree_eq(&self, a: NodeId, other: &Document, b: NodeId) -> bool {
        if self.kind(a) != other.kind(b) {
            return false;
        }
        let mut left = self.children(a);
        let mut right = other.children(b);
        loop {
            match (left.next(), right.next()) {
                (None, None) => return true,
                (Some(x), Some(y)) if self.subtree_eq(x, other, y) => continue,
                _ => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let a = doc.append(doc.root, NodeKind::element("a"));
        let b = doc.append(a, NodeKind::Element(ElementData::new("b").with_attr("x", "1")));
        let t = doc.append(a, NodeKind::text("hello"));
        (doc, a, b, t)
    }

    #[test]
    fn test_document_element_and_labels() {
        let (doc, a, b, t) = sample();
        assert_eq!(doc.document_element(), Some(a));
        assert_eq!(doc.label(a), Label::Element("a"));
        assert_eq!(doc.label(t), Label::Text);
        assert_eq!(doc.node_type(b).code(), 1);
        assert_eq!(doc.node_type(t).code(), 3);
        assert_eq!(doc.value(t), Some("hello"));
        assert_eq!(doc.text_len(t), 5);
        assert_eq!(doc.parent(b), Some(a));
        assert!(doc.is_leaf(b));
        assert!(!doc.is_leaf(a));
    }

    #[test]
    fn test_post_order_visits_children_first() {
        let (doc, a, b, t) = sample();
        let order: Vec<_> = doc.post_order().collect();
        assert_eq!(order, vec![b, t, a, doc.root]);
    }

    #[test]
    fn test_relocation_detaches_first() {
        let (mut doc, a, b, t) = sample();
        doc.insert_after(t, b).unwrap();
        let kids: Vec<_> = doc.children(a).collect();
        assert_eq!(kids, vec![t, b]);

        doc.prepend_child(a, b).unwrap();
        let kids: Vec<_> = doc.children(a).collect();
        assert_eq!(kids, vec![b, t]);
    }

    #[test]
    fn test_relocation_into_own_subtree_fails() {
        let (mut doc, a, b, _t) = sample();
        assert!(matches!(doc.prepend_child(b, a), Err(DiffError::Tree(_))));
        assert!(matches!(doc.insert_after(b, a), Err(DiffError::Tree(_))));
        // the tree is untouched
        assert_eq!(doc.document_element(), Some(a));
        assert_eq!(doc.parent(b), Some(a));
    }

    #[test]
    fn test_wrap_document_element() {
        let (mut doc, a, _b, _t) = sample();
        let wrapper = doc.wrap_document_element("DUMMY").unwrap();
        assert_eq!(doc.document_element(), Some(wrapper));
        assert_eq!(doc.parent(a), Some(wrapper));
        assert_eq!(doc.parent(wrapper), Some(doc.root));
    }

    #[test]
    fn test_subtree_eq_ignores_attribute_order() {
        let mut left = Document::new();
        let la = left.append(
            left.root,
            NodeKind::Element(ElementData::new("a").with_attr("x", "1").with_attr("y", "2")),
        );
        left.append(la, NodeKind::text("t"));

        let mut right = Document::new();
        let ra = right.append(
            right.root,
            NodeKind::Element(ElementData::new("a").with_attr("y", "2").with_attr("x", "1")),
        );
        right.append(ra, NodeKind::text("t"));

        assert!(left.subtree_eq(left.root, &right, right.root));

        right.append(ra, NodeKind::comment("extra"));
        assert!(!left.subtree_eq(left.root, &right, right.root));
    }

    #[test]
    fn test_import_shallow_drops_children() {
        let (doc, a, _b, _t) = sample();
        let mut other = Document::new();
        let copy = other.import_shallow(&doc, a);
        assert_eq!(other.kind(copy), doc.kind(a));
        assert!(other.is_leaf(copy));
        assert_eq!(other.parent(copy), None);
    }
}
