//! The delta: an ordered, append-only log of XPath-addressed edit operations.
//!
//! Operations are recorded in application order. Each one addresses nodes by
//! their path in the document as left by the operations before it, so an
//! applier replays the log front to back.

use core::fmt;

use indextree::NodeId;

use crate::dom::{Document, NodeKind, NodeType};
use crate::position::{ChildNumber, PathStyle, xpath};
use crate::{DiffError, debug};

/// Context window sizes recorded in the delta header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextConfig {
    pub sibling: usize,
    pub parent: usize,
    pub parent_sibling: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            sibling: 2,
            parent: 1,
            parent_sibling: 0,
        }
    }
}

/// Settings recorded once in the delta header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaConfig {
    pub path_style: PathStyle,
    /// Context sizes; `None` leaves them out of the header.
    pub context: Option<ContextConfig>,
    /// The delta is meant to be applied in reverse.
    pub reverse_patch: bool,
    /// Whether entities were resolved while parsing.
    pub resolve_entities: bool,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            path_style: PathStyle::Generic,
            context: None,
            reverse_patch: false,
            resolve_entities: true,
        }
    }
}

/// One edit operation.
#[derive(Clone, PartialEq, Eq)]
pub enum DeltaOp {
    /// Insert a node, or set an attribute when `node_type` is
    /// [`NodeType::Attribute`].
    Insert {
        /// Path of the parent (the element, for attributes).
        parent: String,
        node_type: NodeType,
        /// XPath child number; absent for attributes.
        child_no: Option<usize>,
        /// Element, attribute or processing-instruction name.
        name: Option<String>,
        /// Offset into a text run; only recorded when greater than 1.
        char_pos: Option<usize>,
        /// Text, comment, processing-instruction data or attribute value.
        value: Option<String>,
    },

    /// Delete a node and its subtree.
    Delete {
        node: String,
        /// Text nodes only.
        char_pos: Option<usize>,
        /// Text nodes only.
        length: Option<usize>,
    },

    /// Relocate a node and its subtree.
    Move {
        node: String,
        old_char_pos: usize,
        parent: String,
        child_no: usize,
        new_char_pos: usize,
        /// Text nodes only.
        length: Option<usize>,
    },
}

impl fmt::Display for DeltaOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeltaOp::Insert {
                parent,
                node_type,
                child_no,
                name,
                ..
            } => {
                write!(f, "Insert(type {} under {}", node_type.code(), parent)?;
                if let Some(child_no) = child_no {
                    write!(f, " @{child_no}")?;
                }
                if let Some(name) = name {
                    write!(f, " {name}")?;
                }
                write!(f, ")")
            }
            DeltaOp::Delete { node, .. } => write!(f, "Delete({node})"),
            DeltaOp::Move {
                node,
                parent,
                child_no,
                ..
            } => write!(f, "Move({node} → {parent} @{child_no})"),
        }
    }
}

impl fmt::Debug for DeltaOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// An edit script plus its header.
#[derive(Debug, Clone)]
pub struct Delta {
    header: DeltaConfig,
    ops: Vec<DeltaOp>,
    dummy_root: bool,
}

impl Delta {
    pub fn new(header: DeltaConfig) -> Self {
        Self {
            header,
            ops: Vec::new(),
            dummy_root: false,
        }
    }

    pub fn header(&self) -> &DeltaConfig {
        &self.header
    }

    /// The operations in application order.
    pub fn ops(&self) -> &[DeltaOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Whether both document elements were wrapped in a `DUMMY` element,
    /// which paths in this delta then include.
    pub fn dummy_root(&self) -> bool {
        self.dummy_root
    }

    pub(crate) fn set_dummy_root(&mut self) {
        self.dummy_root = true;
    }

    fn push(&mut self, op: DeltaOp) {
        debug!(%op, "emit");
        self.ops.push(op);
    }

    fn path(&self, doc: &Document, node: NodeId) -> String {
        xpath(doc, node, self.header.path_style)
    }

    /// Record the insertion of `node`, already placed under `parent` in
    /// `doc`. Elements are followed by one attribute insert per attribute.
    pub fn insert(
        &mut self,
        doc: &Document,
        node: NodeId,
        parent: NodeId,
        child_no: usize,
        char_pos: usize,
    ) {
        let node_type = doc.node_type(node);
        let op = DeltaOp::Insert {
            parent: self.path(doc, parent),
            node_type,
            child_no: Some(child_no),
            name: doc.name(node).map(str::to_owned),
            char_pos: (char_pos > 1).then_some(char_pos),
            value: doc.value(node).map(str::to_owned),
        };
        self.push(op);

        if let NodeKind::Element(elem) = doc.kind(node)
            && !elem.attrs.is_empty()
        {
            let own_path = self.path(doc, node);
            for (name, value) in &elem.attrs {
                self.push(DeltaOp::Insert {
                    parent: own_path.clone(),
                    node_type: NodeType::Attribute,
                    child_no: None,
                    name: Some(name.clone()),
                    char_pos: None,
                    value: Some(value.clone()),
                });
            }
        }
    }

    /// Record the deletion of `node`, which must still be in `doc`.
    pub fn delete(&mut self, doc: &Document, node: NodeId) -> Result<(), DiffError> {
        let (char_pos, length) = if doc.is_text(node) {
            let numbers = ChildNumber::plain(doc, node)?;
            (Some(numbers.xpath_char_pos), Some(doc.text_len(node)))
        } else {
            (None, None)
        };
        let op = DeltaOp::Delete {
            node: self.path(doc, node),
            char_pos,
            length,
        };
        self.push(op);
        Ok(())
    }

    /// Record a move of `node`, already relocated under `parent` in `doc`.
    /// `old_path` and `old_char_pos` describe where it was before.
    #[allow(clippy::too_many_arguments)]
    pub fn move_node(
        &mut self,
        doc: &Document,
        node: NodeId,
        old_path: String,
        old_char_pos: usize,
        parent: NodeId,
        child_no: usize,
        new_char_pos: usize,
    ) -> Result<(), DiffError> {
        if new_char_pos < 1 {
            return Err(DiffError::InvalidCharPosition {
                char_pos: new_char_pos,
            });
        }
        let op = DeltaOp::Move {
            node: old_path,
            old_char_pos,
            parent: self.path(doc, parent),
            child_no,
            new_char_pos,
            length: doc.is_text(node).then(|| doc.text_len(node)),
        };
        self.push(op);
        Ok(())
    }
}
