//! Per-run node annotations kept beside the trees rather than inside them.

use indextree::NodeId;
use rapidhash::RapidHashSet as HashSet;

use crate::dom::{Document, NodeKind};

/// In-order marks for one tree.
///
/// Every node is in order unless it is explicitly marked out of order, so a
/// fresh table describes a tree nobody has started aligning yet.
#[derive(Debug, Default, Clone)]
pub struct OrderMarks {
    out_of_order: HashSet<NodeId>,
}

impl OrderMarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_order(&self, id: NodeId) -> bool {
        !self.out_of_order.contains(&id)
    }

    pub fn set_in_order(&mut self, id: NodeId) {
        self.out_of_order.remove(&id);
    }

    pub fn set_out_of_order(&mut self, id: NodeId) {
        self.out_of_order.insert(id);
    }
}

/// The in-order marks of both trees of one run.
#[derive(Debug, Default, Clone)]
pub struct Annotations {
    pub source: OrderMarks,
    pub target: OrderMarks,
}

/// Which nodes the diff leaves alone.
///
/// Ignored nodes are never matched, inserted, aligned or deleted; they stay
/// wherever they are in the source tree.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IgnoreRules {
    pub comments: bool,
    pub processing_instructions: bool,
    /// Text nodes made only of whitespace.
    pub whitespace_text: bool,
}

impl IgnoreRules {
    pub fn is_ignored(&self, doc: &Document, id: NodeId) -> bool {
        match doc.kind(id) {
            NodeKind::Comment(_) => self.comments,
            NodeKind::ProcessingInstruction(_) => self.processing_instructions,
            NodeKind::Text(text) => self.whitespace_text && text.trim().is_empty(),
            NodeKind::Document | NodeKind::Element(_) => false,
        }
    }
}
