//! Sibling-list position queries.
//!
//! Everything here is recomputed from the current sibling order and in-order
//! marks on every call; nothing is cached, so answers track the source tree
//! as the edit script mutates it.

use std::fmt::Write as _;

use indextree::NodeId;

use crate::DiffError;
use crate::annotations::{Annotations, IgnoreRules, OrderMarks};
use crate::dom::{Document, Label};
use crate::matching::Matching;

/// The ways of numbering a node among its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildNumber {
    /// 0-based index among all siblings.
    pub dom: usize,
    /// 1-based XPath index; a text node right after a text node shares its
    /// predecessor's index.
    pub xpath: usize,
    /// 1 + length of the run of text siblings immediately before the node.
    pub xpath_char_pos: usize,
    /// Number of in-order siblings before the node.
    pub in_order_dom: usize,
    /// 1-based XPath index counting in-order siblings only. At least 1.
    pub in_order_xpath: usize,
    /// Like `xpath_char_pos`, summing only in-order text siblings.
    pub in_order_xpath_char_pos: usize,
}

impl ChildNumber {
    /// Number `node` among its current siblings.
    pub fn new(doc: &Document, node: NodeId, marks: &OrderMarks) -> Result<Self, DiffError> {
        let parent = doc.parent(node).ok_or(DiffError::NoParent { node })?;

        let mut dom = 0;
        let mut xpath = 1;
        let mut in_order_dom = 0;
        let mut in_order_xpath = 0;
        let mut prev_is_text = false;
        let mut last_in_order_is_text = false;

        for sibling in doc.children(parent) {
            let is_text = doc.is_text(sibling);
            let in_order = marks.is_in_order(sibling);
            let coalesced = is_text && prev_is_text;

            if in_order && !(is_text && last_in_order_is_text) {
                in_order_xpath += 1;
            }
            if sibling == node {
                if coalesced {
                    xpath -= 1;
                }
                break;
            }

            dom += 1;
            if !coalesced {
                xpath += 1;
            }
            if in_order {
                in_order_dom += 1;
                last_in_order_is_text = is_text;
            }
            prev_is_text = is_text;
        }

        let mut xpath_char_pos = 1;
        let mut in_order_xpath_char_pos = 1;
        for sibling in doc.preceding_siblings(node) {
            if !doc.is_text(sibling) {
                break;
            }
            let len = doc.text_len(sibling);
            xpath_char_pos += len;
            if marks.is_in_order(sibling) {
                in_order_xpath_char_pos += len;
            }
        }

        Ok(Self {
            dom,
            xpath,
            xpath_char_pos,
            in_order_dom,
            in_order_xpath: in_order_xpath.max(1),
            in_order_xpath_char_pos,
        })
    }

    /// Number `node` treating every sibling as in order.
    pub fn plain(doc: &Document, node: NodeId) -> Result<Self, DiffError> {
        Self::new(doc, node, &OrderMarks::new())
    }
}

/// How path steps are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathStyle {
    /// `/node()[i]` for every step.
    #[default]
    Generic,
    /// `/name[i]`, `/text()[i]`, `/comment()[i]`, `/processing-instruction()[i]`.
    TagNames,
}

/// Absolute XPath of `node`, one step per ancestor from the document
/// element down. The document node itself is `/`.
pub fn xpath(doc: &Document, node: NodeId, style: PathStyle) -> String {
    let mut steps: Vec<NodeId> = node
        .ancestors(&doc.arena)
        .take_while(|&id| id != doc.root)
        .collect();
    if steps.is_empty() {
        return "/".to_string();
    }
    steps.reverse();

    let mut path = String::new();
    for id in steps {
        // infallible for String
        let _ = match style {
            PathStyle::Generic => write!(path, "/node()[{}]", generic_index(doc, id)),
            PathStyle::TagNames => {
                let index = same_test_index(doc, id);
                match doc.label(id) {
                    Label::Element(name) => write!(path, "/{name}[{index}]"),
                    Label::Text => write!(path, "/text()[{index}]"),
                    Label::Comment => write!(path, "/comment()[{index}]"),
                    Label::ProcessingInstruction(_) => {
                        write!(path, "/processing-instruction()[{index}]")
                    }
                    Label::Document => Ok(()),
                }
            }
        };
    }
    path
}

/// Coalesced XPath index among all siblings.
fn generic_index(doc: &Document, id: NodeId) -> usize {
    let mut index = 1;
    let mut prev_is_text = false;
    for sibling in doc.children(doc.parent(id).unwrap_or(doc.root)) {
        let is_text = doc.is_text(sibling);
        let coalesced = is_text && prev_is_text;
        if sibling == id {
            return if coalesced { index - 1 } else { index };
        }
        if !coalesced {
            index += 1;
        }
        prev_is_text = is_text;
    }
    index
}

/// XPath index among siblings that pass the same node test.
fn same_test_index(doc: &Document, id: NodeId) -> usize {
    let test = node_test(doc.label(id));
    let mut index = 0;
    let mut prev_is_text = false;
    for sibling in doc.children(doc.parent(id).unwrap_or(doc.root)) {
        let is_text = doc.is_text(sibling);
        if node_test(doc.label(sibling)) == test && !(is_text && prev_is_text) {
            index += 1;
        }
        if sibling == id {
            break;
        }
        prev_is_text = is_text;
    }
    index.max(1)
}

/// Processing instructions share one node test regardless of target.
fn node_test(label: Label<'_>) -> Label<'_> {
    match label {
        Label::ProcessingInstruction(_) => Label::ProcessingInstruction(""),
        other => other,
    }
}

/// Where to put a node among its new siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// As the first child.
    First,
    /// Immediately after this (source) sibling.
    After(NodeId),
}

/// Find where the partner of target node `x` belongs in the source: right
/// after the partner of the rightmost in-order left sibling of `x`, or first.
///
/// Only in-order siblings count, so siblings that are still waiting to be
/// moved do not shift the slot.
pub fn find_position(
    target: &Document,
    x: NodeId,
    marks: &Annotations,
    matching: &Matching,
    ignore: &IgnoreRules,
) -> Result<Placement, DiffError> {
    let anchor = target
        .preceding_siblings(x)
        .find(|&v| marks.target.is_in_order(v) && !ignore.is_ignored(target, v));

    let Some(v) = anchor else {
        return Ok(Placement::First);
    };
    let u = matching
        .get_a(v)
        .ok_or(DiffError::MissingPartner { node: v })?;
    Ok(Placement::After(u))
}
