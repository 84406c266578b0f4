//! FMES edit script generation.
//!
//! Walks the target breadth-first and mutates the source step by step until
//! it is isomorphic to the target, recording every step in a [`Delta`]:
//! 1. INSERT: target nodes without a partner are copied into the source
//! 2. MOVE: partners under the wrong parent are relocated
//! 3. ALIGN: children of each matched pair are put in target order, keeping a
//!    longest common subsequence in place and moving the rest
//! 4. DELETE: source nodes still without a partner are removed, children first
//!
//! Based on "Change Detection in Hierarchically Structured Information"
//! (Chawathe et al., 1996).

use std::collections::VecDeque;

use indextree::NodeId;
use smallvec::SmallVec;

use crate::annotations::{Annotations, IgnoreRules};
use crate::delta::Delta;
use crate::dom::Document;
use crate::lcs::lcs;
use crate::matching::Matching;
use crate::position::{ChildNumber, Placement, find_position, xpath};
use crate::{DiffConfig, DiffError, debug, trace};

/// Name of the element that wraps both document elements when they are not
/// partners.
pub const DUMMY_ROOT: &str = "DUMMY";

/// Generate the edit script that turns `source` into `target`.
///
/// `source` is mutated into a tree isomorphic to `target` under the final
/// `matching`; `target` is only touched when both document elements have to
/// be wrapped in a [`DUMMY_ROOT`] pair.
pub fn generate_edit_script(
    source: &mut Document,
    target: &mut Document,
    matching: &mut Matching,
    config: &DiffConfig,
) -> Result<Delta, DiffError> {
    trace!(matched_pairs = matching.len(), "generate_edit_script start");
    let mut script = EditScript {
        source,
        target,
        matching,
        ignore: &config.ignore,
        marks: Annotations::default(),
        delta: Delta::new(config.delta.clone()),
    };
    script.match_roots()?;
    script.visit_target()?;
    script.delete_unmatched()?;
    debug!(total_ops = script.delta.len(), "generate_edit_script done");
    Ok(script.delta)
}

struct EditScript<'a> {
    source: &'a mut Document,
    target: &'a mut Document,
    matching: &'a mut Matching,
    ignore: &'a IgnoreRules,
    marks: Annotations,
    delta: Delta,
}

impl EditScript<'_> {
    /// Make sure the document elements are partners, wrapping both in a
    /// dummy element pair when they are not.
    fn match_roots(&mut self) -> Result<(), DiffError> {
        let source_root = self
            .source
            .document_element()
            .ok_or(DiffError::NoDocumentElement)?;
        let target_root = self
            .target
            .document_element()
            .ok_or(DiffError::NoDocumentElement)?;

        if self.matching.get_a(target_root) == Some(source_root) {
            return Ok(());
        }

        debug!("document elements differ, wrapping both in {}", DUMMY_ROOT);
        let source_dummy = self.source.wrap_document_element(DUMMY_ROOT)?;
        let target_dummy = self.target.wrap_document_element(DUMMY_ROOT)?;
        self.matching.add(source_dummy, target_dummy);
        self.marks.source.set_in_order(source_dummy);
        self.marks.target.set_in_order(target_dummy);
        self.delta.set_dummy_root();
        Ok(())
    }

    fn enqueue_children(&self, queue: &mut VecDeque<NodeId>, x: NodeId) {
        queue.extend(
            self.target
                .children(x)
                .filter(|&c| !self.ignore.is_ignored(self.target, c)),
        );
    }

    /// Breadth-first pass over the target: insert or move every node, then
    /// align its children.
    fn visit_target(&mut self) -> Result<(), DiffError> {
        let target_root = self
            .target
            .document_element()
            .ok_or(DiffError::NoDocumentElement)?;
        let source_root = self
            .matching
            .get_a(target_root)
            .ok_or(DiffError::MissingPartner { node: target_root })?;

        // The root pair is never visited itself, but its children still need
        // putting in order.
        self.align_children(source_root, target_root)?;

        let mut queue = VecDeque::new();
        self.enqueue_children(&mut queue, target_root);

        while let Some(x) = queue.pop_front() {
            self.enqueue_children(&mut queue, x);

            let y = self.target.parent(x).ok_or(DiffError::NoParent { node: x })?;
            let z = self
                .matching
                .get_a(y)
                .ok_or(DiffError::MissingPartner { node: y })?;
            trace!(
                x = usize::from(x),
                y = usize::from(y),
                z = usize::from(z),
                "visit"
            );

            let w = match self.matching.get_a(x) {
                None => self.insert(x, z)?,
                Some(w) => {
                    self.move_if_reparented(x, w, z)?;
                    w
                }
            };

            self.align_children(w, x)?;
        }
        Ok(())
    }

    fn position_of(&self, x: NodeId) -> Result<Placement, DiffError> {
        find_position(self.target, x, &self.marks, self.matching, self.ignore)
    }

    fn place(
        &mut self,
        parent: NodeId,
        node: NodeId,
        placement: Placement,
    ) -> Result<(), DiffError> {
        match placement {
            Placement::First => self.source.prepend_child(parent, node),
            Placement::After(anchor) => self.source.insert_after(anchor, node),
        }
    }

    /// Copy unmatched target node `x` under `z` and pair the copy with it.
    fn insert(&mut self, x: NodeId, z: NodeId) -> Result<NodeId, DiffError> {
        let placement = self.position_of(x)?;
        let w = self.source.import_shallow(self.target, x);
        self.place(z, w, placement)?;
        self.marks.source.set_in_order(w);
        self.marks.target.set_in_order(x);
        self.matching.add(w, x);

        let numbers = ChildNumber::plain(self.source, w)?;
        self.delta.insert(self.source, w, z, numbers.xpath, numbers.xpath_char_pos);
        Ok(w)
    }

    /// Relocate `w` under `z` unless it already sits there.
    fn move_if_reparented(&mut self, x: NodeId, w: NodeId, z: NodeId) -> Result<(), DiffError> {
        let v = self.source.parent(w).ok_or(DiffError::NoParent { node: w })?;
        if v == self.source.root || v == z {
            return Ok(());
        }
        self.relocate(x, w, z)
    }

    /// Move source node `w` under `parent` to the slot matching target node
    /// `x`, and record the move.
    fn relocate(&mut self, x: NodeId, w: NodeId, parent: NodeId) -> Result<(), DiffError> {
        let placement = self.position_of(x)?;
        let old_path = xpath(self.source, w, self.delta.header().path_style);
        let old_char_pos = ChildNumber::plain(self.source, w)?.xpath_char_pos;

        self.place(parent, w, placement)?;
        self.marks.source.set_in_order(w);
        self.marks.target.set_in_order(x);

        let numbers = ChildNumber::plain(self.source, w)?;
        self.delta.move_node(
            self.source,
            w,
            old_path,
            old_char_pos,
            parent,
            numbers.xpath,
            numbers.xpath_char_pos,
        )
    }

    fn counted_children(&self, doc: &Document, id: NodeId) -> SmallVec<[NodeId; 16]> {
        doc.children(id)
            .filter(|&c| !self.ignore.is_ignored(doc, c))
            .collect()
    }

    /// Put the children of `w` in the order of the children of its partner `x`.
    fn align_children(&mut self, w: NodeId, x: NodeId) -> Result<(), DiffError> {
        let w_children = self.counted_children(self.source, w);
        let x_children = self.counted_children(self.target, x);

        for &c in &w_children {
            self.marks.source.set_out_of_order(c);
        }
        for &c in &x_children {
            self.marks.target.set_out_of_order(c);
        }
        if w_children.is_empty() || x_children.is_empty() {
            return Ok(());
        }

        let seq_w: SmallVec<[NodeId; 16]> = w_children
            .iter()
            .copied()
            .filter(|&c| {
                self.matching
                    .get_b(c)
                    .is_some_and(|p| self.target.parent(p) == Some(x))
            })
            .collect();
        let seq_x: SmallVec<[NodeId; 16]> = x_children
            .iter()
            .copied()
            .filter(|&c| {
                self.matching
                    .get_a(c)
                    .is_some_and(|p| self.source.parent(p) == Some(w))
            })
            .collect();

        let common = lcs(&seq_w, &seq_x, |&a, &b| self.matching.get_b(a) == Some(b));
        trace!(
            w = usize::from(w),
            x = usize::from(x),
            common = common.len(),
            candidates = seq_x.len(),
            "align_children"
        );
        for (i, j) in common {
            self.marks.source.set_in_order(seq_w[i]);
            self.marks.target.set_in_order(seq_x[j]);
        }

        for &c in &x_children {
            if self.marks.target.is_in_order(c) {
                continue;
            }
            if let Some(a) = self.matching.get_a(c) {
                self.relocate(c, a, w)?;
            }
        }
        Ok(())
    }

    /// Remove every source node left without a partner, in post-order with
    /// children visited last to first.
    fn delete_unmatched(&mut self) -> Result<(), DiffError> {
        let root = self
            .source
            .document_element()
            .ok_or(DiffError::NoDocumentElement)?;

        let mut stack = vec![(root, false)];
        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                if !self.matching.contains_a(node) {
                    self.delta.delete(self.source, node)?;
                    self.source.remove_subtree(node);
                }
                continue;
            }
            stack.push((node, true));
            for child in self.source.children(node) {
                if !self.ignore.is_ignored(self.source, child) {
                    stack.push((child, false));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::DeltaOp;
    use crate::dom::{ElementData, NodeKind};
    use crate::matching::compute_matching;
    use facet_testhelpers::test;

    fn run(source: &mut Document, target: &mut Document) -> Delta {
        let config = DiffConfig::default();
        let mut matching = compute_matching(source, target, &config);
        generate_edit_script(source, target, &mut matching, &config).unwrap()
    }

    fn assert_isomorphic(source: &Document, target: &Document) {
        assert!(
            source.subtree_eq(source.root, target, target.root),
            "source and target differ after the edit script:\n{:#?}\nvs\n{:#?}",
            source.arena,
            target.arena
        );
    }

    fn count(delta: &Delta, pred: impl Fn(&DeltaOp) -> bool) -> usize {
        delta.ops().iter().filter(|op| pred(op)).count()
    }

    fn build(shape: &[&str]) -> Document {
        // one level: "e:name" elements and "t:value" text nodes under <r>
        let mut doc = Document::new();
        let r = doc.append(doc.root, NodeKind::element("r"));
        for item in shape {
            let (kind, value) = item.split_once(':').unwrap();
            match kind {
                "e" => doc.append(r, NodeKind::element(value)),
                "t" => doc.append(r, NodeKind::text(value)),
                _ => unreachable!(),
            };
        }
        doc
    }

    #[test]
    fn test_no_changes() {
        let mut source = build(&["e:a", "t:x", "e:b"]);
        let mut target = build(&["e:a", "t:x", "e:b"]);
        let delta = run(&mut source, &mut target);
        assert!(delta.is_empty(), "identical trees should have no edits: {delta:?}");
        assert!(!delta.dummy_root());
    }

    #[test]
    fn test_insert() {
        let mut source = build(&["e:a"]);
        let mut target = build(&["e:a", "e:b"]);
        let delta = run(&mut source, &mut target);
        assert_eq!(
            delta.ops(),
            &[DeltaOp::Insert {
                parent: "/node()[1]".into(),
                node_type: crate::dom::NodeType::Element,
                child_no: Some(2),
                name: Some("b".into()),
                char_pos: None,
                value: None,
            }]
        );
        assert_isomorphic(&source, &target);
    }

    #[test]
    fn test_delete() {
        let mut source = build(&["e:a", "t:gone", "e:b"]);
        let mut target = build(&["e:a", "e:b"]);
        let delta = run(&mut source, &mut target);
        assert_eq!(
            delta.ops(),
            &[DeltaOp::Delete {
                node: "/node()[1]/node()[2]".into(),
                char_pos: Some(1),
                length: Some(4),
            }]
        );
        assert_isomorphic(&source, &target);
    }

    #[test]
    fn test_swap_two_siblings() {
        let mut source = build(&["e:b", "e:c"]);
        let mut target = build(&["e:c", "e:b"]);
        let delta = run(&mut source, &mut target);
        assert_eq!(
            delta.ops(),
            &[DeltaOp::Move {
                node: "/node()[1]/node()[1]".into(),
                old_char_pos: 1,
                parent: "/node()[1]".into(),
                child_no: 2,
                new_char_pos: 1,
                length: None,
            }]
        );
        assert_isomorphic(&source, &target);
    }

    #[test]
    fn test_reorder_is_moves_only() {
        let mut source = build(&["e:b", "t:c", "e:z", "e:d", "t:e", "e:f"]);
        let mut target = build(&["e:f", "t:e", "e:d", "e:z", "t:c", "e:b"]);
        let delta = run(&mut source, &mut target);
        assert!(!delta.is_empty());
        assert_eq!(
            count(&delta, |op| !matches!(op, DeltaOp::Move { .. })),
            0,
            "{delta:?}"
        );
        assert_isomorphic(&source, &target);
    }

    #[test]
    fn test_move_across_parents() {
        // <r><p><x/></p><q/></r> -> <r><p/><q><x/></q></r>
        let mut source = Document::new();
        let r = source.append(source.root, NodeKind::element("r"));
        let p = source.append(r, NodeKind::element("p"));
        source.append(p, NodeKind::element("x"));
        source.append(r, NodeKind::element("q"));

        let mut target = Document::new();
        let r = target.append(target.root, NodeKind::element("r"));
        target.append(r, NodeKind::element("p"));
        let q = target.append(r, NodeKind::element("q"));
        target.append(q, NodeKind::element("x"));

        let delta = run(&mut source, &mut target);
        assert_eq!(
            delta.ops(),
            &[DeltaOp::Move {
                node: "/node()[1]/node()[1]/node()[1]".into(),
                old_char_pos: 1,
                parent: "/node()[1]/node()[2]".into(),
                child_no: 1,
                new_char_pos: 1,
                length: None,
            }]
        );
        assert_isomorphic(&source, &target);
    }

    #[test]
    fn test_dummy_root_for_disjoint_documents() {
        // <a><b><c/></b></a> vs <x><y><z/></y></x>
        let mut source = Document::new();
        let a = source.append(source.root, NodeKind::element("a"));
        let b = source.append(a, NodeKind::element("b"));
        source.append(b, NodeKind::element("c"));

        let mut target = Document::new();
        let x = target.append(target.root, NodeKind::element("x"));
        let y = target.append(x, NodeKind::element("y"));
        target.append(y, NodeKind::element("z"));

        let config = DiffConfig::default();
        let mut matching = compute_matching(&source, &target, &config);
        assert_eq!(matching.len(), 1);

        let delta = generate_edit_script(&mut source, &mut target, &mut matching, &config).unwrap();
        assert!(delta.dummy_root());
        assert_isomorphic(&source, &target);

        // three inserts, then the old document element goes last
        assert_eq!(count(&delta, |op| matches!(op, DeltaOp::Insert { .. })), 3);
        assert_eq!(
            delta.ops().last(),
            Some(&DeltaOp::Delete {
                node: "/node()[1]/node()[2]".into(),
                char_pos: None,
                length: None,
            })
        );
    }

    #[test]
    fn test_dummy_pair_counts_two_nodes() {
        // <a><b><c/></b></a> vs <x><y><z/></y></x>
        let mut source = Document::new();
        let a = source.append(source.root, NodeKind::element("a"));
        let b = source.append(a, NodeKind::element("b"));
        source.append(b, NodeKind::element("c"));
        let mut target = Document::new();
        let x = target.append(target.root, NodeKind::element("x"));
        let y = target.append(x, NodeKind::element("y"));
        target.append(y, NodeKind::element("z"));

        let config = DiffConfig::default();
        let mut matching = compute_matching(&source, &target, &config);
        assert_eq!(matching.node_count(), 2);

        let mut script = EditScript {
            source: &mut source,
            target: &mut target,
            matching: &mut matching,
            ignore: &config.ignore,
            marks: Annotations::default(),
            delta: Delta::new(config.delta.clone()),
        };
        script.match_roots().unwrap();
        assert!(script.delta.dummy_root());
        assert_eq!(script.matching.node_count(), 4);

        let wrapper = source.document_element().unwrap();
        assert_eq!(source.name(wrapper), Some(DUMMY_ROOT));
        assert_eq!(matching.get_b(wrapper), target.document_element());
    }

    #[test]
    fn test_children_deleted_before_parent() {
        // <r><p><i/><j/></p></r> -> <r/>
        let mut source = Document::new();
        let r = source.append(source.root, NodeKind::element("r"));
        let p = source.append(r, NodeKind::element("p"));
        source.append(p, NodeKind::element("i"));
        source.append(p, NodeKind::element("j"));

        let mut target = Document::new();
        target.append(target.root, NodeKind::element("r"));

        let delta = run(&mut source, &mut target);
        let deleted: Vec<_> = delta
            .ops()
            .iter()
            .map(|op| match op {
                DeltaOp::Delete { node, .. } => node.as_str(),
                other => panic!("unexpected op {other:?}"),
            })
            .collect();
        assert_eq!(
            deleted,
            vec![
                "/node()[1]/node()[1]/node()[2]",
                "/node()[1]/node()[1]/node()[1]",
                "/node()[1]/node()[1]",
            ]
        );
        assert_isomorphic(&source, &target);
    }

    #[test]
    fn test_changed_attribute_is_delete_and_insert() {
        let mut source = Document::new();
        let r = source.append(source.root, NodeKind::element("r"));
        source.append(r, NodeKind::element("b"));

        let mut target = Document::new();
        let r = target.append(target.root, NodeKind::element("r"));
        target.append(
            r,
            NodeKind::Element(ElementData::new("b").with_attr("a", "1")),
        );

        let delta = run(&mut source, &mut target);
        assert_eq!(count(&delta, |op| matches!(op, DeltaOp::Insert { .. })), 2);
        assert_eq!(count(&delta, |op| matches!(op, DeltaOp::Delete { .. })), 1);
        assert_isomorphic(&source, &target);
    }

    #[test]
    fn test_ignored_comment_is_left_alone() {
        let mut source = Document::new();
        let r = source.append(source.root, NodeKind::element("r"));
        source.append(r, NodeKind::comment("old"));
        source.append(r, NodeKind::element("a"));

        let mut target = Document::new();
        let r = target.append(target.root, NodeKind::element("r"));
        target.append(r, NodeKind::element("a"));
        target.append(r, NodeKind::comment("new"));

        let mut config = DiffConfig::default();
        config.ignore.comments = true;
        let mut matching = compute_matching(&source, &target, &config);
        let delta = generate_edit_script(&mut source, &mut target, &mut matching, &config).unwrap();
        assert!(delta.is_empty(), "{delta:?}");
        let kept = source.document_element().unwrap();
        assert_eq!(source.child_count(kept), 2);
    }

    #[test]
    fn test_missing_document_element() {
        let mut source = Document::new();
        let mut target = Document::new();
        target.append(target.root, NodeKind::element("x"));

        let mut matching = Matching::new();
        let err = generate_edit_script(
            &mut source,
            &mut target,
            &mut matching,
            &DiffConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DiffError::NoDocumentElement));
    }
}
