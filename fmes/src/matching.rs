//! FastMatch node matching.
//!
//! Builds the partner map in three passes after seeding the roots:
//! 1. Leaves: identical leaves, bottom-up, preferring the partner of the parent
//!    and then the leaf whose ancestors look the same
//! 2. Inner nodes: same label and attributes with enough children in common
//! 3. Propagation: same-label element children of matched pairs, top-down

use std::cmp::Reverse;
use std::collections::VecDeque;

use indextree::NodeId;
use rapidhash::RapidHashMap as HashMap;
use smallvec::SmallVec;

use crate::annotations::IgnoreRules;
use crate::dom::{Document, ElementData, Label, NodeKind};
use crate::{DiffConfig, debug, trace};

/// A bidirectional mapping between nodes in two trees.
/// Uses Vec for O(1) lookups indexed by NodeId.
///
/// Tree A is the source, tree B the target. Both directions are always
/// written together, so `get_b(a) == Some(b)` exactly when `get_a(b) == Some(a)`.
#[derive(Debug)]
pub struct Matching {
    /// Map from tree A node to tree B node (indexed by A's NodeId)
    a_to_b: Vec<Option<NodeId>>,
    /// Map from tree B node to tree A node (indexed by B's NodeId)
    b_to_a: Vec<Option<NodeId>>,
    /// Number of pairs
    len: usize,
}

impl Default for Matching {
    fn default() -> Self {
        Self::new()
    }
}

impl Matching {
    /// Create a new empty matching.
    pub fn new() -> Self {
        Self {
            a_to_b: Vec::new(),
            b_to_a: Vec::new(),
            len: 0,
        }
    }

    /// Create a new matching with preallocated capacity.
    pub fn with_capacity(max_a: usize, max_b: usize) -> Self {
        Self {
            a_to_b: vec![None; max_a],
            b_to_a: vec![None; max_b],
            len: 0,
        }
    }

    /// Add a match between two nodes.
    ///
    /// A node that already has a partner loses it first, and that partner is
    /// left unmatched.
    pub fn add(&mut self, a: NodeId, b: NodeId) {
        if self.get_b(a) == Some(b) {
            return;
        }
        if let Some(old_b) = self.get_b(a) {
            self.b_to_a[usize::from(old_b)] = None;
            self.len -= 1;
        }
        if let Some(old_a) = self.get_a(b) {
            self.a_to_b[usize::from(old_a)] = None;
            self.len -= 1;
        }

        let a_idx = usize::from(a);
        let b_idx = usize::from(b);
        if a_idx >= self.a_to_b.len() {
            self.a_to_b.resize(a_idx + 1, None);
        }
        if b_idx >= self.b_to_a.len() {
            self.b_to_a.resize(b_idx + 1, None);
        }

        self.a_to_b[a_idx] = Some(b);
        self.b_to_a[b_idx] = Some(a);
        self.len += 1;
    }

    /// Check if a node from tree A is matched.
    #[inline(always)]
    pub fn contains_a(&self, a: NodeId) -> bool {
        let idx = usize::from(a);
        self.a_to_b.get(idx).is_some_and(|opt| opt.is_some())
    }

    /// Check if a node from tree B is matched.
    #[inline(always)]
    pub fn contains_b(&self, b: NodeId) -> bool {
        let idx = usize::from(b);
        self.b_to_a.get(idx).is_some_and(|opt| opt.is_some())
    }

    /// Get the match for a node from tree A.
    #[inline(always)]
    pub fn get_b(&self, a: NodeId) -> Option<NodeId> {
        let idx = usize::from(a);
        self.a_to_b.get(idx).copied().flatten()
    }

    /// Get the match for a node from tree B.
    #[inline(always)]
    pub fn get_a(&self, b: NodeId) -> Option<NodeId> {
        let idx = usize::from(b);
        self.b_to_a.get(idx).copied().flatten()
    }

    /// Get the number of matched pairs.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of matched nodes, counting both trees.
    pub fn node_count(&self) -> usize {
        self.len * 2
    }

    /// Check if there are no matches.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Configuration for the matching algorithm.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Minimum share of children (relative to the smaller child list) that two
    /// inner nodes must have matched to each other before they are paired.
    pub similarity_threshold: f64,

    /// Pair same-label element children of matched pairs top-down after the
    /// bottom-up passes.
    pub propagate: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            propagate: true,
        }
    }
}

/// Compute the matching between two documents.
///
/// Never fails; unmatched nodes are a normal outcome. The map is empty only
/// when one of the documents has no document element.
pub fn compute_matching(source: &Document, target: &Document, config: &DiffConfig) -> Matching {
    debug!(
        nodes_a = source.arena.len(),
        nodes_b = target.arena.len(),
        "compute_matching start"
    );
    let mut matcher = Matcher::new(source, target, &config.matching, &config.ignore);

    if !matcher.seed_roots() {
        debug!("compute_matching: missing document element, nothing matched");
        return matcher.matching;
    }

    matcher.match_leaves();
    debug!(matched = matcher.matching.len(), "after leaf pass");

    matcher.match_inner_nodes();
    debug!(matched = matcher.matching.len(), "after inner pass");

    if config.matching.propagate {
        matcher.propagate();
        debug!(matched = matcher.matching.len(), "after propagation");
    }

    matcher.matching
}

/// What two nodes must share to be paired: kind, label, and content (for
/// leaves) or attribute set (for elements).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Signature<'a> {
    Element {
        name: &'a str,
        attrs: SmallVec<[(&'a str, &'a str); 4]>,
    },
    Text(&'a str),
    Comment(&'a str),
    ProcessingInstruction {
        target: &'a str,
        data: &'a str,
    },
}

fn element_signature(elem: &ElementData) -> Signature<'_> {
    let mut attrs: SmallVec<[(&str, &str); 4]> = elem
        .attrs
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    attrs.sort_unstable();
    Signature::Element {
        name: &elem.name,
        attrs,
    }
}

fn signature(doc: &Document, id: NodeId) -> Option<Signature<'_>> {
    Some(match doc.kind(id) {
        NodeKind::Document => return None,
        NodeKind::Element(elem) => element_signature(elem),
        NodeKind::Text(text) => Signature::Text(text),
        NodeKind::Comment(text) => Signature::Comment(text),
        NodeKind::ProcessingInstruction(pi) => Signature::ProcessingInstruction {
            target: &pi.target,
            data: &pi.data,
        },
    })
}

/// Signature of the parent, `None` under the document node.
fn parent_signature(doc: &Document, id: NodeId) -> Option<Signature<'_>> {
    doc.parent(id).and_then(|parent| signature(doc, parent))
}

/// Per-node positions, indexed by NodeId.
struct NodeOrder {
    /// Pre-order position.
    preorder: Vec<usize>,
    /// Index among preceding siblings with the same kind and label.
    ordinal: Vec<usize>,
}

impl NodeOrder {
    fn new(doc: &Document) -> Self {
        let size = doc.arena.len() + 1;
        let mut preorder = vec![usize::MAX; size];
        let mut ordinal = vec![0; size];
        for (pos, id) in doc.preorder().enumerate() {
            if let Some(slot) = preorder.get_mut(usize::from(id)) {
                *slot = pos;
            }

            let mut seen: HashMap<Label<'_>, usize> = HashMap::default();
            for child in doc.children(id) {
                let count = seen.entry(doc.label(child)).or_default();
                if let Some(slot) = ordinal.get_mut(usize::from(child)) {
                    *slot = *count;
                }
                *count += 1;
            }
        }
        Self { preorder, ordinal }
    }

    fn position(&self, id: NodeId) -> usize {
        self.preorder.get(usize::from(id)).copied().unwrap_or(usize::MAX)
    }

    fn ordinal(&self, id: NodeId) -> usize {
        self.ordinal.get(usize::from(id)).copied().unwrap_or(0)
    }
}

/// Unmatched target leaves, with O(1) removal.
#[derive(Default)]
struct LeafPool {
    nodes: Vec<NodeId>,
    slots: HashMap<NodeId, usize>,
}

impl LeafPool {
    fn push(&mut self, id: NodeId) {
        self.slots.insert(id, self.nodes.len());
        self.nodes.push(id);
    }

    fn remove(&mut self, id: NodeId) {
        let Some(slot) = self.slots.remove(&id) else {
            return;
        };
        self.nodes.swap_remove(slot);
        if let Some(&moved) = self.nodes.get(slot) {
            self.slots.insert(moved, slot);
        }
    }
}

/// Target leaves by signature, by signature plus parent signature, and by
/// signature plus parent node.
#[derive(Default)]
struct LeafPools<'a> {
    by_signature: HashMap<Signature<'a>, LeafPool>,
    by_parent: HashMap<(Signature<'a>, Option<Signature<'a>>), LeafPool>,
    by_parent_node: HashMap<(Signature<'a>, Option<NodeId>), LeafPool>,
}

impl<'a> LeafPools<'a> {
    fn insert(&mut self, doc: &'a Document, id: NodeId, sig: Signature<'a>) {
        self.by_parent
            .entry((sig.clone(), parent_signature(doc, id)))
            .or_default()
            .push(id);
        self.by_parent_node
            .entry((sig.clone(), doc.parent(id)))
            .or_default()
            .push(id);
        self.by_signature.entry(sig).or_default().push(id);
    }

    fn remove(&mut self, doc: &'a Document, id: NodeId, sig: &Signature<'a>) {
        if let Some(pool) = self.by_signature.get_mut(sig) {
            pool.remove(id);
        }
        if let Some(pool) = self
            .by_parent
            .get_mut(&(sig.clone(), parent_signature(doc, id)))
        {
            pool.remove(id);
        }
        if let Some(pool) = self.by_parent_node.get_mut(&(sig.clone(), doc.parent(id))) {
            pool.remove(id);
        }
    }
}

struct Matcher<'a> {
    source: &'a Document,
    target: &'a Document,
    config: &'a MatchingConfig,
    ignore: &'a IgnoreRules,
    source_order: NodeOrder,
    target_order: NodeOrder,
    matching: Matching,
}

impl<'a> Matcher<'a> {
    fn new(
        source: &'a Document,
        target: &'a Document,
        config: &'a MatchingConfig,
        ignore: &'a IgnoreRules,
    ) -> Self {
        Self {
            source,
            target,
            config,
            ignore,
            source_order: NodeOrder::new(source),
            target_order: NodeOrder::new(target),
            matching: Matching::with_capacity(source.arena.len() + 1, target.arena.len() + 1),
        }
    }

    /// Pair the document nodes, and the document elements when compatible.
    /// Returns false when either document has no document element.
    fn seed_roots(&mut self) -> bool {
        let (Some(a), Some(b)) = (
            self.source.document_element(),
            self.target.document_element(),
        ) else {
            return false;
        };
        self.matching.add(self.source.root, self.target.root);
        if signature(self.source, a) == signature(self.target, b) {
            trace!(a = usize::from(a), b = usize::from(b), "seed: document elements");
            self.matching.add(a, b);
        }
        true
    }

    fn distance(&self, a: NodeId, b: NodeId) -> usize {
        self.source_order
            .position(a)
            .abs_diff(self.target_order.position(b))
    }

    /// The candidate nearest to `a` in document order; earliest wins ties.
    fn closest(&self, a: NodeId, candidates: impl Iterator<Item = NodeId>) -> Option<NodeId> {
        candidates.min_by_key(|&b| (self.distance(a, b), self.target_order.position(b)))
    }

    /// How many ancestors of `a` and `b`, counted from the parents up, have
    /// equal signatures.
    fn ancestor_agreement(&self, a: NodeId, b: NodeId) -> usize {
        a.ancestors(&self.source.arena)
            .skip(1)
            .zip(b.ancestors(&self.target.arena).skip(1))
            .take_while(|&(x, y)| {
                let sig = signature(self.source, x);
                sig.is_some() && sig == signature(self.target, y)
            })
            .count()
    }

    fn is_candidate_leaf_a(&self, a: NodeId) -> bool {
        a != self.source.root
            && self.source.is_leaf(a)
            && !self.matching.contains_a(a)
            && !self.ignore.is_ignored(self.source, a)
    }

    /// Pass 1: leaves, bottom-up.
    fn match_leaves(&mut self) {
        let mut pools = LeafPools::default();
        for b in self.target.preorder() {
            if b == self.target.root
                || !self.target.is_leaf(b)
                || self.matching.contains_b(b)
                || self.ignore.is_ignored(self.target, b)
            {
                continue;
            }
            if let Some(sig) = signature(self.target, b) {
                pools.insert(self.target, b, sig);
            }
        }

        let leaves: Vec<NodeId> = self
            .source
            .post_order()
            .filter(|&a| self.is_candidate_leaf_a(a))
            .collect();

        for a in leaves {
            let Some(sig) = signature(self.source, a) else {
                continue;
            };
            if let Some(b) = self.pick_leaf(a, &sig, &pools) {
                pools.remove(self.target, b, &sig);
                trace!(a = usize::from(a), b = usize::from(b), "leaf match");
                self.matching.add(a, b);
            }
        }
    }

    fn pick_leaf(&self, a: NodeId, sig: &Signature<'a>, pools: &LeafPools<'a>) -> Option<NodeId> {
        let pool = pools.by_signature.get(sig)?;
        if pool.nodes.is_empty() {
            return None;
        }

        // 1. under the partner of our parent
        if let Some(parent) = self.source.parent(a)
            && let Some(partner) = self.matching.get_b(parent)
            && let Some(under_partner) = pools.by_parent_node.get(&(sig.clone(), Some(partner)))
            && let Some(b) = self.closest(a, under_partner.nodes.iter().copied())
        {
            return Some(b);
        }

        // 2. the same ancestry, then the same ordinal among same-label
        // siblings, then the nearest in document order
        let same_parent = pools
            .by_parent
            .get(&(sig.clone(), parent_signature(self.source, a)))
            .filter(|pool| !pool.nodes.is_empty())
            .unwrap_or(pool);
        let ordinal = self.source_order.ordinal(a);
        same_parent.nodes.iter().copied().min_by_key(|&b| {
            (
                Reverse(self.ancestor_agreement(a, b)),
                self.target_order.ordinal(b) != ordinal,
                self.distance(a, b),
                self.target_order.position(b),
            )
        })
    }

    fn counted_children(&self, doc: &Document, id: NodeId) -> usize {
        doc.children(id)
            .filter(|&c| !self.ignore.is_ignored(doc, c))
            .count()
    }

    /// Share of children matched into each other, relative to the smaller list.
    fn child_similarity(&self, a: NodeId, b: NodeId) -> f64 {
        let smaller = self
            .counted_children(self.source, a)
            .min(self.counted_children(self.target, b));
        if smaller == 0 {
            return 0.0;
        }
        let common = self
            .source
            .children(a)
            .filter(|&c| {
                self.matching
                    .get_b(c)
                    .is_some_and(|p| self.target.parent(p) == Some(b))
            })
            .count();
        common as f64 / smaller as f64
    }

    /// Unmatched target elements with `sig` that hold a partner of one of
    /// the children of `a`.
    fn inner_candidates(&self, a: NodeId, sig: &Signature<'a>) -> SmallVec<[NodeId; 8]> {
        let mut candidates = SmallVec::new();
        for child in self.source.children(a) {
            let Some(b) = self
                .matching
                .get_b(child)
                .and_then(|partner| self.target.parent(partner))
            else {
                continue;
            };
            if candidates.contains(&b) || self.matching.contains_b(b) {
                continue;
            }
            if let NodeKind::Element(elem) = self.target.kind(b)
                && element_signature(elem) == *sig
            {
                candidates.push(b);
            }
        }
        candidates
    }

    /// Unmatched target elements with children, by signature. Only needed
    /// when a zero score qualifies.
    fn inner_pools(&self) -> HashMap<Signature<'a>, Vec<NodeId>> {
        let mut pools: HashMap<Signature<'a>, Vec<NodeId>> = HashMap::default();
        for b in self.target.preorder() {
            if let NodeKind::Element(elem) = self.target.kind(b)
                && !self.target.is_leaf(b)
                && !self.matching.contains_b(b)
            {
                pools.entry(element_signature(elem)).or_default().push(b);
            }
        }
        pools
    }

    /// Pass 2: inner elements, bottom-up.
    fn match_inner_nodes(&mut self) {
        let zero_pools = (self.config.similarity_threshold <= 0.0).then(|| self.inner_pools());

        let inner: Vec<NodeId> = self
            .source
            .post_order()
            .filter(|&a| {
                matches!(self.source.kind(a), NodeKind::Element(_))
                    && !self.source.is_leaf(a)
                    && !self.matching.contains_a(a)
            })
            .collect();

        for a in inner {
            let NodeKind::Element(elem) = self.source.kind(a) else {
                continue;
            };
            let sig = element_signature(elem);
            let mut candidates = self.inner_candidates(a, &sig);
            if let Some(pool) = zero_pools.as_ref().and_then(|pools| pools.get(&sig)) {
                for &b in pool {
                    if !candidates.contains(&b) {
                        candidates.push(b);
                    }
                }
            }

            let mut best: Option<(f64, usize, NodeId)> = None;
            for b in candidates {
                if self.matching.contains_b(b) {
                    continue;
                }
                let score = self.child_similarity(a, b);
                if score < self.config.similarity_threshold {
                    continue;
                }
                let distance = self.distance(a, b);
                let better = match best {
                    None => true,
                    Some((best_score, best_distance, best_b)) => {
                        score > best_score
                            || (score == best_score
                                && (distance, self.target_order.position(b))
                                    < (best_distance, self.target_order.position(best_b)))
                    }
                };
                if better {
                    best = Some((score, distance, b));
                }
            }

            if let Some((_score, _, b)) = best {
                trace!(a = usize::from(a), b = usize::from(b), score = _score, "inner match");
                self.matching.add(a, b);
            }
        }
    }

    /// Pass 3: pair same-label element children of matched pairs, top-down.
    fn propagate(&mut self) {
        let mut order = Vec::new();
        let mut queue = VecDeque::from([self.source.root]);
        while let Some(id) = queue.pop_front() {
            order.push(id);
            queue.extend(self.source.children(id));
        }

        for a in order {
            if let Some(b) = self.matching.get_b(a) {
                self.propagate_children(a, b);
            }
        }
    }

    fn propagate_children(&mut self, a: NodeId, b: NodeId) {
        let mut waiting: HashMap<Signature<'a>, VecDeque<NodeId>> = HashMap::default();
        for cb in self.target.children(b) {
            if let NodeKind::Element(elem) = self.target.kind(cb)
                && !self.matching.contains_b(cb)
            {
                waiting
                    .entry(element_signature(elem))
                    .or_default()
                    .push_back(cb);
            }
        }
        if waiting.is_empty() {
            return;
        }

        let unmatched: SmallVec<[NodeId; 16]> = self
            .source
            .children(a)
            .filter(|&ca| {
                matches!(self.source.kind(ca), NodeKind::Element(_))
                    && !self.matching.contains_a(ca)
            })
            .collect();

        for ca in unmatched {
            let NodeKind::Element(elem) = self.source.kind(ca) else {
                continue;
            };
            if let Some(cb) = waiting
                .get_mut(&element_signature(elem))
                .and_then(VecDeque::pop_front)
            {
                trace!(a = usize::from(ca), b = usize::from(cb), "propagated match");
                self.matching.add(ca, cb);
            }
        }
    }
}
