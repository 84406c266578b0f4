//! # fmes
//!
//! Fast Match / Edit Script tree diffing for ordered, labeled document trees.
//!
//! ## Algorithm Overview
//!
//! fmes implements the change-detection algorithm of Chawathe, Rajaraman,
//! Garcia-Molina and Widom (1996):
//!
//! 1. **Matching**: pair up nodes of the two trees (identical leaves first,
//!    then inner nodes by shared children, then same-label children of
//!    matched pairs)
//! 2. **Edit script generation**: walk the target breadth-first, inserting
//!    and moving nodes in the source until both trees agree, aligning each
//!    child list with a longest common subsequence
//! 3. **Deletion**: remove whatever in the source never found a partner
//!
//! The result is a [`Delta`]: insert, delete and move operations addressed by
//! XPath, in the order an applier must replay them.
//!
//! ## Usage
//!
//! ```
//! use fmes::{DiffConfig, Document, NodeKind, diff_documents};
//!
//! let mut old = Document::new();
//! let root = old.append(old.root, NodeKind::element("doc"));
//! old.append(root, NodeKind::text("hello"));
//!
//! let mut new = Document::new();
//! let root = new.append(new.root, NodeKind::element("doc"));
//! new.append(root, NodeKind::text("hello"));
//! new.append(root, NodeKind::element("extra"));
//!
//! let delta = diff_documents(&mut old, &mut new, &DiffConfig::default()).unwrap();
//! assert_eq!(delta.len(), 1);
//! ```

pub use indextree;

mod tracing_macros;
pub(crate) use tracing_macros::{debug, trace};

pub mod annotations;
pub mod delta;
pub mod dom;
mod edit_script;
mod error;
pub mod lcs;
pub mod matching;
pub mod position;

pub use annotations::{Annotations, IgnoreRules, OrderMarks};
pub use delta::{ContextConfig, Delta, DeltaConfig, DeltaOp};
pub use dom::{Document, ElementData, Label, NodeData, NodeKind, NodeType, PiData};
pub use edit_script::{DUMMY_ROOT, generate_edit_script};
pub use error::DiffError;
pub use matching::{Matching, MatchingConfig, compute_matching};
pub use position::{ChildNumber, PathStyle, Placement, find_position, xpath};

/// Everything that steers one diff run.
#[derive(Debug, Clone, Default)]
pub struct DiffConfig {
    pub matching: MatchingConfig,
    pub delta: DeltaConfig,
    pub ignore: IgnoreRules,
}

/// Compute the delta that turns `source` into `target`.
///
/// This is the main entry point. It:
/// 1. Computes a matching between nodes
/// 2. Generates the edit script, mutating `source` into a copy of `target`
///
/// On success `source` is structurally identical to `target` (ignored nodes
/// aside). Both documents carry a `DUMMY` wrapper around their document
/// elements when [`Delta::dummy_root`] is set.
pub fn diff_documents(
    source: &mut Document,
    target: &mut Document,
    config: &DiffConfig,
) -> Result<Delta, DiffError> {
    diff_documents_with_matching(source, target, config).map(|(delta, _)| delta)
}

/// Like [`diff_documents`], also returning the final partner map.
pub fn diff_documents_with_matching(
    source: &mut Document,
    target: &mut Document,
    config: &DiffConfig,
) -> Result<(Delta, Matching), DiffError> {
    let mut matching = compute_matching(source, target, config);
    debug!(matched = matching.len(), "matching done");
    let delta = generate_edit_script(source, target, &mut matching, config)?;
    Ok((delta, matching))
}
