use indextree::NodeId;

/// Errors that abort an edit-script run.
///
/// Every variant is terminal: the run returns no partial delta.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// A document has no element under its document node.
    #[error("document has no document element")]
    NoDocumentElement,

    /// A partner that the algorithm guarantees by construction is absent.
    #[error("node {node:?} has no partner")]
    MissingPartner {
        /// The node whose partner was expected.
        node: NodeId,
    },

    /// A move targeted a character position before the start of its run.
    #[error("invalid character position {char_pos} (must be at least 1)")]
    InvalidCharPosition {
        /// The rejected position.
        char_pos: usize,
    },

    /// A position query was made on a node that is not attached to a parent.
    #[error("node {node:?} has no parent")]
    NoParent {
        /// The detached node.
        node: NodeId,
    },

    /// A relocation would have corrupted the tree.
    #[error("tree operation failed: {0}")]
    Tree(#[from] indextree::NodeError),
}
