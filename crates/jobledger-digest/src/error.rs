//! Error types for digest tree operations.

/// Errors raised while querying a [`DigestTree`](crate::DigestTree).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigestError {
    /// The requested leaf digest is not part of the tree.
    #[error("leaf digest not found in tree: {0}")]
    LeafNotFound(String),
}
