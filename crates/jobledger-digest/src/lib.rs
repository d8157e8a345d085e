//! Binary digest tree
//!
//! Builds a SHA-256 hash tree over an ordered sequence of opaque leaf values
//! and produces inclusion proofs against its root. The tree knows nothing
//! about jobs; callers decide how leaves are serialized and ordered.

pub mod error;
pub mod proof;
pub mod tree;

pub use error::DigestError;
pub use proof::{verify_proof, InclusionProof, ProofStep, Side};
pub use tree::{hash_leaf, hash_pair, DigestTree, EMPTY_ROOT};
