//! Inclusion proofs

use serde::{Deserialize, Serialize};

use crate::tree::hash_pair;

/// Which side of the running digest a sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// One sibling digest on the path from a leaf to the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub digest: String,
    pub side: Side,
}

/// Sibling path proving a leaf's membership in a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// Digest of the proven leaf
    pub leaf: String,

    /// Position of the leaf in the tree's leaf sequence
    pub leaf_index: usize,

    /// Siblings ordered from the leaf level upward
    pub siblings: Vec<ProofStep>,
}

impl InclusionProof {
    /// Recombine the leaf with its siblings and compare against `root`.
    pub fn verify(&self, root: &str) -> bool {
        verify_proof(&self.leaf, &self.siblings, root)
    }

    /// Sibling digests without side information.
    pub fn digests(&self) -> Vec<&str> {
        self.siblings.iter().map(|s| s.digest.as_str()).collect()
    }
}

/// Recompute a root from a leaf digest and its sibling path.
pub fn verify_proof(leaf: &str, siblings: &[ProofStep], root: &str) -> bool {
    if siblings.is_empty() {
        return false;
    }

    let computed = siblings
        .iter()
        .fold(leaf.to_string(), |acc, step| match step.side {
            Side::Left => hash_pair(&step.digest, &acc),
            Side::Right => hash_pair(&acc, &step.digest),
        });

    computed == root
}
