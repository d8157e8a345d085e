//! Digest tree construction
//!
//! Tree rules:
//! 1. Every leaf value is hashed individually (SHA-256, lowercase hex)
//! 2. A level with an odd number of digests duplicates its last digest once,
//!    at every level, including a lone leaf
//! 3. A parent is `SHA-256(left_hex || right_hex)` with no separator
//! 4. Levels collapse until exactly one digest remains: the root
//!
//! An empty input has the root [`EMPTY_ROOT`].

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::DigestError;
use crate::proof::{InclusionProof, ProofStep, Side};

/// Root of a tree built from no values.
pub const EMPTY_ROOT: &str = "";

/// Hash a single leaf value.
pub fn hash_leaf(value: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_ref());
    hex::encode(hasher.finalize())
}

/// Hash two child digests into their parent digest.
pub fn hash_pair(left: &str, right: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hex::encode(hasher.finalize())
}

/// Duplicate the trailing digest when the level has an odd length.
fn pad_odd(level: &mut Vec<String>) {
    if level.len() % 2 == 1 {
        if let Some(last) = level.last().cloned() {
            level.push(last);
        }
    }
}

/// Collapse an even-length level into its parent level.
fn combine(level: &[String]) -> Vec<String> {
    level
        .chunks_exact(2)
        .map(|pair| hash_pair(&pair[0], &pair[1]))
        .collect()
}

/// A hash tree over an ordered leaf sequence.
///
/// Only the leaf digests and the root are retained; interior levels are
/// recomputed on demand when a proof is requested. A serialized root is
/// ignored on deserialization and recomputed from the leaves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SerializedTree")]
pub struct DigestTree {
    leaves: Vec<String>,
    root: String,
}

#[derive(Deserialize)]
struct SerializedTree {
    leaves: Vec<String>,
}

impl From<SerializedTree> for DigestTree {
    fn from(raw: SerializedTree) -> Self {
        DigestTree::from_leaf_digests(raw.leaves)
    }
}

impl DigestTree {
    /// Build a tree by hashing each value as a leaf, in order.
    pub fn build<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: AsRef<[u8]>,
    {
        let leaves = values.into_iter().map(hash_leaf).collect();
        Self::from_leaf_digests(leaves)
    }

    /// Build a tree from already-hashed leaves.
    pub fn from_leaf_digests(leaves: Vec<String>) -> Self {
        let root = Self::compute_root(&leaves);
        Self { leaves, root }
    }

    fn compute_root(leaves: &[String]) -> String {
        if leaves.is_empty() {
            return EMPTY_ROOT.to_string();
        }

        let mut level = leaves.to_vec();
        loop {
            pad_odd(&mut level);
            level = combine(&level);
            if level.len() == 1 {
                return level.remove(0);
            }
        }
    }

    /// Root digest (hex), or [`EMPTY_ROOT`] for an empty tree.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Leaf digests in build order, before any padding.
    pub fn leaves(&self) -> &[String] {
        &self.leaves
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Whether the given digest is one of this tree's leaves.
    pub fn contains_leaf(&self, leaf_digest: &str) -> bool {
        self.leaves.iter().any(|l| l == leaf_digest)
    }

    /// Produce the sibling path from `leaf_digest` up to the root.
    ///
    /// If the same digest appears more than once, the first occurrence is
    /// proven.
    pub fn proof(&self, leaf_digest: &str) -> Result<InclusionProof, DigestError> {
        let leaf_index = self
            .leaves
            .iter()
            .position(|l| l == leaf_digest)
            .ok_or_else(|| DigestError::LeafNotFound(leaf_digest.to_string()))?;

        let mut index = leaf_index;
        let mut level = self.leaves.clone();
        let mut siblings = Vec::new();

        loop {
            pad_odd(&mut level);

            // Padding guarantees a right neighbour for every even index.
            let step = if index % 2 == 1 {
                ProofStep {
                    digest: level[index - 1].clone(),
                    side: Side::Left,
                }
            } else {
                ProofStep {
                    digest: level[index + 1].clone(),
                    side: Side::Right,
                }
            };
            siblings.push(step);

            index /= 2;
            level = combine(&level);
            if level.len() == 1 {
                break;
            }
        }

        Ok(InclusionProof {
            leaf: leaf_digest.to_string(),
            leaf_index,
            siblings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::verify_proof;

    fn values(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("job-{}", i)).collect()
    }

    #[test]
    fn test_hash_leaf_known_vector() {
        assert_eq!(
            hash_leaf("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_pair_is_concatenation() {
        let left = hash_leaf("a");
        let right = hash_leaf("b");
        assert_eq!(hash_pair(&left, &right), hash_leaf(format!("{}{}", left, right)));
    }

    #[test]
    fn test_empty_tree() {
        let tree = DigestTree::build(Vec::<String>::new());
        assert_eq!(tree.root(), EMPTY_ROOT);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_single_leaf_is_duplicated() {
        let tree = DigestTree::build(["only"]);
        let leaf = hash_leaf("only");
        assert_eq!(tree.root(), hash_pair(&leaf, &leaf));
        assert_eq!(tree.leaf_count(), 1);
    }

    #[test]
    fn test_two_leaves() {
        let tree = DigestTree::build(["a", "b"]);
        assert_eq!(tree.root(), hash_pair(&hash_leaf("a"), &hash_leaf("b")));
    }

    #[test]
    fn test_odd_leaf_count_duplicates_last() {
        let tree = DigestTree::build(["a", "b", "c"]);
        let (a, b, c) = (hash_leaf("a"), hash_leaf("b"), hash_leaf("c"));
        let expected = hash_pair(&hash_pair(&a, &b), &hash_pair(&c, &c));
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn test_odd_count_at_inner_level() {
        // 5 leaves -> 6 -> 3 -> 4 -> 2 -> 1
        let tree = DigestTree::build(["a", "b", "c", "d", "e"]);
        let h: Vec<String> = ["a", "b", "c", "d", "e"].iter().map(hash_leaf).collect();
        let ab = hash_pair(&h[0], &h[1]);
        let cd = hash_pair(&h[2], &h[3]);
        let ee = hash_pair(&h[4], &h[4]);
        let expected = hash_pair(&hash_pair(&ab, &cd), &hash_pair(&ee, &ee));
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn test_build_is_deterministic() {
        let first = DigestTree::build(values(7));
        let second = DigestTree::build(values(7));
        assert_eq!(first.root(), second.root());
        assert_eq!(first, second);
    }

    #[test]
    fn test_order_changes_root() {
        let forward = DigestTree::build(["a", "b"]);
        let reverse = DigestTree::build(["b", "a"]);
        assert_ne!(forward.root(), reverse.root());
    }

    #[test]
    fn test_proofs_verify_for_every_leaf() {
        for n in 1..=9 {
            let tree = DigestTree::build(values(n));
            for leaf in tree.leaves() {
                let proof = tree.proof(leaf).unwrap();
                assert!(
                    verify_proof(leaf, &proof.siblings, tree.root()),
                    "proof failed for leaf {} of {}",
                    proof.leaf_index,
                    n
                );
            }
        }
    }

    #[test]
    fn test_single_leaf_proof() {
        let tree = DigestTree::build(["only"]);
        let leaf = hash_leaf("only");
        let proof = tree.proof(&leaf).unwrap();
        assert_eq!(proof.siblings.len(), 1);
        assert_eq!(proof.siblings[0].digest, leaf);
        assert_eq!(proof.siblings[0].side, Side::Right);
        assert!(proof.verify(tree.root()));
    }

    #[test]
    fn test_proof_for_duplicated_last_leaf() {
        let tree = DigestTree::build(["a", "b", "c"]);
        let c = hash_leaf("c");
        let proof = tree.proof(&c).unwrap();
        assert_eq!(proof.leaf_index, 2);
        assert_eq!(proof.siblings[0].digest, c);
        assert!(proof.verify(tree.root()));
    }

    #[test]
    fn test_proof_unknown_leaf() {
        let tree = DigestTree::build(["a", "b"]);
        let err = tree.proof(&hash_leaf("zzz")).unwrap_err();
        assert!(matches!(err, DigestError::LeafNotFound(_)));
    }

    #[test]
    fn test_proof_rejects_other_root() {
        let tree = DigestTree::build(values(4));
        let other = DigestTree::build(values(5));
        let proof = tree.proof(&tree.leaves()[1]).unwrap();
        assert!(!proof.verify(other.root()));
    }

    #[test]
    fn test_deserialize_recomputes_root() {
        let tree = DigestTree::build(values(3));
        let mut json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["root"], tree.root());

        json["root"] = serde_json::Value::from("00".repeat(32));
        let restored: DigestTree = serde_json::from_value(json).unwrap();
        assert_eq!(restored, tree);

        let leaves_only: DigestTree =
            serde_json::from_str(r#"{"leaves":[]}"#).unwrap();
        assert_eq!(leaves_only.root(), EMPTY_ROOT);
    }
}
