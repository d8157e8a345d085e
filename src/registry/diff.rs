//! Structural comparison of two registries

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::JobRegistry;

/// Differences between two registries, from the point of view of `self`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryDiff {
    /// Whether both roots are equal
    pub root_match: bool,

    /// Ids active only in the other registry
    pub added: BTreeSet<String>,

    /// Ids active only in this registry
    pub removed: BTreeSet<String>,

    /// Ids active in both whose serialized form differs
    pub modified: BTreeSet<String>,
}

impl RegistryDiff {
    /// True when no job was added, removed or modified
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Human-readable one-line summary
    pub fn summary(&self) -> String {
        if self.root_match && self.is_empty() {
            return "Registries match".to_string();
        }
        format!(
            "Registries differ: {} added, {} removed, {} modified",
            self.added.len(),
            self.removed.len(),
            self.modified.len()
        )
    }
}

impl JobRegistry {
    /// Compare this registry's active set with `other`'s.
    pub fn diff(&self, other: &JobRegistry) -> RegistryDiff {
        let ours: BTreeSet<&String> = self.active.keys().collect();
        let theirs: BTreeSet<&String> = other.active.keys().collect();

        let added = theirs.difference(&ours).map(|id| id.to_string()).collect();
        let removed = ours.difference(&theirs).map(|id| id.to_string()).collect();
        let modified = ours
            .intersection(&theirs)
            .filter(|id| self.active[**id].serialize() != other.active[**id].serialize())
            .map(|id| id.to_string())
            .collect();

        RegistryDiff {
            root_match: self.root_hash() == other.root_hash(),
            added,
            removed,
            modified,
        }
    }
}
