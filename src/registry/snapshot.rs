//! Registry snapshot (registry_snapshot.json)
//!
//! A point-in-time export of a registry for persistence collaborators. The
//! snapshot records the digest tree root and a SHA-256 over the JCS form of
//! the active job list; `restore` refuses snapshots where either no longer
//! matches the jobs they carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::Path;

use super::{JobRegistry, RegistryError};
use crate::job::Job;

/// Schema version for registry_snapshot.json
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "jobledger/registry_snapshot@1";

/// Errors for snapshot operations
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("JCS canonicalization error: {0}")]
    JcsError(String),

    #[error("Unsupported snapshot schema: {0}")]
    UnsupportedSchema(String),

    #[error("jobs_sha256 mismatch: expected {expected}, got {actual}")]
    JobsDigestMismatch { expected: String, actual: String },

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Serialized registry state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// When the snapshot was taken
    pub created_at: DateTime<Utc>,

    /// Digest tree root over `jobs`
    pub root_hash: String,

    /// SHA-256 of JCS(jobs)
    pub jobs_sha256: String,

    /// Active jobs, ordered by id
    pub jobs: Vec<Job>,

    /// Archived jobs, oldest first
    pub history: Vec<Job>,
}

impl RegistrySnapshot {
    /// Compute jobs_sha256 using JCS
    pub fn compute_jobs_sha256(jobs: &[Job]) -> Result<String, SnapshotError> {
        let jobs_vec: Vec<_> = jobs.to_vec();
        let jcs_bytes = serde_json_canonicalizer::to_vec(&jobs_vec)
            .map_err(|e| SnapshotError::JcsError(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&jcs_bytes);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Rebuild a registry, verifying both recorded digests.
    pub fn restore(&self) -> Result<JobRegistry, SnapshotError> {
        if self.schema_id != SCHEMA_ID || self.schema_version != SCHEMA_VERSION {
            return Err(SnapshotError::UnsupportedSchema(format!(
                "{} v{}",
                self.schema_id, self.schema_version
            )));
        }

        let actual = Self::compute_jobs_sha256(&self.jobs)?;
        if actual != self.jobs_sha256 {
            tracing::warn!(expected = %self.jobs_sha256, %actual, "Snapshot job digest mismatch");
            return Err(SnapshotError::JobsDigestMismatch {
                expected: self.jobs_sha256.clone(),
                actual,
            });
        }

        let mut registry = JobRegistry::from_jobs(self.jobs.iter().cloned())?;
        if registry.root_hash() != self.root_hash {
            tracing::warn!(
                expected = %self.root_hash,
                actual = %registry.root_hash(),
                "Snapshot root mismatch"
            );
            return Err(RegistryError::IntegrityMismatch {
                expected: self.root_hash.clone(),
                actual: registry.root_hash().to_string(),
            }
            .into());
        }

        registry.history = self.history.clone();
        Ok(registry)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write atomically to file (write-then-rename)
    pub fn write_to_file(&self, path: &Path) -> Result<(), SnapshotError> {
        let json = self.to_json()?;

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &json)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Load from file
    pub fn from_file(path: &Path) -> Result<Self, SnapshotError> {
        let json = fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }
}

impl JobRegistry {
    /// Export the current state. The root must be current, so this fails
    /// with `IntegrityMismatch` if the active set was changed behind the
    /// registry's back.
    pub fn snapshot(&self) -> Result<RegistrySnapshot, SnapshotError> {
        self.check_integrity()?;

        let jobs: Vec<Job> = self.active.values().cloned().collect();
        Ok(RegistrySnapshot {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            root_hash: self.root_hash().to_string(),
            jobs_sha256: RegistrySnapshot::compute_jobs_sha256(&jobs)?,
            jobs,
            history: self.history.clone(),
        })
    }
}
