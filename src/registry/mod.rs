//! Job registry with integrity verification
//!
//! The registry owns the active job set and an append-only history of
//! deleted jobs. After every mutation it rebuilds a digest tree over the
//! active jobs' canonical serializations, ordered by ascending job id, so
//! that `root_hash()` always attests to the current set.
//!
//! Inside [`JobRegistry::batch`] the rebuild is deferred until the batch
//! closure returns.

mod diff;
mod snapshot;

pub use diff::RegistryDiff;
pub use snapshot::{RegistrySnapshot, SnapshotError};

use std::collections::BTreeMap;

use jobledger_digest::{hash_leaf, DigestError, DigestTree, InclusionProof};

use crate::job::{Job, JobError, JobStatus, JobUpdate};
use crate::resource::ResourceVector;

/// Errors for registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Job {0} already exists")]
    DuplicateJob(String),

    #[error("Job {0} not found")]
    NotFound(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Integrity mismatch: recorded root {expected}, recomputed {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Digest error: {0}")]
    Digest(#[from] DigestError),
}

/// Mutable job collection summarized by a digest tree root.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    active: BTreeMap<String, Job>,
    history: Vec<Job>,
    tree: DigestTree,
    deferred: bool,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a registry from an existing job set (for example, a clone of
    /// another registry's active jobs).
    pub fn from_jobs<I>(jobs: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = Job>,
    {
        let mut registry = Self::new();
        registry.batch(|r| jobs.into_iter().try_for_each(|job| r.insert(job).map(|_| ())))?;
        Ok(registry)
    }

    fn build_tree(active: &BTreeMap<String, Job>) -> DigestTree {
        DigestTree::build(active.values().map(Job::serialize))
    }

    fn rebuild(&mut self) {
        if self.deferred {
            return;
        }
        self.tree = Self::build_tree(&self.active);
        tracing::debug!(
            root = %self.tree.root(),
            jobs = self.active.len(),
            "Registry root rebuilt"
        );
    }

    /// Create and register a new job
    pub fn create(
        &mut self,
        id: impl Into<String>,
        priority: i64,
        user_id: impl Into<String>,
        resources: ResourceVector,
        command: impl Into<String>,
    ) -> Result<Job, RegistryError> {
        self.insert(Job::new(id, priority, user_id, resources, command))
    }

    /// Register an already constructed job
    pub fn insert(&mut self, job: Job) -> Result<Job, RegistryError> {
        if self.active.contains_key(job.id()) {
            return Err(RegistryError::DuplicateJob(job.id().to_string()));
        }

        tracing::info!(job_id = %job.id(), priority = job.priority, "Job registered");
        self.active.insert(job.id().to_string(), job.clone());
        self.rebuild();
        Ok(job)
    }

    /// Look up an active job. A miss is not an error.
    pub fn get(&self, id: &str) -> Option<&Job> {
        self.active.get(id)
    }

    /// All active jobs, ordered by id
    pub fn list(&self) -> Vec<&Job> {
        self.active.values().collect()
    }

    /// Active jobs with the given status, ordered by id
    pub fn list_by_status(&self, status: JobStatus) -> Vec<&Job> {
        self.active
            .values()
            .filter(|j| j.status() == status)
            .collect()
    }

    /// Apply field updates to an active job.
    ///
    /// Updates are applied to a copy first; if any update fails the stored
    /// job is left untouched.
    pub fn update<I>(&mut self, id: &str, updates: I) -> Result<Job, RegistryError>
    where
        I: IntoIterator<Item = JobUpdate>,
    {
        let current = self
            .active
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        let mut updated = current.clone();
        for update in updates {
            tracing::debug!(job_id = %id, field = update.field(), "Updating job field");
            updated.apply(update)?;
        }

        self.active.insert(id.to_string(), updated.clone());
        self.rebuild();
        Ok(updated)
    }

    /// Apply `field=value` string updates. Unrecognized field names are
    /// rejected with [`RegistryError::UnknownField`] before anything changes.
    pub fn update_fields(
        &mut self,
        id: &str,
        fields: &[(&str, &str)],
    ) -> Result<Job, RegistryError> {
        let updates = fields
            .iter()
            .map(|(field, value)| {
                JobUpdate::parse(field, value).map_err(|e| match e {
                    JobError::UnknownField(name) => RegistryError::UnknownField(name),
                    other => RegistryError::Job(other),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.update(id, updates)
    }

    /// Transition an active job's status
    pub fn set_status(&mut self, id: &str, status: JobStatus) -> Result<Job, RegistryError> {
        self.update(id, [JobUpdate::Status(status)])
    }

    /// Remove a job from the active set, archiving it in history
    pub fn delete(&mut self, id: &str) -> Result<(), RegistryError> {
        let job = self
            .active
            .remove(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        tracing::info!(job_id = %id, "Job archived");
        self.history.push(job);
        self.rebuild();
        Ok(())
    }

    /// Deleted jobs, oldest first
    pub fn history(&self) -> &[Job] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Current root digest
    pub fn root_hash(&self) -> &str {
        self.tree.root()
    }

    /// Recompute the root from the active set and compare it with the
    /// recorded root.
    pub fn verify_integrity(&self) -> bool {
        Self::build_tree(&self.active).root() == self.tree.root()
    }

    /// Like [`verify_integrity`](Self::verify_integrity), but reports both
    /// roots on mismatch.
    pub fn check_integrity(&self) -> Result<(), RegistryError> {
        let recomputed = Self::build_tree(&self.active);
        if recomputed.root() != self.tree.root() {
            tracing::warn!(
                expected = %self.tree.root(),
                actual = %recomputed.root(),
                "Registry integrity mismatch"
            );
            return Err(RegistryError::IntegrityMismatch {
                expected: self.tree.root().to_string(),
                actual: recomputed.root().to_string(),
            });
        }
        Ok(())
    }

    /// Inclusion proof for an active job, or `None` if it is not active.
    ///
    /// Inside a batch the proof is built against the current active set,
    /// that is, against the root the batch will publish when it ends.
    pub fn proof_for(&self, id: &str) -> Result<Option<InclusionProof>, RegistryError> {
        let Some(job) = self.active.get(id) else {
            return Ok(None);
        };
        let leaf = hash_leaf(job.serialize());
        let proof = if self.deferred {
            Self::build_tree(&self.active).proof(&leaf)?
        } else {
            self.tree.proof(&leaf)?
        };
        Ok(Some(proof))
    }

    /// Run `f` with root recomputation deferred, then rebuild once.
    ///
    /// The root is stale (and `verify_integrity` false) while the closure
    /// runs. It is rebuilt even if the closure returns an error.
    pub fn batch<F, T>(&mut self, f: F) -> T
    where
        F: FnOnce(&mut Self) -> T,
    {
        let outer = self.deferred;
        self.deferred = true;
        let out = f(self);
        self.deferred = outer;
        self.rebuild();
        out
    }

    pub fn is_batching(&self) -> bool {
        self.deferred
    }

    /// Direct access to the active map. Changes made here bypass root
    /// maintenance and will be reported by `verify_integrity`.
    pub fn active_jobs_unchecked(&mut self) -> &mut BTreeMap<String, Job> {
        &mut self.active
    }
}
