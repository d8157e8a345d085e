//! Shared job service
//!
//! Composes a [`JobRegistry`] and a [`Scheduler`] so that every job the
//! scheduler sees is also recorded, integrity-tracked, in the registry. Each
//! component sits behind its own mutex; operations that touch both always
//! lock the registry first, then the scheduler, and hold both for the whole
//! operation so a scheduler transition and its registry mirror are observed
//! together.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

use jobledger_digest::InclusionProof;

use crate::job::{Job, JobStatus};
use crate::registry::{JobRegistry, RegistryDiff, RegistryError, RegistrySnapshot, SnapshotError};
use crate::resource::ResourceVector;
use crate::scheduler::{CycleReport, ResourceStatus, Scheduler, SchedulerError};

/// Errors for service operations
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("Job {0} is still held by the scheduler")]
    JobActive(String),
}

/// Resource usage plus job counts by status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub resources: ResourceStatus,
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub archived: usize,
}

/// Answer to an integrity query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub root_hash: String,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<InclusionProof>,
}

/// Registry and scheduler behind per-component locks
#[derive(Debug)]
pub struct JobService {
    registry: Mutex<JobRegistry>,
    scheduler: Mutex<Scheduler>,
    batch_updates: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // State is only mutated through methods that leave it consistent
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl JobService {
    /// With `batch_updates`, the admissions of one cycle are mirrored into
    /// the registry under a single root rebuild.
    pub fn new(capacity: ResourceVector, batch_updates: bool) -> Self {
        Self::with_parts(JobRegistry::new(), Scheduler::new(capacity), batch_updates)
    }

    pub fn with_parts(registry: JobRegistry, scheduler: Scheduler, batch_updates: bool) -> Self {
        Self {
            registry: Mutex::new(registry),
            scheduler: Mutex::new(scheduler),
            batch_updates,
        }
    }

    /// Register a job and queue it for admission
    pub fn submit(
        &self,
        id: impl Into<String>,
        priority: i64,
        user_id: impl Into<String>,
        resources: ResourceVector,
        command: impl Into<String>,
    ) -> Result<Job, ServiceError> {
        let job = Job::new(id, priority, user_id, resources, command);

        let mut registry = lock(&self.registry);
        let mut scheduler = lock(&self.scheduler);

        if scheduler.get(job.id()).is_some() {
            return Err(SchedulerError::DuplicateJob(job.id().to_string()).into());
        }
        registry.insert(job.clone())?;
        scheduler.submit(job.clone())?;
        Ok(job)
    }

    /// Run one admission cycle and mirror admissions into the registry
    pub fn run_cycle(&self) -> CycleReport {
        let mut registry = lock(&self.registry);
        let mut scheduler = lock(&self.scheduler);

        let report = scheduler.run_cycle();
        let mirror = |r: &mut JobRegistry| {
            for id in &report.admitted {
                Self::mirror_status(r, id, JobStatus::Running);
            }
        };
        if self.batch_updates {
            registry.batch(mirror);
        } else {
            mirror(&mut *registry);
        }
        report
    }

    /// Complete a running job
    pub fn complete(&self, id: &str) -> Result<Job, ServiceError> {
        let mut registry = lock(&self.registry);
        let mut scheduler = lock(&self.scheduler);

        let job = scheduler.complete(id)?;
        Self::mirror_status(&mut registry, id, JobStatus::Completed);
        Ok(job)
    }

    /// Fail a queued or running job
    pub fn fail(&self, id: &str) -> Result<Job, ServiceError> {
        let mut registry = lock(&self.registry);
        let mut scheduler = lock(&self.scheduler);

        let job = scheduler.fail(id)?;
        Self::mirror_status(&mut registry, id, JobStatus::Failed);
        Ok(job)
    }

    fn mirror_status(registry: &mut JobRegistry, id: &str, status: JobStatus) {
        if let Err(err) = registry.set_status(id, status) {
            tracing::warn!(job_id = %id, %status, error = %err, "Registry out of step with scheduler");
        }
    }

    /// Move a job the scheduler no longer holds into registry history
    pub fn archive(&self, id: &str) -> Result<(), ServiceError> {
        let mut registry = lock(&self.registry);
        let scheduler = lock(&self.scheduler);

        if scheduler.get(id).is_some() {
            return Err(ServiceError::JobActive(id.to_string()));
        }
        registry.delete(id)?;
        Ok(())
    }

    /// Resource snapshot plus job counts
    pub fn status(&self) -> ServiceStatus {
        let registry = lock(&self.registry);
        let scheduler = lock(&self.scheduler);

        let count = |status: JobStatus| registry.list_by_status(status).len();
        ServiceStatus {
            resources: scheduler.status(),
            queued: count(JobStatus::Queued),
            running: count(JobStatus::Running),
            completed: count(JobStatus::Completed),
            failed: count(JobStatus::Failed),
            archived: registry.history().len(),
        }
    }

    /// Current lifecycle state of a registered job
    pub fn job_status(&self, id: &str) -> Option<JobStatus> {
        lock(&self.registry).get(id).map(Job::status)
    }

    /// Verify the registry root and optionally prove one job's inclusion
    pub fn integrity(&self, id: Option<&str>) -> Result<IntegrityReport, ServiceError> {
        let registry = lock(&self.registry);
        let proof = match id {
            Some(id) => registry.proof_for(id)?,
            None => None,
        };
        Ok(IntegrityReport {
            root_hash: registry.root_hash().to_string(),
            verified: registry.verify_integrity(),
            proof,
        })
    }

    /// Diff this service's registry against another registry
    pub fn diff(&self, other: &JobRegistry) -> RegistryDiff {
        lock(&self.registry).diff(other)
    }

    pub fn snapshot(&self) -> Result<RegistrySnapshot, ServiceError> {
        Ok(lock(&self.registry).snapshot()?)
    }

    /// Whether the scheduler has nothing queued
    pub fn is_idle(&self) -> bool {
        lock(&self.scheduler).is_idle()
    }

    /// Ids of running jobs
    pub fn running_ids(&self) -> Vec<String> {
        lock(&self.scheduler)
            .scheduled_jobs()
            .iter()
            .map(|j| j.id().to_string())
            .collect()
    }

    /// Read-only access to the registry under its lock
    pub fn with_registry<T>(&self, f: impl FnOnce(&JobRegistry) -> T) -> T {
        f(&lock(&self.registry))
    }
}
