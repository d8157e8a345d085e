//! Resource-aware priority scheduler
//!
//! Admission cycle:
//! 1. Drain the pending queue once, highest priority first (FIFO on ties)
//! 2. Admit a job when, for every ledger resource it requests, the request
//!    is within available capacity. Resources unknown to the ledger do not
//!    constrain admission.
//! 3. Admitted jobs are allocated and marked RUNNING in one step
//! 4. Everything else is deferred to the next cycle in its original order
//!
//! Deferral is not an error and nothing blocks: callers drive cycles.

mod ledger;
mod queue;

pub use ledger::{ResourceLedger, ResourceStatus};
pub use queue::{PendingQueue, QueuedJob};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::job::{Job, JobError, JobStatus};
use crate::resource::ResourceVector;

/// Errors for scheduler operations
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Job {0} already known to the scheduler")]
    DuplicateJob(String),

    #[error("Job {0} not found")]
    NotFound(String),

    #[error("Job {id} is {status}, only queued jobs can be submitted")]
    NotQueued { id: String, status: JobStatus },

    #[error("Job error: {0}")]
    Job(#[from] JobError),
}

/// Outcome of one admission cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Jobs admitted this cycle, in admission order
    pub admitted: Vec<String>,

    /// Jobs left queued, in dispatch order
    pub deferred: Vec<String>,
}

/// Admission control over a fixed-schema resource ledger
#[derive(Debug)]
pub struct Scheduler {
    ledger: ResourceLedger,
    pending: PendingQueue,
    scheduled: BTreeMap<String, Job>,
}

impl Scheduler {
    /// Create a scheduler whose resource types are the names in `total`
    pub fn new(total: ResourceVector) -> Self {
        Self {
            ledger: ResourceLedger::new(total),
            pending: PendingQueue::new(),
            scheduled: BTreeMap::new(),
        }
    }

    /// Queue a job for admission
    pub fn submit(&mut self, job: Job) -> Result<(), SchedulerError> {
        if self.pending.contains(job.id()) || self.scheduled.contains_key(job.id()) {
            return Err(SchedulerError::DuplicateJob(job.id().to_string()));
        }
        if job.status() != JobStatus::Queued {
            return Err(SchedulerError::NotQueued {
                id: job.id().to_string(),
                status: job.status(),
            });
        }

        if !self.ledger.could_ever_admit(&job.resources) {
            tracing::warn!(
                job_id = %job.id(),
                demand = %job.resources,
                "Job exceeds total capacity and will stay queued"
            );
        }

        tracing::debug!(job_id = %job.id(), priority = job.priority, "Job queued");
        self.pending.push(job);
        Ok(())
    }

    /// Whether the job's demand fits current availability
    pub fn admission_test(&self, job: &Job) -> bool {
        self.ledger.admits(&job.resources)
    }

    /// Run one admission pass over the pending queue
    pub fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();
        let mut deferred = Vec::new();

        while let Some(mut entry) = self.pending.pop() {
            if !self.ledger.try_allocate(&entry.job.resources) {
                deferred.push(entry);
                continue;
            }

            if let Err(err) = entry.job.transition(JobStatus::Running) {
                // Undo the allocation before anyone can observe it
                self.ledger.release(&entry.job.resources);
                tracing::error!(job_id = %entry.job.id(), error = %err, "Cannot start job");
                deferred.push(entry);
                continue;
            }

            tracing::info!(
                job_id = %entry.job.id(),
                priority = entry.job.priority,
                available = %self.ledger.available(),
                "Job admitted"
            );
            report.admitted.push(entry.job.id().to_string());
            self.scheduled.insert(entry.job.id().to_string(), entry.job);
        }

        for entry in deferred {
            report.deferred.push(entry.job.id().to_string());
            self.pending.restore(entry);
        }

        if !report.deferred.is_empty() {
            tracing::debug!(deferred = report.deferred.len(), "Jobs deferred to next cycle");
        }
        report
    }

    /// Complete a running job and release its resources
    pub fn complete(&mut self, id: &str) -> Result<Job, SchedulerError> {
        let mut job = self
            .scheduled
            .remove(id)
            .ok_or_else(|| SchedulerError::NotFound(id.to_string()))?;

        if let Err(err) = job.transition(JobStatus::Completed) {
            self.scheduled.insert(id.to_string(), job);
            return Err(err.into());
        }
        self.ledger.release(&job.resources);

        tracing::info!(job_id = %id, available = %self.ledger.available(), "Job completed");
        Ok(job)
    }

    /// Fail a queued or running job. Running jobs release their resources.
    pub fn fail(&mut self, id: &str) -> Result<Job, SchedulerError> {
        if let Some(mut job) = self.scheduled.remove(id) {
            if let Err(err) = job.transition(JobStatus::Failed) {
                self.scheduled.insert(id.to_string(), job);
                return Err(err.into());
            }
            self.ledger.release(&job.resources);
            tracing::info!(job_id = %id, "Running job failed");
            return Ok(job);
        }

        let mut job = self
            .pending
            .remove(id)
            .ok_or_else(|| SchedulerError::NotFound(id.to_string()))?;
        if let Err(err) = job.transition(JobStatus::Failed) {
            self.pending.push(job);
            return Err(err.into());
        }
        tracing::info!(job_id = %id, "Queued job failed");
        Ok(job)
    }

    /// Total, available and used capacity
    pub fn status(&self) -> ResourceStatus {
        self.ledger.status()
    }

    /// A pending or running job
    pub fn get(&self, id: &str) -> Option<&Job> {
        self.scheduled.get(id).or_else(|| self.pending.get(id))
    }

    /// Pending jobs in dispatch order
    pub fn pending_jobs(&self) -> Vec<&Job> {
        self.pending.jobs()
    }

    /// Running jobs, ordered by id
    pub fn scheduled_jobs(&self) -> Vec<&Job> {
        self.scheduled.values().collect()
    }

    pub fn resource_types(&self) -> Vec<&str> {
        self.ledger.resource_types()
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// True when nothing is queued
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}
