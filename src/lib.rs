//! jobledger - integrity-tracked job registry with a resource-aware scheduler
//!
//! The registry keeps every active job under a digest tree whose root
//! changes whenever any job's content changes; inclusion proofs let a single
//! job be checked against that root. The scheduler admits queued jobs by
//! priority while their resource demand fits available capacity.
//! [`JobService`] composes the two behind locks for concurrent callers.

pub mod config;
pub mod job;
pub mod registry;
pub mod resource;
pub mod scheduler;
pub mod service;

pub use config::{ConfigError, EffectiveConfig, JobSpec};
pub use job::{Job, JobError, JobStatus, JobUpdate};
pub use jobledger_digest::{DigestTree, InclusionProof, ProofStep, Side, EMPTY_ROOT};
pub use registry::{JobRegistry, RegistryDiff, RegistryError, RegistrySnapshot, SnapshotError};
pub use resource::{Quantity, ResourceError, ResourceVector};
pub use scheduler::{CycleReport, ResourceStatus, Scheduler, SchedulerError};
pub use service::{IntegrityReport, JobService, ServiceError, ServiceStatus};
