//! Job model and lifecycle
//!
//! Job states: QUEUED → RUNNING → COMPLETED, with FAILED reachable from
//! any non-terminal state.
//!
//! A job's canonical serialization (`id|priority|user_id|resources|command|
//! submission_time`) is the leaf value hashed into the registry's digest tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::resource::{ResourceError, ResourceVector};

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting for admission
    Queued,
    /// Holding allocated resources
    Running,
    /// Finished and released its resources
    Completed,
    /// Failed, either before or after admission
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Check if transition from this state to target is valid
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        match (self, target) {
            (JobStatus::Queued, JobStatus::Running) => true,
            (JobStatus::Running, JobStatus::Completed) => true,

            // Failure is always available before a terminal state
            (JobStatus::Queued, JobStatus::Failed) => true,
            (JobStatus::Running, JobStatus::Failed) => true,

            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(JobError::InvalidStatus(s.to_string())),
        }
    }
}

/// Errors for job operations
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),
}

/// A compute job with a named resource demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    id: String,

    /// Higher values are more urgent
    pub priority: i64,

    /// Owner of the job
    pub user_id: String,

    /// Resource demand
    pub resources: ResourceVector,

    /// Opaque payload reference; never executed here
    pub command: String,

    submission_time: DateTime<Utc>,

    status: JobStatus,
}

impl Job {
    /// Create a new job in QUEUED state, stamped with the current time
    pub fn new(
        id: impl Into<String>,
        priority: i64,
        user_id: impl Into<String>,
        resources: ResourceVector,
        command: impl Into<String>,
    ) -> Self {
        Self::with_submission_time(id, priority, user_id, resources, command, Utc::now())
    }

    /// Create a new job in QUEUED state with an explicit submission time
    pub fn with_submission_time(
        id: impl Into<String>,
        priority: i64,
        user_id: impl Into<String>,
        resources: ResourceVector,
        command: impl Into<String>,
        submission_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            priority,
            user_id: user_id.into(),
            resources,
            command: command.into(),
            submission_time,
            status: JobStatus::Queued,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn submission_time(&self) -> DateTime<Utc> {
        self.submission_time
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Transition to a new status
    pub fn transition(&mut self, status: JobStatus) -> Result<(), JobError> {
        if !self.status.can_transition_to(status) {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: status,
            });
        }
        self.status = status;
        Ok(())
    }

    /// Apply a single field update
    pub fn apply(&mut self, update: JobUpdate) -> Result<(), JobError> {
        match update {
            JobUpdate::Priority(priority) => self.priority = priority,
            JobUpdate::UserId(user_id) => self.user_id = user_id,
            JobUpdate::Command(command) => self.command = command,
            JobUpdate::Resources(resources) => self.resources = resources,
            JobUpdate::Status(status) => self.transition(status)?,
        }
        Ok(())
    }

    /// Canonical leaf serialization.
    ///
    /// The submission time is rendered as epoch seconds with six fractional
    /// digits. Status is not part of the leaf. `\` and `|` inside the text
    /// fields are backslash-escaped.
    pub fn serialize(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}.{:06}",
            escape_field(&self.id),
            self.priority,
            escape_field(&self.user_id),
            self.resources.serialize(),
            escape_field(&self.command),
            self.submission_time.timestamp(),
            self.submission_time.timestamp_subsec_micros()
        )
    }
}

fn escape_field(text: &str) -> Cow<'_, str> {
    if text.contains(&['\\', '|'][..]) {
        Cow::Owned(text.replace('\\', "\\\\").replace('|', "\\|"))
    } else {
        Cow::Borrowed(text)
    }
}

/// A change to one mutable job field.
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    Priority(i64),
    UserId(String),
    Command(String),
    /// Replaces the whole resource vector
    Resources(ResourceVector),
    Status(JobStatus),
}

impl JobUpdate {
    /// Name of the field this update touches
    pub fn field(&self) -> &'static str {
        match self {
            JobUpdate::Priority(_) => "priority",
            JobUpdate::UserId(_) => "user_id",
            JobUpdate::Command(_) => "command",
            JobUpdate::Resources(_) => "resources",
            JobUpdate::Status(_) => "status",
        }
    }

    /// Parse a `field=value` style update. Resources use the canonical
    /// `name:value,...` form. Unrecognized fields are rejected.
    pub fn parse(field: &str, value: &str) -> Result<Self, JobError> {
        match field {
            "priority" => value
                .trim()
                .parse()
                .map(JobUpdate::Priority)
                .map_err(|_| JobError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                }),
            "user_id" => Ok(JobUpdate::UserId(value.to_string())),
            "command" => Ok(JobUpdate::Command(value.to_string())),
            "resources" => Ok(JobUpdate::Resources(value.parse()?)),
            "status" => Ok(JobUpdate::Status(value.parse()?)),
            "id" | "submission_time" => Err(JobError::InvalidValue {
                field: field.to_string(),
                value: "field is immutable".to_string(),
            }),
            _ => Err(JobError::UnknownField(field.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn resources() -> ResourceVector {
        ResourceVector::new([("cpu_cores", 4.0), ("memory_gb", 8.0)]).unwrap()
    }

    fn fixed_job() -> Job {
        let time = Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap();
        Job::with_submission_time("J1", 3, "user1", resources(), "python script1.py", time)
    }

    #[test]
    fn test_new_job_is_queued() {
        let job = Job::new("J1", 1, "user1", resources(), "run");
        assert_eq!(job.status(), JobStatus::Queued);
        assert_eq!(job.id(), "J1");
    }

    #[test]
    fn test_serialize_layout() {
        assert_eq!(
            fixed_job().serialize(),
            "J1|3|user1|cpu_cores:4,memory_gb:8|python script1.py|1700000000.123456"
        );
    }

    #[test]
    fn test_serialize_escapes_separators() {
        let time = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let shifted = Job::with_submission_time("a|1", 2, "u", resources(), "x", time);
        let plain = Job::with_submission_time("a", 1, "2|u", resources(), "x", time);
        assert_ne!(shifted.serialize(), plain.serialize());

        let job = Job::with_submission_time("J1", 1, "u", resources(), r"echo a\|b", time);
        assert_eq!(
            job.serialize(),
            r"J1|1|u|cpu_cores:4,memory_gb:8|echo a\\\|b|1700000000.000000"
        );
    }

    #[test]
    fn test_serialize_ignores_status() {
        let mut job = fixed_job();
        let before = job.serialize();
        job.transition(JobStatus::Running).unwrap();
        assert_eq!(job.serialize(), before);
    }

    #[test]
    fn test_valid_transitions() {
        let mut job = fixed_job();
        assert!(job.transition(JobStatus::Running).is_ok());
        assert!(job.transition(JobStatus::Completed).is_ok());
        assert!(job.status().is_terminal());
    }

    #[test]
    fn test_fail_from_queued_and_running() {
        let mut queued = fixed_job();
        assert!(queued.transition(JobStatus::Failed).is_ok());

        let mut running = fixed_job();
        running.transition(JobStatus::Running).unwrap();
        assert!(running.transition(JobStatus::Failed).is_ok());
    }

    #[test]
    fn test_invalid_transitions() {
        let mut job = fixed_job();
        // Cannot complete without running
        assert!(matches!(
            job.transition(JobStatus::Completed),
            Err(JobError::InvalidTransition { .. })
        ));

        job.transition(JobStatus::Failed).unwrap();
        // Terminal states are final
        assert!(job.transition(JobStatus::Queued).is_err());
        assert!(job.transition(JobStatus::Failed).is_err());
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("RUNNING".parse::<JobStatus>().unwrap(), JobStatus::Running);
        assert!("paused".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_apply_updates() {
        let mut job = fixed_job();
        job.apply(JobUpdate::Priority(9)).unwrap();
        job.apply(JobUpdate::Command("python script2.py".to_string()))
            .unwrap();
        job.apply(JobUpdate::Resources(
            ResourceVector::new([("gpu_units", 1.0)]).unwrap(),
        ))
        .unwrap();

        assert_eq!(job.priority, 9);
        assert_eq!(job.command, "python script2.py");
        assert!(!job.resources.has("cpu_cores"));
        assert_eq!(job.resources.get("gpu_units").unwrap(), 1.0);
    }

    #[test]
    fn test_parse_update() {
        assert_eq!(
            JobUpdate::parse("priority", "5").unwrap(),
            JobUpdate::Priority(5)
        );
        assert_eq!(
            JobUpdate::parse("status", "failed").unwrap(),
            JobUpdate::Status(JobStatus::Failed)
        );
        let update = JobUpdate::parse("resources", "cpu_cores:2").unwrap();
        assert_eq!(update.field(), "resources");
    }

    #[test]
    fn test_parse_update_rejects_unknown_and_immutable() {
        assert!(matches!(
            JobUpdate::parse("colour", "blue"),
            Err(JobError::UnknownField(_))
        ));
        assert!(JobUpdate::parse("id", "J9").is_err());
        assert!(JobUpdate::parse("priority", "high").is_err());
    }

    #[test]
    fn test_serde_roundtrip_preserves_status() {
        let mut job = fixed_job();
        job.transition(JobStatus::Running).unwrap();
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"status\":\"running\""));

        let parsed: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, job);
    }
}
