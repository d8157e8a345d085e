//! Workload entries (`[[jobs]]` tables)

use serde::{Deserialize, Serialize};

use crate::resource::ResourceVector;

/// One job to submit, as written in a config file
///
/// ```toml
/// [[jobs]]
/// id = "J1"
/// priority = 2
/// user_id = "alice"
/// command = "train --epochs 3"
/// resources = { cpu_cores = 4, memory_gb = 8 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    pub id: String,

    #[serde(default)]
    pub priority: i64,

    pub user_id: String,

    #[serde(default)]
    pub resources: ResourceVector,

    #[serde(default)]
    pub command: String,
}
