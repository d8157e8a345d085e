//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// CPU cores available to the scheduler (default: 8)
    pub cpu_cores: f64,

    /// Memory in GB available to the scheduler (default: 16)
    pub memory_gb: f64,

    /// Upper bound on simulated admission cycles (default: 100)
    pub max_cycles: u64,

    /// Mirror a cycle's admissions under one root rebuild (default: true)
    pub batch_updates: bool,

    /// Log level used when RUST_LOG is unset (default: "info")
    pub log_level: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            cpu_cores: 8.0,
            memory_gb: 16.0,
            max_cycles: 100,
            batch_updates: true,
            log_level: "info".to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "scheduler": {
                "capacity": {
                    "cpu_cores": self.cpu_cores,
                    "memory_gb": self.memory_gb
                },
                "max_cycles": self.max_cycles
            },
            "registry": {
                "batch_updates": self.batch_updates
            },
            "log_level": self.log_level
        })
    }
}
