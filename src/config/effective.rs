//! Effective configuration with provenance
//!
//! Captures the merged configuration plus where each layer came from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::Path;

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use super::workload::JobSpec;
use crate::resource::ResourceVector;

/// Schema version for effective_config
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "jobledger/effective_config@1";

/// Upper bound for `scheduler.max_cycles`
pub const MAX_CYCLES_LIMIT: u64 = 10_000;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Cli,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Merged configuration with its sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub schema_version: u32,

    pub schema_id: String,

    /// When this config was computed
    pub created_at: DateTime<Utc>,

    /// The merged configuration object
    pub config: Value,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,
}

impl EffectiveConfig {
    /// Build effective config from builtin defaults, an optional TOML file
    /// and optional CLI overrides, in that precedence order.
    pub fn build(config_path: Option<&Path>, cli_overrides: Option<Value>) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        if let Some(path) = config_path {
            let (value, digest) = Self::load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin: ConfigOrigin::File,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let config = Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            config: merge_layers(layers),
            sources,
        };
        config.validate()?;

        tracing::debug!(sources = config.sources.len(), "Configuration merged");
        Ok(config)
    }

    /// Load and parse a TOML file, returning the value and digest
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;

        let toml_value: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

        Ok((toml_to_json(toml_value), digest))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.capacity()?;

        let max_cycles = self.get("scheduler.max_cycles");
        match max_cycles.and_then(Value::as_u64) {
            Some(n) if n > 0 && n <= MAX_CYCLES_LIMIT => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "scheduler.max_cycles must be in (0, {}]",
                    MAX_CYCLES_LIMIT
                )))
            }
        }

        if self.get("registry.batch_updates").and_then(Value::as_bool).is_none() {
            return Err(ConfigError::ValidationError(
                "registry.batch_updates must be a boolean".to_string(),
            ));
        }

        match self.get_str("log_level") {
            Some(level) if LOG_LEVELS.contains(&level) => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "log_level must be one of {}",
                    LOG_LEVELS.join("/")
                )))
            }
        }

        self.jobs()?;
        Ok(())
    }

    /// Scheduler capacity from `scheduler.capacity`
    pub fn capacity(&self) -> Result<ResourceVector, ConfigError> {
        let table = self
            .get("scheduler.capacity")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ConfigError::ValidationError("scheduler.capacity must be a table".to_string())
            })?;

        let mut pairs = Vec::with_capacity(table.len());
        for (name, value) in table {
            let quantity = value.as_f64().ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "scheduler.capacity.{} must be a number, got {}",
                    name, value
                ))
            })?;
            pairs.push((name.clone(), quantity));
        }

        ResourceVector::new(pairs)
            .map_err(|e| ConfigError::ValidationError(format!("scheduler.capacity: {}", e)))
    }

    pub fn max_cycles(&self) -> u64 {
        self.get_u64("scheduler.max_cycles")
            .unwrap_or(BuiltinDefaults::default().max_cycles)
    }

    pub fn batch_updates(&self) -> bool {
        self.get_bool("registry.batch_updates")
            .unwrap_or(BuiltinDefaults::default().batch_updates)
    }

    pub fn log_level(&self) -> &str {
        self.get_str("log_level").unwrap_or("info")
    }

    /// Workload from the `[[jobs]]` array; empty when absent
    pub fn jobs(&self) -> Result<Vec<JobSpec>, ConfigError> {
        match self.get("jobs") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| ConfigError::ValidationError(format!("jobs: {}", e))),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON serialization failed: {}", e),
            )
        })?;
        fs::write(path, json)
    }

    /// Get a config value by dot-separated path
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.config;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    pub fn get_u64(&self, path: &str) -> Option<u64> {
        self.get(path).and_then(|v| v.as_u64())
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(|v| v.as_bool())
    }
}

/// Convert a TOML value to JSON. Non-finite floats become null.
fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file(contents: &str) -> NamedTempFile {
        let mut temp = NamedTempFile::new().unwrap();
        write!(temp, "{}", contents).unwrap();
        temp
    }

    #[test]
    fn test_build_with_defaults_only() {
        let config = EffectiveConfig::build(None, None).unwrap();

        assert_eq!(config.schema_version, SCHEMA_VERSION);
        assert_eq!(config.max_cycles(), 100);
        assert!(config.batch_updates());
        assert_eq!(config.log_level(), "info");
        assert!(config.jobs().unwrap().is_empty());

        let capacity = config.capacity().unwrap();
        assert_eq!(capacity.get("cpu_cores").unwrap(), 8.0);
        assert_eq!(capacity.get("memory_gb").unwrap(), 16.0);
    }

    #[test]
    fn test_cli_override_wins() {
        let cli = json!({"scheduler": {"max_cycles": 7}, "log_level": "debug"});
        let config = EffectiveConfig::build(None, Some(cli)).unwrap();

        assert_eq!(config.max_cycles(), 7);
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.sources.last().unwrap().origin, ConfigOrigin::Cli);
    }

    #[test]
    fn test_max_cycles_bounds() {
        for bad in [json!(0), json!(10_001), json!("ten")] {
            let cli = json!({"scheduler": {"max_cycles": bad}});
            let err = EffectiveConfig::build(None, Some(cli)).unwrap_err();
            assert!(err.to_string().contains("max_cycles"));
        }
        let cli = json!({"scheduler": {"max_cycles": 10_000}});
        assert!(EffectiveConfig::build(None, Some(cli)).is_ok());
    }

    #[test]
    fn test_negative_capacity_rejected() {
        let cli = json!({"scheduler": {"capacity": {"cpu_cores": -1.0}}});
        let err = EffectiveConfig::build(None, Some(cli)).unwrap_err();
        assert!(err.to_string().contains("scheduler.capacity"));
    }

    #[test]
    fn test_non_numeric_capacity_rejected() {
        let cli = json!({"scheduler": {"capacity": {"gpu_units": "two"}}});
        let err = EffectiveConfig::build(None, Some(cli)).unwrap_err();
        assert!(err.to_string().contains("gpu_units"));
    }

    #[test]
    fn test_log_level_validated() {
        let cli = json!({"log_level": "verbose"});
        assert!(matches!(
            EffectiveConfig::build(None, Some(cli)),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_load_toml_file() {
        let temp = toml_file(
            r#"
log_level = "warn"

[scheduler]
max_cycles = 12

[scheduler.capacity]
memory_gb = 64
gpu_units = 2

[registry]
batch_updates = false
"#,
        );

        let config = EffectiveConfig::build(Some(temp.path()), None).unwrap();

        assert_eq!(config.max_cycles(), 12);
        assert!(!config.batch_updates());
        assert_eq!(config.log_level(), "warn");

        let capacity = config.capacity().unwrap();
        assert_eq!(capacity.get("cpu_cores").unwrap(), 8.0);
        assert_eq!(capacity.get("memory_gb").unwrap(), 64.0);
        assert_eq!(capacity.get("gpu_units").unwrap(), 2.0);
    }

    #[test]
    fn test_workload_jobs() {
        let temp = toml_file(
            r#"
[[jobs]]
id = "J1"
priority = 2
user_id = "alice"
command = "train"
resources = { cpu_cores = 4, memory_gb = 8 }

[[jobs]]
id = "J2"
user_id = "bob"
"#,
        );

        let config = EffectiveConfig::build(Some(temp.path()), None).unwrap();
        let jobs = config.jobs().unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, "J1");
        assert_eq!(jobs[0].priority, 2);
        assert_eq!(jobs[0].resources.get("memory_gb").unwrap(), 8.0);
        assert_eq!(jobs[1].priority, 0);
        assert!(jobs[1].resources.is_empty());
    }

    #[test]
    fn test_invalid_job_rejected_at_build() {
        let temp = toml_file(
            r#"
[[jobs]]
id = "J1"
user_id = "alice"
resources = { cpu_cores = -4 }
"#,
        );

        let err = EffectiveConfig::build(Some(temp.path()), None).unwrap_err();
        assert!(err.to_string().contains("jobs"));
    }

    #[test]
    fn test_sources_tracked_with_digest() {
        let temp = toml_file("log_level = \"error\"\n");
        let config = EffectiveConfig::build(Some(temp.path()), None).unwrap();

        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].origin, ConfigOrigin::Builtin);
        assert_eq!(config.sources[1].origin, ConfigOrigin::File);

        let mut hasher = Sha256::new();
        hasher.update(b"log_level = \"error\"\n");
        let expected = hex::encode(hasher.finalize());
        assert_eq!(config.sources[1].digest.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            EffectiveConfig::build(Some(&missing), None),
            Err(ConfigError::IoError(_))
        ));
    }

    #[test]
    fn test_malformed_toml() {
        let temp = toml_file("scheduler = [unclosed");
        assert!(matches!(
            EffectiveConfig::build(Some(temp.path()), None),
            Err(ConfigError::ParseError(_))
        ));
    }
}
