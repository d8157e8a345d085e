//! Layered configuration
//!
//! Merge order, lowest precedence first:
//! 1. Built-in defaults
//! 2. TOML config file (`--config`)
//! 3. CLI flags

mod defaults;
mod effective;
mod merge;
mod workload;

pub use defaults::BuiltinDefaults;
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig, MAX_CYCLES_LIMIT};
pub use merge::{deep_merge, merge_layers};
pub use workload::JobSpec;
