//! Layer merge
//!
//! - Objects: deep-merge by key
//! - Arrays: REPLACE (last wins)
//! - Scalars: override (last wins)

use serde_json::Value;

/// Deep merge `overlay` onto `base`.
///
/// A workload's `jobs` array is therefore replaced wholesale by a later
/// layer, never appended to.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Merge layers in order; the last layer has the highest precedence.
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_override() {
        let result = deep_merge(json!({"log_level": "info"}), json!({"log_level": "debug"}));
        assert_eq!(result["log_level"], "debug");
    }

    #[test]
    fn test_capacity_deep_merge() {
        let base = json!({
            "scheduler": {"capacity": {"cpu_cores": 8.0, "memory_gb": 16.0}}
        });
        let overlay = json!({
            "scheduler": {"capacity": {"memory_gb": 64.0, "gpu_units": 2.0}}
        });
        let result = deep_merge(base, overlay);

        let capacity = &result["scheduler"]["capacity"];
        assert_eq!(capacity["cpu_cores"], 8.0);
        assert_eq!(capacity["memory_gb"], 64.0);
        assert_eq!(capacity["gpu_units"], 2.0);
    }

    #[test]
    fn test_jobs_array_replaced() {
        let base = json!({"jobs": [{"id": "a"}, {"id": "b"}]});
        let overlay = json!({"jobs": [{"id": "c"}]});
        let result = deep_merge(base, overlay);

        let jobs = result["jobs"].as_array().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0]["id"], "c");
    }

    #[test]
    fn test_null_override() {
        let result = deep_merge(json!({"value": 100}), json!({"value": null}));
        assert!(result["value"].is_null());
    }

    #[test]
    fn test_merge_layers_precedence() {
        let builtin = json!({"scheduler": {"max_cycles": 100}, "log_level": "info"});
        let file = json!({"scheduler": {"max_cycles": 20}, "log_level": "warn"});
        let cli = json!({"scheduler": {"max_cycles": 5}});

        let result = merge_layers(vec![builtin, file, cli]);

        assert_eq!(result["scheduler"]["max_cycles"], 5);
        assert_eq!(result["log_level"], "warn");
    }
}
