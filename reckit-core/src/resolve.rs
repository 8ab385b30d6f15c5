//! Raw-configuration resolution against the component registry.
//!
//! Turns untrusted object configurations (`{name, params}`) into fully
//! defaulted, validated [`ObjectConfig`]s. Resolution never aborts on a
//! recoverable problem: unknown components are skipped, unknown parameters
//! trimmed, invalid values reverted — each with a precise diagnostic
//! through the injected sink.

use crate::events::{EventContext, EventSink, Severity};
use crate::registry::RegistryNode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A resolved, defaulted, validated configuration for one component
/// instance. Immutable once produced; ready for instantiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectConfig {
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

impl ObjectConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: BTreeMap::new(),
        }
    }
}

/// Resolve one raw object configuration against a registry leaf.
///
/// Returns the resolved config plus the name that was attempted, so a
/// caller can report which unknown name failed:
/// - `(None, None)` — the entry was not an object or had no `name` field;
/// - `(None, Some(name))` — `name` is unknown in `node`;
/// - `(Some(config), Some(name))` — resolved.
pub fn resolve_object<T>(
    category: &str,
    raw: &Value,
    node: &RegistryNode<T>,
    events: &dyn EventSink,
) -> (Option<ObjectConfig>, Option<String>) {
    let Some(entry) = raw.as_object() else {
        events.emit(
            Severity::Warning,
            &format!(
                "skipping {category} entry: expected an object, got {}",
                json_type_name(raw)
            ),
            &EventContext::category(category),
        );
        return (None, None);
    };

    let Some(name) = entry.get("name").and_then(Value::as_str) else {
        events.emit(
            Severity::Warning,
            &format!("skipping {category} entry: missing 'name' field"),
            &EventContext::category(category),
        );
        return (None, None);
    };

    let Some(factory) = node.get(name) else {
        events.emit(
            Severity::Warning,
            &format!(
                "unknown {category} '{name}', available: {:?}",
                node.list_names()
            ),
            &EventContext::component(category, name),
        );
        return (None, Some(name.to_string()));
    };

    let specs = factory.default_params();
    let mut params = specs.defaults();

    match entry.get("params").and_then(Value::as_object) {
        None => {
            if !specs.is_empty() {
                events.emit(
                    Severity::Info,
                    &format!("no params given for {category} '{name}', using defaults"),
                    &EventContext::component(category, name),
                );
            }
        }
        Some(raw_params) => {
            // Trim keys the component does not know.
            for key in raw_params.keys() {
                if !specs.contains(key) {
                    events.emit(
                        Severity::Warning,
                        &format!("unknown parameter '{key}' for {category} '{name}'; dropped"),
                        &EventContext::parameter(category, name, key),
                    );
                }
            }
            // Validate the known ones, in spec order.
            for spec in specs.iter() {
                let Some(raw_value) = raw_params.get(spec.name()) else {
                    continue;
                };
                let checked = spec.validate(raw_value);
                if !checked.note.is_empty() {
                    let severity = if checked.ok {
                        Severity::Info
                    } else {
                        Severity::Warning
                    };
                    events.emit(
                        severity,
                        &checked.note,
                        &EventContext::parameter(category, name, spec.name()),
                    );
                }
                // The validated value is always usable: hard failures have
                // already reverted to the spec default inside validate().
                params.insert(spec.name().to_string(), checked.value);
            }
        }
    }

    (
        Some(ObjectConfig {
            name: name.to_string(),
            params,
        }),
        Some(name.to_string()),
    )
}

/// Resolve a raw list of object configurations, skipping entries that fail.
///
/// Partial failure never raises; each skipped entry has already been
/// reported through the sink. An empty overall result is the caller's
/// concern to report.
pub fn resolve_object_list<T>(
    category: &str,
    item_label: &str,
    raw_list: &[Value],
    node: &RegistryNode<T>,
    events: &dyn EventSink,
) -> Vec<(ObjectConfig, Value)> {
    let mut resolved = Vec::new();
    for (index, raw) in raw_list.iter().enumerate() {
        match resolve_object(category, raw, node, events) {
            (Some(config), _) => resolved.push((config, raw.clone())),
            (None, attempted) => {
                let which = attempted.unwrap_or_else(|| format!("#{index}"));
                events.emit(
                    Severity::Warning,
                    &format!("skipped {item_label} {which} in {category} list"),
                    &EventContext::category(category),
                );
            }
        }
    }
    resolved
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AlgorithmError;
    use crate::events::MemorySink;
    use crate::params::{ParamSpec, ParameterSet};
    use crate::registry::{ComponentFactory, CreateContext};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    struct RandomFactory;

    impl ComponentFactory<()> for RandomFactory {
        fn name(&self) -> &str {
            "Random"
        }

        fn create(
            &self,
            _params: &BTreeMap<String, Value>,
            _ctx: &CreateContext,
        ) -> Result<(), AlgorithmError> {
            Ok(())
        }
    }

    struct KnnFactory;

    impl ComponentFactory<()> for KnnFactory {
        fn name(&self) -> &str {
            "ItemKNN"
        }

        fn default_params(&self) -> ParameterSet {
            ParameterSet::new()
                .with(ParamSpec::integer("k", 20, 1, 1000))
                .with(ParamSpec::float("min_sim", 0.0, -1.0, 1.0))
                .with(ParamSpec::random_seed("seed"))
        }

        fn create(
            &self,
            _params: &BTreeMap<String, Value>,
            _ctx: &CreateContext,
        ) -> Result<(), AlgorithmError> {
            Ok(())
        }
    }

    fn sample_leaf() -> RegistryNode<()> {
        let mut leaf = RegistryNode::leaf();
        leaf.register(Arc::new(RandomFactory)).unwrap();
        leaf.register(Arc::new(KnnFactory)).unwrap();
        leaf
    }

    #[test]
    fn test_resolve_parameterless_component() {
        let leaf = sample_leaf();
        let sink = MemorySink::new();
        let (config, name) = resolve_object("model", &json!({"name": "Random"}), &leaf, &sink);
        let config = config.unwrap();
        assert_eq!(name.as_deref(), Some("Random"));
        assert_eq!(config.name, "Random");
        assert!(config.params.is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_resolve_rejects_non_object() {
        let leaf = sample_leaf();
        let sink = MemorySink::new();
        let (config, name) = resolve_object("model", &json!("Random"), &leaf, &sink);
        assert!(config.is_none());
        assert!(name.is_none());
        assert_eq!(sink.count_at_least(Severity::Warning), 1);
    }

    #[test]
    fn test_resolve_rejects_missing_name() {
        let leaf = sample_leaf();
        let sink = MemorySink::new();
        let (config, name) = resolve_object("model", &json!({"params": {}}), &leaf, &sink);
        assert!(config.is_none());
        assert!(name.is_none());
    }

    #[test]
    fn test_resolve_reports_unknown_name() {
        let leaf = sample_leaf();
        let sink = MemorySink::new();
        let (config, name) = resolve_object("model", &json!({"name": "BiasedMF"}), &leaf, &sink);
        assert!(config.is_none());
        assert_eq!(name.as_deref(), Some("BiasedMF"));
        assert!(sink.events()[0].message.contains("unknown model 'BiasedMF'"));
    }

    #[test]
    fn test_missing_params_uses_defaults_with_diagnostic() {
        let leaf = sample_leaf();
        let sink = MemorySink::new();
        let (config, _) = resolve_object("model", &json!({"name": "ItemKNN"}), &leaf, &sink);
        let config = config.unwrap();
        assert_eq!(config.params["k"], json!(20));
        assert_eq!(config.params["min_sim"], json!(0.0));
        assert_eq!(config.params["seed"], Value::Null);
        assert_eq!(sink.count_at_least(Severity::Info), 1);
    }

    #[test]
    fn test_unknown_keys_are_trimmed() {
        let leaf = sample_leaf();
        let sink = MemorySink::new();
        let raw = json!({
            "name": "ItemKNN",
            "params": {"k": 50, "min_sim": 0.2, "bogus": true}
        });
        let (config, _) = resolve_object("model", &raw, &leaf, &sink);
        let config = config.unwrap();
        // Exactly the known parameters survive: two supplied plus the
        // defaulted seed.
        assert_eq!(config.params.len(), 3);
        assert_eq!(config.params["k"], json!(50));
        assert_eq!(config.params["min_sim"], json!(0.2));
        assert!(!config.params.contains_key("bogus"));
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].message.contains("unknown parameter 'bogus'"));
    }

    #[test]
    fn test_invalid_value_reverts_to_default() {
        let leaf = sample_leaf();
        let sink = MemorySink::new();
        let raw = json!({"name": "ItemKNN", "params": {"k": "many"}});
        let (config, _) = resolve_object("model", &raw, &leaf, &sink);
        let config = config.unwrap();
        assert_eq!(config.params["k"], json!(20));
        assert_eq!(sink.count_at_least(Severity::Warning), 1);
    }

    #[test]
    fn test_out_of_bounds_value_is_clamped() {
        let leaf = sample_leaf();
        let sink = MemorySink::new();
        let raw = json!({"name": "ItemKNN", "params": {"k": 100000}});
        let (config, _) = resolve_object("model", &raw, &leaf, &sink);
        assert_eq!(config.unwrap().params["k"], json!(1000));
        assert_eq!(sink.count_at_least(Severity::Warning), 1);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let leaf = sample_leaf();
        let raw = json!({"name": "ItemKNN", "params": {"k": 50, "seed": 7}});
        let (first, _) = resolve_object("model", &raw, &leaf, &NoopCounter);
        let (second, _) = resolve_object("model", &raw, &leaf, &NoopCounter);
        assert_eq!(first.unwrap(), second.unwrap());
    }

    struct NoopCounter;
    impl EventSink for NoopCounter {
        fn emit(&self, _: Severity, _: &str, _: &EventContext) {}
    }

    #[test]
    fn test_resolve_list_skips_failures() {
        let leaf = sample_leaf();
        let sink = MemorySink::new();
        let raw_list = vec![
            json!({"name": "Random"}),
            json!({"name": "Nope"}),
            json!(42),
            json!({"name": "ItemKNN"}),
        ];
        let resolved = resolve_object_list("model", "model", &raw_list, &leaf, &sink);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].0.name, "Random");
        assert_eq!(resolved[1].0.name, "ItemKNN");
        // The raw entry travels with its resolved config.
        assert_eq!(resolved[0].1, json!({"name": "Random"}));
    }
}
