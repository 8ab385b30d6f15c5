//! Typed, self-describing tunable parameters for registered components.
//!
//! Every component in the registry describes its tunables through a
//! [`ParameterSet`] of [`ParamSpec`]s. A spec carries its own default and
//! validation rule; validation never aborts resolution, it produces a
//! usable value plus a note describing what was corrected.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Numeric representation expected by a Number or Range parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberType {
    Integer,
    Float,
}

impl NumberType {
    fn label(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
        }
    }

    /// Render an in-bounds numeric value in this representation.
    fn render(&self, value: f64) -> Value {
        match self {
            Self::Integer => Value::from(value as i64),
            Self::Float => Value::from(value),
        }
    }
}

/// Outcome of validating one raw value against a spec.
///
/// `value` is always usable: on hard failures (type mismatch, no surviving
/// option entries) it reverts to the spec's default, on soft failures
/// (out-of-bounds, reversed range, dropped entries) it is the corrected
/// input. `ok` is false whenever anything had to be corrected or reverted;
/// `note` explains what happened.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub ok: bool,
    pub value: Value,
    pub note: String,
}

impl Validation {
    fn accepted(value: Value) -> Self {
        Self {
            ok: true,
            value,
            note: String::new(),
        }
    }

    fn coerced(value: Value, note: String) -> Self {
        Self {
            ok: true,
            value,
            note,
        }
    }

    fn corrected(value: Value, note: String) -> Self {
        Self {
            ok: false,
            value,
            note,
        }
    }

    fn accepted_or_coerced(value: Value, note: String) -> Self {
        if note.is_empty() {
            Self::accepted(value)
        } else {
            Self::coerced(value, note)
        }
    }
}

/// A self-describing specification of one tunable value.
///
/// Immutable after construction; constructing a spec whose default violates
/// its own rule is a programmer error and panics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamSpec {
    Number {
        name: String,
        value_type: NumberType,
        default: Value,
        min: f64,
        max: f64,
    },
    Range {
        name: String,
        value_type: NumberType,
        default_min: f64,
        default_max: f64,
        min: f64,
        max: f64,
    },
    SingleOption {
        name: String,
        default: Value,
        options: Vec<Value>,
    },
    MultiOption {
        name: String,
        default: Vec<Value>,
        options: Vec<Value>,
    },
    /// A non-negative integer seed whose domain includes "unset" (`null`),
    /// meaning the algorithm seeds itself at use-time.
    RandomSeed { name: String },
}

impl ParamSpec {
    /// An integer-valued numeric parameter.
    ///
    /// # Panics
    ///
    /// Panics if `min > max` or `default` lies outside `[min, max]`.
    pub fn integer(name: &str, default: i64, min: i64, max: i64) -> Self {
        let spec = Self::Number {
            name: name.to_string(),
            value_type: NumberType::Integer,
            default: Value::from(default),
            min: min as f64,
            max: max as f64,
        };
        spec.assert_valid_default();
        spec
    }

    /// A float-valued numeric parameter.
    ///
    /// # Panics
    ///
    /// Panics if `min > max` or `default` lies outside `[min, max]`.
    pub fn float(name: &str, default: f64, min: f64, max: f64) -> Self {
        let spec = Self::Number {
            name: name.to_string(),
            value_type: NumberType::Float,
            default: Value::from(default),
            min,
            max,
        };
        spec.assert_valid_default();
        spec
    }

    /// An integer min/max range pair.
    ///
    /// # Panics
    ///
    /// Panics if the default pair is reversed or outside `[min, max]`.
    pub fn integer_range(name: &str, default: (i64, i64), bounds: (i64, i64)) -> Self {
        let spec = Self::Range {
            name: name.to_string(),
            value_type: NumberType::Integer,
            default_min: default.0 as f64,
            default_max: default.1 as f64,
            min: bounds.0 as f64,
            max: bounds.1 as f64,
        };
        spec.assert_valid_default();
        spec
    }

    /// A float min/max range pair.
    ///
    /// # Panics
    ///
    /// Panics if the default pair is reversed or outside `[min, max]`.
    pub fn float_range(name: &str, default: (f64, f64), bounds: (f64, f64)) -> Self {
        let spec = Self::Range {
            name: name.to_string(),
            value_type: NumberType::Float,
            default_min: default.0,
            default_max: default.1,
            min: bounds.0,
            max: bounds.1,
        };
        spec.assert_valid_default();
        spec
    }

    /// A single-choice parameter.
    ///
    /// # Panics
    ///
    /// Panics if `options` is empty or `default` is not a member of it.
    pub fn single_option(name: &str, default: Value, options: Vec<Value>) -> Self {
        let spec = Self::SingleOption {
            name: name.to_string(),
            default,
            options,
        };
        spec.assert_valid_default();
        spec
    }

    /// A multi-choice parameter.
    ///
    /// # Panics
    ///
    /// Panics if `options` is empty, `default` is empty, or `default`
    /// contains a non-member or duplicate entry.
    pub fn multi_option(name: &str, default: Vec<Value>, options: Vec<Value>) -> Self {
        let spec = Self::MultiOption {
            name: name.to_string(),
            default,
            options,
        };
        spec.assert_valid_default();
        spec
    }

    /// An optional random seed.
    pub fn random_seed(name: &str) -> Self {
        Self::RandomSeed {
            name: name.to_string(),
        }
    }

    /// The parameter's name.
    pub fn name(&self) -> &str {
        match self {
            Self::Number { name, .. }
            | Self::Range { name, .. }
            | Self::SingleOption { name, .. }
            | Self::MultiOption { name, .. }
            | Self::RandomSeed { name } => name,
        }
    }

    /// The parameter's default value, rendered as a JSON value.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Number { default, .. } => default.clone(),
            Self::Range {
                value_type,
                default_min,
                default_max,
                ..
            } => range_value(*value_type, *default_min, *default_max),
            Self::SingleOption { default, .. } => default.clone(),
            Self::MultiOption { default, .. } => Value::Array(default.clone()),
            Self::RandomSeed { .. } => Value::Null,
        }
    }

    fn assert_valid_default(&self) {
        let checked = self.validate(&self.default_value());
        if !checked.ok {
            panic!(
                "parameter '{}': default {} violates its own rule: {}",
                self.name(),
                self.default_value(),
                checked.note
            );
        }
        if let Self::Number { name, min, max, .. } | Self::Range { name, min, max, .. } = self {
            if min > max {
                panic!("parameter '{name}': empty bounds [{min}, {max}]");
            }
        }
    }

    /// Validate a raw value against this spec.
    ///
    /// Hard failures (wrong type, no usable entries) revert to the default;
    /// soft failures (out-of-bounds, reversed range pair, dropped entries)
    /// produce a corrected value. Either way the returned value is usable.
    pub fn validate(&self, raw: &Value) -> Validation {
        match self {
            Self::Number {
                name,
                value_type,
                default,
                min,
                max,
            } => validate_number(name, *value_type, default, *min, *max, raw),
            Self::Range {
                name,
                value_type,
                default_min,
                default_max,
                min,
                max,
            } => validate_range(name, *value_type, (*default_min, *default_max), *min, *max, raw),
            Self::SingleOption {
                name,
                default,
                options,
            } => validate_single_option(name, default, options, raw),
            Self::MultiOption {
                name,
                default,
                options,
            } => validate_multi_option(name, default, options, raw),
            Self::RandomSeed { name } => validate_seed(name, raw),
        }
    }
}

fn range_value(value_type: NumberType, min: f64, max: f64) -> Value {
    let mut pair = serde_json::Map::new();
    pair.insert("min".to_string(), value_type.render(min));
    pair.insert("max".to_string(), value_type.render(max));
    Value::Object(pair)
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

/// Extract a numeric value, noting a cross-representation cast.
///
/// Returns `None` for non-numeric input; otherwise the value as `f64`
/// together with an optional cast note.
fn extract_number(name: &str, value_type: NumberType, raw: &Value) -> Option<(f64, Option<String>)> {
    let numeric = raw.as_f64()?;
    let is_integer_repr = raw.is_i64() || raw.is_u64();
    match (value_type, is_integer_repr) {
        (NumberType::Integer, false) => Some((
            numeric.trunc(),
            Some(format!("cast {raw} to integer for '{name}'")),
        )),
        (NumberType::Float, true) => Some((
            numeric,
            Some(format!("cast {raw} to float for '{name}'")),
        )),
        _ => Some((numeric, None)),
    }
}

fn validate_number(
    name: &str,
    value_type: NumberType,
    default: &Value,
    min: f64,
    max: f64,
    raw: &Value,
) -> Validation {
    let Some((numeric, cast_note)) = extract_number(name, value_type, raw) else {
        return Validation::corrected(
            default.clone(),
            format!(
                "expected {} for '{name}', got {}; using default {default}",
                value_type.label(),
                json_type_name(raw)
            ),
        );
    };

    let mut notes: Vec<String> = cast_note.into_iter().collect();
    let clamped = if numeric < min {
        notes.push(format!("value {numeric} for '{name}' below minimum {min}; clamped"));
        min
    } else if numeric > max {
        notes.push(format!("value {numeric} for '{name}' above maximum {max}; clamped"));
        max
    } else {
        numeric
    };

    let value = value_type.render(clamped);
    let note = notes.join("; ");
    if clamped != numeric {
        Validation::corrected(value, note)
    } else if note.is_empty() {
        Validation::accepted(value)
    } else {
        Validation::coerced(value, note)
    }
}

fn validate_range(
    name: &str,
    value_type: NumberType,
    default: (f64, f64),
    min: f64,
    max: f64,
    raw: &Value,
) -> Validation {
    let fallback = range_value(value_type, default.0, default.1);
    let Some(pair) = raw.as_object() else {
        return Validation::corrected(
            fallback,
            format!(
                "expected a {{min, max}} pair for '{name}', got {}; using default",
                json_type_name(raw)
            ),
        );
    };
    let (Some(raw_min), Some(raw_max)) = (pair.get("min"), pair.get("max")) else {
        return Validation::corrected(
            fallback,
            format!("'{name}' pair is missing a min or max field; using default"),
        );
    };

    // Each endpoint follows the plain numeric rules against the full bounds.
    let default_value = Value::from(default.0);
    let lo = validate_number(name, value_type, &default_value, min, max, raw_min);
    let default_value = Value::from(default.1);
    let hi = validate_number(name, value_type, &default_value, min, max, raw_max);

    let mut ok = lo.ok && hi.ok;
    let mut notes: Vec<String> = [lo.note, hi.note]
        .into_iter()
        .filter(|n| !n.is_empty())
        .collect();

    let mut lo_value = lo.value.as_f64().unwrap_or(default.0);
    let mut hi_value = hi.value.as_f64().unwrap_or(default.1);
    if lo_value > hi_value {
        // Swap-and-warn: the reversed pair is corrected and used, but the
        // result is flagged so callers can report it.
        notes.push(format!(
            "'{name}' min {lo_value} exceeds max {hi_value}; swapped"
        ));
        std::mem::swap(&mut lo_value, &mut hi_value);
        ok = false;
    }

    let value = range_value(value_type, lo_value, hi_value);
    let note = notes.join("; ");
    if ok {
        Validation::accepted_or_coerced(value, note)
    } else {
        Validation::corrected(value, note)
    }
}

fn validate_single_option(
    name: &str,
    default: &Value,
    options: &[Value],
    raw: &Value,
) -> Validation {
    if options.contains(raw) {
        return Validation::accepted(raw.clone());
    }
    Validation::corrected(
        default.clone(),
        format!("invalid option {raw} for '{name}'; using default {default}"),
    )
}

fn validate_multi_option(
    name: &str,
    default: &[Value],
    options: &[Value],
    raw: &Value,
) -> Validation {
    let Some(entries) = raw.as_array() else {
        return Validation::corrected(
            Value::Array(default.to_vec()),
            format!(
                "expected a list for '{name}', got {}; using default",
                json_type_name(raw)
            ),
        );
    };

    let mut survivors: Vec<Value> = Vec::new();
    let mut notes: Vec<String> = Vec::new();
    for entry in entries {
        if !options.contains(entry) {
            notes.push(format!("invalid entry {entry} for '{name}'"));
        } else if survivors.contains(entry) {
            notes.push(format!("duplicate entry {entry} for '{name}'"));
        } else {
            survivors.push(entry.clone());
        }
    }

    if survivors.is_empty() {
        notes.push(format!("no valid entries left for '{name}'; using default"));
        return Validation::corrected(Value::Array(default.to_vec()), notes.join("; "));
    }
    let value = Value::Array(survivors);
    if notes.is_empty() {
        Validation::accepted(value)
    } else {
        Validation::corrected(value, notes.join("; "))
    }
}

fn validate_seed(name: &str, raw: &Value) -> Validation {
    // "Unset" is part of the domain: the algorithm seeds itself at use-time.
    if raw.is_null() {
        return Validation::accepted(Value::Null);
    }
    validate_number(
        name,
        NumberType::Integer,
        &Value::Null,
        0.0,
        i64::MAX as f64,
        raw,
    )
}

/// An ordered, name-keyed collection of parameter specs for one component.
///
/// A fresh instance is produced per resolution and never shared or mutated
/// across resolutions.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParameterSet {
    specs: Vec<ParamSpec>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self { specs: Vec::new() }
    }

    /// Add a spec, builder-style.
    ///
    /// # Panics
    ///
    /// Panics if a spec with the same name was already added.
    pub fn with(mut self, spec: ParamSpec) -> Self {
        self.push(spec);
        self
    }

    /// Add a spec.
    ///
    /// # Panics
    ///
    /// Panics if a spec with the same name was already added.
    pub fn push(&mut self, spec: ParamSpec) {
        if self.contains(spec.name()) {
            panic!("duplicate parameter '{}' in parameter set", spec.name());
        }
        self.specs.push(spec);
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.specs.iter().find(|s| s.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Parameter names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name()).collect()
    }

    /// Extract every spec's default into a name -> value map.
    pub fn defaults(&self) -> BTreeMap<String, Value> {
        self.specs
            .iter()
            .map(|s| (s.name().to_string(), s.default_value()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
