//! Layered run-parameter resolution.
//!
//! A parameter is searched within different sources in a fixed order:
//! command-line overrides (`--set`), process environment variables,
//! runner defaults, agent-declared defaults, environment-declared
//! defaults. The first source containing the name wins. A present
//! `null` is a valid value, distinct from an absent name.
//!
//! After a parameter is found, at most one cleaner is applied (converts
//! the raw value into the desired type). Cleaners are looked up in
//! runner, then agent, then environment order.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;

use crate::error::{Result, UniError};

/// Converts a raw parameter value into a typed one, or rejects it with
/// a reason.
pub type Cleaner = fn(&Value) -> std::result::Result<Value, String>;

/// Immutable parameter snapshot built once at startup.
///
/// Resolution is pure: repeated calls with the same snapshot return the
/// same value. The process environment is captured at construction
/// time.
pub struct ParameterResolver {
    overrides: BTreeMap<String, Value>,
    environ: BTreeMap<String, Value>,
    runner_defaults: BTreeMap<String, Value>,
    agent_defaults: BTreeMap<String, Value>,
    environment_defaults: BTreeMap<String, Value>,
    cleaner_layers: [BTreeMap<String, Cleaner>; 3],
}

impl ParameterResolver {
    /// Create a snapshot seeded with command-line overrides; the
    /// process environment is captured here.
    pub fn new(overrides: BTreeMap<String, Value>) -> Self {
        let environ = std::env::vars()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        Self {
            overrides,
            environ,
            runner_defaults: BTreeMap::new(),
            agent_defaults: BTreeMap::new(),
            environment_defaults: BTreeMap::new(),
            cleaner_layers: [BTreeMap::new(), BTreeMap::new(), BTreeMap::new()],
        }
    }

    /// Replace the captured environment map (used by tests).
    pub fn with_environ(mut self, environ: BTreeMap<String, Value>) -> Self {
        self.environ = environ;
        self
    }

    pub fn with_runner_defaults(mut self, defaults: BTreeMap<String, Value>) -> Self {
        self.runner_defaults = defaults;
        self
    }

    pub fn with_agent_defaults(mut self, defaults: BTreeMap<String, Value>) -> Self {
        self.agent_defaults = defaults;
        self
    }

    pub fn with_environment_defaults(mut self, defaults: BTreeMap<String, Value>) -> Self {
        self.environment_defaults = defaults;
        self
    }

    pub fn with_runner_cleaners(mut self, cleaners: BTreeMap<String, Cleaner>) -> Self {
        self.cleaner_layers[0] = cleaners;
        self
    }

    pub fn with_agent_cleaners(mut self, cleaners: BTreeMap<String, Cleaner>) -> Self {
        self.cleaner_layers[1] = cleaners;
        self
    }

    pub fn with_environment_cleaners(mut self, cleaners: BTreeMap<String, Cleaner>) -> Self {
        self.cleaner_layers[2] = cleaners;
        self
    }

    fn sources(&self) -> [&BTreeMap<String, Value>; 5] {
        [
            &self.overrides,
            &self.environ,
            &self.runner_defaults,
            &self.agent_defaults,
            &self.environment_defaults,
        ]
    }

    /// Resolve a parameter by name.
    ///
    /// Fails with a configuration error when the name is absent from
    /// all five sources, or when the registered cleaner rejects the
    /// found value.
    pub fn resolve(&self, name: &str) -> Result<Value> {
        let value = self
            .sources()
            .iter()
            .find_map(|source| source.get(name))
            .ok_or_else(|| {
                UniError::Configuration(format!("parameter {name} is missing, please define it"))
            })?;

        for cleaners in &self.cleaner_layers {
            if let Some(cleaner) = cleaners.get(name) {
                return cleaner(value).map_err(|reason| {
                    UniError::Configuration(format!(
                        "parameter {name} value `{value}` is in the wrong format ({reason})"
                    ))
                });
            }
        }

        Ok(value.clone())
    }

    pub fn resolve_i64(&self, name: &str) -> Result<i64> {
        let value = self.resolve(name)?;
        match &value {
            Value::Number(n) => n
                .as_i64()
                .ok_or_else(|| type_error(name, &value, "integer")),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| type_error(name, &value, "integer")),
            _ => Err(type_error(name, &value, "integer")),
        }
    }

    pub fn resolve_f64(&self, name: &str) -> Result<f64> {
        let value = self.resolve(name)?;
        match &value {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| type_error(name, &value, "number")),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| type_error(name, &value, "number")),
            _ => Err(type_error(name, &value, "number")),
        }
    }

    pub fn resolve_str(&self, name: &str) -> Result<String> {
        let value = self.resolve(name)?;
        match value {
            Value::String(s) => Ok(s),
            other => Err(type_error(name, &other, "string")),
        }
    }

    pub fn resolve_path(&self, name: &str) -> Result<PathBuf> {
        self.resolve_str(name).map(PathBuf::from)
    }
}

fn type_error(name: &str, value: &Value, expected: &str) -> UniError {
    UniError::Configuration(format!(
        "parameter {name} value `{value}` is in the wrong format (expected {expected})"
    ))
}

/// Standard cleaners usable by the runner and by plugins.
pub mod cleaners {
    use serde_json::Value;

    pub fn int(value: &Value) -> Result<Value, String> {
        match value {
            Value::Number(n) if n.is_i64() => Ok(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|e| e.to_string()),
            _ => Err(format!("expected an integer, got {value}")),
        }
    }

    pub fn float(value: &Value) -> Result<Value, String> {
        match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::from)
                .map_err(|e| e.to_string()),
            _ => Err(format!("expected a number, got {value}")),
        }
    }
}
