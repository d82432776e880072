//! Plugin registries.
//!
//! Agents and environments are resolved from a stable identifier to a
//! constructor, validated at startup. An unknown id is a typed
//! configuration error rather than a load failure deep inside a run.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::builtin::{RandomAgent, RandomWalkEnv};
use crate::error::{Result, UniError};
use crate::plugin::{Agent, Environment};

type EnvironmentCtor = Box<dyn Fn() -> Box<dyn Environment>>;

/// Agent constructors receive the environment's observation and action
/// spaces.
type AgentCtor = Box<dyn Fn(Value, Value) -> Box<dyn Agent>>;

#[derive(Default)]
pub struct EnvironmentRegistry {
    entries: BTreeMap<String, EnvironmentCtor>,
}

impl EnvironmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, id: &str, ctor: F)
    where
        F: Fn() -> Box<dyn Environment> + 'static,
    {
        self.entries.insert(id.to_string(), Box::new(ctor));
    }

    pub fn create(&self, id: &str) -> Result<Box<dyn Environment>> {
        match self.entries.get(id) {
            Some(ctor) => Ok(ctor()),
            None => Err(unknown_plugin("environment", id, self.ids())),
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

#[derive(Default)]
pub struct AgentRegistry {
    entries: BTreeMap<String, AgentCtor>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, id: &str, ctor: F)
    where
        F: Fn(Value, Value) -> Box<dyn Agent> + 'static,
    {
        self.entries.insert(id.to_string(), Box::new(ctor));
    }

    pub fn create(
        &self,
        id: &str,
        observation_space: Value,
        action_space: Value,
    ) -> Result<Box<dyn Agent>> {
        match self.entries.get(id) {
            Some(ctor) => Ok(ctor(observation_space, action_space)),
            None => Err(unknown_plugin("algorithm", id, self.ids())),
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

fn unknown_plugin(kind: &str, id: &str, known: Vec<&str>) -> UniError {
    UniError::Configuration(format!(
        "unknown {kind} `{id}`; registered: {}",
        known.join(", ")
    ))
}

/// Registry with the built-in demo environment.
pub fn default_environments() -> EnvironmentRegistry {
    let mut registry = EnvironmentRegistry::new();
    registry.register("random-walk", || Box::new(RandomWalkEnv::new()));
    registry
}

/// Registry with the built-in demo agent.
pub fn default_agents() -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    registry.register("random", |observation_space, action_space| {
        Box::new(RandomAgent::new(observation_space, action_space))
    });
    registry
}
