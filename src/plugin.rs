//! Capability contracts for pluggable agents and environments.
//!
//! Observations, actions and diagnostics cross the boundary as
//! `serde_json::Value`, so the runner stays agnostic of what a concrete
//! plugin pair exchanges. The runner never inspects rewards beyond
//! summation.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use crate::error::Result;
use crate::params::{Cleaner, ParameterResolver};

/// What a single environment step produces.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub observation: Value,
    pub reward: f64,
    pub done: bool,
    pub diagnostics: Value,
}

/// One completed step, as handed to the agent's `post_step` hook.
#[derive(Debug, Clone)]
pub struct Transition {
    pub episode: u64,
    pub step: u64,
    pub observation: Value,
    pub action: Value,
    pub next_observation: Value,
    pub reward: f64,
    pub done: bool,
    pub diagnostics: Value,
}

/// A simulation the agent acts in.
pub trait Environment {
    /// Start a new episode and return the initial observation.
    fn reset(&mut self) -> Result<Value>;

    /// Advance the simulation by one action.
    fn step(&mut self, action: &Value) -> Result<StepOutcome>;

    fn action_space(&self) -> Value;

    fn observation_space(&self) -> Value;

    /// Draw the current state somewhere a human can see it. Optional.
    fn render(&mut self) {}

    /// Parameter defaults this environment declares (lowest-precedence
    /// source).
    fn parameters(&self) -> BTreeMap<String, Value> {
        BTreeMap::new()
    }

    fn cleaners(&self) -> BTreeMap<String, Cleaner> {
        BTreeMap::new()
    }

    /// Called once, after the parameter snapshot is built and before
    /// the first episode.
    fn configure(&mut self, _params: &ParameterResolver) -> Result<()> {
        Ok(())
    }
}

/// A learning algorithm driven by the runner.
///
/// Hooks are invoked at exactly one point each per episode or step, and
/// never concurrently for the same instance.
pub trait Agent {
    /// Pick an action for evaluation/demo runs.
    fn action(&mut self, episode: u64, step: u64, observation: &Value) -> Result<Value>;

    /// Pick an action during training; defaults to `action`.
    fn action_train(&mut self, episode: u64, step: u64, observation: &Value) -> Result<Value> {
        self.action(episode, step, observation)
    }

    /// One-time setup before the first episode, e.g. making sure the
    /// output directory exists.
    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    fn pre_episode(&mut self, _episode: u64) -> Result<()> {
        Ok(())
    }

    fn post_step(&mut self, _transition: &Transition) -> Result<()> {
        Ok(())
    }

    fn post_episode(&mut self, _episode: u64) -> Result<()> {
        Ok(())
    }

    /// Persist the current model into `directory`.
    fn save(&mut self, directory: &Path) -> Result<()>;

    /// Restore a previously saved model from `directory`.
    fn load(&mut self, directory: &Path) -> Result<()>;

    fn parameters(&self) -> BTreeMap<String, Value> {
        BTreeMap::new()
    }

    fn cleaners(&self) -> BTreeMap<String, Cleaner> {
        BTreeMap::new()
    }

    fn configure(&mut self, _params: &ParameterResolver) -> Result<()> {
        Ok(())
    }
}
