//! Built-in demo plugins.
//!
//! A bounded random-walk environment and a random-policy agent, enough
//! to exercise every runner mode without external plugin crates. The
//! walk starts in the middle of a track; reaching the right end pays
//! +1, falling off the left end costs -1, and every step costs a little
//! so shorter walks score better.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Result, UniError};
use crate::params::{cleaners, Cleaner, ParameterResolver};
use crate::plugin::{Agent, Environment, StepOutcome};

const POLICY_FILE: &str = "policy.json";

/// xorshift* PRNG; keeps the demo plugins seedable without pulling in a
/// full random-number crate.
#[derive(Debug, Clone)]
struct XorShift64Star {
    state: u64,
}

impl XorShift64Star {
    fn new(seed: u64) -> Self {
        Self {
            state: seed.max(1),
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }
}

/// Random walk on a line of `2 * goal + 1` cells.
pub struct RandomWalkEnv {
    goal: i64,
    position: i64,
    wind: XorShift64Star,
}

impl RandomWalkEnv {
    pub fn new() -> Self {
        Self {
            goal: 6,
            position: 0,
            wind: XorShift64Star::new(99),
        }
    }
}

impl Default for RandomWalkEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for RandomWalkEnv {
    fn reset(&mut self) -> Result<Value> {
        self.position = 0;
        Ok(json!(self.position))
    }

    fn step(&mut self, action: &Value) -> Result<StepOutcome> {
        let direction = match action.as_i64() {
            Some(0) => -1,
            Some(1) => 1,
            _ => {
                return Err(UniError::Fatal(format!(
                    "random-walk got an unrecognized action: {action}"
                )))
            }
        };

        // every fourth step or so the wind pushes the other way
        let wind_flip = self.wind.next_u64() % 4 == 0;
        self.position += if wind_flip { -direction } else { direction };
        self.position = self.position.clamp(-self.goal, self.goal);

        let done = self.position.abs() == self.goal;
        let reward = if self.position == self.goal {
            1.0
        } else if self.position == -self.goal {
            -1.0
        } else {
            -0.01
        };

        Ok(StepOutcome {
            observation: json!(self.position),
            reward,
            done,
            diagnostics: json!({ "position": self.position, "wind_flip": wind_flip }),
        })
    }

    fn action_space(&self) -> Value {
        json!({ "type": "discrete", "n": 2 })
    }

    fn observation_space(&self) -> Value {
        json!({ "type": "discrete", "low": -self.goal, "high": self.goal })
    }

    fn render(&mut self) {
        let mut track: String = (-self.goal..=self.goal)
            .map(|cell| if cell == self.position { '@' } else { '.' })
            .collect();
        track.push('G');
        println!("{track}");
    }

    fn parameters(&self) -> BTreeMap<String, Value> {
        [
            ("GOAL_DISTANCE".to_string(), json!(6)),
            ("EPISODES".to_string(), json!(300)),
            ("MAX_STEPS".to_string(), json!(200)),
        ]
        .into()
    }

    fn cleaners(&self) -> BTreeMap<String, Cleaner> {
        [("GOAL_DISTANCE".to_string(), cleaners::int as Cleaner)].into()
    }

    fn configure(&mut self, params: &ParameterResolver) -> Result<()> {
        let goal = params.resolve_i64("GOAL_DISTANCE")?;
        if goal < 1 {
            return Err(UniError::Configuration(format!(
                "GOAL_DISTANCE must be at least 1, got {goal}"
            )));
        }
        self.goal = goal;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RandomPolicy {
    kind: String,
    seed: u64,
}

/// Uniform-random policy over a discrete action space.
pub struct RandomAgent {
    actions: u64,
    rng: XorShift64Star,
    seed: u64,
}

impl RandomAgent {
    pub fn new(_observation_space: Value, action_space: Value) -> Self {
        let actions = action_space
            .get("n")
            .and_then(Value::as_u64)
            .unwrap_or(2)
            .max(1);
        Self {
            actions,
            rng: XorShift64Star::new(20121),
            seed: 20121,
        }
    }
}

impl Agent for RandomAgent {
    fn action(&mut self, _episode: u64, _step: u64, _observation: &Value) -> Result<Value> {
        Ok(json!(self.rng.next_u64() % self.actions))
    }

    fn save(&mut self, directory: &Path) -> Result<()> {
        fs::create_dir_all(directory)
            .with_context(|| format!("creating model directory {}", directory.display()))?;
        let policy = RandomPolicy {
            kind: "random".to_string(),
            seed: self.seed,
        };
        let path = directory.join(POLICY_FILE);
        fs::write(&path, serde_json::to_vec_pretty(&policy)?)
            .with_context(|| format!("writing policy file {}", path.display()))?;
        Ok(())
    }

    fn load(&mut self, directory: &Path) -> Result<()> {
        let path = directory.join(POLICY_FILE);
        let raw = fs::read_to_string(&path).map_err(|_| {
            UniError::Fatal(format!("no saved model found at {}", path.display()))
        })?;
        let policy: RandomPolicy = serde_json::from_str(&raw).map_err(|e| {
            UniError::Fatal(format!("malformed policy file {} ({e})", path.display()))
        })?;
        self.seed = policy.seed;
        self.rng = XorShift64Star::new(policy.seed);
        Ok(())
    }

    fn parameters(&self) -> BTreeMap<String, Value> {
        [("AGENT_SEED".to_string(), json!(20121))].into()
    }

    fn cleaners(&self) -> BTreeMap<String, Cleaner> {
        [("AGENT_SEED".to_string(), cleaners::int as Cleaner)].into()
    }

    fn configure(&mut self, params: &ParameterResolver) -> Result<()> {
        let seed = params.resolve_i64("AGENT_SEED")?;
        self.seed = seed as u64;
        self.rng = XorShift64Star::new(self.seed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn walk_terminates_at_either_end() {
        let mut env = RandomWalkEnv::new();
        env.goal = 2;
        env.reset().unwrap();

        let mut done = false;
        let mut last_reward = 0.0;
        for _ in 0..64 {
            let outcome = env.step(&json!(1)).unwrap();
            last_reward = outcome.reward;
            if outcome.done {
                done = true;
                break;
            }
        }
        assert!(done, "pushing right long enough must end the episode");
        assert!((last_reward - 1.0).abs() < f64::EPSILON || (last_reward + 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrecognized_action_is_fatal() {
        let mut env = RandomWalkEnv::new();
        env.reset().unwrap();
        let err = env.step(&json!("sideways")).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn agent_actions_stay_in_space() {
        let env = RandomWalkEnv::new();
        let mut agent = RandomAgent::new(env.observation_space(), env.action_space());
        for step in 0..100 {
            let action = agent.action(1, step, &json!(0)).unwrap();
            let value = action.as_u64().unwrap();
            assert!(value < 2);
        }
    }

    #[test]
    fn save_then_load_restores_the_policy() {
        let dir = tempdir().unwrap();
        let env = RandomWalkEnv::new();
        let mut agent = RandomAgent::new(env.observation_space(), env.action_space());
        agent.seed = 777;
        agent.save(dir.path()).unwrap();

        let mut restored = RandomAgent::new(env.observation_space(), env.action_space());
        restored.load(dir.path()).unwrap();
        assert_eq!(restored.seed, 777);
    }

    #[test]
    fn missing_or_malformed_policy_is_fatal() {
        let dir = tempdir().unwrap();
        let env = RandomWalkEnv::new();
        let mut agent = RandomAgent::new(env.observation_space(), env.action_space());

        let err = agent.load(dir.path()).unwrap_err();
        assert_eq!(err.exit_code(), 1);

        fs::write(dir.path().join(POLICY_FILE), b"{not json").unwrap();
        let err = agent.load(dir.path()).unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("malformed"));
    }
}
