//! Training orchestration.
//!
//! One runner owns one environment, one agent, the reward history and
//! the run state, and drives them sequentially: prepare, episode loop,
//! checkpoint decision after every episode, remote progress reports,
//! and the final run notification. Nothing here knows what an
//! observation, action, or reward means.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::checkpoint::{CheckpointPolicy, RunState};
use crate::cli::RunMode;
use crate::episode::{Episode, RewardHistory};
use crate::error::{Result, UniError};
use crate::params::{cleaners, Cleaner, ParameterResolver};
use crate::plugin::{Agent, Environment, Transition};
use crate::registry::{self, AgentRegistry, EnvironmentRegistry};
use crate::sync::{RemoteSyncClient, SyncConfig};

/// Environment variable naming the environment plugin id.
pub const ENVIRONMENT_VAR: &str = "UNI_ENVIRONMENT";
/// Environment variable naming the algorithm plugin id.
pub const ALGORITHM_VAR: &str = "UNI_ALGORITHM";

/// Everything the CLI hands over to build a runner.
#[derive(Debug, Default, Clone)]
pub struct RunnerOptions {
    pub environment: Option<String>,
    pub algorithm: Option<String>,
    /// `--set NAME VALUE` pairs; highest-precedence parameter source.
    pub overrides: Vec<(String, String)>,
    /// Disable remote run tracking.
    pub local: bool,
    /// Render episodes in run mode.
    pub render: bool,
}

fn runner_defaults() -> BTreeMap<String, Value> {
    [
        ("UNI_OUTPUT_DIR".to_string(), json!("/tmp/uni-models/")),
        ("UNI_SCORE_WINDOW".to_string(), json!(10)),
        ("UNI_SAVE_SPACING".to_string(), json!(20)),
        ("UNI_SYNC_INTERVAL_SECS".to_string(), json!(5)),
        ("UNI_API_TOKEN".to_string(), Value::Null),
    ]
    .into()
}

fn runner_cleaners() -> BTreeMap<String, Cleaner> {
    [
        ("EPISODES".to_string(), cleaners::int as Cleaner),
        ("MAX_STEPS".to_string(), cleaners::int as Cleaner),
        ("UNI_SCORE_WINDOW".to_string(), cleaners::int as Cleaner),
        ("UNI_SAVE_SPACING".to_string(), cleaners::int as Cleaner),
        ("UNI_SYNC_INTERVAL_SECS".to_string(), cleaners::int as Cleaner),
    ]
    .into()
}

pub struct TrainingRunner {
    environment: Box<dyn Environment>,
    agent: Box<dyn Agent>,
    params: ParameterResolver,
    policy: CheckpointPolicy,
    state: RunState,
    history: RewardHistory,
    sync: Option<RemoteSyncClient>,
    local: bool,
    render: bool,
}

impl TrainingRunner {
    /// Build a runner over the built-in plugin registries.
    pub fn new(options: RunnerOptions) -> Result<Self> {
        Self::with_registries(
            options,
            &registry::default_environments(),
            &registry::default_agents(),
        )
    }

    /// Build a runner over caller-provided registries.
    ///
    /// Resolves both plugin ids, constructs the plugins, snapshots the
    /// parameter sources, and configures the plugins from the snapshot.
    pub fn with_registries(
        options: RunnerOptions,
        environments: &EnvironmentRegistry,
        agents: &AgentRegistry,
    ) -> Result<Self> {
        // env-var fallback for these two lives in the CLI layer (clap's
        // `env` attribute), nowhere else
        let environment_id = options.environment.clone().ok_or_else(|| {
            UniError::Configuration(format!("set {ENVIRONMENT_VAR} or pass --environment"))
        })?;
        let algorithm_id = options.algorithm.clone().ok_or_else(|| {
            UniError::Configuration(format!("set {ALGORITHM_VAR} or pass --algorithm"))
        })?;

        info!("loading environment {environment_id}");
        let mut environment = environments.create(&environment_id)?;
        info!("loading algorithm {algorithm_id}");
        let mut agent = agents.create(
            &algorithm_id,
            environment.observation_space(),
            environment.action_space(),
        )?;

        let overrides = options
            .overrides
            .into_iter()
            .map(|(name, value)| (name, Value::String(value)))
            .collect();
        let params = ParameterResolver::new(overrides)
            .with_runner_defaults(runner_defaults())
            .with_agent_defaults(agent.parameters())
            .with_environment_defaults(environment.parameters())
            .with_runner_cleaners(runner_cleaners())
            .with_agent_cleaners(agent.cleaners())
            .with_environment_cleaners(environment.cleaners());

        environment.configure(&params)?;
        agent.configure(&params)?;

        let window = positive(params.resolve_i64("UNI_SCORE_WINDOW")?, "UNI_SCORE_WINDOW")?;
        let spacing = non_negative(params.resolve_i64("UNI_SAVE_SPACING")?, "UNI_SAVE_SPACING")?;
        let policy = CheckpointPolicy::new(window as usize, spacing);

        Ok(Self {
            environment,
            agent,
            params,
            policy,
            state: RunState::new(),
            history: RewardHistory::new(),
            sync: None,
            local: options.local,
            render: options.render,
        })
    }

    /// Completed-episode totals so far.
    pub fn history(&self) -> &RewardHistory {
        &self.history
    }

    pub fn run_state(&self) -> &RunState {
        &self.state
    }

    /// Run the requested mode to completion and handle the final
    /// remote notification on both the success and the failure path.
    pub fn run(&mut self, mode: RunMode) -> Result<()> {
        info!("starting uni in {mode} mode");
        let result = match mode {
            RunMode::Train => self.train(),
            RunMode::Run => self.run_model(),
            RunMode::Info => self.info(),
        };

        // Best-effort: a failure here is logged inside the client and
        // never masks the run outcome.
        let completed = self.history.len() as u64;
        if let Some(sync) = self.sync.as_mut() {
            sync.report_episodes(completed, true);
            sync.finish(result.is_err());
        }

        result
    }

    fn train(&mut self) -> Result<()> {
        let episodes = positive(self.params.resolve_i64("EPISODES")?, "EPISODES")?;
        let max_steps = positive(self.params.resolve_i64("MAX_STEPS")?, "MAX_STEPS")?;
        let output_dir = self.params.resolve_path("UNI_OUTPUT_DIR")?;

        if !self.local {
            self.sync = Some(RemoteSyncClient::new(self.sync_config()?)?);
        }

        self.agent.prepare()?;

        for episode in 1..=episodes {
            info!("running episode #{episode}");
            let total = self.run_training_episode(episode, max_steps)?;
            self.history.push(total);

            if let Some(score) = self.policy.score(&self.history) {
                if self.policy.should_save(score, episode, &self.state) {
                    self.save_model(score, episode, &output_dir)?;
                }
            }

            let completed = self.history.len() as u64;
            if let Some(sync) = self.sync.as_mut() {
                sync.report_episodes(completed, false);
            }
        }

        Ok(())
    }

    fn run_training_episode(&mut self, index: u64, max_steps: u64) -> Result<f64> {
        let mut episode = Episode::new(index);
        let mut observation = self.environment.reset()?;
        self.agent.pre_episode(index)?;

        for step in 1..=max_steps {
            let action = self.agent.action_train(index, step, &observation)?;
            let outcome = self.environment.step(&action)?;
            let transition = Transition {
                episode: index,
                step,
                observation,
                action,
                next_observation: outcome.observation.clone(),
                reward: outcome.reward,
                done: outcome.done,
                diagnostics: outcome.diagnostics,
            };
            self.agent.post_step(&transition)?;
            episode.record(transition);
            observation = outcome.observation;

            if outcome.done {
                info!("episode #{index} is done after {} steps", episode.steps());
                break;
            }
        }

        self.agent.post_episode(index)?;
        debug!("episode #{index} total reward {}", episode.total_reward);
        Ok(episode.total_reward)
    }

    fn save_model(&mut self, score: f64, episode: u64, output_dir: &Path) -> Result<()> {
        info!(
            "saving model with score {score} to {}",
            output_dir.display()
        );
        self.agent.save(output_dir)?;
        self.state.record_save(score, episode);
        if let Some(sync) = self.sync.as_ref() {
            sync.publish_model(score, output_dir);
        }
        Ok(())
    }

    /// Evaluation/demo loop: load a persisted model once, then play
    /// episodes with the agent's non-training action until terminated
    /// externally. No scoring, saving, or uploading happens here.
    fn run_model(&mut self) -> Result<()> {
        let output_dir = self.params.resolve_path("UNI_OUTPUT_DIR")?;
        self.agent.load(&output_dir)?;

        let mut episode: u64 = 0;
        loop {
            episode += 1;
            let mut observation = self.environment.reset()?;
            let mut total = 0.0;
            let mut step: u64 = 0;

            loop {
                step += 1;
                if self.render {
                    self.environment.render();
                }
                let action = self.agent.action(episode, step, &observation)?;
                let outcome = self.environment.step(&action)?;
                total += outcome.reward;
                observation = outcome.observation;
                if outcome.done {
                    break;
                }
            }

            info!("episode #{episode} reward {total}");
        }
    }

    /// Pre-flight check: resolve both plugins and show what they
    /// declare.
    fn info(&mut self) -> Result<()> {
        info!(
            "environment observation space: {}",
            self.environment.observation_space()
        );
        info!("environment action space: {}", self.environment.action_space());
        for (name, value) in self.environment.parameters() {
            info!("environment parameter {name} = {value}");
        }
        for (name, value) in self.agent.parameters() {
            info!("algorithm parameter {name} = {value}");
        }
        Ok(())
    }

    fn sync_config(&self) -> Result<SyncConfig> {
        let token = match self.params.resolve("UNI_API_TOKEN")? {
            Value::Null => None,
            Value::String(token) => Some(token),
            other => {
                return Err(UniError::Configuration(format!(
                    "parameter UNI_API_TOKEN value `{other}` is in the wrong format (expected string or null)"
                )))
            }
        };
        let interval =
            non_negative(self.params.resolve_i64("UNI_SYNC_INTERVAL_SECS")?, "UNI_SYNC_INTERVAL_SECS")?;

        Ok(SyncConfig {
            api_url: self
                .params
                .resolve_str("UNI_API_URL")?
                .trim_end_matches('/')
                .to_string(),
            run_id: self.params.resolve_str("UNI_RUN_ID")?,
            instance_id: self.params.resolve_str("UNI_INSTANCE_ID")?,
            token,
            interval: Duration::from_secs(interval),
        })
    }
}

fn positive(value: i64, name: &str) -> Result<u64> {
    u64::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| {
            UniError::Configuration(format!("{name} must be a positive integer, got {value}"))
        })
}

fn non_negative(value: i64, name: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| {
        UniError::Configuration(format!("{name} must not be negative, got {value}"))
    })
}
