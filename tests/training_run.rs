//! End-to-end runner behavior against scripted plugins, fully offline.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use serde_json::{json, Value};
use tempfile::tempdir;

use uni::cli::RunMode;
use uni::error::{Result, UniError};
use uni::plugin::{Agent, Environment, StepOutcome, Transition};
use uni::registry::{AgentRegistry, EnvironmentRegistry};
use uni::runner::{RunnerOptions, TrainingRunner};

#[derive(Default)]
struct CallLog {
    events: Vec<String>,
    prepares: usize,
    loads: usize,
    saves: usize,
    actions: usize,
    train_actions: usize,
    post_steps: usize,
}

type SharedLog = Rc<RefCell<CallLog>>;

/// Deterministic environment: every episode lasts `steps_per_episode`
/// steps and each step pays the current episode number, so totals rise
/// monotonically and every checkpoint evaluation sees an improvement.
struct ScriptedEnv {
    steps_per_episode: u64,
    episode: u64,
    step: u64,
    log: SharedLog,
}

impl ScriptedEnv {
    fn new(steps_per_episode: u64, log: SharedLog) -> Self {
        Self {
            steps_per_episode,
            episode: 0,
            step: 0,
            log,
        }
    }
}

impl Environment for ScriptedEnv {
    fn reset(&mut self) -> Result<Value> {
        self.episode += 1;
        self.step = 0;
        self.log.borrow_mut().events.push("reset".to_string());
        Ok(json!(0))
    }

    fn step(&mut self, _action: &Value) -> Result<StepOutcome> {
        self.step += 1;
        self.log.borrow_mut().events.push("step".to_string());
        Ok(StepOutcome {
            observation: json!(self.step),
            reward: self.episode as f64,
            done: self.step >= self.steps_per_episode,
            diagnostics: json!({}),
        })
    }

    fn action_space(&self) -> Value {
        json!({ "type": "discrete", "n": 2 })
    }

    fn observation_space(&self) -> Value {
        json!({ "type": "discrete", "n": 8 })
    }
}

struct ScriptedAgent {
    log: SharedLog,
    /// Error out of `action` once this many demo actions were taken;
    /// stands in for external termination of the endless run mode.
    fail_after_actions: Option<usize>,
}

impl ScriptedAgent {
    fn new(log: SharedLog) -> Self {
        Self {
            log,
            fail_after_actions: None,
        }
    }
}

impl Agent for ScriptedAgent {
    fn action(&mut self, _episode: u64, _step: u64, _observation: &Value) -> Result<Value> {
        let mut log = self.log.borrow_mut();
        log.actions += 1;
        log.events.push("action".to_string());
        if let Some(limit) = self.fail_after_actions {
            if log.actions > limit {
                return Err(UniError::Fatal("terminated".to_string()));
            }
        }
        Ok(json!(1))
    }

    fn action_train(&mut self, _episode: u64, _step: u64, _observation: &Value) -> Result<Value> {
        let mut log = self.log.borrow_mut();
        log.train_actions += 1;
        log.events.push("action_train".to_string());
        Ok(json!(1))
    }

    fn prepare(&mut self) -> Result<()> {
        let mut log = self.log.borrow_mut();
        log.prepares += 1;
        log.events.push("prepare".to_string());
        Ok(())
    }

    fn pre_episode(&mut self, episode: u64) -> Result<()> {
        self.log
            .borrow_mut()
            .events
            .push(format!("pre_episode {episode}"));
        Ok(())
    }

    fn post_step(&mut self, transition: &Transition) -> Result<()> {
        let mut log = self.log.borrow_mut();
        log.post_steps += 1;
        log.events
            .push(format!("post_step {}/{}", transition.episode, transition.step));
        Ok(())
    }

    fn post_episode(&mut self, episode: u64) -> Result<()> {
        self.log
            .borrow_mut()
            .events
            .push(format!("post_episode {episode}"));
        Ok(())
    }

    fn save(&mut self, directory: &Path) -> Result<()> {
        std::fs::create_dir_all(directory)?;
        std::fs::write(directory.join("model.bin"), b"weights")?;
        let mut log = self.log.borrow_mut();
        log.saves += 1;
        log.events.push("save".to_string());
        Ok(())
    }

    fn load(&mut self, _directory: &Path) -> Result<()> {
        let mut log = self.log.borrow_mut();
        log.loads += 1;
        log.events.push("load".to_string());
        Ok(())
    }

    fn parameters(&self) -> BTreeMap<String, Value> {
        [("MAX_STEPS".to_string(), json!(10))].into()
    }
}

fn registries(
    log: &SharedLog,
    steps_per_episode: u64,
    fail_after_actions: Option<usize>,
) -> (EnvironmentRegistry, AgentRegistry) {
    let mut environments = EnvironmentRegistry::new();
    let env_log = Rc::clone(log);
    environments.register("scripted", move || {
        Box::new(ScriptedEnv::new(steps_per_episode, Rc::clone(&env_log)))
    });

    let mut agents = AgentRegistry::new();
    let agent_log = Rc::clone(log);
    agents.register("scripted", move |_obs_space, _action_space| {
        let mut agent = ScriptedAgent::new(Rc::clone(&agent_log));
        agent.fail_after_actions = fail_after_actions;
        Box::new(agent)
    });

    (environments, agents)
}

fn options(output_dir: &Path, extra: &[(&str, &str)]) -> RunnerOptions {
    let mut overrides = vec![(
        "UNI_OUTPUT_DIR".to_string(),
        output_dir.to_string_lossy().into_owned(),
    )];
    overrides.extend(
        extra
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
    );
    RunnerOptions {
        environment: Some("scripted".to_string()),
        algorithm: Some("scripted".to_string()),
        overrides,
        local: true,
        render: false,
    }
}

#[test]
fn training_calls_every_hook_in_order() {
    let log: SharedLog = Rc::default();
    let (environments, agents) = registries(&log, 3, None);
    let dir = tempdir().unwrap();
    let opts = options(
        dir.path(),
        &[
            ("EPISODES", "4"),
            ("UNI_SAVE_SPACING", "0"),
            ("UNI_SCORE_WINDOW", "1"),
        ],
    );

    let mut runner = TrainingRunner::with_registries(opts, &environments, &agents).unwrap();
    runner.run(RunMode::Train).unwrap();

    let log = log.borrow();
    assert_eq!(log.prepares, 1);
    assert_eq!(log.train_actions, 4 * 3);
    assert_eq!(log.post_steps, 4 * 3);
    assert_eq!(log.actions, 0, "train mode must not use the demo action");

    // first episode, event by event
    let expected = [
        "prepare",
        "reset",
        "pre_episode 1",
        "action_train",
        "step",
        "post_step 1/1",
        "action_train",
        "step",
        "post_step 1/2",
        "action_train",
        "step",
        "post_step 1/3",
        "post_episode 1",
        "save",
    ];
    assert_eq!(&log.events[..expected.len()], &expected[..]);
}

#[test]
fn training_checkpoints_on_strict_improvement_with_spacing() {
    let log: SharedLog = Rc::default();
    let (environments, agents) = registries(&log, 2, None);
    let dir = tempdir().unwrap();
    // totals are 2, 4, 6, 8, 10, 12; spacing of 2 admits episodes 3 and 6
    let opts = options(
        dir.path(),
        &[
            ("EPISODES", "6"),
            ("UNI_SAVE_SPACING", "2"),
            ("UNI_SCORE_WINDOW", "1"),
        ],
    );

    let mut runner = TrainingRunner::with_registries(opts, &environments, &agents).unwrap();
    runner.run(RunMode::Train).unwrap();

    assert_eq!(log.borrow().saves, 2);
    assert_eq!(runner.history().len(), 6);
    assert_eq!(runner.run_state().last_saved_episode, 6);
    assert_eq!(runner.run_state().last_saved_score, Some(12.0));
    assert!(dir.path().join("model.bin").exists());
}

#[test]
fn run_mode_never_trains_or_saves() {
    let log: SharedLog = Rc::default();
    let (environments, agents) = registries(&log, 2, Some(7));
    let dir = tempdir().unwrap();
    let opts = options(dir.path(), &[]);

    let mut runner = TrainingRunner::with_registries(opts, &environments, &agents).unwrap();
    // the loop only ends because the agent simulates external termination
    let err = runner.run(RunMode::Run).unwrap_err();
    assert_eq!(err.exit_code(), 1);

    let log = log.borrow();
    assert_eq!(log.loads, 1);
    assert!(log.actions > 7);
    assert_eq!(log.train_actions, 0, "run mode must never call action_train");
    assert_eq!(log.saves, 0, "run mode must never save");
    assert_eq!(log.prepares, 0);
    assert!(runner.history().is_empty(), "run mode keeps no training bookkeeping");
}

#[test]
fn missing_episode_budget_is_a_configuration_error() {
    let log: SharedLog = Rc::default();
    let (environments, agents) = registries(&log, 2, None);
    let dir = tempdir().unwrap();
    // MAX_STEPS comes from the agent's declared defaults; EPISODES has
    // no source at all
    let opts = options(dir.path(), &[]);

    let mut runner = TrainingRunner::with_registries(opts, &environments, &agents).unwrap();
    let err = runner.run(RunMode::Train).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("EPISODES"));
    assert_eq!(log.borrow().prepares, 0, "nothing runs on bad configuration");
}

#[test]
fn agent_declared_defaults_feed_the_resolver() {
    let log: SharedLog = Rc::default();
    let (environments, agents) = registries(&log, 5, None);
    let dir = tempdir().unwrap();
    // MAX_STEPS=10 from the agent default caps episodes that never
    // signal done on their own
    let opts = options(
        dir.path(),
        &[("EPISODES", "1"), ("UNI_SAVE_SPACING", "50")],
    );

    let mut runner = TrainingRunner::with_registries(opts, &environments, &agents).unwrap();
    runner.run(RunMode::Train).unwrap();
    assert_eq!(log.borrow().post_steps, 5, "episode ends on done, not on the cap");
    assert_eq!(runner.history().len(), 1);
    assert_eq!(log.borrow().saves, 0, "spacing of 50 blocks the save");
}
