use clap::{Parser, ValueEnum};

use crate::runner::{RunnerOptions, ALGORITHM_VAR, ENVIRONMENT_VAR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    /// Learn a policy and checkpoint it when it improves
    Train,
    /// Demo a persisted model until terminated
    Run,
    /// Show what the configured plugins declare
    Info,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RunMode::Train => "train",
            RunMode::Run => "run",
            RunMode::Info => "info",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Parser)]
#[command(name = "uni")]
#[command(version)]
#[command(about = "Pluggable reinforcement-learning training runner", long_about = None)]
pub struct Cli {
    /// Running mode
    #[arg(short, long, value_enum, default_value_t = RunMode::Train)]
    pub mode: RunMode,

    /// Environment plugin id
    #[arg(short, long, env = ENVIRONMENT_VAR)]
    pub environment: Option<String>,

    /// Algorithm plugin id
    #[arg(short, long, env = ALGORITHM_VAR)]
    pub algorithm: Option<String>,

    /// Set a run parameter; repeatable
    #[arg(short, long, num_args = 2, value_names = ["NAME", "VALUE"], action = clap::ArgAction::Append)]
    pub set: Vec<String>,

    /// Disable remote run tracking
    #[arg(long)]
    pub local: bool,

    /// Render episodes (run mode only)
    #[arg(long)]
    pub render: bool,
}

impl Cli {
    /// `--set` pairs as (name, value) tuples.
    pub fn overrides(&self) -> Vec<(String, String)> {
        self.set
            .chunks_exact(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect()
    }

    pub fn options(&self) -> RunnerOptions {
        RunnerOptions {
            environment: self.environment.clone(),
            algorithm: self.algorithm.clone(),
            overrides: self.overrides(),
            local: self.local,
            render: self.render,
        }
    }
}
