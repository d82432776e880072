pub mod archive;
pub mod builtin;
pub mod checkpoint;
pub mod cli;
pub mod episode;
pub mod error;
pub mod logging;
pub mod params;
pub mod plugin;
pub mod registry;
pub mod runner;
pub mod sync;

pub use checkpoint::{CheckpointPolicy, RunState};
pub use cli::{Cli, RunMode};
pub use episode::{Episode, RewardHistory};
pub use error::{Result, UniError};
pub use params::{Cleaner, ParameterResolver};
pub use plugin::{Agent, Environment, StepOutcome, Transition};
pub use registry::{AgentRegistry, EnvironmentRegistry};
pub use runner::{RunnerOptions, TrainingRunner, ALGORITHM_VAR, ENVIRONMENT_VAR};
pub use sync::{interpret_publish_status, Heartbeat, PublishOutcome, RemoteSyncClient, SyncConfig};
