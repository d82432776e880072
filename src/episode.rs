//! Episode bookkeeping.

use crate::plugin::Transition;

/// One training or evaluation pass through the environment.
///
/// Lives from `reset` until its total reward is folded into the
/// [`RewardHistory`].
#[derive(Debug, Default)]
pub struct Episode {
    pub index: u64,
    pub total_reward: f64,
    pub transitions: Vec<Transition>,
}

impl Episode {
    pub fn new(index: u64) -> Self {
        Self {
            index,
            total_reward: 0.0,
            transitions: Vec::new(),
        }
    }

    pub fn record(&mut self, transition: Transition) {
        self.total_reward += transition.reward;
        self.transitions.push(transition);
    }

    pub fn steps(&self) -> u64 {
        self.transitions.len() as u64
    }
}

/// Append-only per-episode total rewards; one entry per completed
/// episode, for the lifetime of the run.
#[derive(Debug, Default)]
pub struct RewardHistory {
    totals: Vec<f64>,
}

impl RewardHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, total: f64) {
        self.totals.push(total);
    }

    /// Number of completed episodes.
    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn totals(&self) -> &[f64] {
        &self.totals
    }
}
