//! Checkpoint decisions.
//!
//! A model score is the mean of the trailing window of episode rewards,
//! rounded to one decimal. A model is saved only when enough episodes
//! passed since the previous save and the score strictly improved, so a
//! noisy reward signal cannot thrash the disk or the upload pipeline.

use crate::episode::RewardHistory;

/// Mutable per-run bookkeeping owned by the orchestrator.
#[derive(Debug, Default)]
pub struct RunState {
    pub last_saved_score: Option<f64>,
    pub last_saved_episode: u64,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed save. The saved episode index never moves
    /// backwards.
    pub fn record_save(&mut self, score: f64, episode: u64) {
        debug_assert!(episode >= self.last_saved_episode);
        self.last_saved_score = Some(score);
        self.last_saved_episode = episode;
    }
}

#[derive(Debug, Clone)]
pub struct CheckpointPolicy {
    window: usize,
    min_spacing: u64,
}

impl CheckpointPolicy {
    pub fn new(window: usize, min_spacing: u64) -> Self {
        Self {
            window: window.max(1),
            min_spacing,
        }
    }

    /// Trailing-window mean of the reward history, rounded to one
    /// decimal. `None` until at least one episode completed.
    pub fn score(&self, history: &RewardHistory) -> Option<f64> {
        if history.is_empty() {
            return None;
        }
        let totals = history.totals();
        let tail = &totals[totals.len().saturating_sub(self.window)..];
        let mean = tail.iter().sum::<f64>() / tail.len() as f64;
        Some((mean * 10.0).round() / 10.0)
    }

    /// True iff the spacing since the last save is exceeded AND the
    /// score strictly beats the last saved one (or nothing was saved
    /// yet).
    pub fn should_save(&self, score: f64, episode: u64, state: &RunState) -> bool {
        if episode.saturating_sub(state.last_saved_episode) <= self.min_spacing {
            return false;
        }
        match state.last_saved_score {
            None => true,
            Some(best) => score > best,
        }
    }
}
