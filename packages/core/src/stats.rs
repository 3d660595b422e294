//! Aggregate job counts.

use serde::{Deserialize, Serialize};

use crate::JobState;

/// Number of jobs in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub dead: u64,
}

impl StateCounts {
    pub fn get(&self, state: JobState) -> u64 {
        match state {
            JobState::Pending => self.pending,
            JobState::Processing => self.processing,
            JobState::Completed => self.completed,
            JobState::Failed => self.failed,
            JobState::Dead => self.dead,
        }
    }

    pub fn set(&mut self, state: JobState, count: u64) {
        match state {
            JobState::Pending => self.pending = count,
            JobState::Processing => self.processing = count,
            JobState::Completed => self.completed = count,
            JobState::Failed => self.failed = count,
            JobState::Dead => self.dead = count,
        }
    }

    /// Total jobs across all states.
    pub fn total(&self) -> u64 {
        JobState::ALL.into_iter().map(|state| self.get(state)).sum()
    }
}
