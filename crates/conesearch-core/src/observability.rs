use serde::{Deserialize, Serialize};

use crate::domain::ExecutionPhase;

/// Number of jobs in each phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseCounts {
    pub pending: usize,
    pub queued: usize,
    pub executing: usize,
    pub completed: usize,
    pub error: usize,
    pub aborted: usize,
    pub unknown: usize,
    pub held: usize,
    pub suspended: usize,
    pub archived: usize,
}

impl PhaseCounts {
    pub fn record(&mut self, phase: ExecutionPhase) {
        let slot = match phase {
            ExecutionPhase::Pending => &mut self.pending,
            ExecutionPhase::Queued => &mut self.queued,
            ExecutionPhase::Executing => &mut self.executing,
            ExecutionPhase::Completed => &mut self.completed,
            ExecutionPhase::Error => &mut self.error,
            ExecutionPhase::Aborted => &mut self.aborted,
            ExecutionPhase::Unknown => &mut self.unknown,
            ExecutionPhase::Held => &mut self.held,
            ExecutionPhase::Suspended => &mut self.suspended,
            ExecutionPhase::Archived => &mut self.archived,
        };
        *slot += 1;
    }

    pub fn total(&self) -> usize {
        self.pending
            + self.queued
            + self.executing
            + self.completed
            + self.error
            + self.aborted
            + self.unknown
            + self.held
            + self.suspended
            + self.archived
    }
}

impl FromIterator<ExecutionPhase> for PhaseCounts {
    fn from_iter<I: IntoIterator<Item = ExecutionPhase>>(iter: I) -> Self {
        let mut counts = Self::default();
        for phase in iter {
            counts.record(phase);
        }
        counts
    }
}
