//! ExecutionPhase - phase と遷移表
//!
//! # 状態遷移
//! - Pending -> Queued | Held | Aborted
//! - Held -> Queued | Aborted
//! - Queued -> Executing | Aborted
//! - Executing -> Completed | Error | Aborted | Suspended
//! - Suspended -> Executing | Aborted
//! - Completed | Error | Aborted -> Archived
//!
//! `Unknown` は報告されるだけで、遷移元にも遷移先にもならない。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::UwsError;

/// Lifecycle phase of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPhase {
    /// Accepted by the service but not yet sent for execution.
    Pending,

    /// Sent for execution but not yet started.
    Queued,

    /// Currently in progress.
    Executing,

    /// Completed and the results are available for retrieval.
    Completed,

    /// Failed and reported an error.
    Error,

    /// Aborted before it completed.
    Aborted,

    /// In an unknown state.
    Unknown,

    /// Similar to pending, held and not sent for execution.
    Held,

    /// Execution has started, is currently suspended, and will be resumed.
    Suspended,

    /// Execution completed some time ago and the results have been deleted.
    Archived,
}

impl ExecutionPhase {
    pub const ALL: [ExecutionPhase; 10] = [
        ExecutionPhase::Pending,
        ExecutionPhase::Queued,
        ExecutionPhase::Executing,
        ExecutionPhase::Completed,
        ExecutionPhase::Error,
        ExecutionPhase::Aborted,
        ExecutionPhase::Unknown,
        ExecutionPhase::Held,
        ExecutionPhase::Suspended,
        ExecutionPhase::Archived,
    ];

    /// Completed, Error, Aborted or Archived. `end_time` is set once one of
    /// these is reached.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionPhase::Completed
                | ExecutionPhase::Error
                | ExecutionPhase::Aborted
                | ExecutionPhase::Archived
        )
    }

    /// Phases in which the worker has been started and not yet finished.
    pub fn is_running(self) -> bool {
        matches!(self, ExecutionPhase::Executing | ExecutionPhase::Suspended)
    }

    /// Phases a UWS `WAIT` blocks on.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ExecutionPhase::Pending | ExecutionPhase::Queued | ExecutionPhase::Executing
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionPhase::Pending => "pending",
            ExecutionPhase::Queued => "queued",
            ExecutionPhase::Executing => "executing",
            ExecutionPhase::Completed => "completed",
            ExecutionPhase::Error => "error",
            ExecutionPhase::Aborted => "aborted",
            ExecutionPhase::Unknown => "unknown",
            ExecutionPhase::Held => "held",
            ExecutionPhase::Suspended => "suspended",
            ExecutionPhase::Archived => "archived",
        }
    }

    pub fn can_transition_to(self, next: ExecutionPhase) -> bool {
        use ExecutionPhase::*;
        match (self, next) {
            (Pending, Queued | Held | Aborted) => true,
            (Held, Queued | Aborted) => true,
            (Queued, Executing | Aborted) => true,
            (Executing, Completed | Error | Aborted | Suspended) => true,
            (Suspended, Executing | Aborted) => true,
            (Completed | Error | Aborted, Archived) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate `current -> requested`, returning the new phase.
pub fn transition(
    current: ExecutionPhase,
    requested: ExecutionPhase,
) -> Result<ExecutionPhase, UwsError> {
    if current.can_transition_to(requested) {
        Ok(requested)
    } else {
        Err(UwsError::InvalidTransition {
            from: current,
            to: requested,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ExecutionPhase::*;
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Pending, Queued)]
    #[case(Pending, Held)]
    #[case(Pending, Aborted)]
    #[case(Held, Queued)]
    #[case(Held, Aborted)]
    #[case(Queued, Executing)]
    #[case(Queued, Aborted)]
    #[case(Executing, Completed)]
    #[case(Executing, Error)]
    #[case(Executing, Aborted)]
    #[case(Executing, Suspended)]
    #[case(Suspended, Executing)]
    #[case(Suspended, Aborted)]
    #[case(Completed, Archived)]
    #[case(Error, Archived)]
    #[case(Aborted, Archived)]
    fn legal_transitions(#[case] from: ExecutionPhase, #[case] to: ExecutionPhase) {
        assert_eq!(transition(from, to), Ok(to));
    }

    #[rstest]
    #[case(Pending, Executing)]
    #[case(Pending, Completed)]
    #[case(Queued, Completed)]
    #[case(Queued, Pending)]
    #[case(Executing, Queued)]
    #[case(Completed, Aborted)]
    #[case(Completed, Error)]
    #[case(Error, Completed)]
    #[case(Aborted, Executing)]
    #[case(Archived, Archived)]
    #[case(Archived, Pending)]
    #[case(Unknown, Aborted)]
    #[case(Pending, Unknown)]
    fn illegal_transitions(#[case] from: ExecutionPhase, #[case] to: ExecutionPhase) {
        assert_eq!(
            transition(from, to),
            Err(UwsError::InvalidTransition { from, to })
        );
    }

    #[test]
    fn no_phase_transitions_to_itself() {
        for phase in ExecutionPhase::ALL {
            assert!(!phase.can_transition_to(phase), "{phase} -> {phase}");
        }
    }

    #[test]
    fn every_non_terminal_phase_except_unknown_can_abort() {
        for phase in ExecutionPhase::ALL {
            if phase.is_terminal() || phase == Unknown {
                continue;
            }
            assert!(phase.can_transition_to(Aborted), "{phase} -> aborted");
        }
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Executing).unwrap(), "\"executing\"");
        let back: ExecutionPhase = serde_json::from_str("\"archived\"").unwrap();
        assert_eq!(back, Archived);
    }

    #[test]
    fn display_matches_serde_name() {
        for phase in ExecutionPhase::ALL {
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, format!("\"{phase}\""));
        }
    }
}
