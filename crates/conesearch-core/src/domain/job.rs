//! JobRecord - ジョブ本体と一覧用の射影

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ids::JobId;
use super::outcome::{JobError, JobResult, TransitionPayload};
use super::phase::{ExecutionPhase, transition};
use crate::error::UwsError;

/// JobRecord は UWS ジョブ 1 件を表す
///
/// # 設計原則
/// - 正本は store が持ち、呼び出し側には clone だけを返す
/// - phase、時刻、results、error は [`JobRecord::apply`] でのみ変わる
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(rename = "job_id")]
    pub id: JobId,
    pub owner: String,
    pub run_id: Option<String>,
    pub phase: ExecutionPhase,

    /// Caller-supplied payload, passed to the worker unchanged.
    pub parameters: serde_json::Value,

    pub creation_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub destruction_time: Option<DateTime<Utc>>,

    /// Wall clock limit on execution. `None` means unbounded.
    pub execution_duration: Option<Duration>,

    /// Advisory completion estimate. Never enforced.
    pub quote: Option<DateTime<Utc>>,

    pub error: Option<JobError>,
    pub results: Option<Vec<JobResult>>,
}

impl JobRecord {
    pub(crate) fn new(
        id: JobId,
        owner: String,
        parameters: serde_json::Value,
        creation_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner,
            run_id: None,
            phase: ExecutionPhase::Pending,
            parameters,
            creation_time,
            start_time: None,
            end_time: None,
            destruction_time: None,
            execution_duration: None,
            quote: None,
            error: None,
            results: None,
        }
    }

    /// Decode the parameters into their typed form.
    pub fn parameters_as<P: DeserializeOwned>(&self) -> Result<P, serde_json::Error> {
        serde_json::from_value(self.parameters.clone())
    }

    pub fn description(&self) -> JobDescription {
        JobDescription {
            job_id: self.id,
            owner: self.owner.clone(),
            phase: self.phase,
            run_id: self.run_id.clone(),
            creation_time: self.creation_time,
        }
    }

    pub fn is_destroyed_at(&self, now: DateTime<Utc>) -> bool {
        self.destruction_time.is_some_and(|t| t <= now)
    }

    /// Move to `requested`, storing the payload and maintaining timing fields.
    ///
    /// Either everything is applied or the record is left untouched.
    pub(crate) fn apply(
        &mut self,
        requested: ExecutionPhase,
        payload: TransitionPayload,
        now: DateTime<Utc>,
    ) -> Result<(), UwsError> {
        let next = transition(self.phase, requested)?;
        check_payload(next, &payload)?;

        self.phase = next;
        match next {
            ExecutionPhase::Executing => {
                if self.start_time.is_none() {
                    self.start_time = Some(now);
                }
            }
            ExecutionPhase::Archived => {
                self.results = None;
                self.error = None;
            }
            _ => {}
        }
        match payload {
            TransitionPayload::None => {}
            TransitionPayload::Results(results) => self.results = Some(results),
            TransitionPayload::Error(error) => self.error = Some(error),
        }
        if next.is_terminal() && self.end_time.is_none() {
            self.end_time = Some(now);
        }
        Ok(())
    }

    /// Change the execution duration. Only allowed before execution starts.
    pub(crate) fn set_execution_duration(
        &mut self,
        duration: Option<Duration>,
    ) -> Result<(), UwsError> {
        if self.phase.is_running() || self.phase.is_terminal() || self.start_time.is_some() {
            return Err(UwsError::Conflict {
                id: self.id,
                reason: format!(
                    "execution_duration cannot change once the job is {}",
                    self.phase
                ),
            });
        }
        self.execution_duration = duration;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        use ExecutionPhase::*;
        assert_eq!(
            self.results.is_some(),
            self.phase == Completed,
            "results presence must match phase {}",
            self.phase
        );
        match self.phase {
            Error => assert!(self.error.is_some(), "error phase without error"),
            Aborted => {}
            _ => assert!(self.error.is_none(), "error set in phase {}", self.phase),
        }
        if self.phase.is_terminal() {
            assert!(self.end_time.is_some(), "terminal without end_time");
        } else {
            assert!(self.end_time.is_none(), "end_time before terminal");
        }
        if self.phase.is_running() {
            assert!(self.start_time.is_some(), "running without start_time");
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            assert!(start <= end, "end_time earlier than start_time");
        }
    }
}

fn check_payload(next: ExecutionPhase, payload: &TransitionPayload) -> Result<(), UwsError> {
    use ExecutionPhase::*;
    let ok = match (next, payload) {
        (Completed, TransitionPayload::Results(_)) => true,
        (Error, TransitionPayload::Error(_)) => true,
        (Aborted, TransitionPayload::None | TransitionPayload::Error(_)) => true,
        (Completed | Error, _) => false,
        (_, TransitionPayload::None) => true,
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(UwsError::validation(format!(
            "transition to {next} cannot carry {payload:?}"
        )))
    }
}

/// Brief job description used for job lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescription {
    pub job_id: JobId,
    pub owner: String,
    pub phase: ExecutionPhase,
    pub run_id: Option<String>,
    pub creation_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use ulid::Ulid;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 22, 14, 0, 0).unwrap() + chrono::TimeDelta::seconds(secs)
    }

    fn pending() -> JobRecord {
        JobRecord::new(
            JobId::from_ulid(Ulid::new()),
            "rra".to_string(),
            serde_json::json!({"ra": 179.5}),
            t(0),
        )
    }

    fn executing() -> JobRecord {
        let mut job = pending();
        job.apply(ExecutionPhase::Queued, TransitionPayload::None, t(1)).unwrap();
        job.apply(ExecutionPhase::Executing, TransitionPayload::None, t(2)).unwrap();
        job
    }

    #[test]
    fn new_job_starts_pending_without_timing() {
        let job = pending();
        assert_eq!(job.phase, ExecutionPhase::Pending);
        assert!(job.start_time.is_none());
        assert!(job.end_time.is_none());
        job.assert_invariants();
    }

    #[test]
    fn executing_sets_start_time() {
        let job = executing();
        assert_eq!(job.start_time, Some(t(2)));
        assert!(job.end_time.is_none());
        job.assert_invariants();
    }

    #[test]
    fn completion_stores_results_and_end_time() {
        let mut job = executing();
        let results = vec![JobResult::new("votable", "memory://r/1")];
        job.apply(
            ExecutionPhase::Completed,
            TransitionPayload::Results(results.clone()),
            t(5),
        )
        .unwrap();
        assert_eq!(job.results, Some(results));
        assert_eq!(job.end_time, Some(t(5)));
        job.assert_invariants();
    }

    #[test]
    fn error_stores_error() {
        let mut job = executing();
        let err = JobError::new("bad", "went wrong");
        job.apply(ExecutionPhase::Error, TransitionPayload::Error(err.clone()), t(5))
            .unwrap();
        assert_eq!(job.error, Some(err));
        assert!(job.results.is_none());
        job.assert_invariants();
    }

    #[rstest]
    #[case::completed_without_results(ExecutionPhase::Completed, TransitionPayload::None)]
    #[case::completed_with_error(
        ExecutionPhase::Completed,
        TransitionPayload::Error(JobError::new("x", "y"))
    )]
    #[case::error_without_error(ExecutionPhase::Error, TransitionPayload::None)]
    #[case::error_with_results(ExecutionPhase::Error, TransitionPayload::Results(vec![]))]
    #[case::aborted_with_results(ExecutionPhase::Aborted, TransitionPayload::Results(vec![]))]
    #[case::suspended_with_results(ExecutionPhase::Suspended, TransitionPayload::Results(vec![]))]
    fn mismatched_payload_leaves_record_untouched(
        #[case] to: ExecutionPhase,
        #[case] payload: TransitionPayload,
    ) {
        let mut job = executing();
        let before = job.clone();
        let err = job.apply(to, payload, t(9)).unwrap_err();
        assert!(matches!(err, UwsError::Validation(_)));
        assert_eq!(job, before);
    }

    #[test]
    fn illegal_transition_leaves_record_untouched() {
        let mut job = pending();
        let before = job.clone();
        let err = job
            .apply(
                ExecutionPhase::Completed,
                TransitionPayload::Results(vec![]),
                t(3),
            )
            .unwrap_err();
        assert!(err.is_invalid_transition());
        assert_eq!(job, before);
    }

    #[test]
    fn aborting_pending_job_records_end_time_but_no_start() {
        let mut job = pending();
        job.apply(ExecutionPhase::Aborted, TransitionPayload::None, t(4)).unwrap();
        assert!(job.start_time.is_none());
        assert_eq!(job.end_time, Some(t(4)));
        job.assert_invariants();
    }

    #[test]
    fn resuming_from_suspended_keeps_first_start_time() {
        let mut job = executing();
        job.apply(ExecutionPhase::Suspended, TransitionPayload::None, t(3)).unwrap();
        job.apply(ExecutionPhase::Executing, TransitionPayload::None, t(4)).unwrap();
        assert_eq!(job.start_time, Some(t(2)));
    }

    #[test]
    fn archiving_clears_results_but_keeps_end_time() {
        let mut job = executing();
        job.apply(
            ExecutionPhase::Completed,
            TransitionPayload::Results(vec![JobResult::new("a", "b")]),
            t(5),
        )
        .unwrap();
        job.apply(ExecutionPhase::Archived, TransitionPayload::None, t(50)).unwrap();
        assert!(job.results.is_none());
        assert!(job.error.is_none());
        assert_eq!(job.end_time, Some(t(5)));
        job.assert_invariants();
    }

    #[test]
    fn execution_duration_is_frozen_once_started() {
        let mut job = pending();
        job.set_execution_duration(Some(Duration::from_secs(10))).unwrap();
        assert_eq!(job.execution_duration, Some(Duration::from_secs(10)));

        let mut job = executing();
        let before = job.clone();
        let err = job.set_execution_duration(None).unwrap_err();
        assert!(matches!(err, UwsError::Conflict { .. }));
        assert_eq!(job, before);
    }

    #[test]
    fn serializes_with_job_id_key() {
        let job = pending();
        let v = serde_json::to_value(&job).unwrap();
        assert_eq!(v["job_id"], serde_json::json!(job.id));
        assert_eq!(v["phase"], "pending");
        assert_eq!(v["owner"], "rra");
    }

    #[test]
    fn typed_parameters_decode() {
        #[derive(Deserialize)]
        struct P {
            ra: f64,
        }
        let p: P = pending().parameters_as().unwrap();
        assert_eq!(p.ra, 179.5);
    }

    #[test]
    fn destruction_check_is_inclusive() {
        let mut job = pending();
        assert!(!job.is_destroyed_at(t(100)));
        job.destruction_time = Some(t(10));
        assert!(!job.is_destroyed_at(t(9)));
        assert!(job.is_destroyed_at(t(10)));
    }
}
