//! JobCreate / JobUpdate - manager が受け付けるリクエスト
//!
//! duration は [`TimeDelta`] で受け取る。負の値も表現できるので、
//! 黙って wrap させずに検証で弾ける。

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::UwsError;

/// Information required to create a new job.
#[derive(Debug, Clone)]
pub struct JobCreate<P> {
    pub parameters: P,

    /// Whether to queue the job immediately.
    pub start: bool,

    /// Opaque string the client uses to tag jobs of one operation.
    pub run_id: Option<String>,

    pub execution_duration: Option<TimeDelta>,
    pub destruction_time: Option<DateTime<Utc>>,
}

impl<P> JobCreate<P> {
    /// Starts immediately, with policy defaults for everything else.
    pub fn new(parameters: P) -> Self {
        Self {
            parameters,
            start: true,
            run_id: None,
            execution_duration: None,
            destruction_time: None,
        }
    }

    pub fn start(mut self, start: bool) -> Self {
        self.start = start;
        self
    }

    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn execution_duration(mut self, duration: TimeDelta) -> Self {
        self.execution_duration = Some(duration);
        self
    }

    pub fn destruction_time(mut self, at: DateTime<Utc>) -> Self {
        self.destruction_time = Some(at);
        self
    }
}

/// Requested update to a job. Only these fields can change after creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobUpdate {
    pub destruction_time: Option<DateTime<Utc>>,
    pub execution_duration: Option<TimeDelta>,
}

impl JobUpdate {
    pub fn destruction_time(mut self, at: DateTime<Utc>) -> Self {
        self.destruction_time = Some(at);
        self
    }

    pub fn execution_duration(mut self, duration: TimeDelta) -> Self {
        self.execution_duration = Some(duration);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.destruction_time.is_none() && self.execution_duration.is_none()
    }
}

/// Destruction times must lie strictly in the future.
pub(crate) fn check_destruction_time(
    at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, UwsError> {
    if at <= now {
        return Err(UwsError::validation(format!(
            "destruction_time {} is not in the future",
            at.to_rfc3339()
        )));
    }
    Ok(at)
}

/// Execution durations must be positive.
pub(crate) fn check_execution_duration(delta: TimeDelta) -> Result<Duration, UwsError> {
    if delta <= TimeDelta::zero() {
        return Err(UwsError::validation(format!(
            "execution_duration must be positive, got {delta}"
        )));
    }
    delta
        .to_std()
        .map_err(|e| UwsError::validation(format!("execution_duration: {e}")))
}
