//! Outcome - 終了したジョブが残すもの（results または error）
//!
//! results は locator で参照し、本体は埋め込まない。

use serde::{Deserialize, Serialize};

/// Error code synthesized when a job outlives its execution duration.
pub const EXECUTION_DURATION_EXCEEDED: &str = "execution_duration_exceeded";

/// A single result from a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub result_id: String,

    /// Where the client can retrieve the result (often a signed URL).
    pub locator: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl JobResult {
    pub fn new(result_id: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            result_id: result_id.into(),
            locator: locator.into(),
            size: None,
            mime_type: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Failure information stored on a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub error_code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl JobError {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn execution_duration_exceeded(limit: std::time::Duration) -> Self {
        Self::new(
            EXECUTION_DURATION_EXCEEDED,
            format!("job exceeded its execution duration of {limit:?}"),
        )
    }
}

/// Failure reported by a worker. Stored verbatim as the job's [`JobError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{error_code}: {message}")]
pub struct DomainError {
    pub error_code: String,
    pub message: String,
    pub detail: Option<String>,
}

impl DomainError {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl From<DomainError> for JobError {
    fn from(err: DomainError) -> Self {
        Self {
            error_code: err.error_code,
            message: err.message,
            detail: err.detail,
        }
    }
}

/// Data carried along with a phase change.
///
/// Completed needs `Results`, Error needs `Error`, Aborted takes `None` or an
/// `Error` (the execution duration timeout). Everything else takes `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransitionPayload {
    #[default]
    None,
    Results(Vec<JobResult>),
    Error(JobError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_error_is_stored_verbatim() {
        let err = DomainError::new("permission_denied", "Permission denied")
            .with_detail("No access to backend service");
        assert_eq!(err.to_string(), "permission_denied: Permission denied");

        let stored: JobError = err.into();
        assert_eq!(stored.error_code, "permission_denied");
        assert_eq!(stored.message, "Permission denied");
        assert_eq!(stored.detail.as_deref(), Some("No access to backend service"));
    }

    #[test]
    fn optional_result_fields_are_omitted() {
        let r = JobResult::new("cutout", "https://example.com/results/bdfeb7b575c50bb5");
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["result_id"], "cutout");
        assert!(v.get("size").is_none());
        assert!(v.get("mime_type").is_none());

        let r = r.with_size(517135).with_mime_type("application/fits");
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["size"], 517135);
        assert_eq!(v["mime_type"], "application/fits");
    }

    #[test]
    fn timeout_error_uses_reserved_code() {
        let e = JobError::execution_duration_exceeded(std::time::Duration::from_secs(3));
        assert_eq!(e.error_code, EXECUTION_DURATION_EXCEEDED);
        assert!(e.message.contains("3s"));
    }
}
