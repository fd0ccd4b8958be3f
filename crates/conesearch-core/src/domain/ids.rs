//! Job ID（ULID ベース）
//!
//! # ULID の特性
//! - **時刻でソート可能**: ミリ秒の timestamp が先頭にある
//! - **分散生成可能**: 調整なしで生成できる
//!
//! Display は `job-` プレフィックス付き。[`JobId::from_str`] はプレフィックス付きと
//! ULID のみの両方を受け付けます。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

const PREFIX: &str = "job-";

/// Opaque, immutable identifier of a job.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Ulid);

impl JobId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for JobId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}{}", self.0)
    }
}

/// Returned when a string is not a valid job id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid job id `{0}`")]
pub struct ParseJobIdError(String);

impl FromStr for JobId {
    type Err = ParseJobIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(PREFIX).unwrap_or(s);
        Ulid::from_string(raw)
            .map(Self)
            .map_err(|_| ParseJobIdError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_has_job_prefix() {
        let id = JobId::from_ulid(Ulid::new());
        assert!(id.to_string().starts_with("job-"));
    }

    #[test]
    fn parses_its_own_display_form() {
        let id = JobId::from_ulid(Ulid::new());
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn parses_bare_ulid() {
        let ulid = Ulid::new();
        let parsed: JobId = ulid.to_string().parse().unwrap();
        assert_eq!(parsed.as_ulid(), ulid);
    }

    #[test]
    fn rejects_garbage() {
        let err = "job-not-a-ulid".parse::<JobId>().unwrap_err();
        assert!(err.to_string().contains("job-not-a-ulid"));
    }

    #[test]
    fn ulid_ids_are_sortable() {
        let id1 = JobId::from_ulid(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = JobId::from_ulid(Ulid::new());
        assert!(id1 < id2);
    }

    #[test]
    fn serializes_as_bare_ulid_string() {
        let ulid = Ulid::new();
        let id = JobId::from_ulid(ulid);
        let s = serde_json::to_string(&id).unwrap();
        assert_eq!(s, format!("\"{ulid}\""));
        let back: JobId = serde_json::from_str(&s).unwrap();
        assert_eq!(back, id);
    }
}
