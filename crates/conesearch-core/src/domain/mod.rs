//! Domain - ドメインモデル
//!
//! ids, phase, job record, リクエスト, 実行結果, cone search パラメータ

pub mod cone;
pub mod ids;
pub mod job;
pub mod outcome;
pub mod phase;
pub mod spec;

pub use cone::{ConeSearchParameters, Verbosity};
pub use ids::{JobId, ParseJobIdError};
pub use job::{JobDescription, JobRecord};
pub use outcome::{DomainError, EXECUTION_DURATION_EXCEEDED, JobError, JobResult, TransitionPayload};
pub use phase::{ExecutionPhase, transition};
pub use spec::{JobCreate, JobUpdate};
