//! conesearch-core
//!
//! Simple Cone Search 向けの非同期ジョブライフサイクル管理。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, phase, job record, request, outcome, cone パラメータ）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator）
//! - **typed**: 型付き API（Parameters trait, Worker trait, DynWorker）
//! - **store**: インメモリの JobStore（唯一の正）
//! - **app**: アプリケーションロジック（builder, manager, supervisor, sweeper）
//! - **error**: `UwsError`
//! - **observability**: phase ごとの件数

pub mod app;
pub mod domain;
pub mod error;
pub mod observability;
pub mod ports;
pub mod store;
pub mod typed;

pub use app::{BuildError, JobManager, ManagerBuilder, ManagerConfig};
pub use domain::{
    ConeSearchParameters, DomainError, ExecutionPhase, JobCreate, JobDescription, JobError,
    JobId, JobRecord, JobResult, JobUpdate, Verbosity,
};
pub use error::UwsError;
pub use typed::{Parameters, Worker};
