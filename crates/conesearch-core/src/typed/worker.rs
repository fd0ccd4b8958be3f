//! Worker trait - manager が外に出す唯一の capability
//!
//! # 学習ポイント
//! - ジェネリック trait ([`Worker<P>`]): decode 済みのパラメータを受け取る
//! - Object-safe trait ([`DynWorker`]): JSON を受け取る。Supervisor はこちらを保持
//! - Type erasure パターン ([`TypedWorker`] → [`DynWorker`])

use std::marker::PhantomData;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::parameters::Parameters;
use crate::domain::{DomainError, JobResult};

/// Worker はジョブ 1 件分のドメイン計算を行う
///
/// `cancel` fires when the job is aborted or runs out of execution duration.
/// Workers should return promptly once it does; the supervisor stops waiting
/// after a bounded grace period either way.
#[async_trait]
pub trait Worker<P: Parameters>: Send + Sync {
    async fn run(
        &self,
        parameters: P,
        cancel: CancellationToken,
    ) -> Result<Vec<JobResult>, DomainError>;
}

/// Object-safe worker over JSON parameters.
#[async_trait]
pub trait DynWorker: Send + Sync {
    async fn run_dyn(
        &self,
        parameters: serde_json::Value,
        cancel: CancellationToken,
    ) -> Result<Vec<JobResult>, DomainError>;

    fn kind(&self) -> &str;
}

pub struct TypedWorker<P: Parameters, W: Worker<P>> {
    worker: W,
    _marker: PhantomData<fn() -> P>,
}

impl<P: Parameters, W: Worker<P>> TypedWorker<P, W> {
    pub fn new(worker: W) -> Self {
        Self {
            worker,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<P: Parameters, W: Worker<P>> DynWorker for TypedWorker<P, W> {
    async fn run_dyn(
        &self,
        parameters: serde_json::Value,
        cancel: CancellationToken,
    ) -> Result<Vec<JobResult>, DomainError> {
        let parameters: P = serde_json::from_value(parameters)
            .map_err(|e| DomainError::new("invalid_parameters", format!("json decode: {e}")))?;
        self.worker.run(parameters, cancel).await
    }

    fn kind(&self) -> &str {
        P::KIND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConeSearchParameters;
    use serde_json::json;

    struct EchoWorker;

    #[async_trait]
    impl Worker<ConeSearchParameters> for EchoWorker {
        async fn run(
            &self,
            p: ConeSearchParameters,
            _cancel: CancellationToken,
        ) -> Result<Vec<JobResult>, DomainError> {
            Ok(vec![JobResult::new("echo", format!("memory://{}/{}", p.ra, p.dec))])
        }
    }

    #[tokio::test]
    async fn typed_worker_decodes_parameters() {
        let worker = TypedWorker::<ConeSearchParameters, _>::new(EchoWorker);
        assert_eq!(worker.kind(), "conesearch.search.cone.v1");

        let results = worker
            .run_dyn(json!({"ra": 1.5, "dec": 2.5, "sr": 0.1}), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(results[0].locator, "memory://1.5/2.5");
    }

    #[tokio::test]
    async fn decode_failure_is_a_domain_error() {
        let worker = TypedWorker::<ConeSearchParameters, _>::new(EchoWorker);
        let err = worker
            .run_dyn(json!({"ra": "north"}), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.error_code, "invalid_parameters");
    }
}
