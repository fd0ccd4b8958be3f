//! ManagerBuilder - JobManager の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - バックグラウンドタスクは検証がすべて通ってから起動する

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::config::ManagerConfig;
use super::manager::JobManager;
use super::supervisor::Supervisor;
use super::sweeper::Sweeper;
use crate::ports::{Clock, IdGenerator, SystemClock, UlidGenerator};
use crate::store::JobStore;
use crate::typed::{DynWorker, Parameters, TypedWorker, Worker};

/// ManagerBuilder は [`JobManager`] を構築する
///
/// # 使用例
/// ```ignore
/// let manager = ManagerBuilder::new()
///     .worker::<ConeSearchParameters, _>(MyCatalog::new())
///     .config(ManagerConfig { max_concurrent_jobs: 4, ..Default::default() })
///     .build()?;
/// ```
pub struct ManagerBuilder {
    worker: Option<Arc<dyn DynWorker>>,
    config: ManagerConfig,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no worker registered; call ManagerBuilder::worker() before build()")]
    MissingWorker,

    #[error("invalid manager config: {0}")]
    InvalidConfig(String),

    #[error("build() must be called from within a tokio runtime")]
    NoRuntime,
}

impl ManagerBuilder {
    pub fn new() -> Self {
        Self {
            worker: None,
            config: ManagerConfig::default(),
            clock: None,
            ids: None,
        }
    }

    /// Register the worker that executes jobs. Replaces any earlier worker.
    pub fn worker<P: Parameters, W: Worker<P> + 'static>(mut self, worker: W) -> Self {
        self.worker = Some(Arc::new(TypedWorker::<P, W>::new(worker)));
        self
    }

    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Defaults to a [`UlidGenerator`] on the manager's clock.
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Validate the configuration, then start the supervisor and sweeper.
    pub fn build(self) -> Result<JobManager, BuildError> {
        self.config.validate().map_err(BuildError::InvalidConfig)?;
        let worker = self.worker.ok_or(BuildError::MissingWorker)?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(BuildError::NoRuntime);
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));
        let store = Arc::new(JobStore::new(self.config.clone(), clock, ids));
        let shutdown = CancellationToken::new();

        let worker_kind = worker.kind().to_string();
        let (supervisor, dispatcher) =
            Supervisor::spawn(Arc::clone(&store), worker, &self.config, shutdown.clone());
        let sweeper = Arc::new(Sweeper::new(Arc::clone(&store), &self.config));
        let sweeping = Arc::clone(&sweeper).spawn(shutdown.clone());

        tracing::info!(
            worker = %worker_kind,
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            "job manager started"
        );
        Ok(JobManager::new(
            store,
            supervisor,
            sweeper,
            worker_kind,
            shutdown,
            vec![dispatcher, sweeping],
        ))
    }
}

impl Default for ManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
