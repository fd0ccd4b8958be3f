//! JobManager - ジョブ操作の受け口
//!
//! # 設計原則
//! - 入力検証は状態を変える前に行う
//! - phase の変更はすべて JobStore を経由する
//! - QUEUED になったジョブは Supervisor に渡す

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::supervisor::Supervisor;
use super::sweeper::{SweepReport, Sweeper};
use crate::domain::{
    ExecutionPhase, JobCreate, JobDescription, JobId, JobRecord, JobUpdate, TransitionPayload,
};
use crate::error::UwsError;
use crate::observability::PhaseCounts;
use crate::store::JobStore;
use crate::typed::Parameters;

/// Handle to a running job manager. Built by [`ManagerBuilder`](super::ManagerBuilder).
pub struct JobManager {
    store: Arc<JobStore>,
    supervisor: Supervisor,
    sweeper: Arc<Sweeper>,
    worker_kind: String,
    shutdown: CancellationToken,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl JobManager {
    pub(crate) fn new(
        store: Arc<JobStore>,
        supervisor: Supervisor,
        sweeper: Arc<Sweeper>,
        worker_kind: String,
        shutdown: CancellationToken,
        background: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            store,
            supervisor,
            sweeper,
            worker_kind,
            shutdown,
            background: Mutex::new(background),
        }
    }

    /// Create a job for `owner`.
    ///
    /// The parameters must match the registered worker's kind and pass
    /// [`Parameters::validate`]. With `request.start` the job is queued for
    /// execution right away; otherwise it stays PENDING.
    pub async fn create<P: Parameters>(
        &self,
        owner: &str,
        request: JobCreate<P>,
    ) -> Result<JobRecord, UwsError> {
        if P::KIND != self.worker_kind {
            return Err(UwsError::validation(format!(
                "no worker registered for {} (registered: {})",
                P::KIND,
                self.worker_kind
            )));
        }
        request
            .parameters
            .validate()
            .map_err(UwsError::Validation)?;
        let parameters = serde_json::to_value(&request.parameters)
            .map_err(|e| UwsError::validation(format!("parameters: {e}")))?;

        let job = self
            .store
            .create(
                owner,
                JobCreate {
                    parameters,
                    start: request.start,
                    run_id: request.run_id,
                    execution_duration: request.execution_duration,
                    destruction_time: request.destruction_time,
                },
            )
            .await?;
        if job.phase == ExecutionPhase::Queued {
            self.supervisor.enqueue(job.id);
        }
        Ok(job)
    }

    pub async fn get(&self, id: JobId) -> Result<JobRecord, UwsError> {
        self.store.get(id).await
    }

    /// Jobs ordered by creation time, optionally limited to one owner and to
    /// a set of phases (empty = all phases).
    pub async fn list(
        &self,
        owner: Option<&str>,
        phases: &[ExecutionPhase],
    ) -> Vec<JobDescription> {
        self.store.list(owner, phases).await
    }

    pub async fn update(&self, id: JobId, update: JobUpdate) -> Result<JobRecord, UwsError> {
        self.store.update(id, update).await
    }

    /// Remove a job, aborting it first if it is still running or waiting.
    pub async fn delete(&self, id: JobId) -> Result<(), UwsError> {
        self.store.delete(id).await
    }

    /// Abort a non-terminal job. A running worker is signalled to stop.
    pub async fn abort(&self, id: JobId) -> Result<JobRecord, UwsError> {
        self.store.abort(id).await
    }

    /// Queue a PENDING or HELD job.
    pub async fn start(&self, id: JobId) -> Result<JobRecord, UwsError> {
        let job = self
            .store
            .apply_transition(id, ExecutionPhase::Queued, TransitionPayload::None)
            .await?;
        self.supervisor.enqueue(id);
        Ok(job)
    }

    /// Park a PENDING job until it is explicitly started.
    pub async fn hold(&self, id: JobId) -> Result<JobRecord, UwsError> {
        self.store
            .apply_transition(id, ExecutionPhase::Held, TransitionPayload::None)
            .await
    }

    /// Archive a finished job. Its results and error are dropped.
    pub async fn archive(&self, id: JobId) -> Result<JobRecord, UwsError> {
        self.store
            .apply_transition(id, ExecutionPhase::Archived, TransitionPayload::None)
            .await
    }

    /// Blocking poll: waits up to `timeout` while the job is PENDING, QUEUED
    /// or EXECUTING and returns as soon as its phase changes.
    pub async fn wait(&self, id: JobId, timeout: Duration) -> Result<JobRecord, UwsError> {
        self.store.wait(id, timeout).await
    }

    pub async fn counts(&self) -> PhaseCounts {
        self.store.counts().await
    }

    /// Run one sweep now instead of waiting for the next interval.
    pub async fn sweep(&self) -> SweepReport {
        self.sweeper.sweep_once().await
    }

    /// Stop the dispatcher and the sweeper. Executing jobs are aborted and
    /// their workers get the configured grace period to return.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles = std::mem::take(&mut *self.background.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        info!("job manager stopped");
    }
}

impl Drop for JobManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
