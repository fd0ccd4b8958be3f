//! Supervisor - QUEUED のジョブを実行まで運ぶ
//!
//! # フロー
//! 1. `enqueue()` で QUEUED のジョブ id をディスパッチャに渡す（FIFO）
//! 2. ディスパッチャは実行枠（permit）を待ち、ジョブごとにタスクを起動
//! 3. ジョブタスクは EXECUTING に遷移し、worker を別タスクで実行
//!    （abort / shutdown / execution_duration の期限と競争させる）
//! 4. 結果は `apply_transition` で書き戻す
//!
//! # 競合
//! - 別経路の遷移に負けた場合（InvalidTransition / NotFound）は何もしない

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::ManagerConfig;
use crate::domain::{
    DomainError, ExecutionPhase, JobError, JobId, JobResult, TransitionPayload,
};
use crate::error::UwsError;
use crate::store::JobStore;
use crate::typed::DynWorker;

type WorkerOutput = Result<Result<Vec<JobResult>, DomainError>, JoinError>;

/// Supervisor はジョブを実行キューに積むためのハンドル
#[derive(Clone)]
pub struct Supervisor {
    queue_tx: mpsc::UnboundedSender<JobId>,
}

struct JobContext {
    store: Arc<JobStore>,
    worker: Arc<dyn DynWorker>,
    abort_grace: Duration,
    shutdown: CancellationToken,
}

impl Supervisor {
    /// Start the dispatcher. It runs until `shutdown` fires, then waits for
    /// in-flight jobs to wind down.
    pub fn spawn(
        store: Arc<JobStore>,
        worker: Arc<dyn DynWorker>,
        config: &ManagerConfig,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let ctx = Arc::new(JobContext {
            store,
            worker,
            abort_grace: config.abort_grace,
            shutdown,
        });
        let join = tokio::spawn(dispatch_loop(ctx, permits, queue_rx));
        (Self { queue_tx }, join)
    }

    /// Schedule a QUEUED job. Jobs start in the order they are enqueued.
    pub fn enqueue(&self, id: JobId) {
        if self.queue_tx.send(id).is_err() {
            warn!(job_id = %id, "supervisor stopped; job stays queued");
        }
    }
}

async fn dispatch_loop(
    ctx: Arc<JobContext>,
    permits: Arc<Semaphore>,
    mut queue_rx: mpsc::UnboundedReceiver<JobId>,
) {
    let mut running = JoinSet::new();
    loop {
        let id = tokio::select! {
            biased;
            _ = ctx.shutdown.cancelled() => break,
            Some(_) = running.join_next(), if !running.is_empty() => continue,
            next = queue_rx.recv() => match next {
                Some(id) => id,
                None => break,
            },
        };

        // Semaphore waiters are served in order, which keeps starts FIFO.
        let permit = tokio::select! {
            biased;
            _ = ctx.shutdown.cancelled() => break,
            permit = Arc::clone(&permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let ctx = Arc::clone(&ctx);
        running.spawn(async move {
            run_job(&ctx, id).await;
            drop(permit);
        });
    }

    debug!(in_flight = running.len(), "dispatcher stopping");
    while running.join_next().await.is_some() {}
    info!("supervisor stopped");
}

enum Ending {
    Finished(WorkerOutput),
    Cancelled,
    Shutdown,
    TimedOut(Duration),
}

async fn run_job(ctx: &JobContext, id: JobId) {
    let job = match ctx
        .store
        .apply_transition(id, ExecutionPhase::Executing, TransitionPayload::None)
        .await
    {
        Ok(job) => job,
        Err(e) => {
            // aborted or deleted while queued
            debug!(job_id = %id, error = %e, "job no longer runnable");
            return;
        }
    };
    let job_token = match ctx.store.cancellation_token(id).await {
        Ok(token) => token,
        Err(e) => {
            debug!(job_id = %id, error = %e, "job vanished before execution");
            return;
        }
    };
    info!(job_id = %id, limit = ?job.execution_duration, "job executing");

    let worker_token = job_token.child_token();
    let mut handle = tokio::spawn({
        let worker = Arc::clone(&ctx.worker);
        let parameters = job.parameters.clone();
        let token = worker_token.clone();
        async move { worker.run_dyn(parameters, token).await }
    });

    let ending = tokio::select! {
        output = &mut handle => Ending::Finished(output),
        _ = job_token.cancelled() => Ending::Cancelled,
        _ = ctx.shutdown.cancelled() => Ending::Shutdown,
        limit = deadline(job.execution_duration) => Ending::TimedOut(limit),
    };

    match ending {
        Ending::Finished(output) => finish(ctx, id, output).await,
        Ending::Cancelled => {
            info!(job_id = %id, "job cancelled; stopping worker");
            stop_worker(ctx, &worker_token, handle).await;
        }
        Ending::Shutdown => {
            worker_token.cancel();
            record(ctx, id, ExecutionPhase::Aborted, TransitionPayload::None).await;
            stop_worker(ctx, &worker_token, handle).await;
        }
        Ending::TimedOut(limit) => {
            warn!(job_id = %id, limit = ?limit, "execution duration exceeded");
            stop_worker(ctx, &worker_token, handle).await;
            let error = JobError::execution_duration_exceeded(limit);
            record(ctx, id, ExecutionPhase::Aborted, TransitionPayload::Error(error)).await;
        }
    }
}

async fn finish(ctx: &JobContext, id: JobId, output: WorkerOutput) {
    match output {
        Ok(Ok(results)) => {
            info!(job_id = %id, results = results.len(), "job completed");
            record(ctx, id, ExecutionPhase::Completed, TransitionPayload::Results(results)).await;
        }
        Ok(Err(err)) => {
            warn!(job_id = %id, error = %err, "worker failed");
            record(ctx, id, ExecutionPhase::Error, TransitionPayload::Error(err.into())).await;
        }
        Err(join_err) => {
            error!(job_id = %id, error = %join_err, "worker task died");
            let error = JobError::new("worker_failure", "worker did not return a result")
                .with_detail(join_err.to_string());
            record(ctx, id, ExecutionPhase::Error, TransitionPayload::Error(error)).await;
        }
    }
}

/// Signal the worker, give it the grace period, then drop it.
async fn stop_worker(
    ctx: &JobContext,
    worker_token: &CancellationToken,
    mut handle: JoinHandle<Result<Vec<JobResult>, DomainError>>,
) {
    worker_token.cancel();
    if tokio::time::timeout(ctx.abort_grace, &mut handle).await.is_err() {
        debug!(grace = ?ctx.abort_grace, "worker ignored cancellation; aborting task");
        handle.abort();
    }
}

async fn record(ctx: &JobContext, id: JobId, phase: ExecutionPhase, payload: TransitionPayload) {
    match ctx.store.apply_transition(id, phase, payload).await {
        Ok(_) => {}
        Err(e @ (UwsError::InvalidTransition { .. } | UwsError::NotFound(_))) => {
            debug!(job_id = %id, error = %e, "transition lost a race; discarded");
        }
        Err(e) => error!(job_id = %id, error = %e, "could not record job outcome"),
    }
}

async fn deadline(limit: Option<Duration>) -> Duration {
    match limit {
        Some(limit) => {
            tokio::time::sleep(limit).await;
            limit
        }
        None => std::future::pending().await,
    }
}
