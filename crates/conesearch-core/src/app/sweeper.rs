//! Sweeper - 破棄時刻を過ぎたジョブの回収
//!
//! # フロー
//! 1. `sweep_interval` ごとに store の snapshot を取る
//! 2. `destruction_time <= now` のジョブを `destroy_if_expired` で削除する
//!    （期限の判定はジョブのロック内でやり直す。実行中なら先に ABORTED）
//! 3. `archive_after` が設定されていれば、古くなった終了済みジョブを ARCHIVED へ
//!
//! 並行して削除済みのジョブは読み飛ばすので、何度 sweep しても結果は同じ。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::ManagerConfig;
use crate::domain::{ExecutionPhase, JobRecord, TransitionPayload};
use crate::store::JobStore;

/// What a single sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Deleted jobs that were still PENDING, QUEUED, EXECUTING or otherwise
    /// abortable.
    pub aborted: usize,
    pub deleted: usize,
    pub archived: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.deleted == 0 && self.archived == 0
    }
}

pub struct Sweeper {
    store: Arc<JobStore>,
    interval: Duration,
    archive_after: Option<TimeDelta>,
}

impl Sweeper {
    pub fn new(store: Arc<JobStore>, config: &ManagerConfig) -> Self {
        Self {
            store,
            interval: config.sweep_interval,
            archive_after: config
                .archive_after
                .and_then(|after| TimeDelta::from_std(after).ok()),
        }
    }

    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// Sweep every interval until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        let first = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(first, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.interval, "sweeper started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.sweep_once().await;
                    if !report.is_empty() {
                        info!(
                            deleted = report.deleted,
                            aborted = report.aborted,
                            archived = report.archived,
                            "sweep finished"
                        );
                    }
                }
            }
        }
        info!("sweeper stopped");
    }

    pub async fn sweep_once(&self) -> SweepReport {
        let now = self.store.now();
        let mut report = SweepReport::default();

        for job in self.store.snapshot().await {
            if job.is_destroyed_at(now) {
                self.destroy(&job, now, &mut report).await;
            } else if self.archive_due(&job, now) {
                self.archive(&job, &mut report).await;
            }
        }
        report
    }

    async fn destroy(&self, job: &JobRecord, now: DateTime<Utc>, report: &mut SweepReport) {
        match self.store.destroy_if_expired(job.id, now).await {
            Ok(Some(phase)) => {
                report.deleted += 1;
                if phase.can_transition_to(ExecutionPhase::Aborted) {
                    report.aborted += 1;
                }
                debug!(job_id = %job.id, phase = %phase, "destroyed expired job");
            }
            Ok(None) => debug!(job_id = %job.id, "destruction time moved; job kept"),
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(job_id = %job.id, error = %e, "failed to destroy job"),
        }
    }

    fn archive_due(&self, job: &JobRecord, now: DateTime<Utc>) -> bool {
        let Some(after) = self.archive_after else {
            return false;
        };
        if !job.phase.can_transition_to(ExecutionPhase::Archived) {
            return false;
        }
        job.end_time
            .and_then(|end| end.checked_add_signed(after))
            .is_some_and(|due| due <= now)
    }

    async fn archive(&self, job: &JobRecord, report: &mut SweepReport) {
        match self
            .store
            .apply_transition(job.id, ExecutionPhase::Archived, TransitionPayload::None)
            .await
        {
            Ok(_) => report.archived += 1,
            Err(e) if e.is_not_found() || e.is_invalid_transition() => {}
            Err(e) => warn!(job_id = %job.id, error = %e, "failed to archive job"),
        }
    }
}
