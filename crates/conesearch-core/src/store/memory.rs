//! In-memory job store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, RwLock, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::app::ManagerConfig;
use crate::domain::spec::{check_destruction_time, check_execution_duration};
use crate::domain::{
    ExecutionPhase, JobCreate, JobDescription, JobId, JobRecord, JobUpdate, TransitionPayload,
};
use crate::error::UwsError;
use crate::observability::PhaseCounts;
use crate::ports::{Clock, IdGenerator};

/// One job plus everything needed to serialize access to it.
struct JobSlot {
    /// Insertion order, breaks `creation_time` ties in listings.
    seq: u64,
    state: Mutex<SlotState>,
    phase_tx: watch::Sender<ExecutionPhase>,
    /// Fired when the job is aborted or deleted.
    cancel: CancellationToken,
}

struct SlotState {
    record: JobRecord,
    /// Set under the slot lock right before the slot leaves the map, so a
    /// caller that fetched the slot earlier still sees the job as gone.
    removed: bool,
}

/// JobStore はジョブレコードを並行安全に保持する
///
/// # 設計原則
/// - map のロックは slot の検索・追加・削除の間だけ持つ。slot のロック待ちの間は持たない
/// - ジョブの変更はすべてそのジョブの slot ロック内で行う（同一ジョブの遷移は線形化される）
/// - 外部 I/O は待たない
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Arc<JobSlot>>>,
    next_seq: AtomicU64,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    config: ManagerConfig,
}

impl JobStore {
    pub fn new(config: ManagerConfig, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            clock,
            ids,
            config,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Allocate a new job in PENDING, or QUEUED when `request.start` is set.
    pub async fn create(
        &self,
        owner: &str,
        request: JobCreate<serde_json::Value>,
    ) -> Result<JobRecord, UwsError> {
        if owner.trim().is_empty() {
            return Err(UwsError::validation("owner must not be empty"));
        }
        let now = self.clock.now();
        let destruction_time = match request.destruction_time {
            Some(at) => Some(check_destruction_time(at, now)?),
            None => add_std(now, self.config.default_lifetime),
        };
        let execution_duration = match request.execution_duration {
            Some(delta) => Some(check_execution_duration(delta)?),
            None => self.config.default_execution_duration,
        };
        let quote = self
            .config
            .quote_estimate
            .and_then(|estimate| add_std(now, estimate));

        let mut jobs = self.jobs.write().await;
        let id = loop {
            let id = self.ids.generate_job_id();
            if !jobs.contains_key(&id) {
                break id;
            }
        };

        let mut record = JobRecord::new(id, owner.to_string(), request.parameters, now);
        record.run_id = request.run_id;
        record.destruction_time = destruction_time;
        record.execution_duration = execution_duration;
        record.quote = quote;
        if request.start {
            record.apply(ExecutionPhase::Queued, TransitionPayload::None, now)?;
        }

        let (phase_tx, _) = watch::channel(record.phase);
        let slot = JobSlot {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(SlotState {
                record: record.clone(),
                removed: false,
            }),
            phase_tx,
            cancel: CancellationToken::new(),
        };
        jobs.insert(id, Arc::new(slot));
        drop(jobs);

        info!(job_id = %id, owner = %record.owner, phase = %record.phase, "job created");
        Ok(record)
    }

    pub async fn get(&self, id: JobId) -> Result<JobRecord, UwsError> {
        let slot = self.slot(id).await?;
        let state = slot.state.lock().await;
        if state.removed {
            return Err(UwsError::NotFound(id));
        }
        Ok(state.record.clone())
    }

    /// Jobs ordered by creation time. An empty `phases` matches every phase.
    pub async fn list(
        &self,
        owner: Option<&str>,
        phases: &[ExecutionPhase],
    ) -> Vec<JobDescription> {
        self.snapshot()
            .await
            .into_iter()
            .filter(|r| owner.is_none_or(|o| r.owner == o))
            .filter(|r| phases.is_empty() || phases.contains(&r.phase))
            .map(|r| r.description())
            .collect()
    }

    /// Clones of every live record, ordered by creation time.
    pub async fn snapshot(&self) -> Vec<JobRecord> {
        let slots: Vec<Arc<JobSlot>> = self.jobs.read().await.values().cloned().collect();
        let mut records = Vec::with_capacity(slots.len());
        for slot in slots {
            let state = slot.state.lock().await;
            if !state.removed {
                records.push((state.record.creation_time, slot.seq, state.record.clone()));
            }
        }
        records.sort_by_key(|(created, seq, _)| (*created, *seq));
        records.into_iter().map(|(_, _, record)| record).collect()
    }

    pub async fn counts(&self) -> PhaseCounts {
        self.snapshot().await.into_iter().map(|r| r.phase).collect()
    }

    /// Change destruction time and/or execution duration.
    ///
    /// Changing the execution duration once the job has started executing is
    /// a `Conflict`; nothing is applied in that case. An empty update returns
    /// the record unchanged.
    pub async fn update(&self, id: JobId, update: JobUpdate) -> Result<JobRecord, UwsError> {
        if update.is_empty() {
            return self.get(id).await;
        }
        let now = self.clock.now();
        let destruction_time = update
            .destruction_time
            .map(|at| check_destruction_time(at, now))
            .transpose()?;
        let execution_duration = update
            .execution_duration
            .map(check_execution_duration)
            .transpose()?;

        let slot = self.slot(id).await?;
        let mut state = slot.state.lock().await;
        if state.removed {
            return Err(UwsError::NotFound(id));
        }
        if let Some(duration) = execution_duration {
            state.record.set_execution_duration(Some(duration))?;
        }
        if let Some(at) = destruction_time {
            state.record.destruction_time = Some(at);
        }
        debug!(job_id = %id, "job updated");
        Ok(state.record.clone())
    }

    /// The only way phase, results and error change.
    ///
    /// Entering ABORTED also fires the job's cancellation token.
    pub async fn apply_transition(
        &self,
        id: JobId,
        requested: ExecutionPhase,
        payload: TransitionPayload,
    ) -> Result<JobRecord, UwsError> {
        let slot = self.slot(id).await?;
        let mut state = slot.state.lock().await;
        if state.removed {
            return Err(UwsError::NotFound(id));
        }
        let from = state.record.phase;
        state.record.apply(requested, payload, self.clock.now())?;
        slot.phase_tx.send_replace(requested);
        if requested == ExecutionPhase::Aborted {
            slot.cancel.cancel();
        }
        debug!(job_id = %id, from = %from, to = %requested, "phase transition");
        Ok(state.record.clone())
    }

    /// Abort a job that has not reached a terminal phase.
    pub async fn abort(&self, id: JobId) -> Result<JobRecord, UwsError> {
        let record = self
            .apply_transition(id, ExecutionPhase::Aborted, TransitionPayload::None)
            .await?;
        info!(job_id = %id, "job aborted");
        Ok(record)
    }

    /// Remove a job, aborting it first if it is still abortable.
    pub async fn delete(&self, id: JobId) -> Result<(), UwsError> {
        let slot = self.slot(id).await?;
        let mut state = slot.state.lock().await;
        if state.removed {
            return Err(UwsError::NotFound(id));
        }
        self.remove_locked(id, &slot, &mut state).await?;
        drop(state);

        info!(job_id = %id, "job deleted");
        Ok(())
    }

    /// Remove a job only if its destruction time has passed at `now`.
    ///
    /// Expiry is checked under the job lock, so a destruction time extended
    /// by a concurrent `update` is honoured. Returns the phase the job was in
    /// when removed, or `None` if it is not expired.
    pub async fn destroy_if_expired(
        &self,
        id: JobId,
        now: DateTime<Utc>,
    ) -> Result<Option<ExecutionPhase>, UwsError> {
        let slot = self.slot(id).await?;
        let mut state = slot.state.lock().await;
        if state.removed {
            return Err(UwsError::NotFound(id));
        }
        if !state.record.is_destroyed_at(now) {
            return Ok(None);
        }
        let phase = state.record.phase;
        self.remove_locked(id, &slot, &mut state).await?;
        drop(state);

        info!(job_id = %id, phase = %phase, "job destroyed");
        Ok(Some(phase))
    }

    /// Abort if abortable, fire the token and drop the slot from the map.
    /// The caller holds the slot lock.
    async fn remove_locked(
        &self,
        id: JobId,
        slot: &JobSlot,
        state: &mut SlotState,
    ) -> Result<(), UwsError> {
        let from = state.record.phase;
        if from.can_transition_to(ExecutionPhase::Aborted) {
            state
                .record
                .apply(ExecutionPhase::Aborted, TransitionPayload::None, self.clock.now())?;
            slot.phase_tx.send_replace(ExecutionPhase::Aborted);
            debug!(job_id = %id, from = %from, "aborted before removal");
        }
        slot.cancel.cancel();
        state.removed = true;
        self.jobs.write().await.remove(&id);
        Ok(())
    }

    /// Token fired when the job is aborted or deleted.
    pub async fn cancellation_token(&self, id: JobId) -> Result<CancellationToken, UwsError> {
        Ok(self.slot(id).await?.cancel.clone())
    }

    /// Block while the job sits in an active phase, until it changes or
    /// `timeout` elapses, then return the current record.
    pub async fn wait(&self, id: JobId, timeout: Duration) -> Result<JobRecord, UwsError> {
        let mut rx = {
            let slot = self.slot(id).await?;
            slot.phase_tx.subscribe()
        };
        let current = *rx.borrow_and_update();
        if current.is_active() {
            // a closed channel means the job was deleted; get() reports that
            let _ = tokio::time::timeout(timeout, rx.changed()).await;
        }
        self.get(id).await
    }

    async fn slot(&self, id: JobId) -> Result<Arc<JobSlot>, UwsError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(UwsError::NotFound(id))
    }
}

fn add_std(at: DateTime<Utc>, duration: Duration) -> Option<DateTime<Utc>> {
    TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
}
