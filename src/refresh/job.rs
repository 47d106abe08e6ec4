//! Background refresh-all job
//!
//! At most one job exists at a time. The job task walks the channels in
//! ascending id order and publishes its progress through a snapshot guarded by
//! a `RwLock`; the lock is only held for short copies and updates, never across
//! a fetch or a store call.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::channel::ChannelRefresher;
use crate::config::RuntimeSettingsStore;
use crate::errors::{RefreshError, RefreshResult};
use crate::models::{JobStart, JobStatus, OutcomeKind, RefreshJobSnapshot, RefreshOutcome};

pub type ProgressSender = broadcast::Sender<RefreshJobSnapshot>;
pub type ProgressReceiver = broadcast::Receiver<RefreshJobSnapshot>;

struct JobState {
    snapshot: RefreshJobSnapshot,
    cancel: CancellationToken,
}

#[derive(Clone)]
pub struct RefreshJobManager {
    refresher: ChannelRefresher,
    settings: RuntimeSettingsStore,
    job: Arc<RwLock<Option<JobState>>>,
    /// Held by whoever is writing refresh results: the job task or a single refresh
    writer: Arc<Mutex<()>>,
    progress_tx: ProgressSender,
}

impl RefreshJobManager {
    pub fn new(refresher: ChannelRefresher, settings: RuntimeSettingsStore) -> Self {
        let (progress_tx, _) = broadcast::channel(256);
        Self {
            refresher,
            settings,
            job: Arc::new(RwLock::new(None)),
            writer: Arc::new(Mutex::new(())),
            progress_tx,
        }
    }

    pub fn subscribe(&self) -> ProgressReceiver {
        self.progress_tx.subscribe()
    }

    pub fn refresher(&self) -> &ChannelRefresher {
        &self.refresher
    }

    pub fn settings(&self) -> &RuntimeSettingsStore {
        &self.settings
    }

    /// Start a refresh of every channel, or report the job already running
    pub async fn start_refresh_all(&self, force: bool) -> JobStart {
        let settings = self.settings.get().await;
        let interval = settings.refresh_interval();

        let mut guard = self.job.write().await;
        if let Some(existing) = guard.as_ref() {
            if existing.snapshot.status.is_active() {
                info!(job_id = %existing.snapshot.job_id, "Refresh job already running");
                return JobStart::AlreadyRunning(existing.snapshot.job_id);
            }
        }

        let job_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let snapshot = RefreshJobSnapshot {
            job_id,
            status: JobStatus::Running,
            force,
            processed_count: 0,
            refreshed_count: 0,
            skipped_count: 0,
            failed_count: 0,
            completed_count: 0,
            total_count: 0,
            current_channel: None,
            outcomes: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            cancelled: false,
            error: None,
        };
        let _ = self.progress_tx.send(snapshot.clone());
        *guard = Some(JobState {
            snapshot,
            cancel: cancel.clone(),
        });
        drop(guard);

        info!(%job_id, force, "Starting refresh job");
        let manager = self.clone();
        tokio::spawn(async move {
            manager
                .run_job(
                    job_id,
                    force,
                    interval,
                    settings.max_videos_per_channel,
                    settings.cookies_file,
                    cancel,
                )
                .await;
        });

        JobStart::Started(job_id)
    }

    async fn run_job(
        &self,
        job_id: Uuid,
        force: bool,
        interval: Duration,
        max_videos: u32,
        cookies_file: Option<String>,
        cancel: CancellationToken,
    ) {
        let _writer = self.writer.lock().await;

        let channels = match self.refresher.database().list_channels().await {
            Ok(channels) => channels,
            Err(e) => {
                self.finish(job_id, JobStatus::Failed, false, Some(format!("Failed to list channels: {}", e)))
                    .await;
                return;
            }
        };

        let total = channels.len();
        self.update(job_id, |s| s.total_count = total).await;

        for channel in channels {
            if cancel.is_cancelled() {
                info!(%job_id, "Refresh job stopped before channel {}", channel.id);
                self.finish(job_id, JobStatus::Completed, true, None).await;
                return;
            }

            if !channel.is_due(interval, force, Utc::now()) {
                self.record(job_id, RefreshOutcome::skipped(channel.id, channel.title.clone()))
                    .await;
                continue;
            }

            let title = channel.title.clone();
            self.update(job_id, |s| s.current_channel = Some(title)).await;

            match self
                .refresher
                .refresh_channel(&channel, max_videos, cookies_file.as_deref())
                .await
            {
                Ok(outcome) => self.record(job_id, outcome).await,
                Err(e) if e.is_fatal() => {
                    error!(%job_id, "Refresh job aborted: {}", e);
                    self.finish(job_id, JobStatus::Failed, false, Some(e.to_string()))
                        .await;
                    return;
                }
                Err(e) => {
                    let outcome =
                        RefreshOutcome::failed(channel.id, channel.title.clone(), e.to_string(), None);
                    self.record(job_id, outcome).await;
                }
            }
        }

        self.finish(job_id, JobStatus::Completed, false, None).await;
    }

    /// Apply `f` to the snapshot of `job_id` and broadcast the result
    async fn update<F>(&self, job_id: Uuid, f: F)
    where
        F: FnOnce(&mut RefreshJobSnapshot),
    {
        let mut guard = self.job.write().await;
        if let Some(job) = guard.as_mut().filter(|j| j.snapshot.job_id == job_id) {
            f(&mut job.snapshot);
            let _ = self.progress_tx.send(job.snapshot.clone());
        }
    }

    async fn record(&self, job_id: Uuid, outcome: RefreshOutcome) {
        self.update(job_id, |s| {
            match outcome.kind {
                OutcomeKind::Refreshed { .. } => {
                    s.refreshed_count += 1;
                    s.processed_count += 1;
                }
                OutcomeKind::Skipped => s.skipped_count += 1,
                OutcomeKind::Failed { .. } => {
                    s.failed_count += 1;
                    s.processed_count += 1;
                }
            }
            s.completed_count += 1;
            s.current_channel = None;
            s.outcomes.push(outcome);
        })
        .await;
    }

    async fn finish(&self, job_id: Uuid, status: JobStatus, cancelled: bool, error: Option<String>) {
        self.update(job_id, |s| {
            s.status = status;
            s.cancelled = cancelled;
            s.error = error;
            s.current_channel = None;
            s.finished_at = Some(Utc::now());
            info!(%job_id, "{}", s.summary());
        })
        .await;
    }

    /// Request a cooperative stop; the channel being fetched completes first
    pub async fn stop(&self, job_id: Uuid) -> RefreshResult<RefreshJobSnapshot> {
        let mut guard = self.job.write().await;
        let job = guard
            .as_mut()
            .filter(|j| j.snapshot.job_id == job_id)
            .ok_or(RefreshError::JobNotFound { job_id })?;

        if job.snapshot.status == JobStatus::Running {
            job.snapshot.status = JobStatus::StopRequested;
            job.cancel.cancel();
            let _ = self.progress_tx.send(job.snapshot.clone());
            info!(%job_id, "Stop requested for refresh job");
        } else {
            warn!(%job_id, status = ?job.snapshot.status, "Stop ignored, job not running");
        }
        Ok(job.snapshot.clone())
    }

    pub async fn status(&self, job_id: Uuid) -> RefreshResult<RefreshJobSnapshot> {
        let guard = self.job.read().await;
        guard
            .as_ref()
            .filter(|j| j.snapshot.job_id == job_id)
            .map(|j| j.snapshot.clone())
            .ok_or(RefreshError::JobNotFound { job_id })
    }

    /// Snapshot of the latest job, finished or not
    pub async fn current(&self) -> Option<RefreshJobSnapshot> {
        self.job.read().await.as_ref().map(|j| j.snapshot.clone())
    }

    /// Id of the job currently owning the store
    pub async fn active_job_id(&self) -> Option<Uuid> {
        self.job
            .read()
            .await
            .as_ref()
            .filter(|j| j.snapshot.status.is_active())
            .map(|j| j.snapshot.job_id)
    }

    /// Writer lock for a single-channel refresh, refused while a job is active
    pub(crate) async fn acquire_single_writer(&self) -> RefreshResult<OwnedMutexGuard<()>> {
        if let Some(job_id) = self.active_job_id().await {
            return Err(RefreshError::AlreadyRunning { job_id });
        }
        Ok(self.writer.clone().lock_owned().await)
    }
}
