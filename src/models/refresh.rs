use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analytics::AggregateDelta;
use crate::errors::ExtractionErrorKind;
use crate::models::VideoChange;

/// Lifecycle of the background refresh job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Running,
    StopRequested,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether the job still owns the store
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Running | JobStatus::StopRequested)
    }
}

/// Result of processing one channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeKind {
    Refreshed {
        videos_fetched: usize,
        new_videos: usize,
        /// `None` on the first refresh of a channel
        delta: Option<AggregateDelta>,
        /// Stored videos whose counts moved
        #[serde(default)]
        video_changes: Vec<VideoChange>,
    },
    Skipped,
    Failed {
        reason: String,
        #[serde(skip_deserializing)]
        error_kind: Option<ExtractionErrorKind>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshOutcome {
    pub channel_id: i64,
    pub channel_title: String,
    #[serde(flatten)]
    pub kind: OutcomeKind,
    pub finished_at: DateTime<Utc>,
}

impl RefreshOutcome {
    pub fn new(channel_id: i64, channel_title: impl Into<String>, kind: OutcomeKind) -> Self {
        Self {
            channel_id,
            channel_title: channel_title.into(),
            kind,
            finished_at: Utc::now(),
        }
    }

    pub fn skipped(channel_id: i64, channel_title: impl Into<String>) -> Self {
        Self::new(channel_id, channel_title, OutcomeKind::Skipped)
    }

    pub fn failed(
        channel_id: i64,
        channel_title: impl Into<String>,
        reason: impl Into<String>,
        error_kind: Option<ExtractionErrorKind>,
    ) -> Self {
        Self::new(
            channel_id,
            channel_title,
            OutcomeKind::Failed {
                reason: reason.into(),
                error_kind,
            },
        )
    }

    pub fn is_refreshed(&self) -> bool {
        matches!(self.kind, OutcomeKind::Refreshed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.kind, OutcomeKind::Skipped)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.kind, OutcomeKind::Failed { .. })
    }

    /// One-line summary suitable for a flash message
    pub fn summary(&self) -> String {
        match &self.kind {
            OutcomeKind::Refreshed {
                videos_fetched,
                delta,
                ..
            } => match delta {
                Some(delta) => format!(
                    "Refreshed '{}': {} videos, views {:+}",
                    self.channel_title, videos_fetched, delta.total_views
                ),
                None => format!(
                    "Refreshed '{}': {} videos",
                    self.channel_title, videos_fetched
                ),
            },
            OutcomeKind::Skipped => format!(
                "Skipped '{}': refreshed recently",
                self.channel_title
            ),
            OutcomeKind::Failed { reason, .. } => {
                format!("Refresh of '{}' failed: {}", self.channel_title, reason)
            }
        }
    }
}

/// Read-only view of the refresh job handed to observers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshJobSnapshot {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub force: bool,
    /// Channels actually fetched (refreshed or failed)
    pub processed_count: usize,
    pub refreshed_count: usize,
    pub skipped_count: usize,
    pub failed_count: usize,
    /// Channels handled so far, skipped ones included
    pub completed_count: usize,
    pub total_count: usize,
    pub current_channel: Option<String>,
    pub outcomes: Vec<RefreshOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
    pub error: Option<String>,
}

impl RefreshJobSnapshot {
    pub fn last_outcome(&self) -> Option<&RefreshOutcome> {
        self.outcomes.last()
    }

    pub fn is_finished(&self) -> bool {
        !self.status.is_active()
    }

    pub fn summary(&self) -> String {
        let counts = format!(
            "refreshed: {}, skipped: {}, failed: {}",
            self.refreshed_count, self.skipped_count, self.failed_count
        );
        match self.status {
            JobStatus::Failed => format!(
                "Refresh failed: {} ({})",
                self.error.as_deref().unwrap_or("unknown error"),
                counts
            ),
            _ if self.cancelled => format!(
                "Refresh stopped after {}/{} channels ({})",
                self.completed_count, self.total_count, counts
            ),
            _ => format!("Refresh done ({})", counts),
        }
    }
}

/// How a refresh-all request was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStart {
    Started(Uuid),
    AlreadyRunning(Uuid),
}

impl JobStart {
    pub fn job_id(&self) -> Uuid {
        match self {
            JobStart::Started(id) | JobStart::AlreadyRunning(id) => *id,
        }
    }

    pub fn already_running(&self) -> bool {
        matches!(self, JobStart::AlreadyRunning(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshAllRequest {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshAllResponse {
    pub job_id: Uuid,
    pub already_running: bool,
}
