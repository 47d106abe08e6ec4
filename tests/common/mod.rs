//! Shared fixtures: an in-memory store and a scripted extractor

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

use reelstats::{
    config::{AppSettings, RuntimeSettingsStore},
    database::Database,
    errors::ExtractionError,
    extractor::{FetchRequest, VideoExtractor},
    models::{Channel, ChannelPayload, Platform, RefreshJobSnapshot, VideoRecord},
    refresh::{ChannelRefresher, RefreshJobManager, RefreshService},
};

type Scripted = Result<ChannelPayload, ExtractionError>;

/// Extractor answering from a per-URL script
///
/// A gated extractor announces every fetch on `started` and then waits for a
/// permit, which lets a test hold the job in the middle of a channel.
#[derive(Default)]
pub struct FakeExtractor {
    responses: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<String>>,
    gate: Option<Gate>,
}

struct Gate {
    permits: Arc<Semaphore>,
    started: mpsc::UnboundedSender<String>,
}

pub struct GateHandle {
    pub permits: Arc<Semaphore>,
    pub started: mpsc::UnboundedReceiver<String>,
}

impl GateHandle {
    /// Wait for the next fetch to begin and return its URL
    pub async fn next_started(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(5), self.started.recv())
            .await
            .expect("fetch did not start in time")
            .expect("extractor dropped")
    }

    pub fn release(&self, count: usize) {
        self.permits.add_permits(count);
    }
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> (Self, GateHandle) {
        let permits = Arc::new(Semaphore::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        let extractor = Self {
            gate: Some(Gate {
                permits: permits.clone(),
                started: tx,
            }),
            ..Self::default()
        };
        (extractor, GateHandle { permits, started: rx })
    }

    pub fn script(&self, url: &str, response: Scripted) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoExtractor for FakeExtractor {
    async fn fetch_recent_videos(
        &self,
        request: &FetchRequest,
    ) -> Result<ChannelPayload, ExtractionError> {
        self.calls.lock().unwrap().push(request.channel_url.clone());

        if let Some(gate) = &self.gate {
            let _ = gate.started.send(request.channel_url.clone());
            gate.permits
                .acquire()
                .await
                .expect("gate closed")
                .forget();
        }

        let scripted = self
            .responses
            .lock()
            .unwrap()
            .get(&request.channel_url)
            .cloned();
        scripted.unwrap_or_else(|| {
            Err(ExtractionError::failed(
                request.platform,
                reelstats::errors::ExtractionErrorKind::Other,
                format!("no script for {}", request.channel_url),
            ))
        })
    }
}

pub fn video(id: &str, views: i64) -> VideoRecord {
    VideoRecord {
        platform_video_id: id.to_string(),
        title: format!("Video {}", id),
        url: format!("https://www.youtube.com/shorts/{}", id),
        view_count: Some(views),
        like_count: Some(views / 10),
        comment_count: Some(views / 100),
        ..Default::default()
    }
}

pub fn payload(title: &str, videos: Vec<VideoRecord>) -> ChannelPayload {
    ChannelPayload {
        title: Some(title.to_string()),
        videos,
        ..Default::default()
    }
}

pub fn settings(interval_hours: u32) -> RuntimeSettingsStore {
    RuntimeSettingsStore::in_memory(AppSettings {
        refresh_interval_hours: interval_hours,
        max_videos_per_channel: 12,
        cookies_file: None,
    })
}

pub struct Harness {
    pub database: Database,
    pub extractor: Arc<FakeExtractor>,
    pub service: RefreshService,
    pub settings: RuntimeSettingsStore,
}

impl Harness {
    pub async fn new(extractor: FakeExtractor) -> Self {
        let database = Database::new_in_memory().await.unwrap();
        let extractor = Arc::new(extractor);
        let settings = settings(6);
        let refresher = ChannelRefresher::new(database.clone(), extractor.clone());
        let jobs = RefreshJobManager::new(refresher, settings.clone());
        Self {
            database,
            extractor,
            service: RefreshService::new(jobs),
            settings,
        }
    }

    pub async fn add_channel(&self, handle: &str) -> Channel {
        self.database
            .create_channel(
                Platform::YouTube,
                &channel_url(handle),
                handle,
                Utc::now(),
            )
            .await
            .unwrap()
    }

    pub async fn channel(&self, id: i64) -> Channel {
        self.database.get_channel(id).await.unwrap().unwrap()
    }

    pub async fn mark_refreshed(&self, id: i64, at: DateTime<Utc>) {
        self.database.set_last_refreshed(id, at).await.unwrap();
    }

    /// Poll until the job reaches a terminal state
    pub async fn wait_for_job(&self, job_id: Uuid) -> RefreshJobSnapshot {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let snapshot = self.service.status(job_id).await.unwrap();
                if snapshot.is_finished() {
                    return snapshot;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("refresh job did not finish in time")
    }
}

pub fn channel_url(handle: &str) -> String {
    format!("https://www.youtube.com/@{}", handle)
}
