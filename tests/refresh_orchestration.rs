mod common;

use chrono::{Duration, TimeZone, Utc};

use common::{channel_url, payload, video, FakeExtractor, Harness};
use reelstats::{
    errors::{AppError, ExtractionError, ExtractionErrorKind, RefreshError},
    models::{JobStart, JobStatus, OutcomeKind, Platform},
};

#[tokio::test]
async fn test_force_refreshes_recently_refreshed_channel() {
    let harness = Harness::new(FakeExtractor::new()).await;
    let channel = harness.add_channel("fresh").await;
    harness
        .extractor
        .script(&channel.url, Ok(payload("Fresh", vec![video("a", 10)])));
    harness.mark_refreshed(channel.id, Utc::now()).await;

    let skipped = harness.service.refresh_one(channel.id, false).await.unwrap();
    assert!(skipped.is_skipped());
    assert!(harness.extractor.calls().is_empty());

    let forced = harness.service.refresh_one(channel.id, true).await.unwrap();
    assert!(forced.is_refreshed());
    assert_eq!(harness.extractor.calls(), vec![channel.url.clone()]);
}

#[tokio::test]
async fn test_repeated_refresh_does_not_duplicate_videos() {
    let harness = Harness::new(FakeExtractor::new()).await;
    let channel = harness.add_channel("repeat").await;
    harness.extractor.script(
        &channel.url,
        Ok(payload("Repeat", vec![video("a", 100), video("b", 200)])),
    );

    let first = harness.service.refresh_one(channel.id, true).await.unwrap();
    let second = harness.service.refresh_one(channel.id, true).await.unwrap();

    match (first.kind, second.kind) {
        (
            OutcomeKind::Refreshed { new_videos: first_new, .. },
            OutcomeKind::Refreshed { new_videos: second_new, videos_fetched, .. },
        ) => {
            assert_eq!(first_new, 2);
            assert_eq!(second_new, 0);
            assert_eq!(videos_fetched, 2);
        }
        other => panic!("unexpected outcomes {:?}", other),
    }

    let videos = harness.database.list_videos(channel.id, None).await.unwrap();
    assert_eq!(videos.len(), 2);
}

#[tokio::test]
async fn test_videos_outside_fetch_window_are_kept() {
    let harness = Harness::new(FakeExtractor::new()).await;
    let channel = harness.add_channel("window").await;

    harness.extractor.script(
        &channel.url,
        Ok(payload("Window", vec![video("v1", 10), video("v2", 20), video("v3", 30)])),
    );
    harness.service.refresh_one(channel.id, true).await.unwrap();

    harness.extractor.script(
        &channel.url,
        Ok(payload("Window", vec![video("v3", 35), video("v4", 40)])),
    );
    harness.service.refresh_one(channel.id, true).await.unwrap();

    let videos = harness.database.list_videos(channel.id, None).await.unwrap();
    let mut ids: Vec<_> = videos.iter().map(|v| v.platform_video_id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["v1", "v2", "v3", "v4"]);

    let v1 = videos.iter().find(|v| v.platform_video_id == "v1").unwrap();
    assert_eq!(v1.view_count, Some(10));
    let v3 = videos.iter().find(|v| v.platform_video_id == "v3").unwrap();
    assert_eq!(v3.view_count, Some(35));
}

#[tokio::test]
async fn test_delta_between_refreshes() {
    let harness = Harness::new(FakeExtractor::new()).await;
    let channel = harness.add_channel("growing").await;

    harness.extractor.script(
        &channel.url,
        Ok(payload("Growing", vec![video("a", 600), video("b", 400)])),
    );
    let first = harness.service.refresh_one(channel.id, true).await.unwrap();
    match first.kind {
        OutcomeKind::Refreshed { delta, .. } => assert!(delta.is_none()),
        other => panic!("unexpected outcome {:?}", other),
    }
    let aggregates = harness.database.get_channel_aggregates(channel.id).await.unwrap();
    assert_eq!(aggregates.total_views, 1000);

    harness.extractor.script(
        &channel.url,
        Ok(payload("Growing", vec![video("a", 700), video("b", 450)])),
    );
    let second = harness.service.refresh_one(channel.id, true).await.unwrap();
    match second.kind {
        OutcomeKind::Refreshed { delta: Some(delta), .. } => {
            assert_eq!(delta.total_views, 150);
            assert_eq!(delta.top_video_views, 100);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    let aggregates = harness.database.get_channel_aggregates(channel.id).await.unwrap();
    assert_eq!(aggregates.total_views, 1150);
}

#[tokio::test]
async fn test_partial_fetch_over_ten_stored_videos() {
    let harness = Harness::new(FakeExtractor::new()).await;
    let channel = harness.add_channel("library").await;

    let stored: Vec<_> = (0..10).map(|i| video(&format!("s{}", i), 100)).collect();
    harness
        .extractor
        .script(&channel.url, Ok(payload("Library", stored)));
    harness.service.refresh_one(channel.id, true).await.unwrap();
    let aggregates = harness.database.get_channel_aggregates(channel.id).await.unwrap();
    assert_eq!(aggregates.total_views, 1000);

    // Three known videos gained 10 views each, two are new
    harness.extractor.script(
        &channel.url,
        Ok(payload(
            "Library",
            vec![
                video("s7", 110),
                video("s8", 110),
                video("s9", 110),
                video("n1", 50),
                video("n2", 70),
            ],
        )),
    );
    let outcome = harness.service.refresh_one(channel.id, true).await.unwrap();

    match outcome.kind {
        OutcomeKind::Refreshed {
            videos_fetched,
            new_videos,
            delta: Some(delta),
            video_changes,
        } => {
            assert_eq!(videos_fetched, 5);
            assert_eq!(new_videos, 2);
            assert_eq!(delta.total_views, 150);
            let mut changed: Vec<_> = video_changes
                .iter()
                .map(|c| (c.platform_video_id.as_str(), c.delta.views))
                .collect();
            changed.sort();
            assert_eq!(
                changed,
                vec![("s7", Some(10)), ("s8", Some(10)), ("s9", Some(10))]
            );
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let aggregates = harness.database.get_channel_aggregates(channel.id).await.unwrap();
    assert_eq!(aggregates.total_views, 1150);
    assert_eq!(aggregates.video_count, 12);

    let videos = harness.database.list_videos(channel.id, None).await.unwrap();
    assert_eq!(videos.len(), 12);
    let untouched = videos.iter().find(|v| v.platform_video_id == "s0").unwrap();
    assert_eq!(untouched.view_count, Some(100));
    let grown = videos.iter().find(|v| v.platform_video_id == "s8").unwrap();
    assert_eq!(grown.view_delta, Some(10));
    assert_eq!(grown.like_delta, Some(1));
    let fresh = videos.iter().find(|v| v.platform_video_id == "n2").unwrap();
    assert_eq!(fresh.view_count, Some(70));
    assert_eq!(fresh.view_delta, Some(0));
}

#[tokio::test]
async fn test_identical_refresh_only_moves_update_time() {
    let harness = Harness::new(FakeExtractor::new()).await;
    let channel = harness.add_channel("steady").await;

    let published = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let mut detailed = video("d", 900);
    detailed.published_at = Some(published);
    detailed.duration_seconds = Some(42);
    detailed.thumbnail_url = Some("https://i.ytimg.com/vi/d/default.jpg".to_string());
    let mut sparse = video("s", 0);
    sparse.like_count = None;
    sparse.comment_count = None;

    let mut response = payload("Steady", vec![detailed, sparse]);
    response.subscriber_count = Some(3_000);
    harness.extractor.script(&channel.url, Ok(response));

    harness.service.refresh_one(channel.id, true).await.unwrap();
    let first_channel = harness.channel(channel.id).await;
    let first_videos = harness.database.list_videos(channel.id, None).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    harness.service.refresh_one(channel.id, true).await.unwrap();
    let second_channel = harness.channel(channel.id).await;
    let second_videos = harness.database.list_videos(channel.id, None).await.unwrap();

    assert_eq!(first_videos.len(), 2);
    assert_eq!(second_videos.len(), 2);
    for (before, after) in first_videos.iter().zip(&second_videos) {
        assert!(after.last_updated_at > before.last_updated_at);
        let mut after = after.clone();
        after.last_updated_at = before.last_updated_at;
        assert_eq!(&after, before);
    }

    let mut second_channel = second_channel;
    assert!(second_channel.last_refreshed_at > first_channel.last_refreshed_at);
    second_channel.last_refreshed_at = first_channel.last_refreshed_at;
    assert_eq!(second_channel, first_channel);
}

#[tokio::test]
async fn test_batch_skips_channels_inside_interval() {
    let harness = Harness::new(FakeExtractor::new()).await;
    let now = Utc::now();

    let a = harness.add_channel("alpha").await;
    let b = harness.add_channel("bravo").await;
    let c = harness.add_channel("charlie").await;
    harness.mark_refreshed(a.id, now - Duration::hours(7)).await;
    harness.mark_refreshed(b.id, now - Duration::hours(2)).await;
    for channel in [&a, &b, &c] {
        harness
            .extractor
            .script(&channel.url, Ok(payload(&channel.title, vec![video(&channel.title, 5)])));
    }
    let b_before = harness.channel(b.id).await;

    let start = harness.service.start_refresh_all(false).await;
    assert!(!start.already_running());
    let job = harness.wait_for_job(start.job_id()).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert!(!job.cancelled);
    assert_eq!(job.processed_count, 2);
    assert_eq!(job.skipped_count, 1);
    assert_eq!(job.completed_count, 3);
    assert_eq!(job.total_count, 3);
    assert_eq!(harness.extractor.calls(), vec![a.url.clone(), c.url.clone()]);

    let b_after = harness.channel(b.id).await;
    assert_eq!(b_after.last_refreshed_at, b_before.last_refreshed_at);
    assert!(harness.database.list_videos(b.id, None).await.unwrap().is_empty());

    assert!(harness.channel(c.id).await.last_refreshed_at.is_some());
}

#[tokio::test]
async fn test_batch_processes_channels_in_id_order() {
    let harness = Harness::new(FakeExtractor::new()).await;
    let mut urls = Vec::new();
    for handle in ["zulu", "mike", "alpha", "kilo"] {
        let channel = harness.add_channel(handle).await;
        harness
            .extractor
            .script(&channel.url, Ok(payload(handle, vec![video(handle, 1)])));
        urls.push(channel.url);
    }

    let job = harness
        .wait_for_job(harness.service.start_refresh_all(true).await.job_id())
        .await;

    assert_eq!(harness.extractor.calls(), urls);
    let ids: Vec<i64> = job.outcomes.iter().map(|o| o.channel_id).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
    assert_eq!(job.refreshed_count, 4);
}

#[tokio::test]
async fn test_failed_channel_does_not_stop_batch() {
    let harness = Harness::new(FakeExtractor::new()).await;
    let first = harness.add_channel("one").await;
    let broken = harness.add_channel("two").await;
    let third = harness.add_channel("three").await;

    harness
        .extractor
        .script(&first.url, Ok(payload("One", vec![video("1", 1)])));
    harness.extractor.script(
        &broken.url,
        Err(ExtractionError::failed(
            Platform::YouTube,
            ExtractionErrorKind::RateLimited,
            "Source rate-limited the request (HTTP 429). Please try again later.",
        )),
    );
    harness
        .extractor
        .script(&third.url, Ok(payload("Three", vec![video("3", 3)])));

    let job = harness
        .wait_for_job(harness.service.start_refresh_all(true).await.job_id())
        .await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.refreshed_count, 2);
    assert_eq!(job.failed_count, 1);
    assert_eq!(job.processed_count, 3);

    match &job.outcomes[1].kind {
        OutcomeKind::Failed { reason, error_kind } => {
            assert!(reason.contains("HTTP 429"));
            assert_eq!(*error_kind, Some(ExtractionErrorKind::RateLimited));
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let broken_after = harness.channel(broken.id).await;
    assert!(broken_after.last_refreshed_at.is_none());
    assert!(broken_after.last_error.unwrap().contains("HTTP 429"));
    assert!(harness.channel(third.id).await.last_error.is_none());
}

#[tokio::test]
async fn test_empty_result_is_a_failed_outcome() {
    let harness = Harness::new(FakeExtractor::new()).await;
    let channel = harness.add_channel("quiet").await;
    harness
        .extractor
        .script(&channel.url, Ok(payload("Quiet", Vec::new())));

    let outcome = harness.service.refresh_one(channel.id, true).await.unwrap();
    match outcome.kind {
        OutcomeKind::Failed { error_kind, .. } => {
            assert_eq!(error_kind, Some(ExtractionErrorKind::EmptyResult));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(harness.channel(channel.id).await.last_refreshed_at.is_none());
}

#[tokio::test]
async fn test_unavailable_adapter_fails_the_job() {
    let harness = Harness::new(FakeExtractor::new()).await;
    let first = harness.add_channel("first").await;
    let second = harness.add_channel("second").await;
    harness.extractor.script(
        &first.url,
        Err(ExtractionError::unavailable("yt-dlp executable not found")),
    );
    harness
        .extractor
        .script(&second.url, Ok(payload("Second", vec![video("x", 1)])));

    let job = harness
        .wait_for_job(harness.service.start_refresh_all(true).await.job_id())
        .await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("yt-dlp"));
    assert!(job.outcomes.is_empty());
    assert_eq!(harness.extractor.calls(), vec![first.url.clone()]);
    assert!(harness.channel(second.id).await.last_refreshed_at.is_none());
}

#[tokio::test]
async fn test_stop_after_current_channel() {
    let (extractor, mut gate) = FakeExtractor::gated();
    let harness = Harness::new(extractor).await;
    let mut channels = Vec::new();
    for handle in ["c1", "c2", "c3", "c4"] {
        let channel = harness.add_channel(handle).await;
        harness
            .extractor
            .script(&channel.url, Ok(payload(handle, vec![video(handle, 10)])));
        channels.push(channel);
    }

    let job_id = harness.service.start_refresh_all(true).await.job_id();

    assert_eq!(gate.next_started().await, channels[0].url);
    gate.release(1);
    assert_eq!(gate.next_started().await, channels[1].url);

    let stopping = harness.service.stop(job_id).await.unwrap();
    assert_eq!(stopping.status, JobStatus::StopRequested);
    gate.release(1);

    let job = harness.wait_for_job(job_id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.cancelled);
    assert_eq!(job.outcomes.len(), 2);
    assert!(job.outcomes.iter().all(|o| o.is_refreshed()));

    for channel in &channels[2..] {
        assert!(harness.channel(channel.id).await.last_refreshed_at.is_none());
    }
    assert_eq!(harness.extractor.calls().len(), 2);
}

#[tokio::test]
async fn test_second_start_reports_running_job() {
    let (extractor, mut gate) = FakeExtractor::gated();
    let harness = Harness::new(extractor).await;
    let channel = harness.add_channel("busy").await;
    harness
        .extractor
        .script(&channel.url, Ok(payload("Busy", vec![video("b", 1)])));

    let first = harness.service.start_refresh_all(true).await;
    assert!(matches!(first, JobStart::Started(_)));
    gate.next_started().await;

    let second = harness.service.start_refresh_all(false).await;
    assert!(second.already_running());
    assert_eq!(second.job_id(), first.job_id());

    match harness.service.refresh_one(channel.id, true).await {
        Err(RefreshError::AlreadyRunning { job_id }) => assert_eq!(job_id, first.job_id()),
        other => panic!("expected AlreadyRunning, got {:?}", other),
    }

    gate.release(1);
    let job = harness.wait_for_job(first.job_id()).await;
    assert_eq!(job.status, JobStatus::Completed);

    let next = harness.service.start_refresh_all(false).await;
    assert!(!next.already_running());
    assert_ne!(next.job_id(), first.job_id());
}

#[tokio::test]
async fn test_add_channel_during_job_stores_nothing() {
    let (extractor, mut gate) = FakeExtractor::gated();
    let harness = Harness::new(extractor).await;
    let busy = harness.add_channel("busy").await;
    harness
        .extractor
        .script(&busy.url, Ok(payload("Busy", vec![video("b", 1)])));
    let url = channel_url("latecomer");
    harness
        .extractor
        .script(&url, Ok(payload("Latecomer", vec![video("l", 9)])));

    let job_id = harness.service.start_refresh_all(true).await.job_id();
    gate.next_started().await;

    match harness.service.add_channel(&url).await {
        Err(AppError::Refresh(RefreshError::AlreadyRunning { job_id: running })) => {
            assert_eq!(running, job_id)
        }
        other => panic!("expected AlreadyRunning, got {:?}", other),
    }
    assert!(harness.database.find_channel_by_url(&url).await.unwrap().is_none());

    gate.release(1);
    harness.wait_for_job(job_id).await;

    // Once the job is done the same URL is accepted and fetched
    gate.release(1);
    let (channel, outcome) = harness.service.add_channel(&url).await.unwrap();
    assert_eq!(channel.title, "Latecomer");
    assert!(outcome.is_refreshed());
}

#[tokio::test]
async fn test_delete_channel_during_job_is_refused() {
    let (extractor, mut gate) = FakeExtractor::gated();
    let harness = Harness::new(extractor).await;
    let channel = harness.add_channel("inflight").await;
    harness
        .extractor
        .script(&channel.url, Ok(payload("Inflight", vec![video("i", 5)])));

    let job_id = harness.service.start_refresh_all(true).await.job_id();
    gate.next_started().await;

    assert!(matches!(
        harness.service.delete_channel(channel.id).await,
        Err(AppError::Refresh(RefreshError::AlreadyRunning { .. }))
    ));

    gate.release(1);
    let job = harness.wait_for_job(job_id).await;
    assert_eq!(job.refreshed_count, 1);
    assert_eq!(job.failed_count, 0);

    assert!(harness.service.delete_channel(channel.id).await.unwrap());
    assert!(harness.database.get_channel(channel.id).await.unwrap().is_none());
    assert!(!harness.service.delete_channel(channel.id).await.unwrap());
}

#[tokio::test]
async fn test_stop_of_unknown_job() {
    let harness = Harness::new(FakeExtractor::new()).await;
    let missing = uuid::Uuid::new_v4();
    assert!(matches!(
        harness.service.stop(missing).await,
        Err(RefreshError::JobNotFound { .. })
    ));
}

#[tokio::test]
async fn test_add_channel_validates_and_fetches() {
    let harness = Harness::new(FakeExtractor::new()).await;
    let url = channel_url("newcomer");
    harness
        .extractor
        .script(&url, Ok(payload("Newcomer", vec![video("n", 42)])));

    let (channel, outcome) = harness.service.add_channel("@newcomer").await.unwrap();
    assert_eq!(channel.url, url);
    assert_eq!(channel.title, "Newcomer");
    assert!(outcome.is_refreshed());

    assert!(harness.service.add_channel("@newcomer").await.is_err());
    assert!(harness
        .service
        .add_channel("https://example.com/someone")
        .await
        .is_err());
}

#[tokio::test]
async fn test_progress_is_broadcast() {
    let harness = Harness::new(FakeExtractor::new()).await;
    let channel = harness.add_channel("watched").await;
    harness
        .extractor
        .script(&channel.url, Ok(payload("Watched", vec![video("w", 3)])));

    let mut progress = harness.service.jobs().subscribe();
    let job_id = harness.service.start_refresh_all(true).await.job_id();

    let finished = tokio::time::timeout(std::time::Duration::from_secs(10), async {
        loop {
            let snapshot = progress.recv().await.unwrap();
            if snapshot.is_finished() {
                return snapshot;
            }
        }
    })
    .await
    .expect("no final progress event");

    assert_eq!(finished.job_id, job_id);
    assert_eq!(finished.status, JobStatus::Completed);
    assert_eq!(finished.completed_count, 1);
}
