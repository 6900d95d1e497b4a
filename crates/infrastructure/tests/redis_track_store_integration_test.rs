use std::sync::Arc;

use anyhow::Result;
use mediaflow_config::{TrackStoreConfig, TrackStoreKind};
use mediaflow_domain::{
    Detection, PipelineSchema, Task, Track, TrackJob, TrackKey, TrackRepository,
};
use mediaflow_infrastructure::RedisTrackRepository;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;

async fn setup(prefix: &str) -> Result<(ContainerAsync<Redis>, RedisTrackRepository)> {
    let container = Redis::default().with_tag("7-alpine").start().await?;
    let port = container.get_host_port_ipv4(6379).await?;
    let config = TrackStoreConfig {
        kind: TrackStoreKind::Redis,
        redis_url: format!("redis://127.0.0.1:{port}"),
        key_prefix: prefix.to_string(),
        connection_timeout_seconds: 10,
    };
    let repo = RedisTrackRepository::connect(&config).await?;
    Ok((container, repo))
}

fn track(key: TrackKey, frame: i64, confidence: f32) -> Track {
    Track::from_detections(
        key,
        "FACE",
        vec![
            Detection::new(4, 4, 32, 32, confidence, frame, frame * 40),
            Detection::new(6, 4, 32, 32, confidence / 2.0, frame + 1, frame * 40 + 40),
        ],
    )
    .unwrap()
    .with_property("CLASSIFIER", "ocv")
}

fn job(job_id: i64) -> TrackJob {
    let pipeline = PipelineSchema::new(
        "ocv face pipeline",
        "",
        vec![
            Task::new("ocv face task", "detect faces", vec!["ocv face action"]).unwrap(),
            Task::new("markup task", "draw boxes", vec!["markup action"]).unwrap(),
        ],
    )
    .unwrap();
    TrackJob::new(job_id, vec![1, 2], pipeline)
}

#[tokio::test]
#[ignore] // Ignore by default since it requires Docker
async fn test_set_then_get_returns_sorted_tracks() -> Result<()> {
    let (_container, repo) = setup("set-get").await?;
    let key = TrackKey::new(1, 1, 0, 0);
    let tracks = vec![track(key, 30, 0.4), track(key, 10, 0.9), track(key, 20, 0.6)];

    repo.set_tracks(&key, &tracks).await?;
    let mut expected = tracks.clone();
    expected.sort();
    assert_eq!(repo.get_tracks(&key).await?, expected);

    repo.set_tracks(&key, &tracks[..1]).await?;
    assert_eq!(repo.get_tracks(&key).await?, vec![tracks[0].clone()]);
    Ok(())
}

#[tokio::test]
#[ignore] // Ignore by default since it requires Docker
async fn test_add_order_is_irrelevant() -> Result<()> {
    let (_container, repo) = setup("add-order").await?;
    let first = TrackKey::new(1, 1, 0, 0);
    let second = TrackKey::new(1, 2, 0, 0);
    let (a, b) = (track(first, 5, 0.5), track(first, 1, 0.5));

    repo.add_track(&a).await?;
    repo.add_track(&b).await?;
    let (c, d) = (track(second, 5, 0.5), track(second, 1, 0.5));
    repo.add_track(&d).await?;
    repo.add_track(&c).await?;

    let from_first: Vec<i64> = repo.get_tracks(&first).await?.iter().map(|t| t.start_offset_frame).collect();
    let from_second: Vec<i64> = repo.get_tracks(&second).await?.iter().map(|t| t.start_offset_frame).collect();
    assert_eq!(from_first, vec![1, 5]);
    assert_eq!(from_first, from_second);
    Ok(())
}

#[tokio::test]
#[ignore] // Ignore by default since it requires Docker
async fn test_nan_confidence_never_poisons_a_key() -> Result<()> {
    let (_container, repo) = setup("nan").await?;
    let key = TrackKey::new(3, 1, 0, 0);
    let good = track(key, 1, 0.7);
    repo.add_track(&good).await?;

    let mut nan = track(key, 2, 0.7);
    nan.confidence = f32::NAN;
    assert!(repo.add_track(&nan).await.unwrap_err().is_validation());
    assert!(repo
        .set_tracks(&key, &[nan])
        .await
        .unwrap_err()
        .is_validation());

    assert_eq!(repo.get_tracks(&key).await?, vec![good]);
    Ok(())
}

#[tokio::test]
#[ignore] // Ignore by default since it requires Docker
async fn test_clear_tracks_removes_every_key_of_job() -> Result<()> {
    let (_container, repo) = setup("clear").await?;
    let job = job(9);
    for key in job.keys() {
        repo.add_track(&track(key, 1, 0.5)).await?;
    }
    let other = TrackKey::new(10, 1, 0, 0);
    repo.add_track(&track(other, 1, 0.5)).await?;

    repo.clear_tracks(&job).await?;
    for key in job.keys() {
        assert!(repo.get_tracks(&key).await?.is_empty());
    }
    assert_eq!(repo.get_tracks(&other).await?.len(), 1);

    repo.clear_tracks(&job).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Ignore by default since it requires Docker
async fn test_concurrent_adds_are_not_lost() -> Result<()> {
    let (_container, repo) = setup("concurrent").await?;
    let repo = Arc::new(repo);
    let key = TrackKey::new(3, 1, 1, 0);

    let handles: Vec<_> = (0..100)
        .map(|frame| {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move { repo.add_track(&track(key, frame, 0.5)).await })
        })
        .collect();
    for handle in handles {
        handle.await??;
    }

    assert_eq!(repo.get_tracks(&key).await?.len(), 100);
    Ok(())
}
