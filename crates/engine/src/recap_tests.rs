// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use legate_core::{JobMode, JobStatus, RiskLevel};
use std::path::PathBuf;
use tempfile::TempDir;

fn service() -> (RecapService, Arc<Store>, TempDir) {
    let dir = TempDir::new().unwrap();
    let work = dir.path().join("work");
    let runs = dir.path().join("runs");
    std::fs::create_dir_all(&work).unwrap();
    std::fs::create_dir_all(&runs).unwrap();
    let settings = Arc::new(Settings::new(
        dir.path().join("state.sqlite3"),
        runs.canonicalize().unwrap(),
        work.canonicalize().unwrap(),
    ));
    let store = Arc::new(Store::open_in_memory().unwrap());
    let collector = Arc::new(ArtifactCollector::new(store.clone(), settings.clone()));
    (
        RecapService::new(store.clone(), collector, settings),
        store,
        dir,
    )
}

#[tokio::test]
async fn unknown_job_is_an_error() {
    let (service, _store, _dir) = service();
    assert!(matches!(
        service.generate_for_job(404).await,
        Err(RecapError::Storage(StorageError::JobNotFound(404)))
    ));
}

#[test]
fn slideshow_args_loop_the_first_image() {
    let args = slideshow_args(
        &PathBuf::from("/runs/1/img.png"),
        &PathBuf::from("/runs/1/recap.mp4"),
    );
    assert_eq!(args[0], "-y");
    assert!(args.contains(&"-loop".to_string()));
    assert!(args.contains(&"/runs/1/img.png".to_string()));
    assert_eq!(args.last().unwrap(), "/runs/1/recap.mp4");
}

#[test]
fn slate_args_render_black_background() {
    let args = slate_args(&PathBuf::from("/runs/1/recap.mp4"));
    assert!(args.contains(&"lavfi".to_string()));
    assert!(args.iter().any(|a| a.contains("color=c=black")));
}

#[tokio::test]
async fn generates_slate_clip_when_ffmpeg_is_available() {
    if which::which("ffmpeg").is_err() {
        return; // environment without ffmpeg
    }
    let (service, store, _dir) = service();
    let job = store
        .create_job(
            "x",
            JobMode::Ephemeral,
            None,
            RiskLevel::Low,
            false,
            JobStatus::Queued,
        )
        .unwrap();

    let artifact = service.generate_for_job(job.id).await.unwrap();
    assert_eq!(artifact.kind, ArtifactKind::Video);
    assert!(artifact.path.ends_with("recap.mp4"));
}
