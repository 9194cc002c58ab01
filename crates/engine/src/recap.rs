// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recap clip generation.
//!
//! An optional external-tool invocation: render a six-second 720p clip for
//! a job — from its first image artifact when one exists, otherwise a black
//! slate — and register the result as a `video` artifact.

use crate::artifacts::ArtifactCollector;
use legate_core::{Artifact, ArtifactKind, Settings};
use legate_storage::{StorageError, Store};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Wall-clock ceiling for the ffmpeg invocation.
const FFMPEG_TIMEOUT: Duration = Duration::from_secs(300);

const SLATE_FILTER: &str = "color=c=black:s=1280x720:d=6";
const SCALE_FILTER: &str =
    "scale=1280:720:force_original_aspect_ratio=decrease,pad=1280:720:(ow-iw)/2:(oh-ih)/2:color=black";

/// Errors from recap generation.
#[derive(Debug, Error)]
pub enum RecapError {
    #[error("ffmpeg is not installed on the server")]
    FfmpegMissing,
    #[error("ffmpeg failed to create recap video")]
    FfmpegFailed,
    #[error("video generated but rejected by artifact policy")]
    Rejected,
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Renders recap clips with ffmpeg.
pub struct RecapService {
    store: Arc<Store>,
    collector: Arc<ArtifactCollector>,
    settings: Arc<Settings>,
}

impl RecapService {
    pub fn new(store: Arc<Store>, collector: Arc<ArtifactCollector>, settings: Arc<Settings>) -> Self {
        Self {
            store,
            collector,
            settings,
        }
    }

    pub async fn generate_for_job(&self, job_id: i64) -> Result<Artifact, RecapError> {
        self.store.get_job(job_id)?;
        if which::which("ffmpeg").is_err() {
            return Err(RecapError::FfmpegMissing);
        }

        let run_dir = self.settings.run_dir(job_id);
        std::fs::create_dir_all(&run_dir)?;
        let output_path = run_dir.join("recap.mp4");

        let first_image = self
            .store
            .list_artifacts(job_id)?
            .into_iter()
            .find(|artifact| artifact.kind == ArtifactKind::Image && artifact.path.exists());

        let args = match &first_image {
            Some(image) => slideshow_args(&image.path, &output_path),
            None => slate_args(&output_path),
        };

        tracing::info!(job_id, output = %output_path.display(), "rendering recap clip");
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let status = match tokio::time::timeout(FFMPEG_TIMEOUT, child.wait()).await {
            Ok(status) => status?,
            Err(_elapsed) => {
                let _ = child.kill().await;
                return Err(RecapError::FfmpegFailed);
            }
        };
        if !status.success() || !output_path.exists() {
            return Err(RecapError::FfmpegFailed);
        }

        self.collector
            .register_file(job_id, &output_path, Some(ArtifactKind::Video))?
            .ok_or(RecapError::Rejected)
    }
}

fn slideshow_args(image: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-loop".to_string(),
        "1".to_string(),
        "-i".to_string(),
        image.display().to_string(),
        "-t".to_string(),
        "6".to_string(),
        "-vf".to_string(),
        SCALE_FILTER.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        output.display().to_string(),
    ]
}

fn slate_args(output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        SLATE_FILTER.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        output.display().to_string(),
    ]
}

#[cfg(test)]
#[path = "recap_tests.rs"]
mod tests;
