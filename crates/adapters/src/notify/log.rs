// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notifier that writes to the tracing log.
//!
//! The default egress for headless deployments where no chat front end is
//! wired in.

use super::{message, Notifier, NotifyError};
use async_trait::async_trait;
use legate_core::{Artifact, Job, ResponseMode};

#[derive(Debug, Clone, Copy)]
pub struct LogNotifier {
    response_mode: ResponseMode,
}

impl LogNotifier {
    pub fn new(response_mode: ResponseMode) -> Self {
        Self { response_mode }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new(ResponseMode::Natural)
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_text(&self, text: &str) -> Result<(), NotifyError> {
        tracing::info!(target: "legate::notify", %text, "owner message");
        Ok(())
    }

    async fn send_job_status(&self, job: &Job, heading: &str) -> Result<(), NotifyError> {
        let text = message::job_status(job, heading, self.response_mode);
        tracing::info!(target: "legate::notify", job_id = job.id, %text, "job status");
        Ok(())
    }

    async fn send_artifacts(&self, artifacts: &[Artifact]) -> Result<(), NotifyError> {
        for artifact in artifacts {
            tracing::info!(
                target: "legate::notify",
                job_id = artifact.job_id,
                path = %artifact.path.display(),
                caption = %message::artifact_caption(artifact),
                "artifact"
            );
        }
        Ok(())
    }

    async fn send_approval_request(&self, job: &Job, reason: &str) -> Result<(), NotifyError> {
        let text = message::approval_request(job, reason);
        tracing::info!(target: "legate::notify", job_id = job.id, %text, "approval request");
        Ok(())
    }
}
