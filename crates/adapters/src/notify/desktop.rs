// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Desktop notification egress using notify-rust.
//!
//! Useful when the owner runs the control plane on their own machine and
//! wants job outcomes surfaced without a chat client attached.

use super::{message, Notifier, NotifyError};
use async_trait::async_trait;
use legate_core::{Artifact, Job, ResponseMode};

#[derive(Debug, Clone, Copy)]
pub struct DesktopNotifier {
    response_mode: ResponseMode,
}

impl DesktopNotifier {
    pub fn new(response_mode: ResponseMode) -> Self {
        Self { response_mode }
    }

    fn show(title: String, body: String) {
        // notify_rust::Notification::show() can block on the session bus.
        // Fire-and-forget on tokio's bounded blocking thread pool.
        tokio::task::spawn_blocking(move || {
            match notify_rust::Notification::new()
                .summary(&title)
                .body(&body)
                .show()
            {
                Ok(_) => tracing::debug!(%title, "desktop notification sent"),
                Err(e) => tracing::warn!(%title, error = %e, "desktop notification failed"),
            }
        });
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new(ResponseMode::Natural)
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn send_text(&self, text: &str) -> Result<(), NotifyError> {
        Self::show("Legate".to_string(), text.to_string());
        Ok(())
    }

    async fn send_job_status(&self, job: &Job, heading: &str) -> Result<(), NotifyError> {
        let body = message::job_status(job, heading, self.response_mode);
        Self::show(format!("{heading} (job {})", job.id), body);
        Ok(())
    }

    async fn send_artifacts(&self, artifacts: &[Artifact]) -> Result<(), NotifyError> {
        for artifact in artifacts {
            Self::show(
                format!("Artifact for job {}", artifact.job_id),
                message::artifact_caption(artifact),
            );
        }
        Ok(())
    }

    async fn send_approval_request(&self, job: &Job, reason: &str) -> Result<(), NotifyError> {
        Self::show(
            format!("Approval needed (job {})", job.id),
            message::approval_request(job, reason),
        );
        Ok(())
    }
}
