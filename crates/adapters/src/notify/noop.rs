// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notifier that drops everything.

use super::{Notifier, NotifyError};
use async_trait::async_trait;
use legate_core::{Artifact, Job};

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpNotifier;

impl NoOpNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for NoOpNotifier {
    async fn send_text(&self, _text: &str) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn send_job_status(&self, _job: &Job, _heading: &str) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn send_artifacts(&self, _artifacts: &[Artifact]) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn send_approval_request(&self, _job: &Job, _reason: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}
