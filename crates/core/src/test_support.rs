// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::job::{Job, JobMode, JobStatus, RiskLevel};
use chrono::{TimeZone, Utc};

/// Builder for jobs in tests that bypass the store.
pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    pub fn new(id: i64) -> Self {
        let created = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().unwrap_or_default();
        Self {
            job: Job {
                id,
                status: JobStatus::Queued,
                mode: JobMode::Ephemeral,
                prompt: "say hello".to_string(),
                created_at: created,
                updated_at: created,
                session_name: None,
                risk_level: RiskLevel::Low,
                needs_approval: false,
                approved_by: None,
                started_at: None,
                finished_at: None,
                exit_code: None,
                summary_text: None,
                error_text: None,
            },
        }
    }

    pub fn prompt(mut self, prompt: &str) -> Self {
        self.job.prompt = prompt.to_string();
        self
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.job.status = status;
        self
    }

    pub fn mode(mut self, mode: JobMode) -> Self {
        self.job.mode = mode;
        self
    }

    pub fn session_name(mut self, name: &str) -> Self {
        self.job.session_name = Some(name.to_string());
        self.job.mode = JobMode::Session;
        self
    }

    pub fn needs_approval(mut self, needs: bool) -> Self {
        self.job.needs_approval = needs;
        self
    }

    pub fn approved_by(mut self, user_id: i64) -> Self {
        self.job.approved_by = Some(user_id);
        self
    }

    pub fn build(self) -> Job {
        self.job
    }
}
