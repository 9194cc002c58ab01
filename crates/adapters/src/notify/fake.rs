// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake notifier for tests.

use super::{Notifier, NotifyError};
use async_trait::async_trait;
use legate_core::{Artifact, Job, JobStatus};
use parking_lot::Mutex;
use std::sync::Arc;

/// Recorded egress call.
#[derive(Debug, Clone)]
pub enum NotifyCall {
    Text(String),
    JobStatus {
        job_id: i64,
        status: JobStatus,
        heading: String,
    },
    Artifacts(Vec<Artifact>),
    ApprovalRequest {
        job_id: i64,
        reason: String,
    },
}

struct FakeNotifierState {
    calls: Vec<NotifyCall>,
    fail_sends: bool,
}

/// Fake notifier recording every call, optionally failing each send.
#[derive(Clone)]
pub struct FakeNotifier {
    inner: Arc<Mutex<FakeNotifierState>>,
}

impl Default for FakeNotifier {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeNotifierState {
                calls: Vec::new(),
                fail_sends: false,
            })),
        }
    }
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send fail, to exercise best-effort delivery paths.
    pub fn failing() -> Self {
        let fake = Self::default();
        fake.inner.lock().fail_sends = true;
        fake
    }

    /// All recorded calls, in delivery order.
    pub fn calls(&self) -> Vec<NotifyCall> {
        self.inner.lock().calls.clone()
    }

    /// Headings of every recorded job-status call.
    pub fn status_headings(&self) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                NotifyCall::JobStatus { heading, .. } => Some(heading.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: NotifyCall) -> Result<(), NotifyError> {
        let mut state = self.inner.lock();
        state.calls.push(call);
        if state.fail_sends {
            return Err(NotifyError::SendFailed("fake notifier failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send_text(&self, text: &str) -> Result<(), NotifyError> {
        self.record(NotifyCall::Text(text.to_string()))
    }

    async fn send_job_status(&self, job: &Job, heading: &str) -> Result<(), NotifyError> {
        self.record(NotifyCall::JobStatus {
            job_id: job.id,
            status: job.status,
            heading: heading.to_string(),
        })
    }

    async fn send_artifacts(&self, artifacts: &[Artifact]) -> Result<(), NotifyError> {
        self.record(NotifyCall::Artifacts(artifacts.to_vec()))
    }

    async fn send_approval_request(&self, job: &Job, reason: &str) -> Result<(), NotifyError> {
        self.record(NotifyCall::ApprovalRequest {
            job_id: job.id,
            reason: reason.to_string(),
        })
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
