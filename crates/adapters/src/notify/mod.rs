// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification egress.
//!
//! Delivery is best-effort: the orchestrator and dispatcher log notifier
//! errors and move on, so implementations should fail soft rather than
//! retry internally.

mod desktop;
mod log;
pub mod message;
mod noop;

pub use desktop::DesktopNotifier;
pub use log::LogNotifier;
pub use noop::NoOpNotifier;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeNotifier, NotifyCall};

use async_trait::async_trait;
use legate_core::{Artifact, Job};
use thiserror::Error;

/// Errors from notification delivery.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Egress to the owner's chat surface.
#[async_trait]
pub trait Notifier: Clone + Send + Sync + 'static {
    /// Deliver a plain text message.
    async fn send_text(&self, text: &str) -> Result<(), NotifyError>;

    /// Deliver a structured job-status message under a short heading.
    async fn send_job_status(&self, job: &Job, heading: &str) -> Result<(), NotifyError>;

    /// Deliver collected artifact files.
    async fn send_artifacts(&self, artifacts: &[Artifact]) -> Result<(), NotifyError>;

    /// Ask the owner to approve or reject a gated job.
    async fn send_approval_request(&self, job: &Job, reason: &str) -> Result<(), NotifyError>;
}
