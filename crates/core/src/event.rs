// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only job audit events.

use crate::job::UnknownValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of an entry in a job's audit log.
///
/// `job_submitted` always comes first for a job; the terminal kinds
/// (`job_succeeded`, `job_failed`, `job_canceled`,
/// `job_canceled_while_running`) are never followed by another entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    JobSubmitted,
    ApprovalRequired,
    JobApproved,
    JobRejected,
    JobStarted,
    JobSucceeded,
    JobFailed,
    JobCanceled,
    JobCanceledWhileRunning,
}

impl JobEventKind {
    /// On-disk string form.
    pub fn as_str(self) -> &'static str {
        match self {
            JobEventKind::JobSubmitted => "job_submitted",
            JobEventKind::ApprovalRequired => "approval_required",
            JobEventKind::JobApproved => "job_approved",
            JobEventKind::JobRejected => "job_rejected",
            JobEventKind::JobStarted => "job_started",
            JobEventKind::JobSucceeded => "job_succeeded",
            JobEventKind::JobFailed => "job_failed",
            JobEventKind::JobCanceled => "job_canceled",
            JobEventKind::JobCanceledWhileRunning => "job_canceled_while_running",
        }
    }

    /// True for kinds that close a job's audit log.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobEventKind::JobSucceeded
                | JobEventKind::JobFailed
                | JobEventKind::JobCanceled
                | JobEventKind::JobCanceledWhileRunning
        )
    }
}

impl fmt::Display for JobEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobEventKind {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job_submitted" => Ok(JobEventKind::JobSubmitted),
            "approval_required" => Ok(JobEventKind::ApprovalRequired),
            "job_approved" => Ok(JobEventKind::JobApproved),
            "job_rejected" => Ok(JobEventKind::JobRejected),
            "job_started" => Ok(JobEventKind::JobStarted),
            "job_succeeded" => Ok(JobEventKind::JobSucceeded),
            "job_failed" => Ok(JobEventKind::JobFailed),
            "job_canceled" => Ok(JobEventKind::JobCanceled),
            "job_canceled_while_running" => Ok(JobEventKind::JobCanceledWhileRunning),
            other => Err(UnknownValue::new("event_type", other)),
        }
    }
}

/// One immutable entry in a job's audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEvent {
    pub id: i64,
    pub job_id: i64,
    pub timestamp: DateTime<Utc>,
    pub kind: JobEventKind,
    pub payload_json: Option<String>,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
