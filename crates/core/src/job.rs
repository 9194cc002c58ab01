// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record and state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error for parsing an on-disk enum string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {field} value: {value}")]
pub struct UnknownValue {
    pub field: &'static str,
    pub value: String,
}

impl UnknownValue {
    pub fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }
}

/// Lifecycle status of a job.
///
/// The only legal transitions are:
///
/// ```text
/// queued ──reserve──▶ running ──success──▶ succeeded
///                            ──failure──▶ failed
///                            ──cancel───▶ canceled
/// awaiting_approval ──approve──▶ queued
///                   ──reject───▶ rejected
///                   ──cancel───▶ canceled
/// queued ──cancel──▶ canceled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    AwaitingApproval,
    Succeeded,
    Failed,
    Canceled,
    Rejected,
}

impl JobStatus {
    /// On-disk string form.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::AwaitingApproval => "awaiting_approval",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
            JobStatus::Rejected => "rejected",
        }
    }

    /// True for states no further transition may leave.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Canceled | JobStatus::Rejected
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "awaiting_approval" => Ok(JobStatus::AwaitingApproval),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            "canceled" => Ok(JobStatus::Canceled),
            "rejected" => Ok(JobStatus::Rejected),
            other => Err(UnknownValue::new("status", other)),
        }
    }
}

/// Whether a job is a one-shot agent invocation or targets a named session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    Ephemeral,
    Session,
}

impl JobMode {
    pub fn as_str(self) -> &'static str {
        match self {
            JobMode::Ephemeral => "ephemeral",
            JobMode::Session => "session",
        }
    }
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobMode {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ephemeral" => Ok(JobMode::Ephemeral),
            "session" => Ok(JobMode::Session),
            other => Err(UnknownValue::new("mode", other)),
        }
    }
}

/// Risk level assigned to a prompt by the [`crate::risk::RiskPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(UnknownValue::new("risk_level", other)),
        }
    }
}

/// A job as persisted by the store.
///
/// `id` is assigned monotonically at creation. `finished_at` is set exactly
/// when the job enters a terminal status, and `approved_by` records the owner
/// that released (or rejected) a gated job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub status: JobStatus,
    pub mode: JobMode,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub session_name: Option<String>,
    pub risk_level: RiskLevel,
    pub needs_approval: bool,
    pub approved_by: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub summary_text: Option<String>,
    pub error_text: Option<String>,
}

impl Job {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// True when the risk gate no longer blocks execution.
    pub fn is_released(&self) -> bool {
        !self.needs_approval || self.approved_by.is_some()
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
