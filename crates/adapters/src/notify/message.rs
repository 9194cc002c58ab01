// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared message formatting for notifier implementations.
//!
//! Pure functions so any front end (and the tests) renders job outcomes the
//! same way.

use legate_core::{Artifact, Job, JobStatus, ResponseMode};

/// Cap for the first error line quoted in a failure message.
const ERROR_LINE_CAP: usize = 800;

/// Render a job-status message under a short heading.
pub fn job_status(job: &Job, heading: &str, mode: ResponseMode) -> String {
    match job.status {
        JobStatus::Succeeded => {
            let natural = job.summary_text.as_deref().unwrap_or("").trim();
            match mode {
                ResponseMode::Verbose => {
                    if natural.is_empty() {
                        format!("{heading}\njob={}", job.id)
                    } else {
                        format!("{heading}\njob={}\nstatus={}\n\n{natural}", job.id, job.status)
                    }
                }
                ResponseMode::Compact => {
                    let base = if natural.is_empty() { "Completed." } else { natural };
                    format!("{base}\n\n(job {})", job.id)
                }
                ResponseMode::Natural => {
                    if natural.is_empty() {
                        format!("Job {} completed.", job.id)
                    } else {
                        natural.to_string()
                    }
                }
            }
        }
        JobStatus::Failed => {
            let detail = job
                .error_text
                .as_deref()
                .or(job.summary_text.as_deref())
                .unwrap_or("")
                .trim();
            match detail.lines().next().filter(|line| !line.is_empty()) {
                Some(line) => {
                    let line: String = line.chars().take(ERROR_LINE_CAP).collect();
                    format!(
                        "Job {} failed: {line}\nFetch the job details for diagnostics.",
                        job.id
                    )
                }
                None => format!(
                    "Job {} failed. Fetch the job details for diagnostics.",
                    job.id
                ),
            }
        }
        JobStatus::Rejected => format!("Job {} was rejected.", job.id),
        JobStatus::Canceled => format!("Job {} was canceled.", job.id),
        _ => format!("{heading}\njob={}\nstatus={}", job.id, job.status),
    }
}

/// Render an approval request for a gated job.
pub fn approval_request(job: &Job, reason: &str) -> String {
    format!(
        "Job {} requires approval.\nreason={reason}\nApprove or reject it to continue.",
        job.id
    )
}

/// Render the caption attached to a delivered artifact.
pub fn artifact_caption(artifact: &Artifact) -> String {
    let name = artifact
        .path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    format!(
        "job={} kind={} file={name}",
        artifact.job_id, artifact.kind
    )
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
