//! The risk gate: gated submission, approval, rejection.

use crate::prelude::*;
use legate_adapters::NotifyCall;
use legate_core::{JobEventKind, JobMode, JobStatus, RiskLevel};

#[tokio::test]
async fn high_risk_prompt_waits_for_approval_then_runs() {
    let h = harness(|_| {});
    let job = h
        .orchestrator
        .submit("rm -rf /tmp/x", JobMode::Ephemeral, None)
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::AwaitingApproval);
    assert_eq!(job.risk_level, RiskLevel::High);
    assert!(job.needs_approval);
    assert_eq!(
        event_kinds(&h, job.id),
        vec![JobEventKind::JobSubmitted, JobEventKind::ApprovalRequired]
    );
    assert!(matches!(
        &h.notifier.calls()[0],
        NotifyCall::ApprovalRequest { job_id, .. } if *job_id == job.id
    ));

    // The dispatcher must not pick the job up while it is gated.
    h.orchestrator.start();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(
        h.store.get_job(job.id).unwrap().status,
        JobStatus::AwaitingApproval
    );

    let approved = h.orchestrator.approve(job.id, 1).await.unwrap();
    assert_eq!(approved.status, JobStatus::Queued);
    assert_eq!(approved.approved_by, Some(1));

    let finished = wait_terminal(&h, job.id).await;
    h.orchestrator.stop().await;
    assert_eq!(finished.status, JobStatus::Succeeded);
    assert_eq!(
        event_kinds(&h, job.id),
        vec![
            JobEventKind::JobSubmitted,
            JobEventKind::ApprovalRequired,
            JobEventKind::JobApproved,
            JobEventKind::JobStarted,
            JobEventKind::JobSucceeded,
        ]
    );
}

#[tokio::test]
async fn second_approval_is_a_noop() {
    let h = harness(|_| {});
    let job = h
        .orchestrator
        .submit("docker run cleanup", JobMode::Ephemeral, None)
        .await
        .unwrap();

    h.orchestrator.approve(job.id, 1).await.unwrap();
    let again = h.orchestrator.approve(job.id, 99).await.unwrap();
    assert_eq!(again.approved_by, Some(1));

    let approvals = event_kinds(&h, job.id)
        .into_iter()
        .filter(|kind| *kind == JobEventKind::JobApproved)
        .count();
    assert_eq!(approvals, 1);
}

#[tokio::test]
async fn rejected_job_never_runs() {
    let h = harness(|_| {});
    let job = h
        .orchestrator
        .submit("git push --force", JobMode::Ephemeral, None)
        .await
        .unwrap();

    let rejected = h.orchestrator.reject(job.id, 1).await.unwrap();
    assert_eq!(rejected.status, JobStatus::Rejected);
    assert_eq!(rejected.approved_by, Some(1));
    assert!(rejected.finished_at.is_some());

    h.orchestrator.start();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    h.orchestrator.stop().await;
    assert_eq!(h.store.get_job(job.id).unwrap().status, JobStatus::Rejected);
    assert!(h
        .notifier
        .status_headings()
        .contains(&"Job rejected".to_string()));
}

#[tokio::test]
async fn medium_risk_is_gated_too() {
    let h = harness(|_| {});
    let job = h
        .orchestrator
        .submit("pip install requests", JobMode::Ephemeral, None)
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::AwaitingApproval);
    assert_eq!(job.risk_level, RiskLevel::Medium);
}
