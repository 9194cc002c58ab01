//! Cancellation: queued, mid-run, and after the fact.

use crate::prelude::*;
use legate_core::{JobEventKind, JobMode, JobStatus};

#[tokio::test]
async fn cancel_mid_run_kills_the_child_and_records_130() {
    let h = harness(|s| {
        s.agent_ephemeral_cmd_template = "sleep 30".to_string();
    });
    let job = h
        .orchestrator
        .submit("long task", JobMode::Ephemeral, None)
        .await
        .unwrap();
    h.orchestrator.start();
    wait_until(|| h.store.get_job(job.id).unwrap().status == JobStatus::Running).await;

    let started = std::time::Instant::now();
    h.orchestrator.cancel(job.id).await.unwrap();
    let finished = wait_terminal(&h, job.id).await;
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
    h.orchestrator.stop().await;

    assert_eq!(finished.status, JobStatus::Canceled);
    assert_eq!(finished.exit_code, Some(130));
    assert_eq!(
        finished.summary_text.as_deref(),
        Some("Job canceled while running")
    );

    let kinds = event_kinds(&h, job.id);
    let canceled_while_running = kinds
        .iter()
        .filter(|kind| **kind == JobEventKind::JobCanceledWhileRunning)
        .count();
    assert_eq!(canceled_while_running, 1);
    // The terminal event closes the log.
    assert_eq!(kinds.last(), Some(&JobEventKind::JobCanceledWhileRunning));
}

#[tokio::test]
async fn cancel_before_dispatch_skips_execution() {
    let h = harness(|_| {});
    let job = h
        .orchestrator
        .submit("never runs", JobMode::Ephemeral, None)
        .await
        .unwrap();
    let canceled = h.orchestrator.cancel(job.id).await.unwrap();
    assert_eq!(canceled.status, JobStatus::Canceled);

    h.orchestrator.start();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    h.orchestrator.stop().await;

    let job = h.store.get_job(job.id).unwrap();
    assert_eq!(job.status, JobStatus::Canceled);
    assert!(job.started_at.is_none());
    assert_eq!(
        event_kinds(&h, job.id),
        vec![JobEventKind::JobSubmitted, JobEventKind::JobCanceled]
    );
}

#[tokio::test]
async fn cancel_is_idempotent_on_terminal_jobs() {
    let h = harness(|_| {});
    let job = h
        .orchestrator
        .submit("quick", JobMode::Ephemeral, None)
        .await
        .unwrap();
    h.orchestrator.start();
    let finished = wait_terminal(&h, job.id).await;
    h.orchestrator.stop().await;
    assert_eq!(finished.status, JobStatus::Succeeded);

    let after_cancel = h.orchestrator.cancel(job.id).await.unwrap();
    assert_eq!(after_cancel.status, JobStatus::Succeeded);
    assert_eq!(after_cancel.summary_text, finished.summary_text);
    assert!(!event_kinds(&h, job.id).contains(&JobEventKind::JobCanceled));
}

#[tokio::test]
async fn cancel_of_gated_job_closes_the_gate() {
    let h = harness(|_| {});
    let job = h
        .orchestrator
        .submit("sudo rm cache", JobMode::Ephemeral, None)
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::AwaitingApproval);

    let canceled = h.orchestrator.cancel(job.id).await.unwrap();
    assert_eq!(canceled.status, JobStatus::Canceled);

    // Approval after cancellation is a no-op.
    let approved = h.orchestrator.approve(job.id, 1).await.unwrap();
    assert_eq!(approved.status, JobStatus::Canceled);
}
