//! Session-mode jobs against the session registry.

use crate::prelude::*;
use legate_core::{JobMode, JobStatus};

#[tokio::test]
async fn session_job_fails_when_target_is_inactive() {
    let h = harness(|_| {});
    let job = h
        .orchestrator
        .submit("hello", JobMode::Session, Some("missing"))
        .await
        .unwrap();

    h.orchestrator.start();
    let finished = wait_terminal(&h, job.id).await;
    h.orchestrator.stop().await;

    assert_eq!(finished.status, JobStatus::Failed);
    assert_eq!(finished.exit_code, Some(2));
    assert!(finished.error_text.unwrap().contains("inactive"));
}

#[tokio::test]
async fn session_job_succeeds_against_an_active_session() {
    let h = harness(|_| {});
    let created = h.orchestrator.create_session("demo").await.unwrap();
    assert!(created.created);

    let job = h
        .orchestrator
        .submit("hello", JobMode::Session, Some("demo"))
        .await
        .unwrap();
    h.orchestrator.start();
    let finished = wait_terminal(&h, job.id).await;
    h.orchestrator.stop().await;

    assert_eq!(finished.status, JobStatus::Succeeded);
    assert_eq!(finished.summary_text.as_deref(), Some("ok from demo"));
}

#[tokio::test]
async fn stopped_session_rejects_new_work() {
    let h = harness(|_| {});
    h.orchestrator.create_session("demo").await.unwrap();
    h.orchestrator.stop_session("demo").await.unwrap();

    let job = h
        .orchestrator
        .submit("hello", JobMode::Session, Some("demo"))
        .await
        .unwrap();
    h.orchestrator.start();
    let finished = wait_terminal(&h, job.id).await;
    h.orchestrator.stop().await;

    assert_eq!(finished.status, JobStatus::Failed);
    assert_eq!(finished.exit_code, Some(2));
}

#[tokio::test]
async fn chat_pointer_tracks_the_active_session() {
    let h = harness(|_| {});
    h.orchestrator.create_session("demo").await.unwrap();
    h.orchestrator
        .set_active_session_for_chat(7, Some("demo"))
        .unwrap();
    assert_eq!(
        h.orchestrator.get_active_session_for_chat(7).unwrap(),
        Some("demo".to_string())
    );

    h.orchestrator.set_active_session_for_chat(7, None).unwrap();
    assert_eq!(h.orchestrator.get_active_session_for_chat(7).unwrap(), None);
}
