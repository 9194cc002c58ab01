//! Low-risk submission, FIFO reservation, and store invariants.

use crate::prelude::*;
use legate_core::{JobEventKind, JobMode, JobStatus, RiskLevel};

#[tokio::test]
async fn low_risk_prompt_runs_to_success() {
    let h = harness(|s| {
        s.agent_ephemeral_cmd_template =
            "printf 'Assistant response: %s' {prompt_quoted} > {output_last_message_path_quoted}"
                .to_string();
    });
    let job = h
        .orchestrator
        .submit("summarize this file", JobMode::Ephemeral, None)
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.risk_level, RiskLevel::Low);
    assert!(!job.needs_approval);

    h.orchestrator.start();
    let finished = wait_terminal(&h, job.id).await;
    h.orchestrator.stop().await;

    assert_eq!(finished.status, JobStatus::Succeeded);
    assert_eq!(finished.exit_code, Some(0));
    assert_eq!(
        finished.summary_text.as_deref(),
        Some("Assistant response: summarize this file")
    );

    let run_dir = h.settings.run_dir(job.id);
    assert!(run_dir.join("stdout.log").is_file());
    assert!(run_dir.join("stderr.log").is_file());
    assert_eq!(
        std::fs::read_to_string(run_dir.join("prompt.txt")).unwrap(),
        "summarize this file"
    );

    assert_eq!(
        event_kinds(&h, job.id),
        vec![
            JobEventKind::JobSubmitted,
            JobEventKind::JobStarted,
            JobEventKind::JobSucceeded,
        ]
    );
}

#[tokio::test]
async fn reservation_is_fifo_and_at_most_once() {
    let h = harness(|_| {});
    let first = h
        .orchestrator
        .submit("first", JobMode::Ephemeral, None)
        .await
        .unwrap();
    let second = h
        .orchestrator
        .submit("second", JobMode::Ephemeral, None)
        .await
        .unwrap();

    let reserved = h.store.reserve_next_runnable_job().unwrap().unwrap();
    assert_eq!(reserved.id, first.id);
    assert_eq!(reserved.status, JobStatus::Running);

    let next = h.store.reserve_next_runnable_job().unwrap().unwrap();
    assert_eq!(next.id, second.id);
    assert!(h.store.reserve_next_runnable_job().unwrap().is_none());
}

#[tokio::test]
async fn concurrent_reservation_hands_out_a_job_exactly_once() {
    let h = harness(|_| {});
    let job = h
        .orchestrator
        .submit("solo", JobMode::Ephemeral, None)
        .await
        .unwrap();

    let store = h.store.clone();
    let outcomes = std::thread::scope(|scope| {
        let a = scope.spawn(|| store.reserve_next_runnable_job().unwrap());
        let b = scope.spawn(|| store.reserve_next_runnable_job().unwrap());
        [a.join().unwrap(), b.join().unwrap()]
    });

    let winners = outcomes.iter().flatten().count();
    assert_eq!(winners, 1);
    assert_eq!(
        outcomes.iter().flatten().next().unwrap().id,
        job.id
    );
    assert_eq!(h.store.get_job(job.id).unwrap().status, JobStatus::Running);
}

#[tokio::test]
async fn terminal_state_always_pairs_with_finished_at() {
    let h = harness(|s| {
        s.agent_ephemeral_cmd_template = "exit 5".to_string();
    });
    let ok = h
        .orchestrator
        .submit("will fail", JobMode::Ephemeral, None)
        .await
        .unwrap();
    let gated = h
        .orchestrator
        .submit("sudo things", JobMode::Ephemeral, None)
        .await
        .unwrap();
    h.orchestrator.reject(gated.id, 1).await.unwrap();

    h.orchestrator.start();
    wait_terminal(&h, ok.id).await;
    h.orchestrator.stop().await;

    for job in h.store.list_jobs(10).unwrap() {
        assert_eq!(job.is_terminal(), job.finished_at.is_some(), "job {}", job.id);
        if let (Some(started), Some(finished)) = (job.started_at, job.finished_at) {
            assert!(started <= finished, "job {}", job.id);
        }
    }
}
