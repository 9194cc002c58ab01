// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::profile::ProfileStore;
use legate_adapters::{FakeNotifier, NotifyCall};
use legate_core::RiskLevel;
use std::time::Duration;
use tempfile::TempDir;

struct Fixture {
    dispatcher: Arc<Dispatcher<FakeNotifier>>,
    store: Arc<Store>,
    sessions: Arc<SessionRegistry>,
    notifier: FakeNotifier,
    _dir: TempDir,
}

fn fixture_with(tweak: impl FnOnce(&mut Settings)) -> Fixture {
    let dir = TempDir::new().unwrap();
    let work = dir.path().join("work");
    let runs = dir.path().join("runs");
    std::fs::create_dir_all(&work).unwrap();
    std::fs::create_dir_all(&runs).unwrap();
    let mut settings = Settings::new(
        dir.path().join("state.sqlite3"),
        runs.canonicalize().unwrap(),
        work.canonicalize().unwrap(),
    );
    settings.worker_poll_interval = Duration::from_millis(10);
    settings.agent_ephemeral_cmd_template = "echo ran".to_string();
    tweak(&mut settings);
    let settings = Arc::new(settings);

    let store = Arc::new(Store::open_in_memory().unwrap());
    let profile = Arc::new(ProfileStore::new(settings.clone()));
    let executor = Arc::new(AgentExecutor::new(settings.clone(), profile.clone()));
    let collector = Arc::new(ArtifactCollector::new(store.clone(), settings.clone()));
    let sessions = Arc::new(SessionRegistry::new(store.clone(), settings.clone()));
    let notifier = FakeNotifier::new();
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        executor,
        collector,
        sessions.clone(),
        notifier.clone(),
        settings,
    ));
    Fixture {
        dispatcher,
        store,
        sessions,
        notifier,
        _dir: dir,
    }
}

fn queued_job(store: &Store, prompt: &str) -> Job {
    store
        .create_job(
            prompt,
            JobMode::Ephemeral,
            None,
            RiskLevel::Low,
            false,
            JobStatus::Queued,
        )
        .unwrap()
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 5s");
}

fn event_kinds(store: &Store, job_id: i64) -> Vec<JobEventKind> {
    let mut kinds: Vec<JobEventKind> = store
        .list_events(job_id, 100)
        .unwrap()
        .into_iter()
        .map(|event| event.kind)
        .collect();
    kinds.reverse(); // list is most-recent-first
    kinds
}

#[tokio::test]
async fn runs_a_queued_job_to_success() {
    let f = fixture_with(|_| {});
    let job = queued_job(&f.store, "say hi");
    f.dispatcher.start();

    wait_until(|| f.store.get_job(job.id).unwrap().is_terminal()).await;
    f.dispatcher.stop().await;

    let finished = f.store.get_job(job.id).unwrap();
    assert_eq!(finished.status, JobStatus::Succeeded);
    assert_eq!(finished.exit_code, Some(0));
    assert_eq!(finished.summary_text.as_deref(), Some("ran"));
    assert!(finished.started_at.unwrap() <= finished.finished_at.unwrap());

    assert_eq!(
        event_kinds(&f.store, job.id),
        vec![JobEventKind::JobStarted, JobEventKind::JobSucceeded]
    );
    assert_eq!(f.notifier.status_headings(), vec!["Job completed".to_string()]);
}

#[tokio::test]
async fn failed_jobs_record_exit_code_and_error() {
    let f = fixture_with(|s| {
        s.agent_ephemeral_cmd_template = "echo broke >&2; exit 9".to_string();
    });
    let job = queued_job(&f.store, "explode");
    f.dispatcher.start();

    wait_until(|| f.store.get_job(job.id).unwrap().is_terminal()).await;
    f.dispatcher.stop().await;

    let finished = f.store.get_job(job.id).unwrap();
    assert_eq!(finished.status, JobStatus::Failed);
    assert_eq!(finished.exit_code, Some(9));
    assert_eq!(finished.error_text.as_deref(), Some("broke"));
    assert_eq!(f.notifier.status_headings(), vec!["Job failed".to_string()]);
}

#[tokio::test]
async fn session_job_fails_fast_when_session_inactive() {
    let f = fixture_with(|_| {});
    let job = f
        .store
        .create_job(
            "hello",
            JobMode::Session,
            Some("missing"),
            RiskLevel::Low,
            false,
            JobStatus::Queued,
        )
        .unwrap();
    f.dispatcher.start();

    wait_until(|| f.store.get_job(job.id).unwrap().is_terminal()).await;
    f.dispatcher.stop().await;

    let finished = f.store.get_job(job.id).unwrap();
    assert_eq!(finished.status, JobStatus::Failed);
    assert_eq!(finished.exit_code, Some(2));
    assert!(finished.error_text.unwrap().contains("'missing' is inactive"));
    assert_eq!(event_kinds(&f.store, job.id), vec![JobEventKind::JobFailed]);
}

#[tokio::test]
async fn session_job_runs_when_session_active() {
    let f = fixture_with(|s| {
        s.agent_session_cmd_template = "echo in-session".to_string();
    });
    f.sessions.create("demo").await.unwrap();
    let job = f
        .store
        .create_job(
            "hello",
            JobMode::Session,
            Some("demo"),
            RiskLevel::Low,
            false,
            JobStatus::Queued,
        )
        .unwrap();
    f.dispatcher.start();

    wait_until(|| f.store.get_job(job.id).unwrap().is_terminal()).await;
    f.dispatcher.stop().await;

    let finished = f.store.get_job(job.id).unwrap();
    assert_eq!(finished.status, JobStatus::Succeeded);
    assert_eq!(finished.summary_text.as_deref(), Some("in-session"));
}

#[tokio::test]
async fn parallelism_stays_within_the_bound() {
    let f = fixture_with(|s| {
        s.agent_ephemeral_cmd_template = "sleep 0.3".to_string();
        s.max_parallel_jobs = 1;
    });
    let first = queued_job(&f.store, "a");
    let second = queued_job(&f.store, "b");
    f.dispatcher.start();

    loop {
        assert!(f.dispatcher.running_count() <= 1);
        let counts = f.store.count_jobs_by_status().unwrap();
        assert!(counts.get(&JobStatus::Running).copied().unwrap_or(0) <= 1);
        let first_done = f.store.get_job(first.id).unwrap().is_terminal();
        let second_done = f.store.get_job(second.id).unwrap().is_terminal();
        if first_done && second_done {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    f.dispatcher.stop().await;

    // FIFO: the lower id started (and therefore finished) first.
    let first = f.store.get_job(first.id).unwrap();
    let second = f.store.get_job(second.id).unwrap();
    assert!(first.started_at.unwrap() <= second.started_at.unwrap());
}

#[tokio::test]
async fn cancel_kills_the_running_job() {
    let f = fixture_with(|s| {
        s.agent_ephemeral_cmd_template = "sleep 30".to_string();
    });
    let job = queued_job(&f.store, "long task");
    f.dispatcher.start();

    wait_until(|| f.store.get_job(job.id).unwrap().status == JobStatus::Running).await;
    assert!(f.dispatcher.cancel(job.id));

    wait_until(|| f.store.get_job(job.id).unwrap().is_terminal()).await;
    f.dispatcher.stop().await;

    let finished = f.store.get_job(job.id).unwrap();
    assert_eq!(finished.status, JobStatus::Canceled);
    assert_eq!(finished.exit_code, Some(130));
    assert_eq!(finished.summary_text.as_deref(), Some("Job canceled while running"));

    let canceled_events = event_kinds(&f.store, job.id)
        .into_iter()
        .filter(|kind| *kind == JobEventKind::JobCanceledWhileRunning)
        .count();
    assert_eq!(canceled_events, 1);
    assert_eq!(f.notifier.status_headings(), vec!["Job canceled".to_string()]);
}

#[tokio::test]
async fn cancel_returns_false_without_a_worker() {
    let f = fixture_with(|_| {});
    assert!(!f.dispatcher.cancel(42));
}

#[tokio::test]
async fn stop_cancels_running_workers_and_halts_reservation() {
    let f = fixture_with(|s| {
        s.agent_ephemeral_cmd_template = "sleep 30".to_string();
    });
    let job = queued_job(&f.store, "long task");
    f.dispatcher.start();
    wait_until(|| f.store.get_job(job.id).unwrap().status == JobStatus::Running).await;

    f.dispatcher.stop().await;
    let finished = f.store.get_job(job.id).unwrap();
    assert_eq!(finished.status, JobStatus::Canceled);
    assert_eq!(finished.exit_code, Some(130));

    // The loop is gone: new work stays queued.
    let queued = queued_job(&f.store, "later");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(f.store.get_job(queued.id).unwrap().status, JobStatus::Queued);
}

#[tokio::test]
async fn artifacts_are_collected_and_delivered() {
    let f = fixture_with(|s| {
        s.agent_ephemeral_cmd_template = "printf 'png' > img.png; echo wrote img.png".to_string();
    });
    let job = queued_job(&f.store, "draw");
    f.dispatcher.start();

    wait_until(|| f.store.get_job(job.id).unwrap().is_terminal()).await;
    f.dispatcher.stop().await;

    // Run-dir scan picks up prompt.txt and stdout.log; the text scan
    // resolves `img.png` against the exec cwd. Exactly one image record.
    let artifacts = f.store.list_artifacts(job.id).unwrap();
    let images: Vec<_> = artifacts
        .iter()
        .filter(|a| a.kind == legate_core::ArtifactKind::Image)
        .collect();
    assert_eq!(images.len(), 1, "{artifacts:?}");
    assert!(images[0].path.ends_with("img.png"));

    let delivered = f
        .notifier
        .calls()
        .into_iter()
        .any(|call| matches!(call, NotifyCall::Artifacts(a) if !a.is_empty()));
    assert!(delivered);
}
