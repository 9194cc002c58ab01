//! Shared harness for the behavioral specs.

use legate_adapters::FakeNotifier;
use legate_core::{Job, JobEventKind, Settings};
use legate_engine::Orchestrator;
use legate_storage::Store;
use std::sync::{Arc, Once};
use std::time::Duration;
use tempfile::TempDir;

static LOGGING: Once = Once::new();

fn init_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

pub struct Harness {
    pub orchestrator: Orchestrator<FakeNotifier>,
    pub notifier: FakeNotifier,
    pub store: Arc<Store>,
    pub settings: Arc<Settings>,
    pub dir: TempDir,
}

/// Build a harness over an on-disk store in a fresh tempdir.
///
/// Defaults: owner id 1, one worker, 10ms poll, ephemeral template `echo ok`.
pub fn harness(tweak: impl FnOnce(&mut Settings)) -> Harness {
    init_logging();
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
    settings.owner_user_id = 1;
    settings.worker_poll_interval = Duration::from_millis(10);
    settings.agent_ephemeral_cmd_template = "echo ok".to_string();
    settings.agent_session_cmd_template = "echo ok from {session_name_quoted}".to_string();
    tweak(&mut settings);
    let settings = Arc::new(settings);

    let store = Arc::new(Store::open(&settings.db_path).unwrap());
    let notifier = FakeNotifier::new();
    let orchestrator =
        Orchestrator::new(settings.clone(), store.clone(), notifier.clone()).unwrap();
    Harness {
        orchestrator,
        notifier,
        store,
        settings,
        dir,
    }
}

/// Poll until `cond` holds, failing the test after ~5s.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 5s");
}

/// Wait for a job to reach a terminal status and return it.
pub async fn wait_terminal(harness: &Harness, job_id: i64) -> Job {
    wait_until(|| harness.store.get_job(job_id).unwrap().is_terminal()).await;
    harness.store.get_job(job_id).unwrap()
}

/// Audit log kinds for a job, oldest first.
pub fn event_kinds(harness: &Harness, job_id: i64) -> Vec<JobEventKind> {
    let mut kinds: Vec<JobEventKind> = harness
        .store
        .list_events(job_id, 100)
        .unwrap()
        .into_iter()
        .map(|event| event.kind)
        .collect();
    kinds.reverse();
    kinds
}
