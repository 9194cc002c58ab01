// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The dispatch loop.
//!
//! One task sweeps the store: while fewer than `max_parallel_jobs` workers
//! are running it reserves the next runnable job and spawns a worker for
//! it, then sleeps for the poll interval. Workers own the full per-job
//! lifecycle — session pre-check, execution, artifact collection, terminal
//! status, events, and notifications — and carry a cancellation token the
//! orchestrator can fire.

use crate::artifacts::ArtifactCollector;
use crate::error::EngineError;
use crate::executor::{AgentExecutor, ExecuteError, ExecutionContext};
use crate::sessions::SessionRegistry;
use legate_adapters::Notifier;
use legate_core::{Job, JobEventKind, JobMode, JobStatus, Settings};
use legate_storage::{JobUpdate, Store};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cap on stdout/stderr text handed to the artifact text scan.
const OUTPUT_SCAN_CHARS: usize = 200_000;

struct RunningJob {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// Pulls runnable jobs from the store and runs them under a parallelism
/// bound.
pub struct Dispatcher<N: Notifier> {
    core: Arc<Core<N>>,
    shutdown: CancellationToken,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

/// State shared between the loop task, workers, and the public surface.
struct Core<N: Notifier> {
    store: Arc<Store>,
    executor: Arc<AgentExecutor>,
    collector: Arc<ArtifactCollector>,
    sessions: Arc<SessionRegistry>,
    notifier: N,
    settings: Arc<Settings>,
    running: Mutex<HashMap<i64, RunningJob>>,
}

impl<N: Notifier> Dispatcher<N> {
    pub fn new(
        store: Arc<Store>,
        executor: Arc<AgentExecutor>,
        collector: Arc<ArtifactCollector>,
        sessions: Arc<SessionRegistry>,
        notifier: N,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            core: Arc::new(Core {
                store,
                executor,
                collector,
                sessions,
                notifier,
                settings,
                running: Mutex::new(HashMap::new()),
            }),
            shutdown: CancellationToken::new(),
            loop_handle: Mutex::new(None),
        }
    }

    /// Start the dispatch loop. Idempotent.
    pub fn start(&self) {
        let mut handle = self.loop_handle.lock();
        if handle.is_some() {
            return;
        }
        let core = Arc::clone(&self.core);
        let shutdown = self.shutdown.clone();
        *handle = Some(tokio::spawn(async move {
            loop {
                Core::sweep_once(&core);
                tokio::select! {
                    _ = tokio::time::sleep(core.settings.worker_poll_interval) => {}
                    _ = shutdown.cancelled() => break,
                }
            }
        }));
        tracing::info!(
            max_parallel_jobs = self.core.settings.max_parallel_jobs,
            "dispatcher started"
        );
    }

    /// Stop the loop and cancel every running worker, waiting for each to
    /// record its terminal state.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        let loop_handle = self.loop_handle.lock().take();
        if let Some(handle) = loop_handle {
            let _ = handle.await;
        }

        let workers: Vec<(i64, CancellationToken, Option<JoinHandle<()>>)> = {
            let mut running = self.core.running.lock();
            running
                .drain()
                .map(|(id, job)| (id, job.token, job.handle))
                .collect()
        };
        for (job_id, token, handle) in workers {
            token.cancel();
            if let Some(handle) = handle {
                if handle.await.is_err() {
                    tracing::warn!(job_id, "worker task panicked during shutdown");
                }
            }
        }
        tracing::info!("dispatcher stopped");
    }

    /// Cancel the worker for a job, if one is running.
    pub fn cancel(&self, job_id: i64) -> bool {
        let running = self.core.running.lock();
        match running.get(&job_id) {
            Some(job) => {
                job.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of currently tracked workers.
    pub fn running_count(&self) -> usize {
        self.core.running.lock().len()
    }
}

impl<N: Notifier> Core<N> {
    /// One reservation sweep: fill free worker slots from the queue.
    /// Errors are logged without tearing the loop down.
    fn sweep_once(core: &Arc<Self>) {
        while core.running.lock().len() < core.settings.max_parallel_jobs {
            match core.store.reserve_next_runnable_job() {
                Ok(Some(job)) => Core::spawn_worker(core, job),
                Ok(None) => break,
                Err(err) => {
                    tracing::error!(error = %err, "dispatch sweep failed");
                    break;
                }
            }
        }
    }

    fn spawn_worker(core: &Arc<Self>, job: Job) {
        let job_id = job.id;
        let token = CancellationToken::new();
        core.running.lock().insert(
            job_id,
            RunningJob {
                token: token.clone(),
                handle: None,
            },
        );

        let worker_core = Arc::clone(core);
        let handle = tokio::spawn(async move {
            if let Err(err) = worker_core.run_job(&job, token).await {
                tracing::error!(job_id = job.id, error = %err, "worker failed to record job state");
            }
            worker_core.running.lock().remove(&job.id);
        });

        // The worker may already have finished and removed itself; only
        // attach the handle to a still-tracked entry.
        if let Some(entry) = core.running.lock().get_mut(&job_id) {
            entry.handle = Some(handle);
        }
        tracing::debug!(job_id, "worker spawned");
    }

    async fn run_job(&self, job: &Job, cancel: CancellationToken) -> Result<(), EngineError> {
        let run_dir = self.settings.run_dir(job.id);

        if job.mode == JobMode::Session {
            let name = job.session_name.clone().unwrap_or_default();
            if !self.sessions.is_active(&name) {
                let failed = self.store.set_job_status(
                    job.id,
                    JobStatus::Failed,
                    JobUpdate {
                        summary_text: Some(
                            "Session mode requested but session is inactive".to_string(),
                        ),
                        error_text: Some(format!("Session '{name}' is inactive")),
                        exit_code: Some(2),
                        finished: true,
                        ..JobUpdate::default()
                    },
                )?;
                if failed.status != JobStatus::Failed {
                    return Ok(());
                }
                self.store.append_event(
                    job.id,
                    JobEventKind::JobFailed,
                    Some(&json!({"reason": "inactive_session"})),
                )?;
                self.notify_status(&failed, "Job failed").await;
                return Ok(());
            }
        }

        self.store
            .append_event(job.id, JobEventKind::JobStarted, None)?;

        let ctx = ExecutionContext {
            job: job.clone(),
            run_dir: run_dir.clone(),
            approved: job.is_released(),
        };

        let result = match self.executor.execute(&ctx, &cancel).await {
            Ok(result) => result,
            Err(ExecuteError::Canceled) => {
                let canceled = self.store.set_job_status(
                    job.id,
                    JobStatus::Canceled,
                    JobUpdate {
                        summary_text: Some("Job canceled while running".to_string()),
                        exit_code: Some(130),
                        finished: true,
                        ..JobUpdate::default()
                    },
                )?;
                self.store
                    .append_event(job.id, JobEventKind::JobCanceledWhileRunning, None)?;
                self.notify_status(&canceled, "Job canceled").await;
                return Ok(());
            }
            Err(err) => {
                let failed = self.store.set_job_status(
                    job.id,
                    JobStatus::Failed,
                    JobUpdate {
                        summary_text: Some("Executor raised an unexpected error".to_string()),
                        error_text: Some(err.to_string()),
                        exit_code: Some(1),
                        finished: true,
                        ..JobUpdate::default()
                    },
                )?;
                if failed.status != JobStatus::Failed {
                    return Ok(());
                }
                self.store.append_event(
                    job.id,
                    JobEventKind::JobFailed,
                    Some(&json!({"exception": err.to_string()})),
                )?;
                self.notify_status(&failed, "Job failed").await;
                return Ok(());
            }
        };

        if let Err(err) = self.collector.collect_from_run_dir(job.id, &run_dir) {
            tracing::warn!(job_id = job.id, error = %err, "run-dir artifact scan failed");
        }
        let texts = [
            read_limited(&result.stdout_path),
            read_limited(&result.stderr_path),
            result.summary.clone(),
            result.error_text.clone().unwrap_or_default(),
        ];
        let roots = self.settings.artifact_roots();
        if let Err(err) =
            self.collector
                .collect_from_output_texts(job.id, &texts, &result.exec_cwd, &roots)
        {
            tracing::warn!(job_id = job.id, error = %err, "output-text artifact scan failed");
        }

        let (status, heading, event) = if result.exit_code == 0 {
            (JobStatus::Succeeded, "Job completed", JobEventKind::JobSucceeded)
        } else {
            (JobStatus::Failed, "Job failed", JobEventKind::JobFailed)
        };
        let finished = self.store.set_job_status(
            job.id,
            status,
            JobUpdate {
                summary_text: Some(result.summary.clone()),
                error_text: result.error_text.clone(),
                exit_code: Some(result.exit_code),
                finished: true,
                ..JobUpdate::default()
            },
        )?;
        if finished.status != status {
            // Canceled (or otherwise finalized) while we were finishing up;
            // that path owns the terminal event.
            tracing::debug!(job_id = job.id, "job finalized elsewhere, skipping terminal event");
            return Ok(());
        }
        self.store
            .append_event(job.id, event, Some(&json!({"exit_code": result.exit_code})))?;
        self.notify_status(&finished, heading).await;

        let artifacts = self.store.list_artifacts(job.id)?;
        if !artifacts.is_empty() {
            if let Err(err) = self.notifier.send_artifacts(&artifacts).await {
                tracing::warn!(job_id = job.id, error = %err, "artifact delivery failed");
            }
        }
        Ok(())
    }

    async fn notify_status(&self, job: &Job, heading: &str) {
        if let Err(err) = self.notifier.send_job_status(job, heading).await {
            tracing::warn!(job_id = job.id, error = %err, "status notification failed");
        }
    }
}

/// Bounded read of a log file for the artifact text scan.
fn read_limited(path: &Path) -> String {
    let Ok(bytes) = std::fs::read(path) else {
        return String::new();
    };
    String::from_utf8_lossy(&bytes)
        .chars()
        .take(OUTPUT_SCAN_CHARS)
        .collect()
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
