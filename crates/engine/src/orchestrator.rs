// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The orchestrator: the ingress surface the chat front end drives.
//!
//! Submission classifies the prompt through the risk gate, persists the job,
//! and (for gated jobs) raises an approval request. Approve, reject, and
//! cancel apply guarded transitions — repeated calls are no-ops and emit
//! nothing twice. Everything else is read-through or delegation to the
//! profile store, session registry, and dispatcher.

use crate::artifacts::ArtifactCollector;
use crate::dispatcher::Dispatcher;
use crate::error::EngineError;
use crate::executor::AgentExecutor;
use crate::profile::{ProfileError, ProfileStore, RuntimeProfile};
use crate::recap::RecapService;
use crate::sessions::{SessionCreateResult, SessionError, SessionRegistry};
use legate_adapters::Notifier;
use legate_core::{
    Artifact, Job, JobEvent, JobEventKind, JobMode, JobStatus, RiskPolicy, SessionRecord, Settings,
};
use legate_storage::Store;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Submit / approve / reject / cancel / inspect surface over the job queue.
pub struct Orchestrator<N: Notifier> {
    store: Arc<Store>,
    policy: RiskPolicy,
    profile: Arc<ProfileStore>,
    sessions: Arc<SessionRegistry>,
    dispatcher: Arc<Dispatcher<N>>,
    recap: RecapService,
    notifier: N,
    settings: Arc<Settings>,
}

impl<N: Notifier> Orchestrator<N> {
    /// Wire the engine around a store and a notifier.
    pub fn new(
        settings: Arc<Settings>,
        store: Arc<Store>,
        notifier: N,
    ) -> Result<Self, EngineError> {
        store.ensure_owner(settings.owner_user_id)?;
        let profile = Arc::new(ProfileStore::new(settings.clone()));
        let executor = Arc::new(AgentExecutor::new(settings.clone(), profile.clone()));
        let collector = Arc::new(ArtifactCollector::new(store.clone(), settings.clone()));
        let sessions = Arc::new(SessionRegistry::new(store.clone(), settings.clone()));
        let recap = RecapService::new(store.clone(), collector.clone(), settings.clone());
        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            executor,
            collector,
            sessions.clone(),
            notifier.clone(),
            settings.clone(),
        ));
        Ok(Self {
            store,
            policy: RiskPolicy::new(),
            profile,
            sessions,
            dispatcher,
            recap,
            notifier,
            settings,
        })
    }

    /// Start dispatching queued jobs.
    pub fn start(&self) {
        self.dispatcher.start();
    }

    /// Stop the dispatcher and cancel running workers.
    pub async fn stop(&self) {
        self.dispatcher.stop().await;
    }

    // ── job lifecycle ───────────────────────────────────────────────────

    /// Classify and enqueue a prompt.
    ///
    /// Low-risk jobs land in `queued`; medium/high-risk jobs land in
    /// `awaiting_approval` with an approval request pushed to the owner.
    pub async fn submit(
        &self,
        prompt: &str,
        mode: JobMode,
        session_name: Option<&str>,
    ) -> Result<Job, EngineError> {
        let decision = self.policy.classify(prompt);
        let initial_status = if decision.needs_approval {
            JobStatus::AwaitingApproval
        } else {
            JobStatus::Queued
        };
        let job = self.store.create_job(
            prompt,
            mode,
            session_name,
            decision.level,
            decision.needs_approval,
            initial_status,
        )?;
        self.store.append_event(
            job.id,
            JobEventKind::JobSubmitted,
            Some(&json!({
                "mode": mode.as_str(),
                "session_name": session_name,
                "risk_level": decision.level.as_str(),
                "needs_approval": decision.needs_approval,
                "reason": decision.reason,
            })),
        )?;
        tracing::info!(
            job_id = job.id,
            risk = %decision.level,
            needs_approval = decision.needs_approval,
            "job submitted"
        );

        if decision.needs_approval {
            self.store.append_event(
                job.id,
                JobEventKind::ApprovalRequired,
                Some(&json!({"reason": decision.reason})),
            )?;
            if let Err(err) = self
                .notifier
                .send_approval_request(&job, &decision.reason)
                .await
            {
                tracing::warn!(job_id = job.id, error = %err, "approval request delivery failed");
            }
        }
        Ok(job)
    }

    /// Release a gated job. Only the first approval takes effect.
    pub async fn approve(&self, job_id: i64, user_id: i64) -> Result<Job, EngineError> {
        let (job, changed) = self.store.approve_job(job_id, user_id)?;
        if changed {
            self.store.append_event(
                job_id,
                JobEventKind::JobApproved,
                Some(&json!({"user_id": user_id})),
            )?;
            tracing::info!(job_id, user_id, "job approved");
        }
        Ok(job)
    }

    /// Reject a gated job.
    pub async fn reject(&self, job_id: i64, user_id: i64) -> Result<Job, EngineError> {
        let (job, changed) = self.store.reject_job(job_id, user_id)?;
        if changed {
            self.store.append_event(
                job_id,
                JobEventKind::JobRejected,
                Some(&json!({"user_id": user_id})),
            )?;
            tracing::info!(job_id, user_id, "job rejected");
            if let Err(err) = self.notifier.send_job_status(&job, "Job rejected").await {
                tracing::warn!(job_id, error = %err, "rejection notification failed");
            }
        }
        Ok(job)
    }

    /// Cancel a job in any non-terminal state.
    ///
    /// A running worker is canceled through its token and owns the terminal
    /// bookkeeping; otherwise the store transition happens here. Canceling a
    /// terminal job changes nothing.
    pub async fn cancel(&self, job_id: i64) -> Result<Job, EngineError> {
        let worker_canceled = self.dispatcher.cancel(job_id);
        let (job, changed) = self.store.cancel_job(job_id)?;
        if changed && !worker_canceled {
            self.store
                .append_event(job_id, JobEventKind::JobCanceled, None)?;
            if let Err(err) = self.notifier.send_job_status(&job, "Job canceled").await {
                tracing::warn!(job_id, error = %err, "cancellation notification failed");
            }
        }
        Ok(job)
    }

    // ── inspection ──────────────────────────────────────────────────────

    pub fn get_job(&self, job_id: i64) -> Result<Job, EngineError> {
        Ok(self.store.get_job(job_id)?)
    }

    pub fn list_jobs(&self, limit: usize) -> Result<Vec<Job>, EngineError> {
        Ok(self.store.list_jobs(limit)?)
    }

    pub fn count_jobs_by_status(&self) -> Result<HashMap<JobStatus, u64>, EngineError> {
        Ok(self.store.count_jobs_by_status()?)
    }

    pub fn list_job_artifacts(&self, job_id: i64) -> Result<Vec<Artifact>, EngineError> {
        Ok(self.store.list_artifacts(job_id)?)
    }

    pub fn list_job_events(&self, job_id: i64, limit: usize) -> Result<Vec<JobEvent>, EngineError> {
        Ok(self.store.list_events(job_id, limit)?)
    }

    pub fn running_jobs_count(&self) -> usize {
        self.dispatcher.running_count()
    }

    // ── runtime profile ─────────────────────────────────────────────────

    pub fn runtime_profile(&self) -> RuntimeProfile {
        self.profile.snapshot()
    }

    pub fn set_model(
        &self,
        model: Option<&str>,
        reasoning_effort: Option<&str>,
    ) -> Result<RuntimeProfile, ProfileError> {
        self.profile.set_model(model, reasoning_effort)
    }

    pub fn set_sandbox_mode(&self, mode: Option<&str>) -> Result<RuntimeProfile, ProfileError> {
        self.profile.set_sandbox_mode(mode)
    }

    pub fn set_approval_policy(
        &self,
        policy: Option<&str>,
    ) -> Result<RuntimeProfile, ProfileError> {
        self.profile.set_approval_policy(policy)
    }

    pub fn effective_approval_policy(&self) -> String {
        self.profile.effective_approval_policy()
    }

    pub fn set_search(&self, enabled: bool) -> RuntimeProfile {
        self.profile.set_search(enabled)
    }

    pub fn set_web_search_mode(&self, mode: Option<&str>) -> Result<RuntimeProfile, ProfileError> {
        self.profile.set_web_search_mode(mode)
    }

    pub fn set_personality(
        &self,
        personality: &str,
        custom_instruction: Option<&str>,
    ) -> Result<RuntimeProfile, ProfileError> {
        self.profile.set_personality(personality, custom_instruction)
    }

    pub fn set_experimental(
        &self,
        feature: &str,
        enabled: bool,
    ) -> Result<RuntimeProfile, ProfileError> {
        self.profile.set_experimental_feature(feature, enabled)
    }

    pub fn clear_experimentals(&self) -> RuntimeProfile {
        self.profile.clear_experimental_features()
    }

    pub fn set_workdir(&self, path: Option<&str>) -> Result<RuntimeProfile, ProfileError> {
        self.profile.set_workdir(path)
    }

    pub fn effective_workdir(&self) -> PathBuf {
        self.profile.effective_workdir()
    }

    pub fn allowed_workdirs(&self) -> &[PathBuf] {
        &self.settings.agent_allowed_workdirs
    }

    // ── sessions and chat pointers ──────────────────────────────────────

    pub async fn create_session(&self, name: &str) -> Result<SessionCreateResult, SessionError> {
        self.sessions.create(name).await
    }

    pub async fn stop_session(&self, name: &str) -> Result<SessionRecord, SessionError> {
        self.sessions.stop(name).await
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionRecord>, SessionError> {
        self.sessions.list()
    }

    pub fn get_active_session_for_chat(&self, chat_id: i64) -> Result<Option<String>, EngineError> {
        Ok(self.store.get_active_session_for_chat(chat_id)?)
    }

    pub fn set_active_session_for_chat(
        &self,
        chat_id: i64,
        session_name: Option<&str>,
    ) -> Result<(), EngineError> {
        Ok(self
            .store
            .set_active_session_for_chat(chat_id, session_name)?)
    }

    // ── recap video ─────────────────────────────────────────────────────

    /// Render a short recap clip for a finished job and register it as an
    /// artifact.
    pub async fn generate_recap(&self, job_id: i64) -> Result<Artifact, crate::recap::RecapError> {
        self.recap.generate_for_job(job_id).await
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
