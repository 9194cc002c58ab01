// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! legate-engine: the job orchestration runtime.
//!
//! The [`Orchestrator`] is the ingress surface the chat front end calls.
//! Behind it: the [`ProfileStore`] shapes every agent invocation, the
//! [`AgentExecutor`] runs them, the [`ArtifactCollector`] harvests their
//! output files, the [`SessionRegistry`] tracks long-lived sessions, and the
//! [`Dispatcher`] pulls runnable jobs from the store under a parallelism
//! bound.

pub mod approvals;
pub mod artifacts;
pub mod dispatcher;
mod error;
pub mod executor;
pub mod orchestrator;
pub mod profile;
pub mod recap;
pub mod sessions;

pub use approvals::{ChecklistPersistence, ChecklistStore, PollPersistence, PollStore};
pub use artifacts::ArtifactCollector;
pub use dispatcher::Dispatcher;
pub use error::EngineError;
pub use executor::{
    AgentExecutor, ExecuteError, ExecutionContext, ExecutionPlan, ExecutionResult,
};
pub use orchestrator::Orchestrator;
pub use profile::{
    ApprovalPolicy, Personality, ProfileError, ProfileStore, ReasoningEffort, RuntimeProfile,
    SandboxMode, WebSearchMode,
};
pub use recap::{RecapError, RecapService};
pub use sessions::{SessionCreateResult, SessionError, SessionRegistry};
