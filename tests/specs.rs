//! Behavioral specifications for the Legate control plane.
//!
//! These tests drive the orchestrator the way a chat front end would —
//! submit, approve, cancel — with a stub shell command standing in for the
//! agent CLI, and verify store state, audit events, and notifier egress.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/queue.rs"]
mod queue;

#[path = "specs/approval.rs"]
mod approval;

#[path = "specs/sessions.rs"]
mod sessions;

#[path = "specs/cancel.rs"]
mod cancel;

#[path = "specs/artifacts.rs"]
mod artifacts;
