// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! legate-storage: durable state for the control plane.
//!
//! A single SQLite database (WAL mode, foreign keys on) holds jobs, their
//! audit events, collected artifacts, session records, per-chat session
//! pointers, and pending approval UI tokens. All access goes through
//! [`Store`], whose methods serialize on an internal connection lock —
//! readers see consistent snapshots and `reserve_next_runnable_job` is the
//! single atomic entry into the `running` status.

pub mod approval;
mod schema;
mod store;

pub use approval::{
    ApprovalChecklist, ApprovalPoll, APPROVAL_POLL_OPTIONS, APPROVAL_TASK_APPROVE,
    APPROVAL_TASK_REJECT, APPROVAL_TASK_REVISE,
};
pub use store::{JobUpdate, Store, StorageError};
