// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine runtime

use crate::executor::ExecuteError;
use crate::profile::ProfileError;
use crate::sessions::SessionError;
use legate_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the orchestrator and dispatcher.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("execute error: {0}")]
    Execute(#[from] ExecuteError),
}
