// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named long-lived session lifecycle.
//!
//! A session is `active` from `create` until `stop`. When a boot command
//! template is configured, `create` spawns it detached in its own process
//! group and records the pid; `stop` terminates the tracked child with a
//! configurable grace period before killing it, or falls back to signalling
//! the recorded pid.

use legate_core::{Settings, SessionRecord, SessionStatus};
use legate_storage::{StorageError, Store};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::{Child, Command};

/// Errors from session lifecycle operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("failed to spawn session boot command: {0}")]
    BootFailed(std::io::Error),
}

/// Result of a `create` call.
#[derive(Debug)]
pub struct SessionCreateResult {
    pub record: SessionRecord,
    /// False when the name was already active.
    pub created: bool,
}

/// Registry of named sessions backed by the store.
pub struct SessionRegistry {
    store: Arc<Store>,
    settings: Arc<Settings>,
    children: Mutex<HashMap<String, Child>>,
}

impl SessionRegistry {
    pub fn new(store: Arc<Store>, settings: Arc<Settings>) -> Self {
        Self {
            store,
            settings,
            children: Mutex::new(HashMap::new()),
        }
    }

    /// Activate a session, booting its process if a template is configured.
    ///
    /// Creating a name that is already active returns the existing record
    /// with `created = false` and spawns nothing.
    pub async fn create(&self, name: &str) -> Result<SessionCreateResult, SessionError> {
        match self.store.get_session(name) {
            Ok(existing) if existing.is_active() => {
                return Ok(SessionCreateResult {
                    record: existing,
                    created: false,
                })
            }
            Ok(_) | Err(StorageError::SessionNotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }

        let mut pid = None;
        let mut metadata = None;
        if let Some(template) = &self.settings.agent_session_boot_cmd_template {
            let command = render_boot_command(template, name);
            let child = spawn_detached(&command).map_err(SessionError::BootFailed)?;
            pid = child.id().map(|id| id as i32);
            tracing::info!(session = name, pid, %command, "session boot process spawned");
            metadata = Some(format!("boot_command={command}"));
            self.children.lock().insert(name.to_string(), child);
        }

        let record =
            self.store
                .upsert_session(name, SessionStatus::Active, pid, metadata.as_deref())?;
        Ok(SessionCreateResult {
            record,
            created: true,
        })
    }

    /// Deactivate a session, terminating its boot process if one is known.
    ///
    /// A tracked child gets SIGTERM, the configured grace period, then
    /// SIGKILL. Without a tracked child the recorded pid is signalled
    /// directly; a pid that no longer exists is not an error.
    pub async fn stop(&self, name: &str) -> Result<SessionRecord, SessionError> {
        let record = self.store.get_session(name)?;

        let child = self.children.lock().remove(name);
        if let Some(mut child) = child {
            if child.try_wait().ok().flatten().is_none() {
                if let Some(id) = child.id() {
                    terminate_pid(id as i32);
                }
                let grace = self.settings.session_stop_timeout;
                let waited = tokio::time::timeout(grace, child.wait()).await;
                if waited.is_err() {
                    tracing::warn!(session = name, "boot process ignored SIGTERM, killing");
                    let _ = child.kill().await;
                }
            }
        } else if let Some(pid) = record.pid {
            terminate_pid(pid);
        }

        Ok(self.store.upsert_session(
            name,
            SessionStatus::Inactive,
            None,
            record.metadata_json.as_deref(),
        )?)
    }

    /// Whether the named session exists and is active.
    pub fn is_active(&self, name: &str) -> bool {
        self.store
            .get_session(name)
            .map(|record| record.is_active())
            .unwrap_or(false)
    }

    pub fn list(&self) -> Result<Vec<SessionRecord>, SessionError> {
        Ok(self.store.list_sessions()?)
    }
}

fn render_boot_command(template: &str, session_name: &str) -> String {
    template
        .replace("{session_name_quoted}", &shell_words::join([session_name]))
        .replace("{session_name}", session_name)
}

fn spawn_detached(command: &str) -> std::io::Result<Child> {
    Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()
}

/// SIGTERM a pid, ignoring processes that are already gone.
fn terminate_pid(pid: i32) {
    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(err) => tracing::warn!(pid, error = %err, "failed to signal session process"),
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
