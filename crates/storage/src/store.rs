// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The store: serialized access to the SQLite database.

use crate::approval::{ApprovalChecklist, ApprovalPoll};
use crate::schema::SCHEMA;
use chrono::{DateTime, Utc};
use legate_core::{
    now_iso, parse_iso, Artifact, ArtifactKind, Job, JobEvent, JobEventKind, JobMode, JobStatus,
    RiskLevel, SessionRecord, SessionStatus, UnknownValue,
};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("job not found: {0}")]
    JobNotFound(i64),
    #[error("artifact not found: {0}")]
    ArtifactNotFound(i64),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("corrupt row: {0}")]
    Corrupt(#[from] UnknownValue),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Optional fields filled alongside a status write.
///
/// Every field uses first-writer-wins semantics (`COALESCE` against the
/// stored value); `finished` stamps `finished_at` and makes the whole write
/// conditional on the job not already being terminal.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub summary_text: Option<String>,
    pub error_text: Option<String>,
    pub exit_code: Option<i32>,
    pub approved_by: Option<i64>,
    pub finished: bool,
}

/// Durable state behind a serialized connection.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    /// In-memory database for tests and ephemeral embedders.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ── users ───────────────────────────────────────────────────────────

    /// Record the owner, idempotently.
    pub fn ensure_owner(&self, user_id: i64) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users(user_id, is_owner, created_at) VALUES(?1, 1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET is_owner = 1",
            params![user_id, now_iso()],
        )?;
        Ok(())
    }

    // ── jobs ────────────────────────────────────────────────────────────

    /// Persist a new job in its initial status and return it.
    pub fn create_job(
        &self,
        prompt: &str,
        mode: JobMode,
        session_name: Option<&str>,
        risk_level: RiskLevel,
        needs_approval: bool,
        status: JobStatus,
    ) -> Result<Job, StorageError> {
        let id = {
            let conn = self.conn.lock();
            let now = now_iso();
            conn.execute(
                "INSERT INTO jobs(created_at, updated_at, status, mode, session_name, prompt,
                                  risk_level, needs_approval)
                 VALUES(?1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    now,
                    status.as_str(),
                    mode.as_str(),
                    session_name,
                    prompt,
                    risk_level.as_str(),
                    needs_approval as i64,
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.get_job(id)
    }

    pub fn get_job(&self, job_id: i64) -> Result<Job, StorageError> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                "SELECT * FROM jobs WHERE id = ?1",
                params![job_id],
                RawJob::from_row,
            )
            .optional()?;
        raw.ok_or(StorageError::JobNotFound(job_id))?.into_job()
    }

    /// Most-recent-first listing.
    pub fn list_jobs(&self, limit: usize) -> Result<Vec<Job>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM jobs ORDER BY id DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit as i64], RawJob::from_row)?;
        rows.map(|raw| raw.map_err(StorageError::from)?.into_job())
            .collect()
    }

    pub fn count_jobs_by_status(&self) -> Result<HashMap<JobStatus, u64>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) AS count FROM jobs GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut counts = HashMap::new();
        for row in rows {
            let (status, count) = row?;
            counts.insert(status.parse::<JobStatus>()?, count as u64);
        }
        Ok(counts)
    }

    /// Atomically reserve the next runnable job.
    ///
    /// In one serialized transaction: pick the lowest-id `queued` job whose
    /// risk gate is released, flip it to `running`, stamp `started_at` if
    /// unset, and return it. This is the only path into `running`; two
    /// concurrent calls can never reserve the same job.
    pub fn reserve_next_runnable_job(&self) -> Result<Option<Job>, StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let candidate: Option<i64> = tx
            .query_row(
                "SELECT id FROM jobs
                 WHERE status = ?1 AND (needs_approval = 0 OR approved_by IS NOT NULL)
                 ORDER BY id ASC
                 LIMIT 1",
                params![JobStatus::Queued.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(job_id) = candidate else {
            return Ok(None);
        };

        let now = now_iso();
        let updated = tx.execute(
            "UPDATE jobs
             SET status = ?1, updated_at = ?2, started_at = COALESCE(started_at, ?2)
             WHERE id = ?3 AND status = ?4",
            params![
                JobStatus::Running.as_str(),
                now,
                job_id,
                JobStatus::Queued.as_str(),
            ],
        )?;
        if updated != 1 {
            return Ok(None);
        }

        let raw = tx.query_row(
            "SELECT * FROM jobs WHERE id = ?1",
            params![job_id],
            RawJob::from_row,
        )?;
        tx.commit()?;
        Ok(Some(raw.into_job()?))
    }

    /// Write a status plus any accompanying result fields.
    ///
    /// Terminal writes (`update.finished`) are write-once: a job whose
    /// `finished_at` is already stamped only accepts a write carrying the
    /// same status (filling in fields the first writer left empty), so a
    /// late worker cannot overwrite a cancellation that beat it.
    pub fn set_job_status(
        &self,
        job_id: i64,
        status: JobStatus,
        update: JobUpdate,
    ) -> Result<Job, StorageError> {
        {
            let conn = self.conn.lock();
            let now = now_iso();
            let finished_at = update.finished.then(|| now.clone());
            let changed = conn.execute(
                "UPDATE jobs
                 SET status = ?1, updated_at = ?2,
                     summary_text = COALESCE(?3, summary_text),
                     error_text = COALESCE(?4, error_text),
                     exit_code = COALESCE(?5, exit_code),
                     approved_by = COALESCE(?6, approved_by),
                     finished_at = COALESCE(finished_at, ?7)
                 WHERE id = ?8 AND (?9 = 0 OR finished_at IS NULL OR status = ?1)",
                params![
                    status.as_str(),
                    now,
                    update.summary_text,
                    update.error_text,
                    update.exit_code,
                    update.approved_by,
                    finished_at,
                    job_id,
                    update.finished as i64,
                ],
            )?;
            if changed == 0 {
                tracing::debug!(job_id, status = %status, "job already terminal, status write skipped");
            }
        }
        self.get_job(job_id)
    }

    /// Transition to `canceled`, only from `queued`, `running`, or
    /// `awaiting_approval`. Returns the job and whether the transition fired.
    pub fn cancel_job(&self, job_id: i64) -> Result<(Job, bool), StorageError> {
        let changed = {
            let conn = self.conn.lock();
            let now = now_iso();
            conn.execute(
                "UPDATE jobs
                 SET status = ?1, updated_at = ?2, finished_at = ?2
                 WHERE id = ?3 AND status IN (?4, ?5, ?6)",
                params![
                    JobStatus::Canceled.as_str(),
                    now,
                    job_id,
                    JobStatus::Queued.as_str(),
                    JobStatus::Running.as_str(),
                    JobStatus::AwaitingApproval.as_str(),
                ],
            )?
        };
        Ok((self.get_job(job_id)?, changed == 1))
    }

    /// Release a gated job back to `queued`, recording the approver.
    /// Only the first approval takes effect.
    pub fn approve_job(&self, job_id: i64, user_id: i64) -> Result<(Job, bool), StorageError> {
        let changed = {
            let conn = self.conn.lock();
            conn.execute(
                "UPDATE jobs
                 SET status = ?1, approved_by = ?2, updated_at = ?3
                 WHERE id = ?4 AND status = ?5",
                params![
                    JobStatus::Queued.as_str(),
                    user_id,
                    now_iso(),
                    job_id,
                    JobStatus::AwaitingApproval.as_str(),
                ],
            )?
        };
        Ok((self.get_job(job_id)?, changed == 1))
    }

    /// Reject a gated job, recording who rejected it.
    pub fn reject_job(&self, job_id: i64, user_id: i64) -> Result<(Job, bool), StorageError> {
        let changed = {
            let conn = self.conn.lock();
            let now = now_iso();
            conn.execute(
                "UPDATE jobs
                 SET status = ?1, approved_by = ?2, updated_at = ?3, finished_at = ?3
                 WHERE id = ?4 AND status = ?5",
                params![
                    JobStatus::Rejected.as_str(),
                    user_id,
                    now,
                    job_id,
                    JobStatus::AwaitingApproval.as_str(),
                ],
            )?
        };
        Ok((self.get_job(job_id)?, changed == 1))
    }

    // ── job events ──────────────────────────────────────────────────────

    pub fn append_event(
        &self,
        job_id: i64,
        kind: JobEventKind,
        payload: Option<&serde_json::Value>,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        let payload_json = payload.map(|p| p.to_string());
        conn.execute(
            "INSERT INTO job_events(job_id, timestamp, event_type, payload_json)
             VALUES(?1, ?2, ?3, ?4)",
            params![job_id, now_iso(), kind.as_str(), payload_json],
        )?;
        Ok(())
    }

    /// Most-recent-first audit log for a job.
    pub fn list_events(&self, job_id: i64, limit: usize) -> Result<Vec<JobEvent>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, job_id, timestamp, event_type, payload_json
             FROM job_events
             WHERE job_id = ?1
             ORDER BY id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![job_id, limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;
        let mut events = Vec::new();
        for row in rows {
            let (id, job_id, timestamp, event_type, payload_json) = row?;
            events.push(JobEvent {
                id,
                job_id,
                timestamp: parse_timestamp(&timestamp)?,
                kind: event_type.parse::<JobEventKind>()?,
                payload_json,
            });
        }
        Ok(events)
    }

    // ── artifacts ───────────────────────────────────────────────────────

    pub fn add_artifact(
        &self,
        job_id: i64,
        kind: ArtifactKind,
        path: &Path,
        size_bytes: u64,
        sha256: &str,
    ) -> Result<Artifact, StorageError> {
        let id = {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO artifacts(job_id, kind, path, size_bytes, sha256)
                 VALUES(?1, ?2, ?3, ?4, ?5)",
                params![
                    job_id,
                    kind.as_str(),
                    path.display().to_string(),
                    size_bytes as i64,
                    sha256,
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.get_artifact(id)
    }

    pub fn get_artifact(&self, artifact_id: i64) -> Result<Artifact, StorageError> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                "SELECT id, job_id, kind, path, size_bytes, sha256 FROM artifacts WHERE id = ?1",
                params![artifact_id],
                RawArtifact::from_row,
            )
            .optional()?;
        raw.ok_or(StorageError::ArtifactNotFound(artifact_id))?
            .into_artifact()
    }

    pub fn list_artifacts(&self, job_id: i64) -> Result<Vec<Artifact>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, job_id, kind, path, size_bytes, sha256
             FROM artifacts WHERE job_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![job_id], RawArtifact::from_row)?;
        rows.map(|raw| raw.map_err(StorageError::from)?.into_artifact())
            .collect()
    }

    // ── sessions ────────────────────────────────────────────────────────

    /// Insert or update a session record. `started_at` is preserved across
    /// upserts; `last_seen_at` always refreshes.
    pub fn upsert_session(
        &self,
        name: &str,
        status: SessionStatus,
        pid: Option<i32>,
        metadata_json: Option<&str>,
    ) -> Result<SessionRecord, StorageError> {
        {
            let conn = self.conn.lock();
            let now = now_iso();
            conn.execute(
                "INSERT INTO sessions(name, status, pid, started_at, last_seen_at, metadata_json)
                 VALUES(?1, ?2, ?3, ?4, ?4, ?5)
                 ON CONFLICT(name) DO UPDATE SET
                     status = excluded.status,
                     pid = excluded.pid,
                     last_seen_at = excluded.last_seen_at,
                     metadata_json = excluded.metadata_json,
                     started_at = COALESCE(sessions.started_at, excluded.started_at)",
                params![name, status.as_str(), pid, now, metadata_json],
            )?;
        }
        self.get_session(name)
    }

    pub fn get_session(&self, name: &str) -> Result<SessionRecord, StorageError> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                "SELECT name, status, pid, started_at, last_seen_at, metadata_json
                 FROM sessions WHERE name = ?1",
                params![name],
                RawSession::from_row,
            )
            .optional()?;
        raw.ok_or_else(|| StorageError::SessionNotFound(name.to_string()))?
            .into_record()
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionRecord>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT name, status, pid, started_at, last_seen_at, metadata_json
             FROM sessions ORDER BY name ASC",
        )?;
        let rows = stmt.query_map([], RawSession::from_row)?;
        rows.map(|raw| raw.map_err(StorageError::from)?.into_record())
            .collect()
    }

    /// Refresh a session's `last_seen_at`.
    pub fn touch_session(&self, name: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE sessions SET last_seen_at = ?1 WHERE name = ?2",
            params![now_iso(), name],
        )?;
        Ok(())
    }

    // ── chat pointers ───────────────────────────────────────────────────

    pub fn get_active_session_for_chat(&self, chat_id: i64) -> Result<Option<String>, StorageError> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT active_session_name FROM chat_state WHERE chat_id = ?1",
                params![chat_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten())
    }

    /// Last-writer-wins pointer from a chat to its active session.
    pub fn set_active_session_for_chat(
        &self,
        chat_id: i64,
        session_name: Option<&str>,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO chat_state(chat_id, active_session_name, updated_at)
             VALUES(?1, ?2, ?3)
             ON CONFLICT(chat_id) DO UPDATE SET
                 active_session_name = excluded.active_session_name,
                 updated_at = excluded.updated_at",
            params![chat_id, session_name, now_iso()],
        )?;
        Ok(())
    }

    // ── pending approval UI tokens ──────────────────────────────────────

    pub fn list_approval_checklists(&self) -> Result<Vec<ApprovalChecklist>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT job_id, chat_id, message_id, approve_task_id, reject_task_id, revise_task_id
             FROM approval_checklists",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ApprovalChecklist {
                job_id: row.get(0)?,
                chat_id: row.get(1)?,
                message_id: row.get(2)?,
                approve_task_id: row.get(3)?,
                reject_task_id: row.get(4)?,
                revise_task_id: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn save_approval_checklist(
        &self,
        checklist: &ApprovalChecklist,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO approval_checklists(chat_id, message_id, job_id,
                                             approve_task_id, reject_task_id, revise_task_id)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(chat_id, message_id) DO UPDATE SET
                 job_id = excluded.job_id,
                 approve_task_id = excluded.approve_task_id,
                 reject_task_id = excluded.reject_task_id,
                 revise_task_id = excluded.revise_task_id",
            params![
                checklist.chat_id,
                checklist.message_id,
                checklist.job_id,
                checklist.approve_task_id,
                checklist.reject_task_id,
                checklist.revise_task_id,
            ],
        )?;
        Ok(())
    }

    pub fn delete_approval_checklist(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM approval_checklists WHERE chat_id = ?1 AND message_id = ?2",
            params![chat_id, message_id],
        )?;
        Ok(())
    }

    pub fn list_approval_polls(&self) -> Result<Vec<ApprovalPoll>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT poll_id, job_id, chat_id, message_id FROM approval_polls")?;
        let rows = stmt.query_map([], |row| {
            Ok(ApprovalPoll {
                poll_id: row.get(0)?,
                job_id: row.get(1)?,
                chat_id: row.get(2)?,
                message_id: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn save_approval_poll(&self, poll: &ApprovalPoll) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO approval_polls(poll_id, job_id, chat_id, message_id)
             VALUES(?1, ?2, ?3, ?4)
             ON CONFLICT(poll_id) DO UPDATE SET
                 job_id = excluded.job_id,
                 chat_id = excluded.chat_id,
                 message_id = excluded.message_id",
            params![poll.poll_id, poll.job_id, poll.chat_id, poll.message_id],
        )?;
        Ok(())
    }

    pub fn delete_approval_poll(&self, poll_id: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM approval_polls WHERE poll_id = ?1",
            params![poll_id],
        )?;
        Ok(())
    }
}

// ── row mapping ─────────────────────────────────────────────────────────

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StorageError> {
    parse_iso(value).ok_or_else(|| StorageError::Corrupt(UnknownValue::new("timestamp", value)))
}

fn parse_opt_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>, StorageError> {
    value.as_deref().map(parse_timestamp).transpose()
}

struct RawJob {
    id: i64,
    created_at: String,
    updated_at: String,
    status: String,
    mode: String,
    session_name: Option<String>,
    prompt: String,
    risk_level: String,
    needs_approval: i64,
    approved_by: Option<i64>,
    started_at: Option<String>,
    finished_at: Option<String>,
    exit_code: Option<i32>,
    summary_text: Option<String>,
    error_text: Option<String>,
}

impl RawJob {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            status: row.get("status")?,
            mode: row.get("mode")?,
            session_name: row.get("session_name")?,
            prompt: row.get("prompt")?,
            risk_level: row.get("risk_level")?,
            needs_approval: row.get("needs_approval")?,
            approved_by: row.get("approved_by")?,
            started_at: row.get("started_at")?,
            finished_at: row.get("finished_at")?,
            exit_code: row.get("exit_code")?,
            summary_text: row.get("summary_text")?,
            error_text: row.get("error_text")?,
        })
    }

    fn into_job(self) -> Result<Job, StorageError> {
        Ok(Job {
            id: self.id,
            status: self.status.parse::<JobStatus>()?,
            mode: self.mode.parse::<JobMode>()?,
            prompt: self.prompt,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            session_name: self.session_name,
            risk_level: self.risk_level.parse::<RiskLevel>()?,
            needs_approval: self.needs_approval != 0,
            approved_by: self.approved_by,
            started_at: parse_opt_timestamp(self.started_at)?,
            finished_at: parse_opt_timestamp(self.finished_at)?,
            exit_code: self.exit_code,
            summary_text: self.summary_text,
            error_text: self.error_text,
        })
    }
}

struct RawArtifact {
    id: i64,
    job_id: i64,
    kind: String,
    path: String,
    size_bytes: i64,
    sha256: String,
}

impl RawArtifact {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            job_id: row.get(1)?,
            kind: row.get(2)?,
            path: row.get(3)?,
            size_bytes: row.get(4)?,
            sha256: row.get(5)?,
        })
    }

    fn into_artifact(self) -> Result<Artifact, StorageError> {
        Ok(Artifact {
            id: self.id,
            job_id: self.job_id,
            kind: self.kind.parse::<ArtifactKind>()?,
            path: PathBuf::from(self.path),
            size_bytes: self.size_bytes as u64,
            sha256: self.sha256,
        })
    }
}

struct RawSession {
    name: String,
    status: String,
    pid: Option<i32>,
    started_at: Option<String>,
    last_seen_at: Option<String>,
    metadata_json: Option<String>,
}

impl RawSession {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            status: row.get(1)?,
            pid: row.get(2)?,
            started_at: row.get(3)?,
            last_seen_at: row.get(4)?,
            metadata_json: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<SessionRecord, StorageError> {
        Ok(SessionRecord {
            name: self.name,
            status: self.status.parse::<SessionStatus>()?,
            pid: self.pid,
            started_at: parse_opt_timestamp(self.started_at)?,
            last_seen_at: parse_opt_timestamp(self.last_seen_at)?,
            metadata_json: self.metadata_json,
        })
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
