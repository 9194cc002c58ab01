// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite schema.
//!
//! Timestamps are ISO-8601 UTC strings at second precision. The jobs table
//! is indexed for the dispatcher's status sweep, events for per-job audit
//! reads, artifacts for per-job listing.

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
  user_id INTEGER PRIMARY KEY,
  is_owner INTEGER NOT NULL DEFAULT 0,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS jobs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL,
  status TEXT NOT NULL,
  mode TEXT NOT NULL,
  session_name TEXT,
  prompt TEXT NOT NULL,
  risk_level TEXT NOT NULL,
  needs_approval INTEGER NOT NULL DEFAULT 0,
  approved_by INTEGER,
  started_at TEXT,
  finished_at TEXT,
  exit_code INTEGER,
  summary_text TEXT,
  error_text TEXT
);

CREATE INDEX IF NOT EXISTS idx_jobs_status_created ON jobs(status, created_at);

CREATE TABLE IF NOT EXISTS job_events (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  job_id INTEGER NOT NULL,
  timestamp TEXT NOT NULL,
  event_type TEXT NOT NULL,
  payload_json TEXT,
  FOREIGN KEY(job_id) REFERENCES jobs(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_job_events_job_id_ts ON job_events(job_id, timestamp);

CREATE TABLE IF NOT EXISTS artifacts (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  job_id INTEGER NOT NULL,
  kind TEXT NOT NULL,
  path TEXT NOT NULL,
  size_bytes INTEGER NOT NULL,
  sha256 TEXT NOT NULL,
  FOREIGN KEY(job_id) REFERENCES jobs(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_artifacts_job_id ON artifacts(job_id);

CREATE TABLE IF NOT EXISTS sessions (
  name TEXT PRIMARY KEY,
  status TEXT NOT NULL,
  pid INTEGER,
  started_at TEXT,
  last_seen_at TEXT,
  metadata_json TEXT
);

CREATE TABLE IF NOT EXISTS chat_state (
  chat_id INTEGER PRIMARY KEY,
  active_session_name TEXT,
  updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS approval_checklists (
  chat_id INTEGER NOT NULL,
  message_id INTEGER NOT NULL,
  job_id INTEGER NOT NULL,
  approve_task_id INTEGER NOT NULL DEFAULT 1,
  reject_task_id INTEGER NOT NULL DEFAULT 2,
  revise_task_id INTEGER NOT NULL DEFAULT 3,
  PRIMARY KEY (chat_id, message_id)
);

CREATE TABLE IF NOT EXISTS approval_polls (
  poll_id TEXT PRIMARY KEY,
  job_id INTEGER NOT NULL,
  chat_id INTEGER NOT NULL,
  message_id INTEGER NOT NULL
);
";
