// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide settings.
//!
//! Settings are loaded once from the environment (`LEGATE_*` variables) and
//! shared immutably. Directory-valued settings are created and canonicalized
//! at load time so the rest of the system can assume they exist.

use crate::job::UnknownValue;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default artifact extension allow-list.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    ".txt", ".log", ".json", ".png", ".jpg", ".jpeg", ".gif", ".webp", ".mp4", ".pdf",
];

/// Agent-CLI approval policies accepted as the safe default.
pub const ALLOWED_APPROVAL_POLICIES: &[&str] = &["untrusted", "on-failure", "on-request", "never"];

/// Errors raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error("invalid allowed workdir entry (not a directory): {0}")]
    NotADirectory(PathBuf),
    #[error("agent workdir must be inside the allowed workdir roots")]
    WorkdirOutsideRoots,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// How job summaries are rendered back to the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Just the assistant's reply.
    Natural,
    /// The reply plus a short job tag.
    Compact,
    /// Full heading, status, and reply.
    Verbose,
}

impl ResponseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseMode::Natural => "natural",
            ResponseMode::Compact => "compact",
            ResponseMode::Verbose => "verbose",
        }
    }

    /// Whether this mode wants the agent's last message captured to a file.
    pub fn captures_last_message(self) -> bool {
        matches!(self, ResponseMode::Natural | ResponseMode::Compact)
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseMode {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "natural" => Ok(ResponseMode::Natural),
            "compact" => Ok(ResponseMode::Compact),
            "verbose" => Ok(ResponseMode::Verbose),
            other => Err(UnknownValue::new("response mode", other)),
        }
    }
}

/// Immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// The single owner allowed to drive the control plane.
    pub owner_user_id: i64,
    /// SQLite database path.
    pub db_path: PathBuf,
    /// Per-job run directories live under here.
    pub runs_dir: PathBuf,
    /// Default working directory for agent invocations.
    pub agent_workdir: PathBuf,
    /// Roots outside which no workdir override or artifact may resolve.
    pub agent_allowed_workdirs: Vec<PathBuf>,
    /// Invocation marker flag injection anchors on, e.g. `codex exec`.
    pub agent_exec_marker: String,
    /// Command template for one-shot jobs.
    pub agent_ephemeral_cmd_template: String,
    /// Command template for session-targeted jobs.
    pub agent_session_cmd_template: String,
    /// Optional template for booting a named session.
    pub agent_session_boot_cmd_template: Option<String>,
    /// Inject `--skip-git-repo-check` into rendered commands.
    pub agent_skip_git_repo_check: bool,
    /// Master switch for automatic flag injection.
    pub agent_auto_safe_flags: bool,
    /// Approval policy injected when the profile leaves it unset.
    pub agent_safe_default_approval: String,
    /// Dispatcher idle sleep between reservation sweeps.
    pub worker_poll_interval: Duration,
    /// Upper bound on concurrently running jobs.
    pub max_parallel_jobs: usize,
    /// Wall-clock ceiling per job.
    pub job_timeout: Duration,
    /// Grace period between SIGTERM and SIGKILL when stopping a session.
    pub session_stop_timeout: Duration,
    /// Largest file the artifact collector will register.
    pub max_artifact_bytes: u64,
    /// Lowercase extension allow-list (leading dots included).
    pub allowed_artifact_extensions: Vec<String>,
    /// Summary rendering mode.
    pub response_mode: ResponseMode,
}

impl Settings {
    /// Build settings with defaults for everything but the three paths.
    ///
    /// The allow-list defaults to the workdir itself. Used by embedders and
    /// tests; `from_env` layers environment overrides on top of the same
    /// defaults.
    pub fn new(db_path: PathBuf, runs_dir: PathBuf, agent_workdir: PathBuf) -> Self {
        Self {
            owner_user_id: 0,
            db_path,
            runs_dir,
            agent_allowed_workdirs: vec![agent_workdir.clone()],
            agent_workdir,
            agent_exec_marker: "codex exec".to_string(),
            agent_ephemeral_cmd_template: "codex exec {prompt_quoted}".to_string(),
            agent_session_cmd_template:
                "codex exec --skip-git-repo-check resume {session_name_quoted} {prompt_quoted}"
                    .to_string(),
            agent_session_boot_cmd_template: None,
            agent_skip_git_repo_check: true,
            agent_auto_safe_flags: true,
            agent_safe_default_approval: "on-request".to_string(),
            worker_poll_interval: Duration::from_millis(500),
            max_parallel_jobs: 1,
            job_timeout: Duration::from_secs(3600),
            session_stop_timeout: Duration::from_secs(10),
            max_artifact_bytes: 50_000_000,
            allowed_artifact_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            response_mode: ResponseMode::Natural,
        }
    }

    /// Load settings from `LEGATE_*` environment variables.
    ///
    /// Creates the runs directory, the default workdir, and the database
    /// parent directory, and validates that the workdir lies inside the
    /// allowed roots.
    pub fn from_env() -> Result<Self, ConfigError> {
        let owner_raw = require_var("LEGATE_OWNER_ID")?;
        let owner_user_id = owner_raw
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidValue {
                name: "LEGATE_OWNER_ID",
                value: owner_raw.clone(),
            })?;

        let agent_workdir = path_var("LEGATE_WORKDIR", ".");
        std::fs::create_dir_all(&agent_workdir)?;
        let agent_workdir = agent_workdir.canonicalize()?;

        let mut allowed = path_list_var("LEGATE_ALLOWED_WORKDIRS");
        if allowed.is_empty() {
            allowed.push(agent_workdir.clone());
        }
        let mut agent_allowed_workdirs = Vec::with_capacity(allowed.len());
        for root in allowed {
            if !root.is_dir() {
                return Err(ConfigError::NotADirectory(root));
            }
            agent_allowed_workdirs.push(root.canonicalize()?);
        }
        if !agent_allowed_workdirs
            .iter()
            .any(|root| is_within(&agent_workdir, root))
        {
            return Err(ConfigError::WorkdirOutsideRoots);
        }

        let runs_dir = path_var("LEGATE_RUNS_DIR", "runs");
        std::fs::create_dir_all(&runs_dir)?;
        let runs_dir = runs_dir.canonicalize()?;

        let db_path = path_var("LEGATE_DB_PATH", "data/state.sqlite3");
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let defaults = Settings::new(db_path, runs_dir, agent_workdir.clone());

        let agent_safe_default_approval = string_var(
            "LEGATE_SAFE_DEFAULT_APPROVAL",
            &defaults.agent_safe_default_approval,
        );
        if !ALLOWED_APPROVAL_POLICIES.contains(&agent_safe_default_approval.as_str()) {
            return Err(ConfigError::InvalidValue {
                name: "LEGATE_SAFE_DEFAULT_APPROVAL",
                value: agent_safe_default_approval,
            });
        }

        let response_mode = string_var("LEGATE_RESPONSE_MODE", defaults.response_mode.as_str())
            .parse::<ResponseMode>()
            .map_err(|e| ConfigError::InvalidValue {
                name: "LEGATE_RESPONSE_MODE",
                value: e.value,
            })?;

        Ok(Self {
            owner_user_id,
            agent_allowed_workdirs,
            agent_exec_marker: string_var("LEGATE_AGENT_EXEC_MARKER", &defaults.agent_exec_marker),
            agent_ephemeral_cmd_template: string_var(
                "LEGATE_EPHEMERAL_CMD_TEMPLATE",
                &defaults.agent_ephemeral_cmd_template,
            ),
            agent_session_cmd_template: string_var(
                "LEGATE_SESSION_CMD_TEMPLATE",
                &defaults.agent_session_cmd_template,
            ),
            agent_session_boot_cmd_template: std::env::var("LEGATE_SESSION_BOOT_CMD_TEMPLATE")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            agent_skip_git_repo_check: bool_var(
                "LEGATE_SKIP_GIT_REPO_CHECK",
                defaults.agent_skip_git_repo_check,
            )?,
            agent_auto_safe_flags: bool_var(
                "LEGATE_AUTO_SAFE_FLAGS",
                defaults.agent_auto_safe_flags,
            )?,
            agent_safe_default_approval,
            worker_poll_interval: secs_f64_var(
                "LEGATE_WORKER_POLL_INTERVAL",
                defaults.worker_poll_interval,
            )?,
            max_parallel_jobs: parse_var("LEGATE_MAX_PARALLEL_JOBS", defaults.max_parallel_jobs)?,
            job_timeout: Duration::from_secs(parse_var(
                "LEGATE_JOB_TIMEOUT_SECONDS",
                defaults.job_timeout.as_secs(),
            )?),
            session_stop_timeout: Duration::from_secs(parse_var(
                "LEGATE_SESSION_STOP_TIMEOUT_SECONDS",
                defaults.session_stop_timeout.as_secs(),
            )?),
            max_artifact_bytes: parse_var(
                "LEGATE_MAX_ARTIFACT_BYTES",
                defaults.max_artifact_bytes,
            )?,
            allowed_artifact_extensions: extensions_var(),
            response_mode,
            ..defaults
        })
    }

    /// The artifact allow-list roots: allowed workdirs plus the runs dir.
    pub fn artifact_roots(&self) -> Vec<PathBuf> {
        let mut roots = self.agent_allowed_workdirs.clone();
        roots.push(self.runs_dir.clone());
        roots
    }

    /// Per-job run directory.
    pub fn run_dir(&self, job_id: i64) -> PathBuf {
        self.runs_dir.join(job_id.to_string())
    }
}

/// Component-wise containment check.
pub fn is_within(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

/// Expand a leading `~` against the user's home directory.
pub fn expand_tilde(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if raw == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(raw)
}

fn require_var(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingVar(name))
}

fn string_var(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| default.to_string())
}

fn path_var(name: &str, default: &str) -> PathBuf {
    expand_tilde(&string_var(name, default))
}

fn path_list_var(name: &str) -> Vec<PathBuf> {
    std::env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(expand_tilde)
        .collect()
}

fn bool_var(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue { name, value }),
        },
    }
}

fn secs_f64_var(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(value) => value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64)
            .ok_or(ConfigError::InvalidValue { name, value }),
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}

fn extensions_var() -> Vec<String> {
    let parsed: Vec<String> = std::env::var("LEGATE_ALLOWED_ARTIFACT_EXTENSIONS")
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if parsed.is_empty() {
        DEFAULT_ALLOWED_EXTENSIONS
            .iter()
            .map(|s| s.to_string())
            .collect()
    } else {
        parsed
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
