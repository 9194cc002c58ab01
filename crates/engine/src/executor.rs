// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-CLI execution.
//!
//! Plan construction renders the configured command template for the job's
//! mode and injects runtime-profile flags, the git-repo-check skip, and the
//! last-message output flag — all idempotently, anchored on the configured
//! invocation marker. Execution runs the plan under `sh -c` with stdio
//! streamed to files in the run directory, a hard wall-clock timeout, and a
//! cancellation token that guarantees the child is dead before the call
//! returns.

use crate::profile::{ProfileStore, RuntimeProfile};
use legate_core::{Job, JobMode, Settings};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Cap on the stdout/stderr tail used for summaries and error text.
const TAIL_CHARS: usize = 3200;
/// Cap on the assistant last-message file read.
const LAST_MESSAGE_CHARS: usize = 12_000;

/// Errors from executing a job.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The worker was canceled; the child has already been killed.
    #[error("execution canceled")]
    Canceled,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the executor needs to run one job.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub job: Job,
    pub run_dir: PathBuf,
    /// Whether the risk gate has released this job.
    pub approved: bool,
}

/// A concrete command ready to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub command: String,
    pub env: Vec<(String, String)>,
}

/// Outcome of a finished (or timed-out) run.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    pub summary: String,
    pub error_text: Option<String>,
    /// Working directory the child ran in, for relative artifact resolution.
    pub exec_cwd: PathBuf,
}

/// Builds and runs agent-CLI invocations.
pub struct AgentExecutor {
    settings: Arc<Settings>,
    profile: Arc<ProfileStore>,
}

impl AgentExecutor {
    pub fn new(settings: Arc<Settings>, profile: Arc<ProfileStore>) -> Self {
        Self { settings, profile }
    }

    /// Render the command template for the job and inject runtime flags.
    pub fn build_plan(
        &self,
        ctx: &ExecutionContext,
        output_last_message_path: Option<&Path>,
    ) -> ExecutionPlan {
        let profile = self.profile.snapshot();
        let prompt = apply_personality(&profile, &ctx.job.prompt);
        let template = match ctx.job.mode {
            JobMode::Session => &self.settings.agent_session_cmd_template,
            JobMode::Ephemeral => &self.settings.agent_ephemeral_cmd_template,
        };
        let session_name = ctx.job.session_name.clone().unwrap_or_default();
        let output_path = output_last_message_path
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        let vars = [
            ("job_id", ctx.job.id.to_string()),
            ("prompt", prompt.clone()),
            ("prompt_quoted", quote(&prompt)),
            ("session_name", session_name.clone()),
            ("session_name_quoted", quote(&session_name)),
            (
                "approved",
                if ctx.approved { "1" } else { "0" }.to_string(),
            ),
            ("output_last_message_path", output_path.clone()),
            ("output_last_message_path_quoted", quote(&output_path)),
        ];

        let marker = &self.settings.agent_exec_marker;
        let mut command = render_template(template, &vars);
        let flags = runtime_cli_flags(&profile, &self.profile.effective_approval_policy());
        command = inject_after_marker(&command, marker, &flags.join(" "));
        if self.settings.agent_skip_git_repo_check
            && self.settings.agent_auto_safe_flags
            && !command.contains("--skip-git-repo-check")
        {
            command = inject_after_marker(&command, marker, "--skip-git-repo-check");
        }
        if let Some(path) = output_last_message_path {
            if !has_output_last_message_flag(&command, marker) {
                let flag = format!("-o {}", quote(&path.display().to_string()));
                command = inject_after_marker(&command, marker, &flag);
            }
        }

        ExecutionPlan {
            command,
            env: vec![("JOB_ID".to_string(), ctx.job.id.to_string())],
        }
    }

    /// Run the job to completion, timeout, or cancellation.
    ///
    /// The raw prompt is persisted to `prompt.txt` and the child's stdio is
    /// streamed to `stdout.log`/`stderr.log` in the run directory. On
    /// timeout the child is killed and the result carries exit code 124; on
    /// cancellation the child is killed and [`ExecuteError::Canceled`] is
    /// returned so the dispatcher can record the cancellation.
    pub async fn execute(
        &self,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, ExecuteError> {
        std::fs::create_dir_all(&ctx.run_dir)?;
        let stdout_path = ctx.run_dir.join("stdout.log");
        let stderr_path = ctx.run_dir.join("stderr.log");
        std::fs::write(ctx.run_dir.join("prompt.txt"), &ctx.job.prompt)?;

        let last_message_path = ctx.run_dir.join("assistant_last_message.txt");
        let output_path = self
            .settings
            .response_mode
            .captures_last_message()
            .then(|| last_message_path.clone());
        let plan = self.build_plan(ctx, output_path.as_deref());
        let workdir = self.profile.effective_workdir();

        tracing::debug!(
            job_id = ctx.job.id,
            command = %plan.command,
            cwd = %workdir.display(),
            "spawning agent command"
        );

        let stdout_file = std::fs::File::create(&stdout_path)?;
        let stderr_file = std::fs::File::create(&stderr_path)?;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&plan.command)
            .current_dir(&workdir)
            .envs(plan.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::from(stderr_file))
            .kill_on_drop(true)
            .spawn()?;

        let waited = tokio::select! {
            status = child.wait() => Waited::Exited(status),
            _ = tokio::time::sleep(self.settings.job_timeout) => Waited::TimedOut,
            _ = cancel.cancelled() => Waited::Canceled,
        };
        let status = match waited {
            Waited::Exited(status) => status?,
            Waited::TimedOut => {
                let _ = child.kill().await;
                tracing::warn!(job_id = ctx.job.id, "job timed out, child killed");
                return Ok(ExecutionResult {
                    exit_code: 124,
                    stdout_path,
                    stderr_path,
                    summary: "Timed out while executing agent command".to_string(),
                    error_text: Some("Job exceeded timeout limit".to_string()),
                    exec_cwd: workdir,
                });
            }
            Waited::Canceled => {
                let _ = child.kill().await;
                tracing::info!(job_id = ctx.job.id, "job canceled, child killed");
                return Err(ExecuteError::Canceled);
            }
        };

        let exit_code = status.code().unwrap_or(1);
        let stdout_tail = tail_text(&stdout_path, TAIL_CHARS);
        let stderr_tail = tail_text(&stderr_path, TAIL_CHARS);

        let (summary, error_text) = if exit_code == 0 {
            let mut summary = read_text(&last_message_path, LAST_MESSAGE_CHARS);
            if summary.is_empty() {
                summary = if stdout_tail.is_empty() {
                    "Completed.".to_string()
                } else {
                    stdout_tail.clone()
                };
            }
            (summary, None)
        } else {
            let error = if !stderr_tail.is_empty() {
                stderr_tail
            } else if !stdout_tail.is_empty() {
                stdout_tail
            } else {
                "No error output captured".to_string()
            };
            ("Execution failed.".to_string(), Some(error))
        };

        Ok(ExecutionResult {
            exit_code,
            stdout_path,
            stderr_path,
            summary,
            error_text,
            exec_cwd: workdir,
        })
    }
}

enum Waited {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Canceled,
}

/// Shell-quote a single word.
fn quote(s: &str) -> String {
    shell_words::join([s])
}

/// Replace `{name}` placeholders; unknown placeholders are left intact.
fn render_template(template: &str, vars: &[(&str, String)]) -> String {
    let mut rendered = template.to_string();
    for (name, value) in vars {
        rendered = rendered.replace(&format!("{{{name}}}"), value);
    }
    rendered
}

fn apply_personality(profile: &RuntimeProfile, prompt: &str) -> String {
    let instruction = profile.personality.instruction().trim();
    if instruction.is_empty() {
        prompt.to_string()
    } else {
        format!("{instruction}\n\n{prompt}")
    }
}

/// Profile flags in stable order: model, reasoning effort, sandbox,
/// approval policy, web search, then one `--enable` per sorted feature.
fn runtime_cli_flags(profile: &RuntimeProfile, effective_approval: &str) -> Vec<String> {
    let mut flags = Vec::new();
    if let Some(model) = &profile.model {
        flags.push(format!("-m {}", quote(model)));
    }
    if let Some(effort) = profile.reasoning_effort {
        let config = format!("model_reasoning_effort=\"{effort}\"");
        flags.push(format!("-c {}", quote(&config)));
    }
    if let Some(mode) = profile.sandbox_mode {
        flags.push(format!("-s {mode}"));
    }
    if !effective_approval.is_empty() {
        let config = format!("approval_policy=\"{effective_approval}\"");
        flags.push(format!("-c {}", quote(&config)));
    }
    if let Some(search) = profile.web_search {
        let config = format!("web_search=\"{search}\"");
        flags.push(format!("-c {}", quote(&config)));
    }
    for feature in &profile.experimental_features {
        flags.push(format!("--enable {}", quote(feature)));
    }
    flags
}

/// Insert `insertion` immediately after the invocation marker.
///
/// Commands without the marker pass through untouched, so templates that
/// wrap the agent CLI in something else opt out of injection entirely.
fn inject_after_marker(command: &str, marker: &str, insertion: &str) -> String {
    if insertion.is_empty() {
        return command.to_string();
    }
    let marker_with_space = format!("{marker} ");
    if let Some(rest) = command.strip_prefix(&marker_with_space) {
        return format!("{marker} {insertion} {rest}").trim().to_string();
    }
    if command.trim() == marker {
        return format!("{marker} {insertion}");
    }
    match command.find(&marker_with_space) {
        Some(idx) => {
            let start = &command[..idx];
            let rest = &command[idx + marker_with_space.len()..];
            format!("{start}{marker} {insertion} {rest}").trim().to_string()
        }
        None => command.to_string(),
    }
}

/// Token-level scan for an existing `-o`/`--output-last-message` flag.
///
/// Only tokens after the invocation marker count, up to the next shell
/// separator or `--`; a flag appearing after positional arguments still
/// suppresses injection. Falls back to a substring check when the command
/// does not tokenize.
fn has_output_last_message_flag(command: &str, marker: &str) -> bool {
    let fallback = || command.contains("--output-last-message") || command.contains(" -o ");

    let Ok(tokens) = shell_words::split(command) else {
        return fallback();
    };
    let marker_tokens: Vec<&str> = marker.split_whitespace().collect();
    if marker_tokens.is_empty() {
        return fallback();
    }

    let mut found_marker = false;
    for idx in 0..tokens.len().saturating_sub(marker_tokens.len() - 1) {
        let window = &tokens[idx..idx + marker_tokens.len()];
        if !window.iter().zip(&marker_tokens).all(|(a, b)| a == b) {
            continue;
        }
        found_marker = true;
        for token in &tokens[idx + marker_tokens.len()..] {
            match token.as_str() {
                "&&" | "||" | "|" | ";" | "--" => break,
                "-o" | "--output-last-message" => return true,
                t if t.starts_with("-o=") || t.starts_with("--output-last-message=") => {
                    return true
                }
                _ => {}
            }
        }
    }

    if found_marker {
        return false;
    }
    fallback()
}

/// Trailing `max_chars` of a file, lossily decoded and trimmed.
fn tail_text(path: &Path, max_chars: usize) -> String {
    let Ok(bytes) = std::fs::read(path) else {
        return String::new();
    };
    let text = String::from_utf8_lossy(&bytes);
    let count = text.chars().count();
    if count <= max_chars {
        text.trim().to_string()
    } else {
        text.chars()
            .skip(count - max_chars)
            .collect::<String>()
            .trim()
            .to_string()
    }
}

/// Leading `max_chars` of a file, lossily decoded and trimmed.
fn read_text(path: &Path, max_chars: usize) -> String {
    if !path.is_file() {
        return String::new();
    }
    let Ok(bytes) = std::fs::read(path) else {
        return String::new();
    };
    let text = String::from_utf8_lossy(&bytes);
    text.chars()
        .take(max_chars)
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
