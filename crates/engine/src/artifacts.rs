// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact collection.
//!
//! Two passes per finished job: a recursive scan of the run directory, and
//! a text scan that pulls path candidates out of the run's stdout/stderr/
//! summary text. Every candidate must resolve to an existing regular file
//! under an allowed root, pass the extension and size filters, and not
//! already be registered for the job.

use legate_core::settings::expand_tilde;
use legate_core::{Artifact, ArtifactKind, Settings};
use legate_storage::{StorageError, Store};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

/// Cap applied to each scanned text, bounding regex runtime.
const TEXT_SCAN_CHARS: usize = 200_000;

#[allow(clippy::expect_used)]
static BACKTICK_CANDIDATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`\n]+)`").expect("constant regex pattern is valid"));

#[allow(clippy::expect_used)]
static GENERIC_CANDIDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[~./]?[A-Za-z0-9_\-./]+\.[A-Za-z0-9]{1,10}")
        .expect("constant regex pattern is valid")
});

/// Hashes, filters, and registers files produced by job runs.
pub struct ArtifactCollector {
    store: Arc<Store>,
    settings: Arc<Settings>,
}

impl ArtifactCollector {
    pub fn new(store: Arc<Store>, settings: Arc<Settings>) -> Self {
        Self { store, settings }
    }

    /// Register a single file if it passes the extension and size filters.
    ///
    /// Returns `Ok(None)` when the file is filtered out or missing; the
    /// stored path is the canonicalized absolute path.
    pub fn register_file(
        &self,
        job_id: i64,
        path: &Path,
        kind: Option<ArtifactKind>,
    ) -> Result<Option<Artifact>, StorageError> {
        let Ok(resolved) = path.canonicalize() else {
            return Ok(None);
        };
        if !resolved.is_file() {
            return Ok(None);
        }
        let ext = extension_of(&resolved);
        if !ext.is_empty()
            && !self
                .settings
                .allowed_artifact_extensions
                .iter()
                .any(|allowed| allowed == &ext)
        {
            return Ok(None);
        }
        let Ok(metadata) = std::fs::metadata(&resolved) else {
            return Ok(None);
        };
        let size = metadata.len();
        if size == 0 || size > self.settings.max_artifact_bytes {
            return Ok(None);
        }
        let Ok(sha256) = sha256_of(&resolved) else {
            return Ok(None);
        };
        let kind = kind.unwrap_or_else(|| ArtifactKind::for_extension(&ext));
        self.store
            .add_artifact(job_id, kind, &resolved, size, &sha256)
            .map(Some)
    }

    /// Walk the run directory and register every eligible file.
    pub fn collect_from_run_dir(
        &self,
        job_id: i64,
        run_dir: &Path,
    ) -> Result<Vec<Artifact>, StorageError> {
        let mut registered = self.registered_paths(job_id)?;
        let mut files = Vec::new();
        walk_files(run_dir, &mut files);
        files.sort();

        let mut added = Vec::new();
        for candidate in files {
            let Ok(resolved) = candidate.canonicalize() else {
                continue;
            };
            if registered.contains(&resolved) {
                continue;
            }
            if let Some(artifact) = self.register_file(job_id, &resolved, None)? {
                registered.insert(artifact.path.clone());
                added.push(artifact);
            }
        }
        Ok(added)
    }

    /// Extract path candidates from output texts and register the ones that
    /// resolve to real files under the allowed roots.
    ///
    /// Relative candidates resolve against `base_dir` (the working
    /// directory the job actually ran in). URLs are dropped, and paths
    /// already registered for this job are skipped.
    pub fn collect_from_output_texts(
        &self,
        job_id: i64,
        texts: &[String],
        base_dir: &Path,
        roots: &[PathBuf],
    ) -> Result<Vec<Artifact>, StorageError> {
        let mut registered = self.registered_paths(job_id)?;
        let mut added = Vec::new();
        for text in texts {
            if text.is_empty() {
                continue;
            }
            let capped: String = text.chars().take(TEXT_SCAN_CHARS).collect();
            for candidate in path_candidates(&capped) {
                let Some(resolved) = resolve_candidate(&candidate, base_dir, roots) else {
                    continue;
                };
                if registered.contains(&resolved) {
                    continue;
                }
                if let Some(artifact) = self.register_file(job_id, &resolved, None)? {
                    registered.insert(resolved);
                    added.push(artifact);
                }
            }
        }
        Ok(added)
    }

    fn registered_paths(&self, job_id: i64) -> Result<HashSet<PathBuf>, StorageError> {
        Ok(self
            .store
            .list_artifacts(job_id)?
            .into_iter()
            .map(|artifact| artifact.path)
            .collect())
    }
}

/// Lowercase extension including the leading dot, or empty.
fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default()
}

fn sha256_of(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn walk_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk_files(&path, out);
        } else if path.is_file() {
            out.push(path);
        }
    }
}

/// Candidates in scan order: backtick-quoted spans first, then dotted
/// tokens with word boundaries checked manually (the regex crate has no
/// lookaround). Deduplicated, order-preserving.
fn path_candidates(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for capture in BACKTICK_CANDIDATE.captures_iter(text) {
        if let Some(m) = capture.get(1) {
            push_candidate(m.as_str(), &mut seen, &mut candidates);
        }
    }

    for m in GENERIC_CANDIDATE.find_iter(text) {
        let before = text[..m.start()].chars().next_back();
        if before.is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '/') {
            continue;
        }
        let after = text[m.end()..].chars().next();
        if after.is_some_and(|c| c.is_alphanumeric() || c == '_') {
            continue;
        }
        push_candidate(m.as_str(), &mut seen, &mut candidates);
    }

    candidates
}

fn push_candidate(raw: &str, seen: &mut HashSet<String>, out: &mut Vec<String>) {
    let candidate = raw.trim().trim_matches(['"', '\'', '`']).to_string();
    if !candidate.is_empty() && seen.insert(candidate.clone()) {
        out.push(candidate);
    }
}

/// Resolve a candidate to a canonical file path under one of the roots.
fn resolve_candidate(candidate: &str, base_dir: &Path, roots: &[PathBuf]) -> Option<PathBuf> {
    if candidate.starts_with("http://")
        || candidate.starts_with("https://")
        || candidate.starts_with("file://")
    {
        return None;
    }
    let raw = expand_tilde(candidate);
    let absolute = if raw.is_absolute() {
        raw
    } else {
        base_dir.join(raw)
    };
    let resolved = absolute.canonicalize().ok()?;
    if !resolved.is_file() {
        return None;
    }
    let under_root = roots.iter().any(|root| {
        root.canonicalize()
            .map(|root| resolved.starts_with(root))
            .unwrap_or(false)
    });
    under_root.then_some(resolved)
}

#[cfg(test)]
#[path = "artifacts_tests.rs"]
mod tests;
