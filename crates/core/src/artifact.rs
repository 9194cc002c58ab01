// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifacts collected from job runs.

use crate::job::UnknownValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Coarse classification of an artifact, derived from its file extension
/// unless a caller overrides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Image,
    Video,
    Log,
    Document,
    File,
}

impl ArtifactKind {
    /// Classify a lowercase file extension (including the leading dot).
    pub fn for_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            ".png" | ".jpg" | ".jpeg" | ".gif" | ".webp" => ArtifactKind::Image,
            ".mp4" | ".webm" => ArtifactKind::Video,
            ".log" | ".txt" | ".json" => ArtifactKind::Log,
            ".pdf" => ArtifactKind::Document,
            _ => ArtifactKind::File,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Image => "image",
            ArtifactKind::Video => "video",
            ArtifactKind::Log => "log",
            ArtifactKind::Document => "document",
            ArtifactKind::File => "file",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(ArtifactKind::Image),
            "video" => Ok(ArtifactKind::Video),
            "log" => Ok(ArtifactKind::Log),
            "document" => Ok(ArtifactKind::Document),
            "file" => Ok(ArtifactKind::File),
            other => Err(UnknownValue::new("kind", other)),
        }
    }
}

/// A file registered against a job.
///
/// `path` is absolute and resolved; the collector guarantees at most one
/// artifact per `(job_id, path)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: i64,
    pub job_id: i64,
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub sha256: String,
}

#[cfg(test)]
#[path = "artifact_tests.rs"]
mod tests;
