// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runtime profile: process-wide agent invocation settings.
//!
//! One [`ProfileStore`] owns the mutable profile; setters validate against
//! the closed value sets and readers get immutable snapshots. The profile's
//! `approval_policy` is the agent CLI's *internal* approval setting — it is
//! unrelated to the risk gate jobs pass through before dispatch.

use legate_core::settings::is_within;
use legate_core::{settings::expand_tilde, Settings};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Errors from profile setters.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("invalid {what} '{value}'. Allowed: {allowed}")]
    InvalidValue {
        what: &'static str,
        value: String,
        allowed: &'static str,
    },
    #[error("custom personality requires an instruction string")]
    MissingInstruction,
    #[error("feature name cannot be empty")]
    EmptyFeature,
    #[error("workdir does not exist or is not a directory: {0}")]
    WorkdirMissing(PathBuf),
    #[error("workdir is outside allowed roots. Allowed: {0}")]
    WorkdirOutsideRoots(String),
}

macro_rules! profile_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $what:literal, $allowed:literal,
        { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Parse a user-supplied value, naming the allowed set on failure.
            pub fn parse(value: &str) -> Result<Self, ProfileError> {
                value.trim().to_ascii_lowercase().parse()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ProfileError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ProfileError::InvalidValue {
                        what: $what,
                        value: other.to_string(),
                        allowed: $allowed,
                    }),
                }
            }
        }
    };
}

profile_enum!(
    /// Agent reasoning budget hint.
    ReasoningEffort, "reasoning effort", "high, low, medium, minimal, xhigh",
    {
        Minimal => "minimal",
        Low => "low",
        Medium => "medium",
        High => "high",
        Xhigh => "xhigh",
    }
);

profile_enum!(
    /// Agent sandbox level.
    SandboxMode, "permissions mode", "danger-full-access, read-only, workspace-write",
    {
        ReadOnly => "read-only",
        WorkspaceWrite => "workspace-write",
        DangerFullAccess => "danger-full-access",
    }
);

profile_enum!(
    /// The agent CLI's internal approval policy.
    ApprovalPolicy, "approvals policy", "never, on-failure, on-request, untrusted",
    {
        Untrusted => "untrusted",
        OnFailure => "on-failure",
        OnRequest => "on-request",
        Never => "never",
    }
);

profile_enum!(
    /// Web-tool availability.
    WebSearchMode, "web_search mode", "cached, disabled, live",
    {
        Live => "live",
        Cached => "cached",
        Disabled => "disabled",
    }
);

/// Guidance prepended to every prompt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Personality {
    #[default]
    None,
    Friendly,
    Pragmatic,
    Custom(String),
}

impl Personality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Personality::None => "none",
            Personality::Friendly => "friendly",
            Personality::Pragmatic => "pragmatic",
            Personality::Custom(_) => "custom",
        }
    }

    /// The instruction text to prepend; empty when there is none.
    pub fn instruction(&self) -> &str {
        match self {
            Personality::None => "",
            Personality::Friendly => "Respond in a friendly, collaborative tone.",
            Personality::Pragmatic => {
                "Respond as a pragmatic software engineer: direct, concise, and actionable."
            }
            Personality::Custom(instruction) => instruction,
        }
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of the runtime profile.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuntimeProfile {
    pub model: Option<String>,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub sandbox_mode: Option<SandboxMode>,
    pub approval_policy: Option<ApprovalPolicy>,
    pub web_search: Option<WebSearchMode>,
    pub experimental_features: BTreeSet<String>,
    pub personality: Personality,
    pub workdir_override: Option<PathBuf>,
}

/// Owner of the mutable profile.
pub struct ProfileStore {
    settings: Arc<Settings>,
    profile: Mutex<RuntimeProfile>,
}

impl ProfileStore {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            settings,
            profile: Mutex::new(RuntimeProfile::default()),
        }
    }

    /// Immutable snapshot of the current profile.
    pub fn snapshot(&self) -> RuntimeProfile {
        self.profile.lock().clone()
    }

    /// The profile's approval policy, or the configured safe default when
    /// unset. An explicit value is never overridden.
    pub fn effective_approval_policy(&self) -> String {
        self.profile
            .lock()
            .approval_policy
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| self.settings.agent_safe_default_approval.clone())
    }

    /// The working directory agent invocations run in.
    pub fn effective_workdir(&self) -> PathBuf {
        self.profile
            .lock()
            .workdir_override
            .clone()
            .unwrap_or_else(|| self.settings.agent_workdir.clone())
    }

    pub fn allowed_workdirs(&self) -> &[PathBuf] {
        &self.settings.agent_allowed_workdirs
    }

    /// Set (or clear) the model, optionally updating the reasoning effort.
    pub fn set_model(
        &self,
        model: Option<&str>,
        reasoning_effort: Option<&str>,
    ) -> Result<RuntimeProfile, ProfileError> {
        let parsed_effort = match reasoning_effort {
            None => None,
            Some(raw) if raw.trim().is_empty() => Some(None),
            Some(raw) => Some(Some(ReasoningEffort::parse(raw)?)),
        };
        let mut profile = self.profile.lock();
        profile.model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);
        if let Some(effort) = parsed_effort {
            profile.reasoning_effort = effort;
        }
        Ok(profile.clone())
    }

    pub fn set_sandbox_mode(&self, mode: Option<&str>) -> Result<RuntimeProfile, ProfileError> {
        let parsed = mode.map(SandboxMode::parse).transpose()?;
        let mut profile = self.profile.lock();
        profile.sandbox_mode = parsed;
        Ok(profile.clone())
    }

    pub fn set_approval_policy(&self, policy: Option<&str>) -> Result<RuntimeProfile, ProfileError> {
        let parsed = policy.map(ApprovalPolicy::parse).transpose()?;
        let mut profile = self.profile.lock();
        profile.approval_policy = parsed;
        Ok(profile.clone())
    }

    /// Convenience toggle between `live` and `disabled` web search.
    pub fn set_search(&self, enabled: bool) -> RuntimeProfile {
        let mut profile = self.profile.lock();
        profile.web_search = Some(if enabled {
            WebSearchMode::Live
        } else {
            WebSearchMode::Disabled
        });
        profile.clone()
    }

    pub fn set_web_search_mode(&self, mode: Option<&str>) -> Result<RuntimeProfile, ProfileError> {
        let parsed = mode.map(WebSearchMode::parse).transpose()?;
        let mut profile = self.profile.lock();
        profile.web_search = parsed;
        Ok(profile.clone())
    }

    pub fn set_personality(
        &self,
        personality: &str,
        custom_instruction: Option<&str>,
    ) -> Result<RuntimeProfile, ProfileError> {
        let normalized = personality.trim().to_ascii_lowercase();
        let parsed = match normalized.as_str() {
            "none" => Personality::None,
            "friendly" => Personality::Friendly,
            "pragmatic" => Personality::Pragmatic,
            "custom" => {
                let instruction = custom_instruction.map(str::trim).unwrap_or_default();
                if instruction.is_empty() {
                    return Err(ProfileError::MissingInstruction);
                }
                Personality::Custom(instruction.to_string())
            }
            _ => {
                return Err(ProfileError::InvalidValue {
                    what: "personality",
                    value: personality.to_string(),
                    allowed: "custom, friendly, none, pragmatic",
                })
            }
        };
        let mut profile = self.profile.lock();
        profile.personality = parsed;
        Ok(profile.clone())
    }

    /// Enable or disable an experimental feature. Idempotent.
    pub fn set_experimental_feature(
        &self,
        feature: &str,
        enabled: bool,
    ) -> Result<RuntimeProfile, ProfileError> {
        let normalized = normalize_feature(feature);
        if normalized.is_empty() {
            return Err(ProfileError::EmptyFeature);
        }
        let mut profile = self.profile.lock();
        if enabled {
            profile.experimental_features.insert(normalized);
        } else {
            profile.experimental_features.remove(&normalized);
        }
        Ok(profile.clone())
    }

    pub fn clear_experimental_features(&self) -> RuntimeProfile {
        let mut profile = self.profile.lock();
        profile.experimental_features.clear();
        profile.clone()
    }

    /// Override (or clear) the effective working directory.
    ///
    /// The path must resolve to an existing directory inside the allowed
    /// roots; relative paths resolve against the current effective workdir.
    pub fn set_workdir(&self, path: Option<&str>) -> Result<RuntimeProfile, ProfileError> {
        let Some(raw) = path else {
            let mut profile = self.profile.lock();
            profile.workdir_override = None;
            return Ok(profile.clone());
        };

        let raw = expand_tilde(raw.trim());
        let candidate = if raw.is_absolute() {
            raw
        } else {
            self.effective_workdir().join(raw)
        };
        let candidate = candidate
            .canonicalize()
            .ok()
            .filter(|p| p.is_dir())
            .ok_or(ProfileError::WorkdirMissing(candidate))?;

        if !self
            .settings
            .agent_allowed_workdirs
            .iter()
            .any(|root| is_within(&candidate, root))
        {
            let allowed = self
                .settings
                .agent_allowed_workdirs
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ProfileError::WorkdirOutsideRoots(allowed));
        }

        let mut profile = self.profile.lock();
        profile.workdir_override = Some(candidate);
        Ok(profile.clone())
    }
}

fn normalize_feature(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace(' ', "-")
}

#[cfg(test)]
#[path = "profile_tests.rs"]
mod tests;
