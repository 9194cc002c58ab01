// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pattern-based prompt risk classification.
//!
//! The classifier is a pure function over prompt text: it never consults the
//! runtime profile, the store, or the filesystem. The pattern sets are fixed;
//! the agent CLI's own approval policy is a separate concern and does not
//! feed into this gate.

use crate::job::RiskLevel;
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

/// Destructive filesystem and system-administration commands.
const HIGH_RISK_PATTERNS: &[&str] = &[
    r"\brm\s+-rf\b",
    r"\bmkfs\b",
    r"\bdd\s+if=",
    r"\bshutdown\b",
    r"\breboot\b",
    r"\buserdel\b",
    r"\bchown\s+-R\s+/",
    r"\bchmod\s+777\s+/",
    r":\(\)\{:\|:&\};:",
];

/// Privileged or environment-mutating tooling.
const MEDIUM_RISK_PATTERNS: &[&str] = &[
    r"\bsudo\b",
    r"\brm\b",
    r"\bgit\s+push\b",
    r"\bdocker\s+(run|compose|rm|rmi|exec)\b",
    r"\bsystemctl\b",
    r"\bapt(-get)?\s+",
    r"\byum\s+",
    r"\bpacman\s+",
    r"\bpip\s+install\b",
    r"\bnpm\s+install\b",
    r"\bcargo\s+install\b",
    r"\bkubectl\s+",
];

#[allow(clippy::expect_used)]
fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .expect("constant regex pattern is valid")
        })
        .collect()
}

static HIGH_RISK: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(HIGH_RISK_PATTERNS));
static MEDIUM_RISK: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(MEDIUM_RISK_PATTERNS));

/// Outcome of classifying a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskDecision {
    pub level: RiskLevel,
    pub needs_approval: bool,
    /// Human-readable explanation naming the matched pattern, if any.
    pub reason: String,
}

/// Classifies prompts against the fixed high/medium pattern sets.
///
/// First match wins; a high-risk match dominates any medium-risk one.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskPolicy;

impl RiskPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Classify a prompt into a risk level and approval requirement.
    pub fn classify(&self, prompt: &str) -> RiskDecision {
        let normalized = prompt.trim();
        if normalized.is_empty() {
            return RiskDecision {
                level: RiskLevel::Low,
                needs_approval: false,
                reason: "empty prompt".to_string(),
            };
        }

        for pattern in HIGH_RISK.iter() {
            if pattern.is_match(normalized) {
                return RiskDecision {
                    level: RiskLevel::High,
                    needs_approval: true,
                    reason: format!("matches high-risk pattern: {}", pattern.as_str()),
                };
            }
        }

        for pattern in MEDIUM_RISK.iter() {
            if pattern.is_match(normalized) {
                return RiskDecision {
                    level: RiskLevel::Medium,
                    needs_approval: true,
                    reason: format!("matches medium-risk pattern: {}", pattern.as_str()),
                };
            }
        }

        RiskDecision {
            level: RiskLevel::Low,
            needs_approval: false,
            reason: "no risky patterns detected".to_string(),
        }
    }
}

#[cfg(test)]
#[path = "risk_tests.rs"]
mod tests;
