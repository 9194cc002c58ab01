// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ISO-8601 UTC timestamp formatting for persisted state.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current UTC time at second precision, e.g. `2026-02-01T12:30:00+00:00`.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Parse a stored timestamp back into a UTC datetime.
pub fn parse_iso(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
