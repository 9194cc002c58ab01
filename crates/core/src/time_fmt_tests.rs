// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn now_iso_round_trips() {
    let stamp = now_iso();
    let parsed = parse_iso(&stamp).unwrap();
    assert_eq!(parsed.to_rfc3339_opts(SecondsFormat::Secs, false), stamp);
}

#[test]
fn now_iso_has_second_precision() {
    let stamp = now_iso();
    assert!(!stamp.contains('.'), "no sub-second digits: {stamp}");
    assert!(stamp.ends_with("+00:00"), "utc offset: {stamp}");
}

#[test]
fn parse_iso_rejects_garbage() {
    assert!(parse_iso("not a timestamp").is_none());
    assert!(parse_iso("").is_none());
}
