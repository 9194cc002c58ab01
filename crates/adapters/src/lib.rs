// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! legate-adapters: egress adapters for the control plane.
//!
//! The chat front end implements [`Notifier`] against its own wire protocol;
//! this crate carries the trait, shared message formatting, and the local
//! implementations (tracing log, desktop notifications, no-op, and a fake
//! for tests).

pub mod notify;

pub use notify::{
    DesktopNotifier, LogNotifier, NoOpNotifier, Notifier, NotifyError,
};

#[cfg(any(test, feature = "test-support"))]
pub use notify::{FakeNotifier, NotifyCall};
