// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! parapet-guard - Process hardening for secret-bearing processes.
//!
//! A process holding guarded buffers should not leave their contents
//! in a core dump or expose them to a ptrace attach. [`harden`]
//! performs both mitigations once per process:
//!
//! - `prctl(PR_SET_DUMPABLE, 0)` blocks core dumps and ptrace
//!   attachment (Linux; reversible by other code in the process)
//! - `setrlimit(RLIMIT_CORE, 0)` caps core dump size at zero bytes
//!   (redundant with prctl, harder to revert)
//!
//! Subsequent calls return the cached outcome of the first.

#![warn(missing_docs)]


use std::sync::OnceLock;

/// Outcome of the one-time hardening pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardenStatus {
    /// Whether `prctl(PR_SET_DUMPABLE, 0)` succeeded.
    pub dumpable_cleared: bool,

    /// Whether `setrlimit(RLIMIT_CORE, 0)` succeeded.
    pub core_limit_zeroed: bool,
}

impl HardenStatus {
    /// Returns whether at least one mitigation is active.
    pub fn is_hardened(&self) -> bool {
        self.dumpable_cleared || self.core_limit_zeroed
    }
}

static STATUS: OnceLock<HardenStatus> = OnceLock::new();

/// Applies the hardening syscalls on first call and returns the cached
/// [`HardenStatus`] on every call after that.
///
/// Thread-safe: concurrent first calls race on `OnceLock` and exactly
/// one performs the syscalls.
pub fn harden() -> HardenStatus {
    *STATUS.get_or_init(|| HardenStatus {
        dumpable_cleared: clear_dumpable(),
        core_limit_zeroed: zero_core_limit(),
    })
}

#[cfg(target_os = "linux")]
fn clear_dumpable() -> bool {
    unsafe { libc::prctl(libc::PR_SET_DUMPABLE, 0, 0, 0, 0) == 0 }
}

#[cfg(not(target_os = "linux"))]
fn clear_dumpable() -> bool {
    // prctl is Linux-only
    false
}

#[cfg(unix)]
fn zero_core_limit() -> bool {
    let limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    unsafe { libc::setrlimit(libc::RLIMIT_CORE, &limit) == 0 }
}

#[cfg(not(unix))]
fn zero_core_limit() -> bool {
    // Windows has no core dump limit to clamp
    false
}
