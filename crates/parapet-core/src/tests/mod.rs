// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Tests for parapet-core

mod buffer;

/// Runs an ignored test as a subprocess and returns its exit code.
/// Used for scenarios that end in the fatal handler: the subprocess
/// dies, the parent asserts on the exit code.
#[cfg(target_os = "linux")]
pub(crate) fn run_test_as_subprocess(test_name: &str) -> Option<i32> {
    let exe = std::env::current_exe().expect("Failed to get current exe");
    let status = std::process::Command::new(exe)
        .args([
            "--exact",
            test_name,
            "--ignored",
            "--test-threads=1",
            "--nocapture",
        ])
        .status()
        .expect("Failed to run subprocess");
    status.code()
}

/// Reads the amount of locked memory (in kB) for the current process
/// by parsing the `VmLck` field of `/proc/self/status`.
#[cfg(target_os = "linux")]
pub(crate) fn get_locked_memory_kb() -> usize {
    let status = match std::fs::read_to_string("/proc/self/status") {
        Ok(s) => s,
        Err(_) => return 0,
    };

    for line in status.lines() {
        if line.starts_with("VmLck:") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 2 {
                return parts[1].parse().unwrap_or(0);
            }
        }
    }

    0
}
