// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Error types for parapet-memcall.
use thiserror::Error;

/// Errors from memory allocation, protection and locking syscalls.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemcallError {
    /// The OS refused to map a new memory region.
    #[error("failed to allocate memory region")]
    AllocFailed,

    /// The OS refused to change the protection of a region.
    #[error("failed to change memory protection")]
    ProtectFailed,

    /// The OS refused to pin a region in physical memory,
    /// typically because `RLIMIT_MEMLOCK` is exhausted.
    #[error("failed to lock memory region")]
    LockFailed,

    /// The OS refused to release a pin on a region.
    #[error("failed to unlock memory region")]
    UnlockFailed,

    /// The OS refused to unmap a region.
    #[error("failed to free memory region")]
    FreeFailed,
}
