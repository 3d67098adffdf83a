// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Error types for parapet-core.
use thiserror::Error;

/// Recoverable errors returned to callers.
///
/// These represent avoidable misuse and never leave a buffer in a
/// partially modified protection state. OS failures and canary
/// mismatches are not errors; they route through the fatal handler.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// A buffer of zero bytes was requested.
    #[error("length of buffer must be non-zero")]
    InvalidLength,

    /// The operation requires a live buffer and this one is destroyed.
    #[error("buffer has been destroyed")]
    Destroyed,

    /// A mutating access was attempted on a frozen buffer.
    #[error("buffer is marked immutable")]
    Immutable,
}
