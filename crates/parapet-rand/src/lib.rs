// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! parapet-rand - Cryptographically secure randomness.
//!
//! Canary material and scramble fills come from the OS CSPRNG via
//! `getrandom`:
//! - Linux/Android: `getrandom()` syscall
//! - macOS/iOS: `getentropy()`
//! - Windows: `BCryptGenRandom`

#![warn(missing_docs)]


mod error;
mod system;
mod traits;

pub use error::EntropyError;
pub use system::SystemEntropySource;
pub use traits::EntropySource;

/// Overwrites `dest` with fresh random bytes from the system CSPRNG.
///
/// Used to destroy data beyond recovery where a plain zero fill would
/// advertise that a wipe took place.
pub fn scramble(dest: &mut [u8]) -> Result<(), EntropyError> {
    SystemEntropySource {}.fill_bytes(dest)
}
