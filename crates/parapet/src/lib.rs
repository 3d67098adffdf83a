// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Parapet stores secrets in guarded memory: each [`Buffer`] lives in
//! a page-aligned mapping pinned in RAM, walled in by two no-access
//! guard pages, and instrumented with a random canary that is checked
//! when the buffer is destroyed.
//!
//! # Features
//!
//! - **Guard pages** — stray reads and writes on either side of the
//!   data fault immediately instead of corrupting silently
//! - **Canary detection** — overflows that reach the canary are caught
//!   at destruction, after which the process wipes and halts
//! - **No swap** — buffer contents are locked in physical memory
//! - **Explicit mutability** — [`Buffer::freeze`] and [`Buffer::melt`]
//!   toggle the region between read-only and read-write
//! - **Deterministic teardown** — [`Buffer::destroy`] verifies, wipes
//!   and releases; dropping the last handle does the same
//! - **Bulk shutdown** — every live buffer is registered, so
//!   [`destroy_all`] can wipe the lot on exit
//!
//! # Quick Start
//!
//! ```rust
//! use parapet::Buffer;
//!
//! fn main() -> Result<(), parapet::BufferError> {
//!     // Optional: block core dumps and ptrace before secrets exist.
//!     parapet::harden();
//!
//!     let key = Buffer::new(32)?;
//!
//!     key.with_bytes_mut(|bytes| bytes.fill(0x5A))?;
//!
//!     // Freeze while the key is only being read.
//!     key.freeze()?;
//!     key.with_bytes(|bytes| assert_eq!(bytes[0], 0x5A))?;
//!
//!     key.melt()?;
//!     key.destroy();
//!     assert!(key.state().destroyed);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Limits
//!
//! The kernel caps how much memory a process may lock
//! (`RLIMIT_MEMLOCK` on Linux); each live buffer consumes part of that
//! budget and construction fails fatally once it is exhausted. Destroy
//! buffers as soon as they are no longer needed.
//!
//! Parapet defends the container, not the universe: an attacker with
//! kernel privileges, hardware access or a cold-boot rig is out of
//! scope.

#![warn(missing_docs)]

pub use parapet_core::{
    destroy_all, registry, set_fatal_handler, Buffer, BufferError, BufferRegistry, BufferState,
    FatalHandler, CANARY_SIZE,
};
pub use parapet_guard::{harden, HardenStatus};

pub use parapet_memcall as memcall;
pub use parapet_rand as rand;
pub use parapet_util as util;
