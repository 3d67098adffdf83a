// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! parapet-core - Guarded buffers for raw sensitive data.
//!
//! A [`Buffer`] holds secrets in a page-aligned mapping that is pinned
//! in RAM, walled in by two no-access guard pages, and instrumented
//! with a random 32-byte canary that is verified when the buffer is
//! destroyed. Mutability is explicit: [`Buffer::freeze`] makes the
//! region read-only, [`Buffer::melt`] makes it writable again, and
//! [`Buffer::destroy`] wipes and releases it deterministically.
//!
//! Every live buffer is tracked in a process-wide [`BufferRegistry`]
//! so shutdown paths and the fatal handler can reach all of them.
//! Detected corruption and OS primitive failures do not return; they
//! wipe what can still be wiped and route through the handler
//! installed with [`set_fatal_handler`].

#![warn(missing_docs)]
#![warn(unsafe_op_in_unsafe_fn)]

#[cfg(test)]
mod tests;

mod buffer;
mod error;
mod fatal;
mod registry;

pub use buffer::{Buffer, BufferState, CANARY_SIZE};
pub use error::BufferError;
pub use fatal::{set_fatal_handler, FatalHandler};
pub use registry::{destroy_all, registry, BufferRegistry};
