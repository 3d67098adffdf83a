// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Fatal-failure surface.
//!
//! OS primitive failures and canary mismatches make continued
//! operation unsafe. Those paths call [`fatal`], which wipes every
//! registered buffer it can still reach and then hands the diagnostic
//! to the process-wide handler. Handlers never return; the default one
//! writes the diagnostic to stderr and aborts.

use std::sync::{PoisonError, RwLock};

use crate::registry::registry;

/// A process-wide sink for unrecoverable failures. Must not return.
pub type FatalHandler = fn(&str) -> !;

static HANDLER: RwLock<FatalHandler> = RwLock::new(default_handler);

/// Replaces the process-wide fatal handler.
///
/// Integrating applications hook this to coordinate their own
/// wipe-then-exit sequence. The handler runs after the core has
/// already wiped every live buffer it could reach.
pub fn set_fatal_handler(handler: FatalHandler) {
    *HANDLER.write().unwrap_or_else(PoisonError::into_inner) = handler;
}

/// Wipes what can still be wiped, then invokes the fatal handler.
pub(crate) fn fatal(message: &str) -> ! {
    for buffer in registry().snapshot() {
        buffer.wipe_for_exit();
    }

    let handler = *HANDLER.read().unwrap_or_else(PoisonError::into_inner);
    handler(message)
}

fn default_handler(message: &str) -> ! {
    eprintln!("parapet: fatal: {message}");
    std::process::abort()
}
