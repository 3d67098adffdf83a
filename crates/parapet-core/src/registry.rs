// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Process-wide registry of live buffers.
//!
//! The registry keeps a non-owning back-reference to every live
//! buffer, in insertion order, so bulk destruction can reach buffers
//! whose owners are elsewhere. Removal never frees a buffer; a
//! buffer's destruction always removes it here first.
//!
//! Lock ordering: a buffer's own lock is acquired before the registry
//! lock (destroy does this), and drain takes the registry lock alone,
//! releasing it before any drained buffer is touched. The reverse
//! order never occurs.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::buffer::Buffer;

/// Ordered set of weak references to live buffers.
pub struct BufferRegistry {
    list: RwLock<Vec<Weak<Buffer>>>,
}

impl BufferRegistry {
    const fn new() -> Self {
        Self {
            list: RwLock::new(Vec::new()),
        }
    }

    /// Appends a buffer. The caller guarantees it is not yet present.
    pub fn add(&self, buffer: &Arc<Buffer>) {
        let mut list = self.list.write().unwrap_or_else(PoisonError::into_inner);
        list.push(Arc::downgrade(buffer));
    }

    /// Removes a buffer; no-op when it is absent.
    pub fn remove(&self, buffer: &Buffer) {
        let target: *const Buffer = buffer;
        let mut list = self.list.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(index) = list.iter().position(|weak| Weak::as_ptr(weak) == target) {
            list.remove(index);
        }
    }

    /// Returns whether a buffer is currently registered.
    pub fn exists(&self, buffer: &Buffer) -> bool {
        let target: *const Buffer = buffer;
        let list = self.list.read().unwrap_or_else(PoisonError::into_inner);

        list.iter().any(|weak| Weak::as_ptr(weak) == target)
    }

    /// Atomically empties the registry and returns the previous
    /// contents, in insertion order, as owning handles.
    ///
    /// Entries whose owner already dropped them are skipped. The
    /// registry lock is released before the snapshot is returned, so
    /// callers destroy the drained buffers without holding it.
    pub fn drain(&self) -> Vec<Arc<Buffer>> {
        let drained = {
            let mut list = self.list.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *list)
        };

        drained.iter().filter_map(Weak::upgrade).collect()
    }

    /// Snapshot of the current contents without emptying the registry.
    /// The fatal path uses this to wipe buffers it does not own.
    pub(crate) fn snapshot(&self) -> Vec<Arc<Buffer>> {
        let list = self.list.read().unwrap_or_else(PoisonError::into_inner);
        list.iter().filter_map(Weak::upgrade).collect()
    }
}

static REGISTRY: BufferRegistry = BufferRegistry::new();

/// Returns the process-wide buffer registry.
pub fn registry() -> &'static BufferRegistry {
    &REGISTRY
}

/// Drains the registry and destroys every drained buffer.
///
/// The shutdown path for processes that want no secret to outlive the
/// call: buffers created concurrently with the drain are either in
/// the snapshot and destroyed here, or untouched and still registered.
pub fn destroy_all() {
    for buffer in registry().drain() {
        buffer.destroy();
    }
}
