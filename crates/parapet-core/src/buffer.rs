// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Buffer - A guarded region for raw sensitive data.
//!
//! Each buffer maps `2·page + inner_len` bytes. The first and last
//! page are no-access guards; the span between them is pinned in RAM
//! and toggles between read-write and read-only. The caller's bytes
//! occupy the high end of that span so the rear guard sits directly
//! after the last writable byte, and a 32-byte random canary sits
//! directly before them. A reference copy of the canary lives in the
//! tail of the front guard page, unreadable until destruction briefly
//! reopens the whole mapping to verify it.

use std::sync::{Arc, PoisonError, RwLock};

use parapet_memcall::{self as memcall, MemoryProtection};
use parapet_rand::{EntropySource, SystemEntropySource};
use parapet_util::{constant_time_copy, constant_time_eq, wipe};

use crate::error::BufferError;
use crate::fatal::fatal;
use crate::registry::registry;

/// Width of the canary in bytes.
pub const CANARY_SIZE: usize = 32;

/// A raw sub-region of a buffer's allocation.
#[derive(Clone, Copy)]
pub(crate) struct Span {
    pub(crate) ptr: *mut u8,
    pub(crate) len: usize,
}

impl Span {
    const fn empty() -> Self {
        Self {
            ptr: core::ptr::null_mut(),
            len: 0,
        }
    }

    fn new(ptr: *mut u8, len: usize) -> Self {
        Self { ptr, len }
    }

    /// # Safety
    ///
    /// The span must be live and readable for the chosen lifetime.
    pub(crate) unsafe fn as_slice<'a>(self) -> &'a [u8] {
        if self.len == 0 {
            return &[];
        }
        unsafe { core::slice::from_raw_parts(self.ptr, self.len) }
    }

    /// # Safety
    ///
    /// The span must be live and writable for the chosen lifetime, and
    /// the caller must be its only accessor.
    pub(crate) unsafe fn as_mut_slice<'a>(self) -> &'a mut [u8] {
        if self.len == 0 {
            return &mut [];
        }
        unsafe { core::slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

/// Mutable buffer state, guarded by the buffer's own lock.
pub(crate) struct State {
    pub(crate) alive: bool,
    pub(crate) mutable: bool,

    /// The entire allocation, `2·page + inner_len` bytes.
    pub(crate) whole: Span,
    /// No-access page in front of the inner region.
    pub(crate) preguard: Span,
    /// Locked span between the guards.
    pub(crate) inner: Span,
    /// No-access page behind the inner region.
    pub(crate) postguard: Span,
    /// Canary copy directly before the data, inside `inner`.
    pub(crate) canary_val: Span,
    /// Canary reference in the tail of the preguard page.
    pub(crate) canary_ref: Span,
    /// The caller's bytes, the last `size` bytes of `inner`.
    pub(crate) data: Span,
}

impl State {
    fn clear(&mut self) {
        self.alive = false;
        self.mutable = false;
        self.whole = Span::empty();
        self.preguard = Span::empty();
        self.inner = Span::empty();
        self.postguard = Span::empty();
        self.canary_val = Span::empty();
        self.canary_ref = Span::empty();
        self.data = Span::empty();
    }
}

/// Snapshot of a buffer's lifecycle flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferState {
    /// Whether the inner region currently accepts writes.
    pub mutable: bool,
    /// Whether the buffer has been destroyed.
    pub destroyed: bool,
}

/// A guarded region holding raw sensitive data.
///
/// The number of buffers that can live at one time is bounded by how
/// much memory the kernel lets this process lock. Destroy buffers you
/// no longer need; exceeding the limit makes construction fail
/// fatally.
///
/// The core synchronizes the container, not the contents: concurrent
/// writes into the data region need the caller's own discipline,
/// either a single writer by convention or external synchronization.
pub struct Buffer {
    pub(crate) state: RwLock<State>,
}

// Safety: the buffer owns its mapping and every access to the raw
// spans goes through the state lock or an unsafe accessor whose
// contract passes the obligation on.
unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

impl Buffer {
    /// Maps, locks and registers a new guarded buffer of `size` bytes.
    ///
    /// The buffer starts alive and mutable, with fresh canary material
    /// in both canary slots and both guard pages already sealed. Any
    /// failure after the first page is mapped is fatal; a partial
    /// buffer is never observable.
    pub fn new(size: usize) -> Result<Arc<Self>, BufferError> {
        if size < 1 {
            return Err(BufferError::InvalidLength);
        }

        let page = memcall::page_size();
        let padded = size
            .checked_add(CANARY_SIZE)
            .ok_or(BufferError::InvalidLength)?;
        let inner_len = memcall::round_to_page_size(padded);
        let total = inner_len
            .checked_add(2 * page)
            .filter(|_| inner_len >= padded)
            .ok_or(BufferError::InvalidLength)?;

        let base = match memcall::alloc(total) {
            Ok(ptr) => ptr.as_ptr(),
            Err(err) => fatal(&format!("buffer allocation failed: {err}")),
        };

        // Data sits at the high end of the inner region so the
        // postguard faults one byte past the caller's last byte, with
        // the canary copy directly below the data.
        let whole = Span::new(base, total);
        let preguard = Span::new(base, page);
        let (inner, postguard, data, canary_val, canary_ref) = unsafe {
            (
                Span::new(base.add(page), inner_len),
                Span::new(base.add(page + inner_len), page),
                Span::new(base.add(page + inner_len - size), size),
                Span::new(base.add(page + inner_len - size - CANARY_SIZE), CANARY_SIZE),
                Span::new(base.add(page - CANARY_SIZE), CANARY_SIZE),
            )
        };

        if let Err(err) = unsafe { memcall::lock(inner.ptr, inner.len) } {
            fatal(&format!("buffer lock failed: {err}"));
        }

        let entropy = SystemEntropySource {};
        if let Err(err) = entropy.fill_bytes(unsafe { canary_ref.as_mut_slice() }) {
            fatal(&format!("canary generation failed: {err}"));
        }
        constant_time_copy(unsafe { canary_val.as_mut_slice() }, unsafe {
            canary_ref.as_slice()
        });

        for guard in [preguard, postguard] {
            if let Err(err) =
                unsafe { memcall::protect(guard.ptr, guard.len, MemoryProtection::NoAccess) }
            {
                fatal(&format!("guard page protection failed: {err}"));
            }
        }

        let buffer = Arc::new(Self {
            state: RwLock::new(State {
                alive: true,
                mutable: true,
                whole,
                preguard,
                inner,
                postguard,
                canary_val,
                canary_ref,
                data,
            }),
        });

        // The buffer is alive before it is registered, so a concurrent
        // drain never observes a registered buffer that is not alive.
        registry().add(&buffer);

        Ok(buffer)
    }

    /// Returns the buffer's lifecycle flags.
    pub fn state(&self) -> BufferState {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        BufferState {
            mutable: state.mutable,
            destroyed: !state.alive,
        }
    }

    /// Returns the length of the data region, zero once destroyed.
    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .data
            .len
    }

    /// Returns whether the data region is empty, true once destroyed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes the inner region read-only.
    ///
    /// Idempotent while alive; no syscall is issued when the buffer is
    /// already frozen.
    pub fn freeze(&self) -> Result<(), BufferError> {
        self.set_mutability(false)
    }

    /// Makes the inner region writable again.
    ///
    /// Idempotent while alive, like [`freeze`](Self::freeze).
    pub fn melt(&self) -> Result<(), BufferError> {
        self.set_mutability(true)
    }

    fn set_mutability(&self, mutable: bool) -> Result<(), BufferError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if !state.alive {
            return Err(BufferError::Destroyed);
        }

        if state.mutable == mutable {
            return Ok(());
        }

        let protection = if mutable {
            MemoryProtection::ReadWrite
        } else {
            MemoryProtection::ReadOnly
        };

        if let Err(err) = unsafe { memcall::protect(state.inner.ptr, state.inner.len, protection) }
        {
            fatal(&format!("inner region protection failed: {err}"));
        }

        state.mutable = mutable;
        Ok(())
    }

    /// Runs `f` over the data region under the shared lock.
    ///
    /// The lock keeps freeze, melt and destroy out for the duration of
    /// the closure, so the bytes can be read regardless of mutability.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, BufferError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        if !state.alive {
            return Err(BufferError::Destroyed);
        }

        Ok(f(unsafe { state.data.as_slice() }))
    }

    /// Runs `f` over the writable data region under the exclusive lock.
    ///
    /// Returns [`BufferError::Immutable`] on a frozen buffer. The
    /// exclusive lock keeps every other accessor out, so the mutable
    /// slice is unaliased for the duration of the closure.
    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Result<R, BufferError> {
        let state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if !state.alive {
            return Err(BufferError::Destroyed);
        }

        if !state.mutable {
            return Err(BufferError::Immutable);
        }

        Ok(f(unsafe { state.data.as_mut_slice() }))
    }

    /// Returns the data region as a slice, empty once destroyed.
    ///
    /// # Safety
    ///
    /// The buffer must not be destroyed for the duration of the
    /// borrow, and no thread may be writing the region concurrently.
    /// [`with_bytes`](Self::with_bytes) is the checked alternative.
    pub unsafe fn as_slice(&self) -> &[u8] {
        let data = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .data;
        unsafe { data.as_slice() }
    }

    /// Returns the data region as a mutable slice, empty once destroyed.
    ///
    /// # Safety
    ///
    /// The buffer must stay alive and mutable for the duration of the
    /// borrow (a write into a frozen region faults the process), and
    /// the caller must be the region's only accessor.
    /// [`with_bytes_mut`](Self::with_bytes_mut) is the checked
    /// alternative.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn as_mut_slice(&self) -> &mut [u8] {
        let data = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .data;
        unsafe { data.as_mut_slice() }
    }

    /// Verifies the canary, wipes the allocation and releases it.
    ///
    /// Idempotent: the first call tears the buffer down, later calls
    /// return immediately. A canary mismatch is treated as positive
    /// evidence of an overflow; the region is wiped and the fatal
    /// handler is invoked instead of returning.
    pub fn destroy(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if !state.alive {
            return;
        }

        // The guards and the inner region must still tile the whole
        // allocation exactly; a drifted span means the bookkeeping
        // itself was overwritten.
        if state.preguard.len + state.inner.len + state.postguard.len != state.whole.len {
            fatal("buffer geometry corrupted; span bookkeeping overwritten");
        }

        // Open the verification window: the whole mapping becomes
        // readable and writable, including the canary reference inside
        // the preguard page. Kept open only as long as teardown takes.
        if let Err(err) = unsafe {
            memcall::protect(state.whole.ptr, state.whole.len, MemoryProtection::ReadWrite)
        } {
            fatal(&format!("destroy window protection failed: {err}"));
        }

        let equal = constant_time_eq(unsafe { state.canary_val.as_slice() }, unsafe {
            state.canary_ref.as_slice()
        });
        if !equal {
            wipe(unsafe { state.whole.as_mut_slice() });
            fatal("canary verification failed; buffer overflow detected");
        }

        registry().remove(self);

        wipe(unsafe { state.whole.as_mut_slice() });

        if let Err(err) = unsafe { memcall::unlock(state.inner.ptr, state.inner.len) } {
            fatal(&format!("buffer unlock failed: {err}"));
        }

        if let Err(err) = unsafe { memcall::free(state.whole.ptr, state.whole.len) } {
            fatal(&format!("buffer release failed: {err}"));
        }

        state.clear();
    }

    /// Best-effort wipe of the inner region on the fatal path.
    ///
    /// Uses `try_write` because the failing call may already hold this
    /// buffer's lock; such a buffer has wiped itself before raising.
    pub(crate) fn wipe_for_exit(&self) {
        let Ok(mut state) = self.state.try_write() else {
            return;
        };

        if !state.alive {
            return;
        }

        let writable = unsafe {
            memcall::protect(
                state.inner.ptr,
                state.inner.len,
                MemoryProtection::ReadWrite,
            )
        }
        .is_ok();

        if writable {
            wipe(unsafe { state.inner.as_mut_slice() });
            state.mutable = true;
        }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl core::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state();
        f.debug_struct("Buffer")
            .field("mutable", &state.mutable)
            .field("destroyed", &state.destroyed)
            .finish()
    }
}
