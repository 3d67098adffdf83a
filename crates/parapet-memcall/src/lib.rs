// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! parapet-memcall - Platform-neutral memory syscall facade.
//!
//! Wraps page allocation, protection, locking and release behind one
//! API. Unix targets go through mmap/mprotect/mlock/munlock/munmap,
//! Windows targets through VirtualAlloc/VirtualProtect/VirtualLock/
//! VirtualUnlock/VirtualFree.
//!
//! Every region handled here starts on a page boundary and spans a
//! page-multiple number of bytes.

#![warn(missing_docs)]
#![warn(unsafe_op_in_unsafe_fn)]


mod error;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as platform;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as platform;

use core::ptr::NonNull;
use std::sync::OnceLock;

pub use error::MemcallError;

/// Protection mode applied to a page-aligned region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryProtection {
    /// Any load or store into the region faults the process.
    NoAccess,
    /// Loads succeed, stores fault.
    ReadOnly,
    /// Loads and stores succeed.
    ReadWrite,
}

static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

/// Returns the system page size, queried once from the OS.
#[inline]
pub fn page_size() -> usize {
    *PAGE_SIZE.get_or_init(platform::page_size)
}

/// Rounds `len` up to the next multiple of the system page size.
#[inline]
pub fn round_to_page_size(len: usize) -> usize {
    let page = page_size();
    len + (page - len % page) % page
}

/// Maps a fresh region of `len` bytes.
///
/// The region is page-aligned, readable and writable, zero-filled and
/// not locked. `len` must be a page-multiple.
pub fn alloc(len: usize) -> Result<NonNull<u8>, MemcallError> {
    debug_assert!(len > 0 && len % page_size() == 0);
    platform::alloc(len)
}

/// Changes the protection of a region to `protection`.
///
/// # Safety
///
/// `ptr` must point at the start of a live region obtained from
/// [`alloc`], and `[ptr, ptr + len)` must lie within it on page
/// boundaries.
pub unsafe fn protect(
    ptr: *mut u8,
    len: usize,
    protection: MemoryProtection,
) -> Result<(), MemcallError> {
    unsafe { platform::protect(ptr, len, protection) }
}

/// Pins a region in physical memory so it is never swapped out.
///
/// # Safety
///
/// Same region requirements as [`protect`].
pub unsafe fn lock(ptr: *mut u8, len: usize) -> Result<(), MemcallError> {
    unsafe { platform::lock(ptr, len) }
}

/// Releases a pin previously placed with [`lock`].
///
/// # Safety
///
/// Same region requirements as [`protect`].
pub unsafe fn unlock(ptr: *mut u8, len: usize) -> Result<(), MemcallError> {
    unsafe { platform::unlock(ptr, len) }
}

/// Unmaps a region previously obtained from [`alloc`].
///
/// # Safety
///
/// `ptr` and `len` must exactly match a prior [`alloc`] call, the
/// region must be readable and writable, and no reference into it may
/// outlive this call.
pub unsafe fn free(ptr: *mut u8, len: usize) -> Result<(), MemcallError> {
    unsafe { platform::free(ptr, len) }
}
