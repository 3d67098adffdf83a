// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Unix backend: mmap / mprotect / mlock / munlock / munmap.

use core::ptr::{self, NonNull};

use crate::{MemcallError, MemoryProtection};

pub(crate) fn page_size() -> usize {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

pub(crate) fn alloc(len: usize) -> Result<NonNull<u8>, MemcallError> {
    let ptr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };

    if ptr == libc::MAP_FAILED {
        return Err(MemcallError::AllocFailed);
    }

    // Keep the region out of core dumps. Best-effort: older kernels
    // reject MADV_DONTDUMP and the mapping is still usable.
    #[cfg(target_os = "linux")]
    unsafe {
        libc::madvise(ptr, len, libc::MADV_DONTDUMP);
    }

    // Safety: MAP_FAILED was ruled out above, so ptr is non-null.
    Ok(unsafe { NonNull::new_unchecked(ptr as *mut u8) })
}

pub(crate) unsafe fn protect(
    ptr: *mut u8,
    len: usize,
    protection: MemoryProtection,
) -> Result<(), MemcallError> {
    let prot = match protection {
        MemoryProtection::NoAccess => libc::PROT_NONE,
        MemoryProtection::ReadOnly => libc::PROT_READ,
        MemoryProtection::ReadWrite => libc::PROT_READ | libc::PROT_WRITE,
    };

    let failed = unsafe { libc::mprotect(ptr as *mut libc::c_void, len, prot) } != 0;

    if failed {
        return Err(MemcallError::ProtectFailed);
    }

    Ok(())
}

pub(crate) unsafe fn lock(ptr: *mut u8, len: usize) -> Result<(), MemcallError> {
    let failed = unsafe { libc::mlock(ptr as *const libc::c_void, len) } != 0;

    if failed {
        return Err(MemcallError::LockFailed);
    }

    Ok(())
}

pub(crate) unsafe fn unlock(ptr: *mut u8, len: usize) -> Result<(), MemcallError> {
    let failed = unsafe { libc::munlock(ptr as *const libc::c_void, len) } != 0;

    if failed {
        return Err(MemcallError::UnlockFailed);
    }

    Ok(())
}

pub(crate) unsafe fn free(ptr: *mut u8, len: usize) -> Result<(), MemcallError> {
    let failed = unsafe { libc::munmap(ptr as *mut libc::c_void, len) } != 0;

    if failed {
        return Err(MemcallError::FreeFailed);
    }

    Ok(())
}
