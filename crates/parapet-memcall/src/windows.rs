// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! Windows backend: VirtualAlloc / VirtualProtect / VirtualLock /
//! VirtualUnlock / VirtualFree.

use core::ffi::c_void;
use core::mem::MaybeUninit;
use core::ptr::{self, NonNull};

use windows_sys::Win32::System::Memory::{
    VirtualAlloc, VirtualFree, VirtualLock, VirtualProtect, VirtualUnlock, MEM_COMMIT,
    MEM_RELEASE, MEM_RESERVE, PAGE_NOACCESS, PAGE_PROTECTION_FLAGS, PAGE_READONLY,
    PAGE_READWRITE,
};
use windows_sys::Win32::System::SystemInformation::GetSystemInfo;

use crate::{MemcallError, MemoryProtection};

pub(crate) fn page_size() -> usize {
    let mut info = MaybeUninit::uninit();
    unsafe { GetSystemInfo(info.as_mut_ptr()) };
    let info = unsafe { info.assume_init() };
    info.dwPageSize as usize
}

pub(crate) fn alloc(len: usize) -> Result<NonNull<u8>, MemcallError> {
    let ptr = unsafe {
        VirtualAlloc(
            ptr::null(),
            len,
            MEM_COMMIT | MEM_RESERVE,
            PAGE_READWRITE,
        )
    };

    NonNull::new(ptr as *mut u8).ok_or(MemcallError::AllocFailed)
}

pub(crate) unsafe fn protect(
    ptr: *mut u8,
    len: usize,
    protection: MemoryProtection,
) -> Result<(), MemcallError> {
    let prot = match protection {
        MemoryProtection::NoAccess => PAGE_NOACCESS,
        MemoryProtection::ReadOnly => PAGE_READONLY,
        MemoryProtection::ReadWrite => PAGE_READWRITE,
    };

    let mut previous: PAGE_PROTECTION_FLAGS = 0;
    let failed =
        unsafe { VirtualProtect(ptr as *const c_void, len, prot, &mut previous) } == 0;

    if failed {
        return Err(MemcallError::ProtectFailed);
    }

    Ok(())
}

pub(crate) unsafe fn lock(ptr: *mut u8, len: usize) -> Result<(), MemcallError> {
    let failed = unsafe { VirtualLock(ptr as *const c_void, len) } == 0;

    if failed {
        return Err(MemcallError::LockFailed);
    }

    Ok(())
}

pub(crate) unsafe fn unlock(ptr: *mut u8, len: usize) -> Result<(), MemcallError> {
    let failed = unsafe { VirtualUnlock(ptr as *const c_void, len) } == 0;

    if failed {
        return Err(MemcallError::UnlockFailed);
    }

    Ok(())
}

pub(crate) unsafe fn free(ptr: *mut u8, len: usize) -> Result<(), MemcallError> {
    // VirtualFree with MEM_RELEASE requires a zero length.
    let _ = len;
    let failed = unsafe { VirtualFree(ptr as *mut c_void, 0, MEM_RELEASE) } == 0;

    if failed {
        return Err(MemcallError::FreeFailed);
    }

    Ok(())
}
