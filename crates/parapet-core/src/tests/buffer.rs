// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

use std::sync::PoisonError;

use serial_test::serial;

use parapet_memcall as memcall;

use crate::buffer::{Buffer, CANARY_SIZE};
use crate::error::BufferError;

// new & layout

#[serial(registry)]
#[test]
fn test_new_zero_size_returns_invalid_length() {
    let result = Buffer::new(0);
    assert!(matches!(result, Err(BufferError::InvalidLength)));
}

#[serial(registry)]
#[test]
fn test_new_minimal_buffer_layout() {
    let page = memcall::page_size();
    let buffer = Buffer::new(1).expect("Failed to Buffer::new(..)");

    {
        let state = buffer
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        assert_eq!(state.data.len, 1);
        assert_eq!(state.inner.len, page);
        assert_eq!(state.whole.len, 3 * page);
        assert_eq!(state.preguard.len, page);
        assert_eq!(state.postguard.len, page);

        // Page alignment of the three sectors.
        assert_eq!(state.whole.ptr as usize % page, 0);
        assert_eq!(state.inner.ptr as usize, state.whole.ptr as usize + page);
        assert_eq!(
            state.postguard.ptr as usize,
            state.whole.ptr as usize + page + state.inner.len
        );

        // Data occupies the high end of the inner region, with the
        // canary copy directly below it and the reference copy in the
        // tail of the preguard page.
        assert_eq!(
            state.data.ptr as usize,
            state.inner.ptr as usize + state.inner.len - state.data.len
        );
        assert_eq!(
            state.canary_val.ptr as usize,
            state.data.ptr as usize - CANARY_SIZE
        );
        assert_eq!(state.canary_val.len, CANARY_SIZE);
        assert_eq!(
            state.canary_ref.ptr as usize,
            state.whole.ptr as usize + page - CANARY_SIZE
        );
        assert_eq!(state.canary_ref.len, CANARY_SIZE);
    }

    buffer.destroy();
}

#[serial(registry)]
#[test]
fn test_new_inner_length_rounding_boundaries() {
    let page = memcall::page_size();

    // size + 32 exactly fills one page.
    let fits = Buffer::new(page - CANARY_SIZE).expect("Failed to Buffer::new(..)");
    {
        let state = fits.state.read().unwrap_or_else(PoisonError::into_inner);
        assert_eq!(state.inner.len, page);
        assert_eq!(state.whole.len, 3 * page);
    }
    fits.destroy();

    // One byte more spills into a second inner page.
    let spills = Buffer::new(page - CANARY_SIZE + 1).expect("Failed to Buffer::new(..)");
    {
        let state = spills.state.read().unwrap_or_else(PoisonError::into_inner);
        assert_eq!(state.inner.len, 2 * page);
        assert_eq!(state.whole.len, 4 * page);
    }
    spills.destroy();

    let page_plus_one = Buffer::new(page + 1).expect("Failed to Buffer::new(..)");
    {
        let state = page_plus_one
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        assert_eq!(state.inner.len, 2 * page);
        assert_eq!(state.whole.len, 4 * page);
    }
    page_plus_one.destroy();
}

#[serial(registry)]
#[test]
fn test_canary_copies_match_at_construction() {
    use parapet_memcall::MemoryProtection;

    let buffer = Buffer::new(8).expect("Failed to Buffer::new(..)");

    {
        let state = buffer
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        // The reference lives inside the no-access preguard page; open
        // a read window onto it for the comparison only.
        unsafe {
            memcall::protect(
                state.preguard.ptr,
                state.preguard.len,
                MemoryProtection::ReadOnly,
            )
            .expect("Failed to protect(.., ReadOnly)");
        }

        let canary_val = unsafe { state.canary_val.as_slice() };
        let canary_ref = unsafe { state.canary_ref.as_slice() };
        assert_eq!(canary_val, canary_ref);
        assert!(canary_val.iter().any(|&b| b != 0));

        unsafe {
            memcall::protect(
                state.preguard.ptr,
                state.preguard.len,
                MemoryProtection::NoAccess,
            )
            .expect("Failed to protect(.., NoAccess)");
        }
    }

    buffer.destroy();
}

#[serial(registry)]
#[test]
fn test_canaries_differ_between_buffers() {
    let first = Buffer::new(8).expect("Failed to Buffer::new(..)");
    let second = Buffer::new(8).expect("Failed to Buffer::new(..)");

    {
        let first_state = first.state.read().unwrap_or_else(PoisonError::into_inner);
        let second_state = second.state.read().unwrap_or_else(PoisonError::into_inner);

        let first_canary = unsafe { first_state.canary_val.as_slice() };
        let second_canary = unsafe { second_state.canary_val.as_slice() };
        assert_ne!(first_canary, second_canary);
    }

    first.destroy();
    second.destroy();
}

// state machine

#[serial(registry)]
#[test]
fn test_state_flags_follow_transitions() {
    let buffer = Buffer::new(32).expect("Failed to Buffer::new(..)");

    let state = buffer.state();
    assert!(state.mutable);
    assert!(!state.destroyed);

    buffer.freeze().expect("Failed to freeze()");
    let state = buffer.state();
    assert!(!state.mutable);
    assert!(!state.destroyed);

    buffer.melt().expect("Failed to melt()");
    let state = buffer.state();
    assert!(state.mutable);
    assert!(!state.destroyed);

    buffer.destroy();
    let state = buffer.state();
    assert!(!state.mutable);
    assert!(state.destroyed);
}

#[serial(registry)]
#[test]
fn test_freeze_and_melt_are_idempotent() {
    let buffer = Buffer::new(16).expect("Failed to Buffer::new(..)");

    buffer.freeze().expect("Failed to freeze()");
    buffer.freeze().expect("Failed to freeze()");
    assert!(!buffer.state().mutable);

    buffer.melt().expect("Failed to melt()");
    buffer.melt().expect("Failed to melt()");
    assert!(buffer.state().mutable);

    buffer.destroy();
}

#[serial(registry)]
#[test]
fn test_data_round_trip_survives_freeze_and_melt() {
    let buffer = Buffer::new(64).expect("Failed to Buffer::new(..)");

    buffer
        .with_bytes_mut(|bytes| {
            for (i, byte) in bytes.iter_mut().enumerate() {
                *byte = i as u8;
            }
        })
        .expect("Failed to with_bytes_mut(..)");

    buffer.freeze().expect("Failed to freeze()");
    buffer.melt().expect("Failed to melt()");

    buffer
        .with_bytes(|bytes| {
            for (i, byte) in bytes.iter().enumerate() {
                assert_eq!(*byte, i as u8);
            }
        })
        .expect("Failed to with_bytes(..)");

    buffer.destroy();
}

#[serial(registry)]
#[test]
fn test_with_bytes_mut_on_frozen_buffer_returns_immutable() {
    let buffer = Buffer::new(16).expect("Failed to Buffer::new(..)");

    buffer.freeze().expect("Failed to freeze()");

    let result = buffer.with_bytes_mut(|_| {});
    assert!(matches!(result, Err(BufferError::Immutable)));

    // Reads stay available on a frozen buffer.
    buffer
        .with_bytes(|bytes| assert_eq!(bytes.len(), 16))
        .expect("Failed to with_bytes(..)");

    buffer.destroy();
}

// destroy

#[serial(registry)]
#[test]
fn test_destroy_is_idempotent() {
    let buffer = Buffer::new(8).expect("Failed to Buffer::new(..)");

    buffer.destroy();
    buffer.destroy();
    buffer.destroy();

    let state = buffer.state();
    assert!(state.destroyed);
    assert!(!state.mutable);
}

#[serial(registry)]
#[test]
fn test_destroy_clears_every_span() {
    let buffer = Buffer::new(32).expect("Failed to Buffer::new(..)");
    buffer.destroy();

    let state = buffer.state.read().unwrap_or_else(PoisonError::into_inner);
    assert!(!state.alive);
    assert!(!state.mutable);
    assert!(state.whole.ptr.is_null() && state.whole.len == 0);
    assert!(state.preguard.ptr.is_null() && state.preguard.len == 0);
    assert!(state.inner.ptr.is_null() && state.inner.len == 0);
    assert!(state.postguard.ptr.is_null() && state.postguard.len == 0);
    assert!(state.canary_val.ptr.is_null() && state.canary_val.len == 0);
    assert!(state.canary_ref.ptr.is_null() && state.canary_ref.len == 0);
    assert!(state.data.ptr.is_null() && state.data.len == 0);
}

#[serial(registry)]
#[test]
fn test_operations_on_destroyed_buffer() {
    let buffer = Buffer::new(8).expect("Failed to Buffer::new(..)");
    buffer.destroy();

    assert!(matches!(buffer.freeze(), Err(BufferError::Destroyed)));
    assert!(matches!(buffer.melt(), Err(BufferError::Destroyed)));
    assert!(matches!(
        buffer.with_bytes(|_| {}),
        Err(BufferError::Destroyed)
    ));
    assert!(matches!(
        buffer.with_bytes_mut(|_| {}),
        Err(BufferError::Destroyed)
    ));
    assert_eq!(buffer.len(), 0);
    assert!(buffer.is_empty());
    assert!(unsafe { buffer.as_slice() }.is_empty());
}

#[cfg(target_os = "linux")]
#[serial(registry)]
#[test]
fn test_locked_memory_accounting() {
    use crate::tests::get_locked_memory_kb;

    let page = memcall::page_size();
    let before = get_locked_memory_kb();

    let buffer = Buffer::new(page).expect("Failed to Buffer::new(..)");

    let while_alive = get_locked_memory_kb();
    assert!(
        while_alive > before,
        "VmLck should increase while a buffer is alive: before={} after={}",
        before,
        while_alive
    );

    buffer.destroy();

    let after_destroy = get_locked_memory_kb();
    assert_eq!(
        before, after_destroy,
        "VmLck should return to baseline after destroy"
    );
}

// concurrency

#[serial(registry)]
#[test]
fn test_concurrent_freeze_melt_hammer() {
    use std::sync::Barrier;

    let buffer = Buffer::new(64).expect("Failed to Buffer::new(..)");
    let barrier = Barrier::new(100);

    std::thread::scope(|scope| {
        for i in 0..100 {
            let buffer = &buffer;
            let barrier = &barrier;
            scope.spawn(move || {
                barrier.wait();
                if i % 2 == 0 {
                    buffer.freeze().expect("Failed to freeze()");
                } else {
                    buffer.melt().expect("Failed to melt()");
                }
            });
        }
    });

    // Final mode belongs to whichever call acquired the lock last;
    // either way the buffer survived the hammering intact.
    let state = buffer.state();
    assert!(!state.destroyed);

    buffer.melt().expect("Failed to melt()");
    buffer
        .with_bytes_mut(|bytes| bytes[0] = 0xA5)
        .expect("Failed to with_bytes_mut(..)");

    buffer.destroy();
    assert!(buffer.state().destroyed);
}

// guard page and protection faults

/// Forks, runs `access` in the child, and asserts the child was
/// killed by SIGSEGV. A fault is the expected outcome; a child that
/// survives exits 0 and fails the assertion.
#[cfg(target_os = "linux")]
fn assert_access_faults(access: impl FnOnce()) {
    let pid = unsafe { libc::fork() };

    match pid {
        -1 => panic!("fork failed"),
        0 => {
            access();
            unsafe { libc::_exit(0) };
        }
        child_pid => {
            let mut status: libc::c_int = 0;
            unsafe { libc::waitpid(child_pid, &mut status, 0) };

            assert!(libc::WIFSIGNALED(status), "child should have faulted");
            assert_eq!(libc::WTERMSIG(status), libc::SIGSEGV);
        }
    }
}

#[cfg(target_os = "linux")]
#[serial(registry)]
#[test]
fn test_preguard_read_faults() {
    let buffer = Buffer::new(32).expect("Failed to Buffer::new(..)");

    let preguard_ptr = {
        let state = buffer.state.read().unwrap_or_else(PoisonError::into_inner);
        state.preguard.ptr
    };

    assert_access_faults(|| {
        let _ = unsafe { core::ptr::read_volatile(preguard_ptr) };
    });

    buffer.destroy();
}

#[cfg(target_os = "linux")]
#[serial(registry)]
#[test]
fn test_postguard_read_faults() {
    let buffer = Buffer::new(32).expect("Failed to Buffer::new(..)");

    let postguard_ptr = {
        let state = buffer.state.read().unwrap_or_else(PoisonError::into_inner);
        state.postguard.ptr
    };

    assert_access_faults(|| {
        let _ = unsafe { core::ptr::read_volatile(postguard_ptr) };
    });

    buffer.destroy();
}

#[cfg(target_os = "linux")]
#[serial(registry)]
#[test]
fn test_canary_reference_read_faults_while_alive() {
    let buffer = Buffer::new(32).expect("Failed to Buffer::new(..)");

    let canary_ref_ptr = {
        let state = buffer.state.read().unwrap_or_else(PoisonError::into_inner);
        state.canary_ref.ptr
    };

    assert_access_faults(|| {
        let _ = unsafe { core::ptr::read_volatile(canary_ref_ptr) };
    });

    buffer.destroy();
}

#[cfg(target_os = "linux")]
#[serial(registry)]
#[test]
fn test_write_to_frozen_data_faults() {
    let buffer = Buffer::new(32).expect("Failed to Buffer::new(..)");

    buffer
        .with_bytes_mut(|bytes| bytes[0] = 0x5A)
        .expect("Failed to with_bytes_mut(..)");
    buffer.freeze().expect("Failed to freeze()");

    let data_ptr = {
        let state = buffer.state.read().unwrap_or_else(PoisonError::into_inner);
        state.data.ptr
    };

    assert_access_faults(|| {
        unsafe { core::ptr::write_volatile(data_ptr, 0x5B) };
    });

    // Melting restores writability in the parent.
    buffer.melt().expect("Failed to melt()");
    buffer
        .with_bytes_mut(|bytes| bytes[0] = 0x5B)
        .expect("Failed to with_bytes_mut(..)");
    buffer
        .with_bytes(|bytes| assert_eq!(bytes[0], 0x5B))
        .expect("Failed to with_bytes(..)");

    buffer.destroy();
}

// canary tampering

/// Exit code for the canary-failure handler in subprocess tests.
#[cfg(target_os = "linux")]
const CANARY_EXIT_CODE: i32 = 52;

#[cfg(target_os = "linux")]
fn canary_exit_handler(message: &str) -> ! {
    if message.contains("canary") {
        std::process::exit(CANARY_EXIT_CODE);
    }
    std::process::exit(1);
}

/// Subprocess for test_canary_tamper_invokes_fatal_handler
#[cfg(target_os = "linux")]
#[test]
#[ignore]
fn subprocess_test_canary_tamper_invokes_fatal_handler() {
    crate::fatal::set_fatal_handler(canary_exit_handler);

    let buffer = Buffer::new(8).expect("Failed to Buffer::new(..)");

    // Corrupt the inline canary the way a backward overflow from the
    // data region would.
    {
        let state = buffer.state.read().unwrap_or_else(PoisonError::into_inner);
        let canary_val = unsafe { state.canary_val.as_mut_slice() };
        canary_val[0] = !canary_val[0];
    }

    buffer.destroy();

    // destroy must not return.
    std::process::exit(1);
}

#[cfg(target_os = "linux")]
#[serial(registry)]
#[test]
fn test_canary_tamper_invokes_fatal_handler() {
    let exit_code = crate::tests::run_test_as_subprocess(
        "tests::buffer::subprocess_test_canary_tamper_invokes_fatal_handler",
    );

    assert_eq!(
        exit_code,
        Some(CANARY_EXIT_CODE),
        "Expected the canary-failure handler to terminate the subprocess"
    );
}
