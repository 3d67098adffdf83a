// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! parapet-util - Constant-time byte primitives.
//!
//! The comparison and copy here never branch on byte values, so their
//! timing reveals nothing about the data they touch. Length mismatches
//! short-circuit; lengths are not secret.

#![warn(missing_docs)]

use zeroize::Zeroize;

/// Compares two byte slices in constant time.
///
/// Returns `false` immediately on length mismatch. The byte loop runs
/// to completion regardless of where the slices differ.
#[inline]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Copies `min(dst.len(), src.len())` bytes from `src` into `dst`.
///
/// The two slices must not overlap; callers hand in disjoint regions.
#[inline]
pub fn constant_time_copy(dst: &mut [u8], src: &[u8]) {
    let n = core::cmp::min(dst.len(), src.len());
    dst[..n].copy_from_slice(&src[..n]);
}

/// Overwrites every byte of `slice` with zero.
///
/// Delegates to `zeroize`, whose write is ordered so the compiler may
/// not elide it even when the slice is about to be released.
#[inline]
pub fn wipe(slice: &mut [u8]) {
    slice.zeroize();
}
