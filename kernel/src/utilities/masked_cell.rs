// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Process-wide state shared with interrupt context.
//!
//! There are no threads. The only concurrency is preemption by an interrupt
//! handler, and the only state shared with interrupt context is a handful of
//! counters and caches, kept in a `MaskedCell` under one access rule:
//!
//! **Every access happens while the interrupt classes that can also touch
//! the cell are masked.** Under that rule a plain read-modify-write cannot be
//! torn by preemption, so no atomic instructions are needed (ARMv4T has none
//! beyond `swp`).
//!
//! The rule cannot be checked by the compiler, so every accessor is `unsafe`
//! and callers state in a `SAFETY` comment which mask they hold.

use core::cell::UnsafeCell;

/// A value with a single-writer-while-masked access rule.
pub struct MaskedCell<T> {
    value: UnsafeCell<T>,
}

// The access rule above provides the exclusion `Sync` requires.
unsafe impl<T> Sync for MaskedCell<T> {}

impl<T> MaskedCell<T> {
    pub const fn new(value: T) -> MaskedCell<T> {
        MaskedCell {
            value: UnsafeCell::new(value),
        }
    }

    /// Run `f` with exclusive access to the contents.
    ///
    /// # Safety
    ///
    /// Every interrupt class that accesses this cell must be masked for the
    /// duration of `f`, and `f` must not re-enter `map` on the same cell.
    pub unsafe fn map<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        f(&mut *self.value.get())
    }
}

impl<T: Copy> MaskedCell<T> {
    /// Copy the contents out.
    ///
    /// # Safety
    ///
    /// See [`MaskedCell::map`].
    pub unsafe fn get(&self) -> T {
        core::ptr::read_volatile(self.value.get())
    }

    /// Replace the contents.
    ///
    /// # Safety
    ///
    /// See [`MaskedCell::map`].
    pub unsafe fn set(&self, value: T) {
        core::ptr::write_volatile(self.value.get(), value);
    }
}
