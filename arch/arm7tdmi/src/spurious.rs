// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Catch-all vectors installed in the interrupt controller.
//!
//! A spurious interrupt is an IRQ that is gone again by the time the
//! trampoline reads the vector register, e.g. a level-sensitive source that
//! deasserted or was masked in the meantime. The controller answers with its
//! spurious vector. These are counted rather than treated as errors; the
//! trampoline still completes the full acknowledge/end-of-interrupt protocol
//! around them.
//!
//! The unexpected vector is installed for every line that has no driver. It
//! firing means a line was enabled without a handler, which is a bug.

use kernel::utilities::masked_cell::MaskedCell;

use crate::support;

/// Count of spurious interrupts since reset.
pub struct SpuriousCounter {
    count: MaskedCell<usize>,
}

impl SpuriousCounter {
    pub const fn new() -> SpuriousCounter {
        SpuriousCounter {
            count: MaskedCell::new(0),
        }
    }

    /// Add one.
    ///
    /// # Safety
    ///
    /// IRQ and FIQ must be masked, or the counter must not be reachable from
    /// interrupt context.
    pub unsafe fn record(&self) {
        self.count.map(|count| *count = count.wrapping_add(1));
    }

    /// Current value.
    ///
    /// # Safety
    ///
    /// See [`SpuriousCounter::record`].
    pub unsafe fn count(&self) -> usize {
        self.count.get()
    }
}

/// Lives in `.bss`, so it reads zero until the first spurious interrupt.
pub static SPURIOUS_INTERRUPTS: SpuriousCounter = SpuriousCounter::new();

/// Vector returned by the controller when nothing is pending at acknowledge.
///
/// Runs in supervisor mode with interrupts enabled, called from the IRQ
/// trampoline.
#[cfg_attr(
    all(target_arch = "arm", target_os = "none"),
    export_name = "_irq_spurious_handler"
)]
pub extern "C" fn irq_spurious_handler() {
    // SAFETY: the increment runs with both interrupt classes masked.
    unsafe {
        support::atomic(|| SPURIOUS_INTERRUPTS.record());
    }
}

/// Vector for lines without a driver.
#[cfg_attr(
    all(target_arch = "arm", target_os = "none"),
    export_name = "_irq_unexpected_handler"
)]
pub extern "C" fn irq_unexpected_handler() {
    support::halt()
}

/// Number of spurious interrupts seen since reset.
pub fn spurious_interrupts() -> usize {
    // SAFETY: the read runs with both interrupt classes masked.
    unsafe { support::atomic(|| SPURIOUS_INTERRUPTS.count()) }
}
