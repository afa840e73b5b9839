// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Helper functions for the ARM7TDMI core.
//!
//! ARMv4T has no `cps` instruction; masking is done by rewriting the control
//! field of the CPSR. This code must be built in ARM state.

/// NOP instruction
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn nop() {
    use core::arch::asm;
    unsafe {
        asm!("nop", options(nomem, nostack, preserves_flags));
    }
}

/// Run `f` with IRQ and FIQ masked, then restore the previous masks.
///
/// May be nested, and called from handler context.
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
pub unsafe fn atomic<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    use core::arch::asm;
    let saved: u32;
    asm!(
        "mrs {saved}, cpsr",
        "orr {masked}, {saved}, #0xc0",
        "msr cpsr_c, {masked}",
        saved = out(reg) saved,
        masked = out(reg) _,
        options(nomem, nostack, preserves_flags),
    );

    let res = f();

    asm!(
        "msr cpsr_c, {saved}",
        saved = in(reg) saved,
        options(nomem, nostack, preserves_flags),
    );
    res
}

/// NOP instruction (mock)
// Mock implementations for tests on the host.
#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub fn nop() {
    unimplemented!()
}

/// Atomic operation (mock)
///
/// A host build takes no interrupts, so `f` just runs.
#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub unsafe fn atomic<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    f()
}

/// Stop here forever.
///
/// Unrecoverable conditions end here, with the faulting state intact.
pub fn halt() -> ! {
    loop {
        // This is required to avoid the empty loop clippy
        // warning #[warn(clippy::empty_loop)]
        nop();
    }
}
