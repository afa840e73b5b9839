// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Generic support for ARM7TDMI (ARMv4T) cores.
//!
//! Everything here is independent of the interrupt controller and memory map,
//! which the chip crates provide. The startup assembly itself lives with the
//! chip, since it bakes in the controller's register offsets.

#![no_std]

pub mod cpsr;
pub mod dispatch;
pub mod exceptions;
pub mod spurious;
pub mod stacks;
pub mod support;

pub use spurious::spurious_interrupts;

use kernel::config::CONFIG;
use kernel::debug;

/// Terminal state entered when `main` returns.
///
/// The reset handler installs this as `main`'s return address.
#[cfg_attr(all(target_arch = "arm", target_os = "none"), export_name = "exit")]
pub extern "C" fn exit(status: i32) -> ! {
    if CONFIG.debug_halts {
        debug!("main returned {}, halting", status);
    }
    support::halt()
}
