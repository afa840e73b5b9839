// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Boot and interrupt dispatch for the Atmel AT91SAM7 family.
//!
//! Linking this crate provides the reset vector. The board supplies two C-ABI
//! symbols: `cpu_init`, called on the temporary stack before memory is
//! initialized, and `main`, entered in supervisor mode with interrupts
//! enabled. `main` should call [`init`] before enabling any peripheral
//! interrupt.

#![no_std]

pub mod aic;
pub mod crt0;

use arm7tdmi::spurious::{irq_spurious_handler, irq_unexpected_handler};

/// Reset the interrupt controller to its boot state and return a handle to
/// it.
///
/// # Safety
///
/// Call once, from `main`, before any line is enabled.
pub unsafe fn init() -> aic::Aic {
    let aic = aic::Aic::new(aic::AIC_BASE);
    aic.init(irq_unexpected_handler, irq_spurious_handler);
    aic
}
