// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Privilege-mode stack allocation.
//!
//! All stacks are carved from one descending region that ends at
//! `__stack_start__`. The IRQ stack takes the top [`IRQ_STACK_SIZE`] bytes and
//! holds nothing but the three-word frames the IRQ trampoline pushes; every
//! handler body runs on the supervisor stack directly below it. FIQ mode gets
//! no stack at all.
//!
//! ```text
//!  top (__stack_start__) +-------------------+
//!                        |  IRQ frames       |  IRQ_STACK_SIZE
//!                        +-------------------+
//!                        |  supervisor       |  grows down to the
//!                        |  (application,    |  end of the region
//!                        |   handler bodies) |
//!  bottom                +-------------------+
//! ```

use kernel::ErrorCode;

use crate::cpsr::Mode;

/// Words pushed by the IRQ trampoline per nesting level: return address,
/// saved status, r0.
pub const IRQ_SAVED_WORDS: usize = 3;

/// Distinct priority levels of the interrupt controller, and so the deepest
/// possible IRQ nesting.
pub const IRQ_NESTING_DEPTH: usize = 8;

/// Bytes reserved for the IRQ stack.
pub const IRQ_STACK_SIZE: usize = IRQ_SAVED_WORDS * IRQ_NESTING_DEPTH * 4;

/// Stacks grow down from 8-byte aligned tops.
pub const STACK_ALIGN: usize = 8;

/// One mode's stack, `[base, base + size)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackRegion {
    pub mode: Mode,
    pub base: usize,
    pub size: usize,
}

impl StackRegion {
    /// Initial stack pointer.
    pub fn top(&self) -> usize {
        self.base + self.size
    }

    /// Whether a stack pointer value lies within this stack (the empty top is
    /// included).
    pub fn contains(&self, sp: usize) -> bool {
        sp >= self.base && sp <= self.top()
    }
}

/// The stacks installed at reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackLayout {
    pub irq: StackRegion,
    pub supervisor: StackRegion,
}

impl StackLayout {
    /// Split `[bottom, top)` into an `irq_size` IRQ stack at the top and a
    /// supervisor stack taking the rest.
    ///
    /// Returns `INVAL` if the bounds are inverted or unaligned and `SIZE` if
    /// the IRQ stack would leave no room for the supervisor stack.
    pub fn partition(bottom: usize, top: usize, irq_size: usize) -> Result<StackLayout, ErrorCode> {
        if bottom > top
            || top % STACK_ALIGN != 0
            || bottom % STACK_ALIGN != 0
            || irq_size % STACK_ALIGN != 0
        {
            return Err(ErrorCode::INVAL);
        }
        if irq_size == 0 || irq_size >= top - bottom {
            return Err(ErrorCode::SIZE);
        }
        let split = top - irq_size;
        Ok(StackLayout {
            irq: StackRegion {
                mode: Mode::Irq,
                base: split,
                size: irq_size,
            },
            supervisor: StackRegion {
                mode: Mode::Supervisor,
                base: bottom,
                size: split - bottom,
            },
        })
    }

    /// The stack a mode runs on, if it has one.
    pub fn region(&self, mode: Mode) -> Option<&StackRegion> {
        match mode {
            Mode::Irq => Some(&self.irq),
            Mode::Supervisor => Some(&self.supervisor),
            _ => None,
        }
    }

    /// Top of the whole stack region.
    pub fn top(&self) -> usize {
        self.irq.top()
    }
}
