// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! The eight-slot exception vector table.
//!
//! The table itself is emitted by the chip's startup assembly at address
//! zero. [`VECTOR_TABLE`] describes what each slot must do so the two can be
//! checked against each other.

/// Exception sources, in vector table order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum Exception {
    Reset = 0,
    UndefinedInstruction = 1,
    SoftwareInterrupt = 2,
    PrefetchAbort = 3,
    DataAbort = 4,
    Reserved = 5,
    Irq = 6,
    Fiq = 7,
}

impl Exception {
    pub const ALL: [Exception; 8] = [
        Exception::Reset,
        Exception::UndefinedInstruction,
        Exception::SoftwareInterrupt,
        Exception::PrefetchAbort,
        Exception::DataAbort,
        Exception::Reserved,
        Exception::Irq,
        Exception::Fiq,
    ];

    /// Address of the vector slot.
    pub const fn offset(self) -> usize {
        self as usize * 4
    }

    /// Amount subtracted from the banked link register to get the address of
    /// the interrupted instruction.
    pub const fn return_adjustment(self) -> u32 {
        match self {
            Exception::Irq | Exception::Fiq => 4,
            _ => 0,
        }
    }
}

/// What a vector slot transfers control to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerKind {
    /// Branch to the reset handler.
    Boot,
    /// Branch-to-self.
    Halt,
    /// Branch to the IRQ trampoline.
    IrqTrampoline,
    /// The FIQ trampoline body starts in the slot itself.
    FiqFallThrough,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VectorSlot {
    pub exception: Exception,
    pub handler: HandlerKind,
}

pub const VECTOR_TABLE: [VectorSlot; 8] = [
    VectorSlot {
        exception: Exception::Reset,
        handler: HandlerKind::Boot,
    },
    VectorSlot {
        exception: Exception::UndefinedInstruction,
        handler: HandlerKind::Halt,
    },
    VectorSlot {
        exception: Exception::SoftwareInterrupt,
        handler: HandlerKind::Halt,
    },
    VectorSlot {
        exception: Exception::PrefetchAbort,
        handler: HandlerKind::Halt,
    },
    VectorSlot {
        exception: Exception::DataAbort,
        handler: HandlerKind::Halt,
    },
    VectorSlot {
        exception: Exception::Reserved,
        handler: HandlerKind::Halt,
    },
    VectorSlot {
        exception: Exception::Irq,
        handler: HandlerKind::IrqTrampoline,
    },
    VectorSlot {
        exception: Exception::Fiq,
        handler: HandlerKind::FiqFallThrough,
    },
];
