// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Current/saved program status register (CPSR/SPSR).
//!
//! The low byte is the control field: processor mode, Thumb state and the two
//! interrupt disable bits. Mode switches in this tree always write the whole
//! control field at once (`msr cpsr_c, #imm`), so the constants produced by
//! [`Mode::control`] are what the assembly in the chip crates uses.

use kernel::utilities::registers::{register_bitfields, LocalRegisterCopy};

register_bitfields![u32,
    pub CPSR [
        /// Negative condition flag
        N OFFSET(31) NUMBITS(1) [],
        /// Zero condition flag
        Z OFFSET(30) NUMBITS(1) [],
        /// Carry condition flag
        C OFFSET(29) NUMBITS(1) [],
        /// Overflow condition flag
        V OFFSET(28) NUMBITS(1) [],
        /// IRQ disable
        I OFFSET(7) NUMBITS(1) [],
        /// FIQ disable
        F OFFSET(6) NUMBITS(1) [],
        /// Thumb state
        T OFFSET(5) NUMBITS(1) [],
        /// Processor mode
        MODE OFFSET(0) NUMBITS(5) [
            User = 0b10000,
            Fiq = 0b10001,
            Irq = 0b10010,
            Supervisor = 0b10011,
            Abort = 0b10111,
            Undefined = 0b11011,
            System = 0b11111
        ]
    ]
];

/// A copy of a program status register.
pub type ProgramStatus = LocalRegisterCopy<u32, CPSR::Register>;

/// IRQ disable bit.
pub const I_BIT: u32 = 1 << 7;
/// FIQ disable bit.
pub const F_BIT: u32 = 1 << 6;

/// Processor modes of the ARMv4T architecture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Mode {
    User = 0b10000,
    Fiq = 0b10001,
    Irq = 0b10010,
    Supervisor = 0b10011,
    Abort = 0b10111,
    Undefined = 0b11011,
    System = 0b11111,
}

impl Mode {
    pub const fn bits(self) -> u32 {
        self as u32
    }

    pub fn from_bits(bits: u32) -> Option<Mode> {
        match bits & 0x1f {
            0b10000 => Some(Mode::User),
            0b10001 => Some(Mode::Fiq),
            0b10010 => Some(Mode::Irq),
            0b10011 => Some(Mode::Supervisor),
            0b10111 => Some(Mode::Abort),
            0b11011 => Some(Mode::Undefined),
            0b11111 => Some(Mode::System),
            _ => None,
        }
    }

    /// Control field selecting this mode in ARM state with the given
    /// interrupt classes masked.
    pub const fn control(self, irq_masked: bool, fiq_masked: bool) -> u32 {
        let mut bits = self.bits();
        if irq_masked {
            bits |= I_BIT;
        }
        if fiq_masked {
            bits |= F_BIT;
        }
        bits
    }
}

/// Mode recorded in a status register copy.
pub fn mode_of(status: &ProgramStatus) -> Option<Mode> {
    Mode::from_bits(status.read(CPSR::MODE))
}
