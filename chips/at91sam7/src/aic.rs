// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Advanced Interrupt Controller (AIC)
//!
//! The AIC multiplexes 32 interrupt lines onto the core's nFIQ and nIRQ
//! inputs. Line 0 is the fast source and drives nFIQ; lines 1 to 31 are
//! standard sources with a 3-bit priority each and drive nIRQ.
//!
//! Reading IVR acknowledges the highest priority pending source: its level is
//! pushed onto an internal eight-deep priority stack and nIRQ is only
//! reasserted for sources of strictly higher priority. Writing EOICR pops
//! that stack. The IRQ trampoline in [`crate::crt0`] does both; drivers only
//! register vectors through [`Aic::configure`].
//!
//! In protect mode (DCR.PROT) the IVR read has no side effect until IVR is
//! written back, so a debugger can display IVR without acknowledging
//! anything. The trampoline always writes it back.

use kernel::config::CONFIG;
use kernel::platform::interrupt::{InterruptController, Priority};
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{
    register_bitfields, register_structs, ReadOnly, ReadWrite, WriteOnly,
};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

register_structs! {
    /// AIC registers.
    pub AicRegisters {
        /// Source Mode Registers
        (0x000 => smr: [ReadWrite<u32, SMR::Register>; 32]),
        /// Source Vector Registers
        (0x080 => svr: [ReadWrite<u32>; 32]),
        /// Interrupt Vector Register
        (0x100 => ivr: ReadWrite<u32>),
        /// FIQ Vector Register
        (0x104 => fvr: ReadOnly<u32>),
        /// Interrupt Status Register
        (0x108 => isr: ReadOnly<u32, ISR::Register>),
        /// Interrupt Pending Register
        (0x10C => ipr: ReadOnly<u32>),
        /// Interrupt Mask Register
        (0x110 => imr: ReadOnly<u32>),
        /// Core Interrupt Status Register
        (0x114 => cisr: ReadOnly<u32, CISR::Register>),
        (0x118 => _reserved0),
        /// Interrupt Enable Command Register
        (0x120 => iecr: WriteOnly<u32>),
        /// Interrupt Disable Command Register
        (0x124 => idcr: WriteOnly<u32>),
        /// Interrupt Clear Command Register
        (0x128 => iccr: WriteOnly<u32>),
        /// Interrupt Set Command Register
        (0x12C => iscr: WriteOnly<u32>),
        /// End of Interrupt Command Register
        (0x130 => eoicr: WriteOnly<u32>),
        /// Spurious Interrupt Vector Register
        (0x134 => spu: ReadWrite<u32>),
        /// Debug Control Register
        (0x138 => dcr: ReadWrite<u32, DCR::Register>),
        (0x13C => _reserved1),
        /// Fast Forcing Enable Register
        (0x140 => ffer: WriteOnly<u32>),
        /// Fast Forcing Disable Register
        (0x144 => ffdr: WriteOnly<u32>),
        /// Fast Forcing Status Register
        (0x148 => ffsr: ReadOnly<u32>),
        (0x14C => @END),
    }
}

register_bitfields![u32,
    SMR [
        /// Interrupt source type. For internal sources both level settings
        /// mean high level and both edge settings mean rising edge.
        SRCTYPE OFFSET(5) NUMBITS(2) [
            LowLevel = 0,
            NegativeEdge = 1,
            HighLevel = 2,
            PositiveEdge = 3
        ],
        /// Priority level
        PRIOR OFFSET(0) NUMBITS(3) []
    ],
    ISR [
        /// Current interrupt identifier
        IRQID OFFSET(0) NUMBITS(5) []
    ],
    CISR [
        NIRQ OFFSET(1) NUMBITS(1) [],
        NFIQ OFFSET(0) NUMBITS(1) []
    ],
    DCR [
        /// General mask
        GMSK OFFSET(1) NUMBITS(1) [],
        /// Protection mode
        PROT OFFSET(0) NUMBITS(1) []
    ]
];

pub const AIC_BASE_ADDRESS: usize = 0xFFFF_F000;

pub const AIC_BASE: StaticRef<AicRegisters> =
    unsafe { StaticRef::new(AIC_BASE_ADDRESS as *const AicRegisters) };

/// Register offsets used directly by the trampolines.
pub const IVR_OFFSET: usize = 0x100;
pub const FVR_OFFSET: usize = 0x104;
pub const EOICR_OFFSET: usize = 0x130;

/// Number of interrupt lines.
pub const NUM_LINES: usize = 32;

/// The fast source. Its vector is FVR, its priority is irrelevant.
pub const FIQ_LINE: usize = 0;

pub const MAX_PRIORITY: Priority = 7;

/// Depth of the controller's priority stack.
const PRIORITY_LEVELS: usize = 8;

/// Source type, see SMR.SRCTYPE.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    LowLevel,
    NegativeEdge,
    HighLevel,
    PositiveEdge,
}

impl Trigger {
    fn srctype(self) -> kernel::utilities::registers::FieldValue<u32, SMR::Register> {
        match self {
            Trigger::LowLevel => SMR::SRCTYPE::LowLevel,
            Trigger::NegativeEdge => SMR::SRCTYPE::NegativeEdge,
            Trigger::HighLevel => SMR::SRCTYPE::HighLevel,
            Trigger::PositiveEdge => SMR::SRCTYPE::PositiveEdge,
        }
    }
}

/// An interrupt vector as stored in SVR/SPU.
pub type Vector = extern "C" fn();

fn vector_address(vector: Vector) -> u32 {
    vector as usize as u32
}

fn line_mask(line: usize) -> Result<u32, ErrorCode> {
    if line >= NUM_LINES {
        return Err(ErrorCode::INVAL);
    }
    Ok(1 << line)
}

pub struct Aic {
    registers: StaticRef<AicRegisters>,
}

impl Aic {
    pub const fn new(registers: StaticRef<AicRegisters>) -> Aic {
        Aic { registers }
    }

    /// Put the controller in a known state.
    ///
    /// Disables and clears every line, points every source vector at
    /// `unexpected`, installs `spurious`, and unwinds whatever the priority
    /// stack holds from before the reset. Protect mode follows
    /// `CONFIG.interrupt_protect_mode`.
    pub fn init(&self, unexpected: Vector, spurious: Vector) {
        let regs = &*self.registers;

        regs.idcr.set(!0);
        regs.iccr.set(!0);
        regs.ffdr.set(!0);

        for svr in regs.svr.iter() {
            svr.set(vector_address(unexpected));
        }
        regs.spu.set(vector_address(spurious));

        for _ in 0..PRIORITY_LEVELS {
            regs.eoicr.set(0);
        }

        if CONFIG.interrupt_protect_mode {
            regs.dcr.modify(DCR::PROT::SET);
        } else {
            regs.dcr.modify(DCR::PROT::CLEAR);
        }
    }

    /// Register `handler` for a standard source. The line is left disabled
    /// with nothing pending; call [`Aic::enable`] afterwards.
    pub fn configure(
        &self,
        line: usize,
        priority: Priority,
        trigger: Trigger,
        handler: Vector,
    ) -> Result<(), ErrorCode> {
        let mask = line_mask(line)?;
        if priority > MAX_PRIORITY {
            return Err(ErrorCode::INVAL);
        }
        if line == FIQ_LINE {
            return Err(ErrorCode::NOSUPPORT);
        }

        let regs = &*self.registers;
        regs.idcr.set(mask);
        regs.svr[line].set(vector_address(handler));
        regs.smr[line].write(trigger.srctype() + SMR::PRIOR.val(priority as u32));
        regs.iccr.set(mask);
        Ok(())
    }

    /// Register the fast source's handler. FVR returns it directly.
    pub fn configure_fast(&self, trigger: Trigger, handler: Vector) {
        let regs = &*self.registers;
        regs.idcr.set(1 << FIQ_LINE);
        regs.svr[FIQ_LINE].set(vector_address(handler));
        regs.smr[FIQ_LINE].write(trigger.srctype());
        regs.iccr.set(1 << FIQ_LINE);
    }

    pub fn enable(&self, line: usize) -> Result<(), ErrorCode> {
        self.registers.iecr.set(line_mask(line)?);
        Ok(())
    }

    pub fn disable(&self, line: usize) -> Result<(), ErrorCode> {
        self.registers.idcr.set(line_mask(line)?);
        Ok(())
    }

    /// Clear a pending edge-triggered source.
    pub fn clear_pending(&self, line: usize) -> Result<(), ErrorCode> {
        self.registers.iccr.set(line_mask(line)?);
        Ok(())
    }

    /// Raise an edge-triggered source from software.
    pub fn trigger(&self, line: usize) -> Result<(), ErrorCode> {
        self.registers.iscr.set(line_mask(line)?);
        Ok(())
    }

    /// Route a standard source to nFIQ instead of nIRQ (fast forcing).
    pub fn set_fast_forcing(&self, line: usize, forced: bool) -> Result<(), ErrorCode> {
        let mask = line_mask(line)?;
        if line == FIQ_LINE {
            return Err(ErrorCode::NOSUPPORT);
        }
        if forced {
            self.registers.ffer.set(mask);
        } else {
            self.registers.ffdr.set(mask);
        }
        Ok(())
    }

    pub fn is_fast_forced(&self, line: usize) -> bool {
        line < NUM_LINES && self.registers.ffsr.get() & (1 << line) != 0
    }

    pub fn is_pending(&self, line: usize) -> bool {
        line < NUM_LINES && self.registers.ipr.get() & (1 << line) != 0
    }

    pub fn is_enabled(&self, line: usize) -> bool {
        line < NUM_LINES && self.registers.imr.get() & (1 << line) != 0
    }
}

impl InterruptController for Aic {
    type Vector = usize;

    fn base_address(&self) -> usize {
        &*self.registers as *const AicRegisters as usize
    }

    fn fiq_asserted(&self) -> bool {
        self.registers.cisr.is_set(CISR::NFIQ)
    }

    fn irq_asserted(&self) -> bool {
        self.registers.cisr.is_set(CISR::NIRQ)
    }

    fn fast_vector(&self) -> usize {
        self.registers.fvr.get() as usize
    }

    fn acknowledge(&self) -> usize {
        self.registers.ivr.get() as usize
    }

    fn rearm(&self) {
        // Any value will do; the trampoline writes the base it holds.
        self.registers.ivr.set(self.base_address() as u32);
    }

    fn current_priority(&self) -> Priority {
        let line = self.registers.isr.read(ISR::IRQID) as usize;
        self.registers.smr[line].read(SMR::PRIOR) as Priority
    }

    fn end_of_interrupt(&self) {
        self.registers.eoicr.set(0);
    }
}
