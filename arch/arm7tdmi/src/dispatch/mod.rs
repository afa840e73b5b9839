// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Executable model of the FIQ and IRQ trampolines.
//!
//! [`Core`] mirrors the parts of an ARM7TDMI the trampolines touch: the CPSR,
//! the banked stack pointers, link registers and saved status registers of
//! supervisor, IRQ and FIQ mode, the FIQ-banked r8/r9, the caller-saved
//! registers and the stack memory. The trampolines run on it step for step
//! against any [`InterruptController`], so the nesting and preservation
//! properties of the startup assembly can be checked on the host. Each step
//! is labelled with the instruction it stands for; the two must stay in sync.
//!
//! Handlers are plain functions taking the core. A handler runs in
//! supervisor mode and may call [`Core::poll`] at any point, which is where
//! the model lets pending interrupts preempt it.

use kernel::config::CONFIG;
use kernel::debug;
use kernel::platform::interrupt::{InterruptController, Priority};
use kernel::utilities::registers::FieldValue;
use kernel::ErrorCode;

use crate::cpsr::{mode_of, Mode, ProgramStatus, CPSR};
use crate::exceptions::Exception;
use crate::spurious::SpuriousCounter;
use crate::stacks::StackLayout;

#[cfg(test)]
mod emulated;

/// A vector: the handler the controller hands out for a source.
pub type Handler<C> = fn(&mut Core<C>);

/// Words of stack memory backing the model, counted down from the top of the
/// stack region.
pub const MODEL_STACK_WORDS: usize = 256;

/// Why the model stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// A push left the mode's stack.
    StackOverflow(Mode),
    /// A pop left the mode's stack.
    StackUnderflow(Mode),
    /// Stack access in a mode without a stack.
    NoStack(Mode),
    /// FIQ taken before r8 was loaded with the controller base.
    ControllerNotMapped,
    /// The controller returned the vector for lines without a driver.
    UnexpectedInterrupt,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchState {
    /// Application code, no handler active.
    Idle,
    /// Inside the FIQ handler.
    FastActive,
    /// Inside the IRQ handler for a source of this priority.
    StandardActive(Priority),
    Halted(Fault),
}

/// Registers the AAPCS lets a called function clobber, minus `lr`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Scratch {
    pub r0: u32,
    pub r1: u32,
    pub r2: u32,
    pub r3: u32,
    pub r12: u32,
}

/// Banked registers of a mode that owns a stack.
#[derive(Clone, Copy, Debug)]
pub struct ModeContext {
    pub sp: u32,
    pub lr: u32,
    pub spsr: ProgramStatus,
}

/// Banked registers of FIQ mode. Its sp is never used.
#[derive(Clone, Copy, Debug)]
pub struct FiqContext {
    /// Controller base, loaded once at reset.
    pub r8: u32,
    /// Holds the interrupted r0 while the fast handler runs.
    pub r9: u32,
    pub lr: u32,
    pub spsr: ProgramStatus,
}

impl ModeContext {
    const fn reset() -> ModeContext {
        ModeContext {
            sp: 0,
            lr: 0,
            spsr: ProgramStatus::new(0),
        }
    }
}

pub struct Core<C> {
    controller: C,
    cpsr: ProgramStatus,
    pc: u32,
    /// Caller-saved registers, shared by all modes.
    pub scratch: Scratch,
    supervisor: ModeContext,
    irq: ModeContext,
    fiq: FiqContext,
    layout: StackLayout,
    memory_base: usize,
    memory: [u32; MODEL_STACK_WORDS],
    irq_low_water: usize,
    state: DispatchState,
    spurious: SpuriousCounter,
}

impl<C: InterruptController<Vector = Handler<C>>> Core<C> {
    /// A core fresh out of reset: supervisor mode, both interrupt classes
    /// masked, no stacks installed.
    ///
    /// Returns `SIZE` if the supervisor stack reaches below the memory the
    /// model backs.
    pub fn new(controller: C, layout: StackLayout) -> Result<Core<C>, ErrorCode> {
        u32::try_from(layout.top()).map_err(|_| ErrorCode::SIZE)?;
        let memory_base = layout
            .top()
            .checked_sub(MODEL_STACK_WORDS * 4)
            .ok_or(ErrorCode::SIZE)?;
        if layout.supervisor.base < memory_base {
            return Err(ErrorCode::SIZE);
        }

        Ok(Core {
            controller,
            cpsr: ProgramStatus::new(Mode::Supervisor.control(true, true)),
            pc: Exception::Reset.offset() as u32,
            scratch: Scratch::default(),
            supervisor: ModeContext::reset(),
            irq: ModeContext::reset(),
            fiq: FiqContext {
                r8: 0,
                r9: 0,
                lr: 0,
                spsr: ProgramStatus::new(0),
            },
            layout,
            memory_base,
            memory: [0; MODEL_STACK_WORDS],
            irq_low_water: layout.irq.top(),
            state: DispatchState::Idle,
            spurious: SpuriousCounter::new(),
        })
    }

    /// Run the stack allocator part of the reset handler and jump to `entry`.
    ///
    /// Memory initialization has no counterpart here; see `rt0`.
    pub fn boot(&mut self, entry: u32) {
        if let Err(fault) = self.install_stacks() {
            self.halt(fault);
            return;
        }
        self.pc = entry;
    }

    fn install_stacks(&mut self) -> Result<(), Fault> {
        // FIQ: no stack, r8 points at the controller.
        self.set_control(Mode::Fiq, true, true);
        self.fiq.r8 = self.controller.base_address() as u32;

        self.set_control(Mode::Irq, true, true);
        self.write_sp(self.layout.irq.top() as u32)?;

        self.set_control(Mode::Supervisor, true, true);
        self.write_sp(self.layout.supervisor.top() as u32)?;

        // Interrupts are unmasked only once every stack is in place.
        self.set_control(Mode::Supervisor, false, false);
        Ok(())
    }

    /// Let the core take whatever interrupts are asserted and unmasked.
    ///
    /// FIQ wins over IRQ. Returns once neither line is taken.
    pub fn poll(&mut self) {
        while !self.halted() {
            if !self.cpsr.is_set(CPSR::F) && self.controller.fiq_asserted() {
                self.take_fiq();
            } else if !self.cpsr.is_set(CPSR::I) && self.controller.irq_asserted() {
                self.take_irq();
            } else {
                break;
            }
        }
    }

    /// Take an FIQ now, regardless of masks.
    pub fn take_fiq(&mut self) {
        if self.halted() {
            return;
        }
        self.enter_fiq();
        if let Err(fault) = self.fiq_trampoline() {
            self.halt(fault);
        }
    }

    /// Take an IRQ now, regardless of masks.
    pub fn take_irq(&mut self) {
        if self.halted() {
            return;
        }
        self.enter_irq();
        if let Err(fault) = self.irq_trampoline() {
            self.halt(fault);
        }
    }

    /// Stop the model. The first fault is kept.
    pub fn halt(&mut self, fault: Fault) {
        if self.halted() {
            return;
        }
        if CONFIG.debug_halts {
            debug!("dispatch halted: {:?} at {:#010x}", fault, self.pc);
        }
        self.state = DispatchState::Halted(fault);
    }

    pub fn halted(&self) -> bool {
        matches!(self.state, DispatchState::Halted(_))
    }

    // Hardware exception entry.

    fn enter_fiq(&mut self) {
        self.fiq.lr = self.pc.wrapping_add(Exception::Fiq.return_adjustment());
        self.fiq.spsr = self.cpsr;
        self.set_control(Mode::Fiq, true, true);
        self.pc = Exception::Fiq.offset() as u32;
    }

    fn enter_irq(&mut self) {
        let fiq_masked = self.cpsr.is_set(CPSR::F);
        self.irq.lr = self.pc.wrapping_add(Exception::Irq.return_adjustment());
        self.irq.spsr = self.cpsr;
        self.set_control(Mode::Irq, true, fiq_masked);
        self.pc = Exception::Irq.offset() as u32;
    }

    fn fiq_trampoline(&mut self) -> Result<(), Fault> {
        if self.fiq.r8 as usize != self.controller.base_address() {
            return Err(Fault::ControllerNotMapped);
        }
        let previous = self.state;
        self.state = DispatchState::FastActive;

        // mov r9, r0
        self.fiq.r9 = self.scratch.r0;
        // ldr r0, [r8, #FVR]
        let handler = self.controller.fast_vector();
        if CONFIG.trace_dispatch {
            debug!("fiq: enter from {:#010x}", self.fiq.lr);
        }

        // msr cpsr_c, #(SVC | I | F)
        self.set_control(Mode::Supervisor, true, true);
        // stmfd sp!, {r1-r3, r12, lr}
        self.save_scratch()?;
        // mov lr, pc; bx r0
        self.invoke(handler)?;
        // ldmfd sp!, {r1-r3, r12, lr}
        self.restore_scratch()?;

        // msr cpsr_c, #(FIQ | I | F)
        self.set_control(Mode::Fiq, true, true);
        // mov r0, r9
        self.scratch.r0 = self.fiq.r9;

        self.state = previous;
        // subs pc, lr, #4
        self.pc = self.fiq.lr.wrapping_sub(Exception::Fiq.return_adjustment());
        self.cpsr = self.fiq.spsr;
        Ok(())
    }

    fn irq_trampoline(&mut self) -> Result<(), Fault> {
        let previous = self.state;

        // sub lr, lr, #4; stmfd sp!, {lr}
        self.push(self.irq.lr.wrapping_sub(Exception::Irq.return_adjustment()))?;
        // mrs lr, spsr; stmfd sp!, {lr}
        self.push(self.irq.spsr.get())?;
        // stmfd sp!, {r0}
        self.push(self.scratch.r0)?;

        // ldr r0, [lr, #IVR]
        let handler = self.controller.acknowledge();
        let level = self.controller.current_priority();
        // str lr, [lr, #IVR]
        self.controller.rearm();
        self.state = DispatchState::StandardActive(level);
        if CONFIG.trace_dispatch {
            debug!("irq: level {} acknowledged", level);
        }

        // msr cpsr_c, #SVC
        self.set_control(Mode::Supervisor, false, false);
        self.save_scratch()?;
        self.invoke(handler)?;
        self.restore_scratch()?;

        // msr cpsr_c, #(IRQ | I)
        self.set_control(Mode::Irq, true, false);
        // str lr, [lr, #EOICR]
        self.controller.end_of_interrupt();
        if CONFIG.trace_dispatch {
            debug!("irq: level {} done", level);
        }

        // ldmfd sp!, {r0}
        self.scratch.r0 = self.pop()?;
        // ldmfd sp!, {lr}; msr spsr_cxsf, lr
        let status = self.pop()?;
        self.irq.spsr.set(status);
        // ldmfd sp!, {pc}^
        let ret = self.pop()?;
        self.state = previous;
        self.pc = ret;
        self.cpsr = self.irq.spsr;
        Ok(())
    }

    fn invoke(&mut self, handler: Handler<C>) -> Result<(), Fault> {
        self.scratch.r0 = handler as usize as u32;
        let link = self.pc;
        self.supervisor.lr = link;
        self.pc = self.scratch.r0;

        handler(self);

        if let DispatchState::Halted(fault) = self.state {
            return Err(fault);
        }
        self.pc = link;
        Ok(())
    }

    fn save_scratch(&mut self) -> Result<(), Fault> {
        let Scratch { r1, r2, r3, r12, .. } = self.scratch;
        // Highest register at the highest address.
        for word in [self.supervisor.lr, r12, r3, r2, r1] {
            self.push(word)?;
        }
        Ok(())
    }

    fn restore_scratch(&mut self) -> Result<(), Fault> {
        self.scratch.r1 = self.pop()?;
        self.scratch.r2 = self.pop()?;
        self.scratch.r3 = self.pop()?;
        self.scratch.r12 = self.pop()?;
        self.supervisor.lr = self.pop()?;
        Ok(())
    }

    // Registers and memory.

    /// `msr cpsr_c, #imm`: the condition flags are left alone.
    fn set_control(&mut self, mode: Mode, irq_masked: bool, fiq_masked: bool) {
        let flags = self.cpsr.get() & !0xff;
        self.cpsr.set(flags | mode.control(irq_masked, fiq_masked));
    }

    /// Current processor mode.
    pub fn mode(&self) -> Mode {
        // The control field is only ever written with valid modes.
        mode_of(&self.cpsr).unwrap_or(Mode::User)
    }

    fn banked_sp(&mut self, mode: Mode) -> Result<&mut u32, Fault> {
        match mode {
            Mode::Irq => Ok(&mut self.irq.sp),
            Mode::Supervisor => Ok(&mut self.supervisor.sp),
            other => Err(Fault::NoStack(other)),
        }
    }

    fn write_sp(&mut self, value: u32) -> Result<(), Fault> {
        let mode = self.mode();
        *self.banked_sp(mode)? = value;
        Ok(())
    }

    fn push(&mut self, value: u32) -> Result<(), Fault> {
        let mode = self.mode();
        let region = *self.layout.region(mode).ok_or(Fault::NoStack(mode))?;
        let next = self.banked_sp(mode)?.wrapping_sub(4) as usize;
        if next < region.base || next >= region.top() {
            return Err(Fault::StackOverflow(mode));
        }
        self.memory[(next - self.memory_base) / 4] = value;
        *self.banked_sp(mode)? = next as u32;
        if mode == Mode::Irq {
            self.irq_low_water = self.irq_low_water.min(next);
        }
        Ok(())
    }

    fn pop(&mut self) -> Result<u32, Fault> {
        let mode = self.mode();
        let region = *self.layout.region(mode).ok_or(Fault::NoStack(mode))?;
        let sp = *self.banked_sp(mode)? as usize;
        if sp < region.base || sp + 4 > region.top() {
            return Err(Fault::StackUnderflow(mode));
        }
        let value = self.memory[(sp - self.memory_base) / 4];
        *self.banked_sp(mode)? = (sp + 4) as u32;
        Ok(value)
    }

    fn read_word(&self, address: usize) -> Option<u32> {
        let index = address.checked_sub(self.memory_base)? / 4;
        self.memory.get(index).copied()
    }

    // Inspection.

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn status(&self) -> ProgramStatus {
        self.cpsr
    }

    /// Set or clear condition flags, as an ALU instruction would. The
    /// control field is kept.
    pub fn set_condition_flags(&mut self, flags: FieldValue<u32, CPSR::Register>) {
        let control = self.cpsr.get() & 0xff;
        self.cpsr.modify(flags);
        self.cpsr.set((self.cpsr.get() & !0xff) | control);
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }

    pub fn supervisor_lr(&self) -> u32 {
        self.supervisor.lr
    }

    pub fn set_supervisor_lr(&mut self, lr: u32) {
        self.supervisor.lr = lr;
    }

    pub fn fiq(&self) -> &FiqContext {
        &self.fiq
    }

    pub fn layout(&self) -> &StackLayout {
        &self.layout
    }

    /// Banked stack pointer of `mode`, if it has one.
    pub fn stack_pointer(&self, mode: Mode) -> Option<u32> {
        match mode {
            Mode::Irq => Some(self.irq.sp),
            Mode::Supervisor => Some(self.supervisor.sp),
            _ => None,
        }
    }

    /// Deepest IRQ stack use since reset, in bytes.
    pub fn irq_stack_used(&self) -> usize {
        self.layout.irq.top() - self.irq_low_water
    }

    /// Status register of the code the innermost IRQ preempted, read from
    /// that IRQ's frame.
    pub fn interrupted_status(&self) -> Option<ProgramStatus> {
        match self.state {
            DispatchState::StandardActive(_) => {
                self.read_word(self.irq.sp as usize + 4).map(ProgramStatus::new)
            }
            _ => None,
        }
    }

    pub fn spurious_interrupts(&self) -> usize {
        // SAFETY: the counter is owned by this core and only reachable
        // through `&self`/`&mut self`.
        unsafe { self.spurious.count() }
    }

    // Vectors a controller installs for spurious and undriven sources.

    /// Count one spurious interrupt with both interrupt classes masked.
    pub fn spurious_handler(core: &mut Self) {
        let saved = core.cpsr;
        let mode = core.mode();
        core.set_control(mode, true, true);
        // SAFETY: `core` is borrowed mutably, nothing else reaches the
        // counter.
        unsafe { core.spurious.record() };
        core.cpsr.set((core.cpsr.get() & !0xff) | (saved.get() & 0xff));
    }

    pub fn unexpected_handler(core: &mut Self) {
        core.halt(Fault::UnexpectedInterrupt);
    }
}
