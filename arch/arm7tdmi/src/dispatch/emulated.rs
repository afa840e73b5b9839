// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! An emulated vectored interrupt controller with an eight-level priority
//! stack, and the dispatch scenarios run against it.

extern crate std;

use core::cell::{Cell, RefCell};
use std::vec;
use std::vec::Vec;

use kernel::platform::interrupt::{InterruptController, Priority};

use super::{Core, DispatchState, Fault, Handler};
use crate::cpsr::{Mode, CPSR};
use crate::stacks::{StackLayout, IRQ_NESTING_DEPTH, IRQ_STACK_SIZE};

type TestCore = Core<EmulatedAic>;
type TestHandler = Handler<EmulatedAic>;

const BASE: usize = 0xFFFF_F000;
const LINES: usize = 32;
const STACK_TOP: usize = 0x0021_0000;
const APP_ENTRY: u32 = 0x0010_0400;

/// Marks a handler's first event in the log.
const START: u32 = 0x100;

#[derive(Clone, Copy)]
struct Line {
    priority: Priority,
    handler: Option<TestHandler>,
    enabled: bool,
    pending: bool,
}

struct EmulatedAic {
    lines: Cell<[Line; LINES]>,
    fast: Cell<Option<TestHandler>>,
    fast_pending: Cell<bool>,
    spurious: TestHandler,
    unexpected: TestHandler,
    levels: RefCell<Vec<Priority>>,
    max_depth: Cell<usize>,
    /// nIRQ asserted with nothing behind it.
    glitch: Cell<bool>,
    acknowledged: RefCell<Vec<Priority>>,
    rearms: Cell<usize>,
    unbalanced_eoi: Cell<usize>,
    log: RefCell<Vec<u32>>,
}

impl EmulatedAic {
    fn new() -> EmulatedAic {
        EmulatedAic {
            lines: Cell::new(
                [Line {
                    priority: 0,
                    handler: None,
                    enabled: false,
                    pending: false,
                }; LINES],
            ),
            fast: Cell::new(None),
            fast_pending: Cell::new(false),
            spurious: TestCore::spurious_handler,
            unexpected: TestCore::unexpected_handler,
            levels: RefCell::new(Vec::new()),
            max_depth: Cell::new(0),
            glitch: Cell::new(false),
            acknowledged: RefCell::new(Vec::new()),
            rearms: Cell::new(0),
            unbalanced_eoi: Cell::new(0),
            log: RefCell::new(Vec::new()),
        }
    }

    fn update(&self, line: usize, f: impl FnOnce(&mut Line)) {
        // Line 0 is the fast source.
        assert!(line > 0 && line < LINES);
        let mut lines = self.lines.get();
        f(&mut lines[line]);
        self.lines.set(lines);
    }

    fn configure(&self, line: usize, priority: Priority, handler: TestHandler) {
        self.update(line, |l| {
            l.priority = priority;
            l.handler = Some(handler);
            l.enabled = true;
        });
    }

    fn enable_without_handler(&self, line: usize, priority: Priority) {
        self.update(line, |l| {
            l.priority = priority;
            l.enabled = true;
        });
    }

    fn raise(&self, line: usize) {
        self.update(line, |l| l.pending = true);
    }

    fn set_fast(&self, handler: TestHandler) {
        self.fast.set(Some(handler));
    }

    fn raise_fast(&self) {
        self.fast_pending.set(true);
    }

    fn glitch(&self) {
        self.glitch.set(true);
    }

    fn record(&self, event: u32) {
        self.log.borrow_mut().push(event);
    }

    fn log(&self) -> Vec<u32> {
        self.log.borrow().clone()
    }

    fn depth(&self) -> usize {
        self.levels.borrow().len()
    }

    fn top_level(&self) -> Option<Priority> {
        self.levels.borrow().last().copied()
    }

    fn highest_pending(&self) -> Option<usize> {
        let current = self.top_level();
        self.lines
            .get()
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, l)| l.enabled && l.pending && current.map_or(true, |c| l.priority > c))
            // Ties go to the lowest line number.
            .max_by_key(|(n, l)| (l.priority, core::cmp::Reverse(*n)))
            .map(|(n, _)| n)
    }

    fn push_level(&self, level: Priority) {
        let mut levels = self.levels.borrow_mut();
        assert!(levels.len() < IRQ_NESTING_DEPTH, "priority stack overflow");
        levels.push(level);
        self.max_depth.set(self.max_depth.get().max(levels.len()));
    }
}

impl InterruptController for EmulatedAic {
    type Vector = TestHandler;

    fn base_address(&self) -> usize {
        BASE
    }

    fn fiq_asserted(&self) -> bool {
        self.fast_pending.get()
    }

    fn irq_asserted(&self) -> bool {
        self.glitch.get() || self.highest_pending().is_some()
    }

    fn fast_vector(&self) -> TestHandler {
        self.fast_pending.set(false);
        self.fast.get().unwrap_or(self.unexpected)
    }

    fn acknowledge(&self) -> TestHandler {
        match self.highest_pending() {
            Some(n) => {
                let line = self.lines.get()[n];
                self.update(n, |l| l.pending = false);
                self.push_level(line.priority);
                self.acknowledged.borrow_mut().push(line.priority);
                line.handler.unwrap_or(self.unexpected)
            }
            None => {
                self.glitch.set(false);
                self.push_level(self.top_level().unwrap_or(0));
                self.spurious
            }
        }
    }

    fn rearm(&self) {
        self.rearms.set(self.rearms.get() + 1);
    }

    fn current_priority(&self) -> Priority {
        self.top_level().unwrap_or(0)
    }

    fn end_of_interrupt(&self) {
        if self.levels.borrow_mut().pop().is_none() {
            self.unbalanced_eoi.set(self.unbalanced_eoi.get() + 1);
        }
    }
}

fn core_with_irq_stack(irq_size: usize) -> TestCore {
    let layout = StackLayout::partition(STACK_TOP - 1024, STACK_TOP, irq_size).unwrap();
    Core::new(EmulatedAic::new(), layout).unwrap()
}

fn booted() -> TestCore {
    let mut core = core_with_irq_stack(IRQ_STACK_SIZE);
    core.boot(APP_ENTRY);
    core
}

fn current_level(core: &TestCore) -> Priority {
    match core.state() {
        DispatchState::StandardActive(level) => level,
        other => panic!("not in an IRQ handler: {:?}", other),
    }
}

fn assert_back_in_application(core: &TestCore) {
    assert_eq!(core.state(), DispatchState::Idle);
    assert_eq!(core.mode(), Mode::Supervisor);
    assert!(!core.status().is_set(CPSR::I));
    assert!(!core.status().is_set(CPSR::F));
    assert_eq!(core.stack_pointer(Mode::Irq), Some(STACK_TOP as u32));
    assert_eq!(
        core.stack_pointer(Mode::Supervisor),
        Some((STACK_TOP - IRQ_STACK_SIZE) as u32)
    );
    assert_eq!(core.controller().depth(), 0);
    assert_eq!(core.controller().unbalanced_eoi.get(), 0);
}

// Handlers. Each logs the line's priority when it finishes.

fn finish(core: &mut TestCore) {
    let level = current_level(core);
    core.controller().record(level as u32);
}

fn raise_seven_then_finish(core: &mut TestCore) {
    core.controller().record(START | current_level(core) as u32);
    core.controller().raise(7);
    core.poll();
    finish(core);
}

fn climb(core: &mut TestCore) {
    let level = current_level(core);
    core.controller().record(level as u32);
    if (level as usize) < IRQ_NESTING_DEPTH - 1 {
        // Priority p lives on line p + 1.
        core.controller().raise(level as usize + 2);
        core.poll();
    } else {
        assert_eq!(core.irq_stack_used(), IRQ_STACK_SIZE);
    }
}

#[test]
fn boot_installs_stacks_then_unmasks() {
    let mut core = core_with_irq_stack(IRQ_STACK_SIZE);
    assert!(core.status().is_set(CPSR::I));
    assert!(core.status().is_set(CPSR::F));

    core.boot(APP_ENTRY);

    assert_eq!(core.pc(), APP_ENTRY);
    assert_eq!(core.fiq().r8 as usize, BASE);
    assert_eq!(core.stack_pointer(Mode::Fiq), None);
    assert_back_in_application(&core);
}

#[test]
fn masked_core_takes_nothing() {
    let mut core = core_with_irq_stack(IRQ_STACK_SIZE);
    core.controller().configure(3, 3, finish);
    core.controller().raise(3);
    core.controller().raise_fast();

    core.poll();

    assert!(core.controller().log().is_empty());
    assert_eq!(core.state(), DispatchState::Idle);
}

#[test]
fn higher_priority_preempts_and_lower_waits() {
    let mut core = booted();
    core.controller().configure(2, 2, finish);
    core.controller().configure(5, 5, raise_seven_then_finish);
    core.controller().configure(7, 7, finish);
    core.controller().raise(5);
    core.controller().raise(2);

    core.poll();

    assert_eq!(core.controller().log(), vec![START | 5, 7, 5, 2]);
    assert_eq!(*core.controller().acknowledged.borrow(), vec![5, 7, 2]);
    assert_eq!(core.controller().max_depth.get(), 2);
    assert_eq!(core.controller().rearms.get(), 3);
    assert_eq!(core.pc(), APP_ENTRY);
    assert_back_in_application(&core);
}

fn raise_same_priority(core: &mut TestCore) {
    let first = core.controller().log().is_empty();
    core.controller().record(START | 4);
    if first {
        // Another level-4 line, and this line again.
        core.controller().raise(6);
        core.controller().raise(4);
        core.poll();
        assert_eq!(core.controller().depth(), 1);
    }
    finish(core);
}

#[test]
fn equal_priority_waits_for_end_of_interrupt() {
    let mut core = booted();
    core.controller().configure(4, 4, raise_same_priority);
    core.controller().configure(6, 4, raise_same_priority);
    core.controller().raise(4);

    core.poll();

    assert_eq!(
        core.controller().log(),
        vec![START | 4, 4, START | 4, 4, START | 4, 4]
    );
    assert_eq!(core.controller().max_depth.get(), 1);
    assert_back_in_application(&core);
}

fn clobber_everything(core: &mut TestCore) {
    core.scratch.r0 = 0xDEAD_0000;
    core.scratch.r1 = 0xDEAD_0001;
    core.scratch.r2 = 0xDEAD_0002;
    core.scratch.r3 = 0xDEAD_0003;
    core.scratch.r12 = 0xDEAD_000C;
    core.set_supervisor_lr(0);
    core.set_condition_flags(CPSR::N::SET + CPSR::Z::CLEAR + CPSR::C::CLEAR);
    finish(core);
}

#[test]
fn interrupted_context_is_restored() {
    let mut core = booted();
    core.scratch.r0 = 0x1111_0000;
    core.scratch.r1 = 0x1111_0001;
    core.scratch.r2 = 0x1111_0002;
    core.scratch.r3 = 0x1111_0003;
    core.scratch.r12 = 0x1111_000C;
    core.set_supervisor_lr(0x0010_0ABC);
    core.set_condition_flags(CPSR::Z::SET + CPSR::C::SET);
    let scratch = core.scratch;
    let status = core.status();

    core.controller().configure(3, 3, clobber_everything);
    core.controller().raise(3);
    core.poll();

    assert_eq!(core.controller().log(), vec![3]);
    assert_eq!(core.scratch, scratch);
    assert_eq!(core.supervisor_lr(), 0x0010_0ABC);
    assert_eq!(core.status().get(), status.get());
    assert_eq!(core.pc(), APP_ENTRY);
    assert_back_in_application(&core);
}

fn outer_status_check(core: &mut TestCore) {
    let outer = core.interrupted_status().unwrap();
    assert!(outer.is_set(CPSR::Z));
    assert!(!outer.is_set(CPSR::I));
    assert_eq!(outer.read(CPSR::MODE), Mode::Supervisor.bits());

    core.set_condition_flags(CPSR::N::SET + CPSR::Z::CLEAR);
    core.controller().raise(7);
    core.poll();

    // Own frame again, own flags back.
    assert!(core.interrupted_status().unwrap().is_set(CPSR::Z));
    assert!(core.status().is_set(CPSR::N));
    assert!(!core.status().is_set(CPSR::Z));
    finish(core);
}

fn inner_status_check(core: &mut TestCore) {
    let outer = core.interrupted_status().unwrap();
    assert!(outer.is_set(CPSR::N));
    assert!(!outer.is_set(CPSR::Z));
    finish(core);
}

#[test]
fn each_handler_sees_its_own_preempted_status() {
    let mut core = booted();
    core.set_condition_flags(CPSR::Z::SET);
    core.controller().configure(5, 5, outer_status_check);
    core.controller().configure(7, 7, inner_status_check);
    core.controller().raise(5);

    core.poll();

    assert_eq!(core.controller().log(), vec![7, 5]);
    assert!(core.status().is_set(CPSR::Z));
    assert!(!core.status().is_set(CPSR::N));
    assert_back_in_application(&core);
}

#[test]
fn eight_nested_levels_fit_the_irq_stack() {
    let mut core = booted();
    for level in 0..IRQ_NESTING_DEPTH {
        core.controller().configure(level + 1, level as Priority, climb);
    }
    core.controller().raise(1);

    core.poll();

    assert_eq!(
        core.controller().log(),
        (0..IRQ_NESTING_DEPTH as u32).collect::<Vec<_>>()
    );
    assert_eq!(core.controller().max_depth.get(), IRQ_NESTING_DEPTH);
    assert_eq!(core.irq_stack_used(), IRQ_STACK_SIZE);
    assert_back_in_application(&core);
}

/// Whether the handler at `level` runs with V set while it is preempted.
fn overflow_set_at(level: usize) -> bool {
    level % 2 == 0
}

fn climb_checking_status(core: &mut TestCore) {
    let level = current_level(core) as usize;
    // Level 0 preempted the application, which runs with V clear.
    let preempted = level > 0 && overflow_set_at(level - 1);
    let before = core.interrupted_status().unwrap();
    assert_eq!(before.is_set(CPSR::V), preempted);
    assert_eq!(before.read(CPSR::MODE), Mode::Supervisor.bits());

    if overflow_set_at(level) {
        core.set_condition_flags(CPSR::V::SET);
    } else {
        core.set_condition_flags(CPSR::V::CLEAR);
    }
    if level < IRQ_NESTING_DEPTH - 1 {
        core.controller().raise(level + 2);
        core.poll();
    }

    assert_eq!(core.interrupted_status().unwrap().is_set(CPSR::V), preempted);
    assert_eq!(core.status().is_set(CPSR::V), overflow_set_at(level));
    core.controller().record(level as u32);
}

#[test]
fn status_snapshots_survive_full_nesting() {
    let mut core = booted();
    assert!(!core.status().is_set(CPSR::V));
    for level in 0..IRQ_NESTING_DEPTH {
        core.controller().configure(level + 1, level as Priority, climb_checking_status);
    }
    core.controller().raise(1);

    core.poll();

    assert_eq!(
        core.controller().log(),
        (0..IRQ_NESTING_DEPTH as u32).rev().collect::<Vec<_>>()
    );
    assert_eq!(core.controller().max_depth.get(), IRQ_NESTING_DEPTH);
    assert!(!core.status().is_set(CPSR::V));
    assert_back_in_application(&core);
}

#[test]
fn irq_stack_overflow_halts() {
    // Room for two frames only.
    let mut core = core_with_irq_stack(24);
    core.boot(APP_ENTRY);
    for level in 0..IRQ_NESTING_DEPTH {
        core.controller().configure(level + 1, level as Priority, climb);
    }
    core.controller().raise(1);

    core.poll();

    assert_eq!(core.state(), DispatchState::Halted(Fault::StackOverflow(Mode::Irq)));
    assert_eq!(core.controller().log(), vec![0, 1]);

    // Nothing runs once halted.
    core.controller().configure(9, 7, finish);
    core.controller().raise(9);
    core.poll();
    assert_eq!(core.controller().log(), vec![0, 1]);
}

fn fast(core: &mut TestCore) {
    assert_eq!(core.state(), DispatchState::FastActive);
    assert_eq!(core.mode(), Mode::Supervisor);
    assert!(core.status().is_set(CPSR::I));
    assert!(core.status().is_set(CPSR::F));

    core.scratch.r0 = 0xFFFF_FFFF;
    core.scratch.r1 = 0xFFFF_FFFF;
    // Higher priority IRQ: stays pending while the fast handler runs.
    core.controller().raise(5);
    core.poll();
    core.controller().record(0xF);
}

fn preempted_by_fast(core: &mut TestCore) {
    core.scratch.r0 = 0x33;
    core.scratch.r1 = 0x31;
    core.controller().raise_fast();
    core.poll();

    assert_eq!(core.state(), DispatchState::StandardActive(3));
    assert_eq!(core.scratch.r0, 0x33);
    assert_eq!(core.scratch.r1, 0x31);
    finish(core);
}

#[test]
fn fiq_preempts_irq_handler() {
    let mut core = booted();
    core.controller().set_fast(fast);
    core.controller().configure(3, 3, preempted_by_fast);
    core.controller().configure(5, 5, finish);
    core.controller().raise(3);

    core.poll();

    assert_eq!(core.controller().log(), vec![0xF, 5, 3]);
    assert_back_in_application(&core);
}

#[test]
fn fiq_from_application_restores_r0_from_banked_register() {
    let mut core = booted();
    core.controller().set_fast(fast);
    core.controller().configure(5, 5, finish);
    core.scratch.r0 = 0x0A0A_0A0A;
    core.controller().raise_fast();

    core.poll();

    assert_eq!(core.scratch.r0, 0x0A0A_0A0A);
    assert_eq!(core.fiq().r9, 0x0A0A_0A0A);
    // The IRQ raised inside the fast handler is taken after it returns.
    assert_eq!(core.controller().log(), vec![0xF, 5]);
    // Only the IRQ frame.
    assert_eq!(core.irq_stack_used(), 12);
    assert_eq!(core.pc(), APP_ENTRY);
}

fn fast_only(core: &mut TestCore) {
    assert_eq!(core.state(), DispatchState::FastActive);
    core.controller().record(0xF);
}

#[test]
fn fiq_never_touches_irq_stack() {
    let mut core = booted();
    core.controller().set_fast(fast_only);
    core.controller().raise_fast();

    core.poll();

    assert_eq!(core.controller().log(), vec![0xF]);
    assert_eq!(core.irq_stack_used(), 0);
    assert_eq!(core.pc(), APP_ENTRY);
    assert_back_in_application(&core);
}

#[test]
fn fiq_before_boot_halts() {
    let mut core = core_with_irq_stack(IRQ_STACK_SIZE);
    core.controller().set_fast(fast);
    core.take_fiq();
    assert_eq!(core.state(), DispatchState::Halted(Fault::ControllerNotMapped));
}

fn glitch_during_handler(core: &mut TestCore) {
    core.controller().glitch();
    core.poll();
    assert_eq!(core.controller().depth(), 1);
    finish(core);
}

#[test]
fn spurious_interrupt_is_counted_once() {
    let mut core = booted();
    core.controller().configure(3, 3, glitch_during_handler);
    core.controller().raise(3);

    core.poll();

    assert_eq!(core.spurious_interrupts(), 1);
    assert_eq!(core.controller().log(), vec![3]);
    assert_eq!(*core.controller().acknowledged.borrow(), vec![3]);
    // Full protocol for both, the spurious one included.
    assert_eq!(core.controller().rearms.get(), 2);
    assert_back_in_application(&core);
}

#[test]
fn spurious_interrupt_from_application() {
    let mut core = booted();
    core.controller().glitch();

    core.poll();

    assert_eq!(core.spurious_interrupts(), 1);
    assert!(core.controller().log().is_empty());
    assert_back_in_application(&core);
}

#[test]
fn spurious_interrupt_among_pending_sources() {
    let mut core = booted();
    core.controller().configure(2, 2, finish);
    core.controller().configure(4, 4, finish);
    core.controller().configure(6, 6, finish);
    core.controller().raise(2);
    core.controller().raise(4);
    core.controller().raise(6);
    core.controller().glitch();

    core.poll();

    assert_eq!(core.spurious_interrupts(), 1);
    assert_eq!(core.controller().log(), vec![6, 4, 2]);
    assert_eq!(*core.controller().acknowledged.borrow(), vec![6, 4, 2]);
    assert_eq!(core.controller().rearms.get(), 4);
    assert_back_in_application(&core);
}

#[test]
fn line_without_handler_halts() {
    let mut core = booted();
    core.controller().enable_without_handler(10, 2);
    core.controller().raise(10);

    core.poll();

    assert_eq!(core.state(), DispatchState::Halted(Fault::UnexpectedInterrupt));
}
