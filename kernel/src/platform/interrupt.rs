// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Contract between the interrupt trampolines and a vectored interrupt
//! controller.
//!
//! The trampolines never decode interrupt sources themselves. They ask the
//! controller for a vector, run it, and tell the controller when it is done.
//! The controller, in turn, keeps an internal stack of the priority levels in
//! service and only asserts the IRQ line for a source whose priority is
//! strictly higher than the level on top of that stack.
//!
//! Peripheral drivers register a handler per interrupt line with the
//! controller. The trampolines assume that contract is honoured: every line a
//! driver enables has a registered vector.

/// Priority level of a standard interrupt source. Higher values win.
pub type Priority = u8;

/// A vectored interrupt controller with an internal priority stack.
pub trait InterruptController {
    /// Value the vector registers return. On hardware this is the address of
    /// the registered handler.
    type Vector: Copy;

    /// Base address of the controller's register block. The FIQ trampoline
    /// keeps this in a banked register so it never has to load it.
    fn base_address(&self) -> usize;

    /// State of the FIQ line into the core.
    fn fiq_asserted(&self) -> bool;

    /// State of the IRQ line into the core: some pending, enabled standard
    /// source has a priority strictly above the level in service.
    fn irq_asserted(&self) -> bool;

    /// Read the fast vector register.
    ///
    /// There is a single fast source, so this has no effect on the priority
    /// stack.
    fn fast_vector(&self) -> Self::Vector;

    /// Read the vector register.
    ///
    /// Not idempotent: the read selects the highest priority pending source,
    /// pushes its level onto the priority stack and returns its vector. When
    /// nothing is pending by the time of the read, the spurious vector is
    /// returned and the level in service is pushed again, so the matching
    /// [`end_of_interrupt`](Self::end_of_interrupt) stays balanced.
    fn acknowledge(&self) -> Self::Vector;

    /// Write back to the vector register.
    ///
    /// In protect mode the controller only commits the stacking done by
    /// [`acknowledge`](Self::acknowledge) when it sees this write, so a
    /// debugger reading the vector register does not disturb it. Outside
    /// protect mode the write is ignored.
    fn rearm(&self);

    /// Priority level on top of the priority stack, i.e. the level of the
    /// source most recently acknowledged.
    fn current_priority(&self) -> Priority;

    /// Signal that the most recently acknowledged source has been serviced.
    ///
    /// Pops the priority stack. Must happen exactly once per acknowledge;
    /// skipping it leaves that level blocked forever.
    fn end_of_interrupt(&self);
}
