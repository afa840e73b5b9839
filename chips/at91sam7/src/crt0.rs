// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Vector table, interrupt trampolines and reset sequence.
//!
//! Everything in the assembly below is ARM state and lives in `.vectors`,
//! which the linker script places at address 0 (flash, or RAM after the
//! remap). Handlers reached through the AIC run in supervisor mode and may be
//! ordinary Rust or C functions in either instruction set; the trampolines
//! call them with `bx`.
//!
//! Reset sequence:
//!
//! 1. `sp`/`fp` at `__stack_start__` so compiled code can run.
//! 2. `cpu_init` (board: clocks, flash wait states, memory remap).
//! 3. [`boot_memory_init`]: `.data`, `.bss`, `.ramtext`.
//! 4. With both interrupt classes masked: FIQ `r8` = AIC base, IRQ `sp` =
//!    `__stack_start__`, supervisor `sp` = `__stack_start__ - IRQ_STACK_SIZE`.
//! 5. Unmask in supervisor mode.
//! 6. `main`, returning into `exit`.
//!
//! The FIQ trampoline keeps the interrupted `r0` in the banked `r9` and uses
//! no memory of its own; handler bodies borrow the supervisor stack. The IRQ
//! trampoline pushes the return address, SPSR and `r0` on the IRQ stack,
//! acknowledges through IVR (writing it back for protect mode), re-enables
//! interrupts in supervisor mode for the handler, then signals EOICR with IRQ
//! masked before returning.

use core::fmt::{self, Write};

use arm7tdmi::exceptions::{HandlerKind, VECTOR_TABLE};
use arm7tdmi::stacks::StackLayout;
use kernel::ErrorCode;
use rt0::MemoryImage;

#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
use arm7tdmi::{cpsr::Mode, stacks::IRQ_STACK_SIZE};

#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
use crate::aic::{AIC_BASE_ADDRESS, EOICR_OFFSET, FVR_OFFSET, IVR_OFFSET};

#[cfg(all(target_arch = "arm", target_os = "none"))]
extern "C" {
    // Symbols defined in the linker file. All are run addresses except the
    // `_load__` ones.
    static __stack_start__: u8;
    static __data_load__: u8;
    static __data_start__: u8;
    static __data_end__: u8;
    static __ramtext_load__: u8;
    static __ramtext_start__: u8;
    static __ramtext_end__: u8;
    static __bss_start__: u8;
    static __bss_end__: u8;
}

#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
core::arch::global_asm!(
    "
    .section .vectors, \"ax\"
    .arm
    .global _start
_start:
    b _reset_handler        // 0x00 reset
    b .                     // 0x04 undefined instruction
    b .                     // 0x08 software interrupt
    b .                     // 0x0c prefetch abort
    b .                     // 0x10 data abort
    b .                     // 0x14 reserved
    b _irq_handler          // 0x18 IRQ
                            // 0x1c FIQ, falls through

    .global _fiq_handler
_fiq_handler:
    mov r9, r0                          // r9_fiq is banked
    ldr r0, [r8, #{fvr}]                // r8_fiq holds the AIC base
    msr cpsr_c, #{svc_masked}
    stmfd sp!, {{r1-r3, r12, lr}}
    mov lr, pc
    bx r0
    ldmfd sp!, {{r1-r3, r12, lr}}
    msr cpsr_c, #{fiq_masked}
    mov r0, r9
    subs pc, lr, #4

    .global _irq_handler
_irq_handler:
    sub lr, lr, #4
    stmfd sp!, {{lr}}
    mrs lr, spsr
    stmfd sp!, {{lr}}
    stmfd sp!, {{r0}}
    ldr lr, ={aic_base}
    ldr r0, [lr, #{ivr}]                // acknowledge
    str lr, [lr, #{ivr}]                // commit the stacking in protect mode
    msr cpsr_c, #{svc}                  // nested interrupts allowed from here
    stmfd sp!, {{r1-r3, r12, lr}}
    mov lr, pc
    bx r0
    ldmfd sp!, {{r1-r3, r12, lr}}
    msr cpsr_c, #{irq_masked}
    ldr lr, ={aic_base}
    str lr, [lr, #{eoicr}]
    ldmfd sp!, {{r0}}
    ldmfd sp!, {{lr}}
    msr spsr_cxsf, lr
    ldmfd sp!, {{pc}}^

    .global _reset_handler
_reset_handler:
    ldr r0, =__stack_start__
    mov sp, r0
    mov fp, r0
    ldr r0, =cpu_init
    mov lr, pc
    bx r0
    ldr r0, =boot_memory_init
    mov lr, pc
    bx r0

    msr cpsr_c, #{fiq_masked}
    ldr r8, ={aic_base}
    msr cpsr_c, #{irq_all_masked}
    ldr r0, =__stack_start__
    mov sp, r0
    msr cpsr_c, #{svc_masked}
    sub sp, r0, #{irq_stack_size}
    msr cpsr_c, #{svc}

    ldr lr, =exit
    ldr r0, =main
    bx r0

    .ltorg
    ",
    fvr = const FVR_OFFSET,
    ivr = const IVR_OFFSET,
    eoicr = const EOICR_OFFSET,
    aic_base = const AIC_BASE_ADDRESS,
    irq_stack_size = const IRQ_STACK_SIZE,
    svc = const Mode::Supervisor.control(false, false),
    svc_masked = const Mode::Supervisor.control(true, true),
    fiq_masked = const Mode::Fiq.control(true, true),
    irq_masked = const Mode::Irq.control(true, false),
    irq_all_masked = const Mode::Irq.control(true, true),
);

/// The memory image described by the linker script.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub fn memory_image() -> MemoryImage {
    use core::ptr::addr_of;

    // SAFETY: only the addresses of the linker symbols are taken.
    unsafe {
        MemoryImage {
            data: rt0::LoadedSection {
                load: addr_of!(__data_load__),
                start: addr_of!(__data_start__) as *mut u8,
                end: addr_of!(__data_end__) as *mut u8,
            },
            bss: rt0::ZeroedSection {
                start: addr_of!(__bss_start__) as *mut u8,
                end: addr_of!(__bss_end__) as *mut u8,
            },
            ramtext: Some(rt0::LoadedSection {
                load: addr_of!(__ramtext_load__),
                start: addr_of!(__ramtext_start__) as *mut u8,
                end: addr_of!(__ramtext_end__) as *mut u8,
            }),
        }
    }
}

/// The stacks the reset handler installs: everything from the end of `.bss`
/// up to `__stack_start__`.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub fn stack_layout() -> Result<StackLayout, ErrorCode> {
    use arm7tdmi::stacks::{IRQ_STACK_SIZE, STACK_ALIGN};
    use core::ptr::addr_of;

    let (bottom, top) = unsafe {
        (
            addr_of!(__bss_end__) as usize,
            addr_of!(__stack_start__) as usize,
        )
    };
    let bottom = (bottom + STACK_ALIGN - 1) & !(STACK_ALIGN - 1);
    StackLayout::partition(bottom, top, IRQ_STACK_SIZE)
}

/// Memory initialization step of the reset handler.
///
/// Runs on the temporary stack, before any static is valid, so it must not
/// read or write globals itself.
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[no_mangle]
pub unsafe extern "C" fn boot_memory_init() {
    rt0::boot_memory_init(&memory_image());
}

// Mock implementations for tests on the host.

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
pub fn memory_image() -> MemoryImage {
    unimplemented!()
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
pub fn stack_layout() -> Result<StackLayout, ErrorCode> {
    unimplemented!()
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
pub unsafe extern "C" fn boot_memory_init() {
    unimplemented!()
}

fn slot_target(kind: HandlerKind) -> &'static str {
    match kind {
        HandlerKind::Boot => "b _reset_handler",
        HandlerKind::Halt => "b .",
        HandlerKind::IrqTrampoline => "b _irq_handler",
        HandlerKind::FiqFallThrough => "_fiq_handler",
    }
}

/// Describe the boot layout: vector table, memory image and stacks.
pub fn print_boot_layout(
    writer: &mut dyn Write,
    image: &MemoryImage,
    stacks: &StackLayout,
) -> fmt::Result {
    writer.write_str("vectors:\r\n")?;
    for slot in VECTOR_TABLE.iter() {
        write!(
            writer,
            "  {:#04x} {:?}: {}\r\n",
            slot.exception.offset(),
            slot.exception,
            slot_target(slot.handler)
        )?;
    }

    write!(
        writer,
        "data:    {:#010x}..{:#010x} from {:#010x}\r\n",
        image.data.start as usize, image.data.end as usize, image.data.load as usize
    )?;
    write!(
        writer,
        "bss:     {:#010x}..{:#010x}\r\n",
        image.bss.start as usize, image.bss.end as usize
    )?;
    match image.ramtext {
        Some(ramtext) if !ramtext.in_place() => write!(
            writer,
            "ramtext: {:#010x}..{:#010x} from {:#010x}\r\n",
            ramtext.start as usize, ramtext.end as usize, ramtext.load as usize
        )?,
        Some(ramtext) => write!(
            writer,
            "ramtext: {:#010x}..{:#010x} in place\r\n",
            ramtext.start as usize, ramtext.end as usize
        )?,
        None => writer.write_str("ramtext: none\r\n")?,
    }
    match image.check() {
        Ok(()) => writer.write_str("image:   ok\r\n")?,
        Err(e) => write!(writer, "image:   {}\r\n", e)?,
    }

    write!(
        writer,
        "irq sp:  {:#010x} ({} bytes)\r\n",
        stacks.irq.top(),
        stacks.irq.size
    )?;
    write!(
        writer,
        "svc sp:  {:#010x} ({} bytes)\r\n",
        stacks.supervisor.top(),
        stacks.supervisor.size
    )?;
    writer.write_str("fiq sp:  none\r\n")
}
