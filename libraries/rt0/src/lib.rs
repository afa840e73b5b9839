// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Generic initial runtime (`rt0`) helper functions.
//!
//! Before any code reads a global, the boot sequence must make RAM look the
//! way the compiler assumed it would:
//!
//! - `.data` is copied byte for byte from its load address in flash to its
//!   run address in RAM,
//! - `.bss` is filled with zeros,
//! - `.ramtext`, code linked to execute from RAM for speed, is copied from
//!   flash unless the image already executes in place.
//!
//! The boundaries come from linker script symbols and are described by a
//! [`MemoryImage`]. Nothing here checks them at boot: a malformed layout is a
//! build error, not something the boot code could recover from. [`MemoryImage::check`]
//! exists so that a build's layout can be inspected after the fact.

#![no_std]

use kernel::ErrorCode;

/// A section with initial contents: copied from `load` to `start..end`.
#[derive(Clone, Copy, Debug)]
pub struct LoadedSection {
    /// First byte of the initial contents, usually in flash.
    pub load: *const u8,
    /// First byte of the section at run time.
    pub start: *mut u8,
    /// First byte after the end of the section at run time.
    pub end: *mut u8,
}

/// A section without initial contents: zero-filled at `start..end`.
#[derive(Clone, Copy, Debug)]
pub struct ZeroedSection {
    pub start: *mut u8,
    pub end: *mut u8,
}

/// Where everything the boot sequence has to move lives.
#[derive(Clone, Copy, Debug)]
pub struct MemoryImage {
    /// Initialised globals.
    pub data: LoadedSection,
    /// Uninitialised globals.
    pub bss: ZeroedSection,
    /// Code that runs from RAM, if the build has any.
    pub ramtext: Option<LoadedSection>,
}

impl LoadedSection {
    /// Number of bytes in the section at run time.
    pub fn len(&self) -> usize {
        (self.end as usize).saturating_sub(self.start as usize)
    }

    /// Whether the section already sits at its run address, as with an
    /// execute-in-place build.
    pub fn in_place(&self) -> bool {
        self.load as usize == self.start as usize
    }

    fn run_range(&self) -> (usize, usize) {
        (self.start as usize, self.end as usize)
    }

    /// `INVAL` if the load image runs past the end of the address space.
    fn load_range(&self) -> Result<(usize, usize), ErrorCode> {
        let load = self.load as usize;
        let end = load.checked_add(self.len()).ok_or(ErrorCode::INVAL)?;
        Ok((load, end))
    }
}

impl ZeroedSection {
    pub fn len(&self) -> usize {
        (self.end as usize).saturating_sub(self.start as usize)
    }

    fn run_range(&self) -> (usize, usize) {
        (self.start as usize, self.end as usize)
    }
}

fn overlaps(a: (usize, usize), b: (usize, usize)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

impl MemoryImage {
    /// Check the layout contract the boot code relies on.
    ///
    /// - every section has `start <= end` (`INVAL` otherwise),
    /// - no two run ranges overlap (`INVAL`),
    /// - a copied section that is not in place does not have its load range
    ///   overlap its own run range (`SIZE`),
    /// - every load image fits below the top of the address space (`INVAL`).
    pub fn check(&self) -> Result<(), ErrorCode> {
        let data = self.data.run_range();
        let bss = self.bss.run_range();
        if data.0 > data.1 || bss.0 > bss.1 {
            return Err(ErrorCode::INVAL);
        }
        if overlaps(data, bss) {
            return Err(ErrorCode::INVAL);
        }
        if !self.data.in_place() && overlaps(self.data.load_range()?, data) {
            return Err(ErrorCode::SIZE);
        }

        if let Some(ramtext) = self.ramtext {
            let text = ramtext.run_range();
            if text.0 > text.1 {
                return Err(ErrorCode::INVAL);
            }
            if overlaps(text, data) || overlaps(text, bss) {
                return Err(ErrorCode::INVAL);
            }
            if !ramtext.in_place() && overlaps(ramtext.load_range()?, text) {
                return Err(ErrorCode::SIZE);
            }
        }
        Ok(())
    }
}

/// Copies `start..end` from `load`, one byte at a time.
///
/// - `load`:  The address of the start of the initial contents, stored in
///            non-volatile flash memory.
/// - `start`: The address in RAM where the section starts and should be
///            copied to.
/// - `end`:   The first address after the end of the section in RAM.
pub unsafe fn init_data(mut load: *const u8, mut start: *mut u8, end: *mut u8) {
    while start < end {
        // `volatile` so the loop is not turned into a `memcpy` call, which
        // may itself live in a section that has not been copied yet.
        start.write_volatile(load.read());
        start = start.offset(1);
        load = load.offset(1);
    }
}

/// Sets non-initialized data in RAM to 0.
/// This is used to clear the BSS section on initial bootup.
pub unsafe fn zero_bss(mut bss: *mut u8, bss_end: *mut u8) {
    while bss < bss_end {
        // `volatile` to make sure it doesn't get optimized out
        bss.write_volatile(0);
        bss = bss.offset(1);
    }
}

/// Copies code linked to run from RAM. Does nothing when the section already
/// executes in place.
pub unsafe fn relocate_text(section: &LoadedSection) {
    if !section.in_place() {
        init_data(section.load, section.start, section.end);
    }
}

/// Bring RAM into the state compiled code expects.
///
/// Must run exactly once, before anything reads a global. The function itself
/// reads nothing but its argument, which the caller builds from linker
/// symbols on the stack.
pub unsafe fn boot_memory_init(image: &MemoryImage) {
    init_data(image.data.load, image.data.start, image.data.end);
    zero_bss(image.bss.start, image.bss.end);
    if let Some(ramtext) = image.ramtext.as_ref() {
        relocate_text(ramtext);
    }
}
