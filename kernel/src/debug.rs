// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Support for printing debug messages.
//!
//! The board registers one output sink with [`set_debug_writer`] once a
//! console exists. Until then, and on boards that never register one, every
//! message is silently dropped: most of the code in this tree runs before any
//! peripheral has been configured.
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! use kernel::debug;
//!
//! debug!("spurious interrupts so far: {}", count);
//! ```
//!
//! Each call produces exactly one line terminated by `\r\n`.

use core::fmt::{Arguments, Write};

use crate::utilities::masked_cell::MaskedCell;

/// Byte sink for debug output, typically a polled UART.
pub trait IoWrite {
    /// Write `buf` to the device and return how many bytes were accepted.
    fn write(&mut self, buf: &[u8]) -> usize;
}

/// Adapter so that `core::fmt` machinery can drive an [`IoWrite`].
struct LineWriter<'a> {
    sink: &'a mut dyn IoWrite,
}

impl Write for LineWriter<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let mut bytes = s.as_bytes();
        while !bytes.is_empty() {
            let written = self.sink.write(bytes);
            if written == 0 {
                // Sink is full or gone; drop the rest of the line.
                return Err(core::fmt::Error);
            }
            bytes = &bytes[written.min(bytes.len())..];
        }
        Ok(())
    }
}

/// The registered debug sink.
///
/// Written once by the board during setup, read by `debug!` from supervisor
/// mode only. Interrupt handlers must not print.
static DEBUG_WRITER: MaskedCell<Option<&'static mut dyn IoWrite>> = MaskedCell::new(None);

/// Register the sink used by `debug!`.
///
/// # Safety
///
/// Must be called before interrupts are enabled, and at most once.
pub unsafe fn set_debug_writer(writer: &'static mut dyn IoWrite) {
    DEBUG_WRITER.map(|slot| *slot = Some(writer));
}

/// Format `args` followed by `\r\n` into `sink`.
pub fn write_line(sink: &mut dyn IoWrite, args: Arguments) {
    let mut writer = LineWriter { sink };
    if writer.write_fmt(args).is_ok() {
        let _ = writer.write_str("\r\n");
    }
}

/// Print one line through the registered sink, if any.
///
/// Called by the `debug!` macro.
pub fn debug_println(args: Arguments) {
    // SAFETY: the sink is only replaced before interrupts are enabled and
    // `debug!` is not used from interrupt context.
    unsafe {
        DEBUG_WRITER.map(|slot| {
            if let Some(sink) = slot.as_mut() {
                write_line(&mut **sink, args);
            }
        });
    }
}

/// In-kernel `println()` debugging.
#[macro_export]
macro_rules! debug {
    () => ({
        // Allow an empty debug!() to print the location when hit
        $crate::debug!("{}:{}", file!(), line!())
    });
    ($msg:expr $(,)?) => ({
        $crate::debug::debug_println(format_args!($msg))
    });
    ($fmt:expr, $($arg:tt)+) => ({
        $crate::debug::debug_println(format_args!($fmt, $($arg)+))
    });
}
