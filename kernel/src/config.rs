// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Data structure for storing compile-time configuration options.
//!
//! Configuration is a typed `const` object rather than scattered
//! `#[cfg(feature = ...)]` attributes. Every code path is type-checked by the
//! compiler whether or not an option is enabled, and the compiler folds the
//! constant so a disabled option costs nothing in the final binary.
//!
//! Cargo features only feed the values below. This file is the only place in
//! the tree where `cfg!(feature = ...)` may appear.

/// Data structure holding compile-time configuration options.
pub struct Config {
    /// Whether the dispatch model should trace controller transitions.
    ///
    /// If enabled, every acknowledge and end-of-interrupt performed by
    /// `arm7tdmi::dispatch::Core` is printed on the debug output together
    /// with the priority level entered or left.
    pub trace_dispatch: bool,

    /// Whether terminal halts should print a message before spinning.
    ///
    /// Only `exit` (the application entry point returning) can use this; the
    /// exception vectors halt without touching memory.
    pub debug_halts: bool,

    /// Whether the interrupt controller runs in protect mode.
    ///
    /// In protect mode the controller only pushes its priority stack when the
    /// vector register is written back, so a debugger reading the vector
    /// register does not corrupt the controller state. The IRQ trampoline
    /// always performs the write-back; this option only decides whether the
    /// controller is told to honour it.
    pub interrupt_protect_mode: bool,
}

/// A unique instance of `Config` where compile-time configuration options are
/// defined.
pub const CONFIG: Config = Config {
    trace_dispatch: cfg!(feature = "trace_dispatch"),
    debug_halts: !cfg!(feature = "no_debug_halts"),
    interrupt_protect_mode: cfg!(feature = "protect_mode"),
};
