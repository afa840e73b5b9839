// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Core crate shared by the boot and interrupt-dispatch layers.
//!
//! This crate holds the pieces every other crate in the tree relies on:
//! compile-time configuration, the `debug!` output path, the common error
//! type, and the interface an interrupt controller must provide to the
//! dispatch trampolines.

#![warn(unreachable_pub)]
#![no_std]

pub mod config;
pub mod debug;
pub mod errorcode;
pub mod platform;
pub mod utilities;

pub use crate::errorcode::ErrorCode;
