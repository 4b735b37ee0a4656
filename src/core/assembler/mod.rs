// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! CPU-agnostic assembler state shared by the driver.
//!
//! - [`conditional`] - Conditional assembly state machine
//! - [`error`] - Error types and diagnostics

pub mod conditional;
pub mod error;
