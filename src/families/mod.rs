// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! CPU implementations.
//!
//! Each module here implements the handler contract from `core::cpu` for one
//! processor and exposes a `CpuModule` for the registry.

pub mod mos6502;
