// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Library entry exposing the assembler, its core and the CPU handlers.
pub mod assembler;
pub mod core;
pub mod families;
pub mod registry_defaults;
