// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Default CPU registry construction shared by the library and the CLI.

use crate::core::registry::CpuRegistry;
use crate::families::mos6502::M6502CpuModule;

/// Build the default registry. The first registered CPU is the default for
/// sources that never select one.
pub fn build_default_registry() -> CpuRegistry {
    let mut registry = CpuRegistry::new();
    registry.register_cpu(Box::new(M6502CpuModule));
    registry
}
