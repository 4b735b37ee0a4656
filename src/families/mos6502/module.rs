// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! MOS 6502 CPU module registration.

use crate::core::cpu::{CpuHandler, CpuType};
use crate::core::registry::CpuModule;

use super::M6502CpuHandler;

pub const CPU_ID: CpuType = CpuType::new("m6502");
const CPU_NAME: &str = "6502";
const CPU_ALIASES: &[&str] = &["mos6502", "nmos6502"];

/// Sorted, lowercase list of the mnemonics this CPU accepts.
pub fn form_mnemonics() -> Vec<String> {
    let mut mnemonics: Vec<String> = super::table::FAMILY_INSTRUCTION_TABLE
        .iter()
        .map(|entry| entry.mnemonic.to_ascii_lowercase())
        .collect();
    mnemonics.sort();
    mnemonics.dedup();
    mnemonics
}

pub struct M6502CpuModule;

impl CpuModule for M6502CpuModule {
    fn cpu_id(&self) -> CpuType {
        CPU_ID
    }

    fn cpu_name(&self) -> &'static str {
        CPU_NAME
    }

    fn cpu_aliases(&self) -> &'static [&'static str] {
        CPU_ALIASES
    }

    fn handler(&self) -> Box<dyn CpuHandler> {
        Box::new(M6502CpuHandler::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_all_legal_mnemonics() {
        let mnemonics = form_mnemonics();
        assert_eq!(mnemonics.len(), 56);
        assert_eq!(mnemonics.first().map(String::as_str), Some("adc"));
        assert_eq!(mnemonics.last().map(String::as_str), Some("tya"));
    }

    #[test]
    fn module_builds_little_endian_handler() {
        let handler = M6502CpuModule.handler();
        assert_eq!(handler.name(), "6502");
        assert_eq!(handler.default_instruction_length(), 3);
    }
}
