// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! MOS 6502 CPU handler (documented NMOS opcodes).

mod handler;
pub mod module;
pub mod operand;
mod operand_resolution;
mod table;

pub use handler::M6502CpuHandler;
pub use module::M6502CpuModule;
pub use operand::AddressMode;
pub use table::{has_mnemonic, lookup_instruction, FamilyInstructionEntry, FAMILY_INSTRUCTION_TABLE};

