// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Legal NMOS 6502 opcodes.

use super::operand::AddressMode;
use AddressMode::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyInstructionEntry {
    pub mnemonic: &'static str,
    pub mode: AddressMode,
    pub opcode: u8,
}

const fn entry(mnemonic: &'static str, mode: AddressMode, opcode: u8) -> FamilyInstructionEntry {
    FamilyInstructionEntry {
        mnemonic,
        mode,
        opcode,
    }
}

pub static FAMILY_INSTRUCTION_TABLE: &[FamilyInstructionEntry] = &[
    entry("ADC", Immediate, 0x69),
    entry("ADC", ZeroPage, 0x65),
    entry("ADC", ZeroPageX, 0x75),
    entry("ADC", Absolute, 0x6D),
    entry("ADC", AbsoluteX, 0x7D),
    entry("ADC", AbsoluteY, 0x79),
    entry("ADC", IndexedIndirectX, 0x61),
    entry("ADC", IndirectIndexedY, 0x71),
    entry("AND", Immediate, 0x29),
    entry("AND", ZeroPage, 0x25),
    entry("AND", ZeroPageX, 0x35),
    entry("AND", Absolute, 0x2D),
    entry("AND", AbsoluteX, 0x3D),
    entry("AND", AbsoluteY, 0x39),
    entry("AND", IndexedIndirectX, 0x21),
    entry("AND", IndirectIndexedY, 0x31),
    entry("ASL", Accumulator, 0x0A),
    entry("ASL", ZeroPage, 0x06),
    entry("ASL", ZeroPageX, 0x16),
    entry("ASL", Absolute, 0x0E),
    entry("ASL", AbsoluteX, 0x1E),
    entry("BCC", Relative, 0x90),
    entry("BCS", Relative, 0xB0),
    entry("BEQ", Relative, 0xF0),
    entry("BIT", ZeroPage, 0x24),
    entry("BIT", Absolute, 0x2C),
    entry("BMI", Relative, 0x30),
    entry("BNE", Relative, 0xD0),
    entry("BPL", Relative, 0x10),
    entry("BRK", Implied, 0x00),
    entry("BVC", Relative, 0x50),
    entry("BVS", Relative, 0x70),
    entry("CLC", Implied, 0x18),
    entry("CLD", Implied, 0xD8),
    entry("CLI", Implied, 0x58),
    entry("CLV", Implied, 0xB8),
    entry("CMP", Immediate, 0xC9),
    entry("CMP", ZeroPage, 0xC5),
    entry("CMP", ZeroPageX, 0xD5),
    entry("CMP", Absolute, 0xCD),
    entry("CMP", AbsoluteX, 0xDD),
    entry("CMP", AbsoluteY, 0xD9),
    entry("CMP", IndexedIndirectX, 0xC1),
    entry("CMP", IndirectIndexedY, 0xD1),
    entry("CPX", Immediate, 0xE0),
    entry("CPX", ZeroPage, 0xE4),
    entry("CPX", Absolute, 0xEC),
    entry("CPY", Immediate, 0xC0),
    entry("CPY", ZeroPage, 0xC4),
    entry("CPY", Absolute, 0xCC),
    entry("DEC", ZeroPage, 0xC6),
    entry("DEC", ZeroPageX, 0xD6),
    entry("DEC", Absolute, 0xCE),
    entry("DEC", AbsoluteX, 0xDE),
    entry("DEX", Implied, 0xCA),
    entry("DEY", Implied, 0x88),
    entry("EOR", Immediate, 0x49),
    entry("EOR", ZeroPage, 0x45),
    entry("EOR", ZeroPageX, 0x55),
    entry("EOR", Absolute, 0x4D),
    entry("EOR", AbsoluteX, 0x5D),
    entry("EOR", AbsoluteY, 0x59),
    entry("EOR", IndexedIndirectX, 0x41),
    entry("EOR", IndirectIndexedY, 0x51),
    entry("INC", ZeroPage, 0xE6),
    entry("INC", ZeroPageX, 0xF6),
    entry("INC", Absolute, 0xEE),
    entry("INC", AbsoluteX, 0xFE),
    entry("INX", Implied, 0xE8),
    entry("INY", Implied, 0xC8),
    entry("JMP", Absolute, 0x4C),
    entry("JMP", Indirect, 0x6C),
    entry("JSR", Absolute, 0x20),
    entry("LDA", Immediate, 0xA9),
    entry("LDA", ZeroPage, 0xA5),
    entry("LDA", ZeroPageX, 0xB5),
    entry("LDA", Absolute, 0xAD),
    entry("LDA", AbsoluteX, 0xBD),
    entry("LDA", AbsoluteY, 0xB9),
    entry("LDA", IndexedIndirectX, 0xA1),
    entry("LDA", IndirectIndexedY, 0xB1),
    entry("LDX", Immediate, 0xA2),
    entry("LDX", ZeroPage, 0xA6),
    entry("LDX", ZeroPageY, 0xB6),
    entry("LDX", Absolute, 0xAE),
    entry("LDX", AbsoluteY, 0xBE),
    entry("LDY", Immediate, 0xA0),
    entry("LDY", ZeroPage, 0xA4),
    entry("LDY", ZeroPageX, 0xB4),
    entry("LDY", Absolute, 0xAC),
    entry("LDY", AbsoluteX, 0xBC),
    entry("LSR", Accumulator, 0x4A),
    entry("LSR", ZeroPage, 0x46),
    entry("LSR", ZeroPageX, 0x56),
    entry("LSR", Absolute, 0x4E),
    entry("LSR", AbsoluteX, 0x5E),
    entry("NOP", Implied, 0xEA),
    entry("ORA", Immediate, 0x09),
    entry("ORA", ZeroPage, 0x05),
    entry("ORA", ZeroPageX, 0x15),
    entry("ORA", Absolute, 0x0D),
    entry("ORA", AbsoluteX, 0x1D),
    entry("ORA", AbsoluteY, 0x19),
    entry("ORA", IndexedIndirectX, 0x01),
    entry("ORA", IndirectIndexedY, 0x11),
    entry("PHA", Implied, 0x48),
    entry("PHP", Implied, 0x08),
    entry("PLA", Implied, 0x68),
    entry("PLP", Implied, 0x28),
    entry("ROL", Accumulator, 0x2A),
    entry("ROL", ZeroPage, 0x26),
    entry("ROL", ZeroPageX, 0x36),
    entry("ROL", Absolute, 0x2E),
    entry("ROL", AbsoluteX, 0x3E),
    entry("ROR", Accumulator, 0x6A),
    entry("ROR", ZeroPage, 0x66),
    entry("ROR", ZeroPageX, 0x76),
    entry("ROR", Absolute, 0x6E),
    entry("ROR", AbsoluteX, 0x7E),
    entry("RTI", Implied, 0x40),
    entry("RTS", Implied, 0x60),
    entry("SBC", Immediate, 0xE9),
    entry("SBC", ZeroPage, 0xE5),
    entry("SBC", ZeroPageX, 0xF5),
    entry("SBC", Absolute, 0xED),
    entry("SBC", AbsoluteX, 0xFD),
    entry("SBC", AbsoluteY, 0xF9),
    entry("SBC", IndexedIndirectX, 0xE1),
    entry("SBC", IndirectIndexedY, 0xF1),
    entry("SEC", Implied, 0x38),
    entry("SED", Implied, 0xF8),
    entry("SEI", Implied, 0x78),
    entry("STA", ZeroPage, 0x85),
    entry("STA", ZeroPageX, 0x95),
    entry("STA", Absolute, 0x8D),
    entry("STA", AbsoluteX, 0x9D),
    entry("STA", AbsoluteY, 0x99),
    entry("STA", IndexedIndirectX, 0x81),
    entry("STA", IndirectIndexedY, 0x91),
    entry("STX", ZeroPage, 0x86),
    entry("STX", ZeroPageY, 0x96),
    entry("STX", Absolute, 0x8E),
    entry("STY", ZeroPage, 0x84),
    entry("STY", ZeroPageX, 0x94),
    entry("STY", Absolute, 0x8C),
    entry("TAX", Implied, 0xAA),
    entry("TAY", Implied, 0xA8),
    entry("TSX", Implied, 0xBA),
    entry("TXA", Implied, 0x8A),
    entry("TXS", Implied, 0x9A),
    entry("TYA", Implied, 0x98),
];

pub fn lookup_instruction(
    mnemonic: &str,
    mode: AddressMode,
) -> Option<&'static FamilyInstructionEntry> {
    FAMILY_INSTRUCTION_TABLE
        .iter()
        .find(|entry| entry.mode == mode && entry.mnemonic.eq_ignore_ascii_case(mnemonic))
}

pub fn has_mnemonic(mnemonic: &str) -> bool {
    FAMILY_INSTRUCTION_TABLE
        .iter()
        .any(|entry| entry.mnemonic.eq_ignore_ascii_case(mnemonic))
}

pub fn has_mode(mnemonic: &str, mode: AddressMode) -> bool {
    lookup_instruction(mnemonic, mode).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn opcodes_are_unique() {
        let mut seen = HashSet::new();
        for entry in FAMILY_INSTRUCTION_TABLE {
            assert!(seen.insert(entry.opcode), "duplicate opcode {:02X}", entry.opcode);
        }
        assert_eq!(seen.len(), 151);
    }

    #[test]
    fn lookups_ignore_case() {
        assert_eq!(lookup_instruction("lda", Immediate).map(|e| e.opcode), Some(0xA9));
        assert_eq!(lookup_instruction("JMP", Indirect).map(|e| e.opcode), Some(0x6C));
        assert!(lookup_instruction("STA", Immediate).is_none());
        assert!(has_mnemonic("txs"));
        assert!(!has_mnemonic("BRA"));
        assert!(has_mode("LDX", ZeroPageY));
        assert!(!has_mode("LDA", ZeroPageY));
    }
}
