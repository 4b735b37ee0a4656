// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::operand::{AddressMode, IndexRegister, WidthHint};
use super::table::has_mode;

/// Facts about a direct operand that decide between zero page and absolute.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DirectOperand {
    pub value: i64,
    pub unresolved: bool,
    pub hint: Option<WidthHint>,
    pub pass_one_length: Option<u32>,
    pub final_pass: bool,
}

struct DirectResolutionSpec {
    zero_page_mode: AddressMode,
    absolute_mode: AddressMode,
}

impl DirectResolutionSpec {
    fn for_index(index: Option<IndexRegister>) -> Self {
        match index {
            None => Self {
                zero_page_mode: AddressMode::ZeroPage,
                absolute_mode: AddressMode::Absolute,
            },
            Some(IndexRegister::X) => Self {
                zero_page_mode: AddressMode::ZeroPageX,
                absolute_mode: AddressMode::AbsoluteX,
            },
            Some(IndexRegister::Y) => Self {
                zero_page_mode: AddressMode::ZeroPageY,
                absolute_mode: AddressMode::AbsoluteY,
            },
        }
    }
}

/// Choose zero-page or absolute addressing for `mnemonic`.
///
/// A width chosen in the first pass is kept in the second so label
/// addresses stay stable; unresolved forward references size as absolute.
pub(crate) fn resolve_direct(
    mnemonic: &str,
    index: Option<IndexRegister>,
    operand: DirectOperand,
) -> Result<AddressMode, String> {
    let spec = DirectResolutionSpec::for_index(index);
    let has_zero_page = has_mode(mnemonic, spec.zero_page_mode);
    let has_absolute = has_mode(mnemonic, spec.absolute_mode);
    if !has_zero_page && !has_absolute {
        return Err(match index {
            None => format!("{} does not take an address operand", mnemonic.to_ascii_uppercase()),
            Some(reg) => format!(
                "{} does not support {:?}-indexed addressing",
                mnemonic.to_ascii_uppercase(),
                reg
            ),
        });
    }

    let val = operand.value;
    let checked = operand.final_pass || !operand.unresolved;
    let fits_zero_page = (0..=255).contains(&val);

    match operand.hint {
        Some(WidthHint::Word) if has_absolute => return Ok(spec.absolute_mode),
        Some(WidthHint::Byte) if has_zero_page => {
            if checked && !fits_zero_page {
                return Err(format!("Value ${val:X} does not fit in zero page"));
            }
            return Ok(spec.zero_page_mode);
        }
        _ => {}
    }

    match operand.pass_one_length {
        Some(3) if has_absolute => return check_absolute(val, checked, spec.absolute_mode),
        Some(2) if has_zero_page && fits_zero_page => return Ok(spec.zero_page_mode),
        _ => {}
    }

    if operand.unresolved && !operand.final_pass && has_absolute {
        return Ok(spec.absolute_mode);
    }
    if fits_zero_page && has_zero_page {
        return Ok(spec.zero_page_mode);
    }
    if has_absolute {
        return check_absolute(val, checked, spec.absolute_mode);
    }
    if checked {
        Err(format!("Address ${val:X} out of zero-page range"))
    } else {
        Ok(spec.zero_page_mode)
    }
}

fn check_absolute(val: i64, checked: bool, mode: AddressMode) -> Result<AddressMode, String> {
    if checked && !(0..=0xFFFF).contains(&val) {
        return Err(format!("Address {val} out of 16-bit range"));
    }
    Ok(mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operand(value: i64) -> DirectOperand {
        DirectOperand {
            value,
            unresolved: false,
            hint: None,
            pass_one_length: None,
            final_pass: true,
        }
    }

    #[test]
    fn small_values_use_zero_page() {
        assert_eq!(resolve_direct("LDA", None, operand(0x80)), Ok(AddressMode::ZeroPage));
        assert_eq!(
            resolve_direct("LDA", Some(IndexRegister::X), operand(0x1234)),
            Ok(AddressMode::AbsoluteX)
        );
        assert_eq!(
            resolve_direct("LDX", Some(IndexRegister::Y), operand(0x10)),
            Ok(AddressMode::ZeroPageY)
        );
    }

    #[test]
    fn mnemonics_without_zero_page_form_use_absolute() {
        assert_eq!(resolve_direct("JMP", None, operand(0x10)), Ok(AddressMode::Absolute));
        assert_eq!(
            resolve_direct("LDA", Some(IndexRegister::Y), operand(0x10)),
            Ok(AddressMode::AbsoluteY)
        );
    }

    #[test]
    fn unresolved_values_size_as_absolute_and_stay_absolute() {
        let pass_one = DirectOperand {
            value: 0,
            unresolved: true,
            final_pass: false,
            ..operand(0)
        };
        assert_eq!(resolve_direct("LDA", None, pass_one), Ok(AddressMode::Absolute));
        let pass_two = DirectOperand {
            pass_one_length: Some(3),
            ..operand(0x20)
        };
        assert_eq!(resolve_direct("LDA", None, pass_two), Ok(AddressMode::Absolute));
    }

    #[test]
    fn width_hints_override_value_range() {
        let word = DirectOperand {
            hint: Some(WidthHint::Word),
            ..operand(0x20)
        };
        assert_eq!(resolve_direct("STA", None, word), Ok(AddressMode::Absolute));
        let byte = DirectOperand {
            hint: Some(WidthHint::Byte),
            ..operand(0x1234)
        };
        assert_eq!(
            resolve_direct("STA", None, byte),
            Err("Value $1234 does not fit in zero page".to_string())
        );
    }

    #[test]
    fn out_of_range_addresses_are_errors() {
        assert_eq!(
            resolve_direct("LDA", None, operand(0x10000)),
            Err("Address 65536 out of 16-bit range".to_string())
        );
        assert!(resolve_direct("TAX", None, operand(1)).is_err());
    }
}
