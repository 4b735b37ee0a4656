// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Data directives: `.DB`, `.DW`, `.DL`, `.HEX`, `.FILL` and `.INCBIN`.

use super::asmline_directives::{DirectiveCall, DirectiveHandler};
use super::*;

use crate::core::cpu::Endianness;
use crate::core::value::text_to_bytes;

pub(crate) struct ByteDirective;
pub(crate) struct WordDirective;
pub(crate) struct LongDirective;
pub(crate) struct HexDirective;
pub(crate) struct FillDirective;
pub(crate) struct IncbinDirective;

/// Bytes per element for `.DB`, `.DW` and `.DL`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DataWidth {
    Byte,
    Word,
    Long,
}

impl DataWidth {
    fn range(self) -> (i64, i64) {
        match self {
            DataWidth::Byte => (-0x80, 0xFF),
            DataWidth::Word => (-0x8000, 0xFFFF),
            DataWidth::Long => (i64::from(i32::MIN), i64::from(u32::MAX)),
        }
    }

    fn encode(self, value: i64, endianness: Endianness, out: &mut Vec<u8>) {
        match self {
            DataWidth::Byte => out.push(value as u8),
            DataWidth::Word => out.extend_from_slice(&endianness.word_bytes(value as u16)),
            DataWidth::Long => out.extend_from_slice(&endianness.long_bytes(value as u32)),
        }
    }
}

fn data_error(message: String, span: Span) -> AsmError {
    AsmError::new(AsmErrorKind::Directive, &message, None).with_span(span)
}

impl<'a> Assembler<'a> {
    /// Flatten one evaluated operand into output bytes. Range checks wait
    /// for pass two since forward references evaluate to placeholders.
    fn push_data(
        &self,
        value: &Value,
        width: DataWidth,
        call: &DirectiveCall,
        span: Span,
        out: &mut Vec<u8>,
    ) -> Result<(), AsmError> {
        let endianness = self.cpu.endianness();
        match value {
            Value::Number(n) => {
                let (low, high) = width.range();
                if self.is_final_pass() && (*n < low || *n > high) {
                    return Err(data_error(
                        format!("Value {n} out of range for {}", call.display_name()),
                        span,
                    ));
                }
                width.encode(*n, endianness, out);
            }
            Value::Str(text) => {
                for byte in text_to_bytes(text) {
                    width.encode(i64::from(byte), endianness, out);
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.push_data(item, width, call, span, out)?;
                }
            }
            Value::Tokens(_) => {
                return Err(data_error(
                    format!("{} cannot emit a token sequence", call.display_name()),
                    span,
                ))
            }
        }
        Ok(())
    }

    fn data_directive(&mut self, call: &DirectiveCall, width: DataWidth) -> Result<(), AsmError> {
        let items = self.take_expression_list(call.line(), call.span)?;
        if items.is_empty() {
            return Err(data_error(
                format!("{} expects at least one value", call.display_name()),
                call.span,
            ));
        }
        let mut bytes = Vec::new();
        for item in &items {
            let span = item.first().map_or(call.span, |t| t.span);
            let value = self.eval_value(item, span)?;
            self.push_data(&value, width, call, span, &mut bytes)?;
        }
        self.emit(&bytes, call.span)
    }

    fn hex_directive(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        let raw = self.stream.read_raw_body()?;
        let TokenKind::RawText(text) = &raw.kind else {
            return Err(data_error("Expected hex digits".to_string(), call.span));
        };
        let bytes = parse_hex_digits(text).map_err(|msg| data_error(msg, raw.span))?;
        self.emit(&bytes, call.span)
    }

    fn fill_directive(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        let items = self.directive_operands(call, 1, 2)?;
        let count = self.eval_number(&items[0], call.span, "Fill count")?;
        if count < 0 {
            return Err(data_error(
                format!("{} count must not be negative", call.display_name()),
                call.span,
            ));
        }
        let count = self.output_length(count, call.span)?;
        let value = match items.get(1) {
            Some(tokens) => self.eval_number(tokens, call.span, "Fill value")?,
            None => 0,
        };
        self.emit_fill(count, value, call.span)
    }

    /// `count` copies of `value`. The bytes are only built in pass two.
    pub(crate) fn emit_fill(&mut self, count: u32, value: i64, span: Span) -> Result<(), AsmError> {
        if !self.is_final_pass() {
            return self.reserve(count, span);
        }
        if !(-0x80..=0xFF).contains(&value) {
            return Err(data_error(
                format!("Fill value {value} does not fit in a byte"),
                span,
            ));
        }
        let length = usize::try_from(count)
            .map_err(|_| data_error("Fill too large".to_string(), span))?;
        self.emit(&vec![value as u8; length], span)
    }

    fn incbin_directive(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        let items = self.directive_operands(call, 1, 3)?;
        let name = match self.eval_value(&items[0], call.span)? {
            Value::Str(name) => name,
            other => {
                return Err(data_error(
                    format!("File name must be a string, found {}", other.type_name()),
                    call.span,
                ))
            }
        };
        let offset = match items.get(1) {
            Some(tokens) => self.eval_number(tokens, call.span, "Offset")?,
            None => 0,
        };
        let length = match items.get(2) {
            Some(tokens) => Some(self.eval_number(tokens, call.span, "Length")?),
            None => None,
        };

        let data = match self.sources.read_binary_file(&name) {
            Ok(data) => data,
            Err(err) => {
                let err = AsmError::new(
                    AsmErrorKind::Io,
                    "Cannot read binary file",
                    Some(&format!("{name}: {err}")),
                )
                .with_span(call.span);
                if self.is_final_pass() {
                    return Err(err);
                }
                self.warning(err);
                return Ok(());
            }
        };

        let start = usize::try_from(offset)
            .ok()
            .filter(|start| *start <= data.len())
            .ok_or_else(|| {
                data_error(
                    format!("Offset {offset} is outside '{name}' ({} bytes)", data.len()),
                    call.span,
                )
            })?;
        let end = match length {
            None => data.len(),
            Some(length) => usize::try_from(length)
                .ok()
                .and_then(|length| start.checked_add(length))
                .filter(|end| *end <= data.len())
                .ok_or_else(|| {
                    data_error(
                        format!("Length {length} runs past the end of '{name}'"),
                        call.span,
                    )
                })?,
        };
        log::trace!("incbin {name}: {} byte(s) from offset {start}", end - start);
        self.emit(&data[start..end], call.span)
    }
}

/// Whitespace-separated groups of hex digit pairs.
fn parse_hex_digits(text: &str) -> Result<Vec<u8>, String> {
    let mut out = Vec::new();
    for group in text.split_whitespace() {
        if group.len() % 2 != 0 {
            return Err(format!("Odd number of hex digits in '{group}'"));
        }
        for pair in group.as_bytes().chunks(2) {
            let digits = std::str::from_utf8(pair).map_err(|_| format!("Invalid hex digits '{group}'"))?;
            let byte =
                u8::from_str_radix(digits, 16).map_err(|_| format!("Invalid hex digits '{digits}'"))?;
            out.push(byte);
        }
    }
    Ok(out)
}

impl DirectiveHandler for ByteDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.data_directive(call, DataWidth::Byte)
    }
}

impl DirectiveHandler for WordDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.data_directive(call, DataWidth::Word)
    }
}

impl DirectiveHandler for LongDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.data_directive(call, DataWidth::Long)
    }
}

impl DirectiveHandler for HexDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.hex_directive(call)
    }

    fn skip(&self, asm: &mut Assembler<'_>, _call: &DirectiveCall) -> Result<(), AsmError> {
        asm.stream.read_raw_body()?;
        Ok(())
    }
}

impl DirectiveHandler for FillDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.fill_directive(call)
    }
}

impl DirectiveHandler for IncbinDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.incbin_directive(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_digits_parse_in_groups() {
        assert_eq!(parse_hex_digits("0A 0b\tFF").unwrap(), vec![0x0A, 0x0B, 0xFF]);
        assert_eq!(parse_hex_digits("DEADBEEF").unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(parse_hex_digits("").unwrap().is_empty());
    }

    #[test]
    fn hex_digits_reject_bad_groups() {
        assert!(parse_hex_digits("ABC").is_err());
        assert!(parse_hex_digits("0G").is_err());
    }

    #[test]
    fn widths_follow_endianness() {
        let mut out = Vec::new();
        DataWidth::Word.encode(0x1234, Endianness::Little, &mut out);
        DataWidth::Word.encode(0x1234, Endianness::Big, &mut out);
        DataWidth::Long.encode(-1, Endianness::Little, &mut out);
        assert_eq!(out, vec![0x34, 0x12, 0x12, 0x34, 0xFF, 0xFF, 0xFF, 0xFF]);
    }
}
