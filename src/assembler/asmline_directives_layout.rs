// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Layout directives: `.ORG`, `.SEGMENT` and `.ALIGN`.

use super::asmline_directives::{DirectiveCall, DirectiveHandler};
use super::*;

use crate::core::macro_processor::split_arguments;

pub(crate) struct OrgDirective;
pub(crate) struct SegmentDirective;
pub(crate) struct AlignDirective;

fn layout_error(message: &str, param: Option<&str>, span: Span) -> AsmError {
    AsmError::new(AsmErrorKind::Directive, message, param).with_span(span)
}

impl<'a> Assembler<'a> {
    /// Name operand written as an identifier or a string.
    pub(crate) fn take_name_operand(&mut self, call: &DirectiveCall) -> Result<String, AsmError> {
        let token = self.stream.take_if_on_line(call.line())?.ok_or_else(|| {
            layout_error(&format!("{} expects a name", call.display_name()), None, call.span)
        })?;
        match &token.kind {
            TokenKind::Identifier(name) if token.directive_name().is_none() => Ok(name.clone()),
            TokenKind::String(lit) => Ok(String::from_utf8_lossy(&lit.bytes).into_owned()),
            _ => Err(layout_error(
                &format!("{} expects a name", call.display_name()),
                Some(&token.text()),
                token.span,
            )),
        }
    }

    fn org_directive(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        let items = self.directive_operands(call, 1, 1)?;
        let address = self.eval_number(&items[0], call.span, "Origin")?;
        self.set_pc(address, call.span)
    }

    fn segment_directive(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        let name = self.take_name_operand(call)?;
        let declares = self.stream.peek(0)?.is_some_and(|t| {
            t.span.line == call.line() && t.kind == TokenKind::OpenBrace
        });
        if declares {
            let body = self.stream.take_block(call.span)?;
            let spec = self.segment_spec(&name, &body, call.span)?;
            self.linker
                .add_segment(spec)
                .map_err(|err| AsmError::from(err).with_span(call.span))?;
        }
        self.expect_line_end(call)?;
        self.select_segment(&name, call.span)
    }

    /// `{start: .., end: .., size: .., pad: .., resizable: ..}`. `end` is
    /// inclusive. Without `end` or `size` the segment grows on demand.
    fn segment_spec(&self, name: &str, body: &[Token], span: Span) -> Result<SegmentSpec, AsmError> {
        let mut start = None;
        let mut end = None;
        let mut size = None;
        let mut pad = 0u8;
        let mut resizable = None;
        for field in split_arguments(body)? {
            let Some((key, value)) = field.split_first() else {
                continue;
            };
            let TokenKind::Label(key_name) = &key.kind else {
                return Err(layout_error("Expected 'key:' in segment object", Some(&key.text()), key.span));
            };
            let number = self.eval_number(value, key.span, key_name)?;
            match key_name.to_ascii_lowercase().as_str() {
                "start" => start = Some(number),
                "end" => end = Some(number),
                "size" => size = Some(number),
                "pad" => {
                    pad = u8::try_from(number).map_err(|_| {
                        layout_error("Segment pad must fit in a byte", Some(&number.to_string()), key.span)
                    })?
                }
                "resizable" => resizable = Some(number != 0),
                _ => return Err(layout_error("Unknown segment field", Some(key_name), key.span)),
            }
        }
        let start = start.ok_or_else(|| layout_error("Segment needs a start address", Some(name), span))?;
        let size = match (size, end) {
            (Some(size), _) => Some(size),
            (None, Some(end)) if end >= start => Some(end - start + 1),
            (None, Some(end)) => {
                return Err(layout_error(
                    "Segment end lies before its start",
                    Some(&format!("${end:04X}")),
                    span,
                ))
            }
            (None, None) => None,
        };
        let start = u32::try_from(start)
            .map_err(|_| layout_error("Segment start out of range", Some(&start.to_string()), span))?;
        let bytes = u32::try_from(size.unwrap_or(0))
            .map_err(|_| layout_error("Segment size out of range", Some(name), span))?;
        let resizable = resizable.unwrap_or(size.is_none());
        Ok(SegmentSpec::new(normalize_name(name), start, bytes)
            .with_pad(pad)
            .resizable(resizable))
    }

    fn align_directive(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        let items = self.directive_operands(call, 1, 2)?;
        let boundary = self.eval_expr(&items[0], call.span)?;
        let fill = match items.get(1) {
            Some(tokens) => self.eval_number(tokens, call.span, "Fill value")?,
            None => 0,
        };
        let boundary = match boundary.value {
            Value::Number(_) if boundary.unresolved => {
                self.warning(
                    layout_error("Alignment not known in pass one", None, call.span)
                        .with_help("assuming no padding; define the boundary before .ALIGN"),
                );
                return Ok(());
            }
            Value::Number(n) => n,
            other => {
                return Err(layout_error(
                    &format!("Alignment must be a number, found {}", other.type_name()),
                    None,
                    call.span,
                ))
            }
        };
        if boundary <= 0 {
            return Err(layout_error(
                "Alignment must be positive",
                Some(&boundary.to_string()),
                call.span,
            ));
        }
        let pc = i64::from(self.pc);
        let gap = (boundary - pc % boundary) % boundary;
        let gap = self.output_length(gap, call.span)?;
        self.emit_fill(gap, fill, call.span)
    }
}

impl DirectiveHandler for OrgDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.org_directive(call)
    }
}

impl DirectiveHandler for SegmentDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.segment_directive(call)
    }

    fn skip(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.stream.take_if_on_line(call.line())?;
        let declares = asm.stream.peek(0)?.is_some_and(|t| {
            t.span.line == call.line() && t.kind == TokenKind::OpenBrace
        });
        if declares {
            asm.stream.take_block(call.span)?;
        }
        asm.stream.take_line(call.line())?;
        Ok(())
    }
}

impl DirectiveHandler for AlignDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.align_directive(call)
    }
}
