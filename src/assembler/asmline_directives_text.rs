// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! String directives. All operands are joined into one string before the
//! terminator or length prefix is applied.

use super::asmline_directives::{DirectiveCall, DirectiveHandler};
use super::*;

use crate::core::value::text_to_bytes;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TextForm {
    /// `.TEXT`
    Plain,
    /// `.CSTR`
    ZeroTerminated,
    /// `.PSTR`: one length byte.
    LengthPrefixed,
    /// `.PSTRL`: two length bytes, low byte first.
    LongLengthPrefixed,
}

pub(crate) struct TextDirective(pub(crate) TextForm);

impl TextForm {
    fn encode(self, text: &[u8]) -> Result<Vec<u8>, String> {
        let mut out = Vec::with_capacity(text.len() + 2);
        match self {
            TextForm::Plain => out.extend_from_slice(text),
            TextForm::ZeroTerminated => {
                out.extend_from_slice(text);
                out.push(0);
            }
            TextForm::LengthPrefixed => {
                let len = u8::try_from(text.len())
                    .map_err(|_| format!("String of {} bytes is too long for a length byte", text.len()))?;
                out.push(len);
                out.extend_from_slice(text);
            }
            TextForm::LongLengthPrefixed => {
                let len = u16::try_from(text.len())
                    .map_err(|_| format!("String of {} bytes is too long for a length word", text.len()))?;
                out.extend_from_slice(&len.to_le_bytes());
                out.extend_from_slice(text);
            }
        }
        Ok(out)
    }
}

impl<'a> Assembler<'a> {
    fn text_directive(&mut self, call: &DirectiveCall, form: TextForm) -> Result<(), AsmError> {
        let items = self.take_expression_list(call.line(), call.span)?;
        if items.is_empty() {
            return Err(AsmError::new(
                AsmErrorKind::Directive,
                &format!("{} expects a string", call.display_name()),
                None,
            )
            .with_span(call.span));
        }
        let mut text = Vec::new();
        for item in &items {
            let span = item.first().map_or(call.span, |t| t.span);
            match self.eval_value(item, span)? {
                Value::Str(s) => text.extend(text_to_bytes(&s)),
                other => {
                    return Err(AsmError::new(
                        AsmErrorKind::Directive,
                        &format!(
                            "{} expects strings, found {}",
                            call.display_name(),
                            other.type_name()
                        ),
                        None,
                    )
                    .with_span(span))
                }
            }
        }
        let bytes = form.encode(&text).map_err(|msg| {
            AsmError::new(AsmErrorKind::Directive, &msg, None).with_span(call.span)
        })?;
        self.emit(&bytes, call.span)
    }
}

impl DirectiveHandler for TextDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.text_directive(call, self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forms_add_terminators_and_prefixes() {
        assert_eq!(TextForm::Plain.encode(b"AB").unwrap(), b"AB".to_vec());
        assert_eq!(TextForm::ZeroTerminated.encode(b"AB").unwrap(), vec![b'A', b'B', 0]);
        assert_eq!(TextForm::LengthPrefixed.encode(b"AB").unwrap(), vec![2, b'A', b'B']);
        assert_eq!(
            TextForm::LongLengthPrefixed.encode(b"AB").unwrap(),
            vec![2, 0, b'A', b'B']
        );
    }

    #[test]
    fn length_byte_overflow_is_an_error() {
        let long = vec![b'x'; 256];
        assert!(TextForm::LengthPrefixed.encode(&long).is_err());
        assert_eq!(TextForm::LongLengthPrefixed.encode(&long).unwrap().len(), 258);
    }
}
