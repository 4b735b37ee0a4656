// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! `.LOG`, `.WARN`, `.ERR` and `.LIST`.

use super::asmline_directives::{DirectiveCall, DirectiveHandler};
use super::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LogKind {
    Log,
    Warn,
    Err,
}

pub(crate) struct LogDirective(pub(crate) LogKind);
pub(crate) struct ListDirective;

impl<'a> Assembler<'a> {
    fn log_message(&mut self, call: &DirectiveCall) -> Result<String, AsmError> {
        let items = self.take_expression_list(call.line(), call.span)?;
        let mut parts = Vec::with_capacity(items.len());
        for item in &items {
            let span = item.first().map_or(call.span, |t| t.span);
            parts.push(self.eval_value(item, span)?.display_text());
        }
        Ok(parts.join(", "))
    }

    fn log_directive(&mut self, call: &DirectiveCall, kind: LogKind) -> Result<(), AsmError> {
        let message = self.log_message(call)?;
        match kind {
            LogKind::Log => {
                if self.listing {
                    self.logger.log(&message);
                }
                Ok(())
            }
            LogKind::Warn => {
                if self.listing {
                    self.logger.warn(&message);
                }
                self.warning(
                    AsmError::new(AsmErrorKind::User, &message, None).with_span(call.span),
                );
                Ok(())
            }
            LogKind::Err => {
                if self.listing {
                    self.logger.error(&message);
                }
                Err(AsmError::new(AsmErrorKind::User, &message, None).with_span(call.span))
            }
        }
    }

    fn list_directive(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        let tokens = self.stream.take_line(call.line())?;
        let listing = match tokens.as_slice() {
            [word] if word.is_word("ON") => true,
            [word] if word.is_word("OFF") => false,
            _ => {
                return Err(AsmError::new(
                    AsmErrorKind::Directive,
                    ".LIST expects ON or OFF",
                    None,
                )
                .with_span(tokens.first().map_or(call.span, |t| t.span)))
            }
        };
        self.listing = listing;
        Ok(())
    }
}

impl DirectiveHandler for LogDirective {
    /// Output happens once, when every symbol is known.
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.stream.take_line(call.line())?;
        Ok(())
    }

    fn handle_pass_two(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.log_directive(call, self.0)
    }
}

impl DirectiveHandler for ListDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.list_directive(call)
    }
}
