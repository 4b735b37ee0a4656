// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Directives that change what names mean or where source comes from:
//! `.DEFINE`, `.NAMESPACE`, `.INCLUDE`, `.OPTION` and `.CPU`.

use super::asmline_directives::{DirectiveCall, DirectiveHandler};
use super::*;

use crate::core::tokenizer::LOCAL_LABEL_CHARS;

pub(crate) struct DefineDirective;
pub(crate) struct NamespaceDirective;
pub(crate) struct IncludeDirective;
pub(crate) struct OptionDirective;
pub(crate) struct CpuDirective;

fn scope_error(kind: AsmErrorKind, message: &str, param: Option<&str>, span: Span) -> AsmError {
    AsmError::new(kind, message, param).with_span(span)
}

impl<'a> Assembler<'a> {
    /// True when a `.DEFINE` continues with a raw body rather than tokens.
    fn define_is_raw(&mut self, line: u32) -> Result<bool, AsmError> {
        if !self.stream.line_continues(line)? {
            return Ok(true);
        }
        Ok(self
            .stream
            .peek(0)?
            .is_some_and(|t| matches!(t.kind, TokenKind::RawText(_))))
    }

    fn define_directive(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        let name = self.take_name_operand(call)?;
        let value = if self.define_is_raw(call.line())? {
            let raw = self.stream.read_raw_body()?;
            let TokenKind::RawText(text) = &raw.kind else {
                return Err(scope_error(AsmErrorKind::Directive, "Expected a block body", None, raw.span));
            };
            self.options
                .block_processor
                .process(&name, text)
                .map_err(|msg| scope_error(AsmErrorKind::Directive, &msg, None, call.span))?
        } else {
            let tokens = self.stream.take_line(call.line())?;
            Value::Tokens(Rc::from(tokens))
        };
        match self.symbols.define(&name, value) {
            SymbolTableResult::Ok => Ok(()),
            SymbolTableResult::Duplicate => Err(scope_error(
                AsmErrorKind::Symbol,
                "Symbol already defined",
                Some(&normalize_name(&name)),
                call.span,
            )),
            _ => Err(scope_error(
                AsmErrorKind::Symbol,
                "Cannot define symbol",
                Some(&normalize_name(&name)),
                call.span,
            )),
        }
    }

    fn skip_define(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        if self.stream.take_if_on_line(call.line())?.is_none() {
            return Ok(());
        }
        if self.define_is_raw(call.line())? {
            self.stream.read_raw_body()?;
        } else {
            self.stream.take_line(call.line())?;
        }
        Ok(())
    }

    fn opens_block(&mut self, call: &DirectiveCall) -> Result<bool, AsmError> {
        Ok(self
            .stream
            .peek(0)?
            .is_some_and(|t| t.span.line == call.line() && t.kind == TokenKind::OpenBrace))
    }

    fn namespace_directive(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        if !self.stream.line_continues(call.line())? {
            return match self.symbols.pop_namespace() {
                SymbolTableResult::Ok => Ok(()),
                _ => Err(scope_error(
                    AsmErrorKind::Directive,
                    "No namespace to close",
                    None,
                    call.span,
                )),
            };
        }
        let name = self.take_name_operand(call)?;
        if self.opens_block(call)? {
            let body = self.stream.take_block(call.span)?;
            self.expect_line_end(call)?;
            self.symbols.push_namespace(&name);
            let id = self.stream.push_tokens(Rc::from(body), None, None)?;
            self.continuations.insert(id, Continuation::Namespace);
            return Ok(());
        }
        self.expect_line_end(call)?;
        self.symbols.push_namespace(&name);
        Ok(())
    }

    fn skip_namespace(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        self.stream.take_if_on_line(call.line())?;
        if self.opens_block(call)? {
            self.stream.take_block(call.span)?;
        }
        self.stream.take_line(call.line())?;
        Ok(())
    }

    fn include_directive(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        let items = self.directive_operands(call, 1, 1)?;
        let name = match self.eval_value(&items[0], call.span)? {
            Value::Str(name) => name,
            other => {
                return Err(scope_error(
                    AsmErrorKind::Directive,
                    &format!("File name must be a string, found {}", other.type_name()),
                    None,
                    call.span,
                ))
            }
        };
        let text = match self.sources.read_source_file(&name) {
            Ok(text) => text,
            Err(err) => {
                let err = scope_error(
                    AsmErrorKind::Io,
                    "Cannot read include file",
                    Some(&format!("{name}: {err}")),
                    call.span,
                );
                if self.is_final_pass() {
                    return Err(err);
                }
                self.warning(err);
                return Ok(());
            }
        };
        log::debug!("include {name} ({} byte(s))", text.len());
        self.remember_file(&name, &text);
        let id = self.stream.push_source(&name, &text)?;
        self.continuations.insert(id, Continuation::Include { name });
        Ok(())
    }

    fn option_directive(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        let tokens = self.stream.take_line(call.line())?;
        let (key, value) = match tokens.as_slice() {
            [key, value] => (key, value),
            _ => {
                return Err(scope_error(
                    AsmErrorKind::Directive,
                    ".OPTION expects a name and a value",
                    None,
                    call.span,
                ))
            }
        };
        if !key.is_word("local_label_style") {
            return Err(scope_error(
                AsmErrorKind::Directive,
                "Unknown option",
                Some(&key.text()),
                key.span,
            ));
        }
        let style = match &value.kind {
            TokenKind::String(lit) if lit.bytes.len() == 1 => Some(char::from(lit.bytes[0])),
            _ => None,
        };
        match style.filter(|ch| LOCAL_LABEL_CHARS.contains(ch)) {
            Some(ch) => {
                self.stream.set_local_label_char(ch);
                Ok(())
            }
            None => Err(scope_error(
                AsmErrorKind::Directive,
                "Invalid local label style",
                Some(&value.text()),
                value.span,
            )
            .with_help("use \":\" or \"@\"")),
        }
    }

    fn cpu_directive(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        let name = self.take_name_operand(call)?;
        self.expect_line_end(call)?;
        let handler = self.registry.handler_by_name(&name).map_err(|err| {
            scope_error(AsmErrorKind::Directive, &err.to_string(), None, call.span).with_help(
                format!("known CPUs: {}", self.registry.cpu_name_list().join(", ")),
            )
        })?;
        log::debug!("cpu {} at line {}", handler.name(), call.line());
        self.cpu = handler;
        Ok(())
    }
}

impl DirectiveHandler for DefineDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.define_directive(call)
    }

    fn skip(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.skip_define(call)
    }
}

impl DirectiveHandler for NamespaceDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.namespace_directive(call)
    }

    fn skip(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.skip_namespace(call)
    }
}

impl DirectiveHandler for IncludeDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.include_directive(call)
    }
}

impl DirectiveHandler for OptionDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.option_directive(call)
    }
}

impl DirectiveHandler for CpuDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.cpu_directive(call)
    }
}
