// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! `.FOR x OF array` and `.REPEAT n [AS x]`.
//!
//! The body is captured once and memoized in the stream. Each iteration
//! opens an ephemeral scope, binds the loop variable there and replays the
//! body; the frame-end continuation starts the next iteration.

use super::asmline_directives::{DirectiveCall, DirectiveHandler};
use super::engine::LoopState;
use super::*;

pub(crate) struct ForDirective;
pub(crate) struct RepeatDirective;

/// Upper bound on `.REPEAT` counts.
const MAX_REPEAT: i64 = 1 << 20;

fn loop_error(message: &str, param: Option<&str>, span: Span) -> AsmError {
    AsmError::new(AsmErrorKind::Directive, message, param).with_span(span)
}

fn loop_variable(token: &Token, call: &DirectiveCall) -> Result<String, AsmError> {
    match token.identifier() {
        Some(name) if token.directive_name().is_none() => Ok(name.to_string()),
        _ => Err(loop_error(
            &format!("{} expects a variable name", call.display_name()),
            Some(&token.text()),
            token.span,
        )),
    }
}

impl<'a> Assembler<'a> {
    fn for_directive(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        let header = self.take_header(call)?;
        let (variable, expr) = match header.as_slice() {
            [var, of, expr @ ..] if of.is_word("OF") && !expr.is_empty() => {
                (loop_variable(var, call)?, expr)
            }
            _ => {
                return Err(loop_error(
                    ".FOR expects 'name OF expression'",
                    None,
                    call.span,
                ))
            }
        };
        let items = match self.eval_value(expr, call.span)? {
            Value::Array(items) => items,
            Value::Str(text) => text.chars().map(|ch| Value::Number(i64::from(u32::from(ch)))).collect(),
            other => {
                return Err(loop_error(
                    &format!(".FOR expects an array, found {}", other.type_name()),
                    None,
                    expr[0].span,
                ))
            }
        };
        self.start_loop(call, Some(variable), items)
    }

    fn repeat_directive(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        let header = self.take_header(call)?;
        let split = header.iter().position(|t| t.is_word("AS"));
        let (count_tokens, variable) = match split {
            Some(at) => match &header[at + 1..] {
                [var] => (&header[..at], Some(loop_variable(var, call)?)),
                _ => {
                    return Err(loop_error(
                        ".REPEAT expects a single name after AS",
                        None,
                        header[at].span,
                    ))
                }
            },
            None => (&header[..], None),
        };
        let count = self.eval_number(count_tokens, call.span, "Repeat count")?;
        if !(0..=MAX_REPEAT).contains(&count) {
            return Err(loop_error(
                "Repeat count out of range",
                Some(&count.to_string()),
                call.span,
            ));
        }
        let items = (0..count).map(Value::Number).collect();
        self.start_loop(call, variable, items)
    }

    fn start_loop(
        &mut self,
        call: &DirectiveCall,
        variable: Option<String>,
        items: Vec<Value>,
    ) -> Result<(), AsmError> {
        let body = self.stream.take_block(call.span)?;
        let cache_key = self.allocate_block_key(&call.name);
        log::trace!(
            "{} at line {}: {} iteration(s)",
            call.display_name(),
            call.line(),
            items.len()
        );
        self.stream.remember(&cache_key, Rc::from(body));
        self.next_iteration(LoopState {
            cache_key,
            variable,
            items,
            next: 0,
        })
    }

    /// Replay the body for the next item, or release it when done.
    pub(crate) fn next_iteration(&mut self, state: LoopState) -> Result<(), AsmError> {
        let Some(item) = state.items.get(state.next).cloned() else {
            self.stream.forget(&state.cache_key);
            return Ok(());
        };
        let key = self.allocate_scope_key();
        self.symbols.push_scope(key);
        if let Some(variable) = &state.variable {
            if self.symbols.define(variable, item) != SymbolTableResult::Ok {
                return Err(AsmError::new(
                    AsmErrorKind::Symbol,
                    "Cannot bind loop variable",
                    Some(&normalize_name(variable)),
                ));
            }
        }
        let id = self.stream.push_cached(&state.cache_key, None)?;
        self.continuations.insert(
            id,
            Continuation::Loop(LoopState {
                next: state.next + 1,
                ..state
            }),
        );
        Ok(())
    }
}

fn skip_loop(asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
    asm.take_header(call)?;
    asm.stream.take_block(call.span)?;
    Ok(())
}

impl DirectiveHandler for ForDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.for_directive(call)
    }

    fn skip(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        skip_loop(asm, call)
    }
}

impl DirectiveHandler for RepeatDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.repeat_directive(call)
    }

    fn skip(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        skip_loop(asm, call)
    }
}
