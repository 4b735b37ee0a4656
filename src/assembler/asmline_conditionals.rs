// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Conditional assembly directives.
//!
//! These run whether or not the current branch is assembling, so each one
//! implements `skip` in terms of its own bookkeeping.

use super::asmline_directives::{DirectiveCall, DirectiveHandler};
use super::*;

pub(crate) struct IfDirective;
pub(crate) struct ElseIfDirective;
pub(crate) struct ElseDirective;
pub(crate) struct EndDirective;

impl<'a> Assembler<'a> {
    fn condition(&mut self, call: &DirectiveCall, evaluate: bool) -> Result<bool, AsmError> {
        let tokens = self.stream.take_line(call.line())?;
        if !evaluate {
            return Ok(false);
        }
        if tokens.is_empty() {
            return Err(AsmError::new(
                AsmErrorKind::Conditional,
                &format!("{} requires a condition", call.display_name()),
                None,
            )
            .with_span(call.span));
        }
        Ok(self.eval_value(&tokens, call.span)?.is_truthy())
    }

    fn open_conditional(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        let parent_active = self.conditionals.assembling();
        let condition = self.condition(call, parent_active)?;
        let ctx = ConditionalContext::new(
            parent_active,
            condition,
            self.stream.top_id(),
            call.span,
            self.current_file.clone(),
        );
        self.conditionals.push(ctx);
        Ok(())
    }

    fn conditional_error(call: &DirectiveCall, message: String) -> AsmError {
        AsmError::new(AsmErrorKind::Conditional, &message, None).with_span(call.span)
    }

    fn else_if(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        self.check_block_owner(call)?;
        let evaluate = self.conditionals.else_if_needs_condition();
        let condition = self.condition(call, evaluate)?;
        self.conditionals
            .else_if(condition)
            .map_err(|err| Self::conditional_error(call, err.to_string()))
    }

    fn else_branch(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        self.check_block_owner(call)?;
        self.expect_line_end(call)?;
        self.conditionals
            .else_branch()
            .map_err(|err| Self::conditional_error(call, err.to_string()))
    }

    fn end_conditional(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        if self.conditionals.is_empty() {
            return Err(Self::conditional_error(
                call,
                ".END found without an open block".to_string(),
            ));
        }
        self.check_block_owner(call)?;
        self.expect_line_end(call)?;
        self.conditionals.pop();
        Ok(())
    }

    /// Blocks must be closed in the frame that opened them.
    fn check_block_owner(&self, call: &DirectiveCall) -> Result<(), AsmError> {
        match self.conditionals.last() {
            Some(ctx) if ctx.frame.is_some() && ctx.frame != self.stream.top_id() => {
                Err(Self::conditional_error(
                    call,
                    format!(
                        "{} does not belong to the .IF opened at line {}",
                        call.display_name(),
                        ctx.span.line
                    ),
                ))
            }
            _ => Ok(()),
        }
    }
}

impl DirectiveHandler for IfDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.open_conditional(call)
    }

    fn skip(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.open_conditional(call)
    }
}

impl DirectiveHandler for ElseIfDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.else_if(call)
    }

    fn skip(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.else_if(call)
    }
}

impl DirectiveHandler for ElseDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.else_branch(call)
    }

    fn skip(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.else_branch(call)
    }
}

impl DirectiveHandler for EndDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.end_conditional(call)
    }

    fn skip(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.end_conditional(call)
    }
}
