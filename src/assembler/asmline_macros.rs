// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! `.MACRO` definitions and macro calls.
//!
//! A call binds its arguments, substitutes them into the body and pushes
//! the result as a token frame with the bindings attached. Each call runs
//! in its own ephemeral scope so labels inside the body stay private.

use super::asmline_directives::{DirectiveCall, DirectiveHandler};
use super::*;

use crate::core::macro_processor::{
    bind_arguments, parse_call_arguments, parse_macro_header, substitute, MacroDefinition,
    MAX_MACRO_DEPTH,
};

pub(crate) struct MacroDirective;

impl<'a> Assembler<'a> {
    fn macro_directive(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        let header = self.take_header(call)?;
        let header = parse_macro_header(&header, call.span)?;
        let body = self.stream.take_block(call.span)?;
        let end_position = self.stream.position();
        log::trace!(
            "macro {} ({} param(s), {} token(s))",
            header.name,
            header.params.len(),
            body.len()
        );
        self.macros.define(MacroDefinition {
            name: header.name,
            params: header.params,
            rest: header.rest,
            body: Rc::from(body),
            end_position,
            file: self.current_file.clone(),
            span: call.span,
            pass: self.pass,
        })?;
        Ok(())
    }

    /// Pass two meets each source-level definition again. Its body is
    /// already known, so resume after it instead of capturing it twice.
    fn macro_directive_again(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        if !self.stream.top_is_source() {
            return self.macro_directive(call);
        }
        let header: Vec<Token> = self
            .stream
            .peek_line(call.line())?
            .into_iter()
            .take_while(|t| t.kind != TokenKind::OpenBrace)
            .collect();
        let known = parse_macro_header(&header, call.span)
            .ok()
            .and_then(|header| self.macros.get(&header.name))
            .filter(|def| {
                def.pass < self.pass && def.span == call.span && def.file == self.current_file
            });
        let Some(previous) = known else {
            return self.macro_directive(call);
        };
        let Some(end) = &previous.end_position else {
            return self.macro_directive(call);
        };
        self.stream.seek(end)?;
        let mut def = previous.as_ref().clone();
        def.pass = self.pass;
        self.macros.define(def)?;
        Ok(())
    }

    pub(crate) fn expand_macro(&mut self, name: &str, span: Span) -> Result<(), AsmError> {
        let Some(def) = self.macros.get(name) else {
            return Err(AsmError::new(AsmErrorKind::Macro, "Unknown macro", Some(name)).with_span(span));
        };
        if self.macro_depth >= MAX_MACRO_DEPTH {
            return Err(AsmError::new(
                AsmErrorKind::Macro,
                &format!("Macro expansion depth limit ({MAX_MACRO_DEPTH}) exceeded"),
                None,
            )
            .with_span(span)
            .with_help(format!("check '{}' for unbounded recursion", def.name)));
        }
        let tokens = self.stream.take_line(span.line)?;
        let args = parse_call_arguments(&tokens)?;
        let bound = bind_arguments(&def, args, span)?;
        let body = substitute(&def.body, &bound);

        let key = self.allocate_scope_key();
        self.symbols.push_scope(key);
        let id = self.stream.push_tokens(Rc::from(body), Some(bound), None)?;
        self.continuations.insert(
            id,
            Continuation::Macro {
                name: def.name.clone(),
            },
        );
        self.macro_depth += 1;
        log::debug!("expand {} at line {} (depth {})", def.name, span.line, self.macro_depth);
        Ok(())
    }
}

impl DirectiveHandler for MacroDirective {
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.macro_directive(call)
    }

    fn handle_pass_two(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.macro_directive_again(call)
    }

    /// Definitions inside a false branch are dropped, but their bodies may
    /// hold `.END` lines that must not close the branch.
    fn skip(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.take_header(call)?;
        asm.stream.take_block(call.span)?;
        Ok(())
    }
}
