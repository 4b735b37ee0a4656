// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::*;

impl<'a> Assembler<'a> {
    /// Run one traversal over the token stream.
    pub(crate) fn run_pass(&mut self, pass: u8) -> Result<(), AsmError> {
        log::debug!("pass {pass}: start");
        self.begin_pass(pass)?;
        loop {
            match self.stream.next()? {
                StreamEvent::Token(token) => self.statement(token)?,
                StreamEvent::FrameEnded(end) => self.frame_ended(end)?,
                StreamEvent::Exhausted => break,
            }
        }
        self.finish_pass()?;
        log::debug!(
            "pass {pass}: done, pc ${:04X}, {} warning(s)",
            self.pc,
            self.counts.warnings
        );
        Ok(())
    }

    fn begin_pass(&mut self, pass: u8) -> Result<(), AsmError> {
        self.pass = pass;
        self.stream = StreamManager::new().with_local_label_char(self.options.local_label_char);
        self.continuations.clear();
        self.symbols.begin_pass(pass);
        self.conditionals.clear();
        self.linker = Linker::new();
        self.cpu = Self::initial_cpu(&self.registry, self.options)?;
        self.pc = 0;
        self.active_segment = None;
        self.segment_pcs.clear();
        self.next_scope_key = 0;
        self.next_block_key = 0;
        self.macro_depth = 0;
        self.last_global = None;
        self.anon_seen = 0;
        self.instruction_index = 0;
        self.listing = true;
        self.current_file = self.main_name.clone();
        if pass == 1 {
            self.anon_labels.clear();
            self.instruction_lengths.clear();
            self.default_origin = None;
        }

        for spec in &self.options.segments {
            self.linker.add_segment(spec.clone())?;
        }
        if let Some(first) = self.options.segments.first() {
            self.linker.use_segment(&first.name)?;
            self.active_segment = Some(normalize_name(&first.name));
            self.pc = first.start;
        } else if let Some(origin) = self.default_origin.filter(|_| self.is_final_pass()) {
            self.linker
                .add_segment(SegmentSpec::new(DEFAULT_SEGMENT, origin, 0).resizable(true))?;
            self.linker.use_segment(DEFAULT_SEGMENT)?;
            self.active_segment = Some(DEFAULT_SEGMENT.to_string());
        }

        for (name, value) in &self.options.defines {
            if self.symbols.define(name, value.clone()) == SymbolTableResult::Duplicate {
                return Err(AsmError::new(
                    AsmErrorKind::Cli,
                    "Symbol defined more than once",
                    Some(name),
                ));
            }
        }

        let id = self.stream.push_source(&self.main_name, &self.main_text)?;
        self.continuations.insert(id, Continuation::Source);
        Ok(())
    }

    fn finish_pass(&mut self) -> Result<(), AsmError> {
        if let Some(open) = self.conditionals.last() {
            self.current_file = open.file.clone();
            return Err(
                AsmError::new(AsmErrorKind::Conditional, "Unterminated .IF block", None)
                    .with_span(open.span),
            );
        }
        Ok(())
    }

    /// Dispatch one statement starting at `token`.
    fn statement(&mut self, token: Token) -> Result<(), AsmError> {
        if let Some(name) = self.stream.current_name() {
            if name != self.current_file {
                self.current_file = name.to_string();
            }
        }
        if self.pass == 1 {
            self.counts.lines += 1;
        }
        if !self.conditionals.assembling() {
            return self.skip_statement(&token);
        }
        match &token.kind {
            TokenKind::Label(name) => self.define_label(name, token.span),
            TokenKind::LocalLabel(local) => {
                let full = self.expand_local_name(local);
                self.define_address(&full, token.span)
            }
            TokenKind::AnonLabelDef => {
                self.define_anonymous_label();
                Ok(())
            }
            TokenKind::Identifier(name) => match token.directive_name() {
                Some(directive) => self.directive(&directive, &token),
                None => self.identifier_statement(name, &token),
            },
            _ => Err(AsmError::new(
                AsmErrorKind::Syntax,
                "Unexpected token at start of statement",
                Some(&token.text()),
            )
            .with_span(token.span)),
        }
    }

    /// Consume a statement while conditional assembly is off.
    fn skip_statement(&mut self, token: &Token) -> Result<(), AsmError> {
        if let Some(name) = token.directive_name() {
            if let Some(handler) = asmline_directives::lookup(&name) {
                let call = asmline_directives::DirectiveCall::new(&name, token);
                return handler
                    .skip(self, &call)
                    .map_err(|err| err.or_span(token.span));
            }
        }
        self.stream.take_line(token.span.line)?;
        Ok(())
    }

    fn identifier_statement(&mut self, name: &str, token: &Token) -> Result<(), AsmError> {
        let line = token.span.line;
        let assigns = self.stream.peek(0)?.is_some_and(|next| {
            next.span.line == line && next.kind == TokenKind::Operator(OperatorKind::Assign)
        });
        if assigns {
            self.stream.advance(1)?;
            return self.assignment(name, token.span);
        }
        if self.macros.contains(name) {
            return self.expand_macro(name, token.span);
        }
        self.instruction(name, token)
    }

    /// `NAME = expr`. The symbol may be reassigned later.
    fn assignment(&mut self, name: &str, span: Span) -> Result<(), AsmError> {
        let tokens = self.stream.take_line(span.line)?;
        if tokens.is_empty() {
            return Err(
                AsmError::new(AsmErrorKind::Syntax, "Expected expression after '='", None)
                    .with_span(span),
            );
        }
        let value = self.eval_value(&tokens, span)?;
        match self.symbols.assign(name, value) {
            SymbolTableResult::Ok => Ok(()),
            _ => Err(AsmError::new(
                AsmErrorKind::Symbol,
                "Cannot assign symbol",
                Some(&normalize_name(name)),
            )
            .with_span(span)),
        }
    }

    /// CPU instruction, or a label without a colon when the handler does not
    /// know the mnemonic.
    fn instruction(&mut self, mnemonic: &str, token: &Token) -> Result<(), AsmError> {
        let line = token.span.line;
        let operands = self.stream.peek_line(line)?;
        let pass_one_length = if self.is_final_pass() {
            self.instruction_lengths.get(self.instruction_index).copied()
        } else {
            None
        };
        let request = ResolveRequest {
            mnemonic,
            operands: &operands,
            pass_one_length,
            span: token.span,
        };
        self.last_eval_error.replace(None);
        let eval: &dyn OperandEvaluator = &*self;
        let resolved = self.cpu.resolve_addressing_mode(&request, eval);

        match resolved {
            ResolveResult::NotFound => self.define_label(mnemonic, token.span),
            ResolveResult::Ok(mode) => {
                self.stream.advance(operands.len())?;
                self.instruction_index += 1;
                if self.is_final_pass() {
                    let bytes = self
                        .cpu
                        .encode_instruction(&operands, &mode)
                        .map_err(|err| AsmError::from(err).or_span(token.span))?;
                    self.emit(&bytes, token.span)
                } else {
                    self.instruction_lengths.push(mode.byte_length);
                    self.reserve(mode.byte_length, token.span)
                }
            }
            ResolveResult::Error(message, span) => {
                self.stream.advance(operands.len())?;
                self.instruction_index += 1;
                let err = self.instruction_error(&message, span.unwrap_or(token.span));
                if self.is_final_pass() {
                    return Err(err);
                }
                let length = self.cpu.default_instruction_length();
                self.instruction_lengths.push(length);
                log::trace!("sizing {mnemonic} failed in pass one: {message}");
                self.warning(err.with_help(format!(
                    "size not known in pass one; assuming {length} byte(s)"
                )));
                self.reserve(length, token.span)
            }
        }
    }

    /// Error for a failed resolution. Expression failures keep their
    /// expression kind and symbol suggestion.
    fn instruction_error(&self, message: &str, span: Span) -> AsmError {
        match self.last_eval_error.borrow().as_ref() {
            Some(err) if err.message == message => AsmError::from(err.clone()).or_span(span),
            _ => AsmError::new(AsmErrorKind::Instruction, message, None).with_span(span),
        }
    }

    /// Continuation for a frame that ran out.
    fn frame_ended(&mut self, end: FrameEnd) -> Result<(), AsmError> {
        let open = self.conditionals.drain_frame(end.id);
        let continuation = self.continuations.remove(&end.id);
        if let Some(first) = open.first() {
            self.current_file = first.file.clone();
            let place = match &continuation {
                Some(Continuation::Macro { name }) => format!("macro '{name}'"),
                Some(Continuation::Loop(_)) => "loop body".to_string(),
                Some(Continuation::Include { name }) => format!("'{name}'"),
                Some(Continuation::Source) => format!("'{}'", self.main_name),
                _ => "block".to_string(),
            };
            return Err(AsmError::new(
                AsmErrorKind::Conditional,
                &format!("Unterminated .IF block in {place}"),
                None,
            )
            .with_span(first.span));
        }
        match continuation {
            None | Some(Continuation::Source) => Ok(()),
            Some(Continuation::Include { name }) => {
                log::trace!("leaving {name}");
                Ok(())
            }
            Some(Continuation::Macro { name }) => {
                self.macro_depth = self.macro_depth.saturating_sub(1);
                self.close_scope(&format!("macro '{name}'"))
            }
            Some(Continuation::Namespace) => {
                if self.symbols.pop_namespace() != SymbolTableResult::Ok {
                    return Err(AsmError::new(
                        AsmErrorKind::Directive,
                        "Namespace block closed inside another scope",
                        None,
                    ));
                }
                Ok(())
            }
            Some(Continuation::Loop(state)) => {
                self.close_scope("loop body")?;
                self.next_iteration(state)
            }
        }
    }

    pub(crate) fn close_scope(&mut self, owner: &str) -> Result<(), AsmError> {
        match self.symbols.pop_scope() {
            SymbolTableResult::Ok => Ok(()),
            _ => Err(AsmError::new(
                AsmErrorKind::Directive,
                &format!("Scope left open at end of {owner}"),
                None,
            )
            .with_help("close .NAMESPACE before the end of the body")),
        }
    }
}
