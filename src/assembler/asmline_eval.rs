// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Expression evaluation for statements.
//!
//! The assembler itself is the evaluation context: it supplies the PC,
//! scoped symbols, macro arguments from the stream and label bookkeeping.
//! The same context is handed to CPU handlers as their operand evaluator.

use super::*;

impl<'a> Assembler<'a> {
    pub(crate) fn policy(&self) -> EvalPolicy {
        if self.is_final_pass() {
            EvalPolicy::Strict
        } else {
            EvalPolicy::AllowForward
        }
    }

    pub(crate) fn eval_expr(&self, tokens: &[Token], span: Span) -> Result<Evaluated, AsmError> {
        if tokens.is_empty() {
            return Err(
                AsmError::new(AsmErrorKind::Expression, "Expected expression", None).with_span(span),
            );
        }
        crate::core::expr_rpn::evaluate(tokens, self, self.policy())
            .map_err(|err| AsmError::from(err).or_span(span))
    }

    pub(crate) fn eval_value(&self, tokens: &[Token], span: Span) -> Result<Value, AsmError> {
        self.eval_expr(tokens, span).map(|evaluated| evaluated.value)
    }

    /// Evaluate to a number; `what` names the operand in the error.
    pub(crate) fn eval_number(
        &self,
        tokens: &[Token],
        span: Span,
        what: &str,
    ) -> Result<i64, AsmError> {
        match self.eval_value(tokens, span)? {
            Value::Number(n) => Ok(n),
            other => Err(AsmError::new(
                AsmErrorKind::Expression,
                &format!("{what} must be a number, found {}", other.type_name()),
                None,
            )
            .with_span(tokens.first().map_or(span, |t| t.span))),
        }
    }

    /// Comma-separated expressions up to the end of `line`.
    pub(crate) fn take_expression_list(
        &mut self,
        line: u32,
        span: Span,
    ) -> Result<Vec<Vec<Token>>, AsmError> {
        let mut items = Vec::new();
        loop {
            let item = self.stream.take_expression(line)?;
            let comma = self
                .stream
                .peek(0)?
                .filter(|t| t.span.line == line && t.kind == TokenKind::Comma);
            if item.is_empty() {
                if comma.is_some() || !items.is_empty() {
                    let at = comma.map_or(span, |t| t.span);
                    return Err(
                        AsmError::new(AsmErrorKind::Syntax, "Empty expression in list", None)
                            .with_span(at),
                    );
                }
                break;
            }
            items.push(item);
            if comma.is_none() {
                break;
            }
            self.stream.advance(1)?;
        }
        let trailing = self.stream.take_line(line)?;
        if let Some(extra) = trailing.first() {
            return Err(AsmError::new(
                AsmErrorKind::Syntax,
                "Unexpected token after expression",
                Some(&extra.text()),
            )
            .with_span(extra.span));
        }
        Ok(items)
    }

    /// Anonymous-label address `count` positions away from the current
    /// position in definition order.
    fn anonymous_address(&self, count: i32) -> Option<i64> {
        let index = if count < 0 {
            self.anon_seen.checked_sub(count.unsigned_abs() as usize)?
        } else {
            (self.anon_seen + count as usize).checked_sub(1)?
        };
        self.anon_labels.get(index).copied()
    }
}

impl EvalContext for Assembler<'_> {
    fn current_pc(&self) -> i64 {
        i64::from(self.pc)
    }

    fn lookup_symbol(&self, name: &str) -> Option<Value> {
        self.symbols.lookup(name).cloned()
    }

    fn macro_argument(&self, name: &str) -> Option<Rc<[Token]>> {
        self.stream.macro_argument(name)
    }

    fn local_label_name(&self, local: &str) -> String {
        self.expand_local_name(local)
    }

    fn anonymous_label(&self, count: i32) -> Option<i64> {
        self.anonymous_address(count)
    }

    fn known_symbol_names(&self) -> Vec<String> {
        self.symbols.all_names()
    }
}

impl OperandEvaluator for Assembler<'_> {
    fn evaluate(&self, tokens: &[Token]) -> Result<Evaluated, EvalError> {
        let result = crate::core::expr_rpn::evaluate(tokens, self, self.policy());
        if let Err(err) = &result {
            self.last_eval_error.replace(Some(err.clone()));
        }
        result
    }

    fn current_pc(&self) -> u32 {
        self.pc
    }

    fn is_final_pass(&self) -> bool {
        Assembler::is_final_pass(self)
    }
}
