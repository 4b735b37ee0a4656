// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Two-stage expression evaluation.
//!
//! [`to_rpn`] turns an infix token slice into Reverse Polish order with an
//! explicit operator stack (shunting-yard). [`eval_rpn`] runs the resulting
//! program on a single value stack. Neither stage recurses on the grammar;
//! the only recursion is the bounded re-evaluation of deferred token values
//! and macro arguments.

use crate::core::expr::{
    apply_binary, apply_unary, parse_number, BinaryOp, EvalContext, EvalError, EvalPolicy,
    Evaluated, UnaryOp,
};
use crate::core::expr_functions::{call_function, takes_name_argument};
use crate::core::text_utils::closest_match;
use crate::core::tokenizer::{OperatorKind, Span, StringLiteral, Token, TokenKind};
use crate::core::value::Value;

/// Maximum number of values on the evaluation stack.
pub const MAX_STACK_DEPTH: usize = 256;

/// Maximum depth of deferred-expression re-evaluation.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Maximum edit distance for "did you mean" suggestions.
pub const SUGGESTION_DISTANCE: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum RpnItem {
    Operand(Token),
    CurrentPc(Span),
    Unary(UnaryOp, Span),
    Binary(BinaryOp, Span),
    Call {
        name: String,
        argc: usize,
        span: Span,
    },
    Index(Span),
    MakeArray {
        count: usize,
        span: Span,
    },
}

/// Operator-stack entry. Open markers record where a group started so a
/// mismatch can name the unmatched side.
#[derive(Debug)]
enum Pending {
    Unary(UnaryOp, Span),
    Binary(BinaryOp, Span),
    Paren(Span),
    Call {
        name: String,
        argc: usize,
        has_arg: bool,
        span: Span,
    },
    Index(Span),
    Array {
        count: usize,
        has_item: bool,
        span: Span,
    },
}

struct RpnBuilder {
    output: Vec<RpnItem>,
    stack: Vec<Pending>,
    expect_operand: bool,
}

/// Convert an infix token slice to Reverse Polish order.
pub fn to_rpn(tokens: &[Token]) -> Result<Vec<RpnItem>, EvalError> {
    let mut builder = RpnBuilder {
        output: Vec::with_capacity(tokens.len()),
        stack: Vec::new(),
        expect_operand: true,
    };
    let mut idx = 0usize;
    while idx < tokens.len() {
        idx += builder.push_token(tokens, idx)?;
    }
    builder.finish(tokens)
}

impl RpnBuilder {
    /// Handle `tokens[idx]`, returning how many tokens were consumed.
    fn push_token(&mut self, tokens: &[Token], idx: usize) -> Result<usize, EvalError> {
        let token = &tokens[idx];
        let span = token.span;
        match &token.kind {
            TokenKind::Identifier(name)
                if matches!(tokens.get(idx + 1).map(|t| &t.kind), Some(TokenKind::OpenParen)) =>
            {
                self.require_operand_position(token)?;
                self.mark_argument();
                if takes_name_argument(name) {
                    if let (Some(arg), Some(close)) = (tokens.get(idx + 2), tokens.get(idx + 3)) {
                        if let (TokenKind::Identifier(symbol), TokenKind::CloseParen) =
                            (&arg.kind, &close.kind)
                        {
                            let quoted = StringLiteral {
                                raw: symbol.clone(),
                                bytes: symbol.as_bytes().to_vec(),
                            };
                            self.output
                                .push(RpnItem::Operand(Token::new(TokenKind::String(quoted), arg.span)));
                            self.output.push(RpnItem::Call {
                                name: name.clone(),
                                argc: 1,
                                span,
                            });
                            self.expect_operand = false;
                            return Ok(4);
                        }
                    }
                }
                self.stack.push(Pending::Call {
                    name: name.clone(),
                    argc: 0,
                    has_arg: false,
                    span,
                });
                self.expect_operand = true;
                Ok(2)
            }
            TokenKind::Identifier(_)
            | TokenKind::Number(_)
            | TokenKind::String(_)
            | TokenKind::LocalLabel(_)
            | TokenKind::AnonLabelRef(_)
            | TokenKind::ArrayLiteral(_) => {
                self.require_operand_position(token)?;
                self.mark_argument();
                self.output.push(RpnItem::Operand(token.clone()));
                self.expect_operand = false;
                Ok(1)
            }
            TokenKind::Operator(OperatorKind::Multiply) if self.expect_operand => {
                self.mark_argument();
                self.output.push(RpnItem::CurrentPc(span));
                self.expect_operand = false;
                Ok(1)
            }
            TokenKind::Operator(op) if self.expect_operand => {
                let unary = UnaryOp::from_operator(*op).ok_or_else(|| {
                    EvalError::with_span(format!("Unexpected operator '{}'", op.symbol()), span)
                })?;
                self.mark_argument();
                self.stack.push(Pending::Unary(unary, span));
                Ok(1)
            }
            TokenKind::Operator(op) => {
                let binary = BinaryOp::from_operator(*op).ok_or_else(|| {
                    EvalError::with_span(format!("Unexpected operator '{}'", op.symbol()), span)
                })?;
                while let Some(top) = self.stack.last() {
                    let pops = match top {
                        Pending::Unary(..) => true,
                        Pending::Binary(prev, _) => prev.precedence() >= binary.precedence(),
                        _ => false,
                    };
                    if !pops {
                        break;
                    }
                    self.pop_operator();
                }
                self.stack.push(Pending::Binary(binary, span));
                self.expect_operand = true;
                Ok(1)
            }
            TokenKind::OpenParen => {
                self.require_operand_position(token)?;
                self.mark_argument();
                self.stack.push(Pending::Paren(span));
                Ok(1)
            }
            TokenKind::CloseParen => {
                self.close_paren(span)?;
                Ok(1)
            }
            TokenKind::OpenBracket => {
                if self.expect_operand {
                    self.mark_argument();
                    self.stack.push(Pending::Array {
                        count: 0,
                        has_item: false,
                        span,
                    });
                } else {
                    self.stack.push(Pending::Index(span));
                    self.expect_operand = true;
                }
                Ok(1)
            }
            TokenKind::CloseBracket => {
                self.close_bracket(span)?;
                Ok(1)
            }
            TokenKind::Comma => {
                self.comma(span)?;
                Ok(1)
            }
            _ => Err(EvalError::with_span(
                format!("Unexpected '{}' in expression", token.text()),
                span,
            )),
        }
    }

    fn require_operand_position(&self, token: &Token) -> Result<(), EvalError> {
        if self.expect_operand {
            Ok(())
        } else {
            Err(EvalError::with_span(
                format!("Expected an operator before '{}'", token.text()),
                token.span,
            ))
        }
    }

    /// Record that the innermost call or array literal received an argument.
    fn mark_argument(&mut self) {
        match self.stack.last_mut() {
            Some(Pending::Call { has_arg, .. }) => *has_arg = true,
            Some(Pending::Array { has_item, .. }) => *has_item = true,
            _ => {}
        }
    }

    fn pop_operator(&mut self) {
        match self.stack.pop() {
            Some(Pending::Unary(op, span)) => self.output.push(RpnItem::Unary(op, span)),
            Some(Pending::Binary(op, span)) => self.output.push(RpnItem::Binary(op, span)),
            Some(other) => self.stack.push(other),
            None => {}
        }
    }

    fn pop_operators(&mut self) {
        while matches!(
            self.stack.last(),
            Some(Pending::Unary(..) | Pending::Binary(..))
        ) {
            self.pop_operator();
        }
    }

    fn close_paren(&mut self, span: Span) -> Result<(), EvalError> {
        self.pop_operators();
        match self.stack.pop() {
            Some(Pending::Paren(_)) => {
                if self.expect_operand {
                    return Err(EvalError::with_span("Expected expression before ')'", span));
                }
            }
            Some(Pending::Call {
                name,
                argc,
                has_arg,
                span: call_span,
            }) => {
                if self.expect_operand && has_arg {
                    return Err(EvalError::with_span("Expected expression before ')'", span));
                }
                let argc = if has_arg { argc + 1 } else { 0 };
                self.output.push(RpnItem::Call {
                    name,
                    argc,
                    span: call_span,
                });
            }
            Some(Pending::Index(_) | Pending::Array { .. }) => {
                return Err(EvalError::with_span(
                    "Mismatched ')': unmatched '['",
                    span,
                ))
            }
            _ => return Err(EvalError::with_span("Unmatched ')'", span)),
        }
        self.expect_operand = false;
        Ok(())
    }

    fn close_bracket(&mut self, span: Span) -> Result<(), EvalError> {
        self.pop_operators();
        match self.stack.pop() {
            Some(Pending::Index(open)) => {
                if self.expect_operand {
                    return Err(EvalError::with_span("Expected index expression", open));
                }
                self.output.push(RpnItem::Index(open));
            }
            Some(Pending::Array {
                count,
                has_item,
                span: open,
            }) => {
                if self.expect_operand && has_item {
                    return Err(EvalError::with_span("Expected expression before ']'", span));
                }
                let count = if has_item { count + 1 } else { 0 };
                self.output.push(RpnItem::MakeArray { count, span: open });
            }
            Some(Pending::Paren(_) | Pending::Call { .. }) => {
                return Err(EvalError::with_span(
                    "Mismatched ']': unmatched '('",
                    span,
                ))
            }
            _ => return Err(EvalError::with_span("Unmatched ']'", span)),
        }
        self.expect_operand = false;
        Ok(())
    }

    fn comma(&mut self, span: Span) -> Result<(), EvalError> {
        if self.expect_operand {
            return Err(EvalError::with_span("Expected expression before ','", span));
        }
        self.pop_operators();
        match self.stack.last_mut() {
            Some(Pending::Call { argc, .. }) => *argc += 1,
            Some(Pending::Array { count, .. }) => *count += 1,
            _ => return Err(EvalError::with_span("Unexpected ','", span)),
        }
        self.expect_operand = true;
        Ok(())
    }

    fn finish(mut self, tokens: &[Token]) -> Result<Vec<RpnItem>, EvalError> {
        if self.expect_operand {
            let span = tokens.last().map(|t| t.span).unwrap_or_default();
            let message = if tokens.is_empty() {
                "Expected expression"
            } else {
                "Expected operand at end of expression"
            };
            return Err(EvalError::with_span(message, span));
        }
        self.pop_operators();
        match self.stack.pop() {
            None => Ok(self.output),
            Some(Pending::Paren(span) | Pending::Call { span, .. }) => {
                Err(EvalError::with_span("Unmatched '('", span))
            }
            Some(Pending::Index(span) | Pending::Array { span, .. }) => {
                Err(EvalError::with_span("Unmatched '['", span))
            }
            Some(Pending::Unary(_, span) | Pending::Binary(_, span)) => {
                Err(EvalError::with_span("Malformed expression", span))
            }
        }
    }
}

/// Evaluate an infix token slice.
pub fn evaluate(
    tokens: &[Token],
    ctx: &dyn EvalContext,
    policy: EvalPolicy,
) -> Result<Evaluated, EvalError> {
    let mut evaluator = Evaluator::new(ctx, policy);
    let value = evaluator.eval_tokens(tokens)?;
    Ok(Evaluated {
        value,
        unresolved: evaluator.unresolved,
    })
}

/// Evaluate an RPN program produced by [`to_rpn`].
pub fn eval_rpn(
    items: &[RpnItem],
    ctx: &dyn EvalContext,
    policy: EvalPolicy,
) -> Result<Evaluated, EvalError> {
    let mut evaluator = Evaluator::new(ctx, policy);
    let value = evaluator.eval_items(items)?;
    Ok(Evaluated {
        value,
        unresolved: evaluator.unresolved,
    })
}

struct Evaluator<'c> {
    ctx: &'c dyn EvalContext,
    policy: EvalPolicy,
    depth: usize,
    unresolved: bool,
}

impl<'c> Evaluator<'c> {
    fn new(ctx: &'c dyn EvalContext, policy: EvalPolicy) -> Self {
        Self {
            ctx,
            policy,
            depth: 0,
            unresolved: false,
        }
    }

    fn eval_tokens(&mut self, tokens: &[Token]) -> Result<Value, EvalError> {
        if self.depth >= MAX_NESTING_DEPTH {
            let span = tokens.first().map(|t| t.span).unwrap_or_default();
            return Err(EvalError::with_span("Expression nesting too deep", span));
        }
        self.depth += 1;
        let result = to_rpn(tokens).and_then(|items| self.eval_items(&items));
        self.depth -= 1;
        result
    }

    fn eval_items(&mut self, items: &[RpnItem]) -> Result<Value, EvalError> {
        let mut stack: Vec<Value> = Vec::new();
        for item in items {
            let value = match item {
                RpnItem::Operand(token) => self.resolve_operand(token)?,
                RpnItem::CurrentPc(_) => Value::Number(self.ctx.current_pc()),
                RpnItem::Unary(op, span) => {
                    let value = pop_value(&mut stack, *span)?;
                    let result = apply_unary(*op, value, *span);
                    self.tolerate(result)?
                }
                RpnItem::Binary(op, span) => {
                    let right = pop_value(&mut stack, *span)?;
                    let left = pop_value(&mut stack, *span)?;
                    let result = apply_binary(*op, left, right, *span);
                    self.tolerate(result)?
                }
                RpnItem::Call { name, argc, span } => {
                    if stack.len() < *argc {
                        return Err(EvalError::with_span("Malformed function call", *span));
                    }
                    let args = stack.split_off(stack.len() - argc);
                    let result = call_function(name, args, self.ctx, *span);
                    self.tolerate(result)?
                }
                RpnItem::Index(span) => {
                    let index = pop_value(&mut stack, *span)?;
                    let target = pop_value(&mut stack, *span)?;
                    let result = index_value(target, index, *span);
                    self.tolerate(result)?
                }
                RpnItem::MakeArray { count, span } => {
                    if stack.len() < *count {
                        return Err(EvalError::with_span("Malformed array literal", *span));
                    }
                    Value::Array(stack.split_off(stack.len() - count))
                }
            };
            stack.push(value);
            if stack.len() > MAX_STACK_DEPTH {
                return Err(EvalError::new(format!(
                    "Expression stack depth exceeded ({MAX_STACK_DEPTH})"
                )));
            }
        }
        if stack.len() != 1 {
            return Err(EvalError::new(format!(
                "Malformed expression: {} values left on the stack",
                stack.len()
            )));
        }
        stack
            .pop()
            .ok_or_else(|| EvalError::new("Malformed expression"))
    }

    /// In pass one, failures downstream of a forward reference are noise.
    fn tolerate(&self, result: Result<Value, EvalError>) -> Result<Value, EvalError> {
        match result {
            Err(_) if self.unresolved && self.policy == EvalPolicy::AllowForward => {
                Ok(Value::Number(0))
            }
            other => other,
        }
    }

    fn resolve_operand(&mut self, token: &Token) -> Result<Value, EvalError> {
        match &token.kind {
            TokenKind::Number(lit) => parse_number(&lit.text)
                .map(Value::Number)
                .ok_or_else(|| {
                    EvalError::with_span(format!("Invalid number: {}", lit.text), token.span)
                }),
            TokenKind::String(lit) => Ok(Value::from_bytes(&lit.bytes)),
            TokenKind::Identifier(name) => self.resolve_name(name, token.span),
            TokenKind::LocalLabel(local) => {
                let full = self.ctx.local_label_name(local);
                match self.ctx.lookup_symbol(&full) {
                    Some(value) => self.expand(value),
                    None => self.missing(&full, token.span),
                }
            }
            TokenKind::AnonLabelRef(count) => match self.ctx.anonymous_label(*count) {
                Some(addr) => Ok(Value::Number(addr)),
                None if self.policy == EvalPolicy::AllowForward => {
                    self.unresolved = true;
                    Ok(Value::Number(0))
                }
                None => Err(EvalError::with_span(
                    format!("Unsatisfiable anonymous label reference {}", token.text()),
                    token.span,
                )),
            },
            TokenKind::ArrayLiteral(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_tokens(item)?);
                }
                Ok(Value::Array(values))
            }
            _ => Err(EvalError::with_span(
                format!("Unexpected '{}' in expression", token.text()),
                token.span,
            )),
        }
    }

    fn resolve_name(&mut self, name: &str, span: Span) -> Result<Value, EvalError> {
        if let Some(tokens) = self.ctx.macro_argument(name) {
            return self.eval_tokens(&tokens);
        }
        match self.ctx.lookup_symbol(name) {
            Some(value) => self.expand(value),
            None => self.missing(name, span),
        }
    }

    fn expand(&mut self, value: Value) -> Result<Value, EvalError> {
        match value {
            Value::Tokens(tokens) => self.eval_tokens(&tokens),
            other => Ok(other),
        }
    }

    fn missing(&mut self, name: &str, span: Span) -> Result<Value, EvalError> {
        match self.policy {
            EvalPolicy::AllowForward => {
                self.unresolved = true;
                Ok(Value::Number(0))
            }
            EvalPolicy::Strict => {
                let names = self.ctx.known_symbol_names();
                let suggestion = closest_match(
                    name,
                    names.iter().map(String::as_str),
                    SUGGESTION_DISTANCE,
                );
                Err(
                    EvalError::with_span(format!("Undefined symbol: {name}"), span)
                        .with_suggestion(suggestion),
                )
            }
        }
    }
}

fn pop_value(stack: &mut Vec<Value>, span: Span) -> Result<Value, EvalError> {
    stack
        .pop()
        .ok_or_else(|| EvalError::with_span("Malformed expression: missing operand", span))
}

fn index_value(target: Value, index: Value, span: Span) -> Result<Value, EvalError> {
    let idx = match index {
        Value::Number(n) => n,
        other => {
            return Err(EvalError::with_span(
                format!("Array index must be a number, found {}", other.type_name()),
                span,
            ))
        }
    };
    match target {
        Value::Array(mut items) => {
            let len = items.len();
            if idx < 0 || idx as usize >= len {
                return Err(EvalError::with_span(
                    format!("Array index {idx} out of range for array of length {len}"),
                    span,
                ));
            }
            Ok(items.swap_remove(idx as usize))
        }
        other => Err(EvalError::with_span(
            format!("Cannot index into a {}", other.type_name()),
            span,
        )),
    }
}
