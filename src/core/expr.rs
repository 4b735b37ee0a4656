// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Shared expression primitives.
//!
//! Operators, literal parsing, the evaluation context trait and the error
//! type used by both expression stages in [`crate::core::expr_rpn`].

use std::rc::Rc;

use crate::core::tokenizer::{OperatorKind, Span, Token};
use crate::core::value::Value;

/// Error returned from expression evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub message: String,
    pub span: Option<Span>,
    /// Nearest known symbol for an undefined name.
    pub suggestion: Option<String>,
}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
            suggestion: None,
        }
    }

    pub fn with_span(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span: Some(span),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion;
        self
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EvalError {}

/// How unknown symbols are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalPolicy {
    /// Pass one: unknown symbols evaluate to 0.
    AllowForward,
    /// Pass two: unknown symbols are errors.
    Strict,
}

/// Result of a successful evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluated {
    pub value: Value,
    /// True when a forward reference was replaced by 0.
    pub unresolved: bool,
}

/// Context for expression evaluation.
///
/// Supplies the program counter, symbol lookups and label bookkeeping the
/// evaluator needs to resolve operands.
pub trait EvalContext {
    /// Current program counter (`*`).
    fn current_pc(&self) -> i64;

    /// Look up a symbol by name. Qualified `NS::NAME` forms are allowed.
    fn lookup_symbol(&self, name: &str) -> Option<Value>;

    /// Argument tokens bound to `name` by the innermost macro expansion.
    fn macro_argument(&self, name: &str) -> Option<Rc<[Token]>> {
        let _ = name;
        None
    }

    /// Full symbol name for a local label (`global.local`).
    fn local_label_name(&self, local: &str) -> String {
        local.to_string()
    }

    /// Address of the anonymous label `count` positions away.
    fn anonymous_label(&self, count: i32) -> Option<i64> {
        let _ = count;
        None
    }

    /// Every symbol name in every scope, used for suggestions.
    fn known_symbol_names(&self) -> Vec<String> {
        Vec::new()
    }
}

pub const UNARY_PRECEDENCE: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    BitNot,
    LogicNot,
    Low,
    High,
}

impl UnaryOp {
    /// Map an operator token seen in operand position.
    pub fn from_operator(op: OperatorKind) -> Option<Self> {
        match op {
            OperatorKind::Plus => Some(UnaryOp::Plus),
            OperatorKind::Minus | OperatorKind::Negate => Some(UnaryOp::Minus),
            OperatorKind::BitNot => Some(UnaryOp::BitNot),
            OperatorKind::LogicNot => Some(UnaryOp::LogicNot),
            OperatorKind::Lt => Some(UnaryOp::Low),
            OperatorKind::Gt => Some(UnaryOp::High),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::BitNot => "~",
            UnaryOp::LogicNot => "!",
            UnaryOp::Low => "<",
            UnaryOp::High => ">",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Multiply,
    Divide,
    Mod,
    Add,
    Subtract,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    LogicAnd,
    BitXor,
    BitOr,
    LogicOr,
}

impl BinaryOp {
    /// Map an operator token seen after an operand.
    pub fn from_operator(op: OperatorKind) -> Option<Self> {
        Some(match op {
            OperatorKind::Multiply => BinaryOp::Multiply,
            OperatorKind::Divide => BinaryOp::Divide,
            OperatorKind::Mod => BinaryOp::Mod,
            OperatorKind::Plus => BinaryOp::Add,
            OperatorKind::Minus | OperatorKind::Negate => BinaryOp::Subtract,
            OperatorKind::Shl => BinaryOp::Shl,
            OperatorKind::Shr => BinaryOp::Shr,
            OperatorKind::Lt => BinaryOp::Lt,
            OperatorKind::Le => BinaryOp::Le,
            OperatorKind::Gt => BinaryOp::Gt,
            OperatorKind::Ge => BinaryOp::Ge,
            OperatorKind::Eq | OperatorKind::Assign => BinaryOp::Eq,
            OperatorKind::Ne => BinaryOp::Ne,
            OperatorKind::BitAnd => BinaryOp::BitAnd,
            OperatorKind::LogicAnd => BinaryOp::LogicAnd,
            OperatorKind::BitXor => BinaryOp::BitXor,
            OperatorKind::BitOr => BinaryOp::BitOr,
            OperatorKind::LogicOr => BinaryOp::LogicOr,
            OperatorKind::BitNot | OperatorKind::LogicNot => return None,
        })
    }

    /// Binding strength; higher binds tighter. All binary operators are
    /// left-associative.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Mod => 9,
            BinaryOp::Add | BinaryOp::Subtract => 8,
            BinaryOp::Shl | BinaryOp::Shr => 7,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 6,
            BinaryOp::Eq | BinaryOp::Ne => 5,
            BinaryOp::BitAnd => 4,
            BinaryOp::LogicAnd => 3,
            BinaryOp::BitXor => 2,
            BinaryOp::BitOr | BinaryOp::LogicOr => 1,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::BitAnd => "&",
            BinaryOp::LogicAnd => "&&",
            BinaryOp::BitXor => "^",
            BinaryOp::BitOr => "|",
            BinaryOp::LogicOr => "||",
        }
    }
}

/// Apply a unary operator to a value.
pub fn apply_unary(op: UnaryOp, val: Value, span: Span) -> Result<Value, EvalError> {
    let n = match val {
        Value::Number(n) => n,
        other => {
            return Err(EvalError::with_span(
                format!(
                    "Operator '{}' requires a number, found {}",
                    op.symbol(),
                    other.type_name()
                ),
                span,
            ))
        }
    };
    Ok(Value::Number(match op {
        UnaryOp::Plus => n,
        UnaryOp::Minus => n.wrapping_neg(),
        UnaryOp::BitNot => !n,
        UnaryOp::LogicNot => i64::from(n == 0),
        UnaryOp::Low => n & 0xff,
        UnaryOp::High => (n >> 8) & 0xff,
    }))
}

/// Apply a binary operator to two values.
pub fn apply_binary(op: BinaryOp, l: Value, r: Value, span: Span) -> Result<Value, EvalError> {
    match (op, &l, &r) {
        (BinaryOp::Add, Value::Str(_), Value::Str(_) | Value::Number(_))
        | (BinaryOp::Add, Value::Number(_), Value::Str(_)) => {
            let mut text = l.display_text();
            text.push_str(&r.display_text());
            return Ok(Value::Str(text));
        }
        (BinaryOp::Eq, _, _) => return Ok(Value::from_bool(l == r)),
        (BinaryOp::Ne, _, _) => return Ok(Value::from_bool(l != r)),
        _ => {}
    }

    let (l, r) = match (&l, &r) {
        (Value::Number(l), Value::Number(r)) => (*l, *r),
        _ => {
            return Err(EvalError::with_span(
                format!(
                    "Operator '{}' requires numbers, found {} and {}",
                    op.symbol(),
                    l.type_name(),
                    r.type_name()
                ),
                span,
            ))
        }
    };

    let n = match op {
        BinaryOp::Add => l.wrapping_add(r),
        BinaryOp::Subtract => l.wrapping_sub(r),
        BinaryOp::Multiply => l.wrapping_mul(r),
        BinaryOp::Divide => {
            if r == 0 {
                return Err(EvalError::with_span("Division by zero", span));
            }
            l.wrapping_div(r)
        }
        BinaryOp::Mod => {
            if r == 0 {
                return Err(EvalError::with_span("Modulo by zero", span));
            }
            l.wrapping_rem(r)
        }
        BinaryOp::Shl | BinaryOp::Shr => {
            if !(0..64).contains(&r) {
                return Err(EvalError::with_span(
                    format!("Shift count out of range: {r}"),
                    span,
                ));
            }
            if op == BinaryOp::Shl {
                l.wrapping_shl(r as u32)
            } else {
                l.wrapping_shr(r as u32)
            }
        }
        BinaryOp::BitAnd => l & r,
        BinaryOp::BitOr => l | r,
        BinaryOp::BitXor => l ^ r,
        BinaryOp::Lt => i64::from(l < r),
        BinaryOp::Le => i64::from(l <= r),
        BinaryOp::Gt => i64::from(l > r),
        BinaryOp::Ge => i64::from(l >= r),
        BinaryOp::LogicAnd => i64::from(l != 0 && r != 0),
        BinaryOp::LogicOr => i64::from(l != 0 || r != 0),
        BinaryOp::Eq => i64::from(l == r),
        BinaryOp::Ne => i64::from(l != r),
    };
    Ok(Value::Number(n))
}

/// Parse a number literal.
///
/// Supports:
/// - Decimal: `42`, `1_000`
/// - Hex: `$2A`, `0x2A`
/// - Binary: `%101010`, `0b101010`
/// - Character: `'A'`, `'\n'`
pub fn parse_number(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(inner) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        return parse_char_literal(inner);
    }

    let (is_neg, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    // Strip underscores (visual separators)
    let text: String = text.chars().filter(|&c| c != '_').collect();
    let text = text.as_str();

    let val = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        parse_radix(hex, 16)?
    } else if let Some(hex) = text.strip_prefix('$') {
        parse_radix(hex, 16)?
    } else if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        parse_radix(bin, 2)?
    } else if let Some(bin) = text.strip_prefix('%') {
        parse_radix(bin, 2)?
    } else {
        parse_radix(text, 10)?
    };

    Some(if is_neg { val.wrapping_neg() } else { val })
}

fn parse_radix(digits: &str, radix: u32) -> Option<i64> {
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, radix).ok().map(|v| v as i64)
}

fn parse_char_literal(inner: &str) -> Option<i64> {
    let bytes = inner.as_bytes();
    match bytes {
        [b] if *b != b'\\' => Some(i64::from(*b)),
        [b'\\', esc] => Some(i64::from(match esc {
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'0' => 0,
            other => *other,
        })),
        [b'\\', b'x', hi, lo] => {
            let text = [*hi, *lo];
            let text = std::str::from_utf8(&text).ok()?;
            i64::from_str_radix(text, 16).ok()
        }
        _ => None,
    }
}

/// Returns true if the value fits in a signed or unsigned 8-bit byte (-128..=255).
pub fn value_fits_byte(value: i64) -> bool {
    (-128..=0xff).contains(&value)
}
