// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! 6502 addressing modes and operand-shape classification.

use crate::core::cpu::ModeTag;
use crate::core::tokenizer::{Span, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndexedIndirectX,
    IndirectIndexedY,
    Relative,
}

impl AddressMode {
    /// Operand bytes following the opcode.
    pub fn operand_size(self) -> u32 {
        match self {
            AddressMode::Implied | AddressMode::Accumulator => 0,
            AddressMode::Immediate
            | AddressMode::ZeroPage
            | AddressMode::ZeroPageX
            | AddressMode::ZeroPageY
            | AddressMode::IndexedIndirectX
            | AddressMode::IndirectIndexedY
            | AddressMode::Relative => 1,
            AddressMode::Absolute
            | AddressMode::AbsoluteX
            | AddressMode::AbsoluteY
            | AddressMode::Indirect => 2,
        }
    }

    pub fn tag(self) -> ModeTag {
        ModeTag::new(match self {
            AddressMode::Implied => "implied",
            AddressMode::Accumulator => "accumulator",
            AddressMode::Immediate => "immediate",
            AddressMode::ZeroPage => "zeropage",
            AddressMode::ZeroPageX => "zeropage,x",
            AddressMode::ZeroPageY => "zeropage,y",
            AddressMode::Absolute => "absolute",
            AddressMode::AbsoluteX => "absolute,x",
            AddressMode::AbsoluteY => "absolute,y",
            AddressMode::Indirect => "indirect",
            AddressMode::IndexedIndirectX => "(indirect,x)",
            AddressMode::IndirectIndexedY => "(indirect),y",
            AddressMode::Relative => "relative",
        })
    }

    pub fn from_tag(tag: ModeTag) -> Option<Self> {
        ALL_MODES.iter().copied().find(|mode| mode.tag() == tag)
    }
}

const ALL_MODES: &[AddressMode] = &[
    AddressMode::Implied,
    AddressMode::Accumulator,
    AddressMode::Immediate,
    AddressMode::ZeroPage,
    AddressMode::ZeroPageX,
    AddressMode::ZeroPageY,
    AddressMode::Absolute,
    AddressMode::AbsoluteX,
    AddressMode::AbsoluteY,
    AddressMode::Indirect,
    AddressMode::IndexedIndirectX,
    AddressMode::IndirectIndexedY,
    AddressMode::Relative,
];

/// Index register named after a comma.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexRegister {
    X,
    Y,
}

/// Syntactic shape of an operand list, before any expression is evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum OperandShape<'a> {
    None,
    Accumulator,
    Immediate(&'a [Token]),
    Direct(&'a [Token]),
    Indexed(&'a [Token], IndexRegister),
    /// `(expr)`; also a plain parenthesized expression for mnemonics
    /// without an indirect mode.
    Indirect(&'a [Token], &'a [Token]),
    IndexedIndirectX(&'a [Token]),
    IndirectIndexedY(&'a [Token]),
}

/// Size hint carried as a mnemonic suffix (`LDA.W`, `STA.B`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidthHint {
    Byte,
    Word,
}

pub fn split_width_hint(mnemonic: &str) -> (&str, Option<WidthHint>) {
    match mnemonic.rsplit_once('.') {
        Some((base, suffix)) if !base.is_empty() => {
            if suffix.eq_ignore_ascii_case("w") {
                (base, Some(WidthHint::Word))
            } else if suffix.eq_ignore_ascii_case("b") {
                (base, Some(WidthHint::Byte))
            } else {
                (mnemonic, None)
            }
        }
        _ => (mnemonic, None),
    }
}

pub fn classify_operands(tokens: &[Token]) -> Result<OperandShape<'_>, (String, Span)> {
    let tokens = trim_end(tokens);
    let Some(first) = tokens.first() else {
        return Ok(OperandShape::None);
    };
    if matches!(first.kind, TokenKind::Hash) {
        let expr = &tokens[1..];
        if expr.is_empty() {
            return Err(("Expected expression after '#'".to_string(), first.span));
        }
        return Ok(OperandShape::Immediate(expr));
    }

    let parts = split_top_level(tokens);
    match parts.as_slice() {
        [single] => {
            if single.len() == 1 && single[0].is_word("A") {
                return Ok(OperandShape::Accumulator);
            }
            if let Some(inner) = parenthesized(single) {
                let inner_parts = split_top_level(inner);
                return match inner_parts.as_slice() {
                    [base] => Ok(OperandShape::Indirect(base, single)),
                    [base, reg] if index_register(reg) == Some(IndexRegister::X) => {
                        Ok(OperandShape::IndexedIndirectX(base))
                    }
                    _ => Err(("Invalid indirect operand".to_string(), span_of(single))),
                };
            }
            Ok(OperandShape::Direct(single))
        }
        [base, reg] => {
            let Some(register) = index_register(reg) else {
                return Err((
                    "Expected index register X or Y".to_string(),
                    span_of(reg),
                ));
            };
            if base.is_empty() {
                return Err(("Expected expression before ','".to_string(), span_of(reg)));
            }
            match (parenthesized(base), register) {
                (Some(inner), IndexRegister::Y) if split_top_level(inner).len() == 1 => {
                    Ok(OperandShape::IndirectIndexedY(inner))
                }
                _ => Ok(OperandShape::Indexed(base, register)),
            }
        }
        _ => Err(("Too many operands".to_string(), span_of(tokens))),
    }
}

fn trim_end(tokens: &[Token]) -> &[Token] {
    match tokens.iter().position(Token::is_end) {
        Some(end) => &tokens[..end],
        None => tokens,
    }
}

fn index_register(tokens: &[Token]) -> Option<IndexRegister> {
    match tokens {
        [tok] if tok.is_word("X") => Some(IndexRegister::X),
        [tok] if tok.is_word("Y") => Some(IndexRegister::Y),
        _ => None,
    }
}

/// Splits on commas outside any grouping.
fn split_top_level(tokens: &[Token]) -> Vec<&[Token]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, tok) in tokens.iter().enumerate() {
        match tok.kind {
            TokenKind::OpenParen | TokenKind::OpenBracket | TokenKind::OpenBrace => depth += 1,
            TokenKind::CloseParen | TokenKind::CloseBracket | TokenKind::CloseBrace => {
                depth = depth.saturating_sub(1)
            }
            TokenKind::Comma if depth == 0 => {
                parts.push(&tokens[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&tokens[start..]);
    parts
}

/// Inner tokens when the whole slice is one `( ... )` group.
fn parenthesized(tokens: &[Token]) -> Option<&[Token]> {
    let (first, last) = (tokens.first()?, tokens.last()?);
    if tokens.len() < 2
        || !matches!(first.kind, TokenKind::OpenParen)
        || !matches!(last.kind, TokenKind::CloseParen)
    {
        return None;
    }
    let mut depth = 0usize;
    for (idx, tok) in tokens.iter().enumerate() {
        match tok.kind {
            TokenKind::OpenParen => depth += 1,
            TokenKind::CloseParen => {
                depth = depth.saturating_sub(1);
                if depth == 0 && idx != tokens.len() - 1 {
                    return None;
                }
            }
            _ => {}
        }
    }
    Some(&tokens[1..tokens.len() - 1])
}

pub fn span_of(tokens: &[Token]) -> Span {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) if first.span.line == last.span.line => Span {
            line: first.span.line,
            col_start: first.span.col_start,
            col_end: last.span.col_end,
        },
        (Some(first), _) => first.span,
        _ => Span::default(),
    }
}
