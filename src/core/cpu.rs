// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! CPU handler contract.
//!
//! The assembler core knows nothing about instruction sets. A CPU handler
//! resolves a mnemonic and its operand tokens to an addressing mode with a
//! known byte length (both passes) and encodes the final bytes (second pass
//! only). Handlers are registered by name in [`crate::core::registry`].

use crate::core::expr::{EvalError, Evaluated};
use crate::core::tokenizer::{Span, Token};

/// Identifier for a CPU type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CpuType(&'static str);

impl CpuType {
    pub const fn new(id: &'static str) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

/// Addressing-mode identifier chosen by a handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModeTag(&'static str);

impl ModeTag {
    pub const fn new(id: &'static str) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    pub fn word_bytes(self, value: u16) -> [u8; 2] {
        match self {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        }
    }

    pub fn long_bytes(self, value: u32) -> [u8; 4] {
        match self {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        }
    }
}

/// Resolved instruction: mnemonic, addressing mode, opcode and size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeInfo {
    pub mnemonic: String,
    pub mode: ModeTag,
    pub opcode: Vec<u8>,
    pub byte_length: u32,
    /// Operand value; a branch offset for relative modes.
    pub operand: Option<i64>,
}

pub struct ResolveRequest<'a> {
    pub mnemonic: &'a str,
    pub operands: &'a [Token],
    /// Size chosen for this instruction in the first pass, if any.
    pub pass_one_length: Option<u32>,
    pub span: Span,
}

/// Result of addressing-mode resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveResult<T> {
    Ok(T),
    /// The mnemonic is unknown to this handler.
    NotFound,
    Error(String, Option<Span>),
}

impl<T> ResolveResult<T> {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into(), None)
    }

    pub fn error_with_span(message: impl Into<String>, span: Span) -> Self {
        Self::Error(message.into(), Some(span))
    }
}

/// Error returned by instruction encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuError {
    pub message: String,
    pub span: Option<Span>,
}

impl CpuError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span: Some(span),
        }
    }

    pub fn with_span_opt(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl std::fmt::Display for CpuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CpuError {}

/// Expression access handed to CPU handlers.
pub trait OperandEvaluator {
    /// Evaluate operand tokens under the current pass's policy.
    fn evaluate(&self, tokens: &[Token]) -> Result<Evaluated, EvalError>;
    fn current_pc(&self) -> u32;
    fn is_final_pass(&self) -> bool;
}

pub trait CpuHandler {
    fn name(&self) -> &'static str;
    fn endianness(&self) -> Endianness;
    /// Size assumed for an instruction whose mode cannot be resolved in the
    /// first pass.
    fn default_instruction_length(&self) -> u32;
    fn resolve_addressing_mode(
        &self,
        request: &ResolveRequest<'_>,
        eval: &dyn OperandEvaluator,
    ) -> ResolveResult<ModeInfo>;
    fn encode_instruction(&self, operands: &[Token], mode: &ModeInfo)
        -> Result<Vec<u8>, CpuError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endianness_orders_bytes() {
        assert_eq!(Endianness::Little.word_bytes(0x1234), [0x34, 0x12]);
        assert_eq!(Endianness::Big.word_bytes(0x1234), [0x12, 0x34]);
        assert_eq!(
            Endianness::Little.long_bytes(0x1234_5678),
            [0x78, 0x56, 0x34, 0x12]
        );
    }

    #[test]
    fn resolve_result_error_helpers_keep_span() {
        let err: ResolveResult<ModeInfo> = ResolveResult::error_with_span("bad", Span::new(2, 1, 3));
        assert_eq!(
            err,
            ResolveResult::Error("bad".to_string(), Some(Span::new(2, 1, 3)))
        );
        assert_eq!(ModeTag::new("absolute").as_str(), "absolute");
    }
}
