// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! MOS 6502 CPU handler implementation.

use crate::core::cpu::{
    CpuError, CpuHandler, Endianness, ModeInfo, OperandEvaluator, ResolveRequest, ResolveResult,
};
use crate::core::expr::value_fits_byte;
use crate::core::tokenizer::{Span, Token};
use crate::core::value::Value;

use super::operand::{
    classify_operands, span_of, split_width_hint, AddressMode, IndexRegister, OperandShape,
    WidthHint,
};
use super::operand_resolution::{resolve_direct, DirectOperand};
use super::table::{has_mnemonic, has_mode, lookup_instruction};

const DEFAULT_INSTRUCTION_LENGTH: u32 = 3;

type ResolveError = (String, Option<Span>);

#[derive(Debug, Default)]
pub struct M6502CpuHandler;

impl M6502CpuHandler {
    pub fn new() -> Self {
        Self
    }

    fn resolve(
        &self,
        mnemonic: &str,
        hint: Option<WidthHint>,
        request: &ResolveRequest<'_>,
        eval: &dyn OperandEvaluator,
    ) -> Result<ModeInfo, ResolveError> {
        let shape = classify_operands(request.operands).map_err(|(msg, span)| (msg, Some(span)))?;
        let upper = mnemonic.to_ascii_uppercase();

        let (mode, operand) = match shape {
            OperandShape::None => {
                if has_mode(mnemonic, AddressMode::Implied) {
                    (AddressMode::Implied, None)
                } else if has_mode(mnemonic, AddressMode::Accumulator) {
                    (AddressMode::Accumulator, None)
                } else {
                    return Err((format!("{upper} requires an operand"), Some(request.span)));
                }
            }
            OperandShape::Accumulator if has_mode(mnemonic, AddressMode::Accumulator) => {
                (AddressMode::Accumulator, None)
            }
            // `A` without an accumulator form is an ordinary symbol.
            OperandShape::Accumulator => {
                self.address(mnemonic, None, request.operands, hint, request, eval)?
            }
            OperandShape::Immediate(expr) => {
                if !has_mode(mnemonic, AddressMode::Immediate) {
                    return Err((
                        format!("Immediate addressing not supported for {upper}"),
                        Some(span_of(request.operands)),
                    ));
                }
                let (value, _) = evaluate_number(expr, eval)?;
                if eval.is_final_pass() && !value_fits_byte(value) {
                    return Err((
                        format!("Immediate value {value} out of range (-128..255)"),
                        Some(span_of(expr)),
                    ));
                }
                (AddressMode::Immediate, Some(value & 0xFF))
            }
            OperandShape::Direct(expr) if has_mode(mnemonic, AddressMode::Relative) => {
                self.branch(expr, eval)?
            }
            OperandShape::Direct(expr) => self.address(mnemonic, None, expr, hint, request, eval)?,
            OperandShape::Indexed(expr, reg) => {
                self.address(mnemonic, Some(reg), expr, hint, request, eval)?
            }
            OperandShape::Indirect(inner, _) if has_mode(mnemonic, AddressMode::Indirect) => {
                let (value, unresolved) = evaluate_number(inner, eval)?;
                if (eval.is_final_pass() || !unresolved) && !(0..=0xFFFF).contains(&value) {
                    return Err((
                        format!("Address {value} out of 16-bit range"),
                        Some(span_of(inner)),
                    ));
                }
                (AddressMode::Indirect, Some(value))
            }
            OperandShape::Indirect(_, whole) if has_mode(mnemonic, AddressMode::Relative) => {
                self.branch(whole, eval)?
            }
            OperandShape::Indirect(_, whole) => {
                self.address(mnemonic, None, whole, hint, request, eval)?
            }
            OperandShape::IndexedIndirectX(inner) => {
                self.zero_page_pointer(mnemonic, AddressMode::IndexedIndirectX, inner, eval)?
            }
            OperandShape::IndirectIndexedY(inner) => {
                self.zero_page_pointer(mnemonic, AddressMode::IndirectIndexedY, inner, eval)?
            }
        };

        let entry = lookup_instruction(mnemonic, mode).ok_or_else(|| {
            (
                format!(
                    "Addressing mode {} not supported for {upper}",
                    mode.tag().as_str()
                ),
                Some(request.span),
            )
        })?;
        Ok(ModeInfo {
            mnemonic: upper,
            mode: mode.tag(),
            opcode: vec![entry.opcode],
            byte_length: 1 + mode.operand_size(),
            operand,
        })
    }

    fn address(
        &self,
        mnemonic: &str,
        index: Option<IndexRegister>,
        expr: &[Token],
        hint: Option<WidthHint>,
        request: &ResolveRequest<'_>,
        eval: &dyn OperandEvaluator,
    ) -> Result<(AddressMode, Option<i64>), ResolveError> {
        let (value, unresolved) = evaluate_number(expr, eval)?;
        let mode = resolve_direct(
            mnemonic,
            index,
            DirectOperand {
                value,
                unresolved,
                hint,
                pass_one_length: request.pass_one_length,
                final_pass: eval.is_final_pass(),
            },
        )
        .map_err(|msg| (msg, Some(span_of(expr))))?;
        Ok((mode, Some(value)))
    }

    fn branch(
        &self,
        expr: &[Token],
        eval: &dyn OperandEvaluator,
    ) -> Result<(AddressMode, Option<i64>), ResolveError> {
        let (target, _) = evaluate_number(expr, eval)?;
        let offset = target - (i64::from(eval.current_pc()) + 2);
        if eval.is_final_pass() && !(-128..=127).contains(&offset) {
            return Err((
                format!("Branch target out of range: offset {offset}"),
                Some(span_of(expr)),
            ));
        }
        Ok((AddressMode::Relative, Some(offset)))
    }

    fn zero_page_pointer(
        &self,
        mnemonic: &str,
        mode: AddressMode,
        expr: &[Token],
        eval: &dyn OperandEvaluator,
    ) -> Result<(AddressMode, Option<i64>), ResolveError> {
        if !has_mode(mnemonic, mode) {
            return Err((
                format!(
                    "Addressing mode {} not supported for {}",
                    mode.tag().as_str(),
                    mnemonic.to_ascii_uppercase()
                ),
                Some(span_of(expr)),
            ));
        }
        let (value, unresolved) = evaluate_number(expr, eval)?;
        if (eval.is_final_pass() || !unresolved) && !(0..=255).contains(&value) {
            return Err((
                format!("Indirect pointer ${value:X} must be in zero page"),
                Some(span_of(expr)),
            ));
        }
        Ok((mode, Some(value)))
    }
}

fn evaluate_number(
    expr: &[Token],
    eval: &dyn OperandEvaluator,
) -> Result<(i64, bool), ResolveError> {
    let evaluated = eval
        .evaluate(expr)
        .map_err(|err| (err.message, err.span.or_else(|| Some(span_of(expr)))))?;
    match evaluated.value {
        Value::Number(n) => Ok((n, evaluated.unresolved)),
        other => Err((
            format!("Operand must be a number, found {}", other.type_name()),
            Some(span_of(expr)),
        )),
    }
}

impl CpuHandler for M6502CpuHandler {
    fn name(&self) -> &'static str {
        "6502"
    }

    fn endianness(&self) -> Endianness {
        Endianness::Little
    }

    fn default_instruction_length(&self) -> u32 {
        DEFAULT_INSTRUCTION_LENGTH
    }

    fn resolve_addressing_mode(
        &self,
        request: &ResolveRequest<'_>,
        eval: &dyn OperandEvaluator,
    ) -> ResolveResult<ModeInfo> {
        let (mnemonic, hint) = split_width_hint(request.mnemonic);
        if !has_mnemonic(mnemonic) {
            return ResolveResult::NotFound;
        }
        match self.resolve(mnemonic, hint, request, eval) {
            Ok(info) => ResolveResult::Ok(info),
            Err((message, span)) => ResolveResult::Error(message, span.or(Some(request.span))),
        }
    }

    fn encode_instruction(
        &self,
        operands: &[Token],
        mode: &ModeInfo,
    ) -> Result<Vec<u8>, CpuError> {
        let address_mode = AddressMode::from_tag(mode.mode).ok_or_else(|| {
            CpuError::new(format!("Unknown addressing mode '{}'", mode.mode.as_str()))
        })?;
        let mut bytes = mode.opcode.clone();
        let operand_size = address_mode.operand_size();
        if operand_size == 0 {
            return Ok(bytes);
        }
        let value = mode.operand.ok_or_else(|| {
            CpuError::with_span_opt(
                format!("{} is missing its operand value", mode.mnemonic),
                (!operands.is_empty()).then(|| span_of(operands)),
            )
        })?;
        if operand_size == 1 {
            bytes.push((value & 0xFF) as u8);
        } else {
            bytes.extend_from_slice(&self.endianness().word_bytes((value & 0xFFFF) as u16));
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expr::{EvalContext, EvalError, EvalPolicy, Evaluated};
    use crate::core::expr_rpn::evaluate;
    use crate::core::tokenizer::Tokenizer;
    use std::collections::HashMap;

    struct TestEval {
        pc: u32,
        final_pass: bool,
        symbols: HashMap<String, i64>,
    }

    impl TestEval {
        fn new(pc: u32, final_pass: bool) -> Self {
            Self {
                pc,
                final_pass,
                symbols: HashMap::new(),
            }
        }

        fn with(mut self, name: &str, value: i64) -> Self {
            self.symbols.insert(name.to_ascii_uppercase(), value);
            self
        }
    }

    impl EvalContext for TestEval {
        fn current_pc(&self) -> i64 {
            i64::from(self.pc)
        }

        fn lookup_symbol(&self, name: &str) -> Option<Value> {
            self.symbols
                .get(&name.to_ascii_uppercase())
                .map(|value| Value::Number(*value))
        }
    }

    impl OperandEvaluator for TestEval {
        fn evaluate(&self, tokens: &[Token]) -> Result<Evaluated, EvalError> {
            let policy = if self.final_pass {
                EvalPolicy::Strict
            } else {
                EvalPolicy::AllowForward
            };
            evaluate(tokens, self, policy)
        }

        fn current_pc(&self) -> u32 {
            self.pc
        }

        fn is_final_pass(&self) -> bool {
            self.final_pass
        }
    }

    fn resolve_with(
        eval: &TestEval,
        mnemonic: &str,
        operands: &str,
        pass_one_length: Option<u32>,
    ) -> ResolveResult<ModeInfo> {
        let tokens = Tokenizer::new(operands)
            .tokenize_all()
            .expect("operands should lex");
        let request = ResolveRequest {
            mnemonic,
            operands: &tokens,
            pass_one_length,
            span: Span::new(1, 1, 4),
        };
        M6502CpuHandler::new().resolve_addressing_mode(&request, eval)
    }

    fn assemble_one(eval: &TestEval, mnemonic: &str, operands: &str) -> Vec<u8> {
        match resolve_with(eval, mnemonic, operands, None) {
            ResolveResult::Ok(info) => M6502CpuHandler::new()
                .encode_instruction(&[], &info)
                .expect("encode"),
            other => panic!("{mnemonic} {operands} did not resolve: {other:?}"),
        }
    }

    #[test]
    fn encodes_common_addressing_modes() {
        let eval = TestEval::new(0x1000, true).with("ptr", 0x20).with("table", 0x1234);
        assert_eq!(assemble_one(&eval, "NOP", ""), vec![0xEA]);
        assert_eq!(assemble_one(&eval, "asl", ""), vec![0x0A]);
        assert_eq!(assemble_one(&eval, "ROR", "A"), vec![0x6A]);
        assert_eq!(assemble_one(&eval, "LDA", "#$41"), vec![0xA9, 0x41]);
        assert_eq!(assemble_one(&eval, "LDA", "#-1"), vec![0xA9, 0xFF]);
        assert_eq!(assemble_one(&eval, "LDA", "#>table"), vec![0xA9, 0x12]);
        assert_eq!(assemble_one(&eval, "STA", "ptr"), vec![0x85, 0x20]);
        assert_eq!(assemble_one(&eval, "STA", "table"), vec![0x8D, 0x34, 0x12]);
        assert_eq!(assemble_one(&eval, "LDA", "table,x"), vec![0xBD, 0x34, 0x12]);
        assert_eq!(assemble_one(&eval, "LDX", "ptr,y"), vec![0xB6, 0x20]);
        assert_eq!(assemble_one(&eval, "LDA", "(ptr,x)"), vec![0xA1, 0x20]);
        assert_eq!(assemble_one(&eval, "LDA", "(ptr),y"), vec![0xB1, 0x20]);
        assert_eq!(assemble_one(&eval, "JMP", "($FFFC)"), vec![0x6C, 0xFC, 0xFF]);
        assert_eq!(assemble_one(&eval, "JSR", "ptr"), vec![0x20, 0x20, 0x00]);
    }

    #[test]
    fn width_hint_forces_absolute() {
        let eval = TestEval::new(0, true).with("ptr", 0x20);
        assert_eq!(assemble_one(&eval, "LDA.W", "ptr"), vec![0xAD, 0x20, 0x00]);
    }

    #[test]
    fn branches_encode_relative_offsets() {
        let eval = TestEval::new(0x1000, true).with("back", 0x0FF0).with("ahead", 0x1010);
        assert_eq!(assemble_one(&eval, "BNE", "back"), vec![0xD0, 0xEE]);
        assert_eq!(assemble_one(&eval, "BEQ", "ahead"), vec![0xF0, 0x0E]);
        let far = TestEval::new(0x1000, true).with("far", 0x2000);
        match resolve_with(&far, "BNE", "far", None) {
            ResolveResult::Error(msg, _) => {
                assert_eq!(msg, "Branch target out of range: offset 4094")
            }
            other => panic!("expected range error, got {other:?}"),
        }
    }

    #[test]
    fn forward_references_keep_pass_one_size() {
        let first = TestEval::new(0, false);
        let ResolveResult::Ok(info) = resolve_with(&first, "LDA", "later", None) else {
            panic!("pass one should size the instruction");
        };
        assert_eq!(info.byte_length, 3);

        let second = TestEval::new(0, true).with("later", 0x10);
        let ResolveResult::Ok(info) = resolve_with(&second, "LDA", "later", Some(3)) else {
            panic!("pass two should resolve");
        };
        assert_eq!(info.byte_length, 3);
        assert_eq!(info.opcode, vec![0xAD]);
    }

    #[test]
    fn unknown_mnemonics_are_not_found() {
        let eval = TestEval::new(0, true);
        assert_eq!(resolve_with(&eval, "start", "", None), ResolveResult::NotFound);
        assert_eq!(resolve_with(&eval, "BRA", "$10", None), ResolveResult::NotFound);
    }

    #[test]
    fn reports_invalid_operands() {
        let eval = TestEval::new(0, true).with("ptr", 0x20);
        let errors = [
            ("STA", "#1", "Immediate addressing not supported for STA"),
            ("LDA", "#256", "Immediate value 256 out of range (-128..255)"),
            ("LDA", "($1234,x)", "Indirect pointer $1234 must be in zero page"),
            ("JMP", "(ptr),y", "Addressing mode (indirect),y not supported for JMP"),
            ("LDA", "missing", "Undefined symbol: missing"),
            ("LDA", "", "LDA requires an operand"),
        ];
        for (mnemonic, operands, expected) in errors {
            match resolve_with(&eval, mnemonic, operands, None) {
                ResolveResult::Error(msg, span) => {
                    assert_eq!(msg, expected, "{mnemonic} {operands}");
                    assert!(span.is_some());
                }
                other => panic!("{mnemonic} {operands}: expected error, got {other:?}"),
            }
        }
    }
}
