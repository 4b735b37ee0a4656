// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Directive table.
//!
//! Each directive is a static strategy object. Handlers read their own
//! operands from the stream since some take raw text or whole blocks.

use super::asmline_conditionals::{ElseDirective, ElseIfDirective, EndDirective, IfDirective};
use super::asmline_directives_data::{
    ByteDirective, FillDirective, HexDirective, IncbinDirective, LongDirective, WordDirective,
};
use super::asmline_directives_layout::{AlignDirective, OrgDirective, SegmentDirective};
use super::asmline_directives_log::{ListDirective, LogDirective, LogKind};
use super::asmline_directives_loops::{ForDirective, RepeatDirective};
use super::asmline_directives_scope::{
    CpuDirective, DefineDirective, IncludeDirective, NamespaceDirective, OptionDirective,
};
use super::asmline_directives_text::{TextDirective, TextForm};
use super::asmline_macros::MacroDirective;
use super::*;

/// A directive occurrence: its name and where it was written.
pub(crate) struct DirectiveCall {
    /// Uppercased, without the leading dot.
    pub(crate) name: String,
    pub(crate) span: Span,
}

impl DirectiveCall {
    pub(crate) fn new(name: &str, token: &Token) -> Self {
        Self {
            name: name.to_string(),
            span: token.span,
        }
    }

    pub(crate) fn line(&self) -> u32 {
        self.span.line
    }

    pub(crate) fn display_name(&self) -> String {
        format!(".{}", self.name)
    }
}

pub(crate) trait DirectiveHandler: Sync {
    /// Size and define; never writes bytes.
    fn handle_pass_one(&self, asm: &mut Assembler<'_>, call: &DirectiveCall)
        -> Result<(), AsmError>;

    /// Evaluate strictly and write.
    fn handle_pass_two(
        &self,
        asm: &mut Assembler<'_>,
        call: &DirectiveCall,
    ) -> Result<(), AsmError> {
        self.handle_pass_one(asm, call)
    }

    /// Consume the directive while conditional assembly is off.
    fn skip(&self, asm: &mut Assembler<'_>, call: &DirectiveCall) -> Result<(), AsmError> {
        asm.stream.take_line(call.line())?;
        Ok(())
    }
}

static DIRECTIVES: &[(&str, &dyn DirectiveHandler)] = &[
    ("ORG", &OrgDirective),
    ("SEGMENT", &SegmentDirective),
    ("ALIGN", &AlignDirective),
    ("DB", &ByteDirective),
    ("BYTE", &ByteDirective),
    ("DW", &WordDirective),
    ("WORD", &WordDirective),
    ("DL", &LongDirective),
    ("LONG", &LongDirective),
    ("HEX", &HexDirective),
    ("FILL", &FillDirective),
    ("DS", &FillDirective),
    ("RES", &FillDirective),
    ("INCBIN", &IncbinDirective),
    ("TEXT", &TextDirective(TextForm::Plain)),
    ("CSTR", &TextDirective(TextForm::ZeroTerminated)),
    ("PSTR", &TextDirective(TextForm::LengthPrefixed)),
    ("PSTRL", &TextDirective(TextForm::LongLengthPrefixed)),
    ("IF", &IfDirective),
    ("ELSEIF", &ElseIfDirective),
    ("ELSE", &ElseDirective),
    ("END", &EndDirective),
    ("FOR", &ForDirective),
    ("REPEAT", &RepeatDirective),
    ("MACRO", &MacroDirective),
    ("DEFINE", &DefineDirective),
    ("NAMESPACE", &NamespaceDirective),
    ("INCLUDE", &IncludeDirective),
    ("OPTION", &OptionDirective),
    ("CPU", &CpuDirective),
    ("LOG", &LogDirective(LogKind::Log)),
    ("WARN", &LogDirective(LogKind::Warn)),
    ("ERR", &LogDirective(LogKind::Err)),
    ("LIST", &ListDirective),
];

/// Handler for an uppercased directive name without its dot.
pub(crate) fn lookup(name: &str) -> Option<&'static dyn DirectiveHandler> {
    DIRECTIVES
        .iter()
        .find(|(directive, _)| *directive == name)
        .map(|(_, handler)| *handler)
}

impl<'a> Assembler<'a> {
    pub(crate) fn directive(&mut self, name: &str, token: &Token) -> Result<(), AsmError> {
        let Some(handler) = lookup(name) else {
            return Err(AsmError::new(
                AsmErrorKind::Directive,
                "Unknown directive",
                Some(&format!(".{name}")),
            )
            .with_span(token.span));
        };
        let call = DirectiveCall::new(name, token);
        let result = if self.is_final_pass() {
            handler.handle_pass_two(self, &call)
        } else {
            handler.handle_pass_one(self, &call)
        };
        result.map_err(|err| err.or_span(token.span))
    }

    /// Error for a directive that expected nothing more on its line.
    pub(crate) fn expect_line_end(&mut self, call: &DirectiveCall) -> Result<(), AsmError> {
        let rest = self.stream.take_line(call.line())?;
        match rest.first() {
            None => Ok(()),
            Some(extra) => Err(AsmError::new(
                AsmErrorKind::Syntax,
                &format!("Unexpected token after {}", call.display_name()),
                Some(&extra.text()),
            )
            .with_span(extra.span)),
        }
    }

    /// Tokens of a block directive's line, stopping before the `{` that opens
    /// its body.
    pub(crate) fn take_header(&mut self, call: &DirectiveCall) -> Result<Vec<Token>, AsmError> {
        let mut header = Vec::new();
        let mut depth = 0usize;
        while let Some(token) = self.stream.peek(0)? {
            if token.span.line != call.line() {
                break;
            }
            match token.kind {
                TokenKind::OpenBrace if depth == 0 => break,
                TokenKind::OpenParen | TokenKind::OpenBracket | TokenKind::OpenBrace => depth += 1,
                TokenKind::CloseParen | TokenKind::CloseBracket | TokenKind::CloseBrace => {
                    depth = depth.saturating_sub(1)
                }
                _ => {}
            }
            self.stream.advance(1)?;
            header.push(token);
        }
        Ok(header)
    }

    /// Operand expressions of `call`, checking the count.
    pub(crate) fn directive_operands(
        &mut self,
        call: &DirectiveCall,
        min: usize,
        max: usize,
    ) -> Result<Vec<Vec<Token>>, AsmError> {
        let items = self.take_expression_list(call.line(), call.span)?;
        if items.len() < min || items.len() > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{min} to {max}")
            };
            return Err(AsmError::new(
                AsmErrorKind::Directive,
                &format!(
                    "{} expects {expected} operand(s), got {}",
                    call.display_name(),
                    items.len()
                ),
                None,
            )
            .with_span(call.span));
        }
        Ok(items)
    }
}
