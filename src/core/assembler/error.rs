// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Error types, diagnostics, and reporting for the assembler.

use std::fmt;
use std::sync::Arc;

use crate::core::cpu::CpuError;
use crate::core::expr::EvalError;
use crate::core::linker::{LinkError, LinkedImage, Placement};
use crate::core::macro_processor::MacroError;
use crate::core::stream::{StreamError, StreamErrorKind};
use crate::core::tokenizer::{Span, TokenizeError};
use crate::core::value::Value;

/// Categories of assembler errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsmErrorKind {
    Lexical,
    Syntax,
    Symbol,
    Expression,
    Directive,
    Instruction,
    Macro,
    Conditional,
    Segment,
    Io,
    Cli,
    /// Raised by `.ERR` in the source.
    User,
}

/// An assembler error with a kind, message and optional source position.
#[derive(Debug, Clone, PartialEq)]
pub struct AsmError {
    kind: AsmErrorKind,
    message: String,
    span: Option<Span>,
    help: Option<String>,
    suggestion: Option<String>,
}

impl AsmError {
    pub fn new(kind: AsmErrorKind, msg: &str, param: Option<&str>) -> Self {
        Self {
            kind,
            message: format_error(msg, param),
            span: None,
            help: None,
            suggestion: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Attach `span` unless the error already carries a more precise one.
    pub fn or_span(mut self, span: Span) -> Self {
        self.span.get_or_insert(span);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.kind
    }

    pub fn span(&self) -> Option<Span> {
        self.span
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    /// Replacement text offered for the spanned source, if any.
    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AsmError {}

impl From<TokenizeError> for AsmError {
    fn from(err: TokenizeError) -> Self {
        AsmError::new(AsmErrorKind::Lexical, &err.message, None).with_span(err.span)
    }
}

impl From<StreamError> for AsmError {
    fn from(err: StreamError) -> Self {
        let kind = match err.kind {
            StreamErrorKind::Lexical => AsmErrorKind::Lexical,
            StreamErrorKind::Syntax => AsmErrorKind::Syntax,
            StreamErrorKind::Depth => AsmErrorKind::Macro,
        };
        let mut out = AsmError::new(kind, &err.message, None);
        out.span = err.span;
        out
    }
}

impl From<EvalError> for AsmError {
    fn from(err: EvalError) -> Self {
        let kind = if err.message.starts_with("Undefined symbol") {
            AsmErrorKind::Symbol
        } else {
            AsmErrorKind::Expression
        };
        let mut out = AsmError::new(kind, &err.message, None);
        out.span = err.span;
        if let Some(suggestion) = err.suggestion {
            out.help = Some(format!("did you mean '{suggestion}'?"));
            out.suggestion = Some(suggestion);
        }
        out
    }
}

impl From<MacroError> for AsmError {
    fn from(err: MacroError) -> Self {
        let mut out = AsmError::new(AsmErrorKind::Macro, err.message(), None);
        out.span = err.span();
        out
    }
}

impl From<LinkError> for AsmError {
    fn from(err: LinkError) -> Self {
        AsmError::new(AsmErrorKind::Segment, &err.to_string(), None)
    }
}

impl From<CpuError> for AsmError {
    fn from(err: CpuError) -> Self {
        let mut out = AsmError::new(AsmErrorKind::Instruction, &err.message, None);
        out.span = err.span;
        out
    }
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledSpan {
    pub file: Option<String>,
    pub line: u32,
    pub col_start: Option<usize>,
    pub col_end: Option<usize>,
    pub label: Option<String>,
    /// Source text of `line`, when known.
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixit {
    pub file: Option<String>,
    pub line: u32,
    pub col_start: Option<usize>,
    pub col_end: Option<usize>,
    pub replacement: String,
}

/// A diagnostic message with location and context.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub(crate) line: u32,
    pub(crate) column: Option<usize>,
    pub(crate) col_end: Option<usize>,
    pub(crate) code: String,
    pub(crate) severity: Severity,
    pub(crate) error: AsmError,
    pub(crate) file: Option<String>,
    pub(crate) source: Option<String>,
    pub(crate) related_spans: Vec<LabeledSpan>,
    pub(crate) notes: Vec<String>,
    pub(crate) help: Vec<String>,
    pub(crate) fixits: Vec<Fixit>,
}

impl Diagnostic {
    pub fn new(line: u32, severity: Severity, error: AsmError) -> Self {
        Self {
            line,
            column: None,
            col_end: None,
            code: default_diagnostic_code(error.kind()).to_string(),
            severity,
            error,
            file: None,
            source: None,
            related_spans: Vec::new(),
            notes: Vec::new(),
            help: Vec::new(),
            fixits: Vec::new(),
        }
    }

    /// Build a diagnostic positioned at the error's own span, carrying its
    /// help text and replacement suggestion.
    pub fn from_error(severity: Severity, error: AsmError, file: Option<String>) -> Self {
        let span = error.span();
        let help = error.help().map(str::to_string);
        let suggestion = error.suggestion().map(str::to_string);
        let mut diag = Diagnostic::new(span.map_or(0, |s| s.line), severity, error)
            .with_column(span.map(|s| s.col_start))
            .with_col_end(span.map(|s| s.col_end))
            .with_file(file);
        if let Some(help) = help {
            diag = diag.with_help(help);
        }
        if let (Some(replacement), Some(span)) = (suggestion, span) {
            let file = diag.file.clone();
            diag = diag.with_fixit(Fixit {
                file,
                line: span.line,
                col_start: Some(span.col_start),
                col_end: Some(span.col_end),
                replacement,
            });
        }
        diag
    }

    pub fn with_column(mut self, column: Option<usize>) -> Self {
        self.column = column;
        self
    }

    pub fn with_col_end(mut self, col_end: Option<usize>) -> Self {
        self.col_end = col_end;
        self
    }

    pub fn with_file(mut self, file: Option<String>) -> Self {
        self.file = file;
        self
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    pub fn with_related_span(mut self, span: LabeledSpan) -> Self {
        self.related_spans.push(span);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }

    pub fn with_fixit(mut self, fixit: Fixit) -> Self {
        self.fixits.push(fixit);
        self
    }

    fn severity_label(&self) -> &'static str {
        match self.severity {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }

    pub fn format(&self) -> String {
        let location = match (&self.file, self.column) {
            (Some(file), Some(col)) => format!("{file}:{}:{col}", self.line),
            (Some(file), None) => format!("{file}:{}", self.line),
            (None, _) => self.line.to_string(),
        };
        format!(
            "{location}: {} [{}] - {}",
            self.severity_label(),
            self.code,
            self.error.message()
        )
    }

    /// Multi-line rendering: header, the offending source line with the
    /// column highlighted, related spans, notes, help and fix-its.
    pub fn format_with_context(&self, lines: Option<&[String]>, use_color: bool) -> String {
        let sev = self.severity_label();
        let header = match &self.file {
            Some(file) => format!("{file}:{}: {sev} [{}]", self.line, self.code),
            None => format!("{}: {sev} [{}]", self.line, self.code),
        };

        let mut out = String::new();
        out.push_str(&header);
        out.push('\n');

        let context = build_context_lines(
            self.line,
            self.column,
            self.col_end,
            lines,
            self.source.as_deref(),
            use_color,
        );
        for line in context {
            out.push_str(&line);
            out.push('\n');
        }

        for related in &self.related_spans {
            let ctx = build_context_lines(
                related.line,
                related.col_start,
                related.col_end,
                lines,
                related.source.as_deref(),
                use_color,
            );
            for line in ctx.iter().take(1) {
                out.push_str("      = ");
                out.push_str(line.trim_start());
                out.push('\n');
            }
            if let Some(label) = &related.label {
                out.push_str("      = note: ");
                out.push_str(label);
                out.push('\n');
            }
        }

        for note in &self.notes {
            out.push_str("note: ");
            out.push_str(note);
            out.push('\n');
        }

        for help in &self.help {
            out.push_str("help: ");
            out.push_str(help);
            out.push('\n');
        }

        for fixit in &self.fixits {
            out.push_str("suggestion: replace ");
            out.push_str(&format_span_bounds(
                fixit.line,
                fixit.col_start,
                fixit.col_end,
            ));
            out.push_str(" with ");
            out.push_str(&format!("{:?}", fixit.replacement));
            out.push('\n');
        }

        out.push_str(&format!("{sev}: {}", self.error.message()));
        out
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.error.kind()
    }

    pub fn code(&self) -> &str {
        self.code.as_str()
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> Option<usize> {
        self.column
    }

    pub fn col_end(&self) -> Option<usize> {
        self.col_end
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn message(&self) -> &str {
        self.error.message()
    }

    pub fn related_spans(&self) -> &[LabeledSpan] {
        &self.related_spans
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn help(&self) -> &[String] {
        &self.help
    }

    pub fn fixits(&self) -> &[Fixit] {
        &self.fixits
    }
}

/// Report from a successful assembly run.
#[derive(Debug)]
pub struct AsmRunReport {
    image: LinkedImage,
    symbols: Vec<(String, Value)>,
    diagnostics: Vec<Diagnostic>,
    source_lines: Arc<Vec<String>>,
    counts: PassCounts,
}

impl AsmRunReport {
    pub fn new(
        image: LinkedImage,
        symbols: Vec<(String, Value)>,
        diagnostics: Vec<Diagnostic>,
        source_lines: impl Into<Arc<Vec<String>>>,
        counts: PassCounts,
    ) -> Self {
        Self {
            image,
            symbols,
            diagnostics,
            source_lines: source_lines.into(),
            counts,
        }
    }

    pub fn image(&self) -> &LinkedImage {
        &self.image
    }

    pub fn bytes(&self) -> &[u8] {
        &self.image.bytes
    }

    pub fn origin(&self) -> u32 {
        self.image.origin
    }

    pub fn placements(&self) -> &[Placement] {
        &self.image.placements
    }

    /// Exported symbols sorted by qualified name.
    pub fn symbols(&self) -> &[(String, Value)] {
        &self.symbols
    }

    pub fn symbol(&self, name: &str) -> Option<&Value> {
        self.symbols
            .iter()
            .find(|(sym, _)| sym.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Lines of the main source file.
    pub fn source_lines(&self) -> &[String] {
        &self.source_lines
    }

    pub fn counts(&self) -> PassCounts {
        self.counts
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }
}

/// Error from a failed assembly run. No image is produced.
#[derive(Debug)]
pub struct AsmRunError {
    error: AsmError,
    diagnostics: Vec<Diagnostic>,
    source_lines: Arc<Vec<String>>,
}

impl AsmRunError {
    pub fn new(
        error: AsmError,
        diagnostics: Vec<Diagnostic>,
        source_lines: impl Into<Arc<Vec<String>>>,
    ) -> Self {
        Self {
            error,
            diagnostics,
            source_lines: source_lines.into(),
        }
    }

    pub fn error(&self) -> &AsmError {
        &self.error
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn source_lines(&self) -> &[String] {
        &self.source_lines
    }
}

impl fmt::Display for AsmRunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for AsmRunError {}

/// Pass statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassCounts {
    pub lines: u32,
    pub errors: u32,
    pub warnings: u32,
}

impl PassCounts {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Build context lines for error display.
pub fn build_context_lines(
    line_num: u32,
    column: Option<usize>,
    col_end: Option<usize>,
    lines: Option<&[String]>,
    source_override: Option<&str>,
    use_color: bool,
) -> Vec<String> {
    let text = match (source_override, lines) {
        (Some(source), _) => Some(source),
        (None, Some(lines)) => line_num
            .checked_sub(1)
            .and_then(|idx| lines.get(idx as usize))
            .map(String::as_str),
        (None, None) => None,
    };
    let Some(text) = text else {
        return vec![format!("{:>5} | <source unavailable>", line_num)];
    };
    let mut out = vec![format!(
        "{:>5} | {}",
        line_num,
        crate::core::report::highlight_line(text, column, use_color)
    )];
    if let Some(col) = column {
        out.push(format!(
            "{:>5} | {}",
            "",
            crate::core::report::caret_line(text, col, col_end)
        ));
    }
    out
}

fn format_span_bounds(line: u32, col_start: Option<usize>, col_end: Option<usize>) -> String {
    match (col_start, col_end) {
        (Some(start), Some(end)) => format!("{line}:{start}-{end}"),
        (Some(start), None) => format!("{line}:{start}"),
        _ => format!("{line}"),
    }
}

fn default_diagnostic_code(kind: AsmErrorKind) -> &'static str {
    match kind {
        AsmErrorKind::Lexical => "asm001",
        AsmErrorKind::Syntax => "asm002",
        AsmErrorKind::Cli => "asm101",
        AsmErrorKind::Conditional => "asm201",
        AsmErrorKind::Directive => "asm202",
        AsmErrorKind::Macro => "asm203",
        AsmErrorKind::Symbol => "asm301",
        AsmErrorKind::Expression => "asm401",
        AsmErrorKind::Instruction => "asm402",
        AsmErrorKind::Segment => "asm502",
        AsmErrorKind::Io => "asm501",
        AsmErrorKind::User => "asm601",
    }
}

/// Format an error message with an optional parameter.
pub fn format_error(msg: &str, param: Option<&str>) -> String {
    match param {
        Some(p) => format!("{msg}: {p}"),
        None => msg.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_format_includes_location_and_severity() {
        let err = AsmError::new(AsmErrorKind::Directive, "Bad thing", None);
        let diag = Diagnostic::new(12, Severity::Error, err);
        assert_eq!(diag.format(), "12: ERROR [asm202] - Bad thing");

        let err = AsmError::new(AsmErrorKind::Symbol, "Undefined symbol", Some("foo"));
        let diag = Diagnostic::new(3, Severity::Warning, err)
            .with_file(Some("main.asm".to_string()))
            .with_column(Some(7));
        assert_eq!(
            diag.format(),
            "main.asm:3:7: WARNING [asm301] - Undefined symbol: foo"
        );
    }

    #[test]
    fn eval_errors_carry_suggestion_as_help_and_fixit() {
        let err = EvalError::with_span("Undefined symbol: countr", Span::new(2, 5, 11))
            .with_suggestion(Some("COUNTER".to_string()));
        let asm: AsmError = err.into();
        assert_eq!(asm.kind(), AsmErrorKind::Symbol);
        let diag = Diagnostic::from_error(Severity::Error, asm, Some("a.asm".to_string()));
        assert_eq!(diag.line(), 2);
        assert_eq!(diag.column(), Some(5));
        assert_eq!(diag.help(), &["did you mean 'COUNTER'?".to_string()]);
        assert_eq!(diag.fixits()[0].replacement, "COUNTER");
    }

    #[test]
    fn component_errors_map_to_kinds() {
        let tok = TokenizeError {
            message: "Unterminated string".to_string(),
            span: Span::new(1, 2, 3),
        };
        assert_eq!(AsmError::from(tok).kind(), AsmErrorKind::Lexical);
        let link = LinkError::MissingSegment("CODE".to_string());
        let asm = AsmError::from(link);
        assert_eq!(asm.kind(), AsmErrorKind::Segment);
        assert_eq!(asm.message(), "Unknown segment 'CODE'");
        let cpu = CpuError::with_span("bad mode", Span::new(4, 1, 2));
        assert_eq!(AsmError::from(cpu).span(), Some(Span::new(4, 1, 2)));
        let mac = MacroError::new("Expected macro name", None);
        assert_eq!(AsmError::from(mac).kind(), AsmErrorKind::Macro);
    }

    #[test]
    fn format_with_context_renders_notes_and_help_after_related_spans() {
        let err = AsmError::new(AsmErrorKind::Conditional, "Unterminated .IF", None);
        let diag = Diagnostic::new(3, Severity::Error, err)
            .with_file(Some("example.asm".to_string()))
            .with_column(Some(1))
            .with_related_span(LabeledSpan {
                file: Some("example.asm".to_string()),
                line: 1,
                col_start: Some(1),
                col_end: Some(4),
                label: Some("opened here".to_string()),
                source: None,
            })
            .with_note("every .IF needs a matching .END")
            .with_help("add `.END` after the block");

        let lines = vec![
            ".if 1".to_string(),
            "lda #$01".to_string(),
            "lda #$02".to_string(),
        ];

        let rendered = diag.format_with_context(Some(&lines), false);
        assert!(rendered.contains("example.asm:3: ERROR [asm201]"));
        assert!(rendered.contains("      = 1 | .if 1"));
        assert!(rendered.contains("      = note: opened here"));
        assert!(rendered.contains("note: every .IF needs a matching .END"));
        assert!(rendered.contains("help: add `.END` after the block"));
        assert!(rendered.ends_with("ERROR: Unterminated .IF"));

        let related_idx = rendered
            .find("      = note: opened here")
            .expect("related note label should be present");
        let help_idx = rendered
            .find("help: add `.END` after the block")
            .expect("help should be present");
        assert!(related_idx < help_idx, "related label must render before help");
    }

    #[test]
    fn format_with_context_renders_caret_and_fixit() {
        let err = AsmError::new(AsmErrorKind::Symbol, "Undefined symbol: lenght", None);
        let diag = Diagnostic::new(1, Severity::Error, err)
            .with_source(Some("  .db lenght".to_string()))
            .with_column(Some(7))
            .with_col_end(Some(13))
            .with_fixit(Fixit {
                file: None,
                line: 1,
                col_start: Some(7),
                col_end: Some(13),
                replacement: "LENGTH".to_string(),
            });
        let rendered = diag.format_with_context(None, false);
        let expected = [
            "1: ERROR [asm301]",
            "    1 |   .db lenght",
            "      |       ^^^^^^",
            "suggestion: replace 1:7-13 with \"LENGTH\"",
            "ERROR: Undefined symbol: lenght",
        ]
        .join("\n");
        assert_eq!(rendered, expected);
    }
}
