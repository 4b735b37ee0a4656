// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Pull-based tokenizer for assembler source text.
//!
//! The tokenizer is CPU-agnostic and has no knowledge of directives. It
//! produces one [`Token`] per call, can be switched into raw mode to capture
//! the text of a block body as a single [`TokenKind::RawText`] token, and can
//! be rewound by a bounded number of tokens after lookahead.

use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::core::text_utils::{is_ident_char, is_ident_start, is_space, strip_comment};

/// Local-label character used when no `.OPTION local_label_style` is active.
pub const DEFAULT_LOCAL_LABEL_CHAR: char = ':';

/// Characters accepted by `.OPTION local_label_style`.
pub const LOCAL_LABEL_CHARS: &[char] = &[':', '@'];

const REWIND_HISTORY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: u32,
    pub col_start: usize,
    pub col_end: usize,
}

impl Span {
    pub fn new(line: u32, col_start: usize, col_end: usize) -> Self {
        Self {
            line,
            col_start,
            col_end,
        }
    }
}

/// Radix a numeric literal was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    Binary,
    Decimal,
    Hex,
    Char,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberLiteral {
    pub text: String,
    pub radix: Radix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLiteral {
    pub raw: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Plus,
    Minus,
    Negate,
    Multiply,
    Divide,
    Mod,
    Shl,
    Shr,
    BitNot,
    LogicNot,
    BitAnd,
    BitOr,
    BitXor,
    LogicAnd,
    LogicOr,
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
    Assign,
}

impl OperatorKind {
    pub fn symbol(self) -> &'static str {
        match self {
            OperatorKind::Plus => "+",
            OperatorKind::Minus | OperatorKind::Negate => "-",
            OperatorKind::Multiply => "*",
            OperatorKind::Divide => "/",
            OperatorKind::Mod => "%",
            OperatorKind::Shl => "<<",
            OperatorKind::Shr => ">>",
            OperatorKind::BitNot => "~",
            OperatorKind::LogicNot => "!",
            OperatorKind::BitAnd => "&",
            OperatorKind::BitOr => "|",
            OperatorKind::BitXor => "^",
            OperatorKind::LogicAnd => "&&",
            OperatorKind::LogicOr => "||",
            OperatorKind::Eq => "==",
            OperatorKind::Ne => "!=",
            OperatorKind::Ge => ">=",
            OperatorKind::Gt => ">",
            OperatorKind::Le => "<=",
            OperatorKind::Lt => "<",
            OperatorKind::Assign => "=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    /// `name:` label definition.
    Label(String),
    /// `:name` label scoped to the last global label.
    LocalLabel(String),
    /// Bare local-label character.
    AnonLabelDef,
    /// `:-`, `:++`, `:+3`; negative counts look backward.
    AnonLabelRef(i32),
    Number(NumberLiteral),
    String(StringLiteral),
    RawText(String),
    /// Synthetic array built from argument token sequences.
    ArrayLiteral(Vec<Vec<Token>>),
    Operator(OperatorKind),
    Comma,
    Hash,
    Ellipsis,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    OpenBrace,
    CloseBrace,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Byte offset of the token in its source text.
    pub offset: usize,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self {
            kind,
            span,
            offset: 0,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self.kind, TokenKind::End)
    }

    pub fn identifier(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Identifier(name) => Some(name.as_str()),
            _ => None,
        }
    }

    /// True for an identifier spelled `name`, ignoring ASCII case.
    pub fn is_word(&self, name: &str) -> bool {
        self.identifier()
            .is_some_and(|ident| ident.eq_ignore_ascii_case(name))
    }

    /// Directive name without its leading dot, uppercased.
    pub fn directive_name(&self) -> Option<String> {
        let ident = self.identifier()?;
        let name = ident.strip_prefix('.')?;
        if name.is_empty() {
            return None;
        }
        Some(name.to_ascii_uppercase())
    }

    /// Copy of this token moved to another source position.
    pub fn restamp(&self, span: Span) -> Token {
        let kind = match &self.kind {
            TokenKind::ArrayLiteral(items) => TokenKind::ArrayLiteral(
                items
                    .iter()
                    .map(|item| item.iter().map(|tok| tok.restamp(span)).collect())
                    .collect(),
            ),
            other => other.clone(),
        };
        Token {
            kind,
            span,
            offset: self.offset,
        }
    }

    /// Source-like rendering used in diagnostics.
    pub fn text(&self) -> String {
        match &self.kind {
            TokenKind::Identifier(name) => name.clone(),
            TokenKind::Label(name) => format!("{name}:"),
            TokenKind::LocalLabel(name) => format!(":{name}"),
            TokenKind::AnonLabelDef => ":".to_string(),
            TokenKind::AnonLabelRef(count) => {
                let sign = if *count < 0 { "-" } else { "+" };
                format!(":{}", sign.repeat(count.unsigned_abs() as usize))
            }
            TokenKind::Number(lit) => lit.text.clone(),
            TokenKind::String(lit) => lit.raw.clone(),
            TokenKind::RawText(text) => text.clone(),
            TokenKind::ArrayLiteral(items) => format!("[{} items]", items.len()),
            TokenKind::Operator(op) => op.symbol().to_string(),
            TokenKind::Comma => ",".to_string(),
            TokenKind::Hash => "#".to_string(),
            TokenKind::Ellipsis => "...".to_string(),
            TokenKind::OpenParen => "(".to_string(),
            TokenKind::CloseParen => ")".to_string(),
            TokenKind::OpenBracket => "[".to_string(),
            TokenKind::CloseBracket => "]".to_string(),
            TokenKind::OpenBrace => "{".to_string(),
            TokenKind::CloseBrace => "}".to_string(),
            TokenKind::End => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizeError {
    pub message: String,
    pub span: Span,
}

impl fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TokenizeError {}

/// Where a raw text block stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEnd<'m> {
    EndOfLine,
    Marker(&'m str),
}

/// Resumable tokenizer position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexPosition {
    cursor: usize,
    line: u32,
    line_start: usize,
    operand_ended: bool,
    last_line: u32,
    /// Only label definitions have been read on this line so far.
    labels_only: bool,
    /// The previous token is the statement's mnemonic or directive.
    after_mnemonic: bool,
}

impl LexPosition {
    pub fn offset(&self) -> usize {
        self.cursor
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

pub struct Tokenizer {
    source: Rc<str>,
    pos: LexPosition,
    local_label_char: u8,
    history: VecDeque<LexPosition>,
}

impl Tokenizer {
    pub fn new(source: impl Into<Rc<str>>) -> Self {
        Self {
            source: source.into(),
            pos: LexPosition {
                cursor: 0,
                line: 1,
                line_start: 0,
                operand_ended: false,
                last_line: 1,
                labels_only: true,
                after_mnemonic: false,
            },
            local_label_char: DEFAULT_LOCAL_LABEL_CHAR as u8,
            history: VecDeque::with_capacity(REWIND_HISTORY),
        }
    }

    pub fn with_local_label_char(mut self, ch: char) -> Self {
        self.set_local_label_char(ch);
        self
    }

    pub fn set_local_label_char(&mut self, ch: char) {
        if ch.is_ascii() {
            self.local_label_char = ch as u8;
        }
    }

    pub fn local_label_char(&self) -> char {
        self.local_label_char as char
    }

    pub fn source(&self) -> &Rc<str> {
        &self.source
    }

    pub fn position(&self) -> LexPosition {
        self.pos
    }

    /// Jump to a position previously returned by [`Tokenizer::position`].
    pub fn seek(&mut self, pos: LexPosition) {
        self.pos = pos;
        self.history.clear();
    }

    /// Undo the last `count` produced tokens.
    pub fn rewind(&mut self, count: usize) -> Result<(), TokenizeError> {
        if count == 0 {
            return Ok(());
        }
        if count > self.history.len() {
            return Err(TokenizeError {
                message: format!(
                    "Cannot rewind {count} tokens; only {} are remembered",
                    self.history.len()
                ),
                span: self.point_span(),
            });
        }
        let keep = self.history.len() - count;
        if let Some(pos) = self.history.get(keep).copied() {
            self.pos = pos;
        }
        self.history.truncate(keep);
        Ok(())
    }

    /// Tokenize the whole source, excluding the trailing `End` token.
    pub fn tokenize_all(mut self) -> Result<Vec<Token>, TokenizeError> {
        let mut out = Vec::new();
        loop {
            let token = self.next_token()?;
            if token.is_end() {
                return Ok(out);
            }
            out.push(token);
        }
    }

    pub fn next_token(&mut self) -> Result<Token, TokenizeError> {
        self.remember();
        self.skip_trivia()?;
        if self.pos.line != self.pos.last_line {
            self.pos.operand_ended = false;
            self.pos.last_line = self.pos.line;
            self.pos.labels_only = true;
            self.pos.after_mnemonic = false;
        }

        let start = self.pos.cursor;
        let c = self.current_byte();
        if c == 0 && start >= self.source.len() {
            return Ok(self.make(TokenKind::End, start));
        }

        let kind = if c == self.local_label_char {
            self.scan_local_label()?
        } else if is_ident_start(c) || (c == b'.' && is_ident_start(self.peek_byte(1))) {
            self.scan_identifier()
        } else if c.is_ascii_digit() {
            self.scan_number()?
        } else if c == b'$' {
            self.scan_prefixed_number(1, 16, Radix::Hex)?
        } else if c == b'%' && self.binary_literal_allowed() {
            self.scan_prefixed_number(1, 2, Radix::Binary)?
        } else if c == b'"' {
            self.scan_string()?
        } else if c == b'\'' {
            self.scan_quote()?
        } else if c == b'.' && self.peek_byte(1) == b'.' && self.peek_byte(2) == b'.' {
            self.pos.cursor += 3;
            TokenKind::Ellipsis
        } else {
            self.scan_punct()?
        };

        self.pos.operand_ended = match &kind {
            TokenKind::Identifier(_)
            | TokenKind::Number(_)
            | TokenKind::String(_)
            | TokenKind::LocalLabel(_)
            | TokenKind::AnonLabelRef(_)
            | TokenKind::CloseParen
            | TokenKind::CloseBracket => true,
            // `*` in operand position is the program counter.
            TokenKind::Operator(OperatorKind::Multiply) => !self.pos.operand_ended,
            _ => false,
        };
        self.pos.after_mnemonic =
            self.pos.labels_only && matches!(kind, TokenKind::Identifier(_));
        self.pos.labels_only &= matches!(
            kind,
            TokenKind::Label(_) | TokenKind::LocalLabel(_) | TokenKind::AnonLabelDef
        );
        Ok(self.make(kind, start))
    }

    /// Capture raw source text as one token instead of tokenizing it.
    pub fn read_raw_until(&mut self, end: RawEnd<'_>) -> Result<Token, TokenizeError> {
        self.remember();
        let start = self.pos.cursor;
        let start_line = self.pos.line;
        let start_col = start.saturating_sub(self.pos.line_start) + 1;
        let rest = &self.source[start..];
        let (raw, consumed) = match end {
            RawEnd::EndOfLine => {
                let line_len = rest.find('\n').unwrap_or(rest.len());
                (strip_comment(&rest[..line_len]).trim().to_string(), line_len)
            }
            RawEnd::Marker(marker) => match find_marker(rest, marker) {
                Some(idx) => (rest[..idx].trim().to_string(), idx + marker.len()),
                None => {
                    return Err(TokenizeError {
                        message: format!("Unterminated block: expected '{marker}'"),
                        span: Span::new(start_line, start_col, start_col),
                    })
                }
            },
        };
        let consumed_text = &self.source[start..start + consumed];
        for (idx, byte) in consumed_text.bytes().enumerate() {
            if byte == b'\n' {
                self.pos.line += 1;
                self.pos.line_start = start + idx + 1;
            }
        }
        self.pos.cursor = start + consumed;
        self.pos.operand_ended = false;
        self.pos.last_line = self.pos.line;
        let mut token = Token::new(
            TokenKind::RawText(raw),
            Span::new(start_line, start_col, start_col),
        );
        token.offset = start;
        Ok(token)
    }

    fn remember(&mut self) {
        if self.history.len() == REWIND_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(self.pos);
    }

    fn make(&self, kind: TokenKind, start: usize) -> Token {
        let line_start = self.pos.line_start;
        let col_start = start.saturating_sub(line_start) + 1;
        let col_end = self.pos.cursor.saturating_sub(line_start) + 1;
        Token {
            kind,
            span: Span::new(self.pos.line, col_start, col_end),
            offset: start,
        }
    }

    fn point_span(&self) -> Span {
        let col = self.pos.cursor.saturating_sub(self.pos.line_start) + 1;
        Span::new(self.pos.line, col, col)
    }

    fn error_at(&self, start: usize, message: String) -> TokenizeError {
        let col_start = start.saturating_sub(self.pos.line_start) + 1;
        let col_end = self.pos.cursor.saturating_sub(self.pos.line_start) + 1;
        TokenizeError {
            message,
            span: Span::new(self.pos.line, col_start, col_end.max(col_start)),
        }
    }

    fn skip_trivia(&mut self) -> Result<(), TokenizeError> {
        loop {
            let c = self.current_byte();
            if is_space(c) {
                self.pos.cursor += 1;
            } else if c == b'\n' {
                self.newline();
            } else if c == b';' || (c == b'/' && self.peek_byte(1) == b'/') {
                while self.current_byte() != b'\n' && !self.at_end() {
                    self.pos.cursor += 1;
                }
            } else if c == b'/' && self.peek_byte(1) == b'*' {
                let start = self.pos.cursor;
                let start_line = self.pos.line;
                let start_col = start.saturating_sub(self.pos.line_start) + 1;
                self.pos.cursor += 2;
                loop {
                    if self.at_end() {
                        return Err(TokenizeError {
                            message: "Unterminated block comment".to_string(),
                            span: Span::new(start_line, start_col, start_col + 2),
                        });
                    }
                    if self.current_byte() == b'*' && self.peek_byte(1) == b'/' {
                        self.pos.cursor += 2;
                        break;
                    }
                    if self.current_byte() == b'\n' {
                        self.newline();
                    } else {
                        self.pos.cursor += 1;
                    }
                }
            } else {
                return Ok(());
            }
        }
    }

    fn newline(&mut self) {
        self.pos.cursor += 1;
        self.pos.line += 1;
        self.pos.line_start = self.pos.cursor;
    }

    fn scan_local_label(&mut self) -> Result<TokenKind, TokenizeError> {
        let start = self.pos.cursor;
        self.pos.cursor += 1;
        let next = self.current_byte();
        if is_ident_start(next) {
            let name_start = self.pos.cursor;
            while is_ident_char(self.current_byte()) {
                self.pos.cursor += 1;
            }
            return Ok(TokenKind::LocalLabel(
                self.source[name_start..self.pos.cursor].to_string(),
            ));
        }
        if next == b'-' || next == b'+' {
            let sign: i32 = if next == b'-' { -1 } else { 1 };
            self.pos.cursor += 1;
            if self.current_byte().is_ascii_digit() {
                let digits_start = self.pos.cursor;
                while self.current_byte().is_ascii_digit() {
                    self.pos.cursor += 1;
                }
                let count: i32 = self.source[digits_start..self.pos.cursor]
                    .parse()
                    .map_err(|_| {
                        self.error_at(start, "Anonymous label count is too large".to_string())
                    })?;
                if count == 0 {
                    return Err(self.error_at(
                        start,
                        "Anonymous label count must be at least 1".to_string(),
                    ));
                }
                return Ok(TokenKind::AnonLabelRef(sign * count));
            }
            let mut count = 1;
            while self.current_byte() == next {
                self.pos.cursor += 1;
                count += 1;
            }
            return Ok(TokenKind::AnonLabelRef(sign * count));
        }
        Ok(TokenKind::AnonLabelDef)
    }

    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos.cursor;
        if self.current_byte() == b'.' {
            self.pos.cursor += 1;
        }
        loop {
            while is_ident_char(self.current_byte()) {
                self.pos.cursor += 1;
            }
            if self.current_byte() == b':'
                && self.peek_byte(1) == b':'
                && is_ident_start(self.peek_byte(2))
            {
                self.pos.cursor += 2;
                continue;
            }
            break;
        }
        let name = self.source[start..self.pos.cursor].to_string();
        if self.current_byte() == b':' && self.peek_byte(1) != b':' && !name.starts_with('.') {
            self.pos.cursor += 1;
            return TokenKind::Label(name);
        }
        TokenKind::Identifier(name)
    }

    fn scan_number(&mut self) -> Result<TokenKind, TokenizeError> {
        let next = self.peek_byte(1).to_ascii_lowercase();
        if self.current_byte() == b'0' && next == b'x' {
            return self.scan_prefixed_number(2, 16, Radix::Hex);
        }
        if self.current_byte() == b'0' && next == b'b' && matches!(self.peek_byte(2), b'0' | b'1')
        {
            return self.scan_prefixed_number(2, 2, Radix::Binary);
        }
        let start = self.pos.cursor;
        while self.current_byte().is_ascii_digit() || self.current_byte() == b'_' {
            self.pos.cursor += 1;
        }
        if is_ident_char(self.current_byte()) && self.current_byte() != b'.' {
            while is_ident_char(self.current_byte()) {
                self.pos.cursor += 1;
            }
            let text = &self.source[start..self.pos.cursor];
            return Err(self.error_at(start, format!("Invalid number literal: {text}")));
        }
        Ok(TokenKind::Number(NumberLiteral {
            text: self.source[start..self.pos.cursor].to_string(),
            radix: Radix::Decimal,
        }))
    }

    fn scan_prefixed_number(
        &mut self,
        prefix_len: usize,
        base: u32,
        radix: Radix,
    ) -> Result<TokenKind, TokenizeError> {
        let start = self.pos.cursor;
        self.pos.cursor += prefix_len;
        let digits_start = self.pos.cursor;
        while (self.current_byte() as char).is_digit(base) || self.current_byte() == b'_' {
            self.pos.cursor += 1;
        }
        let has_digits = self.source[digits_start..self.pos.cursor]
            .bytes()
            .any(|b| b != b'_');
        if !has_digits || (is_ident_char(self.current_byte()) && self.current_byte() != b'.') {
            while is_ident_char(self.current_byte()) {
                self.pos.cursor += 1;
            }
            let text = &self.source[start..self.pos.cursor];
            return Err(self.error_at(start, format!("Invalid number literal: {text}")));
        }
        Ok(TokenKind::Number(NumberLiteral {
            text: self.source[start..self.pos.cursor].to_string(),
            radix,
        }))
    }

    fn scan_string(&mut self) -> Result<TokenKind, TokenizeError> {
        let start = self.pos.cursor;
        let bytes = self.scan_quoted(b'"')?;
        Ok(TokenKind::String(StringLiteral {
            raw: self.source[start..self.pos.cursor].to_string(),
            bytes,
        }))
    }

    /// `'A'` is a character literal; longer single-quoted text is a string.
    fn scan_quote(&mut self) -> Result<TokenKind, TokenizeError> {
        let start = self.pos.cursor;
        let bytes = self.scan_quoted(b'\'')?;
        let raw = self.source[start..self.pos.cursor].to_string();
        if bytes.len() == 1 {
            return Ok(TokenKind::Number(NumberLiteral {
                text: raw,
                radix: Radix::Char,
            }));
        }
        Ok(TokenKind::String(StringLiteral { raw, bytes }))
    }

    fn scan_quoted(&mut self, quote: u8) -> Result<Vec<u8>, TokenizeError> {
        let start = self.pos.cursor;
        self.pos.cursor += 1;
        let mut out = Vec::new();
        loop {
            let c = self.current_byte();
            if self.at_end() || c == b'\n' {
                return Err(self.error_at(start, "Unterminated string".to_string()));
            }
            if c == quote {
                self.pos.cursor += 1;
                return Ok(out);
            }
            if c == b'\\' {
                self.pos.cursor += 1;
                let esc = self.current_byte();
                let value = match esc {
                    b'n' => b'\n',
                    b'r' => b'\r',
                    b't' => b'\t',
                    b'0' => b'\0',
                    b'x' => {
                        let hi = self.peek_byte(1);
                        let lo = self.peek_byte(2);
                        if !hi.is_ascii_hexdigit() || !lo.is_ascii_hexdigit() {
                            return Err(
                                self.error_at(start, "Bad hex escape in string".to_string())
                            );
                        }
                        self.pos.cursor += 2;
                        (hex_digit(hi) << 4) | hex_digit(lo)
                    }
                    0 => return Err(self.error_at(start, "Unterminated string".to_string())),
                    other => other,
                };
                out.push(value);
                self.pos.cursor += 1;
                continue;
            }
            out.push(c);
            self.pos.cursor += 1;
        }
    }

    fn scan_punct(&mut self) -> Result<TokenKind, TokenizeError> {
        let start = self.pos.cursor;
        let c = self.current_byte();
        let next = self.peek_byte(1);
        let (kind, len) = match c {
            b',' => (TokenKind::Comma, 1),
            b'#' => (TokenKind::Hash, 1),
            b'(' => (TokenKind::OpenParen, 1),
            b')' => (TokenKind::CloseParen, 1),
            b'[' => (TokenKind::OpenBracket, 1),
            b']' => (TokenKind::CloseBracket, 1),
            b'{' => (TokenKind::OpenBrace, 1),
            b'}' => (TokenKind::CloseBrace, 1),
            b'+' => (TokenKind::Operator(OperatorKind::Plus), 1),
            b'-' if self.pos.operand_ended => (TokenKind::Operator(OperatorKind::Minus), 1),
            b'-' => (TokenKind::Operator(OperatorKind::Negate), 1),
            b'*' => (TokenKind::Operator(OperatorKind::Multiply), 1),
            b'/' => (TokenKind::Operator(OperatorKind::Divide), 1),
            b'%' => (TokenKind::Operator(OperatorKind::Mod), 1),
            b'~' => (TokenKind::Operator(OperatorKind::BitNot), 1),
            b'^' => (TokenKind::Operator(OperatorKind::BitXor), 1),
            b'<' if next == b'<' => (TokenKind::Operator(OperatorKind::Shl), 2),
            b'<' if next == b'=' => (TokenKind::Operator(OperatorKind::Le), 2),
            b'<' if next == b'>' => (TokenKind::Operator(OperatorKind::Ne), 2),
            b'<' => (TokenKind::Operator(OperatorKind::Lt), 1),
            b'>' if next == b'>' => (TokenKind::Operator(OperatorKind::Shr), 2),
            b'>' if next == b'=' => (TokenKind::Operator(OperatorKind::Ge), 2),
            b'>' => (TokenKind::Operator(OperatorKind::Gt), 1),
            b'=' if next == b'=' => (TokenKind::Operator(OperatorKind::Eq), 2),
            b'=' => (TokenKind::Operator(OperatorKind::Assign), 1),
            b'!' if next == b'=' => (TokenKind::Operator(OperatorKind::Ne), 2),
            b'!' => (TokenKind::Operator(OperatorKind::LogicNot), 1),
            b'&' if next == b'&' => (TokenKind::Operator(OperatorKind::LogicAnd), 2),
            b'&' => (TokenKind::Operator(OperatorKind::BitAnd), 1),
            b'|' if next == b'|' => (TokenKind::Operator(OperatorKind::LogicOr), 2),
            b'|' => (TokenKind::Operator(OperatorKind::BitOr), 1),
            _ => {
                let ch = self.source[start..].chars().next().unwrap_or('?');
                self.pos.cursor += ch.len_utf8().max(1);
                return Err(self.error_at(start, format!("Invalid character '{ch}'")));
            }
        };
        self.pos.cursor += len;
        Ok(kind)
    }

    /// `%` starts a binary literal when no operand precedes it, or when it
    /// directly follows the statement's mnemonic (`LDA %1010`).
    fn binary_literal_allowed(&self) -> bool {
        matches!(self.peek_byte(1), b'0' | b'1')
            && (!self.pos.operand_ended || self.pos.after_mnemonic)
    }

    fn at_end(&self) -> bool {
        self.pos.cursor >= self.source.len()
    }

    fn current_byte(&self) -> u8 {
        self.source
            .as_bytes()
            .get(self.pos.cursor)
            .copied()
            .unwrap_or(0)
    }

    fn peek_byte(&self, offset: usize) -> u8 {
        self.source
            .as_bytes()
            .get(self.pos.cursor + offset)
            .copied()
            .unwrap_or(0)
    }
}

/// Find `marker` as a whole word, ignoring ASCII case.
fn find_marker(text: &str, marker: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let needle = marker.as_bytes();
    if needle.is_empty() || bytes.len() < needle.len() {
        return None;
    }
    (0..=bytes.len() - needle.len()).find(|&idx| {
        let before_ok = idx == 0 || !is_ident_char(bytes[idx - 1]);
        let after = bytes.get(idx + needle.len()).copied().unwrap_or(b' ');
        before_ok && !is_ident_char(after) && bytes[idx..idx + needle.len()].eq_ignore_ascii_case(needle)
    })
}

fn hex_digit(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Tokenizer::new(source)
            .tokenize_all()
            .expect("tokenize")
            .into_iter()
            .map(|tok| tok.kind)
            .collect()
    }

    fn number(text: &str, radix: Radix) -> TokenKind {
        TokenKind::Number(NumberLiteral {
            text: text.to_string(),
            radix,
        })
    }

    fn ident(name: &str) -> TokenKind {
        TokenKind::Identifier(name.to_string())
    }

    #[test]
    fn scans_numeric_literals_in_every_radix() {
        assert_eq!(
            kinds("10 $1F 0x2a %101 0b11 1_000"),
            vec![
                number("10", Radix::Decimal),
                number("$1F", Radix::Hex),
                number("0x2a", Radix::Hex),
                number("%101", Radix::Binary),
                number("0b11", Radix::Binary),
                number("1_000", Radix::Decimal),
            ]
        );
    }

    #[test]
    fn percent_after_operand_is_modulo() {
        assert_eq!(
            kinds("7%10"),
            vec![
                number("7", Radix::Decimal),
                TokenKind::Operator(OperatorKind::Mod),
                number("10", Radix::Decimal),
            ]
        );
        assert_eq!(
            kinds("lda %1010"),
            vec![ident("lda"), number("%1010", Radix::Binary)]
        );
        assert_eq!(
            kinds("start: lda %1010"),
            vec![
                TokenKind::Label("start".to_string()),
                ident("lda"),
                number("%1010", Radix::Binary),
            ]
        );
    }

    #[test]
    fn percent_after_an_operand_identifier_is_modulo() {
        assert_eq!(
            kinds(".db x %10"),
            vec![
                ident(".db"),
                ident("x"),
                TokenKind::Operator(OperatorKind::Mod),
                number("10", Radix::Decimal),
            ]
        );
    }

    #[test]
    fn minus_without_operand_is_negation() {
        assert_eq!(
            kinds("-1 - -2"),
            vec![
                TokenKind::Operator(OperatorKind::Negate),
                number("1", Radix::Decimal),
                TokenKind::Operator(OperatorKind::Minus),
                TokenKind::Operator(OperatorKind::Negate),
                number("2", Radix::Decimal),
            ]
        );
    }

    #[test]
    fn star_in_operand_position_counts_as_operand() {
        assert_eq!(
            kinds("* - 2"),
            vec![
                TokenKind::Operator(OperatorKind::Multiply),
                TokenKind::Operator(OperatorKind::Minus),
                number("2", Radix::Decimal),
            ]
        );
    }

    #[test]
    fn distinguishes_labels_and_local_label_forms() {
        assert_eq!(
            kinds("main: :loop : bne :- bcc :++ beq :+3"),
            vec![
                TokenKind::Label("main".to_string()),
                TokenKind::LocalLabel("loop".to_string()),
                TokenKind::AnonLabelDef,
                ident("bne"),
                TokenKind::AnonLabelRef(-1),
                ident("bcc"),
                TokenKind::AnonLabelRef(2),
                ident("beq"),
                TokenKind::AnonLabelRef(3),
            ]
        );
    }

    #[test]
    fn keeps_qualifiers_and_hints_inside_identifiers() {
        assert_eq!(
            kinds("lda.w io::port .db"),
            vec![ident("lda.w"), ident("io::port"), ident(".db")]
        );
    }

    #[test]
    fn local_label_char_is_configurable() {
        let tokens: Vec<TokenKind> = Tokenizer::new("@loop @- x:")
            .with_local_label_char('@')
            .tokenize_all()
            .expect("tokenize")
            .into_iter()
            .map(|tok| tok.kind)
            .collect();
        assert_eq!(
            tokens,
            vec![
                TokenKind::LocalLabel("loop".to_string()),
                TokenKind::AnonLabelRef(-1),
                TokenKind::Label("x".to_string()),
            ]
        );
    }

    #[test]
    fn skips_all_comment_styles_and_tracks_lines() {
        let tokens = Tokenizer::new("a ; one\nb // two\n/* three\n */ c")
            .tokenize_all()
            .expect("tokenize");
        let lines: Vec<u32> = tokens.iter().map(|tok| tok.span.line).collect();
        assert_eq!(lines, vec![1, 2, 4]);
        assert_eq!(tokens[2].span.col_start, 5);
    }

    #[test]
    fn decodes_string_escapes_and_char_literals() {
        let tokens = Tokenizer::new(r#""a\n\x41" 'Z' 'ab'"#)
            .tokenize_all()
            .expect("tokenize");
        match &tokens[0].kind {
            TokenKind::String(lit) => assert_eq!(lit.bytes, vec![b'a', b'\n', b'A']),
            other => panic!("expected string, got {other:?}"),
        }
        assert_eq!(tokens[1].kind, number("'Z'", Radix::Char));
        assert!(matches!(tokens[2].kind, TokenKind::String(_)));
    }

    #[test]
    fn reports_lexical_errors_with_position() {
        let err = Tokenizer::new("lda \"open").tokenize_all().unwrap_err();
        assert_eq!(err.message, "Unterminated string");
        assert_eq!(err.span.col_start, 5);

        let err = Tokenizer::new("  `").tokenize_all().unwrap_err();
        assert_eq!(err.message, "Invalid character '`'");

        let err = Tokenizer::new("$xyz").tokenize_all().unwrap_err();
        assert!(err.message.starts_with("Invalid number literal"));
    }

    #[test]
    fn raw_blocks_stop_at_marker_or_line_end() {
        let mut tok = Tokenizer::new(".hex 0A 0B ; bytes\n.define\n{\"a\": 1}\n.end\nnext");
        tok.next_token().expect("directive");
        let line = tok.read_raw_until(RawEnd::EndOfLine).expect("raw line");
        assert_eq!(line.kind, TokenKind::RawText("0A 0B".to_string()));
        tok.next_token().expect("define");
        let block = tok.read_raw_until(RawEnd::Marker(".END")).expect("raw block");
        assert_eq!(block.kind, TokenKind::RawText("{\"a\": 1}".to_string()));
        let next = tok.next_token().expect("next");
        assert_eq!(next.kind, ident("next"));
        assert_eq!(next.span.line, 5);
    }

    #[test]
    fn rewind_replays_tokens() {
        let mut tok = Tokenizer::new("a b c");
        tok.next_token().expect("a");
        tok.next_token().expect("b");
        tok.next_token().expect("c");
        tok.rewind(2).expect("rewind");
        assert_eq!(tok.next_token().expect("b again").kind, ident("b"));
        assert!(tok.rewind(40).is_err());
    }

    proptest! {
        #[test]
        fn tokenizer_never_panics_on_ascii(source in "[ -~\n]{0,64}") {
            let _ = Tokenizer::new(source).tokenize_all();
        }
    }
}
