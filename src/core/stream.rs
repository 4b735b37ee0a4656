// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Stack of token frames feeding the assembler.
//!
//! Source files are lexed lazily: a frame pulls tokens from its own
//! [`Tokenizer`] as they are needed, so raw text reads and local-label
//! character changes apply to the text that follows them. Macro bodies and
//! loop bodies are pushed as shared token frames. When a frame runs out,
//! [`StreamManager::next`] pops it and hands back its [`FrameEnd`] so the
//! driver can continue a loop, close a macro scope or resume an include.

use std::collections::HashMap;
use std::rc::Rc;

use crate::core::text_utils::{normalize_name, strip_comment};
use crate::core::tokenizer::{
    LexPosition, RawEnd, Span, Token, TokenKind, TokenizeError, Tokenizer,
    DEFAULT_LOCAL_LABEL_CHAR,
};

/// Maximum number of frames on the stack.
pub const MAX_FRAME_DEPTH: usize = 64;

/// Marker that closes raw blocks and `.END`-terminated bodies.
pub const END_MARKER: &str = ".END";

pub type FrameId = u64;

/// Continuation value returned when a frame is popped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameEnd {
    pub id: FrameId,
    pub cache_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Token(Token),
    FrameEnded(FrameEnd),
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorKind {
    Lexical,
    Syntax,
    Depth,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamError {
    pub kind: StreamErrorKind,
    pub message: String,
    pub span: Option<Span>,
}

impl StreamError {
    fn syntax(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            kind: StreamErrorKind::Syntax,
            message: message.into(),
            span,
        }
    }
}

impl From<TokenizeError> for StreamError {
    fn from(err: TokenizeError) -> Self {
        Self {
            kind: StreamErrorKind::Lexical,
            message: err.message,
            span: Some(err.span),
        }
    }
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StreamError {}

/// Resumable position inside the top frame.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamPosition {
    name: Rc<str>,
    index: usize,
    lex: Option<LexPosition>,
}

enum FrameSource {
    Lexed {
        tokenizer: Tokenizer,
        tokens: Vec<Token>,
        /// Tokenizer position before each entry of `tokens`.
        positions: Vec<LexPosition>,
        finished: bool,
    },
    Shared(Rc<[Token]>),
}

struct StreamFrame {
    id: FrameId,
    name: Rc<str>,
    source: FrameSource,
    cursor: usize,
    args: Option<HashMap<String, Rc<[Token]>>>,
    cache_key: Option<String>,
}

impl StreamFrame {
    /// Make sure `tokens[idx]` exists if the source has that many tokens.
    fn fill(&mut self, idx: usize) -> Result<(), StreamError> {
        if let FrameSource::Lexed {
            tokenizer,
            tokens,
            positions,
            finished,
        } = &mut self.source
        {
            while tokens.len() <= idx && !*finished {
                let before = tokenizer.position();
                let token = match tokenizer.next_token() {
                    Ok(token) => token,
                    Err(err) => {
                        tokenizer.seek(before);
                        return Err(err.into());
                    }
                };
                if token.is_end() {
                    *finished = true;
                } else {
                    positions.push(before);
                    tokens.push(token);
                }
            }
        }
        Ok(())
    }

    fn get(&mut self, idx: usize) -> Result<Option<&Token>, StreamError> {
        self.fill(idx)?;
        Ok(match &self.source {
            FrameSource::Lexed { tokens, .. } => tokens.get(idx),
            FrameSource::Shared(tokens) => tokens.get(idx),
        })
    }

    fn is_lexed(&self) -> bool {
        matches!(self.source, FrameSource::Lexed { .. })
    }

    /// Drop tokens lexed beyond the cursor and move the tokenizer back.
    fn discard_lookahead(&mut self) {
        let cursor = self.cursor;
        if let FrameSource::Lexed {
            tokenizer,
            tokens,
            positions,
            finished,
        } = &mut self.source
        {
            let extra = tokens.len().saturating_sub(cursor);
            if extra == 0 && !*finished {
                return;
            }
            let produced = extra + usize::from(*finished);
            if tokenizer.rewind(produced).is_err() {
                if let Some(pos) = positions.get(cursor).copied() {
                    tokenizer.seek(pos);
                }
            }
            tokens.truncate(cursor);
            positions.truncate(cursor);
            *finished = false;
        }
    }

    fn read_raw(&mut self, end: RawEnd<'_>) -> Result<Token, StreamError> {
        self.discard_lookahead();
        let cursor = self.cursor;
        match &mut self.source {
            FrameSource::Lexed {
                tokenizer,
                tokens,
                positions,
                ..
            } => {
                let before = tokenizer.position();
                let token = tokenizer.read_raw_until(end)?;
                positions.push(before);
                tokens.push(token.clone());
                self.cursor = cursor + 1;
                Ok(token)
            }
            FrameSource::Shared(_) => Err(StreamError::syntax(
                "Raw text is only available in source files",
                None,
            )),
        }
    }

    /// True when only whitespace or a comment is left on the current line.
    fn rest_of_line_blank(&mut self) -> bool {
        self.discard_lookahead();
        match &self.source {
            FrameSource::Lexed { tokenizer, .. } => {
                let source = tokenizer.source();
                let rest = &source[tokenizer.position().offset().min(source.len())..];
                let line = &rest[..rest.find('\n').unwrap_or(rest.len())];
                let code = strip_comment(line).trim();
                code.is_empty() || code.starts_with("//")
            }
            FrameSource::Shared(_) => false,
        }
    }

    fn position(&mut self) -> StreamPosition {
        self.discard_lookahead();
        let lex = match &self.source {
            FrameSource::Lexed { tokenizer, .. } => Some(tokenizer.position()),
            FrameSource::Shared(_) => None,
        };
        StreamPosition {
            name: self.name.clone(),
            index: self.cursor,
            lex,
        }
    }
}

pub struct StreamManager {
    frames: Vec<StreamFrame>,
    cache: HashMap<String, Rc<[Token]>>,
    next_id: FrameId,
    local_label_char: char,
}

impl StreamManager {
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            cache: HashMap::new(),
            next_id: 1,
            local_label_char: DEFAULT_LOCAL_LABEL_CHAR,
        }
    }

    pub fn with_local_label_char(mut self, ch: char) -> Self {
        self.local_label_char = ch;
        self
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn top_id(&self) -> Option<FrameId> {
        self.frames.last().map(|frame| frame.id)
    }

    /// Display name of the innermost frame.
    pub fn current_name(&self) -> Option<&str> {
        self.frames.last().map(|frame| frame.name.as_ref())
    }

    pub fn top_is_source(&self) -> bool {
        self.frames.last().is_some_and(StreamFrame::is_lexed)
    }

    fn allocate(&mut self) -> Result<FrameId, StreamError> {
        if self.frames.len() >= MAX_FRAME_DEPTH {
            return Err(StreamError {
                kind: StreamErrorKind::Depth,
                message: format!("Stream depth limit ({MAX_FRAME_DEPTH}) exceeded"),
                span: None,
            });
        }
        let id = self.next_id;
        self.next_id += 1;
        Ok(id)
    }

    fn inherited_name(&self) -> Rc<str> {
        self.frames
            .last()
            .map(|frame| frame.name.clone())
            .unwrap_or_else(|| Rc::from(""))
    }

    /// Push a source file frame that is lexed on demand.
    pub fn push_source(&mut self, name: &str, text: &str) -> Result<FrameId, StreamError> {
        let id = self.allocate()?;
        let tokenizer = Tokenizer::new(text).with_local_label_char(self.local_label_char);
        self.frames.push(StreamFrame {
            id,
            name: Rc::from(name),
            source: FrameSource::Lexed {
                tokenizer,
                tokens: Vec::new(),
                positions: Vec::new(),
                finished: false,
            },
            cursor: 0,
            args: None,
            cache_key: None,
        });
        Ok(id)
    }

    /// Push a token frame, optionally binding macro arguments.
    pub fn push_tokens(
        &mut self,
        tokens: Rc<[Token]>,
        args: Option<HashMap<String, Rc<[Token]>>>,
        cache_key: Option<String>,
    ) -> Result<FrameId, StreamError> {
        let id = self.allocate()?;
        let name = self.inherited_name();
        self.frames.push(StreamFrame {
            id,
            name,
            source: FrameSource::Shared(tokens),
            cursor: 0,
            args,
            cache_key,
        });
        Ok(id)
    }

    /// Memoize a token sequence for [`StreamManager::push_cached`].
    pub fn remember(&mut self, key: &str, tokens: Rc<[Token]>) {
        self.cache.insert(key.to_string(), tokens);
    }

    pub fn forget(&mut self, key: &str) {
        self.cache.remove(key);
    }

    /// Push the token sequence memoized under `key`.
    pub fn push_cached(
        &mut self,
        key: &str,
        args: Option<HashMap<String, Rc<[Token]>>>,
    ) -> Result<FrameId, StreamError> {
        let tokens = self
            .cache
            .get(key)
            .cloned()
            .ok_or_else(|| StreamError::syntax(format!("No cached block '{key}'"), None))?;
        self.push_tokens(tokens, args, Some(key.to_string()))
    }

    /// Pull the next token, popping exhausted frames.
    pub fn next(&mut self) -> Result<StreamEvent, StreamError> {
        let Some(frame) = self.frames.last_mut() else {
            return Ok(StreamEvent::Exhausted);
        };
        let cursor = frame.cursor;
        if let Some(token) = frame.get(cursor)?.cloned() {
            frame.cursor += 1;
            return Ok(StreamEvent::Token(token));
        }
        Ok(match self.pop() {
            Some(end) => StreamEvent::FrameEnded(end),
            None => StreamEvent::Exhausted,
        })
    }

    pub fn pop(&mut self) -> Option<FrameEnd> {
        self.frames.pop().map(|frame| FrameEnd {
            id: frame.id,
            cache_key: frame.cache_key,
        })
    }

    /// Token `n` positions ahead in the top frame.
    pub fn peek(&mut self, n: usize) -> Result<Option<Token>, StreamError> {
        let Some(frame) = self.frames.last_mut() else {
            return Ok(None);
        };
        let idx = frame.cursor + n;
        Ok(frame.get(idx)?.cloned())
    }

    pub fn advance(&mut self, n: usize) -> Result<(), StreamError> {
        if let Some(frame) = self.frames.last_mut() {
            for _ in 0..n {
                let cursor = frame.cursor;
                if frame.get(cursor)?.is_none() {
                    break;
                }
                frame.cursor += 1;
            }
        }
        Ok(())
    }

    /// Next token if it sits on `line`.
    pub fn take_if_on_line(&mut self, line: u32) -> Result<Option<Token>, StreamError> {
        match self.peek(0)? {
            Some(token) if token.span.line == line => {
                self.advance(1)?;
                Ok(Some(token))
            }
            _ => Ok(None),
        }
    }

    /// Remaining tokens on `line`, stopping before `{` or `}`.
    pub fn peek_line(&mut self, line: u32) -> Result<Vec<Token>, StreamError> {
        let mut out = Vec::new();
        while let Some(token) = self.peek(out.len())? {
            if token.span.line != line
                || matches!(token.kind, TokenKind::OpenBrace | TokenKind::CloseBrace)
            {
                break;
            }
            out.push(token);
        }
        Ok(out)
    }

    pub fn take_line(&mut self, line: u32) -> Result<Vec<Token>, StreamError> {
        let tokens = self.peek_line(line)?;
        self.advance(tokens.len())?;
        Ok(tokens)
    }

    /// One balanced expression on `line`, stopping at a top-level comma or
    /// brace. The comma is left in the stream.
    pub fn take_expression(&mut self, line: u32) -> Result<Vec<Token>, StreamError> {
        let mut out = Vec::new();
        let mut depth = 0usize;
        while let Some(token) = self.peek(0)? {
            if token.span.line != line {
                break;
            }
            match token.kind {
                TokenKind::Comma | TokenKind::OpenBrace | TokenKind::CloseBrace
                    if depth == 0 =>
                {
                    break
                }
                TokenKind::OpenParen | TokenKind::OpenBracket => depth += 1,
                TokenKind::CloseParen | TokenKind::CloseBracket => {
                    depth = depth.saturating_sub(1)
                }
                _ => {}
            }
            self.advance(1)?;
            out.push(token);
        }
        Ok(out)
    }

    /// Capture a body: `{ ... }` when the next token is a brace, otherwise
    /// everything up to the matching `.END`. Raw `.HEX` and `.DEFINE` bodies
    /// are captured as [`TokenKind::RawText`] so the body can be replayed
    /// from a token frame.
    pub fn take_block(&mut self, opener: Span) -> Result<Vec<Token>, StreamError> {
        let braced = matches!(
            self.peek(0)?.map(|t| t.kind),
            Some(TokenKind::OpenBrace)
        );
        if braced {
            self.advance(1)?;
        }
        let mut body = Vec::new();
        let mut depth = 1usize;
        loop {
            let Some(token) = self.peek(0)? else {
                let expected = if braced { "'}'" } else { "'.END'" };
                return Err(StreamError::syntax(
                    format!("Unterminated block: expected {expected}"),
                    Some(opener),
                ));
            };
            self.advance(1)?;
            if braced {
                match token.kind {
                    TokenKind::OpenBrace => depth += 1,
                    TokenKind::CloseBrace => {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(body);
                        }
                    }
                    _ => {}
                }
            } else {
                match token.directive_name().as_deref() {
                    Some("END") => {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(body);
                        }
                    }
                    Some("IF" | "MACRO" | "FOR" | "REPEAT") => {
                        if !self.line_has_open_brace(token.span.line)? {
                            depth += 1;
                        }
                    }
                    _ => {}
                }
            }
            let directive = token.directive_name();
            let line = token.span.line;
            body.push(token);
            match directive.as_deref() {
                Some("HEX") => body.push(self.read_raw_body()?),
                Some("DEFINE") => {
                    if let Some(name) = self.take_if_on_line(line)? {
                        body.push(name);
                        if !self.line_continues(line)? {
                            body.push(self.read_raw_body()?);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn line_has_open_brace(&mut self, line: u32) -> Result<bool, StreamError> {
        let mut n = 0;
        while let Some(token) = self.peek(n)? {
            if token.span.line != line {
                return Ok(false);
            }
            if token.kind == TokenKind::OpenBrace {
                return Ok(true);
            }
            n += 1;
        }
        Ok(false)
    }

    /// Raw text from the top frame. A token frame must already hold a
    /// [`TokenKind::RawText`] token at the cursor.
    pub fn read_raw(&mut self, end: RawEnd<'_>) -> Result<Token, StreamError> {
        let Some(frame) = self.frames.last_mut() else {
            return Err(StreamError::syntax("No input to read raw text from", None));
        };
        if frame.is_lexed() {
            return frame.read_raw(end);
        }
        match self.peek(0)? {
            Some(token) if matches!(token.kind, TokenKind::RawText(_)) => {
                self.advance(1)?;
                Ok(token)
            }
            other => Err(StreamError::syntax(
                "Expected raw text",
                other.map(|token| token.span),
            )),
        }
    }

    /// Rest of the line as raw text, or a block up to `.END` when the line
    /// is empty.
    pub fn read_raw_body(&mut self) -> Result<Token, StreamError> {
        if !self.top_is_source() {
            return self.read_raw(RawEnd::EndOfLine);
        }
        let line = self.read_raw(RawEnd::EndOfLine)?;
        match &line.kind {
            TokenKind::RawText(text) if text.is_empty() => {
                let mut block = self.read_raw(RawEnd::Marker(END_MARKER))?;
                block.span = line.span;
                Ok(block)
            }
            _ => Ok(line),
        }
    }

    /// True when more tokens follow on `line`. Source frames answer from the
    /// raw text so nothing is lexed past the line.
    pub fn line_continues(&mut self, line: u32) -> Result<bool, StreamError> {
        match self.frames.last_mut() {
            Some(frame) if frame.is_lexed() => Ok(!frame.rest_of_line_blank()),
            Some(_) => Ok(self.peek(0)?.is_some_and(|t| t.span.line == line)),
            None => Ok(false),
        }
    }

    /// Change the local-label character for all source frames and for
    /// frames pushed later.
    pub fn set_local_label_char(&mut self, ch: char) {
        self.local_label_char = ch;
        for frame in &mut self.frames {
            frame.discard_lookahead();
            if let FrameSource::Lexed { tokenizer, .. } = &mut frame.source {
                tokenizer.set_local_label_char(ch);
            }
        }
    }

    pub fn local_label_char(&self) -> char {
        self.local_label_char
    }

    pub fn position(&mut self) -> Option<StreamPosition> {
        self.frames.last_mut().map(StreamFrame::position)
    }

    /// Resume the top frame at `pos`. Fails when `pos` was taken in a
    /// different kind of frame or file.
    pub fn seek(&mut self, pos: &StreamPosition) -> Result<(), StreamError> {
        let Some(frame) = self.frames.last_mut() else {
            return Err(StreamError::syntax("No input to seek in", None));
        };
        if frame.name != pos.name {
            return Err(StreamError::syntax(
                format!("Cannot resume '{}' inside '{}'", pos.name, frame.name),
                None,
            ));
        }
        let cursor = frame.cursor;
        match (&mut frame.source, pos.lex) {
            (
                FrameSource::Lexed {
                    tokenizer,
                    tokens,
                    positions,
                    finished,
                },
                Some(lex),
            ) => {
                tokens.truncate(cursor);
                positions.truncate(cursor);
                *finished = false;
                tokenizer.seek(lex);
                Ok(())
            }
            (FrameSource::Shared(tokens), None) if pos.index <= tokens.len() => {
                frame.cursor = pos.index;
                Ok(())
            }
            _ => Err(StreamError::syntax("Cannot resume at a stale position", None)),
        }
    }

    /// Tokens bound to a macro parameter, searched from the innermost frame.
    pub fn macro_argument(&self, name: &str) -> Option<Rc<[Token]>> {
        let key = normalize_name(name);
        self.frames
            .iter()
            .rev()
            .filter_map(|frame| frame.args.as_ref())
            .find_map(|args| args.get(&key).cloned())
    }
}

impl Default for StreamManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn next_token(stream: &mut StreamManager) -> Token {
        match stream.next().expect("stream") {
            StreamEvent::Token(token) => token,
            other => panic!("expected token, got {other:?}"),
        }
    }

    fn texts(tokens: &[Token]) -> Vec<String> {
        tokens.iter().map(Token::text).collect()
    }

    #[test]
    fn frames_end_with_continuation_values() {
        let mut stream = StreamManager::new();
        stream.push_source("main.asm", "nop").unwrap();
        let body: Rc<[Token]> = Tokenizer::new("inx").tokenize_all().unwrap().into();
        stream.remember("loop#1", body);
        let id = stream.push_cached("loop#1", None).unwrap();

        assert_eq!(next_token(&mut stream).text(), "inx");
        assert_eq!(
            stream.next().unwrap(),
            StreamEvent::FrameEnded(FrameEnd {
                id,
                cache_key: Some("loop#1".to_string())
            })
        );
        assert_eq!(next_token(&mut stream).text(), "nop");
        assert!(matches!(stream.next().unwrap(), StreamEvent::FrameEnded(_)));
        assert_eq!(stream.next().unwrap(), StreamEvent::Exhausted);
    }

    #[test]
    fn take_line_stops_at_line_change_and_braces() {
        let mut stream = StreamManager::new();
        stream
            .push_source("t", "lda #1, x { inx }\nrts")
            .unwrap();
        let first = next_token(&mut stream);
        assert_eq!(
            texts(&stream.take_line(first.span.line).unwrap()),
            vec!["#", "1", ",", "x"]
        );
        assert_eq!(next_token(&mut stream).text(), "{");
    }

    #[test]
    fn take_expression_respects_nesting() {
        let mut stream = StreamManager::new();
        stream.push_source("t", ".db f(1, 2), [3, 4], 5").unwrap();
        let directive = next_token(&mut stream);
        let line = directive.span.line;
        assert_eq!(
            texts(&stream.take_expression(line).unwrap()),
            vec!["f", "(", "1", ",", "2", ")"]
        );
        stream.advance(1).unwrap();
        assert_eq!(
            texts(&stream.take_expression(line).unwrap()),
            vec!["[", "3", ",", "4", "]"]
        );
    }

    #[test]
    fn take_block_counts_nested_end_bodies() {
        let source = ".macro m\n.if 1\nnop\n.end\n.for x of [1] { inx }\n.end\nrts";
        let mut stream = StreamManager::new();
        stream.push_source("t", source).unwrap();
        let opener = next_token(&mut stream);
        next_token(&mut stream);
        let body = stream.take_block(opener.span).unwrap();
        assert_eq!(body.first().map(Token::text).as_deref(), Some(".if"));
        assert_eq!(body.last().map(Token::text).as_deref(), Some("}"));
        assert_eq!(next_token(&mut stream).text(), "rts");
    }

    #[test]
    fn take_block_captures_raw_bodies() {
        let source = "{\n.hex\n0A 0B\nFF\n.end\n.hex 0C\n.define text\n{not tokens}\n.end\n}\nrts";
        let mut stream = StreamManager::new();
        stream.push_source("t", source).unwrap();
        let body = stream.take_block(Span::default()).unwrap();
        let raws: Vec<String> = body
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::RawText(text) => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            raws,
            vec![
                "0A 0B\nFF".to_string(),
                "0C".to_string(),
                "{not tokens}".to_string()
            ]
        );
        assert_eq!(next_token(&mut stream).text(), "rts");
    }

    #[test]
    fn unterminated_block_names_the_opener() {
        let mut stream = StreamManager::new();
        stream.push_source("t", "{ nop").unwrap();
        let err = stream.take_block(Span::new(3, 1, 2)).unwrap_err();
        assert_eq!(err.message, "Unterminated block: expected '}'");
        assert_eq!(err.span, Some(Span::new(3, 1, 2)));
    }

    #[test]
    fn raw_read_discards_lookahead() {
        let mut stream = StreamManager::new();
        stream.push_source("t", ".hex 01 02 03\nnop").unwrap();
        next_token(&mut stream);
        stream.peek(2).unwrap();
        let raw = stream.read_raw_body().unwrap();
        assert_eq!(raw.kind, TokenKind::RawText("01 02 03".to_string()));
        assert_eq!(next_token(&mut stream).text(), "nop");
    }

    #[test]
    fn local_label_char_change_applies_to_following_text() {
        let mut stream = StreamManager::new();
        stream.push_source("t", "a b\n@loop").unwrap();
        next_token(&mut stream);
        stream.peek(0).unwrap();
        stream.set_local_label_char('@');
        assert_eq!(next_token(&mut stream).text(), "b");
        assert_eq!(
            next_token(&mut stream).kind,
            TokenKind::LocalLabel("loop".to_string())
        );
    }

    #[test]
    fn seek_skips_to_a_recorded_position() {
        let mut first = StreamManager::new();
        first.push_source("t", "a { b c }\nd").unwrap();
        let opener = next_token(&mut first);
        first.take_block(opener.span).unwrap();
        let pos = first.position().unwrap();

        let mut second = StreamManager::new();
        second.push_source("t", "a { b c }\nd").unwrap();
        next_token(&mut second);
        second.seek(&pos).unwrap();
        assert_eq!(next_token(&mut second).text(), "d");
    }

    #[test]
    fn macro_arguments_resolve_from_innermost_frame() {
        let mut stream = StreamManager::new();
        let value: Rc<[Token]> = Tokenizer::new("5").tokenize_all().unwrap().into();
        let mut args = HashMap::new();
        args.insert("COUNT".to_string(), value);
        stream.push_tokens(Rc::from(Vec::new()), Some(args), None).unwrap();
        assert!(stream.macro_argument("count").is_some());
        assert!(stream.macro_argument("other").is_none());
    }

    #[test]
    fn depth_limit_is_enforced() {
        let mut stream = StreamManager::new();
        let empty: Rc<[Token]> = Rc::from(Vec::new());
        for _ in 0..MAX_FRAME_DEPTH {
            stream.push_tokens(empty.clone(), None, None).unwrap();
        }
        let err = stream.push_tokens(empty, None, None).unwrap_err();
        assert_eq!(err.kind, StreamErrorKind::Depth);
    }
}
