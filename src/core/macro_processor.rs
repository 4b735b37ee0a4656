// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Token-level macro definitions, argument binding and body substitution.

use std::collections::HashMap;
use std::rc::Rc;

use crate::core::stream::StreamPosition;
use crate::core::text_utils::normalize_name;
use crate::core::tokenizer::{Span, Token, TokenKind};

/// Maximum nesting of macro expansions.
pub const MAX_MACRO_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroError {
    message: String,
    span: Option<Span>,
}

impl MacroError {
    pub fn new(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn span(&self) -> Option<Span> {
        self.span
    }
}

impl std::fmt::Display for MacroError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for MacroError {}

#[derive(Debug, Clone)]
pub struct MacroDefinition {
    pub name: String,
    pub params: Vec<String>,
    /// Trailing `...name` parameter collecting the remaining arguments.
    pub rest: Option<String>,
    pub body: Rc<[Token]>,
    /// Stream position right after the definition, used to skip the body
    /// when the definition is met again in the second pass.
    pub end_position: Option<StreamPosition>,
    pub file: String,
    pub span: Span,
    pub pass: u8,
}

/// Parsed `.MACRO` header: name and parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroHeader {
    pub name: String,
    pub params: Vec<String>,
    pub rest: Option<String>,
}

/// Parse the tokens following `.MACRO` on its line.
///
/// Accepts `name(a, b, ...rest)` and `name a, b`.
pub fn parse_macro_header(tokens: &[Token], directive: Span) -> Result<MacroHeader, MacroError> {
    let Some((first, rest)) = tokens.split_first() else {
        return Err(MacroError::new("Expected macro name", Some(directive)));
    };
    let name = match &first.kind {
        TokenKind::Identifier(name) if !name.starts_with('.') => normalize_name(name),
        _ => {
            return Err(MacroError::new(
                format!("Invalid macro name '{}'", first.text()),
                Some(first.span),
            ))
        }
    };

    let param_tokens = match rest {
        [] => rest,
        [open, inner @ .., close]
            if open.kind == TokenKind::OpenParen && close.kind == TokenKind::CloseParen =>
        {
            inner
        }
        [open, ..] if open.kind == TokenKind::OpenParen => {
            return Err(MacroError::new(
                "Unterminated parameter list",
                Some(open.span),
            ))
        }
        _ => rest,
    };

    let mut params = Vec::new();
    let mut rest_param = None;
    for group in split_arguments(param_tokens)? {
        if rest_param.is_some() {
            return Err(MacroError::new(
                "Rest parameter must be the last parameter",
                group.first().map(|t| t.span),
            ));
        }
        let (is_rest, ident) = match group.as_slice() {
            [ident] => (false, ident),
            [dots, ident] if dots.kind == TokenKind::Ellipsis => (true, ident),
            _ => {
                return Err(MacroError::new(
                    "Invalid macro parameter",
                    group.first().map(|t| t.span).or(Some(first.span)),
                ))
            }
        };
        let param = match &ident.kind {
            TokenKind::Identifier(param) if !param.starts_with('.') => normalize_name(param),
            _ => {
                return Err(MacroError::new(
                    format!("Invalid macro parameter '{}'", ident.text()),
                    Some(ident.span),
                ))
            }
        };
        if params.contains(&param) {
            return Err(MacroError::new(
                format!("Duplicate macro parameter '{param}'"),
                Some(ident.span),
            ));
        }
        if is_rest {
            rest_param = Some(param);
        } else {
            params.push(param);
        }
    }

    Ok(MacroHeader {
        name,
        params,
        rest: rest_param,
    })
}

/// Split a token list on top-level commas, respecting `()`, `[]` and `{}`.
///
/// An empty list yields no groups; an empty group is an error.
pub fn split_arguments(tokens: &[Token]) -> Result<Vec<Vec<Token>>, MacroError> {
    if tokens.is_empty() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    let mut depth = 0usize;
    for token in tokens {
        match token.kind {
            TokenKind::OpenParen | TokenKind::OpenBracket | TokenKind::OpenBrace => depth += 1,
            TokenKind::CloseParen | TokenKind::CloseBracket | TokenKind::CloseBrace => {
                depth = depth.saturating_sub(1)
            }
            TokenKind::Comma if depth == 0 => {
                if current.is_empty() {
                    return Err(MacroError::new("Empty argument", Some(token.span)));
                }
                out.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(token.clone());
    }
    match current.is_empty() {
        true => Err(MacroError::new(
            "Empty argument",
            tokens.last().map(|t| t.span),
        )),
        false => {
            out.push(current);
            Ok(out)
        }
    }
}

/// Argument groups of a macro call. `name(a, b)` drops the outer
/// parentheses when they enclose the whole argument list.
pub fn parse_call_arguments(tokens: &[Token]) -> Result<Vec<Vec<Token>>, MacroError> {
    if let Some(TokenKind::OpenParen) = tokens.first().map(|t| &t.kind) {
        if matching_close(tokens) == Some(tokens.len() - 1) {
            return split_arguments(&tokens[1..tokens.len() - 1]);
        }
    }
    split_arguments(tokens)
}

fn matching_close(tokens: &[Token]) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::OpenParen => depth += 1,
            TokenKind::CloseParen => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Bind call arguments to parameter names.
pub fn bind_arguments(
    def: &MacroDefinition,
    args: Vec<Vec<Token>>,
    call: Span,
) -> Result<HashMap<String, Rc<[Token]>>, MacroError> {
    let expected = def.params.len();
    let got = args.len();
    if got < expected || (got > expected && def.rest.is_none()) {
        let count = match def.rest {
            Some(_) => format!("at least {expected}"),
            None => expected.to_string(),
        };
        return Err(MacroError::new(
            format!("Macro '{}' expects {count} argument(s), got {got}", def.name),
            Some(call),
        ));
    }
    let mut bound = HashMap::new();
    let mut args = args.into_iter();
    for param in &def.params {
        if let Some(tokens) = args.next() {
            bound.insert(param.clone(), Rc::from(tokens));
        }
    }
    if let Some(rest) = &def.rest {
        let items: Vec<Vec<Token>> = args.collect();
        let span = items
            .first()
            .and_then(|item| item.first())
            .map_or(call, |t| t.span);
        let array = Token::new(TokenKind::ArrayLiteral(items), span);
        bound.insert(rest.clone(), Rc::from(vec![array]));
    }
    Ok(bound)
}

/// Replace parameter references in `body` with their bound tokens.
///
/// Substituted tokens take the span of the reference they replace.
/// `rest[<literal>]` on a rest parameter is replaced by that element.
pub fn substitute(body: &[Token], args: &HashMap<String, Rc<[Token]>>) -> Vec<Token> {
    let mut out = Vec::with_capacity(body.len());
    let mut idx = 0usize;
    while idx < body.len() {
        let token = &body[idx];
        let bound = token
            .identifier()
            .and_then(|name| args.get(&normalize_name(name)));
        let Some(bound) = bound else {
            out.push(token.clone());
            idx += 1;
            continue;
        };
        if let Some((element, consumed)) = literal_index(bound, &body[idx + 1..]) {
            out.extend(element.iter().map(|t| t.restamp(token.span)));
            idx += 1 + consumed;
            continue;
        }
        out.extend(bound.iter().map(|t| t.restamp(token.span)));
        idx += 1;
    }
    out
}

/// `[n]` after a rest parameter: the selected element and the number of
/// tokens the index took.
fn literal_index<'a>(bound: &'a [Token], after: &[Token]) -> Option<(&'a [Token], usize)> {
    let [Token {
        kind: TokenKind::ArrayLiteral(items),
        ..
    }] = bound
    else {
        return None;
    };
    match after {
        [open, number, close, ..]
            if open.kind == TokenKind::OpenBracket && close.kind == TokenKind::CloseBracket =>
        {
            let TokenKind::Number(lit) = &number.kind else {
                return None;
            };
            let index: usize = lit.text.replace('_', "").parse().ok()?;
            items.get(index).map(|item| (item.as_slice(), 3))
        }
        _ => None,
    }
}

/// Macros defined so far, keyed by uppercased name.
#[derive(Debug, Default)]
pub struct MacroTable {
    macros: HashMap<String, Rc<MacroDefinition>>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. Redefining a macro within one pass is an error.
    pub fn define(&mut self, def: MacroDefinition) -> Result<(), MacroError> {
        if let Some(existing) = self.macros.get(&def.name) {
            if existing.pass == def.pass {
                return Err(MacroError::new(
                    format!("Macro '{}' already defined", def.name),
                    Some(def.span),
                ));
            }
        }
        self.macros.insert(def.name.clone(), Rc::new(def));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Rc<MacroDefinition>> {
        self.macros.get(&normalize_name(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(&normalize_name(name))
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tokenizer::Tokenizer;

    fn tokens(source: &str) -> Vec<Token> {
        Tokenizer::new(source).tokenize_all().expect("tokenize")
    }

    fn texts(tokens: &[Token]) -> Vec<String> {
        tokens.iter().map(Token::text).collect()
    }

    fn definition(header: &str, body: &str) -> MacroDefinition {
        let header = parse_macro_header(&tokens(header), Span::default()).expect("header");
        MacroDefinition {
            name: header.name,
            params: header.params,
            rest: header.rest,
            body: tokens(body).into(),
            end_position: None,
            file: "test.asm".to_string(),
            span: Span::default(),
            pass: 1,
        }
    }

    #[test]
    fn parses_both_header_forms() {
        let header = parse_macro_header(&tokens("copy(src, dst, ...more)"), Span::default())
            .expect("paren form");
        assert_eq!(header.name, "COPY");
        assert_eq!(header.params, vec!["SRC".to_string(), "DST".to_string()]);
        assert_eq!(header.rest.as_deref(), Some("MORE"));

        let header = parse_macro_header(&tokens("add a, b"), Span::default()).expect("bare form");
        assert_eq!(header.params, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(header.rest, None);
    }

    #[test]
    fn rejects_bad_headers() {
        let err = parse_macro_header(&tokens("m(...r, a)"), Span::default()).unwrap_err();
        assert_eq!(err.message(), "Rest parameter must be the last parameter");
        let err = parse_macro_header(&tokens("m(a, a)"), Span::default()).unwrap_err();
        assert_eq!(err.message(), "Duplicate macro parameter 'A'");
        let err = parse_macro_header(&[], Span::default()).unwrap_err();
        assert_eq!(err.message(), "Expected macro name");
    }

    #[test]
    fn call_arguments_respect_nesting() {
        let args = parse_call_arguments(&tokens("f(1, 2), [3, 4], {a: 1}")).expect("args");
        assert_eq!(args.len(), 3);
        assert_eq!(texts(&args[1]), vec!["[", "3", ",", "4", "]"]);

        let args = parse_call_arguments(&tokens("(1, 2)")).expect("paren call");
        assert_eq!(args.len(), 2);

        let args = parse_call_arguments(&tokens("(1 + 2) * 3")).expect("leading paren");
        assert_eq!(args.len(), 1);

        assert!(parse_call_arguments(&tokens("1,,2")).is_err());
        assert!(parse_call_arguments(&[]).expect("empty").is_empty());
    }

    #[test]
    fn binds_rest_parameter_as_array_literal() {
        let def = definition("m(first, ...rest)", "nop");
        let bound = bind_arguments(
            &def,
            parse_call_arguments(&tokens("1, 2, 3")).expect("args"),
            Span::default(),
        )
        .expect("bind");
        assert_eq!(texts(&bound["FIRST"]), vec!["1"]);
        match &bound["REST"][0].kind {
            TokenKind::ArrayLiteral(items) => assert_eq!(items.len(), 2),
            other => panic!("expected array literal, got {other:?}"),
        }
    }

    #[test]
    fn argument_count_is_checked() {
        let def = definition("m(a, b)", "nop");
        let err = bind_arguments(&def, vec![tokens("1")], Span::default()).unwrap_err();
        assert_eq!(err.message(), "Macro 'M' expects 2 argument(s), got 1");
    }

    #[test]
    fn substitutes_parameters_and_literal_rest_indexes() {
        let def = definition("m(val, ...rest)", "lda #val\nsta rest[1]\n.db rest");
        let bound = bind_arguments(
            &def,
            vec![tokens("$10 + 1"), tokens("a"), tokens("b")],
            Span::default(),
        )
        .expect("bind");
        let out = substitute(&def.body, &bound);
        assert_eq!(
            texts(&out),
            vec!["lda", "#", "$10", "+", "1", "sta", "b", ".db", "[2 items]"]
        );
        let hash_span = out[1].span;
        assert_eq!(out[2].span, Span::new(1, 6, 9));
        assert_eq!(hash_span.line, 1);
    }

    #[test]
    fn redefinition_in_same_pass_is_rejected() {
        let mut table = MacroTable::new();
        table.define(definition("m", "nop")).expect("first");
        assert!(table.define(definition("M", "rts")).is_err());
        let mut again = definition("m", "rts");
        again.pass = 2;
        table.define(again).expect("next pass");
        assert!(table.contains("m"));
        assert_eq!(table.len(), 1);
    }
}
