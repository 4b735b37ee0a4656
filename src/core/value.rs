// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Dynamically typed values produced by expressions and stored in symbols.
//!
//! Strings are byte strings: every `char` of a [`Value::Str`] stands for one
//! output byte (code points above `0xFF` only arise from external text and are
//! emitted as UTF-8).

use std::fmt;
use std::rc::Rc;

use serde_json::Value as JsonValue;

use crate::core::tokenizer::Token;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(i64),
    Str(String),
    Array(Vec<Value>),
    /// Deferred expression evaluated each time it is referenced.
    Tokens(Rc<[Token]>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Tokens(_) => "tokens",
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Tokens(tokens) => !tokens.is_empty(),
        }
    }

    pub fn from_bool(flag: bool) -> Self {
        Value::Number(i64::from(flag))
    }

    /// Build a string value from raw bytes, one char per byte.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Value::Str(text_from_bytes(bytes))
    }

    /// Text used by `.LOG`, `.JOIN` and string concatenation.
    pub fn display_text(&self) -> String {
        match self {
            Value::Number(n) => n.to_string(),
            Value::Str(s) => s.clone(),
            Value::Array(items) => {
                let inner: Vec<String> = items.iter().map(Value::display_text).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Tokens(tokens) => {
                let inner: Vec<String> = tokens.iter().map(Token::text).collect();
                inner.join(" ")
            }
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Number(n) => JsonValue::from(*n),
            Value::Str(s) => JsonValue::String(s.clone()),
            Value::Array(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Tokens(_) => JsonValue::String(self.display_text()),
        }
    }

    /// Convert JSON into a value. Objects become arrays of `[key, value]`
    /// pairs, booleans become 0/1 and floats are truncated.
    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Number(0),
            JsonValue::Bool(flag) => Value::from_bool(*flag),
            JsonValue::Number(n) => Value::Number(
                n.as_i64()
                    .or_else(|| n.as_u64().map(|v| v as i64))
                    .or_else(|| n.as_f64().map(|v| v as i64))
                    .unwrap_or(0),
            ),
            JsonValue::String(s) => Value::from_bytes(s.as_bytes()),
            JsonValue::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            JsonValue::Object(map) => Value::Array(
                map.iter()
                    .map(|(key, value)| {
                        Value::Array(vec![Value::from_bytes(key.as_bytes()), Value::from_json(value)])
                    })
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "\"{s}\""),
            other => write!(f, "{}", other.display_text()),
        }
    }
}

pub fn text_from_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

pub fn text_to_bytes(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match u8::try_from(u32::from(ch)) {
            Ok(byte) => out.push(byte),
            Err(_) => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn byte_strings_round_trip_high_bytes() {
        let value = Value::from_bytes(&[0x41, 0xFF, 0x00]);
        match &value {
            Value::Str(text) => assert_eq!(text_to_bytes(text), vec![0x41, 0xFF, 0x00]),
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn json_conversion_maps_objects_to_pairs() {
        let value = Value::from_json(&json!({"a": [1, true, null]}));
        assert_eq!(
            value,
            Value::Array(vec![Value::Array(vec![
                Value::Str("a".to_string()),
                Value::Array(vec![Value::Number(1), Value::Number(1), Value::Number(0)]),
            ])])
        );
        assert_eq!(
            Value::Array(vec![Value::Number(2), Value::Str("x".to_string())]).to_json(),
            json!([2, "x"])
        );
    }

    #[test]
    fn truthiness_follows_type() {
        assert!(Value::Number(-1).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!Value::Array(Vec::new()).is_truthy());
    }
}
