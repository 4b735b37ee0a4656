// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Built-in expression functions (`.LEN`, `.HEX`, `.SPLIT`, ...).
//!
//! Functions are looked up case-insensitively with or without the leading
//! dot. Each entry declares its arity so argument-count errors are uniform.

use crate::core::expr::{EvalContext, EvalError};
use crate::core::tokenizer::Span;
use crate::core::value::Value;

type FunctionHandler = fn(&[Value], &dyn EvalContext) -> Result<Value, String>;

pub struct FunctionSpec {
    pub name: &'static str,
    pub min_args: usize,
    /// `None` for variadic functions.
    pub max_args: Option<usize>,
    handler: FunctionHandler,
}

static FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec { name: "LEN", min_args: 1, max_args: Some(1), handler: fn_len },
    FunctionSpec { name: "DEF", min_args: 1, max_args: Some(1), handler: fn_def },
    FunctionSpec { name: "UNDEF", min_args: 1, max_args: Some(1), handler: fn_undef },
    FunctionSpec { name: "HEX", min_args: 1, max_args: Some(2), handler: fn_hex },
    FunctionSpec { name: "SPLIT", min_args: 1, max_args: Some(2), handler: fn_split },
    FunctionSpec { name: "JOIN", min_args: 1, max_args: Some(2), handler: fn_join },
    FunctionSpec { name: "ARRAY", min_args: 0, max_args: None, handler: fn_array },
    FunctionSpec { name: "PUSH", min_args: 2, max_args: None, handler: fn_push },
    FunctionSpec { name: "POP", min_args: 1, max_args: Some(1), handler: fn_pop },
    FunctionSpec { name: "IIF", min_args: 3, max_args: Some(3), handler: fn_iif },
    FunctionSpec { name: "TYPE", min_args: 1, max_args: Some(1), handler: fn_type },
    FunctionSpec { name: "JSON", min_args: 1, max_args: Some(1), handler: fn_json },
    FunctionSpec { name: "STR", min_args: 1, max_args: Some(1), handler: fn_str },
    FunctionSpec { name: "MIN", min_args: 1, max_args: None, handler: fn_min },
    FunctionSpec { name: "MAX", min_args: 1, max_args: None, handler: fn_max },
];

pub fn lookup_function(name: &str) -> Option<&'static FunctionSpec> {
    let bare = name.strip_prefix('.').unwrap_or(name);
    FUNCTIONS
        .iter()
        .find(|spec| spec.name.eq_ignore_ascii_case(bare))
}

/// Functions whose single identifier argument is a symbol name, not a value.
pub fn takes_name_argument(name: &str) -> bool {
    lookup_function(name).is_some_and(|spec| matches!(spec.name, "DEF" | "UNDEF"))
}

pub fn call_function(
    name: &str,
    args: Vec<Value>,
    ctx: &dyn EvalContext,
    span: Span,
) -> Result<Value, EvalError> {
    let spec = lookup_function(name)
        .ok_or_else(|| EvalError::with_span(format!("Unknown function '{name}'"), span))?;
    let argc = args.len();
    let arity_ok = argc >= spec.min_args && spec.max_args.map_or(true, |max| argc <= max);
    if !arity_ok {
        let expected = match spec.max_args {
            Some(max) if max == spec.min_args => format!("{max}"),
            Some(max) => format!("{} to {max}", spec.min_args),
            None => format!("at least {}", spec.min_args),
        };
        return Err(EvalError::with_span(
            format!(
                ".{} expects {expected} argument(s), got {argc}",
                spec.name
            ),
            span,
        ));
    }
    (spec.handler)(&args, ctx)
        .map_err(|message| EvalError::with_span(format!(".{}: {message}", spec.name), span))
}

fn expect_number(value: &Value, what: &str) -> Result<i64, String> {
    value
        .as_number()
        .ok_or_else(|| format!("{what} must be a number, found {}", value.type_name()))
}

fn expect_str<'v>(value: &'v Value, what: &str) -> Result<&'v str, String> {
    match value {
        Value::Str(text) => Ok(text),
        other => Err(format!("{what} must be a string, found {}", other.type_name())),
    }
}

fn expect_array<'v>(value: &'v Value, what: &str) -> Result<&'v [Value], String> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(format!("{what} must be an array, found {}", other.type_name())),
    }
}

fn fn_len(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, String> {
    match &args[0] {
        Value::Str(text) => Ok(Value::Number(text.chars().count() as i64)),
        Value::Array(items) => Ok(Value::Number(items.len() as i64)),
        other => Err(format!("cannot take the length of a {}", other.type_name())),
    }
}

fn fn_def(args: &[Value], ctx: &dyn EvalContext) -> Result<Value, String> {
    let name = expect_str(&args[0], "symbol name")?;
    Ok(Value::from_bool(ctx.lookup_symbol(name).is_some()))
}

fn fn_undef(args: &[Value], ctx: &dyn EvalContext) -> Result<Value, String> {
    let name = expect_str(&args[0], "symbol name")?;
    Ok(Value::from_bool(ctx.lookup_symbol(name).is_none()))
}

/// `.HEX(value [, digits])`: uppercase hex text, zero-padded to `digits`.
fn fn_hex(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, String> {
    let value = expect_number(&args[0], "value")?;
    let digits = match args.get(1) {
        Some(width) => {
            let width = expect_number(width, "digit count")?;
            if !(1..=16).contains(&width) {
                return Err(format!("digit count {width} out of range 1..16"));
            }
            width as usize
        }
        None => 1,
    };
    Ok(Value::Str(format!("{value:0digits$X}")))
}

/// `.SPLIT(text [, separator])`: split on a separator, or on whitespace.
fn fn_split(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, String> {
    let text = expect_str(&args[0], "text")?;
    let parts: Vec<Value> = match args.get(1) {
        Some(sep) => {
            let sep = expect_str(sep, "separator")?;
            if sep.is_empty() {
                text.chars().map(|c| Value::Str(c.to_string())).collect()
            } else {
                text.split(sep).map(|s| Value::Str(s.to_string())).collect()
            }
        }
        None => text
            .split_whitespace()
            .map(|s| Value::Str(s.to_string()))
            .collect(),
    };
    Ok(Value::Array(parts))
}

fn fn_join(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, String> {
    let items = expect_array(&args[0], "first argument")?;
    let sep = match args.get(1) {
        Some(sep) => expect_str(sep, "separator")?,
        None => "",
    };
    let parts: Vec<String> = items.iter().map(Value::display_text).collect();
    Ok(Value::Str(parts.join(sep)))
}

fn fn_array(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, String> {
    Ok(Value::Array(args.to_vec()))
}

/// New array with the remaining arguments appended.
fn fn_push(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, String> {
    let mut items = expect_array(&args[0], "first argument")?.to_vec();
    items.extend_from_slice(&args[1..]);
    Ok(Value::Array(items))
}

/// New array without its last element.
fn fn_pop(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, String> {
    let items = expect_array(&args[0], "argument")?;
    match items.split_last() {
        Some((_, rest)) => Ok(Value::Array(rest.to_vec())),
        None => Err("cannot pop from an empty array".to_string()),
    }
}

fn fn_iif(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, String> {
    Ok(if args[0].is_truthy() {
        args[1].clone()
    } else {
        args[2].clone()
    })
}

fn fn_type(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, String> {
    Ok(Value::Str(args[0].type_name().to_string()))
}

fn fn_json(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, String> {
    serde_json::to_string(&args[0].to_json())
        .map(Value::Str)
        .map_err(|err| err.to_string())
}

fn fn_str(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, String> {
    Ok(Value::Str(args[0].display_text()))
}

fn numbers(args: &[Value]) -> Result<Vec<i64>, String> {
    let flat: Vec<&Value> = match args {
        [Value::Array(items)] => items.iter().collect(),
        _ => args.iter().collect(),
    };
    flat.into_iter()
        .map(|value| expect_number(value, "argument"))
        .collect()
}

fn fn_min(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, String> {
    numbers(args)?
        .into_iter()
        .min()
        .map(Value::Number)
        .ok_or_else(|| "needs at least one number".to_string())
}

fn fn_max(args: &[Value], _ctx: &dyn EvalContext) -> Result<Value, String> {
    numbers(args)?
        .into_iter()
        .max()
        .map(Value::Number)
        .ok_or_else(|| "needs at least one number".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoSymbols;

    impl EvalContext for NoSymbols {
        fn current_pc(&self) -> i64 {
            0
        }

        fn lookup_symbol(&self, name: &str) -> Option<Value> {
            (name == "THERE").then_some(Value::Number(1))
        }
    }

    fn call(name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
        call_function(name, args, &NoSymbols, Span::default())
    }

    fn s(text: &str) -> Value {
        Value::Str(text.to_string())
    }

    #[test]
    fn lookup_ignores_case_and_leading_dot() {
        assert!(lookup_function(".len").is_some());
        assert!(lookup_function("LEN").is_some());
        assert!(lookup_function(".nope").is_none());
        assert!(takes_name_argument(".Def"));
        assert!(!takes_name_argument(".len"));
    }

    #[test]
    fn arity_is_checked() {
        let err = call(".iif", vec![Value::Number(1)]).unwrap_err();
        assert_eq!(err.message, ".IIF expects 3 argument(s), got 1");
        let err = call(".hex", Vec::new()).unwrap_err();
        assert_eq!(err.message, ".HEX expects 1 to 2 argument(s), got 0");
    }

    #[test]
    fn string_functions() {
        assert_eq!(call(".hex", vec![Value::Number(255), Value::Number(4)]).unwrap(), s("00FF"));
        assert_eq!(
            call(".split", vec![s("a,b,c"), s(",")]).unwrap(),
            Value::Array(vec![s("a"), s("b"), s("c")])
        );
        assert_eq!(
            call(".join", vec![Value::Array(vec![Value::Number(1), s("x")]), s("-")]).unwrap(),
            s("1-x")
        );
        assert_eq!(call(".len", vec![s("hello")]).unwrap(), Value::Number(5));
        assert_eq!(call(".str", vec![Value::Number(-3)]).unwrap(), s("-3"));
    }

    #[test]
    fn array_functions_return_new_arrays() {
        let base = Value::Array(vec![Value::Number(1)]);
        assert_eq!(
            call(".push", vec![base.clone(), Value::Number(2), Value::Number(3)]).unwrap(),
            Value::Array(vec![Value::Number(1), Value::Number(2), Value::Number(3)])
        );
        assert_eq!(call(".pop", vec![base]).unwrap(), Value::Array(Vec::new()));
        assert!(call(".pop", vec![Value::Array(Vec::new())]).is_err());
        assert_eq!(
            call(".max", vec![Value::Array(vec![Value::Number(4), Value::Number(9)])]).unwrap(),
            Value::Number(9)
        );
        assert_eq!(
            call(".min", vec![Value::Number(4), Value::Number(-9)]).unwrap(),
            Value::Number(-9)
        );
    }

    #[test]
    fn json_and_type() {
        let value = Value::Array(vec![Value::Number(1), s("a")]);
        assert_eq!(call(".json", vec![value.clone()]).unwrap(), s("[1,\"a\"]"));
        assert_eq!(call(".type", vec![value]).unwrap(), s("array"));
    }

    #[test]
    fn def_checks_symbol_presence() {
        assert_eq!(call(".def", vec![s("THERE")]).unwrap(), Value::Number(1));
        assert_eq!(call(".undef", vec![s("THERE")]).unwrap(), Value::Number(0));
        assert!(call(".def", vec![Value::Number(1)]).is_err());
    }
}
