//! Language builtins plus the Helm functions that need the execution state

use std::cmp::Ordering;

use tracing::warn;

use super::{FuncError, FuncResult, Registry, arg_bool, arg_str};
use crate::error::ExecErrorKind;
use crate::exec::State;
use crate::format::{sprint, sprintf, sprintln};
use crate::value::Value;

pub(super) fn register(r: &mut Registry) {
    r.special("and", super::Callable::And);
    r.special("or", super::Callable::Or);
    r.fixed("not", 1, |args| Ok(Value::Bool(!args[0].is_truthy())));
    r.variadic("eq", 1, eq);
    r.fixed("ne", 2, |args| Ok(Value::Bool(!values_equal(&args[0], &args[1])?)));
    r.fixed("lt", 2, |args| Ok(Value::Bool(less(&args[0], &args[1])?)));
    r.fixed("le", 2, |args| Ok(Value::Bool(less_or_equal(&args[0], &args[1])?)));
    r.fixed("gt", 2, |args| Ok(Value::Bool(!less_or_equal(&args[0], &args[1])?)));
    r.fixed("ge", 2, |args| Ok(Value::Bool(!less(&args[0], &args[1])?)));
    r.fixed("len", 1, len);
    r.variadic("index", 1, index);
    r.variadic("print", 0, |args| Ok(Value::from(sprint(args))));
    r.variadic("println", 0, |args| Ok(Value::from(sprintln(args))));
    r.variadic("printf", 1, printf);
    r.variadic("html", 0, |args| Ok(Value::from(html_escape(&escaper_input(args)))));
    r.variadic("js", 0, |args| Ok(Value::from(js_escape(&escaper_input(args)))));
    r.variadic("urlquery", 0, |args| Ok(Value::from(query_escape(&escaper_input(args)))));

    r.variadic("default", 1, default);
    r.fixed("empty", 1, |args| Ok(Value::Bool(!args[0].is_truthy())));
    r.variadic("coalesce", 0, |args| {
        Ok(args.iter().find(|v| v.is_truthy()).cloned().unwrap_or_default())
    });
    r.fixed("ternary", 3, |args| {
        let pick = if arg_bool(args, 2)? { &args[0] } else { &args[1] };
        Ok(pick.clone())
    });
    r.variadic("all", 0, |args| Ok(Value::Bool(args.iter().all(Value::is_truthy))));
    r.variadic("any", 0, |args| Ok(Value::Bool(args.iter().any(Value::is_truthy))));
    r.fixed("lookup", 4, |args| {
        for i in 0..4 {
            arg_str(args, i)?;
        }
        Ok(Value::empty_map())
    });

    r.stateful("fail", 1, fail);
    r.stateful("required", 2, required);
    r.stateful("mustRequired", 2, required);
    r.stateful("include", 2, include);
    r.stateful("mustInclude", 2, include);
    r.stateful("tpl", 2, tpl);
    r.stateful("mustTpl", 2, tpl);
}

fn incompatible() -> FuncError {
    FuncError::new("incompatible types for comparison")
}

fn invalid_comparison() -> FuncError {
    FuncError::new("invalid type for comparison")
}

/// Equality between two basic values; ints and floats compare numerically
fn values_equal(a: &Value, b: &Value) -> Result<bool, FuncError> {
    match (a, b) {
        (Value::Nil, Value::Nil) => Ok(true),
        (Value::Nil, _) | (_, Value::Nil) => Ok(false),
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        (Value::Int(x), Value::Int(y)) => Ok(x == y),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            Ok(a.to_f64() == b.to_f64())
        }
        (Value::String(x), Value::String(y)) => Ok(x == y),
        (Value::List(_), Value::List(_)) | (Value::Map(_), Value::Map(_)) => {
            Err(FuncError::new(format!("non-comparable type {}: {}", b, b.type_name())))
        }
        (Value::List(_) | Value::Map(_), Value::List(_) | Value::Map(_)) => {
            Err(FuncError::new(format!(
                "non-comparable types {}: {}, {}: {}",
                a,
                a.type_name(),
                b.type_name(),
                b
            )))
        }
        _ => Err(incompatible()),
    }
}

fn eq(args: &[Value]) -> FuncResult {
    if args.len() < 2 {
        return Err(FuncError::new("missing argument for comparison"));
    }
    for other in &args[1..] {
        if values_equal(&args[0], other)? {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

fn ordering(a: &Value, b: &Value) -> Result<Ordering, FuncError> {
    match (a, b) {
        (Value::Nil | Value::List(_) | Value::Map(_), _)
        | (_, Value::Nil | Value::List(_) | Value::Map(_)) => {
            Err(invalid_comparison())
        }
        (Value::Bool(_), Value::Bool(_)) => Err(invalid_comparison()),
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => a
            .to_f64()
            .partial_cmp(&b.to_f64())
            .ok_or_else(incompatible),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => Err(incompatible()),
    }
}

fn less(a: &Value, b: &Value) -> Result<bool, FuncError> {
    Ok(ordering(a, b)? == Ordering::Less)
}

fn less_or_equal(a: &Value, b: &Value) -> Result<bool, FuncError> {
    Ok(ordering(a, b)? != Ordering::Greater)
}

fn len(args: &[Value]) -> FuncResult {
    match &args[0] {
        Value::Nil => Err(FuncError::new("len of nil pointer")),
        other => other
            .len()
            .map(Value::from)
            .ok_or_else(|| FuncError::new(format!("len of type {}", other.type_name()))),
    }
}

fn index_error(message: impl Into<String>) -> FuncError {
    FuncError::with_kind(ExecErrorKind::Index, message)
}

fn index(args: &[Value]) -> FuncResult {
    let mut item = args[0].clone();
    if item.is_nil() {
        return Err(index_error("index of untyped nil"));
    }
    for key in &args[1..] {
        item = match &item {
            Value::Nil => return Err(index_error("index of nil pointer")),
            Value::List(_) | Value::String(_) => {
                let len = item.len().unwrap_or(0);
                let i = match key {
                    Value::Int(i) => *i,
                    Value::Nil => return Err(index_error("cannot index slice/array with nil")),
                    other => {
                        return Err(index_error(format!(
                            "cannot index slice/array with type {}",
                            other.type_name()
                        )));
                    }
                };
                if i < 0 || i as usize >= len {
                    return Err(index_error(format!("index out of range: {}", i)));
                }
                match &item {
                    Value::List(list) => list[i as usize].clone(),
                    Value::String(s) => Value::Int(i64::from(s.as_bytes()[i as usize])),
                    _ => Value::Nil,
                }
            }
            Value::Map(map) => match key {
                Value::String(k) => map.borrow().get(k.as_ref()).cloned().unwrap_or_default(),
                Value::Nil => return Err(index_error("value is nil; should be of type string")),
                other => {
                    return Err(index_error(format!(
                        "value has type {}; should be string",
                        other.type_name()
                    )));
                }
            },
            other => {
                return Err(index_error(format!(
                    "can't index item of type {}",
                    other.type_name()
                )));
            }
        };
    }
    Ok(item)
}

fn printf(args: &[Value]) -> FuncResult {
    let format = arg_str(args, 0)?;
    Ok(Value::from(sprintf(format, &args[1..])))
}

/// A single string argument is used as is; anything else goes through `print`
fn escaper_input(args: &[Value]) -> String {
    match args {
        [Value::String(s)] => s.to_string(),
        _ => sprint(args),
    }
}

pub(crate) fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\0' => out.push('\u{FFFD}'),
            c => out.push(c),
        }
    }
    out
}

fn js_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '<' => out.push_str("\\u003C"),
            '>' => out.push_str("\\u003E"),
            '&' => out.push_str("\\u0026"),
            '=' => out.push_str("\\u003D"),
            c if (c as u32) < 0x20 || c.is_control() => {
                out.push_str(&format!("\\u{:04X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

/// Go's `url.QueryEscape`
pub(crate) fn query_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b' ' => out.push('+'),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

fn default(args: &[Value]) -> FuncResult {
    match args.get(1) {
        Some(given) if given.is_truthy() => Ok(given.clone()),
        _ => Ok(args[0].clone()),
    }
}

fn fail(state: &mut State<'_>, args: &[Value]) -> FuncResult {
    let message = arg_str(args, 0)?;
    if state.options().lint_mode {
        warn!(template = %state.template_name(), "fail: {}", message);
        state.warn(message);
        return Ok(Value::from(""));
    }
    Err(FuncError::with_kind(ExecErrorKind::Fail, message))
}

fn required(state: &mut State<'_>, args: &[Value]) -> FuncResult {
    let message = arg_str(args, 0)?;
    let missing = match &args[1] {
        Value::Nil => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    };
    if !missing {
        return Ok(args[1].clone());
    }
    if state.options().lint_mode {
        warn!(template = %state.template_name(), "missing required value: {}", message);
        state.warn(message);
        return Ok(Value::from(""));
    }
    Err(FuncError::with_kind(ExecErrorKind::Required, message))
}

fn include(state: &mut State<'_>, args: &[Value]) -> FuncResult {
    let name = arg_str(args, 0)?;
    state.include(name, args[1].clone()).map(Value::from)
}

fn tpl(state: &mut State<'_>, args: &[Value]) -> FuncResult {
    let text = arg_str(args, 0)?;
    state.tpl(text, args[1].clone()).map(Value::from)
}
