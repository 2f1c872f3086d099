//! Template functions callable from pipelines
//!
//! The registry is a static name to [`Function`] map. Most entries are pure
//! functions over their evaluated arguments; the few that render other
//! templates (`include`, `tpl`) or honour lint mode (`required`, `fail`) get
//! the execution [`State`]. `and`/`or` are evaluated lazily by the executor.
//!
//! "Soft" functions return a zero value on bad input. Their `must*`
//! counterparts return a [`FuncError`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use once_cell::sync::Lazy;

use crate::error::{ExecError, ExecErrorKind};
use crate::exec::State;
use crate::value::{Map, Value};

mod builtins;
mod collections;
mod crypto;
mod date;
mod encoding;
mod math;
mod reflect;
mod semver;
mod strings;
mod urls;

pub type FuncResult = Result<Value, FuncError>;

/// A function over evaluated arguments
pub type PureFn = fn(&[Value]) -> FuncResult;

/// A function that also needs the execution state
pub type StatefulFn = fn(&mut State<'_>, &[Value]) -> FuncResult;

#[derive(Clone, Copy)]
pub enum Callable {
    And,
    Or,
    Pure(PureFn),
    Stateful(StatefulFn),
}

#[derive(Clone, Copy)]
pub struct Function {
    pub name: &'static str,
    pub min_args: usize,
    /// `None` for variadic functions
    pub max_args: Option<usize>,
    pub callable: Callable,
}

/// Failure raised by a template function
#[derive(Debug, Clone)]
pub enum FuncError {
    /// Reported as `error calling <name>: <message>`
    Call { kind: ExecErrorKind, message: String },
    /// Argument conversion failure, reported verbatim
    Arg(String),
    /// Error from a nested template execution, passed through unchanged
    Nested(ExecError),
}

impl FuncError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_kind(ExecErrorKind::Function, message)
    }

    pub fn with_kind(kind: ExecErrorKind, message: impl Into<String>) -> Self {
        FuncError::Call {
            kind,
            message: message.into(),
        }
    }

    /// Wrap a failure from a nested template; recursion errors stay unwrapped
    pub fn from_nested(error: ExecError) -> Self {
        match error.kind {
            ExecErrorKind::Recursion => FuncError::Nested(error),
            _ => FuncError::with_kind(error.kind.clone(), error.to_string()),
        }
    }

    fn wrong_type(expected: &str, got: &Value) -> Self {
        let got = match got {
            Value::Nil => "interface {}",
            other => other.type_name(),
        };
        FuncError::Arg(format!(
            "wrong type for value; expected {}; got {}",
            expected, got
        ))
    }
}

static REGISTRY: Lazy<HashMap<&'static str, Function>> = Lazy::new(|| {
    let mut registry = Registry::default();
    builtins::register(&mut registry);
    strings::register(&mut registry);
    math::register(&mut registry);
    encoding::register(&mut registry);
    collections::register(&mut registry);
    reflect::register(&mut registry);
    semver::register(&mut registry);
    date::register(&mut registry);
    crypto::register(&mut registry);
    urls::register(&mut registry);
    registry.functions
});

/// Look up a function by name
pub fn lookup(name: &str) -> Option<&'static Function> {
    REGISTRY.get(name)
}

pub fn is_defined(name: &str) -> bool {
    REGISTRY.contains_key(name)
}

/// Every registered name, sorted
pub fn names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = REGISTRY.keys().copied().collect();
    names.sort_unstable();
    names
}

#[derive(Default)]
pub(crate) struct Registry {
    functions: HashMap<&'static str, Function>,
}

impl Registry {
    fn insert(
        &mut self,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        callable: Callable,
    ) {
        self.functions.insert(
            name,
            Function {
                name,
                min_args,
                max_args,
                callable,
            },
        );
    }

    /// Exactly `arity` arguments
    pub(crate) fn fixed(&mut self, name: &'static str, arity: usize, f: PureFn) {
        self.insert(name, arity, Some(arity), Callable::Pure(f));
    }

    /// At least `min` arguments
    pub(crate) fn variadic(&mut self, name: &'static str, min: usize, f: PureFn) {
        self.insert(name, min, None, Callable::Pure(f));
    }

    pub(crate) fn stateful(&mut self, name: &'static str, arity: usize, f: StatefulFn) {
        self.insert(name, arity, Some(arity), Callable::Stateful(f));
    }

    pub(crate) fn special(&mut self, name: &'static str, callable: Callable) {
        self.insert(name, 1, None, callable);
    }
}

// Argument conversion helpers. Typed parameters mirror the Go signatures:
// a `string` parameter rejects anything but a string, while `interface{}`
// parameters go through the lenient `to_*` conversions.

pub(crate) fn arg_str(args: &[Value], i: usize) -> Result<&str, FuncError> {
    match &args[i] {
        Value::String(s) => Ok(s),
        other => Err(FuncError::wrong_type("string", other)),
    }
}

/// An `int` parameter: integers or floats with no fractional part
pub(crate) fn arg_int(args: &[Value], i: usize) -> Result<i64, FuncError> {
    match &args[i] {
        Value::Int(n) => Ok(*n),
        Value::Float(f) if f.is_finite() && f.fract() == 0.0 => Ok(*f as i64),
        other => Err(FuncError::wrong_type("int", other)),
    }
}

pub(crate) fn arg_bool(args: &[Value], i: usize) -> Result<bool, FuncError> {
    match &args[i] {
        Value::Bool(b) => Ok(*b),
        other => Err(FuncError::wrong_type("bool", other)),
    }
}

pub(crate) fn arg_map(args: &[Value], i: usize) -> Result<&Rc<RefCell<Map>>, FuncError> {
    match &args[i] {
        Value::Map(m) => Ok(m),
        other => Err(FuncError::wrong_type("map[string]interface {}", other)),
    }
}

pub(crate) fn arg_list(args: &[Value], i: usize) -> Result<&[Value], FuncError> {
    match &args[i] {
        Value::List(l) => Ok(l),
        other => Err(FuncError::wrong_type("[]interface {}", other)),
    }
}

/// Sprig's `strval`: strings verbatim, everything else through `%v`
pub(crate) fn strval(value: &Value) -> String {
    value.to_display_string()
}

/// Sprig's `strslice`: lists become their non-nil elements as strings
pub(crate) fn strslice(value: &Value) -> Vec<String> {
    match value {
        Value::List(items) => items.iter().filter(|v| !v.is_nil()).map(strval).collect(),
        Value::Nil => Vec::new(),
        other => vec![strval(other)],
    }
}

/// Soft variant: argument type errors still surface, execution errors
/// collapse to the fallback
pub(crate) fn soft(result: FuncResult, fallback: Value) -> FuncResult {
    match result {
        Err(FuncError::Call { .. }) => Ok(fallback),
        other => other,
    }
}

pub(crate) fn string_list(items: Vec<String>) -> Value {
    Value::from_list(items.into_iter().map(Value::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_core_names() {
        for name in [
            "and", "or", "not", "eq", "include", "tpl", "required", "toYaml", "nindent",
            "semverCompare", "genCA", "derivePassword", "dict", "printf", "urlParse",
            "slice", "dateInZone", "typeIsLike", "mergeOverwrite",
        ] {
            assert!(is_defined(name), "{name} should be registered");
        }
        assert!(!is_defined("nindnet"));
    }

    #[test]
    fn test_names_sorted() {
        let names = names();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_wrong_type_message() {
        let args = [Value::Int(1), Value::Nil];
        match arg_str(&args, 0) {
            Err(FuncError::Arg(msg)) => {
                assert_eq!(msg, "wrong type for value; expected string; got int")
            }
            other => panic!("unexpected: {other:?}"),
        }
        match arg_str(&args, 1) {
            Err(FuncError::Arg(msg)) => {
                assert_eq!(msg, "wrong type for value; expected string; got interface {}")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_strslice_skips_nil() {
        let list = Value::from_list(vec![Value::from("a"), Value::Nil, Value::Int(2)]);
        assert_eq!(strslice(&list), vec!["a", "2"]);
    }
}
