//! Runtime values
//!
//! Every piece of data a template touches is a [`Value`]: chart values,
//! release and capability objects, function results and literals. Maps are
//! shared and mutable (`set`/`unset` edit them in place, as Sprig does on
//! Go maps); lists and strings are immutable and cheaply cloned.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value as JsonValue;

use crate::format::format_float;

/// Key-sorted map, the iteration order `range` and the printers rely on
pub type Map = BTreeMap<String, Value>;

/// A dynamically typed template value
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Rc<str>),
    List(Rc<Vec<Value>>),
    Map(Rc<RefCell<Map>>),
}

impl Value {
    pub fn from_map(map: Map) -> Self {
        Value::Map(Rc::new(RefCell::new(map)))
    }

    pub fn from_list(list: Vec<Value>) -> Self {
        Value::List(Rc::new(list))
    }

    pub fn empty_map() -> Self {
        Self::from_map(Map::new())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Template truthiness: nil, false, zero and empty collections are false
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.borrow().is_empty(),
        }
    }

    /// Go type name as printed by `%T` and `typeOf`
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "<nil>",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float64",
            Value::String(_) => "string",
            Value::List(_) => "[]interface {}",
            Value::Map(_) => "map[string]interface {}",
        }
    }

    /// Go reflect kind name as returned by `kindOf`
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "invalid",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float64",
            Value::String(_) => "string",
            Value::List(_) => "slice",
            Value::Map(_) => "map",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Rc<RefCell<Map>>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Length of a string (in bytes), list or map
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.len()),
            Value::List(l) => Some(l.len()),
            Value::Map(m) => Some(m.borrow().len()),
            _ => None,
        }
    }

    /// Map lookup; `None` when the key is absent or this is not a map
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Map(m) => m.borrow().get(key).cloned(),
            _ => None,
        }
    }

    /// Lenient integer conversion following Sprig's `toInt64`
    pub fn to_i64(&self) -> i64 {
        match self {
            Value::Nil => 0,
            Value::Bool(b) => i64::from(*b),
            Value::Int(i) => *i,
            Value::Float(f) => *f as i64,
            Value::String(s) => parse_int_lenient(s.trim()),
            _ => 0,
        }
    }

    /// Lenient float conversion following Sprig's `toFloat64`
    pub fn to_f64(&self) -> f64 {
        match self {
            Value::Nil => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::String(s) => s.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Whether this value is a number with no fractional part
    pub fn is_integral(&self) -> bool {
        match self {
            Value::Int(_) => true,
            Value::Float(f) => f.is_finite() && f.fract() == 0.0,
            Value::String(s) => s.trim().parse::<i64>().is_ok(),
            Value::Bool(_) | Value::Nil => true,
            _ => false,
        }
    }

    /// Convert to text the way Sprig's `toString` does
    pub fn to_display_string(&self) -> String {
        match self {
            Value::String(s) => s.to_string(),
            other => other.to_string(),
        }
    }

    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Nil,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            JsonValue::String(s) => Value::from(s.as_str()),
            JsonValue::Array(items) => {
                Self::from_list(items.iter().map(Value::from_json).collect())
            }
            JsonValue::Object(obj) => Self::from_map(
                obj.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to JSON; integral floats become integers as Go's encoder prints them
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Nil => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::from(*i),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    JsonValue::from(*f as i64)
                } else {
                    serde_json::Number::from_f64(*f)
                        .map(JsonValue::Number)
                        .unwrap_or(JsonValue::Null)
                }
            }
            Value::String(s) => JsonValue::String(s.to_string()),
            Value::List(l) => JsonValue::Array(l.iter().map(Value::to_json).collect()),
            Value::Map(m) => JsonValue::Object(
                m.borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Recursive copy that detaches nested maps from the original
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::List(l) => Self::from_list(l.iter().map(Value::deep_copy).collect()),
            Value::Map(m) => Self::from_map(
                m.borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.deep_copy()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Structural equality with Go `reflect.DeepEqual` typing: `1` and `1.0` differ
    pub fn deep_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.deep_equal(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va.deep_equal(vb))
            }
            _ => false,
        }
    }
}

/// Parse an integer the way `strconv.ParseInt(s, 0, 64)` does, falling back to
/// truncating a float and finally to zero
fn parse_int_lenient(s: &str) -> i64 {
    if let Some(i) = parse_go_int(s) {
        return i;
    }
    s.parse::<f64>().map(|f| f as i64).unwrap_or(0)
}

/// Integer literal with an optional sign, base prefix and `_` separators
pub(crate) fn parse_go_int(text: &str) -> Option<i64> {
    let (negative, body) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let body = body.replace('_', "");
    let lower = body.to_ascii_lowercase();
    let (radix, digits) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest.to_string())
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest.to_string())
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest.to_string())
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, lower[1..].to_string())
    } else {
        (10, lower)
    };
    if digits.is_empty() {
        return None;
    }
    let magnitude = i128::from_str_radix(&digits, radix).ok()?;
    let signed = if negative { -magnitude } else { magnitude };
    i64::try_from(signed).ok()
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(list: Vec<Value>) -> Self {
        Value::from_list(list)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::from_map(map)
    }
}

impl From<&JsonValue> for Value {
    fn from(json: &JsonValue) -> Self {
        Value::from_json(json)
    }
}

/// Go `%v` formatting
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("<nil>"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => f.write_str(&format_float(*x, 'g', None, false)),
            Value::String(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("map[")?;
                for (i, (k, v)) in map.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}:{}", k, v)?;
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::from_list(vec![]).is_truthy());
        assert!(!Value::empty_map().is_truthy());
        assert!(Value::from("0").is_truthy());
        assert!(Value::Int(-1).is_truthy());
    }

    #[test]
    fn test_display_go_style() {
        let mut map = Map::new();
        map.insert("b".to_string(), Value::Int(2));
        map.insert("a".to_string(), Value::from_list(vec![Value::from("x"), Value::Nil]));
        assert_eq!(Value::from_map(map).to_string(), "map[a:[x <nil>] b:2]");
        assert_eq!(Value::Float(3.0).to_string(), "3");
        assert_eq!(Value::Float(1e6).to_string(), "1e+06");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
    }

    #[test]
    fn test_json_roundtrip_types() {
        let json = serde_json::json!({"n": 3, "f": 1.5, "s": "x", "l": [true, null]});
        let value = Value::from_json(&json);
        assert!(matches!(value.get("n"), Some(Value::Int(3))));
        assert!(matches!(value.get("f"), Some(Value::Float(_))));
        assert_eq!(value.to_json(), json);
        assert_eq!(Value::Float(4.0).to_json(), serde_json::json!(4));
    }

    #[test]
    fn test_lenient_conversions() {
        assert_eq!(Value::from("42").to_i64(), 42);
        assert_eq!(Value::from("0x1F").to_i64(), 31);
        assert_eq!(Value::from("3.9").to_i64(), 3);
        assert_eq!(Value::from("junk").to_i64(), 0);
        assert_eq!(Value::Bool(true).to_f64(), 1.0);
        assert_eq!(parse_go_int("1_000"), Some(1000));
        assert_eq!(parse_go_int("0o17"), Some(15));
        assert_eq!(parse_go_int("017"), Some(15));
        assert_eq!(parse_go_int("-0b101"), Some(-5));
    }

    #[test]
    fn test_deep_equal_is_type_strict() {
        assert!(!Value::Int(1).deep_equal(&Value::Float(1.0)));
        let a = Value::from_list(vec![Value::Int(1), Value::from("a")]);
        let b = Value::from_list(vec![Value::Int(1), Value::from("a")]);
        assert!(a.deep_equal(&b));
    }
}
