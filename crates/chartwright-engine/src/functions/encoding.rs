//! Serialization, base64/base32 and checksum functions

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use data_encoding::BASE32;
use serde_json::Value as JsonValue;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use super::{FuncError, FuncResult, Registry, arg_str};
use crate::value::{Map, Value};

pub(super) fn register(r: &mut Registry) {
    r.fixed("b64enc", 1, |a| Ok(STANDARD.encode(arg_str(a, 0)?).into()));
    r.fixed("b64dec", 1, |a| Ok(b64dec(arg_str(a, 0)?).into()));
    r.fixed("b32enc", 1, |a| Ok(BASE32.encode(arg_str(a, 0)?.as_bytes()).into()));
    r.fixed("b32dec", 1, |a| Ok(b32dec(arg_str(a, 0)?).into()));

    r.fixed("sha1sum", 1, |a| Ok(hex::encode(Sha1::digest(arg_str(a, 0)?)).into()));
    r.fixed("sha256sum", 1, |a| Ok(hex::encode(Sha256::digest(arg_str(a, 0)?)).into()));
    r.fixed("sha512sum", 1, |a| Ok(hex::encode(Sha512::digest(arg_str(a, 0)?)).into()));
    r.fixed("adler32sum", 1, |a| {
        Ok(adler2::adler32_slice(arg_str(a, 0)?.as_bytes()).to_string().into())
    });

    r.fixed("toJson", 1, |a| Ok(to_json(&a[0], false, true).unwrap_or_default().into()));
    r.fixed("mustToJson", 1, |a| Ok(to_json(&a[0], false, true)?.into()));
    r.fixed("toPrettyJson", 1, |a| Ok(to_json(&a[0], true, true).unwrap_or_default().into()));
    r.fixed("mustToPrettyJson", 1, |a| Ok(to_json(&a[0], true, true)?.into()));
    r.fixed("toRawJson", 1, |a| Ok(to_json(&a[0], false, false).unwrap_or_default().into()));
    r.fixed("mustToRawJson", 1, |a| Ok(to_json(&a[0], false, false)?.into()));
    r.fixed("fromJson", 1, |a| Ok(from_json_map(arg_str(a, 0)?)));
    r.fixed("fromJsonArray", 1, |a| Ok(from_json_array(arg_str(a, 0)?)));

    r.fixed("toYaml", 1, |a| Ok(to_yaml(&a[0]).unwrap_or_default().into()));
    r.fixed("mustToYaml", 1, |a| Ok(to_yaml(&a[0])?.into()));
    r.fixed("fromYaml", 1, |a| Ok(from_yaml_map(arg_str(a, 0)?)));
    r.fixed("fromYamlArray", 1, |a| Ok(from_yaml_array(arg_str(a, 0)?)));

    r.fixed("toToml", 1, |a| Ok(to_toml(&a[0]).into()));
    r.fixed("fromToml", 1, |a| Ok(from_toml(arg_str(a, 0)?)));
}

fn b64dec(s: &str) -> String {
    match STANDARD.decode(s) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => {
            let offset = match err {
                base64::DecodeError::InvalidByte(offset, _)
                | base64::DecodeError::InvalidLastSymbol(offset, _) => offset,
                base64::DecodeError::InvalidLength(len) => len,
                base64::DecodeError::InvalidPadding => s.len(),
            };
            format!("illegal base64 data at input byte {}", offset)
        }
    }
}

fn b32dec(s: &str) -> String {
    match BASE32.decode(s.as_bytes()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => format!("illegal base32 data at input byte {}", err.position),
    }
}

/// Go's encoder escapes HTML-significant characters inside strings
fn escape_html(json: String) -> String {
    if !json.contains(['<', '>', '&', '\u{2028}', '\u{2029}']) {
        return json;
    }
    json.replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

fn to_json(value: &Value, pretty: bool, escape: bool) -> Result<String, FuncError> {
    let json = value.to_json();
    let text = if pretty {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    }
    .map_err(|e| FuncError::new(e.to_string()))?;
    Ok(if escape { escape_html(text) } else { text })
}

fn error_map(message: impl Into<String>) -> Value {
    let mut map = Map::new();
    map.insert("Error".to_string(), Value::from(message.into()));
    Value::from_map(map)
}

fn json_kind(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn from_json_map(s: &str) -> Value {
    match serde_json::from_str::<JsonValue>(s) {
        Ok(json @ JsonValue::Object(_)) => Value::from_json(&json),
        Ok(JsonValue::Null) => Value::empty_map(),
        Ok(other) => error_map(format!(
            "json: cannot unmarshal {} into Go value of type map[string]interface {{}}",
            json_kind(&other)
        )),
        Err(err) => error_map(err.to_string()),
    }
}

fn from_json_array(s: &str) -> Value {
    match serde_json::from_str::<JsonValue>(s) {
        Ok(json @ JsonValue::Array(_)) => Value::from_json(&json),
        Ok(JsonValue::Null) => Value::from_list(Vec::new()),
        Ok(other) => Value::from_list(vec![Value::from(format!(
            "json: cannot unmarshal {} into Go value of type []interface {{}}",
            json_kind(&other)
        ))]),
        Err(err) => Value::from_list(vec![Value::from(err.to_string())]),
    }
}

pub(crate) fn to_yaml(value: &Value) -> Result<String, FuncError> {
    let yaml = serde_yaml::to_string(&value.to_json()).map_err(|e| FuncError::new(e.to_string()))?;
    Ok(yaml.strip_suffix('\n').unwrap_or(&yaml).to_string())
}

/// YAML to template values; non-string keys are stringified
pub(crate) fn from_yaml_value(yaml: &serde_yaml::Value) -> Value {
    match yaml {
        serde_yaml::Value::Null => Value::Nil,
        serde_yaml::Value::Bool(b) => Value::Bool(*b),
        serde_yaml::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(0.0)),
        },
        serde_yaml::Value::String(s) => Value::from(s.as_str()),
        serde_yaml::Value::Sequence(items) => {
            Value::from_list(items.iter().map(from_yaml_value).collect())
        }
        serde_yaml::Value::Mapping(mapping) => Value::from_map(
            mapping
                .iter()
                .map(|(k, v)| (yaml_key(k), from_yaml_value(v)))
                .collect(),
        ),
        serde_yaml::Value::Tagged(tagged) => from_yaml_value(&tagged.value),
    }
}

fn yaml_key(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Null => "null".to_string(),
        other => from_yaml_value(other).to_display_string(),
    }
}

fn yaml_kind(yaml: &serde_yaml::Value) -> &'static str {
    match yaml {
        serde_yaml::Value::Sequence(_) => "array",
        serde_yaml::Value::Mapping(_) => "object",
        serde_yaml::Value::String(_) => "string",
        serde_yaml::Value::Bool(_) => "bool",
        _ => "number",
    }
}

fn from_yaml_map(s: &str) -> Value {
    match serde_yaml::from_str::<serde_yaml::Value>(s) {
        Ok(yaml @ serde_yaml::Value::Mapping(_)) => from_yaml_value(&yaml),
        Ok(serde_yaml::Value::Null) => Value::empty_map(),
        Ok(other) => error_map(format!(
            "error unmarshaling JSON: while decoding JSON: json: cannot unmarshal {} into Go value of type map[string]interface {{}}",
            yaml_kind(&other)
        )),
        Err(err) => error_map(format!("error converting YAML to JSON: {}", err)),
    }
}

fn from_yaml_array(s: &str) -> Value {
    match serde_yaml::from_str::<serde_yaml::Value>(s) {
        Ok(yaml @ serde_yaml::Value::Sequence(_)) => from_yaml_value(&yaml),
        Ok(serde_yaml::Value::Null) => Value::from_list(Vec::new()),
        Ok(other) => Value::from_list(vec![Value::from(format!(
            "error unmarshaling JSON: while decoding JSON: json: cannot unmarshal {} into Go value of type []interface {{}}",
            yaml_kind(&other)
        ))]),
        Err(err) => Value::from_list(vec![Value::from(format!(
            "error converting YAML to JSON: {}",
            err
        ))]),
    }
}

fn to_toml(value: &Value) -> String {
    match toml::to_string(&value.to_json()) {
        Ok(text) => text,
        Err(err) => err.to_string(),
    }
}

fn from_toml_value(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::from(s.as_str()),
        toml::Value::Integer(i) => Value::Int(*i),
        toml::Value::Float(f) => Value::Float(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(d) => Value::from(d.to_string()),
        toml::Value::Array(items) => Value::from_list(items.iter().map(from_toml_value).collect()),
        toml::Value::Table(table) => Value::from_map(
            table
                .iter()
                .map(|(k, v)| (k.clone(), from_toml_value(v)))
                .collect(),
        ),
    }
}

fn from_toml(s: &str) -> Value {
    match s.parse::<toml::Table>() {
        Ok(table) => from_toml_value(&toml::Value::Table(table)),
        Err(err) => error_map(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::{Callable, lookup};

    fn call(name: &str, args: &[Value]) -> FuncResult {
        match lookup(name).map(|f| f.callable) {
            Some(Callable::Pure(f)) => f(args),
            _ => panic!("{name} is not a pure function"),
        }
    }

    fn text(name: &str, arg: Value) -> String {
        call(name, &[arg]).unwrap().to_display_string()
    }

    fn sample() -> Value {
        let mut map = Map::new();
        map.insert("b".to_string(), Value::from_list(vec![Value::from("x")]));
        map.insert("a".to_string(), Value::Int(1));
        Value::from_map(map)
    }

    #[test]
    fn test_base64() {
        assert_eq!(text("b64enc", Value::from("hello")), "aGVsbG8=");
        assert_eq!(text("b64dec", Value::from("aGVsbG8=")), "hello");
        assert!(text("b64dec", Value::from("a$")).starts_with("illegal base64 data at input byte"));
        assert_eq!(text("b32enc", Value::from("hi")), "NBUQ====");
        assert_eq!(text("b32dec", Value::from("NBUQ====")), "hi");
    }

    #[test]
    fn test_checksums() {
        assert_eq!(
            text("sha256sum", Value::from("abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(text("sha1sum", Value::from("abc")), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(text("adler32sum", Value::from("Wikipedia")), "300286872");
    }

    #[test]
    fn test_json_output() {
        assert_eq!(text("toJson", sample()), r#"{"a":1,"b":["x"]}"#);
        assert_eq!(text("toJson", Value::from("<a&b>")), r#""\u003ca\u0026b\u003e""#);
        assert_eq!(text("toRawJson", Value::from("<a&b>")), r#""<a&b>""#);
        assert_eq!(text("toPrettyJson", sample()), "{\n  \"a\": 1,\n  \"b\": [\n    \"x\"\n  ]\n}");
    }

    #[test]
    fn test_from_json() {
        let value = call("fromJson", &[Value::from(r#"{"k": [1, 2]}"#)]).unwrap();
        assert_eq!(value.to_string(), "map[k:[1 2]]");
        let broken = call("fromJson", &[Value::from("[1]")]).unwrap();
        assert!(broken.get("Error").is_some());
        let list = call("fromJsonArray", &[Value::from("[1, \"a\"]")]).unwrap();
        assert_eq!(list.to_string(), "[1 a]");
    }

    #[test]
    fn test_yaml() {
        assert_eq!(text("toYaml", sample()), "a: 1\nb:\n- x");
        assert_eq!(text("toYaml", Value::Nil), "null");
        let parsed = call("fromYaml", &[Value::from("name: web\nports:\n  - 80\n1: one")]).unwrap();
        assert_eq!(parsed.to_string(), "map[1:one name:web ports:[80]]");
        let scalar = call("fromYaml", &[Value::from("just text")]).unwrap();
        assert!(scalar.get("Error").is_some());
        let empty = call("fromYaml", &[Value::from("")]).unwrap();
        assert_eq!(empty.len(), Some(0));
        let list = call("fromYamlArray", &[Value::from("- a\n- b")]).unwrap();
        assert_eq!(list.to_string(), "[a b]");
    }

    #[test]
    fn test_toml() {
        let out = text("toToml", sample());
        assert!(out.contains("a = 1"));
        let parsed = call("fromToml", &[Value::from("x = 1\n[t]\ny = \"z\"")]).unwrap();
        assert_eq!(parsed.to_string(), "map[t:map[y:z] x:1]");
    }
}
