// values.rs
use serde_json::Value;

/// Human form of a context value, used for `${...}` substitution and printing.
pub fn pretty(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

pub fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

/// Reads an assigned value: anything that parses as a JSON literal keeps its type
/// (`5`, `true`, `"x"`, `{"a":1}`), everything else stays a raw string.
pub fn parse_literal(raw: &str) -> Value {
    let t = raw.trim();
    if t.is_empty() {
        return Value::String(String::new());
    }
    serde_json::from_str(t).unwrap_or_else(|_| Value::String(t.to_string()))
}

pub fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Equality with numeric widening, so `5 == 5.0` holds.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i == j,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}
