//! KQL literal encoding.
//!
//! [`KqlValue`] is the closed set of values the builder ever splices into query text; every
//! variant has exactly one literal form, so there is no best-effort fallback.
//!
//! Strings are single-quoted with `''` doubling, or emitted as a ```` ``` ```` raw block when
//! they contain a newline, a carriage return or a backslash. The raw block is not escaped:
//! content containing ```` ``` ```` or starting or ending with a backtick would run into the
//! delimiters, so it is emitted as a double-quoted escaped literal instead. Treat keys and
//! namespaces as trusted input either way.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// Typed value that can be written as a KQL literal.
#[derive(Debug, Clone, PartialEq)]
pub enum KqlValue {
    Null,
    Bool(bool),
    Long(i64),
    Real(f64),
    String(String),
    DateTime(DateTime<Utc>),
    /// Mapping or sequence; encoded as `dynamic(<json>)`.
    Dynamic(Value),
}

impl KqlValue {
    /// Literal text for this value.
    pub fn encode(&self) -> String {
        match self {
            KqlValue::Null => "null".to_string(),
            KqlValue::Bool(b) => b.to_string(),
            KqlValue::Long(n) => n.to_string(),
            KqlValue::Real(f) => encode_real(*f),
            KqlValue::String(s) => encode_string(s),
            KqlValue::DateTime(dt) => encode_datetime(dt),
            KqlValue::Dynamic(v) => encode_dynamic(v),
        }
    }
}

/// Shorthand for `value.into().encode()`.
pub fn encode(value: impl Into<KqlValue>) -> String {
    value.into().encode()
}

/// Single-quoted string, or a raw ```` ``` ```` block for multi-line / backslash content.
pub fn encode_string(s: &str) -> String {
    let needs_raw = s.contains('\n') || s.contains('\r') || s.contains('\\');
    if !needs_raw {
        return format!("'{}'", s.replace('\'', "''"));
    }
    if s.contains("```") || s.starts_with('`') || s.ends_with('`') {
        return encode_escaped(s);
    }
    format!("```{}```", s)
}

/// Double-quoted literal with backslash escapes.
fn encode_escaped(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn encode_real(f: f64) -> String {
    if f.is_nan() {
        "real(nan)".to_string()
    } else if f.is_infinite() {
        if f > 0.0 {
            "real(+inf)".to_string()
        } else {
            "real(-inf)".to_string()
        }
    } else {
        // Debug keeps a decimal point on whole numbers so the literal stays a real.
        format!("{:?}", f)
    }
}

/// `datetime(YYYY-MM-DDTHH:MM:SS.ffffffZ)`.
pub fn encode_datetime(dt: &DateTime<Utc>) -> String {
    format!("datetime({})", dt.to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// `dynamic(<json>)`. Nested strings are JSON strings, so they never need the raw form.
pub fn encode_dynamic(v: &Value) -> String {
    format!("dynamic({})", v)
}

/// JSON array for an embedding vector. Non-finite components become `null`.
pub fn vector_value(v: &[f32]) -> Value {
    Value::Array(
        v.iter()
            .map(|x| {
                serde_json::Number::from_f64(f64::from(*x))
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            })
            .collect(),
    )
}

/// `dynamic([..])` for an embedding vector.
pub fn encode_vector(v: &[f32]) -> String {
    encode_dynamic(&vector_value(v))
}

impl From<bool> for KqlValue {
    fn from(b: bool) -> Self {
        KqlValue::Bool(b)
    }
}

impl From<i64> for KqlValue {
    fn from(n: i64) -> Self {
        KqlValue::Long(n)
    }
}

impl From<i32> for KqlValue {
    fn from(n: i32) -> Self {
        KqlValue::Long(i64::from(n))
    }
}

impl From<usize> for KqlValue {
    fn from(n: usize) -> Self {
        KqlValue::Long(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<f64> for KqlValue {
    fn from(f: f64) -> Self {
        KqlValue::Real(f)
    }
}

impl From<&str> for KqlValue {
    fn from(s: &str) -> Self {
        KqlValue::String(s.to_string())
    }
}

impl From<String> for KqlValue {
    fn from(s: String) -> Self {
        KqlValue::String(s)
    }
}

impl From<&String> for KqlValue {
    fn from(s: &String) -> Self {
        KqlValue::String(s.clone())
    }
}

impl From<DateTime<Utc>> for KqlValue {
    fn from(dt: DateTime<Utc>) -> Self {
        KqlValue::DateTime(dt)
    }
}

/// JSON scalars map to their typed literal; objects and arrays become `dynamic`.
impl From<Value> for KqlValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => KqlValue::Null,
            Value::Bool(b) => KqlValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => KqlValue::Long(i),
                None => KqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => KqlValue::String(s),
            other => KqlValue::Dynamic(other),
        }
    }
}

impl<T: Into<KqlValue>> From<Option<T>> for KqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(KqlValue::Null)
    }
}
