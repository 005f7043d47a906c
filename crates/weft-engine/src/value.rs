//! Value semantics for the expression language.
//!
//! Template values are plain [`serde_json::Value`]s. This module layers the
//! loose, script-like semantics templates expect on top of them: truthiness,
//! numeric coercion and string conversion.

use serde_json::{Number, Value};

/// Largest integer magnitude that survives a round trip through `f64`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Script-like operations on template values.
pub trait ValueExt {
    /// Check if the value is truthy (for conditionals and `!`).
    ///
    /// `null`, `false`, `0`, `NaN` and the empty string are falsy. Arrays and
    /// objects are always truthy, even when empty.
    fn is_truthy(&self) -> bool;

    /// Human-readable type name used in diagnostics.
    fn type_name(&self) -> &'static str;

    /// Convert to the string form used for interpolation.
    fn render_to_string(&self) -> String;

    /// Numeric coercion (`NaN` when the value has no numeric reading).
    fn to_number(&self) -> f64;
}

impl ValueExt for Value {
    fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    fn render_to_string(&self) -> String {
        match self {
            Value::Null => "null".to_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Null => String::new(),
                    other => other.render_to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_owned(),
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Value::Array(_) | Value::Object(_) => f64::NAN,
        }
    }
}

/// Build a number value, keeping integral results as integers.
///
/// Non-finite results have no JSON representation and become `null`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn number(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        Value::from(value as i64)
    } else {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

/// Format a number the way it should appear in rendered output.
///
/// Integral floats print without a fractional part (`2.0` renders as `2`).
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER => (f as i64).to_string(),
        Some(f) => f.to_string(),
        None => "NaN".to_owned(),
    }
}
