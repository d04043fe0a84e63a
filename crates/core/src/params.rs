//! Typed parameter extraction from `serde_json::Value` objects.
//!
//! A missing key (or a JSON `null`) yields the supplied default. A key that
//! is present with the wrong type is an error rather than a silent
//! fallback, so a typo in a model's JSON parameters is reported.

use serde_json::Value;

use crate::error::GridError;

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn lookup<'a>(params: &'a Value, name: &str) -> Option<&'a Value> {
    params.get(name).filter(|v| !v.is_null())
}

fn mismatch(name: &str, expected: &str, got: &Value) -> GridError {
    GridError::invalid(format!(
        "parameter '{name}' expected {expected}, got {}",
        type_name(got)
    ))
}

/// Extracts an `f64` from `params[name]`, or `default` when absent.
///
/// Integers are accepted and converted.
pub fn param_f64(params: &Value, name: &str, default: f64) -> Result<f64, GridError> {
    match lookup(params, name) {
        None => Ok(default),
        Some(v) => v.as_f64().ok_or_else(|| mismatch(name, "number", v)),
    }
}

/// Extracts a required `f64` from `params[name]`.
pub fn require_f64(params: &Value, name: &str) -> Result<f64, GridError> {
    match lookup(params, name) {
        None => Err(GridError::invalid(format!("missing parameter '{name}'"))),
        Some(v) => v.as_f64().ok_or_else(|| mismatch(name, "number", v)),
    }
}

/// Extracts an optional `String` from `params[name]`.
pub fn param_str(params: &Value, name: &str) -> Result<Option<String>, GridError> {
    match lookup(params, name) {
        None => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_owned()))
            .ok_or_else(|| mismatch(name, "string", v)),
    }
}

/// Extracts an optional array of numbers from `params[name]`.
pub fn param_f64_list(params: &Value, name: &str) -> Result<Option<Vec<f64>>, GridError> {
    let Some(v) = lookup(params, name) else {
        return Ok(None);
    };
    let items = v
        .as_array()
        .ok_or_else(|| mismatch(name, "array of numbers", v))?;
    items
        .iter()
        .map(|item| {
            item.as_f64()
                .ok_or_else(|| mismatch(name, "array of numbers", item))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}
