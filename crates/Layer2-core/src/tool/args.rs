//! Argument extraction for tool handlers
//!
//! Models often send numbers as strings; the numeric helpers accept both.

use serde_json::Value;
use triage_foundation::{Error, Result};

pub fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    optional_str(args, key)
        .ok_or_else(|| Error::InvalidInput(format!("missing required argument '{}'", key)))
}

/// Present, string, and not blank
pub fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub fn optional_u64(args: &Value, key: &str) -> Option<u64> {
    match args.get(key)? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
