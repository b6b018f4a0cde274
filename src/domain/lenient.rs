//! Permissive field deserializers for quote inputs.
//!
//! Quote inputs arrive from spreadsheets and hand-edited forms, so numeric
//! fields may be JSON numbers, numeric strings, empty strings or garbage.
//! Anything that is not a number is coerced to zero here, at the boundary,
//! and never reaches the arithmetic as a non-numeric value. A real number too
//! large for the decimal range is rejected rather than coerced.

use crate::domain::Decimal;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Marker carried by every range rejection message.
pub const OUT_OF_RANGE: &str = "out of range";

fn parse_text(text: &str) -> Result<Decimal, String> {
    if let Some(d) = Decimal::parse_number(text) {
        return Ok(d);
    }
    match text.trim().parse::<f64>() {
        // Below the smallest representable step.
        Ok(f) if f.is_finite() && f.abs() < 1.0 => Ok(Decimal::zero()),
        Ok(f) if f.is_finite() => Err(format!("number {} is {OUT_OF_RANGE}", text.trim())),
        _ => Ok(Decimal::zero()),
    }
}

/// Read a numeric input: numbers and numeric strings parse, anything else is 0.
///
/// # Errors
/// Returns a message when the value is a real number outside the decimal range.
pub fn parse_amount(value: &Value) -> Result<Decimal, String> {
    match value {
        Value::Number(n) => parse_text(&n.to_string()),
        Value::String(s) => parse_text(s),
        _ => Ok(Decimal::zero()),
    }
}

/// Coerce an arbitrary JSON value into a Decimal (zero when not numeric or
/// out of range).
pub fn value_to_decimal(value: &Value) -> Decimal {
    parse_amount(value).unwrap_or_default()
}

/// Truthiness used for flags: `true`, non-zero numbers and non-empty strings
/// other than "false"/"0" are true.
pub fn value_to_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(_) => !value_to_decimal(value).is_zero(),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty() || s.eq_ignore_ascii_case("false") || s == "0")
        }
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub fn decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_amount(&value).map_err(D::Error::custom)
}

/// Like [`decimal`], but `null` stays `None` so callers can fall back.
pub fn optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(None),
        other => parse_amount(&other).map(Some).map_err(D::Error::custom),
    }
}

pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_flag(&value))
}

/// An `enabled` flag: only an explicit falsy value disables, `null` keeps it on.
pub fn enabled_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(true),
        other => Ok(value_to_flag(&other)),
    }
}

pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}

pub fn line_no<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let n = match &value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    Ok(n.and_then(|n| u32::try_from(n).ok()))
}
