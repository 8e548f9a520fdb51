use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

use crate::compute::aggregate::number_value;

use super::FormulaError;

/// A value flowing through formula evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Null,
    Number(f64),
    Text(String),
    Bool(bool),
    Date(DateTime<Utc>),
}

impl FormulaValue {
    /// Row fields as formula values. Arrays read as their items joined with
    /// `", "`, objects as their JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => FormulaValue::Null,
            Value::Bool(b) => FormulaValue::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(FormulaValue::Null, FormulaValue::Number),
            Value::String(s) => FormulaValue::Text(s.clone()),
            Value::Array(items) => FormulaValue::Text(
                items
                    .iter()
                    .map(|v| FormulaValue::from_json(v).to_text())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            Value::Object(_) => FormulaValue::Text(value.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FormulaValue::Null => Value::Null,
            FormulaValue::Number(n) => number_value(*n),
            FormulaValue::Text(s) => Value::String(s.clone()),
            FormulaValue::Bool(b) => Value::Bool(*b),
            FormulaValue::Date(d) => Value::String(format_iso(d)),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FormulaValue::Null => "null",
            FormulaValue::Number(_) => "number",
            FormulaValue::Text(_) => "text",
            FormulaValue::Bool(_) => "boolean",
            FormulaValue::Date(_) => "date",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FormulaValue::Null)
    }

    pub fn truthy(&self) -> bool {
        match self {
            FormulaValue::Null => false,
            FormulaValue::Number(n) => *n != 0.0 && !n.is_nan(),
            FormulaValue::Text(s) => !s.is_empty(),
            FormulaValue::Bool(b) => *b,
            FormulaValue::Date(_) => true,
        }
    }

    /// Text rendering used by concatenation and text functions. Null renders
    /// as the empty string.
    pub fn to_text(&self) -> String {
        match self {
            FormulaValue::Null => String::new(),
            FormulaValue::Number(n) => format_number(*n),
            FormulaValue::Text(s) => s.clone(),
            FormulaValue::Bool(b) => b.to_string(),
            FormulaValue::Date(d) => format_iso(d),
        }
    }

    /// Numeric view: numbers and numeric strings. `None` for null.
    pub fn to_number(&self) -> Result<Option<f64>, FormulaError> {
        match self {
            FormulaValue::Null => Ok(None),
            FormulaValue::Number(n) => Ok(Some(*n)),
            FormulaValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Some)
                .ok_or_else(|| FormulaError::Type(format!("\"{s}\" is not a number"))),
            other => Err(FormulaError::Type(format!(
                "expected a number, got {}",
                other.type_name()
            ))),
        }
    }

    /// Date view: dates, ISO-8601 strings and epoch milliseconds.
    pub fn to_date(&self) -> Result<Option<DateTime<Utc>>, FormulaError> {
        match self {
            FormulaValue::Null => Ok(None),
            FormulaValue::Date(d) => Ok(Some(*d)),
            FormulaValue::Text(s) => parse_date(s)
                .map(Some)
                .ok_or_else(|| FormulaError::Type(format!("\"{s}\" is not a date"))),
            FormulaValue::Number(ms) => Utc
                .timestamp_millis_opt(*ms as i64)
                .single()
                .map(Some)
                .ok_or_else(|| FormulaError::Type(format!("{ms} is out of the date range"))),
            FormulaValue::Bool(_) => Err(FormulaError::Type(
                "expected a date, got boolean".to_string(),
            )),
        }
    }

    /// Ordering between values of the same kind; `None` for mixed kinds.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (FormulaValue::Number(a), FormulaValue::Number(b)) => a.partial_cmp(b),
            (FormulaValue::Text(a), FormulaValue::Text(b)) => Some(a.cmp(b)),
            (FormulaValue::Bool(a), FormulaValue::Bool(b)) => Some(a.cmp(b)),
            (FormulaValue::Date(a), FormulaValue::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for FormulaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaValue::Null => f.write_str("null"),
            other => f.write_str(&other.to_text()),
        }
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn format_iso(d: &DateTime<Utc>) -> String {
    d.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// RFC 3339 timestamps, naive `YYYY-MM-DD[ HH:MM[:SS]]` (read as UTC) and
/// plain dates.
pub(crate) fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
