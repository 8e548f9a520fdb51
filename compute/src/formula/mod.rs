//! Formula columns: parsing, evaluation against a row and static checks.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::schema::ReturnType;
use crate::store::Document;

mod analysis;
mod eval;
pub mod functions;
mod lexer;
mod parser;
mod value;

pub use analysis::{
    FormulaValidation, dependency_order, extract_column_references, validate_formula,
};
pub use eval::EvalContext;
pub use parser::{Expr, parse};
pub use value::FormulaValue;

#[derive(Debug, Clone, PartialEq)]
pub enum FormulaError {
    Syntax { pos: usize, message: String },
    UnknownFunction(String),
    Arity {
        function: &'static str,
        expected: String,
        got: usize,
    },
    Type(String),
    DivisionByZero,
    InvalidRegex(String),
    /// Formula columns that depend on each other, first column repeated last.
    Cycle(Vec<String>),
}

impl FormulaError {
    pub(crate) fn syntax(pos: usize, message: impl Into<String>) -> Self {
        FormulaError::Syntax {
            pos,
            message: message.into(),
        }
    }
}

impl fmt::Display for FormulaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaError::Syntax { pos, message } => write!(f, "syntax error at {pos}: {message}"),
            FormulaError::UnknownFunction(name) => write!(f, "unknown function: {name}"),
            FormulaError::Arity {
                function,
                expected,
                got,
            } => write!(f, "{function} expects {expected} arguments, got {got}"),
            FormulaError::Type(msg) => write!(f, "type error: {msg}"),
            FormulaError::DivisionByZero => f.write_str("division by zero"),
            FormulaError::InvalidRegex(e) => write!(f, "invalid regular expression: {e}"),
            FormulaError::Cycle(path) => {
                write!(f, "circular dependency between formula columns: {}", path.join(" -> "))
            }
        }
    }
}

impl std::error::Error for FormulaError {}

/// Parse and evaluate `expression` against `row` at time `now`.
pub fn evaluate(
    expression: &str,
    row: &Document,
    now: DateTime<Utc>,
) -> Result<FormulaValue, FormulaError> {
    let expr = parse(expression)?;
    eval::eval(&expr, &EvalContext { row, now })
}

/// Column type a formula produces for `row`. Anything that fails to
/// evaluate counts as text.
pub fn infer_type(expression: &str, row: &Document, now: DateTime<Utc>) -> ReturnType {
    match evaluate(expression, row, now) {
        Ok(FormulaValue::Number(_)) => ReturnType::Number,
        Ok(FormulaValue::Bool(_)) => ReturnType::Boolean,
        Ok(FormulaValue::Date(_)) => ReturnType::Date,
        _ => ReturnType::Text,
    }
}

/// Convert an evaluation result to the column's declared type. Null stays
/// null.
pub fn coerce(value: FormulaValue, target: ReturnType) -> Result<FormulaValue, FormulaError> {
    if value.is_null() {
        return Ok(value);
    }
    match target {
        ReturnType::Number => match &value {
            FormulaValue::Bool(b) => Ok(FormulaValue::Number(if *b { 1.0 } else { 0.0 })),
            FormulaValue::Date(d) => Ok(FormulaValue::Number(d.timestamp_millis() as f64)),
            other => Ok(other.to_number()?.map_or(FormulaValue::Null, FormulaValue::Number)),
        },
        ReturnType::Text => Ok(FormulaValue::Text(value.to_text())),
        ReturnType::Boolean => Ok(FormulaValue::Bool(value.truthy())),
        ReturnType::Date => Ok(value.to_date()?.map_or(FormulaValue::Null, FormulaValue::Date)),
    }
}
