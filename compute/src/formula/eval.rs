use chrono::{DateTime, Duration, Utc};

use crate::store::Document;

use super::FormulaError;
use super::functions::{self, finite};
use super::parser::{BinaryOp, Expr, UnaryOp};
use super::value::FormulaValue;

const DAY_MILLIS: f64 = 86_400_000.0;

/// What an expression is evaluated against: one row and a fixed clock.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub row: &'a Document,
    pub now: DateTime<Utc>,
}

impl<'a> EvalContext<'a> {
    pub fn new(row: &'a Document) -> Self {
        Self {
            row,
            now: Utc::now(),
        }
    }
}

pub fn eval(expr: &Expr, ctx: &EvalContext<'_>) -> Result<FormulaValue, FormulaError> {
    match expr {
        Expr::Number(n) => Ok(FormulaValue::Number(*n)),
        Expr::Text(s) => Ok(FormulaValue::Text(s.clone())),
        Expr::Bool(b) => Ok(FormulaValue::Bool(*b)),
        Expr::Null => Ok(FormulaValue::Null),
        Expr::Column(name) => Ok(ctx
            .row
            .get(name)
            .map_or(FormulaValue::Null, FormulaValue::from_json)),
        Expr::Unary(op, operand) => {
            let value = eval(operand, ctx)?;
            match op {
                UnaryOp::Not => Ok(FormulaValue::Bool(!value.truthy())),
                UnaryOp::Neg => match value.to_number()? {
                    Some(n) => Ok(FormulaValue::Number(-n)),
                    None => Ok(FormulaValue::Null),
                },
            }
        }
        Expr::Binary(op, lhs, rhs) => binary(*op, eval(lhs, ctx)?, eval(rhs, ctx)?),
        Expr::Call { name, args } => {
            let spec = functions::lookup(name)
                .ok_or_else(|| FormulaError::UnknownFunction(name.clone()))?;
            spec.check_arity(args.len())?;
            match spec.name {
                "if" => {
                    if eval(&args[0], ctx)?.truthy() {
                        eval(&args[1], ctx)
                    } else {
                        args.get(2).map_or(Ok(FormulaValue::Null), |e| eval(e, ctx))
                    }
                }
                "and" => {
                    for arg in args {
                        if !eval(arg, ctx)?.truthy() {
                            return Ok(FormulaValue::Bool(false));
                        }
                    }
                    Ok(FormulaValue::Bool(true))
                }
                "or" => {
                    for arg in args {
                        if eval(arg, ctx)?.truthy() {
                            return Ok(FormulaValue::Bool(true));
                        }
                    }
                    Ok(FormulaValue::Bool(false))
                }
                _ => {
                    let values = args
                        .iter()
                        .map(|a| eval(a, ctx))
                        .collect::<Result<Vec<_>, _>>()?;
                    functions::call(spec, values, ctx)
                }
            }
        }
    }
}

fn binary(op: BinaryOp, lhs: FormulaValue, rhs: FormulaValue) -> Result<FormulaValue, FormulaError> {
    use FormulaValue::{Date, Null, Number, Text};

    match op {
        BinaryOp::Eq => return Ok(FormulaValue::Bool(lhs == rhs)),
        BinaryOp::NotEq => return Ok(FormulaValue::Bool(lhs != rhs)),
        _ => {}
    }
    if lhs.is_null() || rhs.is_null() {
        return Ok(Null);
    }

    match op {
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ord = lhs.compare(&rhs).ok_or_else(|| {
                FormulaError::Type(format!(
                    "cannot compare {} with {}",
                    lhs.type_name(),
                    rhs.type_name()
                ))
            })?;
            Ok(FormulaValue::Bool(match op {
                BinaryOp::Lt => ord.is_lt(),
                BinaryOp::LtEq => ord.is_le(),
                BinaryOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            }))
        }
        BinaryOp::Add => match (&lhs, &rhs) {
            (Date(d), Number(days)) | (Number(days), Date(d)) => shift_days(d, *days),
            (Text(_), _) | (_, Text(_)) => Ok(Text(lhs.to_text() + &rhs.to_text())),
            _ => arithmetic(op, &lhs, &rhs),
        },
        BinaryOp::Sub => match (&lhs, &rhs) {
            (Date(a), Date(b)) => finite((*a - *b).num_milliseconds() as f64 / DAY_MILLIS),
            (Date(d), Number(days)) => shift_days(d, -days),
            _ => arithmetic(op, &lhs, &rhs),
        },
        _ => arithmetic(op, &lhs, &rhs),
    }
}

fn arithmetic(op: BinaryOp, lhs: &FormulaValue, rhs: &FormulaValue) -> Result<FormulaValue, FormulaError> {
    let (Some(a), Some(b)) = (lhs.to_number()?, rhs.to_number()?) else {
        return Ok(FormulaValue::Null);
    };
    match op {
        BinaryOp::Add => finite(a + b),
        BinaryOp::Sub => finite(a - b),
        BinaryOp::Mul => finite(a * b),
        BinaryOp::Div | BinaryOp::Mod if b == 0.0 => Err(FormulaError::DivisionByZero),
        BinaryOp::Div => finite(a / b),
        BinaryOp::Mod => finite(a % b),
        BinaryOp::Pow => finite(a.powf(b)),
        _ => Err(FormulaError::Type("not an arithmetic operator".to_string())),
    }
}

fn shift_days(date: &DateTime<Utc>, days: f64) -> Result<FormulaValue, FormulaError> {
    Duration::try_milliseconds((days * DAY_MILLIS).round() as i64)
        .and_then(|delta| date.checked_add_signed(delta))
        .map(FormulaValue::Date)
        .ok_or_else(|| FormulaError::Type("date out of range".to_string()))
}
