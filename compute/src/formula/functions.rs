//! Built-in formula functions. Names match case-insensitively.

use chrono::{DateTime, Datelike, Duration, Months, NaiveTime, Timelike, Utc};
use regex::RegexBuilder;
use serde::Serialize;

use super::FormulaError;
use super::eval::EvalContext;
use super::value::FormulaValue;

/// Compiled-size cap for `replace()` patterns.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Math,
    Text,
    Date,
    Logical,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub category: Category,
    pub min_args: usize,
    /// `None` for variadic functions.
    pub max_args: Option<usize>,
    pub signature: &'static str,
    pub description: &'static str,
}

impl FunctionSpec {
    pub fn check_arity(&self, got: usize) -> Result<(), FormulaError> {
        let fits = got >= self.min_args && self.max_args.is_none_or(|max| got <= max);
        if fits {
            return Ok(());
        }
        let expected = match self.max_args {
            None => format!("at least {}", self.min_args),
            Some(max) if max == self.min_args => max.to_string(),
            Some(max) => format!("{} to {}", self.min_args, max),
        };
        Err(FormulaError::Arity {
            function: self.name,
            expected,
            got,
        })
    }
}

const fn spec(
    name: &'static str,
    category: Category,
    min_args: usize,
    max_args: Option<usize>,
    signature: &'static str,
    description: &'static str,
) -> FunctionSpec {
    FunctionSpec {
        name,
        category,
        min_args,
        max_args,
        signature,
        description,
    }
}

use Category::{Date, Logical, Math, Text};

pub static FUNCTIONS: &[FunctionSpec] = &[
    spec("abs", Math, 1, Some(1), "abs(number)", "Absolute value"),
    spec("ceil", Math, 1, Some(1), "ceil(number)", "Round up to an integer"),
    spec("floor", Math, 1, Some(1), "floor(number)", "Round down to an integer"),
    spec("round", Math, 1, Some(2), "round(number, digits?)", "Round to the given number of decimals"),
    spec("sqrt", Math, 1, Some(1), "sqrt(number)", "Square root"),
    spec("pow", Math, 2, Some(2), "pow(base, exponent)", "Raise base to a power"),
    spec("min", Math, 1, None, "min(number, ...)", "Smallest argument"),
    spec("max", Math, 1, None, "max(number, ...)", "Largest argument"),
    spec("sum", Math, 1, None, "sum(number, ...)", "Sum of the arguments"),
    spec("avg", Math, 1, None, "avg(number, ...)", "Mean of the arguments"),
    spec("upper", Text, 1, Some(1), "upper(text)", "Upper-case text"),
    spec("lower", Text, 1, Some(1), "lower(text)", "Lower-case text"),
    spec("trim", Text, 1, Some(1), "trim(text)", "Strip surrounding whitespace"),
    spec("concat", Text, 1, None, "concat(value, ...)", "Join values as text"),
    spec("substring", Text, 2, Some(3), "substring(text, start, end?)", "Characters from start up to end"),
    spec("replace", Text, 3, Some(3), "replace(text, pattern, replacement)", "Replace every regex match"),
    spec("length", Text, 1, Some(1), "length(text)", "Number of characters"),
    spec("now", Date, 0, Some(0), "now()", "Current date and time"),
    spec("today", Date, 0, Some(0), "today()", "Current date at midnight UTC"),
    spec("year", Date, 1, Some(1), "year(date)", "Year of a date"),
    spec("month", Date, 1, Some(1), "month(date)", "Month of a date, 1-12"),
    spec("day", Date, 1, Some(1), "day(date)", "Day of the month"),
    spec("hour", Date, 1, Some(1), "hour(date)", "Hour of the day"),
    spec("minute", Date, 1, Some(1), "minute(date)", "Minute of the hour"),
    spec("dateAdd", Date, 2, Some(3), "dateAdd(date, amount, unit?)", "Shift a date; unit defaults to days"),
    spec("dateDiff", Date, 2, Some(3), "dateDiff(date1, date2, unit?)", "Whole units from date2 to date1"),
    spec("formatDate", Date, 2, Some(2), "formatDate(date, format)", "Format with YYYY MM DD HH mm ss"),
    spec("if", Logical, 2, Some(3), "if(condition, then, else?)", "Pick a branch"),
    spec("and", Logical, 1, None, "and(value, ...)", "True when every argument is truthy"),
    spec("or", Logical, 1, None, "or(value, ...)", "True when any argument is truthy"),
    spec("not", Logical, 1, Some(1), "not(value)", "Logical negation"),
    spec("isNull", Logical, 1, Some(1), "isNull(value)", "True for null or missing values"),
    spec("isEmpty", Logical, 1, Some(1), "isEmpty(value)", "True for null or empty text"),
];

pub fn lookup(name: &str) -> Option<&'static FunctionSpec> {
    FUNCTIONS.iter().find(|f| f.name.eq_ignore_ascii_case(name))
}

/// Apply an eagerly evaluated function. Arity is already checked.
pub(super) fn call(
    spec: &FunctionSpec,
    args: Vec<FormulaValue>,
    ctx: &EvalContext<'_>,
) -> Result<FormulaValue, FormulaError> {
    match spec.name {
        "abs" => unary_math(&args[0], f64::abs),
        "ceil" => unary_math(&args[0], f64::ceil),
        "floor" => unary_math(&args[0], f64::floor),
        "sqrt" => unary_math(&args[0], f64::sqrt),
        "round" => {
            let digits = match args.get(1) {
                Some(d) => d.to_number()?.unwrap_or(0.0).trunc() as i32,
                None => 0,
            };
            let factor = 10f64.powi(digits);
            unary_math(&args[0], |n| (n * factor).round() / factor)
        }
        "pow" => match (args[0].to_number()?, args[1].to_number()?) {
            (Some(base), Some(exp)) => finite(base.powf(exp)),
            _ => Ok(FormulaValue::Null),
        },
        "min" => Ok(numbers(&args)?
            .into_iter()
            .reduce(f64::min)
            .map_or(FormulaValue::Null, FormulaValue::Number)),
        "max" => Ok(numbers(&args)?
            .into_iter()
            .reduce(f64::max)
            .map_or(FormulaValue::Null, FormulaValue::Number)),
        "sum" => finite(numbers(&args)?.iter().sum()),
        "avg" => {
            let nums = numbers(&args)?;
            if nums.is_empty() {
                Ok(FormulaValue::Null)
            } else {
                finite(nums.iter().sum::<f64>() / nums.len() as f64)
            }
        }

        "upper" => map_text(&args[0], |s| s.to_uppercase()),
        "lower" => map_text(&args[0], |s| s.to_lowercase()),
        "trim" => map_text(&args[0], |s| s.trim().to_string()),
        "concat" => Ok(FormulaValue::Text(
            args.iter().map(FormulaValue::to_text).collect(),
        )),
        "substring" => substring(&args),
        "replace" => replace(&args),
        "length" => Ok(FormulaValue::Number(args[0].to_text().chars().count() as f64)),

        "now" => Ok(FormulaValue::Date(ctx.now)),
        "today" => Ok(FormulaValue::Date(
            ctx.now.date_naive().and_time(NaiveTime::MIN).and_utc(),
        )),
        "year" => date_part(&args[0], |d| d.year() as f64),
        "month" => date_part(&args[0], |d| d.month() as f64),
        "day" => date_part(&args[0], |d| d.day() as f64),
        "hour" => date_part(&args[0], |d| d.hour() as f64),
        "minute" => date_part(&args[0], |d| d.minute() as f64),
        "dateAdd" => date_add(&args),
        "dateDiff" => date_diff(&args),
        "formatDate" => match args[0].to_date()? {
            Some(d) => Ok(FormulaValue::Text(format_date(&d, &args[1].to_text()))),
            None => Ok(FormulaValue::Null),
        },

        "not" => Ok(FormulaValue::Bool(!args[0].truthy())),
        "isNull" => Ok(FormulaValue::Bool(args[0].is_null())),
        "isEmpty" => Ok(FormulaValue::Bool(match &args[0] {
            FormulaValue::Null => true,
            FormulaValue::Text(s) => s.is_empty(),
            _ => false,
        })),

        other => Err(FormulaError::UnknownFunction(other.to_string())),
    }
}

pub(super) fn finite(n: f64) -> Result<FormulaValue, FormulaError> {
    if n.is_finite() {
        Ok(FormulaValue::Number(n))
    } else {
        Err(FormulaError::Type("result is not a finite number".to_string()))
    }
}

fn unary_math(arg: &FormulaValue, f: impl Fn(f64) -> f64) -> Result<FormulaValue, FormulaError> {
    match arg.to_number()? {
        Some(n) => finite(f(n)),
        None => Ok(FormulaValue::Null),
    }
}

/// Numeric arguments of a variadic call; nulls are skipped.
fn numbers(args: &[FormulaValue]) -> Result<Vec<f64>, FormulaError> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        if let Some(n) = arg.to_number()? {
            out.push(n);
        }
    }
    Ok(out)
}

fn map_text(arg: &FormulaValue, f: impl Fn(&str) -> String) -> Result<FormulaValue, FormulaError> {
    if arg.is_null() {
        return Ok(FormulaValue::Null);
    }
    Ok(FormulaValue::Text(f(&arg.to_text())))
}

/// Character offsets, clamped to the text; swapped when start > end.
fn substring(args: &[FormulaValue]) -> Result<FormulaValue, FormulaError> {
    if args[0].is_null() {
        return Ok(FormulaValue::Null);
    }
    let chars: Vec<char> = args[0].to_text().chars().collect();
    let clamp = |n: f64| (n.trunc().max(0.0) as usize).min(chars.len());

    let start = clamp(args[1].to_number()?.unwrap_or(0.0));
    let end = match args.get(2) {
        Some(v) => v.to_number()?.map_or(chars.len(), clamp),
        None => chars.len(),
    };
    let (start, end) = if start > end { (end, start) } else { (start, end) };
    Ok(FormulaValue::Text(chars[start..end].iter().collect()))
}

fn replace(args: &[FormulaValue]) -> Result<FormulaValue, FormulaError> {
    if args[0].is_null() {
        return Ok(FormulaValue::Null);
    }
    let pattern = args[1].to_text();
    let re = RegexBuilder::new(&pattern)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| FormulaError::InvalidRegex(e.to_string()))?;
    let replacement = args[2].to_text();
    Ok(FormulaValue::Text(
        re.replace_all(&args[0].to_text(), replacement.as_str())
            .into_owned(),
    ))
}

fn date_part(
    arg: &FormulaValue,
    f: impl Fn(&DateTime<Utc>) -> f64,
) -> Result<FormulaValue, FormulaError> {
    Ok(arg
        .to_date()?
        .map_or(FormulaValue::Null, |d| FormulaValue::Number(f(&d))))
}

fn unit_arg(args: &[FormulaValue], index: usize) -> String {
    args.get(index)
        .filter(|v| !v.is_null())
        .map_or_else(|| "days".to_string(), |v| v.to_text().to_ascii_lowercase())
}

fn unit_millis(unit: &str) -> Result<f64, FormulaError> {
    Ok(match unit {
        "weeks" | "week" => 7.0 * 86_400_000.0,
        "days" | "day" => 86_400_000.0,
        "hours" | "hour" => 3_600_000.0,
        "minutes" | "minute" => 60_000.0,
        "seconds" | "second" => 1_000.0,
        other => return Err(FormulaError::Type(format!("unknown date unit '{other}'"))),
    })
}

fn date_add(args: &[FormulaValue]) -> Result<FormulaValue, FormulaError> {
    let (Some(date), Some(amount)) = (args[0].to_date()?, args[1].to_number()?) else {
        return Ok(FormulaValue::Null);
    };
    let unit = unit_arg(args, 2);
    let shifted = match unit.as_str() {
        "months" | "month" | "years" | "year" => {
            let factor = if unit.starts_with("year") { 12.0 } else { 1.0 };
            let months = (amount.trunc() * factor) as i64;
            let delta = Months::new(months.unsigned_abs().min(u32::MAX as u64) as u32);
            if months >= 0 {
                date.checked_add_months(delta)
            } else {
                date.checked_sub_months(delta)
            }
        }
        _ => {
            let millis = (amount * unit_millis(&unit)?).round() as i64;
            Duration::try_milliseconds(millis).and_then(|d| date.checked_add_signed(d))
        }
    };
    shifted
        .map(FormulaValue::Date)
        .ok_or_else(|| FormulaError::Type("date out of range".to_string()))
}

fn date_diff(args: &[FormulaValue]) -> Result<FormulaValue, FormulaError> {
    let (Some(a), Some(b)) = (args[0].to_date()?, args[1].to_date()?) else {
        return Ok(FormulaValue::Null);
    };
    let unit = unit_millis(&unit_arg(args, 2))?;
    let diff = (a - b).num_milliseconds() as f64;
    Ok(FormulaValue::Number((diff / unit).floor()))
}

/// Expand `YYYY MM DD HH mm ss`; everything else is copied through.
fn format_date(date: &DateTime<Utc>, format: &str) -> String {
    let mut out = String::with_capacity(format.len() + 8);
    let mut rest = format;
    while !rest.is_empty() {
        let token = [
            ("YYYY", format!("{:04}", date.year())),
            ("MM", format!("{:02}", date.month())),
            ("DD", format!("{:02}", date.day())),
            ("HH", format!("{:02}", date.hour())),
            ("mm", format!("{:02}", date.minute())),
            ("ss", format!("{:02}", date.second())),
        ]
        .into_iter()
        .find(|(pat, _)| rest.starts_with(pat));

        match token {
            Some((pat, value)) => {
                out.push_str(&value);
                rest = &rest[pat.len()..];
            }
            None => {
                let mut chars = rest.chars();
                if let Some(c) = chars.next() {
                    out.push(c);
                }
                rest = chars.as_str();
            }
        }
    }
    out
}
