//! Rollup aggregation semantics.
//!
//! `values` holds one entry per related row: `None` when the row lacks the
//! target column. Defaults over empty input: `count`, `sum`, `unique`,
//! `empty`, `not_empty` give 0; `avg`, `min`, `max`, `median` give null.

use serde_json::{Number, Value};
use std::collections::HashSet;

use crate::schema::Aggregation;

pub fn aggregate(kind: Aggregation, values: &[Option<&Value>]) -> Value {
    match kind {
        Aggregation::Count => Value::from(values.len()),
        Aggregation::Sum => number_value(numbers(values).iter().sum()),
        Aggregation::Avg => {
            let nums = numbers(values);
            if nums.is_empty() {
                Value::Null
            } else {
                number_value(nums.iter().sum::<f64>() / nums.len() as f64)
            }
        }
        Aggregation::Min => numbers(values)
            .into_iter()
            .reduce(f64::min)
            .map_or(Value::Null, number_value),
        Aggregation::Max => numbers(values)
            .into_iter()
            .reduce(f64::max)
            .map_or(Value::Null, number_value),
        Aggregation::Median => median(numbers(values)).map_or(Value::Null, number_value),
        Aggregation::Unique => {
            let distinct: HashSet<String> = values
                .iter()
                .flatten()
                .filter(|v| !v.is_null())
                .map(|v| distinct_key(v))
                .collect();
            Value::from(distinct.len())
        }
        Aggregation::Empty => Value::from(values.iter().filter(|v| is_null(**v)).count()),
        Aggregation::NotEmpty => Value::from(values.iter().filter(|v| !is_null(**v)).count()),
    }
}

/// A missing target column reads as null.
fn is_null(value: Option<&Value>) -> bool {
    value.is_none_or(Value::is_null)
}

/// Numbers compare by value, so `1` and `1.0` are the same entry.
fn distinct_key(value: &Value) -> String {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map_or_else(|| n.to_string(), |f| number_value(f).to_string()),
        other => other.to_string(),
    }
}

/// JSON numbers and numeric strings; everything else is skipped.
pub fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn numbers(values: &[Option<&Value>]) -> Vec<f64> {
    values.iter().flatten().filter_map(|v| as_number(v)).collect()
}

fn median(mut nums: Vec<f64>) -> Option<f64> {
    if nums.is_empty() {
        return None;
    }
    nums.sort_by(f64::total_cmp);
    let mid = nums.len() / 2;
    if nums.len() % 2 == 0 {
        Some((nums[mid - 1] + nums[mid]) / 2.0)
    } else {
        Some(nums[mid])
    }
}

/// Integral results become JSON integers so that `3` written by one run
/// compares equal to `3` computed by the next.
pub fn number_value(n: f64) -> Value {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(kind: Aggregation, values: &[Value]) -> Value {
        let refs: Vec<Option<&Value>> = values.iter().map(Some).collect();
        aggregate(kind, &refs)
    }

    #[test]
    fn count_includes_rows_without_values() {
        let a = json!(1);
        assert_eq!(aggregate(Aggregation::Count, &[Some(&a), None, Some(&Value::Null)]), json!(3));
        assert_eq!(aggregate(Aggregation::Count, &[]), json!(0));
    }

    #[test]
    fn numeric_aggregates_skip_non_numeric() {
        let values = [json!(10), json!("5"), json!("n/a"), json!(true), Value::Null, json!(2.5)];
        assert_eq!(run(Aggregation::Sum, &values), json!(17.5));
        assert_eq!(run(Aggregation::Min, &values), json!(2.5));
        assert_eq!(run(Aggregation::Max, &values), json!(10));
        assert_eq!(run(Aggregation::Median, &values), json!(5));
    }

    #[test]
    fn avg_of_integers_stays_integral_when_exact() {
        assert_eq!(run(Aggregation::Avg, &[json!(2), json!(4)]), json!(3));
        assert_eq!(run(Aggregation::Avg, &[json!(1), json!(2)]), json!(1.5));
    }

    #[test]
    fn median_of_even_count_averages_middles() {
        let values = [json!(7), json!(1), json!(3), json!(5)];
        assert_eq!(run(Aggregation::Median, &values), json!(4));
    }

    #[test]
    fn empty_input_defaults() {
        let none: [Value; 0] = [];
        assert_eq!(run(Aggregation::Sum, &none), json!(0));
        assert_eq!(run(Aggregation::Avg, &none), Value::Null);
        assert_eq!(run(Aggregation::Min, &none), Value::Null);
        assert_eq!(run(Aggregation::Max, &none), Value::Null);
        assert_eq!(run(Aggregation::Median, &none), Value::Null);
        assert_eq!(run(Aggregation::Unique, &none), json!(0));
        assert_eq!(run(Aggregation::Empty, &none), json!(0));
        assert_eq!(run(Aggregation::NotEmpty, &none), json!(0));

        let strings = [json!("a"), json!("b")];
        assert_eq!(run(Aggregation::Sum, &strings), json!(0));
        assert_eq!(run(Aggregation::Avg, &strings), Value::Null);
    }

    #[test]
    fn unique_counts_distinct_non_null_values() {
        let values = [json!("a"), json!("a"), json!("b"), json!(""), Value::Null, json!(1), json!("1")];
        assert_eq!(run(Aggregation::Unique, &values), json!(5));
        assert_eq!(aggregate(Aggregation::Unique, &[None, Some(&Value::Null)]), json!(0));
    }

    #[test]
    fn unique_treats_equal_numbers_as_one_value() {
        let values = [json!(1), json!(1.0), json!(2.5), json!(2.50), json!(-0.0), json!(0)];
        assert_eq!(run(Aggregation::Unique, &values), json!(3));
    }

    #[test]
    fn empty_and_not_empty_split_on_null() {
        let zero = json!(0);
        let blank = json!("");
        let list = json!([]);
        let text = json!("x");
        let values = [None, Some(&Value::Null), Some(&blank), Some(&list), Some(&zero), Some(&text)];
        assert_eq!(aggregate(Aggregation::Empty, &values), json!(2));
        assert_eq!(aggregate(Aggregation::NotEmpty, &values), json!(4));
    }

    #[test]
    fn number_value_keeps_fractions() {
        assert_eq!(number_value(3.0), json!(3));
        assert_eq!(number_value(-0.25), json!(-0.25));
        assert_eq!(number_value(f64::NAN), Value::Null);
    }
}
