use serde::Serialize;
use std::collections::HashMap;

use crate::schema::FormulaConfig;

use super::FormulaError;
use super::functions;
use super::parser::{Expr, parse};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormulaValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Static checks on a formula column definition. `known_columns`, when
/// given, are the columns the expression may reference.
pub fn validate_formula(config: &FormulaConfig, known_columns: Option<&[String]>) -> FormulaValidation {
    let mut errors = Vec::new();
    let expression = config.expression.trim();

    if expression.is_empty() {
        errors.push("Formula expression cannot be empty".to_string());
    }
    if config.return_type.is_none() {
        errors.push("Return type is not specified".to_string());
    }

    if !expression.is_empty() {
        match parse(expression) {
            Err(e) => errors.push(format!("Parse error: {e}")),
            Ok(expr) => {
                check_calls(&expr, &mut errors);
                let used = references(&expr);

                if !config.dependencies.is_empty() {
                    let unused: Vec<&str> = config
                        .dependencies
                        .iter()
                        .filter(|d| !used.contains(d))
                        .map(String::as_str)
                        .collect();
                    if !unused.is_empty() {
                        errors.push(format!("Unused dependencies: {}", unused.join(", ")));
                    }
                    let missing: Vec<&str> = used
                        .iter()
                        .filter(|c| !config.dependencies.contains(c))
                        .map(String::as_str)
                        .collect();
                    if !missing.is_empty() {
                        errors.push(format!("Missing dependencies: {}", missing.join(", ")));
                    }
                }

                if let Some(known) = known_columns {
                    for column in used.iter().filter(|c| !known.contains(c)) {
                        errors.push(format!("Unknown column: {column}"));
                    }
                }
            }
        }
    }

    FormulaValidation {
        is_valid: errors.is_empty(),
        errors,
    }
}

fn check_calls(expr: &Expr, errors: &mut Vec<String>) {
    expr.walk(&mut |node| {
        if let Expr::Call { name, args } = node {
            match functions::lookup(name) {
                None => errors.push(format!("Unknown function: {name}")),
                Some(spec) => {
                    if let Err(e) = spec.check_arity(args.len()) {
                        errors.push(e.to_string());
                    }
                }
            }
        }
    });
}

/// Distinct column names an expression reads, in order of first use.
pub fn extract_column_references(expression: &str) -> Result<Vec<String>, FormulaError> {
    Ok(references(&parse(expression)?))
}

fn references(expr: &Expr) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    expr.walk(&mut |node| {
        if let Expr::Column(name) = node
            && !columns.contains(name)
        {
            columns.push(name.clone());
        }
    });
    columns
}

/// Order formula columns so that every column comes after the formula
/// columns it reads. `formulas` is `(column name, expression)`; references
/// to non-formula columns are ignored.
pub fn dependency_order(formulas: &[(String, String)]) -> Result<Vec<String>, FormulaError> {
    let mut deps: HashMap<&str, Vec<String>> = HashMap::with_capacity(formulas.len());
    for (name, expression) in formulas {
        deps.insert(name.as_str(), extract_column_references(expression)?);
    }

    let mut order = Vec::with_capacity(formulas.len());
    let mut state: HashMap<&str, Mark> = HashMap::new();
    let mut path: Vec<&str> = Vec::new();
    for (name, _) in formulas {
        visit(name, &deps, &mut state, &mut path, &mut order)?;
    }
    Ok(order)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

fn visit<'a>(
    name: &'a str,
    deps: &'a HashMap<&'a str, Vec<String>>,
    state: &mut HashMap<&'a str, Mark>,
    path: &mut Vec<&'a str>,
    order: &mut Vec<String>,
) -> Result<(), FormulaError> {
    match state.get(name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = path.iter().position(|n| *n == name).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
            cycle.push(name.to_string());
            return Err(FormulaError::Cycle(cycle));
        }
        None => {}
    }

    state.insert(name, Mark::Visiting);
    path.push(name);
    for dep in deps.get(name).into_iter().flatten() {
        if let Some((key, _)) = deps.get_key_value(dep.as_str()) {
            visit(key, deps, state, path, order)?;
        }
    }
    path.pop();
    state.insert(name, Mark::Done);
    order.push(name.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ReturnType;

    fn config(expression: &str, deps: &[&str]) -> FormulaConfig {
        FormulaConfig {
            expression: expression.to_string(),
            return_type: Some(ReturnType::Number),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(n, e)| (n.to_string(), e.to_string()))
            .collect()
    }

    #[test]
    fn valid_formula_passes() {
        let result = validate_formula(&config("price * {tax rate}", &["price", "tax rate"]), None);
        assert_eq!(
            result,
            FormulaValidation {
                is_valid: true,
                errors: vec![]
            }
        );
    }

    #[test]
    fn empty_expression_and_missing_return_type() {
        let mut cfg = config("  ", &[]);
        cfg.return_type = None;
        let result = validate_formula(&cfg, None);
        assert!(!result.is_valid);
        assert_eq!(
            result.errors,
            vec![
                "Formula expression cannot be empty".to_string(),
                "Return type is not specified".to_string(),
            ]
        );
    }

    #[test]
    fn dependency_mismatches_are_listed() {
        let result = validate_formula(&config("a + b", &["a", "c"]), None);
        assert_eq!(
            result.errors,
            vec!["Unused dependencies: c".to_string(), "Missing dependencies: b".to_string()]
        );
    }

    #[test]
    fn unknown_functions_columns_and_arity() {
        let known = vec!["price".to_string()];
        let result = validate_formula(&config("vlookup(price) + pow(cost)", &[]), Some(&known));
        assert_eq!(
            result.errors,
            vec![
                "Unknown function: vlookup".to_string(),
                "pow expects 2 arguments, got 1".to_string(),
                "Unknown column: cost".to_string(),
            ]
        );
    }

    #[test]
    fn parse_errors_are_reported() {
        let result = validate_formula(&config("1 +", &[]), None);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Parse error: syntax error"));
    }

    #[test]
    fn references_are_distinct_and_ordered() {
        assert_eq!(
            extract_column_references("b + a * if(b > 0, {c d}, a)").unwrap(),
            vec!["b".to_string(), "a".to_string(), "c d".to_string()]
        );
        assert!(extract_column_references("sum(1, 2)").unwrap().is_empty());
    }

    #[test]
    fn dependencies_come_first() {
        let order = dependency_order(&pairs(&[
            ("total", "subtotal + tax"),
            ("tax", "subtotal * 0.2"),
            ("subtotal", "price * qty"),
        ]))
        .unwrap();
        assert_eq!(order, ["subtotal", "tax", "total"]);
    }

    #[test]
    fn cycles_are_named() {
        let err = dependency_order(&pairs(&[("a", "b + 1"), ("b", "c * 2"), ("c", "a")])).unwrap_err();
        assert_eq!(err, FormulaError::Cycle(vec!["a".into(), "b".into(), "c".into(), "a".into()]));
        assert_eq!(
            err.to_string(),
            "circular dependency between formula columns: a -> b -> c -> a"
        );

        let err = dependency_order(&pairs(&[("x", "x + 1")])).unwrap_err();
        assert_eq!(err, FormulaError::Cycle(vec!["x".into(), "x".into()]));
    }
}
