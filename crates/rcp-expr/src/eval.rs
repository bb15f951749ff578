//! Evaluator for the parsed `when`/`skip_if` AST. Total by construction —
//! spec §4.6.a requires "no exceptions"; every node produces a `Value`,
//! falling back to sensible coercions instead of erroring at runtime (a
//! malformed expression is caught once, at parse time, per §4.1).

use std::cmp::Ordering;

use rcp_core::{Value, VariableMap};

use crate::ast::{BinOp, Expr, UnOp};

/// Evaluate `expr` against `variables`, returning its raw `Value`.
pub fn eval(expr: &Expr, variables: &VariableMap) -> Value {
    match expr {
        Expr::Literal(v) => v.clone(),
        Expr::Array(items) => Value::Array(items.iter().map(|e| eval(e, variables)).collect()),
        Expr::Ident(name) => variables.get(name).cloned().unwrap_or(Value::Null),
        Expr::Unary(UnOp::Not, inner) => Value::Bool(!eval(inner, variables).is_truthy()),
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, variables),
        Expr::Call(name, args) => eval_call(name, args, variables),
    }
}

/// Evaluate `expr` as a boolean (the shape `when`/`skip_if` actually need).
pub fn eval_bool(expr: &Expr, variables: &VariableMap) -> bool {
    eval(expr, variables).is_truthy()
}

fn eval_binary(op: BinOp, lhs: &Expr, rhs: &Expr, variables: &VariableMap) -> Value {
    match op {
        BinOp::And => Value::Bool(eval_bool(lhs, variables) && eval_bool(rhs, variables)),
        BinOp::Or => Value::Bool(eval_bool(lhs, variables) || eval_bool(rhs, variables)),
        _ => {
            let l = eval(lhs, variables);
            let r = eval(rhs, variables);
            match op {
                BinOp::Eq => Value::Bool(values_equal(&l, &r)),
                BinOp::NotEq => Value::Bool(!values_equal(&l, &r)),
                BinOp::Gt => Value::Bool(compare(&l, &r) == Some(Ordering::Greater)),
                BinOp::Lt => Value::Bool(compare(&l, &r) == Some(Ordering::Less)),
                BinOp::GtEq => Value::Bool(matches!(
                    compare(&l, &r),
                    Some(Ordering::Greater) | Some(Ordering::Equal)
                )),
                BinOp::LtEq => Value::Bool(matches!(compare(&l, &r), Some(Ordering::Less) | Some(Ordering::Equal))),
                BinOp::In => Value::Bool(membership(&l, &r)),
                BinOp::Add => add(&l, &r),
                BinOp::And | BinOp::Or => unreachable!("handled above"),
            }
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Null, Value::Null) => true,
        (Value::Array(x), Value::Array(y)) => x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b)),
        _ => a.render() == b.render(),
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn membership(needle: &Value, haystack: &Value) -> bool {
    match haystack {
        Value::Array(items) => items.iter().any(|item| values_equal(needle, item)),
        Value::String(s) => needle.as_str().map(|n| s.contains(n)).unwrap_or(false),
        _ => false,
    }
}

fn add(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Value::Number(x + y),
        (Value::String(_), _) | (_, Value::String(_)) => Value::String(format!("{}{}", a.render(), b.render())),
        _ => Value::Null,
    }
}

fn eval_call(name: &str, args: &[Expr], variables: &VariableMap) -> Value {
    let values: Vec<Value> = args.iter().map(|a| eval(a, variables)).collect();
    match name {
        "length" => Value::Number(match values.first() {
            Some(Value::Array(items)) => items.len() as f64,
            Some(Value::String(s)) => s.chars().count() as f64,
            Some(Value::Object(map)) => map.len() as f64,
            _ => 0.0,
        }),
        "empty" => Value::Bool(match values.first() {
            Some(v) => !v.is_truthy(),
            None => true,
        }),
        "startsWith" => Value::Bool(match (values.first(), values.get(1)) {
            (Some(Value::String(s)), Some(Value::String(p))) => s.starts_with(p.as_str()),
            _ => false,
        }),
        "endsWith" => Value::Bool(match (values.first(), values.get(1)) {
            (Some(Value::String(s)), Some(Value::String(p))) => s.ends_with(p.as_str()),
            _ => false,
        }),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use rcp_core::Provenance;

    fn vars(pairs: &[(&str, Value)]) -> VariableMap {
        let mut map = VariableMap::new();
        for (name, value) in pairs {
            map.insert(*name, value.clone(), Provenance::Default);
        }
        map
    }

    #[test]
    fn evaluates_membership_against_array_literal() {
        let expr = parse(r#"role in ["admin", "owner"]"#).unwrap();
        let variables = vars(&[("role", Value::from("owner"))]);
        assert!(eval_bool(&expr, &variables));
        let variables = vars(&[("role", Value::from("guest"))]);
        assert!(!eval_bool(&expr, &variables));
    }

    #[test]
    fn evaluates_numeric_and_string_comparisons() {
        let variables = vars(&[("count", Value::Number(3.0))]);
        assert!(eval_bool(&parse("count > 2").unwrap(), &variables));
        assert!(!eval_bool(&parse("count > 10").unwrap(), &variables));
    }

    #[test]
    fn evaluates_whitelisted_functions() {
        let variables = vars(&[("name", Value::from("UserService"))]);
        assert!(eval_bool(&parse(r#"startsWith(name, "User")"#).unwrap(), &variables));
        assert!(eval_bool(&parse(r#"endsWith(name, "Service")"#).unwrap(), &variables));
        assert!(!eval_bool(&parse("empty(name)").unwrap(), &variables));
    }

    #[test]
    fn unknown_identifier_evaluates_to_null_not_panic() {
        let variables = vars(&[]);
        assert!(!eval_bool(&parse("missing == true").unwrap(), &variables));
    }

    #[test]
    fn string_concatenation_via_plus() {
        let variables = vars(&[("name", Value::from("Button"))]);
        let value = eval(&parse(r#"name + ".tsx""#).unwrap(), &variables);
        assert_eq!(value.render(), "Button.tsx");
    }
}
