//! Tree-walking evaluator
//!
//! Values are plain JSON. The only names reachable are the bound
//! placeholder paths; nothing else is in scope.

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

use super::ExpressionError;
use super::parser::{BinaryOp, Expr, LogicalOp, UnaryOp};

/// Largest integer magnitude that round-trips through `f64`
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Resolved placeholder paths, keyed by the raw path text
pub type Bindings = HashMap<String, Value>;

type EvalResult = Result<Value, ExpressionError>;

/// Evaluate a parsed expression against a binding set
pub fn evaluate(expr: &Expr, bindings: &Bindings) -> EvalResult {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Placeholder(path) => Ok(bindings.get(path).cloned().unwrap_or(Value::Null)),
        Expr::Identifier(name) => resolve_chain(&[name.as_str()], bindings),
        Expr::Member { object, property } => match identifier_chain(expr) {
            Some(segments) => resolve_chain(&segments, bindings),
            None => member(&evaluate(object, bindings)?, property),
        },
        Expr::Index { object, index } => {
            let object = evaluate(object, bindings)?;
            let index = evaluate(index, bindings)?;
            index_value(&object, &index)
        }
        Expr::Array(items) => items
            .iter()
            .map(|item| evaluate(item, bindings))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Unary { op, operand } => {
            let operand = evaluate(operand, bindings)?;
            unary(*op, &operand)
        }
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, bindings)?;
            let right = evaluate(right, bindings)?;
            binary(*op, &left, &right)
        }
        Expr::Logical { op, left, right } => {
            let left = evaluate(left, bindings)?;
            let short_circuit = match op {
                LogicalOp::And => !truthy(&left),
                LogicalOp::Or => truthy(&left),
                LogicalOp::Coalesce => !left.is_null(),
            };
            if short_circuit {
                Ok(left)
            } else {
                evaluate(right, bindings)
            }
        }
        Expr::Conditional {
            condition,
            then_expr,
            else_expr,
        } => {
            if truthy(&evaluate(condition, bindings)?) {
                evaluate(then_expr, bindings)
            } else {
                evaluate(else_expr, bindings)
            }
        }
    }
}

/// Flatten `a.b.c` into `["a", "b", "c"]` when rooted at a bare identifier
fn identifier_chain(expr: &Expr) -> Option<Vec<&str>> {
    match expr {
        Expr::Identifier(name) => Some(vec![name.as_str()]),
        Expr::Member { object, property } => {
            let mut segments = identifier_chain(object)?;
            segments.push(property.as_str());
            Some(segments)
        }
        _ => None,
    }
}

/// Bare names in `expr` that no bound path covers, as written, deduplicated
pub(crate) fn unbound_identifiers(expr: &Expr, bound: &[String]) -> Vec<String> {
    let mut names = Vec::new();
    collect_unbound(expr, bound, &mut names);
    names
}

fn collect_unbound(expr: &Expr, bound: &[String], names: &mut Vec<String>) {
    if let Some(segments) = identifier_chain(expr) {
        let covered = (1..=segments.len()).any(|n| bound.contains(&segments[..n].join(".")));
        let name = segments.join(".");
        if !covered && !names.contains(&name) {
            names.push(name);
        }
        return;
    }
    match expr {
        Expr::Literal(_) | Expr::Placeholder(_) | Expr::Identifier(_) => {}
        Expr::Array(items) => {
            for item in items {
                collect_unbound(item, bound, names);
            }
        }
        Expr::Member { object, .. } => collect_unbound(object, bound, names),
        Expr::Index { object, index } => {
            collect_unbound(object, bound, names);
            collect_unbound(index, bound, names);
        }
        Expr::Unary { operand, .. } => collect_unbound(operand, bound, names),
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            collect_unbound(left, bound, names);
            collect_unbound(right, bound, names);
        }
        Expr::Conditional {
            condition,
            then_expr,
            else_expr,
        } => {
            collect_unbound(condition, bound, names);
            collect_unbound(then_expr, bound, names);
            collect_unbound(else_expr, bound, names);
        }
    }
}

/// Resolve a bare dotted name against the longest bound prefix, then walk
/// the remaining segments as property access.
fn resolve_chain(segments: &[&str], bindings: &Bindings) -> EvalResult {
    for split in (1..=segments.len()).rev() {
        let name = segments[..split].join(".");
        if let Some(bound) = bindings.get(&name) {
            let mut current = bound.clone();
            for property in &segments[split..] {
                current = member(&current, property)?;
            }
            return Ok(current);
        }
    }
    Err(ExpressionError::Unresolved {
        name: segments.join("."),
    })
}

fn member(object: &Value, property: &str) -> EvalResult {
    match object {
        Value::Object(map) => Ok(map.get(property).cloned().unwrap_or(Value::Null)),
        Value::Array(items) => match property {
            "length" => Ok(Value::from(items.len())),
            _ => Ok(property
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Value::Null)),
        },
        Value::String(s) => match property {
            "length" => Ok(Value::from(s.chars().count())),
            _ => Ok(property
                .parse::<usize>()
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Null)),
        },
        Value::Null => Err(ExpressionError::Type(format!(
            "cannot read property '{property}' of null"
        ))),
        Value::Bool(_) | Value::Number(_) => Ok(Value::Null),
    }
}

fn index_value(object: &Value, index: &Value) -> EvalResult {
    match index {
        Value::String(key) => member(object, key),
        Value::Number(n) => match n.as_u64() {
            Some(i) => member(object, &i.to_string()),
            None if object.is_null() => member(object, &n.to_string()),
            None => Ok(Value::Null),
        },
        other => Err(ExpressionError::Type(format!(
            "cannot index with {}",
            describe(other)
        ))),
    }
}

fn unary(op: UnaryOp, operand: &Value) -> EvalResult {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!truthy(operand))),
        UnaryOp::Negate => {
            if let Some(i) = operand.as_i64()
                && let Some(negated) = i.checked_neg()
            {
                return Ok(Value::from(negated));
            }
            number_value(-to_number(operand, "negate")?)
        }
        UnaryOp::Plus => match operand {
            Value::Number(_) => Ok(operand.clone()),
            Value::String(s) => {
                let trimmed = s.trim();
                let parsed = if trimmed.is_empty() {
                    Some(0.0)
                } else {
                    trimmed.parse::<f64>().ok()
                };
                parsed.map_or_else(
                    || {
                        Err(ExpressionError::Type(format!(
                            "cannot convert {s:?} to a number"
                        )))
                    },
                    number_value,
                )
            }
            other => Err(ExpressionError::Type(format!(
                "cannot convert {} to a number",
                describe(other)
            ))),
        },
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> EvalResult {
    match op {
        BinaryOp::Add if left.is_string() || right.is_string() => Ok(Value::String(format!(
            "{}{}",
            to_display(left),
            to_display(right)
        ))),
        BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply => {
            if let (Some(l), Some(r)) = (left.as_i64(), right.as_i64()) {
                let exact = match op {
                    BinaryOp::Add => l.checked_add(r),
                    BinaryOp::Subtract => l.checked_sub(r),
                    _ => l.checked_mul(r),
                };
                if let Some(n) = exact {
                    return Ok(Value::from(n));
                }
            }
            let (l, r) = (to_number(left, op_name(op))?, to_number(right, op_name(op))?);
            number_value(match op {
                BinaryOp::Add => l + r,
                BinaryOp::Subtract => l - r,
                _ => l * r,
            })
        }
        BinaryOp::Divide => {
            number_value(to_number(left, "divide")? / to_number(right, "divide")?)
        }
        BinaryOp::Remainder => {
            if let (Some(l), Some(r)) = (left.as_i64(), right.as_i64())
                && let Some(n) = l.checked_rem(r)
            {
                return Ok(Value::from(n));
            }
            number_value(to_number(left, "remainder")? % to_number(right, "remainder")?)
        }
        BinaryOp::Equal => Ok(Value::Bool(strict_equals(left, right))),
        BinaryOp::NotEqual => Ok(Value::Bool(!strict_equals(left, right))),
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            let ordering = compare(left, right)?;
            Ok(Value::Bool(match op {
                BinaryOp::Less => ordering == Ordering::Less,
                BinaryOp::LessEqual => ordering != Ordering::Greater,
                BinaryOp::Greater => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
    }
}

fn op_name(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "add",
        BinaryOp::Subtract => "subtract",
        _ => "multiply",
    }
}

fn to_number(value: &Value, action: &str) -> Result<f64, ExpressionError> {
    value.as_f64().ok_or_else(|| {
        ExpressionError::Type(format!("cannot {action} {}", describe(value)))
    })
}

/// Normalize an arithmetic result: integral values become JSON integers,
/// non-finite values are errors.
fn number_value(n: f64) -> EvalResult {
    if !n.is_finite() {
        return Err(ExpressionError::Type(
            "arithmetic produced a non-finite number".to_string(),
        ));
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        // -0.0 collapses to 0
        return Ok(Value::from(n as i64));
    }
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| ExpressionError::Type("invalid number".to_string()))
}

fn compare(left: &Value, right: &Value) -> Result<Ordering, ExpressionError> {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => {
            let (l, r) = (to_number(left, "compare")?, to_number(right, "compare")?);
            l.partial_cmp(&r).ok_or_else(|| {
                ExpressionError::Type("cannot compare non-finite numbers".to_string())
            })
        }
        (Value::String(l), Value::String(r)) => Ok(l.cmp(r)),
        _ => Err(ExpressionError::Type(format!(
            "cannot compare {} with {}",
            describe(left),
            describe(right)
        ))),
    }
}

/// Strict equality; numbers compare by value so `2 === 2.0`
fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64() == r.as_f64(),
        (Value::Array(l), Value::Array(r)) => {
            l.len() == r.len() && l.iter().zip(r).all(|(a, b)| strict_equals(a, b))
        }
        (Value::Object(l), Value::Object(r)) => {
            l.len() == r.len()
                && l.iter()
                    .all(|(k, v)| r.get(k).is_some_and(|other| strict_equals(v, other)))
        }
        _ => left == right,
    }
}

/// JavaScript truthiness: `null`, `false`, `0` and `""` are falsy
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// String form used by concatenation
fn to_display(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER => {
                (f as i64).to_string()
            }
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => to_display(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Walk a dotted path through nested objects and arrays.
///
/// Returns `None` as soon as a segment is missing; never fails.
pub fn resolve_path<'a>(data: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = data.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
