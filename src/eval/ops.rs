//! Operator semantics.
//!
//! Scalars follow Python rules. Lists and tuples behave like arrays:
//! operators apply element-wise, a scalar operand is broadcast, and two
//! sequences must have the same length.

use std::cmp::Ordering;

use super::error::{ScriptError, ScriptResult};
use super::parser::{BinaryOp, CmpOp, UnaryOp};
use super::value::Value;

/// Upper bound on sequences a script can materialise in one step.
pub const MAX_GENERATED_LEN: usize = 10_000_000;

/// How division by zero is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroDivision {
    /// Scalar Python arithmetic raises.
    Raise,
    /// Array arithmetic yields `inf` or `nan`.
    Ieee,
}

pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> ScriptResult<Value> {
    binary_with(op, left, right, ZeroDivision::Raise)
}

pub fn binary_with(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    zero: ZeroDivision,
) -> ScriptResult<Value> {
    if left.is_sequence() || right.is_sequence() {
        return broadcast(left, right, |l, r| {
            binary_with(op, l, r, ZeroDivision::Ieee)
        });
    }

    match (left, right) {
        (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => Ok(Value::Str(format!("{a}{b}"))),
        (Value::Str(s), n) | (n, Value::Str(s)) if op == BinaryOp::Mul && n.as_number().is_some() => {
            repeat(s, n.as_number().unwrap_or_default())
        }
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => numeric(op, a, b, zero).map(Value::Number),
            _ => Err(ScriptError::type_error(format!(
                "unsupported operand type(s) for {}: '{}' and '{}'",
                symbol(op),
                left.type_name(),
                right.type_name()
            ))),
        },
    }
}

fn numeric(op: BinaryOp, a: f64, b: f64, zero: ZeroDivision) -> ScriptResult<f64> {
    let divides = matches!(op, BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod);
    if divides && b == 0.0 && zero == ZeroDivision::Raise {
        return Err(ScriptError::ZeroDivision);
    }
    Ok(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::FloorDiv => (a / b).floor(),
        BinaryOp::Mod => {
            // Result takes the sign of the divisor.
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) {
                r + b
            } else {
                r
            }
        }
        BinaryOp::Pow => a.powf(b),
    })
}

fn repeat(s: &str, times: f64) -> ScriptResult<Value> {
    if times.fract() != 0.0 {
        return Err(ScriptError::type_error(
            "can't multiply sequence by non-int of type 'float'",
        ));
    }
    let times = if times < 0.0 { 0 } else { times as usize };
    if s.len().saturating_mul(times) > MAX_GENERATED_LEN {
        return Err(ScriptError::value_error("repeated string is too large"));
    }
    Ok(Value::Str(s.repeat(times)))
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::FloorDiv => "//",
        BinaryOp::Mod => "%",
        BinaryOp::Pow => "**",
    }
}

/// Apply `f` pairwise, broadcasting a scalar against a sequence.
pub fn broadcast<F>(left: &Value, right: &Value, f: F) -> ScriptResult<Value>
where
    F: Fn(&Value, &Value) -> ScriptResult<Value>,
{
    match (left.is_sequence(), right.is_sequence()) {
        (true, true) => {
            let (l, r) = (left.items()?, right.items()?);
            if l.len() != r.len() {
                return Err(ScriptError::value_error(format!(
                    "operands could not be broadcast together with lengths {} and {}",
                    l.len(),
                    r.len()
                )));
            }
            l.iter()
                .zip(r.iter())
                .map(|(a, b)| f(a, b))
                .collect::<ScriptResult<Vec<_>>>()
                .map(Value::list)
        }
        (true, false) => left
            .items()?
            .iter()
            .map(|a| f(a, right))
            .collect::<ScriptResult<Vec<_>>>()
            .map(Value::list),
        (false, true) => right
            .items()?
            .iter()
            .map(|b| f(left, b))
            .collect::<ScriptResult<Vec<_>>>()
            .map(Value::list),
        (false, false) => f(left, right),
    }
}

/// Apply `f` to every scalar of a possibly nested sequence.
pub fn map_elements<F>(value: &Value, f: &F) -> ScriptResult<Value>
where
    F: Fn(&Value) -> ScriptResult<Value>,
{
    if value.is_sequence() {
        value
            .items()?
            .iter()
            .map(|item| map_elements(item, f))
            .collect::<ScriptResult<Vec<_>>>()
            .map(Value::list)
    } else {
        f(value)
    }
}

pub fn unary(op: UnaryOp, operand: &Value) -> ScriptResult<Value> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
        UnaryOp::Neg | UnaryOp::Pos => map_elements(operand, &|v| {
            let n = v.as_number().ok_or_else(|| {
                ScriptError::type_error(format!(
                    "bad operand type for unary {}: '{}'",
                    if op == UnaryOp::Neg { "-" } else { "+" },
                    v.type_name()
                ))
            })?;
            Ok(Value::Number(if op == UnaryOp::Neg { -n } else { n }))
        }),
    }
}

/// Compare two values. Sequences compare element-wise and yield a list of
/// booleans.
pub fn compare(op: CmpOp, left: &Value, right: &Value) -> ScriptResult<Value> {
    if left.is_sequence() || right.is_sequence() {
        return broadcast(left, right, |l, r| compare(op, l, r));
    }
    let result = match op {
        CmpOp::Eq => left.equals(right),
        CmpOp::Ne => !left.equals(right),
        CmpOp::Lt => order(left, right)? == Some(Ordering::Less),
        CmpOp::Le => matches!(order(left, right)?, Some(Ordering::Less | Ordering::Equal)),
        CmpOp::Gt => order(left, right)? == Some(Ordering::Greater),
        CmpOp::Ge => matches!(
            order(left, right)?,
            Some(Ordering::Greater | Ordering::Equal)
        ),
    };
    Ok(Value::Bool(result))
}

/// Ordering of two scalars; `None` when a NaN is involved.
pub fn order(left: &Value, right: &Value) -> ScriptResult<Option<Ordering>> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => Ok(a.partial_cmp(&b)),
            _ => Err(ScriptError::type_error(format!(
                "'<' not supported between instances of '{}' and '{}'",
                left.type_name(),
                right.type_name()
            ))),
        },
    }
}
