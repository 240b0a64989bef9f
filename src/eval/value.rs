//! Runtime values of the expression evaluator.

use std::fmt;
use std::rc::Rc;

use super::error::{ScriptError, ScriptResult};
use super::{EvalResult, ResultRow, Scalar};
use crate::transpose::ArgumentColumn;

/// Python-style built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Sum,
    Min,
    Max,
    Abs,
    Round,
    Str,
    Float,
    Int,
    Bool,
    List,
    Zip,
    Range,
    Sorted,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "len" => Builtin::Len,
            "sum" => Builtin::Sum,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            "abs" => Builtin::Abs,
            "round" => Builtin::Round,
            "str" => Builtin::Str,
            "float" => Builtin::Float,
            "int" => Builtin::Int,
            "bool" => Builtin::Bool,
            "list" => Builtin::List,
            "zip" => Builtin::Zip,
            "range" => Builtin::Range,
            "sorted" => Builtin::Sorted,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::Sum => "sum",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Abs => "abs",
            Builtin::Round => "round",
            Builtin::Str => "str",
            Builtin::Float => "float",
            Builtin::Int => "int",
            Builtin::Bool => "bool",
            Builtin::List => "list",
            Builtin::Zip => "zip",
            Builtin::Range => "range",
            Builtin::Sorted => "sorted",
        }
    }
}

/// A value produced while evaluating a script.
///
/// Lists share their storage, so indexing into `args` inside a comprehension
/// does not copy the argument columns.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Rc<Vec<Value>>),
    Tuple(Rc<Vec<Value>>),
    /// The bound numeric library
    Module(&'static str),
    Builtin(Builtin),
    /// A function looked up on the numeric library
    LibraryFn(&'static str),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(items))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Rc::new(items))
    }

    pub fn numbers(values: &[f64]) -> Self {
        Value::list(values.iter().copied().map(Value::Number).collect())
    }

    pub fn strings(values: &[String]) -> Self {
        Value::list(values.iter().cloned().map(Value::Str).collect())
    }

    /// Python-ish type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Number(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Module(_) => "module",
            Value::Builtin(_) | Value::LibraryFn(_) => "function",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            Value::Module(_) | Value::Builtin(_) | Value::LibraryFn(_) => true,
        }
    }

    /// Numeric view, booleans count as 0 and 1
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn expect_number(&self, context: &str) -> ScriptResult<f64> {
        self.as_number().ok_or_else(|| {
            ScriptError::type_error(format!(
                "{context} expects a number, got {}",
                self.type_name()
            ))
        })
    }

    /// Elements of a list, tuple or string, copied out of the shared storage.
    pub fn items(&self) -> ScriptResult<Vec<Value>> {
        match self {
            Value::List(items) | Value::Tuple(items) => Ok(items.as_ref().clone()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            other => Err(ScriptError::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, Value::List(_) | Value::Tuple(_))
    }

    /// Structural equality; numbers and booleans compare by value.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Module(a), Value::Module(b)) | (Value::LibraryFn(a), Value::LibraryFn(b)) => {
                a == b
            }
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }

    /// Convert the final value into rows of columns.
    pub fn into_eval_result(self) -> ScriptResult<EvalResult> {
        match self {
            Value::List(items) | Value::Tuple(items) => items
                .iter()
                .map(to_result_row)
                .collect::<ScriptResult<Vec<_>>>()
                .map(EvalResult::Rows),
            other => to_scalar(&other).map(EvalResult::Scalar),
        }
    }
}

fn to_result_row(value: &Value) -> ScriptResult<ResultRow> {
    match value {
        Value::List(items) | Value::Tuple(items) => items
            .iter()
            .map(to_scalar)
            .collect::<ScriptResult<Vec<_>>>()
            .map(ResultRow::Columns),
        other => to_scalar(other).map(ResultRow::Scalar),
    }
}

fn to_scalar(value: &Value) -> ScriptResult<Scalar> {
    match value {
        Value::Number(n) => Ok(Scalar::Number(*n)),
        Value::Str(s) => Ok(Scalar::Text(s.clone())),
        Value::Bool(b) => Ok(Scalar::Bool(*b)),
        Value::List(_) | Value::Tuple(_) => Err(ScriptError::ResultShape {
            message: "result is nested deeper than rows of columns".to_string(),
        }),
        other => Err(ScriptError::ResultShape {
            message: format!("cannot return a value of type '{}'", other.type_name()),
        }),
    }
}

impl From<&ArgumentColumn> for Value {
    fn from(column: &ArgumentColumn) -> Self {
        match column {
            ArgumentColumn::Strings(values) => Value::strings(values),
            ArgumentColumn::Numbers(values) => Value::numbers(values),
            ArgumentColumn::Duals { numbers, strings } => {
                Value::list(vec![Value::numbers(numbers), Value::strings(strings)])
            }
        }
    }
}

/// Integral numbers print without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "nan".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e16 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                write_items(f, items)?;
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Module(name) => write!(f, "<module '{name}'>"),
            Value::Builtin(b) => write!(f, "<built-in function {}>", b.name()),
            Value::LibraryFn(name) => write!(f, "<function {name}>"),
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        match item {
            Value::Str(s) => write!(f, "'{s}'")?,
            other => write!(f, "{other}")?,
        }
    }
    Ok(())
}
