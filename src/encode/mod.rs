//! # Result Encoding
//!
//! Converts an [`EvalResult`] into the single row batch sent back to the
//! caller.
//!
//! | Result                          | Wire rows                        |
//! |---------------------------------|----------------------------------|
//! | `Scalar(v)`                     | one row, one dual                |
//! | `Rows([v1, v2, ..])`            | one row per element              |
//! | `Rows([Columns([a, b]), ..])`   | one row per element, one dual per column |
//!
//! Numeric returns fill `num_data`; string returns fill `str_data`. A value
//! of the wrong kind is rejected rather than coerced.

use crate::eval::{EvalResult, ResultRow, Scalar};
use crate::protocol::error::{ScriptEvalError, ScriptEvalResult};
use crate::protocol::wire::{BundledRows, Dual, Row};
use crate::types::ReturnType;

/// Fail fast for return classifications the encoder cannot produce.
pub fn ensure_supported(return_type: ReturnType) -> ScriptEvalResult<()> {
    match return_type {
        ReturnType::String | ReturnType::Numeric => Ok(()),
        ReturnType::Dual | ReturnType::Undefined => {
            Err(ScriptEvalError::UnsupportedReturnType { return_type })
        }
    }
}

/// Encode a result as one row batch, preserving element order.
pub fn encode(result: &EvalResult, return_type: ReturnType) -> ScriptEvalResult<BundledRows> {
    ensure_supported(return_type)?;
    match result {
        EvalResult::Scalar(value) => {
            let dual = encode_scalar(value, return_type, 0)?;
            Ok(BundledRows::new(vec![Row::new(vec![dual])]))
        }
        EvalResult::Rows(rows) => rows
            .iter()
            .enumerate()
            .map(|(index, row)| encode_row(row, return_type, index))
            .collect(),
    }
}

fn encode_row(row: &ResultRow, return_type: ReturnType, index: usize) -> ScriptEvalResult<Row> {
    match row {
        ResultRow::Scalar(value) => Ok(Row::new(vec![encode_scalar(value, return_type, index)?])),
        ResultRow::Columns(values) => values
            .iter()
            .map(|value| encode_scalar(value, return_type, index))
            .collect(),
    }
}

fn encode_scalar(value: &Scalar, return_type: ReturnType, index: usize) -> ScriptEvalResult<Dual> {
    match (return_type, value) {
        (ReturnType::Numeric, Scalar::Number(n)) => Ok(Dual::number(*n)),
        (ReturnType::Numeric, Scalar::Bool(b)) => Ok(Dual::number(if *b { 1.0 } else { 0.0 })),
        (ReturnType::String, Scalar::Text(s)) => Ok(Dual::text(s.clone())),
        (ReturnType::String | ReturnType::Numeric, other) => Err(ScriptEvalError::result_shape(
            format!(
                "row {index}: {} value cannot be returned as {return_type}",
                kind_of(other)
            ),
        )),
        (ReturnType::Dual | ReturnType::Undefined, _) => {
            Err(ScriptEvalError::UnsupportedReturnType { return_type })
        }
    }
}

fn kind_of(value: &Scalar) -> &'static str {
    match value {
        Scalar::Number(_) => "numeric",
        Scalar::Text(_) => "text",
        Scalar::Bool(_) => "boolean",
    }
}
