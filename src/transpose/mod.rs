//! # Row Transposition
//!
//! Turns the row-major request stream into one argument column per declared
//! parameter.
//!
//! ```text
//! BundledRows* --accumulate--> Vec<Row>
//!              --extract-----> Vec<Vec<Cell>>        (row-major, one cell per param)
//!              --transpose---> Vec<Vec<Cell>>        (param-major)
//!              --finish------> Vec<ArgumentColumn>   (dual columns split in two)
//! ```
//!
//! The stream is consumed completely before any column is produced: a column
//! needs every row of its parameter.

use crate::protocol::error::{ScriptEvalError, ScriptEvalResult};
use crate::protocol::wire::{BundledRows, DataType, Row};
use crate::types::ArgType;

/// Argument data for one declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentColumn {
    Strings(Vec<String>),
    Numbers(Vec<f64>),
    /// A dual parameter under mixed classification, split into parallel
    /// numeric and textual columns.
    Duals {
        numbers: Vec<f64>,
        strings: Vec<String>,
    },
}

impl ArgumentColumn {
    /// Number of rows in the column
    pub fn len(&self) -> usize {
        match self {
            ArgumentColumn::Strings(values) => values.len(),
            ArgumentColumn::Numbers(values) => values.len(),
            ArgumentColumn::Duals { numbers, .. } => numbers.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Raw value pulled out of one dual.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Str(String),
    Num(f64),
    Pair(f64, String),
}

/// Read the whole stream into an owned buffer of rows.
///
/// `max_rows` of 0 means unlimited.
pub fn accumulate_rows<I>(batches: I, max_rows: usize) -> ScriptEvalResult<Vec<Row>>
where
    I: IntoIterator<Item = BundledRows>,
{
    let mut rows = Vec::new();
    for batch in batches {
        if max_rows > 0 && rows.len() + batch.rows.len() > max_rows {
            return Err(ScriptEvalError::ResourceLimitExceeded {
                resource: "rows".to_string(),
                limit: max_rows,
            });
        }
        rows.extend(batch.rows);
    }
    Ok(rows)
}

/// Transpose a stream of row batches into argument columns.
pub fn transpose<I>(
    batches: I,
    param_types: &[DataType],
    arg_type: ArgType,
) -> ScriptEvalResult<Vec<ArgumentColumn>>
where
    I: IntoIterator<Item = BundledRows>,
{
    let rows = accumulate_rows(batches, 0)?;
    transpose_rows(&rows, param_types, arg_type)
}

/// Transpose already accumulated rows into argument columns.
pub fn transpose_rows(
    rows: &[Row],
    param_types: &[DataType],
    arg_type: ArgType,
) -> ScriptEvalResult<Vec<ArgumentColumn>> {
    if arg_type == ArgType::Undefined {
        return Err(ScriptEvalError::invalid_argument_type(arg_type));
    }

    let extracted = rows
        .iter()
        .enumerate()
        .map(|(index, row)| extract_row(index, row, param_types, arg_type))
        .collect::<ScriptEvalResult<Vec<_>>>()?;

    rows_to_columns(extracted, param_types.len())
        .into_iter()
        .zip(param_types)
        .map(|(cells, kind)| finish_column(cells, *kind, arg_type))
        .collect()
}

/// Pick the field(s) of each dual that the classification asks for.
fn extract_row(
    index: usize,
    row: &Row,
    param_types: &[DataType],
    arg_type: ArgType,
) -> ScriptEvalResult<Vec<Cell>> {
    if row.len() != param_types.len() {
        return Err(ScriptEvalError::RowArity {
            row: index,
            expected: param_types.len(),
            got: row.len(),
        });
    }

    match arg_type {
        ArgType::String => Ok(row
            .duals
            .iter()
            .map(|d| Cell::Str(d.str_data.clone()))
            .collect()),
        ArgType::Numeric => Ok(row.duals.iter().map(|d| Cell::Num(d.num_data)).collect()),
        ArgType::Mixed => row
            .duals
            .iter()
            .zip(param_types)
            .enumerate()
            .map(|(position, (dual, kind))| match kind {
                DataType::String => Ok(Cell::Str(dual.str_data.clone())),
                DataType::Numeric => Ok(Cell::Num(dual.num_data)),
                DataType::Dual => Ok(Cell::Pair(dual.num_data, dual.str_data.clone())),
                DataType::Unrecognized(_) => Err(ScriptEvalError::InvalidArgumentType {
                    classification: arg_type,
                    detail: Some(format!("parameter {position} declared {kind}")),
                }),
            })
            .collect(),
        // No parameters means nothing to extract.
        ArgType::Empty => Ok(Vec::new()),
        ArgType::Undefined => Err(ScriptEvalError::invalid_argument_type(arg_type)),
    }
}

/// Row-major cells to parameter-major columns.
fn rows_to_columns(rows: Vec<Vec<Cell>>, width: usize) -> Vec<Vec<Cell>> {
    let mut columns: Vec<Vec<Cell>> = (0..width).map(|_| Vec::with_capacity(rows.len())).collect();
    for row in rows {
        for (column, cell) in columns.iter_mut().zip(row) {
            column.push(cell);
        }
    }
    columns
}

/// Second stage: typed column, with dual pairs split into parallel columns.
fn finish_column(
    cells: Vec<Cell>,
    kind: DataType,
    arg_type: ArgType,
) -> ScriptEvalResult<ArgumentColumn> {
    let split_duals = arg_type == ArgType::Mixed && kind == DataType::Dual;
    if split_duals {
        let (numbers, strings) = cells
            .into_iter()
            .map(|cell| match cell {
                Cell::Pair(n, s) => Ok((n, s)),
                other => Err(unexpected_cell(&other, kind)),
            })
            .collect::<ScriptEvalResult<Vec<_>>>()?
            .into_iter()
            .unzip();
        return Ok(ArgumentColumn::Duals { numbers, strings });
    }

    let takes_text = match arg_type {
        ArgType::String => true,
        ArgType::Numeric => false,
        _ => kind == DataType::String,
    };
    if takes_text {
        cells
            .into_iter()
            .map(|cell| match cell {
                Cell::Str(s) => Ok(s),
                other => Err(unexpected_cell(&other, kind)),
            })
            .collect::<ScriptEvalResult<Vec<_>>>()
            .map(ArgumentColumn::Strings)
    } else {
        cells
            .into_iter()
            .map(|cell| match cell {
                Cell::Num(n) => Ok(n),
                other => Err(unexpected_cell(&other, kind)),
            })
            .collect::<ScriptEvalResult<Vec<_>>>()
            .map(ArgumentColumn::Numbers)
    }
}

fn unexpected_cell(cell: &Cell, kind: DataType) -> ScriptEvalError {
    ScriptEvalError::InvalidArgumentType {
        classification: ArgType::Mixed,
        detail: Some(format!("value {cell:?} in a {kind} column")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::wire::Dual;

    fn batch(rows: Vec<Vec<Dual>>) -> BundledRows {
        rows.into_iter().map(Row::new).collect()
    }

    #[test]
    fn test_numeric_columns() {
        let input = batch(vec![
            vec![Dual::new(1.0, "ignored"), Dual::number(7.0)],
            vec![Dual::number(2.0), Dual::new(8.0, "x")],
        ]);
        let kinds = [DataType::Numeric, DataType::Numeric];
        let cols = transpose(vec![input], &kinds, ArgType::Numeric).unwrap();
        assert_eq!(
            cols,
            vec![
                ArgumentColumn::Numbers(vec![1.0, 2.0]),
                ArgumentColumn::Numbers(vec![7.0, 8.0]),
            ]
        );
    }

    #[test]
    fn test_string_columns_ignore_numbers() {
        let input = batch(vec![vec![Dual::new(5.0, "a")], vec![Dual::text("b")]]);
        let cols = transpose(vec![input], &[DataType::String], ArgType::String).unwrap();
        assert_eq!(
            cols,
            vec![ArgumentColumn::Strings(vec!["a".to_string(), "b".to_string()])]
        );
    }

    #[test]
    fn test_mixed_uses_per_parameter_kind() {
        let input = batch(vec![vec![Dual::text("a"), Dual::number(3.0)]]);
        let kinds = [DataType::String, DataType::Numeric];
        let cols = transpose(vec![input], &kinds, ArgType::Mixed).unwrap();
        assert_eq!(
            cols,
            vec![
                ArgumentColumn::Strings(vec!["a".to_string()]),
                ArgumentColumn::Numbers(vec![3.0]),
            ]
        );
    }

    #[test]
    fn test_mixed_dual_column_is_split() {
        let input = batch(vec![
            vec![Dual::new(5.0, "x"), Dual::number(1.0)],
            vec![Dual::new(6.0, "y"), Dual::number(2.0)],
        ]);
        let kinds = [DataType::Dual, DataType::Numeric];
        let cols = transpose(vec![input], &kinds, ArgType::Mixed).unwrap();
        assert_eq!(
            cols[0],
            ArgumentColumn::Duals {
                numbers: vec![5.0, 6.0],
                strings: vec!["x".to_string(), "y".to_string()],
            }
        );
        assert_eq!(cols[1], ArgumentColumn::Numbers(vec![1.0, 2.0]));
    }

    #[test]
    fn test_rows_from_several_batches_keep_order() {
        let first = batch(vec![vec![Dual::number(1.0)], vec![Dual::number(2.0)]]);
        let second = batch(vec![vec![Dual::number(3.0)]]);
        let cols = transpose(vec![first, second], &[DataType::Numeric], ArgType::Numeric).unwrap();
        assert_eq!(cols, vec![ArgumentColumn::Numbers(vec![1.0, 2.0, 3.0])]);
    }

    #[test]
    fn test_zero_rows_gives_empty_columns() {
        let kinds = [DataType::String, DataType::Numeric];
        let cols = transpose(Vec::<BundledRows>::new(), &kinds, ArgType::Mixed).unwrap();
        assert_eq!(cols.len(), 2);
        assert!(cols.iter().all(ArgumentColumn::is_empty));
    }

    #[test]
    fn test_undefined_fails() {
        let input = batch(vec![vec![Dual::number(1.0)]]);
        let err = transpose(vec![input], &[DataType::Unrecognized(5)], ArgType::Undefined)
            .unwrap_err();
        assert!(matches!(
            err,
            ScriptEvalError::InvalidArgumentType {
                classification: ArgType::Undefined,
                ..
            }
        ));
    }

    #[test]
    fn test_row_arity_mismatch() {
        let input = batch(vec![
            vec![Dual::number(1.0), Dual::number(2.0)],
            vec![Dual::number(3.0)],
        ]);
        let kinds = [DataType::Numeric, DataType::Numeric];
        let err = transpose(vec![input], &kinds, ArgType::Numeric).unwrap_err();
        assert!(matches!(
            err,
            ScriptEvalError::RowArity {
                row: 1,
                expected: 2,
                got: 1
            }
        ));
    }

    #[test]
    fn test_accumulate_enforces_limit() {
        let batches = vec![
            batch(vec![vec![Dual::number(1.0)], vec![Dual::number(2.0)]]),
            batch(vec![vec![Dual::number(3.0)]]),
        ];
        assert!(accumulate_rows(batches.clone(), 3).is_ok());
        let err = accumulate_rows(batches, 2).unwrap_err();
        assert!(matches!(
            err,
            ScriptEvalError::ResourceLimitExceeded { limit: 2, .. }
        ));
    }
}
