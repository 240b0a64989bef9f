//! # Evaluation Invoker
//!
//! Runs a caller-supplied script against the transposed argument columns.
//!
//! The evaluator sees exactly two names:
//! - `args`: one entry per declared parameter, in declaration order. A dual
//!   parameter under mixed classification is a pair `[numbers, strings]`.
//! - `numpy`: the [`NumericLibrary`].
//!
//! Whatever the script produces is normalised once, at the evaluator
//! boundary, into an [`EvalResult`].

mod cache;
mod error;
mod interpreter;
mod numeric;
mod ops;
mod parser;
mod value;

use std::sync::OnceLock;

use tracing::debug;

pub use cache::CacheStats;
pub use error::{ScriptError, ScriptResult};
pub use interpreter::ExpressionEvaluator;
pub use numeric::NumericLibrary;
pub use parser::{parse_script, BinaryOp, CmpOp, Expr, UnaryOp};

use crate::protocol::error::{ScriptEvalError, ScriptEvalResult};
use crate::transpose::ArgumentColumn;

/// Binding name of the argument columns.
pub const ARGS_BINDING: &str = "args";

/// Binding name of the numeric library.
pub const NUMPY_BINDING: &str = numeric::LIBRARY_NAME;

/// A single result value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Number(f64),
    Text(String),
    Bool(bool),
}

/// One element of a sequence result.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultRow {
    /// A one-column row
    Scalar(Scalar),
    /// One value per column
    Columns(Vec<Scalar>),
}

/// What a script evaluated to.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalResult {
    Scalar(Scalar),
    Rows(Vec<ResultRow>),
}

impl EvalResult {
    /// Number of wire rows this result becomes
    pub fn row_count(&self) -> usize {
        match self {
            EvalResult::Scalar(_) => 1,
            EvalResult::Rows(rows) => rows.len(),
        }
    }
}

/// Read-only names visible to a script.
#[derive(Debug)]
pub struct Bindings {
    args: Vec<ArgumentColumn>,
    numpy: &'static NumericLibrary,
}

impl Bindings {
    pub fn new(args: Vec<ArgumentColumn>) -> Self {
        static LIBRARY: OnceLock<NumericLibrary> = OnceLock::new();
        Bindings {
            args,
            numpy: LIBRARY.get_or_init(NumericLibrary::new),
        }
    }

    pub fn args(&self) -> &[ArgumentColumn] {
        &self.args
    }

    pub fn numpy(&self) -> &NumericLibrary {
        self.numpy
    }
}

/// Executes script text against bindings.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, script: &str, bindings: &Bindings) -> Result<EvalResult, ScriptError>;
}

/// Bind `columns` and run `script` once. Faults are reported, never retried.
pub fn invoke<E>(
    evaluator: &E,
    script: &str,
    columns: Vec<ArgumentColumn>,
) -> ScriptEvalResult<EvalResult>
where
    E: Evaluator + ?Sized,
{
    let bindings = Bindings::new(columns);
    debug!(args = ?bindings.args(), "evaluator_invoke");
    evaluator
        .evaluate(script, &bindings)
        .map_err(|err| match err {
            ScriptError::ResultShape { message } => ScriptEvalError::ResultShape { message },
            other => ScriptEvalError::Script(other),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<EvalResult, ScriptError>);

    impl Evaluator for Fixed {
        fn evaluate(&self, _script: &str, _bindings: &Bindings) -> Result<EvalResult, ScriptError> {
            self.0.clone()
        }
    }

    #[test]
    fn test_invoke_passes_result_through() {
        let fixed = Fixed(Ok(EvalResult::Scalar(Scalar::Number(1.0))));
        let result = invoke(&fixed, "ignored", Vec::new()).unwrap();
        assert_eq!(result.row_count(), 1);
    }

    #[test]
    fn test_invoke_wraps_script_faults() {
        let fixed = Fixed(Err(ScriptError::ZeroDivision));
        let err = invoke(&fixed, "1/0", Vec::new()).unwrap_err();
        assert!(matches!(err, ScriptEvalError::Script(ScriptError::ZeroDivision)));
    }

    #[test]
    fn test_invoke_maps_result_shape() {
        let fixed = Fixed(Err(ScriptError::ResultShape {
            message: "nested".to_string(),
        }));
        let err = invoke(&fixed, "x", Vec::new()).unwrap_err();
        assert!(matches!(err, ScriptEvalError::ResultShape { .. }));
    }

    #[test]
    fn test_invoke_through_trait_object() {
        let evaluator: Box<dyn Evaluator> = Box::new(ExpressionEvaluator::new());
        let columns = vec![ArgumentColumn::Strings(vec!["a".to_string(), "b".to_string()])];
        let result = invoke(evaluator.as_ref(), "[s + '!' for s in args[0]]", columns).unwrap();
        assert_eq!(
            result,
            EvalResult::Rows(vec![
                ResultRow::Scalar(Scalar::Text("a!".to_string())),
                ResultRow::Scalar(Scalar::Text("b!".to_string())),
            ])
        );
    }
}
