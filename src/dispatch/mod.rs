//! # Dispatch
//!
//! Runs one script invocation end to end:
//!
//! ```text
//! header ──classify──> Signature
//!                         │ params declared?
//!             yes ────────┴──────── no
//!   accumulate + transpose          │
//!             └────────┬────────────┘
//!                  invoke (args, numpy)
//!                      │
//!                   encode ──> exactly one BundledRows
//! ```
//!
//! A failure anywhere aborts the invocation: the status and details are set
//! on the [`CallContext`] and no batch is produced.

use std::collections::BTreeMap;
use std::iter::{self, Once};

use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::ScriptConfig;
use crate::encode::{encode, ensure_supported};
use crate::eval::{invoke, Evaluator, ExpressionEvaluator};
use crate::protocol::error::{ScriptEvalError, ScriptEvalResult, StatusCode};
use crate::protocol::wire::{BundledRows, ScriptRequestHeader};
use crate::transpose::{accumulate_rows, transpose_rows};
use crate::types::classify_header;

/// Per-invocation limits. A limit of 0 disables it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_script_bytes: usize,
    pub max_rows: usize,
}

impl Limits {
    pub const UNLIMITED: Limits = Limits {
        max_script_bytes: 0,
        max_rows: 0,
    };
}

impl Default for Limits {
    fn default() -> Self {
        Limits::from(&ScriptConfig::default())
    }
}

impl From<&ScriptConfig> for Limits {
    fn from(config: &ScriptConfig) -> Self {
        Limits {
            max_script_bytes: config.max_script_bytes,
            max_rows: config.max_rows,
        }
    }
}

/// Caller-side view of one call: metadata in, status out.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    metadata: BTreeMap<String, String>,
    code: StatusCode,
    details: Option<String>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(metadata: BTreeMap<String, String>) -> Self {
        CallContext {
            metadata,
            ..Self::default()
        }
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn set_code(&mut self, code: StatusCode) {
        self.code = code;
    }

    pub fn set_details(&mut self, details: impl Into<String>) {
        self.details = Some(details.into());
    }
}

/// Script evaluation service.
pub struct ScriptEval<E: Evaluator = ExpressionEvaluator> {
    evaluator: E,
    limits: Limits,
}

impl ScriptEval<ExpressionEvaluator> {
    pub fn new() -> Self {
        Self::with_evaluator(ExpressionEvaluator::new(), Limits::default())
    }

    pub fn from_config(config: &ScriptConfig) -> Self {
        Self::with_evaluator(
            ExpressionEvaluator::with_cache_capacity(config.parse_cache_size),
            Limits::from(config),
        )
    }
}

impl Default for ScriptEval<ExpressionEvaluator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Evaluator> ScriptEval<E> {
    pub fn with_evaluator(evaluator: E, limits: Limits) -> Self {
        ScriptEval { evaluator, limits }
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Evaluate `header.script` over the request stream.
    ///
    /// Yields exactly one batch on success. On failure `ctx` carries the
    /// status code and error text, and the error is returned.
    pub fn evaluate_script<I>(
        &self,
        header: &ScriptRequestHeader,
        request: I,
        ctx: &mut CallContext,
    ) -> ScriptEvalResult<Once<BundledRows>>
    where
        I: IntoIterator<Item = BundledRows>,
    {
        let request_id = Uuid::new_v4();
        let span = info_span!("evaluate_script", request_id = %request_id);
        let _enter = span.enter();

        match self.run(header, request) {
            Ok(batch) => Ok(iter::once(batch)),
            Err(e) => {
                let code = e.status_code();
                warn!(status = %code, error = %e, "script_evaluate_failed");
                ctx.set_code(code);
                ctx.set_details(e.to_string());
                Err(e)
            }
        }
    }

    fn run<I>(&self, header: &ScriptRequestHeader, request: I) -> ScriptEvalResult<BundledRows>
    where
        I: IntoIterator<Item = BundledRows>,
    {
        let max_script = self.limits.max_script_bytes;
        if max_script > 0 && header.script.len() > max_script {
            return Err(ScriptEvalError::ResourceLimitExceeded {
                resource: "script bytes".to_string(),
                limit: max_script,
            });
        }

        let signature = classify_header(header);
        info!(
            script = %header.script,
            arg_type = %signature.arg_type,
            return_type = %signature.return_type,
            function_type = %signature.function_kind,
            params = signature.param_types.len(),
            "script_evaluate_start"
        );
        ensure_supported(signature.return_type)?;

        let columns = if signature.has_params() {
            let rows = accumulate_rows(request, self.limits.max_rows)?;
            let columns = transpose_rows(&rows, &signature.param_types, signature.arg_type)?;
            debug!(rows = rows.len(), columns = ?columns, "arguments_transposed");
            columns
        } else {
            Vec::new()
        };

        let result = invoke(&self.evaluator, &header.script, columns)?;
        debug!(result = ?result, "script_result");

        let batch = encode(&result, signature.return_type)?;
        info!(rows = batch.len(), "script_evaluate_done");
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{Bindings, EvalResult, Scalar, ScriptError};
    use crate::protocol::wire::{DataType, Dual, Parameter, Row};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and returns the number of argument columns.
    #[derive(Default)]
    struct CountingEvaluator {
        calls: AtomicUsize,
    }

    impl Evaluator for CountingEvaluator {
        fn evaluate(&self, _script: &str, bindings: &Bindings) -> Result<EvalResult, ScriptError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(EvalResult::Scalar(Scalar::Number(bindings.args().len() as f64)))
        }
    }

    fn numeric_batch(values: &[f64]) -> BundledRows {
        values
            .iter()
            .map(|v| Row::new(vec![Dual::number(*v)]))
            .collect()
    }

    #[test]
    fn test_single_batch_for_numeric_sum() {
        let service = ScriptEval::new();
        let header =
            ScriptRequestHeader::new("sum(args[0])", DataType::Numeric).with_param(Parameter::numeric("x"));
        let mut ctx = CallContext::new();
        let batches: Vec<_> = service
            .evaluate_script(&header, vec![numeric_batch(&[1.0, 2.0]), numeric_batch(&[3.0])], &mut ctx)
            .unwrap()
            .collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].rows[0].duals[0], Dual::number(6.0));
        assert_eq!(ctx.code(), StatusCode::Ok);
    }

    #[test]
    fn test_no_params_skips_transposition() {
        let service = ScriptEval::with_evaluator(CountingEvaluator::default(), Limits::UNLIMITED);
        let header = ScriptRequestHeader::new("anything", DataType::Numeric);
        let mut ctx = CallContext::new();
        // Rows sent without declared parameters are never read.
        let batches: Vec<_> = service
            .evaluate_script(&header, vec![numeric_batch(&[1.0])], &mut ctx)
            .unwrap()
            .collect();
        assert_eq!(batches[0].rows[0].duals[0], Dual::number(0.0));
        assert_eq!(service.evaluator().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dual_return_fails_before_running_script() {
        let service = ScriptEval::with_evaluator(CountingEvaluator::default(), Limits::UNLIMITED);
        let header =
            ScriptRequestHeader::new("x", DataType::Dual).with_param(Parameter::numeric("x"));
        let mut ctx = CallContext::new();
        let err = service
            .evaluate_script(&header, vec![numeric_batch(&[1.0])], &mut ctx)
            .unwrap_err();
        assert!(matches!(err, ScriptEvalError::UnsupportedReturnType { .. }));
        assert_eq!(ctx.code(), StatusCode::Unimplemented);
        assert_eq!(service.evaluator().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failure_sets_status_and_details() {
        let service = ScriptEval::new();
        let header =
            ScriptRequestHeader::new("1 / 0", DataType::Numeric).with_param(Parameter::numeric("x"));
        let mut ctx = CallContext::new();
        let err = service
            .evaluate_script(&header, vec![numeric_batch(&[1.0])], &mut ctx)
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::Unknown);
        assert_eq!(ctx.code(), StatusCode::Unknown);
        assert!(ctx.details().unwrap().contains("ZeroDivisionError"));
    }

    #[test]
    fn test_limits() {
        let limits = Limits {
            max_script_bytes: 4,
            max_rows: 2,
        };
        let service = ScriptEval::with_evaluator(CountingEvaluator::default(), limits);
        let mut ctx = CallContext::new();

        let long = ScriptRequestHeader::new("12345", DataType::Numeric);
        let err = service.evaluate_script(&long, Vec::new(), &mut ctx).unwrap_err();
        assert!(matches!(err, ScriptEvalError::ResourceLimitExceeded { limit: 4, .. }));
        assert_eq!(ctx.code(), StatusCode::ResourceExhausted);

        let header = ScriptRequestHeader::new("x", DataType::Numeric).with_param(Parameter::numeric("x"));
        let err = service
            .evaluate_script(&header, vec![numeric_batch(&[1.0, 2.0, 3.0])], &mut ctx)
            .unwrap_err();
        assert!(matches!(err, ScriptEvalError::ResourceLimitExceeded { limit: 2, .. }));
    }

    #[test]
    fn test_metadata_is_kept() {
        let mut metadata = BTreeMap::new();
        metadata.insert("client".to_string(), "repl".to_string());
        let ctx = CallContext::with_metadata(metadata);
        assert_eq!(ctx.metadata().len(), 1);
        assert_eq!(ctx.details(), None);
    }
}
