//! Handler for script evaluation
//!
//! Shared by the HTTP transport and the REPL. Evaluation itself is
//! synchronous; the async entry point moves it onto the blocking pool.
//! Counters are `AtomicU64` (lock-free).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::dispatch::{CallContext, ScriptEval};
use crate::Config;

use super::error::{ScriptEvalError, ScriptEvalResult};
use super::wire::{BundledRows, ScriptRequestHeader};

/// Snapshot of handler counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerStats {
    pub invocations: u64,
    pub failures: u64,
    pub rows_in: u64,
    pub rows_out: u64,
}

/// Thread-safe entry point for script invocations.
pub struct Handler {
    service: Arc<ScriptEval>,
    start_time: Instant,
    invocation_count: AtomicU64,
    failure_count: AtomicU64,
    rows_in: AtomicU64,
    rows_out: AtomicU64,
}

impl Handler {
    /// Create a new handler around an evaluation service.
    pub fn new(service: ScriptEval) -> Self {
        Self {
            service: Arc::new(service),
            start_time: Instant::now(),
            invocation_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            rows_in: AtomicU64::new(0),
            rows_out: AtomicU64::new(0),
        }
    }

    /// Create a new handler from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(ScriptEval::from_config(&config.script))
    }

    /// Get uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn stats(&self) -> HandlerStats {
        HandlerStats {
            invocations: self.invocation_count.load(Ordering::Relaxed),
            failures: self.failure_count.load(Ordering::Relaxed),
            rows_in: self.rows_in.load(Ordering::Relaxed),
            rows_out: self.rows_out.load(Ordering::Relaxed),
        }
    }

    pub fn service(&self) -> &ScriptEval {
        &self.service
    }

    /// Evaluate on the calling thread.
    pub fn evaluate_blocking(
        &self,
        header: &ScriptRequestHeader,
        batches: Vec<BundledRows>,
        ctx: &mut CallContext,
    ) -> ScriptEvalResult<BundledRows> {
        self.invocation_count.fetch_add(1, Ordering::Relaxed);
        let incoming: usize = batches.iter().map(BundledRows::len).sum();
        self.rows_in.fetch_add(incoming as u64, Ordering::Relaxed);

        let outcome = self
            .service
            .evaluate_script(header, batches, ctx)
            .map(|mut out| out.next().unwrap_or_default());
        self.record(&outcome);
        outcome
    }

    /// Evaluate on the blocking thread pool.
    ///
    /// Returns the call context alongside the outcome so transports can
    /// report status and details.
    pub async fn evaluate(
        &self,
        header: ScriptRequestHeader,
        batches: Vec<BundledRows>,
        metadata: BTreeMap<String, String>,
    ) -> (ScriptEvalResult<BundledRows>, CallContext) {
        self.invocation_count.fetch_add(1, Ordering::Relaxed);
        let incoming: usize = batches.iter().map(BundledRows::len).sum();
        self.rows_in.fetch_add(incoming as u64, Ordering::Relaxed);

        let service = Arc::clone(&self.service);
        let joined = tokio::task::spawn_blocking(move || {
            let mut ctx = CallContext::with_metadata(metadata);
            let outcome = service
                .evaluate_script(&header, batches, &mut ctx)
                .map(|mut out| out.next().unwrap_or_default());
            (outcome, ctx)
        })
        .await;

        let (outcome, ctx) = match joined {
            Ok(done) => done,
            Err(e) => {
                let err = ScriptEvalError::Internal(format!("evaluation task failed: {e}"));
                let mut ctx = CallContext::new();
                ctx.set_code(err.status_code());
                ctx.set_details(err.to_string());
                (Err(err), ctx)
            }
        };
        self.record(&outcome);
        (outcome, ctx)
    }

    fn record(&self, outcome: &ScriptEvalResult<BundledRows>) {
        match outcome {
            Ok(batch) => {
                self.rows_out.fetch_add(batch.len() as u64, Ordering::Relaxed);
            }
            Err(_) => {
                self.failure_count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl Default for Handler {
    fn default() -> Self {
        Self::new(ScriptEval::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::error::StatusCode;
    use crate::protocol::wire::{DataType, Dual, Parameter, Row};

    fn header(script: &str) -> ScriptRequestHeader {
        ScriptRequestHeader::new(script, DataType::Numeric).with_param(Parameter::numeric("x"))
    }

    fn batch(values: &[f64]) -> BundledRows {
        values
            .iter()
            .map(|v| Row::new(vec![Dual::number(*v)]))
            .collect()
    }

    #[test]
    fn test_blocking_counts() {
        let handler = Handler::default();
        let mut ctx = CallContext::new();
        let out = handler
            .evaluate_blocking(&header("args[0]"), vec![batch(&[1.0, 2.0])], &mut ctx)
            .unwrap();
        assert_eq!(out.len(), 2);

        let mut ctx = CallContext::new();
        assert!(handler
            .evaluate_blocking(&header("nope"), vec![batch(&[1.0])], &mut ctx)
            .is_err());

        let stats = handler.stats();
        assert_eq!(stats.invocations, 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.rows_in, 3);
        assert_eq!(stats.rows_out, 2);
    }

    #[tokio::test]
    async fn test_async_evaluate_reports_context() {
        let handler = Handler::default();
        let (outcome, ctx) = handler
            .evaluate(header("1 / 0"), vec![batch(&[1.0])], BTreeMap::new())
            .await;
        assert!(outcome.is_err());
        assert_eq!(ctx.code(), StatusCode::Unknown);
        assert!(ctx.details().is_some());

        let (outcome, ctx) = handler
            .evaluate(header("numpy.max(args[0])"), vec![batch(&[4.0, 9.0])], BTreeMap::new())
            .await;
        assert_eq!(outcome.unwrap().rows[0].duals[0], Dual::number(9.0));
        assert_eq!(ctx.code(), StatusCode::Ok);
    }
}
