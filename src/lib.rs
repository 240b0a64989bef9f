//! # ScriptEval
//!
//! Host side of a script-function RPC: the caller declares a script, its
//! parameter kinds and a return kind, streams rows of duals, and gets back
//! exactly one batch of encoded results.
//!
//! ## Pipeline Architecture
//!
//! ```text
//! ScriptRequestHeader + BundledRows*
//!     ↓
//! [Type Classifier]      → Signature (ArgType, ReturnType, FunctionKind)
//!     ↓
//! [Row Transposer]       → one ArgumentColumn per parameter
//!     ↓
//! [Evaluation Invoker]   → EvalResult (scalar | rows | table)
//!     ↓
//! [Result Encoder]       → BundledRows
//! ```
//!
//! [`dispatch::ScriptEval`] drives the pipeline for one invocation;
//! [`protocol::Handler`] wraps it for the HTTP server and the REPL.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scripteval::protocol::{DataType, Dual, Parameter, Row, ScriptRequestHeader};
//! use scripteval::{CallContext, ScriptEval};
//!
//! let service = ScriptEval::new();
//! let header = ScriptRequestHeader::new("numpy.mean(args[0])", DataType::Numeric)
//!     .with_param(Parameter::numeric("x"));
//! let rows = vec![Row::new(vec![Dual::number(1.0)]), Row::new(vec![Dual::number(3.0)])];
//!
//! let mut ctx = CallContext::new();
//! let batch = service
//!     .evaluate_script(&header, vec![rows.into_iter().collect()], &mut ctx)?
//!     .next();
//! ```

pub mod config; // Configuration system
pub mod dispatch; // Invocation orchestration
pub mod encode; // Result encoding
pub mod eval; // Script evaluation
pub mod protocol; // Wire types, errors, HTTP transport
pub mod transpose; // Row to column transposition
pub mod types; // Type classification

pub use config::Config;
pub use dispatch::{CallContext, Limits, ScriptEval};
pub use encode::{encode, ensure_supported};
pub use eval::{
    invoke, Bindings, EvalResult, Evaluator, ExpressionEvaluator, ResultRow, Scalar, ScriptError,
};
pub use protocol::{Handler, ScriptEvalError, ScriptEvalResult, StatusCode};
pub use transpose::{accumulate_rows, transpose, transpose_rows, ArgumentColumn};
pub use types::{
    classify_arguments, classify_function, classify_header, classify_return, ArgType,
    FunctionKind, ReturnType, Signature,
};
