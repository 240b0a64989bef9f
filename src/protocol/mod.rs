//! Script Evaluation Protocol
//!
//! Wire types, protocol errors, the shared handler and the HTTP transport.
//!
//! # Architecture
//!
//! ```text
//! +-------------------------------------------------------------+
//! |                 Script Evaluation Protocol                  |
//! +-------------------------------------------------------------+
//! |  HTTP Endpoints:                                            |
//! |    - /health, /live: liveness                               |
//! |    - /metrics: invocation counters                          |
//! |    - /api/v1/evaluate-script: header + row batches          |
//! +-------------------------------------------------------------+
//! |  Wire Format: JSON, protobuf-compatible enum codes          |
//! +-------------------------------------------------------------+
//! ```
//!
//! # Module Structure
//!
//! - `wire` - Wire format types (`Dual`, `Row`, `BundledRows`, `ScriptRequestHeader`)
//! - `error` - Protocol error types and caller-visible status codes
//! - `handler` - Handler shared by the transports
//! - `rest` - REST API handlers and routing

pub mod error;
pub mod handler;
pub mod rest;
pub mod wire;

// Re-export error types
pub use error::{ScriptEvalError, ScriptEvalResult, StatusCode};

// Re-export wire types
pub use wire::{BundledRows, DataType, Dual, FunctionType, Parameter, Row, ScriptRequestHeader};

// Re-export handler
pub use handler::Handler;

// Protocol Constants
/// Default HTTP server port
pub const DEFAULT_PORT: u16 = 50055;

/// Maximum request body size (16 MB)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Protocol version
pub const PROTOCOL_VERSION: u32 = 1;
