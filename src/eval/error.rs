//! Faults raised while parsing or running a script.

/// Script fault. Carries whatever the evaluator reports, nothing is retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    #[error("SyntaxError at line {line}, column {column}: {message}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("NameError: name '{name}' is not defined")]
    Name { name: String },

    #[error("AttributeError: '{target}' has no attribute '{name}'")]
    Attribute { target: String, name: String },

    #[error("TypeError: {message}")]
    Type { message: String },

    #[error("IndexError: {message}")]
    Index { message: String },

    #[error("ValueError: {message}")]
    Value { message: String },

    #[error("ZeroDivisionError: division by zero")]
    ZeroDivision,

    /// Final value cannot be read as rows of columns
    #[error("ResultError: {message}")]
    ResultShape { message: String },
}

impl ScriptError {
    pub fn type_error(message: impl Into<String>) -> Self {
        ScriptError::Type {
            message: message.into(),
        }
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        ScriptError::Value {
            message: message.into(),
        }
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        ScriptError::Index {
            message: message.into(),
        }
    }
}

/// Result type for script evaluation
pub type ScriptResult<T> = Result<T, ScriptError>;
