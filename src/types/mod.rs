//! # Type Classification
//!
//! Resolves the declared parameter kinds of a script function into a single
//! argument classification, and the declared return kind into a return
//! classification. Everything here is pure: the same declarations always give
//! the same answer, and no input is an error. Unsupported combinations come
//! back as `Undefined` so the caller can report them uniformly.
//!
//! | Declared kinds                 | `ArgType`   |
//! |--------------------------------|-------------|
//! | `[]`                           | `Empty`     |
//! | all `String`                   | `String`    |
//! | all `Numeric`                  | `Numeric`   |
//! | more than one kind, or all `Dual` | `Mixed`  |
//! | anything unrecognized          | `Undefined` |

use std::collections::BTreeSet;
use std::fmt;

use crate::protocol::wire::{DataType, FunctionType, ScriptRequestHeader};

/// Unified classification of a function's parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgType {
    Empty,
    String,
    Numeric,
    Mixed,
    Undefined,
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgType::Empty => write!(f, "Empty"),
            ArgType::String => write!(f, "String"),
            ArgType::Numeric => write!(f, "Numeric"),
            ArgType::Mixed => write!(f, "Mixed"),
            ArgType::Undefined => write!(f, "Undefined"),
        }
    }
}

/// Classification of a function's return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnType {
    String,
    Numeric,
    Dual,
    Undefined,
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnType::String => write!(f, "String"),
            ReturnType::Numeric => write!(f, "Numeric"),
            ReturnType::Dual => write!(f, "Dual"),
            ReturnType::Undefined => write!(f, "Undefined"),
        }
    }
}

/// Function kind, resolved for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    Scalar,
    Aggregation,
    Tensor,
    Undefined,
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionKind::Scalar => write!(f, "Scalar"),
            FunctionKind::Aggregation => write!(f, "Aggregation"),
            FunctionKind::Tensor => write!(f, "Tensor"),
            FunctionKind::Undefined => write!(f, "Undefined"),
        }
    }
}

/// Classify a sequence of declared parameter kinds.
pub fn classify_arguments(kinds: &[DataType]) -> ArgType {
    if kinds.is_empty() {
        return ArgType::Empty;
    }
    if kinds.iter().any(|k| !k.is_recognized()) {
        return ArgType::Undefined;
    }

    let distinct: BTreeSet<DataType> = kinds.iter().copied().collect();
    if distinct.len() > 1 {
        return ArgType::Mixed;
    }

    match distinct.first() {
        Some(DataType::Dual) => ArgType::Mixed,
        Some(DataType::String) => ArgType::String,
        Some(DataType::Numeric) => ArgType::Numeric,
        _ => ArgType::Undefined,
    }
}

/// Classify the declared return kind.
pub fn classify_return(kind: DataType) -> ReturnType {
    match kind {
        DataType::String => ReturnType::String,
        DataType::Numeric => ReturnType::Numeric,
        DataType::Dual => ReturnType::Dual,
        DataType::Unrecognized(_) => ReturnType::Undefined,
    }
}

/// Resolve the declared function type.
pub fn classify_function(kind: FunctionType) -> FunctionKind {
    match kind {
        FunctionType::Scalar => FunctionKind::Scalar,
        FunctionType::Aggregation => FunctionKind::Aggregation,
        FunctionType::Tensor => FunctionKind::Tensor,
        FunctionType::Unrecognized(_) => FunctionKind::Undefined,
    }
}

/// Everything the pipeline needs to know about a header's types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub param_types: Vec<DataType>,
    pub arg_type: ArgType,
    pub return_type: ReturnType,
    pub function_kind: FunctionKind,
}

impl Signature {
    pub fn has_params(&self) -> bool {
        !self.param_types.is_empty()
    }
}

/// Classify all declared types of a header at once.
pub fn classify_header(header: &ScriptRequestHeader) -> Signature {
    let param_types = header.param_types();
    let arg_type = classify_arguments(&param_types);
    Signature {
        param_types,
        arg_type,
        return_type: classify_return(header.return_type),
        function_kind: classify_function(header.function_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::wire::Parameter;

    use crate::protocol::wire::DataType::{Dual, Numeric, String as Str};

    #[test]
    fn test_empty_is_empty() {
        assert_eq!(classify_arguments(&[]), ArgType::Empty);
    }

    #[test]
    fn test_uniform_kinds() {
        assert_eq!(classify_arguments(&[Str, Str, Str]), ArgType::String);
        assert_eq!(classify_arguments(&[Numeric]), ArgType::Numeric);
        assert_eq!(classify_arguments(&[Numeric, Numeric]), ArgType::Numeric);
    }

    #[test]
    fn test_all_dual_is_mixed() {
        assert_eq!(classify_arguments(&[Dual]), ArgType::Mixed);
        assert_eq!(classify_arguments(&[Dual, Dual]), ArgType::Mixed);
    }

    #[test]
    fn test_differing_kinds_are_mixed() {
        assert_eq!(classify_arguments(&[Str, Numeric]), ArgType::Mixed);
        assert_eq!(classify_arguments(&[Numeric, Dual, Numeric]), ArgType::Mixed);
    }

    #[test]
    fn test_unrecognized_is_undefined() {
        assert_eq!(
            classify_arguments(&[DataType::Unrecognized(4)]),
            ArgType::Undefined
        );
        assert_eq!(
            classify_arguments(&[Str, DataType::Unrecognized(4)]),
            ArgType::Undefined
        );
    }

    #[test]
    fn test_return_mapping() {
        assert_eq!(classify_return(Str), ReturnType::String);
        assert_eq!(classify_return(Numeric), ReturnType::Numeric);
        assert_eq!(classify_return(Dual), ReturnType::Dual);
        assert_eq!(
            classify_return(DataType::Unrecognized(3)),
            ReturnType::Undefined
        );
    }

    #[test]
    fn test_function_mapping() {
        assert_eq!(classify_function(FunctionType::Scalar), FunctionKind::Scalar);
        assert_eq!(
            classify_function(FunctionType::Aggregation),
            FunctionKind::Aggregation
        );
        assert_eq!(classify_function(FunctionType::Tensor), FunctionKind::Tensor);
        assert_eq!(
            classify_function(FunctionType::Unrecognized(8)),
            FunctionKind::Undefined
        );
    }

    #[test]
    fn test_classify_header() {
        let header = ScriptRequestHeader::new("args", Numeric)
            .with_function_type(FunctionType::Tensor)
            .with_param(Parameter::string("a"))
            .with_param(Parameter::numeric("b"));
        let sig = classify_header(&header);
        assert_eq!(sig.param_types, vec![Str, Numeric]);
        assert_eq!(sig.arg_type, ArgType::Mixed);
        assert_eq!(sig.return_type, ReturnType::Numeric);
        assert_eq!(sig.function_kind, FunctionKind::Tensor);
        assert!(sig.has_params());
    }
}
