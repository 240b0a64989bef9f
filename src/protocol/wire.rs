//! Wire Format Types
//!
//! Serializable types for the script-evaluation contract: the request header,
//! parameter declarations, and the bundled rows of duals that travel in both
//! directions. Enum codes follow the protobuf numbering of the
//! server-side-extension protocol so a gRPC front end can map them 1:1.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// Data Type
// ============================================================================

/// Declared scalar kind of a parameter or return value.
///
/// `Unrecognized` keeps any code outside the known set so classification can
/// report it instead of failing at deserialization time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum DataType {
    #[default]
    String,
    Numeric,
    Dual,
    Unrecognized(i32),
}

impl DataType {
    /// Protobuf enum code
    pub fn code(self) -> i32 {
        match self {
            DataType::String => 0,
            DataType::Numeric => 1,
            DataType::Dual => 2,
            DataType::Unrecognized(code) => code,
        }
    }

    /// Is this one of the known kinds
    pub fn is_recognized(self) -> bool {
        !matches!(self, DataType::Unrecognized(_))
    }
}

impl From<i32> for DataType {
    fn from(code: i32) -> Self {
        match code {
            0 => DataType::String,
            1 => DataType::Numeric,
            2 => DataType::Dual,
            other => DataType::Unrecognized(other),
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::String => write!(f, "STRING"),
            DataType::Numeric => write!(f, "NUMERIC"),
            DataType::Dual => write!(f, "DUAL"),
            DataType::Unrecognized(code) => write!(f, "UNRECOGNIZED({code})"),
        }
    }
}

impl Serialize for DataType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DataType::Unrecognized(code) => serializer.serialize_i32(*code),
            known => serializer.serialize_str(&known.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match EnumTag::deserialize(deserializer)? {
            EnumTag::Code(code) => Ok(DataType::from(code)),
            EnumTag::Name(name) => match name.as_str() {
                "STRING" => Ok(DataType::String),
                "NUMERIC" => Ok(DataType::Numeric),
                "DUAL" => Ok(DataType::Dual),
                other => Err(serde::de::Error::custom(format!(
                    "unknown data type '{other}'"
                ))),
            },
        }
    }
}

// ============================================================================
// Function Type
// ============================================================================

/// Declared function type. Only used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FunctionType {
    #[default]
    Scalar,
    Aggregation,
    Tensor,
    Unrecognized(i32),
}

impl From<i32> for FunctionType {
    fn from(code: i32) -> Self {
        match code {
            0 => FunctionType::Scalar,
            1 => FunctionType::Aggregation,
            2 => FunctionType::Tensor,
            other => FunctionType::Unrecognized(other),
        }
    }
}

impl std::fmt::Display for FunctionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionType::Scalar => write!(f, "SCALAR"),
            FunctionType::Aggregation => write!(f, "AGGREGATION"),
            FunctionType::Tensor => write!(f, "TENSOR"),
            FunctionType::Unrecognized(code) => write!(f, "UNRECOGNIZED({code})"),
        }
    }
}

impl Serialize for FunctionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FunctionType::Unrecognized(code) => serializer.serialize_i32(*code),
            known => serializer.serialize_str(&known.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for FunctionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match EnumTag::deserialize(deserializer)? {
            EnumTag::Code(code) => Ok(FunctionType::from(code)),
            EnumTag::Name(name) => match name.as_str() {
                "SCALAR" => Ok(FunctionType::Scalar),
                "AGGREGATION" => Ok(FunctionType::Aggregation),
                "TENSOR" => Ok(FunctionType::Tensor),
                other => Err(serde::de::Error::custom(format!(
                    "unknown function type '{other}'"
                ))),
            },
        }
    }
}

/// Protobuf JSON accepts enums either by code or by name.
#[derive(Deserialize)]
#[serde(untagged)]
enum EnumTag {
    Code(i32),
    Name(String),
}

// ============================================================================
// Header
// ============================================================================

/// One declared parameter of the script function.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub name: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            data_type,
            name: name.into(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, DataType::String)
    }

    pub fn numeric(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Numeric)
    }

    pub fn dual(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Dual)
    }
}

/// Header sent once per invocation, ahead of the row batches.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptRequestHeader {
    pub script: String,
    #[serde(default)]
    pub function_type: FunctionType,
    #[serde(default)]
    pub return_type: DataType,
    #[serde(default)]
    pub params: Vec<Parameter>,
}

impl ScriptRequestHeader {
    pub fn new(script: impl Into<String>, return_type: DataType) -> Self {
        Self {
            script: script.into(),
            function_type: FunctionType::Scalar,
            return_type,
            params: Vec::new(),
        }
    }

    pub fn with_function_type(mut self, function_type: FunctionType) -> Self {
        self.function_type = function_type;
        self
    }

    pub fn with_param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    /// Declared kinds, in parameter order
    pub fn param_types(&self) -> Vec<DataType> {
        self.params.iter().map(|p| p.data_type).collect()
    }
}

// ============================================================================
// Dual / Row / BundledRows
// ============================================================================

/// Wire scalar carrying a numeric and a textual representation at once.
///
/// Absent fields take the protobuf defaults (`0.0` and `""`). `NaN` is the
/// wire's null number and is written as JSON `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dual {
    #[serde(default, with = "nan_as_null")]
    pub num_data: f64,
    #[serde(default)]
    pub str_data: String,
}

impl Dual {
    pub fn new(num_data: f64, str_data: impl Into<String>) -> Self {
        Self {
            num_data,
            str_data: str_data.into(),
        }
    }

    /// Dual with only the numeric field populated
    pub fn number(num_data: f64) -> Self {
        Self {
            num_data,
            str_data: String::new(),
        }
    }

    /// Dual with only the textual field populated
    pub fn text(str_data: impl Into<String>) -> Self {
        Self {
            num_data: 0.0,
            str_data: str_data.into(),
        }
    }
}

// NaN != NaN would make every null dual unequal to itself.
impl PartialEq for Dual {
    fn eq(&self, other: &Self) -> bool {
        let num_eq = self.num_data == other.num_data
            || (self.num_data.is_nan() && other.num_data.is_nan());
        num_eq && self.str_data == other.str_data
    }
}

impl std::fmt::Display for Dual {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dual({}, \"{}\")", self.num_data, self.str_data)
    }
}

/// One logical record: one dual per column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    #[serde(default)]
    pub duals: Vec<Dual>,
}

impl Row {
    pub fn new(duals: Vec<Dual>) -> Self {
        Self { duals }
    }

    pub fn len(&self) -> usize {
        self.duals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.duals.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Dual> {
        self.duals.get(index)
    }
}

impl FromIterator<Dual> for Row {
    fn from_iter<I: IntoIterator<Item = Dual>>(iter: I) -> Self {
        Self {
            duals: iter.into_iter().collect(),
        }
    }
}

/// A batch of rows, the streaming unit in both directions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BundledRows {
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl BundledRows {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn empty() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }
}

impl FromIterator<Row> for BundledRows {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_none()
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

// ============================================================================
// Tests
// ============================================================================
