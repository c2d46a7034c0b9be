//! Typed command parameters.

use super::value::Value;
use serde::{Deserialize, Serialize};

/// Logical parameter type, used by drivers to bind typed values and typed NULLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbType {
    Boolean,
    Int32,
    Int64,
    Double,
    String,
    Binary,
    Json,
}

impl DbType {
    /// Infer the parameter type from a value. NULL infers `String`.
    ///
    /// Integers that fit in 32 bits infer `Int32`, so they match `INTEGER`
    /// procedure arguments and still widen to 64-bit columns.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null | Value::Text(_) => Self::String,
            Value::Bool(_) => Self::Boolean,
            Value::Int(v) if i32::try_from(*v).is_ok() => Self::Int32,
            Value::Int(_) => Self::Int64,
            Value::Float(_) => Self::Double,
            Value::Bytes(_) => Self::Binary,
            Value::Json(_) => Self::Json,
        }
    }
}

/// Direction of a parameter relative to the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterDirection {
    #[default]
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

impl ParameterDirection {
    /// Whether the parameter carries a value into the statement.
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input | Self::InputOutput)
    }
}

/// A named, typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    name: String,
    db_type: DbType,
    value: Value,
    #[serde(default)]
    direction: ParameterDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<usize>,
    #[serde(default = "default_nullable")]
    nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl Parameter {
    /// Create an input parameter, inferring its type from the value.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            db_type: DbType::of(&value),
            value,
            direction: ParameterDirection::Input,
            size: None,
            nullable: true,
        }
    }

    /// Override the inferred type.
    pub fn with_db_type(mut self, db_type: DbType) -> Self {
        self.db_type = db_type;
        self
    }

    pub fn with_direction(mut self, direction: ParameterDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn db_type(&self) -> DbType {
        self.db_type
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn direction(&self) -> ParameterDirection {
        self.direction
    }

    pub fn size(&self) -> Option<usize> {
        self.size
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Name without a leading `@`, `:` or `$` placeholder sigil.
    pub fn bare_name(&self) -> &str {
        self.name.trim_start_matches(['@', ':', '$'])
    }
}
