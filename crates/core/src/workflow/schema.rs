//! Validators for workflow input and result shapes.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("missing required field `{0}`")]
    MissingField(String),

    #[error("{0}")]
    Invalid(String),
}

/// Describes the accepted shape of a JSON value.
pub trait Schema: Send + Sync {
    fn validate(&self, value: &Value) -> Result<(), SchemaError>;
}

/// Accepts anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnySchema;

impl Schema for AnySchema {
    fn validate(&self, _value: &Value) -> Result<(), SchemaError> {
        Ok(())
    }
}

/// Requires an object containing every listed key.
#[derive(Debug, Clone, Default)]
pub struct RequiredFields {
    fields: Vec<String>,
}

impl RequiredFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl Schema for RequiredFields {
    fn validate(&self, value: &Value) -> Result<(), SchemaError> {
        let object = value
            .as_object()
            .ok_or_else(|| SchemaError::NotAnObject(value_kind(value)))?;

        match self.fields.iter().find(|f| !object.contains_key(f.as_str())) {
            Some(missing) => Err(SchemaError::MissingField(missing.clone())),
            None => Ok(()),
        }
    }
}

/// Accepts values that deserialize into `T`.
///
/// This is how a Rust type becomes a workflow's input or result contract.
pub struct TypedSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedSchema<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> Schema for TypedSchema<T> {
    fn validate(&self, value: &Value) -> Result<(), SchemaError> {
        T::deserialize(value)
            .map(|_| ())
            .map_err(|e| SchemaError::Invalid(e.to_string()))
    }
}

/// Validator backed by a closure.
pub struct FnSchema<F>(pub F);

impl<F> Schema for FnSchema<F>
where
    F: Fn(&Value) -> Result<(), SchemaError> + Send + Sync,
{
    fn validate(&self, value: &Value) -> Result<(), SchemaError> {
        (self.0)(value)
    }
}

/// Short name of a JSON value's kind, for error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    #[allow(dead_code)]
    struct Order {
        id: u32,
        amount: f64,
    }

    #[test]
    fn test_any_schema_accepts_everything() {
        assert!(AnySchema.validate(&json!(null)).is_ok());
        assert!(AnySchema.validate(&json!({"a": 1})).is_ok());
    }

    #[test]
    fn test_required_fields() {
        let schema = RequiredFields::new(["name", "age"]);

        assert!(schema.validate(&json!({"name": "x", "age": 3})).is_ok());
        assert_eq!(
            schema.validate(&json!({"name": "x"})),
            Err(SchemaError::MissingField("age".to_string()))
        );
        assert_eq!(
            schema.validate(&json!([1, 2])),
            Err(SchemaError::NotAnObject("array"))
        );
    }

    #[test]
    fn test_typed_schema() {
        let schema = TypedSchema::<Order>::new();

        assert!(schema.validate(&json!({"id": 1, "amount": 9.5})).is_ok());
        assert!(matches!(
            schema.validate(&json!({"id": "one"})),
            Err(SchemaError::Invalid(_))
        ));
    }

    #[test]
    fn test_fn_schema() {
        let schema = FnSchema(|value: &Value| match value.get("amount").and_then(Value::as_f64) {
            Some(amount) if amount >= 0.0 => Ok(()),
            _ => Err(SchemaError::Invalid("amount must be non-negative".to_string())),
        });

        assert!(schema.validate(&json!({"amount": 1})).is_ok());
        assert!(schema.validate(&json!({"amount": -1})).is_err());
    }
}
