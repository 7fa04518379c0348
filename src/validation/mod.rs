//! Input and output contracts.
//!
//! The runtime only needs a [`Validator`]; [`JsonSchemaValidator`] covers the
//! structural subset of JSON Schema agents typically declare (type,
//! required, properties, items, enum). Plug in a full schema engine by
//! implementing the trait.

use crate::error::FieldError;

/// Checks a value against a schema, reporting every failure found.
pub trait Validator: Send + Sync {
    fn validate(
        &self,
        schema: &serde_json::Value,
        value: &serde_json::Value,
    ) -> Result<(), Vec<FieldError>>;
}

/// Structural JSON Schema checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaValidator;

impl Validator for JsonSchemaValidator {
    fn validate(
        &self,
        schema: &serde_json::Value,
        value: &serde_json::Value,
    ) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        check(schema, value, "", &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn check(schema: &serde_json::Value, value: &serde_json::Value, path: &str, errors: &mut Vec<FieldError>) {
    if let Some(expected) = schema.get("type").and_then(|v| v.as_str()) {
        if !value_matches_type(value, expected) {
            errors.push(FieldError::new(
                path,
                format!("expected type '{expected}', got {}", json_type_name(value)),
            ));
            return;
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(|v| v.as_array()) {
        if !allowed.contains(value) {
            errors.push(FieldError::new(path, format!("value {value} is not one of the allowed values")));
        }
    }

    if let Some(obj) = value.as_object() {
        if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
            for name in required.iter().filter_map(|field| field.as_str()) {
                if !obj.contains_key(name) {
                    errors.push(FieldError::new(
                        format!("{path}/{name}"),
                        "missing required field",
                    ));
                }
            }
        }
        if let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) {
            for (key, field_value) in obj {
                if let Some(field_schema) = properties.get(key) {
                    check(field_schema, field_value, &format!("{path}/{key}"), errors);
                }
            }
        }
    }

    if let (Some(items), Some(array)) = (schema.get("items"), value.as_array()) {
        for (index, item) in array.iter().enumerate() {
            check(items, item, &format!("{path}/{index}"), errors);
        }
    }
}

fn value_matches_type(value: &serde_json::Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
