//! Typed access to tool call input.

use crate::error::TandemError;

/// Tool input after merging the call's input onto the tool's defaults.
#[derive(Debug, Clone, Default)]
pub struct ToolArguments {
    value: serde_json::Map<String, serde_json::Value>,
}

impl ToolArguments {
    pub fn new(value: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { value }
    }

    /// Merge `input` over `defaults`; keys present in both take the input's value.
    pub fn merged(
        mut defaults: serde_json::Map<String, serde_json::Value>,
        input: &serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        for (key, value) in input {
            defaults.insert(key.clone(), value.clone());
        }
        Self { value: defaults }
    }

    /// Get the raw input map.
    pub fn raw(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.value
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.value.get(key)
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, TandemError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| TandemError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Get an integer argument.
    pub fn get_i64(&self, key: &str) -> Result<i64, TandemError> {
        self.value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| TandemError::InvalidArgument(format!("Missing integer argument: {key}")))
    }

    /// Get a float argument.
    pub fn get_f64(&self, key: &str) -> Result<f64, TandemError> {
        self.value
            .get(key)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| TandemError::InvalidArgument(format!("Missing float argument: {key}")))
    }

    /// Get a boolean argument.
    pub fn get_bool(&self, key: &str) -> Result<bool, TandemError> {
        self.value
            .get(key)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| TandemError::InvalidArgument(format!("Missing boolean argument: {key}")))
    }

    /// Deserialize the entire input into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, TandemError> {
        serde_json::from_value(serde_json::Value::Object(self.value.clone())).map_err(|e| {
            TandemError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}
