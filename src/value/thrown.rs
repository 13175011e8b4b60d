use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{ProxyError, Result};

/// An error object: what `new Error(message)` is on the other side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorValue {
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorValue {
    // ---
    /// A plain `Error` with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: "Error".into(),
            message: message.into(),
            stack: None,
        }
    }

    /// A `TypeError`, the kind raised for misuse such as calling a non-function.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(message).with_name("TypeError")
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// What a callee operation raised instead of returning.
///
/// Peers may throw error objects or arbitrary values, so both are kept.
#[derive(Debug, Clone, PartialEq)]
pub enum ThrownValue {
    Error(ErrorValue),
    Value(serde_json::Value),
}

impl ThrownValue {
    // ---
    /// Throw a plain `Error` with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorValue::new(message))
    }

    /// Throw a `TypeError` with the given message.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Error(ErrorValue::type_error(message))
    }

    /// Human-readable description of the thrown value.
    pub fn message(&self) -> String {
        match self {
            ThrownValue::Error(err) => err.message.clone(),
            ThrownValue::Value(serde_json::Value::String(s)) => s.clone(),
            ThrownValue::Value(other) => other.to_string(),
        }
    }

    /// The `throw` handler payload.
    ///
    /// `{ isError: true, value: {message, name, stack?} }` for errors,
    /// `{ isError: false, value }` for anything else.
    pub(crate) fn to_wire(&self) -> serde_json::Value {
        // ---
        match self {
            ThrownValue::Error(err) => {
                let mut value = json!({ "message": err.message, "name": err.name });
                if let Some(stack) = &err.stack {
                    value["stack"] = json!(stack);
                }
                json!({ "isError": true, "value": value })
            }
            ThrownValue::Value(value) => json!({ "isError": false, "value": value }),
        }
    }

    pub(crate) fn from_wire(wire: serde_json::Value) -> Result<Self> {
        // ---
        let serialized: SerializedThrown = serde_json::from_value(wire)?;
        if !serialized.is_error {
            return Ok(ThrownValue::Value(serialized.value));
        }

        // Peers are lax about error fields; take what is there.
        let field = |key: &str| {
            serialized
                .value
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        };
        Ok(ThrownValue::Error(ErrorValue {
            name: field("name").unwrap_or_else(|| "Error".into()),
            message: field("message").unwrap_or_default(),
            stack: field("stack"),
        }))
    }
}

impl fmt::Display for ThrownValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThrownValue::Error(err) => err.fmt(f),
            ThrownValue::Value(value) => write!(f, "{value}"),
        }
    }
}

impl From<ErrorValue> for ThrownValue {
    fn from(err: ErrorValue) -> Self {
        ThrownValue::Error(err)
    }
}

/// Local failures seen while serving a request travel back as throws.
impl From<&ProxyError> for ThrownValue {
    fn from(err: &ProxyError) -> Self {
        match err {
            ProxyError::RemoteThrow(thrown) => thrown.clone(),
            ProxyError::PathResolution { .. } => ThrownValue::type_error(err.to_string()),
            other => ThrownValue::error(other.to_string()),
        }
    }
}

impl From<ProxyError> for ThrownValue {
    fn from(err: ProxyError) -> Self {
        ThrownValue::from(&err)
    }
}

#[derive(Deserialize)]
struct SerializedThrown {
    #[serde(rename = "isError")]
    is_error: bool,
    #[serde(default)]
    value: serde_json::Value,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_error_wire_shape() {
        // ---
        let thrown = ThrownValue::error("boom");
        assert_eq!(
            thrown.to_wire(),
            json!({"isError": true, "value": {"message": "boom", "name": "Error"}})
        );
    }

    #[test]
    fn test_error_keeps_name_and_stack() {
        // ---
        let thrown = ThrownValue::from(
            ErrorValue::new("bad index")
                .with_name("RangeError")
                .with_stack("at f (worker.js:1)"),
        );
        let back = ThrownValue::from_wire(thrown.to_wire()).unwrap();
        assert_eq!(back, thrown);
        assert_eq!(back.to_string(), "RangeError: bad index");
    }

    #[test]
    fn test_non_error_throw() {
        // ---
        let thrown = ThrownValue::Value(json!({"code": 7}));
        assert_eq!(
            thrown.to_wire(),
            json!({"isError": false, "value": {"code": 7}})
        );
        assert_eq!(ThrownValue::from_wire(thrown.to_wire()).unwrap(), thrown);
    }

    #[test]
    fn test_path_failure_becomes_type_error() {
        // ---
        let err = ProxyError::path(&["a".to_string()], "property not found");
        match ThrownValue::from(&err) {
            ThrownValue::Error(e) => assert_eq!(e.name, "TypeError"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
