use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{MessageId, Result};

/// Reserved handler name marking a value as thrown.
pub const THROW_HANDLER: &str = "throw";

/// Serialized form of any value crossing the boundary.
///
/// Wire shape:
///
/// ```text
/// { id?: string, type: "RAW",     value: <structured data> }
/// { id?: string, type: "HANDLER", name: string, value: <any> }
/// ```
///
/// Responses reuse this type: the dispatcher sets `id` to the id of the
/// request being answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireValue {
    // ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,

    #[serde(flatten)]
    pub kind: WireKind,
}

/// The two ways a value can travel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireKind {
    /// Natively transmissible data, sent unchanged.
    #[serde(rename = "RAW")]
    Raw {
        #[serde(default)]
        value: serde_json::Value,
    },

    /// Requires the transfer handler registered under `name` to decode.
    #[serde(rename = "HANDLER")]
    Handler {
        name: String,
        #[serde(default)]
        value: serde_json::Value,
    },
}

impl WireValue {
    // ---
    /// A `RAW` wire value without an id.
    pub fn raw(value: serde_json::Value) -> Self {
        Self {
            id: None,
            kind: WireKind::Raw { value },
        }
    }

    /// A `HANDLER` wire value without an id.
    pub fn handler(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            id: None,
            kind: WireKind::Handler {
                name: name.into(),
                value,
            },
        }
    }

    /// Tag this value as the answer to request `id`.
    pub fn with_id(mut self, id: Option<MessageId>) -> Self {
        self.id = id;
        self
    }

    /// True when the payload carries a thrown outcome rather than a result.
    pub fn is_thrown(&self) -> bool {
        matches!(&self.kind, WireKind::Handler { name, .. } if name == THROW_HANDLER)
    }

    pub(crate) fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_shape() {
        // ---
        let wire = WireValue::raw(json!("Ada"));
        assert_eq!(
            serde_json::to_value(&wire).unwrap(),
            json!({"type": "RAW", "value": "Ada"})
        );
    }

    #[test]
    fn test_handler_shape_with_id() {
        // ---
        let wire = WireValue::handler("proxy", json!({"transfer": 0}))
            .with_id(Some(MessageId::from("7")));
        assert_eq!(
            serde_json::to_value(&wire).unwrap(),
            json!({"id": "7", "type": "HANDLER", "name": "proxy", "value": {"transfer": 0}})
        );
    }

    #[test]
    fn test_missing_raw_value_reads_as_null() {
        // ---
        // Peers that encode `undefined` omit the field entirely.
        let wire: WireValue = serde_json::from_value(json!({"id": "1", "type": "RAW"})).unwrap();
        assert_eq!(wire.kind, WireKind::Raw { value: json!(null) });
        assert_eq!(wire.id, Some(MessageId::from("1")));
    }

    #[test]
    fn test_thrown_detection() {
        // ---
        assert!(WireValue::handler(THROW_HANDLER, json!({})).is_thrown());
        assert!(!WireValue::handler("proxy", json!({})).is_thrown());
        assert!(!WireValue::raw(json!(1)).is_thrown());
    }
}
